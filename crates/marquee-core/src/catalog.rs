//! Catalog - remote JSON configuration and offline stream lists
//!
//! Two documents are understood here. The app catalog groups plain HLS
//! content into live, on-demand and offline sections:
//!
//! ```json
//! { "config": {
//!     "live":     { "channels": [ { "name": "...", "description": "...",
//!                                   "imageUrl": "...", "videoSource": "..." } ] },
//!     "onDemand": { "vods": [] },
//!     "offline":  { "vods": [] } } }
//! ```
//!
//! An offline stream list is a JSON array of [`Stream`]s that may carry
//! DRM settings.

use crate::drm::DrmConfig;
use crate::error::{Error, Result};
use crate::types::SourceDescription;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use url::Url;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub video_source: String,
}

impl Content {
    /// HLS source for this entry
    pub fn source(&self) -> Result<SourceDescription> {
        let src = parse_url("videoSource", &self.video_source)?;
        let mut source = SourceDescription::hls(src);
        if let Some(poster) = optional_url(&self.image_url) {
            source = source.with_poster(poster);
        }
        Ok(source)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSection {
    #[serde(default)]
    pub channels: Vec<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VodSection {
    #[serde(default)]
    pub vods: Vec<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    #[serde(default)]
    pub live: LiveSection,
    #[serde(default)]
    pub on_demand: VodSection,
    #[serde(default)]
    pub offline: VodSection,
}

/// Catalog section, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Live,
    OnDemand,
    Offline,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Live, Section::OnDemand, Section::Offline];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Live => "LIVE",
            Section::OnDemand => "ON DEMAND",
            Section::Offline => "OFFLINE",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// The app catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub config: CatalogConfig,
}

impl Catalog {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::CatalogParse(e.to_string()))
    }

    /// Read a catalog from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&text)?;
        debug!(path = %path.display(), items = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Download a catalog over HTTP
    #[cfg(feature = "remote-catalog")]
    pub async fn fetch(url: &Url) -> Result<Self> {
        debug!(url = %url, "Fetching catalog");

        let response = reqwest::get(url.as_str())
            .await
            .map_err(|e| Error::CatalogFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::CatalogFetch(e.to_string()))?;

        let text = response
            .text()
            .await
            .map_err(|e| Error::CatalogFetch(e.to_string()))?;

        Self::from_json(&text)
    }

    /// Entries of one section
    pub fn section(&self, section: Section) -> &[Content] {
        match section {
            Section::Live => &self.config.live.channels,
            Section::OnDemand => &self.config.on_demand.vods,
            Section::Offline => &self.config.offline.vods,
        }
    }

    /// Sections with their entries, in display order
    pub fn sections(&self) -> impl Iterator<Item = (Section, &[Content])> + '_ {
        Section::ALL.into_iter().map(move |s| (s, self.section(s)))
    }

    pub fn len(&self) -> usize {
        self.sections().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Offline streams
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmKind {
    Ezdrm,
    Uplynk,
}

/// DRM settings as written in a stream list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDrm {
    #[serde(rename = "type")]
    pub kind: DrmKind,
    #[serde(default)]
    pub license_url: String,
    pub certificate_url: String,
}

impl StreamDrm {
    pub fn config(&self) -> Result<DrmConfig> {
        let certificate_url = parse_url("certificateUrl", &self.certificate_url)?;
        match self.kind {
            DrmKind::Ezdrm => Ok(DrmConfig::ezdrm(
                parse_url("licenseUrl", &self.license_url)?,
                certificate_url,
            )),
            DrmKind::Uplynk => {
                let license_url = if self.license_url.trim().is_empty() {
                    None
                } else {
                    Some(parse_url("licenseUrl", &self.license_url)?)
                };
                Ok(DrmConfig::uplynk(license_url, certificate_url))
            }
        }
    }
}

/// A stream that can be cached for offline playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub title: String,
    #[serde(default)]
    pub poster_url: String,
    pub url: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub drm: Option<StreamDrm>,
}

fn default_mime_type() -> String {
    "application/x-mpegURL".to_string()
}

impl Stream {
    pub fn drm_config(&self) -> Result<Option<DrmConfig>> {
        self.drm.as_ref().map(StreamDrm::config).transpose()
    }

    /// Player source for this stream
    pub fn source(&self) -> Result<SourceDescription> {
        let mut source = SourceDescription::hls(parse_url("url", &self.url)?);
        source.mime_type = self.mime_type.clone();
        if let Some(poster) = optional_url(&self.poster_url) {
            source = source.with_poster(poster);
        }
        if let Some(drm) = self.drm_config()? {
            source = source.with_drm(drm);
        }
        Ok(source)
    }
}

/// Parse a JSON array of streams
pub fn streams_from_json(text: &str) -> Result<Vec<Stream>> {
    serde_json::from_str(text).map_err(|e| Error::CatalogParse(e.to_string()))
}

/// Read a stream list from disk
pub fn load_streams(path: impl AsRef<Path>) -> Result<Vec<Stream>> {
    let path = path.as_ref();
    let streams = streams_from_json(&std::fs::read_to_string(path)?)?;
    debug!(path = %path.display(), streams = streams.len(), "Stream list loaded");
    Ok(streams)
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::CatalogParse(format!("Invalid {} '{}': {}", field, value, e)))
}

// Posters are decoration; a blank or malformed one is simply left out.
fn optional_url(value: &str) -> Option<Url> {
    if value.trim().is_empty() {
        return None;
    }
    Url::parse(value).ok()
}
