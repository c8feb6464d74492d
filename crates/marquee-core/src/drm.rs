//! DRM - license provider configuration and the renewal seam
//!
//! Cached DRM content keeps a persistent license that must be renewed
//! periodically. The actual key exchange happens inside the player; this
//! module only describes where licenses come from and defines the
//! [`LicenseRenewer`] collaborator the scheduler calls into.

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// DRM configuration for a content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum DrmConfig {
    /// EZDRM FairPlay
    EzDrm {
        license_url: Url,
        certificate_url: Url,
    },
    /// Uplynk FairPlay; the license URL may be derived by the player
    Uplynk {
        license_url: Option<Url>,
        certificate_url: Url,
    },
}

impl DrmConfig {
    /// Create an EZDRM configuration
    pub fn ezdrm(license_url: Url, certificate_url: Url) -> Self {
        DrmConfig::EzDrm {
            license_url,
            certificate_url,
        }
    }

    /// Create an Uplynk configuration
    pub fn uplynk(license_url: Option<Url>, certificate_url: Url) -> Self {
        DrmConfig::Uplynk {
            license_url,
            certificate_url,
        }
    }

    /// License acquisition URL, if one is configured
    pub fn license_url(&self) -> Option<&Url> {
        match self {
            DrmConfig::EzDrm { license_url, .. } => Some(license_url),
            DrmConfig::Uplynk { license_url, .. } => license_url.as_ref(),
        }
    }

    /// FairPlay application certificate URL
    pub fn certificate_url(&self) -> &Url {
        match self {
            DrmConfig::EzDrm { certificate_url, .. } | DrmConfig::Uplynk { certificate_url, .. } => {
                certificate_url
            }
        }
    }

    /// Provider name for logs
    pub fn provider(&self) -> &'static str {
        match self {
            DrmConfig::EzDrm { .. } => "ezdrm",
            DrmConfig::Uplynk { .. } => "uplynk",
        }
    }
}

/// Renews the persisted license of a cached content item
///
/// Renewal is fire-and-forget: the scheduler never looks at the outcome.
/// Failures are the implementation's to report.
pub trait LicenseRenewer: Send + Sync {
    fn renew(&self, content_key: &str, drm: &DrmConfig);
}

/// Renewer that only logs, for dry runs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenewer;

impl LicenseRenewer for LogRenewer {
    fn renew(&self, content_key: &str, drm: &DrmConfig) {
        info!(
            content = content_key,
            provider = drm.provider(),
            license_url = drm.license_url().map(Url::as_str).unwrap_or("-"),
            "License renewed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_drm_config() {
        let config = DrmConfig::ezdrm(
            url("https://fps.ezdrm.com/api/licenses/abc"),
            url("https://fps.ezdrm.com/demo/video/eleisure.cer"),
        );
        assert_eq!(config.provider(), "ezdrm");
        assert!(config.license_url().is_some());

        let config = DrmConfig::uplynk(None, url("https://content.uplynk.com/fairplay.cer"));
        assert!(config.license_url().is_none());
        assert_eq!(config.certificate_url().as_str(), "https://content.uplynk.com/fairplay.cer");
    }

    #[test]
    fn test_drm_config_serde() {
        let json = r#"{"provider":"uplynk","license_url":null,"certificate_url":"https://c.example.com/a.cer"}"#;
        let config: DrmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.provider(), "uplynk");
    }
}
