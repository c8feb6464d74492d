//! Core types for Marquee

use crate::drm::DrmConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Presentation states of the player chrome
///
/// Exactly one state is active at a time and it decides which controls
/// (spinner, play/pause, skip, scrub bar, footer) are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationState {
    /// Source set, playback never started
    Initial,
    /// Waiting for enough data
    Buffering,
    /// Content is playing
    Playing,
    /// Content is paused
    Paused,
    /// An ad break is playing
    AdPlaying,
    /// An ad break is paused
    AdPaused,
}

impl PresentationState {
    /// Every state, in declaration order
    pub const ALL: [PresentationState; 6] = [
        PresentationState::Initial,
        PresentationState::Buffering,
        PresentationState::Playing,
        PresentationState::Paused,
        PresentationState::AdPlaying,
        PresentationState::AdPaused,
    ];

    /// Returns true for the two ad states
    pub fn is_ad(&self) -> bool {
        matches!(self, PresentationState::AdPlaying | PresentationState::AdPaused)
    }
}

impl Default for PresentationState {
    fn default() -> Self {
        PresentationState::Initial
    }
}

impl std::fmt::Display for PresentationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresentationState::Initial => write!(f, "initial"),
            PresentationState::Buffering => write!(f, "buffering"),
            PresentationState::Playing => write!(f, "playing"),
            PresentationState::Paused => write!(f, "paused"),
            PresentationState::AdPlaying => write!(f, "ad_playing"),
            PresentationState::AdPaused => write!(f, "ad_paused"),
        }
    }
}

/// Player and ad lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Play was requested
    Play,
    /// Playback actually progressing
    Playing,
    /// Playback paused
    Pause,
    /// Playback reached the end of the content
    Ended,
    /// Not enough data to continue
    Waiting,
    /// Ready state changed
    ReadyStateChange {
        has_enough_data: bool,
    },
    /// A new source was set
    SourceChange,
    /// Content duration changed
    DurationChange {
        duration: Option<f64>,
    },
    /// Periodic playhead update
    TimeUpdate {
        current_time: f64,
        is_seeking: bool,
    },
    /// An ad break started
    AdBreakBegin,
    /// An ad break finished
    AdBreakEnd,
    /// Player reported an error
    Error {
        message: String,
    },
    /// Inline/fullscreen/picture-in-picture switch
    PresentationModeChange {
        mode: String,
    },
}

impl PlaybackEvent {
    /// The subscription kind that delivers this event
    pub fn kind(&self) -> EventKind {
        match self {
            PlaybackEvent::Play => EventKind::Play,
            PlaybackEvent::Playing => EventKind::Playing,
            PlaybackEvent::Pause => EventKind::Pause,
            PlaybackEvent::Ended => EventKind::Ended,
            PlaybackEvent::Waiting => EventKind::Waiting,
            PlaybackEvent::ReadyStateChange { .. } => EventKind::ReadyStateChange,
            PlaybackEvent::SourceChange => EventKind::SourceChange,
            PlaybackEvent::DurationChange { .. } => EventKind::DurationChange,
            PlaybackEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
            PlaybackEvent::AdBreakBegin => EventKind::AdBreakBegin,
            PlaybackEvent::AdBreakEnd => EventKind::AdBreakEnd,
            PlaybackEvent::Error { .. } => EventKind::Error,
            PlaybackEvent::PresentationModeChange { .. } => EventKind::PresentationModeChange,
        }
    }
}

/// Event kinds a player can be subscribed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Play,
    Playing,
    Pause,
    Ended,
    Waiting,
    ReadyStateChange,
    SourceChange,
    DurationChange,
    TimeUpdate,
    AdBreakBegin,
    AdBreakEnd,
    Error,
    PresentationModeChange,
}

impl EventKind {
    /// The fixed set of kinds a controller subscribes to on attach
    pub const ALL: [EventKind; 13] = [
        EventKind::Play,
        EventKind::Playing,
        EventKind::Pause,
        EventKind::Ended,
        EventKind::Waiting,
        EventKind::ReadyStateChange,
        EventKind::SourceChange,
        EventKind::DurationChange,
        EventKind::TimeUpdate,
        EventKind::AdBreakBegin,
        EventKind::AdBreakEnd,
        EventKind::Error,
        EventKind::PresentationModeChange,
    ];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Play => "play",
            EventKind::Playing => "playing",
            EventKind::Pause => "pause",
            EventKind::Ended => "ended",
            EventKind::Waiting => "waiting",
            EventKind::ReadyStateChange => "readystatechange",
            EventKind::SourceChange => "sourcechange",
            EventKind::DurationChange => "durationchange",
            EventKind::TimeUpdate => "timeupdate",
            EventKind::AdBreakBegin => "adbreakbegin",
            EventKind::AdBreakEnd => "adbreakend",
            EventKind::Error => "error",
            EventKind::PresentationModeChange => "presentationmodechange",
        };
        write!(f, "{}", name)
    }
}

/// Player properties read at the moment an event is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    /// Player reports itself paused
    #[serde(default)]
    pub paused: bool,
    /// An ad is currently playing
    #[serde(default)]
    pub ad_playing: bool,
    /// A seek is in progress
    #[serde(default)]
    pub seeking: bool,
}

/// Caching task status as reported by the offline cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingStatus {
    Idle,
    Loading,
    Done,
    Error,
    Evicted,
}

impl std::fmt::Display for CachingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachingStatus::Idle => write!(f, "idle"),
            CachingStatus::Loading => write!(f, "loading"),
            CachingStatus::Done => write!(f, "done"),
            CachingStatus::Error => write!(f, "error"),
            CachingStatus::Evicted => write!(f, "evicted"),
        }
    }
}

/// Read-only view of a caching task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachingTaskSnapshot {
    pub status: CachingStatus,
    /// Completion ratio in [0, 1]
    pub percentage: f64,
}

impl CachingTaskSnapshot {
    pub fn new(status: CachingStatus, percentage: f64) -> Self {
        Self { status, percentage }
    }

    /// Completion ratio, with non-finite values read as zero
    pub fn progress(&self) -> f64 {
        if self.percentage.is_finite() {
            self.percentage.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn is_cached(&self) -> bool {
        self.status == CachingStatus::Done
    }

    pub fn is_evicted(&self) -> bool {
        self.status == CachingStatus::Evicted
    }
}

/// Source handed to the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescription {
    /// Stream URL
    pub src: Url,
    /// MIME type (e.g. `application/x-mpegURL`)
    pub mime_type: String,
    /// Poster image
    pub poster: Option<Url>,
    /// DRM configuration for protected streams
    pub drm: Option<DrmConfig>,
}

impl SourceDescription {
    /// Create an HLS source without DRM
    pub fn hls(src: Url) -> Self {
        Self {
            src,
            mime_type: "application/x-mpegURL".to_string(),
            poster: None,
            drm: None,
        }
    }

    pub fn with_poster(mut self, poster: Url) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn with_drm(mut self, drm: DrmConfig) -> Self {
        self.drm = Some(drm);
        self
    }

    /// Key under which renewal records for this source are stored
    pub fn content_key(&self) -> &str {
        self.src.as_str()
    }
}

/// Canonical form of a content key: the parsed source URL, or the text as
/// given when it is not a URL
pub fn normalize_content_key(key: &str) -> Cow<'_, str> {
    match Url::parse(key) {
        Ok(url) if url.as_str() != key => Cow::Owned(url.into()),
        _ => Cow::Borrowed(key),
    }
}

/// Third-party integrations a player can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    /// Client-side ad insertion
    GoogleIma,
    /// Cast sender
    GoogleCast,
    /// Server-side ad insertion
    VerizonMedia,
}

// =============================================================================
// Configuration
// =============================================================================

/// Player chrome configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeConfig {
    /// Seconds of inactivity before the chrome hides while playing
    pub auto_hide_secs: f64,
    /// Seconds jumped by the skip buttons
    pub skip_step_secs: f64,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            auto_hide_secs: 5.0,
            skip_step_secs: 10.0,
        }
    }
}

impl ChromeConfig {
    /// Longest accepted auto-hide delay
    pub const MAX_AUTO_HIDE_SECS: f64 = 3600.0;

    /// Auto-hide delay; values no `Duration` can hold never hide
    pub fn auto_hide(&self) -> Duration {
        Duration::try_from_secs_f64(self.auto_hide_secs).unwrap_or(Duration::MAX)
    }
}

/// License renewal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewalConfig {
    /// Seconds between two renewals of the same license
    pub interval_secs: u64,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            interval_secs: 86_400,
        }
    }
}

impl RenewalConfig {
    /// Longest accepted renewal interval (one year)
    pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

    /// Renewal interval, saturating at the largest `TimeDelta`
    pub fn interval(&self) -> chrono::Duration {
        saturating_seconds(self.interval_secs)
    }
}

/// Offline caching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Expiry applied to new caching tasks
    pub cache_expiry_secs: u64,
    /// Only download while on Wi-Fi
    pub wifi_only_download: bool,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_expiry_secs: 7 * 24 * 60 * 60,
            wifi_only_download: false,
        }
    }
}

impl OfflineConfig {
    /// Longest accepted cache expiry (one year)
    pub const MAX_CACHE_EXPIRY_SECS: u64 = 365 * 24 * 60 * 60;

    /// Cache expiry, saturating at the largest `TimeDelta`
    pub fn cache_expiry(&self) -> chrono::Duration {
        saturating_seconds(self.cache_expiry_secs)
    }
}

fn saturating_seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarqueeConfig {
    pub chrome: ChromeConfig,
    pub renewal: RenewalConfig,
    pub offline: OfflineConfig,
}

impl MarqueeConfig {
    /// Load configuration from a JSON file; absent fields take defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: MarqueeConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler and chrome cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(1..=RenewalConfig::MAX_INTERVAL_SECS).contains(&self.renewal.interval_secs) {
            return Err(Error::InvalidConfig(format!(
                "renewal.interval_secs must be between 1 and {}",
                RenewalConfig::MAX_INTERVAL_SECS
            )));
        }
        let auto_hide = self.chrome.auto_hide_secs;
        if !(auto_hide > 0.0 && auto_hide <= ChromeConfig::MAX_AUTO_HIDE_SECS) {
            return Err(Error::InvalidConfig(format!(
                "chrome.auto_hide_secs must be positive and at most {}",
                ChromeConfig::MAX_AUTO_HIDE_SECS
            )));
        }
        if !(self.chrome.skip_step_secs.is_finite() && self.chrome.skip_step_secs > 0.0) {
            return Err(Error::InvalidConfig("chrome.skip_step_secs must be positive".into()));
        }
        if !(1..=OfflineConfig::MAX_CACHE_EXPIRY_SECS).contains(&self.offline.cache_expiry_secs) {
            return Err(Error::InvalidConfig(format!(
                "offline.cache_expiry_secs must be between 1 and {}",
                OfflineConfig::MAX_CACHE_EXPIRY_SECS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tagging() {
        let event: PlaybackEvent =
            serde_json::from_str(r#"{"event":"time_update","current_time":12.5,"is_seeking":false}"#)
                .unwrap();
        assert_eq!(
            event,
            PlaybackEvent::TimeUpdate { current_time: 12.5, is_seeking: false }
        );
        assert_eq!(event.kind(), EventKind::TimeUpdate);
    }

    #[test]
    fn test_normalize_content_key() {
        let source = SourceDescription::hls(Url::parse("HTTPS://CDN.Example.com").unwrap());
        assert_eq!(source.content_key(), "https://cdn.example.com/");
        assert_eq!(normalize_content_key("HTTPS://CDN.Example.com"), source.content_key());
        assert!(matches!(
            normalize_content_key("https://cdn.example.com/a.m3u8"),
            Cow::Borrowed(_)
        ));
        assert_eq!(normalize_content_key("not a url"), "not a url");
    }

    #[test]
    fn test_snapshot_progress() {
        assert_eq!(CachingTaskSnapshot::new(CachingStatus::Loading, f64::NAN).progress(), 0.0);
        assert_eq!(CachingTaskSnapshot::new(CachingStatus::Loading, 0.25).progress(), 0.25);
    }

    #[test]
    fn test_config_partial_json() {
        let config: MarqueeConfig =
            serde_json::from_str(r#"{"renewal":{"interval_secs":3600}}"#).unwrap();
        assert_eq!(config.renewal.interval_secs, 3600);
        assert_eq!(config.chrome.auto_hide_secs, 5.0);
        assert!(config.validate().is_ok());

        let mut bad = MarqueeConfig::default();
        bad.renewal.interval_secs = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_upper_bounds() {
        let mut config = MarqueeConfig::default();
        config.renewal.interval_secs = 10_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = MarqueeConfig::default();
        config.chrome.auto_hide_secs = 1e30;
        assert!(config.validate().is_err());
        config.chrome.auto_hide_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = MarqueeConfig::default();
        config.offline.cache_expiry_secs = 10_000_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = MarqueeConfig::default();
        config.renewal.interval_secs = RenewalConfig::MAX_INTERVAL_SECS;
        config.offline.cache_expiry_secs = OfflineConfig::MAX_CACHE_EXPIRY_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_durations_saturate() {
        let renewal = RenewalConfig { interval_secs: u64::MAX };
        assert_eq!(renewal.interval(), chrono::Duration::MAX);

        let offline = OfflineConfig {
            cache_expiry_secs: 10_000_000_000_000_000,
            ..OfflineConfig::default()
        };
        assert_eq!(offline.cache_expiry(), chrono::Duration::MAX);

        let chrome = ChromeConfig {
            auto_hide_secs: 1e30,
            ..ChromeConfig::default()
        };
        assert_eq!(chrome.auto_hide(), Duration::MAX);
    }
}
