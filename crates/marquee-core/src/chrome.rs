//! Chrome overlay: visibility, auto-hide countdown and scrub bar
//!
//! The overlay is a plain value driven by the controller. Time is passed
//! in explicitly so hosts can drive it from any clock.

use crate::presentation::Affordances;
use crate::types::{ChromeConfig, PresentationState};
use std::time::{Duration, Instant};
use tracing::debug;

/// Format a playhead position as `mm:ss`, or `hh:mm:ss` for long content
pub fn format_clock(seconds: f64, over_hour: bool) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if over_hour {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Chrome overlay state
#[derive(Debug, Clone)]
pub struct ChromeOverlay {
    auto_hide: Duration,
    state: PresentationState,
    visible: bool,
    hide_at: Option<Instant>,
    scrubbing: bool,
    scrub_value: f64,
    duration: f64,
    current_time: f64,
}

impl ChromeOverlay {
    pub fn new(config: &ChromeConfig) -> Self {
        Self {
            auto_hide: config.auto_hide(),
            state: PresentationState::Initial,
            visible: true,
            hide_at: None,
            scrubbing: false,
            scrub_value: 0.0,
            duration: 0.0,
            current_time: 0.0,
        }
    }

    /// Apply the affordances of a new presentation state
    pub fn set_state(&mut self, state: PresentationState, now: Instant) {
        self.state = state;
        self.hide_at = None;

        let affordances = Affordances::for_state(state);
        if state == PresentationState::Initial {
            self.current_time = 0.0;
            self.scrubbing = false;
        }
        if !affordances.scrub_enabled {
            self.scrubbing = false;
        }
        if affordances.auto_hide {
            self.arm(now);
        } else {
            self.visible = true;
        }
    }

    /// A control was used: show the chrome and restart the countdown
    pub fn interact(&mut self, now: Instant) {
        self.visible = true;
        self.hide_at = None;
        if self.affordances().auto_hide && !self.scrubbing {
            self.arm(now);
        }
    }

    /// Tap on an empty area of the chrome
    ///
    /// Toggles visibility only while content or an ad is playing; in every
    /// other state the chrome stays on. Returns true if visibility changed.
    pub fn tap_background(&mut self, now: Instant) -> bool {
        if !self.affordances().auto_hide {
            return false;
        }
        if self.visible {
            self.visible = false;
            self.hide_at = None;
        } else {
            self.interact(now);
        }
        true
    }

    /// Start dragging the scrub bar; returns false if scrubbing is disabled
    pub fn begin_scrub(&mut self, value: f64) -> bool {
        if !self.affordances().scrub_enabled {
            return false;
        }
        self.scrubbing = true;
        self.scrub_value = self.clamp_scrub(value);
        self.visible = true;
        self.hide_at = None;
        true
    }

    /// Move the scrub thumb; only the label follows, not the playhead
    pub fn scrub_to(&mut self, value: f64) {
        if self.scrubbing {
            self.scrub_value = self.clamp_scrub(value);
        }
    }

    /// Release the scrub bar and return the seek target
    pub fn end_scrub(&mut self, now: Instant) -> Option<f64> {
        if !self.scrubbing {
            return None;
        }
        self.scrubbing = false;
        self.interact(now);
        Some(self.scrub_value)
    }

    /// Hide the chrome if its countdown expired; returns true on change
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(deadline) if now >= deadline => {
                self.hide_at = None;
                self.visible = false;
                debug!(state = %self.state, "Chrome auto-hidden");
                true
            }
            _ => false,
        }
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    /// Update the displayed playhead; ignored while the user drags
    pub fn set_current_time(&mut self, time: f64) {
        if !self.scrubbing {
            self.current_time = time;
        }
    }

    /// `"<current> / <duration>"`, showing the drag position while scrubbing
    pub fn progress_label(&self) -> String {
        let over_hour = self.duration / 3600.0 >= 1.0;
        let shown = if self.scrubbing {
            self.scrub_value
        } else {
            self.current_time
        };
        format!(
            "{} / {}",
            format_clock(shown, over_hour),
            format_clock(self.duration, over_hour)
        )
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn affordances(&self) -> Affordances {
        Affordances::for_state(self.state)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    fn clamp_scrub(&self, value: f64) -> f64 {
        value.clamp(0.0, self.duration.max(0.0))
    }

    // A countdown past the end of `Instant` never expires.
    fn arm(&mut self, now: Instant) {
        self.hide_at = now.checked_add(self.auto_hide);
    }
}
