//! Presentation state machine
//!
//! Maps the player's lifecycle events onto the six chrome states. The
//! mapping is a total function of `(state, event, status)`: every
//! combination has an outcome, and combinations without a row in the
//! table below are no-ops.
//!
//! ```text
//!  SourceChange ──────────────────────────────► Initial
//!  Play         (state == Initial) ───────────► Buffering
//!  Play         (ad playing) ─────────────────► AdPlaying
//!  Playing ───────────────────────────────────► Playing
//!  Pause        (state != Initial, ad) ───────► AdPaused
//!  Pause        (state != Initial, no ad) ────► Paused
//!  Waiting ───────────────────────────────────► Buffering
//!  ReadyStateChange(enough data) ─────────────► Paused | Playing
//!  AdBreakBegin ──────────────────────────────► AdPlaying
//!  Ended ─────────────────────────────────────► (restart effect)
//!  TimeUpdate   (not seeking) ────────────────► (show current time)
//!  DurationChange (finite, normal) ───────────► (show duration)
//! ```

use crate::types::{PlaybackEvent, PlayerStatus, PresentationState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Stop the player and set the same source again
    Restart,
    /// Update the displayed playhead
    ShowCurrentTime { time: f64 },
    /// Update the displayed duration
    ShowDuration { duration: f64 },
}

/// Outcome of feeding one event to the machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State after the event
    pub state: PresentationState,
    /// Effect the host must carry out, if any
    pub effect: Option<Effect>,
}

impl Transition {
    pub fn to(state: PresentationState) -> Self {
        Self { state, effect: None }
    }

    fn stay(state: PresentationState, effect: Effect) -> Self {
        Self {
            state,
            effect: Some(effect),
        }
    }
}

/// Derive the next state from the current one
///
/// A `Pause` before the first play is ignored: the platform pauses the
/// player when the app is backgrounded, and that must not make a
/// never-started player look paused.
pub fn transition(
    state: PresentationState,
    event: &PlaybackEvent,
    status: &PlayerStatus,
) -> Transition {
    use PresentationState::*;

    match event {
        PlaybackEvent::SourceChange => Transition::to(Initial),
        PlaybackEvent::Play if status.ad_playing => Transition::to(AdPlaying),
        PlaybackEvent::Play if state == Initial => Transition::to(Buffering),
        PlaybackEvent::Playing => Transition::to(Playing),
        PlaybackEvent::Pause if state == Initial => Transition::to(state),
        PlaybackEvent::Pause if status.ad_playing => Transition::to(AdPaused),
        PlaybackEvent::Pause => Transition::to(Paused),
        PlaybackEvent::Waiting => Transition::to(Buffering),
        PlaybackEvent::ReadyStateChange {
            has_enough_data: true,
        } => Transition::to(if status.paused { Paused } else { Playing }),
        PlaybackEvent::AdBreakBegin => Transition::to(AdPlaying),
        PlaybackEvent::Ended => Transition::stay(state, Effect::Restart),
        PlaybackEvent::TimeUpdate {
            current_time,
            is_seeking,
        } if !(*is_seeking || status.seeking) => {
            Transition::stay(state, Effect::ShowCurrentTime { time: *current_time })
        }
        PlaybackEvent::DurationChange {
            duration: Some(duration),
        } if duration.is_normal() => Transition::stay(state, Effect::ShowDuration { duration: *duration }),
        _ => Transition::to(state),
    }
}

/// Which chrome affordances are visible/enabled in a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordances {
    /// Chrome cannot be hidden in this state
    pub forced_visible: bool,
    pub spinner: bool,
    pub play_button: bool,
    pub pause_button: bool,
    pub skip_buttons: bool,
    pub footer: bool,
    pub scrub_enabled: bool,
    /// Entering this state arms the auto-hide countdown
    pub auto_hide: bool,
}

impl Affordances {
    const HIDDEN: Affordances = Affordances {
        forced_visible: false,
        spinner: false,
        play_button: false,
        pause_button: false,
        skip_buttons: false,
        footer: false,
        scrub_enabled: true,
        auto_hide: false,
    };

    /// Static visibility table
    pub fn for_state(state: PresentationState) -> Self {
        let base = Self::HIDDEN;
        match state {
            PresentationState::Initial => Self {
                forced_visible: true,
                play_button: true,
                ..base
            },
            PresentationState::Buffering => Self {
                forced_visible: true,
                spinner: true,
                skip_buttons: true,
                footer: true,
                ..base
            },
            PresentationState::Playing => Self {
                pause_button: true,
                skip_buttons: true,
                footer: true,
                auto_hide: true,
                ..base
            },
            PresentationState::Paused => Self {
                play_button: true,
                skip_buttons: true,
                footer: true,
                ..base
            },
            PresentationState::AdPlaying => Self {
                pause_button: true,
                footer: true,
                scrub_enabled: false,
                auto_hide: true,
                ..base
            },
            PresentationState::AdPaused => Self {
                play_button: true,
                footer: true,
                scrub_enabled: false,
                ..base
            },
        }
    }
}

/// Holds the current presentation state and applies events to it
#[derive(Debug, Default)]
pub struct PresentationMachine {
    state: PresentationState,
}

impl PresentationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> PresentationState {
        self.state
    }

    /// Force the machine back to `Initial` (view re-attached)
    pub fn reset(&mut self) {
        self.state = PresentationState::Initial;
    }

    /// Apply one event; returns the transition that was taken
    pub fn apply(&mut self, event: &PlaybackEvent, status: &PlayerStatus) -> Transition {
        let from = self.state;
        let outcome = transition(from, event, status);

        if outcome.state != from {
            info!(from = %from, to = %outcome.state, event = %event.kind(), "State transition");
        } else {
            debug!(state = %from, event = %event.kind(), effect = ?outcome.effect, "Event handled");
        }

        self.state = outcome.state;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PresentationState::*;

    const IDLE: PlayerStatus = PlayerStatus {
        paused: false,
        ad_playing: false,
        seeking: false,
    };
    const AD: PlayerStatus = PlayerStatus {
        paused: false,
        ad_playing: true,
        seeking: false,
    };

    #[test]
    fn test_play_during_ad_shows_ad_state() {
        assert_eq!(transition(Initial, &PlaybackEvent::Play, &IDLE).state, Buffering);
        assert_eq!(transition(Initial, &PlaybackEvent::Play, &AD).state, AdPlaying);
        assert_eq!(transition(Paused, &PlaybackEvent::Play, &AD).state, AdPlaying);
        assert_eq!(transition(Paused, &PlaybackEvent::Play, &IDLE).state, Paused);
    }

    #[test]
    fn test_player_seeking_hides_time_updates() {
        let update = PlaybackEvent::TimeUpdate { current_time: 9.0, is_seeking: false };
        let seeking = PlayerStatus { seeking: true, ..IDLE };
        assert_eq!(transition(Playing, &update, &seeking), Transition::to(Playing));
        assert_eq!(
            transition(Playing, &update, &IDLE).effect,
            Some(Effect::ShowCurrentTime { time: 9.0 })
        );
    }

    #[test]
    fn test_ready_state_restores_icons() {
        let paused = PlayerStatus { paused: true, ..IDLE };
        let ready = PlaybackEvent::ReadyStateChange { has_enough_data: true };
        assert_eq!(transition(Buffering, &ready, &paused).state, Paused);
        assert_eq!(transition(Buffering, &ready, &IDLE).state, Playing);

        let not_ready = PlaybackEvent::ReadyStateChange { has_enough_data: false };
        assert_eq!(transition(Buffering, &not_ready, &IDLE).state, Buffering);
    }

    #[test]
    fn test_duration_must_be_normal() {
        for bad in [None, Some(0.0), Some(f64::NAN), Some(f64::INFINITY)] {
            let t = transition(Playing, &PlaybackEvent::DurationChange { duration: bad }, &IDLE);
            assert_eq!(t, Transition { state: Playing, effect: None });
        }
        let t = transition(Playing, &PlaybackEvent::DurationChange { duration: Some(596.5) }, &IDLE);
        assert_eq!(t.effect, Some(Effect::ShowDuration { duration: 596.5 }));
    }

    #[test]
    fn test_errors_do_not_change_state() {
        let error = PlaybackEvent::Error { message: "network".into() };
        for state in PresentationState::ALL {
            assert_eq!(transition(state, &error, &IDLE), Transition::to(state));
        }
    }

    #[test]
    fn test_affordance_table() {
        let ad = Affordances::for_state(AdPlaying);
        assert!(!ad.scrub_enabled);
        assert!(!ad.skip_buttons);
        assert!(ad.auto_hide);

        let buffering = Affordances::for_state(Buffering);
        assert!(buffering.spinner && buffering.forced_visible);
        assert!(!buffering.auto_hide);

        assert!(Affordances::for_state(Initial).play_button);
        assert!(Affordances::for_state(Playing).pause_button);
    }

    #[test]
    fn test_machine_apply() {
        let mut machine = PresentationMachine::new();
        assert_eq!(machine.state(), Initial);
        machine.apply(&PlaybackEvent::Play, &IDLE);
        assert_eq!(machine.state(), Buffering);
        machine.reset();
        assert_eq!(machine.state(), Initial);
    }
}
