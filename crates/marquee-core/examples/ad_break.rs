//! Controller example
//!
//! Drives a player controller through a pre-roll ad and into content
//! playback using a scripted in-memory player.
//!
//! Run with: cargo run -p marquee-core --example ad_break

use marquee_core::{
    Affordances, ChromeConfig, EventKind, Integration, Listener, ListenerId, PlaybackEvent, Player,
    PlayerChrome, PlayerController, PlayerSetup, PlayerStatus, PresentationState, SourceDescription,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Default)]
struct ScriptedPlayer {
    status: Mutex<PlayerStatus>,
    listeners: Mutex<HashMap<(EventKind, u64), Listener>>,
    next_id: Mutex<u64>,
}

impl ScriptedPlayer {
    fn emit(&self, event: PlaybackEvent, status: PlayerStatus) {
        *self.status.lock().unwrap() = status;
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|((kind, _), _)| *kind == event.kind())
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl Player for ScriptedPlayer {
    fn status(&self) -> PlayerStatus {
        *self.status.lock().unwrap()
    }
    fn current_time(&self) -> f64 {
        0.0
    }
    fn duration(&self) -> Option<f64> {
        Some(596.0)
    }
    fn has_source(&self) -> bool {
        false
    }
    fn play(&self) {}
    fn pause(&self) {}
    fn stop(&self) {}
    fn set_source(&self, source: SourceDescription) {
        println!("  player: source set to {}", source.src);
    }
    fn set_current_time(&self, _time: f64) {}
    fn add_integration(&self, integration: Integration) {
        println!("  player: integration {:?}", integration);
    }
    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.listeners.lock().unwrap().insert((kind, *next), listener);
        ListenerId(*next)
    }
    fn remove_listener(&self, kind: EventKind, id: ListenerId) {
        self.listeners.lock().unwrap().remove(&(kind, id.0));
    }
}

struct ConsoleChrome;

impl PlayerChrome for ConsoleChrome {
    fn set_state(&mut self, state: PresentationState, affordances: &Affordances) {
        println!(
            "  chrome: {:<11} play={} pause={} skip={} scrub={}",
            state.to_string(),
            affordances.play_button,
            affordances.pause_button,
            affordances.skip_buttons,
            affordances.scrub_enabled
        );
    }

    fn set_progress(&mut self, _current_time: f64, label: &str) {
        println!("  chrome: {}", label);
    }
}

#[tokio::main]
async fn main() {
    println!("Marquee Core - Ad Break Example");
    println!("===============================\n");

    let source = SourceDescription::hls(
        Url::parse("https://cdn.theoplayer.com/video/big_buck_bunny/big_buck_bunny_metadata.m3u8").unwrap(),
    );
    let setup = PlayerSetup::new(source).with_integration(Integration::GoogleIma);
    let mut controller = PlayerController::new(setup, ChromeConfig::default(), ConsoleChrome);

    let player = Arc::new(ScriptedPlayer::default());
    let mut rx = controller.attach(player.clone());

    let content = PlayerStatus::default();
    let ad = PlayerStatus {
        ad_playing: true,
        ..content
    };
    let script = [
        (PlaybackEvent::Play, content),
        (PlaybackEvent::AdBreakBegin, ad),
        (PlaybackEvent::Pause, PlayerStatus { paused: true, ..ad }),
        (PlaybackEvent::Play, ad),
        (PlaybackEvent::AdBreakEnd, content),
        (PlaybackEvent::DurationChange { duration: Some(596.0) }, content),
        (PlaybackEvent::Playing, content),
        (PlaybackEvent::TimeUpdate { current_time: 65.0, is_seeking: false }, content),
    ];

    for (event, status) in script {
        println!("{}", event.kind());
        player.emit(event, status);
        while let Ok(event) = rx.try_recv() {
            if let Err(e) = controller.handle_event(&event) {
                eprintln!("  error: {}", e);
            }
        }
    }

    println!("\nFinal state: {}", controller.state());
    controller.detach();
}
