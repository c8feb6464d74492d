//! Player controller - binds a player, the presentation machine and a chrome
//!
//! Coordinates:
//! - Event subscription on attach, released as a unit on detach
//! - State machine transitions and their effects (restart on end)
//! - Chrome updates (state, playhead, duration, visibility)
//! - User interactions forwarded to the player

use crate::{
    chrome::ChromeOverlay,
    presentation::{Affordances, Effect, PresentationMachine, Transition},
    types::*,
    Error, Result,
};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Callback registered with a player for one event kind
pub type Listener = Arc<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Handle returned by [`Player::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The playback engine being presented
pub trait Player: Send + Sync {
    /// Snapshot of paused / ad playing / seeking
    fn status(&self) -> PlayerStatus;
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn has_source(&self) -> bool;
    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    fn set_source(&self, source: SourceDescription);
    fn set_current_time(&self, time: f64);
    fn add_integration(&self, integration: Integration);
    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId;
    fn remove_listener(&self, kind: EventKind, id: ListenerId);
}

/// Display driven by the controller
pub trait PlayerChrome {
    fn set_state(&mut self, state: PresentationState, affordances: &Affordances);

    fn set_duration(&mut self, _duration: f64) {}

    /// Playhead position and the formatted progress label
    fn set_progress(&mut self, _current_time: f64, _label: &str) {}

    fn set_visible(&mut self, _visible: bool) {}
}

/// Listener registration that is removed from the player when dropped
pub struct Subscription {
    player: Weak<dyn Player>,
    kind: EventKind,
    id: ListenerId,
}

impl Subscription {
    pub fn new(player: &Arc<dyn Player>, kind: EventKind, id: ListenerId) -> Self {
        Self {
            player: Arc::downgrade(player),
            kind,
            id,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(player) = self.player.upgrade() {
            player.remove_listener(self.kind, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

/// What a controller plays and which integrations it needs
#[derive(Debug, Clone)]
pub struct PlayerSetup {
    pub source: SourceDescription,
    pub integrations: Vec<Integration>,
}

impl PlayerSetup {
    pub fn new(source: SourceDescription) -> Self {
        Self {
            source,
            integrations: Vec::new(),
        }
    }

    pub fn with_integration(mut self, integration: Integration) -> Self {
        if !self.integrations.contains(&integration) {
            self.integrations.push(integration);
        }
        self
    }
}

/// Player handle that may not exist yet
#[derive(Debug)]
pub enum PlayerSlot<P> {
    NotReady,
    Ready(Arc<P>),
}

impl<P> PlayerSlot<P> {
    /// The attached player, or `Error::PlayerNotReady`
    pub fn ready(&self) -> Result<&Arc<P>> {
        match self {
            PlayerSlot::Ready(player) => Ok(player),
            PlayerSlot::NotReady => Err(Error::PlayerNotReady),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PlayerSlot::Ready(_))
    }
}

/// Controller presenting one player
pub struct PlayerController<P: Player + 'static, C: PlayerChrome> {
    setup: PlayerSetup,
    config: ChromeConfig,
    slot: PlayerSlot<P>,
    machine: PresentationMachine,
    overlay: ChromeOverlay,
    chrome: C,
    subscriptions: Vec<Subscription>,
}

impl<P: Player + 'static, C: PlayerChrome> PlayerController<P, C> {
    /// Create a detached controller
    pub fn new(setup: PlayerSetup, config: ChromeConfig, chrome: C) -> Self {
        Self {
            overlay: ChromeOverlay::new(&config),
            setup,
            config,
            slot: PlayerSlot::NotReady,
            machine: PresentationMachine::new(),
            chrome,
            subscriptions: Vec::new(),
        }
    }

    /// Attach to a player and return the receiver its events arrive on
    #[instrument(skip(self, player), fields(source = %self.setup.source.src))]
    pub fn attach(&mut self, player: Arc<P>) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        if self.slot.is_ready() {
            self.detach();
        }

        for integration in &self.setup.integrations {
            player.add_integration(*integration);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle: Arc<dyn Player> = player.clone();
        for kind in EventKind::ALL {
            let tx = tx.clone();
            let listener: Listener = Arc::new(move |event: &PlaybackEvent| {
                let _ = tx.send(event.clone());
            });
            let id = handle.add_listener(kind, listener);
            self.subscriptions.push(Subscription::new(&handle, kind, id));
        }

        self.machine.reset();
        self.push_state(now());

        if !player.has_source() {
            player.set_source(self.setup.source.clone());
        }
        self.slot = PlayerSlot::Ready(player);

        info!(
            listeners = self.subscriptions.len(),
            integrations = self.setup.integrations.len(),
            "Player attached"
        );
        rx
    }

    /// Release every subscription and stop the player
    pub fn detach(&mut self) {
        self.subscriptions.clear();
        if let PlayerSlot::Ready(player) = std::mem::replace(&mut self.slot, PlayerSlot::NotReady) {
            player.stop();
            info!("Player detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot.is_ready()
    }

    /// Handle one player event
    pub fn handle_event(&mut self, event: &PlaybackEvent) -> Result<Transition> {
        let player = self.slot.ready()?.clone();

        match event {
            PlaybackEvent::Error { message } => error!(message = %message, "Player error"),
            PlaybackEvent::PresentationModeChange { mode } => debug!(mode = %mode, "Presentation mode changed"),
            _ => {}
        }

        let before = self.machine.state();
        let outcome = self.machine.apply(event, &player.status());
        let now = now();

        if outcome.state != before {
            self.push_state(now);
        }

        match outcome.effect {
            Some(Effect::Restart) => {
                info!("Playback ended, restarting source");
                player.stop();
                player.set_source(self.setup.source.clone());
            }
            Some(Effect::ShowCurrentTime { time }) => {
                self.overlay.set_current_time(time);
                self.push_progress();
            }
            Some(Effect::ShowDuration { duration }) => {
                self.overlay.set_duration(duration);
                self.chrome.set_duration(duration);
                self.push_progress();
            }
            None => {}
        }

        Ok(outcome)
    }

    /// Drain events until every subscription is gone, polling the auto-hide countdown
    pub async fn run(&mut self, mut rx: mpsc::UnboundedReceiver<PlaybackEvent>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(&event) {
                            warn!(error = %e, code = e.error_code(), "Event dropped");
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.poll_chrome(now()),
            }
        }
    }

    /// Hide the chrome if its countdown expired
    pub fn poll_chrome(&mut self, now: Instant) {
        if self.overlay.poll(now) {
            self.chrome.set_visible(false);
        }
    }

    // =========================================================================
    // User interactions
    // =========================================================================

    pub fn play(&mut self) -> Result<()> {
        self.slot.ready()?.play();
        self.interact();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.slot.ready()?.pause();
        self.interact();
        Ok(())
    }

    /// Jump by the configured step, clamped to the content
    pub fn skip(&mut self, forward: bool) -> Result<()> {
        let player = self.slot.ready()?;
        let step = if forward {
            self.config.skip_step_secs
        } else {
            -self.config.skip_step_secs
        };

        let mut target = (player.current_time() + step).max(0.0);
        if let Some(duration) = player.duration().filter(|d| d.is_finite()) {
            target = target.min(duration);
        }

        self.seek(target)
    }

    /// Move the playhead; the player will report waiting/playing on its own
    pub fn seek(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(Error::InvalidSeek { position: time });
        }
        self.slot.ready()?.set_current_time(time);
        self.overlay.set_current_time(time);
        self.push_progress();
        self.interact();
        Ok(())
    }

    /// Tap on an empty area of the chrome
    pub fn tap(&mut self) {
        if self.overlay.tap_background(now()) {
            self.chrome.set_visible(self.overlay.is_visible());
        }
    }

    pub fn begin_scrub(&mut self, value: f64) -> bool {
        let started = self.overlay.begin_scrub(value);
        if started {
            self.chrome.set_visible(true);
        }
        started
    }

    pub fn scrub_to(&mut self, value: f64) {
        self.overlay.scrub_to(value);
        self.push_progress();
    }

    /// Release the scrub bar and seek to where it was dropped
    pub fn end_scrub(&mut self) -> Result<()> {
        match self.overlay.end_scrub(now()) {
            Some(target) => self.seek(target),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> PresentationState {
        self.machine.state()
    }

    pub fn overlay(&self) -> &ChromeOverlay {
        &self.overlay
    }

    pub fn chrome(&self) -> &C {
        &self.chrome
    }

    pub fn setup(&self) -> &PlayerSetup {
        &self.setup
    }

    fn interact(&mut self) {
        let was_visible = self.overlay.is_visible();
        self.overlay.interact(now());
        if !was_visible {
            self.chrome.set_visible(true);
        }
    }

    fn push_state(&mut self, now: Instant) {
        let state = self.machine.state();
        self.overlay.set_state(state, now);
        self.chrome.set_state(state, &self.overlay.affordances());
        self.chrome.set_visible(self.overlay.is_visible());
        self.push_progress();
    }

    fn push_progress(&mut self) {
        let label = self.overlay.progress_label();
        self.chrome.set_progress(self.overlay.current_time(), &label);
    }
}

// Follows tokio's clock so paused-time tests drive the auto-hide countdown.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl<P: Player + 'static, C: PlayerChrome> Drop for PlayerController<P, C> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Default)]
    struct FakeState {
        status: PlayerStatus,
        current_time: f64,
        duration: Option<f64>,
        source: Option<SourceDescription>,
        listeners: HashMap<(EventKind, u64), Listener>,
        next_id: u64,
        calls: Vec<String>,
    }

    #[derive(Default)]
    struct FakePlayer {
        inner: Mutex<FakeState>,
    }

    impl FakePlayer {
        fn emit(&self, event: PlaybackEvent) {
            let listeners: Vec<Listener> = {
                let inner = self.inner.lock().unwrap();
                inner
                    .listeners
                    .iter()
                    .filter(|((kind, _), _)| *kind == event.kind())
                    .map(|(_, l)| l.clone())
                    .collect()
            };
            for listener in listeners {
                listener(&event);
            }
        }

        fn calls(&self) -> Vec<String> {
            self.inner.lock().unwrap().calls.clone()
        }

        fn listener_count(&self) -> usize {
            self.inner.lock().unwrap().listeners.len()
        }

        fn set_status(&self, status: PlayerStatus) {
            self.inner.lock().unwrap().status = status;
        }
    }

    impl Player for FakePlayer {
        fn status(&self) -> PlayerStatus {
            self.inner.lock().unwrap().status
        }
        fn current_time(&self) -> f64 {
            self.inner.lock().unwrap().current_time
        }
        fn duration(&self) -> Option<f64> {
            self.inner.lock().unwrap().duration
        }
        fn has_source(&self) -> bool {
            self.inner.lock().unwrap().source.is_some()
        }
        fn play(&self) {
            self.inner.lock().unwrap().calls.push("play".into());
        }
        fn pause(&self) {
            self.inner.lock().unwrap().calls.push("pause".into());
        }
        fn stop(&self) {
            let mut inner = self.inner.lock().unwrap();
            inner.source = None;
            inner.calls.push("stop".into());
        }
        fn set_source(&self, source: SourceDescription) {
            let mut inner = self.inner.lock().unwrap();
            inner.source = Some(source);
            inner.calls.push("set_source".into());
        }
        fn set_current_time(&self, time: f64) {
            let mut inner = self.inner.lock().unwrap();
            inner.current_time = time;
            inner.calls.push(format!("seek {}", time));
        }
        fn add_integration(&self, integration: Integration) {
            self.inner.lock().unwrap().calls.push(format!("integration {:?}", integration));
        }
        fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.listeners.insert((kind, id), listener);
            ListenerId(id)
        }
        fn remove_listener(&self, kind: EventKind, id: ListenerId) {
            self.inner.lock().unwrap().listeners.remove(&(kind, id.0));
        }
    }

    #[derive(Default)]
    struct RecordingChrome {
        states: Vec<PresentationState>,
        visible: Vec<bool>,
        duration: f64,
        label: String,
    }

    impl PlayerChrome for RecordingChrome {
        fn set_state(&mut self, state: PresentationState, _affordances: &Affordances) {
            self.states.push(state);
        }
        fn set_visible(&mut self, visible: bool) {
            self.visible.push(visible);
        }
        fn set_duration(&mut self, duration: f64) {
            self.duration = duration;
        }
        fn set_progress(&mut self, _current_time: f64, label: &str) {
            self.label = label.to_string();
        }
    }

    fn controller() -> PlayerController<FakePlayer, RecordingChrome> {
        let source = SourceDescription::hls(
            Url::parse("https://cdn.theoplayer.com/video/big_buck_bunny/big_buck_bunny.m3u8").unwrap(),
        );
        let setup = PlayerSetup::new(source).with_integration(Integration::GoogleIma);
        PlayerController::new(setup, ChromeConfig::default(), RecordingChrome::default())
    }

    fn drain(
        controller: &mut PlayerController<FakePlayer, RecordingChrome>,
        rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>,
    ) {
        while let Ok(event) = rx.try_recv() {
            controller.handle_event(&event).unwrap();
        }
    }

    #[test]
    fn test_not_ready_is_explicit() {
        let mut controller = controller();
        assert!(matches!(controller.play(), Err(Error::PlayerNotReady)));
        assert!(matches!(controller.skip(true), Err(Error::PlayerNotReady)));
        assert!(matches!(
            controller.handle_event(&PlaybackEvent::Play),
            Err(Error::PlayerNotReady)
        ));
    }

    #[test]
    fn test_attach_subscribes_and_sets_source() {
        let player = Arc::new(FakePlayer::default());
        let mut controller = controller();
        let _rx = controller.attach(player.clone());

        assert_eq!(player.listener_count(), EventKind::ALL.len());
        assert!(player.has_source());
        assert_eq!(player.calls(), vec!["integration GoogleIma", "set_source"]);
        assert_eq!(controller.chrome().states, vec![PresentationState::Initial]);

        controller.detach();
        assert_eq!(player.listener_count(), 0);
        assert!(!controller.is_attached());
        assert_eq!(player.calls().last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn test_events_flow_through_listeners() {
        let player = Arc::new(FakePlayer::default());
        let mut controller = controller();
        let mut rx = controller.attach(player.clone());

        player.emit(PlaybackEvent::Play);
        player.emit(PlaybackEvent::Playing);
        player.emit(PlaybackEvent::DurationChange { duration: Some(596.0) });
        player.emit(PlaybackEvent::TimeUpdate { current_time: 65.0, is_seeking: false });
        drain(&mut controller, &mut rx);

        assert_eq!(controller.state(), PresentationState::Playing);
        assert_eq!(controller.chrome().duration, 596.0);
        assert_eq!(controller.chrome().label, "01:05 / 09:56");
    }

    #[test]
    fn test_ended_restarts_source() {
        let player = Arc::new(FakePlayer::default());
        let mut controller = controller();
        let mut rx = controller.attach(player.clone());

        player.emit(PlaybackEvent::Play);
        player.emit(PlaybackEvent::Playing);
        player.emit(PlaybackEvent::Ended);
        drain(&mut controller, &mut rx);

        let calls = player.calls();
        assert_eq!(&calls[calls.len() - 2..], &["stop", "set_source"]);

        // The player answers the new source with a source change
        player.emit(PlaybackEvent::SourceChange);
        drain(&mut controller, &mut rx);
        assert_eq!(controller.state(), PresentationState::Initial);
    }

    #[test]
    fn test_pause_during_ad() {
        let player = Arc::new(FakePlayer::default());
        let mut controller = controller();
        let mut rx = controller.attach(player.clone());

        player.emit(PlaybackEvent::Play);
        player.emit(PlaybackEvent::AdBreakBegin);
        player.set_status(PlayerStatus { ad_playing: true, paused: true, seeking: false });
        player.emit(PlaybackEvent::Pause);
        drain(&mut controller, &mut rx);

        assert_eq!(controller.state(), PresentationState::AdPaused);
    }

    #[test]
    fn test_skip_is_clamped() {
        let player = Arc::new(FakePlayer::default());
        {
            let mut inner = player.inner.lock().unwrap();
            inner.current_time = 595.0;
            inner.duration = Some(600.0);
        }
        let mut controller = controller();
        let _rx = controller.attach(player.clone());

        controller.skip(true).unwrap();
        assert_eq!(player.current_time(), 600.0);

        player.inner.lock().unwrap().current_time = 4.0;
        controller.skip(false).unwrap();
        assert_eq!(player.current_time(), 0.0);

        assert!(matches!(controller.seek(f64::NAN), Err(Error::InvalidSeek { .. })));
    }

    #[test]
    fn test_drop_releases_subscriptions() {
        let player = Arc::new(FakePlayer::default());
        {
            let mut controller = controller();
            let _rx = controller.attach(player.clone());
            assert!(player.listener_count() > 0);
        }
        assert_eq!(player.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_hides_chrome_and_tap_restores_it() {
        let player = Arc::new(FakePlayer::default());
        let mut controller = controller();
        let rx = controller.attach(player.clone());

        player.emit(PlaybackEvent::Play);
        player.emit(PlaybackEvent::Playing);

        let stopped = tokio::time::timeout(Duration::from_secs(6), controller.run(rx)).await;
        assert!(stopped.is_err());
        assert_eq!(controller.state(), PresentationState::Playing);
        assert!(!controller.overlay().is_visible());
        assert_eq!(controller.chrome().visible.last(), Some(&false));

        controller.tap();
        assert!(controller.overlay().is_visible());
        assert_eq!(controller.chrome().visible.last(), Some(&true));

        controller.tap();
        assert!(!controller.overlay().is_visible());
        assert_eq!(controller.chrome().visible.last(), Some(&false));
    }
}
