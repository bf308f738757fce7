/// Connection supervisor - device presence, engine start and the render gate
use std::time::{Duration, Instant};

use crate::grid::{GridEvent, GridGeometry, GridSurface};
use crate::sequencer::engine::{SequencerEngine, Step};
use crate::trigger::TriggerHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Owns the device, the trigger hook and (once started) the engine.
///
/// The engine is created on the first successful connect and then lives
/// for as long as the supervisor does; later connects and disconnects
/// only open and close the render gate.
pub struct ConnectionSupervisor<S, H> {
    surface: S,
    hook: H,
    period: Duration,
    state: ConnectionState,
    engine: Option<SequencerEngine>,
}

impl<S: GridSurface, H: TriggerHook> ConnectionSupervisor<S, H> {
    pub fn new(surface: S, hook: H, period: Duration) -> Self {
        Self {
            surface,
            hook,
            period,
            state: ConnectionState::Disconnected,
            engine: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_started(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Option<&SequencerEngine> {
        self.engine.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Next clock deadline, or `None` while the engine is idle.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.engine.as_ref().map(|engine| engine.clock().deadline())
    }

    pub fn handle(&mut self, event: GridEvent, now: Instant) {
        match event {
            GridEvent::Connected => self.on_connect(now),
            GridEvent::Disconnected => self.on_disconnect(),
            GridEvent::Key { x, y, pressed } => self.on_key(x, y, pressed),
        }
    }

    pub fn on_connect(&mut self, now: Instant) {
        self.state = ConnectionState::Connected;

        if let Some(engine) = &self.engine {
            let fixed = engine.geometry();
            if (self.surface.width(), self.surface.height()) != (fixed.width(), fixed.height()) {
                log::warn!(
                    "grid reconnected as {}x{}, keeping {}x{}",
                    self.surface.width(),
                    self.surface.height(),
                    fixed.width(),
                    fixed.height()
                );
            }
            log::info!("grid reconnected");
            return;
        }

        match GridGeometry::of(&self.surface) {
            Ok(geometry) => {
                log::info!(
                    "grid connected ({}x{}), starting sequencer with {} lanes",
                    geometry.width(),
                    geometry.height(),
                    geometry.rows()
                );
                self.engine = Some(SequencerEngine::start(geometry, self.period, now));
            }
            Err(err) => log::error!("cannot start sequencer: {err:#}"),
        }
    }

    pub fn on_disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        log::info!("grid disconnected");
    }

    pub fn on_key(&mut self, x: usize, y: usize, pressed: bool) {
        if !pressed {
            return;
        }
        let Some(engine) = &mut self.engine else {
            log::debug!("key ({x}, {y}) before first connect, ignored");
            return;
        };
        if !engine.toggle(y, x) {
            log::debug!("key ({x}, {y}) outside playable area");
            return;
        }
        log::debug!("toggled step ({x}, {y})");
        if engine.take_dirty() {
            self.render();
        }
    }

    /// Run one clock tick. The frame is skipped while disconnected, and
    /// also while catching up on ticks that are already overdue.
    pub fn on_tick(&mut self, now: Instant) -> Option<Step> {
        let engine = self.engine.as_mut()?;
        let step = engine.tick(&mut self.hook);

        if engine.clock().is_due(now) {
            log::debug!("running late, skipping frame for tick {}", step.tick);
        } else {
            self.render();
        }
        Some(step)
    }

    fn render(&mut self) {
        if !self.is_connected() {
            return;
        }
        let Some(engine) = &mut self.engine else {
            return;
        };
        let frame = engine.render();
        if let Err(err) = self.surface.present(&frame) {
            log::warn!("dropping frame: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemorySurface;
    use crate::sequencer::render::{BAR_LEVEL, STEP_LEVEL, TRIGGER_LEVEL};
    use crossbeam_channel::{unbounded, Receiver, Sender};

    const PERIOD: Duration = Duration::from_millis(100);

    type Supervisor = ConnectionSupervisor<MemorySurface, Sender<usize>>;

    fn supervisor(width: usize, height: usize) -> (Supervisor, Receiver<usize>) {
        let (tx, rx) = unbounded::<usize>();
        (
            ConnectionSupervisor::new(MemorySurface::new(width, height), tx, PERIOD),
            rx,
        )
    }

    #[test]
    fn test_idle_until_connected() {
        let (mut sup, _rx) = supervisor(8, 4);
        assert!(!sup.is_started());
        assert_eq!(sup.next_deadline(), None);
        assert_eq!(sup.on_tick(Instant::now()), None);

        sup.on_key(0, 0, true);
        assert_eq!(sup.surface().display().flushes(), 0);
    }

    #[test]
    fn test_first_connect_starts_engine() {
        let (mut sup, _rx) = supervisor(8, 4);
        let now = Instant::now();
        sup.on_connect(now);

        assert!(sup.is_started());
        assert!(sup.is_connected());
        assert_eq!(sup.next_deadline(), Some(now + PERIOD));
        let engine = sup.engine().unwrap();
        assert_eq!(engine.matrix().rows(), 3);
        assert_eq!(engine.matrix().cols(), 8);
    }

    #[test]
    fn test_zero_sized_device_stays_idle() {
        let (mut sup, _rx) = supervisor(0, 4);
        sup.on_connect(Instant::now());
        assert!(sup.is_connected());
        assert!(!sup.is_started());
    }

    #[test]
    fn test_reconnects_never_restart() {
        let (mut sup, _rx) = supervisor(8, 4);
        sup.on_connect(Instant::now());
        sup.on_key(2, 1, true);

        let mut last_tick = None;
        let events = [
            GridEvent::Disconnected,
            GridEvent::Connected,
            GridEvent::Disconnected,
            GridEvent::Connected,
        ];
        for event in events {
            for _ in 0..3 {
                let step = sup.on_tick(Instant::now()).unwrap();
                if let Some(prev) = last_tick {
                    assert_eq!(step.tick, prev + 1);
                }
                last_tick = Some(step.tick);
            }
            sup.handle(event, Instant::now());
            assert!(sup.engine().unwrap().matrix().is_active(1, 2));
        }
        assert_eq!(last_tick, Some(11));
        assert!(sup.is_connected());
    }

    #[test]
    fn test_disconnected_ticks_fire_but_do_not_render() {
        let (mut sup, rx) = supervisor(8, 4);
        sup.on_connect(Instant::now());
        sup.on_key(0, 0, true);
        let display = sup.surface().display();
        let flushed = display.flushes();

        sup.on_disconnect();
        for _ in 0..16 {
            sup.on_tick(Instant::now());
        }
        sup.on_key(1, 1, true);

        assert_eq!(display.flushes(), flushed);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0, 0]);
        assert_eq!(sup.engine().unwrap().cursor().position(), Some(7));
        assert!(sup.engine().unwrap().matrix().is_active(1, 1));
    }

    #[test]
    fn test_key_press_renders_immediately() {
        let (mut sup, _rx) = supervisor(8, 4);
        sup.on_connect(Instant::now());
        let display = sup.surface().display();

        sup.on_key(5, 2, true);
        assert_eq!(display.flushes(), 1);
        assert_eq!(display.frame().unwrap().get(5, 2), STEP_LEVEL);

        sup.on_key(5, 2, false);
        sup.on_key(5, 3, true);
        sup.on_key(9, 0, true);
        assert_eq!(display.flushes(), 1);
    }

    #[test]
    fn test_flush_failure_does_not_stop_ticks() {
        let (mut sup, rx) = supervisor(4, 2);
        sup.on_connect(Instant::now());
        sup.on_key(1, 0, true);
        let display = sup.surface().display();
        display.set_offline(true);

        for _ in 0..4 {
            sup.on_tick(Instant::now());
        }
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0]);

        display.set_offline(false);
        sup.on_tick(Instant::now());
        assert_eq!(display.frame().unwrap().row(1), &[BAR_LEVEL; 4]);
    }

    #[test]
    fn test_late_tick_skips_frame_not_step() {
        let (mut sup, rx) = supervisor(4, 2);
        let start = Instant::now();
        sup.on_connect(start);
        sup.on_key(0, 0, true);
        let display = sup.surface().display();
        let flushed = display.flushes();

        let late = start + PERIOD * 3;
        let mut positions = Vec::new();
        while sup.next_deadline().is_some_and(|deadline| deadline <= late) {
            positions.push(sup.on_tick(late).unwrap().position);
        }

        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(display.flushes(), flushed + 1);
        assert_eq!(display.frame().unwrap().get(2, 1), BAR_LEVEL);
        assert_ne!(display.frame().unwrap().get(0, 1), TRIGGER_LEVEL);
    }

    struct Failing;

    impl TriggerHook for Failing {
        fn on_trigger(&mut self, row: usize) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("no route for lane {row}"))
        }
    }

    struct Panicking;

    impl TriggerHook for Panicking {
        fn on_trigger(&mut self, row: usize) -> anyhow::Result<()> {
            panic!("lane {row} exploded");
        }
    }

    fn run_broken_hook<H: TriggerHook>(hook: H) {
        let mut sup = ConnectionSupervisor::new(MemorySurface::new(4, 3), hook, PERIOD);
        sup.on_connect(Instant::now());
        sup.on_key(0, 0, true);
        sup.on_key(2, 1, true);
        let display = sup.surface().display();
        let flushed = display.flushes();

        for n in 0..8u64 {
            let step = sup.on_tick(Instant::now()).unwrap();
            assert_eq!(step.tick, n);
            assert_eq!(step.position, (n % 4) as usize);
        }
        assert_eq!(display.flushes(), flushed + 8);
        assert_eq!(display.frame().unwrap().get(3, 2), BAR_LEVEL);
    }

    #[test]
    fn test_failing_hook_does_not_stall_ticks() {
        run_broken_hook(Failing);
    }

    #[test]
    fn test_panicking_hook_does_not_stall_ticks() {
        run_broken_hook(Panicking);
    }
}
