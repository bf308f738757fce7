/// Trigger hooks - what happens when a step fires
///
/// Hooks run on the clock path, so every call goes through [`fire`],
/// which logs errors and panics instead of letting them escape. Wrap a
/// slow hook in [`Detached`] to keep it off the clock thread entirely.
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, select, Sender, TrySendError};

pub trait TriggerHook: Send {
    fn on_trigger(&mut self, row: usize) -> Result<()>;
}

/// Call a hook, containing any failure.
pub fn fire<H: TriggerHook + ?Sized>(hook: &mut H, row: usize) {
    match panic::catch_unwind(AssertUnwindSafe(|| hook.on_trigger(row))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("trigger for row {row} failed: {err:#}"),
        Err(_) => log::error!("trigger for row {row} panicked"),
    }
}

/// Writes a log line per trigger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTrigger;

impl TriggerHook for LogTrigger {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        log::info!("triggered {row}");
        Ok(())
    }
}

impl TriggerHook for Sender<usize> {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        self.send(row)
            .map_err(|_| anyhow!("trigger receiver dropped"))
    }
}

impl<H: TriggerHook + ?Sized> TriggerHook for Box<H> {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        (**self).on_trigger(row)
    }
}

/// Lets a hook stay reachable from elsewhere, e.g. a MIDI output the UI
/// reconnects while the sequencer runs.
impl<H: TriggerHook> TriggerHook for Arc<Mutex<H>> {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        self.lock()
            .map_err(|_| anyhow!("trigger hook lock poisoned"))?
            .on_trigger(row)
    }
}

/// Several hooks behind one. A failing hook does not stop the others.
#[derive(Default)]
pub struct Fanout {
    hooks: Vec<Box<dyn TriggerHook>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl TriggerHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl TriggerHook for Fanout {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        for hook in &mut self.hooks {
            fire(hook, row);
        }
        Ok(())
    }
}

/// Queue depth between the clock and a detached hook.
pub const TRIGGER_QUEUE: usize = 64;

/// Runs a hook on its own worker thread. `on_trigger` only enqueues; when
/// the worker falls `capacity` triggers behind, new ones are dropped.
pub struct Detached {
    sender: Option<Sender<usize>>,
    stop: Option<Sender<()>>,
    stopped: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Detached {
    pub fn spawn<H: TriggerHook + 'static>(hook: H) -> Result<Self> {
        Self::with_capacity(hook, TRIGGER_QUEUE)
    }

    pub fn with_capacity<H: TriggerHook + 'static>(mut hook: H, capacity: usize) -> Result<Self> {
        let (sender, rows) = bounded::<usize>(capacity.max(1));
        let (stop, stop_rx) = bounded::<()>(0);
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);

        let worker = thread::Builder::new()
            .name("gridseq-trigger".to_string())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(rows) -> row => match row {
                        Ok(_) if flag.load(Ordering::Acquire) => break,
                        Ok(row) => fire(&mut hook, row),
                        Err(_) => break,
                    },
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            stop: Some(stop),
            stopped,
            worker: Some(worker),
        })
    }
}

impl TriggerHook for Detached {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        let Some(sender) = &self.sender else {
            return Err(anyhow!("trigger worker stopped"));
        };
        match sender.try_send(row) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(anyhow!("trigger queue full, dropping row {row}")),
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("trigger worker stopped")),
        }
    }
}

impl Drop for Detached {
    fn drop(&mut self) {
        // Queued rows are abandoned; only a hook call already running is awaited.
        self.stopped.store(true, Ordering::Release);
        self.stop.take();
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct Failing;

    impl TriggerHook for Failing {
        fn on_trigger(&mut self, _row: usize) -> Result<()> {
            Err(anyhow!("device gone"))
        }
    }

    struct Panicking;

    impl TriggerHook for Panicking {
        fn on_trigger(&mut self, _row: usize) -> Result<()> {
            panic!("hook bug");
        }
    }

    #[test]
    fn test_fire_contains_errors_and_panics() {
        fire(&mut Failing, 0);
        fire(&mut Panicking, 1);
    }

    #[test]
    fn test_fanout_keeps_going_after_failure() {
        let (tx, rx) = unbounded::<usize>();
        let mut fanout = Fanout::new().with(Failing).with(Panicking).with(tx);
        assert_eq!(fanout.len(), 3);

        fanout.on_trigger(4).unwrap();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_shared_hook() {
        let (tx, rx) = unbounded::<usize>();
        let shared = Arc::new(Mutex::new(tx));
        let mut hook = Arc::clone(&shared);
        hook.on_trigger(2).unwrap();
        assert_eq!(rx.try_recv(), Ok(2));
    }

    #[test]
    fn test_detached_delivers_in_order() {
        let (tx, rx) = unbounded::<usize>();
        let mut detached = Detached::spawn(tx).unwrap();
        for row in 0..5 {
            detached.on_trigger(row).unwrap();
        }

        let got: Vec<usize> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_detached_does_not_block_on_slow_hook() {
        struct Slow;

        impl TriggerHook for Slow {
            fn on_trigger(&mut self, _row: usize) -> Result<()> {
                thread::sleep(Duration::from_millis(50));
                Ok(())
            }
        }

        let mut detached = Detached::spawn(Slow).unwrap();
        let started = Instant::now();
        for row in 0..10 {
            detached.on_trigger(row).unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_detached_queue_is_capped_and_drop_skips_backlog() {
        struct Stuck {
            calls: Arc<AtomicUsize>,
            started: Sender<()>,
        }

        impl TriggerHook for Stuck {
            fn on_trigger(&mut self, _row: usize) -> Result<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let _ = self.started.send(());
                thread::sleep(Duration::from_millis(100));
                Ok(())
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let (started, started_rx) = unbounded::<()>();
        let hook = Stuck {
            calls: Arc::clone(&calls),
            started,
        };
        let mut detached = Detached::with_capacity(hook, 4).unwrap();

        detached.on_trigger(0).unwrap();
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let accepted = (1..20).filter(|&row| detached.on_trigger(row).is_ok()).count();
        assert_eq!(accepted, 4);

        let dropping = Instant::now();
        drop(detached);
        assert!(dropping.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
