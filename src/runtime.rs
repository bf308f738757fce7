/// Runtime - one thread that owns the supervisor and serializes ticks and
/// device events
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::config::Config;
use crate::grid::{GridEvent, GridSurface};
use crate::supervisor::ConnectionSupervisor;
use crate::trigger::{Detached, TriggerHook};

enum Message {
    Grid(GridEvent),
    Shutdown,
}

/// Cloneable handle for feeding device events into the sequencer.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<Message>,
}

impl EventSender {
    pub fn send(&self, event: GridEvent) -> Result<()> {
        self.sender
            .send(Message::Grid(event))
            .map_err(|_| anyhow!("sequencer has shut down"))
    }

    pub fn connected(&self) -> Result<()> {
        self.send(GridEvent::Connected)
    }

    pub fn disconnected(&self) -> Result<()> {
        self.send(GridEvent::Disconnected)
    }

    pub fn key(&self, x: usize, y: usize, pressed: bool) -> Result<()> {
        self.send(GridEvent::Key { x, y, pressed })
    }
}

pub struct SequencerRuntime {
    events: EventSender,
    handle: Option<JoinHandle<()>>,
}

impl SequencerRuntime {
    /// Start the sequencer thread. Nothing ticks until the first
    /// `Connected` event arrives.
    pub fn spawn<S, H>(surface: S, hook: H, config: &Config) -> Result<Self>
    where
        S: GridSurface + 'static,
        H: TriggerHook + 'static,
    {
        let hook = Detached::spawn(hook)?;
        let supervisor = ConnectionSupervisor::new(surface, hook, config.tick_period());
        let (sender, receiver) = unbounded();

        let handle = thread::Builder::new()
            .name("gridseq-clock".to_string())
            .spawn(move || run(supervisor, receiver))?;

        Ok(Self {
            events: EventSender { sender },
            handle: Some(handle),
        })
    }

    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the clock thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.events.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("sequencer thread panicked");
            }
        }
    }
}

impl Drop for SequencerRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<S: GridSurface, H: TriggerHook>(
    mut supervisor: ConnectionSupervisor<S, H>,
    receiver: Receiver<Message>,
) {
    loop {
        let message = match supervisor.next_deadline() {
            Some(deadline) => match receiver.recv_deadline(deadline) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            },
        };

        match message {
            Some(Message::Grid(event)) => supervisor.handle(event, Instant::now()),
            Some(Message::Shutdown) => break,
            None => {
                supervisor.on_tick(Instant::now());
            }
        }
    }
    log::debug!("sequencer thread stopped");
}
