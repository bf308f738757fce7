/// In-process grid device, used by the virtual grid app and by tests
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use super::{GridSurface, LedFrame};

#[derive(Debug, Default)]
struct DisplayState {
    frame: Option<LedFrame>,
    flushes: usize,
    offline: bool,
}

/// Read side of a [`MemorySurface`]: whatever was last flushed.
#[derive(Debug, Clone, Default)]
pub struct Display {
    state: Arc<Mutex<DisplayState>>,
}

impl Display {
    fn lock(&self) -> Result<MutexGuard<'_, DisplayState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("display state poisoned"))
    }

    /// Last frame the device accepted, if any.
    pub fn frame(&self) -> Option<LedFrame> {
        self.lock().ok().and_then(|state| state.frame.clone())
    }

    /// Number of successful flushes so far.
    pub fn flushes(&self) -> usize {
        self.lock().map(|state| state.flushes).unwrap_or(0)
    }

    /// While offline every flush fails like a dropped transport.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.lock() {
            state.offline = offline;
        }
    }
}

pub struct MemorySurface {
    buffer: LedFrame,
    display: Display,
    on_flush: Option<Box<dyn Fn() + Send>>,
}

impl MemorySurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            buffer: LedFrame::new(width, height),
            display: Display::default(),
            on_flush: None,
        }
    }

    /// Called after every successful flush, e.g. to request a repaint.
    pub fn with_flush_callback(mut self, callback: impl Fn() + Send + 'static) -> Self {
        self.on_flush = Some(Box::new(callback));
        self
    }

    pub fn display(&self) -> Display {
        self.display.clone()
    }
}

impl GridSurface for MemorySurface {
    fn width(&self) -> usize {
        self.buffer.width()
    }

    fn height(&self) -> usize {
        self.buffer.height()
    }

    fn set_led(&mut self, x: usize, y: usize, level: u8) {
        self.buffer.set(x, y, level);
    }

    fn flush(&mut self) -> Result<()> {
        {
            let mut state = self.display.lock()?;
            if state.offline {
                bail!("virtual grid is offline");
            }
            state.frame = Some(self.buffer.clone());
            state.flushes += 1;
        }
        if let Some(callback) = &self.on_flush {
            callback();
        }
        Ok(())
    }
}
