/// Sequencer engine - owns the steps, the playhead and the clock
use std::time::{Duration, Instant};

use crate::grid::{GridGeometry, LedFrame};
use crate::trigger::{fire, TriggerHook};

use super::clock::Clock;
use super::render::Renderer;
use super::{PlayCursor, StepMatrix};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Zero-based tick index since the engine started.
    pub tick: u64,
    pub position: usize,
    /// Rows that fired, in row order.
    pub fired: Vec<usize>,
}

pub struct SequencerEngine {
    geometry: GridGeometry,
    matrix: StepMatrix,
    cursor: PlayCursor,
    clock: Clock,
    renderer: Renderer,
}

impl SequencerEngine {
    /// Build an empty matrix for `geometry` and start the clock at `now`.
    pub fn start(geometry: GridGeometry, period: Duration, now: Instant) -> Self {
        Self {
            geometry,
            matrix: StepMatrix::new(geometry.rows(), geometry.cols()),
            cursor: PlayCursor::default(),
            clock: Clock::start(period, now),
            renderer: Renderer::new(geometry),
        }
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn matrix(&self) -> &StepMatrix {
        &self.matrix
    }

    pub fn cursor(&self) -> PlayCursor {
        self.cursor
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Advance one step and fire the hook for every active row under the
    /// new playhead. Rendering is left to the caller.
    pub fn tick<H: TriggerHook + ?Sized>(&mut self, hook: &mut H) -> Step {
        let tick = self.clock.advance();
        let position = self.cursor.advance(self.geometry.cols());

        let fired: Vec<usize> = self.matrix.active_rows(position).collect();
        for &row in &fired {
            fire(hook, row);
        }

        log::trace!("tick {tick} at step {position}, fired {fired:?}");
        Step {
            tick,
            position,
            fired,
        }
    }

    /// Toggle a playable step. The bar row and anything off-grid is ignored.
    pub fn toggle(&mut self, row: usize, col: usize) -> bool {
        self.matrix.toggle(row, col)
    }

    pub fn take_dirty(&mut self) -> bool {
        self.matrix.take_dirty()
    }

    pub fn render(&mut self) -> LedFrame {
        self.matrix.take_dirty();
        self.renderer.render(&self.matrix, self.cursor)
    }
}
