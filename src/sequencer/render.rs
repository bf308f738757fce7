/// Turns step state into LED levels
use crate::grid::{GridGeometry, LedFrame};

use super::{PlayCursor, StepMatrix};

/// Level of an active step.
pub const STEP_LEVEL: u8 = 11;
/// Added to every playable LED in the playhead column.
pub const PLAYHEAD_LEVEL: u8 = 4;
/// Idle level of the trigger bar.
pub const BAR_LEVEL: u8 = 4;
/// Bar LED under the playhead when something fires.
pub const TRIGGER_LEVEL: u8 = 15;

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    geometry: GridGeometry,
}

impl Renderer {
    pub fn new(geometry: GridGeometry) -> Self {
        Self { geometry }
    }

    pub fn render(&self, matrix: &StepMatrix, cursor: PlayCursor) -> LedFrame {
        let geometry = self.geometry;
        let mut frame = LedFrame::new(geometry.width(), geometry.height());
        let playhead = cursor.position();

        for x in 0..geometry.width() {
            let highlight = if playhead == Some(x) { PLAYHEAD_LEVEL } else { 0 };
            for y in 0..geometry.rows() {
                let step = if matrix.is_active(y, x) { STEP_LEVEL } else { 0 };
                frame.set(x, y, step + highlight);
            }
        }

        let bar = geometry.bar_row();
        for x in 0..geometry.width() {
            frame.set(x, bar, BAR_LEVEL);
        }

        if let Some(x) = playhead {
            if matrix.active_rows(x).next().is_some() {
                frame.set(x, bar, TRIGGER_LEVEL);
            }
        }

        frame
    }
}
