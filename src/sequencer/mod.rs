/// Core sequencer logic - step state and playback position
/// Sized from the device geometry once and never resized
pub mod clock;
pub mod engine;
pub mod render;

/// Boolean step grid: rows are lanes, columns are time steps.
#[derive(Debug, Clone)]
pub struct StepMatrix {
    cells: Vec<Vec<bool>>,
    rows: usize,
    cols: usize,
    dirty: bool,
}

impl StepMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            cells: vec![vec![false; cols]; rows],
            rows,
            cols,
            dirty: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_active(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|lane| lane.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// Flip one step. Returns false (and changes nothing) out of bounds.
    pub fn toggle(&mut self, row: usize, col: usize) -> bool {
        let Some(cell) = self.cells.get_mut(row).and_then(|lane| lane.get_mut(col)) else {
            return false;
        };
        *cell = !*cell;
        self.dirty = true;
        true
    }

    /// Rows with an active step in `col`, top to bottom.
    pub fn active_rows(&self, col: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows).filter(move |&row| self.is_active(row, col))
    }

    /// Report and clear the pending-redraw flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// Playback position. `None` until the first tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayCursor(Option<usize>);

impl PlayCursor {
    pub fn position(&self) -> Option<usize> {
        self.0
    }

    /// Step forward, wrapping at `cols`. The first call lands on 0.
    pub fn advance(&mut self, cols: usize) -> usize {
        let next = match self.0 {
            Some(pos) if pos + 1 < cols => pos + 1,
            _ => 0,
        };
        self.0 = Some(next);
        next
    }
}
