/// gridseq - a step sequencer for monome-style LED button grids
///
/// This library provides the pieces between a grid device and the notes it plays:
/// - Step matrix and playhead, sized from the device once it connects
/// - A fixed-period clock that never lets a slow frame cost a step
/// - LED rendering with a trigger bar along the bottom row
/// - Connection supervision (render only while the grid is plugged in)
/// - Trigger hooks: logging, MIDI output, or anything implementing `TriggerHook`

pub mod config;
pub mod grid;
pub mod midi;
pub mod runtime;
pub mod sequencer;
pub mod supervisor;
pub mod trigger;

// Re-export commonly used types
pub use config::Config;
pub use grid::{Display, GridEvent, GridGeometry, GridSurface, LedFrame, MemorySurface};
pub use midi::{midi_note_name, MidiTrigger};
pub use runtime::{EventSender, SequencerRuntime};
pub use sequencer::clock::Clock;
pub use sequencer::engine::{SequencerEngine, Step};
pub use sequencer::render::Renderer;
pub use sequencer::{PlayCursor, StepMatrix};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
pub use trigger::{Detached, Fanout, LogTrigger, TriggerHook};
