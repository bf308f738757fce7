/// MIDI trigger output using midir
use anyhow::{anyhow, Context, Result};
use midir::{MidiOutput, MidiOutputConnection};

use crate::trigger::TriggerHook;

const CLIENT_NAME: &str = "gridseq MIDI Output";
const VELOCITY: u8 = 100;

/// Sends one short note per fired lane: lane `r` plays `base_note + r`.
pub struct MidiTrigger {
    connection: Option<MidiOutputConnection>,
    base_note: u8,
    channel: u8,
}

impl MidiTrigger {
    pub fn new(base_note: u8, channel: u8) -> Self {
        Self {
            connection: None,
            base_note: base_note.min(127),
            channel: channel.min(15),
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME).context("failed to create MIDI output")?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| anyhow!("no MIDI port at index {port_index}"))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "gridseq")
            .map_err(|e| anyhow!("failed to connect to MIDI port {name:?}: {e}"))?;

        log::info!("MIDI output connected to {name:?}");
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    /// Note played by a lane.
    pub fn note_for(&self, row: usize) -> u8 {
        let offset = u8::try_from(row).unwrap_or(u8::MAX);
        self.base_note.saturating_add(offset).min(127)
    }
}

impl TriggerHook for MidiTrigger {
    fn on_trigger(&mut self, row: usize) -> Result<()> {
        let note = self.note_for(row);
        let channel = self.channel;
        let Some(conn) = self.connection.as_mut() else {
            return Ok(());
        };
        conn.send(&[0x90 | channel, note, VELOCITY])
            .map_err(|e| anyhow!("failed to send note on: {e}"))?;
        conn.send(&[0x80 | channel, note, 0])
            .map_err(|e| anyhow!("failed to send note off: {e}"))?;
        Ok(())
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}
