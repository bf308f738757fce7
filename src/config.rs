/// Runtime settings, with environment overrides
use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

const MIN_TICK: Duration = Duration::from_millis(10);
const MAX_TICK: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    tick_period: Duration,
    base_note: u8,
    midi_channel: u8,
    midi_port: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            base_note: 36, // C2
            midi_channel: 0,
            midi_port: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `GRIDSEQ_TICK_MS`, `GRIDSEQ_BASE_NOTE`,
    /// `GRIDSEQ_MIDI_CHANNEL` and `GRIDSEQ_MIDI_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(ms) = parse::<u64>(&lookup, "GRIDSEQ_TICK_MS")? {
            config.set_tick_period(Duration::from_millis(ms));
        }
        if let Some(note) = parse::<u8>(&lookup, "GRIDSEQ_BASE_NOTE")? {
            config.set_base_note(note);
        }
        if let Some(channel) = parse::<u8>(&lookup, "GRIDSEQ_MIDI_CHANNEL")? {
            config.set_midi_channel(channel);
        }
        config.midi_port = parse::<usize>(&lookup, "GRIDSEQ_MIDI_PORT")?;
        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn set_tick_period(&mut self, period: Duration) {
        self.tick_period = period.clamp(MIN_TICK, MAX_TICK);
    }

    pub fn base_note(&self) -> u8 {
        self.base_note
    }

    pub fn set_base_note(&mut self, note: u8) {
        self.base_note = note.clamp(0, 127);
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn set_midi_channel(&mut self, channel: u8) {
        self.midi_channel = channel.clamp(0, 15);
    }

    pub fn midi_port(&self) -> Option<usize> {
        self.midi_port
    }

    pub fn set_midi_port(&mut self, port: Option<usize>) {
        self.midi_port = port;
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid {key}: {raw:?}"))
        })
        .transpose()
}
