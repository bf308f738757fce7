#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use std::sync::{Arc, Mutex};

#[cfg(feature = "gui")]
use gridseq::{
    midi_note_name, Config, Display, EventSender, Fanout, LogTrigger, MemorySurface, MidiTrigger,
    SequencerRuntime,
};

#[cfg(feature = "gui")]
const GRID_WIDTH: usize = 16;
#[cfg(feature = "gui")]
const GRID_HEIGHT: usize = 8;

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().unwrap_or_else(|err| {
        log::warn!("ignoring environment overrides: {err:#}");
        Config::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 480.0])
            .with_title("gridseq - virtual grid"),
        ..Default::default()
    };

    eframe::run_native(
        "gridseq",
        options,
        Box::new(move |cc| {
            let app = GridApp::new(cc.egui_ctx.clone(), config)?;
            Ok(Box::new(app))
        }),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct GridApp {
    runtime: SequencerRuntime,
    events: EventSender,
    display: Display,
    midi: Arc<Mutex<MidiTrigger>>,
    config: Config,

    // UI state
    plugged_in: bool,
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
}

#[cfg(feature = "gui")]
impl GridApp {
    fn new(ctx: egui::Context, config: Config) -> anyhow::Result<Self> {
        let surface = MemorySurface::new(GRID_WIDTH, GRID_HEIGHT)
            .with_flush_callback(move || ctx.request_repaint());
        let display = surface.display();

        let midi = Arc::new(Mutex::new(MidiTrigger::new(
            config.base_note(),
            config.midi_channel(),
        )));
        let mut selected_port = None;
        if let Some(port) = config.midi_port() {
            match lock(&midi).connect(port) {
                Ok(()) => selected_port = Some(port),
                Err(err) => log::warn!("{err:#}"),
            }
        }

        let hook = Fanout::new().with(LogTrigger).with(Arc::clone(&midi));
        let runtime = SequencerRuntime::spawn(surface, hook, &config)?;
        let events = runtime.events();

        let mut app = Self {
            runtime,
            events,
            display,
            midi,
            config,
            plugged_in: false,
            available_midi_ports: MidiTrigger::available_ports(),
            selected_port,
        };
        app.set_plugged_in(true);
        Ok(app)
    }

    fn set_plugged_in(&mut self, plugged_in: bool) {
        let sent = if plugged_in {
            self.events.connected()
        } else {
            self.events.disconnected()
        };
        match sent {
            Ok(()) => self.plugged_in = plugged_in,
            Err(err) => log::error!("{err:#}"),
        }
    }

    fn press(&self, x: usize, y: usize) {
        let sent = self
            .events
            .key(x, y, true)
            .and_then(|()| self.events.key(x, y, false));
        if let Err(err) = sent {
            log::error!("{err:#}");
        }
    }
}

#[cfg(feature = "gui")]
fn lock(midi: &Mutex<MidiTrigger>) -> std::sync::MutexGuard<'_, MidiTrigger> {
    midi.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(feature = "gui")]
fn led_color(level: u8, plugged_in: bool) -> egui::Color32 {
    if !plugged_in {
        return egui::Color32::from_rgb(25, 25, 25);
    }
    let level = u16::from(level.min(15));
    let scale = |max: u16| (30 + level * (max - 30) / 15) as u8;
    egui::Color32::from_rgb(scale(255), scale(190), scale(60))
}

#[cfg(feature = "gui")]
impl eframe::App for GridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("gridseq - virtual grid");
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                let label = if self.plugged_in { "⏏ Unplug" } else { "🔌 Plug in" };
                if ui.button(label).clicked() {
                    self.set_plugged_in(!self.plugged_in);
                }

                ui.add_space(20.0);
                ui.label(format!(
                    "Step: {} ms",
                    self.config.tick_period().as_millis()
                ));
                ui.label(format!(
                    "Base note: {}",
                    midi_note_name(self.config.base_note())
                ));
            });

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                let mut midi = lock(&self.midi);
                midi.disconnect();
                match midi.connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(err) => {
                        log::warn!("{err:#}");
                        self.selected_port = None;
                    }
                }
            }

            ui.add_space(20.0);

            let frame = self.display.frame();
            let mut pressed = None;
            ui.spacing_mut().item_spacing = egui::vec2(4.0, 4.0);
            for y in 0..GRID_HEIGHT {
                ui.horizontal(|ui| {
                    for x in 0..GRID_WIDTH {
                        let level = frame.as_ref().map_or(0, |f| f.get(x, y));
                        let button = egui::Button::new("")
                            .min_size(egui::vec2(32.0, 32.0))
                            .fill(led_color(level, self.plugged_in));
                        if ui.add(button).clicked() {
                            pressed = Some((x, y));
                        }
                    }
                });
            }
            if let Some((x, y)) = pressed {
                self.press(x, y);
            }

            // Info
            ui.separator();
            ui.label("Click a key to toggle a step. The bottom row is the trigger bar.");
            if !self.runtime.is_running() {
                ui.colored_label(egui::Color32::RED, "Sequencer thread has stopped");
            } else if !lock(&self.midi).is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - triggers are only logged",
                );
            }
        });
    }
}
