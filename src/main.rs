// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use clap::{crate_version, Parser, Subcommand};
use colorsampler::color::{Frame, SharedFrame};
use colorsampler::config::{self, RunConfig};
use colorsampler::frames;
use colorsampler::midi::{self, monitor::Monitor};
use colorsampler::preset::PresetStore;
use colorsampler::runner::Runner;
use colorsampler::scale::{self, Scale};
use colorsampler::scheduler::SystemClock;
use parking_lot::Mutex;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Turns colors sampled from video into MIDI."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Lists the scales samplers can be quantized to.
    Scales {},
    /// Lists the presets stored in the given file, or deletes one of them.
    Presets {
        /// The path to the presets file.
        path: String,
        /// Deletes the preset with this name instead of listing.
        #[arg[short, long]]
        delete: Option<String>,
    },
    /// Start will sample raw rgb24 frames read from stdin until interrupted.
    Start {
        /// The path to the run config.
        config_path: String,
        /// Saves the samplers as a preset with this name on exit.
        #[arg[short, long]]
        save_preset: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Scales {} => {
            println!("Scales:");
            for scale in Scale::ALL {
                let notes: Vec<String> = scale
                    .intervals()
                    .iter()
                    .map(|interval| scale::note_name(60 + *interval as u8))
                    .collect();
                println!("- {} ({})", scale, notes.join(" "));
            }
        }
        Commands::Presets { path, delete } => {
            let mut store = PresetStore::load(&PathBuf::from(&path))?;

            if let Some(name) = delete {
                store.delete(&name)?;
                println!("Preset {} deleted.", name);
                return Ok(());
            }

            if store.is_empty() {
                println!("No presets found in {}.", path);
                return Ok(());
            }

            println!("Presets (count: {}):", store.len());
            for name in store.names() {
                let preset = store.get(name)?;
                println!("- {} (samplers: {})", name, preset.samplers.len());
            }
        }
        Commands::Start {
            config_path,
            save_preset,
        } => {
            let config = RunConfig::deserialize(&PathBuf::from(&config_path))?;
            if save_preset.is_some() && config.presets().is_none() {
                return Err("saving a preset requires a presets file in the config".into());
            }

            let engine = Arc::new(Mutex::new(config::init_engine(
                &config,
                Arc::new(SystemClock::new()),
            )?));

            let size = config.frame();
            let frame = SharedFrame::new(Frame::black(size.width, size.height));
            frames::spawn_reader(io::stdin(), frame.clone())?;

            let monitor = match config.midi_input() {
                Some(name) => Some(Monitor::start(midi::get_device(name)?)?),
                None => None,
            };

            let runner = Runner::start(engine.clone(), Arc::new(frame));
            tokio::signal::ctrl_c().await?;
            info!("Interrupted, stopping.");
            runner.stop().await?;
            if let Some(monitor) = monitor {
                monitor.stop().await?;
            }

            if let (Some(name), Some(path)) = (save_preset, config.presets()) {
                let mut store = PresetStore::load(path)?;
                store.insert(&name, engine.lock().snapshot());
                store.save()?;
                println!("Saved preset {} to {}.", name, path.display());
            }
        }
    }

    Ok(())
}
