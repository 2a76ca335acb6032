//! nio-tone - drive an audio backend with a test tone
//!
//! Opens the configured backend with a small sine synth, runs for a while
//! and shuts down again. MIDI notes received on the server backend retune
//! the tone.
//!
//! ## Command line
//!
//! ```text
//! nio-tone [server|oss] [--seconds N] [--config PATH] [--compress]
//! ```

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use nio_core::audio::{AudioOut, Compression, IoConfig};
use nio_core::config::{default_config_path, load_or_default, CONFIG_FILE};
use nio_core::engine::Engine;
use nio_core::{StereoBlock, MAX_BUFFER_SIZE, MAX_PARTS};
use nio_midi::{MidiEvent, MidiEventKind, MidiSink};

const DEFAULT_SECONDS: u64 = 5;
const BASE_NOTE: i32 = 69;
const LEVEL: f32 = 0.2;

/// One sine voice per part, each a fifth above the previous
struct SineSynth {
    sample_rate: f32,
    frames: usize,
    note: i32,
    phases: [f32; MAX_PARTS],
    parts: Vec<(Vec<f32>, Vec<f32>)>,
    master: (Vec<f32>, Vec<f32>),
}

impl SineSynth {
    fn new() -> Self {
        let silent = || (vec![0.0; MAX_BUFFER_SIZE], vec![0.0; MAX_BUFFER_SIZE]);
        Self {
            // Replaced by the running rate once a backend opens
            sample_rate: 48000.0,
            frames: 0,
            note: BASE_NOTE,
            phases: [0.0; MAX_PARTS],
            parts: (0..MAX_PARTS).map(|_| silent()).collect(),
            master: silent(),
        }
    }

    fn frequency(&self, part: usize) -> f32 {
        let semitones = (self.note - BASE_NOTE) as f32 + 7.0 * part as f32;
        440.0 * 2f32.powf(semitones / 12.0)
    }
}

impl MidiSink for SineSynth {
    fn midi_event(&mut self, event: MidiEvent) {
        if event.kind == MidiEventKind::Note && !event.is_note_off() {
            log::debug!("Retuning to note {}", event.num);
            self.note = event.num;
        }
    }
}

impl Engine for SineSynth {
    fn set_buffer_size(&mut self, frames: usize) {
        self.frames = frames.min(MAX_BUFFER_SIZE);
    }

    fn set_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate.max(1) as f32;
    }

    fn render(&mut self) -> StereoBlock<'_> {
        let n = self.frames;
        self.master.0[..n].fill(0.0);
        self.master.1[..n].fill(0.0);

        for part in 0..MAX_PARTS {
            let step = self.frequency(part) / self.sample_rate;
            let mut phase = self.phases[part];
            let (left, right) = &mut self.parts[part];
            for i in 0..n {
                let s = (phase * TAU).sin() * LEVEL;
                left[i] = s;
                right[i] = s;
                phase = (phase + step).fract();
            }
            self.phases[part] = phase;
        }

        let (left, right) = &self.parts[0];
        self.master.0[..n].copy_from_slice(&left[..n]);
        self.master.1[..n].copy_from_slice(&right[..n]);
        StereoBlock::new(&self.master.0[..n], &self.master.1[..n])
    }

    fn part(&self, index: usize) -> Option<StereoBlock<'_>> {
        let (left, right) = self.parts.get(index)?;
        Some(StereoBlock::new(&left[..self.frames], &right[..self.frames]))
    }
}

struct Args {
    backend: String,
    seconds: u64,
    config: PathBuf,
    compress: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        backend: "server".to_string(),
        seconds: DEFAULT_SECONDS,
        config: default_config_path(CONFIG_FILE),
        compress: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seconds" => {
                let value = iter.next().context("--seconds needs a value")?;
                args.seconds = value
                    .parse()
                    .with_context(|| format!("Invalid duration: {}", value))?;
            }
            "--config" => args.config = iter.next().context("--config needs a path")?.into(),
            "--compress" => args.compress = true,
            "server" | "oss" => args.backend = arg,
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn run(backend: &mut dyn AudioOut, seconds: u64) -> Result<()> {
    backend
        .start()
        .with_context(|| format!("Failed to start the {} backend", backend.name()))?;
    log::info!(
        "{} running at {} Hz, {} frames per block",
        backend.name(),
        backend.sample_rate(),
        backend.buffer_size()
    );

    std::thread::sleep(Duration::from_secs(seconds));

    backend.stop();
    log::info!("{} stopped", backend.name());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config: IoConfig = load_or_default(&args.config);
    let compression = Compression::new(args.compress || config.output_compression);
    let synth = SineSynth::new();

    match args.backend.as_str() {
        #[cfg(all(target_os = "linux", feature = "jack-backend"))]
        "server" => {
            let mut backend = nio_core::audio::JackBackend::new(
                synth,
                &config,
                compression,
                nio_core::audio::JackConnector,
            );
            run(&mut backend, args.seconds)
        }
        #[cfg(unix)]
        "oss" => {
            let mut backend =
                nio_core::audio::OssBackend::new(synth, &config, compression, nio_core::audio::OssDriver);
            run(&mut backend, args.seconds)
        }
        other => bail!("Backend '{}' is not available in this build", other),
    }
}
