//! The contract every audio backend implements
//!
//! A backend has two independently switchable subsystems, audio and MIDI.
//! [`AudioOut`] supplies `start`/`stop` and the enable toggles on top of the
//! per-subsystem open/close primitives. [`Renderer`] is the realtime half
//! every backend shares: it owns the engine, tracks sample rate and block
//! size, and applies output compression.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::compressor::PeakBank;
use super::error::AudioResult;
use crate::engine::Engine;
use crate::types::{StereoBlock, MAX_BUFFER_SIZE};

// ═══════════════════════════════════════════════════════════════════════════════
// AudioOut
// ═══════════════════════════════════════════════════════════════════════════════

/// Backend lifecycle shared by all host bindings
///
/// Open and close are idempotent per subsystem: opening an open subsystem
/// succeeds without side effects, closing a closed one does nothing.
pub trait AudioOut {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    fn open_audio(&mut self) -> AudioResult<()>;
    fn close_audio(&mut self);
    fn audio_enabled(&self) -> bool;

    /// Backends without MIDI input accept this as a no-op
    fn open_midi(&mut self) -> AudioResult<()> {
        Ok(())
    }
    fn close_midi(&mut self) {}
    fn midi_enabled(&self) -> bool {
        false
    }

    /// Current sample rate (Hz)
    fn sample_rate(&self) -> u32;

    /// Current engine block size (frames)
    fn buffer_size(&self) -> usize;

    fn set_audio_enabled(&mut self, enable: bool) -> AudioResult<()> {
        if enable {
            self.open_audio()
        } else {
            self.close_audio();
            Ok(())
        }
    }

    fn set_midi_enabled(&mut self, enable: bool) -> AudioResult<()> {
        if enable {
            self.open_midi()
        } else {
            self.close_midi();
            Ok(())
        }
    }

    /// Open MIDI, then audio
    ///
    /// If audio fails, a MIDI subsystem opened by this call is closed again.
    fn start(&mut self) -> AudioResult<()> {
        let midi_was_open = self.midi_enabled();
        self.open_midi()?;
        if let Err(e) = self.open_audio() {
            log::error!("{}: failed to open audio: {}", self.name(), e);
            if !midi_was_open {
                self.close_midi();
            }
            return Err(e);
        }
        log::info!(
            "{}: started ({}Hz, {} frames)",
            self.name(),
            self.sample_rate(),
            self.buffer_size()
        );
        Ok(())
    }

    /// Close MIDI, then audio
    fn stop(&mut self) {
        self.close_midi();
        self.close_audio();
        log::info!("{}: stopped", self.name());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Compression flag
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared on/off switch for output compression
///
/// Cloned into every backend; read once per block on the realtime thread.
#[derive(Debug, Clone, Default)]
pub struct Compression(Arc<AtomicBool>);

impl Compression {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Renderer
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine plus the per-stream render state
///
/// Owned by whichever thread drives the stream: the server's process
/// thread, the device thread, or the plugin host thread.
pub struct Renderer<E> {
    engine: E,
    sample_rate: u32,
    block_size: usize,
    compression: Compression,
    peaks: PeakBank,
}

impl<E: Engine> Renderer<E> {
    pub fn new(mut engine: E, sample_rate: u32, block_size: usize, compression: Compression) -> Self {
        let block_size = block_size.clamp(1, MAX_BUFFER_SIZE);
        engine.set_buffer_size(block_size);
        engine.set_sample_rate(sample_rate);
        Self {
            engine,
            sample_rate,
            block_size,
            compression,
            peaks: PeakBank::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Follow the rate the stream actually runs at
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.engine.set_sample_rate(sample_rate);
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Track a host block size change (RT-safe)
    pub fn set_buffer_size(&mut self, frames: usize) {
        let frames = frames.clamp(1, MAX_BUFFER_SIZE);
        if frames != self.block_size {
            self.block_size = frames;
            self.engine.set_buffer_size(frames);
        }
    }

    pub fn compression(&self) -> &Compression {
        &self.compression
    }

    pub fn peaks(&self) -> &PeakBank {
        &self.peaks
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Pull the next master block from the engine
    pub fn next(&mut self) -> StereoBlock<'_> {
        self.engine.render()
    }

    /// Render one master block into two output buffers
    ///
    /// Copies `block_size` frames (zero-filling anything the engine did not
    /// produce), then compresses with pair 0 if enabled.
    pub fn render_into(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = self.block_size.min(left.len()).min(right.len());
        let block = self.engine.render();
        let produced = block.frames().min(frames);

        left[..produced].copy_from_slice(&block.left[..produced]);
        right[..produced].copy_from_slice(&block.right[..produced]);
        left[produced..frames].fill(0.0);
        right[produced..frames].fill(0.0);

        if self.compression.enabled() {
            self.peaks
                .apply_buffers(self.sample_rate, 0, &mut left[..frames], &mut right[..frames]);
        }
    }

    /// Render one block and emit every frame of the first `parts` parts
    ///
    /// `emit(part, frame, l, r)` receives compressed samples when compression
    /// is enabled. Parts the engine does not expose emit silence.
    pub fn render_parts<F>(&mut self, parts: usize, mut emit: F)
    where
        F: FnMut(usize, usize, f32, f32),
    {
        self.engine.render();
        let compress = self.compression.enabled();

        for part in 0..parts {
            let block = self.engine.part(part);
            for frame in 0..self.block_size {
                let (mut l, mut r) = block.map(|b| b.frame(frame)).unwrap_or((0.0, 0.0));
                if compress {
                    self.peaks.apply(self.sample_rate, part, &mut l, &mut r);
                }
                emit(part, frame, l, r);
            }
        }
    }
}
