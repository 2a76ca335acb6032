//! Multi-channel DSP device backend
//!
//! Every synth part gets its own stereo pair on one interleaved device
//! stream. A backend-owned thread renders, interleaves and blocks in
//! `write`; closing the device is what releases it.
//!
//! ```text
//! frame 0: [p0.L p0.R p1.L p1.R ... pN.L pN.R]
//! frame 1: [p0.L p0.R ...]
//! ```

#[cfg(unix)]
mod oss;

#[cfg(unix)]
pub use oss::{OssDevice, OssDriver};

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use super::config::{DspConfig, IoConfig};
use super::error::{AudioError, AudioResult};
use super::out::{AudioOut, Compression, Renderer};
use crate::engine::Engine;
use crate::types::MAX_PARTS;

/// DSP device backend on OSS
#[cfg(unix)]
pub type OssBackend<E> = MultiDeviceBackend<E, OssDriver>;

/// Smallest and largest fragment size exponent requested from the device
const FRAGMENT_SHIFT_MIN: u32 = 4;
const FRAGMENT_SHIFT_MAX: u32 = 20;

/// Two fragments in the fragment request's upper half
const FRAGMENT_COUNT: i32 = 0x0002_0000;

/// Handle to an opened DSP device
///
/// Negotiation calls are made before the device thread starts. `write` and
/// `close` may then race: `close` has to make a blocked `write` return.
pub trait DspDevice: Send + Sync + 'static {
    /// Request a sample format, returning the one the device chose
    fn set_format(&self, code: i32) -> io::Result<i32>;
    /// Request a channel count, returning the one the device chose
    fn set_channels(&self, channels: i32) -> io::Result<i32>;
    /// Request a sample rate, returning the one the device chose
    fn set_sample_rate(&self, rate: i32) -> io::Result<i32>;
    /// Request a fragment layout (`count << 16 | size_shift`)
    fn set_fragment(&self, request: i32) -> io::Result<()>;
    /// Blocking write of interleaved samples
    fn write(&self, bytes: &[u8]) -> io::Result<usize>;
    /// Invalidate the handle and release the device
    fn close(&self);
    fn is_open(&self) -> bool;
}

/// Opens DSP devices by path
pub trait DspDriver {
    type Device: DspDevice;

    fn open(&mut self, path: &Path) -> io::Result<Self::Device>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Format negotiation
// ═══════════════════════════════════════════════════════════════════════════════

/// Native-endian signed integer sample formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16,
    S32,
}

impl SampleFormat {
    /// OSS `AFMT_*` code for this format in native byte order
    pub fn code(self) -> i32 {
        #[cfg(target_endian = "little")]
        const CODES: (i32, i32) = (0x0000_0010, 0x0000_1000);
        #[cfg(target_endian = "big")]
        const CODES: (i32, i32) = (0x0000_0020, 0x0000_2000);

        match self {
            Self::S16 => CODES.0,
            Self::S32 => CODES.1,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::S32 => 4,
        }
    }

    /// Scale a float sample and store it in `out`
    ///
    /// Out-of-range input saturates at the integer limits.
    #[inline]
    pub fn store(self, sample: f32, out: &mut [u8]) {
        match self {
            Self::S16 => out.copy_from_slice(&((sample * 32767.0) as i16).to_ne_bytes()),
            Self::S32 => out.copy_from_slice(&((sample * 2147483647.0) as i32).to_ne_bytes()),
        }
    }
}

/// Parameters the device agreed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample: SampleFormat,
    /// Interleaved channels, always even
    pub channels: usize,
    pub sample_rate: u32,
    pub block_size: usize,
}

impl StreamFormat {
    /// Stereo parts carried by the stream
    pub fn parts(&self) -> usize {
        self.channels / 2
    }

    /// Bytes in one interleaved block
    pub fn block_bytes(&self) -> usize {
        self.block_size * self.channels * self.sample.bytes()
    }

    /// `SNDCTL_DSP_SETFRAGMENT` request for double buffering one block
    pub fn fragment_request(&self) -> i32 {
        let bytes = self.block_bytes();
        let shift = (FRAGMENT_SHIFT_MIN..FRAGMENT_SHIFT_MAX)
            .find(|&x| (1usize << x) >= bytes)
            .unwrap_or(FRAGMENT_SHIFT_MAX);
        FRAGMENT_COUNT | shift as i32
    }
}

fn negotiate_format<D: DspDevice>(device: &D) -> AudioResult<SampleFormat> {
    for format in [SampleFormat::S32, SampleFormat::S16] {
        match device.set_format(format.code()) {
            Ok(code) if code == format.code() => return Ok(format),
            Ok(code) => log::debug!("Device offered format {:#x} for {:?}", code, format),
            Err(e) => log::debug!("Device rejected {:?}: {}", format, e),
        }
    }
    Err(AudioError::FormatUnsupported)
}

/// Ask for one pair per part, then fewer, taking the first answer
fn negotiate_channels<D: DspDevice>(device: &D) -> AudioResult<usize> {
    let most = (MAX_PARTS * 2) as i32;
    for request in (2..=most).rev().step_by(2) {
        if let Ok(granted) = device.set_channels(request) {
            let even = granted.clamp(0, most) & !1;
            return if even >= 2 {
                Ok(even as usize)
            } else {
                Err(AudioError::ChannelsUnsupported)
            };
        }
    }
    Err(AudioError::ChannelsUnsupported)
}

/// Negotiate format, channels and rate, then request the fragment layout
pub fn negotiate<D: DspDevice>(
    device: &D,
    sample_rate: u32,
    block_size: usize,
) -> AudioResult<StreamFormat> {
    let sample = negotiate_format(device)?;
    let channels = negotiate_channels(device)?;

    let actual = device
        .set_sample_rate(sample_rate as i32)
        .unwrap_or_default();
    if actual != sample_rate as i32 {
        return Err(AudioError::SampleRateMismatch {
            requested: sample_rate,
            actual: actual.max(0) as u32,
        });
    }

    let format = StreamFormat {
        sample,
        channels,
        sample_rate,
        block_size,
    };
    if let Err(e) = device.set_fragment(format.fragment_request()) {
        log::debug!("Fragment request ignored: {}", e);
    }
    Ok(format)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Device thread
// ═══════════════════════════════════════════════════════════════════════════════

/// Write a whole block, retrying on `EINTR`
///
/// Returns false once the device is closed or failed.
fn write_block<D: DspDevice>(device: &D, mut bytes: &[u8]) -> bool {
    while !bytes.is_empty() {
        if !device.is_open() {
            return false;
        }
        match device.write(bytes) {
            Ok(0) => return false,
            Ok(n) => bytes = &bytes[n.min(bytes.len())..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return false,
        }
    }
    true
}

#[cfg(unix)]
fn prepare_device_thread() {
    use nix::sys::signal::{SigSet, Signal};

    // The device may be a pipe whose reader goes away
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGPIPE);
    if let Err(e) = mask.thread_block() {
        log::warn!("Failed to mask SIGPIPE on the device thread: {}", e);
    }

    if let Err(e) =
        thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max)
    {
        log::warn!("Device thread runs without realtime priority: {:?}", e);
    }
}

#[cfg(not(unix))]
fn prepare_device_thread() {}

fn run_stream<E: Engine, D: DspDevice>(
    mut renderer: Renderer<E>,
    device: Arc<D>,
    format: StreamFormat,
) -> Renderer<E> {
    prepare_device_thread();

    let width = format.sample.bytes();
    let channels = format.channels;
    let mut buffer = vec![0u8; format.block_bytes()];

    while device.is_open() {
        renderer.render_parts(format.parts(), |part, frame, l, r| {
            let at = (frame * channels + part * 2) * width;
            format.sample.store(l, &mut buffer[at..at + width]);
            format.sample.store(r, &mut buffer[at + width..at + 2 * width]);
        });

        if !write_block(&*device, &buffer) {
            break;
        }
    }

    renderer
}

// ═══════════════════════════════════════════════════════════════════════════════
// Backend
// ═══════════════════════════════════════════════════════════════════════════════

enum Stream<E: Engine, D> {
    Idle(Renderer<E>),
    Running {
        device: Arc<D>,
        thread: JoinHandle<Option<Renderer<E>>>,
        format: StreamFormat,
    },
    /// The device thread panicked and took the engine with it
    Lost,
}

/// Per-part output to a multi-channel DSP device
pub struct MultiDeviceBackend<E: Engine, K: DspDriver> {
    driver: K,
    dsp: DspConfig,
    stream: Stream<E, K::Device>,
    /// Stack size of the device thread; the platform default when `None`
    stack_size: Option<usize>,
}

impl<E: Engine, K: DspDriver> MultiDeviceBackend<E, K> {
    pub fn new(engine: E, config: &IoConfig, compression: Compression, driver: K) -> Self {
        let renderer = Renderer::new(engine, config.sample_rate, config.block_size(), compression);
        Self {
            driver,
            dsp: config.dsp.clone(),
            stream: Stream::Idle(renderer),
            stack_size: None,
        }
    }

    /// Stack size for device threads started from now on
    pub fn set_thread_stack_size(&mut self, bytes: Option<usize>) {
        self.stack_size = bytes;
    }

    fn device_thread(&self) -> std::thread::Builder {
        let builder = std::thread::Builder::new().name("dsp-device".into());
        match self.stack_size {
            Some(bytes) => builder.stack_size(bytes),
            None => builder,
        }
    }

    /// Format of the running stream
    pub fn format(&self) -> Option<StreamFormat> {
        match &self.stream {
            Stream::Running { format, .. } => Some(*format),
            _ => None,
        }
    }

    /// Stop the stream and hand the engine back
    pub fn into_engine(mut self) -> Option<E> {
        self.close_audio();
        match std::mem::replace(&mut self.stream, Stream::Lost) {
            Stream::Idle(renderer) => Some(renderer.into_engine()),
            _ => None,
        }
    }

    /// Join the device thread, recovering the renderer
    fn join(&mut self) {
        if let Stream::Running { device, thread, .. } =
            std::mem::replace(&mut self.stream, Stream::Lost)
        {
            device.close();
            match thread.join() {
                Ok(Some(renderer)) => self.stream = Stream::Idle(renderer),
                Ok(None) => log::error!("DSP device thread started without the engine"),
                Err(_) => log::error!("DSP device thread panicked, engine lost"),
            }
        }
    }

    fn spawn(&mut self) -> AudioResult<()> {
        let path = self.dsp.device_path();
        let Stream::Idle(renderer) = &self.stream else {
            return Err(AudioError::EngineLost);
        };

        let device = self.driver.open(&path).map_err(|source| AudioError::DeviceOpen {
            path: path.display().to_string(),
            source,
        })?;

        let format = match negotiate(&device, renderer.sample_rate(), renderer.block_size()) {
            Ok(format) => format,
            Err(e) => {
                device.close();
                return Err(e);
            }
        };

        let Stream::Idle(renderer) = std::mem::replace(&mut self.stream, Stream::Lost) else {
            return Err(AudioError::EngineLost);
        };
        let device = Arc::new(device);
        let thread_device = Arc::clone(&device);

        // The thread takes the renderer from the slot, so it can be taken
        // back if the thread never starts
        let handoff = Arc::new(Mutex::new(Some(renderer)));
        let thread_handoff = Arc::clone(&handoff);
        let spawned = self.device_thread().spawn(move || {
            let renderer = thread_handoff
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            renderer.map(|renderer| run_stream(renderer, thread_device, format))
        });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                device.close();
                let renderer = handoff.lock().unwrap_or_else(PoisonError::into_inner).take();
                self.stream = renderer.map_or(Stream::Lost, Stream::Idle);
                return Err(AudioError::ThreadSpawn(e));
            }
        };

        log::info!(
            "Opened {:?}: {:?}, {} channels, {} Hz, {} frames per block",
            path,
            format.sample,
            format.channels,
            format.sample_rate,
            format.block_size
        );
        self.stream = Stream::Running {
            device,
            thread,
            format,
        };
        Ok(())
    }
}

impl<E: Engine, K: DspDriver> AudioOut for MultiDeviceBackend<E, K> {
    fn name(&self) -> &'static str {
        "OSS-MULTI"
    }

    fn open_audio(&mut self) -> AudioResult<()> {
        if let Stream::Running { device, thread, .. } = &self.stream {
            if device.is_open() && !thread.is_finished() {
                return Ok(());
            }
            // Stream died on a write error; reclaim the engine first
            self.join();
        }
        self.spawn()
    }

    fn close_audio(&mut self) {
        if matches!(self.stream, Stream::Running { .. }) {
            self.join();
            log::info!("Closed DSP device");
        }
    }

    fn audio_enabled(&self) -> bool {
        match &self.stream {
            Stream::Running { device, .. } => device.is_open(),
            _ => false,
        }
    }

    fn sample_rate(&self) -> u32 {
        match &self.stream {
            Stream::Idle(renderer) => renderer.sample_rate(),
            Stream::Running { format, .. } => format.sample_rate,
            Stream::Lost => 0,
        }
    }

    fn buffer_size(&self) -> usize {
        match &self.stream {
            Stream::Idle(renderer) => renderer.block_size(),
            Stream::Running { format, .. } => format.block_size,
            Stream::Lost => 0,
        }
    }
}

impl<E: Engine, K: DspDriver> Drop for MultiDeviceBackend<E, K> {
    fn drop(&mut self) {
        self.close_audio();
    }
}
