//! Server process callback, independent of the server library
//!
//! [`ServerProcessor`] runs one block: MIDI first, then OSC, then audio.
//! The server binding exposes the block's port buffers through [`BlockIo`],
//! which keeps this logic testable without a running server.

use thiserror::Error;

use crate::audio::out::Renderer;
use crate::engine::Engine;

/// Port buffers of the current block
///
/// Everything handed out is only valid until the callback returns.
pub trait BlockIo {
    /// Frames in this block
    fn frames(&self) -> usize;

    /// Visit every MIDI event as `(frame offset, raw bytes)`
    fn for_each_midi(&mut self, f: &mut dyn FnMut(u32, &[u8]));

    /// Visit every OSC packet
    fn for_each_osc(&mut self, f: &mut dyn FnMut(&[u8]));

    /// Whether the audio ports are registered
    fn has_outputs(&self) -> bool;

    /// Left and right output buffers, or `None` if the server returned null
    fn outputs(&mut self) -> Option<(&mut [f32], &mut [f32])>;
}

/// Reasons a block could not be produced
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    #[error("server returned a null output buffer")]
    NullBuffer,
}

/// Whether `packet` is a complete OSC message (not a bundle)
///
/// The address must be NUL terminated; a type tag string, if present after
/// the padded address, must start with ',' and be terminated as well.
pub fn is_osc_message(packet: &[u8]) -> bool {
    if packet.first() != Some(&b'/') {
        return false;
    }
    let Some(address_end) = packet.iter().position(|&b| b == 0) else {
        return false;
    };
    let tags_start = (address_end + 4) & !3;
    match packet.get(tags_start..) {
        None | Some([]) => true,
        Some(rest) => rest[0] == b',' && rest.contains(&0),
    }
}

/// Realtime state of a server client: the renderer and nothing else
pub struct ServerProcessor<E> {
    renderer: Renderer<E>,
}

impl<E: Engine> ServerProcessor<E> {
    pub fn new(renderer: Renderer<E>) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &Renderer<E> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<E> {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> Renderer<E> {
        self.renderer
    }

    /// Buffer-size callback
    pub fn set_buffer_size(&mut self, frames: usize) {
        self.renderer.set_buffer_size(frames);
    }

    /// Produce one block
    ///
    /// MIDI timestamps are only sample accurate while the audio ports exist;
    /// otherwise events are stamped at frame 0. OSC and audio are handled
    /// only while the audio ports exist.
    pub fn process<B: BlockIo + ?Sized>(&mut self, io: &mut B) -> Result<(), ProcessError> {
        let frames = io.frames();
        if frames != self.renderer.block_size() {
            self.renderer.set_buffer_size(frames);
        }

        let sample_accurate = io.has_outputs();
        let engine = self.renderer.engine_mut();
        io.for_each_midi(&mut |time, bytes| {
            let time = if sample_accurate { time } else { 0 };
            nio_midi::dispatch(bytes, time, &mut *engine);
        });

        if !io.has_outputs() {
            return Ok(());
        }

        io.for_each_osc(&mut |packet| {
            if is_osc_message(packet) {
                engine.apply_osc(packet);
            }
        });

        let (left, right) = io.outputs().ok_or(ProcessError::NullBuffer)?;
        self.renderer.render_into(left, right);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::out::Compression;
    use crate::types::{StereoBlock, MAX_BUFFER_SIZE};
    use nio_midi::{MidiEvent, MidiEventKind, MidiSink};

    /// Engine that records what reaches it and renders a constant level
    struct Recorder {
        frames: usize,
        level: f32,
        left: Vec<f32>,
        right: Vec<f32>,
        log: Vec<String>,
        events: Vec<MidiEvent>,
        raw: Vec<[u8; 3]>,
        osc: Vec<Vec<u8>>,
    }

    impl Recorder {
        fn new(level: f32) -> Self {
            Self {
                frames: 0,
                level,
                left: vec![0.0; MAX_BUFFER_SIZE],
                right: vec![0.0; MAX_BUFFER_SIZE],
                log: Vec::new(),
                events: Vec::new(),
                raw: Vec::new(),
                osc: Vec::new(),
            }
        }
    }

    impl MidiSink for Recorder {
        fn midi_event(&mut self, event: MidiEvent) {
            self.log.push("midi".into());
            self.events.push(event);
        }

        fn raw_midi(&mut self, window: [u8; 3]) {
            self.raw.push(window);
        }
    }

    impl Engine for Recorder {
        fn set_buffer_size(&mut self, frames: usize) {
            self.frames = frames;
        }

        fn render(&mut self) -> StereoBlock<'_> {
            self.log.push("render".into());
            self.left[..self.frames].fill(self.level);
            self.right[..self.frames].fill(self.level);
            StereoBlock::new(&self.left[..self.frames], &self.right[..self.frames])
        }

        fn apply_osc(&mut self, message: &[u8]) {
            self.log.push("osc".into());
            self.osc.push(message.to_vec());
        }
    }

    /// In-memory port buffers
    struct Block {
        frames: usize,
        midi: Vec<(u32, Vec<u8>)>,
        osc: Vec<Vec<u8>>,
        outputs: Option<(Vec<f32>, Vec<f32>)>,
        null_buffers: bool,
    }

    impl Block {
        fn new(frames: usize) -> Self {
            Self {
                frames,
                midi: Vec::new(),
                osc: Vec::new(),
                outputs: Some((vec![7.0; frames], vec![7.0; frames])),
                null_buffers: false,
            }
        }
    }

    impl BlockIo for Block {
        fn frames(&self) -> usize {
            self.frames
        }

        fn for_each_midi(&mut self, f: &mut dyn FnMut(u32, &[u8])) {
            for (time, bytes) in &self.midi {
                f(*time, bytes);
            }
        }

        fn for_each_osc(&mut self, f: &mut dyn FnMut(&[u8])) {
            for packet in &self.osc {
                f(packet);
            }
        }

        fn has_outputs(&self) -> bool {
            self.outputs.is_some()
        }

        fn outputs(&mut self) -> Option<(&mut [f32], &mut [f32])> {
            if self.null_buffers {
                return None;
            }
            self.outputs
                .as_mut()
                .map(|(l, r)| (l.as_mut_slice(), r.as_mut_slice()))
        }
    }

    fn processor(level: f32, compression: bool) -> ServerProcessor<Recorder> {
        ServerProcessor::new(Renderer::new(
            Recorder::new(level),
            48000,
            256,
            Compression::new(compression),
        ))
    }

    #[test]
    fn test_silent_block_with_compression_stays_zero() {
        let mut proc = processor(0.0, true);
        let mut block = Block::new(1024);
        proc.process(&mut block).unwrap();

        let (l, r) = block.outputs.unwrap();
        assert!(l.iter().all(|&s| s == 0.0), "left must be exactly zero");
        assert!(r.iter().all(|&s| s == 0.0), "right must be exactly zero");
        assert_eq!(proc.renderer().peaks().peak(0), 0.0);
    }

    #[test]
    fn test_block_size_tracks_host() {
        let mut proc = processor(0.5, false);
        for frames in [1024, 64, 333] {
            let mut block = Block::new(frames);
            proc.process(&mut block).unwrap();
            assert_eq!(proc.renderer().block_size(), frames);
            assert_eq!(proc.renderer().engine().frames, frames);
            let (l, _) = block.outputs.unwrap();
            assert!(l.iter().all(|&s| s == 0.5), "all {} frames rendered", frames);
        }
    }

    #[test]
    fn test_buffer_size_callback_applies_before_next_render() {
        let mut proc = processor(0.5, false);
        proc.set_buffer_size(128);
        assert_eq!(proc.renderer_mut().next().frames(), 128);
    }

    #[test]
    fn test_midi_is_applied_before_audio() {
        let mut proc = processor(0.0, false);
        let mut block = Block::new(64);
        block.midi.push((10, vec![0x90, 60, 100]));
        block.midi.push((20, vec![0x80, 60, 0]));
        proc.process(&mut block).unwrap();

        let engine = proc.renderer().engine();
        assert_eq!(engine.log, vec!["midi", "midi", "render"]);
        assert_eq!(engine.events[0].time, 10);
        assert_eq!(engine.events[1].time, 20);
        assert_eq!(engine.events[1].kind, MidiEventKind::Note);
    }

    #[test]
    fn test_midi_without_audio_is_not_sample_accurate() {
        let mut proc = processor(0.0, false);
        let mut block = Block::new(64);
        block.outputs = None;
        block.midi.push((33, vec![0xB0, 7, 100]));
        block.osc.push(b"/volume\0,f\0\0\0\0\0\0".to_vec());
        proc.process(&mut block).unwrap();

        let engine = proc.renderer().engine();
        assert_eq!(engine.events.len(), 1);
        assert_eq!(engine.events[0].time, 0);
        assert!(engine.osc.is_empty(), "OSC needs the audio ports");
        assert!(!engine.log.contains(&"render".to_string()));
    }

    #[test]
    fn test_unknown_midi_reaches_raw_handler() {
        let mut proc = processor(0.0, false);
        let mut block = Block::new(16);
        block.midi.push((0, vec![0xF2, 0x10, 0x20, 0x30]));
        proc.process(&mut block).unwrap();
        assert_eq!(
            proc.renderer().engine().raw,
            vec![[0xF2, 0x10, 0x20], [0x30, 0, 0]]
        );
    }

    #[test]
    fn test_osc_filter() {
        let mut proc = processor(0.0, false);
        let mut block = Block::new(16);
        block.osc.push(b"#bundle\0\0\0\0\0\0\0\0\x01".to_vec());
        block.osc.push(b"/part0/Pvolume\0\0,i\0\0\0\0\0\x40".to_vec());
        block.osc.push(b"/truncated".to_vec());
        block.osc.push(Vec::new());
        proc.process(&mut block).unwrap();

        let engine = proc.renderer().engine();
        assert_eq!(engine.osc.len(), 1, "only the well-formed message is forwarded");
        assert!(engine.osc[0].starts_with(b"/part0/Pvolume"));
        assert_eq!(engine.log, vec!["osc", "render"]);
    }

    #[test]
    fn test_null_buffer_aborts_block() {
        let mut proc = processor(0.3, false);
        let mut block = Block::new(32);
        block.null_buffers = true;
        assert_eq!(proc.process(&mut block), Err(ProcessError::NullBuffer));
        assert!(!proc.renderer().engine().log.contains(&"render".to_string()));
    }

    #[test]
    fn test_osc_message_shapes() {
        assert!(is_osc_message(b"/a\0\0"));
        assert!(is_osc_message(b"/a\0\0,f\0\0\0\0\0\0"));
        assert!(is_osc_message(b"/abc\0"), "unpadded address-only message");
        assert!(!is_osc_message(b"/a\0\0xf\0\0"), "type tags must start with ','");
        assert!(!is_osc_message(b"/a\0\0,ff"), "unterminated type tags");
        assert!(!is_osc_message(b"#bundle\0"));
        assert!(!is_osc_message(b""));
    }
}
