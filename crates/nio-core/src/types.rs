//! Common types for the I/O layer

/// Maximum number of synth parts that can be routed to separate outputs
pub const MAX_PARTS: usize = 16;

/// Maximum block size the backends pre-allocate for (frames)
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Default engine block size (frames)
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Default sample rate (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Audio sample type
pub type Sample = f32;

/// One rendered block, split into left and right channels
///
/// Borrowed from the engine; valid until the next render.
#[derive(Debug, Clone, Copy)]
pub struct StereoBlock<'a> {
    pub left: &'a [Sample],
    pub right: &'a [Sample],
}

impl<'a> StereoBlock<'a> {
    #[inline]
    pub fn new(left: &'a [Sample], right: &'a [Sample]) -> Self {
        Self { left, right }
    }

    /// Number of frames available in both channels
    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    /// Frame `i` as (left, right), or silence past the end
    #[inline]
    pub fn frame(&self, i: usize) -> (Sample, Sample) {
        match (self.left.get(i), self.right.get(i)) {
            (Some(&l), Some(&r)) => (l, r),
            _ => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_frames_uses_shorter_channel() {
        let l = [0.1f32; 8];
        let r = [0.2f32; 6];
        let block = StereoBlock::new(&l, &r);
        assert_eq!(block.frames(), 6);
        assert_eq!(block.frame(5), (0.1, 0.2));
        assert_eq!(block.frame(6), (0.0, 0.0), "past the end should be silence");
    }
}
