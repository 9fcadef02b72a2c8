//! Channel-major reordering of time-major frame buffers.
//!
//! A reordered buffer has three regions:
//!
//! ```text
//! [fault bitmap: ceil(N/8) bytes, bit i set when frame i was faulty]
//! [header snapshots: (num_faulty + 1) x 80 bytes, frame 0 first]
//! [ADC data: 256 channel runs of N little-endian u16 samples]
//! ```
//!
//! Frame 0 is a forced baseline: unconditionally snapshotted, its bitmap bit
//! always clear. Every later frame is compared against the prediction from
//! the previous frame's observed header; a mismatch appends a snapshot and
//! sets the frame's bit. Consistent headers are not stored at all; they are
//! reproducible from the baseline by prediction.
//!
//! The header-snapshot region sits in front of the ADC data and its size
//! depends on the final faulty count, so partial (streamed) input
//! accumulates in a [`Reorderer`] and the layout is assembled by `finish`.
//! Output is identical whether frames arrive in one call or any contiguous
//! chunking.

use crate::error::WibError;
use crate::fault::{self, HeaderSnapshot};
use crate::frame;
use crate::unpack::{self, SimdLevel};

/// Outcome of a completed reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderStats {
    /// Frames whose header disagreed with prediction (frame 0 never counts).
    pub num_faulty: usize,
    /// Bytes written to the destination; always equals
    /// [`reordered_size`]`(num_frames, num_faulty)`.
    pub bytes_written: usize,
}

/// Exact size in bytes of a reordered buffer.
///
/// Zero frames reorder to zero bytes: with no frames there is no baseline
/// snapshot to store.
pub fn reordered_size(num_frames: usize, num_faulty: usize) -> usize {
    if num_frames == 0 {
        return 0;
    }
    bitmap_size(num_frames)
        + (num_faulty + 1) * frame::HEADERS_SIZE
        + 2 * frame::NUM_CHANNELS * num_frames
}

/// Upper bound on the reordered size before the faulty count is known:
/// every frame after the baseline faulty.
pub fn reordered_size_max(num_frames: usize) -> usize {
    reordered_size(num_frames, num_frames.saturating_sub(1))
}

fn bitmap_size(num_frames: usize) -> usize {
    num_frames.div_ceil(8)
}

/// Incremental reorderer. Feed contiguous frame ranges with
/// [`reorder_part`], then assemble the final layout with [`finish_into`] or
/// [`finish`].
///
/// [`reorder_part`]: Reorderer::reorder_part
/// [`finish_into`]: Reorderer::finish_into
/// [`finish`]: Reorderer::finish
#[derive(Debug, Clone)]
pub struct Reorderer {
    num_frames: usize,
    next_frame: usize,
    level: SimdLevel,
    bitmap: Vec<u8>,
    snapshots: Vec<u8>,
    num_faulty: usize,
    prev: Option<HeaderSnapshot>,
    // Channel-major sample store, one run of num_frames per channel.
    adc: Vec<u16>,
}

impl Reorderer {
    pub fn new(num_frames: usize) -> Reorderer {
        Reorderer::with_simd_level(num_frames, SimdLevel::detect())
    }

    /// Reorderer pinned to a specific unpack kernel. Falls back to scalar if
    /// the requested kernel is unavailable on this CPU.
    pub fn with_simd_level(num_frames: usize, level: SimdLevel) -> Reorderer {
        let level = if level.is_available() { level } else { SimdLevel::Scalar };
        Reorderer {
            num_frames,
            next_frame: 0,
            level,
            bitmap: vec![0u8; bitmap_size(num_frames)],
            snapshots: Vec::with_capacity(frame::HEADERS_SIZE),
            num_faulty: 0,
            prev: None,
            adc: vec![0u16; frame::NUM_CHANNELS * num_frames],
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Frames consumed so far.
    pub fn frames_consumed(&self) -> usize {
        self.next_frame
    }

    /// Faulty frames seen so far.
    pub fn num_faulty(&self) -> usize {
        self.num_faulty
    }

    pub fn simd_level(&self) -> SimdLevel {
        self.level
    }

    /// Process frames `[frames_start, frames_stop)` of `src`, where `src`
    /// holds the frames of the whole fragment back to back. Ranges must be
    /// fed in order and without gaps; `src` only needs to be valid up to the
    /// end of the requested range.
    pub fn reorder_part(
        &mut self,
        src: &[u8],
        frames_start: usize,
        frames_stop: usize,
    ) -> Result<(), WibError> {
        if frames_start != self.next_frame {
            return Err(WibError::InvalidInput("frame ranges must be contiguous and in order"));
        }
        if frames_stop < frames_start || frames_stop > self.num_frames {
            return Err(WibError::InvalidInput("frame range out of bounds"));
        }
        if src.len() < frames_stop * frame::FRAME_SIZE {
            return Err(WibError::InvalidInput("source buffer shorter than the frame range"));
        }

        for i in frames_start..frames_stop {
            let fr = &src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
            self.track_header(fr, i);
        }

        let mut i = frames_start;
        if self.level == SimdLevel::Avx512 {
            let mut batch = [[0u16; frame::NUM_CHANNELS]; 4];
            while i + 4 <= frames_stop {
                let at = |k: usize| {
                    &src[(i + k) * frame::FRAME_SIZE..(i + k + 1) * frame::FRAME_SIZE]
                };
                unpack::unpack_frames_x4([at(0), at(1), at(2), at(3)], self.level, &mut batch);
                for (k, vals) in batch.iter().enumerate() {
                    self.scatter(vals, i + k);
                }
                i += 4;
            }
        }
        let mut vals = [0u16; frame::NUM_CHANNELS];
        while i < frames_stop {
            let fr = &src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
            unpack::unpack_frame(fr, self.level, &mut vals);
            self.scatter(&vals, i);
            i += 1;
        }

        self.next_frame = frames_stop;
        Ok(())
    }

    fn track_header(&mut self, fr: &[u8], index: usize) {
        let snap = HeaderSnapshot::from_frame(fr);
        match self.prev {
            None => self.push_snapshot(&snap),
            Some(prev) => {
                let expected = prev.predict_next();
                if !fault::compare(&snap, &expected).is_empty() {
                    self.bitmap[index / 8] |= 1 << (index % 8);
                    self.push_snapshot(&snap);
                    self.num_faulty += 1;
                }
            }
        }
        // The observed frame is always the next prediction baseline.
        self.prev = Some(snap);
    }

    fn push_snapshot(&mut self, snap: &HeaderSnapshot) {
        let at = self.snapshots.len();
        self.snapshots.resize(at + frame::HEADERS_SIZE, 0);
        snap.write_to(&mut self.snapshots[at..]);
    }

    fn scatter(&mut self, vals: &[u16; frame::NUM_CHANNELS], index: usize) {
        for (ch, &v) in vals.iter().enumerate() {
            self.adc[ch * self.num_frames + index] = v;
        }
    }

    /// Assemble the reordered layout into `dst`. All frames must have been
    /// consumed. `dst` may be larger than required; only the returned
    /// `bytes_written` prefix is meaningful.
    pub fn finish_into(&self, dst: &mut [u8]) -> Result<ReorderStats, WibError> {
        if self.next_frame != self.num_frames {
            return Err(WibError::InvalidInput("finish called before all frames were consumed"));
        }
        let required = reordered_size(self.num_frames, self.num_faulty);
        if dst.len() < required {
            return Err(WibError::Capacity { required, provided: dst.len() });
        }

        let mut at = 0;
        dst[at..at + self.bitmap.len()].copy_from_slice(&self.bitmap);
        at += self.bitmap.len();
        dst[at..at + self.snapshots.len()].copy_from_slice(&self.snapshots);
        at += self.snapshots.len();
        for &v in &self.adc {
            dst[at..at + 2].copy_from_slice(&v.to_le_bytes());
            at += 2;
        }
        debug_assert_eq!(at, required);

        Ok(ReorderStats { num_faulty: self.num_faulty, bytes_written: required })
    }

    /// Allocating variant of [`finish_into`](Reorderer::finish_into).
    pub fn finish(&self) -> Result<(Vec<u8>, ReorderStats), WibError> {
        let mut out = vec![0u8; reordered_size(self.num_frames, self.num_faulty)];
        let stats = self.finish_into(&mut out)?;
        Ok((out, stats))
    }
}

/// One-shot reorder of `num_frames` frames from `src` into `dst`.
///
/// `dst` must hold at least [`reordered_size`]`(num_frames, num_faulty)`
/// bytes; size it with [`reordered_size_max`] when the faulty count is
/// unknown. On a capacity failure no partial output is valid.
pub fn reorder_into(dst: &mut [u8], src: &[u8], num_frames: usize) -> Result<ReorderStats, WibError> {
    reorder_into_with(dst, src, num_frames, SimdLevel::detect())
}

/// [`reorder_into`] pinned to a specific unpack kernel.
pub fn reorder_into_with(
    dst: &mut [u8],
    src: &[u8],
    num_frames: usize,
    level: SimdLevel,
) -> Result<ReorderStats, WibError> {
    let mut r = Reorderer::with_simd_level(num_frames, level);
    r.reorder_part(src, 0, num_frames)?;
    r.finish_into(dst)
}

/// Allocating one-shot reorder.
pub fn reorder(src: &[u8], num_frames: usize) -> Result<(Vec<u8>, ReorderStats), WibError> {
    let mut r = Reorderer::new(num_frames);
    r.reorder_part(src, 0, num_frames)?;
    r.finish()
}

/// Read sample `(channel, tick)` directly from a reordered buffer produced
/// with `num_frames` frames and `num_faulty` faults.
pub fn reordered_adc(
    buf: &[u8],
    num_frames: usize,
    num_faulty: usize,
    channel: usize,
    tick: usize,
) -> Result<u16, WibError> {
    if channel >= frame::NUM_CHANNELS || tick >= num_frames {
        return Err(WibError::InvalidInput("channel or tick out of range"));
    }
    if buf.len() < reordered_size(num_frames, num_faulty) {
        return Err(WibError::Format("reordered buffer shorter than its metadata claims"));
    }
    let adc_base = bitmap_size(num_frames) + (num_faulty + 1) * frame::HEADERS_SIZE;
    let off = adc_base + 2 * (channel * num_frames + tick);
    Ok(u16::from_le_bytes([buf[off], buf[off + 1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_formula() {
        assert_eq!(reordered_size(0, 0), 0);
        assert_eq!(reordered_size(1, 0), 1 + 80 + 512);
        assert_eq!(reordered_size(8, 0), 1 + 80 + 8 * 512);
        assert_eq!(reordered_size(9, 2), 2 + 3 * 80 + 9 * 512);
        assert_eq!(reordered_size_max(9), reordered_size(9, 8));
    }

    #[test]
    fn empty_fragment_reorders_to_nothing() -> anyhow::Result<()> {
        let (buf, stats) = reorder(&[], 0)?;
        assert!(buf.is_empty());
        assert_eq!(stats.num_faulty, 0);
        assert_eq!(stats.bytes_written, 0);
        Ok(())
    }

    #[test]
    fn non_contiguous_ranges_are_rejected() {
        let src = vec![0u8; 4 * frame::FRAME_SIZE];
        let mut r = Reorderer::with_simd_level(4, SimdLevel::Scalar);
        r.reorder_part(&src, 0, 2).unwrap();
        assert!(r.reorder_part(&src, 3, 4).is_err());
        assert!(r.finish().is_err());
    }

    #[test]
    fn capacity_error_reports_required_size() {
        let src = vec![0u8; frame::FRAME_SIZE];
        let mut dst = vec![0u8; 8];
        match reorder_into_with(&mut dst, &src, 1, SimdLevel::Scalar) {
            Err(WibError::Capacity { required, provided }) => {
                assert_eq!(required, reordered_size(1, 0));
                assert_eq!(provided, 8);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }
}
