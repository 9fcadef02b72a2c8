//! `wib-codec` is a pure Rust reorderer and compressor for **464-byte WIB
//! detector frames** (256 channels of packed 12-bit ADC samples plus
//! housekeeping headers).
//!
//! Three codec stages share one header-continuity model (timestamp +25
//! ticks, convert count +1, static fields constant):
//!
//! - [`reorder`](mod@reorder): transpose time-major frames into
//!   channel-major storage,
//!   recording a fault bitmap and full header snapshots for frames that
//!   break continuity. Scalar, AVX2, and AVX512 unpack kernels produce
//!   byte-identical output.
//! - [`huffman`]: static per-fragment prefix coding of sample values,
//!   optionally delta-transformed.
//! - [`range`]: adaptive per-channel histogram coding of sample deltas with
//!   an overflow escape bin and a table-of-contents trailer that makes any
//!   channel decodable without touching the others.
//!
//! # Quick start
//!
//! ```
//! use wib_codec::{frame, reorder, reordered_size};
//!
//! // Two consistent frames: timestamps 25 ticks apart, convert counts
//! // incrementing, static fields constant.
//! let mut src = vec![0u8; 2 * frame::FRAME_SIZE];
//! for i in 0..2 {
//!     let fr = &mut src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
//!     fr[8..16].copy_from_slice(&(1000 + 25 * i as u64).to_le_bytes());
//!     for block in 0..frame::COLDDATA_BLOCKS {
//!         let at = frame::coldata_offset(block) + 8;
//!         fr[at..at + 2].copy_from_slice(&(i as u16).to_le_bytes());
//!     }
//!     frame::put_adc_value(fr, 17, 2048 + i as u16);
//! }
//!
//! let (buf, stats) = reorder(&src, 2)?;
//! assert_eq!(stats.num_faulty, 0);
//! assert_eq!(buf.len(), reordered_size(2, 0));
//! # Ok::<(), wib_codec::WibError>(())
//! ```

pub mod bitio;
mod coder;
pub mod error;
pub mod fault;
pub mod fragment;
pub mod frame;
pub mod huffman;
pub mod range;
pub mod reorder;
mod unpack;

pub use crate::error::WibError;

pub use crate::coder::{ArithDecoder, ArithEncoder};
pub use crate::fault::{FaultFlags, HeaderSnapshot};
pub use crate::fragment::{Fragment, FragmentFormat};
pub use crate::huffman::{CodingMode, HuffmanTree};
pub use crate::range::{DecompressedFragment, TableOfContents, MAX_PACKET_FRAMES};
pub use crate::reorder::{
    Reorderer, ReorderStats, reorder, reorder_into, reorder_into_with, reordered_size,
    reordered_size_max,
};
pub use crate::unpack::SimdLevel;

/// Range-compress `num_frames` frames into a self-contained packet.
///
/// The packet carries frame 0's header snapshot, a prediction-exception
/// list for faulty frames, one range-coded bitstream per channel, and a
/// table-of-contents trailer for random channel access.
pub fn compress(src: &[u8], num_frames: usize) -> Result<Vec<u8>, WibError> {
    range::compress_fragment(src, num_frames)
}

/// Decode a packet produced by [`compress`] back into time-major frames.
pub fn decompress(pkt: &[u8]) -> Result<Vec<u8>, WibError> {
    Ok(range::decompress_fragment(pkt)?.to_frames())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_round_trip_smoke() -> anyhow::Result<()> {
        let mut src = vec![0u8; 4 * frame::FRAME_SIZE];
        for i in 0..4 {
            let fr = &mut src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
            fr[8..16].copy_from_slice(&(500 + 25 * i as u64).to_le_bytes());
            for block in 0..frame::COLDDATA_BLOCKS {
                let at = frame::coldata_offset(block) + 8;
                fr[at..at + 2].copy_from_slice(&(7 + i as u16).to_le_bytes());
            }
            for ch in 0..frame::NUM_CHANNELS {
                frame::put_adc_value(fr, ch, (600 + ch + i) as u16 & 0x0FFF);
            }
        }

        let pkt = compress(&src, 4)?;
        assert_eq!(decompress(&pkt)?, src);
        Ok(())
    }
}
