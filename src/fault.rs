//! Header continuity model shared by the reorderer and the range coder.
//!
//! Between consecutive frames the WIB timestamp advances by exactly 25 ticks,
//! every ColdData convert count advances by one, and all remaining header
//! fields are held constant. A frame whose header disagrees with this
//! prediction is *faulty*: recorded, never fatal, and the observed header
//! becomes the baseline for the next prediction.

use bitflags::bitflags;

use crate::error::WibError;
use crate::frame;

bitflags! {
    /// One bit per header unit that deviated from prediction.
    ///
    /// The low six bits are serialized verbatim as the range coder's
    /// exception mask; each ColdData continuity check is independent of the
    /// others.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u8 {
        /// Static WIB identity word (start marker, crate/version/slot/fiber,
        /// femb/link flags) changed.
        const WIB_STATIC    = 1 << 0;
        /// Timestamp did not advance by exactly 25 ticks.
        const WIB_TIMESTAMP = 1 << 1;
        /// ColdData block 0 header broke continuity.
        const COLDDATA0     = 1 << 2;
        /// ColdData block 1 header broke continuity.
        const COLDDATA1     = 1 << 3;
        /// ColdData block 2 header broke continuity.
        const COLDDATA2     = 1 << 4;
        /// ColdData block 3 header broke continuity.
        const COLDDATA3     = 1 << 5;
    }
}

impl FaultFlags {
    /// Flag for ColdData block `block` (0..=3).
    pub fn coldata(block: usize) -> FaultFlags {
        FaultFlags::from_bits_truncate(FaultFlags::COLDDATA0.bits() << block)
    }
}

/// Full copy of one frame's header fields: the 16-byte WIB header plus the
/// four 16-byte ColdData headers. This is the unit written to the reordered
/// buffer for the baseline frame and for every faulty frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSnapshot {
    pub wib: [u8; frame::WIB_HEADER_SIZE],
    pub coldata: [[u8; frame::COLDDATA_HEADER_SIZE]; frame::COLDDATA_BLOCKS],
}

impl HeaderSnapshot {
    /// Snapshot the header fields of a frame. `frame` must hold at least
    /// [`frame::FRAME_SIZE`] bytes.
    pub fn from_frame(fr: &[u8]) -> HeaderSnapshot {
        let mut wib = [0u8; frame::WIB_HEADER_SIZE];
        wib.copy_from_slice(&fr[..frame::WIB_HEADER_SIZE]);
        let mut coldata = [[0u8; frame::COLDDATA_HEADER_SIZE]; frame::COLDDATA_BLOCKS];
        for (block, hdr) in coldata.iter_mut().enumerate() {
            hdr.copy_from_slice(frame::coldata_header(fr, block));
        }
        HeaderSnapshot { wib, coldata }
    }

    /// The header this snapshot predicts for the next frame: timestamp
    /// advanced by 25 ticks, each convert count incremented (mod 2^16),
    /// everything else copied.
    pub fn predict_next(&self) -> HeaderSnapshot {
        let mut next = *self;

        let ts = frame::timestamp(&self.wib).wrapping_add(frame::TIMESTAMP_TICKS_PER_FRAME);
        next.wib[8..16].copy_from_slice(&ts.to_le_bytes());

        for hdr in next.coldata.iter_mut() {
            let cc = u16::from_le_bytes([hdr[8], hdr[9]]).wrapping_add(1);
            hdr[8..10].copy_from_slice(&cc.to_le_bytes());
        }

        next
    }

    pub fn timestamp(&self) -> u64 {
        frame::timestamp(&self.wib)
    }

    pub fn convert_count(&self, block: usize) -> u16 {
        u16::from_le_bytes([self.coldata[block][8], self.coldata[block][9]])
    }

    /// Serialize into exactly [`frame::HEADERS_SIZE`] bytes.
    pub fn write_to(&self, dst: &mut [u8]) {
        dst[..frame::WIB_HEADER_SIZE].copy_from_slice(&self.wib);
        for (block, hdr) in self.coldata.iter().enumerate() {
            let off = frame::WIB_HEADER_SIZE + block * frame::COLDDATA_HEADER_SIZE;
            dst[off..off + frame::COLDDATA_HEADER_SIZE].copy_from_slice(hdr);
        }
    }

    /// Deserialize from [`frame::HEADERS_SIZE`] bytes.
    pub fn read_from(src: &[u8]) -> Result<HeaderSnapshot, WibError> {
        if src.len() < frame::HEADERS_SIZE {
            return Err(WibError::Format("truncated header snapshot"));
        }
        let mut wib = [0u8; frame::WIB_HEADER_SIZE];
        wib.copy_from_slice(&src[..frame::WIB_HEADER_SIZE]);
        let mut coldata = [[0u8; frame::COLDDATA_HEADER_SIZE]; frame::COLDDATA_BLOCKS];
        for (block, hdr) in coldata.iter_mut().enumerate() {
            let off = frame::WIB_HEADER_SIZE + block * frame::COLDDATA_HEADER_SIZE;
            hdr.copy_from_slice(&src[off..off + frame::COLDDATA_HEADER_SIZE]);
        }
        Ok(HeaderSnapshot { wib, coldata })
    }

    /// Write these header fields into a frame buffer, leaving the ADC
    /// segments untouched.
    pub fn write_to_frame(&self, fr: &mut [u8]) {
        fr[..frame::WIB_HEADER_SIZE].copy_from_slice(&self.wib);
        for (block, hdr) in self.coldata.iter().enumerate() {
            let off = frame::coldata_offset(block);
            fr[off..off + frame::COLDDATA_HEADER_SIZE].copy_from_slice(hdr);
        }
    }
}

/// Compare an observed header against a prediction. Empty flags mean the
/// frame is consistent; any set bit marks the unit that deviated.
pub fn compare(actual: &HeaderSnapshot, expected: &HeaderSnapshot) -> FaultFlags {
    let mut flags = FaultFlags::empty();

    if actual.wib[..8] != expected.wib[..8] {
        flags |= FaultFlags::WIB_STATIC;
    }
    if actual.wib[8..16] != expected.wib[8..16] {
        flags |= FaultFlags::WIB_TIMESTAMP;
    }
    for block in 0..frame::COLDDATA_BLOCKS {
        if actual.coldata[block] != expected.coldata[block] {
            flags |= FaultFlags::coldata(block);
        }
    }

    flags
}
