//! Format-tagged fragment container.
//!
//! A fragment is a byte buffer in one of three layouts plus the small
//! amount of metadata needed to interpret it. Accessors dispatch on the
//! format tag; there is no class hierarchy over the bytes.

use crate::error::WibError;
use crate::frame;
use crate::range;
use crate::reorder;

/// Storage layout of a fragment's byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFormat {
    /// Time-major frames, back to back.
    Unordered,
    /// Fault bitmap + header snapshots + channel-major ADC data.
    Reordered,
    /// Range-coded packet with a table-of-contents trailer.
    Compressed,
}

/// A fragment: owned bytes, a format tag, and frame/fault counts.
#[derive(Debug, Clone)]
pub struct Fragment {
    format: FragmentFormat,
    num_frames: usize,
    num_faulty: usize,
    data: Vec<u8>,
}

impl Fragment {
    /// Wrap a buffer of back-to-back 464-byte frames.
    pub fn from_frames(data: Vec<u8>) -> Result<Fragment, WibError> {
        if data.len() % frame::FRAME_SIZE != 0 {
            return Err(WibError::InvalidInput("buffer is not a whole number of frames"));
        }
        let num_frames = data.len() / frame::FRAME_SIZE;
        Ok(Fragment { format: FragmentFormat::Unordered, num_frames, num_faulty: 0, data })
    }

    /// Wrap an already-reordered buffer together with the counts that fix
    /// its layout.
    pub fn from_reordered(
        data: Vec<u8>,
        num_frames: usize,
        num_faulty: usize,
    ) -> Result<Fragment, WibError> {
        if data.len() != reorder::reordered_size(num_frames, num_faulty) {
            return Err(WibError::Format("buffer length disagrees with the reordered layout"));
        }
        Ok(Fragment { format: FragmentFormat::Reordered, num_frames, num_faulty, data })
    }

    /// Wrap a compressed packet; frame and fault counts come from the
    /// packet's own trailer and exception record.
    pub fn from_compressed(data: Vec<u8>) -> Result<Fragment, WibError> {
        let (num_frames, num_faulty) = range::packet_info(&data)?;
        Ok(Fragment { format: FragmentFormat::Compressed, num_frames, num_faulty, data })
    }

    pub fn format(&self) -> FragmentFormat {
        self.format
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Faulty frames. Zero for unordered fragments, whose headers have not
    /// been checked against the continuity model yet.
    pub fn num_faulty(&self) -> usize {
        self.num_faulty
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Tick window `[begin, end)` covered by this fragment: the first
    /// frame's timestamp up to one tick step past the last frame's.
    ///
    /// For the reordered and compressed layouts the end is projected from
    /// the baseline header by the continuity rule; a mid-fragment clock
    /// glitch is not chased through the fault records.
    pub fn window(&self) -> Result<(u64, u64), WibError> {
        if self.num_frames == 0 {
            return Err(WibError::InvalidInput("an empty fragment covers no window"));
        }
        let span = frame::TIMESTAMP_TICKS_PER_FRAME * self.num_frames as u64;
        match self.format {
            FragmentFormat::Unordered => {
                let first = frame::timestamp(&self.data[..frame::FRAME_SIZE]);
                let last =
                    frame::timestamp(&self.data[(self.num_frames - 1) * frame::FRAME_SIZE..]);
                Ok((first, last + frame::TIMESTAMP_TICKS_PER_FRAME))
            }
            FragmentFormat::Reordered => {
                let bitmap = self.num_frames.div_ceil(8);
                let baseline = crate::fault::HeaderSnapshot::read_from(&self.data[bitmap..])?;
                Ok((baseline.timestamp(), baseline.timestamp() + span))
            }
            FragmentFormat::Compressed => {
                let baseline = crate::fault::HeaderSnapshot::read_from(&self.data)?;
                Ok((baseline.timestamp(), baseline.timestamp() + span))
            }
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Sample `(tick, channel)`. O(1) for the unordered and reordered
    /// layouts; compressed fragments must be decoded through [`channel`] or
    /// [`decompress`] first.
    ///
    /// [`channel`]: Fragment::channel
    /// [`decompress`]: Fragment::decompress
    pub fn adc(&self, tick: usize, channel: usize) -> Result<u16, WibError> {
        if tick >= self.num_frames || channel >= frame::NUM_CHANNELS {
            return Err(WibError::InvalidInput("tick or channel out of range"));
        }
        match self.format {
            FragmentFormat::Unordered => {
                let fr = &self.data[tick * frame::FRAME_SIZE..(tick + 1) * frame::FRAME_SIZE];
                Ok(frame::adc_value(fr, channel))
            }
            FragmentFormat::Reordered => {
                reorder::reordered_adc(&self.data, self.num_frames, self.num_faulty, channel, tick)
            }
            FragmentFormat::Compressed => {
                Err(WibError::Unsupported("random sample access into a compressed fragment"))
            }
        }
    }

    /// All samples of one channel. For compressed fragments this seeks the
    /// channel's bitstream through the table of contents and decodes only
    /// that channel.
    pub fn channel(&self, channel: usize) -> Result<Vec<u16>, WibError> {
        if channel >= frame::NUM_CHANNELS {
            return Err(WibError::InvalidInput("channel out of range"));
        }
        match self.format {
            FragmentFormat::Unordered => {
                let mut out = Vec::with_capacity(self.num_frames);
                for tick in 0..self.num_frames {
                    out.push(self.adc(tick, channel)?);
                }
                Ok(out)
            }
            FragmentFormat::Reordered => {
                let mut out = Vec::with_capacity(self.num_frames);
                for tick in 0..self.num_frames {
                    out.push(reorder::reordered_adc(
                        &self.data,
                        self.num_frames,
                        self.num_faulty,
                        channel,
                        tick,
                    )?);
                }
                Ok(out)
            }
            FragmentFormat::Compressed => range::decompress_channel_at(&self.data, channel),
        }
    }

    /// Transpose an unordered fragment into the reordered layout.
    pub fn reorder(&self) -> Result<Fragment, WibError> {
        if self.format != FragmentFormat::Unordered {
            return Err(WibError::Unsupported("only unordered fragments can be reordered"));
        }
        let (data, stats) = reorder::reorder(&self.data, self.num_frames)?;
        Fragment::from_reordered(data, self.num_frames, stats.num_faulty)
    }

    /// Range-compress an unordered fragment into a packet.
    pub fn compress(&self) -> Result<Fragment, WibError> {
        if self.format != FragmentFormat::Unordered {
            return Err(WibError::Unsupported("only unordered fragments can be compressed"));
        }
        let pkt = range::compress_fragment(&self.data, self.num_frames)?;
        Fragment::from_compressed(pkt)
    }

    /// Decode a compressed fragment back to time-major frames.
    pub fn decompress(&self) -> Result<Fragment, WibError> {
        if self.format != FragmentFormat::Compressed {
            return Err(WibError::Unsupported("only compressed fragments can be decompressed"));
        }
        let decoded = range::decompress_fragment(&self.data)?;
        Fragment::from_frames(decoded.to_frames())
    }
}
