//! Binary arithmetic coder with explicit context state.
//!
//! Classic integer interval coder: 32 bits of precision, quarter-interval
//! renormalization, pending-bit tracking for the straddle case. Encoder and
//! decoder are plain value types threaded through the calls, with no hidden
//! register state. Symbols are described to both sides as a cumulative
//! count interval `[cum_lo, cum_hi)` out of `total`.

use crate::bitio::{BitReader, BitWriter};
use crate::error::WibError;

const CODE_BITS: u32 = 32;
const TOP: u64 = (1 << CODE_BITS) - 1;
const HALF: u64 = 1 << (CODE_BITS - 1);
const QUARTER: u64 = 1 << (CODE_BITS - 2);
const THREE_QUARTERS: u64 = 3 * QUARTER;

// The encoder's flush leaves at most a register's worth of bits implicit;
// a decoder hungrier than that is reading a truncated stream, not a flush
// artifact.
const MAX_PHANTOM_BITS: u32 = CODE_BITS;

/// Encoder context. Feed symbol intervals with [`encode`], then seal the
/// stream with [`finish`].
///
/// [`encode`]: ArithEncoder::encode
/// [`finish`]: ArithEncoder::finish
#[derive(Debug, Clone)]
pub struct ArithEncoder {
    low: u64,
    high: u64,
    pending: u64,
}

impl Default for ArithEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArithEncoder {
    pub fn new() -> ArithEncoder {
        ArithEncoder { low: 0, high: TOP, pending: 0 }
    }

    /// Narrow the interval to `[cum_lo, cum_hi) / total` and emit any bits
    /// that became certain. `cum_lo < cum_hi <= total` and `total` must fit
    /// the quarter interval (true for any per-channel sample count).
    pub fn encode(&mut self, cum_lo: u32, cum_hi: u32, total: u32, w: &mut BitWriter) {
        debug_assert!(cum_lo < cum_hi && cum_hi <= total);
        debug_assert!((total as u64) <= QUARTER);

        let range = self.high - self.low + 1;
        self.high = self.low + range * cum_hi as u64 / total as u64 - 1;
        self.low += range * cum_lo as u64 / total as u64;

        loop {
            if self.high < HALF {
                self.emit(false, w);
            } else if self.low >= HALF {
                self.emit(true, w);
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.pending += 1;
                self.low -= QUARTER;
                self.high -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
        }
    }

    fn emit(&mut self, bit: bool, w: &mut BitWriter) {
        w.write_bit(bit);
        while self.pending > 0 {
            w.write_bit(!bit);
            self.pending -= 1;
        }
    }

    /// Flush the bits that pin the final interval.
    pub fn finish(mut self, w: &mut BitWriter) {
        self.pending += 1;
        let bit = self.low >= QUARTER;
        self.emit(bit, w);
    }
}

/// Decoder context over a positioned bit reader.
///
/// The encoder's flush leaves the tail of the register unwritten, so the
/// decoder may legitimately shift in a bounded number of phantom zero bits
/// after the physical stream ends; an unbounded appetite means the stream
/// was truncated and is reported as a format error.
#[derive(Debug, Clone)]
pub struct ArithDecoder<'a> {
    low: u64,
    high: u64,
    code: u64,
    reader: BitReader<'a>,
    phantom_bits: u32,
}

impl<'a> ArithDecoder<'a> {
    /// Start decoding at the reader's current bit position.
    pub fn start(reader: BitReader<'a>) -> Result<ArithDecoder<'a>, WibError> {
        let mut dec = ArithDecoder { low: 0, high: TOP, code: 0, reader, phantom_bits: 0 };
        for _ in 0..CODE_BITS {
            let bit = dec.pull()?;
            dec.code = (dec.code << 1) | bit;
        }
        Ok(dec)
    }

    fn pull(&mut self) -> Result<u64, WibError> {
        if self.reader.bits_remaining() > 0 {
            return Ok(self.reader.read_bit()? as u64);
        }
        self.phantom_bits += 1;
        if self.phantom_bits > MAX_PHANTOM_BITS {
            return Err(WibError::Format("range stream truncated"));
        }
        Ok(0)
    }

    /// Bit position of the underlying reader.
    pub fn bits_read(&self) -> usize {
        self.reader.bits_read()
    }

    /// The cumulative-count value the next symbol's interval must contain.
    ///
    /// On a valid stream the register always sits inside `[low, high]`; a
    /// corrupt stream can push it out, so the offset is clamped back into
    /// the interval rather than underflowing. The result is then garbage
    /// but in-range, and the bounded decode loop terminates normally.
    pub fn target(&self, total: u32) -> u32 {
        let range = self.high - self.low + 1;
        let off = self.code.wrapping_sub(self.low).wrapping_add(1).clamp(1, range);
        ((off * total as u64 - 1) / range) as u32
    }

    /// Consume the symbol whose interval is `[cum_lo, cum_hi) / total`.
    pub fn consume(&mut self, cum_lo: u32, cum_hi: u32, total: u32) -> Result<(), WibError> {
        debug_assert!(cum_lo < cum_hi && cum_hi <= total);

        let range = self.high - self.low + 1;
        self.high = self.low + range * cum_hi as u64 / total as u64 - 1;
        self.low += range * cum_lo as u64 / total as u64;

        loop {
            if self.high < HALF {
                // nothing to subtract
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.code = self.code.wrapping_sub(HALF);
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.code = self.code.wrapping_sub(QUARTER);
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
            self.code = (self.code << 1) | self.pull()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    // Cumulative table over bin counts; bins[i] -> [cum(i-1), cum(i)).
    fn cumulative(bins: &[u32]) -> Vec<u32> {
        let mut cum = Vec::with_capacity(bins.len());
        let mut acc = 0;
        for &b in bins {
            acc += b;
            cum.push(acc);
        }
        cum
    }

    fn round_trip(symbols: &[usize], bins: &[u32]) -> anyhow::Result<()> {
        let cum = cumulative(bins);
        let total = *cum.last().unwrap();

        let mut w = BitWriter::new();
        let mut enc = ArithEncoder::new();
        for &s in symbols {
            let lo = if s == 0 { 0 } else { cum[s - 1] };
            enc.encode(lo, cum[s], total, &mut w);
        }
        enc.finish(&mut w);
        let bytes = w.finish();

        let mut dec = ArithDecoder::start(BitReader::new(&bytes))?;
        for (i, &want) in symbols.iter().enumerate() {
            let target = dec.target(total);
            let got = cum.partition_point(|&c| c <= target);
            assert_eq!(got, want, "symbol {i}");
            let lo = if got == 0 { 0 } else { cum[got - 1] };
            dec.consume(lo, cum[got], total)?;
        }
        Ok(())
    }

    #[test]
    fn skewed_model_round_trip() -> anyhow::Result<()> {
        let bins = [900, 50, 30, 15, 5];
        let mut rng = StdRng::seed_from_u64(21);
        let symbols: Vec<usize> = (0..2000)
            .map(|_| match rng.gen_range(0..1000) {
                0..=899 => 0,
                900..=949 => 1,
                950..=979 => 2,
                980..=994 => 3,
                _ => 4,
            })
            .collect();
        round_trip(&symbols, &bins)
    }

    #[test]
    fn single_symbol_stream() -> anyhow::Result<()> {
        round_trip(&[0, 0, 0, 0], &[4])
    }

    #[test]
    fn two_symbols_alternating() -> anyhow::Result<()> {
        let symbols: Vec<usize> = (0..257).map(|i| i % 2).collect();
        round_trip(&symbols, &[129, 128])
    }

    #[test]
    fn truncated_stream_is_detected() {
        // Encode enough entropy that 2 bytes cannot carry it, then cut.
        let bins = [1u32, 1, 1, 1];
        let cum = cumulative(&bins);
        let mut w = BitWriter::new();
        let mut enc = ArithEncoder::new();
        for s in [0usize, 3, 1, 2, 2, 1, 3, 0, 0, 3, 1, 2, 3, 3, 0, 1] {
            let lo = if s == 0 { 0 } else { cum[s - 1] };
            enc.encode(lo, cum[s], 4, &mut w);
        }
        enc.finish(&mut w);
        let bytes = w.finish();
        let cut = &bytes[..2];

        let mut dec = ArithDecoder::start(BitReader::new(cut)).unwrap();
        let mut failed = false;
        for _ in 0..16 {
            let target = dec.target(4);
            let s = cum.partition_point(|&c| c <= target);
            let lo = if s == 0 { 0 } else { cum[s - 1] };
            if dec.consume(lo, cum[s], 4).is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed, "decoding a truncated stream must fail, not loop");
    }
}
