//! Adaptive per-channel range coding of ADC deltas, with a packet format
//! that supports O(1) random access to any channel.
//!
//! Each channel is modeled independently: consecutive-sample deltas are
//! folded to non-negative symbols (`2d` for `d >= 0`, `-2d - 1` for
//! `d < 0`), counted into at most 128 histogram bins, and arithmetic-coded
//! against the cumulative table. Rare large deltas collapse into a
//! dedicated overflow bin; their actual symbols are stored up front as
//! fixed-width side values and consumed in order on decode.
//!
//! A packet is:
//!
//! ```text
//! [header-exception record]
//! [channel bitstreams, bit-packed back to back]
//! [zero padding to a 64-bit boundary]
//! [nchannels x u32: bit offset of each channel from packet start]
//! [table-of-contents word: u64]
//! ```
//!
//! The exception record stores frame 0's full header snapshot plus, for
//! every frame whose header broke the continuity prediction, a 6-bit fault
//! mask, a 10-bit frame index, and the observed value of each flagged
//! header unit. All other frames' headers are reconstructed purely by
//! prediction.

use std::collections::HashMap;

use crate::bitio::{BitReader, BitWriter};
use crate::coder::{ArithDecoder, ArithEncoder};
use crate::error::WibError;
use crate::fault::{self, FaultFlags, HeaderSnapshot};
use crate::frame;

/// Most frames a single packet can carry; the exception list indexes frames
/// with 10 bits.
pub const MAX_PACKET_FRAMES: usize = 1024;

// Channel stream format nibble.
const FORMAT_RANGE: u32 = 0;
const FORMAT_RAW: u32 = 1;

// Direct histogram bins are capped so bin_count (direct + overflow) stays
// within 128.
const MAX_DIRECT_BINS: usize = 127;
// Overflow occurrences expressible by the 4-bit side-value count.
const MAX_OVERFLOW_VALUES: usize = 15;
// Side values carry the folded symbol verbatim.
const SIDE_VALUE_BITS: usize = 16;

// Table-of-contents word, packed from bit 0 upward:
// format:4 | type:4 | n64:16 | rec_format:4 | nsamples-1:12 |
// nchannels-1:12 | reserved:12.
const TOC_FORMAT: u64 = 1;
const TOC_TYPE_COMPRESSED: u64 = 2;
const TOC_REC_PREDICTED: u64 = 1;

#[inline]
fn fold_delta(d: i32) -> u32 {
    if d >= 0 { (2 * d) as u32 } else { (-2 * d - 1) as u32 }
}

#[inline]
fn unfold_symbol(sym: u32) -> i32 {
    if sym % 2 == 0 { (sym / 2) as i32 } else { -(((sym + 1) / 2) as i32) }
}

fn trace_channel() -> Option<usize> {
    std::env::var("WIB_CODEC_TRACE_CHANNEL").ok().and_then(|v| v.parse::<usize>().ok())
}

// ---------------------------------------------------------------------------
// Per-channel streams
// ---------------------------------------------------------------------------

/// Append the compressed form of one channel's samples to the writer.
///
/// Samples must be 12-bit values. Channels whose delta histogram would need
/// more than 15 overflow side values fall back to a raw 12-bit encoding
/// (format nibble 1).
pub fn compress_channel(samples: &[u16], w: &mut BitWriter) -> Result<(), WibError> {
    if samples.is_empty() {
        return Err(WibError::InvalidInput("cannot compress an empty channel"));
    }
    if samples.len() > 4096 {
        return Err(WibError::InvalidInput("channel longer than the format can declare"));
    }
    if samples.iter().any(|&s| s > 0x0FFF) {
        return Err(WibError::InvalidInput("ADC samples must be 12-bit"));
    }

    let symbols: Vec<u32> = samples
        .windows(2)
        .map(|p| fold_delta(p[1] as i32 - p[0] as i32))
        .collect();

    if symbols.is_empty() {
        // A one-sample channel has no deltas to model.
        write_raw_channel(samples, w);
        return Ok(());
    }

    let max_sym = symbols.iter().copied().max().unwrap_or(0) as usize;
    let direct = (max_sym + 1).min(MAX_DIRECT_BINS);
    let overflow_bin = direct;
    let bin_count = direct + 1;

    let mut counts = vec![0u32; bin_count];
    let mut side_values: Vec<u32> = Vec::new();
    for &sym in &symbols {
        if (sym as usize) < direct {
            counts[sym as usize] += 1;
        } else {
            counts[overflow_bin] += 1;
            side_values.push(sym);
        }
    }
    if side_values.len() > MAX_OVERFLOW_VALUES {
        write_raw_channel(samples, w);
        return Ok(());
    }

    let mut cum = Vec::with_capacity(bin_count);
    let mut acc = 0u32;
    for &c in &counts {
        acc += c;
        cum.push(acc);
    }
    let total = acc;
    debug_assert_eq!(total as usize, symbols.len());
    let bit_width = (32 - total.leading_zeros()).max(1) as usize;

    w.write_bits_u32(FORMAT_RANGE, 4);
    w.write_bits_u32((bin_count - 1) as u32, 8);
    w.write_bits_u32(bit_width as u32, 4);
    w.write_bits_u32(samples[0] as u32, 12);
    w.write_bits_u32(side_values.len() as u32, 4);
    for &c in &cum {
        w.write_bits_u32(c, bit_width);
    }
    for &v in &side_values {
        w.write_bits_u32(v, SIDE_VALUE_BITS);
    }

    let mut enc = ArithEncoder::new();
    for &sym in &symbols {
        let bin = (sym as usize).min(overflow_bin);
        let lo = if bin == 0 { 0 } else { cum[bin - 1] };
        enc.encode(lo, cum[bin], total, w);
    }
    enc.finish(w);
    Ok(())
}

fn write_raw_channel(samples: &[u16], w: &mut BitWriter) {
    w.write_bits_u32(FORMAT_RAW, 4);
    for &s in samples {
        w.write_bits_u32(s as u32, 12);
    }
}

/// Decode one channel from a positioned reader, returning the samples whose
/// tick index falls in `[begin_tick, end_tick)`.
///
/// `nsamples` is the declared per-channel sample count (from the packet's
/// table of contents); a window reaching past it is a format error.
pub fn decompress_channel(
    r: &mut BitReader<'_>,
    nsamples: usize,
    begin_tick: usize,
    end_tick: usize,
) -> Result<Vec<u16>, WibError> {
    if begin_tick > end_tick || end_tick > nsamples {
        return Err(WibError::Format("tick window walks past the declared sample count"));
    }

    let format = r.read_bits_u32(4)?;
    match format {
        FORMAT_RAW => {
            let mut out = Vec::with_capacity(end_tick - begin_tick);
            for tick in 0..nsamples {
                let v = r.read_bits_u32(12)? as u16;
                if tick >= begin_tick && tick < end_tick {
                    out.push(v);
                }
            }
            Ok(out)
        }
        FORMAT_RANGE => decompress_range_channel(r, nsamples, begin_tick, end_tick),
        _ => Err(WibError::Format("unknown channel stream format")),
    }
}

fn decompress_range_channel(
    r: &mut BitReader<'_>,
    nsamples: usize,
    begin_tick: usize,
    end_tick: usize,
) -> Result<Vec<u16>, WibError> {
    let bin_count = r.read_bits_u32(8)? as usize + 1;
    let bit_width = r.read_bits_u32(4)? as usize;
    let first = r.read_bits_u32(12)? as u16;
    let overflow_count = r.read_bits_u32(4)? as usize;
    if bit_width == 0 {
        return Err(WibError::Format("cumulative table bit width of zero"));
    }
    if nsamples == 0 {
        return Err(WibError::Format("range channel with zero declared samples"));
    }

    let mut cum = Vec::with_capacity(bin_count);
    let mut prev = 0u32;
    for _ in 0..bin_count {
        let c = r.read_bits_u32(bit_width)?;
        if c < prev {
            return Err(WibError::Format("cumulative histogram is not non-decreasing"));
        }
        cum.push(c);
        prev = c;
    }
    let total = prev;
    if total as usize != nsamples - 1 {
        return Err(WibError::Format("cumulative histogram disagrees with the sample count"));
    }

    let mut side_values = Vec::with_capacity(overflow_count);
    for _ in 0..overflow_count {
        side_values.push(r.read_bits_u32(SIDE_VALUE_BITS)?);
    }

    let overflow_bin = bin_count - 1;
    let mut out = Vec::with_capacity(end_tick.saturating_sub(begin_tick));
    if begin_tick == 0 && end_tick > 0 {
        out.push(first);
    }

    if nsamples == 1 {
        return Ok(out);
    }

    let mut dec = ArithDecoder::start(r.clone())?;
    let mut side_at = 0usize;
    let mut value = first as i32;
    for tick in 1..nsamples {
        let target = dec.target(total);
        let bin = cum.partition_point(|&c| c <= target);
        if bin >= bin_count {
            return Err(WibError::Format("decode target beyond the cumulative table"));
        }
        let lo = if bin == 0 { 0 } else { cum[bin - 1] };
        if lo == cum[bin] {
            return Err(WibError::Format("decoded symbol from an empty bin"));
        }
        dec.consume(lo, cum[bin], total)?;

        let sym = if bin == overflow_bin && overflow_count > 0 {
            let v = *side_values
                .get(side_at)
                .ok_or(WibError::Format("overflow side values exhausted"))?;
            side_at += 1;
            v
        } else {
            bin as u32
        };

        value += unfold_symbol(sym);
        if !(0..=0x0FFF).contains(&value) {
            return Err(WibError::Format("reconstructed sample out of 12-bit range"));
        }
        if tick >= begin_tick && tick < end_tick {
            out.push(value as u16);
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Header-exception record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct ExceptionValues {
    wib_static: Option<[u8; 8]>,
    timestamp: Option<[u8; 8]>,
    coldata: [Option<[u8; frame::COLDDATA_HEADER_SIZE]>; frame::COLDDATA_BLOCKS],
}

fn push_exception(out: &mut Vec<u8>, flags: FaultFlags, snap: &HeaderSnapshot) {
    if flags.contains(FaultFlags::WIB_STATIC) {
        out.extend_from_slice(&snap.wib[..8]);
    }
    if flags.contains(FaultFlags::WIB_TIMESTAMP) {
        out.extend_from_slice(&snap.wib[8..16]);
    }
    for block in 0..frame::COLDDATA_BLOCKS {
        if flags.contains(FaultFlags::coldata(block)) {
            out.extend_from_slice(&snap.coldata[block]);
        }
    }
}

fn apply_exception(snap: &mut HeaderSnapshot, values: &ExceptionValues) {
    if let Some(w) = values.wib_static {
        snap.wib[..8].copy_from_slice(&w);
    }
    if let Some(ts) = values.timestamp {
        snap.wib[8..16].copy_from_slice(&ts);
    }
    for block in 0..frame::COLDDATA_BLOCKS {
        if let Some(h) = values.coldata[block] {
            snap.coldata[block] = h;
        }
    }
}

fn build_exception_record(src: &[u8], num_frames: usize) -> (Vec<u8>, usize) {
    let first = HeaderSnapshot::from_frame(&src[..frame::FRAME_SIZE]);

    let mut entries: Vec<u16> = Vec::new();
    let mut values = Vec::new();
    let mut prev = first;
    for i in 1..num_frames {
        let fr = &src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
        let snap = HeaderSnapshot::from_frame(fr);
        let flags = fault::compare(&snap, &prev.predict_next());
        if !flags.is_empty() {
            entries.push(((flags.bits() as u16) << 10) | i as u16);
            push_exception(&mut values, flags, &snap);
        }
        prev = snap;
    }

    let num_faulty = entries.len();
    let mut record = Vec::with_capacity(frame::HEADERS_SIZE + 2 + 2 * entries.len() + values.len());
    record.resize(frame::HEADERS_SIZE, 0);
    first.write_to(&mut record[..frame::HEADERS_SIZE]);
    record.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for e in &entries {
        record.extend_from_slice(&e.to_le_bytes());
    }
    record.extend_from_slice(&values);
    (record, num_faulty)
}

fn parse_exception_record(
    pkt: &[u8],
) -> Result<(HeaderSnapshot, HashMap<usize, ExceptionValues>, usize, usize), WibError> {
    if pkt.len() < frame::HEADERS_SIZE + 2 {
        return Err(WibError::Format("packet shorter than its exception record"));
    }
    let first = HeaderSnapshot::read_from(&pkt[..frame::HEADERS_SIZE])?;
    let mut at = frame::HEADERS_SIZE;
    let num_exceptions = u16::from_le_bytes([pkt[at], pkt[at + 1]]) as usize;
    at += 2;

    let mut entries = Vec::with_capacity(num_exceptions);
    for _ in 0..num_exceptions {
        if at + 2 > pkt.len() {
            return Err(WibError::Format("exception list truncated"));
        }
        let e = u16::from_le_bytes([pkt[at], pkt[at + 1]]);
        at += 2;
        let flags = FaultFlags::from_bits_truncate((e >> 10) as u8);
        let index = (e & 0x03FF) as usize;
        entries.push((index, flags));
    }

    let mut map = HashMap::with_capacity(num_exceptions);
    for (index, flags) in entries {
        let mut values = ExceptionValues::default();
        if flags.contains(FaultFlags::WIB_STATIC) {
            values.wib_static = Some(read_8(pkt, &mut at)?);
        }
        if flags.contains(FaultFlags::WIB_TIMESTAMP) {
            values.timestamp = Some(read_8(pkt, &mut at)?);
        }
        for block in 0..frame::COLDDATA_BLOCKS {
            if flags.contains(FaultFlags::coldata(block)) {
                values.coldata[block] = Some(read_16(pkt, &mut at)?);
            }
        }
        map.insert(index, values);
    }

    Ok((first, map, num_exceptions, at))
}

fn read_8(pkt: &[u8], at: &mut usize) -> Result<[u8; 8], WibError> {
    if *at + 8 > pkt.len() {
        return Err(WibError::Format("exception values truncated"));
    }
    let mut out = [0u8; 8];
    out.copy_from_slice(&pkt[*at..*at + 8]);
    *at += 8;
    Ok(out)
}

fn read_16(pkt: &[u8], at: &mut usize) -> Result<[u8; 16], WibError> {
    if *at + 16 > pkt.len() {
        return Err(WibError::Format("exception values truncated"));
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&pkt[*at..*at + 16]);
    *at += 16;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Table of contents
// ---------------------------------------------------------------------------

/// Parsed packet trailer: per-channel start bits plus the packet geometry.
#[derive(Debug, Clone)]
pub struct TableOfContents {
    pub nsamples: usize,
    pub nchannels: usize,
    /// Bit offset of each channel's stream from the start of the packet.
    pub offsets: Vec<u32>,
}

impl TableOfContents {
    /// Parse the trailer of a compressed packet.
    pub fn parse(pkt: &[u8]) -> Result<TableOfContents, WibError> {
        if pkt.len() < 8 || pkt.len() % 8 != 0 {
            return Err(WibError::Format("packet is not a whole number of 64-bit words"));
        }
        let tail = &pkt[pkt.len() - 8..];
        let word = u64::from_le_bytes([
            tail[0], tail[1], tail[2], tail[3], tail[4], tail[5], tail[6], tail[7],
        ]);

        let format = word & 0xF;
        let kind = (word >> 4) & 0xF;
        let n64 = ((word >> 8) & 0xFFFF) as usize;
        let rec_format = (word >> 24) & 0xF;
        let nsamples = (((word >> 28) & 0xFFF) + 1) as usize;
        let nchannels = (((word >> 40) & 0xFFF) + 1) as usize;

        if format != TOC_FORMAT || kind != TOC_TYPE_COMPRESSED {
            return Err(WibError::Format("unknown table-of-contents format"));
        }
        if rec_format != TOC_REC_PREDICTED {
            return Err(WibError::Format("unknown header-record format"));
        }
        if n64 * 8 != pkt.len() {
            return Err(WibError::Format("table of contents disagrees with the packet length"));
        }

        let offsets_at = pkt
            .len()
            .checked_sub(8 + 4 * nchannels)
            .ok_or(WibError::Format("packet too short for its channel offsets"))?;
        let mut offsets = Vec::with_capacity(nchannels);
        for ch in 0..nchannels {
            let at = offsets_at + 4 * ch;
            let off = u32::from_le_bytes([pkt[at], pkt[at + 1], pkt[at + 2], pkt[at + 3]]);
            if off as usize >= offsets_at * 8 {
                return Err(WibError::Format("channel offset points past the channel data"));
            }
            offsets.push(off);
        }

        Ok(TableOfContents { nsamples, nchannels, offsets })
    }
}

fn toc_word(n64: usize, nsamples: usize, nchannels: usize) -> u64 {
    TOC_FORMAT
        | (TOC_TYPE_COMPRESSED << 4)
        | ((n64 as u64) << 8)
        | (TOC_REC_PREDICTED << 24)
        | (((nsamples - 1) as u64) << 28)
        | (((nchannels - 1) as u64) << 40)
}

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

/// Compress `num_frames` frames from `src` into a self-contained packet.
pub fn compress_fragment(src: &[u8], num_frames: usize) -> Result<Vec<u8>, WibError> {
    if num_frames == 0 {
        return Err(WibError::InvalidInput("cannot compress an empty fragment"));
    }
    if num_frames > MAX_PACKET_FRAMES {
        return Err(WibError::Unsupported("fragment exceeds the 1024-frame packet limit"));
    }
    if src.len() < num_frames * frame::FRAME_SIZE {
        return Err(WibError::InvalidInput("source buffer shorter than the frame count"));
    }

    let (record, _num_faulty) = build_exception_record(src, num_frames);
    let mut w = BitWriter::from_bytes(record);

    let mut offsets = Vec::with_capacity(frame::NUM_CHANNELS);
    let mut samples = Vec::with_capacity(num_frames);
    for ch in 0..frame::NUM_CHANNELS {
        offsets.push(w.bit_len() as u32);
        samples.clear();
        for i in 0..num_frames {
            let fr = &src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
            samples.push(frame::adc_value(fr, ch));
        }
        compress_channel(&samples, &mut w)?;
    }

    let mut pkt = w.finish();
    while pkt.len() % 8 != 0 {
        pkt.push(0);
    }
    for &off in &offsets {
        pkt.extend_from_slice(&off.to_le_bytes());
    }
    let n64 = pkt.len() / 8 + 1;
    if n64 > 0xFFFF {
        return Err(WibError::InvalidInput("packet too large for its table of contents"));
    }
    pkt.extend_from_slice(&toc_word(n64, num_frames, frame::NUM_CHANNELS).to_le_bytes());
    Ok(pkt)
}

/// Cheap packet metadata: `(num_frames, num_faulty)` read from the trailer
/// and the exception-list header without decoding any channel.
pub fn packet_info(pkt: &[u8]) -> Result<(usize, usize), WibError> {
    let toc = TableOfContents::parse(pkt)?;
    if pkt.len() < frame::HEADERS_SIZE + 2 {
        return Err(WibError::Format("packet shorter than its exception record"));
    }
    let at = frame::HEADERS_SIZE;
    let num_faulty = u16::from_le_bytes([pkt[at], pkt[at + 1]]) as usize;
    Ok((toc.nsamples, num_faulty))
}

/// Decode a single channel of a packet directly through its
/// table-of-contents offset; no other channel is touched.
pub fn decompress_channel_at(pkt: &[u8], channel: usize) -> Result<Vec<u16>, WibError> {
    let toc = TableOfContents::parse(pkt)?;
    if channel >= toc.nchannels {
        return Err(WibError::InvalidInput("channel out of range for this packet"));
    }
    if trace_channel() == Some(channel) {
        eprintln!(
            "TRACE channel={channel} start_bit={} nsamples={}",
            toc.offsets[channel], toc.nsamples
        );
    }
    let mut r = BitReader::new_at(pkt, toc.offsets[channel] as usize);
    decompress_channel(&mut r, toc.nsamples, 0, toc.nsamples)
}

/// Fully decoded packet: reconstructed per-frame headers plus channel-major
/// samples.
#[derive(Debug, Clone)]
pub struct DecompressedFragment {
    pub headers: Vec<HeaderSnapshot>,
    /// One run of `headers.len()` samples per channel.
    pub channels: Vec<Vec<u16>>,
    /// Frames that carried a header exception.
    pub num_faulty: usize,
}

impl DecompressedFragment {
    pub fn num_frames(&self) -> usize {
        self.headers.len()
    }

    /// Rebuild the original time-major frame buffer.
    pub fn to_frames(&self) -> Vec<u8> {
        let n = self.num_frames();
        let mut out = vec![0u8; n * frame::FRAME_SIZE];
        for (i, header) in self.headers.iter().enumerate() {
            let fr = &mut out[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
            header.write_to_frame(fr);
            for (ch, run) in self.channels.iter().enumerate() {
                frame::put_adc_value(fr, ch, run[i]);
            }
        }
        out
    }
}

/// Decode every channel of a packet and reconstruct the frame headers from
/// the prediction chain and the exception record.
pub fn decompress_fragment(pkt: &[u8]) -> Result<DecompressedFragment, WibError> {
    let toc = TableOfContents::parse(pkt)?;
    let (first, exceptions, num_faulty, _record_len) = parse_exception_record(pkt)?;

    let mut headers = Vec::with_capacity(toc.nsamples);
    headers.push(first);
    for i in 1..toc.nsamples {
        let mut snap = headers[i - 1].predict_next();
        if let Some(values) = exceptions.get(&i) {
            apply_exception(&mut snap, values);
        }
        headers.push(snap);
    }

    let trace = trace_channel();
    let mut channels = Vec::with_capacity(toc.nchannels);
    for ch in 0..toc.nchannels {
        if trace == Some(ch) {
            eprintln!("TRACE channel={ch} start_bit={} nsamples={}", toc.offsets[ch], toc.nsamples);
        }
        let mut r = BitReader::new_at(pkt, toc.offsets[ch] as usize);
        channels.push(decompress_channel(&mut r, toc.nsamples, 0, toc.nsamples)?);
    }

    Ok(DecompressedFragment { headers, channels, num_faulty })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_samples(samples: &[u16]) {
        let mut w = BitWriter::new();
        compress_channel(samples, &mut w).expect("compress");
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let got = decompress_channel(&mut r, samples.len(), 0, samples.len()).expect("decompress");
        assert_eq!(got, samples);
    }

    #[test]
    fn flat_channel_round_trip() {
        round_trip_samples(&[2048; 64]);
    }

    #[test]
    fn single_sample_channel_round_trip() {
        round_trip_samples(&[777]);
    }

    #[test]
    fn overflow_symbols_use_side_values() {
        // A handful of large jumps among small deltas exercises the escape
        // bin without tripping the raw fallback.
        let mut samples = Vec::new();
        let mut v = 100i32;
        for i in 0..200 {
            v += match i {
                50 => 3000,
                120 => -2900,
                _ => (i % 3) as i32 - 1,
            };
            samples.push(v as u16);
        }
        round_trip_samples(&samples);
    }

    #[test]
    fn wild_channel_falls_back_to_raw() {
        // Alternating extremes make every delta an overflow candidate.
        let samples: Vec<u16> =
            (0..100).map(|i| if i % 2 == 0 { 0 } else { 4095 }).collect();
        let mut w = BitWriter::new();
        compress_channel(&samples, &mut w).expect("compress");
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits_u32(4).unwrap(), FORMAT_RAW);
        let mut r = BitReader::new(&bytes);
        let got = decompress_channel(&mut r, samples.len(), 0, samples.len()).unwrap();
        assert_eq!(got, samples);
    }

    #[test]
    fn tick_window_slices_the_decode() {
        let samples: Vec<u16> = (0..100).map(|i| 1000 + (i % 7) as u16).collect();
        let mut w = BitWriter::new();
        compress_channel(&samples, &mut w).expect("compress");
        let bytes = w.finish();

        let mut r = BitReader::new(&bytes);
        let window = decompress_channel(&mut r, samples.len(), 25, 75).expect("window");
        assert_eq!(window, &samples[25..75]);

        let mut r = BitReader::new(&bytes);
        assert!(decompress_channel(&mut r, samples.len(), 0, 101).is_err());
    }

    #[test]
    fn non_twelve_bit_samples_are_rejected() {
        let mut w = BitWriter::new();
        assert!(compress_channel(&[0x1000], &mut w).is_err());
        assert!(compress_channel(&[], &mut w).is_err());
    }
}
