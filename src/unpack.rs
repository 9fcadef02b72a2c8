//! Batched 12-bit ADC unpack kernels.
//!
//! The scalar kernel is the correctness oracle; the AVX2 and AVX512 kernels
//! are drop-in replacements that must produce byte-identical output. All
//! three expand a frame's packed 12-bit samples to one `u16` per channel;
//! the reorderer owns the channel-major scatter.
//!
//! Vector layout: each 12-byte run of a segment holds 8 samples. A per-lane
//! byte shuffle places the two bytes covering each sample into a 16-bit
//! lane, a multiply by 16 or 1 aligns even/odd samples, and a right shift
//! by 4 drops the alignment nibble, leaving the 12-bit value.

use crate::frame;

/// Which unpack kernel the reorderer runs. All levels produce identical
/// output; pin [`SimdLevel::Scalar`] when reproducing results on machines
/// without vector units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    Scalar,
    Avx2,
    Avx512,
}

impl SimdLevel {
    /// Best kernel the running CPU supports.
    pub fn detect() -> SimdLevel {
        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("avx512f")
                && std::arch::is_x86_feature_detected!("avx512bw")
            {
                return SimdLevel::Avx512;
            }
            if std::arch::is_x86_feature_detected!("avx2") {
                return SimdLevel::Avx2;
            }
        }
        SimdLevel::Scalar
    }

    /// Whether this kernel can run on the current CPU.
    pub fn is_available(self) -> bool {
        match self {
            SimdLevel::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => std::arch::is_x86_feature_detected!("avx2"),
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx512 => {
                std::arch::is_x86_feature_detected!("avx512f")
                    && std::arch::is_x86_feature_detected!("avx512bw")
            }
            #[cfg(not(target_arch = "x86_64"))]
            _ => false,
        }
    }
}

/// Unpack all 256 samples of one frame, scalar reference path.
pub fn unpack_frame_scalar(fr: &[u8], out: &mut [u16; frame::NUM_CHANNELS]) {
    for block in 0..frame::COLDDATA_BLOCKS {
        let off = frame::segment_offset(block);
        let seg = &fr[off..off + frame::SEGMENT_SIZE];
        for j in 0..frame::CHANNELS_PER_BLOCK {
            out[block * frame::CHANNELS_PER_BLOCK + j] = frame::segment_sample(seg, j);
        }
    }
}

/// Unpack one frame with the requested kernel. The caller must have checked
/// [`SimdLevel::is_available`]; unavailable levels fall back to scalar.
pub fn unpack_frame(fr: &[u8], level: SimdLevel, out: &mut [u16; frame::NUM_CHANNELS]) {
    match level {
        SimdLevel::Scalar => unpack_frame_scalar(fr, out),
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx2 => unsafe { x86::unpack_frame_avx2(fr, out) },
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx512 => unsafe { x86::unpack_frame_avx512(fr, out) },
        #[cfg(not(target_arch = "x86_64"))]
        _ => unpack_frame_scalar(fr, out),
    }
}

/// Unpack four consecutive frames at once. Only the AVX512 kernel batches
/// across frames; other levels loop [`unpack_frame`].
pub fn unpack_frames_x4(
    frames: [&[u8]; 4],
    level: SimdLevel,
    out: &mut [[u16; frame::NUM_CHANNELS]; 4],
) {
    #[cfg(target_arch = "x86_64")]
    if level == SimdLevel::Avx512 {
        unsafe { x86::unpack_frames_x4_avx512(frames, out) };
        return;
    }
    for (fr, o) in frames.into_iter().zip(out.iter_mut()) {
        unpack_frame(fr, level, o);
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use core::arch::x86_64::*;

    use crate::frame;

    // Pad the 96-byte segment so the 16-byte load at chunk offset 84 cannot
    // read past the staging buffer.
    const STAGED: usize = frame::SEGMENT_SIZE + 16;

    // Byte pairs covering samples 0..8 of a 12-byte run; repeated per
    // 128-bit lane.
    const SHUF: [i8; 16] = [0, 1, 1, 2, 3, 4, 4, 5, 6, 7, 7, 8, 9, 10, 10, 11];

    // Per-16-bit-lane multipliers packed as one u32: even samples scale by
    // 16 (low lane), odd samples by 1 (high lane); the common shift by 4
    // then leaves the 12-bit value in both cases.
    const EVEN_ODD_SCALE: i32 = 0x0001_0010;

    #[inline]
    fn stage_segments(fr: &[u8]) -> [[u8; STAGED]; frame::COLDDATA_BLOCKS] {
        debug_assert!(fr.len() >= frame::FRAME_SIZE);
        let mut segs = [[0u8; STAGED]; frame::COLDDATA_BLOCKS];
        for (block, seg) in segs.iter_mut().enumerate() {
            let off = frame::segment_offset(block);
            seg[..frame::SEGMENT_SIZE].copy_from_slice(&fr[off..off + frame::SEGMENT_SIZE]);
        }
        segs
    }

    /// AVX2 kernel: two segments per vector op, eight samples per 128-bit
    /// lane, eight chunk iterations per segment pair.
    #[target_feature(enable = "avx2")]
    pub unsafe fn unpack_frame_avx2(fr: &[u8], out: &mut [u16; frame::NUM_CHANNELS]) {
        let segs = stage_segments(fr);

        unsafe {
            let shuf = _mm256_broadcastsi128_si256(_mm_loadu_si128(SHUF.as_ptr() as *const __m128i));
            let scale = _mm256_set1_epi32(EVEN_ODD_SCALE);

            for pair in 0..2 {
                let (a, b) = (2 * pair, 2 * pair + 1);
                for chunk in 0..8 {
                    let lo = _mm_loadu_si128(segs[a][12 * chunk..].as_ptr() as *const __m128i);
                    let hi = _mm_loadu_si128(segs[b][12 * chunk..].as_ptr() as *const __m128i);
                    let v = _mm256_set_m128i(hi, lo);

                    let gathered = _mm256_shuffle_epi8(v, shuf);
                    let aligned = _mm256_mullo_epi16(gathered, scale);
                    let vals = _mm256_srli_epi16::<4>(aligned);

                    let mut tmp = [0u16; 16];
                    _mm256_storeu_si256(tmp.as_mut_ptr() as *mut __m256i, vals);
                    let base_a = a * frame::CHANNELS_PER_BLOCK + 8 * chunk;
                    let base_b = b * frame::CHANNELS_PER_BLOCK + 8 * chunk;
                    out[base_a..base_a + 8].copy_from_slice(&tmp[..8]);
                    out[base_b..base_b + 8].copy_from_slice(&tmp[8..]);
                }
            }
        }
    }

    /// AVX512 kernel for a single frame: all four segments per vector op.
    #[target_feature(enable = "avx512f", enable = "avx512bw")]
    pub unsafe fn unpack_frame_avx512(fr: &[u8], out: &mut [u16; frame::NUM_CHANNELS]) {
        let segs = stage_segments(fr);

        unsafe {
            let shuf =
                _mm512_broadcast_i32x4(_mm_loadu_si128(SHUF.as_ptr() as *const __m128i));
            let scale = _mm512_set1_epi32(EVEN_ODD_SCALE);

            for chunk in 0..8 {
                let l0 = _mm_loadu_si128(segs[0][12 * chunk..].as_ptr() as *const __m128i);
                let l1 = _mm_loadu_si128(segs[1][12 * chunk..].as_ptr() as *const __m128i);
                let l2 = _mm_loadu_si128(segs[2][12 * chunk..].as_ptr() as *const __m128i);
                let l3 = _mm_loadu_si128(segs[3][12 * chunk..].as_ptr() as *const __m128i);
                let mut v = _mm512_castsi128_si512(l0);
                v = _mm512_inserti32x4::<1>(v, l1);
                v = _mm512_inserti32x4::<2>(v, l2);
                v = _mm512_inserti32x4::<3>(v, l3);

                let gathered = _mm512_shuffle_epi8(v, shuf);
                let aligned = _mm512_mullo_epi16(gathered, scale);
                let vals = _mm512_srli_epi16::<4>(aligned);

                let mut tmp = [0u16; 32];
                _mm512_storeu_si512(tmp.as_mut_ptr() as *mut __m512i, vals);
                for block in 0..frame::COLDDATA_BLOCKS {
                    let base = block * frame::CHANNELS_PER_BLOCK + 8 * chunk;
                    out[base..base + 8].copy_from_slice(&tmp[block * 8..block * 8 + 8]);
                }
            }
        }
    }

    /// AVX512 kernel batching the same segment chunk across four frames.
    #[target_feature(enable = "avx512f", enable = "avx512bw")]
    pub unsafe fn unpack_frames_x4_avx512(
        frames: [&[u8]; 4],
        out: &mut [[u16; frame::NUM_CHANNELS]; 4],
    ) {
        let staged: [[[u8; STAGED]; frame::COLDDATA_BLOCKS]; 4] = [
            stage_segments(frames[0]),
            stage_segments(frames[1]),
            stage_segments(frames[2]),
            stage_segments(frames[3]),
        ];

        unsafe {
            let shuf =
                _mm512_broadcast_i32x4(_mm_loadu_si128(SHUF.as_ptr() as *const __m128i));
            let scale = _mm512_set1_epi32(EVEN_ODD_SCALE);

            for block in 0..frame::COLDDATA_BLOCKS {
                for chunk in 0..8 {
                    let l0 =
                        _mm_loadu_si128(staged[0][block][12 * chunk..].as_ptr() as *const __m128i);
                    let l1 =
                        _mm_loadu_si128(staged[1][block][12 * chunk..].as_ptr() as *const __m128i);
                    let l2 =
                        _mm_loadu_si128(staged[2][block][12 * chunk..].as_ptr() as *const __m128i);
                    let l3 =
                        _mm_loadu_si128(staged[3][block][12 * chunk..].as_ptr() as *const __m128i);
                    let mut v = _mm512_castsi128_si512(l0);
                    v = _mm512_inserti32x4::<1>(v, l1);
                    v = _mm512_inserti32x4::<2>(v, l2);
                    v = _mm512_inserti32x4::<3>(v, l3);

                    let gathered = _mm512_shuffle_epi8(v, shuf);
                    let aligned = _mm512_mullo_epi16(gathered, scale);
                    let vals = _mm512_srli_epi16::<4>(aligned);

                    let mut tmp = [0u16; 32];
                    _mm512_storeu_si512(tmp.as_mut_ptr() as *mut __m512i, vals);
                    let base = block * frame::CHANNELS_PER_BLOCK + 8 * chunk;
                    for f in 0..4 {
                        out[f][base..base + 8].copy_from_slice(&tmp[f * 8..f * 8 + 8]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn random_frame(rng: &mut StdRng) -> Vec<u8> {
        let mut fr = vec![0u8; frame::FRAME_SIZE];
        rng.fill(&mut fr[..]);
        fr
    }

    #[test]
    fn scalar_matches_layout_accessor() {
        let mut rng = StdRng::seed_from_u64(11);
        let fr = random_frame(&mut rng);
        let mut out = [0u16; frame::NUM_CHANNELS];
        unpack_frame_scalar(&fr, &mut out);
        for ch in 0..frame::NUM_CHANNELS {
            assert_eq!(out[ch], frame::adc_value(&fr, ch), "channel {ch}");
        }
    }

    #[test]
    fn avx2_matches_scalar() {
        if !SimdLevel::Avx2.is_available() {
            eprintln!("skipping: AVX2 not available");
            return;
        }
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..32 {
            let fr = random_frame(&mut rng);
            let mut want = [0u16; frame::NUM_CHANNELS];
            let mut got = [0u16; frame::NUM_CHANNELS];
            unpack_frame_scalar(&fr, &mut want);
            unpack_frame(&fr, SimdLevel::Avx2, &mut got);
            assert_eq!(got, want);
        }
    }

    #[test]
    fn avx512_matches_scalar() {
        if !SimdLevel::Avx512.is_available() {
            eprintln!("skipping: AVX512 not available");
            return;
        }
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..32 {
            let fr = random_frame(&mut rng);
            let mut want = [0u16; frame::NUM_CHANNELS];
            let mut got = [0u16; frame::NUM_CHANNELS];
            unpack_frame_scalar(&fr, &mut want);
            unpack_frame(&fr, SimdLevel::Avx512, &mut got);
            assert_eq!(got, want);
        }
    }

    #[test]
    fn avx512_frame_batch_matches_scalar() {
        if !SimdLevel::Avx512.is_available() {
            eprintln!("skipping: AVX512 not available");
            return;
        }
        let mut rng = StdRng::seed_from_u64(14);
        let frames: Vec<Vec<u8>> = (0..4).map(|_| random_frame(&mut rng)).collect();
        let refs = [&frames[0][..], &frames[1][..], &frames[2][..], &frames[3][..]];

        let mut got = [[0u16; frame::NUM_CHANNELS]; 4];
        unpack_frames_x4(refs, SimdLevel::Avx512, &mut got);
        for f in 0..4 {
            let mut want = [0u16; frame::NUM_CHANNELS];
            unpack_frame_scalar(&frames[f], &mut want);
            assert_eq!(got[f], want, "frame {f}");
        }
    }
}
