use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wib_codec::{frame, reorder, reorder_into_with, reordered_size, Reorderer, SimdLevel};

/// Build `num_frames` header-consistent frames with pseudorandom ADC data.
fn build_fragment(num_frames: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut src = vec![0u8; num_frames * frame::FRAME_SIZE];
    let base_ts = 1_000_000u64;
    let base_cc = 40_000u16;

    for i in 0..num_frames {
        let fr = &mut src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
        fr[..4].copy_from_slice(&0x0057_4942u32.to_le_bytes());
        // crate 3, version 1, slot 2, fiber 1.
        let id: u16 = 3 | (1 << 8) | (2 << 12) | (1 << 15);
        fr[4..6].copy_from_slice(&id.to_le_bytes());
        fr[8..16].copy_from_slice(
            &(base_ts + frame::TIMESTAMP_TICKS_PER_FRAME * i as u64).to_le_bytes(),
        );
        for block in 0..frame::COLDDATA_BLOCKS {
            let at = frame::coldata_offset(block) + 8;
            let cc = base_cc.wrapping_add(i as u16).wrapping_add(block as u16 * 997);
            fr[at..at + 2].copy_from_slice(&cc.to_le_bytes());
        }
        for ch in 0..frame::NUM_CHANNELS {
            frame::put_adc_value(fr, ch, rng.gen_range(0..4096));
        }
    }
    src
}

fn bitmap_bit(buf: &[u8], index: usize) -> bool {
    buf[index / 8] & (1 << (index % 8)) != 0
}

#[test]
fn transpose_places_every_sample_channel_major() -> anyhow::Result<()> {
    let num_frames = 25;
    let src = build_fragment(num_frames, 101);
    let (buf, stats) = reorder(&src, num_frames)?;
    assert_eq!(stats.num_faulty, 0);

    for i in 0..num_frames {
        let fr = &src[i * frame::FRAME_SIZE..(i + 1) * frame::FRAME_SIZE];
        for ch in 0..frame::NUM_CHANNELS {
            let got = wib_codec::reorder::reordered_adc(&buf, num_frames, 0, ch, i)?;
            assert_eq!(got, frame::adc_value(fr, ch), "frame {i} channel {ch}");
        }
    }
    Ok(())
}

#[test]
fn written_bytes_match_the_size_formula() -> anyhow::Result<()> {
    for num_frames in [0usize, 1, 6000] {
        let src = build_fragment(num_frames, 7 + num_frames as u64);
        let (buf, stats) = reorder(&src, num_frames)?;
        assert_eq!(stats.num_faulty, 0);
        assert_eq!(buf.len(), reordered_size(num_frames, 0), "N={num_frames}");
        assert_eq!(stats.bytes_written, buf.len());
    }

    // One faulty frame (the last, so no successor prediction shifts).
    let mut src = build_fragment(10, 8);
    src[9 * frame::FRAME_SIZE + 8] ^= 0x40;
    let (buf, stats) = reorder(&src, 10)?;
    assert_eq!(stats.num_faulty, 1);
    assert_eq!(buf.len(), reordered_size(10, 1));

    // Every frame after the baseline faulty: garbage headers throughout.
    let mut rng = StdRng::seed_from_u64(9);
    let mut src = vec![0u8; 64 * frame::FRAME_SIZE];
    rng.fill(&mut src[..]);
    let (buf, stats) = reorder(&src, 64)?;
    assert_eq!(stats.num_faulty, 63);
    assert_eq!(buf.len(), reordered_size(64, 63));
    Ok(())
}

#[test]
fn timestamp_glitch_sets_exactly_one_fault_bit() -> anyhow::Result<()> {
    let num_frames = 10;
    let faulty = 4;
    let mut src = build_fragment(num_frames, 42);
    // The stream skips a tick: frame 4 arrives +50 after frame 3 instead of
    // +25, and later frames continue from the shifted value. Only frame 4
    // breaks prediction; frame 5 is consistent against the new baseline.
    for i in faulty..num_frames {
        let at = i * frame::FRAME_SIZE + 8;
        let ts = u64::from_le_bytes(src[at..at + 8].try_into()?) + 25;
        src[at..at + 8].copy_from_slice(&ts.to_le_bytes());
    }

    let (buf, stats) = reorder(&src, num_frames)?;
    assert_eq!(stats.num_faulty, 1);
    for i in 0..num_frames {
        assert_eq!(bitmap_bit(&buf, i), i == faulty, "bit {i}");
    }

    // The second snapshot is the faulty frame's header, and the frame after
    // the glitch is consistent against the observed (shifted) baseline.
    let bitmap_len = num_frames.div_ceil(8);
    let snap = &buf[bitmap_len + frame::HEADERS_SIZE..bitmap_len + 2 * frame::HEADERS_SIZE];
    assert_eq!(
        &snap[..16],
        &src[faulty * frame::FRAME_SIZE..faulty * frame::FRAME_SIZE + 16]
    );
    Ok(())
}

#[test]
fn convert_count_glitch_is_a_fault() -> anyhow::Result<()> {
    // Glitch the last frame so no successor prediction is disturbed.
    let mut src = build_fragment(6, 43);
    let at = 5 * frame::FRAME_SIZE + frame::coldata_offset(1) + 8;
    let cc = u16::from_le_bytes([src[at], src[at + 1]]).wrapping_add(3);
    src[at..at + 2].copy_from_slice(&cc.to_le_bytes());

    let (buf, stats) = reorder(&src, 6)?;
    assert_eq!(stats.num_faulty, 1);
    assert!(bitmap_bit(&buf, 5));
    for i in 0..5 {
        assert!(!bitmap_bit(&buf, i), "bit {i}");
    }
    Ok(())
}

#[test]
fn chunked_reorder_matches_one_shot() -> anyhow::Result<()> {
    let num_frames = 37;
    let mut src = build_fragment(num_frames, 55);
    // A couple of faults so the snapshot region is exercised too.
    src[9 * frame::FRAME_SIZE + 12] ^= 0x01;
    src[20 * frame::FRAME_SIZE + frame::coldata_offset(3) + 9] ^= 0x80;

    let (expected, expected_stats) = reorder(&src, num_frames)?;

    for chunk in [1usize, 3, 7, 16, num_frames] {
        let mut r = Reorderer::with_simd_level(num_frames, SimdLevel::Scalar);
        let mut start = 0;
        while start < num_frames {
            let stop = (start + chunk).min(num_frames);
            r.reorder_part(&src, start, stop)?;
            start = stop;
        }
        let (got, stats) = r.finish()?;
        assert_eq!(stats.num_faulty, expected_stats.num_faulty, "chunk={chunk}");
        assert_eq!(got, expected, "chunk={chunk}");
    }
    Ok(())
}

#[test]
fn simd_kernels_are_byte_identical() -> anyhow::Result<()> {
    let num_frames = 23;
    let mut src = build_fragment(num_frames, 77);
    src[5 * frame::FRAME_SIZE + 10] ^= 0xFF;

    let mut baseline = vec![0u8; reordered_size(num_frames, num_frames)];
    let stats = reorder_into_with(&mut baseline, &src, num_frames, SimdLevel::Scalar)?;

    for level in [SimdLevel::Avx2, SimdLevel::Avx512] {
        if !level.is_available() {
            eprintln!("skipping {level:?}: not available on this CPU");
            continue;
        }
        let mut got = vec![0u8; baseline.len()];
        let got_stats = reorder_into_with(&mut got, &src, num_frames, level)?;
        assert_eq!(got_stats, stats, "{level:?}");
        assert_eq!(got, baseline, "{level:?}");
    }
    Ok(())
}
