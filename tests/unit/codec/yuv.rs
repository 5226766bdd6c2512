use super::*;

#[test]
fn gray_levels_survive_both_directions() {
    for v in [0u8, 1, 64, 128, 200, 255] {
        assert_eq!(rgb_to_y(v, v, v), v);
    }

    let (w, h) = (4u32, 2u32);
    let rgb: Vec<u8> = [10u8, 90, 170, 250]
        .iter()
        .cycle()
        .take((w * h) as usize)
        .flat_map(|&v| [v, v, v])
        .collect();
    let mut i420 = vec![0u8; FrameHeader::i420_len(w, h)];
    rgb_to_i420(&rgb, w, h, &mut i420);
    assert_eq!(&i420[..8], &[10, 90, 170, 250, 10, 90, 170, 250]);
    assert!(i420[8..].iter().all(|&c| c == 128));

    let mut back = vec![0u8; rgb.len()];
    i420_to_rgb(&i420, w, h, &mut back);
    assert_eq!(back, rgb);
}

#[test]
fn primaries_round_trip_within_tolerance() {
    let (w, h) = (2u32, 2u32);
    for color in [[255u8, 0, 0], [0, 255, 0], [0, 0, 255], [40, 120, 200]] {
        let rgb: Vec<u8> = color.repeat(4);
        let mut i420 = vec![0u8; FrameHeader::i420_len(w, h)];
        rgb_to_i420(&rgb, w, h, &mut i420);
        let mut back = vec![0u8; 12];
        i420_to_rgb(&i420, w, h, &mut back);
        for (a, b) in back.iter().zip(&rgb) {
            assert!(a.abs_diff(*b) <= 2, "{color:?}: {back:?}");
        }
    }
}

#[test]
fn odd_dimensions_pad_chroma_with_neutral() {
    let (w, h) = (3u32, 3u32);
    let rgb = vec![255u8; 27];
    let mut i420 = vec![0u8; FrameHeader::i420_len(w, h)];
    rgb_to_i420(&rgb, w, h, &mut i420);
    assert!(i420[..9].iter().all(|&y| y == 255));
    // One real chroma sample per plane, one padding byte each.
    assert_eq!(&i420[9..], &[128, 128, 128, 128]);

    let mut back = vec![0u8; 27];
    i420_to_rgb(&i420, w, h, &mut back);
    assert!(back.iter().all(|&v| v == 255));
}
