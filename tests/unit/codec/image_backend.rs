use super::*;

fn settings() -> EncoderSettings {
    EncoderSettings {
        max_width: 256,
        max_height: 256,
        quality: 95,
        dct_method: DctMethod::Integer,
        buffer_size: 64 * 1024,
    }
}

#[test]
fn gray_jpeg_round_trips_header_and_pixels() {
    let b = ImageJpegBackend::new();
    let (w, h) = (16u32, 8u32);
    let pixels = vec![120u8; (w * h) as usize];
    let mut jpeg = vec![0u8; 64 * 1024];
    let n = b.encode_gray(w, h, 95, &pixels, &mut jpeg).unwrap();
    assert!(n > 0);

    let info = b.read_header(&jpeg[..n]).unwrap();
    assert_eq!(
        info,
        JpegInfo {
            width: w,
            height: h,
            components: 1
        }
    );

    let mut dec = b.create_decoder(256, 256).unwrap();
    let mut out = vec![0u8; pixels.len()];
    let d = b.decode_gray(&mut dec, &jpeg[..n], &mut out).unwrap();
    assert_eq!(d.bytes_written, pixels.len());
    assert!(out.iter().all(|&v| v.abs_diff(120) <= 2), "{out:?}");
}

#[test]
fn i420_encode_produces_color_jpeg() {
    let b = ImageJpegBackend::new();
    let (w, h) = (16u32, 16u32);
    let mut i420 = vec![0u8; FrameHeader::i420_len(w, h)];
    let rgb = [200u8, 60, 30].repeat((w * h) as usize);
    yuv::rgb_to_i420(&rgb, w, h, &mut i420);

    let mut enc = b.create_encoder(&settings()).unwrap();
    let mut jpeg = vec![0u8; 64 * 1024];
    let n = b.encode_i420(&mut enc, w, h, &i420, &mut jpeg).unwrap();
    assert_eq!(b.read_header(&jpeg[..n]).unwrap().components, 3);

    let mut dec = b.create_decoder(256, 256).unwrap();
    let mut back = vec![0u8; i420.len()];
    b.decode_i420(&mut dec, &jpeg[..n], &mut back).unwrap();
    for (a, e) in back.iter().zip(&i420) {
        assert!(a.abs_diff(*e) <= 6, "{a} vs {e}");
    }
}

#[test]
fn gray_jpeg_decodes_to_neutral_chroma() {
    let b = ImageJpegBackend::new();
    let mut jpeg = vec![0u8; 64 * 1024];
    let n = b.encode_gray(4, 4, 90, &[50; 16], &mut jpeg).unwrap();
    let mut dec = b.create_decoder(16, 16).unwrap();
    let mut out = vec![0u8; FrameHeader::i420_len(4, 4)];
    b.decode_i420(&mut dec, &jpeg[..n], &mut out).unwrap();
    assert!(out[16..].iter().all(|&c| c == 128));
}

#[test]
fn limits_are_enforced() {
    let b = ImageJpegBackend::new();
    let mut jpeg = vec![0u8; 64 * 1024];
    let n = b.encode_gray(8, 8, 90, &[0; 64], &mut jpeg).unwrap();
    let mut dec = b.create_decoder(4, 4).unwrap();
    let mut out = [0u8; 64];
    assert!(b.decode_gray(&mut dec, &jpeg[..n], &mut out).is_err());

    let mut enc = b
        .create_encoder(&EncoderSettings {
            max_width: 4,
            max_height: 4,
            ..settings()
        })
        .unwrap();
    let i420 = vec![0u8; FrameHeader::i420_len(8, 8)];
    assert!(b.encode_i420(&mut enc, 8, 8, &i420, &mut jpeg).is_err());
}

#[test]
fn garbage_header_is_rejected() {
    let b = ImageJpegBackend::new();
    assert!(b.read_header(&[0, 1, 2, 3, 4]).is_err());
}

#[test]
fn dct_method_is_recorded() {
    let b = ImageJpegBackend::new();
    let mut enc = b.create_encoder(&settings()).unwrap();
    b.set_dct_method(&mut enc, DctMethod::Fast);
    b.set_quality(&mut enc, 30);
    assert_eq!(enc.dct_method(), DctMethod::Fast);
    assert_eq!(enc.quality(), 30);
}
