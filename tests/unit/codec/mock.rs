use super::*;

fn settings() -> EncoderSettings {
    EncoderSettings {
        max_width: 64,
        max_height: 64,
        quality: 90,
        dct_method: DctMethod::Integer,
        buffer_size: 1024,
    }
}

#[test]
fn header_reports_dimensions_and_components() {
    let b = MockJpegBackend::new();
    let jpeg = MockJpegBackend::gray_jpeg(3, 2, &[0; 6]);
    let info = b.read_header(&jpeg).unwrap();
    assert_eq!(
        info,
        JpegInfo {
            width: 3,
            height: 2,
            components: 1
        }
    );

    let jpeg = MockJpegBackend::i420_jpeg(2, 2, &[0; 6]);
    assert_eq!(b.read_header(&jpeg).unwrap().components, 3);
}

#[test]
fn garbage_and_truncated_inputs_fail() {
    let b = MockJpegBackend::new();
    assert!(b.read_header(b"not a jpeg at all").is_err());
    let mut jpeg = MockJpegBackend::gray_jpeg(2, 2, &[1, 2, 3, 4]);
    jpeg.truncate(jpeg.len() - 3);
    assert!(b.read_header(&jpeg).is_err());
}

#[test]
fn gray_round_trip_is_lossless() {
    let b = MockJpegBackend::new();
    let mut dec = b.create_decoder(64, 64).unwrap();
    let pixels = [5u8, 6, 7, 8];
    let mut jpeg = vec![0u8; 64];
    let n = b.encode_gray(2, 2, 80, &pixels, &mut jpeg).unwrap();

    let mut out = [0u8; 4];
    let d = b.decode_gray(&mut dec, &jpeg[..n], &mut out).unwrap();
    assert_eq!(d.bytes_written, 4);
    assert_eq!((d.width, d.height), (2, 2));
    assert_eq!(out, pixels);
    assert_eq!(b.decodes(), 1);
    assert_eq!(b.encodes(), 1);
}

#[test]
fn i420_decode_of_gray_source_fills_neutral_chroma() {
    let b = MockJpegBackend::new();
    let mut dec = b.create_decoder(64, 64).unwrap();
    let jpeg = MockJpegBackend::gray_jpeg(2, 2, &[1, 2, 3, 4]);
    let mut out = [0u8; 6];
    let d = b.decode_i420(&mut dec, &jpeg, &mut out).unwrap();
    assert_eq!(d.bytes_written, 6);
    assert_eq!(out, [1, 2, 3, 4, 128, 128]);
}

#[test]
fn gray_decode_of_i420_source_keeps_luma() {
    let b = MockJpegBackend::new();
    let mut dec = b.create_decoder(64, 64).unwrap();
    let jpeg = MockJpegBackend::i420_jpeg(2, 2, &[1, 2, 3, 4, 90, 160]);
    let mut out = [0u8; 4];
    b.decode_gray(&mut dec, &jpeg, &mut out).unwrap();
    assert_eq!(out, [1, 2, 3, 4]);
}

#[test]
fn limits_and_short_outputs_are_errors() {
    let b = MockJpegBackend::new();
    let mut dec = b.create_decoder(1, 1).unwrap();
    let jpeg = MockJpegBackend::gray_jpeg(2, 2, &[0; 4]);
    let mut out = [0u8; 4];
    assert!(b.decode_gray(&mut dec, &jpeg, &mut out).is_err());

    let mut enc = b.create_encoder(&settings()).unwrap();
    let mut small = [0u8; 4];
    assert!(b.encode_i420(&mut enc, 2, 2, &[0; 6], &mut small).is_err());
}

#[test]
fn handle_settings_are_mutable() {
    let b = MockJpegBackend::new();
    let mut enc = b.create_encoder(&settings()).unwrap();
    b.set_quality(&mut enc, 40);
    b.set_dct_method(&mut enc, DctMethod::Fast);
    assert_eq!(enc.quality(), 40);
    assert_eq!(enc.dct_method(), DctMethod::Fast);
    b.close_encoder(enc);
    assert_eq!(b.encoders_closed(), 1);
}

#[test]
fn creation_failure_is_injectable_and_shared_across_clones() {
    let b = MockJpegBackend::new();
    let observer = b.clone();
    b.set_fail_encoder_creation(true);
    assert!(b.create_encoder(&settings()).is_err());
    b.set_fail_encoder_creation(false);
    b.create_encoder(&settings()).unwrap();
    assert_eq!(observer.encoders_created(), 1);
}

#[test]
fn oversized_header_is_an_error_not_an_overflow() {
    let b = MockJpegBackend::new();
    let mut jpeg = Vec::new();
    jpeg.extend_from_slice(&SOI);
    jpeg.extend_from_slice(&MAGIC);
    jpeg.push(3);
    jpeg.extend_from_slice(&u32::MAX.to_le_bytes());
    jpeg.extend_from_slice(&u32::MAX.to_le_bytes());
    jpeg.extend_from_slice(&EOI);
    assert!(b.read_header(&jpeg).is_err());

    jpeg[4] = 1;
    assert!(b.read_header(&jpeg).is_err());
}

#[test]
fn encoded_size_bound_pads_to_whole_blocks() {
    let b = MockJpegBackend::new();
    assert_eq!(b.max_encoded_len(16, 16, 1), 16 * 16 * 2 + 2048);
    assert_eq!(b.max_encoded_len(17, 1, 3), 32 * 16 * 6 + 2048);
    assert_eq!(b.max_encoded_len(u32::MAX, u32::MAX, 3), usize::MAX);
}
