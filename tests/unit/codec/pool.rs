use super::*;
use crate::codec::mock::MockJpegBackend;
use crate::foundation::frame::PixelFormat;

fn pool() -> (CodecPool<MockJpegBackend>, MockJpegBackend) {
    let backend = MockJpegBackend::new();
    let observer = backend.clone();
    (CodecPool::new(backend, CodecPoolOpts::default()), observer)
}

#[test]
fn returned_handles_are_reused() {
    let (pool, mock) = pool();
    let d = pool.rent_decoder().unwrap();
    pool.return_decoder(d);
    let d = pool.rent_decoder().unwrap();
    pool.return_decoder(d);

    assert_eq!(mock.decoders_created(), 1);
    let s = pool.stats();
    assert_eq!(s.decoders.created, 1);
    assert_eq!(s.decoders.idle, 1);
    assert_eq!(s.decoders.lent, 0);
}

#[test]
fn idle_set_grows_to_peak_concurrency() {
    let (pool, mock) = pool();
    let rented: Vec<_> = (0..4).map(|_| pool.rent_encoder().unwrap()).collect();
    for h in rented {
        pool.return_encoder(h);
    }
    let again: Vec<_> = (0..4).map(|_| pool.rent_encoder().unwrap()).collect();
    assert_eq!(mock.encoders_created(), 4);
    assert_eq!(pool.stats().encoders.peak_lent, 4);
    for h in again {
        pool.return_encoder(h);
    }
    assert_eq!(pool.stats().encoders.idle, 4);
}

#[test]
fn leases_return_on_drop() {
    let (pool, _) = pool();
    {
        let _a = pool.lease_decoder().unwrap();
        let _b = pool.lease_decoder().unwrap();
        assert_eq!(pool.stats().decoders.lent, 2);
    }
    let s = pool.stats();
    assert_eq!(s.decoders.lent, 0);
    assert_eq!(s.decoders.idle, 2);
}

#[test]
fn creation_failure_maps_to_codec_creation() {
    let (pool, mock) = pool();
    mock.set_fail_decoder_creation(true);
    assert!(matches!(
        pool.rent_decoder(),
        Err(BlendError::CodecCreation(_))
    ));
    assert_eq!(pool.stats().decoders.lent, 0);

    mock.set_fail_decoder_creation(false);
    assert!(pool.rent_decoder().is_ok());
}

#[test]
fn image_info_reports_layout_by_components() {
    let (pool, _) = pool();
    let gray = MockJpegBackend::gray_jpeg(4, 2, &[0; 8]);
    let h = pool.get_image_info(&gray).unwrap();
    assert_eq!(h, FrameHeader::gray(4, 2));

    let i420 = MockJpegBackend::i420_jpeg(4, 2, &[0; 12]);
    let h = pool.get_image_info(&i420).unwrap();
    assert_eq!(h.format, PixelFormat::I420);
    assert_eq!(h.len, 12);

    assert!(matches!(
        pool.get_image_info(b"garbage"),
        Err(BlendError::HeaderParse(_))
    ));
}

#[test]
fn decode_checks_output_length_first() {
    let (pool, mock) = pool();
    let jpeg = MockJpegBackend::gray_jpeg(2, 2, &[9, 8, 7, 6]);
    let mut lease = pool.lease_decoder().unwrap();

    let mut short = [0u8; 3];
    let err = pool.decode_gray(&mut lease, &jpeg, &mut short).unwrap_err();
    assert!(matches!(
        err,
        BlendError::BufferTooSmall {
            required: 4,
            actual: 3
        }
    ));
    assert_eq!(mock.decodes(), 0);

    let mut out = [0u8; 4];
    let h = pool.decode_gray(&mut lease, &jpeg, &mut out).unwrap();
    assert_eq!(h, FrameHeader::gray(2, 2));
    assert_eq!(out, [9, 8, 7, 6]);

    let mut i420 = [0u8; 6];
    let h = pool.decode_subsampled(&mut lease, &jpeg, &mut i420).unwrap();
    assert_eq!(h, FrameHeader::i420(2, 2));
    assert_eq!(i420, [9, 8, 7, 6, 128, 128]);
}

#[test]
fn decode_failure_maps_to_decode_error() {
    let backend = MockJpegBackend::new();
    let pool = CodecPool::new(
        backend,
        CodecPoolOpts {
            max_width: 1,
            max_height: 1,
            ..CodecPoolOpts::default()
        },
    );
    let jpeg = MockJpegBackend::gray_jpeg(2, 2, &[0; 4]);
    let mut lease = pool.lease_decoder().unwrap();
    let mut out = [0u8; 4];
    assert!(matches!(
        pool.decode_gray(&mut lease, &jpeg, &mut out),
        Err(BlendError::Decode(_))
    ));
}

#[test]
fn encode_validates_input_and_output() {
    let (pool, _) = pool();
    let mut out = vec![0u8; 256];
    assert!(matches!(
        pool.encode_gray(2, 2, 90, &[0; 3], &mut out),
        Err(BlendError::BufferTooSmall { .. })
    ));

    let n = pool.encode_gray(2, 2, 90, &[1, 2, 3, 4], &mut out).unwrap();
    assert_eq!(&out[..n], MockJpegBackend::gray_jpeg(2, 2, &[1, 2, 3, 4]).as_slice());

    let mut enc = pool.lease_encoder().unwrap();
    let mut tiny = [0u8; 2];
    assert!(matches!(
        pool.encode_subsampled(&mut enc, 2, 2, &[0; 6], &mut tiny),
        Err(BlendError::Encode(_))
    ));
}

#[test]
fn settings_are_forwarded_to_handles() {
    let (pool, _) = pool();
    let mut enc = pool.lease_encoder().unwrap();
    assert_eq!(enc.quality(), CodecPoolOpts::default().quality);
    pool.set_quality(&mut enc, 55);
    pool.set_dct_method(&mut enc, DctMethod::Fast);
    assert_eq!(enc.quality(), 55);
    assert_eq!(enc.dct_method(), DctMethod::Fast);
}

#[test]
fn shutdown_closes_idle_and_late_returns() {
    let (pool, mock) = pool();
    let idle = pool.rent_encoder().unwrap();
    let held = pool.rent_encoder().unwrap();
    pool.return_encoder(idle);

    pool.shutdown();
    assert_eq!(mock.encoders_closed(), 1);
    assert!(matches!(
        pool.rent_encoder(),
        Err(BlendError::CodecCreation(_))
    ));

    pool.return_encoder(held);
    assert_eq!(mock.encoders_closed(), 2);
    let s = pool.stats();
    assert!(s.shut_down);
    assert_eq!(s.encoders.idle, 0);
    assert_eq!(s.encoders.closed, 2);

    pool.shutdown();
    assert_eq!(mock.encoders_closed(), 2);
}

#[test]
fn dropping_the_pool_closes_idle_handles() {
    let (pool, mock) = pool();
    let d = pool.rent_decoder().unwrap();
    pool.return_decoder(d);
    drop(pool);
    assert_eq!(mock.decoders_closed(), 1);
}

#[test]
fn concurrent_renters_never_share_a_handle() {
    let (pool, mock) = pool();
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..50 {
                    let _lease = pool.lease_decoder().unwrap();
                }
            });
        }
    });
    let st = pool.stats();
    assert_eq!(st.decoders.lent, 0);
    assert!(mock.decoders_created() <= 8);
    assert_eq!(st.decoders.idle, mock.decoders_created());
}

#[test]
fn peak_lent_covers_every_constructed_handle() {
    let (pool, mock) = pool();
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for i in 0..100 {
                    let _enc = pool.lease_encoder().unwrap();
                    if i % 3 == 0 {
                        let _second = pool.lease_encoder().unwrap();
                    }
                }
            });
        }
    });
    let st = pool.stats().encoders;
    assert_eq!(st.created as usize, mock.encoders_created());
    assert!(
        st.peak_lent as u64 >= st.created,
        "peak {} below {} constructed handles",
        st.peak_lent,
        st.created
    );
    assert_eq!(st.lent, 0);
}

#[test]
fn failed_construction_releases_its_reservation() {
    let (pool, mock) = pool();
    let held = pool.rent_encoder().unwrap();
    mock.set_fail_encoder_creation(true);
    assert!(pool.rent_encoder().is_err());
    let st = pool.stats().encoders;
    assert_eq!((st.lent, st.peak_lent, st.created), (1, 2, 1));
    pool.return_encoder(held);
    assert_eq!(pool.stats().encoders.lent, 0);
}

#[test]
fn overflowing_dimensions_are_a_header_error() {
    let (pool, _) = pool();
    let mut jpeg = vec![0xFF, 0xD8, b'H', b'B', 3];
    jpeg.extend_from_slice(&u32::MAX.to_le_bytes());
    jpeg.extend_from_slice(&u32::MAX.to_le_bytes());
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    assert!(matches!(
        pool.get_image_info(&jpeg),
        Err(BlendError::HeaderParse(_))
    ));
}
