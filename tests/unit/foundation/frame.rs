use super::*;
use crate::buffer::pool::{BufferPool, BufferPoolOpts};

#[test]
fn i420_len_is_luma_plus_two_quarter_planes() {
    assert_eq!(FrameHeader::i420_len(4, 2), 8 + 2 * 2);
    assert_eq!(FrameHeader::i420(640, 480).len, 640 * 480 * 3 / 2);
    // Odd dimensions truncate the chroma planes.
    assert_eq!(FrameHeader::i420_len(3, 3), 9 + 2 * 2);
}

#[test]
fn packed_headers_use_stride_times_height() {
    let rgb = FrameHeader::rgb(5, 3);
    assert_eq!(rgb.stride, 15);
    assert_eq!(rgb.len, 45);

    let gray = FrameHeader::gray(5, 3);
    assert_eq!(gray.stride, 5);
    assert_eq!(gray.len, 15);
    assert!(!gray.format.is_planar());
    assert!(PixelFormat::I420.is_planar());
}

#[test]
fn with_len_keeps_geometry() {
    let h = FrameHeader::gray(8, 8).with_len(123);
    assert_eq!(h.dimensions(), (8, 8));
    assert_eq!(h.len, 123);
    assert_eq!(h.expected_len(), 64);
    assert!(!h.same_geometry(&FrameHeader::gray(8, 8)));
}

#[test]
fn borrowed_image_rejects_short_data() {
    let data = [1u8, 2, 3];
    let err = FrameImage::borrowed(FrameHeader::gray(2, 2), &data).unwrap_err();
    assert!(matches!(err, BlendError::BufferTooSmall { .. }));
}

#[test]
fn data_is_trimmed_to_header_len() {
    let pool = BufferPool::new(BufferPoolOpts::default());
    let mut buf = pool.acquire(16);
    buf[..3].copy_from_slice(&[9, 8, 7]);
    let img = FrameImage::pooled(FrameHeader::gray(4, 4).with_len(3), buf).unwrap();
    assert!(img.is_pooled());
    assert_eq!(img.data(), &[9, 8, 7]);
    assert_eq!(img.to_vec(), vec![9, 8, 7]);
}

#[test]
fn pooled_image_releases_exactly_once() {
    let pool = BufferPool::new(BufferPoolOpts::default());
    let img = FrameImage::pooled(FrameHeader::gray(2, 2), pool.acquire(4)).unwrap();
    assert_eq!(pool.stats().outstanding, 1);
    drop(img);
    let st = pool.stats();
    assert_eq!(st.outstanding, 0);
    assert_eq!(st.retained_buffers, 1);
}

#[test]
fn shared_image_does_not_touch_pools() {
    let data: Arc<[u8]> = Arc::from(vec![1u8, 2, 3, 4]);
    let img = FrameImage::shared(FrameHeader::gray(2, 2), Arc::clone(&data)).unwrap();
    assert_eq!(img.data(), &[1, 2, 3, 4]);
    assert!(matches!(img.bytes(), FrameBytes::Shared(_)));
    drop(img);
    assert_eq!(Arc::strong_count(&data), 1);
}
