use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        BlendError::configuration("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(
        BlendError::weight_shape("x")
            .to_string()
            .contains("invalid weight shape:")
    );
    assert!(
        BlendError::codec_creation("x")
            .to_string()
            .contains("codec creation error:")
    );
    assert!(BlendError::decode("x").to_string().contains("decode error:"));
    assert!(BlendError::encode("x").to_string().contains("encode error:"));
    assert!(
        BlendError::header_parse("x")
            .to_string()
            .contains("header parse error:")
    );
}

#[test]
fn dimension_mismatch_names_index_and_both_sizes() {
    let err = BlendError::DimensionMismatch {
        index: 1,
        expected: (4, 2),
        actual: (8, 2),
    };
    let msg = err.to_string();
    assert!(msg.contains("frame 1"));
    assert!(msg.contains("8x2"));
    assert!(msg.contains("4x2"));
}

#[test]
fn ensure_len_rejects_short_buffers() {
    assert!(BlendError::ensure_len(4, 4).is_ok());
    assert!(matches!(
        BlendError::ensure_len(5, 4),
        Err(BlendError::BufferTooSmall {
            required: 5,
            actual: 4
        })
    ));
}

#[test]
fn fetch_and_other_preserve_source() {
    let err = BlendError::Fetch {
        frame_id: 7,
        source: anyhow::anyhow!("disk gone"),
    };
    let msg = err.to_string();
    assert!(msg.contains("frame 7"));
    assert!(msg.contains("disk gone"));

    let base = std::io::Error::other("boom");
    let err = BlendError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
