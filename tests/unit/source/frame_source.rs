use super::*;

#[test]
fn in_memory_source_serves_inserted_frames() {
    let src = InMemoryFrameSource::new();
    assert!(src.is_empty());
    src.insert(3, vec![1, 2, 3]);
    assert_eq!(src.fetch(3).unwrap(), vec![1, 2, 3]);
    assert_eq!(src.len(), 1);

    let err = src.fetch(4).unwrap_err();
    assert!(err.to_string().contains("frame 4"));

    assert_eq!(src.remove(3), Some(vec![1, 2, 3]));
    assert!(src.fetch(3).is_err());
}

#[test]
fn collects_from_pairs() {
    let src: InMemoryFrameSource = (0..5u64).map(|i| (i, vec![i as u8])).collect();
    assert_eq!(src.len(), 5);
    assert_eq!(src.fetch(4).unwrap(), vec![4]);
}

#[test]
fn closures_are_sources() {
    fn assert_source<S: FrameSource>(s: &S, id: u64) -> Vec<u8> {
        s.fetch(id).unwrap()
    }
    let src = |id: u64| -> anyhow::Result<Vec<u8>> { Ok(vec![id as u8; 2]) };
    assert_eq!(assert_source(&src, 7), vec![7, 7]);
}
