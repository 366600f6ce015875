//! Image decoding and tensor layout

mod common;

use floraguard_inference::{preprocess, DecodeError, SourceImage};

#[test]
fn test_tensor_length_and_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_leaf(dir.path(), "leaf.png", [255, 128, 0]);

    for size in [1u32, 32, 224] {
        let tensor = preprocess(&path, size).expect("preprocess");
        let side = size as usize;
        assert_eq!(tensor.len(), 3 * side * side);
        assert_eq!(tensor.shape(), [1, 3, side, side]);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn test_channel_major_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_leaf(dir.path(), "leaf.png", [255, 0, 51]);

    let tensor = preprocess(&path, 4).unwrap();
    let plane = 16;
    let values = tensor.as_slice();
    assert!(values[..plane].iter().all(|v| (*v - 1.0).abs() < 1e-6));
    assert!(values[plane..2 * plane].iter().all(|v| *v == 0.0));
    assert!(values[2 * plane..].iter().all(|v| (*v - 0.2).abs() < 1e-6));
}

#[test]
fn test_non_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.jpg");
    std::fs::write(&path, "this is a text file").unwrap();

    assert!(matches!(preprocess(&path, 8), Err(DecodeError::Format { .. })));
    assert!(matches!(
        preprocess(&dir.path().join("missing.png"), 8),
        Err(DecodeError::Read { .. })
    ));
}

#[tokio::test]
async fn test_source_image_keeps_original_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_leaf(dir.path(), "leaf.png", [10, 200, 10]);

    let image = SourceImage::load(&path).await.unwrap();
    assert_eq!(image.bytes(), std::fs::read(&path).unwrap().as_slice());
    assert_eq!(image.decoded().width(), 16);
    assert_eq!(image.path(), path.as_path());
}
