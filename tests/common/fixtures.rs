use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use serde_json::{Value, json};

use holdroute::{Detection, PixelBox};

/// Writes a solid gray test image of the given size and returns its path
pub fn write_test_image(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let img = ImageBuffer::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128u8]));
    let path = dir.join(name);
    img.save(&path).expect("Failed to save test image");
    path
}

/// Writes a detection sidecar next to `image`
pub fn write_sidecar(image: &Path, detections: &[Detection]) {
    let entries: Vec<Value> = detections
        .iter()
        .map(|d| {
            json!({
                "class_id": d.class_id,
                "confidence": d.confidence,
                "bbox": [d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2],
            })
        })
        .collect();
    let body = json!({ "detections": entries });
    std::fs::write(image.with_extension("json"), body.to_string())
        .expect("Failed to write sidecar");
}

pub fn make_detection(class_id: u32, confidence: f32, bbox: [f32; 4]) -> Detection {
    Detection {
        class_id,
        confidence,
        bbox: PixelBox::from(bbox),
    }
}

/// Number of files directly inside `dir`
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}

/// The two-hold wall used across route tests: a jug low, a crimp high
pub fn jug_and_crimp_holds() -> Value {
    json!({"holds": [
        {"id": 0, "type": "Jug", "bbox": [0, 80, 20, 100]},
        {"id": 1, "type": "Crimp", "bbox": [0, 0, 20, 20]}
    ]})
}
