use crate::models::PixelBox;

/// Expand a box by `padding` times its own width/height on every side, then
/// clamp to the frame. Clamping runs after expansion so the output keeps
/// x1 <= x2 and y1 <= y2 even for boxes hanging off the frame edge.
pub fn pad_box(bbox: &PixelBox, frame_w: u32, frame_h: u32, padding: f32) -> PixelBox {
    let padding = padding.max(0.0);
    let pad_x = bbox.width().abs() * padding;
    let pad_y = bbox.height().abs() * padding;
    let w = frame_w as f32;
    let h = frame_h as f32;

    PixelBox {
        x1: (bbox.x1 - pad_x).clamp(0.0, w),
        y1: (bbox.y1 - pad_y).clamp(0.0, h),
        x2: (bbox.x2 + pad_x).clamp(0.0, w),
        y2: (bbox.y2 + pad_y).clamp(0.0, h),
    }
}

/// Integer pixel region cut from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Snap a padded (already clamped) box onto the pixel grid
    pub fn from_padded(bbox: &PixelBox) -> Self {
        let x1 = bbox.x1.floor().max(0.0) as u32;
        let y1 = bbox.y1.floor().max(0.0) as u32;
        let x2 = bbox.x2.floor().max(0.0) as u32;
        let y2 = bbox.y2.floor().max(0.0) as u32;

        Self {
            x: x1,
            y: y1,
            width: x2.saturating_sub(x1),
            height: y2.saturating_sub(y1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
