use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::HoldError;

/// Detector class order. Crop directories are named after these entries.
pub const DEFAULT_CLASS_NAMES: [&str; 6] = ["jug", "crimp", "pinch", "sloper", "pocket", "volume"];

/// Axis-aligned box in pixel coordinates: (x1, y1) top-left, (x2, y2) bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct PixelBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl PixelBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

impl From<[f32; 4]> for PixelBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<PixelBox> for [f32; 4] {
    fn from(b: PixelBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Positive frame dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub w: u32,
    pub h: u32,
}

impl FrameSize {
    pub fn new(w: u32, h: u32) -> Result<Self, HoldError> {
        if w == 0 || h == 0 {
            return Err(HoldError::InvalidFrame { w, h });
        }
        Ok(Self { w, h })
    }
}

/// A decoded wall photo and the identity used to name its crops
#[derive(Debug, Clone)]
pub struct Frame {
    /// Name used in crop file names: the file stem, prefixed with any
    /// subfolders below the collection root
    pub id: String,
    pub image: DynamicImage,
}

impl Frame {
    pub fn new(id: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            id: id.into(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> Result<FrameSize, HoldError> {
        FrameSize::new(self.width(), self.height())
    }
}

/// Raw detector output for a single hold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: PixelBox,
}

/// Ordered hold-type names indexed by detector class id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldVocabulary {
    names: Vec<String>,
}

impl HoldVocabulary {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self, class_id: u32) -> Option<&str> {
        self.names.get(class_id as usize).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for HoldVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_NAMES)
    }
}

/// Hold identifier as given in the input JSON, or its position when absent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HoldId {
    Index(i64),
    Name(String),
}

impl std::fmt::Display for HoldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldId::Index(i) => write!(f, "{}", i),
            HoldId::Name(s) => f.write_str(s),
        }
    }
}

/// A hold with frame-relative geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    pub id: HoldId,
    #[serde(rename = "type")]
    pub hold_type: String,
    /// Raw box exactly as read from the input
    pub bbox: [f64; 4],
    pub center_norm: [f64; 2],
    pub bbox_wh_norm: [f64; 2],
}

impl Hold {
    /// Derive normalized geometry from a raw box. Extents below one pixel are
    /// raised to one pixel so spacing heuristics never see a zero size.
    pub fn from_box(id: HoldId, hold_type: impl Into<String>, bbox: [f64; 4], size: FrameSize) -> Self {
        let [x1, y1, x2, y2] = bbox;
        let w = size.w as f64;
        let h = size.h as f64;
        let cx = (x1 + x2) / 2.0;
        let cy = (y1 + y2) / 2.0;
        let bw = (x2 - x1).max(1.0);
        let bh = (y2 - y1).max(1.0);

        Self {
            id,
            hold_type: hold_type.into(),
            bbox,
            center_norm: [cx / w, cy / h],
            bbox_wh_norm: [bw / w, bh / h],
        }
    }

    pub fn center_y(&self) -> f64 {
        self.center_norm[1]
    }
}

/// Hold reference as it appears inside a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHold {
    pub id: HoldId,
    #[serde(rename = "type")]
    pub hold_type: String,
    pub center_norm: [f64; 2],
    pub bbox_wh_norm: [f64; 2],
}

impl From<&Hold> for RouteHold {
    fn from(h: &Hold) -> Self {
        Self {
            id: h.id.clone(),
            hold_type: h.hold_type.clone(),
            center_norm: h.center_norm,
            bbox_wh_norm: h.bbox_wh_norm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Hard => "Hard",
        };
        f.write_str(s)
    }
}

/// Proposed climbing sequence over a set of holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "routeA")]
    pub route_a: Vec<RouteHold>,
    #[serde(rename = "routeB")]
    pub route_b: Vec<RouteHold>,
    pub difficulty: Difficulty,
    pub notes: String,
}
