use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HoldError, Result};
use crate::models::{FrameSize, Hold, HoldId};

pub const UNKNOWN_TYPE: &str = "Unknown";

/// Top-level key holding the hold entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKey {
    Holds,
    Objects,
}

impl CollectionKey {
    const PRIORITY: [CollectionKey; 2] = [CollectionKey::Holds, CollectionKey::Objects];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Holds => "holds",
            CollectionKey::Objects => "objects",
        }
    }
}

/// Entry key holding the [x1, y1, x2, y2] box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxField {
    Bbox,
    Box,
}

impl BoxField {
    const PRIORITY: [BoxField; 2] = [BoxField::Bbox, BoxField::Box];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoxField::Bbox => "bbox",
            BoxField::Box => "box",
        }
    }
}

/// Where an entry's hold type came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeField {
    Type,
    ClassName,
    Label,
    Defaulted,
}

impl TypeField {
    const PRIORITY: [TypeField; 3] = [TypeField::Type, TypeField::ClassName, TypeField::Label];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeField::Type => "type",
            TypeField::ClassName => "class_name",
            TypeField::Label => "label",
            TypeField::Defaulted => "<default>",
        }
    }
}

/// Which accepted shape one entry matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryShape {
    pub box_field: BoxField,
    pub type_field: TypeField,
    pub id_defaulted: bool,
}

/// Canonical hold list together with the frame it was measured against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHolds {
    pub image_size: FrameSize,
    pub holds: Vec<Hold>,
}

/// Normalization result plus the shapes that were matched on the way
#[derive(Debug, Clone)]
pub struct DecodedHolds {
    pub normalized: NormalizedHolds,
    pub collection: CollectionKey,
    pub entries: Vec<EntryShape>,
}

/// Read a hold JSON file from disk
pub fn load_hold_json(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Err(HoldError::NotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Normalize hold geometry against the frame size, failing on the first
/// malformed entry.
pub fn normalize_holds(data: &Value, size: FrameSize) -> Result<NormalizedHolds> {
    decode_holds(data, size).map(|decoded| decoded.normalized)
}

pub fn decode_holds(data: &Value, size: FrameSize) -> Result<DecodedHolds> {
    let root = data
        .as_object()
        .ok_or_else(|| HoldError::schema("<root>", "expected a JSON object"))?;

    let (collection, entries) = match_collection(root)?;
    debug!("decoding {} entries from \"{}\"", entries.len(), collection.as_str());

    let mut holds = Vec::with_capacity(entries.len());
    let mut shapes = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let (hold, shape) = decode_entry(index, entry, size)?;
        holds.push(hold);
        shapes.push(shape);
    }

    Ok(DecodedHolds {
        normalized: NormalizedHolds {
            image_size: size,
            holds,
        },
        collection,
        entries: shapes,
    })
}

fn match_collection(root: &Map<String, Value>) -> Result<(CollectionKey, &Vec<Value>)> {
    let present: Vec<CollectionKey> = CollectionKey::PRIORITY
        .into_iter()
        .filter(|k| root.contains_key(k.as_str()))
        .collect();

    let key = *present.first().ok_or_else(|| {
        HoldError::schema("<root>", r#"JSON must have top-level key "holds" or "objects""#)
    })?;

    if present.len() > 1 {
        warn!(
            "both \"holds\" and \"objects\" present; using \"{}\"",
            key.as_str()
        );
    }

    let entries = root[key.as_str()]
        .as_array()
        .ok_or_else(|| HoldError::schema(key.as_str(), "expected an array of holds"))?;

    Ok((key, entries))
}

fn decode_entry(index: usize, entry: &Value, size: FrameSize) -> Result<(Hold, EntryShape)> {
    let location = format!("hold index {}", index);
    let obj = entry
        .as_object()
        .ok_or_else(|| HoldError::schema(&location, "expected an object"))?;

    let (box_field, bbox) = match_box(obj, &location)?;
    let (type_field, hold_type) = match_type(obj, &location)?;
    let (id, id_defaulted) = match_id(obj, index, &location)?;

    let hold = Hold::from_box(id, hold_type, bbox, size);
    let shape = EntryShape {
        box_field,
        type_field,
        id_defaulted,
    };
    Ok((hold, shape))
}

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn match_box(obj: &Map<String, Value>, location: &str) -> Result<(BoxField, [f64; 4])> {
    let (field, value) = BoxField::PRIORITY
        .into_iter()
        .find_map(|f| present(obj, f.as_str()).map(|v| (f, v)))
        .ok_or_else(|| {
            HoldError::schema(
                location,
                "missing bbox/box: expected 'bbox':[x1,y1,x2,y2] or 'box':[x1,y1,x2,y2]",
            )
        })?;

    let bad_box = || {
        HoldError::schema(
            format!("{}.{}", location, field.as_str()),
            "expected 4 numbers [x1,y1,x2,y2]",
        )
    };

    let items = value.as_array().filter(|a| a.len() == 4).ok_or_else(bad_box)?;
    let mut bbox = [0.0f64; 4];
    for (slot, item) in bbox.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(bad_box)?;
    }

    Ok((field, bbox))
}

fn match_type(obj: &Map<String, Value>, location: &str) -> Result<(TypeField, String)> {
    for field in TypeField::PRIORITY {
        if let Some(value) = present(obj, field.as_str()) {
            let name = value.as_str().ok_or_else(|| {
                HoldError::schema(format!("{}.{}", location, field.as_str()), "expected a string")
            })?;
            return Ok((field, name.to_string()));
        }
    }
    Ok((TypeField::Defaulted, UNKNOWN_TYPE.to_string()))
}

fn match_id(obj: &Map<String, Value>, index: usize, location: &str) -> Result<(HoldId, bool)> {
    match present(obj, "id") {
        None => Ok((HoldId::Index(index as i64), true)),
        Some(Value::String(s)) => Ok((HoldId::Name(s.clone()), false)),
        Some(v) => v
            .as_i64()
            .map(|i| (HoldId::Index(i), false))
            .ok_or_else(|| HoldError::schema(format!("{}.id", location), "expected an integer or string")),
    }
}
