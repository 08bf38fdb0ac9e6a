// src/ir_map.rs
use std::fmt;

/// Canonical, format-agnostic tile map handed over by a content loader.
#[derive(Debug, Clone, PartialEq)]
pub struct IrMap {
    /// Grid projection
    pub orientation: Orientation,
    /// Width in tiles
    pub width: u32,
    /// Height in tiles
    pub height: u32,
    /// Tile width in pixels
    pub tile_w: u32,
    /// Tile height in pixels
    pub tile_h: u32,
    /// Tilesets; their order fixes the GID ranges.
    pub tilesets: Vec<IrTileset>,
    /// Tile layers, bottom to top
    pub tile_layers: Vec<IrTileLayer>,
    /// Object layers, bottom to top
    pub object_layers: Vec<IrObjectLayer>,
}

/// Map projection, written lower-case in TMX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Square grid
    Orthogonal,
    /// Diamond grid
    Isometric,
    /// Isometric, alternate rows shifted
    Staggered,
    /// Hexagonal cells
    Hexagonal,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Orientation::Orthogonal => "orthogonal",
            Orientation::Isometric => "isometric",
            Orientation::Staggered => "staggered",
            Orientation::Hexagonal => "hexagonal",
        };
        f.write_str(s)
    }
}

/// One image atlas with a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct IrTileset {
    /// Display name, also the fallback image file stem
    pub name: String,
    /// Tile width in pixels
    pub tile_w: u32,
    /// Tile height in pixels
    pub tile_h: u32,
    /// Number of tiles; sizes this tileset's GID range
    pub tilecount: u32,
    /// Tiles per atlas row
    pub columns: u32,
    /// Backing atlas
    pub image: IrTilesetImage,
}

/// Atlas image of a tileset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrTilesetImage {
    /// Path of the backing image as recorded by the source, if it recorded one.
    pub source: Option<String>,
    /// Pixel width, 0 if unknown
    pub width: u32,
    /// Pixel height, 0 if unknown
    pub height: u32,
}

/// Grid of GIDs.
#[derive(Debug, Clone, PartialEq)]
pub struct IrTileLayer {
    /// Layer name
    pub name: String,
    /// Width in cells
    pub width: u32,
    /// Height in cells
    pub height: u32,
    /// Row-major GIDs, 0 = empty
    pub data: Vec<u32>,
}

/// Free-form objects sharing one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct IrObjectLayer {
    /// Layer name
    pub name: String,
    /// 0.0 to 1.0
    pub opacity: f32,
    /// Hidden layers still keep their objects
    pub visible: bool,
    /// Layer-level custom properties
    pub properties: Properties,
    /// In source order
    pub objects: Vec<IrObject>,
}

/// Pixel position; polygon points are relative to their object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Pixels right
    pub x: f32,
    /// Pixels down
    pub y: f32,
}

impl Point {
    /// Point at (`x`, `y`).
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One entity of an object layer.
#[derive(Debug, Clone, PartialEq)]
pub struct IrObject {
    /// Map-unique id
    pub id: u32,
    /// Empty when unnamed
    pub name: String,
    /// User type, written as `type`; empty when unset
    pub class_name: String,
    /// Top-left (bottom-left for tile objects) in pixels
    pub position: Point,
    /// Clockwise degrees
    pub rotation: f32,
    /// Hidden objects are still written
    pub visible: bool,
    /// Geometry kind
    pub shape: IrObjectShape,
    /// Object-level custom properties
    pub properties: Properties,
}

/// What an object looks like. Tiled keeps size attributes on the object, so
/// rectangle and ellipse carry them here.
#[derive(Debug, Clone, PartialEq)]
pub enum IrObjectShape {
    /// Tile stamp.
    Tile {
        /// Index into `IrMap::tilesets`
        tileset: usize,
        /// Tile index within that tileset
        local_id: u32,
    },
    /// Axis-aligned box (before rotation)
    Rectangle {
        /// Pixels
        width: f32,
        /// Pixels
        height: f32,
    },
    /// Ellipse inscribed in its bounding box
    Ellipse {
        /// Pixels
        width: f32,
        /// Pixels
        height: f32,
    },
    /// Closed outline
    Polygon(Vec<Point>),
    /// Open outline
    Polyline(Vec<Point>),
    /// A variant the loader could not classify, carried by name.
    Unknown(String),
}

/// Typed custom property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `true` / `false`
    Bool(bool),
    /// Integer
    I64(i64),
    /// Float
    F32(f32),
    /// Text, also used for anything else
    String(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::I64(v) => write!(f, "{v}"),
            PropertyValue::F32(v) => write!(f, "{v}"),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

/// Custom properties in insertion order. A `None` value is an entry the
/// source declared without a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties {
    entries: Vec<(String, Option<PropertyValue>)>,
}

impl Properties {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, replacing the value in place if `name` already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<PropertyValue>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Value of `name`, `None` if absent or declared without a value.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&PropertyValue>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Option<PropertyValue>)> for Properties {
    fn from_iter<I: IntoIterator<Item = (N, Option<PropertyValue>)>>(iter: I) -> Self {
        let mut out = Properties::new();
        for (name, value) in iter {
            out.insert(name, value);
        }
        out
    }
}
