// src/loader/json_loader.rs
//! JSON snapshots of the tile-map model.

use crate::error::LoadError;
use crate::ir_map::*;
use crate::loader::content::ContentLoader;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;

#[derive(Deserialize)]
struct JsonMap {
    #[serde(default)]
    orientation: JsonOrientation,
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    tilesets: Vec<JsonTileset>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum JsonOrientation {
    #[default]
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

impl From<JsonOrientation> for Orientation {
    fn from(o: JsonOrientation) -> Self {
        match o {
            JsonOrientation::Orthogonal => Orientation::Orthogonal,
            JsonOrientation::Isometric => Orientation::Isometric,
            JsonOrientation::Staggered => Orientation::Staggered,
            JsonOrientation::Hexagonal => Orientation::Hexagonal,
        }
    }
}

#[derive(Deserialize)]
struct JsonTileset {
    name: String,
    tilewidth: u32,
    tileheight: u32,
    tilecount: u32,
    columns: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum JsonLayer {
    #[serde(rename = "tilelayer")]
    Tiles {
        #[serde(default)]
        name: String,
        width: u32,
        height: u32,
        #[serde(default)]
        data: Vec<u32>,
    },
    #[serde(rename = "objectgroup")]
    Objects {
        #[serde(default)]
        name: String,
        #[serde(default = "one")]
        opacity: f32,
        #[serde(default = "default_true")]
        visible: bool,
        #[serde(default)]
        properties: Vec<JsonProperty>,
        #[serde(default)]
        objects: Vec<JsonObject>,
    },
}

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default)]
    value: JsonValue,
}

#[derive(Deserialize)]
struct JsonObject {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_true")]
    visible: bool,
    /// Explicit shape name; inferred from the other fields when absent.
    #[serde(default)]
    shape: Option<String>,
    #[serde(default)]
    tileset: Option<usize>,
    #[serde(default)]
    tile: u32,
    #[serde(default)]
    ellipse: bool,
    #[serde(default)]
    polygon: Option<Vec<JsonObjectPoint>>,
    #[serde(default)]
    polyline: Option<Vec<JsonObjectPoint>>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonObjectPoint {
    x: f32,
    y: f32,
}

fn json_value_to_ir(value: JsonValue) -> Option<PropertyValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(v) => Some(PropertyValue::Bool(v)),
        JsonValue::Number(n) => n
            .as_i64()
            .map(PropertyValue::I64)
            .or_else(|| n.as_f64().map(|v| PropertyValue::F32(v as f32))),
        JsonValue::String(s) => Some(PropertyValue::String(s)),
        // Arrays and objects keep their JSON text.
        other => Some(PropertyValue::String(other.to_string())),
    }
}

fn properties_from_json(props: Vec<JsonProperty>) -> Properties {
    props
        .into_iter()
        .map(|p| (p.name, json_value_to_ir(p.value)))
        .collect()
}

fn points(points: Option<Vec<JsonObjectPoint>>) -> Vec<Point> {
    points
        .unwrap_or_default()
        .into_iter()
        .map(|p| Point::new(p.x, p.y))
        .collect()
}

fn object_to_ir(obj: JsonObject) -> IrObject {
    let (width, height) = (obj.width, obj.height);
    let shape = match obj.shape.as_deref() {
        Some("tile") => IrObjectShape::Tile {
            tileset: obj.tileset.unwrap_or_default(),
            local_id: obj.tile,
        },
        Some("rectangle") => IrObjectShape::Rectangle { width, height },
        Some("ellipse") => IrObjectShape::Ellipse { width, height },
        Some("polygon") => IrObjectShape::Polygon(points(obj.polygon)),
        Some("polyline") => IrObjectShape::Polyline(points(obj.polyline)),
        Some(other) => IrObjectShape::Unknown(other.to_owned()),
        None => {
            if let Some(tileset) = obj.tileset {
                IrObjectShape::Tile {
                    tileset,
                    local_id: obj.tile,
                }
            } else if obj.ellipse {
                IrObjectShape::Ellipse { width, height }
            } else if obj.polygon.is_some() {
                IrObjectShape::Polygon(points(obj.polygon))
            } else if obj.polyline.is_some() {
                IrObjectShape::Polyline(points(obj.polyline))
            } else {
                IrObjectShape::Rectangle { width, height }
            }
        }
    };

    IrObject {
        id: obj.id,
        name: obj.name,
        class_name: obj.kind,
        position: Point::new(obj.x, obj.y),
        rotation: obj.rotation,
        visible: obj.visible,
        shape,
        properties: properties_from_json(obj.properties),
    }
}

/// Decodes a JSON tile-map snapshot. `asset` only labels errors.
pub fn decode_map_json(asset: &str, txt: &str) -> Result<IrMap, LoadError> {
    // Check the document kind before the full parse so other JSON assets are
    // skipped rather than reported as malformed maps.
    let doc: JsonValue = serde_json::from_str(txt).map_err(|e| LoadError::decode(asset, e))?;
    match doc.get("type").and_then(JsonValue::as_str) {
        Some("map") => {}
        other => {
            return Err(LoadError::WrongType {
                asset: asset.to_owned(),
                found: other.unwrap_or("untyped JSON").to_owned(),
            })
        }
    }
    let j: JsonMap = serde_json::from_value(doc).map_err(|e| LoadError::decode(asset, e))?;

    let tilesets = j
        .tilesets
        .into_iter()
        .map(|ts| IrTileset {
            name: ts.name,
            tile_w: ts.tilewidth,
            tile_h: ts.tileheight,
            tilecount: ts.tilecount,
            columns: ts.columns,
            image: IrTilesetImage {
                source: ts.image,
                width: ts.imagewidth,
                height: ts.imageheight,
            },
        })
        .collect();

    let mut tile_layers = Vec::new();
    let mut object_layers = Vec::new();
    for l in j.layers {
        match l {
            JsonLayer::Tiles {
                name,
                width,
                height,
                data,
            } => {
                if data.len() != width as usize * height as usize {
                    return Err(LoadError::decode(
                        asset,
                        format!(
                            "layer '{}' has {} cells, expected {}x{}",
                            name,
                            data.len(),
                            width,
                            height
                        ),
                    ));
                }
                tile_layers.push(IrTileLayer {
                    name,
                    width,
                    height,
                    data,
                });
            }
            JsonLayer::Objects {
                name,
                opacity,
                visible,
                properties,
                objects,
            } => object_layers.push(IrObjectLayer {
                name,
                opacity,
                visible,
                properties: properties_from_json(properties),
                objects: objects.into_iter().map(object_to_ir).collect(),
            }),
        }
    }

    Ok(IrMap {
        orientation: j.orientation.into(),
        width: j.width,
        height: j.height,
        tile_w: j.tilewidth,
        tile_h: j.tileheight,
        tilesets,
        tile_layers,
        object_layers,
    })
}

/// Content loader for JSON tile-map snapshots (`<asset>.json`).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

impl ContentLoader for JsonLoader {
    fn extension(&self) -> &str {
        "json"
    }

    fn load_tile_map(&self, asset: &str, root: &Path) -> Result<IrMap, LoadError> {
        let path = root.join(format!("{asset}.json"));
        let txt = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        decode_map_json(asset, &txt)
    }
}
