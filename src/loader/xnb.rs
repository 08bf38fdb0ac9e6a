// src/loader/xnb.rs
//! Standalone reader for uncompressed XNB containers holding a
//! MonoGame.Extended `TiledMap`.

use crate::error::LoadError;
use crate::gid::{self, GidTable};
use crate::ir_map::*;
use crate::loader::content::ContentLoader;
use byteorder::{ReadBytesExt, LE};
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// File signature.
pub const MAGIC: &[u8; 3] = b"XNB";
/// HiDef graphics profile.
pub const FLAG_HIDEF: u8 = 0x01;
/// LZ4-compressed payload.
pub const FLAG_LZ4: u8 = 0x40;
/// LZX-compressed payload.
pub const FLAG_LZX: u8 = 0x80;

/// Reader of `TiledMap` assets.
pub const MAP_READER: &str = "TiledMapReader";
/// Reader of standalone `TiledMapTileset` assets.
pub const TILESET_READER: &str = "TiledMapTilesetReader";
/// Reader of `Texture2D` assets.
pub const TEXTURE_READER: &str = "Texture2DReader";

/// Largest tile layer accepted, in cells (64 MiB of GIDs).
pub const MAX_LAYER_CELLS: u64 = 1 << 24;
/// Deepest group-layer nesting accepted.
pub const MAX_GROUP_DEPTH: usize = 64;

const LAYER_IMAGE: u8 = 0;
const LAYER_TILE: u8 = 1;
const LAYER_OBJECT: u8 = 2;
const LAYER_GROUP: u8 = 3;

const OBJECT_RECTANGLE: u8 = 0;
const OBJECT_TILE: u8 = 1;
const OBJECT_ELLIPSE: u8 = 2;
const OBJECT_POLYGON: u8 = 3;
const OBJECT_POLYLINE: u8 = 4;

/// Why an XNB asset could not be decoded.
#[derive(Debug)]
pub enum XnbError {
    /// Signature is not `XNB`
    BadMagic,
    /// Format version other than 4 or 5
    UnsupportedVersion(u8),
    /// LZX / LZ4 payloads are not decompressed
    Compressed(u8),
    /// Data ended early
    Truncated,
    /// 7-bit integer longer than five bytes
    Bad7BitInt,
    /// String is not UTF-8
    BadString,
    /// Primary object is null
    NullPrimaryObject,
    /// Type id past the reader table
    BadReaderIndex(u32),
    /// Primary object read by another reader
    UnexpectedReader {
        /// Reader the caller needs
        expected: &'static str,
        /// Reader the asset names
        found: String,
    },
    /// Field out of range
    InvalidValue {
        /// Field name
        what: &'static str,
        /// Value read
        value: i64,
    },
    /// Orientation byte outside 1..=4
    UnknownOrientation(u8),
    /// Layer type byte outside 0..=3
    UnknownLayerType(u8),
    /// Stored GID outside every tileset
    UnknownGid(u32),
    /// A referenced asset could not be read
    Io {
        /// Referenced file
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

impl fmt::Display for XnbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XnbError::BadMagic => write!(f, "Missing XNB magic"),
            XnbError::UnsupportedVersion(v) => write!(f, "Unsupported XNB format version {}", v),
            XnbError::Compressed(flags) => write!(
                f,
                "Compressed XNB content is not supported (flags 0x{:02x})",
                flags
            ),
            XnbError::Truncated => write!(f, "Unexpected end of XNB data"),
            XnbError::Bad7BitInt => write!(f, "Malformed 7-bit encoded integer"),
            XnbError::BadString => write!(f, "String is not valid UTF-8"),
            XnbError::NullPrimaryObject => write!(f, "Primary asset is null"),
            XnbError::BadReaderIndex(i) => write!(f, "Type reader index {} out of range", i),
            XnbError::UnexpectedReader { expected, found } => {
                write!(f, "Expected {} but asset uses {}", expected, found)
            }
            XnbError::InvalidValue { what, value } => write!(f, "Invalid {}: {}", what, value),
            XnbError::UnknownOrientation(b) => write!(f, "Unknown map orientation {}", b),
            XnbError::UnknownLayerType(b) => write!(f, "Unknown layer type {}", b),
            XnbError::UnknownGid(gid) => write!(f, "GID {} is not covered by any tileset", gid),
            XnbError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for XnbError {}

impl From<io::Error> for XnbError {
    fn from(_: io::Error) -> Self {
        // Payloads are read from in-memory cursors, which only fail at the end.
        XnbError::Truncated
    }
}

/// Entry of the header's type-reader table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReader {
    /// Assembly-qualified reader class name
    pub name: String,
    /// Reader version
    pub version: i32,
}

impl TypeReader {
    /// Reader class name without namespace, generic arity or assembly.
    pub fn short_name(&self) -> &str {
        let full = self.name.split(',').next().unwrap_or_default().trim();
        let full = full.split('`').next().unwrap_or(full);
        full.rsplit('.').next().unwrap_or(full)
    }
}

/// Container header and type-reader table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XnbHeader {
    /// Target platform, e.g. `w` for Windows
    pub platform: char,
    /// Format version
    pub version: u8,
    /// `FLAG_*` bits
    pub flags: u8,
    /// Declared total size in bytes
    pub file_size: u32,
    /// Type readers, indexed by type id - 1
    pub readers: Vec<TypeReader>,
    /// Shared resource count
    pub shared_resources: u32,
    /// Index into `readers` of the primary object's reader.
    pub primary: usize,
}

impl XnbHeader {
    /// Reader of the primary object.
    pub fn primary_reader(&self) -> &TypeReader {
        &self.readers[self.primary]
    }
}

/// Reads a .NET 7-bit encoded unsigned integer.
pub fn read_7bit_int<R: Read>(r: &mut R) -> Result<u32, XnbError> {
    let mut result = 0u32;
    let mut shift = 0;
    loop {
        let byte = r.read_u8()?;
        result |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 28 {
            return Err(XnbError::Bad7BitInt);
        }
    }
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string<R: Read>(r: &mut R) -> Result<String, XnbError> {
    let len = u64::from(read_7bit_int(r)?);
    // Grow with the data actually present; the prefix is not trusted.
    let mut buf = Vec::new();
    r.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(XnbError::Truncated);
    }
    String::from_utf8(buf).map_err(|_| XnbError::BadString)
}

/// Zeroed cell grid for a `width` x `height` tile layer.
fn layer_cells(width: u32, height: u32) -> Result<Vec<u32>, XnbError> {
    let cells = u64::from(width) * u64::from(height);
    let too_big = || XnbError::InvalidValue {
        what: "layer cell count",
        value: i64::try_from(cells).unwrap_or(i64::MAX),
    };
    if cells > MAX_LAYER_CELLS {
        return Err(too_big());
    }
    let cells = usize::try_from(cells).map_err(|_| too_big())?;
    let mut data = Vec::new();
    data.try_reserve_exact(cells).map_err(|_| too_big())?;
    data.resize(cells, 0);
    Ok(data)
}

/// Reads the container header up to (and including) the primary object's
/// type id, leaving `r` at the start of the primary object's payload.
pub fn read_header<R: Read>(r: &mut R) -> Result<XnbHeader, XnbError> {
    let mut magic = [0u8; 3];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(XnbError::BadMagic);
    }
    let platform = char::from(r.read_u8()?);
    let version = r.read_u8()?;
    if !(4..=5).contains(&version) {
        return Err(XnbError::UnsupportedVersion(version));
    }
    let flags = r.read_u8()?;
    if flags & (FLAG_LZX | FLAG_LZ4) != 0 {
        return Err(XnbError::Compressed(flags));
    }
    let file_size = r.read_u32::<LE>()?;

    let reader_count = read_7bit_int(r)?;
    let mut readers = Vec::with_capacity(reader_count.min(64) as usize);
    for _ in 0..reader_count {
        let name = read_string(r)?;
        let version = r.read_i32::<LE>()?;
        readers.push(TypeReader { name, version });
    }
    let shared_resources = read_7bit_int(r)?;

    let type_id = read_7bit_int(r)?;
    if type_id == 0 {
        return Err(XnbError::NullPrimaryObject);
    }
    let primary = (type_id - 1) as usize;
    if primary >= readers.len() {
        return Err(XnbError::BadReaderIndex(type_id));
    }

    Ok(XnbHeader {
        platform,
        version,
        flags,
        file_size,
        readers,
        shared_resources,
        primary,
    })
}

fn read_asset_file(path: &Path) -> Result<Vec<u8>, XnbError> {
    fs::read(path).map_err(|source| XnbError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Path of the `.xnb` an external reference points at. References are
/// relative to the referencing asset's directory and carry no extension.
fn reference_path(dir: &Path, reference: &str) -> PathBuf {
    let reference = reference.replace('\\', "/");
    dir.join(format!("{reference}.xnb"))
}

/// First GIDs as stored in the container, which need not be contiguous.
#[derive(Debug, Default)]
struct StoredGids {
    ranges: Vec<(u32, u32)>, // (first gid, tile count)
}

impl StoredGids {
    fn locate(&self, raw: u32) -> Option<(usize, u32)> {
        let gid = gid::clean(raw);
        self.ranges
            .iter()
            .position(|&(first, count)| gid >= first && gid - first < count)
            .map(|ts| (ts, gid - self.ranges[ts].0))
    }
}

/// Cursor over one asset's payload.
struct ContentReader<'a> {
    r: Cursor<&'a [u8]>,
    dir: PathBuf,
}

impl<'a> ContentReader<'a> {
    fn read_string(&mut self) -> Result<String, XnbError> {
        read_string(&mut self.r)
    }

    fn read_bool(&mut self) -> Result<bool, XnbError> {
        Ok(self.r.read_u8()? != 0)
    }

    fn read_f32(&mut self) -> Result<f32, XnbError> {
        Ok(self.r.read_f32::<LE>()?)
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, XnbError> {
        let v = self.r.read_i32::<LE>()?;
        u32::try_from(v).map_err(|_| XnbError::InvalidValue {
            what,
            value: i64::from(v),
        })
    }

    fn read_point(&mut self) -> Result<Point, XnbError> {
        Ok(Point::new(self.read_f32()?, self.read_f32()?))
    }

    fn read_external_reference(&mut self) -> Result<Option<String>, XnbError> {
        let reference = self.read_string()?;
        Ok((!reference.is_empty()).then_some(reference))
    }

    fn read_properties(&mut self) -> Result<Properties, XnbError> {
        let count = self.read_u32("property count")?;
        let mut props = Properties::new();
        for _ in 0..count {
            let name = self.read_string()?;
            let value = self.read_string()?;
            props.insert(name, Some(PropertyValue::String(value)));
        }
        Ok(props)
    }

    fn read_map(&mut self) -> Result<IrMap, XnbError> {
        let _class = self.read_string()?;
        let width = self.read_u32("map width")?;
        let height = self.read_u32("map height")?;
        let tile_w = self.read_u32("tile width")?;
        let tile_h = self.read_u32("tile height")?;
        let _background = self.r.read_u32::<LE>()?;
        let _render_order = self.r.read_u8()?;
        let orientation = match self.r.read_u8()? {
            1 => Orientation::Orthogonal,
            2 => Orientation::Isometric,
            3 => Orientation::Staggered,
            4 => Orientation::Hexagonal,
            other => return Err(XnbError::UnknownOrientation(other)),
        };
        // Map-level properties have no place in the recovered document.
        let _properties = self.read_properties()?;

        let tileset_count = self.read_u32("tileset count")?;
        let mut tilesets = Vec::new();
        let mut stored = StoredGids::default();
        for _ in 0..tileset_count {
            let first_gid = self.read_u32("first GID")?;
            let tileset = if self.read_bool()? {
                let reference = self.read_external_reference()?.unwrap_or_default();
                load_external_tileset(&self.dir, &reference)?
            } else {
                self.read_tileset()?
            };
            stored.ranges.push((first_gid, tileset.tilecount));
            tilesets.push(tileset);
        }

        let mut map = IrMap {
            orientation,
            width,
            height,
            tile_w,
            tile_h,
            tilesets,
            tile_layers: Vec::new(),
            object_layers: Vec::new(),
        };
        let gids = GidTable::from_tilesets(&map.tilesets);

        let layer_count = self.read_u32("layer count")?;
        for _ in 0..layer_count {
            self.read_layer(&mut map, &stored, &gids, 0)?;
        }
        Ok(map)
    }

    fn read_tileset(&mut self) -> Result<IrTileset, XnbError> {
        let texture = self.read_external_reference()?;
        let _class = self.read_string()?;
        let tile_w = self.read_u32("tileset tile width")?;
        let tile_h = self.read_u32("tileset tile height")?;
        let tilecount = self.read_u32("tile count")?;
        let _spacing = self.read_u32("spacing")?;
        let _margin = self.read_u32("margin")?;
        let columns = self.read_u32("columns")?;

        let explicit_tiles = self.read_u32("tileset tile count")?;
        for _ in 0..explicit_tiles {
            let _local_id = self.r.read_i32::<LE>()?;
            let _class = self.read_string()?;
            let frame_count = self.read_u32("animation frame count")?;
            let object_count = self.read_u32("tile object count")?;
            for _ in 0..object_count {
                self.read_object(None)?;
            }
            for _ in 0..frame_count {
                let _frame_tile = self.r.read_i32::<LE>()?;
                let _duration_ms = self.r.read_i32::<LE>()?;
            }
            let _tile_properties = self.read_properties()?;
        }
        let _properties = self.read_properties()?;

        let (name, image) = match &texture {
            Some(reference) => {
                let (width, height) = texture_size(&self.dir, reference);
                let name = reference
                    .rsplit(['/', '\\'])
                    .next()
                    .unwrap_or(reference)
                    .to_owned();
                (
                    name,
                    IrTilesetImage {
                        source: None,
                        width,
                        height,
                    },
                )
            }
            None => (String::new(), IrTilesetImage::default()),
        };

        Ok(IrTileset {
            name,
            tile_w,
            tile_h,
            tilecount,
            columns,
            image,
        })
    }

    fn read_layer(
        &mut self,
        map: &mut IrMap,
        stored: &StoredGids,
        gids: &GidTable,
        depth: usize,
    ) -> Result<(), XnbError> {
        let kind = self.r.read_u8()?;
        let name = self.read_string()?;
        let _class = self.read_string()?;
        let visible = self.read_bool()?;
        let opacity = self.read_f32()?;
        let _offset = self.read_point()?;
        let _parallax = self.read_point()?;
        let properties = self.read_properties()?;

        match kind {
            LAYER_TILE => {
                let width = self.read_u32("layer width")?;
                let height = self.read_u32("layer height")?;
                let tile_count = self.read_u32("layer tile count")?;
                let mut data = layer_cells(width, height)?;
                for _ in 0..tile_count {
                    let raw = self.r.read_u32::<LE>()?;
                    let x = u32::from(self.r.read_u16::<LE>()?);
                    let y = u32::from(self.r.read_u16::<LE>()?);
                    if gid::clean(raw) == 0 {
                        continue;
                    }
                    if x >= width || y >= height {
                        return Err(XnbError::InvalidValue {
                            what: "tile position",
                            value: i64::from(y) * i64::from(width) + i64::from(x),
                        });
                    }
                    let cell = &mut data[y as usize * width as usize + x as usize];
                    let (ts, local) = stored.locate(raw).ok_or(XnbError::UnknownGid(raw))?;
                    *cell = gids.gid(ts, local).ok_or(XnbError::UnknownGid(raw))?;
                }
                map.tile_layers.push(IrTileLayer {
                    name,
                    width,
                    height,
                    data,
                });
            }
            LAYER_OBJECT => {
                let _color = self.r.read_u32::<LE>()?;
                let _draw_order = self.r.read_u8()?;
                let object_count = self.read_u32("object count")?;
                let mut objects = Vec::new();
                for _ in 0..object_count {
                    objects.push(self.read_object(Some(stored))?);
                }
                map.object_layers.push(IrObjectLayer {
                    name,
                    opacity,
                    visible,
                    properties,
                    objects,
                });
            }
            LAYER_GROUP => {
                if depth >= MAX_GROUP_DEPTH {
                    return Err(XnbError::InvalidValue {
                        what: "group nesting",
                        value: depth as i64 + 1,
                    });
                }
                let child_count = self.read_u32("group layer count")?;
                log::debug!("Flattening group layer '{}' ({} children)", name, child_count);
                for _ in 0..child_count {
                    self.read_layer(map, stored, gids, depth + 1)?;
                }
            }
            LAYER_IMAGE => {
                let _texture = self.read_external_reference()?;
                let _position = self.read_point()?;
                log::warn!("Skipping image layer '{}': not representable", name);
            }
            other => return Err(XnbError::UnknownLayerType(other)),
        }
        Ok(())
    }

    /// `stored` is `None` for objects inside tileset tiles, where tile
    /// objects cannot be resolved.
    fn read_object(&mut self, stored: Option<&StoredGids>) -> Result<IrObject, XnbError> {
        let kind = self.r.read_u8()?;
        let id = self.read_u32("object id")?;
        let name = self.read_string()?;
        let class_name = self.read_string()?;
        let position = self.read_point()?;
        let width = self.read_f32()?;
        let height = self.read_f32()?;
        let rotation = self.read_f32()?;
        let visible = self.read_bool()?;
        let properties = self.read_properties()?;

        let shape = match kind {
            OBJECT_RECTANGLE => IrObjectShape::Rectangle { width, height },
            OBJECT_ELLIPSE => IrObjectShape::Ellipse { width, height },
            OBJECT_TILE => {
                let raw = self.r.read_u32::<LE>()?;
                match stored {
                    Some(stored) => {
                        let (tileset, local_id) =
                            stored.locate(raw).ok_or(XnbError::UnknownGid(raw))?;
                        IrObjectShape::Tile { tileset, local_id }
                    }
                    None => IrObjectShape::Unknown("TiledMapTileObject".into()),
                }
            }
            OBJECT_POLYGON | OBJECT_POLYLINE => {
                let count = self.read_u32("point count")?;
                let mut points = Vec::new();
                for _ in 0..count {
                    points.push(self.read_point()?);
                }
                if kind == OBJECT_POLYGON {
                    IrObjectShape::Polygon(points)
                } else {
                    IrObjectShape::Polyline(points)
                }
            }
            other => IrObjectShape::Unknown(format!("TiledMapObject(type {other})")),
        };

        Ok(IrObject {
            id,
            name,
            class_name,
            position,
            rotation,
            visible,
            shape,
            properties,
        })
    }
}

fn load_external_tileset(dir: &Path, reference: &str) -> Result<IrTileset, XnbError> {
    let path = reference_path(dir, reference);
    let data = read_asset_file(&path)?;
    let mut r = Cursor::new(data.as_slice());
    let header = read_header(&mut r)?;
    let found = header.primary_reader().short_name();
    if found != TILESET_READER {
        return Err(XnbError::UnexpectedReader {
            expected: TILESET_READER,
            found: found.to_owned(),
        });
    }
    let mut cr = ContentReader {
        r,
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    cr.read_tileset()
}

/// Pixel size of a referenced texture. Textures are only needed for their
/// dimensions, so a missing or unreadable one degrades to 0x0.
fn texture_size(dir: &Path, reference: &str) -> (u32, u32) {
    let path = reference_path(dir, reference);
    match read_texture_size(&path) {
        Ok(size) => size,
        Err(err) => {
            log::warn!("Texture size unavailable for {}: {}", path.display(), err);
            (0, 0)
        }
    }
}

fn read_texture_size(path: &Path) -> Result<(u32, u32), XnbError> {
    let data = read_asset_file(path)?;
    let mut r = Cursor::new(data.as_slice());
    let header = read_header(&mut r)?;
    let found = header.primary_reader().short_name();
    if found != TEXTURE_READER {
        return Err(XnbError::UnexpectedReader {
            expected: TEXTURE_READER,
            found: found.to_owned(),
        });
    }
    let _surface_format = r.read_i32::<LE>()?;
    let width = r.read_u32::<LE>()?;
    let height = r.read_u32::<LE>()?;
    Ok((width, height))
}

/// Decodes `data`, the bytes of the map asset stored in `dir`.
pub fn decode_map(data: &[u8], dir: &Path) -> Result<IrMap, XnbError> {
    let mut r = Cursor::new(data);
    let header = read_header(&mut r)?;
    let found = header.primary_reader().short_name();
    if found != MAP_READER {
        return Err(XnbError::UnexpectedReader {
            expected: MAP_READER,
            found: found.to_owned(),
        });
    }
    let mut cr = ContentReader {
        r,
        dir: dir.to_path_buf(),
    };
    cr.read_map()
}

/// Content loader for MonoGame `.xnb` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct XnbLoader;

impl ContentLoader for XnbLoader {
    fn extension(&self) -> &str {
        "xnb"
    }

    fn load_tile_map(&self, asset: &str, root: &Path) -> Result<IrMap, LoadError> {
        let path = root.join(format!("{asset}.xnb"));
        let data = fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        match decode_map(&data, root) {
            Ok(map) => Ok(map),
            Err(XnbError::UnexpectedReader {
                expected: MAP_READER,
                found,
            }) => Err(LoadError::WrongType {
                asset: asset.to_owned(),
                found,
            }),
            Err(XnbError::Io { path, source }) => Err(LoadError::Io { path, source }),
            Err(err) => Err(LoadError::decode(asset, err)),
        }
    }
}
