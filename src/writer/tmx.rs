// src/writer/tmx.rs
use crate::error::EmitError;
use crate::gid::GidTable;
use crate::ir_map::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use xml::common::XmlVersion;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

const RENDER_ORDER: &str = "right-down";

/// Non-fatal findings collected while writing one map.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmitReport {
    /// Report lines, without the `[WARN]` tag
    pub warnings: Vec<String>,
}

/// Writes `map` as a TMX document to `path`, creating or truncating it.
///
/// The file handle is closed before this returns, on success and on error.
/// A failure part-way through leaves a partially written file behind.
pub fn write_tmx_file(map: &IrMap, path: &Path) -> Result<EmitReport, EmitError> {
    let io_err = |source| EmitError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    let report = write_tmx(map, &mut out)?;
    out.flush().map_err(io_err)?;
    Ok(report)
}

/// Streams `map` as an indented UTF-8 TMX document into `out`.
pub fn write_tmx<W: Write>(map: &IrMap, out: W) -> Result<EmitReport, EmitError> {
    let writer = EmitterConfig::new()
        .perform_indent(true)
        .create_writer(out);
    let mut tmx = TmxWriter {
        w: writer,
        gids: GidTable::from_tilesets(&map.tilesets),
        report: EmitReport::default(),
    };
    tmx.write_map(map)?;
    Ok(tmx.report)
}

/// Locale-invariant float text: `.` separator, no trailing `.0`.
pub fn format_f32(v: f32) -> String {
    if v == 0.0 {
        // also folds -0.0
        return "0".to_owned();
    }
    v.to_string()
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Image file name for a tileset: base name of the recorded source path, or
/// `<name>.png` when the source did not record one.
pub fn image_source(tileset: &IrTileset) -> String {
    tileset
        .image
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            // Sources may come from Windows builds.
            s.rsplit(['/', '\\']).next().unwrap_or(s).to_owned()
        })
        .unwrap_or_else(|| format!("{}.png", tileset.name))
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", format_f32(p.x), format_f32(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

struct TmxWriter<W: Write> {
    w: EventWriter<W>,
    gids: GidTable,
    report: EmitReport,
}

impl<W: Write> TmxWriter<W> {
    fn end(&mut self) -> Result<(), EmitError> {
        self.w.write(XmlEvent::end_element())?;
        Ok(())
    }

    fn write_map(&mut self, map: &IrMap) -> Result<(), EmitError> {
        self.w.write(XmlEvent::StartDocument {
            version: XmlVersion::Version10,
            encoding: Some("UTF-8"),
            standalone: None,
        })?;

        let orientation = map.orientation.to_string();
        let width = map.width.to_string();
        let height = map.height.to_string();
        let tile_w = map.tile_w.to_string();
        let tile_h = map.tile_h.to_string();
        self.w.write(
            XmlEvent::start_element("map")
                .attr("orientation", &orientation)
                .attr("renderorder", RENDER_ORDER)
                .attr("width", &width)
                .attr("height", &height)
                .attr("tilewidth", &tile_w)
                .attr("tileheight", &tile_h)
                .attr("infinite", "0"),
        )?;

        for (i, ts) in map.tilesets.iter().enumerate() {
            self.write_tileset(i, ts)?;
        }
        for layer in &map.tile_layers {
            self.write_tile_layer(layer)?;
        }
        for layer in &map.object_layers {
            self.write_object_layer(layer)?;
        }

        self.end() // map
    }

    fn write_tileset(&mut self, index: usize, ts: &IrTileset) -> Result<(), EmitError> {
        let first_gid = self.gids.first_gid(index).unwrap_or(1).to_string();
        let tile_w = ts.tile_w.to_string();
        let tile_h = ts.tile_h.to_string();
        let tilecount = ts.tilecount.to_string();
        let columns = ts.columns.to_string();
        self.w.write(
            XmlEvent::start_element("tileset")
                .attr("firstgid", &first_gid)
                .attr("name", &ts.name)
                .attr("tilewidth", &tile_w)
                .attr("tileheight", &tile_h)
                .attr("tilecount", &tilecount)
                .attr("columns", &columns),
        )?;

        let source = image_source(ts);
        let img_w = ts.image.width.to_string();
        let img_h = ts.image.height.to_string();
        self.w.write(
            XmlEvent::start_element("image")
                .attr("source", &source)
                .attr("width", &img_w)
                .attr("height", &img_h),
        )?;
        self.end()?; // image

        self.end() // tileset
    }

    fn write_tile_layer(&mut self, layer: &IrTileLayer) -> Result<(), EmitError> {
        for (index, &gid) in layer.data.iter().enumerate() {
            if gid != 0 && !self.gids.contains(gid) {
                return Err(EmitError::UnresolvedTile {
                    layer: layer.name.clone(),
                    index,
                    gid,
                });
            }
        }

        let width = layer.width.to_string();
        let height = layer.height.to_string();
        self.w.write(
            XmlEvent::start_element("layer")
                .attr("name", &layer.name)
                .attr("width", &width)
                .attr("height", &height),
        )?;

        self.w
            .write(XmlEvent::start_element("data").attr("encoding", "csv"))?;
        let csv = layer
            .data
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.w.write(XmlEvent::characters(&csv))?;
        self.end()?; // data

        self.end() // layer
    }

    fn write_object_layer(&mut self, layer: &IrObjectLayer) -> Result<(), EmitError> {
        let opacity = format_f32(layer.opacity);
        self.w.write(
            XmlEvent::start_element("objectgroup")
                .attr("name", &layer.name)
                .attr("opacity", &opacity)
                .attr("visible", flag(layer.visible)),
        )?;

        self.write_properties(&layer.properties)?;
        for obj in &layer.objects {
            self.write_object(obj)?;
        }

        self.end() // objectgroup
    }

    fn write_object(&mut self, obj: &IrObject) -> Result<(), EmitError> {
        let id = obj.id.to_string();
        let x = format_f32(obj.position.x);
        let y = format_f32(obj.position.y);
        let rotation = format_f32(obj.rotation);

        // Shape attributes go on the <object> element itself, so resolve them
        // before the start tag is written.
        let mut shape_attrs: Vec<(&str, String)> = Vec::new();
        match &obj.shape {
            IrObjectShape::Tile { tileset, local_id } => {
                let gid = self.gids.gid(*tileset, *local_id).ok_or(
                    EmitError::UnknownTileset {
                        object_id: obj.id,
                        tileset: *tileset,
                    },
                )?;
                shape_attrs.push(("gid", gid.to_string()));
            }
            IrObjectShape::Rectangle { width, height }
            | IrObjectShape::Ellipse { width, height } => {
                shape_attrs.push(("width", format_f32(*width)));
                shape_attrs.push(("height", format_f32(*height)));
            }
            IrObjectShape::Polygon(_) | IrObjectShape::Polyline(_) => {}
            IrObjectShape::Unknown(kind) => {
                log::debug!("Unknown object type {} on object {}", kind, obj.id);
                self.report
                    .warnings
                    .push(format!("Unknown object type: {}", kind));
            }
        }

        let mut start = XmlEvent::start_element("object").attr("id", &id);
        if !obj.name.is_empty() {
            start = start.attr("name", &obj.name);
        }
        if !obj.class_name.is_empty() {
            start = start.attr("type", &obj.class_name);
        }
        start = start.attr("x", &x).attr("y", &y);
        if obj.rotation != 0.0 {
            start = start.attr("rotation", &rotation);
        }
        start = start.attr("visible", flag(obj.visible));
        for (name, value) in &shape_attrs {
            start = start.attr(*name, value);
        }
        self.w.write(start)?;

        match &obj.shape {
            IrObjectShape::Ellipse { .. } => {
                self.w.write(XmlEvent::start_element("ellipse"))?;
                self.end()?;
            }
            IrObjectShape::Polygon(points) => self.write_points("polygon", points)?,
            IrObjectShape::Polyline(points) => self.write_points("polyline", points)?,
            _ => {}
        }

        self.write_properties(&obj.properties)?;

        self.end() // object
    }

    fn write_points(&mut self, element: &str, points: &[Point]) -> Result<(), EmitError> {
        let points = points_attr(points);
        self.w
            .write(XmlEvent::start_element(element).attr("points", &points))?;
        self.end()
    }

    fn write_properties(&mut self, props: &Properties) -> Result<(), EmitError> {
        if props.is_empty() {
            return Ok(());
        }

        self.w.write(XmlEvent::start_element("properties"))?;
        for (name, value) in props.iter() {
            let value = value.map(|v| v.to_string()).unwrap_or_default();
            self.w.write(
                XmlEvent::start_element("property")
                    .attr("name", name)
                    .attr("value", &value),
            )?;
            self.end()?;
        }
        self.end() // properties
    }
}
