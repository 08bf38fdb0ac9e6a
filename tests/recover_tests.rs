// tests/recover_tests.rs

use byteorder::{WriteBytesExt, LE};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use xnb_tiled_recover::{
    run_batch, BatchSummary, ContentLoader, IrObjectShape, JsonLoader, LoadError, Orientation,
    Point, XnbLoader,
};

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("xnb_recover_{tag}_{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn map_json(cell: u32) -> String {
    format!(
        r#"{{
          "type": "map", "width": 2, "height": 1, "tilewidth": 8, "tileheight": 8,
          "tilesets": [{{"name":"t","tilewidth":8,"tileheight":8,"tilecount":4,"columns":2}}],
          "layers": [{{"type":"tilelayer","name":"ground","width":2,"height":1,"data":[{cell},0]}}]
        }}"#
    )
}

#[test]
fn batch_skips_non_map_and_keeps_going() {
    let dir = temp_dir("json_batch");
    fs::write(dir.join("a.json"), map_json(1)).unwrap();
    fs::write(dir.join("b.json"), r#"{"type":"tileset","name":"t"}"#).unwrap();
    fs::write(dir.join("c.json"), map_json(4)).unwrap();
    let inputs: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|n| dir.join(format!("{n}.json")))
        .collect();

    let mut out = Vec::new();
    let summary = run_batch(&JsonLoader, &inputs, &mut out).expect("report");
    let text = String::from_utf8(out).unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            recovered: 2,
            skipped: 1,
            failed: 0
        }
    );
    let tags: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with("Recovered") || l.starts_with("[SKIP]"))
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(tags, vec!["Recovered", "[SKIP]", "Recovered"]);

    let mut written: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "tmx"))
        .collect();
    written.sort();
    assert_eq!(written, vec![dir.join("a.tmx"), dir.join("c.tmx")]);

    let c = fs::read_to_string(dir.join("c.tmx")).unwrap();
    assert!(c.contains(r#"<data encoding="csv">4,0</data>"#), "{c}");
}

#[test]
fn missing_input_is_a_load_failure() {
    let dir = temp_dir("json_missing");
    let mut out = Vec::new();
    let summary = run_batch(&JsonLoader, &[dir.join("gone.json")], &mut out).unwrap();
    assert_eq!(summary.failed, 1);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[ERROR] Failed to load:"), "{text}");
    assert!(!dir.join("gone.tmx").exists());
}

/// Little-endian XNB byte builder for test assets.
struct Xnb(Vec<u8>);

impl Xnb {
    fn new(reader: &str) -> Self {
        let mut x = Xnb(b"XNBw".to_vec());
        x.u8(5).u8(0);
        x.0.write_u32::<LE>(0).unwrap(); // size, patched in finish
        x.uint7(1).string(reader).i32(0);
        x.uint7(0); // shared resources
        x.uint7(1); // primary object reader
        x
    }

    fn uint7(&mut self, mut v: u32) -> &mut Self {
        while v >= 0x80 {
            self.0.push((v as u8) | 0x80);
            v >>= 7;
        }
        self.0.push(v as u8);
        self
    }

    fn u8(&mut self, v: u8) -> &mut Self {
        self.0.push(v);
        self
    }

    fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    fn i32(&mut self, v: i32) -> &mut Self {
        self.0.write_i32::<LE>(v).unwrap();
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.0.write_u32::<LE>(v).unwrap();
        self
    }

    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.write_u16::<LE>(v).unwrap();
        self
    }

    fn f32(&mut self, v: f32) -> &mut Self {
        self.0.write_f32::<LE>(v).unwrap();
        self
    }

    fn string(&mut self, s: &str) -> &mut Self {
        self.uint7(s.len() as u32);
        self.0.extend_from_slice(s.as_bytes());
        self
    }

    fn props(&mut self, props: &[(&str, &str)]) -> &mut Self {
        self.i32(props.len() as i32);
        for (k, v) in props {
            self.string(k).string(v);
        }
        self
    }

    /// Inline tileset body without per-tile data.
    fn tileset(&mut self, texture: &str, tilecount: i32, columns: i32) -> &mut Self {
        self.string(texture).string("");
        self.i32(16).i32(16).i32(tilecount).i32(0).i32(0).i32(columns);
        self.i32(0); // explicit tiles
        self.props(&[])
    }

    fn layer_header(&mut self, kind: u8, name: &str) -> &mut Self {
        self.u8(kind).string(name).string("").bool(true).f32(1.0);
        self.f32(0.0).f32(0.0).f32(1.0).f32(1.0);
        self.props(&[])
    }

    fn object_header(&mut self, kind: u8, id: i32, w: f32, h: f32) -> &mut Self {
        self.u8(kind).i32(id).string(&format!("o{id}")).string("");
        self.f32(id as f32).f32(2.0).f32(w).f32(h).f32(0.0).bool(true);
        self.props(&[])
    }

    fn finish(&mut self) -> Vec<u8> {
        let len = self.0.len() as u32;
        self.0[6..10].copy_from_slice(&len.to_le_bytes());
        std::mem::take(&mut self.0)
    }
}

fn texture(width: u32, height: u32) -> Vec<u8> {
    Xnb::new("Microsoft.Xna.Framework.Content.Texture2DReader")
        .i32(0)
        .u32(width)
        .u32(height)
        .finish()
}

const FLIP_H: u32 = 0x8000_0000;

/// Two tilesets stored at first GIDs 1 and 101; the second is external.
fn write_xnb_fixture(dir: &Path) {
    fs::create_dir_all(dir.join("Tiles")).unwrap();
    fs::write(dir.join("Tiles/grass.xnb"), texture(32, 32)).unwrap();
    fs::write(dir.join("Tiles/props.xnb"), texture(64, 32)).unwrap();

    let external = Xnb::new("MonoGame.Extended.Tiled.TiledMapTilesetReader, MonoGame.Extended.Tiled")
        .tileset("props", 8, 4)
        .finish();
    // Its texture reference resolves against Tiles/, not the map directory.
    fs::write(dir.join("Tiles/props_set.xnb"), external).unwrap();

    let mut map = Xnb::new("MonoGame.Extended.Tiled.TiledMapReader, MonoGame.Extended.Tiled");
    map.string("").i32(2).i32(2).i32(16).i32(16).u32(0).u8(0).u8(1);
    map.props(&[("music", "theme")]);

    map.i32(2);
    map.i32(1).bool(false).tileset("Tiles/grass", 4, 2);
    map.i32(101).bool(true).string("Tiles/props_set");

    map.i32(3);
    map.layer_header(1, "ground").i32(2).i32(2).i32(3);
    map.u32(1).u16(0).u16(0);
    map.u32(103 | FLIP_H).u16(0).u16(1);
    map.u32(4).u16(1).u16(1);

    map.layer_header(3, "group").i32(1);
    map.layer_header(2, "things").u32(0).u8(0).i32(4);
    map.object_header(0, 1, 8.0, 4.0);
    map.object_header(1, 2, 16.0, 16.0).u32(108);
    map.object_header(3, 3, 0.0, 0.0).i32(3);
    map.f32(0.0).f32(0.0).f32(4.0).f32(0.0).f32(4.0).f32(4.0);
    map.object_header(9, 4, 0.0, 0.0);

    map.layer_header(0, "sky").string("Tiles/grass").f32(0.0).f32(0.0);

    fs::write(dir.join("level.xnb"), map.finish()).unwrap();
}

#[test]
fn xnb_map_decodes_with_rebased_gids() {
    let dir = temp_dir("xnb_decode");
    write_xnb_fixture(&dir);

    let map = XnbLoader.load_tile_map("level", &dir).expect("decode");
    assert_eq!(map.orientation, Orientation::Orthogonal);
    assert_eq!((map.width, map.height, map.tile_w, map.tile_h), (2, 2, 16, 16));

    assert_eq!(map.tilesets.len(), 2);
    assert_eq!(map.tilesets[0].name, "grass");
    assert_eq!((map.tilesets[0].image.width, map.tilesets[0].image.height), (32, 32));
    assert_eq!(map.tilesets[1].name, "props");
    assert_eq!(map.tilesets[1].tilecount, 8);
    assert_eq!(map.tilesets[1].image.width, 64);

    // Image layers are dropped and groups flattened.
    assert_eq!(map.tile_layers.len(), 1);
    assert_eq!(map.object_layers.len(), 1);
    // Stored 103 is props local 2, which lands on GID 5 + 2.
    assert_eq!(map.tile_layers[0].data, vec![1, 0, 7, 4]);

    let objects = &map.object_layers[0].objects;
    assert_eq!(objects.len(), 4);
    assert_eq!(
        objects[0].shape,
        IrObjectShape::Rectangle {
            width: 8.0,
            height: 4.0
        }
    );
    assert_eq!(
        objects[1].shape,
        IrObjectShape::Tile {
            tileset: 1,
            local_id: 7
        }
    );
    assert_eq!(
        objects[2].shape,
        IrObjectShape::Polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0)
        ])
    );
    assert!(matches!(objects[3].shape, IrObjectShape::Unknown(_)));
}

#[test]
fn xnb_batch_writes_tmx_and_skips_textures() {
    let dir = temp_dir("xnb_batch");
    write_xnb_fixture(&dir);
    let inputs = vec![dir.join("level.xnb"), dir.join("Tiles/grass.xnb")];

    let mut out = Vec::new();
    let summary = run_batch(&XnbLoader, &inputs, &mut out).expect("report");
    let text = String::from_utf8(out).unwrap();

    assert_eq!(summary.recovered, 1, "{text}");
    assert_eq!(summary.skipped, 1, "{text}");
    assert!(
        text.contains("[WARN] Unknown object type: TiledMapObject(type 9)"),
        "{text}"
    );
    assert!(!dir.join("Tiles/grass.tmx").exists());

    let tmx = fs::read_to_string(dir.join("level.tmx")).unwrap();
    assert!(tmx.contains(r#"<tileset firstgid="5" name="props""#), "{tmx}");
    assert!(tmx.contains(r#"<image source="grass.png" width="32" height="32" />"#), "{tmx}");
    assert!(tmx.contains(r#"<data encoding="csv">1,0,7,4</data>"#), "{tmx}");
    assert!(tmx.contains(r#"gid="12""#), "{tmx}");
}

#[test]
fn compressed_xnb_is_a_decode_error() {
    let dir = temp_dir("xnb_lzx");
    let mut data = Xnb::new("MonoGame.Extended.Tiled.TiledMapReader").finish();
    data[5] = 0x80;
    fs::write(dir.join("packed.xnb"), data).unwrap();

    let err = XnbLoader.load_tile_map("packed", &dir).unwrap_err();
    assert!(matches!(err, LoadError::Decode { .. }), "{err}");
}

#[test]
fn oversized_xnb_layer_fails_only_its_own_file() {
    let dir = temp_dir("xnb_huge");
    write_xnb_fixture(&dir);

    let mut huge = Xnb::new("MonoGame.Extended.Tiled.TiledMapReader");
    huge.string("").i32(1).i32(1).i32(16).i32(16).u32(0).u8(0).u8(1);
    huge.props(&[]).i32(0).i32(1);
    huge.layer_header(1, "ground").i32(i32::MAX).i32(i32::MAX).i32(0);
    fs::write(dir.join("huge.xnb"), huge.finish()).unwrap();

    let err = XnbLoader.load_tile_map("huge", &dir).unwrap_err();
    assert!(matches!(err, LoadError::Decode { .. }), "{err}");

    let inputs = vec![dir.join("huge.xnb"), dir.join("level.xnb")];
    let mut out = Vec::new();
    let summary = run_batch(&XnbLoader, &inputs, &mut out).expect("report");
    assert_eq!(
        summary,
        BatchSummary {
            recovered: 1,
            skipped: 0,
            failed: 1
        }
    );
    assert!(dir.join("level.tmx").exists());
    assert!(!dir.join("huge.tmx").exists());
}
