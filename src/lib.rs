#![warn(missing_docs)]

//! Recovers editable Tiled TMX maps from compiled XNB tile-map assets.

mod error;
pub mod gid;
mod input;
mod ir_map;
/// Content loaders turning compiled assets into [`IrMap`]s.
pub mod loader {
    pub mod content;
    pub mod json_loader;
    pub mod xnb;
}
mod recover;
mod writer {
    pub mod tmx;
}

pub use error::{EmitError, LoadError, RecoverError};
pub use gid::GidTable;
pub use input::{resolve_inputs, wildcard_match};
pub use ir_map::{
    IrMap, IrObject, IrObjectLayer, IrObjectShape, IrTileLayer, IrTileset, IrTilesetImage,
    Orientation, Point, Properties, PropertyValue,
};
pub use loader::content::ContentLoader;
pub use loader::json_loader::JsonLoader;
pub use loader::xnb::XnbLoader;
pub use recover::{output_path, recover_file, run_batch, BatchSummary};
pub use writer::tmx::{format_f32, write_tmx, write_tmx_file, EmitReport};
