//! The seam between asset decoding and TMX emission.

use crate::error::LoadError;
use crate::ir_map::IrMap;
use std::path::Path;

/// Decodes compiled assets into tile-map models.
pub trait ContentLoader {
    /// File extension (without the dot) of the assets this loader reads.
    fn extension(&self) -> &str;

    /// Loads asset `asset` (file stem, no extension) from directory `root`.
    fn load_tile_map(&self, asset: &str, root: &Path) -> Result<IrMap, LoadError>;
}
