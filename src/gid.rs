//! Global tile identifiers (GIDs).

use crate::ir_map::IrTileset;

/// Horizontal flip flag, bit 31.
pub const FLIP_H: u32 = 0x8000_0000;
/// Vertical flip flag, bit 30.
pub const FLIP_V: u32 = 0x4000_0000;
/// Anti-diagonal flip flag, bit 29.
pub const FLIP_D: u32 = 0x2000_0000;
/// Keeps the lower 29 bits (bit 28 is free).
pub const GID_MASK: u32 = 0x1FFF_FFFF;

/// Strips the Tiled flip flags from a raw GID.
#[inline]
pub fn clean(raw: u32) -> u32 {
    raw & GID_MASK
}

/// First-GID table of a map's tilesets.
///
/// Tileset `i` starts at `1 + sum(tilecount[0..i])`; the table is built once
/// per map and shared by every lookup so tile layers and tile objects can
/// never disagree about a tileset's base.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GidTable {
    first_gids: Vec<u32>,
    tilecounts: Vec<u32>,
}

impl GidTable {
    /// Table for `tilesets` in map order.
    pub fn from_tilesets(tilesets: &[IrTileset]) -> Self {
        Self::from_tilecounts(tilesets.iter().map(|t| t.tilecount))
    }

    /// Table from bare tile counts; sums saturate at `u32::MAX`.
    pub fn from_tilecounts(counts: impl IntoIterator<Item = u32>) -> Self {
        let mut first_gids = Vec::new();
        let mut tilecounts = Vec::new();
        let mut next = 1u32;
        for count in counts {
            first_gids.push(next);
            tilecounts.push(count);
            next = next.saturating_add(count);
        }
        Self {
            first_gids,
            tilecounts,
        }
    }

    /// Number of tilesets.
    pub fn len(&self) -> usize {
        self.first_gids.len()
    }

    /// True for a map without tilesets.
    pub fn is_empty(&self) -> bool {
        self.first_gids.is_empty()
    }

    /// First GID of `tileset`.
    #[inline]
    pub fn first_gid(&self, tileset: usize) -> Option<u32> {
        self.first_gids.get(tileset).copied()
    }

    /// GID of local tile `local_id` in `tileset`.
    #[inline]
    pub fn gid(&self, tileset: usize, local_id: u32) -> Option<u32> {
        self.first_gid(tileset)
            .and_then(|first| first.checked_add(local_id))
    }

    /// Highest GID covered by any tileset, 0 when there are none.
    pub fn max_gid(&self) -> u32 {
        self.first_gids
            .iter()
            .zip(&self.tilecounts)
            .map(|(first, count)| first.saturating_add(*count).saturating_sub(1))
            .max()
            .unwrap_or(0)
    }

    /// Inverse lookup: the tileset owning `gid` and the local index within it.
    pub fn locate(&self, gid: u32) -> Option<(usize, u32)> {
        let gid = clean(gid);
        if gid == 0 {
            return None;
        }
        // first_gids is non-decreasing; empty tilesets share the next one's base.
        let idx = self.first_gids.partition_point(|&first| first <= gid);
        let ts = idx.checked_sub(1)?;
        let local = gid - self.first_gids[ts];
        (local < self.tilecounts[ts]).then_some((ts, local))
    }

    /// True if some tileset covers `gid` (flags ignored).
    pub fn contains(&self, gid: u32) -> bool {
        self.locate(gid).is_some()
    }
}
