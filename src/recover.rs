use crate::error::{LoadError, RecoverError};
use crate::loader::content::ContentLoader;
use crate::writer::tmx::{write_tmx_file, EmitReport};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const OUTPUT_EXTENSION: &str = "tmx";

/// Where the recovered map for `input` is written: same path, `.tmx`.
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

/// Loads one asset through `loader` and writes its TMX next to it.
pub fn recover_file<L: ContentLoader + ?Sized>(
    loader: &L,
    input: &Path,
) -> Result<(PathBuf, EmitReport), RecoverError> {
    let root = match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let asset = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            LoadError::Other(anyhow::anyhow!(
                "Asset name of {} is not valid UTF-8",
                input.display()
            ))
        })?;

    let map = loader.load_tile_map(asset, root)?;
    log::debug!(
        "Loaded '{}': {} tileset(s), {} tile layer(s), {} object layer(s)",
        asset,
        map.tilesets.len(),
        map.tile_layers.len(),
        map.object_layers.len()
    );

    let out = output_path(input);
    let report = write_tmx_file(&map, &out)?;
    Ok((out, report))
}

/// Per-outcome file counts of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Files written as TMX
    pub recovered: usize,
    /// Assets that are not tile maps
    pub skipped: usize,
    /// Load, decode or emit failures
    pub failed: usize,
}

/// Processes `inputs` in order, writing one report block per file to
/// `report`. A failing file never stops the batch; only a failure to write
/// the report itself is returned.
pub fn run_batch<L, W>(loader: &L, inputs: &[PathBuf], report: &mut W) -> io::Result<BatchSummary>
where
    L: ContentLoader + ?Sized,
    W: Write,
{
    let mut summary = BatchSummary::default();

    for input in inputs {
        writeln!(report, "Processing: {}", input.display())?;

        match recover_file(loader, input) {
            Ok((out, emit)) => {
                for warning in &emit.warnings {
                    writeln!(report, "[WARN] {}", warning)?;
                }
                writeln!(report, "Recovered -> {}", out.display())?;
                summary.recovered += 1;
            }
            Err(RecoverError::Load(err @ LoadError::WrongType { .. })) => {
                writeln!(report, "[SKIP] Not a TiledMap: {}", input.display())?;
                writeln!(report, "        {}", err)?;
                summary.skipped += 1;
            }
            Err(RecoverError::Load(err @ (LoadError::Decode { .. } | LoadError::Io { .. }))) => {
                writeln!(report, "[ERROR] Failed to load: {}", input.display())?;
                writeln!(report, "        {}", err)?;
                summary.failed += 1;
            }
            Err(err) => {
                log::error!("Recovering {} failed: {:?}", input.display(), err);
                writeln!(report, "[ERROR] Unexpected error: {}", input.display())?;
                writeln!(report, "        {}", err)?;
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
