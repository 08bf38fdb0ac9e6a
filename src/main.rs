use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use xnb_tiled_recover::{resolve_inputs, run_batch, ContentLoader, JsonLoader, XnbLoader};

/// Recover Tiled .tmx maps from compiled tile-map assets.
#[derive(Parser)]
#[command(name = "xnb-tiled-recover", version, about)]
struct Cli {
    /// Asset files or wildcard patterns (e.g. `Content/Maps/*.xnb`)
    inputs: Vec<String>,

    /// How to decode the input assets
    #[arg(long, value_enum, default_value_t = LoaderKind::Xnb)]
    loader: LoaderKind,

    /// Log debug details to stderr (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LoaderKind {
    /// Compiled MonoGame content
    Xnb,
    /// JSON tile-map snapshots
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let loader: Box<dyn ContentLoader> = match cli.loader {
        LoaderKind::Xnb => Box::new(XnbLoader),
        LoaderKind::Json => Box::new(JsonLoader),
    };
    let ext = loader.extension();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.inputs.is_empty() {
        writeln!(out, "Usage: xnb-tiled-recover <file.{ext} | *.{ext}>")?;
        return Ok(());
    }

    let files = resolve_inputs(&cli.inputs, ext).context("Resolving input files")?;
    if files.is_empty() {
        writeln!(out, "No .{ext} files found.")?;
        return Ok(());
    }

    let summary = run_batch(loader.as_ref(), &files, &mut out)?;
    log::info!(
        "{} recovered, {} skipped, {} failed",
        summary.recovered,
        summary.skipped,
        summary.failed
    );
    Ok(())
}
