//! Sceneforge CLI
//!
//! Converts scene documents to glTF 2.0 and inspects the results.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use sceneforge_export::gltf::{ExportType, GltfExportOptions, GltfExporter, SpeedScale};
use sceneforge_export::inspect;
use sceneforge_scene::SceneDocument;

/// Sceneforge - scene-graph to glTF 2.0 converter
#[derive(Parser)]
#[command(name = "sceneforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a scene document to glTF or GLB
    Convert(ConvertArgs),

    /// Print the node tree and animations of a glTF/GLB file
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Input scene JSON file
    input: PathBuf,

    /// Output path; a .glb extension selects the binary container
    /// (default: input path with .gltf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to export: all, animation or collision
    #[arg(long, default_value = "all")]
    export: String,

    /// Action name for animation exports
    #[arg(long)]
    action: Option<String>,

    /// Merge mesh objects sharing a collection into one node
    #[arg(long)]
    merge: bool,

    /// With --merge, also keep the separate per-object nodes
    #[arg(long)]
    keep: bool,

    /// Uniform geometry scale
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Animation speed scale (frames advanced per sample)
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Skip non-active UV layers
    #[arg(long)]
    no_extra_uv: bool,

    /// Do not declare the document as Z-up
    #[arg(long)]
    y_up: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Input .gltf or .glb file
    input: PathBuf,
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_file(verbosity >= 3)
        .with_line_number(verbosity >= 3)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Convert(args) => cmd_convert(args),
        Commands::Inspect(args) => cmd_inspect(args),
    }
}

fn cmd_convert(args: ConvertArgs) -> Result<()> {
    let export_type: ExportType = args.export.parse()?;

    let document = SceneDocument::load(&args.input)
        .with_context(|| format!("failed to load scene {:?}", args.input))?;

    let options = GltfExportOptions {
        export_type,
        action: args.action,
        merge: args.merge,
        keep: args.keep,
        geom_scale: args.scale,
        speed_scale: SpeedScale::Fixed(args.speed),
        extra_uv: !args.no_extra_uv,
        z_up: !args.y_up,
    };

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("gltf"));

    let result = GltfExporter::new(options)
        .convert(&document)
        .context("conversion failed")?;

    if output.extension().is_some_and(|ext| ext == "glb") {
        result.write_glb(&output)?;
    } else {
        result.write_gltf(&output)?;
    }

    info!("converted {:?} -> {:?}", args.input, output);
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let document = inspect::load_document(&args.input)
        .with_context(|| format!("failed to read {:?}", args.input))?;
    print!("{}", inspect::render(&document));
    Ok(())
}
