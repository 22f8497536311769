use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gxpipe", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a PNG through the pixel pipeline and write the output frame as a PNG.
    Frame(FrameArgs),
    /// Print the command blocks a configuration records, plus the fast-memory layout.
    Dump(DumpArgs),
    /// Print the default session options as JSON.
    Defaults,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input PNG, used as the core's video frame.
    #[arg(long)]
    input: PathBuf,

    /// Session options JSON (defaults when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to run before writing (history filters need several).
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// Cross-fade the output.
    #[arg(long)]
    faded: bool,

    /// Luma-only output.
    #[arg(long)]
    mono: bool,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// Session options JSON (defaults when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source width in pixels.
    #[arg(long, default_value_t = 240)]
    width: u32,

    /// Source height in pixels.
    #[arg(long, default_value_t = 160)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Dump(args) => cmd_dump(args),
        Command::Defaults => {
            println!("{}", gxpipe::SessionConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<gxpipe::SessionConfig> {
    let Some(path) = path else {
        return Ok(gxpipe::SessionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    gxpipe::SessionConfig::from_json(&text)
        .with_context(|| format!("parse config '{}'", path.display()))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let img = image::open(&args.input)
        .with_context(|| format!("open input '{}'", args.input.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let geometry = gxpipe::VideoGeometry {
        width,
        height,
        format: gxpipe::RawFormat::Rgba8888,
    };

    let mut session = gxpipe::PipelineSession::open(config, geometry)?;
    if session.config().generation() > 0 {
        eprintln!("options reduced to fit fast memory");
    }
    session.set_faded(args.faded);
    session.set_monochrome(args.mono);

    let raw = gxpipe::RawFrame::packed(width, height, gxpipe::RawFormat::Rgba8888, img.as_raw());
    let mut frame = None;
    for i in 0..args.frames.max(1) {
        frame = Some(
            session
                .run_frame(gxpipe::Retrace(i), gxpipe::Retrace(i).field(), &raw)
                .with_context(|| format!("render frame {i}"))?,
        );
    }
    let frame = frame.context("no frame rendered")?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    let stats = session.end_session()?;
    eprintln!(
        "wrote {} ({}x{}, {} frames)",
        args.out.display(),
        frame.width,
        frame.height,
        stats.frames_completed
    );
    Ok(())
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let geometry = gxpipe::VideoGeometry {
        width: args.width,
        height: args.height,
        ..gxpipe::VideoGeometry::handheld()
    };
    let session = gxpipe::PipelineSession::open(config, geometry)?;
    print!("{}", session.dump());
    session.end_session()?;
    Ok(())
}
