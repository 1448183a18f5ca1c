#![warn(unused_extern_crates)]
use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use swapface::frame::{self, fit_width};
use swapface::pipeline::MeshPipeline;
use swapface::video::{CaptureDevice, FrameLoop, ImageSequence, OutputVideoStream, Webcam};
use swapface::{BlendMode, CaptureConfig, DetectorConfig, SwapConfig, SwapSession};
use tracing::{Level, debug, info, span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Blend {
    Seamless,
    Feather,
    Paste,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CmdArgs {
    /// Image holding the face to transfer
    #[arg(short, long, value_name = "FILE")]
    source: PathBuf,

    /// Swap a single image read from this path
    #[arg(short, long, requires = "output")]
    input: Option<PathBuf>,

    /// Where to write the swapped single image
    #[arg(short, long, requires = "input")]
    output: Option<PathBuf>,

    /// Replay still frames from a directory instead of the webcam
    #[arg(long, value_name = "DIR", conflicts_with = "input")]
    frames: Option<PathBuf>,

    /// Target frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Requested capture width
    #[arg(long, default_value = "640")]
    width: u32,

    /// Requested capture height
    #[arg(long, default_value = "480")]
    height: u32,

    /// Camera index. Defaults to the last camera found
    #[arg(long)]
    camera: Option<u32>,

    /// Downscale wider still images before swapping
    #[arg(long, default_value = "640")]
    max_width: u32,

    #[arg(long, value_enum, default_value = "seamless")]
    blend: Blend,

    /// Warp triangles on all cores
    #[arg(long)]
    parallel: bool,

    /// Directory holding the ONNX models
    #[arg(long, default_value = "./models")]
    models: PathBuf,
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let args = CmdArgs::parse();

    let detector = MeshPipeline::new(&DetectorConfig {
        models_dir: args.models.clone(),
        ..Default::default()
    })?;

    let config = SwapConfig {
        blend: match args.blend {
            Blend::Seamless => BlendMode::default(),
            Blend::Feather => BlendMode::Feather { radius: 8 },
            Blend::Paste => BlendMode::Paste,
        },
        parallel: args.parallel,
        ..Default::default()
    };
    let session = SwapSession::new(Box::new(detector), config);

    session.set_source(frame::load(&args.source)?)?;
    info!("Source face loaded from {}", args.source.display());

    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        // Process single image at file and exit
        return process_image(&session, input, output, args.max_width);
    }

    let capture = CaptureConfig {
        width: args.width,
        height: args.height,
        fps: args.fps,
        camera_index: args.camera,
    };

    match &args.frames {
        Some(dir) => run_live(&session, ImageSequence::from_dir(dir)?, &capture),
        None => run_live(&session, Webcam::new(capture.clone()), &capture),
    }
}

fn process_image(
    session: &SwapSession,
    input: &Path,
    output: &Path,
    max_width: u32,
) -> Result<()> {
    let span = span!(Level::DEBUG, "process_image");
    let _guard = span.enter();
    let start = Instant::now();

    let img = fit_width(frame::load(input)?, max_width);
    let result = session.process(&img)?;
    frame::save(&result, output)?;

    debug!("Took {:?}", start.elapsed());
    info!("Result at {}", output.display());
    Ok(())
}

fn run_live<D: CaptureDevice>(
    session: &SwapSession,
    device: D,
    capture: &CaptureConfig,
) -> Result<()> {
    let mut output_stream: Option<OutputVideoStream> = None;

    let mut frame_loop = FrameLoop::new(session, device, capture.fps);
    let stats = frame_loop.run(|img| {
        if output_stream.is_none() {
            output_stream = Some(OutputVideoStream::new(img.width(), img.height(), capture.fps)?);
        }
        match output_stream.as_mut() {
            Some(stream) => stream.write_frame(img),
            None => Ok(()),
        }
    })?;

    if stats.frames == 0 {
        bail!("Capture device produced no frames");
    }

    if let Some(stream) = output_stream {
        stream.close()?;
    }

    Ok(())
}
