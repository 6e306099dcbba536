//! # TANDEM Headless Runner
//!
//! Runs wave animations against host-memory buffers without a window:
//! - Two grids share one buffer, one grid has its own
//! - The render thread is this thread; frames are paced to `target_fps`
//! - Scheduler and frame statistics are printed at the end
//!
//! Usage: tandem_headless [CONFIG.toml] [--frames N]
//!
//! Log level follows `RUST_LOG` (default `info`).

use std::process::ExitCode;
use std::sync::Arc;

use tandem::{Engine, EngineConfig, EngineResult};
use tandem_animation::animations::{Wave, WaveAnimation};
use tandem_animation::{BufferTarget, HostBuffer, HostBufferProbe};

/// Frames rendered when `--frames` is not given.
const DEFAULT_FRAMES: u64 = 240;
/// Vertices per grid side.
const GRID: usize = 32;

struct Args {
    config: Option<String>,
    frames: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        frames: DEFAULT_FRAMES,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--frames" {
            let value = iter.next().ok_or("--frames needs a value")?;
            args.frames = value
                .parse()
                .map_err(|_| format!("invalid frame count: {value}"))?;
        } else if args.config.is_none() {
            args.config = Some(arg);
        } else {
            return Err(format!("unexpected argument: {arg}"));
        }
    }
    Ok(args)
}

/// Flat grid in the XZ plane, normals up.
#[allow(clippy::cast_precision_loss)]
fn grid(side: usize, spacing: f32) -> (Vec<[f32; 3]>, Vec<[f32; 3]>) {
    let positions = (0..side * side)
        .map(|i| [(i % side) as f32 * spacing, 0.0, (i / side) as f32 * spacing])
        .collect();
    (positions, vec![[0.0, 1.0, 0.0]; side * side])
}

fn run(args: &Args) -> EngineResult<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut engine = Engine::new(config)?;
    engine.start()?;
    let scheduler = Arc::clone(engine.scheduler());

    // Two grids packed into one buffer.
    let (rest, normals) = grid(GRID, 0.1);
    let swell = WaveAnimation::new(rest.clone(), normals.clone())?;
    swell.add_wave(Wave::directional([1.0, 0.0, 1.0]).with_amplitude(0.2).with_width(0.8));
    let ripple = WaveAnimation::new(rest.clone(), normals.clone())?.at_offset(swell.byte_len());
    ripple.add_wave(Wave::radial([1.6, 0.0, 1.6]).with_amplitude(0.05).with_velocity(8.0));

    let shared = HostBuffer::new(swell.byte_len() + ripple.byte_len());
    let shared_id = shared.id();
    let shared_probe = shared.probe();
    scheduler.register(Arc::new(swell), Some(BufferTarget::create(shared)))?;
    scheduler.register(Arc::new(ripple), Some(BufferTarget::Existing(shared_id)))?;

    // A short-lived splash on its own buffer.
    let splash = WaveAnimation::new(rest, normals)?;
    splash.add_wave(Wave::radial([0.0; 3]).with_amplitude(0.5).with_lifetime(1.0));
    let own = HostBuffer::new(splash.byte_len());
    let own_probe = own.probe();
    scheduler.register(Arc::new(splash), Some(BufferTarget::create(own)))?;

    tracing::info!(
        frames = args.frames,
        shared_refs = scheduler.buffer_ref_count(shared_id),
        "running headless"
    );

    for _ in 0..args.frames {
        let result = engine.frame(|_ctx| {});
        if result.frame_number % 60 == 0 {
            tracing::info!(
                frame = result.frame_number,
                frame_time_us = result.frame_time_us,
                look_ahead = scheduler.stats().look_ahead(),
                "progress"
            );
        }
        engine.pace();
    }

    let frames = engine.frame_loop().stats();
    let animation = scheduler.stats();
    engine.shutdown()?;

    println!("frames rendered:      {}", frames.total_frames);
    println!("steps consumed:       {}", frames.steps_consumed);
    println!("avg frame time (us):  {}", frames.avg_frame_time_us);
    println!("worst frame (us):     {}", frames.worst_frame_time_us);
    println!("frames over budget:   {}", frames.frames_over_budget);
    println!("scheduler steps:      {}", animation.steps);
    println!("cpu step failures:    {}", animation.cpu_step_failures);
    println!("buffer uploads:       {}", animation.buffer_uploads);
    print_probe("shared buffer", &shared_probe);
    print_probe("splash buffer", &own_probe);
    Ok(())
}

fn print_probe(label: &str, probe: &HostBufferProbe) {
    println!(
        "{label}: {} uploads, {} bytes",
        probe.upload_count(),
        probe.bytes_uploaded()
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: tandem_headless [CONFIG.toml] [--frames N]");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "headless run failed");
            ExitCode::FAILURE
        }
    }
}
