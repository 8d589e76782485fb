// What you SEE:
// • Live camera, in grayscale.
// • Pinch with both index fingers (or hold the left mouse button and drag):
//   a noisy, color-split circle opens between them.
// • Let go and the circle shrinks back to nothing. ESC quits.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pinch_reveal::camera::{CameraCapture, FrameSource, StillImageSource};
use pinch_reveal::config::AppConfig;
use pinch_reveal::detect::{DetectionDriver, DetectionMode};
use pinch_reveal::draw::Drawer;
use pinch_reveal::estimator::{EstimatorKind, HandEstimator, NoHands, PointerHandle, PointerPinch, ReplayEstimator};
use pinch_reveal::tracker::MaskPolicy;
use pinch_reveal::{noise, Error, FrameOrchestrator, GpuCompositor};

#[derive(Parser, Debug)]
#[command(version, about = "Two-hand pinch reveal effect over a webcam feed")]
struct Cli {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera device index
    #[arg(long)]
    camera: Option<u32>,

    /// Loop this image instead of opening a camera
    #[arg(long)]
    still: Option<PathBuf>,

    /// Noise bitmap (PNG/JPEG); generated when omitted
    #[arg(long)]
    noise: Option<PathBuf>,

    #[arg(long, value_enum)]
    estimator: Option<EstimatorArg>,

    /// Recorded detections for the replay estimator
    #[arg(long)]
    replay: Option<PathBuf>,

    #[arg(long, value_enum)]
    detection: Option<DetectionArg>,

    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EstimatorArg {
    Pointer,
    Replay,
    #[value(name = "none")]
    NoHands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DetectionArg {
    Inline,
    Background,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Decay,
    Snapshot,
}

impl Cli {
    /// Load the config file (or defaults) and apply command-line overrides.
    fn resolve(&self) -> Result<AppConfig, Error> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        if let Some(index) = self.camera {
            config.camera.index = index;
        }
        if let Some(path) = &self.still {
            config.camera.still_image = Some(path.clone());
        }
        if let Some(path) = &self.noise {
            config.compositor.noise_path = Some(path.clone());
        }
        if let Some(path) = &self.replay {
            config.detection.replay_path = Some(path.clone());
        }
        if let Some(kind) = self.estimator {
            config.detection.estimator = match kind {
                EstimatorArg::Pointer => EstimatorKind::Pointer,
                EstimatorArg::Replay => EstimatorKind::Replay,
                EstimatorArg::NoHands => EstimatorKind::None,
            };
        }
        if let Some(mode) = self.detection {
            config.detection.mode = match mode {
                DetectionArg::Inline => DetectionMode::Inline,
                DetectionArg::Background => DetectionMode::Background,
            };
        }
        if let Some(policy) = self.policy {
            config.tracker.policy = match policy {
                PolicyArg::Decay => MaskPolicy::Decay,
                PolicyArg::Snapshot => MaskPolicy::Snapshot,
            };
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_source(config: &AppConfig) -> Result<Box<dyn FrameSource>, Error> {
    match &config.camera.still_image {
        Some(path) => Ok(Box::new(StillImageSource::open(path)?)),
        None => {
            let cam = &config.camera;
            Ok(Box::new(CameraCapture::new(cam.index, cam.width, cam.height, cam.fps)?))
        }
    }
}

/// Build the configured estimator. The pointer estimator also hands back the
/// handle the loop feeds mouse input through.
fn build_estimator(config: &AppConfig) -> Result<(Box<dyn HandEstimator>, Option<PointerHandle>), Error> {
    let estimator: Box<dyn HandEstimator> = match config.detection.estimator {
        EstimatorKind::Pointer => {
            let pointer = PointerPinch::new();
            let handle = pointer.handle();
            let estimator: Box<dyn HandEstimator> = Box::new(pointer);
            return Ok((estimator, Some(handle)));
        }
        EstimatorKind::Replay => {
            let path = config
                .detection
                .replay_path
                .as_deref()
                .ok_or_else(|| Error::Config("the replay estimator needs a replay path".into()))?;
            Box::new(ReplayEstimator::load(path)?)
        }
        EstimatorKind::None => Box::new(NoHands),
    };
    Ok((estimator, None))
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let config = match cli.resolve() {
        Ok(config) => {
            init_logging(&config.logging.level);
            config
        }
        Err(e) => {
            init_logging("info");
            error!("Invalid configuration: {e}");
            return Err(e);
        }
    };

    /* --- Video source + window ---
       Visual: window opens at the video's native size. */
    let mut source = open_source(&config).inspect_err(|e| error!("Could not open video source: {e}"))?;
    let (w, h) = source.resolution();
    let mut drawer = Drawer::new(&config.display.title, w as usize, h as usize)
        .inspect_err(|e| error!("Could not open window: {e}"))?;
    drawer.set_target_fps(config.display.target_fps);

    /* --- Compositor: shader compiled once, noise loaded once --- */
    let mut compositor = GpuCompositor::new(config.compositor.texture_policy)
        .inspect_err(|e| error!("Could not start the GPU compositor: {e}"))?;
    let noise = noise::load_or_generate(config.compositor.noise_path.as_deref(), config.compositor.noise_seed)
        .inspect_err(|e| error!("Could not load the noise bitmap: {e}"))?;
    compositor.load_noise(noise);

    let (estimator, pointer) = build_estimator(&config).inspect_err(|e| error!("Could not build the estimator: {e}"))?;
    let detector = DetectionDriver::new(config.detection.mode, estimator);
    let mut orchestrator = FrameOrchestrator::new(compositor, detector, &config);
    orchestrator.resize(w as usize, h as usize);

    info!(width = w, height = h, "Running; press ESC to quit");

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        if let Some(pointer) = &pointer {
            pointer.update(drawer.mouse_pos(), drawer.left_mouse_down());
        }

        let frame = source.next_frame().inspect_err(|e| error!("Lost the video source: {e}"))?;
        orchestrator.tick(&frame).inspect_err(|e| error!("Frame failed: {e}"))?;

        // Visual: the window shows the effect for this frame.
        drawer.present(orchestrator.display())?;
    }

    info!(ticks = orchestrator.ticks(), "Window closed");
    Ok(())
}
