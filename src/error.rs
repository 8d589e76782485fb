// One error type for the whole pipeline.
// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Creating the window failed
    #[error("Window init error: {0}")]
    WindowInit(String),

    /// Updating the window buffer failed
    #[error("Window update error: {0}")]
    WindowUpdate(String),

    /// Opening/starting the camera failed
    #[error("Camera init error: {0}")]
    CameraInit(String),

    /// Grabbing/decoding a frame failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String),

    /// Two CPU surfaces that must match in size did not
    #[error("Surface size mismatch: {0}")]
    SurfaceSize(String),

    /// No adapter or device could be acquired
    #[error("GPU init error: {0}")]
    GpuInit(String),

    /// The effect shader or its pipeline failed validation
    #[error("Shader compile error: {0}")]
    ShaderCompile(String),

    /// Mapping the output surface back to the CPU failed
    #[error("GPU readback error: {0}")]
    GpuReadback(String),

    /// `process` was called before the noise bitmap was loaded
    #[error("noise bitmap is not loaded")]
    NoiseNotLoaded,

    /// Loading the noise bitmap or a still frame failed
    #[error("Asset error: {0}")]
    Asset(String),

    /// The hand estimator failed; absorbed by the tracker, never fatal
    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
