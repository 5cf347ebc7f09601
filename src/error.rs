use std::path::PathBuf;
use thiserror::Error;

/// Startup failures. None of these are recoverable: if the system has no
/// usable graphics backend there is nothing to fall back to.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("no suitable GPU adapter found on the system")]
    NoAdapter,

    #[error("failed to create a rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to acquire a graphics device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("the surface reports no supported texture format")]
    NoSurfaceFormat,

    #[error("default shader was rejected: {0}")]
    DefaultShader(#[from] CompileError),
}

/// The backend compiler rejected the fragment source. The previously
/// active pipeline stays in force; the message is shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

/// Texture loading failures. The binding list is left unchanged.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read texture {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("draw issued outside of a started frame")]
    FrameNotStarted,
}
