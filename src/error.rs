use std::path::PathBuf;

/// Every failure the conversion backend can report.
///
/// The UI shows `Display` verbatim, so messages are written for the user.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("ffmpeg executable not found. Install ffmpeg, put it in PATH, or pass --ffmpeg.")]
    ToolNotFound,

    #[error("No file data received")]
    EmptyInput,

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Invalid conversion options: {0}")]
    InvalidOptions(String),

    #[error("Could not resolve the output directory (no home directory)")]
    OutputDirUnresolved,

    #[error("Unsupported OS: {0}")]
    UnsupportedPlatform(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GIF conversion failed (ffmpeg path: {}): {status}\n{stderr}", ffmpeg.display())]
    FfmpegFailed {
        ffmpeg: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Failed to open {}: {status}", path.display())]
    OpenerFailed { path: PathBuf, status: String },
}

impl ConvertError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;
