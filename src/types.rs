use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ConvertError, ConvertResult};

/// Extensions accepted by the picker and by drops without a MIME type.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Output size along one axis. `Auto` keeps the source aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Dimension {
    #[default]
    Auto,
    Pixels(u32),
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Auto => write!(f, "-1"),
            Dimension::Pixels(px) => write!(f, "{}", px),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GifConvertOptions {
    pub fps: u32,
    pub width: Dimension,
    pub height: Dimension,
    /// Scaler flag for ffmpeg's `scale` filter, e.g. "lanczos".
    pub quality: String,
}

impl Default for GifConvertOptions {
    fn default() -> Self {
        Self {
            fps: 10,
            width: Dimension::Auto,
            height: Dimension::Auto,
            quality: "lanczos".to_string(),
        }
    }
}

impl GifConvertOptions {
    pub fn validate(&self) -> ConvertResult<()> {
        if self.fps == 0 {
            return Err(ConvertError::InvalidOptions("fps must be positive".to_string()));
        }
        for (axis, dim) in [("width", self.width), ("height", self.height)] {
            if dim == Dimension::Pixels(0) {
                return Err(ConvertError::InvalidOptions(format!(
                    "{} must be positive or auto",
                    axis
                )));
            }
        }
        if self.quality.is_empty() {
            return Err(ConvertError::InvalidOptions("quality must not be empty".to_string()));
        }
        if self
            .quality
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | ',' | ';' | '=' | '[' | ']' | '\''))
        {
            return Err(ConvertError::InvalidOptions(format!(
                "quality {:?} contains filter metacharacters",
                self.quality
            )));
        }
        Ok(())
    }

    /// The `-vf` argument handed to ffmpeg.
    pub fn filter_graph(&self) -> String {
        format!(
            "fps={},scale={}:{}:flags={}",
            self.fps, self.width, self.height, self.quality
        )
    }
}

#[derive(Clone, Debug)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// A video the user picked or dropped, not yet read into memory when it
/// came from the filesystem.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub source: FileSource,
}

impl PartialEq for SelectedFile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.size == other.size
    }
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> ConvertResult<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ConvertError::io(format!("Failed to read {}", path.display()), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ConvertError::InvalidFileName(path.display().to_string()))?;
        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    pub fn read_bytes(&self) -> ConvertResult<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => std::fs::read(path)
                .map_err(|e| ConvertError::io(format!("Failed to read {}", path.display()), e)),
            FileSource::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }
}

/// Advisory check: MIME type first, then extension.
pub fn is_video(name: &str, mime: &str) -> bool {
    if mime.starts_with("video/") {
        return true;
    }
    Path::new(name)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Sent from the conversion worker back to the window.
#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Completed { output: String },
    Failed { error: String },
}

#[derive(Clone, Debug)]
pub enum LogEntry {
    Info(String),
    Success(String),
    Error(String),
    Warning(String),
}
