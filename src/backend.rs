//! The request/response boundary between the window and the converter.
//!
//! The UI only talks to [`GifBackend`]; every call returns an explicit
//! `Result` whose error renders as the message the user sees.

use std::path::PathBuf;

use crate::engine::ConversionEngine;
use crate::error::ConvertResult;

pub trait GifBackend: Send + Sync {
    /// Converts raw video bytes and returns the absolute path of the GIF.
    fn convert_uploaded_video_to_gif(&self, data: &[u8], file_name: &str) -> ConvertResult<String>;

    /// Human readable ffmpeg path/version report.
    fn ffmpeg_info(&self) -> ConvertResult<String>;

    fn output_dir(&self) -> ConvertResult<String>;

    fn open_output_dir(&self) -> ConvertResult<()>;

    /// Most recent GIFs in the output directory. Not every backend keeps
    /// a listing, so the default is empty.
    fn recent_outputs(&self, _limit: usize) -> ConvertResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Runs ffmpeg in this process.
pub struct LocalBackend {
    engine: ConversionEngine,
}

impl LocalBackend {
    pub fn new(engine: ConversionEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }
}

impl GifBackend for LocalBackend {
    fn convert_uploaded_video_to_gif(&self, data: &[u8], file_name: &str) -> ConvertResult<String> {
        self.engine
            .convert_uploaded_video_to_gif(data, file_name)
            .map(|path| path.display().to_string())
    }

    fn ffmpeg_info(&self) -> ConvertResult<String> {
        self.engine.ffmpeg_info()
    }

    fn output_dir(&self) -> ConvertResult<String> {
        self.engine
            .output_dir()
            .map(|dir| dir.display().to_string())
    }

    fn open_output_dir(&self) -> ConvertResult<()> {
        self.engine.open_output_dir()
    }

    fn recent_outputs(&self, limit: usize) -> ConvertResult<Vec<PathBuf>> {
        self.engine.recent_outputs(limit)
    }
}
