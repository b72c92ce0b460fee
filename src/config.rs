use std::path::PathBuf;

use clap::Parser;

use crate::types::{Dimension, GifConvertOptions};

/// Convert videos to animated GIFs with ffmpeg.
///
/// Without flags the window opens. `--info`, `--print-output-dir`,
/// `--open-output-dir` or a VIDEO argument run headless and exit.
#[derive(Parser, Debug, Clone)]
#[command(name = "gif-converter", version, about)]
pub struct Cli {
    /// Video to convert without opening the window
    pub video: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, env = "GIF_CONVERTER_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Directory the GIFs are written to
    #[arg(long, env = "GIF_CONVERTER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output frame rate
    #[arg(long, env = "GIF_CONVERTER_FPS", default_value_t = 10)]
    pub fps: u32,

    /// Output width in pixels (omit to keep the aspect ratio)
    #[arg(long, env = "GIF_CONVERTER_WIDTH")]
    pub width: Option<u32>,

    /// Output height in pixels (omit to keep the aspect ratio)
    #[arg(long, env = "GIF_CONVERTER_HEIGHT")]
    pub height: Option<u32>,

    /// Scaler flag for the ffmpeg scale filter
    #[arg(long, env = "GIF_CONVERTER_QUALITY", default_value = "lanczos")]
    pub quality: String,

    /// Print ffmpeg path and version, then exit
    #[arg(long)]
    pub info: bool,

    /// Print the output directory, then exit
    #[arg(long)]
    pub print_output_dir: bool,

    /// Open the output directory in the file manager, then exit
    #[arg(long)]
    pub open_output_dir: bool,
}

/// Resolved settings for the conversion backend.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// Where uploaded bytes are staged; `None` means `<tmp>/gif-converter`.
    pub staging_dir: Option<PathBuf>,
    pub options: GifConvertOptions,
}

impl From<&Cli> for AppConfig {
    fn from(cli: &Cli) -> Self {
        let to_dimension = |v: Option<u32>| v.map(Dimension::Pixels).unwrap_or_default();
        Self {
            ffmpeg_path: cli.ffmpeg.clone(),
            output_dir: cli.output_dir.clone(),
            staging_dir: None,
            options: GifConvertOptions {
                fps: cli.fps,
                width: to_dimension(cli.width),
                height: to_dimension(cli.height),
                quality: cli.quality.clone(),
            },
        }
    }
}

impl AppConfig {
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("gif-converter"))
    }
}
