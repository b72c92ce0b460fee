use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::error::{ConvertError, ConvertResult};
use crate::types::GifConvertOptions;

const OUTPUT_FOLDER_NAME: &str = "GIF-Converter";
const STDERR_TAIL_LINES: usize = 20;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct ConversionEngine {
    ffmpeg_path: Option<PathBuf>,
    output_dir_override: Option<PathBuf>,
    staging_dir: PathBuf,
    options: GifConvertOptions,
    opener: Option<OsString>,
}

/// Where to look for ffmpeg, in order: `PATH`, the common install
/// locations, then `tools/` next to the executable.
pub struct FfmpegLocator {
    pub exe_name: &'static str,
    /// `None` reads the process `PATH`.
    pub path_var: Option<OsString>,
    pub common_paths: Vec<PathBuf>,
    pub tools_dir: Option<PathBuf>,
}

impl FfmpegLocator {
    pub fn system() -> Self {
        let tools_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("tools")));
        Self {
            exe_name: if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" },
            path_var: None,
            common_paths: [
                "/opt/homebrew/bin/ffmpeg",
                "/usr/local/bin/ffmpeg",
                "/usr/bin/ffmpeg",
                "./bin/ffmpeg",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            tools_dir,
        }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        let on_path = match &self.path_var {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_default();
                which::which_in(self.exe_name, Some(paths), cwd).ok()
            }
            None => which::which(self.exe_name).ok(),
        };
        if let Some(path) = on_path {
            return Some(path);
        }

        if let Some(path) = self.common_paths.iter().find(|path| path.is_file()) {
            return Some(path.clone());
        }

        let tool_path = self.tools_dir.as_ref()?.join(self.exe_name);
        if !tool_path.is_file() {
            return None;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&tool_path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o755);
                let _ = std::fs::set_permissions(&tool_path, perms);
            }
        }
        Some(tool_path)
    }
}

fn default_opener() -> Option<OsString> {
    if cfg!(target_os = "macos") {
        Some("open".into())
    } else if cfg!(target_os = "windows") {
        Some("explorer".into())
    } else if cfg!(unix) {
        Some("xdg-open".into())
    } else {
        None
    }
}

impl ConversionEngine {
    pub fn new(config: &AppConfig) -> Self {
        let ffmpeg_path = match &config.ffmpeg_path {
            Some(configured) if configured.exists() => Some(configured.clone()),
            Some(configured) => {
                warn!(path = %configured.display(), "configured ffmpeg does not exist");
                None
            }
            None => FfmpegLocator::system().locate(),
        };

        match &ffmpeg_path {
            Some(path) => info!(path = %path.display(), "using ffmpeg"),
            None => warn!("ffmpeg not found"),
        }

        Self {
            ffmpeg_path,
            output_dir_override: config.output_dir.clone(),
            staging_dir: config.staging_dir(),
            options: config.options.clone(),
            opener: default_opener(),
        }
    }

    /// Replaces the file manager command used by `open_output_dir`.
    pub fn with_opener(mut self, opener: impl Into<OsString>) -> Self {
        self.opener = Some(opener.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.ffmpeg_path.is_some()
    }

    pub fn ffmpeg_path(&self) -> ConvertResult<&Path> {
        self.ffmpeg_path.as_deref().ok_or(ConvertError::ToolNotFound)
    }

    /// Writes uploaded bytes into the staging directory under a
    /// timestamped name and returns the staged path.
    pub fn save_uploaded_file(&self, data: &[u8], file_name: &str) -> ConvertResult<PathBuf> {
        if data.is_empty() {
            return Err(ConvertError::EmptyInput);
        }
        let name = sanitize_file_name(file_name)?;

        std::fs::create_dir_all(&self.staging_dir)
            .map_err(|e| ConvertError::io("Failed to create staging directory", e))?;

        let staged = self.staging_dir.join(format!(
            "{}_{}_{}_{}",
            timestamp(),
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed),
            name
        ));
        std::fs::write(&staged, data)
            .map_err(|e| ConvertError::io("Failed to save uploaded file", e))?;

        debug!(path = %staged.display(), bytes = data.len(), "staged upload");
        Ok(staged)
    }

    /// Converts a video already on disk. The GIF is named after the input.
    pub fn convert_video_to_gif(
        &self,
        video_path: &Path,
        options: &GifConvertOptions,
    ) -> ConvertResult<PathBuf> {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| ConvertError::InvalidFileName(video_path.display().to_string()))?;
        self.convert_to_output(video_path, &stem, options)
    }

    /// Stages the bytes, converts them with the configured options and
    /// removes the staged copy again.
    pub fn convert_uploaded_video_to_gif(
        &self,
        data: &[u8],
        file_name: &str,
    ) -> ConvertResult<PathBuf> {
        let staged = StagedFile(self.save_uploaded_file(data, file_name)?);
        let stem = Path::new(&sanitize_file_name(file_name)?)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());

        self.convert_to_output(&staged.0, &stem, &self.options)
    }

    fn convert_to_output(
        &self,
        input: &Path,
        stem: &str,
        options: &GifConvertOptions,
    ) -> ConvertResult<PathBuf> {
        options.validate()?;
        let ffmpeg = self.ffmpeg_path()?;

        std::fs::create_dir_all(&self.staging_dir)
            .map_err(|e| ConvertError::io("Failed to create staging directory", e))?;
        let intermediate = StagedFile(self.staging_dir.join(format!(
            "{}_{}_{}.gif",
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed),
            stem
        )));

        info!(input = %input.display(), filter = %options.filter_graph(), "converting to gif");

        let output = Command::new(ffmpeg)
            .args(ffmpeg_args(input, &intermediate.0, options))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ConvertError::io(format!("Failed to execute {}", ffmpeg.display()), e))?;

        if !output.status.success() || !intermediate.0.is_file() {
            return Err(ConvertError::FfmpegFailed {
                ffmpeg: ffmpeg.to_path_buf(),
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let final_path = self.move_to_output_folder(&intermediate.0, stem)?;
        info!(output = %final_path.display(), "conversion finished");
        Ok(final_path)
    }

    /// Moves a finished GIF into the output directory as
    /// `<stem>_<timestamp>.gif`, returning its absolute path.
    pub fn move_to_output_folder(&self, file: &Path, stem: &str) -> ConvertResult<PathBuf> {
        let output_dir = self.output_dir()?;
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| ConvertError::io("Failed to create output directory", e))?;

        let ts = timestamp();
        let mut final_path = output_dir.join(format!("{}_{}.gif", stem, ts));
        let mut suffix = 1;
        // Reserve the name so a concurrent move cannot pick it too.
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&final_path)
            {
                Ok(_) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    final_path = output_dir.join(format!("{}_{}_{}.gif", stem, ts, suffix));
                    suffix += 1;
                }
                Err(e) => return Err(ConvertError::io("Failed to create output file", e)),
            }
        }

        if let Err(e) = std::fs::rename(file, &final_path) {
            debug!(error = %e, "rename failed, copying instead");
            if let Err(e) = std::fs::copy(file, &final_path) {
                let _ = std::fs::remove_file(&final_path);
                return Err(ConvertError::io("Failed to copy GIF to output directory", e));
            }
            if let Err(e) = std::fs::remove_file(file) {
                warn!(path = %file.display(), error = %e, "failed to remove intermediate gif");
            }
        }

        Ok(final_path)
    }

    pub fn ffmpeg_info(&self) -> ConvertResult<String> {
        let ffmpeg = self.ffmpeg_path()?;
        let mut report = format!("FFmpeg path: {}\n", ffmpeg.display());

        if let Err(e) = std::fs::metadata(ffmpeg) {
            report.push_str(&format!("Status: File not found ({})\n", e));
            return Ok(report);
        }
        report.push_str("Status: File exists\n");

        let output = Command::new(ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ConvertError::io(format!("Failed to execute {}", ffmpeg.display()), e))?;
        if !output.status.success() {
            return Err(ConvertError::FfmpegFailed {
                ffmpeg: ffmpeg.to_path_buf(),
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = stdout.lines().next() {
            report.push_str(&format!("Version: {}\n", first_line.trim()));
        }
        Ok(report)
    }

    /// Absolute output directory. Symlinks are left as given so returned
    /// GIF paths always start with this value.
    pub fn output_dir(&self) -> ConvertResult<PathBuf> {
        let dir = match &self.output_dir_override {
            Some(dir) => dir.clone(),
            None => {
                let home = dirs::home_dir().ok_or(ConvertError::OutputDirUnresolved)?;
                home.join("Documents").join(OUTPUT_FOLDER_NAME)
            }
        };
        std::path::absolute(&dir)
            .map_err(|e| ConvertError::io("Failed to resolve output directory", e))
    }

    pub fn open_output_dir(&self) -> ConvertResult<()> {
        let output_dir = self.output_dir()?;
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| ConvertError::io("Failed to create output directory", e))?;

        let opener = self
            .opener
            .as_ref()
            .ok_or(ConvertError::UnsupportedPlatform(std::env::consts::OS))?;

        info!(dir = %output_dir.display(), opener = ?opener, "opening output directory");
        let status = Command::new(opener)
            .arg(&output_dir)
            .status()
            .map_err(|e| {
                ConvertError::io(format!("Failed to run {}", opener.to_string_lossy()), e)
            })?;

        // explorer exits with 1 even when the window opened
        if !status.success() && !cfg!(target_os = "windows") {
            return Err(ConvertError::OpenerFailed {
                path: output_dir,
                status: status.to_string(),
            });
        }
        Ok(())
    }

    /// GIFs in the output directory, newest first.
    pub fn recent_outputs(&self, limit: usize) -> ConvertResult<Vec<PathBuf>> {
        let output_dir = self.output_dir()?;
        if !output_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut gifs: Vec<(std::time::SystemTime, PathBuf)> = WalkDir::new(&output_dir)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("gif"))
                    .unwrap_or(false)
            })
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((modified, entry.into_path()))
            })
            .collect();

        gifs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(gifs.into_iter().take(limit).map(|(_, path)| path).collect())
    }
}

/// Removes the wrapped file when dropped.
struct StagedFile(PathBuf);

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.0.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(path = %self.0.display(), error = %e, "failed to remove staged file");
        }
    }
}

/// Keeps only the final path component of a user supplied name.
pub fn sanitize_file_name(file_name: &str) -> ConvertResult<String> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ConvertError::InvalidFileName(file_name.to_string()));
    }
    Ok(name.to_string())
}

pub fn ffmpeg_args(input: &Path, output: &Path, options: &GifConvertOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.push("-vf".into());
    args.push(options.filter_graph().into());
    args.push("-f".into());
    args.push("gif".into());
    args.push(output.as_os_str().to_owned());
    args
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
