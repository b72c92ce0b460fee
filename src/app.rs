use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use egui::{Color32, RichText, ScrollArea};
use tracing::{error, info, warn};

use crate::backend::GifBackend;
use crate::state::UiState;
use crate::types::{is_video, LogEntry, ProgressMessage, SelectedFile, VIDEO_EXTENSIONS};

const RECENT_LIMIT: usize = 5;

/// Fonts tried in order so the Japanese status text renders.
const CJK_FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "C:\\Windows\\Fonts\\meiryo.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
];

pub fn install_cjk_fallback(ctx: &egui::Context) {
    let Some((path, bytes)) = CJK_FONT_CANDIDATES
        .iter()
        .find_map(|path| std::fs::read(path).ok().map(|bytes| (*path, bytes)))
    else {
        warn!("no CJK font found, Japanese text may not render");
        return;
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts.families.entry(family).or_default().push("cjk".to_owned());
    }
    ctx.set_fonts(fonts);
    info!(font = path, "installed CJK fallback font");
}

pub struct GifConverterApp {
    backend: Arc<dyn GifBackend>,
    state: UiState,
    progress_rx: Option<Receiver<ProgressMessage>>,

    // Info panels
    ffmpeg_info: Option<String>,
    output_dir_info: Option<String>,
    recent_outputs: Vec<PathBuf>,

    // UI state
    is_drag_over: bool,
    log_entries: Vec<LogEntry>,
    scroll_to_bottom: bool,
}

impl GifConverterApp {
    pub fn new(backend: Arc<dyn GifBackend>) -> Self {
        let mut app = Self {
            backend,
            state: UiState::default(),
            progress_rx: None,
            ffmpeg_info: None,
            output_dir_info: None,
            recent_outputs: Vec::new(),
            is_drag_over: false,
            log_entries: Vec::new(),
            scroll_to_bottom: false,
        };

        match app.backend.ffmpeg_info() {
            Ok(_) => app.add_log(LogEntry::Info("ffmpeg found and ready.".to_string())),
            Err(e) => app.add_log(LogEntry::Error(e.to_string())),
        }
        app.refresh_recent_outputs();

        app
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    fn add_log(&mut self, entry: LogEntry) {
        self.log_entries.push(entry);
        self.scroll_to_bottom = true;
    }

    fn refresh_recent_outputs(&mut self) {
        match self.backend.recent_outputs(RECENT_LIMIT) {
            Ok(paths) => self.recent_outputs = paths,
            Err(e) => warn!(error = %e, "could not list recent outputs"),
        }
    }

    pub fn select_file(&mut self, file: SelectedFile) {
        let name = file.name.clone();
        let size = file.size_label();
        if self.state.select(file) {
            info!(file = %name, "file selected");
            self.add_log(LogEntry::Info(format!("Selected {} ({})", name, size)));
        }
    }

    /// Handles the first dropped file; the rest are ignored.
    pub fn handle_drop(&mut self, dropped: &[egui::DroppedFile]) {
        let Some(file) = dropped.first() else {
            return;
        };

        let name = if file.name.is_empty() {
            file.path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            file.name.clone()
        };

        if !is_video(&name, &file.mime) {
            warn!(file = %name, mime = %file.mime, "rejected non-video drop");
            if self.state.reject_drop() {
                self.add_log(LogEntry::Warning(format!("Not a video: {}", name)));
            }
            return;
        }

        let selected = match (&file.bytes, &file.path) {
            (Some(bytes), _) => Ok(SelectedFile::from_bytes(name, Arc::clone(bytes))),
            (None, Some(path)) => SelectedFile::from_path(path),
            (None, None) => {
                warn!(file = %name, "dropped file has neither bytes nor a path");
                self.add_log(LogEntry::Warning(format!("Could not read dropped file: {}", name)));
                return;
            }
        };

        match selected {
            Ok(selected) => self.select_file(selected),
            Err(e) => self.add_log(LogEntry::Error(e.to_string())),
        }
    }

    fn pick_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("動画ファイルを選択")
            .add_filter("Video", VIDEO_EXTENSIONS)
            .pick_file()
        else {
            return;
        };

        match SelectedFile::from_path(&path) {
            Ok(file) => self.select_file(file),
            Err(e) => self.add_log(LogEntry::Error(e.to_string())),
        }
    }

    pub fn start_conversion(&mut self) {
        let Some(file) = self.state.begin_conversion() else {
            return;
        };

        let (tx, rx) = channel();
        self.progress_rx = Some(rx);

        let backend = Arc::clone(&self.backend);
        info!(file = %file.name, "conversion started");
        self.add_log(LogEntry::Info(format!("Converting {}...", file.name)));

        thread::spawn(move || {
            let result = file
                .read_bytes()
                .and_then(|bytes| backend.convert_uploaded_video_to_gif(&bytes, &file.name));
            let msg = match result {
                Ok(output) => ProgressMessage::Completed { output },
                Err(e) => ProgressMessage::Failed {
                    error: e.to_string(),
                },
            };
            let _ = tx.send(msg);
        });
    }

    pub fn process_progress_messages(&mut self) {
        let Some(rx) = &self.progress_rx else {
            return;
        };

        let msg = match rx.try_recv() {
            Ok(msg) => msg,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => ProgressMessage::Failed {
                error: "conversion worker stopped unexpectedly".to_string(),
            },
        };
        self.progress_rx = None;

        match msg {
            ProgressMessage::Completed { output } => {
                info!(output = %output, "conversion completed");
                self.add_log(LogEntry::Success(format!("✓ {}", output)));
                self.state.finish_conversion(Ok(output));
                self.refresh_recent_outputs();
            }
            ProgressMessage::Failed { error } => {
                error!(error = %error, "conversion failed");
                self.add_log(LogEntry::Error(format!("✗ {}", error)));
                self.state.finish_conversion(Err(error));
            }
        }
    }

    pub fn check_ffmpeg_info(&mut self) {
        self.ffmpeg_info = Some(match self.backend.ffmpeg_info() {
            Ok(info) => info,
            Err(e) => format!("FFmpeg情報取得エラー: {}", e),
        });
    }

    pub fn load_output_dir_info(&mut self) {
        self.output_dir_info = Some(match self.backend.output_dir() {
            Ok(dir) => dir,
            Err(e) => format!("出力フォルダ情報取得エラー: {}", e),
        });
    }

    pub fn open_output_folder(&mut self) {
        if let Err(e) = self.backend.open_output_dir() {
            error!(error = %e, "failed to open output directory");
            let message = e.to_string();
            self.add_log(LogEntry::Error(message.clone()));
            self.state.open_folder_failed(&message);
        }
    }

    fn render_status_section(&mut self, ui: &mut egui::Ui) {
        let color = match &self.state {
            UiState::Failed { .. } => Color32::from_rgb(255, 100, 100),
            UiState::Done { .. } => Color32::from_rgb(100, 255, 100),
            _ => Color32::LIGHT_GRAY,
        };
        ui.label(RichText::new(self.state.status_text()).size(15.0).color(color));
    }

    fn render_input_section(&mut self, ui: &mut egui::Ui) {
        let drop_area = ui.allocate_response(
            egui::vec2(ui.available_width(), 120.0),
            egui::Sense::click(),
        );

        ui.painter().rect_filled(
            drop_area.rect,
            4.0,
            if self.is_drag_over || drop_area.hovered() {
                Color32::from_rgb(60, 60, 80)
            } else {
                Color32::from_rgb(40, 40, 60)
            },
        );

        ui.painter().rect_stroke(
            drop_area.rect,
            4.0,
            egui::Stroke::new(2.0, Color32::from_rgb(100, 100, 120)),
        );

        let text = match self.state.file() {
            Some(file) => format!("📁 {}\n{}", file.name, file.size_label()),
            None => "📁 動画ファイルをドラッグ&ドロップ\nまたは".to_string(),
        };

        ui.put(
            drop_area.rect,
            egui::Label::new(RichText::new(text).size(14.0).color(Color32::LIGHT_GRAY)),
        );

        ui.add_space(10.0);

        let label = if self.state.file().is_some() {
            "ファイルを変更"
        } else {
            "ファイルを選択"
        };
        if ui
            .add_enabled(!self.state.is_converting(), egui::Button::new(label))
            .clicked()
        {
            self.pick_file();
        }
    }

    fn render_controls_section(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let label = if self.state.is_converting() {
                "変換中..."
            } else {
                "GIFに変換"
            };
            if ui
                .add_enabled(self.state.can_convert(), egui::Button::new(label))
                .clicked()
            {
                self.start_conversion();
            }

            if ui.button("FFmpeg情報を確認").clicked() {
                self.check_ffmpeg_info();
            }

            if ui.button("出力フォルダを確認").clicked() {
                self.load_output_dir_info();
            }

            if ui.button("📁 出力フォルダを開く").clicked() {
                self.open_output_folder();
            }
        });

        if self.state.is_converting() {
            ui.add_space(5.0);
            ui.add(egui::Spinner::new());
        }

        if let Some(output) = self.state.output_path().map(str::to_owned) {
            ui.add_space(10.0);
            ui.label(format!("変換完了: {}", output));
            if ui.button("📁 出力フォルダを開く").clicked() {
                self.open_output_folder();
            }
        }
    }

    fn render_info_section(&mut self, ui: &mut egui::Ui) {
        if let Some(dir) = &self.output_dir_info {
            ui.group(|ui| {
                ui.strong("出力フォルダ:");
                ui.label(RichText::new(dir).small());
            });
        }

        if let Some(info) = &self.ffmpeg_info {
            ui.group(|ui| {
                ui.strong("FFmpeg情報:");
                ui.label(RichText::new(info).monospace().small());
            });
        }

        if !self.recent_outputs.is_empty() {
            ui.group(|ui| {
                ui.strong("Recent GIFs");
                for path in &self.recent_outputs {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    ui.label(RichText::new(name).small());
                }
            });
        }
    }

    fn render_log_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Log");
        ui.add_space(5.0);

        let scroll_area = ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true);

        scroll_area.show(ui, |ui| {
            for entry in &self.log_entries {
                let (color, text) = match entry {
                    LogEntry::Info(s) => (Color32::LIGHT_GRAY, s),
                    LogEntry::Success(s) => (Color32::from_rgb(100, 255, 100), s),
                    LogEntry::Error(s) => (Color32::from_rgb(255, 100, 100), s),
                    LogEntry::Warning(s) => (Color32::from_rgb(255, 200, 100), s),
                };

                ui.label(RichText::new(text).color(color).small());
            }

            if self.scroll_to_bottom {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                self.scroll_to_bottom = false;
            }
        });
    }
}

impl eframe::App for GifConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_progress_messages();

        let dropped = ctx.input(|i| {
            self.is_drag_over = !i.raw.hovered_files.is_empty();
            i.raw.dropped_files.clone()
        });
        if !dropped.is_empty() {
            self.handle_drop(&dropped);
        }

        // Request repaint while the worker is running
        if self.state.is_converting() {
            ctx.request_repaint();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(10.0);

            ui.group(|ui| {
                self.render_status_section(ui);
            });

            ui.add_space(10.0);

            ui.group(|ui| {
                self.render_input_section(ui);
            });

            ui.group(|ui| {
                self.render_controls_section(ui);
            });

            self.render_info_section(ui);

            ui.add_space(10.0);
            ui.separator();

            self.render_log_section(ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvertError, ConvertResult};
    use crate::state::{CONVERTING_MESSAGE, NOT_VIDEO_MESSAGE};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Backend that answers from canned results.
    struct ScriptedBackend {
        convert: Result<String, String>,
        open_fails: bool,
        calls: Mutex<Vec<(usize, String)>>,
    }

    impl ScriptedBackend {
        fn ok(output: &str) -> Self {
            Self {
                convert: Ok(output.to_string()),
                open_fails: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                convert: Err(message.to_string()),
                open_fails: true,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl GifBackend for ScriptedBackend {
        fn convert_uploaded_video_to_gif(&self, data: &[u8], file_name: &str) -> ConvertResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((data.len(), file_name.to_string()));
            self.convert.clone().map_err(ConvertError::InvalidOptions)
        }

        fn ffmpeg_info(&self) -> ConvertResult<String> {
            Err(ConvertError::ToolNotFound)
        }

        fn output_dir(&self) -> ConvertResult<String> {
            Ok("/home/me/Documents/GIF-Converter".to_string())
        }

        fn open_output_dir(&self) -> ConvertResult<()> {
            if self.open_fails {
                Err(ConvertError::UnsupportedPlatform("plan9"))
            } else {
                Ok(())
            }
        }
    }

    fn wait_until_idle(app: &mut GifConverterApp) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.state().is_converting() {
            assert!(Instant::now() < deadline, "conversion never finished");
            app.process_progress_messages();
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn dropped(name: &str, mime: &str, bytes: &[u8]) -> egui::DroppedFile {
        egui::DroppedFile {
            name: name.to_string(),
            mime: mime.to_string(),
            bytes: Some(Arc::from(bytes.to_vec())),
            ..Default::default()
        }
    }

    #[test]
    fn dropped_video_converts_and_shows_path() {
        let backend = Arc::new(ScriptedBackend::ok("/out/clip_20240101_120000.gif"));
        let mut app = GifConverterApp::new(backend.clone());

        app.handle_drop(&[dropped("clip.mp4", "video/mp4", &[7u8; 2048])]);
        assert_eq!(app.state().status_text(), "選択されたファイル: clip.mp4 (0.00 MB)");

        app.start_conversion();
        assert_eq!(app.state().status_text(), CONVERTING_MESSAGE);
        assert!(!app.state().can_convert());

        wait_until_idle(&mut app);
        assert_eq!(app.state().output_path(), Some("/out/clip_20240101_120000.gif"));
        assert_eq!(
            backend.calls.lock().unwrap().as_slice(),
            &[(2048, "clip.mp4".to_string())]
        );
    }

    #[test]
    fn failure_message_reaches_status() {
        let backend = Arc::new(ScriptedBackend::failing("unsupported format"));
        let mut app = GifConverterApp::new(backend);

        app.handle_drop(&[dropped("clip.webm", "", b"data")]);
        app.start_conversion();
        wait_until_idle(&mut app);

        let status = app.state().status_text();
        assert!(status.starts_with("変換エラー: "));
        assert!(status.contains("unsupported format"));
        assert!(app.state().can_convert());
    }

    #[test]
    fn non_video_drop_keeps_previous_file() {
        let mut app = GifConverterApp::new(Arc::new(ScriptedBackend::ok("x")));
        app.handle_drop(&[dropped("clip.mp4", "video/mp4", b"abc")]);
        app.handle_drop(&[dropped("readme.txt", "text/plain", b"hello")]);

        assert_eq!(app.state().status_text(), NOT_VIDEO_MESSAGE);
        assert_eq!(app.state().file().map(|f| f.name.as_str()), Some("clip.mp4"));
    }

    #[test]
    fn unreadable_drop_is_logged() {
        let mut app = GifConverterApp::new(Arc::new(ScriptedBackend::ok("x")));
        let before = app.log_entries.len();
        let empty = egui::DroppedFile {
            name: "clip.mp4".to_string(),
            mime: "video/mp4".to_string(),
            ..Default::default()
        };
        app.handle_drop(&[empty]);

        assert_eq!(app.state(), &UiState::Idle);
        assert_eq!(app.log_entries.len(), before + 1);
        assert!(matches!(
            app.log_entries.last(),
            Some(LogEntry::Warning(msg)) if msg.contains("clip.mp4")
        ));
    }

    #[test]
    fn info_panels_show_errors_in_place() {
        let mut app = GifConverterApp::new(Arc::new(ScriptedBackend::failing("x")));

        app.check_ffmpeg_info();
        assert!(app
            .ffmpeg_info
            .as_deref()
            .unwrap()
            .starts_with("FFmpeg情報取得エラー: "));

        app.load_output_dir_info();
        assert_eq!(
            app.output_dir_info.as_deref(),
            Some("/home/me/Documents/GIF-Converter")
        );

        app.open_output_folder();
        assert!(app
            .state()
            .status_text()
            .starts_with("フォルダを開けませんでした: "));
    }
}
