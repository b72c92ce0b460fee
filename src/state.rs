//! Window state as one value. Every combination the UI can show is a
//! variant, so "converting without a file" cannot be represented.

use crate::types::SelectedFile;

pub const PROMPT_MESSAGE: &str = "動画ファイルを選択してGIFに変換してください 👇";
pub const NOT_VIDEO_MESSAGE: &str = "動画ファイルを選択してください";
pub const NO_FILE_MESSAGE: &str = "ファイルを選択してください";
pub const CONVERTING_MESSAGE: &str = "変換中です。しばらくお待ちください...";

#[derive(Clone, Debug, PartialEq, Default)]
pub enum UiState {
    #[default]
    Idle,
    Selected(SelectedFile),
    Converting(SelectedFile),
    Done {
        file: SelectedFile,
        output: String,
    },
    Failed {
        file: Option<SelectedFile>,
        message: String,
    },
}

impl UiState {
    pub fn file(&self) -> Option<&SelectedFile> {
        match self {
            UiState::Idle => None,
            UiState::Selected(file) | UiState::Converting(file) => Some(file),
            UiState::Done { file, .. } => Some(file),
            UiState::Failed { file, .. } => file.as_ref(),
        }
    }

    pub fn is_converting(&self) -> bool {
        matches!(self, UiState::Converting(_))
    }

    pub fn can_convert(&self) -> bool {
        self.file().is_some() && !self.is_converting()
    }

    pub fn output_path(&self) -> Option<&str> {
        match self {
            UiState::Done { output, .. } => Some(output.as_str()),
            _ => None,
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            UiState::Idle => PROMPT_MESSAGE.to_string(),
            UiState::Selected(file) => format!(
                "選択されたファイル: {} ({})",
                file.name,
                file.size_label()
            ),
            UiState::Converting(_) => CONVERTING_MESSAGE.to_string(),
            UiState::Done { output, .. } => format!("変換完了！\n出力ファイル: {}", output),
            UiState::Failed { message, .. } => message.clone(),
        }
    }

    /// Returns false when the selection was ignored because a conversion
    /// is running.
    pub fn select(&mut self, file: SelectedFile) -> bool {
        if self.is_converting() {
            return false;
        }
        *self = UiState::Selected(file);
        true
    }

    /// A drop of something that is not a video keeps the current file.
    pub fn reject_drop(&mut self) -> bool {
        if self.is_converting() {
            return false;
        }
        let file = self.file().cloned();
        *self = UiState::Failed {
            file,
            message: NOT_VIDEO_MESSAGE.to_string(),
        };
        true
    }

    /// Moves into `Converting` and hands back the file to convert.
    pub fn begin_conversion(&mut self) -> Option<SelectedFile> {
        if self.is_converting() {
            return None;
        }
        match self.file().cloned() {
            Some(file) => {
                *self = UiState::Converting(file.clone());
                Some(file)
            }
            None => {
                *self = UiState::Failed {
                    file: None,
                    message: NO_FILE_MESSAGE.to_string(),
                };
                None
            }
        }
    }

    pub fn finish_conversion(&mut self, result: Result<String, String>) {
        if !self.is_converting() {
            return;
        }
        let UiState::Converting(file) = std::mem::take(self) else {
            return;
        };
        *self = match result {
            Ok(output) => UiState::Done { file, output },
            Err(error) => UiState::Failed {
                file: Some(file),
                message: format!("変換エラー: {}", error),
            },
        };
    }

    pub fn open_folder_failed(&mut self, error: &str) {
        if self.is_converting() {
            return;
        }
        let file = self.file().cloned();
        *self = UiState::Failed {
            file,
            message: format!("フォルダを開けませんでした: {}", error),
        };
    }
}
