//! Drives the engine against a shell script standing in for ffmpeg.
//! Everything runs in one test so no other thread forks while the
//! script is still open for writing.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gif_converter::backend::{GifBackend, LocalBackend};
use gif_converter::config::AppConfig;
use gif_converter::engine::ConversionEngine;
use gif_converter::error::ConvertError;
use gif_converter::types::{Dimension, GifConvertOptions};

const STUB: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
    echo "ffmpeg version 6.1-stub Copyright (c) 2000-2023"
    echo "built with stub"
    exit 0
fi
for arg in "$@"; do
    out="$arg"
    case "$arg" in
        *fps=*) echo "$arg" > "$STUB_FILTER_LOG" ;;
    esac
done
if grep -q BROKEN "$6" 2>/dev/null; then
    echo "Invalid data found when processing input" >&2
    printf 'partial' > "$out"
    exit 1
fi
if grep -q SLOW "$6" 2>/dev/null; then
    sleep 1
fi
printf 'GIF89a' > "$out"
cat "$6" >> "$out"
"#;

fn write_stub(dir: &Path) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(&path, STUB).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn config(dir: &Path, ffmpeg: PathBuf) -> AppConfig {
    AppConfig {
        ffmpeg_path: Some(ffmpeg),
        output_dir: Some(dir.join("out")),
        staging_dir: Some(dir.join("staging")),
        options: GifConvertOptions::default(),
    }
}

fn staging_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir.join("staging"))
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[test]
fn converts_through_stub_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let filter_log = dir.path().join("filter.log");
    std::env::set_var("STUB_FILTER_LOG", &filter_log);

    let ffmpeg = write_stub(dir.path());
    let engine = ConversionEngine::new(&config(dir.path(), ffmpeg.clone()));
    assert!(engine.is_available());

    // tool info
    let info = engine.ffmpeg_info().unwrap();
    assert!(info.contains(&format!("FFmpeg path: {}", ffmpeg.display())));
    assert!(info.contains("Status: File exists"));
    assert!(info.contains("Version: ffmpeg version 6.1-stub"));
    assert!(!info.contains("built with stub"));

    // upload conversion lands inside the output directory
    let backend = LocalBackend::new(engine);
    let output = backend
        .convert_uploaded_video_to_gif(b"not really a video", "holiday clip.mp4")
        .unwrap();
    let output_path = PathBuf::from(&output);
    let out_dir = PathBuf::from(backend.output_dir().unwrap());
    assert!(!output.is_empty());
    assert!(output_path.is_absolute());
    assert!(output_path.starts_with(&out_dir));
    let name = output_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("holiday clip_"));
    assert!(name.ends_with(".gif"));
    assert_eq!(
        std::fs::read(&output_path).unwrap(),
        b"GIF89anot really a video"
    );
    assert_eq!(
        std::fs::read_to_string(&filter_log).unwrap().trim(),
        "fps=10,scale=-1:-1:flags=lanczos"
    );
    assert!(staging_is_empty(dir.path()));

    let recent = backend.recent_outputs(5).unwrap();
    assert_eq!(recent.len(), 1);

    // overlapping uploads with the same name keep their own bytes
    let (first, second) = std::thread::scope(|scope| {
        let a = scope.spawn(|| backend.convert_uploaded_video_to_gif(b"SLOW-AAAA", "clip.mp4"));
        let b = scope.spawn(|| backend.convert_uploaded_video_to_gif(b"SLOW-BBBB", "clip.mp4"));
        (a.join().unwrap(), b.join().unwrap())
    });
    let first = PathBuf::from(first.unwrap());
    let second = PathBuf::from(second.unwrap());
    assert_ne!(first, second);
    assert_eq!(std::fs::read(&first).unwrap(), b"GIF89aSLOW-AAAA");
    assert_eq!(std::fs::read(&second).unwrap(), b"GIF89aSLOW-BBBB");
    assert!(staging_is_empty(dir.path()));
    assert_eq!(backend.recent_outputs(5).unwrap().len(), 3);

    // ffmpeg failure keeps stderr and cleans up
    let err = backend
        .convert_uploaded_video_to_gif(b"BROKEN", "bad.mov")
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Invalid data found when processing input"));
    assert!(message.contains(&ffmpeg.display().to_string()));
    assert!(staging_is_empty(dir.path()));
    assert_eq!(backend.recent_outputs(5).unwrap().len(), 3);

    // on-disk conversion with explicit options
    let source = dir.path().join("source.mkv");
    std::fs::write(&source, b"frames").unwrap();
    let options = GifConvertOptions {
        fps: 24,
        width: Dimension::Pixels(320),
        height: Dimension::Auto,
        quality: "bicubic".to_string(),
    };
    let gif = backend.engine().convert_video_to_gif(&source, &options).unwrap();
    assert!(gif.starts_with(&out_dir));
    assert!(source.exists());
    assert!(!dir.path().join("source.gif").exists());
    assert_eq!(
        std::fs::read_to_string(&filter_log).unwrap().trim(),
        "fps=24,scale=320:-1:flags=bicubic"
    );

    // invalid options never reach ffmpeg
    let bad = GifConvertOptions {
        fps: 0,
        ..Default::default()
    };
    assert!(matches!(
        backend.engine().convert_video_to_gif(&source, &bad),
        Err(ConvertError::InvalidOptions(_))
    ));
}
