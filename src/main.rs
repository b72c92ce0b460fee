use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use gif_converter::app::{install_cjk_fallback, GifConverterApp};
use gif_converter::backend::{GifBackend, LocalBackend};
use gif_converter::config::{AppConfig, Cli};
use gif_converter::engine::ConversionEngine;
use gif_converter::types::SelectedFile;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gif_converter=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from(&cli);
    let backend = Arc::new(LocalBackend::new(ConversionEngine::new(&config)));

    if cli.info || cli.print_output_dir || cli.open_output_dir || cli.video.is_some() {
        return run_headless(&cli, backend.as_ref());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 640.0])
            .with_min_inner_size([600.0, 400.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let result = eframe::run_native(
        "GIF Converter",
        options,
        Box::new(|cc| {
            install_cjk_fallback(&cc.egui_ctx);
            Ok(Box::new(GifConverterApp::new(backend)))
        }),
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "window failed");
            ExitCode::FAILURE
        }
    }
}

fn run_headless(cli: &Cli, backend: &dyn GifBackend) -> ExitCode {
    let result = (|| {
        if cli.info {
            print!("{}", backend.ffmpeg_info()?);
        }
        if cli.print_output_dir {
            println!("{}", backend.output_dir()?);
        }
        if let Some(video) = &cli.video {
            let file = SelectedFile::from_path(video)?;
            let bytes = file.read_bytes()?;
            println!("{}", backend.convert_uploaded_video_to_gif(&bytes, &file.name)?);
        }
        if cli.open_output_dir {
            backend.open_output_dir()?;
        }
        Ok::<_, gif_converter::error::ConvertError>(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
