//! Entrypoint for the live webcam viewer

use anyhow::anyhow;
use std::sync::Arc;
use std::{env, process};
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use visage::analyzer::{AnalyzeOptions, TorchAnalyzer};
use visage::config::{Settings, DEFAULT_CONFIG_PATH};
use visage::viewer::{self, WebcamCapture};

const USAGE: &str = "usage: ./viewer [config file]";

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let path = match (args.next(), args.next()) {
        (None, _) => DEFAULT_CONFIG_PATH.to_string(),
        (Some(path), None) => path,
        _ => {
            println!("{USAGE}");
            process::exit(1);
        }
    };

    let settings = Settings::load(&path)?;
    let level = if settings.server.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    FmtSubscriber::builder().with_max_level(level).init();

    info!(
        "loading face-attribute pipeline from {}",
        settings.model.path.display()
    );
    let analyzer = Arc::new(TorchAnalyzer::new(&settings.model.path)?);
    let options = AnalyzeOptions {
        detector_backend: settings.model.detector,
        ..Default::default()
    };
    let camera = WebcamCapture::open(&settings.viewer)?;

    viewer::run(camera, analyzer, options).map_err(|e| anyhow!("viewer failed: {e}"))
}
