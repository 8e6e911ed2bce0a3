use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use std::{env, io, process};
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use visage::analyzer::{AnalyzeOptions, TorchAnalyzer};
use visage::config::{Settings, DEFAULT_CONFIG_PATH};
use visage::server::{routes, AppContext};

const USAGE: &str = "usage: ./visage [config file]";

fn config_path() -> String {
    let mut args = env::args().skip(1);
    match (args.next(), args.next()) {
        (None, _) => DEFAULT_CONFIG_PATH.to_string(),
        (Some(path), None) => path,
        _ => {
            println!("{USAGE}");
            process::exit(1);
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let settings = Settings::load(&config_path()).expect("invalid configuration");

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
    let analyzer = TorchAnalyzer::new(&settings.model.path).expect("failed to load pipeline");
    let options = AnalyzeOptions {
        detector_backend: settings.model.detector,
        ..Default::default()
    };
    let context = web::Data::new(AppContext::new(Arc::new(analyzer), options));

    info!(
        "listening on {}:{}",
        settings.server.host, settings.server.port
    );

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(context.clone())
            .wrap(middleware::Logger::default())
            .service(routes::index)
            .service(routes::analyze)
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await
}
