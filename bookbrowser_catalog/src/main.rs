use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookbrowser_catalog::app_config::config_app;
use bookbrowser_catalog::book_service::BookService;
use bookbrowser_catalog::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
};
use bookbrowser_catalog::settings::Settings;

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry() -> anyhow::Result<()> {
    let app_name = "bookbrowser_catalog";

    global::set_text_map_propagator(TraceContextPropagator::new());
    #[allow(deprecated)]
    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(app_name)
        .install_batch(TokioCurrentThread)
        .context("Failed to install OpenTelemetry tracer")?;

    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install `tracing` subscriber")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry()?;
    let settings = Settings::from_env().context("Failed to read settings")?;
    tracing::info!("starting HTTP server at http://localhost:{}", settings.port);

    let books_repository: Arc<dyn BookRepository> = if settings.use_in_memory_db {
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(
            PostgresBooksRepository::init(settings.postgres_config())
                .await
                .context("Failed to init postgres")?,
        )
    };
    let book_service = web::Data::new(BookService::new(books_repository));

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(book_service.clone())
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind(("0.0.0.0", settings.port))?
    .run()
    .await
    .context("HTTP server failed")
}
