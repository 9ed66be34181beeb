use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use authgate_server::{configure_routes, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cors_layer(settings: &Settings) -> Cors {
    if !settings.cors.enabled {
        return Cors::default();
    }

    let cors = if settings.cors.allow_any_origin {
        Cors::default().allow_any_origin()
    } else {
        Cors::default()
    };

    cors.allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec!["Authorization", "Content-Type"])
        .max_age(settings.cors.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    info!("Configuration loaded for environment {}", config.environment);

    let state = AppState::new(config.clone())
        .await
        .context("failed to initialize application state")?;
    let data = web::Data::new(state.clone());

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
        .with_context(|| format!("failed to bind {}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let settings = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(data.gate())
            .wrap(cors_layer(&settings))
            .app_data(data.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    state.shutdown().await?;
    info!("Server stopped");
    Ok(())
}
