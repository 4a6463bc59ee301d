use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use policypilot::api::middleware::ApiKeyAuth;
use policypilot::cli::{commands::{Cli, Commands}, run_cli};
use policypilot::config::AppConfig;
use policypilot::db;
use policypilot::rag::Assistant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            error!("{}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting PolicyPilot server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::get_connection(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let assistant = match Assistant::from_config(&config, db_pool.clone()) {
        Some(a) => a,
        None => {
            error!("Failed to initialize LLM provider '{}' from config", config.llm.provider);
            std::process::exit(1);
        }
    };

    if config.auth.api_keys.is_empty() {
        info!("No API keys configured, authentication disabled");
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(assistant.clone()))
            .route("/health", web::get().to(health))
            .wrap(ApiKeyAuth)
            .configure(policypilot::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
