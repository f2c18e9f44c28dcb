use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use std::env;
use truthchain_backend::config::DetectorConfig;
use truthchain_backend::detector::preprocess::ImageTransform;
use truthchain_backend::detector::torch::TorchLoader;
use truthchain_backend::detector::{InferenceService, ModelHandle};
use truthchain_backend::routes::{configure_routes, cors};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = DetectorConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let transform = ImageTransform::from_config(&config.image);
    let handle = ModelHandle::new(TorchLoader::new(config.model.clone(), transform));
    let service = InferenceService::new(handle, config.image.max_upload_bytes);

    if config.server.eager_load {
        // A failed warm-up is retried by the first request.
        if let Err(e) = service.warm_up().await {
            log::error!("Failed to preload model at startup: {}", e);
        }
    } else {
        log::info!(
            "Model {} will be loaded on the first request",
            config.model.id
        );
    }

    let cors_origins = config.server.cors_origins.clone();
    let bind_address = (config.server.host.clone(), config.server.port);

    log::info!("Allowed origins: {:?}", cors_origins);
    log::info!("Starting server on {}:{}", bind_address.0, bind_address.1);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&cors_origins))
            .wrap(Logger::default())
            .app_data(web::Data::new(service.clone()))
            .configure(configure_routes)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server.bind(bind_address)?.run().await
}
