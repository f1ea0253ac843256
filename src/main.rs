#[macro_use]
extern crate rocket;

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use rocket::{
    figment::{
        providers::{Format, Toml},
        Figment, Profile,
    },
    Config,
};

use shotcache::config::AppConfig;
use shotcache::pipeline::ScreenshotService;

#[launch]
async fn rocket() -> _ {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let mut figment = Figment::from(Config::default())
        .merge(Toml::file("App.toml").nested());

    for (var, key) in [
        ("RASTERIZER_URL", "rasterizer_url"),
        ("RASTERIZER_RESTART_COMMAND", "rasterizer_restart_command"),
        ("CACHE_DIR", "cache_dir"),
    ] {
        if let Ok(value) = env::var(var) {
            figment = figment.merge((key, value));
        }
    }

    if let Ok(value) = env::var("USE_CORS") {
        let enabled = matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        figment = figment.merge(("use_cors", enabled));
    }

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    let config = match figment.extract::<AppConfig>() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded successfully");

    let service = match ScreenshotService::from_config(&config).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };
    info!("Cache directory: {}", config.cache_dir.display());

    info!(
        "Starting screenshot service on {}:{}",
        config.address, config.port
    );

    shotcache::build_rocket(figment, config, Arc::new(service))
}
