#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod config;
pub mod cors;
pub mod delivery;
pub mod images;
pub mod models;
pub mod pipeline;
pub mod render;

use std::sync::Arc;

use log::warn;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::{Build, Rocket};

use config::AppConfig;
use cors::CORS;
use pipeline::ScreenshotService;

/// Assembles the Rocket instance shared by `main` and the route tests.
pub fn build_rocket(figment: Figment, config: AppConfig, service: Arc<ScreenshotService>) -> Rocket<Build> {
    let mut rocket = rocket::custom(figment)
        .attach(CORS::new(config.use_cors))
        .manage(service)
        .mount(
            "/",
            routes![api::screenshot::screenshot, api::screenshot::legacy_redirect],
        );

    if config.public_dir.is_dir() {
        rocket = rocket.mount("/", FileServer::from(&config.public_dir));
    } else {
        warn!(
            "Public directory {} not found, usage page will not be served",
            config.public_dir.display()
        );
    }

    rocket
}
