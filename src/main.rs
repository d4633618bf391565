//! 常駐HTTPサーバーとしてのエントリポイント

use std::env;
use env_logger::Env;
use log::{error, info};

mod sample_handler;

#[actix_web::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let port = match env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse::<u16>() {
        Ok(p) => p,
        Err(e) => {
            error!("Error parsing PORT: {}", e);
            std::process::exit(1);
        }
    };
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    info!("Running legacy application as HTTP server on {}:{}", host, port);
    if let Err(e) = cgiwrap::server::run_server(sample_handler::legacy_app, &host, port).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
