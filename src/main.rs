#![cfg(not(tarpaulin_include))]

use picknik_forms::{Config, app};

/// Main entry point for the form relay server
///
/// Loads a `.env` file when present, reads the configuration from the
/// environment and serves until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    app::run(config).await
}
