//! Model viewer
//!
//! Usage: `viewer [CONFIG]`. The configuration defaults to `viewer.toml` in the working
//! directory; built-in defaults apply when the file does not exist.
//!
//! Fatal errors are logged and the process still exits with status 0.

mod app;
mod movement;

use std::path::PathBuf;

use frame_engine::config::{AppConfig, Config};
use frame_engine::foundation::logging;

use crate::app::{AppResult, ViewerApp};

const DEFAULT_CONFIG_PATH: &str = "viewer.toml";

fn load_config() -> AppResult<AppConfig> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = AppConfig::load_or_default(&path)?;
    config.validate()?;
    Ok(config)
}

fn run(config: &AppConfig) -> AppResult<()> {
    let mut app = ViewerApp::new(config)?;
    app.run()
}

fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init(None);
            log::error!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(Some(&config.engine.log_level));

    log::info!("Starting {}", config.renderer.application_name);
    match run(&config) {
        Ok(()) => log::info!("Viewer closed"),
        Err(e) => log::error!("Fatal error: {e}"),
    }
}
