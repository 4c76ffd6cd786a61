// SPDX-License-Identifier: AGPL-3.0-or-later

mod config;

use log::info;
use scroll_press::Press;

use crate::config::load_config;

#[tokio::main]
async fn main() {
    env_logger::init();

    // Load configuration from file, environment variables and command line arguments
    let (config_file_path, config) = load_config().expect("Could not load configuration");

    match &config_file_path {
        Some(path) => info!("Loading configuration from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    // Start the Scroll Press server in async runtime
    let press = Press::start(config).await;

    // Run this until [CTRL] + [C] got pressed or something went wrong
    tokio::select! {
        _ = tokio::signal::ctrl_c() => (),
        _ = press.on_exit() => (),
    }

    // Wait until all tasks are gracefully shut down and exit
    press.shutdown().await;
}
