// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{crate_version, Parser};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use scroll_press::Configuration;
use serde::Serialize;

const CONFIG_FILE_NAME: &str = "config.toml";

type ConfigFilePath = Option<PathBuf>;

/// Get configuration from 1. .toml file, 2. environment variables and 3. command line arguments
/// (in that order, meaning that later configuration sources take precedence over the earlier
/// ones).
pub fn load_config() -> Result<(ConfigFilePath, Configuration)> {
    // Parse command line arguments first to get optional config file path
    let cli = Cli::parse();

    // Determine if a config file path was provided or if we should look for it in common
    // locations
    let config_file_path: ConfigFilePath = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file '{}' does not exist", path.display());
            }

            Some(path.clone())
        }
        None => try_determine_config_file_path(),
    };

    let mut figment = Figment::new();
    if let Some(path) = &config_file_path {
        figment = figment.merge(Toml::file(path));
    }

    let config = figment
        .merge(Env::prefixed("SCROLL_PRESS_").split("__"))
        .merge(Serialized::defaults(cli))
        .extract()?;

    Ok((config_file_path, config))
}

/// Configuration derived from command line arguments.
///
/// All arguments are optional and don't get serialized to Figment when they're None. This is to
/// assure that default values do not overwrite all previous settings, especially when they
/// haven't been set.
#[derive(Parser, Serialize, Debug)]
#[command(
    name = "scroll-press",
    about = "Publishing server for scholarly HTML scrolls",
    long_about = None,
    version = crate_version!()
)]
struct Cli {
    /// Path to an optional "config.toml" file for further configuration.
    ///
    /// When not set the program will try to find a `config.toml` file in the same folder the
    /// program is executed in and otherwise in the regarding operating systems XDG config
    /// directory ("$HOME/.config/scroll-press/config.toml" on Linux).
    #[arg(short = 'c', long, value_name = "PATH")]
    #[serde(skip_serializing)]
    config: Option<PathBuf>,

    /// URL / connection string to PostgreSQL or SQLite database. Defaults to an in-memory
    /// SQLite database.
    ///
    /// WARNING: By default the server will not persist anything after shutdown. Set a database
    /// connection url for production settings to not loose data.
    #[arg(short = 'd', long, value_name = "CONNECTION_STRING")]
    #[serde(skip_serializing_if = "Option::is_none")]
    database_url: Option<String>,

    /// HTTP port serving the web application. Defaults to 8000.
    #[arg(short = 'p', long, value_name = "PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    http_port: Option<u16>,

    /// Public base URL of this deployment, used in links embedded into emails.
    #[arg(short = 'b', long, value_name = "URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,

    /// Number of concurrent workers for DOI registrations.
    #[arg(long, value_name = "NUM")]
    #[serde(skip_serializing_if = "Option::is_none")]
    worker_pool_size: Option<u32>,
}

/// Checks common locations for a "config.toml" file.
fn try_determine_config_file_path() -> ConfigFilePath {
    let current_dir = std::env::current_dir().ok()?;
    let current_candidate = current_dir.join(CONFIG_FILE_NAME);
    if current_candidate.exists() {
        return Some(current_candidate);
    }

    let project_dirs = ProjectDirs::from("", "", "scroll-press")?;
    let xdg_candidate = project_dirs.config_dir().join(CONFIG_FILE_NAME);
    if xdg_candidate.exists() {
        return Some(xdg_candidate);
    }

    None
}
