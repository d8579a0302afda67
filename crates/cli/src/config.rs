//! Command-line arguments and client configuration assembly.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use client::{ClientConfig, ServerList};
use corelib::registry::NodeRegistry;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

#[derive(Debug, Parser)]
#[command(name = "ketama-cli", version, about = "Inspect ketama rings for cache clusters")]
pub struct CliConfig {
    /// Server list, e.g. "10.0.0.1:11211 10.0.0.2:11211:2"
    #[arg(short, long)]
    pub servers: Option<String>,

    /// Client option as key=value; may be repeated
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// JSON file with an object of client options
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(self) -> anyhow::Result<()> {
        self.init_tracing();

        let config = self.client_config()?;
        let registry = NodeRegistry::new(
            config.nodes()?,
            config.distribution,
            config.hash,
            config.failure_mode,
        )?;
        tracing::debug!(
            servers = registry.len(),
            distribution = %registry.distribution(),
            hash = %registry.hash_algorithm(),
            failure_mode = ?registry.failure_mode(),
            "built ring"
        );

        let result = self.command.execute(&config, &registry);
        tracing::trace!(command = ?self.command, "command executed");
        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print!("{}", result);
        }
        Ok(())
    }

    fn init_tracing(&self) {
        let default = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }

    /// Merge the config file, `--option` flags and `--servers`, in that
    /// order of increasing precedence.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut options = HashMap::new();
        let mut servers = ServerList::default();

        if let Some(path) = &self.config {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let (file_servers, file_options) = parse_config_file(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            if let Some(list) = file_servers {
                servers = list;
            }
            options.extend(file_options);
        }

        for pair in &self.options {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("option {:?} is not KEY=VALUE", pair))?;
            options.insert(key.trim().to_string(), value.trim().to_string());
        }

        if let Some(list) = &self.servers {
            servers = ServerList::from(list.as_str());
        }

        Ok(ClientConfig::from_options(servers, &options)?)
    }
}

/// Split a JSON options object into its server list and stringified options.
fn parse_config_file(text: &str) -> anyhow::Result<(Option<ServerList>, HashMap<String, String>)> {
    let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
        bail!("expected a JSON object of options");
    };

    let mut servers = None;
    let mut options = HashMap::new();
    for (key, value) in map {
        if key == "servers" {
            servers = Some(serde_json::from_value(value)?);
            continue;
        }
        let value = match value {
            Value::String(s) => s,
            Value::Null => continue,
            other => other.to_string(),
        };
        options.insert(key, value);
    }
    Ok((servers, options))
}
