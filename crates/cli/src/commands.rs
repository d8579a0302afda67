//! Subcommands and their printable results.

use std::fmt;

use clap::Subcommand;
use client::ClientConfig;
use corelib::node::NodeId;
use corelib::registry::NodeRegistry;
use corelib::ring::Distribution;
use serde::Serialize;

/// Size of the u32 hash space.
const KEY_SPACE: f64 = 4_294_967_296.0;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the server each key routes to
    Route {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Show point counts and key-space share per server
    Ring,
    /// List the parsed servers
    Servers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEntry {
    pub key: String,
    pub hash: u32,
    pub server: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareEntry {
    pub server: String,
    pub weight: u32,
    pub points: usize,
    /// Fraction of the key space, 0.0 to 1.0.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEntry {
    pub id: usize,
    pub server: String,
    pub weight: u32,
    /// Identity string hashed onto the continuum.
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "result", rename_all = "snake_case")]
pub enum CommandResult {
    Route(Vec<RouteEntry>),
    Ring(Vec<ShareEntry>),
    Servers(Vec<ServerEntry>),
}

impl Command {
    pub fn execute(&self, config: &ClientConfig, registry: &NodeRegistry) -> CommandResult {
        match self {
            Command::Route { keys } => CommandResult::Route(route(config, registry, keys)),
            Command::Ring => CommandResult::Ring(shares(registry)),
            Command::Servers => CommandResult::Servers(
                registry
                    .nodes()
                    .into_iter()
                    .map(|node| ServerEntry {
                        id: node.id.0,
                        server: node.address(),
                        weight: node.weight,
                        identity: node.ketama_identity(),
                    })
                    .collect(),
            ),
        }
    }
}

fn route(config: &ClientConfig, registry: &NodeRegistry, keys: &[String]) -> Vec<RouteEntry> {
    keys.iter()
        .map(|key| {
            let full = config.prefixed(key);
            RouteEntry {
                key: key.clone(),
                hash: registry.hash_algorithm().hash(&full),
                server: registry
                    .route(&full, |_| true)
                    .and_then(|id| registry.node(id))
                    .map(|node| node.address()),
            }
        })
        .collect()
}

fn shares(registry: &NodeRegistry) -> Vec<ShareEntry> {
    let nodes = registry.nodes();
    let locator = registry.locator();

    match (registry.distribution(), locator.as_ketama()) {
        (Distribution::Ketama, Some(ring)) => {
            let owned = ring.ownership();
            let points = ring.points();
            nodes
                .iter()
                .map(|node| ShareEntry {
                    server: node.address(),
                    weight: node.weight,
                    points: points.iter().filter(|p| p.node_id == node.id).count(),
                    share: owned.get(&node.id).copied().unwrap_or(0) as f64 / KEY_SPACE,
                })
                .collect()
        }
        _ => nodes
            .iter()
            .map(|node| ShareEntry {
                server: node.address(),
                weight: node.weight,
                points: 0,
                share: 1.0 / nodes.len() as f64,
            })
            .collect(),
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Route(entries) => {
                for e in entries {
                    let server = e.server.as_deref().unwrap_or("<none>");
                    writeln!(f, "{:<32} {:>10}  {}", e.key, e.hash, server)?;
                }
            }
            CommandResult::Ring(entries) => {
                writeln!(f, "{:<28} {:>6} {:>7} {:>8}", "SERVER", "WEIGHT", "POINTS", "SHARE")?;
                for e in entries {
                    writeln!(
                        f,
                        "{:<28} {:>6} {:>7} {:>7.2}%",
                        e.server,
                        e.weight,
                        e.points,
                        e.share * 100.0
                    )?;
                }
            }
            CommandResult::Servers(entries) => {
                for e in entries {
                    writeln!(
                        f,
                        "{} {} weight={} identity={}",
                        NodeId(e.id),
                        e.server,
                        e.weight,
                        e.identity
                    )?;
                }
            }
        }
        Ok(())
    }
}
