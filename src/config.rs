// Tool configuration
//
// Loaded from a TOML file (default /etc/nodres/config.toml, or
// NODRES_CONFIG), with compiled-in defaults matching the production
// pool. NODRES_TESTING redirects everything at a local store and makes
// the invoking user an admin, for exercising the tool end to end
// without touching the shared database.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::topology::{Cluster, Topology};

pub const CONFIG_ENV: &str = "NODRES_CONFIG";
pub const TESTING_ENV: &str = "NODRES_TESTING";

const DEFAULT_CONFIG_PATH: &str = "/etc/nodres/config.toml";
const DEFAULT_STORE_PATH: &str = "/usr/local/nodres/db/leases.json";
const DEFAULT_HOOK_PATH: &str = "/usr/local/bin/run-script";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// One cluster entry in the config file. A numbered cluster sets
/// `prefix` and `max_nodes`; a named cluster lists `members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_pad_width")]
    pub pad_width: usize,
    #[serde(default)]
    pub max_nodes: Option<u32>,
    #[serde(default)]
    pub members: Vec<String>,
}

fn default_pad_width() -> usize {
    3
}

impl ClusterConfig {
    fn to_cluster(&self) -> Cluster {
        match (&self.prefix, self.max_nodes) {
            (Some(prefix), Some(max_nodes)) => {
                Cluster::numbered(&self.name, prefix, self.pad_width, max_nodes)
            }
            _ => Cluster::named(
                &self.name,
                &self.members.iter().map(String::as_str).collect::<Vec<_>>(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path of the persistent lease store.
    pub store_path: PathBuf,
    /// Optional script run once per successful acquire/release with the
    /// affected node ids as arguments. Skipped when absent on disk.
    pub hook_path: Option<PathBuf>,
    /// Users allowed to permalock and force-unlock.
    pub admins: Vec<String>,
    pub clusters: Vec<ClusterConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            hook_path: Some(PathBuf::from(DEFAULT_HOOK_PATH)),
            admins: Vec::new(),
            clusters: vec![
                ClusterConfig {
                    name: "atom".to_string(),
                    prefix: Some("atom".to_string()),
                    pad_width: 3,
                    max_nodes: Some(132),
                    members: Vec::new(),
                },
                ClusterConfig {
                    name: "misc".to_string(),
                    prefix: None,
                    pad_width: 3,
                    max_nodes: None,
                    members: vec!["mmatom".to_string()],
                },
            ],
        }
    }
}

impl Config {
    /// Load the config, preferring `explicit`, then `NODRES_CONFIG`,
    /// then the default path. A missing default config falls back to
    /// the compiled-in defaults; an explicitly named file must exist.
    /// `NODRES_TESTING` is applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let path = explicit
            .map(Path::to_path_buf)
            .or(env_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let required = explicit.is_some() || env::var_os(CONFIG_ENV).is_some();
        let mut config = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound && !required => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        if env::var_os(TESTING_ENV).is_some() {
            config.apply_test_mode(&whoami::username());
        }
        Ok(config)
    }

    /// Point the tool at a local store and make `user` an admin.
    pub fn apply_test_mode(&mut self, user: &str) {
        self.store_path = PathBuf::from("./db/leases.json");
        self.hook_path = Some(PathBuf::from("/tmp/cleanup-hosts"));
        self.admins = vec![user.to_string()];
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|a| a == user)
    }

    pub fn topology(&self) -> Topology {
        Topology::new(self.clusters.iter().map(ClusterConfig::to_cluster).collect())
    }
}
