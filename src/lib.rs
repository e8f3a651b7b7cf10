use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use chrono::Local;
use regex::Regex;
use tracing::{debug, warn};

pub mod cli;
pub mod config;
pub mod leases;
pub mod lockfile;
pub mod status;
pub mod timeparse;
pub mod topology;

pub use cli::{Cli, Commands};
pub use config::Config;

use leases::{lock_group_owner, Expiration, LeaseEngine, LeaseStore, NotifyHook};
use lockfile::StoreLock;
use timeparse::parse_expiration;
use topology::{ClusterKind, Topology};

// Bare numeric ranges in status queries ("1-10", "1..20") default onto
// the first numbered cluster.
static STATUS_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D*)\d+(?:-|\.\.)\d+$").expect("invalid status pattern"));

/// One invocation of the reservation tool: holds the config and the
/// topology, and drives the lock -> load -> sweep -> operation -> save
/// cycle for each command.
pub struct Nodres {
    config: Config,
    topology: Topology,
}

impl Nodres {
    pub fn new(config: Config) -> Self {
        let topology = config.topology();
        Self { config, topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Run one command as `user` and return the rendered output.
    /// Conflict and validation failures come back as errors with every
    /// offending id enumerated; nothing is persisted for them beyond
    /// the sweep.
    pub fn run(&self, command: &Commands, user: &str) -> Result<String> {
        match command {
            Commands::Status { list, cluster } => self.status(*list, cluster.as_deref()),
            Commands::Lease { time, ids, message } => self.lease(user, time, ids, message),
            Commands::Unlease { ids } => self.unlease(user, ids),
            Commands::Permalock { ids, message } => {
                self.require_admin(user)?;
                self.permalock(ids, message)
            }
            Commands::Unlock { ids } => {
                self.require_admin(user)?;
                self.unlock(user, ids)
            }
        }
    }

    fn require_admin(&self, user: &str) -> Result<()> {
        if self.config.is_admin(user) {
            Ok(())
        } else {
            Err(anyhow!("user {user} is not an administrator"))
        }
    }

    /// The critical section: every command, status included, serializes
    /// through the store lock so sweep effects are never lost. The
    /// store is saved even when the operation fails, persisting the
    /// sweep; a failed save degrades to a warning.
    fn with_engine<F>(&self, f: F) -> Result<String>
    where
        F: FnOnce(&mut LeaseEngine<'_>) -> Result<String>,
    {
        let _lock = StoreLock::acquire(&self.config.store_path)?;
        let store = LeaseStore::load(&self.config.store_path);

        let hook_path = self.config.hook_path.clone();
        let hook: NotifyHook<'_> = Box::new(move |ids| run_host_hook(hook_path.as_deref(), ids));
        let mut engine = LeaseEngine::new(&self.topology, store).with_notify(hook);
        engine.sweep(Local::now());

        let result = f(&mut engine);

        if let Err(err) = engine.into_store().save(&self.config.store_path) {
            warn!(%err, "unable to persist lease store; this request will be forgotten");
        }
        result
    }

    fn lease(&self, user: &str, time: &str, id_exprs: &[String], message: &str) -> Result<String> {
        self.with_engine(|engine| {
            let expiration = parse_expiration(time, Local::now())?;
            let resolution = self.topology.resolve_all(id_exprs);
            for warning in &resolution.warnings {
                warn!("{warning}");
            }
            let acquired =
                engine.acquire(&resolution.ids, user, Expiration::Timestamp(expiration), message)?;
            Ok(format!("ACQUIRED: {}", acquired.join(" ")))
        })
    }

    fn unlease(&self, user: &str, id_exprs: &[String]) -> Result<String> {
        self.with_engine(|engine| {
            let mut targets = self.topology.resolve_all(id_exprs).ids;
            if targets.is_empty() {
                // No ids means "everything I own".
                targets.push(user.to_string());
            }
            let released = engine.release(&targets, user, false)?;
            Ok(format!("FREED: {}", released.join(" ")))
        })
    }

    fn permalock(&self, id_exprs: &[String], message: &str) -> Result<String> {
        self.with_engine(|engine| {
            let owner = lock_group_owner(engine.next_group_id());
            let resolution = self.topology.resolve_all(id_exprs);
            for warning in &resolution.warnings {
                warn!("{warning}");
            }
            let locked = engine.acquire(&resolution.ids, &owner, Expiration::Permanent, message)?;
            Ok(format!("LOCKED ({owner}): {}", locked.join(" ")))
        })
    }

    fn unlock(&self, user: &str, id_exprs: &[String]) -> Result<String> {
        self.with_engine(|engine| {
            let targets = self.topology.resolve_all(id_exprs).ids;
            let released = engine.release(&targets, user, true)?;
            Ok(format!("FREED: {}", released.join(" ")))
        })
    }

    fn status(&self, list_mode: bool, cluster_arg: Option<&str>) -> Result<String> {
        let sections = self.status_sections(cluster_arg)?;
        let width = terminal_width();
        self.with_engine(|engine| {
            let mut out = String::new();
            for (title, members) in &sections {
                out.push_str(title);
                out.push_str(":\n");
                out.push_str(&"=".repeat(title.len() + 1));
                out.push('\n');
                let body = if list_mode {
                    status::render_list(members, engine.store())
                } else {
                    status::render_compact(members, engine.store(), width)
                };
                out.push_str(&body);
                out.push('\n');
            }
            Ok(out.trim_end().to_string())
        })
    }

    /// Work out which nodes a status query covers: every cluster by
    /// default, one cluster by name, or an explicit node range
    /// (optionally without a prefix, defaulting onto the first numbered
    /// cluster).
    fn status_sections(&self, cluster_arg: Option<&str>) -> Result<Vec<(String, Vec<String>)>> {
        let Some(arg) = cluster_arg else {
            return Ok(self
                .topology
                .clusters()
                .iter()
                .map(|c| (format!("{} nodes", c.name), c.members()))
                .collect());
        };
        let arg = arg.to_lowercase();

        if STATUS_RANGE_RE.is_match(&arg) {
            let expr = if arg.starts_with(|c: char| c.is_ascii_digit()) {
                let prefix = self
                    .default_numbered_prefix()
                    .ok_or_else(|| anyhow!("no numbered cluster to apply range {arg} to"))?;
                format!("{prefix}{arg}")
            } else {
                arg.clone()
            };
            let resolution = self.topology.resolve_range(&expr);
            for warning in &resolution.warnings {
                warn!("{warning}");
            }
            return Ok(vec![(format!("{arg} nodes"), resolution.ids)]);
        }

        match self.topology.cluster(&arg) {
            Some(cluster) => Ok(vec![(format!("{} nodes", cluster.name), cluster.members())]),
            None => Err(anyhow!("no cluster named {arg}")),
        }
    }

    fn default_numbered_prefix(&self) -> Option<&str> {
        self.topology.clusters().iter().find_map(|c| match &c.kind {
            ClusterKind::Numbered { prefix, .. } => Some(prefix.as_str()),
            ClusterKind::Named { .. } => None,
        })
    }
}

fn terminal_width() -> usize {
    match crossterm::terminal::size() {
        Ok((width, _)) => usize::from(width),
        Err(_) => 80,
    }
}

/// Run the configured notification script with the affected ids. A
/// missing script is skipped; a failing one is logged and ignored, the
/// reservation change stands either way.
fn run_host_hook(path: Option<&Path>, ids: &[String]) {
    let Some(path) = path else {
        return;
    };
    if !path.exists() {
        debug!(path = %path.display(), "no host hook installed, skipping");
        return;
    }
    match Command::new(path).args(ids).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(path = %path.display(), %status, "host hook failed"),
        Err(err) => warn!(path = %path.display(), %err, "unable to run host hook"),
    }
}
