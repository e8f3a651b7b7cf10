// Cluster topology and node identifier resolution
//
// A topology is an ordered set of named clusters partitioning the node
// pool. Numbered clusters render identifiers through a canonical
// zero-padded template (e.g. "atom%03d"); named clusters carry an
// explicit member list. Shorthand range expressions ("atom1-20",
// "atom1..20") expand into canonical identifier sequences here.

use std::sync::LazyLock;

use regex::Regex;

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D+)(\d+)(?:-|\.\.)(\d+)$").expect("invalid range pattern"));

static BARE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D+)(\d+)$").expect("invalid bare id pattern"));

/// How a cluster names its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterKind {
    /// Identifiers are `<prefix><number>`, zero-padded to `pad_width`,
    /// numbered 1 through `max_nodes`.
    Numbered {
        prefix: String,
        pad_width: usize,
        max_nodes: u32,
    },
    /// An explicit, fixed member list (e.g. standalone service hosts).
    Named { members: Vec<String> },
}

/// A named partition of the node pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub kind: ClusterKind,
}

impl Cluster {
    pub fn numbered(name: &str, prefix: &str, pad_width: usize, max_nodes: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: ClusterKind::Numbered {
                prefix: prefix.to_string(),
                pad_width,
                max_nodes,
            },
        }
    }

    pub fn named(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: ClusterKind::Named {
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        }
    }

    /// Render node number `n` through this cluster's canonical template.
    /// Only meaningful for numbered clusters.
    pub fn canonical(&self, n: u32) -> Option<String> {
        match &self.kind {
            ClusterKind::Numbered {
                prefix, pad_width, ..
            } => Some(format!("{prefix}{n:0width$}", width = pad_width)),
            ClusterKind::Named { .. } => None,
        }
    }

    /// Whether `id` is a member of this cluster.
    pub fn contains(&self, id: &str) -> bool {
        match &self.kind {
            ClusterKind::Numbered { max_nodes, .. } => {
                let Some(caps) = BARE_ID_RE.captures(id) else {
                    return false;
                };
                if !self.matches_prefix(&caps[1]) {
                    return false;
                }
                // Membership requires the canonical (zero-padded) rendering.
                match caps[2].parse::<u32>() {
                    Ok(n) if n >= 1 && n <= *max_nodes => self.canonical(n).as_deref() == Some(id),
                    _ => false,
                }
            }
            ClusterKind::Named { members } => members.iter().any(|m| m == id),
        }
    }

    /// Whether `prefix` is this cluster's identifier prefix.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        match &self.kind {
            ClusterKind::Numbered { prefix: p, .. } => p == prefix,
            ClusterKind::Named { .. } => false,
        }
    }

    /// The highest node number, for numbered clusters.
    pub fn max_nodes(&self) -> Option<u32> {
        match &self.kind {
            ClusterKind::Numbered { max_nodes, .. } => Some(*max_nodes),
            ClusterKind::Named { .. } => None,
        }
    }

    /// All member identifiers in display order.
    pub fn members(&self) -> Vec<String> {
        match &self.kind {
            ClusterKind::Numbered { max_nodes, .. } => (1..=*max_nodes)
                .map(|n| self.canonical(n).expect("numbered cluster"))
                .collect(),
            ClusterKind::Named { members } => members.clone(),
        }
    }
}

/// Result of resolving one or more range expressions. Warnings carry
/// non-fatal conditions (e.g. a range clamped to the cluster maximum);
/// the resolved ids are still usable when warnings are present.
#[derive(Debug, Default)]
pub struct Resolution {
    pub ids: Vec<String>,
    pub warnings: Vec<String>,
}

/// The full node pool: an ordered list of clusters. A node identifier
/// belongs to at most one cluster.
#[derive(Debug, Clone)]
pub struct Topology {
    clusters: Vec<Cluster>,
}

impl Topology {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// First cluster in topology order; used to default bare numeric
    /// ranges in status queries.
    pub fn default_cluster(&self) -> Option<&Cluster> {
        self.clusters.first()
    }

    fn cluster_for_prefix(&self, prefix: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.matches_prefix(prefix))
    }

    /// Whether `id` belongs to any configured cluster.
    pub fn contains(&self, id: &str) -> bool {
        self.clusters.iter().any(|c| c.contains(id))
    }

    /// Expand a single shorthand expression into canonical identifiers.
    ///
    /// `<prefix><low>-<high>` (or `..`) expands to every number between
    /// the bounds inclusive, ascending regardless of the input order.
    /// Anything else passes through as a single bare identifier. Ids
    /// with a recognized prefix are re-rendered through the cluster's
    /// canonical template; unrecognized prefixes pass through verbatim.
    /// Every range is clamped to a pool maximum with a warning: the
    /// prefix's own cluster maximum when the prefix is recognized, the
    /// first numbered cluster's maximum otherwise. A malformed range
    /// (e.g. trailing "-") falls back to the bare-identifier path
    /// unchanged.
    pub fn resolve_range(&self, expr: &str) -> Resolution {
        let mut out = Resolution::default();

        let bounds = RANGE_RE.captures(expr).and_then(|caps| {
            let a: u64 = caps[2].parse().ok()?;
            let b: u64 = caps[3].parse().ok()?;
            Some((caps[1].to_string(), a.min(b), a.max(b)))
        });
        let raw: Vec<String> = if let Some((prefix, first, mut last)) = bounds {
            let limit = self
                .cluster_for_prefix(&prefix)
                .and_then(Cluster::max_nodes)
                .or_else(|| self.clusters.iter().find_map(Cluster::max_nodes));
            if let Some(max_nodes) = limit {
                if last > u64::from(max_nodes) {
                    out.warnings.push(format!(
                        "last node {last} exceeds {max_nodes}, using {max_nodes}"
                    ));
                    last = u64::from(max_nodes);
                }
            }
            (first..=last).map(|n| format!("{prefix}{n}")).collect()
        } else {
            vec![expr.to_string()]
        };

        for id in raw {
            let canonical = BARE_ID_RE.captures(&id).and_then(|caps| {
                let cluster = self.cluster_for_prefix(&caps[1])?;
                let n: u32 = caps[2].parse().ok()?;
                cluster.canonical(n)
            });
            out.ids.push(canonical.unwrap_or(id));
        }
        out
    }

    /// Expand every expression in order, preserving duplicates.
    pub fn resolve_all(&self, exprs: &[String]) -> Resolution {
        let mut out = Resolution::default();
        for expr in exprs {
            let mut one = self.resolve_range(expr);
            out.ids.append(&mut one.ids);
            out.warnings.append(&mut one.warnings);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology::new(vec![
            Cluster::numbered("atom", "atom", 3, 132),
            Cluster::named("misc", &["mmatom"]),
        ])
    }

    #[test]
    fn test_resolve_simple_range() {
        let t = topology();
        let r = t.resolve_range("atom1-3");
        assert_eq!(r.ids, vec!["atom001", "atom002", "atom003"]);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_resolve_range_order_normalized() {
        let t = topology();
        let r = t.resolve_range("atom3-1");
        assert_eq!(r.ids, vec!["atom001", "atom002", "atom003"]);
    }

    #[test]
    fn test_resolve_range_dotdot_form() {
        let t = topology();
        let r = t.resolve_range("atom130..132");
        assert_eq!(r.ids, vec!["atom130", "atom131", "atom132"]);
    }

    #[test]
    fn test_resolve_range_clamped_to_max() {
        let t = topology();
        let r = t.resolve_range("atom130-200");
        assert_eq!(r.ids, vec!["atom130", "atom131", "atom132"]);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("132"));
    }

    #[test]
    fn test_malformed_range_falls_back_to_bare_id() {
        let t = topology();
        let r = t.resolve_range("atom34-34-");
        assert_eq!(r.ids, vec!["atom34-34-"]);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_bare_id_canonicalized() {
        let t = topology();
        assert_eq!(t.resolve_range("atom7").ids, vec!["atom007"]);
    }

    #[test]
    fn test_unknown_prefix_passes_through() {
        let t = topology();
        assert_eq!(t.resolve_range("mmatom").ids, vec!["mmatom"]);
        assert_eq!(t.resolve_range("zeta5").ids, vec!["zeta5"]);
        // Unknown prefix ranges expand without canonicalization.
        assert_eq!(t.resolve_range("zeta1-3").ids, vec!["zeta1", "zeta2", "zeta3"]);
    }

    #[test]
    fn test_unknown_prefix_range_clamped_to_pool_maximum() {
        // A typo'd prefix must not expand past the pool size.
        let t = topology();
        let r = t.resolve_range("zeta1-1000000");
        assert_eq!(r.ids.len(), 132);
        assert_eq!(r.ids[0], "zeta1");
        assert_eq!(r.ids[131], "zeta132");
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("1000000"));
    }

    #[test]
    fn test_range_clamp_without_numbered_cluster() {
        // No numbered cluster means no pool maximum; ranges stay as typed.
        let t = Topology::new(vec![Cluster::named("misc", &["mmatom"])]);
        let r = t.resolve_range("zeta1-3");
        assert_eq!(r.ids, vec!["zeta1", "zeta2", "zeta3"]);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_resolve_all_preserves_order_and_duplicates() {
        let t = topology();
        let r = t.resolve_all(&[
            "atom2".to_string(),
            "atom1-2".to_string(),
            "mmatom".to_string(),
        ]);
        assert_eq!(r.ids, vec!["atom002", "atom001", "atom002", "mmatom"]);
    }

    #[test]
    fn test_membership() {
        let t = topology();
        assert!(t.contains("atom001"));
        assert!(t.contains("atom132"));
        assert!(t.contains("mmatom"));
        assert!(!t.contains("atom1")); // non-canonical rendering
        assert!(!t.contains("atom133"));
        assert!(!t.contains("atom000"));
        assert!(!t.contains("rogue9"));
    }

    #[test]
    fn test_members_listing() {
        let t = topology();
        let members = t.cluster("atom").unwrap().members();
        assert_eq!(members.len(), 132);
        assert_eq!(members[0], "atom001");
        assert_eq!(members[131], "atom132");
        assert_eq!(t.cluster("misc").unwrap().members(), vec!["mmatom"]);
    }
}
