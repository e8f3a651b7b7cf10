// Status rendering: compact grid and list views
//
// Display only; the engine never formats output. The compact grid packs
// one cell per node, column-major, sized to the terminal width. The
// list view adds owner, expiration and message columns.

use crate::leases::{Expiration, LeaseStore};

/// Compact view: `  atom001[ L ]  ` cells, as many columns as fit in
/// `width`. `P` marks a permanently locked node, `L` a leased one.
pub fn render_compact(members: &[String], store: &LeaseStore, width: usize) -> String {
    let Some(id_len) = members.iter().map(|m| m.len()).max() else {
        return String::new();
    };
    let cell_len = id_len + 9;
    let columns = (width / cell_len).max(1);
    let rows = members.len().div_ceil(columns);

    let mut out = String::new();
    for row in 0..rows {
        let mut line = String::new();
        for column in 0..columns {
            let index = row + column * rows;
            if let Some(id) = members.get(index) {
                let token = match store.get(id).map(|r| &r.expiration) {
                    Some(Expiration::Permanent) => 'P',
                    Some(Expiration::Timestamp(_)) => 'L',
                    None => ' ',
                };
                line.push_str(&format!("  {id:>id_len$}[ {token} ]  "));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// List view: one line per node with owner, expiration and message.
pub fn render_list(members: &[String], store: &LeaseStore) -> String {
    let Some(id_len) = members.iter().map(|m| m.len()).max() else {
        return String::new();
    };
    let mut out = String::new();
    for id in members {
        let (owner, expiration, message) = match store.get(id) {
            Some(record) => (
                record.owner.as_str(),
                format_expiration(&record.expiration),
                record.message.as_str(),
            ),
            None => ("", String::new(), ""),
        };
        out.push_str(
            format!("{owner:>10}  {id:>id_len$}  [{expiration:<16.16}]  {message}").trim_end(),
        );
        out.push('\n');
    }
    out
}

fn format_expiration(expiration: &Expiration) -> String {
    match expiration {
        Expiration::Permanent => "PERMA-LOCKED".to_string(),
        Expiration::Timestamp(t) => t.format("%Y-%m-%d %H:%M").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leases::LeaseRecord;
    use chrono::{Local, TimeZone};

    fn members() -> Vec<String> {
        (1..=6).map(|n| format!("atom{n:03}")).collect()
    }

    fn store() -> LeaseStore {
        let mut store = LeaseStore::new();
        let t = Local.with_ymd_and_hms(2026, 8, 24, 18, 0, 0).unwrap();
        store.insert(
            "atom002",
            LeaseRecord::new("alice", Expiration::Timestamp(t), "perf run"),
        );
        store.insert("atom005", LeaseRecord::new("LG1", Expiration::Permanent, "bad disk"));
        store
    }

    #[test]
    fn test_compact_tokens() {
        let out = render_compact(&members(), &store(), 200);
        assert!(out.contains("atom002[ L ]"));
        assert!(out.contains("atom005[ P ]"));
        assert!(out.contains("atom001[   ]"));
    }

    #[test]
    fn test_compact_narrow_terminal_gets_one_column() {
        let out = render_compact(&members(), &store(), 10);
        assert_eq!(out.lines().count(), 6);
    }

    #[test]
    fn test_compact_is_column_major() {
        // Two columns over six nodes: first line pairs atom001 with atom004.
        let cell = "atom001".len() + 9;
        let out = render_compact(&members(), &store(), cell * 2);
        let first = out.lines().next().unwrap();
        assert!(first.contains("atom001"));
        assert!(first.contains("atom004"));
    }

    #[test]
    fn test_list_view_columns() {
        let out = render_list(&members(), &store());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains("alice"));
        assert!(lines[1].contains("[2026-08-24 18:00]"));
        assert!(lines[1].ends_with("perf run"));
        assert!(lines[4].contains("LG1"));
        assert!(lines[4].contains("[PERMA-LOCKED    ]"));
    }

    #[test]
    fn test_empty_member_list() {
        assert_eq!(render_compact(&[], &store(), 80), "");
        assert_eq!(render_list(&[], &store()), "");
    }
}
