// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Radio-ID and talkgroup-rule ACL tables (spec.md §3, §6 "Persisted
//! state"): a CSV-loaded radio ID whitelist/blacklist and a YAML-loaded
//! ordered talkgroup rule list. Both are read-mostly: the routing core
//! takes a shared lock to read them and swaps in a freshly loaded table
//! under an exclusive lock on commit (spec.md §5 "atomically swaps in the
//! new table").

use serde::Deserialize;
use std::collections::HashMap;

/// `id,enabled,alias` CSV-backed radio ID table.
#[derive(Debug, Default, Clone)]
pub struct RadioIdTable {
    entries: HashMap<u32, RadioIdEntry>,
}

#[derive(Debug, Clone)]
struct RadioIdEntry {
    enabled: bool,
    #[allow(dead_code)]
    alias: String,
}

/// Radio ID table load failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AclLoadError {
    #[error("malformed CSV row {row}: {detail}")]
    Csv { row: usize, detail: String },
    #[error("YAML parse error: {0}")]
    Yaml(String),
}

impl RadioIdTable {
    /// Parse a minimal `id,enabled,alias` CSV: no header row, one entry per
    /// line.
    ///
    /// # Errors
    /// Returns [`AclLoadError::Csv`] on a malformed row.
    pub fn from_csv_str(csv: &str) -> Result<Self, AclLoadError> {
        let mut entries = HashMap::new();
        for (row, line) in csv.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(3, ',');
            let id: u32 = fields
                .next()
                .ok_or_else(|| AclLoadError::Csv { row, detail: "missing id".into() })?
                .trim()
                .parse()
                .map_err(|_| AclLoadError::Csv { row, detail: "id not a u32".into() })?;
            let enabled: bool = fields
                .next()
                .ok_or_else(|| AclLoadError::Csv { row, detail: "missing enabled".into() })?
                .trim()
                .parse()
                .map_err(|_| AclLoadError::Csv { row, detail: "enabled not a bool".into() })?;
            let alias = fields.next().unwrap_or("").trim().to_string();
            entries.insert(id, RadioIdEntry { enabled, alias });
        }
        Ok(Self { entries })
    }

    /// Radio IDs default to enabled when absent from the table (the
    /// baseline import is treated as a blacklist of explicitly disabled
    /// IDs unless the table is non-empty and omits the ID entirely, in
    /// which case it is also treated as enabled per spec.md's "whitelist
    /// (enabled IDs) and a blacklist (disabled IDs)" phrasing).
    #[must_use]
    pub fn is_enabled(&self, id: u32) -> bool {
        self.entries.get(&id).is_none_or(|e| e.enabled)
    }
}

/// A single ordered talkgroup routing rule.
#[derive(Debug, Clone, Deserialize)]
pub struct TalkgroupRule {
    pub tgid: u32,
    pub slot: u8,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub affiliated_only: bool,
    #[serde(default)]
    pub parrot: bool,
    #[serde(default)]
    pub inclusion: Vec<u32>,
    #[serde(default)]
    pub exclusion: Vec<u32>,
    #[serde(default)]
    pub rewrites: Vec<RewriteEntry>,
    #[serde(default)]
    pub preferred_peers: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewriteEntry {
    pub peer: u32,
    pub tgid: u32,
    pub slot: u8,
}

fn default_true() -> bool {
    true
}

impl TalkgroupRule {
    /// Whether `peer_id` is permitted to route traffic matching this rule
    /// (spec.md §3: "peer inclusion list (if non-empty, only listed peers
    /// may route); peer exclusion list (ignored when inclusion is
    /// non-empty)").
    #[must_use]
    pub fn permits_peer(&self, peer_id: u32) -> bool {
        if !self.inclusion.is_empty() {
            return self.inclusion.contains(&peer_id);
        }
        !self.exclusion.contains(&peer_id)
    }
}

/// Ordered talkgroup rule list, keyed by lookup on `(tgid, slot)`.
#[derive(Debug, Default, Clone)]
pub struct TalkgroupRuleTable {
    rules: Vec<TalkgroupRule>,
}

impl TalkgroupRuleTable {
    #[must_use]
    pub fn new(rules: Vec<TalkgroupRule>) -> Self {
        Self { rules }
    }

    /// Load a rule list from a YAML document: a top-level sequence of
    /// [`TalkgroupRule`] entries.
    ///
    /// # Errors
    /// Returns [`AclLoadError::Yaml`] on a malformed document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AclLoadError> {
        let rules: Vec<TalkgroupRule> = serde_yaml::from_str(yaml).map_err(|e| AclLoadError::Yaml(e.to_string()))?;
        Ok(Self { rules })
    }

    #[must_use]
    pub fn find(&self, tgid: u32, slot: u8) -> Option<&TalkgroupRule> {
        self.rules.iter().find(|r| r.tgid == tgid && r.slot == slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_id_table_parses_csv_and_defaults_unknown_to_enabled() {
        let table = RadioIdTable::from_csv_str("10,true,Alice\n11,false,Bob\n").unwrap();
        assert!(table.is_enabled(10));
        assert!(!table.is_enabled(11));
        assert!(table.is_enabled(999));
    }

    #[test]
    fn radio_id_table_rejects_malformed_row() {
        assert!(RadioIdTable::from_csv_str("not-a-number,true,X").is_err());
    }

    #[test]
    fn talkgroup_rule_table_loads_from_yaml() {
        let yaml = r#"
- tgid: 100
  slot: 1
  inclusion: [1, 2]
- tgid: 200
  slot: 2
  affiliated_only: true
"#;
        let table = TalkgroupRuleTable::from_yaml_str(yaml).unwrap();
        let rule = table.find(100, 1).unwrap();
        assert!(rule.active);
        assert!(rule.permits_peer(1));
        assert!(!rule.permits_peer(3));

        let rule2 = table.find(200, 2).unwrap();
        assert!(rule2.affiliated_only);
        assert!(table.find(999, 1).is_none());
    }

    #[test]
    fn exclusion_list_is_ignored_when_inclusion_non_empty() {
        let rule = TalkgroupRule {
            tgid: 100,
            slot: 1,
            active: true,
            affiliated_only: false,
            parrot: false,
            inclusion: vec![1],
            exclusion: vec![1],
            rewrites: Vec::new(),
            preferred_peers: Vec::new(),
        };
        assert!(rule.permits_peer(1));
        assert!(!rule.permits_peer(2));
    }
}
