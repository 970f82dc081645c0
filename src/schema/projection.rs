use csv::StringRecord;
use std::collections::HashSet;

use super::KeyColumns;

/// Live column names of one destination table. Membership ignores case.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    lower: HashSet<String>,
}

impl ColumnSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lower: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lower.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}

/// Header columns that exist in the destination, in file order, with the
/// position each one had in the source row.
#[derive(Debug, Clone)]
pub struct ProjectedHeader {
    names: Vec<String>,
    indices: Vec<usize>,
}

impl ProjectedHeader {
    /// Trims every header cell (and a leading byte-order mark) and keeps
    /// the ones `columns` knows about.
    pub fn project(raw: &StringRecord, columns: &ColumnSet) -> Self {
        let mut names = Vec::new();
        let mut indices = Vec::new();
        for (idx, cell) in raw.iter().enumerate() {
            let name = clean_header(cell);
            if !name.is_empty() && columns.contains(name) {
                names.push(name.to_string());
                indices.push(idx);
            }
        }
        Self { names, indices }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Pull the projected cells out of a source row. Empty and missing
    /// cells come back as `None`.
    pub fn extract(&self, record: &StringRecord) -> Vec<Option<String>> {
        self.indices
            .iter()
            .map(|&idx| match record.get(idx) {
                Some("") | None => None,
                Some(value) => Some(value.to_string()),
            })
            .collect()
    }
}

fn clean_header(cell: &str) -> &str {
    cell.trim_start_matches('\u{feff}').trim()
}

/// How conflicting rows are resolved for one member load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertPolicy {
    conflict_target: Vec<String>,
    updatable: Vec<String>,
}

impl UpsertPolicy {
    /// Configured keys for `table` that the projected header actually
    /// carries become the conflict target. When none are present (or the
    /// table has no configured keys) the policy is plain insert.
    pub fn resolve(table: &str, header: &ProjectedHeader, keys: &KeyColumns) -> Self {
        let Some(configured) = keys.keys_for(table) else {
            return Self::insert_only();
        };

        let configured: Vec<String> = configured.iter().map(|k| k.to_lowercase()).collect();
        let conflict_target: Vec<String> = configured
            .iter()
            .filter_map(|key| {
                header
                    .names()
                    .iter()
                    .find(|name| name.to_lowercase() == *key)
                    .cloned()
            })
            .collect();
        if conflict_target.is_empty() {
            return Self::insert_only();
        }

        let updatable = header
            .names()
            .iter()
            .filter(|name| !configured.contains(&name.to_lowercase()))
            .cloned()
            .collect();

        Self {
            conflict_target,
            updatable,
        }
    }

    pub fn insert_only() -> Self {
        Self {
            conflict_target: Vec::new(),
            updatable: Vec::new(),
        }
    }

    pub fn is_upsert(&self) -> bool {
        !self.conflict_target.is_empty()
    }

    pub fn conflict_target(&self) -> &[String] {
        &self.conflict_target
    }

    pub fn updatable(&self) -> &[String] {
        &self.updatable
    }
}
