use std::collections::HashMap;

/// Natural key columns per destination table.
///
/// Built once and handed to the loader; lookups ignore table-name casing.
#[derive(Debug, Clone, Default)]
pub struct KeyColumns {
    map: HashMap<String, Vec<String>>,
}

impl KeyColumns {
    /// Keys for the GTFS tables the bundled schema declares primary keys on.
    pub fn gtfs_default() -> Self {
        Self::from_pairs([
            ("trips", vec!["trip_id"]),
            ("calendar", vec!["service_id", "start_date", "end_date"]),
            ("routes", vec!["route_id"]),
            ("shapes", vec!["shape_id", "shape_pt_sequence"]),
            ("stops", vec!["stop_id"]),
            ("stop_times", vec!["trip_id", "stop_sequence"]),
        ])
    }

    pub fn from_pairs<I, T, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<K>)>,
        T: Into<String>,
        K: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(table, keys)| {
                (
                    table.into().to_lowercase(),
                    keys.into_iter().map(Into::into).collect(),
                )
            })
            .collect();
        Self { map }
    }

    /// Configured key columns for `table`, in configured order.
    pub fn keys_for(&self, table: &str) -> Option<&[String]> {
        self.map.get(&table.to_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
