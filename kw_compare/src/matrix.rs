use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::dataset::Dataset;
use crate::record::DisplayShow;
use crate::selection::Selection;
use crate::HOURS;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SeriesInfo {
    pub identity: String,
    pub label: String,
    pub color_index: usize,
}

impl SeriesInfo {
    /// Column key used in matrix exports, e.g. `karma_52991-ep3`.
    pub fn key(&self) -> String {
        format!("karma_{}", self.identity)
    }
}

/// One hour of the chart; `values[i]` belongs to `series[i]`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MatrixRow {
    pub hour: u32,
    pub values: Vec<Option<i64>>,
}

/// Dense hour-by-series karma table. `None` marks a missing sample and is drawn as a gap.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChartMatrix {
    pub series: Vec<SeriesInfo>,
    pub rows: Vec<MatrixRow>,
}

impl ChartMatrix {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn column(&self, index: usize) -> Vec<(u32, Option<i64>)> {
        self.rows
            .iter()
            .map(|row| (row.hour, row.values.get(index).copied().flatten()))
            .collect()
    }

    pub fn max_karma(&self) -> Option<i64> {
        self.rows
            .iter()
            .flat_map(|row| row.values.iter().flatten().copied())
            .max()
    }

    /// `[{ "hour": 1, "karma_<id>": 10 | null, ... }, ...]`
    pub fn to_json_rows(&self) -> Vec<JsonValue> {
        let keys: Vec<String> = self.series.iter().map(SeriesInfo::key).collect();
        self.rows
            .iter()
            .map(|row| {
                let mut obj = JsonMap::new();
                obj.insert("hour".into(), JsonValue::from(row.hour));
                for (key, value) in keys.iter().zip(row.values.iter()) {
                    obj.insert(
                        key.clone(),
                        value.map(JsonValue::from).unwrap_or(JsonValue::Null),
                    );
                }
                JsonValue::Object(obj)
            })
            .collect()
    }
}

/// Selected identities that are currently visible, in selection order.
pub fn charted<'a>(selection: &'a Selection, visible: &[&DisplayShow]) -> Vec<&'a str> {
    selection
        .iter()
        .filter(|id| visible.iter().any(|show| show.identity == *id))
        .collect()
}

/// One row per hour `1..=HOURS` for the charted identities. Colors are
/// assigned by position, so they shift when an earlier series is hidden.
pub fn build_matrix(charted: &[&str], dataset: &Dataset, palette_len: usize) -> ChartMatrix {
    let records: Vec<_> = charted
        .iter()
        .filter_map(|id| dataset.record(id))
        .collect();

    let series = records
        .iter()
        .enumerate()
        .map(|(k, record)| SeriesInfo {
            identity: record.identity.clone(),
            label: record.label(),
            color_index: if palette_len == 0 { 0 } else { k % palette_len },
        })
        .collect();

    let rows = (1..=HOURS)
        .map(|hour| MatrixRow {
            hour,
            values: records.iter().map(|r| r.karma_at(hour)).collect(),
        })
        .collect();

    ChartMatrix { series, rows }
}
