//! Karma progression comparison library: normalizes hourly karma datasets and derives
//! picker lists, chart matrices and per-thread statistics from an explicit view state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod comparator;
mod dataset;
mod filter;
mod load;
mod matrix;
mod period;
mod record;
mod repair;
mod selection;
mod stats;

pub use comparator::{Comparator, PickerEntry, ViewState};
pub use dataset::Dataset;
pub use filter::{filter, sort_for_display, visible, FilterState, KarmaRange};
pub use load::{parse_shows, DataSource, LoadedSource, Loader};
pub use matrix::{build_matrix, charted, ChartMatrix, MatrixRow, SeriesInfo};
pub use period::{Period, Season};
pub use record::{DisplayShow, RawSample, RawShow, Sample, ShowRecord, KARMA_LIMIT};
pub use repair::{fill_gaps, needs_repair, repair_show};
pub use selection::{Selection, SelectionPolicy, Toggle};
pub use stats::{
    compute_stats, growth_percent, insights, max_hourly_gain, render_insights, HourlyGain,
    Insight, ShowStats,
};

/// Hours tracked per thread; chart matrices always carry one row per hour `1..=HOURS`.
pub const HOURS: u32 = 48;

#[derive(Error, Debug)]
pub enum KwError {
    #[error("failed to load karma data from {origin}: {reason}")]
    DataLoad { origin: String, reason: String },
    #[error("selection is limited to {cap} shows")]
    SelectionFull { cap: usize },
    #[error("unknown show: {0}")]
    UnknownShow(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// How a show's identity is derived from its provider id.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScheme {
    /// `<provider id>-ep<episode>`: every episode thread is its own entry.
    Composite,
    /// `<provider id>`: one entry per show.
    Provider,
}

impl Default for IdentityScheme {
    fn default() -> Self {
        IdentityScheme::Composite
    }
}

impl IdentityScheme {
    pub fn is_per_episode(self) -> bool {
        matches!(self, IdentityScheme::Composite)
    }
}

pub const DEFAULT_PALETTE: [&str; 12] = [
    "#ff6b6b", "#4ecdc4", "#6c5ce7", "#fdcb6e", "#e17055", "#00cec9", "#0984e3", "#fd79a8",
    "#55efc4", "#fab1a0", "#74b9ff", "#a29bfe",
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompareConfig {
    pub identity: IdentityScheme,
    pub selection_cap: Option<usize>,
    pub palette: Vec<String>,
    pub auto_select_first: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            identity: IdentityScheme::Composite,
            selection_cap: None,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            auto_select_first: true,
        }
    }
}

impl CompareConfig {
    /// Parse a JSON config; omitted fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, KwError> {
        let config: CompareConfig = serde_json::from_str(text)
            .map_err(|e| KwError::InvalidParameter(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KwError> {
        if self.palette.is_empty() {
            return Err(KwError::InvalidParameter("palette must not be empty".into()));
        }
        if let Some(bad) = self.palette.iter().find(|c| parse_hex_color(c).is_none()) {
            return Err(KwError::InvalidParameter(format!(
                "palette color '{bad}' is not #rrggbb"
            )));
        }
        if self.selection_cap == Some(0) {
            return Err(KwError::InvalidParameter("selection cap must be > 0".into()));
        }
        Ok(())
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            cap: self.selection_cap,
        }
    }

    pub fn palette_rgb(&self) -> Vec<(u8, u8, u8)> {
        self.palette
            .iter()
            .filter_map(|c| parse_hex_color(c))
            .collect()
    }
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn parse_hex_color(input: &str) -> Option<(u8, u8, u8)> {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}
