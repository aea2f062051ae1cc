use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::period::Season;
use crate::HOURS;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_EPISODE: &str = "?";

/// Karma values are clamped to this magnitude so differences cannot overflow.
pub const KARMA_LIMIT: i64 = 1_000_000_000_000_000;

/// One `(hour, karma)` observation. Either side is `None` when missing or not
/// a number.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawSample {
    pub hour: Option<f64>,
    pub karma: Option<f64>,
}

impl RawSample {
    /// `{"hour": .., "karma": ..}` with numbers or numeric strings; `None` for
    /// anything that is not an object.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            hour: obj.get("hour").and_then(json_to_f64),
            karma: obj.get("karma").and_then(json_to_f64),
        })
    }
}

/// A show entry exactly as published; unknown fields are kept so a repaired
/// dataset can be written back without loss.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawShow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_id: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reddit_id: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_english: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_karma: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<JsonValue>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl RawShow {
    /// First non-empty of `mal_id`, `reddit_id`.
    pub fn provider_id(&self) -> Option<String> {
        self.mal_id
            .as_ref()
            .and_then(json_to_id)
            .or_else(|| self.reddit_id.as_ref().and_then(json_to_id))
    }

    pub fn display_title(&self) -> String {
        self.title
            .as_ref()
            .and_then(json_to_text)
            .or_else(|| self.title_english.as_ref().and_then(json_to_text))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    pub fn episode_label(&self) -> String {
        self.episode
            .as_ref()
            .and_then(json_to_text)
            .unwrap_or_else(|| UNKNOWN_EPISODE.to_string())
    }

    pub fn season(&self) -> Option<Season> {
        match self.season.as_ref()? {
            JsonValue::String(s) => Season::parse(s),
            _ => None,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self.year.as_ref()? {
            JsonValue::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Entries of `hourly_karma` that are objects; anything else is skipped.
    pub fn raw_samples(&self) -> Vec<RawSample> {
        match self.hourly_karma.as_ref() {
            Some(JsonValue::Array(items)) => items.iter().filter_map(RawSample::from_json).collect(),
            _ => Vec::new(),
        }
    }

    pub fn samples(&self) -> Vec<Sample> {
        normalize_samples(&self.raw_samples())
    }

    /// Replace `hourly_karma` with `samples` as integer `{hour, karma}` objects.
    pub fn set_samples(&mut self, samples: &[Sample]) {
        let items = samples
            .iter()
            .map(|s| serde_json::json!({ "hour": s.hour, "karma": s.karma }))
            .collect();
        self.hourly_karma = Some(JsonValue::Array(items));
    }

    pub fn image_url(&self) -> Option<String> {
        match self.images.as_ref()?.get("medium")? {
            JsonValue::String(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
            _ => None,
        }
    }
}

/// Round hours to the nearest integer, drop hours below 1, and keep the last
/// observation for each hour. Output is sorted by hour.
pub(crate) fn normalize_samples(raw: &[RawSample]) -> Vec<Sample> {
    let mut by_hour: BTreeMap<u32, i64> = BTreeMap::new();
    for sample in raw {
        let (Some(hour), Some(karma)) = (sample.hour, sample.karma) else {
            continue;
        };
        if !hour.is_finite() || !karma.is_finite() {
            continue;
        }
        let hour = hour.round();
        if hour < 1.0 || hour > u32::MAX as f64 {
            continue;
        }
        let karma = karma.round().clamp(-KARMA_LIMIT as f64, KARMA_LIMIT as f64);
        by_hour.insert(hour as u32, karma as i64);
    }
    by_hour
        .into_iter()
        .map(|(hour, karma)| Sample { hour, karma })
        .collect()
}

fn json_to_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(number_to_string(n)),
        _ => None,
    }
}

// Zero ids count as absent, like other empty values.
fn json_to_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Number(n) if n.as_f64() == Some(0.0) => None,
        other => json_to_text(other),
    }
}

fn number_to_string(n: &serde_json::Number) -> String {
    if let Some(v) = n.as_i64() {
        v.to_string()
    } else if let Some(v) = n.as_u64() {
        v.to_string()
    } else {
        match n.as_f64() {
            Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{:.0}", v),
            Some(v) => v.to_string(),
            None => n.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sample {
    pub hour: u32,
    pub karma: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShowRecord {
    pub identity: String,
    pub provider_id: Option<String>,
    pub title: String,
    pub episode: String,
    pub season: Option<Season>,
    pub year: Option<i32>,
    pub samples: Vec<Sample>,
    pub image_url: Option<String>,
}

impl ShowRecord {
    pub(crate) fn from_raw(identity: String, raw: &RawShow) -> Self {
        Self {
            identity,
            provider_id: raw.provider_id(),
            title: raw.display_title(),
            episode: raw.episode_label(),
            season: raw.season(),
            year: raw.year(),
            samples: raw.samples(),
            image_url: raw.image_url(),
        }
    }

    pub fn karma_at(&self, hour: u32) -> Option<i64> {
        self.samples
            .iter()
            .find(|s| s.hour == hour)
            .map(|s| s.karma)
    }

    /// Karma at hour 48, else the last sample, else 0.
    pub fn final_karma(&self) -> i64 {
        self.karma_at(HOURS)
            .or_else(|| self.samples.last().map(|s| s.karma))
            .unwrap_or(0)
    }

    /// Legend label, e.g. `Frieren (Ep 12)`.
    pub fn label(&self) -> String {
        format!("{} (Ep {})", self.title, self.episode)
    }

    pub fn display(&self) -> DisplayShow {
        DisplayShow {
            identity: self.identity.clone(),
            title: self.title.clone(),
            episode: self.episode.clone(),
            season: self.season,
            year: self.year,
            final_karma: self.final_karma(),
        }
    }
}

/// Picker-facing projection of a [`ShowRecord`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DisplayShow {
    pub identity: String,
    pub title: String,
    pub episode: String,
    pub season: Option<Season>,
    pub year: Option<i32>,
    pub final_karma: i64,
}
