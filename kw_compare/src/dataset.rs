use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::period::Season;
use crate::record::{DisplayShow, RawShow, ShowRecord};
use crate::IdentityScheme;

/// Normalized show collection with an identity lookup. Built once per load.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    records: Vec<ShowRecord>,
    shows: Vec<DisplayShow>,
    index: HashMap<String, usize>,
    scheme: IdentityScheme,
}

impl Dataset {
    /// Normalize raw entries, resolving field fallbacks and assigning unique identities.
    pub fn from_raw(raw: &[RawShow], scheme: IdentityScheme) -> Self {
        let mut records = Vec::with_capacity(raw.len());
        let mut used: HashSet<String> = HashSet::with_capacity(raw.len());

        for (position, show) in raw.iter().enumerate() {
            let base = base_identity(show, position, scheme);
            let identity = if used.contains(&base) {
                let mut n = 2usize;
                let mut candidate = format!("{base}#{n}");
                while used.contains(&candidate) {
                    n += 1;
                    candidate = format!("{base}#{n}");
                }
                warn!(
                    "Duplicate identity {} ({}); keeping it as {}",
                    base,
                    show.display_title(),
                    candidate
                );
                candidate
            } else {
                base
            };
            used.insert(identity.clone());
            records.push(ShowRecord::from_raw(identity, show));
        }

        Self::from_records(records, scheme)
    }

    /// Build from already-normalized records. Identities must be unique.
    pub fn from_records(records: Vec<ShowRecord>, scheme: IdentityScheme) -> Self {
        let shows: Vec<DisplayShow> = records.iter().map(ShowRecord::display).collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.identity.clone(), i))
            .collect::<HashMap<_, _>>();
        debug_assert_eq!(index.len(), records.len(), "identities must be unique");
        debug!("Dataset built: {} shows", records.len());
        Self {
            records,
            shows,
            index,
            scheme,
        }
    }

    pub fn scheme(&self) -> IdentityScheme {
        self.scheme
    }

    pub fn records(&self) -> &[ShowRecord] {
        &self.records
    }

    pub fn shows(&self) -> &[DisplayShow] {
        &self.shows
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    pub fn record(&self, identity: &str) -> Option<&ShowRecord> {
        self.index.get(identity).map(|&i| &self.records[i])
    }

    pub fn show(&self, identity: &str) -> Option<&DisplayShow> {
        self.index.get(identity).map(|&i| &self.shows[i])
    }

    /// Distinct years, newest first.
    pub fn years(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.shows.iter().filter_map(|s| s.year).collect();
        set.into_iter().rev().collect()
    }

    /// Distinct seasons in calendar order.
    pub fn seasons(&self) -> Vec<Season> {
        let set: BTreeSet<Season> = self.shows.iter().filter_map(|s| s.season).collect();
        set.into_iter().collect()
    }

    pub fn max_final_karma(&self) -> i64 {
        self.shows.iter().map(|s| s.final_karma).max().unwrap_or(0)
    }
}

fn base_identity(show: &RawShow, position: usize, scheme: IdentityScheme) -> String {
    let Some(provider) = show.provider_id() else {
        let fallback = format!("record-{position}");
        warn!(
            "Entry {} ({}) has no mal_id or reddit_id; using {}",
            position,
            show.display_title(),
            fallback
        );
        return fallback;
    };
    match scheme {
        IdentityScheme::Composite => format!("{}-ep{}", provider, show.episode_label()),
        IdentityScheme::Provider => provider,
    }
}
