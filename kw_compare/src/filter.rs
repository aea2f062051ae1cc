use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::period::{Period, Season};
use crate::record::DisplayShow;
use crate::IdentityScheme;

/// Inclusive bounds on a show's final karma.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KarmaRange {
    pub min: i64,
    pub max: i64,
}

impl KarmaRange {
    pub const UNBOUNDED: KarmaRange = KarmaRange {
        min: i64::MIN,
        max: i64::MAX,
    };

    pub fn contains(&self, karma: i64) -> bool {
        karma >= self.min && karma <= self.max
    }
}

impl Default for KarmaRange {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Picker filters. `Default` places no constraint on any field.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterState {
    pub search: String,
    pub year: Option<i32>,
    pub season: Option<Season>,
    pub karma_range: KarmaRange,
}

impl FilterState {
    /// Filters seeded to one broadcast period.
    pub fn for_period(period: Period) -> Self {
        Self {
            year: Some(period.year),
            season: Some(period.season),
            ..Self::default()
        }
    }

    pub fn matches(&self, show: &DisplayShow) -> bool {
        self.matches_with(show, &self.search.to_lowercase())
    }

    // `needle` is the lowercased search term, computed once per pass.
    fn matches_with(&self, show: &DisplayShow, needle: &str) -> bool {
        (needle.is_empty() || show.title.to_lowercase().contains(needle))
            && self.year.map_or(true, |year| show.year == Some(year))
            && self.season.map_or(true, |season| show.season == Some(season))
            && self.karma_range.contains(show.final_karma)
    }

    /// Clear search/year/season and span the karma range over `[0, max final karma]`.
    pub fn reset(&mut self, shows: &[DisplayShow]) {
        let max = shows.iter().map(|s| s.final_karma).max().unwrap_or(0);
        *self = Self {
            karma_range: KarmaRange { min: 0, max },
            ..Self::default()
        };
    }
}

/// Shows matching every active filter, in input order.
pub fn filter<'a>(shows: &'a [DisplayShow], state: &FilterState) -> Vec<&'a DisplayShow> {
    let needle = state.search.to_lowercase();
    shows
        .iter()
        .filter(|show| state.matches_with(show, &needle))
        .collect()
}

/// Title order (case-insensitive first), then numeric episode for per-episode
/// identities, then identity.
pub fn sort_for_display(shows: &mut [&DisplayShow], scheme: IdentityScheme) {
    shows.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| {
                if scheme.is_per_episode() {
                    compare_episodes(&a.episode, &b.episode)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.identity.cmp(&b.identity))
    });
}

/// Filtered and sorted picker list.
pub fn visible<'a>(
    shows: &'a [DisplayShow],
    state: &FilterState,
    scheme: IdentityScheme,
) -> Vec<&'a DisplayShow> {
    let mut out = filter(shows, state);
    sort_for_display(&mut out, scheme);
    out
}

// Numeric episodes first, ascending; non-numeric labels after them.
fn compare_episodes(a: &str, b: &str) -> Ordering {
    match (episode_number(a), episode_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn episode_number(label: &str) -> Option<f64> {
    label.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(id: &str, title: &str, episode: &str, year: i32, season: Season, karma: i64) -> DisplayShow {
        DisplayShow {
            identity: id.into(),
            title: title.into(),
            episode: episode.into(),
            season: Some(season),
            year: Some(year),
            final_karma: karma,
        }
    }

    fn catalog() -> Vec<DisplayShow> {
        vec![
            show("3-ep10", "frieren", "10", 2024, Season::Fall, 4200),
            show("1-ep2", "Dandadan", "2", 2024, Season::Fall, 1800),
            show("3-ep9", "Frieren", "9", 2024, Season::Fall, 3900),
            show("2-ep1", "Apothecary Diaries", "1", 2025, Season::Winter, 900),
            show("3-ep?", "Frieren", "?", 2024, Season::Fall, 100),
        ]
    }

    fn ids(shows: &[&DisplayShow]) -> Vec<String> {
        shows.iter().map(|s| s.identity.clone()).collect()
    }

    #[test]
    fn default_state_is_identity() {
        let shows = catalog();
        let out = filter(&shows, &FilterState::default());
        assert_eq!(out.len(), shows.len());
        assert!(shows.iter().zip(out.iter()).all(|(a, b)| a == *b));
    }

    #[test]
    fn conjunction_of_predicates() {
        let shows = catalog();
        let state = FilterState {
            search: "FRIE".into(),
            year: Some(2024),
            season: Some(Season::Fall),
            karma_range: KarmaRange { min: 1000, max: 4000 },
        };
        assert_eq!(ids(&filter(&shows, &state)), vec!["3-ep9"]);

        let state = FilterState {
            season: Some(Season::Winter),
            ..FilterState::default()
        };
        assert_eq!(ids(&filter(&shows, &state)), vec!["2-ep1"]);
    }

    #[test]
    fn karma_range_is_inclusive() {
        let shows = catalog();
        let state = FilterState {
            karma_range: KarmaRange { min: 900, max: 1800 },
            ..FilterState::default()
        };
        assert_eq!(ids(&filter(&shows, &state)), vec!["1-ep2", "2-ep1"]);
    }

    #[test]
    fn sorted_by_title_then_episode() {
        let shows = catalog();
        let out = visible(&shows, &FilterState::default(), IdentityScheme::Composite);
        assert_eq!(
            ids(&out),
            vec!["2-ep1", "1-ep2", "3-ep9", "3-ep?", "3-ep10"]
        );
    }

    #[test]
    fn episode_ties_only_for_per_episode_scheme() {
        let shows = vec![
            show("b", "Same", "10", 2024, Season::Fall, 1),
            show("a", "Same", "9", 2024, Season::Fall, 1),
        ];
        let composite = visible(&shows, &FilterState::default(), IdentityScheme::Composite);
        assert_eq!(ids(&composite), vec!["a", "b"]);
        let shows = vec![
            show("a", "Same", "10", 2024, Season::Fall, 1),
            show("b", "Same", "9", 2024, Season::Fall, 1),
        ];
        let provider = visible(&shows, &FilterState::default(), IdentityScheme::Provider);
        assert_eq!(ids(&provider), vec!["a", "b"]);
    }

    #[test]
    fn reset_spans_zero_to_max() {
        let shows = catalog();
        let mut state = FilterState {
            search: "x".into(),
            year: Some(1999),
            season: Some(Season::Spring),
            karma_range: KarmaRange { min: 5, max: 6 },
        };
        state.reset(&shows);
        assert_eq!(state.search, "");
        assert_eq!(state.year, None);
        assert_eq!(state.season, None);
        assert_eq!(state.karma_range, KarmaRange { min: 0, max: 4200 });

        state.reset(&[]);
        assert_eq!(state.karma_range, KarmaRange { min: 0, max: 0 });
    }
}
