use std::fmt::Write as _;

use serde::Serialize;

use crate::dataset::Dataset;
use crate::matrix::ChartMatrix;
use crate::record::Sample;
use crate::HOURS;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct HourlyGain {
    pub hour: u32,
    pub gain: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ShowStats {
    pub start_karma: i64,
    pub end_karma: i64,
    pub growth: i64,
    /// `None` when the thread started at zero karma.
    pub growth_percent: Option<f64>,
    pub max_hourly_gain: Option<HourlyGain>,
    pub peak_karma: Option<i64>,
    pub sample_count: usize,
}

/// Summary statistics for one thread. `samples` must be sorted by hour with
/// unique hours, as produced by normalization.
pub fn compute_stats(samples: &[Sample]) -> ShowStats {
    let at = |hour: u32| samples.iter().find(|s| s.hour == hour).map(|s| s.karma);
    let start_karma = at(1).unwrap_or(0);
    let end_karma = at(HOURS)
        .or_else(|| samples.last().map(|s| s.karma))
        .unwrap_or(0);
    ShowStats {
        start_karma,
        end_karma,
        growth: end_karma.saturating_sub(start_karma),
        growth_percent: growth_percent(start_karma, end_karma),
        max_hourly_gain: max_hourly_gain(samples),
        peak_karma: samples.iter().map(|s| s.karma).max(),
        sample_count: samples.len(),
    }
}

/// `(end / start - 1) * 100` rounded to one decimal.
pub fn growth_percent(start: i64, end: i64) -> Option<f64> {
    if start == 0 {
        return None;
    }
    let pct = (end as f64 / start as f64 - 1.0) * 100.0;
    Some((pct * 10.0).round() / 10.0)
}

/// Largest positive gain between consecutive hours. Pairs whose previous hour
/// is missing are skipped; the earliest hour wins a tie.
pub fn max_hourly_gain(samples: &[Sample]) -> Option<HourlyGain> {
    let mut best: Option<HourlyGain> = None;
    for pair in samples.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if cur.hour != prev.hour + 1 {
            continue;
        }
        let gain = cur.karma.saturating_sub(prev.karma);
        if gain > 0 && best.map_or(true, |b| gain > b.gain) {
            best = Some(HourlyGain {
                hour: cur.hour,
                gain,
            });
        }
    }
    best
}

/// One block of the statistics panel.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Insight {
    pub identity: String,
    pub title: String,
    pub episode: String,
    pub color_index: usize,
    pub stats: ShowStats,
}

/// Statistics for every series in the matrix, in chart order.
pub fn insights(matrix: &ChartMatrix, dataset: &Dataset) -> Vec<Insight> {
    matrix
        .series
        .iter()
        .filter_map(|series| {
            let record = dataset.record(&series.identity)?;
            Some(Insight {
                identity: record.identity.clone(),
                title: record.title.clone(),
                episode: record.episode.clone(),
                color_index: series.color_index,
                stats: compute_stats(&record.samples),
            })
        })
        .collect()
}

/// Plain-text statistics panel.
pub fn render_insights(insights: &[Insight]) -> String {
    let mut out = String::new();
    for (i, insight) in insights.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let s = &insight.stats;
        let _ = writeln!(out, "{} (Ep {})", insight.title, insight.episode);
        let _ = writeln!(out, "  Starting karma: {}", s.start_karma);
        let _ = writeln!(out, "  Final karma: {}", s.end_karma);
        let pct = match s.growth_percent {
            Some(p) => format!("{p:.1}%"),
            None => "N/A".to_string(),
        };
        let _ = writeln!(out, "  Total growth: {} points ({})", s.growth, pct);
        match s.max_hourly_gain {
            Some(g) => {
                let _ = writeln!(
                    out,
                    "  Max karma gain in a single hour: {} (hour {})",
                    g.gain, g.hour
                );
            }
            None => {
                let _ = writeln!(out, "  Max karma gain in a single hour: none");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::build_matrix;
    use crate::record::RawShow;
    use crate::IdentityScheme;

    fn samples(points: &[(u32, i64)]) -> Vec<Sample> {
        points
            .iter()
            .map(|&(hour, karma)| Sample { hour, karma })
            .collect()
    }

    #[test]
    fn alpha_beta_example() {
        let raw: Vec<RawShow> = serde_json::from_value(serde_json::json!([
            {"mal_id": "1", "title": "Alpha", "hourly_karma": [{"hour": 1, "karma": 10}, {"hour": 48, "karma": 110}]},
            {"mal_id": "2", "title": "Beta", "hourly_karma": [{"hour": 1, "karma": 5}, {"hour": 24, "karma": 15}]}
        ]))
        .unwrap();
        let dataset = Dataset::from_raw(&raw, IdentityScheme::Provider);
        let matrix = build_matrix(&["1", "2"], &dataset, 12);
        let out = insights(&matrix, &dataset);
        assert_eq!(out.len(), 2);

        let alpha = &out[0].stats;
        assert_eq!((alpha.start_karma, alpha.end_karma, alpha.growth), (10, 110, 100));
        assert_eq!(alpha.growth_percent, Some(1000.0));

        let beta = &out[1].stats;
        assert_eq!((beta.start_karma, beta.end_karma, beta.growth), (5, 15, 10));
        assert_eq!(beta.growth_percent, Some(200.0));
        assert_eq!(out[1].color_index, 1);
    }

    #[test]
    fn zero_start_has_no_percentage() {
        let stats = compute_stats(&samples(&[(2, 4), (3, 9)]));
        assert_eq!(stats.start_karma, 0);
        assert_eq!(stats.end_karma, 9);
        assert_eq!(stats.growth_percent, None);
        assert_eq!(stats.peak_karma, Some(9));
        assert_eq!(stats.sample_count, 2);
    }

    #[test]
    fn empty_series() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.start_karma, 0);
        assert_eq!(stats.end_karma, 0);
        assert_eq!(stats.max_hourly_gain, None);
        assert_eq!(stats.peak_karma, None);
    }

    #[test]
    fn hourly_gain_needs_adjacent_hours() {
        // 2 -> 5 spans a gap and is ignored.
        let s = samples(&[(1, 10), (2, 15), (5, 100), (6, 104), (7, 109)]);
        assert_eq!(max_hourly_gain(&s), Some(HourlyGain { hour: 2, gain: 5 }));
    }

    #[test]
    fn hourly_gain_ignores_drops() {
        let s = samples(&[(1, 50), (2, 40), (3, 30)]);
        assert_eq!(max_hourly_gain(&s), None);
    }

    #[test]
    fn extreme_karma_saturates() {
        let stats = compute_stats(&samples(&[(1, i64::MIN), (2, i64::MAX)]));
        assert_eq!(stats.growth, i64::MAX);
        assert_eq!(
            stats.max_hourly_gain,
            Some(HourlyGain { hour: 2, gain: i64::MAX })
        );
    }

    #[test]
    fn growth_percent_rounds_to_one_decimal() {
        assert_eq!(growth_percent(3, 4), Some(33.3));
        assert_eq!(growth_percent(10, 5), Some(-50.0));
        assert_eq!(growth_percent(0, 5), None);
    }

    #[test]
    fn render_panel() {
        let insight = Insight {
            identity: "1-ep3".into(),
            title: "Alpha".into(),
            episode: "3".into(),
            color_index: 0,
            stats: compute_stats(&samples(&[(2, 4), (3, 9)])),
        };
        let text = render_insights(&[insight]);
        assert!(text.starts_with("Alpha (Ep 3)\n"));
        assert!(text.contains("Starting karma: 0"));
        assert!(text.contains("Final karma: 9"));
        assert!(text.contains("Total growth: 9 points (N/A)"));
        assert!(text.contains("Max karma gain in a single hour: 5 (hour 3)"));
    }
}
