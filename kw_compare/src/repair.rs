use std::collections::BTreeMap;

use tracing::debug;

use crate::record::{RawShow, Sample};
use crate::HOURS;

/// Complete `1..=HOURS` series. A missing hour copies the nearest known hour,
/// counting hours already filled in this pass; ties go to the lower hour.
/// Samples outside the window are dropped; an empty series stays empty.
pub fn fill_gaps(samples: &[Sample]) -> Vec<Sample> {
    let mut known: BTreeMap<u32, i64> = samples
        .iter()
        .filter(|s| (1..=HOURS).contains(&s.hour))
        .map(|s| (s.hour, s.karma))
        .collect();
    if known.is_empty() {
        return Vec::new();
    }

    for hour in 1..=HOURS {
        if known.contains_key(&hour) {
            continue;
        }
        let below = known.range(..hour).next_back().map(|(&h, &k)| (h, k));
        let above = known.range(hour + 1..).next().map(|(&h, &k)| (h, k));
        let karma = match (below, above) {
            (Some((bh, bk)), Some((ah, ak))) => {
                if hour - bh <= ah - hour {
                    bk
                } else {
                    ak
                }
            }
            (Some((_, k)), None) | (None, Some((_, k))) => k,
            (None, None) => continue,
        };
        known.insert(hour, karma);
    }

    known
        .into_iter()
        .map(|(hour, karma)| Sample { hour, karma })
        .collect()
}

/// True when some samples exist but not every hour in the window is covered.
pub fn needs_repair(samples: &[Sample]) -> bool {
    let covered = samples
        .iter()
        .filter(|s| (1..=HOURS).contains(&s.hour))
        .count();
    !samples.is_empty() && covered < HOURS as usize
}

/// Rewrite a show's `hourly_karma` with a gap-free series. Returns whether
/// anything changed.
pub fn repair_show(show: &mut RawShow) -> bool {
    let samples = show.samples();
    if !needs_repair(&samples) {
        return false;
    }
    let filled = fill_gaps(&samples);
    debug!(
        "Repaired {}: {} -> {} samples",
        show.display_title(),
        samples.len(),
        filled.len()
    );
    show.set_samples(&filled);
    true
}
