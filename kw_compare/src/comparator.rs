use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::filter::{self, FilterState, KarmaRange};
use crate::matrix::{self, ChartMatrix};
use crate::period::{Period, Season};
use crate::record::DisplayShow;
use crate::selection::{Selection, Toggle};
use crate::stats::{self, Insight};
use crate::{CompareConfig, KwError};

/// Everything the user controls. Every derived view is a pure function of
/// this plus the dataset.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ViewState {
    pub selection: Selection,
    pub filter: FilterState,
}

/// One picker row.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PickerEntry<'a> {
    pub show: &'a DisplayShow,
    pub selected: bool,
    /// Palette slot while the show is charted.
    pub color_index: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Comparator {
    dataset: Dataset,
    config: CompareConfig,
    state: ViewState,
}

impl Comparator {
    /// Filters start at the current broadcast period with the karma range
    /// spanning `0..=max final karma`.
    pub fn load(dataset: Dataset, config: CompareConfig) -> Self {
        Self::load_at(dataset, config, Period::current())
    }

    pub fn load_at(dataset: Dataset, config: CompareConfig, period: Period) -> Self {
        info!("Filtering to {}", period);
        let filter = FilterState {
            karma_range: KarmaRange {
                min: 0,
                max: dataset.max_final_karma(),
            },
            ..FilterState::for_period(period)
        };
        Self::new(dataset, config, filter)
    }

    pub fn new(dataset: Dataset, config: CompareConfig, filter: FilterState) -> Self {
        let mut selection = Selection::new();
        if config.auto_select_first {
            if let Some(first) = dataset.shows().first() {
                debug!("Auto-selecting {}", first.identity);
                // A fresh selection is below any valid cap.
                let _ = selection.toggle(&first.identity, &config.selection_policy());
            }
        }
        Self {
            dataset,
            config,
            state: ViewState { selection, filter },
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.state.filter
    }

    pub fn toggle(&mut self, identity: &str) -> Result<Toggle, KwError> {
        if !self.dataset.contains(identity) {
            return Err(KwError::UnknownShow(identity.to_string()));
        }
        let outcome = self
            .state
            .selection
            .toggle(identity, &self.config.selection_policy())?;
        debug!("{:?} {}", outcome, identity);
        Ok(outcome)
    }

    pub fn clear_selection(&mut self) {
        self.state.selection.clear();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.state.filter.search = search.into();
    }

    pub fn set_year(&mut self, year: Option<i32>) {
        self.state.filter.year = year;
    }

    pub fn set_season(&mut self, season: Option<Season>) {
        self.state.filter.season = season;
    }

    pub fn set_karma_range(&mut self, range: KarmaRange) -> Result<(), KwError> {
        if range.min > range.max {
            return Err(KwError::InvalidParameter(format!(
                "karma range {}..{} is empty",
                range.min, range.max
            )));
        }
        self.state.filter.karma_range = range;
        Ok(())
    }

    pub fn reset_filters(&mut self) {
        self.state.filter.reset(self.dataset.shows());
    }

    /// Filtered and sorted picker list.
    pub fn visible(&self) -> Vec<&DisplayShow> {
        filter::visible(self.dataset.shows(), &self.state.filter, self.dataset.scheme())
    }

    pub fn picker(&self) -> Vec<PickerEntry<'_>> {
        let visible = self.visible();
        let charted = matrix::charted(&self.state.selection, &visible);
        let palette_len = self.config.palette.len().max(1);
        visible
            .iter()
            .map(|&show| PickerEntry {
                show,
                selected: self.state.selection.contains(&show.identity),
                color_index: charted
                    .iter()
                    .position(|id| *id == show.identity)
                    .map(|k| k % palette_len),
            })
            .collect()
    }

    /// Selected shows that pass the current filters, in selection order.
    pub fn charted(&self) -> Vec<&str> {
        matrix::charted(&self.state.selection, &self.visible())
    }

    pub fn matrix(&self) -> ChartMatrix {
        matrix::build_matrix(&self.charted(), &self.dataset, self.config.palette.len())
    }

    pub fn insights(&self) -> Vec<Insight> {
        stats::insights(&self.matrix(), &self.dataset)
    }
}
