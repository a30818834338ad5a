use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::model::{RunCollection, RunRecord, Subset};

/// Runs whose speed bin is within this distance of an unselected bin are
/// excluded.
pub const SPEED_BIN_TOLERANCE: f64 = 1e-5;

// ---------------------------------------------------------------------------
// SpeedBin – the fixed set of nominal speeds
// ---------------------------------------------------------------------------

/// Nominal speed bins used in the experiments (m/s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpeedBin {
    S1_4,
    S2_0,
    S3_0,
    S4_0,
    S4_92,
    S5_8,
    S7_0,
    S9_0,
}

impl SpeedBin {
    pub const ALL: [SpeedBin; 8] = [
        SpeedBin::S1_4,
        SpeedBin::S2_0,
        SpeedBin::S3_0,
        SpeedBin::S4_0,
        SpeedBin::S4_92,
        SpeedBin::S5_8,
        SpeedBin::S7_0,
        SpeedBin::S9_0,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SpeedBin::S1_4 => "1.4",
            SpeedBin::S2_0 => "2.0",
            SpeedBin::S3_0 => "3.0",
            SpeedBin::S4_0 => "4.0",
            SpeedBin::S4_92 => "4.92",
            SpeedBin::S5_8 => "5.8",
            SpeedBin::S7_0 => "7.0",
            SpeedBin::S9_0 => "9.0",
        }
    }

    pub fn value(self) -> f64 {
        match self {
            SpeedBin::S1_4 => 1.4,
            SpeedBin::S2_0 => 2.0,
            SpeedBin::S3_0 => 3.0,
            SpeedBin::S4_0 => 4.0,
            SpeedBin::S4_92 => 4.92,
            SpeedBin::S5_8 => 5.8,
            SpeedBin::S7_0 => 7.0,
            SpeedBin::S9_0 => 9.0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        SpeedBin::ALL.into_iter().find(|b| b.label() == label)
    }

    /// The bin whose value is within tolerance of `speed`.
    pub fn matching(speed: f64) -> Option<Self> {
        SpeedBin::ALL
            .into_iter()
            .find(|b| (speed - b.value()).abs() <= SPEED_BIN_TOLERANCE)
    }
}

impl fmt::Display for SpeedBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for SpeedBin {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        SpeedBin::from_label(&label).ok_or_else(|| format!("{label} is not a speed bin"))
    }
}

impl From<SpeedBin> for String {
    fn from(bin: SpeedBin) -> Self {
        bin.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// Categorical columns that take a set of allowed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Rider,
    Maneuver,
    Environment,
}

/// Subset selection. `None` on any key means no restriction on that
/// dimension; an empty set keeps nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FilterCriteria {
    pub rider: Option<BTreeSet<String>>,
    pub maneuver: Option<BTreeSet<String>>,
    pub environment: Option<BTreeSet<String>>,
    /// Selected speed bins. Runs in any *unselected* bin are dropped; runs
    /// outside every bin are kept.
    pub speed: Option<BTreeSet<SpeedBin>>,
    /// Exclusive lower bound on the mean fit.
    pub mean_fit: Option<f64>,
    /// Exclusive lower bound on the run duration.
    pub duration: Option<f64>,
}

impl FilterCriteria {
    /// Criteria that keep every run.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(mut self, category: Category, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.category_mut(category) = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_speeds(mut self, bins: impl IntoIterator<Item = SpeedBin>) -> Self {
        self.speed = Some(bins.into_iter().collect());
        self
    }

    pub fn with_mean_fit(mut self, threshold: f64) -> Self {
        self.mean_fit = Some(threshold);
        self
    }

    pub fn with_duration(mut self, threshold: f64) -> Self {
        self.duration = Some(threshold);
        self
    }

    pub fn category(&self, category: Category) -> Option<&BTreeSet<String>> {
        match category {
            Category::Rider => self.rider.as_ref(),
            Category::Maneuver => self.maneuver.as_ref(),
            Category::Environment => self.environment.as_ref(),
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut Option<BTreeSet<String>> {
        match category {
            Category::Rider => &mut self.rider,
            Category::Maneuver => &mut self.maneuver,
            Category::Environment => &mut self.environment,
        }
    }

    /// Whether a single run passes every active criterion.
    pub fn matches(&self, run: &RunRecord) -> bool {
        if let Some(riders) = &self.rider {
            if !riders.contains(&run.rider) {
                return false;
            }
        }
        if let Some(maneuvers) = &self.maneuver {
            if !maneuvers.contains(&run.maneuver) {
                return false;
            }
        }
        if let Some(environments) = &self.environment {
            if !environment_accepts(environments, &run.environment) {
                return false;
            }
        }
        if let Some(selected) = &self.speed {
            let in_unselected_bin = SpeedBin::ALL
                .into_iter()
                .filter(|b| !selected.contains(b))
                .any(|b| !((run.speed_bin - b.value()).abs() > SPEED_BIN_TOLERANCE));
            if in_unselected_bin {
                return false;
            }
        }
        if let Some(threshold) = self.mean_fit {
            if !(run.mean_fit > threshold) {
                return false;
            }
        }
        if let Some(threshold) = self.duration {
            if !(run.duration > threshold) {
                return false;
            }
        }
        true
    }
}

/// The run table spells two environments differently from the labels used
/// for selection.
fn environment_accepts(selected: &BTreeSet<String>, environment: &str) -> bool {
    selected.contains(environment)
        || (environment == "Pavillion Floor" && selected.contains("Pavilion"))
        || (environment == "Horse Treadmill" && selected.contains("Treadmill"))
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Return the runs of `collection` that pass `criteria`, in collection order.
pub fn filter<'a>(collection: &'a RunCollection, criteria: &FilterCriteria) -> Subset<'a> {
    let indices: Vec<usize> = collection
        .runs()
        .iter()
        .enumerate()
        .filter(|(_, run)| criteria.matches(run))
        .map(|(i, _)| i)
        .collect();
    debug!("Filter kept {} of {} runs", indices.len(), collection.len());
    Subset::from_indices(collection, indices)
}

impl<'a> Subset<'a> {
    /// Narrow this subset further, preserving order.
    pub fn filter(&self, criteria: &FilterCriteria) -> Subset<'a> {
        let collection = self.collection();
        let indices = self
            .indices()
            .iter()
            .copied()
            .filter(|&i| criteria.matches(&collection.runs()[i]))
            .collect();
        Subset::from_indices(collection, indices)
    }
}
