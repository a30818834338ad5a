use log::debug;
use nalgebra::{Dyn, Matrix4, OMatrix, U4};

use crate::analysis::eigen::{eigenvalues, Eigenvalues};
use crate::analysis::response::{frequency_response, FrequencyResponse};
use crate::error::{Error, Result};

/// Identified states, in state-vector order.
pub const STATES: [&str; 4] = ["Phi", "Delta", "PhiDot", "DeltaDot"];

/// Number of states in every identified model.
pub const STATE_COUNT: usize = 4;

/// 4×k input matrix; k is 1 (steer torque) or 2 (steer torque, lateral force).
pub type InputMatrix = OMatrix<f64, U4, Dyn>;

// ---------------------------------------------------------------------------
// FittedRun – one run as read from the matrix file
// ---------------------------------------------------------------------------

/// The fitted model of a single run, before it is joined with metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedRun {
    pub run_id: String,
    /// Measured forward speed in m/s.
    pub speed: f64,
    /// Trial duration in seconds.
    pub duration: f64,
    /// Fit quality per state, in [`STATES`] order.
    pub fits: [f64; STATE_COUNT],
    pub state_matrix: Matrix4<f64>,
    pub input_matrix: InputMatrix,
}

// ---------------------------------------------------------------------------
// RunMetadata – one row of the run table
// ---------------------------------------------------------------------------

/// Categorical run information joined on the run identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub rider: String,
    pub maneuver: String,
    pub environment: String,
    /// Nominal speed bin in m/s (e.g. 4.92), as recorded in the run table.
    pub speed_bin: f64,
}

// ---------------------------------------------------------------------------
// RunRecord – fitted model + metadata
// ---------------------------------------------------------------------------

/// One experimental trial with its identified linear dynamics.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    /// Measured forward speed in m/s.
    pub speed: f64,
    pub duration: f64,
    pub fits: [f64; STATE_COUNT],
    /// Arithmetic mean of `fits`.
    pub mean_fit: f64,
    pub state_matrix: Matrix4<f64>,
    pub input_matrix: InputMatrix,
    pub rider: String,
    pub maneuver: String,
    pub environment: String,
    pub speed_bin: f64,
}

impl RunRecord {
    /// Join a fitted run with its metadata row.
    pub fn new(fitted: FittedRun, metadata: RunMetadata) -> Self {
        let mean_fit = fitted.fits.iter().sum::<f64>() / STATE_COUNT as f64;
        RunRecord {
            run_id: fitted.run_id,
            speed: fitted.speed,
            duration: fitted.duration,
            fits: fitted.fits,
            mean_fit,
            state_matrix: fitted.state_matrix,
            input_matrix: fitted.input_matrix,
            rider: metadata.rider,
            maneuver: metadata.maneuver,
            environment: metadata.environment,
            speed_bin: metadata.speed_bin,
        }
    }

    /// Number of input columns in `input_matrix`.
    pub fn input_count(&self) -> usize {
        self.input_matrix.ncols()
    }
}

// ---------------------------------------------------------------------------
// FrequencyGrid
// ---------------------------------------------------------------------------

/// Strictly increasing frequencies (rad/s) at which responses are evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid(Vec<f64>);

impl FrequencyGrid {
    pub fn new(frequencies: Vec<f64>) -> Result<Self> {
        if frequencies.is_empty() {
            return Err(Error::MalformedInput("frequency grid is empty".into()));
        }
        if frequencies.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::MalformedInput(
                "frequency grid must be strictly increasing".into(),
            ));
        }
        Ok(FrequencyGrid(frequencies))
    }

    /// `points` frequencies spaced evenly in log10 between
    /// `10^start_exponent` and `10^stop_exponent` inclusive.
    pub fn logspace(start_exponent: f64, stop_exponent: f64, points: usize) -> Result<Self> {
        Self::new(
            linspace(start_exponent, stop_exponent, points)
                .into_iter()
                .map(|e| 10f64.powf(e))
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `points` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// RunCollection – the complete loaded dataset
// ---------------------------------------------------------------------------

/// All loaded runs with their eagerly derived responses and eigenvalues.
///
/// `responses` and `eigenvalues` are indexed in lockstep with `runs` and are
/// never recomputed; subsets only index into them.
#[derive(Debug, Clone)]
pub struct RunCollection {
    runs: Vec<RunRecord>,
    grid: FrequencyGrid,
    responses: Vec<FrequencyResponse>,
    eigenvalues: Vec<Eigenvalues>,
}

impl RunCollection {
    /// Build the collection and compute every run's Bode response (steer
    /// torque to roll and steer angle) and state matrix eigenvalues.
    pub fn new(runs: Vec<RunRecord>, grid: FrequencyGrid) -> Result<Self> {
        if let Some(first) = runs.first() {
            let k = first.input_count();
            if !(1..=2).contains(&k) {
                return Err(Error::MalformedInput(format!(
                    "run {} has {k} inputs, expected 1 or 2",
                    first.run_id
                )));
            }
            if let Some(odd) = runs.iter().find(|r| r.input_count() != k) {
                return Err(Error::MalformedInput(format!(
                    "run {} has {} inputs but run {} has {k}",
                    odd.run_id,
                    odd.input_count(),
                    first.run_id
                )));
            }
        }

        let responses: Vec<FrequencyResponse> = runs
            .iter()
            .map(|r| {
                let steer_torque = r.input_matrix.column(0).into_owned();
                frequency_response(&r.state_matrix, &steer_torque, grid.as_slice())
            })
            .collect();
        let eigenvalues: Vec<Eigenvalues> =
            runs.iter().map(|r| eigenvalues(&r.state_matrix)).collect();

        debug!(
            "Derived responses at {} frequencies and eigenvalues for {} runs",
            grid.len(),
            runs.len()
        );

        Ok(RunCollection {
            runs,
            grid,
            responses,
            eigenvalues,
        })
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    /// Per-run frequency responses, in run order.
    pub fn responses(&self) -> &[FrequencyResponse] {
        &self.responses
    }

    /// Per-run eigenvalues, in run order.
    pub fn eigenvalues(&self) -> &[Eigenvalues] {
        &self.eigenvalues
    }

    /// Input count shared by every run (`None` for an empty collection).
    pub fn input_count(&self) -> Option<usize> {
        self.runs.first().map(RunRecord::input_count)
    }

    /// A view over every run.
    pub fn all(&self) -> Subset<'_> {
        Subset {
            collection: self,
            indices: (0..self.runs.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Subset – an ordered view into a RunCollection
// ---------------------------------------------------------------------------

/// Runs of a collection selected by a filter, in collection order.
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    collection: &'a RunCollection,
    indices: Vec<usize>,
}

impl<'a> Subset<'a> {
    /// `indices` must be strictly increasing and in range.
    pub(crate) fn from_indices(collection: &'a RunCollection, indices: Vec<usize>) -> Self {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Subset {
            collection,
            indices,
        }
    }

    pub fn collection(&self) -> &'a RunCollection {
        self.collection
    }

    /// Positions of the selected runs in the collection.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn records(&self) -> impl Iterator<Item = &'a RunRecord> + '_ {
        self.indices.iter().map(|&i| &self.collection.runs[i])
    }

    pub fn responses(&self) -> impl Iterator<Item = &'a FrequencyResponse> + '_ {
        self.indices.iter().map(|&i| &self.collection.responses[i])
    }

    pub fn eigenvalues(&self) -> impl Iterator<Item = &'a Eigenvalues> + '_ {
        self.indices.iter().map(|&i| &self.collection.eigenvalues[i])
    }

    /// Measured speeds of the selected runs.
    pub fn speeds(&self) -> Vec<f64> {
        self.records().map(|r| r.speed).collect()
    }

    pub fn run_ids(&self) -> Vec<&'a str> {
        self.records().map(|r| r.run_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
