use std::f64::consts::{PI, TAU};

use log::{debug, warn};
use nalgebra::{Complex, Matrix4, Vector4};

use crate::analysis::stats::{mean, population_std, sample_std};
use crate::data::model::Subset;

/// Number of observed outputs: roll angle and steer angle.
pub const OUTPUT_COUNT: usize = 2;

/// Observed outputs of every response, in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    RollAngle,
    SteerAngle,
}

impl Output {
    pub const ALL: [Output; OUTPUT_COUNT] = [Output::RollAngle, Output::SteerAngle];

    /// Channel index in `[f64; OUTPUT_COUNT]` samples.
    pub fn index(self) -> usize {
        match self {
            Output::RollAngle => 0,
            Output::SteerAngle => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Output::RollAngle => "Roll angle",
            Output::SteerAngle => "Steer angle",
        }
    }
}

// ---------------------------------------------------------------------------
// Single-system response
// ---------------------------------------------------------------------------

/// Linear magnitude and unwrapped phase (rad) per frequency, per output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyResponse {
    pub magnitude: Vec<[f64; OUTPUT_COUNT]>,
    pub phase: Vec<[f64; OUTPUT_COUNT]>,
}

impl FrequencyResponse {
    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Magnitude samples of one output.
    pub fn magnitude_of(&self, output: Output) -> Vec<f64> {
        self.magnitude.iter().map(|m| m[output.index()]).collect()
    }

    /// Phase samples of one output.
    pub fn phase_of(&self, output: Output) -> Vec<f64> {
        self.phase.iter().map(|p| p[output.index()]).collect()
    }
}

/// Evaluate `C (jωI - A)⁻¹ b` at each frequency, where `C` selects the roll
/// and steer angle states and there is no feed-through.
///
/// Phase is unwrapped along increasing frequency. A frequency at which
/// `jωI - A` is singular yields NaN samples.
pub fn frequency_response(
    a: &Matrix4<f64>,
    b: &Vector4<f64>,
    frequencies: &[f64],
) -> FrequencyResponse {
    let a_c: Matrix4<Complex<f64>> = a.map(|v| Complex::new(v, 0.0));
    let b_c: Vector4<Complex<f64>> = b.map(|v| Complex::new(v, 0.0));

    let mut magnitude = Vec::with_capacity(frequencies.len());
    let mut wrapped: [Vec<f64>; OUTPUT_COUNT] = Default::default();

    for &w in frequencies {
        let s_minus_a = Matrix4::from_diagonal_element(Complex::new(0.0, w)) - a_c;
        match s_minus_a.lu().solve(&b_c) {
            Some(x) => {
                magnitude.push([x[0].norm(), x[1].norm()]);
                wrapped[0].push(x[0].arg());
                wrapped[1].push(x[1].arg());
            }
            None => {
                magnitude.push([f64::NAN; OUTPUT_COUNT]);
                wrapped[0].push(f64::NAN);
                wrapped[1].push(f64::NAN);
            }
        }
    }

    let roll = unwrap_phase(&wrapped[0]);
    let steer = unwrap_phase(&wrapped[1]);
    let phase = roll.into_iter().zip(steer).map(|(r, s)| [r, s]).collect();

    FrequencyResponse { magnitude, phase }
}

/// Remove 2π jumps between consecutive phase samples (rad).
///
/// Jumps of at least π are replaced by their equivalent in [-π, π]. NaN
/// samples stay NaN and are skipped: the jump is measured from the last
/// finite sample.
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut unwrapped = Vec::with_capacity(phase.len());
    let mut offset = 0.0;
    let mut previous: Option<f64> = None;

    for &p in phase {
        if p.is_nan() {
            unwrapped.push(p);
            continue;
        }
        if let Some(prev) = previous {
            let diff = p - prev;
            let mut reduced = (diff + PI).rem_euclid(TAU) - PI;
            if reduced == -PI && diff > 0.0 {
                reduced = PI;
            }
            if diff.abs() >= PI {
                offset += reduced - diff;
            }
        }
        previous = Some(p);
        unwrapped.push(p + offset);
    }

    unwrapped
}

/// Shift a run's phase curve so its lowest-frequency value lands on the
/// branch just below zero.
///
/// Per output, with `p0` the first sample, every sample is reduced by
/// `(p0 - p0 mod 2π) + 2π`.
pub fn realign_phase(phase: &[[f64; OUTPUT_COUNT]]) -> Vec<[f64; OUTPUT_COUNT]> {
    let Some(first) = phase.first() else {
        return Vec::new();
    };
    let shift = first.map(|p0| (p0 - p0.rem_euclid(TAU)) + TAU);
    phase
        .iter()
        .map(|s| [s[0] - shift[0], s[1] - shift[1]])
        .collect()
}

// ---------------------------------------------------------------------------
// Subset aggregation
// ---------------------------------------------------------------------------

/// Mean and spread of a subset's Bode curves.
#[derive(Debug, Clone, PartialEq)]
pub struct BodeSummary {
    pub mean_magnitude_db: Vec<[f64; OUTPUT_COUNT]>,
    pub std_magnitude_db: Vec<[f64; OUTPUT_COUNT]>,
    pub mean_phase_deg: Vec<[f64; OUTPUT_COUNT]>,
    pub std_phase_deg: Vec<[f64; OUTPUT_COUNT]>,
    pub mean_speed: f64,
    /// Sample standard deviation of the run speeds; NaN for a single run.
    pub std_speed: f64,
    pub run_count: usize,
}

/// Aggregate the cached responses of a subset.
///
/// Returns `None` when the subset is empty.
pub fn aggregate(subset: &Subset<'_>) -> Option<BodeSummary> {
    let responses: Vec<&FrequencyResponse> = subset.responses().collect();
    aggregate_responses(&responses, &subset.speeds())
}

/// Per-frequency mean/std of magnitude (dB) and realigned phase (deg)
/// across runs, together with speed statistics.
///
/// Magnitudes are converted to dB before averaging. Each run's phase is
/// passed through [`realign_phase`] first. Standard deviations across runs
/// divide by n.
///
/// Returns `None` when there are no responses, when the responses differ in
/// length, or when `speeds` does not hold one speed per response.
pub fn aggregate_responses(
    responses: &[&FrequencyResponse],
    speeds: &[f64],
) -> Option<BodeSummary> {
    if responses.is_empty() {
        debug!("Bode aggregation over an empty subset");
        return None;
    }

    let points = responses[0].len();
    let consistent = responses
        .iter()
        .all(|r| r.magnitude.len() == points && r.phase.len() == points);
    if !consistent || speeds.len() != responses.len() {
        warn!(
            "Cannot aggregate {} responses with {} speeds over mismatched grids",
            responses.len(),
            speeds.len()
        );
        return None;
    }
    let magnitude_db: Vec<Vec<[f64; OUTPUT_COUNT]>> = responses
        .iter()
        .map(|r| {
            r.magnitude
                .iter()
                .map(|m| m.map(|v| 20.0 * v.log10()))
                .collect()
        })
        .collect();
    let phase_deg: Vec<Vec<[f64; OUTPUT_COUNT]>> = responses
        .iter()
        .map(|r| {
            realign_phase(&r.phase)
                .into_iter()
                .map(|p| p.map(f64::to_degrees))
                .collect()
        })
        .collect();

    let (mean_magnitude_db, std_magnitude_db) = across_runs(&magnitude_db, points);
    let (mean_phase_deg, std_phase_deg) = across_runs(&phase_deg, points);

    Some(BodeSummary {
        mean_magnitude_db,
        std_magnitude_db,
        mean_phase_deg,
        std_phase_deg,
        mean_speed: mean(speeds),
        std_speed: sample_std(speeds),
        run_count: responses.len(),
    })
}

type Curve = Vec<[f64; OUTPUT_COUNT]>;

fn across_runs(curves: &[Curve], points: usize) -> (Curve, Curve) {
    let mut means = Vec::with_capacity(points);
    let mut stds = Vec::with_capacity(points);
    let mut column = Vec::with_capacity(curves.len());

    for j in 0..points {
        let mut m = [0.0; OUTPUT_COUNT];
        let mut s = [0.0; OUTPUT_COUNT];
        for c in 0..OUTPUT_COUNT {
            column.clear();
            column.extend(curves.iter().map(|curve| curve[j][c]));
            m[c] = mean(&column);
            s[c] = population_std(&column);
        }
        means.push(m);
        stds.push(s);
    }

    (means, stds)
}
