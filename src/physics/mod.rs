//! First-principles models: a Whipple bicycle per rider, producing the same
//! matrices, responses and eigenvalues as the identified runs.

pub mod parameters;
pub mod whipple;

use std::path::Path;

use log::{debug, warn};
use nalgebra::{Matrix4, Vector2};
use serde::{Deserialize, Serialize};

use crate::analysis::coefficients::{acceleration_coefficients, CoefficientRow, CoefficientTable};
use crate::analysis::eigen::{eigenvalues, locus_points, Eigenvalues, LocusPoint};
use crate::analysis::response::{frequency_response, FrequencyResponse};
use crate::data::model::InputMatrix;
use crate::error::Result;

pub use parameters::{Parameter, ParameterSet, Rider};

/// Which inputs the model's input matrix carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSet {
    /// `[Tδ]`
    #[default]
    SteerTorque,
    /// `[Tδ, F]`, lateral force applied at the rider
    SteerTorqueAndLateralForce,
}

impl InputSet {
    pub fn count(self) -> usize {
        match self {
            InputSet::SteerTorque => 1,
            InputSet::SteerTorqueAndLateralForce => 2,
        }
    }
}

/// Maps a lateral force to the roll and steer torques it produces:
/// `[Tφ, Tδ]ᵀ = H F`.
///
/// The values are approximate placeholders for each rider's measured
/// geometry, not calibrated results.
pub fn lateral_force_map(rider: Rider) -> Vector2<f64> {
    match rider {
        Rider::Jason => Vector2::new(0.90249725, 0.00495976),
        Rider::Charlie | Rider::Luke => Vector2::new(0.91107929, 0.00697907),
    }
}

/// A rider's calibrated Whipple model with live, mutable parameters.
///
/// The defaults are kept untouched; mutation only affects the live copy.
#[derive(Debug, Clone)]
pub struct FirstPrinciplesModel {
    rider: Rider,
    inputs: InputSet,
    defaults: ParameterSet,
    parameters: ParameterSet,
}

impl FirstPrinciplesModel {
    /// Model for `rider` (exactly `Charlie`, `Jason` or `Luke`) driven by
    /// steer torque, with the embedded rider defaults.
    pub fn new(rider: &str) -> Result<Self> {
        Self::with_inputs(rider, InputSet::SteerTorque)
    }

    pub fn with_inputs(rider: &str, inputs: InputSet) -> Result<Self> {
        let rider: Rider = rider.parse()?;
        Ok(Self::from_parameters(rider, inputs, rider.default_parameters()))
    }

    /// Model whose defaults come from `<parameter_dir>/<Rider>.json` when
    /// present.
    pub fn load(rider: Rider, inputs: InputSet, parameter_dir: Option<&Path>) -> Result<Self> {
        let defaults = ParameterSet::for_rider(rider, parameter_dir)?;
        Ok(Self::from_parameters(rider, inputs, defaults))
    }

    pub fn from_parameters(rider: Rider, inputs: InputSet, defaults: ParameterSet) -> Self {
        FirstPrinciplesModel {
            rider,
            inputs,
            defaults,
            parameters: defaults,
        }
    }

    pub fn rider(&self) -> Rider {
        self.rider
    }

    pub fn inputs(&self) -> InputSet {
        self.inputs
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn default_parameters(&self) -> &ParameterSet {
        &self.defaults
    }

    pub fn parameter(&self, parameter: Parameter) -> f64 {
        self.parameters.get(parameter)
    }

    /// Set a live parameter by benchmark symbol.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        let parameter: Parameter = name.parse().map_err(|e| {
            warn!("{} model has no parameter {name}", self.rider);
            e
        })?;
        self.set(parameter, value);
        Ok(())
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        debug!("{} {parameter} = {value}", self.rider);
        self.parameters.set(parameter, value);
    }

    /// Set several parameters by symbol. Every name is resolved before any
    /// value changes, so an unknown name leaves the model untouched.
    pub fn set_parameters<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let resolved = values
            .into_iter()
            .map(|(name, value)| Ok((name.parse::<Parameter>()?, value)))
            .collect::<Result<Vec<_>>>()?;
        for (parameter, value) in resolved {
            self.set(parameter, value);
        }
        Ok(())
    }

    /// Copy the defaults back into the live parameters.
    pub fn reset_parameters(&mut self) {
        self.parameters = self.defaults;
    }

    /// State matrix and input matrix at `speed`. The input columns follow
    /// [`InputSet`]: steer torque, then optionally lateral force.
    pub fn state_space(&self, speed: f64) -> Result<(Matrix4<f64>, InputMatrix)> {
        let (a, torques) = whipple::state_space(&self.parameters, speed)?;
        let steer = torques.column(1).into_owned();

        let b = match self.inputs {
            InputSet::SteerTorque => InputMatrix::from_columns(&[steer]),
            InputSet::SteerTorqueAndLateralForce => {
                let lateral = torques * lateral_force_map(self.rider);
                InputMatrix::from_columns(&[steer, lateral])
            }
        };

        Ok((a, b))
    }

    /// Acceleration-equation coefficients at each speed, one row per speed.
    pub fn matrices(&self, speeds: &[f64]) -> Result<CoefficientTable> {
        let mut table = CoefficientTable::new(self.inputs.count());
        for &speed in speeds {
            let (a, b) = self.state_space(speed)?;
            table.rows.push(CoefficientRow {
                run_id: None,
                speed,
                values: acceleration_coefficients(&a, &b),
            });
        }
        Ok(table)
    }

    /// Steer torque to roll/steer angle response at `speed`.
    pub fn magnitude_phase(&self, speed: f64, frequencies: &[f64]) -> Result<FrequencyResponse> {
        let (a, b) = self.state_space(speed)?;
        let steer_torque = b.column(0).into_owned();
        Ok(frequency_response(&a, &steer_torque, frequencies))
    }

    /// Eigenvalues of the state matrix at each speed.
    pub fn eigenvalues(&self, speeds: &[f64]) -> Result<Vec<Eigenvalues>> {
        speeds
            .iter()
            .map(|&speed| Ok(eigenvalues(&self.state_space(speed)?.0)))
            .collect()
    }

    /// Root locus of the model over `speeds`.
    pub fn root_locus(&self, speeds: &[f64]) -> Result<Vec<LocusPoint>> {
        Ok(locus_points(speeds, &self.eigenvalues(speeds)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;

    #[test]
    fn only_known_riders() {
        assert!(matches!(FirstPrinciplesModel::new("Mallory"), Err(Error::InvalidRider(_))));
        for name in ["Charlie", "Jason", "Luke"] {
            let model = FirstPrinciplesModel::new(name).unwrap();
            assert_eq!(model.rider().name(), name);
            assert_eq!(model.parameters().to_map().len(), Parameter::COUNT);
        }
    }

    #[test]
    fn unknown_parameter_is_an_error() {
        let mut model = FirstPrinciplesModel::new("Jason").unwrap();
        let before = *model.parameters();
        let err = model.set_parameter("wheelbase", 1.0).unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(_)));
        assert_eq!(*model.parameters(), before);

        let err = model.set_parameters([("mB", 100.0), ("nope", 1.0)]).unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(name) if name == "nope"));
        assert_eq!(model.parameter(Parameter::FrameMass), before.get(Parameter::FrameMass));
    }

    #[test]
    fn mutation_leaves_defaults_alone() {
        let mut model = FirstPrinciplesModel::new("Luke").unwrap();
        let default_mass = model.default_parameters().get(Parameter::FrameMass);
        model.set_parameter("mB", default_mass + 5.0).unwrap();
        assert_relative_eq!(model.parameter(Parameter::FrameMass), default_mass + 5.0);
        assert_eq!(model.default_parameters().get(Parameter::FrameMass), default_mass);
        model.reset_parameters();
        assert_eq!(model.parameter(Parameter::FrameMass), default_mass);
    }

    #[test]
    fn input_sets_shape_b() {
        let one = FirstPrinciplesModel::new("Charlie").unwrap();
        let (_, b1) = one.state_space(4.0).unwrap();
        assert_eq!(b1.ncols(), 1);

        let two =
            FirstPrinciplesModel::with_inputs("Charlie", InputSet::SteerTorqueAndLateralForce)
                .unwrap();
        let (_, b2) = two.state_space(4.0).unwrap();
        assert_eq!(b2.ncols(), 2);
        assert_eq!(b2.column(0), b1.column(0));

        let (_, torques) = whipple::state_space(two.parameters(), 4.0).unwrap();
        let h = lateral_force_map(Rider::Charlie);
        for i in 0..4 {
            assert_relative_eq!(
                b2[(i, 1)],
                torques[(i, 0)] * h[0] + torques[(i, 1)] * h[1],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn jason_has_his_own_lateral_force_map() {
        assert_ne!(lateral_force_map(Rider::Jason), lateral_force_map(Rider::Luke));
        assert_eq!(lateral_force_map(Rider::Charlie), lateral_force_map(Rider::Luke));
    }

    #[test]
    fn matrices_one_row_per_speed() {
        let model =
            FirstPrinciplesModel::with_inputs("Jason", InputSet::SteerTorqueAndLateralForce)
                .unwrap();
        let speeds = [0.0, 2.5, 5.0];
        let table = model.matrices(&speeds).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns.len(), 12);
        assert_eq!(table.speeds(), speeds.to_vec());
        let (a, _) = model.state_space(5.0).unwrap();
        assert_eq!(table.column("a43").unwrap()[2], a[(3, 2)]);
        // no velocity dependent damping at standstill
        assert_eq!(table.column("a33").unwrap()[0], 0.0);
    }

    #[test]
    fn response_and_locus_shapes() {
        let model = FirstPrinciplesModel::new("Jason").unwrap();
        let grid = [0.1, 1.0, 10.0];
        let r = model.magnitude_phase(3.0, &grid).unwrap();
        assert_eq!(r.len(), 3);
        assert!(r.magnitude.iter().flatten().all(|m| m.is_finite() && *m > 0.0));

        let locus = model.root_locus(&[1.0, 2.0]).unwrap();
        assert_eq!(locus.len(), 8);
    }
}
