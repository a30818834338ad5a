use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Rider
// ---------------------------------------------------------------------------

/// Riders with calibrated first-principles models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rider {
    Charlie,
    Jason,
    Luke,
}

impl Rider {
    pub const ALL: [Rider; 3] = [Rider::Charlie, Rider::Jason, Rider::Luke];

    pub fn name(self) -> &'static str {
        match self {
            Rider::Charlie => "Charlie",
            Rider::Jason => "Jason",
            Rider::Luke => "Luke",
        }
    }

    /// The bicycle each rider was measured on.
    pub fn bicycle(self) -> &'static str {
        match self {
            Rider::Jason => "Rigid",
            Rider::Charlie | Rider::Luke => "Rigidcl",
        }
    }

    /// Benchmark parameters of the rigid rider seated on [`Rider::bicycle`].
    ///
    /// These are approximate placeholders; calibrated values are supplied
    /// through `<parameter_dir>/<Rider>.json` (see [`ParameterSet::for_rider`]).
    pub fn default_parameters(self) -> ParameterSet {
        let values = match self {
            Rider::Jason => [
                1.121, 0.0686, 0.3992, 9.81, 0.3407, 3.11, 0.0904, 0.1514, 0.3111, -1.0557, 94.98,
                12.38, 13.56, 3.26, 2.68, 0.8741, -0.7361, 3.22, 0.2538, 0.2437, 0.0713, -0.0549,
                0.3432, 2.02, 0.0985, 0.1405,
            ],
            Rider::Charlie => [
                1.121, 0.0577, 0.3992, 9.81, 0.3409, 3.11, 0.0904, 0.1514, 0.2976, -1.0218, 82.31,
                10.14, 11.42, 2.81, 2.21, 0.8741, -0.7361, 3.22, 0.2538, 0.2437, 0.0713, -0.0549,
                0.3430, 2.02, 0.0985, 0.1405,
            ],
            Rider::Luke => [
                1.121, 0.0577, 0.3992, 9.81, 0.3409, 3.11, 0.0904, 0.1514, 0.3029, -1.0874, 83.58,
                11.47, 12.61, 2.74, 2.36, 0.8741, -0.7361, 3.22, 0.2538, 0.2437, 0.0713, -0.0549,
                0.3430, 2.02, 0.0985, 0.1405,
            ],
        };
        ParameterSet { values }
    }
}

impl fmt::Display for Rider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exact, case-sensitive match on the rider's name.
impl FromStr for Rider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Rider::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| Error::InvalidRider(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// Benchmark Whipple model parameters (Meijaard et al. 2007 notation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    Wheelbase,
    Trail,
    SteerAxisTilt,
    Gravity,
    RearRadius,
    RearMass,
    RearIxx,
    RearIyy,
    FrameX,
    FrameZ,
    FrameMass,
    FrameIxx,
    FrameIyy,
    FrameIzz,
    FrameIxz,
    ForkX,
    ForkZ,
    ForkMass,
    ForkIxx,
    ForkIyy,
    ForkIzz,
    ForkIxz,
    FrontRadius,
    FrontMass,
    FrontIxx,
    FrontIyy,
}

impl Parameter {
    pub const COUNT: usize = 26;

    pub const ALL: [Parameter; Parameter::COUNT] = [
        Parameter::Wheelbase,
        Parameter::Trail,
        Parameter::SteerAxisTilt,
        Parameter::Gravity,
        Parameter::RearRadius,
        Parameter::RearMass,
        Parameter::RearIxx,
        Parameter::RearIyy,
        Parameter::FrameX,
        Parameter::FrameZ,
        Parameter::FrameMass,
        Parameter::FrameIxx,
        Parameter::FrameIyy,
        Parameter::FrameIzz,
        Parameter::FrameIxz,
        Parameter::ForkX,
        Parameter::ForkZ,
        Parameter::ForkMass,
        Parameter::ForkIxx,
        Parameter::ForkIyy,
        Parameter::ForkIzz,
        Parameter::ForkIxz,
        Parameter::FrontRadius,
        Parameter::FrontMass,
        Parameter::FrontIxx,
        Parameter::FrontIyy,
    ];

    /// Benchmark symbol, as used in parameter files.
    pub fn symbol(self) -> &'static str {
        match self {
            Parameter::Wheelbase => "w",
            Parameter::Trail => "c",
            Parameter::SteerAxisTilt => "lam",
            Parameter::Gravity => "g",
            Parameter::RearRadius => "rR",
            Parameter::RearMass => "mR",
            Parameter::RearIxx => "IRxx",
            Parameter::RearIyy => "IRyy",
            Parameter::FrameX => "xB",
            Parameter::FrameZ => "zB",
            Parameter::FrameMass => "mB",
            Parameter::FrameIxx => "IBxx",
            Parameter::FrameIyy => "IByy",
            Parameter::FrameIzz => "IBzz",
            Parameter::FrameIxz => "IBxz",
            Parameter::ForkX => "xH",
            Parameter::ForkZ => "zH",
            Parameter::ForkMass => "mH",
            Parameter::ForkIxx => "IHxx",
            Parameter::ForkIyy => "IHyy",
            Parameter::ForkIzz => "IHzz",
            Parameter::ForkIxz => "IHxz",
            Parameter::FrontRadius => "rF",
            Parameter::FrontMass => "mF",
            Parameter::FrontIxx => "IFxx",
            Parameter::FrontIyy => "IFyy",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.symbol() == s)
            .ok_or_else(|| Error::UnknownParameter(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ParameterSet
// ---------------------------------------------------------------------------

/// A value for every [`Parameter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    values: [f64; Parameter::COUNT],
}

impl ParameterSet {
    /// The published benchmark bicycle (rigid rider, no rider calibration).
    pub fn benchmark() -> Self {
        ParameterSet {
            values: [
                1.02,
                0.08,
                std::f64::consts::PI / 10.0,
                9.81,
                0.3,
                2.0,
                0.0603,
                0.12,
                0.3,
                -0.9,
                85.0,
                9.2,
                11.0,
                2.8,
                2.4,
                0.9,
                -0.7,
                4.0,
                0.05892,
                0.06,
                0.00708,
                -0.00756,
                0.35,
                3.0,
                0.1405,
                0.28,
            ],
        }
    }

    pub fn get(&self, parameter: Parameter) -> f64 {
        self.values[parameter.index()]
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        self.values[parameter.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f64)> + '_ {
        Parameter::ALL.into_iter().map(|p| (p, self.get(p)))
    }

    /// Symbol → value, sorted by symbol.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        self.iter().map(|(p, v)| (p.symbol(), v)).collect()
    }

    /// Override entries from a JSON object of `symbol: value` pairs.
    /// Symbols are resolved up front; an unknown one rejects the whole file.
    pub fn with_overrides_from_json(mut self, text: &str) -> Result<Self> {
        let raw: BTreeMap<String, f64> = serde_json::from_str(text)?;
        let resolved = raw
            .iter()
            .map(|(name, &value)| Ok((name.parse::<Parameter>()?, value)))
            .collect::<Result<Vec<_>>>()?;
        for (p, v) in resolved {
            self.set(p, v);
        }
        Ok(self)
    }

    /// Read `<dir>/<Rider>.json` over the rider's defaults. A missing file
    /// keeps the defaults.
    pub fn for_rider(rider: Rider, dir: Option<&Path>) -> Result<Self> {
        let defaults = rider.default_parameters();
        let Some(dir) = dir else {
            return Ok(defaults);
        };
        let path = dir.join(format!("{}.json", rider.name()));
        if !path.exists() {
            debug!("No parameter file at {}, using defaults for {rider}", path.display());
            return Ok(defaults);
        }
        let text = std::fs::read_to_string(&path)?;
        debug!("Reading {rider} parameters from {}", path.display());
        defaults.with_overrides_from_json(&text)
    }
}
