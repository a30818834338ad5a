use nalgebra::{Complex, Matrix4, Vector4};

use crate::data::model::Subset;

/// The four eigenvalues of a state matrix, in decomposition order.
pub type Eigenvalues = Vector4<Complex<f64>>;

/// Imaginary parts smaller than this are treated as real.
pub const OSCILLATION_TOLERANCE: f64 = 1e-9;

/// Eigenvalues of a 4×4 state matrix.
///
/// The order is whatever the Schur decomposition yields and is not
/// consistent from one matrix to the next.
pub fn eigenvalues(a: &Matrix4<f64>) -> Eigenvalues {
    a.complex_eigenvalues()
}

/// Whether an eigenvalue belongs to an oscillatory (complex pair) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Oscillatory,
    Real,
}

impl ModeKind {
    pub fn classify(value: Complex<f64>) -> Self {
        if value.im.abs() > OSCILLATION_TOLERANCE {
            ModeKind::Oscillatory
        } else {
            ModeKind::Real
        }
    }
}

/// One eigenvalue placed on a root-locus plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocusPoint {
    pub speed: f64,
    pub value: Complex<f64>,
    pub mode: ModeKind,
}

impl LocusPoint {
    pub fn new(speed: f64, value: Complex<f64>) -> Self {
        LocusPoint {
            speed,
            value,
            mode: ModeKind::classify(value),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.value.re < 0.0
    }
}

/// Cached eigenvalues of a subset paired with each run's speed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubsetEigenvalues {
    pub speeds: Vec<f64>,
    pub eigenvalues: Vec<Eigenvalues>,
}

impl SubsetEigenvalues {
    pub fn len(&self) -> usize {
        self.speeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty()
    }

    /// Every eigenvalue flattened to (speed, value, mode) points.
    pub fn locus_points(&self) -> Vec<LocusPoint> {
        locus_points(&self.speeds, &self.eigenvalues)
    }
}

/// Project the collection's cached eigenvalues onto a subset.
pub fn subset_eigenvalues(subset: &Subset<'_>) -> SubsetEigenvalues {
    SubsetEigenvalues {
        speeds: subset.speeds(),
        eigenvalues: subset.eigenvalues().copied().collect(),
    }
}

pub(crate) fn locus_points(speeds: &[f64], eigenvalues: &[Eigenvalues]) -> Vec<LocusPoint> {
    speeds
        .iter()
        .zip(eigenvalues)
        .flat_map(|(&speed, eig)| eig.iter().map(move |&v| LocusPoint::new(speed, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sorted_by_re_im(e: &Eigenvalues) -> Vec<Complex<f64>> {
        let mut v: Vec<Complex<f64>> = e.iter().copied().collect();
        v.sort_by(|a, b| a.re.total_cmp(&b.re).then(a.im.total_cmp(&b.im)));
        v
    }

    #[test]
    fn block_diagonal_eigenvalues() {
        let a = Matrix4::new(
            0.0, 1.0, 0.0, 0.0, //
            -1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, -2.0, 0.0, //
            0.0, 0.0, 0.0, -3.0,
        );
        let e = sorted_by_re_im(&eigenvalues(&a));
        assert_eq!(e.len(), 4);
        assert_relative_eq!(e[0].re, -3.0, epsilon = 1e-9);
        assert_relative_eq!(e[1].re, -2.0, epsilon = 1e-9);
        assert_relative_eq!(e[2].re, 0.0, epsilon = 1e-9);
        assert_relative_eq!(e[2].im, -1.0, epsilon = 1e-9);
        assert_relative_eq!(e[3].im, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn mode_classification() {
        let points = locus_points(
            &[4.0],
            &[Vector4::new(
                Complex::new(-1.0, 2.0),
                Complex::new(-1.0, -2.0),
                Complex::new(0.5, 0.0),
                Complex::new(-9.0, 0.0),
            )],
        );
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].mode, ModeKind::Oscillatory);
        assert_eq!(points[2].mode, ModeKind::Real);
        assert!(!points[2].is_stable());
        assert!(points[3].is_stable());
        assert!(points.iter().all(|p| p.speed == 4.0));
    }
}
