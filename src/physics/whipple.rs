//! Linearized Whipple bicycle in the benchmark canonical form
//!
//! `M q̈ + v C1 q̇ + (g K0 + v² K2) q = [Tφ, Tδ]ᵀ` with `q = [φ, δ]`
//! (Meijaard, Papadopoulos, Ruina, Schwab 2007, appendix A).

use nalgebra::{Matrix2, Matrix4, Matrix4x2};

use super::parameters::{Parameter as P, ParameterSet};
use crate::error::{Error, Result};

/// Coefficient matrices of the canonical equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalMatrices {
    pub m: Matrix2<f64>,
    pub c1: Matrix2<f64>,
    pub k0: Matrix2<f64>,
    pub k2: Matrix2<f64>,
}

pub fn canonical_matrices(p: &ParameterSet) -> CanonicalMatrices {
    let (w, c, lam) = (p.get(P::Wheelbase), p.get(P::Trail), p.get(P::SteerAxisTilt));
    let (r_r, m_r) = (p.get(P::RearRadius), p.get(P::RearMass));
    let (i_rxx, i_ryy) = (p.get(P::RearIxx), p.get(P::RearIyy));
    let (x_b, z_b, m_b) = (p.get(P::FrameX), p.get(P::FrameZ), p.get(P::FrameMass));
    let (i_bxx, i_bzz, i_bxz) = (p.get(P::FrameIxx), p.get(P::FrameIzz), p.get(P::FrameIxz));
    let (x_h, z_h, m_h) = (p.get(P::ForkX), p.get(P::ForkZ), p.get(P::ForkMass));
    let (i_hxx, i_hzz, i_hxz) = (p.get(P::ForkIxx), p.get(P::ForkIzz), p.get(P::ForkIxz));
    let (r_f, m_f) = (p.get(P::FrontRadius), p.get(P::FrontMass));
    let (i_fxx, i_fyy) = (p.get(P::FrontIxx), p.get(P::FrontIyy));

    let (sin_lam, cos_lam) = lam.sin_cos();

    // whole bicycle
    let m_t = m_r + m_b + m_h + m_f;
    let x_t = (x_b * m_b + x_h * m_h + w * m_f) / m_t;
    let z_t = (-r_r * m_r + z_b * m_b + z_h * m_h - r_f * m_f) / m_t;
    let i_txx = i_rxx + i_bxx + i_hxx + i_fxx
        + m_r * r_r * r_r
        + m_b * z_b * z_b
        + m_h * z_h * z_h
        + m_f * r_f * r_f;
    let i_txz = i_bxz + i_hxz - m_b * x_b * z_b - m_h * x_h * z_h + m_f * w * r_f;
    // wheels are axisymmetric
    let i_rzz = i_rxx;
    let i_fzz = i_fxx;
    let i_tzz = i_rzz + i_bzz + i_hzz + i_fzz + m_b * x_b * x_b + m_h * x_h * x_h + m_f * w * w;

    // front assembly
    let m_a = m_h + m_f;
    let x_a = (x_h * m_h + w * m_f) / m_a;
    let z_a = (z_h * m_h - r_f * m_f) / m_a;
    let i_axx = i_hxx + i_fxx + m_h * (z_h - z_a).powi(2) + m_f * (r_f + z_a).powi(2);
    let i_axz = i_hxz - m_h * (x_h - x_a) * (z_h - z_a) + m_f * (w - x_a) * (r_f + z_a);
    let i_azz = i_hzz + i_fzz + m_h * (x_h - x_a).powi(2) + m_f * (w - x_a).powi(2);
    let u_a = (x_a - w - c) * cos_lam - z_a * sin_lam;
    let i_all = m_a * u_a * u_a
        + i_axx * sin_lam * sin_lam
        + 2.0 * i_axz * sin_lam * cos_lam
        + i_azz * cos_lam * cos_lam;
    let i_alx = -m_a * u_a * z_a + i_axx * sin_lam + i_axz * cos_lam;
    let i_alz = m_a * u_a * x_a + i_axz * sin_lam + i_azz * cos_lam;

    let mu = c / w * cos_lam;
    let s_r = i_ryy / r_r;
    let s_f = i_fyy / r_f;
    let s_t = s_r + s_f;
    let s_a = m_a * u_a + mu * m_t * x_t;

    let m = Matrix2::new(
        i_txx,
        i_alx + mu * i_txz,
        i_alx + mu * i_txz,
        i_all + 2.0 * mu * i_alz + mu * mu * i_tzz,
    );
    let k0 = Matrix2::new(m_t * z_t, -s_a, -s_a, -s_a * sin_lam);
    let k2 = Matrix2::new(
        0.0,
        (s_t - m_t * z_t) / w * cos_lam,
        0.0,
        (s_a + s_f * sin_lam) / w * cos_lam,
    );
    let c1 = Matrix2::new(
        0.0,
        mu * s_t + s_f * cos_lam + i_txz / w * cos_lam - mu * m_t * z_t,
        -(mu * s_t + s_f * cos_lam),
        i_alz / w * cos_lam + mu * (s_a + i_tzz / w * cos_lam),
    );

    CanonicalMatrices { m, c1, k0, k2 }
}

/// First-order form at `speed`: states `[φ, δ, φ̇, δ̇]`, inputs `[Tφ, Tδ]`.
pub fn state_space(p: &ParameterSet, speed: f64) -> Result<(Matrix4<f64>, Matrix4x2<f64>)> {
    let CanonicalMatrices { m, c1, k0, k2 } = canonical_matrices(p);
    let m_inv = m
        .try_inverse()
        .ok_or_else(|| Error::MalformedInput("Whipple mass matrix is singular".into()))?;
    let g = p.get(P::Gravity);

    let stiffness = -m_inv * (g * k0 + speed * speed * k2);
    let damping = -m_inv * (speed * c1);

    let mut a = Matrix4::zeros();
    a.fixed_view_mut::<2, 2>(0, 2).copy_from(&Matrix2::identity());
    a.fixed_view_mut::<2, 2>(2, 0).copy_from(&stiffness);
    a.fixed_view_mut::<2, 2>(2, 2).copy_from(&damping);

    let mut b = Matrix4x2::zeros();
    b.fixed_view_mut::<2, 2>(2, 0).copy_from(&m_inv);

    Ok((a, b))
}
