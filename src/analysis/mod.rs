/// Signals derived from identified or first-principles state-space models.
///
/// ```text
///   RunCollection ──► response   Bode magnitude/phase, subset mean ± std
///                 ├─► eigen      eigenvalues, root-locus points
///                 └─► coefficients  acceleration-equation entries
/// ```

pub mod coefficients;
pub mod eigen;
pub mod response;
pub mod stats;
