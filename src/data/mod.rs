/// Data layer: run records, loading, and subsetting.
///
/// Architecture:
/// ```text
///  .json / .parquet / .csv        run table (.csv)
///        │                              │
///        ▼                              ▼
///   ┌──────────┐                 ┌────────────┐
///   │  loader   │ ◄── join ───── │  metadata   │
///   └──────────┘                 └────────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ RunCollection  │  Vec<RunRecord>, cached responses + eigenvalues
///   └───────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply criteria → Subset (ordered indices)
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod metadata;
pub mod model;
