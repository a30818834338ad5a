//! Compare system-identified bicycle models against first-principles
//! Whipple models.
//!
//! Runs are loaded from a matrix file and joined with a run table
//! ([`data`]), filtered into subsets, and summarised as acceleration
//! coefficients, Bode curves and root loci ([`analysis`]). Per-rider Whipple
//! models ([`physics`]) produce the same summaries for comparison.
//! [`session::Session`] ties these together for a viewer.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod physics;
pub mod session;

pub use config::Config;
pub use data::filter::{filter, Category, FilterCriteria, SpeedBin};
pub use data::loader::load;
pub use data::metadata::{MetadataSource, MetadataTable};
pub use data::model::{FrequencyGrid, RunCollection, RunRecord, Subset};
pub use error::{Error, Result};
pub use physics::{FirstPrinciplesModel, InputSet, Parameter, Rider};
pub use session::Session;
