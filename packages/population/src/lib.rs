#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region-name normalization, population join, and infection ratios.
//!
//! Population figures come from a finer-grained reference table (one row
//! per district). [`PopulationJoiner`] rolls that table up to regions,
//! matches it against the case aggregates by normalized name, applies the
//! manual override table, and computes the infected fraction for every
//! region with a known population.

pub mod join;
pub mod names;
pub mod ratio;

pub use join::{JoinWarning, Joined, PopulationJoiner, PopulationTable};
pub use names::{RegionNames, canonical_name};
pub use ratio::infected_fraction;
