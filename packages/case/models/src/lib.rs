#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case record, status, gender, and regional aggregate types.
//!
//! Every case feed produces [`RawCaseRecord`] rows with free-text fields.
//! The normalizer turns those into [`CaseRecord`] values with closed enums,
//! and the aggregator folds them into one [`RegionalAggregate`] per region.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Placeholder label for records whose region field is empty.
pub const UNKNOWN_REGION: &str = "Unknown";

/// Clinical status of a single case.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum CaseStatus {
    /// Currently infected (the feed's "Hospitalized" folds into this).
    Active,
    /// Died while infected.
    Deceased,
    /// Moved out of the reporting region.
    Migrated,
    /// Recovered and discharged.
    Recovered,
}

impl CaseStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Active, Self::Deceased, Self::Migrated, Self::Recovered]
    }
}

/// Reported gender of a single case.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    /// Male
    #[strum(to_string = "male", serialize = "m")]
    Male,
    /// Female
    #[strum(to_string = "female", serialize = "f")]
    Female,
    /// Missing or blank in the source record
    Unknown,
}

impl Gender {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Male, Self::Female, Self::Unknown]
    }
}

/// A case row exactly as the feed reports it.
///
/// Every field is free text. Missing and `null` fields both deserialize as
/// the empty string so the normalizer sees a single "blank" representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCaseRecord {
    /// Gender as reported (`"M"`, `"F"`, `""`, ...).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub gender: String,
    /// City of detection.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    /// District of detection.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub district: String,
    /// State-level region. Used as the aggregation key.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    /// Status as reported (`"Hospitalized"`, `"Recovered"`, ...).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A case record with closed status and gender categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    /// Normalized gender.
    pub gender: Gender,
    /// City of detection, verbatim.
    pub city: String,
    /// District of detection, verbatim.
    pub district: String,
    /// Region key, verbatim (may be empty).
    pub region: String,
    /// Normalized status.
    pub status: CaseStatus,
}

/// Summed case counts for one region.
///
/// Each record contributes exactly one status count, one gender count and
/// one to `total`, so both breakdowns always sum to `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalAggregate {
    /// Region key exactly as it appeared in the records.
    pub region: String,
    /// Cases with status `Active`.
    pub active: u64,
    /// Cases with status `Deceased`.
    pub deceased: u64,
    /// Cases with status `Migrated`.
    pub migrated: u64,
    /// Cases with status `Recovered`.
    pub recovered: u64,
    /// Male cases.
    pub male: u64,
    /// Female cases.
    pub female: u64,
    /// Cases with no reported gender.
    pub gender_unknown: u64,
    /// All cases in the region.
    pub total: u64,
}

impl RegionalAggregate {
    /// Creates an all-zero aggregate for `region`.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Counts one case with the given status and gender.
    pub const fn add(&mut self, status: CaseStatus, gender: Gender) {
        match status {
            CaseStatus::Active => self.active += 1,
            CaseStatus::Deceased => self.deceased += 1,
            CaseStatus::Migrated => self.migrated += 1,
            CaseStatus::Recovered => self.recovered += 1,
        }
        match gender {
            Gender::Male => self.male += 1,
            Gender::Female => self.female += 1,
            Gender::Unknown => self.gender_unknown += 1,
        }
        self.total += 1;
    }

    /// Adds another aggregate's counts into this one. The region key of
    /// `self` is kept.
    pub const fn merge(&mut self, other: &Self) {
        self.active += other.active;
        self.deceased += other.deceased;
        self.migrated += other.migrated;
        self.recovered += other.recovered;
        self.male += other.male;
        self.female += other.female;
        self.gender_unknown += other.gender_unknown;
        self.total += other.total;
    }

    /// Returns the count for a single status.
    #[must_use]
    pub const fn status_count(&self, status: CaseStatus) -> u64 {
        match status {
            CaseStatus::Active => self.active,
            CaseStatus::Deceased => self.deceased,
            CaseStatus::Migrated => self.migrated,
            CaseStatus::Recovered => self.recovered,
        }
    }

    /// Returns the count for a single gender.
    #[must_use]
    pub const fn gender_count(&self, gender: Gender) -> u64 {
        match gender {
            Gender::Male => self.male,
            Gender::Female => self.female,
            Gender::Unknown => self.gender_unknown,
        }
    }

    /// Returns `true` when both the status and gender breakdowns sum to
    /// `total`.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.active + self.deceased + self.migrated + self.recovered == self.total
            && self.male + self.female + self.gender_unknown == self.total
    }

    /// Returns `true` if the records carried no region (an empty or
    /// all-whitespace key).
    #[must_use]
    pub fn is_unlabelled(&self) -> bool {
        self.region.trim().is_empty()
    }

    /// Returns the region name for display and storage, substituting
    /// [`UNKNOWN_REGION`] for a blank key.
    #[must_use]
    pub fn region_label(&self) -> &str {
        if self.is_unlabelled() {
            UNKNOWN_REGION
        } else {
            &self.region
        }
    }
}
