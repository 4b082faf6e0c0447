//! Status and gender normalization.
//!
//! Maps the feed's free-text fields to [`CaseStatus`] and [`Gender`]. The
//! category sets are closed: values that match nothing are rejected rather
//! than turned into new categories.

use epi_risk_case_models::{CaseRecord, CaseStatus, Gender, RawCaseRecord};

use crate::AggregateError;

/// Raw status the feed uses for cases that are still infected.
const HOSPITALIZED: &str = "Hospitalized";

/// Maps a raw status string to a [`CaseStatus`].
///
/// `"Hospitalized"` becomes [`CaseStatus::Active`]. Anything else must name
/// one of the four statuses (surrounding whitespace and ASCII case are
/// ignored).
///
/// # Errors
///
/// Returns [`AggregateError::UnrecognizedStatus`] if the value names no
/// known status, including the empty string.
pub fn normalize_status(raw: &str) -> Result<CaseStatus, AggregateError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(HOSPITALIZED) {
        return Ok(CaseStatus::Active);
    }
    trimmed
        .parse()
        .map_err(|_| AggregateError::UnrecognizedStatus {
            value: raw.to_string(),
        })
}

/// Maps a raw gender string to a [`Gender`].
///
/// Blank values become [`Gender::Unknown`]. Everything else is lower-cased
/// and matched against `male`/`m`, `female`/`f` and `unknown`.
///
/// # Errors
///
/// Returns [`AggregateError::UnrecognizedGender`] for any other non-blank
/// value.
pub fn normalize_gender(raw: &str) -> Result<Gender, AggregateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Gender::Unknown);
    }
    trimmed
        .to_lowercase()
        .parse()
        .map_err(|_| AggregateError::UnrecognizedGender {
            value: raw.to_string(),
        })
}

/// Normalizes a single feed row.
///
/// City, district and region are carried over verbatim.
///
/// # Errors
///
/// Returns [`AggregateError`] if the status or gender cannot be mapped.
pub fn normalize_record(raw: &RawCaseRecord) -> Result<CaseRecord, AggregateError> {
    Ok(CaseRecord {
        gender: normalize_gender(&raw.gender)?,
        city: raw.city.clone(),
        district: raw.district.clone(),
        region: raw.state.clone(),
        status: normalize_status(&raw.status)?,
    })
}

/// Normalizes a batch of feed rows, stopping at the first bad one.
///
/// # Errors
///
/// Returns [`AggregateError::Record`] wrapping the failure of the first row
/// that cannot be normalized.
pub fn normalize_records(raw: &[RawCaseRecord]) -> Result<Vec<CaseRecord>, AggregateError> {
    let records = raw
        .iter()
        .enumerate()
        .map(|(index, row)| {
            normalize_record(row).map_err(|e| AggregateError::Record {
                index,
                source: Box::new(e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Normalized {} case records", records.len());

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(gender: &str, state: &str, status: &str) -> RawCaseRecord {
        RawCaseRecord {
            gender: gender.to_string(),
            city: "Kochi".to_string(),
            district: "Ernakulam".to_string(),
            state: state.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn hospitalized_becomes_active() {
        assert_eq!(normalize_status("Hospitalized"), Ok(CaseStatus::Active));
        assert_eq!(normalize_status(" hospitalized "), Ok(CaseStatus::Active));
    }

    #[test]
    fn known_statuses_pass_through() {
        assert_eq!(normalize_status("Active"), Ok(CaseStatus::Active));
        assert_eq!(normalize_status("Deceased"), Ok(CaseStatus::Deceased));
        assert_eq!(normalize_status("Migrated"), Ok(CaseStatus::Migrated));
        assert_eq!(normalize_status("Recovered"), Ok(CaseStatus::Recovered));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(
            normalize_status("Quarantined"),
            Err(AggregateError::UnrecognizedStatus {
                value: "Quarantined".to_string()
            })
        );
        assert!(normalize_status("").is_err());
    }

    #[test]
    fn blank_gender_is_unknown() {
        assert_eq!(normalize_gender(""), Ok(Gender::Unknown));
        assert_eq!(normalize_gender("   \t"), Ok(Gender::Unknown));
    }

    #[test]
    fn gender_is_lowercased_before_matching() {
        assert_eq!(normalize_gender("M"), Ok(Gender::Male));
        assert_eq!(normalize_gender("Female"), Ok(Gender::Female));
        assert_eq!(normalize_gender("UNKNOWN"), Ok(Gender::Unknown));
        assert!(matches!(
            normalize_gender("other"),
            Err(AggregateError::UnrecognizedGender { .. })
        ));
    }

    #[test]
    fn record_keeps_location_fields_verbatim() {
        let record = normalize_record(&raw("F", "kerala ", "Hospitalized")).unwrap();
        assert_eq!(record.region, "kerala ");
        assert_eq!(record.city, "Kochi");
        assert_eq!(record.district, "Ernakulam");
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.status, CaseStatus::Active);
    }

    #[test]
    fn batch_reports_failing_index() {
        let rows = vec![
            raw("M", "Goa", "Recovered"),
            raw("F", "Goa", "Recovered"),
            raw("F", "Goa", "Cured"),
        ];
        let err = normalize_records(&rows).unwrap_err();
        match err {
            AggregateError::Record { index, source } => {
                assert_eq!(index, 2);
                assert!(matches!(*source, AggregateError::UnrecognizedStatus { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
