//! Population reference table (CSV).

use epi_risk_population_models::PopulationRow;

use crate::{FeedConfig, SourceError, retry};

/// Downloads and parses the population CSV.
///
/// # Errors
///
/// Returns [`SourceError`] if the download fails or the CSV cannot be
/// parsed.
pub async fn fetch_population(
    client: &reqwest::Client,
    config: &FeedConfig,
) -> Result<Vec<PopulationRow>, SourceError> {
    log::info!("Fetching population table from {}", config.population_csv_url);
    let text = retry::send_text(|| client.get(&config.population_csv_url)).await?;
    let rows = parse_population_csv(&text, &config.region_column, &config.population_column)?;
    log::info!("Population table has {} rows", rows.len());
    Ok(rows)
}

/// Reads `(region, population)` pairs from CSV text with a header row.
///
/// Only the two named columns are read; any others are ignored. Thousands
/// separators in the population are accepted. Rows with a blank region are
/// skipped.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] if either column is missing from the
/// header or a population is not a non-negative integer, and
/// [`SourceError::Csv`] for structural CSV errors.
pub fn parse_population_csv(
    text: &str,
    region_column: &str,
    population_column: &str,
) -> Result<Vec<PopulationRow>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SourceError::Malformed {
                message: format!("population CSV has no {name:?} column"),
            })
    };
    let region_idx = column(region_column)?;
    let population_idx = column(population_column)?;

    let mut rows = Vec::new();
    let mut skipped = 0_usize;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let region = record.get(region_idx).unwrap_or_default();
        if region.is_empty() {
            skipped += 1;
            continue;
        }

        let raw = record.get(population_idx).unwrap_or_default();
        let population = raw
            .replace(',', "")
            .parse::<u64>()
            .map_err(|e| SourceError::Malformed {
                message: format!(
                    "row {} ({region}): population {raw:?} is not a count: {e}",
                    line + 2
                ),
            })?;

        rows.push(PopulationRow::new(region, population));
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} population rows with no region name");
    }

    Ok(rows)
}
