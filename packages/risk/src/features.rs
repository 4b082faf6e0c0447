//! Feature matrix construction and whitening.

use epi_risk_population_models::PopulatedAggregate;
use ndarray::{Array2, Axis};

use crate::RankError;

/// Feature columns fed to the clustering, in matrix column order.
pub const FEATURE_COLUMNS: &[&str] = &[
    "active",
    "deceased",
    "migrated",
    "recovered",
    "total",
    "population",
    "infectedFraction",
];

/// Keeps only rows whose every feature is known.
///
/// A row missing its population (and therefore its ratio) is dropped whole;
/// no value is imputed.
#[must_use]
pub fn complete_rows(rows: &[PopulatedAggregate]) -> Vec<&PopulatedAggregate> {
    rows.iter()
        .filter(|row| {
            let keep = row.has_population();
            if !keep {
                log::debug!("Dropping {:?} from ranking: no population", row.region());
            }
            keep
        })
        .collect()
}

/// Builds the `rows x FEATURE_COLUMNS` matrix.
///
/// # Errors
///
/// Returns [`RankError::InvalidFeatureMatrix`] if a row is missing its
/// population or ratio, or any value is not finite.
#[allow(clippy::cast_precision_loss)]
pub fn feature_matrix(rows: &[&PopulatedAggregate]) -> Result<Array2<f64>, RankError> {
    let mut data = Vec::with_capacity(rows.len() * FEATURE_COLUMNS.len());

    for row in rows {
        let (Some(population), Some(fraction)) = (row.population, row.infected_fraction) else {
            return Err(RankError::InvalidFeatureMatrix {
                region: row.region().to_string(),
                message: "missing population".to_string(),
            });
        };
        let agg = &row.aggregate;
        let values = [
            agg.active as f64,
            agg.deceased as f64,
            agg.migrated as f64,
            agg.recovered as f64,
            agg.total as f64,
            population as f64,
            fraction,
        ];
        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(RankError::InvalidFeatureMatrix {
                region: row.region().to_string(),
                message: format!("non-finite {}", FEATURE_COLUMNS[bad]),
            });
        }
        data.extend_from_slice(&values);
    }

    Array2::from_shape_vec((rows.len(), FEATURE_COLUMNS.len()), data).map_err(|e| {
        RankError::InvalidFeatureMatrix {
            region: String::new(),
            message: e.to_string(),
        }
    })
}

/// Divides every column by its population standard deviation.
///
/// Columns are not centered. A column with zero spread is left as is, so
/// it contributes nothing to distances instead of turning into NaN.
#[must_use]
pub fn whiten(features: &Array2<f64>) -> Array2<f64> {
    if features.nrows() == 0 {
        return features.clone();
    }
    let std = features
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 0.0 { s } else { 1.0 });
    features / &std
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use epi_risk_case_models::RegionalAggregate;
    use ndarray::array;

    use super::*;

    fn row(region: &str, total: u64, population: Option<u64>) -> PopulatedAggregate {
        let mut aggregate = RegionalAggregate::new(region);
        aggregate.total = total;
        aggregate.active = total;
        #[allow(clippy::cast_precision_loss)]
        let infected_fraction = population.map(|p| total as f64 / p as f64);
        PopulatedAggregate {
            aggregate,
            population,
            infected_fraction,
        }
    }

    #[test]
    fn drops_rows_without_population() {
        let rows = vec![row("A", 1, Some(10)), row("B", 2, None), row("C", 3, Some(30))];
        let kept: Vec<_> = complete_rows(&rows)
            .into_iter()
            .map(PopulatedAggregate::region)
            .collect();
        assert_eq!(kept, ["A", "C"]);
    }

    #[test]
    fn matrix_has_one_column_per_feature() {
        let rows = [row("A", 5, Some(100)), row("B", 7, Some(700))];
        let refs: Vec<_> = rows.iter().collect();
        let matrix = feature_matrix(&refs).unwrap();

        assert_eq!(matrix.dim(), (2, FEATURE_COLUMNS.len()));
        assert_relative_eq!(matrix[[0, 4]], 5.0);
        assert_relative_eq!(matrix[[1, 5]], 700.0);
        assert_relative_eq!(matrix[[0, 6]], 0.05);
    }

    #[test]
    fn null_population_is_invalid_matrix() {
        let rows = [row("A", 5, None)];
        let refs: Vec<_> = rows.iter().collect();
        assert!(matches!(
            feature_matrix(&refs),
            Err(RankError::InvalidFeatureMatrix { .. })
        ));
    }

    #[test]
    fn whitening_gives_unit_variance_without_centering() {
        let x = array![[1.0, 10.0], [3.0, 30.0], [5.0, 50.0]];
        let w = whiten(&x);

        let std = w.std_axis(Axis(0), 0.0);
        assert_relative_eq!(std[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(std[1], 1.0, epsilon = 1e-12);
        // Ratios within a column survive, so nothing was subtracted.
        assert_relative_eq!(w[[2, 0]] / w[[0, 0]], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_column_is_left_alone() {
        let x = array![[2.0, 1.0], [2.0, 3.0]];
        let w = whiten(&x);
        assert_relative_eq!(w[[0, 0]], 2.0);
        assert_relative_eq!(w[[1, 0]], 2.0);
    }
}
