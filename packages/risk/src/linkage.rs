//! Agglomerative clustering with Ward linkage.
//!
//! Produces a linkage table in the usual layout: `n - 1` merges sorted by
//! height, where ids `0..n` are the input rows and id `n + i` is the cluster
//! formed by merge `i`. Each merge lists its lower child id first.

use ndarray::{Array2, ArrayView1};

use crate::RankError;

/// One agglomeration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Lower child cluster id.
    pub left: usize,
    /// Higher child cluster id.
    pub right: usize,
    /// Ward distance between the two children.
    pub height: f64,
    /// Number of rows under the new cluster.
    pub size: usize,
}

fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Lance-Williams update for Ward linkage, on squared distances.
#[allow(clippy::cast_precision_loss)]
fn ward_update(d_ki: f64, d_kj: f64, d_ij: f64, n_i: usize, n_j: usize, n_k: usize) -> f64 {
    let (n_i, n_j, n_k) = (n_i as f64, n_j as f64, n_k as f64);
    let squared = (n_k + n_i).mul_add(d_ki * d_ki, (n_k + n_j) * d_kj * d_kj) - n_k * d_ij * d_ij;
    (squared / (n_i + n_j + n_k)).max(0.0).sqrt()
}

/// Clusters the rows of `points` bottom-up, always merging the pair whose
/// union least increases total within-cluster variance.
///
/// Ties are broken by the lowest row index pair, so the result depends only
/// on the input order.
///
/// # Errors
///
/// Returns [`RankError::InsufficientData`] for fewer than two rows.
pub fn ward_linkage(points: &Array2<f64>) -> Result<Vec<Merge>, RankError> {
    let n = points.nrows();
    if n < 2 {
        return Err(RankError::InsufficientData { regions: n });
    }

    let mut dist = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(points.row(i), points.row(j));
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    // Each active slot is represented by the lowest row index it contains.
    let mut size = vec![1_usize; n];
    let mut active = vec![true; n];
    let mut steps: Vec<(usize, usize, f64, usize)> = Vec::with_capacity(n - 1);

    for _ in 0..(n - 1) {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| active[i]) {
            for j in ((i + 1)..n).filter(|&j| active[j]) {
                if best.is_none_or(|(_, _, d)| dist[i][j] < d) {
                    best = Some((i, j, dist[i][j]));
                }
            }
        }
        let Some((i, j, d_ij)) = best else {
            break;
        };

        for k in (0..n).filter(|&k| active[k] && k != i && k != j) {
            let updated = ward_update(dist[k][i], dist[k][j], d_ij, size[i], size[j], size[k]);
            dist[k][i] = updated;
            dist[i][k] = updated;
        }

        size[i] += size[j];
        active[j] = false;
        steps.push((i, j, d_ij, size[i]));
    }

    steps.sort_by(|a, b| a.2.total_cmp(&b.2));

    Ok(relabel(&steps, n))
}

/// Converts merges between row representatives into merges between cluster
/// ids, in table order.
fn relabel(steps: &[(usize, usize, f64, usize)], n: usize) -> Vec<Merge> {
    // Union-find over rows; `cluster_of[root]` is the current cluster id.
    let mut parent: Vec<usize> = (0..n).collect();
    let mut cluster_of: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    steps
        .iter()
        .enumerate()
        .map(|(idx, &(a, b, height, size))| {
            let root_a = find(&mut parent, a);
            let root_b = find(&mut parent, b);
            let id_a = cluster_of[root_a];
            let id_b = cluster_of[root_b];

            parent[root_b] = root_a;
            cluster_of[root_a] = n + idx;

            Merge {
                left: id_a.min(id_b),
                right: id_a.max(id_b),
                height,
                size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn rejects_fewer_than_two_rows() {
        let one = array![[1.0, 2.0]];
        assert!(matches!(
            ward_linkage(&one),
            Err(RankError::InsufficientData { regions: 1 })
        ));
    }

    #[test]
    fn two_points_merge_at_their_distance() {
        let points = array![[0.0, 0.0], [3.0, 4.0]];
        let merges = ward_linkage(&points).unwrap();
        assert_eq!(merges.len(), 1);
        assert_eq!((merges[0].left, merges[0].right), (0, 1));
        assert_relative_eq!(merges[0].height, 5.0);
        assert_eq!(merges[0].size, 2);
    }

    #[test]
    fn ward_height_for_point_joining_pair() {
        // Pair {0, 1} at distance 1 merges first. Point 2 sits at distance
        // 2 from the pair's centroid; Ward height is
        // sqrt(2 * n_a * n_b / (n_a + n_b)) * centroid distance.
        let points = array![[0.0], [1.0], [2.5]];
        let merges = ward_linkage(&points).unwrap();

        assert_eq!((merges[0].left, merges[0].right), (0, 1));
        assert_relative_eq!(merges[0].height, 1.0);

        assert_eq!((merges[1].left, merges[1].right), (2, 3));
        assert_eq!(merges[1].size, 3);
        let expected = (2.0_f64 * 2.0 * 1.0 / 3.0).sqrt() * 2.0;
        assert_relative_eq!(merges[1].height, expected, epsilon = 1e-12);
    }

    #[test]
    fn heights_are_sorted_and_ids_reference_earlier_merges() {
        let points = array![[0.0, 0.0], [10.0, 10.0], [0.5, 0.0], [10.0, 11.0], [5.0, 5.0]];
        let merges = ward_linkage(&points).unwrap();
        let n = points.nrows();

        assert_eq!(merges.len(), n - 1);
        for (idx, merge) in merges.iter().enumerate() {
            assert!(merge.left < merge.right);
            assert!(merge.right < n + idx);
            if idx > 0 {
                assert!(merges[idx - 1].height <= merge.height);
            }
        }
        assert_eq!(merges.last().unwrap().size, n);
    }

    #[test]
    fn deterministic_for_same_input() {
        let points = array![[1.0, 2.0], [1.0, 2.0], [4.0, 0.0], [3.0, 3.0]];
        assert_eq!(ward_linkage(&points).unwrap(), ward_linkage(&points).unwrap());
    }
}
