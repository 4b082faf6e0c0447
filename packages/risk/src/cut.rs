//! Cutting a dendrogram into flat clusters.

use crate::linkage::Merge;

/// Forms at most `k` flat clusters from a linkage table over `n` rows.
///
/// The cut height is the smallest merge height that leaves no more than `k`
/// clusters; every subtree whose root lies at or below that height becomes
/// one cluster. Labels start at 1 and are handed out in dendrogram pre-order
/// from the root, so the same table always yields the same labels. Tied
/// heights can merge past `k` and give fewer clusters.
///
/// Returns one label per input row.
#[must_use]
pub fn maxclust(merges: &[Merge], n: usize, k: usize) -> Vec<u32> {
    let mut labels = vec![0_u32; n];
    if n == 0 {
        return labels;
    }
    if merges.is_empty() || n == 1 {
        labels.fill(1);
        return labels;
    }

    let threshold = if k >= n || k == 0 {
        0.0
    } else {
        merges[n - k - 1].height
    };

    // Each flat cluster is the subtree under the highest node whose height
    // is within the threshold; leaves outside every such subtree are
    // singletons.
    let root = 2 * n - 2;
    let mut next_label = 0_u32;
    let mut visited = vec![false; 2 * n - 1];
    let mut stack = vec![root];
    // Node id that opened the current flat cluster.
    let mut open: Option<usize> = None;

    while let Some(&node) = stack.last() {
        let merge = &merges[node - n];

        if open.is_none() && merge.height <= threshold {
            next_label += 1;
            open = Some(node);
        }

        if merge.left >= n && !visited[merge.left] {
            visited[merge.left] = true;
            stack.push(merge.left);
            continue;
        }
        if merge.right >= n && !visited[merge.right] {
            visited[merge.right] = true;
            stack.push(merge.right);
            continue;
        }

        for child in [merge.left, merge.right] {
            if child < n {
                if open.is_none() {
                    next_label += 1;
                }
                labels[child] = next_label;
            }
        }

        if open == Some(node) {
            open = None;
        }
        stack.pop();
    }

    labels
}
