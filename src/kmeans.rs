//! One-dimensional k-means clustering of execution times.
//!
//! Repeated runs on shared machines are often multi-modal: most runs are fast, a few are slowed
//! down by noisy neighbours. Clustering the samples and keeping the cluster with the lowest mean
//! discards those outliers before aggregation.

use crate::consts;

use rand::prelude::*;
use statistical::mean;

/// A group of samples and its centroid.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub mean: f64,
    pub samples: Vec<f64>,
}

/// Partitions `samples` into at most `k` clusters, sorted by increasing mean.
///
/// `k` is capped at the number of distinct values and clusters left empty are dropped, so fewer
/// than `k` clusters may be returned. Initialisation is k-means++ seeded with `seed`.
pub fn kmeans(samples: &[f64], k: usize, seed: u64) -> Vec<Cluster> {
    let mut distinct = samples.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    let k = k.min(distinct.len());
    if k == 0 {
        return Vec::new();
    }

    let mut centroids = init_centroids(samples, k, seed);
    let mut labels = vec![usize::MAX; samples.len()];
    for _ in 0..consts::KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (label, &x) in labels.iter_mut().zip(samples) {
            let nearest = nearest(&centroids, x);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<f64> = samples
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == c)
                .map(|(x, _)| *x)
                .collect();
            if !members.is_empty() {
                *centroid = mean(&members);
            }
        }
    }

    let mut clusters: Vec<Cluster> = (0..k)
        .filter_map(|c| {
            let members: Vec<f64> = samples
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == c)
                .map(|(x, _)| *x)
                .collect();
            (!members.is_empty()).then(|| Cluster {
                mean: mean(&members),
                samples: members,
            })
        })
        .collect();
    clusters.sort_by(|a, b| a.mean.total_cmp(&b.mean));
    clusters
}

/// The cluster with the lowest mean, or `None` for an empty sample set.
pub fn fastest_cluster(samples: &[f64], k: usize, seed: u64) -> Option<Cluster> {
    kmeans(samples, k, seed).into_iter().next()
}

fn nearest(centroids: &[f64], x: f64) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// k-means++: first centroid uniformly, the next ones with probability proportional to the
/// squared distance to the closest centroid already picked.
fn init_centroids(samples: &[f64], k: usize, seed: u64) -> Vec<f64> {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[rng.gen_range(0..samples.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = samples
            .iter()
            .map(|&x| {
                centroids
                    .iter()
                    .map(|c| (x - c) * (x - c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        // `k` never exceeds the number of distinct values, so some weight is positive.
        let mut target = rng.gen::<f64>() * total;
        let mut pick = samples.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if *w > 0.0 && target < *w {
                pick = i;
                break;
            }
            target -= w;
        }
        if weights[pick] == 0.0 {
            pick = weights
                .iter()
                .position(|w| *w > 0.0)
                .unwrap_or(pick);
        }
        centroids.push(samples[pick]);
    }
    centroids
}
