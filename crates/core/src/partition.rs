//! Assigns every row of a [`FeatureMatrix`] to exactly one group.
//!
//! The k-means implementation keeps centroids dense and points sparse, so a
//! distance is `|x|^2 - 2 x.c + |c|^2` evaluated over the non-zero columns of
//! `x` only.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::config::KMeansSettings;
use crate::error::{NotefoldError, Result};
use crate::vectorize::FeatureMatrix;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Single-document batch; no clustering ran.
    Trivial,
    KMeans {
        iterations: usize,
        inertia: f64,
        converged: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    /// Group id per row, in input order.
    pub labels: Vec<usize>,
    pub group_count: usize,
    pub strategy: PartitionStrategy,
}

impl Partition {
    /// Distinct group ids in ascending order.
    pub fn groups(&self) -> Vec<usize> {
        let mut ids = self.labels.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn members(&self, group: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == group)
            .map(|(idx, _)| idx)
            .collect()
    }
}

pub trait Partitioner {
    fn partition(&self, matrix: &FeatureMatrix, requested: Option<usize>) -> Result<Partition>;
}

/// `clamp(requested, 1, n)`, falling back to `default` when nothing was asked.
pub fn effective_group_count(requested: Option<usize>, default: usize, n: usize) -> usize {
    requested.unwrap_or(default).clamp(1, n.max(1))
}

#[derive(Debug, Clone, Copy)]
pub struct KMeansPartitioner {
    default_group_count: usize,
    settings: KMeansSettings,
}

impl KMeansPartitioner {
    pub fn new(default_group_count: usize, settings: KMeansSettings) -> Self {
        Self {
            default_group_count,
            settings,
        }
    }

    fn n_init(&self) -> usize {
        // k-means++ seeding needs a single run
        self.settings.n_init.unwrap_or(1).max(1)
    }
}

impl Partitioner for KMeansPartitioner {
    fn partition(&self, matrix: &FeatureMatrix, requested: Option<usize>) -> Result<Partition> {
        matrix.check()?;
        let n = matrix.n_rows();
        if n == 0 {
            return Err(NotefoldError::Internal("feature matrix has no rows".to_string()));
        }
        let k = effective_group_count(requested, self.default_group_count, n);
        if n == 1 {
            return Ok(Partition {
                labels: vec![0],
                group_count: 1,
                strategy: PartitionStrategy::Trivial,
            });
        }

        let points = SparsePoints::new(matrix);
        let tolerance = self.settings.tolerance * points.mean_variance();
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut best: Option<Run> = None;
        for attempt in 0..self.n_init() {
            let run = lloyd(&points, k, &mut rng, self.settings.max_iter, tolerance);
            debug!(
                attempt,
                k,
                iterations = run.iterations,
                inertia = run.inertia,
                converged = run.converged,
                "k-means run finished"
            );
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let best =
            best.ok_or_else(|| NotefoldError::Internal("k-means produced no run".to_string()))?;
        Ok(Partition {
            labels: best.labels,
            group_count: k,
            strategy: PartitionStrategy::KMeans {
                iterations: best.iterations,
                inertia: best.inertia,
                converged: best.converged,
            },
        })
    }
}

struct SparsePoints<'a> {
    matrix: &'a FeatureMatrix,
    sq_norms: Vec<f64>,
}

impl<'a> SparsePoints<'a> {
    fn new(matrix: &'a FeatureMatrix) -> Self {
        let sq_norms = matrix
            .rows()
            .map(|row| row.iter().map(|(_, w)| w * w).sum())
            .collect();
        Self { matrix, sq_norms }
    }

    fn len(&self) -> usize {
        self.matrix.n_rows()
    }

    fn dims(&self) -> usize {
        self.matrix.n_cols()
    }

    fn sq_distance(&self, idx: usize, centroid: &Centroid) -> f64 {
        let dot: f64 = self
            .matrix
            .row(idx)
            .iter()
            .map(|&(col, w)| w * centroid.values[col])
            .sum();
        (self.sq_norms[idx] - 2.0 * dot + centroid.sq_norm).max(0.0)
    }

    fn centroid_at(&self, idx: usize) -> Centroid {
        Centroid::from_values(self.matrix.dense_row(idx))
    }

    /// Mean per-column variance, used to scale the convergence tolerance.
    fn mean_variance(&self) -> f64 {
        let dims = self.dims();
        if dims == 0 {
            return 0.0;
        }
        let n = self.len() as f64;
        let mut sum = vec![0.0; dims];
        let mut sum_sq = vec![0.0; dims];
        for row in self.matrix.rows() {
            for &(col, w) in row {
                sum[col] += w;
                sum_sq[col] += w * w;
            }
        }
        let total: f64 = sum
            .iter()
            .zip(&sum_sq)
            .map(|(s, sq)| (sq / n - (s / n).powi(2)).max(0.0))
            .sum();
        total / dims as f64
    }
}

#[derive(Debug, Clone)]
struct Centroid {
    values: Vec<f64>,
    sq_norm: f64,
}

impl Centroid {
    fn from_values(values: Vec<f64>) -> Self {
        let sq_norm = values.iter().map(|v| v * v).sum();
        Self { values, sq_norm }
    }
}

struct Run {
    labels: Vec<usize>,
    inertia: f64,
    iterations: usize,
    converged: bool,
}

fn lloyd(
    points: &SparsePoints<'_>,
    k: usize,
    rng: &mut StdRng,
    max_iter: usize,
    tolerance: f64,
) -> Run {
    let mut centroids = plus_plus_init(points, k, rng);
    let mut labels = vec![0usize; points.len()];
    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iter.max(1) {
        iterations += 1;
        assign(points, &centroids, &mut labels);
        let updated = recompute(points, &centroids, &labels, k);
        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| {
                old.values
                    .iter()
                    .zip(&new.values)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
            })
            .sum();
        centroids = updated;
        if shift <= tolerance {
            converged = true;
            break;
        }
    }
    let inertia = assign(points, &centroids, &mut labels);
    Run {
        labels,
        inertia,
        iterations,
        converged,
    }
}

/// Labels each point with its nearest centroid (lowest index on ties) and
/// returns the summed squared distance.
fn assign(points: &SparsePoints<'_>, centroids: &[Centroid], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (idx, label) in labels.iter_mut().enumerate() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let dist = points.sq_distance(idx, centroid);
            if dist < best_dist {
                best = c;
                best_dist = dist;
            }
        }
        *label = best;
        inertia += best_dist;
    }
    inertia
}

/// Mean of each group's members. Empty groups are moved onto the points
/// farthest from their current centroid.
fn recompute(
    points: &SparsePoints<'_>,
    previous: &[Centroid],
    labels: &[usize],
    k: usize,
) -> Vec<Centroid> {
    let dims = points.dims();
    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![0usize; k];
    for (idx, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        for &(col, w) in points.matrix.row(idx) {
            sums[label][col] += w;
        }
    }

    let mut far: Vec<(usize, f64)> = Vec::new();
    if counts.iter().any(|&c| c == 0) {
        far = labels
            .iter()
            .enumerate()
            .map(|(idx, &label)| (idx, points.sq_distance(idx, &previous[label])))
            .collect();
        far.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    }
    let mut far = far.into_iter();

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                return match far.next() {
                    Some((idx, _)) => points.centroid_at(idx),
                    None => Centroid::from_values(vec![0.0; dims]),
                };
            }
            let n = count as f64;
            Centroid::from_values(sum.into_iter().map(|v| v / n).collect())
        })
        .collect()
}

/// k-means++ seeding: the first centre is uniform, each next one is drawn
/// with probability proportional to the squared distance to the nearest
/// chosen centre.
fn plus_plus_init(points: &SparsePoints<'_>, k: usize, rng: &mut StdRng) -> Vec<Centroid> {
    let n = points.len();
    let mut chosen = Vec::with_capacity(k);
    let first = rng.gen_range(0..n);
    chosen.push(first);
    let mut centroids = vec![points.centroid_at(first)];
    let mut nearest: Vec<f64> = (0..n).map(|idx| points.sq_distance(idx, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = None;
            for (idx, &d) in nearest.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                pick = Some(idx);
                if target < d {
                    break;
                }
                target -= d;
            }
            pick
        } else {
            None
        };
        // all remaining points coincide with a centre
        let next = next.unwrap_or_else(|| (0..n).find(|idx| !chosen.contains(idx)).unwrap_or(0));
        chosen.push(next);
        let centroid = points.centroid_at(next);
        for (idx, d) in nearest.iter_mut().enumerate() {
            *d = d.min(points.sq_distance(idx, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitioner() -> KMeansPartitioner {
        KMeansPartitioner::new(5, KMeansSettings::default())
    }

    fn matrix(rows: Vec<Vec<(usize, f64)>>, cols: usize) -> FeatureMatrix {
        FeatureMatrix::from_rows(rows, cols).unwrap()
    }

    #[test]
    fn group_count_is_clamped() {
        assert_eq!(effective_group_count(Some(10), 5, 3), 3);
        assert_eq!(effective_group_count(Some(0), 5, 3), 1);
        assert_eq!(effective_group_count(None, 5, 8), 5);
        assert_eq!(effective_group_count(None, 5, 1), 1);
    }

    #[test]
    fn single_document_is_trivial() {
        let m = matrix(vec![vec![(0, 1.0)]], 1);
        let partition = partitioner().partition(&m, Some(4)).unwrap();
        assert_eq!(partition.labels, vec![0]);
        assert_eq!(partition.group_count, 1);
        assert_eq!(partition.strategy, PartitionStrategy::Trivial);
    }

    #[test]
    fn separates_obvious_groups() {
        let m = matrix(
            vec![
                vec![(0, 1.0)],
                vec![(0, 0.9), (1, 0.1)],
                vec![(2, 1.0)],
                vec![(2, 0.95), (3, 0.05)],
            ],
            4,
        );
        let partition = partitioner().partition(&m, Some(2)).unwrap();
        assert_eq!(partition.labels[0], partition.labels[1]);
        assert_eq!(partition.labels[2], partition.labels[3]);
        assert_ne!(partition.labels[0], partition.labels[2]);
        assert_eq!(partition.groups().len(), 2);
        assert!(matches!(partition.strategy, PartitionStrategy::KMeans { .. }));
    }

    #[test]
    fn identical_rows_give_a_valid_assignment() {
        let m = matrix(vec![vec![(0, 1.0)]; 4], 1);
        let partition = partitioner().partition(&m, Some(3)).unwrap();
        assert_eq!(partition.labels.len(), 4);
        assert!(partition.labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn zero_column_matrix_is_handled() {
        let m = matrix(vec![Vec::new(); 3], 0);
        let partition = partitioner().partition(&m, Some(2)).unwrap();
        assert_eq!(partition.labels.len(), 3);
    }

    #[test]
    fn same_seed_same_labels() {
        let rows = (0..12)
            .map(|i| vec![(i % 4, 1.0), (4 + i % 3, 0.5)])
            .collect::<Vec<_>>();
        let m = matrix(rows, 7);
        let a = partitioner().partition(&m, Some(3)).unwrap();
        let b = partitioner().partition(&m, Some(3)).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn several_inits_keep_lowest_inertia() {
        let settings = KMeansSettings {
            n_init: Some(4),
            ..KMeansSettings::default()
        };
        let rows = (0..10).map(|i| vec![(i % 5, 1.0)]).collect::<Vec<_>>();
        let m = matrix(rows, 5);
        let partition = KMeansPartitioner::new(5, settings).partition(&m, None).unwrap();
        match partition.strategy {
            PartitionStrategy::KMeans { inertia, .. } => assert!(inertia < 1e-9),
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn empty_matrix_is_internal_error() {
        let m = matrix(Vec::new(), 3);
        let err = partitioner().partition(&m, None).unwrap_err();
        assert!(matches!(err, NotefoldError::Internal(_)));
    }
}
