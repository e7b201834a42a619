//! Spherical k-means over unit vectors.

use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KMeansError {
    #[error("no points to cluster")]
    Empty,
    #[error("k must be at least 1")]
    ZeroK,
    #[error("k = {k} exceeds the {n} points available")]
    TooFewPoints { k: usize, n: usize },
    #[error("points have zero dimensions")]
    ZeroDimensions,
    #[error("point {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("point {index} contains non-finite values")]
    NonFinite { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansParams {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index in `[0, k)` per input point.
    pub assignments: Vec<usize>,
    /// Sum of cosine distances to the assigned centroid.
    pub inertia: f32,
}

/// Runs `n_init` seeded k-means++ restarts and keeps the lowest-inertia partition.
///
/// Every cluster of the result is non-empty.
pub fn fit(points: &[Vec<f32>], params: KMeansParams) -> Result<KMeansFit, KMeansError> {
    let data = normalized_matrix(points)?;
    let n = data.nrows();
    if params.k == 0 {
        return Err(KMeansError::ZeroK);
    }
    if params.k > n {
        return Err(KMeansError::TooFewPoints { k: params.k, n });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<KMeansFit> = None;
    for _ in 0..params.n_init.max(1) {
        let run = single_run(&data, params.k, params.max_iterations.max(1), &mut rng);
        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    best.ok_or(KMeansError::Empty)
}

fn normalized_matrix(points: &[Vec<f32>]) -> Result<Array2<f32>, KMeansError> {
    let dimension = points.first().ok_or(KMeansError::Empty)?.len();
    if dimension == 0 {
        return Err(KMeansError::ZeroDimensions);
    }

    let mut data = Array2::<f32>::zeros((points.len(), dimension));
    for (index, (point, mut row)) in points.iter().zip(data.rows_mut()).enumerate() {
        if point.len() != dimension {
            return Err(KMeansError::DimensionMismatch {
                index,
                expected: dimension,
                actual: point.len(),
            });
        }
        if point.iter().any(|x| !x.is_finite()) {
            return Err(KMeansError::NonFinite { index });
        }
        row.assign(&ArrayView1::from(point.as_slice()));
        normalize(&mut row);
    }
    Ok(data)
}

fn normalize<S>(vector: &mut ndarray::ArrayBase<S, ndarray::Ix1>)
where
    S: ndarray::DataMut<Elem = f32>,
{
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.mapv_inplace(|x| x / norm);
    }
}

fn single_run(data: &Array2<f32>, k: usize, max_iterations: usize, rng: &mut StdRng) -> KMeansFit {
    let mut centroids = seed_centroids(data, k, rng);
    let mut assignments = vec![usize::MAX; data.nrows()];

    for _ in 0..max_iterations {
        let mut changed = false;
        for (i, point) in data.rows().into_iter().enumerate() {
            let (cluster, _) = nearest(&centroids, point);
            if assignments[i] != cluster {
                assignments[i] = cluster;
                changed = true;
            }
        }
        changed |= fill_empty_clusters(data, &centroids, &mut assignments, k);
        if !changed {
            break;
        }
        centroids = recompute_centroids(data, &assignments, k);
    }

    let inertia = data
        .rows()
        .into_iter()
        .zip(&assignments)
        .map(|(point, &cluster)| 1.0 - point.dot(&centroids.row(cluster)))
        .sum();
    KMeansFit {
        assignments,
        inertia,
    }
}

/// k-means++ seeding with squared cosine distance weights.
fn seed_centroids(data: &Array2<f32>, k: usize, rng: &mut StdRng) -> Array2<f32> {
    let n = data.nrows();
    let mut chosen = vec![rng.gen_range(0..n)];

    while chosen.len() < k {
        let weights: Vec<f32> = data
            .rows()
            .into_iter()
            .map(|point| {
                let closest = chosen
                    .iter()
                    .map(|&c| 1.0 - point.dot(&data.row(c)))
                    .fold(f32::MAX, f32::min)
                    .max(0.0);
                closest * closest
            })
            .collect();
        let total: f32 = weights.iter().sum();

        let next = if total > 0.0 {
            let threshold = rng.gen::<f32>() * total;
            let mut cumulative = 0.0;
            weights
                .iter()
                .position(|w| {
                    cumulative += w;
                    *w > 0.0 && cumulative >= threshold
                })
                .or_else(|| weights.iter().rposition(|w| *w > 0.0))
        } else {
            None
        };
        // Remaining points duplicate existing centroids; take the first unused one.
        let next = next
            .filter(|i| !chosen.contains(i))
            .or_else(|| (0..n).find(|i| !chosen.contains(i)));
        match next {
            Some(index) => chosen.push(index),
            None => break,
        }
    }

    data.select(Axis(0), &chosen)
}

/// Index and similarity of the most similar centroid; ties go to the lower index.
fn nearest(centroids: &Array2<f32>, point: ArrayView1<'_, f32>) -> (usize, f32) {
    let mut best = (0, f32::MIN);
    for (cluster, centroid) in centroids.rows().into_iter().enumerate() {
        let similarity = point.dot(&centroid);
        if similarity > best.1 {
            best = (cluster, similarity);
        }
    }
    best
}

/// Moves the point farthest from its centroid, among clusters with more than one member, into
/// each empty cluster.
fn fill_empty_clusters(
    data: &Array2<f32>,
    centroids: &Array2<f32>,
    assignments: &mut [usize],
    k: usize,
) -> bool {
    let mut sizes = vec![0usize; k];
    for &cluster in assignments.iter() {
        sizes[cluster] += 1;
    }

    let mut changed = false;
    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }
        let farthest = data
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| sizes[assignments[*i]] > 1)
            .map(|(i, point)| (i, 1.0 - point.dot(&centroids.row(assignments[i]))))
            .fold(None, |best: Option<(usize, f32)>, (i, distance)| match best {
                Some((_, top)) if top >= distance => best,
                _ => Some((i, distance)),
            });
        if let Some((index, _)) = farthest {
            sizes[assignments[index]] -= 1;
            assignments[index] = empty;
            sizes[empty] = 1;
            changed = true;
        }
    }
    changed
}

fn recompute_centroids(data: &Array2<f32>, assignments: &[usize], k: usize) -> Array2<f32> {
    let mut centroids = Array2::<f32>::zeros((k, data.ncols()));
    for (point, &cluster) in data.rows().into_iter().zip(assignments) {
        let mut row = centroids.row_mut(cluster);
        row += &point;
    }
    for mut row in centroids.rows_mut() {
        normalize(&mut row);
    }
    centroids
}
