//! Seeded K-Means clustering.
//!
//! Used by the prototype-based reduction strategy to group output
//! observations before averaging them into prototypes.
//!
//! # Example
//!
//! ```
//! use semalign::cluster::KMeans;
//! use semalign::primitives::RMatrix;
//!
//! let data = RMatrix::from_row_slice(6, 2, &[
//!     1.0, 2.0,
//!     1.5, 1.8,
//!     5.0, 8.0,
//!     8.0, 8.0,
//!     1.0, 0.6,
//!     9.0, 11.0,
//! ]);
//!
//! let mut kmeans = KMeans::new(2).with_random_state(7);
//! kmeans.fit(&data).expect("fit should succeed");
//! assert_eq!(kmeans.labels().map(<[usize]>::len), Some(6));
//! ```

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SemAlignError};
use crate::primitives::RMatrix;

/// K-Means clustering with k-means++ initialization and Lloyd iterations.
///
/// Samples are the rows of the input matrix.
///
/// # Algorithm
///
/// 1. Initialize centroids using k-means++ (D² sampling from a seeded RNG)
/// 2. Assign each sample to nearest centroid
/// 3. Update centroids as mean of assigned samples
/// 4. Repeat until convergence or max iterations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    /// Number of clusters.
    n_clusters: usize,
    /// Maximum iterations.
    max_iter: usize,
    /// Convergence tolerance on centroid movement.
    tol: f64,
    /// Random seed for initialization.
    random_state: Option<u64>,
    /// Cluster centroids after fitting.
    centroids: Option<RMatrix>,
    /// Labels for training data.
    labels: Option<Vec<usize>>,
    /// Sum of squared distances to the assigned centroid.
    inertia: f64,
    /// Number of iterations run.
    n_iter: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(8)
    }
}

impl KMeans {
    /// Creates a new K-Means with the given number of clusters.
    #[must_use]
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: None,
            centroids: None,
            labels: None,
            inertia: 0.0,
            n_iter: 0,
        }
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the convergence tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Returns the cluster centroids (`n_clusters × n_features`).
    #[must_use]
    pub fn centroids(&self) -> Option<&RMatrix> {
        self.centroids.as_ref()
    }

    /// Returns the training labels.
    #[must_use]
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Returns the inertia (within-cluster sum of squares).
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Returns the number of iterations run.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Returns true if the model has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }

    /// Fits the model to the rows of `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `n_clusters` is zero
    /// - Data is empty
    /// - Data has fewer samples than clusters
    pub fn fit(&mut self, x: &RMatrix) -> Result<()> {
        let n_samples = x.nrows();

        if self.n_clusters == 0 {
            return Err(SemAlignError::invalid_config(
                "n_clusters",
                0,
                "must be at least 1",
            ));
        }
        if n_samples == 0 {
            return Err(SemAlignError::DimensionMismatch {
                expected: "at least one sample".to_string(),
                actual: "0".to_string(),
            });
        }
        if n_samples < self.n_clusters {
            return Err(SemAlignError::DimensionMismatch {
                expected: format!("at least {} samples", self.n_clusters),
                actual: n_samples.to_string(),
            });
        }

        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut centroids = self.kmeans_plusplus_init(x, &mut rng);
        let mut labels = vec![0; n_samples];

        for iter in 0..self.max_iter {
            labels = assign_labels(x, &centroids);
            let new_centroids = self.update_centroids(x, &labels, &centroids);
            let converged = self.centroids_converged(&centroids, &new_centroids);

            centroids = new_centroids;
            self.n_iter = iter + 1;
            if converged {
                break;
            }
        }

        self.inertia = labels
            .iter()
            .enumerate()
            .map(|(i, &k)| (x.row(i) - centroids.row(k)).norm_squared())
            .sum();
        tracing::trace!(
            clusters = self.n_clusters,
            iterations = self.n_iter,
            inertia = self.inertia,
            "k-means fitted"
        );
        self.labels = Some(labels);
        self.centroids = Some(centroids);

        Ok(())
    }

    /// Assigns each row of `x` to its nearest centroid.
    ///
    /// # Errors
    ///
    /// Returns an error if not fitted or the feature count differs.
    pub fn predict(&self, x: &RMatrix) -> Result<Vec<usize>> {
        let centroids = self
            .centroids
            .as_ref()
            .ok_or(SemAlignError::NotFitted { model: "KMeans" })?;
        if x.ncols() != centroids.ncols() {
            return Err(SemAlignError::dimension_mismatch(
                "k-means features",
                centroids.ncols(),
                x.ncols(),
            ));
        }
        Ok(assign_labels(x, centroids))
    }

    /// k-means++ seeding: first centroid uniform, the rest drawn with
    /// probability proportional to the squared distance to the nearest
    /// chosen centroid.
    fn kmeans_plusplus_init(&self, x: &RMatrix, rng: &mut StdRng) -> RMatrix {
        let (n_samples, n_features) = x.shape();
        let mut centroids = RMatrix::zeros(self.n_clusters, n_features);
        let first = rng.gen_range(0..n_samples);
        centroids.set_row(0, &x.row(first));

        let mut min_distances: Vec<f64> = (0..n_samples)
            .map(|i| (x.row(i) - x.row(first)).norm_squared())
            .collect();

        for k in 1..self.n_clusters {
            // Fall back to the farthest point when every weight is zero
            let next = WeightedIndex::new(&min_distances)
                .map(|dist| dist.sample(rng))
                .unwrap_or_else(|_| argmax(&min_distances));
            centroids.set_row(k, &x.row(next));

            for (i, min_dist) in min_distances.iter_mut().enumerate() {
                let dist = (x.row(i) - x.row(next)).norm_squared();
                if dist < *min_dist {
                    *min_dist = dist;
                }
            }
        }

        centroids
    }

    /// Updates centroids as the mean of assigned samples. Empty clusters
    /// keep their previous centroid.
    fn update_centroids(&self, x: &RMatrix, labels: &[usize], previous: &RMatrix) -> RMatrix {
        let mut sums = RMatrix::zeros(self.n_clusters, x.ncols());
        let mut counts = vec![0usize; self.n_clusters];

        for (i, &label) in labels.iter().enumerate() {
            counts[label] += 1;
            let mut row = sums.row_mut(label);
            row += x.row(i);
        }

        for (k, &count) in counts.iter().enumerate() {
            if count > 0 {
                sums.row_mut(k).unscale_mut(count as f64);
            } else {
                sums.set_row(k, &previous.row(k));
            }
        }

        sums
    }

    /// Checks if every centroid moved less than `tol`.
    fn centroids_converged(&self, old: &RMatrix, new: &RMatrix) -> bool {
        (0..old.nrows()).all(|k| (old.row(k) - new.row(k)).norm_squared() <= self.tol * self.tol)
    }
}

fn assign_labels(x: &RMatrix, centroids: &RMatrix) -> Vec<usize> {
    (0..x.nrows())
        .map(|i| {
            let point = x.row(i);
            let mut min_dist = f64::INFINITY;
            let mut min_cluster = 0;
            for k in 0..centroids.nrows() {
                let dist = (&point - centroids.row(k)).norm_squared();
                if dist < min_dist {
                    min_dist = dist;
                    min_cluster = k;
                }
            }
            min_cluster
        })
        .collect()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max {
                (i, v)
            } else {
                (best, max)
            }
        })
        .0
}
