//! Compact t-digest for streaming quantile estimation.
//!
//! Bounded memory (O(compression) centroids) regardless of stream length,
//! with the best accuracy at the tails. Values are buffered and merged into
//! sorted centroids whenever the buffer fills; querying flushes the buffer
//! first.

/// One weighted cluster of nearby values.
#[derive(Debug, Clone, Copy)]
struct Centroid {
    mean: f64,
    weight: f64,
}

impl Centroid {
    fn merge(&mut self, other: &Centroid) {
        let total = self.weight + other.weight;
        if total > 0.0 {
            self.mean = (self.mean * self.weight + other.mean * other.weight) / total;
            self.weight = total;
        }
    }
}

/// Streaming quantile sketch.
#[derive(Debug, Clone)]
pub struct TDigest {
    compression: f64,
    centroids: Vec<Centroid>,
    buffer: Vec<f64>,
    total_weight: f64,
    min: f64,
    max: f64,
}

impl Default for TDigest {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl TDigest {
    pub fn new(compression: f64) -> Self {
        Self {
            compression: compression.max(1.0),
            centroids: Vec::new(),
            buffer: Vec::new(),
            total_weight: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Add one observation. Non-finite values are ignored.
    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.buffer.push(value);
        self.total_weight += 1.0;
        if self.buffer.len() >= (self.compression * 2.0) as usize {
            self.flush_buffer();
        }
    }

    /// Total number of observations.
    pub fn count(&self) -> u64 {
        self.total_weight as u64
    }

    pub fn min(&self) -> Option<f64> {
        (self.total_weight > 0.0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.total_weight > 0.0).then_some(self.max)
    }

    /// Estimate the quantile `q` in [0, 1]; `None` while empty.
    pub fn quantile(&mut self, q: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&q) || self.total_weight == 0.0 {
            return None;
        }
        self.flush_buffer();
        if q == 0.0 {
            return Some(self.min);
        }
        if q == 1.0 {
            return Some(self.max);
        }

        let n = self.centroids.len();
        let target = q * self.total_weight;

        let mut cumulative = 0.0;
        for (i, centroid) in self.centroids.iter().enumerate() {
            let upper = cumulative + centroid.weight;
            if target <= upper || i == n - 1 {
                let frac = if centroid.weight > 0.0 {
                    ((target - cumulative) / centroid.weight).clamp(0.0, 1.0)
                } else {
                    0.5
                };
                // Interpolate within the centroid's local range, bounded by
                // midpoints with its neighbors (and min/max at the edges).
                let lo = if i == 0 {
                    self.min
                } else {
                    (self.centroids[i - 1].mean + centroid.mean) / 2.0
                };
                let hi = if i == n - 1 {
                    self.max
                } else {
                    (centroid.mean + self.centroids[i + 1].mean) / 2.0
                };
                return Some(lo + frac * (hi - lo));
            }
            cumulative = upper;
        }
        Some(self.max)
    }

    /// Sort the buffer and merge it into the centroid list, compressing
    /// neighbors while their combined weight stays under the scale limit.
    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut merged: Vec<Centroid> = self
            .buffer
            .drain(..)
            .map(|v| Centroid {
                mean: v,
                weight: 1.0,
            })
            .collect();
        merged.extend(self.centroids.drain(..));
        merged.sort_by(|a, b| a.mean.total_cmp(&b.mean));

        let total = self.total_weight;
        let mut result: Vec<Centroid> = Vec::new();
        let mut weight_so_far = 0.0;
        let mut current = merged[0];

        for centroid in merged.into_iter().skip(1) {
            let proposed = current.weight + centroid.weight;
            let q = (weight_so_far + proposed / 2.0) / total;
            let q = q.clamp(0.0001, 0.9999);
            let limit = (self.compression * (q * (1.0 - q)).sqrt() * 4.0).max(1.0);
            if proposed <= limit {
                current.merge(&centroid);
            } else {
                weight_so_far += current.weight;
                result.push(current);
                current = centroid;
            }
        }
        result.push(current);
        self.centroids = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_digest() {
        let mut d = TDigest::default();
        assert_eq!(d.count(), 0);
        assert!(d.quantile(0.5).is_none());
        assert!(d.min().is_none());
    }

    #[test]
    fn test_single_value() {
        let mut d = TDigest::default();
        d.add(42.0);
        assert_eq!(d.quantile(0.5), Some(42.0));
        assert_eq!(d.min(), Some(42.0));
        assert_eq!(d.max(), Some(42.0));
    }

    #[test]
    fn test_uniform_stream_quantiles() {
        let mut d = TDigest::default();
        for i in 1..=10_000 {
            d.add(i as f64);
        }
        assert_eq!(d.count(), 10_000);
        assert_eq!(d.min(), Some(1.0));
        assert_eq!(d.max(), Some(10_000.0));

        let p50 = d.quantile(0.5).unwrap();
        assert!((p50 - 5000.0).abs() < 200.0, "p50 = {}", p50);
        let p90 = d.quantile(0.9).unwrap();
        assert!((p90 - 9000.0).abs() < 200.0, "p90 = {}", p90);
        let p99 = d.quantile(0.99).unwrap();
        assert!((p99 - 9900.0).abs() < 100.0, "p99 = {}", p99);
    }

    #[test]
    fn test_bounded_memory() {
        let mut d = TDigest::new(50.0);
        for i in 0..100_000 {
            d.add((i % 1000) as f64);
        }
        d.flush_buffer();
        // Centroid count stays in the same order as the compression factor
        assert!(d.centroids.len() < 500, "centroids = {}", d.centroids.len());
    }

    #[test]
    fn test_ignores_non_finite() {
        let mut d = TDigest::default();
        d.add(f64::NAN);
        d.add(f64::INFINITY);
        assert_eq!(d.count(), 0);
    }
}
