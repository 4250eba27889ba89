//! Lag-1 sample autocovariance.
//!
//! Demeaned, "adjusted" normalization (divide by `n - 1` products):
//!
//! ```text
//! γ₁ = Σ_{t=1}^{n-1} (x_t - m)(x_{t-1} - m) / (n - 1),   m = mean(x)
//! ```
//!
//! The streaming form expands the products so each prefix costs O(1):
//!
//! ```text
//! Σ (x_t - m)(x_{t-1} - m) = P - m·(2S - x_0 - x_{n-1}) + (n - 1)·m²
//! ```
//!
//! with `S = Σ x_t` and `P = Σ x_t·x_{t-1}`. Values are shifted by the first
//! observation before accumulating, which leaves γ₁ unchanged and keeps a
//! constant series at exactly zero.

/// Two-pass lag-1 autocovariance. `None` for fewer than two values.
pub fn lag1_autocovariance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let cross: f64 = values
        .windows(2)
        .map(|w| (w[1] - mean) * (w[0] - mean))
        .sum();
    Some(cross / (n - 1) as f64)
}

/// Expanding-window lag-1 autocovariance.
#[derive(Debug, Clone, Default)]
pub struct Lag1Accumulator {
    n: usize,
    shift: f64,
    sum: f64,
    lag_products: f64,
    first: f64,
    last: f64,
}

impl Lag1Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        if self.n == 0 {
            self.shift = value;
        }
        let y = value - self.shift;
        if self.n == 0 {
            self.first = y;
        } else {
            self.lag_products += y * self.last;
        }
        self.sum += y;
        self.last = y;
        self.n += 1;
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// γ₁ of everything pushed so far; `None` until two values are in.
    pub fn value(&self) -> Option<f64> {
        if self.n < 2 {
            return None;
        }
        let n = self.n as f64;
        let mean = self.sum / n;
        let cross = self.lag_products - mean * (2.0 * self.sum - self.first - self.last)
            + (n - 1.0) * mean * mean;
        Some(cross / (n - 1.0))
    }
}

/// γ₁ of every prefix of `values`: entry `i` covers `values[..=i]`.
pub fn expanding_lag1(values: &[f64]) -> Vec<Option<f64>> {
    values
        .iter()
        .scan(Lag1Accumulator::new(), |acc, &v| {
            acc.push(v);
            Some(acc.value())
        })
        .collect()
}
