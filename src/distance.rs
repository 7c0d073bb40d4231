use serde::{Deserialize, Serialize};

/// Dissimilarity measure between two signature vectors of equal length.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `sqrt(Σ(xi − yi)²)`
    #[default]
    Euclidean,
    /// `Σ|xi − yi|`
    Manhattan,
    /// Eisen cosine distance, `1 − |x·y| / (|x|·|y|)`. 1.0 when either vector is zero.
    Eisen,
    /// Pearson correlation distance, `1 − cov(x, y) / (σx·σy)`. 0.0 when either deviation is zero.
    Pearson,
}

impl DistanceMetric {
    /// Maps the integer encoding used by parameter files. Unknown values are Euclidean.
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => DistanceMetric::Manhattan,
            2 => DistanceMetric::Eisen,
            3 => DistanceMetric::Pearson,
            _ => DistanceMetric::Euclidean,
        }
    }

    pub fn index(self) -> i64 {
        self as i64
    }

    pub fn distance(self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => x
                .iter()
                .zip(y)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum(),
            DistanceMetric::Eisen => eisen_cosine_distance(x, y),
            DistanceMetric::Pearson => pearson_distance(x, y),
        }
    }
}

fn eisen_cosine_distance(x: &[f64], y: &[f64]) -> f64 {
    let mut top = 0.0;
    let mut xsq = 0.0;
    let mut ysq = 0.0;
    for (a, b) in x.iter().zip(y) {
        top += a * b;
        xsq += a * a;
        ysq += b * b;
    }

    if xsq == 0.0 || ysq == 0.0 {
        return 1.0;
    }
    1.0 - top.abs() / (xsq * ysq).sqrt()
}

fn pearson_distance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len()) as f64;
    if n == 0.0 {
        return 0.0;
    }

    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sx += a;
        sy += b;
        sxx += a * a;
        syy += b * b;
        sxy += a * b;
    }

    let covariance = sxy / n - sx * sy / n / n;
    // Clamp: rounding can push a zero variance slightly negative.
    let sigma_x = (sxx / n - sx * sx / n / n).max(0.0).sqrt();
    let sigma_y = (syy / n - sy * sy / n / n).max(0.0).sqrt();
    if sigma_x == 0.0 || sigma_y == 0.0 {
        return 0.0;
    }
    1.0 - covariance / sigma_x / sigma_y
}
