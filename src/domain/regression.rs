//! Ordinary least squares fit of `y` against the index `x = 0, 1, 2, ...`.
//!
//! slope = Sxy / Sxx, r = Sxy / sqrt(Sxx * Syy), computed on mean-centred
//! sums in index order. When either variance is zero, r is 0.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

pub fn fit_against_index(y: &[f64]) -> LinearFit {
    let n = y.len();
    if n < 2 {
        return LinearFit {
            slope: 0.0,
            intercept: y.first().copied().unwrap_or(0.0),
            r_squared: 0.0,
        };
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = y.iter().sum::<f64>() / n_f;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let denom = (sxx * syy).sqrt();
    let r = if denom == 0.0 {
        0.0
    } else {
        (sxy / denom).clamp(-1.0, 1.0)
    };

    LinearFit {
        slope,
        intercept,
        r_squared: r * r,
    }
}
