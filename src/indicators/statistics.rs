//! Descriptive statistics with defined defaults for degenerate inputs.

/// Values smaller than this are treated as zero dispersion.
const DISPERSION_FLOOR: f64 = 1e-12;

/// Arithmetic mean (0.0 for empty input).
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (0.0 for fewer than two values).
pub fn std_dev(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = variance.sqrt();
    if sd.is_finite() {
        sd
    } else {
        0.0
    }
}

/// Pearson correlation of two equally long series.
///
/// Only the overlapping tail is used when lengths differ. Zero variance on
/// either side gives 0.0.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < DISPERSION_FLOOR || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Z-score of `value` against the sample mean and deviation of `data`.
///
/// Zero dispersion gives 0.0.
pub fn zscore(value: f64, data: &[f64]) -> f64 {
    let sd = std_dev(data);
    if sd < DISPERSION_FLOOR {
        return 0.0;
    }
    let z = (value - mean(data)) / sd;
    if z.is_finite() {
        z
    } else {
        0.0
    }
}

/// Compounded return of a sequence of simple returns.
pub fn compound(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        // Sample std: sqrt(32 / 7)
        assert!((std_dev(&data) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(std_dev(&[1.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_correlation() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![2.0, 4.0, 6.0, 8.0];
        let c = vec![4.0, 3.0, 2.0, 1.0];

        assert!((correlation(&a, &b) - 1.0).abs() < 1e-12);
        assert!((correlation(&a, &c) + 1.0).abs() < 1e-12);
        // Constant series has no correlation
        assert_eq!(correlation(&a, &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_zscore() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(zscore(3.0, &data).abs() < 1e-12);
        assert!(zscore(5.0, &data) > 1.0);
        assert_eq!(zscore(10.0, &[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_compound() {
        assert!((compound(&[0.1, 0.1]) - 0.21).abs() < 1e-12);
        assert_eq!(compound(&[]), 0.0);
    }
}
