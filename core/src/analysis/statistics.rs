//! Run statistics under the independent fair-coin null model

/// Lengths of the maximal runs of identical bits, in order.
pub fn run_lengths(bits: &[u8]) -> Vec<usize> {
    let mut runs = Vec::new();
    let Some(&first) = bits.first() else {
        return runs;
    };

    let mut previous = first;
    let mut current = 1;
    for &bit in &bits[1..] {
        if bit == previous {
            current += 1;
        } else {
            runs.push(current);
            current = 1;
            previous = bit;
        }
    }
    runs.push(current);
    runs
}

/// Count maximal runs without materializing their lengths.
pub fn run_count<I: IntoIterator<Item = u8>>(bits: I) -> usize {
    let mut iter = bits.into_iter();
    let Some(mut previous) = iter.next() else {
        return 0;
    };

    let mut runs = 1;
    for bit in iter {
        if bit != previous {
            runs += 1;
            previous = bit;
        }
    }
    runs
}

/// Expected number of runs in `n` independent fair bits: (n + 1) / 2
pub fn expected_runs(n: usize) -> f64 {
    (n as f64 + 1.0) / 2.0
}

/// Wald-Wolfowitz runs z-score with p = 1/2 fixed.
///
/// # Formula
///
/// ```text
/// z = (R - (n + 1) / 2) / sqrt((n - 1) / 4)
/// ```
///
/// Returns 0.0 for fewer than 2 bits.
pub fn runs_z(n: usize, runs: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let variance = (n as f64 - 1.0) / 4.0;
    (runs as f64 - expected_runs(n)) / variance.sqrt()
}

/// Chi-square of the run-length histogram against the geometric null,
/// mapped to a standard-normal scale with the Wilson-Hilferty transform.
///
/// Buckets are lengths `1..buckets` plus a tail bucket `>= buckets`.
/// Expected counts are conditional on the observed number of runs:
/// `P(L = k) = 2^-k`, `P(L >= K) = 2^-(K-1)`.
pub fn run_length_chi_z(runs: &[usize], buckets: usize) -> f64 {
    if runs.is_empty() || buckets < 2 {
        return 0.0;
    }

    let mut histogram = vec![0usize; buckets];
    for &len in runs {
        histogram[len.min(buckets) - 1] += 1;
    }

    let total = runs.len() as f64;
    let chi2: f64 = histogram
        .iter()
        .enumerate()
        .map(|(k, &observed)| {
            let p = if k + 1 < buckets {
                0.5f64.powi(k as i32 + 1)
            } else {
                0.5f64.powi(buckets as i32 - 1)
            };
            let expected = total * p;
            let diff = observed as f64 - expected;
            diff * diff / expected
        })
        .sum();

    wilson_hilferty(chi2, (buckets - 1) as f64)
}

/// Normal approximation of a chi-square quantile
pub fn wilson_hilferty(chi2: f64, df: f64) -> f64 {
    let scale = 2.0 / (9.0 * df);
    ((chi2 / df).cbrt() - (1.0 - scale)) / scale.sqrt()
}

/// One-sided z-score for an upper-tail probability given as `ln(p)`.
///
/// Uses the asymptotic inverse of the normal tail,
/// `z ≈ sqrt(t - ln(t) - ln(2π))` with `t = -2 ln(p)`, which stays accurate
/// far below the smallest `f64` probability. Probabilities of one half or
/// more map to 0.0.
pub fn tail_z(ln_p: f64) -> f64 {
    if ln_p >= 0.5f64.ln() {
        return 0.0;
    }
    let t = -2.0 * ln_p;
    let v = t - t.ln() - (2.0 * std::f64::consts::PI).ln();
    if v > 0.0 {
        v.sqrt()
    } else {
        0.0
    }
}

/// z-score of a run of `k` leading successes, each with probability `q`.
///
/// Under the null `P(K >= k) = q^k`.
pub fn leading_run_z(k: usize, q: f64) -> f64 {
    tail_z(k as f64 * q.ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lengths() {
        assert_eq!(run_lengths(&[]), Vec::<usize>::new());
        assert_eq!(run_lengths(&[1]), vec![1]);
        assert_eq!(run_lengths(&[0, 0, 1, 0, 1, 1, 1]), vec![2, 1, 1, 3]);
        assert_eq!(run_count([0, 0, 1, 0, 1, 1, 1]), 4);
        assert_eq!(run_count(std::iter::empty::<u8>()), 0);
    }

    #[test]
    fn test_runs_z_extremes() {
        // Constant sequence: one run, far below expectation
        assert!(runs_z(1024, 1) < -30.0);
        // Perfect alternation: n runs, far above expectation
        assert!(runs_z(1024, 1024) > 30.0);
        // Exactly at expectation
        assert!(runs_z(1023, 512).abs() < 1e-12);
        assert_eq!(runs_z(1, 1), 0.0);
    }

    #[test]
    fn test_chi_z_on_ideal_geometric_histogram() {
        // 32 runs of length 1, 16 of 2, 8 of 3, 4 of 4, 2 of 5, 2 of 6+
        let mut runs = Vec::new();
        for (len, count) in [(1, 32), (2, 16), (3, 8), (4, 4), (5, 2), (6, 2)] {
            runs.extend(std::iter::repeat(len).take(count));
        }
        // chi2 = 0 maps to the bottom of the scale, never above zero
        assert!(run_length_chi_z(&runs, 6) < 0.0);

        let skewed = vec![5usize; 64];
        assert!(run_length_chi_z(&skewed, 6) > 10.0);
    }

    #[test]
    fn test_tail_z_tracks_normal_quantiles() {
        // Reference quantiles: 1e-3 -> 3.09, 1e-9 -> 6.00
        assert!((tail_z(1e-3f64.ln()) - 3.09).abs() < 0.1);
        assert!((tail_z(1e-9f64.ln()) - 6.00).abs() < 0.1);
        assert_eq!(tail_z(0.7f64.ln()), 0.0);
        // No underflow for probabilities far below f64::MIN_POSITIVE
        assert!(tail_z(-5000.0) > 90.0);
    }

    #[test]
    fn test_leading_run_z_is_monotone() {
        let q = 98.0 / 256.0;
        assert_eq!(leading_run_z(0, q), 0.0);
        assert!(leading_run_z(18, q) < 5.5);
        assert!(leading_run_z(19, q) >= 5.5);
        assert!(leading_run_z(60, q) > leading_run_z(30, q));
    }
}
