//! Numeric and output helpers shared by the estimators and engines.
use crate::errors;
use serde::Serialize;
use std::path::Path;

/// Calculate the mean of a slice of f64 values.
///  - `numbers` is a reference to a slice of f64 values.
///  - Returns the mean of `numbers`, NaN when empty.
///
/// # Examples
///
/// ```rust
/// let numbers = vec![1.0, 1.5, 2.0, 2.5, 3.0];
/// let mn = detrital::utils::mean(&numbers);
/// assert_eq!(2.0, mn);
/// ```
pub fn mean(numbers: &[f64]) -> f64 {
    let sum: f64 = numbers.iter().sum();

    sum / numbers.len() as f64
}

/// Calculate the median of a slice of f64 values.
///  - `numbers` is a reference to a slice of f64 values, in any order.
///  - Returns the median of `numbers`, NaN when empty.
///
/// # Examples
///
/// ```rust
/// let numbers = vec![10.0, 1.0, 7.0, 3.0];
/// let med = detrital::utils::median(&numbers);
/// assert_eq!(5.0, med);
/// ```
pub fn median(numbers: &[f64]) -> f64 {
    percentile(numbers, 50.0)
}

/// Calculate the `q`-th percentile (0 to 100) of `numbers`, linearly interpolating
/// between the two closest ranks.
///  - Returns NaN when `numbers` is empty.
///
/// # Examples
///
/// ```rust
/// let numbers = vec![1.0, 2.0, 3.0, 4.0];
/// assert_eq!(1.75, detrital::utils::percentile(&numbers, 25.0));
/// ```
pub fn percentile(numbers: &[f64], q: f64) -> f64 {
    if numbers.is_empty() {
        return f64::NAN;
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * (q / 100.0).max(0.0).min(1.0);
    let lo = h.floor() as usize;
    if lo >= n - 1 {
        return sorted[n - 1];
    }
    let frac = h - h.floor();
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

/// Derive an independent rng seed for task `counter` from `base_seed` (SplitMix64).
///
/// Used so each parallel task owns its own generator while the whole run stays
/// reproducible from a single seed, whatever the thread count.
#[inline]
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// `n` evenly spaced values from `start` to `end`, both included exactly.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// `n` values spaced evenly on a log10 scale from `10^start` to `10^end`.
pub fn logspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    linspace(start, end, n)
        .into_iter()
        .map(|x| 10f64.powf(x))
        .collect()
}

/// Format `value` in scientific notation with `precision` mantissa digits and a signed,
/// at least two digit exponent (e.g. `1.234e-02`).
pub fn format_sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}

/// Refuse to write over an existing file at `path`.
pub fn ensure_new_file(path: &Path) -> Result<(), errors::DzError> {
    if path.exists() {
        return Err(errors::DzError::FileExists(path.to_path_buf()));
    }
    Ok(())
}

/// Write statistical results to csv file.
pub fn record<T: Serialize, P: AsRef<Path>>(rec: &[T], path: P) -> Result<(), errors::DzError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for i in rec {
        wtr.serialize(i)?;
    }
    wtr.flush()?;
    Ok(())
}
