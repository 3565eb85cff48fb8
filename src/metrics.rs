//! Objective functions comparing two populations, and their mixture-aware variants.
//!
//! Every comparison except [`ks_test`] requires both populations to carry estimates on an
//! identical axis and fails with [`DzError::AxisMismatch`] otherwise.  Whether larger
//! values mean "more different" or "more similar" is never inferred here: callers state it
//! when they configure a mixture search or a permutation test.
use crate::errors::DzError;
use crate::population::Population;
use std::str::FromStr;

/// Maximum absolute difference between the cumulative estimates (K-S D statistic).
///
/// # Examples
///
/// ```
/// use detrital::prelude::*;
/// let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 300.0, 1.0));
/// let pop = Population::from_arrays(vec![100.0, 200.0], vec![5.0, 5.0], &config)?;
/// assert_eq!(metrics::dmax(&pop, &pop)?, 0.0);
/// # Ok::<(), DzError>(())
/// ```
pub fn dmax(a: &Population, b: &Population) -> Result<f64, DzError> {
    let (x, y) = cumulative_pair(a, b)?;
    Ok(x.iter()
        .zip(y)
        .map(|(p, q)| (p - q).abs())
        .fold(0.0, f64::max))
}

/// Kuiper V statistic: the most positive plus the most negative difference between the
/// cumulative estimates.
pub fn vmax(a: &Population, b: &Population) -> Result<f64, DzError> {
    let (x, y) = cumulative_pair(a, b)?;
    let above = x
        .iter()
        .zip(y)
        .map(|(p, q)| p - q)
        .fold(f64::NEG_INFINITY, f64::max);
    let below = x
        .iter()
        .zip(y)
        .map(|(p, q)| q - p)
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(above + below)
}

/// Squared Pearson correlation (r^2) of the two density estimates.
///
/// A density with zero variance leaves r undefined and yields
/// [`DzError::DegenerateSample`].
pub fn correlation_coefficient(a: &Population, b: &Population) -> Result<f64, DzError> {
    let (x, y, _) = density_pair(a, b)?;
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (p, q) in x.iter().zip(y) {
        let dx = p - mx;
        let dy = q - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if !(denom > 0.0) {
        return Err(DzError::DegenerateSample(
            "a density with zero variance has no correlation coefficient".to_string(),
        ));
    }
    let r = sxy / denom;
    Ok(r * r)
}

/// Similarity of two densities (Gehrels, 2000): the integral of `sqrt(p1 * p2)`.
pub fn similarity(a: &Population, b: &Population) -> Result<f64, DzError> {
    let (x, y, dt) = density_pair(a, b)?;
    Ok(x.iter().zip(y).map(|(p, q)| (p * q).sqrt()).sum::<f64>() * dt)
}

/// Likeness of two densities (Satkoski et al., 2013): one minus half the integrated
/// absolute difference.
pub fn likeness(a: &Population, b: &Population) -> Result<f64, DzError> {
    let (x, y, dt) = density_pair(a, b)?;
    Ok(1.0 - x.iter().zip(y).map(|(p, q)| (p - q).abs()).sum::<f64>() * dt / 2.0)
}

/// Two-sample Kolmogorov-Smirnov p-value of the raw grain ages.  Independent of any axis.
pub fn ks_test(a: &Population, b: &Population) -> Result<f64, DzError> {
    let (x, y) = match (a.sample(), b.sample()) {
        (Some(x), Some(y)) => (x.ages(), y.ages()),
        _ => {
            return Err(DzError::DegenerateSample(
                "the K-S test needs raw ages, a mixture has none".to_string(),
            ))
        }
    };
    let d = ks_statistic(x, y);
    let (nx, ny) = (x.len() as f64, y.len() as f64);
    let en = (nx * ny / (nx + ny)).sqrt();
    Ok(ks_probability((en + 0.12 + 0.11 / en) * d))
}

/// Largest distance between the empirical CDFs of two sets of observations, evaluated at
/// every distinct observed value.
pub fn ks_statistic(x: &[f64], y: &[f64]) -> f64 {
    let mut xs = x.to_vec();
    let mut ys = y.to_vec();
    xs.sort_by(|a, b| a.total_cmp(b));
    ys.sort_by(|a, b| a.total_cmp(b));
    let mut pooled: Vec<f64> = xs.iter().chain(&ys).cloned().collect();
    pooled.sort_by(|a, b| a.total_cmp(b));
    pooled.dedup();
    let (lnx, lny) = (xs.len() as f64, ys.len() as f64);
    pooled
        .iter()
        .map(|v| {
            let fx = xs.partition_point(|z| z <= v) as f64 / lnx;
            let fy = ys.partition_point(|z| z <= v) as f64 / lny;
            (fx - fy).abs()
        })
        .fold(0.0, f64::max)
}

/// Survival function of the Kolmogorov distribution, `Q(z) = 2 sum (-1)^(j-1) exp(-2 j^2 z^2)`.
pub fn ks_probability(z: f64) -> f64 {
    if z < 0.04 {
        return 1.0;
    }
    let q = if z < 1.18 {
        let y = (-std::f64::consts::PI.powi(2) / (8.0 * z * z)).exp();
        let p = (2.0 * std::f64::consts::PI).sqrt() / z
            * (y + y.powi(9) + y.powi(25) + y.powi(49));
        1.0 - p
    } else {
        let x = (-2.0 * z * z).exp();
        2.0 * (x - x.powi(4) + x.powi(9))
    };
    q.max(0.0).min(1.0)
}

/// [`dmax`] of `daughter` against the mixture of `parents` by `coefficients`.
pub fn mixture_dmax(
    daughter: &Population,
    parents: &[Population],
    coefficients: &[f64],
) -> Result<f64, DzError> {
    dmax(daughter, &Population::from_mixture(parents, coefficients)?)
}

/// [`vmax`] of `daughter` against the mixture of `parents` by `coefficients`.
pub fn mixture_vmax(
    daughter: &Population,
    parents: &[Population],
    coefficients: &[f64],
) -> Result<f64, DzError> {
    vmax(daughter, &Population::from_mixture(parents, coefficients)?)
}

/// [`correlation_coefficient`] of `daughter` against the mixture of `parents`.
pub fn mixture_correlation_coefficient(
    daughter: &Population,
    parents: &[Population],
    coefficients: &[f64],
) -> Result<f64, DzError> {
    correlation_coefficient(daughter, &Population::from_mixture(parents, coefficients)?)
}

/// [`similarity`] of `daughter` against the mixture of `parents`.
pub fn mixture_similarity(
    daughter: &Population,
    parents: &[Population],
    coefficients: &[f64],
) -> Result<f64, DzError> {
    similarity(daughter, &Population::from_mixture(parents, coefficients)?)
}

/// [`likeness`] of `daughter` against the mixture of `parents`.
pub fn mixture_likeness(
    daughter: &Population,
    parents: &[Population],
    coefficients: &[f64],
) -> Result<f64, DzError> {
    likeness(daughter, &Population::from_mixture(parents, coefficients)?)
}

/// [`ks_test`] against a mixture.  A mixture has no raw ages, so this always fails with
/// [`DzError::DegenerateSample`] once the mixture itself is valid.
pub fn mixture_ks_test(
    daughter: &Population,
    parents: &[Population],
    coefficients: &[f64],
) -> Result<f64, DzError> {
    ks_test(daughter, &Population::from_mixture(parents, coefficients)?)
}

/// A scalar comparison of two populations.
pub trait Objective: Sync {
    /// Name used in logs and permutation results.
    fn name(&self) -> String;

    /// Name written on the objective line of a mixture summary.
    fn mixture_name(&self) -> String {
        self.name()
    }

    /// Compare two populations.
    fn compare(&self, a: &Population, b: &Population) -> Result<f64, DzError>;

    /// Compare `daughter` to the mixture of `parents` by `coefficients`.
    fn compare_mixture(
        &self,
        daughter: &Population,
        parents: &[Population],
        coefficients: &[f64],
    ) -> Result<f64, DzError> {
        let mixed = Population::from_mixture(parents, coefficients)?;
        self.compare(daughter, &mixed)
    }
}

/// The built-in comparison metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// See [`dmax`].
    Dmax,
    /// See [`vmax`].
    Vmax,
    /// See [`correlation_coefficient`].
    CorrelationCoefficient,
    /// See [`similarity`].
    Similarity,
    /// See [`likeness`].
    Likeness,
    /// See [`ks_test`].
    KsTest,
}

impl Metric {
    /// Every built-in metric.
    pub const ALL: [Metric; 6] = [
        Metric::Dmax,
        Metric::Vmax,
        Metric::CorrelationCoefficient,
        Metric::Similarity,
        Metric::Likeness,
        Metric::KsTest,
    ];

    /// Short name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Dmax => "Dmax",
            Metric::Vmax => "Vmax",
            Metric::CorrelationCoefficient => "R2",
            Metric::Similarity => "Similarity",
            Metric::Likeness => "Likeness",
            Metric::KsTest => "KS p-value",
        }
    }

    /// Name of the mixture-aware function, as it appears in mixture summaries.
    pub fn mixture_name(&self) -> &'static str {
        match self {
            Metric::Dmax => "mixture_Dmax",
            Metric::Vmax => "mixture_Vmax",
            Metric::CorrelationCoefficient => "mixture_correlationCoeff",
            Metric::Similarity => "mixture_Similarity",
            Metric::Likeness => "mixture_Likeness",
            Metric::KsTest => "mixture_KSTest",
        }
    }
}

impl FromStr for Metric {
    type Err = DzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.strip_prefix("mixture_").unwrap_or(&s) {
            "dmax" => Ok(Metric::Dmax),
            "vmax" => Ok(Metric::Vmax),
            "r2" | "correlation" | "correlation coefficient" | "correlationcoeff" => {
                Ok(Metric::CorrelationCoefficient)
            }
            "similarity" => Ok(Metric::Similarity),
            "likeness" => Ok(Metric::Likeness),
            "ks" | "ks p-value" | "kstest" => Ok(Metric::KsTest),
            other => Err(DzError::Configuration(format!(
                "unrecognized metric '{}'",
                other
            ))),
        }
    }
}

impl Objective for Metric {
    fn name(&self) -> String {
        self.as_str().to_string()
    }

    fn mixture_name(&self) -> String {
        Metric::mixture_name(self).to_string()
    }

    fn compare(&self, a: &Population, b: &Population) -> Result<f64, DzError> {
        match self {
            Metric::Dmax => dmax(a, b),
            Metric::Vmax => vmax(a, b),
            Metric::CorrelationCoefficient => correlation_coefficient(a, b),
            Metric::Similarity => similarity(a, b),
            Metric::Likeness => likeness(a, b),
            Metric::KsTest => ks_test(a, b),
        }
    }
}

/// A named closure used as an objective.
///
/// # Examples
///
/// ```
/// use detrital::prelude::*;
/// let objective = ObjectiveFn::new("Dmax + Vmax", |a: &Population, b: &Population| {
///     Ok(metrics::dmax(a, b)? + metrics::vmax(a, b)?)
/// });
/// assert_eq!(objective.name(), "Dmax + Vmax");
/// ```
pub struct ObjectiveFn<F> {
    name: String,
    f: F,
}

impl<F> ObjectiveFn<F>
where
    F: Fn(&Population, &Population) -> Result<f64, DzError> + Sync,
{
    /// Name a comparison closure.
    pub fn new(name: &str, f: F) -> Self {
        ObjectiveFn {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> Objective for ObjectiveFn<F>
where
    F: Fn(&Population, &Population) -> Result<f64, DzError> + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn compare(&self, a: &Population, b: &Population) -> Result<f64, DzError> {
        (self.f)(a, b)
    }
}

fn cumulative_pair<'a>(
    a: &'a Population,
    b: &'a Population,
) -> Result<(&'a [f64], &'a [f64]), DzError> {
    let (ca, cb) = (a.cumulative()?, b.cumulative()?);
    ca.axis().ensure_matches(cb.axis(), "cumulative estimates")?;
    Ok((ca.values(), cb.values()))
}

fn density_pair<'a>(
    a: &'a Population,
    b: &'a Population,
) -> Result<(&'a [f64], &'a [f64], f64), DzError> {
    let (da, db) = (a.density()?, b.density()?);
    da.axis().ensure_matches(db.axis(), "density estimates")?;
    Ok((da.values(), db.values(), da.axis().dt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisSpec;
    use crate::population::{DistributionConfig, Sample};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> DistributionConfig {
        DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 1.0))
    }

    fn pop(ages: Vec<f64>) -> Population {
        let errors = ages.iter().map(|a| 0.02 * a + 5.0).collect();
        Population::from_arrays(ages, errors, &config()).unwrap()
    }

    #[test]
    fn self_comparisons_are_trivial() {
        let p = pop(vec![150.0, 420.0, 1100.0, 1105.0, 1800.0]);
        assert_eq!(dmax(&p, &p).unwrap(), 0.0);
        assert_eq!(vmax(&p, &p).unwrap(), 0.0);
        assert_eq!(correlation_coefficient(&p, &p).unwrap(), 1.0);
        assert!((similarity(&p, &p).unwrap() - 1.0).abs() < 1e-9);
        assert!((likeness(&p, &p).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(ks_test(&p, &p).unwrap(), 1.0);
    }

    #[test]
    fn disjoint_populations_are_maximally_different() {
        let young = pop(vec![100.0, 110.0, 120.0]);
        let old = pop(vec![2000.0, 2010.0, 2020.0]);
        assert_eq!(dmax(&young, &old).unwrap(), 1.0);
        assert_eq!(vmax(&young, &old).unwrap(), 1.0);
        assert!(similarity(&young, &old).unwrap() < 1e-6);
        assert!(likeness(&young, &old).unwrap().abs() < 1e-6);
    }

    #[test]
    fn vmax_adds_both_tails() {
        // b is a's distribution with its two halves pulled toward the middle
        let a = pop(vec![100.0, 2000.0]);
        let b = pop(vec![900.0, 1200.0]);
        let d = dmax(&a, &b).unwrap();
        let v = vmax(&a, &b).unwrap();
        assert!((d - 0.5).abs() < 1e-12);
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn metrics_are_bounded() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..5 {
            let a = Sample::from_normal(900.0, 200.0, 20.0, 60, &mut rng).unwrap();
            let b = Sample::from_normal(1100.0, 300.0, 20.0, 60, &mut rng).unwrap();
            let a = Population::from_sample(a, &config()).unwrap();
            let b = Population::from_sample(b, &config()).unwrap();
            for m in &[Metric::Dmax, Metric::Similarity, Metric::Likeness, Metric::CorrelationCoefficient, Metric::KsTest] {
                let v = m.compare(&a, &b).unwrap();
                assert!((0.0..=1.0 + 1e-9).contains(&v), "{} = {}", m.as_str(), v);
            }
            let v = vmax(&a, &b).unwrap();
            assert!(v >= dmax(&a, &b).unwrap() && v <= 2.0);
        }
    }

    #[test]
    fn mismatched_axes_fail_hard() {
        let a = pop(vec![100.0, 200.0]);
        let other = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 2.0));
        let b = Population::from_arrays(vec![100.0, 200.0], vec![5.0, 5.0], &other).unwrap();
        for m in &[Metric::Dmax, Metric::Vmax, Metric::CorrelationCoefficient, Metric::Similarity, Metric::Likeness] {
            assert!(matches!(m.compare(&a, &b), Err(DzError::AxisMismatch(_))));
        }
        // the K-S test uses raw ages only
        assert!(Metric::KsTest.compare(&a, &b).is_ok());
    }

    #[test]
    fn flat_density_has_no_correlation() {
        let config = DistributionConfig::new()
            .axis(AxisSpec::fixed(0.0, 10.0, 1.0))
            .density(crate::population::DensityMethod::Kde {
                bandwidth: Some(1.0),
                kernel: crate::population::Kernel::custom(|t: &[f64]| vec![1.0; t.len()]),
            });
        let flat = Population::from_arrays(vec![5.0], vec![1.0], &config).unwrap();
        assert!(matches!(
            correlation_coefficient(&flat, &flat),
            Err(DzError::DegenerateSample(_))
        ));
    }

    #[test]
    fn ks_statistic_on_raw_values() {
        assert_eq!(ks_statistic(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(ks_statistic(&[1.0, 2.0], &[3.0, 4.0]), 1.0);
        assert!((ks_statistic(&[1.0, 2.0, 3.0, 4.0], &[3.5, 4.5]) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn kolmogorov_survival_function() {
        assert_eq!(ks_probability(0.0), 1.0);
        assert!((ks_probability(1.0) - 0.27).abs() < 1e-3);
        assert!((ks_probability(1.358) - 0.05).abs() < 1e-3);
        assert!((ks_probability(1.628) - 0.01).abs() < 1e-3);
        assert!(ks_probability(5.0) < 1e-20);
    }

    #[test]
    fn ks_test_separates_disjoint_samples() {
        let young = pop((0..50).map(|i| 100.0 + i as f64).collect());
        let old = pop((0..50).map(|i| 2000.0 + i as f64).collect());
        assert!(ks_test(&young, &old).unwrap() < 1e-10);
    }

    #[test]
    fn cumulative_metrics_ignore_undefined_density() {
        let exact = Population::from_arrays(
            vec![100.0, 150.0, 200.0, 250.0],
            vec![0.0, 5.0, 5.0, 5.0],
            &config(),
        )
        .unwrap();
        let other = pop(vec![1000.0, 1100.0, 1200.0, 1300.0]);
        assert_eq!(dmax(&exact, &other).unwrap(), 1.0);
        assert_eq!(vmax(&exact, &other).unwrap(), 1.0);
        assert!(ks_test(&exact, &other).unwrap() < 0.05);
        assert!(matches!(
            likeness(&exact, &other),
            Err(DzError::DegenerateSample(_))
        ));
    }

    #[test]
    fn mixture_wrappers_delegate() {
        let a = pop(vec![200.0, 250.0, 300.0]);
        let b = pop(vec![1500.0, 1600.0]);
        let parents = vec![a.clone(), b];
        assert_eq!(mixture_dmax(&a, &parents, &[1.0, 0.0]).unwrap(), 0.0);
        assert_eq!(mixture_vmax(&a, &parents, &[1.0, 0.0]).unwrap(), 0.0);
        assert!((mixture_likeness(&a, &parents, &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((mixture_similarity(&a, &parents, &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-9);
        assert!((mixture_correlation_coefficient(&a, &parents, &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(mixture_dmax(&a, &parents, &[0.5, 0.5]).unwrap() > 0.4);
        assert!(matches!(
            mixture_ks_test(&a, &parents, &[0.5, 0.5]),
            Err(DzError::DegenerateSample(_))
        ));
        assert!(matches!(
            Metric::Dmax.compare_mixture(&a, &parents, &[0.7, 0.7]),
            Err(DzError::InvalidCoefficients(_))
        ));
    }

    #[test]
    fn custom_objective() {
        let a = pop(vec![200.0, 250.0]);
        let f = ObjectiveFn::new("twice dmax", |x: &Population, y: &Population| {
            Ok(2.0 * dmax(x, y)?)
        });
        assert_eq!(f.compare(&a, &a).unwrap(), 0.0);
        assert_eq!(f.name(), "twice dmax");
    }

    #[test]
    fn metric_names_round_trip() {
        for m in Metric::ALL.iter() {
            assert_eq!(m.as_str().parse::<Metric>().unwrap(), *m);
            assert_eq!(m.mixture_name().parse::<Metric>().unwrap(), *m);
        }
        assert!("chi2".parse::<Metric>().is_err());
    }
}
