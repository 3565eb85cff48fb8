//! Permutation tests: how often does a random relabeling of two pooled samples produce
//! an objective value at least as extreme as the observed one?
use crate::errors::DzError;
use crate::metrics::Objective;
use crate::population::{
    DensityMethod, DistributionConfig, Population, Sample, DEFAULT_BANDWIDTH,
};
use crate::utils;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default number of relabeled trials.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Configures and runs permutation tests.
///
/// # Examples
///
/// ```
/// use detrital::prelude::*;
/// let young = Sample::new(vec![30.0, 32.0, 35.0, 28.0, 31.0, 26.0], vec![5.0; 6])?;
/// let old = Sample::new(vec![2000.0, 2004.0, 1995.0, 2010.0, 1990.0, 2001.0], vec![5.0; 6])?;
/// let result = PermutationTest::new(true)
///     .iterations(200)
///     .seed(7)
///     .evaluate(&young, &old, &Metric::Dmax)?;
/// assert_eq!(result.true_value(), 1.0);
/// assert!(result.p_value() < 0.05);
/// # Ok::<(), DzError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PermutationTest {
    larger_is_more_different: bool,
    iterations: usize,
    seed: Option<u64>,
    config: DistributionConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl PermutationTest {
    /// New test.  `larger_is_more_different` says which tail of the objective counts as
    /// extreme: true for distances like Dmax, false for similarity measures.
    pub fn new(larger_is_more_different: bool) -> Self {
        PermutationTest {
            larger_is_more_different,
            iterations: DEFAULT_ITERATIONS,
            seed: None,
            config: DistributionConfig::default(),
            cancel: None,
        }
    }

    /// Number of relabeled trials.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Seed for the trial generators.  Without one, a seed is drawn at random and
    /// reported in the result.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Estimators used for every population.  A derived axis is resolved once from the
    /// pooled sample so that all trials share it.
    pub fn config(mut self, config: DistributionConfig) -> Self {
        self.config = config;
        self
    }

    /// Flag checked before each trial; raising it aborts the run.
    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Compare `a` against `b` with `objective`, then build the null distribution from
    /// relabeled trials that keep both class sizes.
    pub fn evaluate(
        &self,
        a: &Sample,
        b: &Sample,
        objective: &dyn Objective,
    ) -> Result<PermutationResult, DzError> {
        if self.iterations < 1 {
            return Err(DzError::Configuration(
                "a permutation test needs at least one iteration".to_string(),
            ));
        }
        let pooled = Sample::pool(a, b);
        if pooled.len() < 2 {
            return Err(DzError::DegenerateSample(
                "cannot permute fewer than two grains".to_string(),
            ));
        }

        let mut config = self.config.clone();
        config.axis = config.axis.resolve(&pooled)?.spec();
        if let DensityMethod::Kde { bandwidth, .. } = &mut config.density {
            if bandwidth.is_none() {
                warn!("No bandwidth selected, defaulting to {:.0}", DEFAULT_BANDWIDTH);
                *bandwidth = Some(DEFAULT_BANDWIDTH);
            }
        }

        let true_value = objective.compare(
            &Population::from_sample(a.clone(), &config)?,
            &Population::from_sample(b.clone(), &config)?,
        )?;

        let base_seed = self.seed.unwrap_or_else(rand::random);
        info!(
            "permutation test of {} vs {} grains, {} trials of {}, seed {}",
            a.len(),
            b.len(),
            self.iterations,
            objective.name(),
            base_seed
        );

        let mut labels = vec![true; a.len()];
        labels.extend(vec![false; b.len()]);
        let cancel = self.cancel.as_deref();
        let config = &config;
        let pooled = &pooled;
        let labels = &labels;
        let trials = (0..self.iterations)
            .into_par_iter()
            .map(|trial| -> Result<f64, DzError> {
                if cancel.map_or(false, |f| f.load(Ordering::Relaxed)) {
                    return Err(DzError::Cancelled);
                }
                let seed = utils::counter_rng_seed(base_seed, trial as u64);
                let mut rng = StdRng::seed_from_u64(seed);
                let mut shuffled = labels.clone();
                shuffled.shuffle(&mut rng);
                let first = Population::from_sample(pooled.select(&shuffled, true)?, config)?;
                let second = Population::from_sample(pooled.select(&shuffled, false)?, config)?;
                objective.compare(&first, &second)
            })
            .collect::<Result<Vec<f64>, DzError>>()?;

        let result = PermutationResult {
            true_value,
            trials,
            larger_is_more_different: self.larger_is_more_different,
            seed: base_seed,
            objective: objective.name(),
        };
        info!(
            "{} = {}, p = {}",
            result.objective,
            result.true_value,
            result.p_value()
        );
        Ok(result)
    }
}

/// One row of an exported null distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialRecord {
    /// Trial index.
    pub trial: usize,
    /// Objective value of the trial.
    pub value: f64,
}

/// Observed objective value together with its permutation null distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationResult {
    true_value: f64,
    trials: Vec<f64>,
    larger_is_more_different: bool,
    seed: u64,
    objective: String,
}

impl PermutationResult {
    /// Objective value of the original labeling.
    pub fn true_value(&self) -> f64 {
        self.true_value
    }

    /// Objective values of the relabeled trials, in trial order.
    pub fn trials(&self) -> &[f64] {
        &self.trials
    }

    /// Whether larger values indicate more different samples.
    pub fn larger_is_more_different(&self) -> bool {
        self.larger_is_more_different
    }

    /// Seed that reproduces the trials.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Name of the objective.
    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Fraction of trials at least as extreme as the observed value.
    pub fn p_value(&self) -> f64 {
        self.p_value_for(self.true_value)
    }

    /// Fraction of trials at least as extreme as `value`.  Ties count as extreme.
    pub fn p_value_for(&self, value: f64) -> f64 {
        let extreme = if self.larger_is_more_different {
            self.trials.iter().filter(|&&t| t >= value).count()
        } else {
            self.trials.iter().filter(|&&t| t <= value).count()
        };
        extreme as f64 / self.trials.len() as f64
    }

    fn critical_value(&self, p: f64) -> f64 {
        let q = if self.larger_is_more_different {
            (1.0 - p) * 100.0
        } else {
            p * 100.0
        };
        utils::percentile(&self.trials, q)
    }

    /// Objective value a comparison must reach to be significant at level `p`: the upper
    /// `p` tail of the trials when larger is more different, the lower tail otherwise.
    pub fn value_for_p(&self, p: f64) -> Result<f64, DzError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(DzError::Configuration(format!(
                "p must lie in [0, 1], got {}",
                p
            )));
        }
        Ok(self.critical_value(p))
    }

    /// `n` log-spaced p values from 0.001 to 1 paired with their critical values.
    pub fn p_value_curve(&self, n: usize) -> Vec<(f64, f64)> {
        utils::logspace(-3.0, 0.0, n)
            .into_iter()
            .map(|p| (p, self.critical_value(p.min(1.0))))
            .collect()
    }

    /// `n` evenly spaced values across the range of the trials paired with the fraction
    /// of trials at least as extreme.
    pub fn exceedance_curve(&self, n: usize) -> Vec<(f64, f64)> {
        let lo = self.trials.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = self.trials.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !(lo.is_finite() && hi.is_finite()) {
            return Vec::new();
        }
        utils::linspace(lo, hi, n)
            .into_iter()
            .map(|v| (v, self.p_value_for(v)))
            .collect()
    }

    /// Write `(trial, value)` rows to csv.
    pub fn record<P: AsRef<Path>>(&self, path: P) -> Result<(), DzError> {
        let rows: Vec<TrialRecord> = self
            .trials
            .iter()
            .enumerate()
            .map(|(trial, &value)| TrialRecord { trial, value })
            .collect();
        utils::record(&rows, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisSpec;
    use crate::metrics::Metric;

    fn synthetic(trials: Vec<f64>, larger: bool) -> PermutationResult {
        PermutationResult {
            true_value: 0.0,
            trials,
            larger_is_more_different: larger,
            seed: 0,
            objective: "test".to_string(),
        }
    }

    #[test]
    fn disjoint_samples_are_significant() {
        let mut rng = StdRng::seed_from_u64(3);
        let young = Sample::from_normal(30.0, 5.0, 5.0, 30, &mut rng).unwrap();
        let old = Sample::from_normal(2000.0, 5.0, 5.0, 30, &mut rng).unwrap();
        let result = PermutationTest::new(true)
            .iterations(300)
            .seed(1)
            .evaluate(&young, &old, &Metric::Dmax)
            .unwrap();
        assert_eq!(result.true_value(), 1.0);
        assert_eq!(result.p_value(), 0.0);
        assert_eq!(result.trials().len(), 300);
    }

    #[test]
    fn same_distribution_gives_central_p_values() {
        let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 1000.0, 2.0));
        let pairs = 20;
        let mut total = 0.0;
        for seed in 0..pairs as u64 {
            let mut rng = StdRng::seed_from_u64(100 + seed);
            let a = Sample::from_normal(500.0, 100.0, 10.0, 100, &mut rng).unwrap();
            let b = Sample::from_normal(500.0, 100.0, 10.0, 100, &mut rng).unwrap();
            let result = PermutationTest::new(true)
                .iterations(200)
                .seed(seed)
                .config(config.clone())
                .evaluate(&a, &b, &Metric::Dmax)
                .unwrap();
            total += result.p_value();
        }
        let mean = total / pairs as f64;
        assert!((0.3..=0.7).contains(&mean), "mean p-value {}", mean);
    }

    #[test]
    fn zero_error_grains_still_compare() {
        let a = Sample::new(
            vec![100.0, 120.0, 140.0, 160.0, 180.0, 200.0],
            vec![0.0, 5.0, 5.0, 5.0, 5.0, 5.0],
        )
        .unwrap();
        let b = Sample::new(
            vec![700.0, 720.0, 740.0, 760.0, 780.0, 800.0],
            vec![5.0, 5.0, 0.0, 5.0, 5.0, 5.0],
        )
        .unwrap();
        let test = PermutationTest::new(true)
            .iterations(200)
            .seed(4)
            .config(DistributionConfig::new().axis(AxisSpec::fixed(0.0, 1000.0, 1.0)));
        let dmax = test.evaluate(&a, &b, &Metric::Dmax).unwrap();
        assert_eq!(dmax.true_value(), 1.0);
        assert!(dmax.p_value() < 0.05);

        let ks = PermutationTest::new(false)
            .iterations(50)
            .seed(4)
            .evaluate(&a, &b, &Metric::KsTest)
            .unwrap();
        assert!(ks.true_value() < 0.01);
    }

    #[test]
    fn similarity_uses_lower_tail() {
        let mut rng = StdRng::seed_from_u64(5);
        let young = Sample::from_normal(300.0, 20.0, 10.0, 25, &mut rng).unwrap();
        let old = Sample::from_normal(1500.0, 20.0, 10.0, 25, &mut rng).unwrap();
        let result = PermutationTest::new(false)
            .iterations(100)
            .seed(2)
            .config(DistributionConfig::new().axis(AxisSpec::new().dt(5.0)))
            .evaluate(&young, &old, &Metric::Likeness)
            .unwrap();
        assert!(result.true_value() < 0.01);
        assert_eq!(result.p_value(), 0.0);
    }

    #[test]
    fn seeded_runs_repeat() {
        let mut rng = StdRng::seed_from_u64(9);
        let a = Sample::from_normal(800.0, 150.0, 15.0, 40, &mut rng).unwrap();
        let b = Sample::from_normal(900.0, 150.0, 15.0, 40, &mut rng).unwrap();
        let test = PermutationTest::new(true).iterations(50).seed(77);
        let first = test.evaluate(&a, &b, &Metric::Vmax).unwrap();
        let second = test.evaluate(&a, &b, &Metric::Vmax).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.seed(), 77);
        let other = test.clone().seed(78).evaluate(&a, &b, &Metric::Vmax).unwrap();
        assert_ne!(first.trials(), other.trials());
    }

    #[test]
    fn zero_iterations_rejected() {
        let a = Sample::new(vec![10.0, 20.0], vec![1.0, 1.0]).unwrap();
        assert!(matches!(
            PermutationTest::new(true).iterations(0).evaluate(&a, &a, &Metric::Dmax),
            Err(DzError::Configuration(_))
        ));
    }

    #[test]
    fn raised_flag_cancels() {
        let a = Sample::new(vec![10.0, 20.0], vec![1.0, 1.0]).unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        assert!(matches!(
            PermutationTest::new(true)
                .iterations(10)
                .cancel(flag)
                .evaluate(&a, &a, &Metric::Dmax),
            Err(DzError::Cancelled)
        ));
    }

    #[test]
    fn ties_count_as_extreme() {
        let upper = synthetic(vec![1.0, 2.0, 2.0, 3.0], true);
        assert_eq!(upper.p_value_for(2.0), 0.75);
        let lower = synthetic(vec![1.0, 2.0, 2.0, 3.0], false);
        assert_eq!(lower.p_value_for(2.0), 0.75);
        assert_eq!(lower.p_value_for(0.5), 0.0);
    }

    #[test]
    fn critical_values_invert_p_values() {
        let trials: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let upper = synthetic(trials.clone(), true);
        let v = upper.value_for_p(0.05).unwrap();
        assert!((v - 95.05).abs() < 1e-9);
        assert!((upper.p_value_for(v) - 0.05).abs() < 1e-12);

        let lower = synthetic(trials, false);
        let v = lower.value_for_p(0.05).unwrap();
        assert!((v - 5.95).abs() < 1e-9);
        assert!((lower.p_value_for(v) - 0.05).abs() < 1e-12);
        assert!(lower.value_for_p(1.5).is_err());
    }

    #[test]
    fn curves() {
        let trials: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin()).collect();
        let result = synthetic(trials, true);
        let pc = result.p_value_curve(20);
        assert_eq!(pc.len(), 20);
        assert!((pc[0].0 - 0.001).abs() < 1e-12);
        assert!(pc.windows(2).all(|w| w[0].1 >= w[1].1));
        let ec = result.exceedance_curve(10);
        assert_eq!(ec.len(), 10);
        assert_eq!(ec[0].1, 1.0);
        assert_eq!(ec[9].1, 1.0 / 50.0);
        assert!(ec.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn null_distribution_exports() {
        let result = synthetic(vec![0.25, 0.5], true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("null.csv");
        result.record(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "trial,value\n0,0.25\n1,0.5\n");
    }
}
