//! Samples of dated grains and the density and cumulative distributions estimated from them.
//!
//! A [`Sample`] holds raw (age, 1-sigma error) measurements.  A [`Population`] pairs an
//! optional sample with a density estimate and a cumulative estimate computed over one
//! shared [`Axis`].  Populations are built through explicit factories:
//!
//!  - [`Population::from_sample`] / [`Population::from_arrays`] from measurements,
//!  - [`Population::from_csv`] from a delimited text file,
//!  - [`Population::from_density`] by drawing grains from a tabulated density,
//!  - [`Population::from_mixture`] by blending parent populations,
//!  - `clone()` to copy an existing population.
use crate::axis::{Axis, AxisSpec};
use crate::errors::DzError;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Normal;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Tolerance on the sum of mixing coefficients.
pub const COEFFICIENT_TOLERANCE: f64 = 1e-6;

/// Bandwidth used by the kernel density estimator when none is given.
pub const DEFAULT_BANDWIDTH: f64 = 10.0;

/// Immutable set of grain ages and their 1-sigma errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    ages: Vec<f64>,
    errors: Vec<f64>,
}

impl Sample {
    /// Create a sample from equal-length age and error vectors.
    ///
    /// # Examples
    ///
    /// ```
    /// use detrital::prelude::*;
    /// let sample = Sample::new(vec![110.0, 95.5, 1203.0], vec![2.0, 1.5, 20.0])?;
    /// assert_eq!(sample.len(), 3);
    /// # Ok::<(), DzError>(())
    /// ```
    pub fn new(ages: Vec<f64>, errors: Vec<f64>) -> Result<Self, DzError> {
        if ages.is_empty() {
            return Err(DzError::DegenerateSample(
                "a sample needs at least one grain".to_string(),
            ));
        }
        if ages.len() != errors.len() {
            return Err(DzError::Configuration(format!(
                "{} ages but {} errors",
                ages.len(),
                errors.len()
            )));
        }
        if let Some(age) = ages.iter().find(|a| !a.is_finite()) {
            return Err(DzError::Configuration(format!("non-finite age {}", age)));
        }
        if let Some(err) = errors.iter().find(|e| !e.is_finite() || **e < 0.0) {
            return Err(DzError::Configuration(format!(
                "errors must be finite and non-negative, got {}",
                err
            )));
        }
        Ok(Sample { ages, errors })
    }

    /// Read ages and errors from a delimited text file with a header row.  Header names
    /// are matched without regard to case.
    pub fn read_csv<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        age_header: &str,
        error_header: &str,
    ) -> Result<Self, DzError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = rdr.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    DzError::Configuration(format!(
                        "could not find header '{}' among {:?}",
                        name,
                        headers.iter().collect::<Vec<_>>()
                    ))
                })
        };
        let age_idx = find(age_header)?;
        let error_idx = find(error_header)?;

        let mut ages = Vec::new();
        let mut errors = Vec::new();
        for result in rdr.records() {
            let row = result?;
            let pair = csv::StringRecord::from(vec![
                row.get(age_idx).unwrap_or(""),
                row.get(error_idx).unwrap_or(""),
            ]);
            let (age, error): (f64, f64) = pair.deserialize(None)?;
            ages.push(age);
            errors.push(error);
        }
        Sample::new(ages, errors)
    }

    /// Draw `n` ages from a normal distribution, each with the same 1-sigma `error`.
    pub fn from_normal<R: Rng + ?Sized>(
        mean: f64,
        sd: f64,
        error: f64,
        n: usize,
        rng: &mut R,
    ) -> Result<Self, DzError> {
        let normal = Normal::new(mean, sd)?;
        let ages = (0..n).map(|_| normal.sample(rng)).collect();
        Sample::new(ages, vec![error; n])
    }

    /// Concatenate two samples, `a` first.
    pub fn pool(a: &Sample, b: &Sample) -> Sample {
        let mut ages = a.ages.clone();
        ages.extend_from_slice(&b.ages);
        let mut errors = a.errors.clone();
        errors.extend_from_slice(&b.errors);
        Sample { ages, errors }
    }

    /// New sample of the grains whose `labels` entry equals `label`.
    pub fn select(&self, labels: &[bool], label: bool) -> Result<Sample, DzError> {
        if labels.len() != self.len() {
            return Err(DzError::Configuration(format!(
                "{} labels for {} grains",
                labels.len(),
                self.len()
            )));
        }
        let (ages, errors): (Vec<f64>, Vec<f64>) = self
            .ages
            .iter()
            .zip(&self.errors)
            .zip(labels)
            .filter(|(_, l)| **l == label)
            .map(|((a, e), _)| (*a, *e))
            .unzip();
        Sample::new(ages, errors)
    }

    /// Grain ages.
    pub fn ages(&self) -> &[f64] {
        &self.ages
    }

    /// Grain 1-sigma errors.
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Number of grains.
    pub fn len(&self) -> usize {
        self.ages.len()
    }

    /// Always false, samples hold at least one grain.
    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    /// Index of the youngest grain (first on ties).
    pub fn argmin(&self) -> usize {
        self.ages
            .iter()
            .enumerate()
            .fold(0, |best, (i, a)| if *a < self.ages[best] { i } else { best })
    }

    /// Index of the oldest grain (first on ties).
    pub fn argmax(&self) -> usize {
        self.ages
            .iter()
            .enumerate()
            .fold(0, |best, (i, a)| if *a > self.ages[best] { i } else { best })
    }
}

/// Kernel for the kernel density estimator.  Maps an array of offsets, already divided
/// by the bandwidth, to an array of weights of the same length.
#[derive(Clone)]
pub enum Kernel {
    /// Standard normal kernel.
    Gaussian,
    /// User supplied kernel.
    Custom(Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>),
}

impl Kernel {
    /// Wrap a closure as a kernel.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        Kernel::Custom(Arc::new(f))
    }

    fn weights(&self, offsets: &[f64]) -> Result<Vec<f64>, DzError> {
        match self {
            Kernel::Gaussian => {
                let c = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
                Ok(offsets.iter().map(|t| c * (-t * t / 2.0).exp()).collect())
            }
            Kernel::Custom(f) => {
                let w = f(offsets);
                if w.len() != offsets.len() {
                    return Err(DzError::Configuration(format!(
                        "kernel returned {} weights for {} offsets",
                        w.len(),
                        offsets.len()
                    )));
                }
                Ok(w)
            }
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kernel::Gaussian => write!(f, "Gaussian"),
            Kernel::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl PartialEq for Kernel {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Kernel::Gaussian, Kernel::Gaussian) => true,
            (Kernel::Custom(a), Kernel::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// How to estimate the density function.
#[derive(Debug, Clone, PartialEq)]
pub enum DensityMethod {
    /// Probability density plot: sum of per-grain normal distributions, normalized.
    Pdp,
    /// Fixed bandwidth kernel density estimate.
    Kde {
        /// Kernel bandwidth in age units, `None` for the default of 10.
        bandwidth: Option<f64>,
        /// Kernel function.
        kernel: Kernel,
    },
}

impl DensityMethod {
    /// Gaussian kernel density estimate with the given bandwidth.
    pub fn kde(bandwidth: f64) -> Self {
        DensityMethod::Kde {
            bandwidth: Some(bandwidth),
            kernel: Kernel::Gaussian,
        }
    }
}

impl Default for DensityMethod {
    fn default() -> Self {
        DensityMethod::Pdp
    }
}

impl FromStr for DensityMethod {
    type Err = DzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdp" => Ok(DensityMethod::Pdp),
            "kde" => Ok(DensityMethod::Kde {
                bandwidth: None,
                kernel: Kernel::Gaussian,
            }),
            other => Err(DzError::Configuration(format!(
                "unrecognized density method '{}', use 'pdp' or 'kde'",
                other
            ))),
        }
    }
}

/// How to estimate the cumulative distribution function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CumulativeMethod {
    /// Fraction of ages at or below each axis point.
    Discrete,
    /// Running integral of the density estimate.
    IntegratedDensity,
}

impl Default for CumulativeMethod {
    fn default() -> Self {
        CumulativeMethod::Discrete
    }
}

impl FromStr for CumulativeMethod {
    type Err = DzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discrete" => Ok(CumulativeMethod::Discrete),
            "integrated pdf" | "integrated" => Ok(CumulativeMethod::IntegratedDensity),
            other => Err(DzError::Configuration(format!(
                "unrecognized cumulative method '{}', use 'discrete' or 'integrated pdf'",
                other
            ))),
        }
    }
}

/// Every option that shapes a population's estimates.
///
/// # Examples
///
/// ```
/// use detrital::prelude::*;
/// let config = DistributionConfig::new()
///     .axis(AxisSpec::fixed(0.0, 4500.0, 1.0))
///     .density("kde".parse()?)
///     .cumulative(CumulativeMethod::IntegratedDensity);
/// assert_eq!(config.cumulative, CumulativeMethod::IntegratedDensity);
/// # Ok::<(), DzError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionConfig {
    /// Axis bounds and spacing.
    pub axis: AxisSpec,
    /// Density estimator.
    pub density: DensityMethod,
    /// Cumulative estimator.
    pub cumulative: CumulativeMethod,
}

impl DistributionConfig {
    /// Derived axis, probability density plot and discrete cumulative.
    pub fn new() -> Self {
        DistributionConfig::default()
    }

    /// Set the axis spec.
    pub fn axis(mut self, axis: AxisSpec) -> Self {
        self.axis = axis;
        self
    }

    /// Set the density method.
    pub fn density(mut self, density: DensityMethod) -> Self {
        self.density = density;
        self
    }

    /// Set the cumulative method.
    pub fn cumulative(mut self, cumulative: CumulativeMethod) -> Self {
        self.cumulative = cumulative;
        self
    }
}

/// Axis-aligned values produced by one estimation method.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate<M> {
    axis: Axis,
    values: Vec<f64>,
    method: M,
}

/// Density function on an axis.
pub type DensityEstimate = Estimate<DensityMethod>;
/// Cumulative distribution function on an axis.
pub type CumulativeEstimate = Estimate<CumulativeMethod>;

impl<M> Estimate<M> {
    /// Axis the values are defined on.
    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    /// Estimated values, one per axis point.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Method that produced the values.
    pub fn method(&self) -> &M {
        &self.method
    }
}

/// Lifecycle of a cached estimate.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateState<M> {
    /// Never computed.
    Uncomputed,
    /// Computed and consistent with the population's current axis.
    Computed(Estimate<M>),
    /// Computed from inputs that have since been replaced: a new axis, or, for an
    /// integrated cumulative, a new density.
    Stale(Estimate<M>),
    /// The sample cannot support this estimate, e.g. a probability density plot of a
    /// grain with zero error.  Holds the reason.
    Undefined(String),
}

impl<M> EstimateState<M> {
    fn get(&self, what: &str) -> Result<&Estimate<M>, DzError> {
        match self {
            EstimateState::Computed(e) => Ok(e),
            EstimateState::Uncomputed => Err(DzError::Configuration(format!(
                "{} has not been calculated",
                what
            ))),
            EstimateState::Stale(_) => Err(DzError::Configuration(format!(
                "{} is stale after its axis or density changed, recalculate it",
                what
            ))),
            EstimateState::Undefined(reason) => Err(DzError::DegenerateSample(format!(
                "{} is undefined: {}",
                what, reason
            ))),
        }
    }

    fn invalidate(&mut self) {
        if let EstimateState::Computed(e) = std::mem::replace(self, EstimateState::Uncomputed) {
            *self = EstimateState::Stale(e);
        }
    }

    fn invalidate_unless_on(&mut self, axis: &Axis) {
        let moved = match self {
            EstimateState::Computed(e) => e.axis != *axis,
            _ => false,
        };
        if moved {
            self.invalidate();
        }
    }

    /// True once computed and not stale.
    pub fn is_computed(&self) -> bool {
        matches!(self, EstimateState::Computed(_))
    }

    /// True if the estimate was invalidated by a new axis or density.
    pub fn is_stale(&self) -> bool {
        matches!(self, EstimateState::Stale(_))
    }

    /// True if the sample cannot support the estimate.
    pub fn is_undefined(&self) -> bool {
        matches!(self, EstimateState::Undefined(_))
    }
}

/// Which estimate to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateKind {
    /// The density function.
    Density,
    /// The cumulative distribution function.
    Cumulative,
}

impl FromStr for EstimateKind {
    type Err = DzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "df" | "pdf" | "density" => Ok(EstimateKind::Density),
            "cdf" | "cumulative" => Ok(EstimateKind::Cumulative),
            other => Err(DzError::Configuration(format!(
                "unrecognized estimate kind '{}', use 'df' or 'cdf'",
                other
            ))),
        }
    }
}

/// A sample together with its density and cumulative estimates.
#[derive(Debug, Clone)]
pub struct Population {
    sample: Option<Sample>,
    config: DistributionConfig,
    density: EstimateState<DensityMethod>,
    cumulative: EstimateState<CumulativeMethod>,
}

impl Population {
    /// Estimate both distributions of `sample` on one axis resolved from `config`.
    ///
    /// A density the sample cannot support (a zero-error grain under the probability
    /// density plot) is left [`EstimateState::Undefined`] when the cumulative is discrete,
    /// so the cumulative metrics and the K-S test still work.
    pub fn from_sample(sample: Sample, config: &DistributionConfig) -> Result<Self, DzError> {
        let mut pop = Population {
            sample: Some(sample),
            config: config.clone(),
            density: EstimateState::Uncomputed,
            cumulative: EstimateState::Uncomputed,
        };
        match pop.calc_density(config, true) {
            Ok(_) => {}
            Err(DzError::DegenerateSample(reason))
                if config.cumulative == CumulativeMethod::Discrete =>
            {
                log::warn!("density left undefined: {}", reason);
                pop.density = EstimateState::Undefined(reason);
            }
            Err(e) => return Err(e),
        }
        pop.calc_cumulative(config, true)?;
        Ok(pop)
    }

    /// Build a population directly from ages and errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use detrital::prelude::*;
    /// let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 500.0, 1.0));
    /// let pop = Population::from_arrays(vec![100.0, 250.0], vec![10.0, 10.0], &config)?;
    /// let total: f64 = pop.density()?.values().iter().sum();
    /// assert!((total - 1.0).abs() < 1e-9);
    /// # Ok::<(), DzError>(())
    /// ```
    pub fn from_arrays(
        ages: Vec<f64>,
        errors: Vec<f64>,
        config: &DistributionConfig,
    ) -> Result<Self, DzError> {
        Population::from_sample(Sample::new(ages, errors)?, config)
    }

    /// Load ages and errors from a delimited text file, see [`Sample::read_csv`].
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        age_header: &str,
        error_header: &str,
        config: &DistributionConfig,
    ) -> Result<Self, DzError> {
        let sample = Sample::read_csv(path, delimiter, age_header, error_header)?;
        Population::from_sample(sample, config)
    }

    /// Draw `n_grains` ages from the tabulated density `density` over `axis_values`,
    /// assigning each grain an error of `percent_error` times its age.
    pub fn from_density<R: Rng + ?Sized>(
        axis_values: &[f64],
        density: &[f64],
        n_grains: usize,
        percent_error: f64,
        config: &DistributionConfig,
        rng: &mut R,
    ) -> Result<Self, DzError> {
        if axis_values.len() != density.len() {
            return Err(DzError::Configuration(format!(
                "{} axis values but {} density values",
                axis_values.len(),
                density.len()
            )));
        }
        let picker = WeightedIndex::new(density)?;
        let ages: Vec<f64> = (0..n_grains)
            .map(|_| axis_values[picker.sample(rng)])
            .collect();
        let errors = ages.iter().map(|a| (a * percent_error).abs()).collect();
        Population::from_arrays(ages, errors, config)
    }

    /// Blend `parents` by `coefficients`.
    ///
    /// Both the density and the cumulative of the result are the weighted sums of the
    /// parents' estimates, each weight divided by the coefficients' actual sum.  Every
    /// parent must share one axis.  The result carries no grains.
    pub fn from_mixture(parents: &[Population], coefficients: &[f64]) -> Result<Self, DzError> {
        let first = parents.first().ok_or_else(|| {
            DzError::InvalidCoefficients("at least one parent is required".to_string())
        })?;
        let total = validate_coefficients(coefficients, parents.len())?;

        let base_density = first.density()?;
        let base_cumulative = first.cumulative()?;
        base_density
            .axis
            .ensure_matches(&base_cumulative.axis, "parent 0 density vs cumulative")?;

        let mut density = vec![0.0; base_density.values.len()];
        let mut cumulative = vec![0.0; base_cumulative.values.len()];
        for (i, (parent, m)) in parents.iter().zip(coefficients).enumerate() {
            let d = parent.density()?;
            let c = parent.cumulative()?;
            base_density
                .axis
                .ensure_matches(&d.axis, &format!("parent {} density", i))?;
            base_cumulative
                .axis
                .ensure_matches(&c.axis, &format!("parent {} cumulative", i))?;
            let w = m / total;
            density
                .iter_mut()
                .zip(&d.values)
                .for_each(|(acc, v)| *acc += w * v);
            cumulative
                .iter_mut()
                .zip(&c.values)
                .for_each(|(acc, v)| *acc += w * v);
        }

        let mut config = first.config.clone();
        config.axis = base_density.axis.spec();
        Ok(Population {
            sample: None,
            config,
            density: EstimateState::Computed(Estimate {
                axis: base_density.axis.clone(),
                values: density,
                method: base_density.method.clone(),
            }),
            cumulative: EstimateState::Computed(Estimate {
                axis: base_cumulative.axis.clone(),
                values: cumulative,
                method: base_cumulative.method,
            }),
        })
    }

    /// (Re)estimate the density function.  A cached estimate made with the same method
    /// on the same axis is reused unless `force` is set.  Recomputing marks a cumulative
    /// on the old axis as stale, and an integrated cumulative as stale on any axis.
    pub fn calc_density(
        &mut self,
        config: &DistributionConfig,
        force: bool,
    ) -> Result<&DensityEstimate, DzError> {
        let sample = self.grains("density")?;
        let axis = config.axis.resolve(sample)?;
        let cached = match &self.density {
            EstimateState::Computed(e) => !force && e.axis == axis && e.method == config.density,
            _ => false,
        };
        if cached {
            log::debug!("reusing cached density estimate");
        } else {
            log::debug!("estimating density with {:?}", config.density);
            let values = match &config.density {
                DensityMethod::Pdp => pdp(sample, &axis)?,
                DensityMethod::Kde { bandwidth, kernel } => {
                    kde(sample, &axis, *bandwidth, kernel)?
                }
            };
            let integrated = matches!(
                &self.cumulative,
                EstimateState::Computed(e) if e.method == CumulativeMethod::IntegratedDensity
            );
            if integrated {
                self.cumulative.invalidate();
            } else {
                self.cumulative.invalidate_unless_on(&axis);
            }
            self.density = EstimateState::Computed(Estimate {
                axis,
                values,
                method: config.density.clone(),
            });
            self.config.axis = config.axis;
            self.config.density = config.density.clone();
        }
        self.density.get("density")
    }

    /// (Re)estimate the cumulative distribution function.  The integrated method builds
    /// the density first if it is missing or stale; a density on a different axis is an
    /// error rather than being silently replaced.
    pub fn calc_cumulative(
        &mut self,
        config: &DistributionConfig,
        force: bool,
    ) -> Result<&CumulativeEstimate, DzError> {
        let axis = config.axis.resolve(self.grains("cumulative")?)?;
        let cached = match &self.cumulative {
            EstimateState::Computed(e) => {
                !force && e.axis == axis && e.method == config.cumulative
            }
            _ => false,
        };
        if cached {
            log::debug!("reusing cached cumulative estimate");
            return self.cumulative.get("cumulative");
        }

        log::debug!("estimating cumulative with {:?}", config.cumulative);
        let values = match config.cumulative {
            CumulativeMethod::Discrete => discrete_cdf(self.grains("cumulative")?, &axis),
            CumulativeMethod::IntegratedDensity => {
                if !self.density.is_computed() {
                    self.calc_density(config, false)?;
                }
                let density = self.density()?;
                axis.ensure_matches(&density.axis, "integrated cumulative vs existing density")?;
                integrated_cdf(&density.values, axis.dt())
            }
        };
        self.density.invalidate_unless_on(&axis);
        self.cumulative = EstimateState::Computed(Estimate {
            axis,
            values,
            method: config.cumulative,
        });
        self.config.axis = config.axis;
        self.config.cumulative = config.cumulative;
        self.cumulative.get("cumulative")
    }

    /// Current density estimate.
    pub fn density(&self) -> Result<&DensityEstimate, DzError> {
        self.density.get("density")
    }

    /// Current cumulative estimate.
    pub fn cumulative(&self) -> Result<&CumulativeEstimate, DzError> {
        self.cumulative.get("cumulative")
    }

    /// State of the density estimate.
    pub fn density_state(&self) -> &EstimateState<DensityMethod> {
        &self.density
    }

    /// State of the cumulative estimate.
    pub fn cumulative_state(&self) -> &EstimateState<CumulativeMethod> {
        &self.cumulative
    }

    /// The measured grains, `None` for a mixture.
    pub fn sample(&self) -> Option<&Sample> {
        self.sample.as_ref()
    }

    /// Number of grains, zero for a mixture.
    pub fn n_grains(&self) -> usize {
        self.sample.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    /// Configuration of the current estimates.
    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Write one estimate as two delimited columns, `Age` and `Prob` (or `Cum Prob`).
    pub fn export_density<P: AsRef<Path>>(
        &self,
        path: P,
        kind: EstimateKind,
        delimiter: u8,
    ) -> Result<(), DzError> {
        let (header, axis, values) = match kind {
            EstimateKind::Density => {
                let e = self.density()?;
                ("Prob", &e.axis, &e.values)
            }
            EstimateKind::Cumulative => {
                let e = self.cumulative()?;
                ("Cum Prob", &e.axis, &e.values)
            }
        };
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        wtr.write_record(&["Age", header])?;
        for (t, p) in axis.values().iter().zip(values) {
            wtr.write_record(&[t.to_string(), p.to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn grains(&self, what: &str) -> Result<&Sample, DzError> {
        self.sample.as_ref().ok_or_else(|| {
            DzError::DegenerateSample(format!(
                "cannot estimate the {} of a mixture, it has no grains",
                what
            ))
        })
    }
}

/// Check that `coefficients` has one non-negative entry per parent summing to one,
/// returning the actual sum.
pub fn validate_coefficients(coefficients: &[f64], n_parents: usize) -> Result<f64, DzError> {
    if coefficients.len() != n_parents {
        return Err(DzError::InvalidCoefficients(format!(
            "{} coefficients for {} parents",
            coefficients.len(),
            n_parents
        )));
    }
    if let Some(c) = coefficients.iter().find(|c| !c.is_finite() || **c < 0.0) {
        return Err(DzError::InvalidCoefficients(format!(
            "coefficients must be finite and non-negative, got {}",
            c
        )));
    }
    let total: f64 = coefficients.iter().sum();
    if (total - 1.0).abs() > COEFFICIENT_TOLERANCE {
        return Err(DzError::InvalidCoefficients(format!(
            "coefficients sum to {}, not 1",
            total
        )));
    }
    Ok(total)
}

/// Sum of per-grain normal distributions over `axis`, scaled so the Riemann sum is one.
pub fn pdp(sample: &Sample, axis: &Axis) -> Result<Vec<f64>, DzError> {
    if let Some(i) = sample.errors().iter().position(|e| *e <= 0.0) {
        return Err(DzError::DegenerateSample(format!(
            "grain {} has zero error, its probability density is undefined",
            i
        )));
    }
    let mut pdp = vec![0.0; axis.len()];
    for (age, error) in sample.ages().iter().zip(sample.errors()) {
        let var2 = 2.0 * error * error;
        let c = 1.0 / (var2 * std::f64::consts::PI).sqrt();
        for (p, t) in pdp.iter_mut().zip(axis.values()) {
            *p += c * (-(t - age) * (t - age) / var2).exp();
        }
    }
    let area: f64 = pdp.iter().sum::<f64>() * axis.dt();
    if !(area > 0.0) {
        return Err(DzError::DegenerateSample(
            "no probability falls on the axis, widen its bounds".to_string(),
        ));
    }
    Ok(pdp.into_iter().map(|p| p / area).collect())
}

/// Fixed bandwidth kernel density estimate over `axis`, scaled by `1 / (n * bandwidth)`.
pub fn kde(
    sample: &Sample,
    axis: &Axis,
    bandwidth: Option<f64>,
    kernel: &Kernel,
) -> Result<Vec<f64>, DzError> {
    let bandwidth = match bandwidth {
        Some(b) => b,
        None => {
            log::warn!("No bandwidth selected, defaulting to {:.0}", DEFAULT_BANDWIDTH);
            DEFAULT_BANDWIDTH
        }
    };
    if !(bandwidth > 0.0 && bandwidth.is_finite()) {
        return Err(DzError::Configuration(format!(
            "bandwidth must be positive, got {}",
            bandwidth
        )));
    }
    let mut kde = vec![0.0; axis.len()];
    let mut offsets = vec![0.0; axis.len()];
    for age in sample.ages() {
        offsets
            .iter_mut()
            .zip(axis.values())
            .for_each(|(o, t)| *o = (t - age) / bandwidth);
        let weights = kernel.weights(&offsets)?;
        kde.iter_mut().zip(weights).for_each(|(k, w)| *k += w);
    }
    let scale = 1.0 / (sample.len() as f64 * bandwidth);
    Ok(kde.into_iter().map(|k| k * scale).collect())
}

/// Fraction of ages at or below each axis point.
pub fn discrete_cdf(sample: &Sample, axis: &Axis) -> Vec<f64> {
    let mut sorted = sample.ages().to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    axis.values()
        .iter()
        .map(|t| sorted.partition_point(|a| a <= t) as f64 / n)
        .collect()
}

/// Running sum of `density * dt`.
pub fn integrated_cdf(density: &[f64], dt: f64) -> Vec<f64> {
    density
        .iter()
        .scan(0.0, |acc, p| {
            *acc += p * dt;
            Some(*acc)
        })
        .collect()
}

/// Write several populations sharing one density axis as a wide table: an `Age` row of
/// axis values, then one row per population of density values.
pub fn write_density_table<W: Write>(
    writer: W,
    names: &[&str],
    populations: &[Population],
    delimiter: u8,
    age_precision: usize,
    prob_precision: usize,
) -> Result<(), DzError> {
    if names.len() != populations.len() {
        return Err(DzError::Configuration(format!(
            "{} names for {} populations",
            names.len(),
            populations.len()
        )));
    }
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(false)
        .from_writer(writer);
    let mut axis: Option<&Axis> = None;
    for (i, (name, pop)) in names.iter().zip(populations).enumerate() {
        let density = pop.density()?;
        match axis {
            None => {
                axis = Some(&density.axis);
                let mut header = vec!["Age".to_string()];
                header.extend(
                    density
                        .axis
                        .values()
                        .iter()
                        .map(|t| format!("{:.*}", age_precision, t)),
                );
                wtr.write_record(&header)?;
            }
            Some(a) => a.ensure_matches(&density.axis, &format!("population {}", i))?,
        }
        let mut row = vec![name.to_string()];
        row.extend(
            density
                .values
                .iter()
                .map(|p| format!("{:.*}", prob_precision, p)),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}
