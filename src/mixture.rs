//! Exhaustive mixture searches: score every lattice mixture of a set of parent
//! populations against one daughter (or a set of daughters) and rank the results.
use crate::errors::DzError;
use crate::metrics::Objective;
use crate::population::Population;
use crate::utils;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Default spacing of mixing coefficients.
pub const DEFAULT_STEP: f64 = 0.05;
/// Enumerations larger than this log a warning before any work starts.
pub const BLOWUP_THRESHOLD: u128 = 1_000_000;
/// Number of coefficient vectors pulled from the generator per parallel batch.
const CHUNK: usize = 4096;

/// Number of grid intervals for a coefficient spacing of `step`: `1 / step` rounded to
/// the nearest integer, so 0.06 gives 17 intervals of 1/17.
fn resolution_steps(step: f64) -> Result<usize, DzError> {
    if !(step.is_finite() && step > 0.0 && step <= 1.0) {
        return Err(DzError::Configuration(format!(
            "mixing coefficient spacing must be in (0, 1], got {}",
            step
        )));
    }
    let steps = (1.0 / step).round();
    if (steps * step - 1.0).abs() > 1e-9 {
        warn!(
            "spacing {} does not divide 1, using {} instead",
            step,
            1.0 / steps
        );
    }
    Ok(steps as usize)
}

/// Number of mixing coefficient vectors enumerated for `n_parents` parents at spacing
/// `step`: `C(1/step + n_parents - 1, n_parents - 1)`, saturating at `u128::MAX`.
///
/// # Examples
///
/// ```
/// use detrital::mixture::mixture_count;
/// assert_eq!(mixture_count(2, 0.1)?, 11);
/// assert_eq!(mixture_count(3, 0.1)?, 66);
/// # Ok::<(), detrital::errors::DzError>(())
/// ```
pub fn mixture_count(n_parents: usize, step: f64) -> Result<u128, DzError> {
    if n_parents == 0 {
        return Err(DzError::Configuration(
            "a mixture needs at least one parent".to_string(),
        ));
    }
    let steps = resolution_steps(step)? as u128;
    let k = (n_parents - 1) as u128;
    let mut count: u128 = 1;
    for i in 1..=k {
        // C(steps + i, i) = C(steps + i - 1, i - 1) * (steps + i) / i, exact at each step
        count = match count.checked_mul(steps + i) {
            Some(c) => c / i,
            None => return Ok(u128::MAX),
        };
    }
    Ok(count)
}

/// Lazy, restartable enumeration of every mixing coefficient vector on the lattice of
/// the `(n - 1)`-simplex with spacing `1 / steps`.
///
/// Vectors come out in lexicographic order of their leading coefficients, the last
/// coefficient taking up the remainder, so two parents at spacing 0.1 give
/// `[0.0, 1.0], [0.1, 0.9], ..., [1.0, 0.0]`.
#[derive(Debug, Clone)]
pub struct MixingCoefficients {
    counts: Vec<usize>,
    used: usize,
    steps: usize,
    done: bool,
}

impl MixingCoefficients {
    /// Enumerate mixtures of `n_parents` parents at coefficient spacing `step`.
    pub fn new(n_parents: usize, step: f64) -> Result<Self, DzError> {
        if n_parents == 0 {
            return Err(DzError::Configuration(
                "a mixture needs at least one parent".to_string(),
            ));
        }
        let steps = resolution_steps(step)?;
        Ok(MixingCoefficients {
            counts: vec![0; n_parents - 1],
            used: 0,
            steps,
            done: false,
        })
    }

    /// Number of grid intervals between 0 and 1.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn current(&self) -> Vec<f64> {
        let total = self.steps as f64;
        self.counts
            .iter()
            .map(|&c| c as f64 / total)
            .chain(std::iter::once((self.steps - self.used) as f64 / total))
            .collect()
    }

    fn advance(&mut self) {
        if self.counts.is_empty() {
            self.done = true;
            return;
        }
        if self.used < self.steps {
            if let Some(last) = self.counts.last_mut() {
                *last += 1;
                self.used += 1;
            }
            return;
        }
        // budget exhausted: zero the rightmost nonzero count and carry left
        match self.counts.iter().rposition(|&c| c > 0) {
            Some(i) if i > 0 => {
                self.used -= self.counts[i] - 1;
                self.counts[i] = 0;
                self.counts[i - 1] += 1;
            }
            _ => self.done = true,
        }
    }
}

impl Iterator for MixingCoefficients {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.done {
            return None;
        }
        let out = self.current();
        self.advance();
        Some(out)
    }
}

/// Which end of the ranking holds the best fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixtureOrder {
    /// Ascending: small objective values are good fits (e.g. Dmax).
    Normal,
    /// Descending: large objective values are good fits (e.g. likeness).
    Reverse,
}

impl Default for MixtureOrder {
    fn default() -> Self {
        MixtureOrder::Normal
    }
}

impl FromStr for MixtureOrder {
    type Err = DzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(MixtureOrder::Normal),
            "reverse" => Ok(MixtureOrder::Reverse),
            other => Err(DzError::Configuration(format!(
                "unrecognized mixture order '{}', use 'normal' or 'reverse'",
                other
            ))),
        }
    }
}

/// Progress of a [`MixtureModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixtureStage {
    /// Parent and daughter axes agree; nothing scored yet.
    AxesValidated,
    /// Every coefficient vector carries an objective value, in enumeration order.
    Scored,
    /// Results are ranked, index 0 holding the best fit.
    Sorted,
}

/// One scored mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureFit {
    /// Weight of each parent.
    pub coefficients: Vec<f64>,
    /// Objective value of the daughter against the mixture.
    pub value: f64,
}

/// Objective value statistics across all mixtures sharing one parent's coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientSummary {
    /// Coefficient of the chosen parent.
    pub coefficient: f64,
    /// Mean objective value.
    pub mean: f64,
    /// Smallest objective value.
    pub min: f64,
    /// Largest objective value.
    pub max: f64,
}

fn rank(a: f64, b: f64, order: MixtureOrder) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match order {
            MixtureOrder::Normal => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            MixtureOrder::Reverse => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        },
    }
}

fn default_names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect()
}

fn checked_names(names: &[&str], n: usize, prefix: &str, what: &str) -> Vec<String> {
    if names.len() < n {
        warn!(
            "{} names given for {} {}, proceeding with integer names",
            names.len(),
            n,
            what
        );
        default_names(prefix, n)
    } else {
        names.iter().take(n).map(|s| s.to_string()).collect()
    }
}

fn is_cancelled(flag: Option<&AtomicBool>) -> bool {
    flag.map_or(false, |f| f.load(std::sync::atomic::Ordering::Relaxed))
}

/// Scores every lattice mixture of `parents` against one daughter population.
///
/// # Examples
///
/// ```
/// use detrital::prelude::*;
/// let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 1.0));
/// let young = Population::from_arrays(vec![200.0, 220.0, 240.0], vec![10.0; 3], &config)?;
/// let old = Population::from_arrays(vec![1800.0, 1850.0], vec![30.0; 2], &config)?;
/// let daughter = Population::from_mixture(&[young.clone(), old.clone()], &[0.3, 0.7])?;
/// let parents = vec![young, old];
///
/// let mut model = MixtureModel::new(&daughter, &parents, &Metric::Dmax)?.step(0.1);
/// model.simulate()?;
/// assert_eq!(model.fits().len(), 11);
/// let best = model.best()?;
/// assert!((best.coefficients[0] - 0.3).abs() < 1e-9);
/// # Ok::<(), DzError>(())
/// ```
pub struct MixtureModel<'a> {
    daughter: &'a Population,
    parents: &'a [Population],
    objective: &'a dyn Objective,
    step: f64,
    order: MixtureOrder,
    parent_names: Vec<String>,
    daughter_name: String,
    cancel: Option<Arc<AtomicBool>>,
    fits: Vec<MixtureFit>,
    stage: MixtureStage,
}

impl<'a> MixtureModel<'a> {
    /// Check that every parent's density and cumulative axes match the daughter's.
    /// Any mismatch aborts before anything is enumerated.
    pub fn new(
        daughter: &'a Population,
        parents: &'a [Population],
        objective: &'a dyn Objective,
    ) -> Result<Self, DzError> {
        if parents.is_empty() {
            return Err(DzError::Configuration(
                "a mixture model needs at least one parent".to_string(),
            ));
        }
        let density_axis = daughter.density()?.axis();
        let cumulative_axis = daughter.cumulative()?.axis();
        for (i, parent) in parents.iter().enumerate() {
            density_axis.ensure_matches(
                parent.density()?.axis(),
                &format!("daughter vs parent {} density", i),
            )?;
            cumulative_axis.ensure_matches(
                parent.cumulative()?.axis(),
                &format!("daughter vs parent {} cumulative", i),
            )?;
        }
        Ok(MixtureModel {
            daughter,
            parents,
            objective,
            step: DEFAULT_STEP,
            order: MixtureOrder::default(),
            parent_names: default_names("P", parents.len()),
            daughter_name: "Observed daughter".to_string(),
            cancel: None,
            fits: Vec::new(),
            stage: MixtureStage::AxesValidated,
        })
    }

    /// Spacing between mixing coefficients.
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Ranking direction used by [`simulate`](Self::simulate).
    pub fn order(mut self, order: MixtureOrder) -> Self {
        self.order = order;
        self
    }

    /// Parent names used in exports.  Fewer names than parents falls back to `P0, P1, ...`.
    pub fn parent_names(mut self, names: &[&str]) -> Self {
        self.parent_names = checked_names(names, self.parents.len(), "P", "parents");
        self
    }

    /// Name of the daughter.
    pub fn daughter_name(mut self, name: &str) -> Self {
        self.daughter_name = name.to_string();
        self
    }

    /// Flag checked before scoring each mixture; raising it aborts the run.
    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Enumerate and score every mixture, keeping enumeration order.
    pub fn score(&mut self) -> Result<&[MixtureFit], DzError> {
        let n = self.parents.len();
        let total = mixture_count(n, self.step)?;
        if total > BLOWUP_THRESHOLD {
            warn!(
                "{} parents at spacing {} enumerate {} mixtures, expect a long run",
                n, self.step, total
            );
        }
        info!(
            "scoring {} mixtures of {} parents against {} with {}",
            total,
            n,
            self.daughter_name,
            self.objective.name()
        );

        let daughter = self.daughter;
        let parents = self.parents;
        let objective = self.objective;
        let cancel = self.cancel.as_deref();
        let mut coefficients = MixingCoefficients::new(n, self.step)?;
        let mut fits = Vec::new();
        loop {
            let batch: Vec<Vec<f64>> = coefficients.by_ref().take(CHUNK).collect();
            if batch.is_empty() {
                break;
            }
            let scored = batch
                .into_par_iter()
                .map(|c| -> Result<MixtureFit, DzError> {
                    if is_cancelled(cancel) {
                        return Err(DzError::Cancelled);
                    }
                    let value = objective.compare_mixture(daughter, parents, &c)?;
                    Ok(MixtureFit {
                        coefficients: c,
                        value,
                    })
                })
                .collect::<Result<Vec<MixtureFit>, DzError>>()?;
            fits.extend(scored);
        }
        self.fits = fits;
        self.stage = MixtureStage::Scored;
        Ok(&self.fits)
    }

    /// Score every mixture, then rank with the configured order.
    pub fn simulate(&mut self) -> Result<&[MixtureFit], DzError> {
        self.score()?;
        self.sort_mixtures(self.order)?;
        info!(
            "best fit for {}: {:?} ({})",
            self.daughter_name, self.fits[0].coefficients, self.fits[0].value
        );
        Ok(&self.fits)
    }

    /// Rank the scored mixtures.  The sort is stable and NaN values go last.
    pub fn sort_mixtures(&mut self, order: MixtureOrder) -> Result<(), DzError> {
        if self.stage == MixtureStage::AxesValidated {
            return Err(DzError::Configuration(
                "mixtures must be scored before they are sorted".to_string(),
            ));
        }
        self.fits.sort_by(|a, b| rank(a.value, b.value, order));
        self.order = order;
        self.stage = MixtureStage::Sorted;
        Ok(())
    }

    /// Current stage.
    pub fn stage(&self) -> MixtureStage {
        self.stage
    }

    /// Scored mixtures, ranked once sorted.
    pub fn fits(&self) -> &[MixtureFit] {
        &self.fits
    }

    /// Ranking direction.
    pub fn mixture_order(&self) -> MixtureOrder {
        self.order
    }

    /// Coefficient spacing.
    pub fn spacing(&self) -> f64 {
        self.step
    }

    /// Parent names.
    pub fn names(&self) -> &[String] {
        &self.parent_names
    }

    /// Daughter name.
    pub fn name(&self) -> &str {
        &self.daughter_name
    }

    /// The daughter population.
    pub fn daughter(&self) -> &Population {
        self.daughter
    }

    fn ranked(&self) -> Result<&[MixtureFit], DzError> {
        if self.stage != MixtureStage::Sorted {
            return Err(DzError::Configuration(
                "mixtures must be sorted first".to_string(),
            ));
        }
        Ok(&self.fits)
    }

    /// The best-fitting mixture.
    pub fn best(&self) -> Result<&MixtureFit, DzError> {
        self.ranked()?
            .first()
            .ok_or_else(|| DzError::Configuration("no mixtures were scored".to_string()))
    }

    /// Rebuild the mixed population of the `rank`-th best mixture (0 is the best).
    pub fn mixed_population(&self, rank: usize) -> Result<Population, DzError> {
        let fits = self.ranked()?;
        let fit = fits.get(rank).ok_or_else(|| {
            DzError::Configuration(format!(
                "rank {} out of range for {} mixtures",
                rank,
                fits.len()
            ))
        })?;
        Population::from_mixture(self.parents, &fit.coefficients)
    }

    /// Objective value against the first coefficient of a two-parent model, ordered by
    /// the coefficient.
    pub fn binary_profile(&self) -> Result<Vec<(f64, f64)>, DzError> {
        if self.parents.len() != 2 {
            return Err(DzError::Configuration(format!(
                "a binary profile needs exactly two parents, found {}",
                self.parents.len()
            )));
        }
        let mut profile: Vec<(f64, f64)> = self
            .fits
            .iter()
            .map(|f| (f.coefficients[0], f.value))
            .collect();
        profile.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(profile)
    }

    /// Mean, minimum and maximum objective value over all mixtures sharing each distinct
    /// coefficient of `parent`.
    pub fn coefficient_profile(&self, parent: usize) -> Result<Vec<CoefficientSummary>, DzError> {
        if parent >= self.parents.len() {
            return Err(DzError::Configuration(format!(
                "parent {} out of range for {} parents",
                parent,
                self.parents.len()
            )));
        }
        let mut pairs: Vec<(f64, f64)> = self
            .fits
            .iter()
            .map(|f| (f.coefficients[parent], f.value))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut profile = Vec::new();
        let mut start = 0;
        while start < pairs.len() {
            let coefficient = pairs[start].0;
            let end = start + pairs[start..].partition_point(|p| p.0 == coefficient);
            let values: Vec<f64> = pairs[start..end].iter().map(|p| p.1).collect();
            profile.push(CoefficientSummary {
                coefficient,
                mean: utils::mean(&values),
                min: values.iter().cloned().fold(f64::INFINITY, f64::min),
                max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            });
            start = end;
        }
        Ok(profile)
    }

    /// Write every scored mixture as csv: one column per parent (3 decimals) and the
    /// objective value.  Refuses to overwrite an existing file.
    pub fn export_results<P: AsRef<Path>>(&self, path: P) -> Result<(), DzError> {
        let path = path.as_ref();
        utils::ensure_new_file(path)?;
        let mut wtr = csv::Writer::from_path(path)?;
        let mut header = self.parent_names.clone();
        header.push("mixtureFunctionValue".to_string());
        wtr.write_record(&header)?;
        for fit in &self.fits {
            let mut row: Vec<String> = fit
                .coefficients
                .iter()
                .map(|c| format!("{:.3}", c))
                .collect();
            row.push(fit.value.to_string());
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// One best-fit row read back from a summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Daughter name.
    pub name: String,
    /// Number of grains in the daughter.
    pub n: usize,
    /// Best-fit coefficients, one per parent.
    pub coefficients: Vec<f64>,
    /// Best objective value.
    pub value: f64,
}

/// Contents of a mixture summary file.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureSummary {
    /// Coefficient spacing.
    pub step: f64,
    /// Objective function name.
    pub objective: String,
    /// Parent names and grain counts.
    pub parents: Vec<(String, usize)>,
    /// Best fit per daughter.
    pub daughters: Vec<SummaryRow>,
}

/// One [`MixtureModel`] per daughter against a shared set of parents.
pub struct MixtureModelSet<'a> {
    parents: &'a [Population],
    objective: &'a dyn Objective,
    parent_names: Vec<String>,
    daughter_names: Vec<String>,
    models: Vec<MixtureModel<'a>>,
}

impl<'a> MixtureModelSet<'a> {
    /// Validate the axes of every daughter against every parent.
    pub fn new(
        daughters: &'a [Population],
        parents: &'a [Population],
        objective: &'a dyn Objective,
    ) -> Result<Self, DzError> {
        let daughter_names = default_names("D", daughters.len());
        let models = daughters
            .iter()
            .zip(&daughter_names)
            .map(|(d, name)| {
                Ok::<_, DzError>(MixtureModel::new(d, parents, objective)?.daughter_name(name))
            })
            .collect::<Result<Vec<_>, DzError>>()?;
        Ok(MixtureModelSet {
            parents,
            objective,
            parent_names: default_names("P", parents.len()),
            daughter_names,
            models,
        })
    }

    /// Coefficient spacing for every daughter.
    pub fn step(mut self, step: f64) -> Self {
        self.models = self.models.into_iter().map(|m| m.step(step)).collect();
        self
    }

    /// Ranking direction for every daughter.
    pub fn order(mut self, order: MixtureOrder) -> Self {
        self.models = self.models.into_iter().map(|m| m.order(order)).collect();
        self
    }

    /// Parent names.  Fewer names than parents falls back to `P0, P1, ...`.
    pub fn parent_names(mut self, names: &[&str]) -> Self {
        self.parent_names = checked_names(names, self.parents.len(), "P", "parents");
        let names: Vec<&str> = self.parent_names.iter().map(|s| s.as_str()).collect();
        self.models = self
            .models
            .into_iter()
            .map(|m| m.parent_names(&names))
            .collect();
        self
    }

    /// Daughter names.  Fewer names than daughters falls back to `D0, D1, ...`.
    pub fn daughter_names(mut self, names: &[&str]) -> Self {
        self.daughter_names = checked_names(names, self.models.len(), "D", "daughters");
        self.models = self
            .models
            .into_iter()
            .zip(&self.daughter_names)
            .map(|(m, name)| m.daughter_name(name))
            .collect();
        self
    }

    /// Cancellation flag shared by every daughter's run.
    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.models = self
            .models
            .into_iter()
            .map(|m| m.cancel(flag.clone()))
            .collect();
        self
    }

    /// Score and rank the mixtures of every daughter.
    pub fn simulate(&mut self) -> Result<(), DzError> {
        info!(
            "mixture set: {} daughters, {} parents",
            self.models.len(),
            self.parents.len()
        );
        for model in &mut self.models {
            model.simulate()?;
        }
        Ok(())
    }

    /// Re-rank every daughter.
    pub fn sort_mixtures(&mut self, order: MixtureOrder) -> Result<(), DzError> {
        for model in &mut self.models {
            model.sort_mixtures(order)?;
        }
        Ok(())
    }

    /// Models in daughter order.
    pub fn models(&self) -> &[MixtureModel<'a>] {
        &self.models
    }

    /// Look up a daughter's model by name.
    pub fn model(&self, name: &str) -> Result<&MixtureModel<'a>, DzError> {
        self.models.iter().find(|m| m.name() == name).ok_or_else(|| {
            DzError::Configuration(format!(
                "no daughter named '{}', available names are: {}",
                name,
                self.daughter_names.join(", ")
            ))
        })
    }

    /// Best-fit coefficient vector of each daughter.
    pub fn trends(&self) -> Result<Vec<Vec<f64>>, DzError> {
        self.models
            .iter()
            .map(|m| Ok::<_, DzError>(m.best()?.coefficients.clone()))
            .collect()
    }

    /// Write the ranked summary: parameters, a parent block and one best-fit row per daughter.
    pub fn write_summary<W: Write>(&self, writer: &mut W, delimiter: &str) -> Result<(), DzError> {
        let d = delimiter;
        let step = self.models.first().map_or(DEFAULT_STEP, |m| m.spacing());
        writeln!(writer, "Mixture coefficient spacing:{}{:.3} ", d, step)?;
        writeln!(writer, "Objective function name:{}{}", d, self.objective.mixture_name())?;
        writeln!(writer, "Parent name{}N", d)?;
        for (name, parent) in self.parent_names.iter().zip(self.parents) {
            writeln!(writer, "{}{}{}", name, d, parent.n_grains())?;
        }
        writeln!(
            writer,
            "Daughter name{}N{}{}{}Mix. fun value ",
            d,
            d,
            self.parent_names.join(d),
            d
        )?;
        for model in &self.models {
            let best = model.best()?;
            let coefficients: Vec<String> = best
                .coefficients
                .iter()
                .map(|c| format!("{:.3}", c))
                .collect();
            writeln!(
                writer,
                "{}{}{}{}{}{}{}",
                model.name(),
                d,
                model.daughter().n_grains(),
                d,
                coefficients.join(d),
                d,
                utils::format_sci(best.value, 3)
            )?;
        }
        Ok(())
    }

    /// Write the summary to a new file at `path`.
    pub fn export_summary<P: AsRef<Path>>(&self, path: P, delimiter: &str) -> Result<(), DzError> {
        let path = path.as_ref();
        utils::ensure_new_file(path)?;
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write_summary(&mut file, delimiter)?;
        file.flush()?;
        Ok(())
    }
}

fn summary_error(msg: &str) -> DzError {
    DzError::Configuration(format!("malformed mixture summary: {}", msg))
}

fn parse_field<T: FromStr>(field: Option<&str>, what: &str) -> Result<T, DzError> {
    field
        .map(str::trim)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| summary_error(&format!("could not read {}", what)))
}

/// Read a summary written by [`MixtureModelSet::write_summary`].
pub fn parse_summary(text: &str, delimiter: &str) -> Result<MixtureSummary, DzError> {
    if delimiter.is_empty() {
        return Err(DzError::Configuration("empty delimiter".to_string()));
    }
    let mut lines = text.lines();
    let mut header = |what: &str| {
        lines
            .next()
            .map(|l| l.split(delimiter).map(str::trim).collect::<Vec<_>>())
            .ok_or_else(|| summary_error(&format!("missing {}", what)))
    };
    let spacing = header("coefficient spacing")?;
    let step: f64 = parse_field(spacing.get(1).cloned(), "coefficient spacing")?;
    let objective = header("objective name")?
        .get(1)
        .map(|s| s.to_string())
        .ok_or_else(|| summary_error("missing objective name"))?;
    header("parent header")?;

    let mut parents: Vec<(String, usize)> = Vec::new();
    let mut n_parents = None;
    for line in lines.by_ref() {
        let fields: Vec<&str> = line.split(delimiter).collect();
        if fields[0].trim() == "Daughter name" {
            n_parents = Some(fields.len().saturating_sub(3));
            break;
        }
        parents.push((
            fields[0].to_string(),
            parse_field(fields.get(1).cloned(), "parent grain count")?,
        ));
    }
    let n_parents = n_parents.ok_or_else(|| summary_error("missing daughter header"))?;

    let mut daughters = Vec::new();
    for line in lines.filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(delimiter).collect();
        if fields.len() != n_parents + 3 {
            return Err(summary_error(&format!(
                "expected {} fields, found {}",
                n_parents + 3,
                fields.len()
            )));
        }
        let coefficients = fields[2..2 + n_parents]
            .iter()
            .map(|f| parse_field(Some(*f), "coefficient"))
            .collect::<Result<Vec<f64>, DzError>>()?;
        daughters.push(SummaryRow {
            name: fields[0].to_string(),
            n: parse_field(Some(fields[1]), "daughter grain count")?,
            coefficients,
            value: parse_field(fields.last().cloned(), "objective value")?,
        });
    }
    Ok(MixtureSummary {
        step,
        objective,
        parents,
        daughters,
    })
}
