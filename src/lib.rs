/*!
* # Detrital - Comparing and unmixing detrital geochronology age distributions.
* A detrital sample is a set of grain ages, each with a 1-sigma measurement error, collected from sediment that may
* have been shed by several source areas.  This crate turns samples into density and cumulative age distributions on a
* shared, uniformly spaced age axis, compares distributions with a family of objective functions (Dmax, Vmax, r^2,
* similarity, likeness and the Kolmogorov-Smirnov test), and answers two questions about them:
*
*  - Which mixture of parent populations best explains a daughter population?  [MixtureModel](mixture/struct.MixtureModel.html)
*    scores every mixing coefficient vector on a regular lattice and ranks the results.
*  - Are two samples different?  [PermutationTest](permutation/struct.PermutationTest.html) compares the observed objective
*    value against a null distribution built by randomly relabeling the pooled grains.
*
* Every comparison requires both distributions to sit on an identical axis.  Comparing or mixing across different axes
* is an error, never a silent realignment.
*
*  ## Quick Start
*
* To use detrital, add it to your `Cargo.toml`
* ```toml
* [dependencies]
* detrital = "^0.1.0"
* ```
*
*  - Load the crate prelude in the preamble of your `main.rs`.
*  - Build populations on a common axis, then fit a mixture:
* ```rust
* use detrital::prelude::*;
*
* fn main() -> Result<(), DzError> {
*     let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 1.0));
*     let young = Population::from_arrays(vec![210.0, 230.0, 250.0], vec![8.0; 3], &config)?;
*     let old = Population::from_arrays(vec![1650.0, 1700.0, 1790.0], vec![25.0; 3], &config)?;
*
*     // a daughter that is a quarter young, three quarters old
*     let daughter = Population::from_mixture(&[young.clone(), old.clone()], &[0.25, 0.75])?;
*     let parents = vec![young, old];
*
*     let mut model = MixtureModel::new(&daughter, &parents, &Metric::Dmax)?
*         .step(0.05)
*         .order(MixtureOrder::Normal);
*     model.simulate()?;
*     let best = model.best()?;
*     assert!((best.coefficients[0] - 0.25).abs() < 1e-9);
*     Ok(())
* }
* ```
*
* Configuration is one explicit value.  Axis bounds left unset are derived from the sample (youngest age minus three
* times its error, oldest age plus three times its error, 1000 steps between); here every field is given:
*
* ```rust
* use detrital::prelude::*;
*
* let config = DistributionConfig::new()
*     .axis(AxisSpec::new().t_min(0.0).t_max(1500.0).dt(1.0))
*     .density(DensityMethod::kde(20.0))
*     .cumulative(CumulativeMethod::IntegratedDensity);
* let pop = Population::from_arrays(vec![500.0, 510.0, 900.0], vec![10.0, 10.0, 15.0], &config)?;
* let cdf = pop.cumulative()?.values();
* assert!((cdf[cdf.len() - 1] - 1.0).abs() < 1e-3);
* # Ok::<(), DzError>(())
* ```
*/

#![warn(missing_docs)]
pub mod axis;
pub mod errors;
pub mod metrics;
pub mod mixture;
pub mod permutation;
pub mod population;
pub mod utils;

/// Common imports.
pub mod prelude {
    pub use crate::axis::{Axis, AxisSpec};
    pub use crate::errors::DzError;
    pub use crate::metrics::{self, Metric, Objective, ObjectiveFn};
    pub use crate::mixture::{MixingCoefficients, MixtureModel, MixtureModelSet, MixtureOrder};
    pub use crate::permutation::{PermutationResult, PermutationTest};
    pub use crate::population::{
        CumulativeMethod, DensityMethod, DistributionConfig, EstimateKind, Kernel, Population,
        Sample,
    };
}
