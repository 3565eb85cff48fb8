//! Discretized age axes shared by density and cumulative estimates.
use crate::errors::DzError;
use crate::population::Sample;
use serde::{Deserialize, Serialize};

/// Requested bounds and spacing of an age axis.  Any field left as `None` is derived
/// from the sample the axis is resolved against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct AxisSpec {
    /// Lower bound of the axis (included).
    pub t_min: Option<f64>,
    /// Upper bound of the axis (excluded).
    pub t_max: Option<f64>,
    /// Spacing between axis points.
    pub dt: Option<f64>,
}

impl AxisSpec {
    /// Create a spec with every field derived from the sample.
    pub fn new() -> Self {
        AxisSpec::default()
    }

    /// Create a fully explicit spec.
    ///
    /// # Examples
    ///
    /// ```
    /// use detrital::prelude::*;
    /// let spec = AxisSpec::fixed(0.0, 4500.0, 1.0);
    /// assert!(spec.is_fixed());
    /// ```
    pub fn fixed(t_min: f64, t_max: f64, dt: f64) -> Self {
        AxisSpec {
            t_min: Some(t_min),
            t_max: Some(t_max),
            dt: Some(dt),
        }
    }

    /// Set the lower bound.
    pub fn t_min(mut self, t_min: f64) -> Self {
        self.t_min = Some(t_min);
        self
    }

    /// Set the upper bound.
    pub fn t_max(mut self, t_max: f64) -> Self {
        self.t_max = Some(t_max);
        self
    }

    /// Set the spacing.
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }

    /// True when no field depends on the sample.
    pub fn is_fixed(&self) -> bool {
        self.t_min.is_some() && self.t_max.is_some() && self.dt.is_some()
    }

    /// Resolve the spec against `sample`.  Missing bounds become the youngest age minus
    /// three times its own error and the oldest age plus three times its own error; a
    /// missing spacing divides the range into 1000 steps.
    pub fn resolve(&self, sample: &Sample) -> Result<Axis, DzError> {
        let t_min = match self.t_min {
            Some(t) => t,
            None => {
                let i = sample.argmin();
                sample.ages()[i] - 3.0 * sample.errors()[i]
            }
        };
        let t_max = match self.t_max {
            Some(t) => t,
            None => {
                let i = sample.argmax();
                sample.ages()[i] + 3.0 * sample.errors()[i]
            }
        };
        let dt = self.dt.unwrap_or((t_max - t_min) / 1000.0);
        log::debug!("resolved axis [{}, {}) step {}", t_min, t_max, dt);
        Axis::new(t_min, t_max, dt)
    }
}

/// A uniformly spaced, increasing axis over the half-open range `[t_min, t_max)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    t_min: f64,
    t_max: f64,
    dt: f64,
    values: Vec<f64>,
}

impl Axis {
    /// Materialize `ceil((t_max - t_min) / dt)` points `t_min + i * dt`.
    ///
    /// # Examples
    ///
    /// ```
    /// use detrital::prelude::*;
    /// let axis = Axis::new(0.0, 10.0, 2.5)?;
    /// assert_eq!(axis.values(), &[0.0, 2.5, 5.0, 7.5]);
    /// # Ok::<(), DzError>(())
    /// ```
    pub fn new(t_min: f64, t_max: f64, dt: f64) -> Result<Self, DzError> {
        if !(t_min.is_finite() && t_max.is_finite() && dt.is_finite()) {
            return Err(DzError::Configuration(format!(
                "axis bounds must be finite, got [{}, {}) step {}",
                t_min, t_max, dt
            )));
        }
        if dt <= 0.0 {
            return Err(DzError::Configuration(format!(
                "axis spacing must be positive, got {}",
                dt
            )));
        }
        if t_max <= t_min {
            return Err(DzError::Configuration(format!(
                "axis upper bound {} must exceed lower bound {}",
                t_max, t_min
            )));
        }
        // snap spans within rounding noise of a whole number of steps
        let span = (t_max - t_min) / dt;
        let n = if (span - span.round()).abs() < 1e-9 * span.max(1.0) {
            span.round()
        } else {
            span.ceil()
        } as usize;
        let values = (0..n).map(|i| t_min + i as f64 * dt).collect();
        Ok(Axis {
            t_min,
            t_max,
            dt,
            values,
        })
    }

    /// Lower bound.
    pub fn t_min(&self) -> f64 {
        self.t_min
    }

    /// Upper bound.
    pub fn t_max(&self) -> f64 {
        self.t_max
    }

    /// Spacing.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Axis points.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of axis points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the axis has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The spec that reproduces this axis exactly.
    pub fn spec(&self) -> AxisSpec {
        AxisSpec::fixed(self.t_min, self.t_max, self.dt)
    }

    /// Pointwise comparison against `other`, naming `what` in the error.
    pub fn ensure_matches(&self, other: &Axis, what: &str) -> Result<(), DzError> {
        if self.values != other.values {
            return Err(DzError::AxisMismatch(format!(
                "{}: [{}, {}) step {} ({} points) vs [{}, {}) step {} ({} points)",
                what,
                self.t_min,
                self.t_max,
                self.dt,
                self.len(),
                other.t_min,
                other.t_max,
                other.dt,
                other.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_points() {
        let axis = Axis::new(0.0, 4500.0, 1.0).unwrap();
        assert_eq!(axis.len(), 4500);
        assert_eq!(axis.values()[0], 0.0);
        assert_eq!(axis.values()[4499], 4499.0);
    }

    #[test]
    fn rejects_bad_spacing() {
        assert!(matches!(
            Axis::new(0.0, 1.0, 0.0),
            Err(DzError::Configuration(_))
        ));
        assert!(matches!(
            Axis::new(1.0, 1.0, 0.1),
            Err(DzError::Configuration(_))
        ));
        assert!(matches!(
            Axis::new(0.0, f64::NAN, 0.1),
            Err(DzError::Configuration(_))
        ));
    }

    #[test]
    fn derived_bounds_use_extreme_grains() {
        let sample = Sample::new(vec![100.0, 50.0, 300.0], vec![5.0, 2.0, 10.0]).unwrap();
        let axis = AxisSpec::new().resolve(&sample).unwrap();
        assert_eq!(axis.t_min(), 44.0);
        assert_eq!(axis.t_max(), 330.0);
        assert!((axis.dt() - 0.286).abs() < 1e-12);
        assert_eq!(axis.len(), 1000);
    }

    #[test]
    fn partial_spec_keeps_given_fields() {
        let sample = Sample::new(vec![100.0, 200.0], vec![1.0, 1.0]).unwrap();
        let axis = AxisSpec::new().t_min(0.0).dt(1.0).resolve(&sample).unwrap();
        assert_eq!(axis.t_min(), 0.0);
        assert_eq!(axis.t_max(), 203.0);
        assert_eq!(axis.len(), 203);
    }

    #[test]
    fn mismatch_is_reported() {
        let a = Axis::new(0.0, 10.0, 1.0).unwrap();
        let b = Axis::new(0.0, 10.0, 0.5).unwrap();
        assert!(a.ensure_matches(&a.clone(), "self").is_ok());
        assert!(matches!(
            a.ensure_matches(&b, "test"),
            Err(DzError::AxisMismatch(_))
        ));
    }
}
