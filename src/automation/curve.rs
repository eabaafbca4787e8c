//! Breakpoint curves and segment interpolation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::CurveError;

use super::timeline::MAX_TIMELINE_EVENTS;

/*
Breakpoint Curves
=================

A curve is an ordered list of breakpoints. Each breakpoint says "be at this
value, this many seconds after the trigger", plus how to get there from the
breakpoint before it.

Vocabulary
----------

  breakpoint  (value, offset, ramp). The offset is relative to the trigger
              instant; the scheduler adds the trigger time when it installs
              the curve on a parameter's timeline.

  ramp        The shape of the segment that ENDS at this breakpoint.

  segment     The stretch between two consecutive breakpoints.


The Three Ramps
---------------

  Hold          v0 until t1, then step to v1.

                  v1 ┤        ┌────
                  v0 ┤────────┘
                     t0       t1

  Linear        v(t) = v0 + (v1 - v0) · (t - t0) / (t1 - t0)

  Exponential   v(t) = v0 · (v1 / v0) ^ ((t - t0) / (t1 - t0))

Exponential ramps only make sense between two positive values. A ramp from
1.0 to 0.001 over one second sits at sqrt(1.0 × 0.001) ≈ 0.0316 halfway
through, not at 0.5. That is what makes exponential decays sound natural:
equal time steps give equal ratios, and the ear hears ratios.

To ramp "to zero" exponentially, ramp to MIN_EXPONENTIAL_VALUE and then hold
at zero at the same instant.

If an exponential segment starts from a non-positive value at run time (for
example it follows a held zero), the segment degrades to a hold and steps at
its end.
*/

/// Smallest value an exponential ramp may target.
pub const MIN_EXPONENTIAL_VALUE: f32 = 1e-5;

/// Interpolation of the segment that ends at a breakpoint.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Hold,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub value: f32,
    /// Seconds after the trigger instant.
    pub offset: f64,
    pub ramp: Ramp,
}

impl Breakpoint {
    pub fn hold(value: f32, offset: f64) -> Self {
        Self {
            value,
            offset,
            ramp: Ramp::Hold,
        }
    }

    pub fn linear(value: f32, offset: f64) -> Self {
        Self {
            value,
            offset,
            ramp: Ramp::Linear,
        }
    }

    pub fn exponential(value: f32, offset: f64) -> Self {
        Self {
            value,
            offset,
            ramp: Ramp::Exponential,
        }
    }
}

/// A validated, time-ordered list of breakpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    points: Vec<Breakpoint>,
}

impl Curve {
    /// Validate and wrap a breakpoint list.
    ///
    /// Out-of-order offsets are rejected rather than sorted; equal offsets
    /// are allowed and produce an instantaneous step.
    pub fn new(points: Vec<Breakpoint>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        if points.len() > MAX_TIMELINE_EVENTS {
            return Err(CurveError::TooLong {
                len: points.len(),
                max: MAX_TIMELINE_EVENTS,
            });
        }

        let mut previous: Option<&Breakpoint> = None;
        for (index, point) in points.iter().enumerate() {
            if !point.value.is_finite() || !point.offset.is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if point.offset < 0.0 {
                return Err(CurveError::NegativeOffset { index });
            }
            if point.ramp == Ramp::Exponential {
                if point.value <= 0.0 {
                    return Err(CurveError::NonPositiveExponential {
                        index,
                        value: point.value,
                    });
                }
                if let Some(prev) = previous.filter(|prev| prev.value <= 0.0) {
                    return Err(CurveError::NonPositiveExponential {
                        index: index - 1,
                        value: prev.value,
                    });
                }
            }
            if let Some(prev) = previous {
                if point.offset < prev.offset {
                    return Err(CurveError::OutOfOrder { index });
                }
            }
            previous = Some(point);
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[Breakpoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Offset of the last breakpoint.
    pub fn span(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.offset)
    }

    /// Copy with every offset multiplied by `time_scale` and every value by
    /// `value_scale`. Used to fit a curve into a note duration and to apply
    /// velocity.
    pub fn scaled(&self, time_scale: f64, value_scale: f32) -> Result<Self, CurveError> {
        Self::new(
            self.points
                .iter()
                .map(|p| Breakpoint {
                    value: p.value * value_scale,
                    offset: p.offset * time_scale,
                    ramp: p.ramp,
                })
                .collect(),
        )
    }
}

/// Clamp a value into the range an exponential ramp can reach.
#[inline]
pub fn clamp_positive(value: f32) -> f32 {
    value.max(MIN_EXPONENTIAL_VALUE)
}

/// Value at `t` of the segment from `(t0, v0)` to `(t1, v1)`.
#[inline]
pub fn interpolate(ramp: Ramp, v0: f32, v1: f32, t0: f64, t1: f64, t: f64) -> f32 {
    if t >= t1 {
        return v1;
    }
    if t <= t0 {
        return v0;
    }

    let progress = (t - t0) / (t1 - t0);
    match ramp {
        Ramp::Hold => v0,
        Ramp::Linear => (v0 as f64 + (v1 as f64 - v0 as f64) * progress) as f32,
        Ramp::Exponential => {
            if v0 <= 0.0 || v1 <= 0.0 {
                return v0;
            }
            (v0 as f64 * (v1 as f64 / v0 as f64).powf(progress)) as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_empty_curve() {
        assert_eq!(Curve::new(vec![]), Err(CurveError::Empty));
    }

    #[test]
    fn rejects_non_positive_exponential_target() {
        let err = Curve::new(vec![
            Breakpoint::hold(1.0, 0.0),
            Breakpoint::exponential(0.0, 1.0),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CurveError::NonPositiveExponential {
                index: 1,
                value: 0.0
            }
        );
    }

    #[test]
    fn rejects_exponential_from_zero_start() {
        let err = Curve::new(vec![
            Breakpoint::hold(0.0, 0.0),
            Breakpoint::exponential(1.0, 1.0),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CurveError::NonPositiveExponential {
                index: 0,
                value: 0.0
            }
        );
    }

    #[test]
    fn rejects_out_of_order_offsets() {
        let err = Curve::new(vec![
            Breakpoint::hold(0.0, 0.5),
            Breakpoint::linear(1.0, 0.2),
        ])
        .unwrap_err();
        assert_eq!(err, CurveError::OutOfOrder { index: 1 });
    }

    #[test]
    fn allows_equal_offsets() {
        let curve = Curve::new(vec![
            Breakpoint::exponential(MIN_EXPONENTIAL_VALUE, 1.0),
            Breakpoint::hold(0.0, 1.0),
        ]);
        assert!(curve.is_ok());
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert_eq!(
            Curve::new(vec![Breakpoint::hold(1.0, -0.1)]),
            Err(CurveError::NegativeOffset { index: 0 })
        );
        assert_eq!(
            Curve::new(vec![Breakpoint::linear(f32::NAN, 0.0)]),
            Err(CurveError::NonFinite { index: 0 })
        );
    }

    #[test]
    fn exponential_midpoint_is_geometric_mean() {
        let mid = interpolate(Ramp::Exponential, 1.0, 0.001, 0.0, 1.0, 0.5);
        assert_relative_eq!(mid, (1.0f32 * 0.001).sqrt(), max_relative = 1e-5);
        assert!(mid < 0.05, "exponential midpoint should be far below 0.5, got {mid}");
    }

    #[test]
    fn linear_midpoint_is_arithmetic_mean() {
        let mid = interpolate(Ramp::Linear, 1.0, 0.001, 0.0, 1.0, 0.5);
        assert_relative_eq!(mid, 0.5005, max_relative = 1e-5);
    }

    #[test]
    fn hold_steps_at_segment_end() {
        assert_eq!(interpolate(Ramp::Hold, 0.2, 0.8, 0.0, 1.0, 0.999), 0.2);
        assert_eq!(interpolate(Ramp::Hold, 0.2, 0.8, 0.0, 1.0, 1.0), 0.8);
    }

    #[test]
    fn exponential_from_zero_degrades_to_hold() {
        assert_eq!(interpolate(Ramp::Exponential, 0.0, 1.0, 0.0, 1.0, 0.5), 0.0);
        assert_eq!(interpolate(Ramp::Exponential, 0.0, 1.0, 0.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn scaled_multiplies_offsets_and_values() {
        let curve = Curve::new(vec![
            Breakpoint::hold(0.0, 0.0),
            Breakpoint::linear(1.0, 0.3),
            Breakpoint::linear(0.5, 1.0),
        ])
        .unwrap();
        let scaled = curve.scaled(2.0, 0.5).unwrap();
        let offsets: Vec<f64> = scaled.points().iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0.0, 0.6, 2.0]);
        assert_eq!(scaled.points()[1].value, 0.5);
        assert_eq!(scaled.span(), 2.0);
    }
}
