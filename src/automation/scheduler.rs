use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::clock::Clock;
use crate::error::{Error, Result};

use super::curve::{Curve, Ramp};
use super::param::Param;
use super::timeline::{AutomationCommand, Event};

/// Installs curves on parameter timelines against an injected clock.
///
/// Every request is anchored at `max(time, now)`: a late request takes
/// effect as soon as possible and never rewrites values that already
/// elapsed.
#[derive(Clone)]
pub struct Scheduler {
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.clock.now())
            .finish()
    }
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Resolve an optional trigger time to an absolute one.
    pub fn resolve(&self, time: Option<f64>) -> Result<f64> {
        match time {
            Some(t) if !t.is_finite() => Err(Error::InvalidTime(t)),
            Some(t) => Ok(t),
            None => Ok(self.now()),
        }
    }

    /// Cancel everything on `param` from `start` onward, then install
    /// `curve` with its offsets measured from `start`.
    ///
    /// The cancellation and the new breakpoints reach the processor in one
    /// chunk. Breakpoints that would land before the anchor are dropped.
    pub fn schedule_curve(&self, param: &mut Param, curve: &Curve, start: f64) -> Result<()> {
        if !start.is_finite() {
            return Err(Error::InvalidTime(start));
        }
        let now = self.now();
        let anchor = start.max(now);

        let mut commands = Vec::with_capacity(curve.len() + 1);
        commands.push(AutomationCommand::CancelAndHold {
            time: anchor,
            value: param.value_at(anchor),
        });
        commands.extend(
            curve
                .points()
                .iter()
                .map(|p| Event {
                    time: start + p.offset,
                    value: p.value,
                    ramp: p.ramp,
                })
                .filter(|e| e.time >= anchor)
                .map(AutomationCommand::Insert),
        );

        param.submit(now, &commands)?;
        debug!(
            param = ?param.id(),
            start,
            anchor,
            points = curve.len(),
            "scheduled curve"
        );
        Ok(())
    }

    /// Remove everything at or after `time`; the parameter holds the value
    /// it had at that instant.
    pub fn cancel_from(&self, param: &mut Param, time: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(Error::InvalidTime(time));
        }
        let now = self.now();
        let anchor = time.max(now);
        let command = AutomationCommand::CancelAndHold {
            time: anchor,
            value: param.value_at(anchor),
        };

        param.submit(now, &[command])?;
        debug!(param = ?param.id(), anchor, "cancelled automation");
        Ok(())
    }

    /// Step to `value` at `time`, leaving other events in place.
    pub fn set_value_at(&self, param: &mut Param, value: f32, time: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(Error::InvalidTime(time));
        }
        let now = self.now();
        let event = Event {
            time: time.max(now),
            value,
            ramp: Ramp::Hold,
        };
        param.submit(now, &[AutomationCommand::Insert(event)])
    }

    /// Pure query. Agrees with what the processor renders at `time`.
    pub fn value_at(&self, param: &Param, time: f64) -> Result<f32> {
        if param.is_detached() {
            return Err(Error::Disposed);
        }
        Ok(param.value_at(time))
    }
}
