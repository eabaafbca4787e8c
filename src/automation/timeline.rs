//! Absolute-time automation events for one parameter.

use crate::error::CurveError;

use super::curve::{interpolate, Ramp};

/// Events a timeline can hold at once. Storage is allocated up front so the
/// processing thread never grows it.
pub const MAX_TIMELINE_EVENTS: usize = 128;

/// A breakpoint anchored at an absolute transport time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub value: f32,
    pub ramp: Ramp,
}

/// Commands that move a timeline forward. The control plane applies them to
/// its mirror and the processor applies the same sequence to its own copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationCommand {
    Insert(Event),
    /// Drop everything at or after `time` and hold `value` from there.
    CancelAndHold { time: f64, value: f32 },
    /// Stop following the timeline and keep the last rendered value.
    Detach,
}

/// Time-sorted events plus the value in effect before the first of them.
#[derive(Debug, Clone)]
pub struct Timeline {
    base: f32,
    events: Vec<Event>,
}

impl Timeline {
    pub fn new(initial: f32) -> Self {
        Self {
            base: initial,
            events: Vec::with_capacity(MAX_TIMELINE_EVENTS),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Value of the curve at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time <= t);

        let Some(next) = self.events.get(idx) else {
            return self.events.last().map_or(self.base, |e| e.value);
        };

        // Ramps need a start point; before the first event there is none.
        let Some(prev) = idx.checked_sub(1).map(|i| self.events[i]) else {
            return self.base;
        };

        match next.ramp {
            Ramp::Hold => prev.value,
            ramp => interpolate(ramp, prev.value, next.value, prev.time, next.time, t),
        }
    }

    /// Insert after any events at the same time, so later inserts win ties.
    pub fn insert(&mut self, event: Event) -> Result<(), CurveError> {
        if self.events.len() >= MAX_TIMELINE_EVENTS {
            return Err(CurveError::TooLong {
                len: self.events.len() + 1,
                max: MAX_TIMELINE_EVENTS,
            });
        }
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
        Ok(())
    }

    /// Remove every event at or after `time`, then hold `value` from `time`.
    ///
    /// A ramp cut short keeps its shape up to `time`, so values before the
    /// cancellation point read back the same as they rendered.
    pub fn cancel_and_hold(&mut self, time: f64, value: f32) {
        let keep = self.events.partition_point(|e| e.time < time);
        let ramp = match self.events.get(keep) {
            Some(cut) if keep > 0 => cut.ramp,
            _ => Ramp::Hold,
        };
        self.events.truncate(keep);
        if self.events.len() >= MAX_TIMELINE_EVENTS {
            let oldest = self.events.remove(0);
            self.base = oldest.value;
        }
        self.events.push(Event { time, value, ramp });
    }

    /// Forget events that can no longer influence values at or after `t`.
    ///
    /// The last event at or before `t` stays as the anchor for whatever
    /// segment is in flight.
    pub fn prune_before(&mut self, t: f64) {
        let idx = self.events.partition_point(|e| e.time <= t);
        if idx > 1 {
            self.events.drain(..idx - 1);
            self.base = self.events[0].value;
        }
    }

    /// Drop all events and hold `value` forever.
    pub fn reset(&mut self, value: f32) {
        self.events.clear();
        self.base = value;
    }

    pub fn apply(&mut self, command: AutomationCommand) -> Result<(), CurveError> {
        match command {
            AutomationCommand::Insert(event) => self.insert(event),
            AutomationCommand::CancelAndHold { time, value } => {
                self.cancel_and_hold(time, value);
                Ok(())
            }
            AutomationCommand::Detach => {
                let held = self.events.last().map_or(self.base, |e| e.value);
                self.reset(held);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn event(time: f64, value: f32, ramp: Ramp) -> Event {
        Event { time, value, ramp }
    }

    #[test]
    fn empty_timeline_holds_base() {
        let timeline = Timeline::new(0.25);
        assert_eq!(timeline.value_at(-1.0), 0.25);
        assert_eq!(timeline.value_at(100.0), 0.25);
    }

    #[test]
    fn linear_ramp_between_events() {
        let mut timeline = Timeline::new(0.0);
        timeline.insert(event(1.0, 0.0, Ramp::Hold)).unwrap();
        timeline.insert(event(2.0, 1.0, Ramp::Linear)).unwrap();

        assert_eq!(timeline.value_at(0.5), 0.0);
        assert_relative_eq!(timeline.value_at(1.5), 0.5);
        assert_eq!(timeline.value_at(2.0), 1.0);
        assert_eq!(timeline.value_at(3.0), 1.0);
    }

    #[test]
    fn ramp_without_prior_event_holds_base() {
        let mut timeline = Timeline::new(0.3);
        timeline.insert(event(1.0, 1.0, Ramp::Linear)).unwrap();
        assert_eq!(timeline.value_at(0.5), 0.3);
        assert_eq!(timeline.value_at(1.0), 1.0);
    }

    #[test]
    fn later_insert_wins_at_equal_time() {
        let mut timeline = Timeline::new(0.0);
        timeline.insert(event(1.0, 0.5, Ramp::Hold)).unwrap();
        timeline.insert(event(1.0, 0.8, Ramp::Hold)).unwrap();
        assert_eq!(timeline.value_at(1.0), 0.8);
    }

    #[test]
    fn cancel_and_hold_keeps_value_mid_ramp() {
        let mut timeline = Timeline::new(0.0);
        timeline.insert(event(0.0, 0.0, Ramp::Hold)).unwrap();
        timeline.insert(event(1.0, 1.0, Ramp::Linear)).unwrap();

        let held = timeline.value_at(0.25);
        timeline.cancel_and_hold(0.25, held);

        assert_relative_eq!(timeline.value_at(0.25), 0.25);
        assert_relative_eq!(timeline.value_at(5.0), 0.25);
        // Elapsed part of the ramp is untouched.
        assert_relative_eq!(timeline.value_at(0.1), 0.1);
    }

    #[test]
    fn prune_keeps_anchor_of_segment_in_flight() {
        let mut timeline = Timeline::new(0.0);
        timeline.insert(event(0.0, 0.0, Ramp::Hold)).unwrap();
        timeline.insert(event(1.0, 1.0, Ramp::Linear)).unwrap();
        timeline.insert(event(2.0, 0.0, Ramp::Linear)).unwrap();

        let before = timeline.value_at(1.5);
        timeline.prune_before(1.2);

        assert_eq!(timeline.events().len(), 2);
        assert_eq!(timeline.value_at(1.5), before);
    }

    #[test]
    fn insert_rejects_overflow() {
        let mut timeline = Timeline::new(0.0);
        for i in 0..MAX_TIMELINE_EVENTS {
            timeline.insert(event(i as f64, 0.0, Ramp::Hold)).unwrap();
        }
        assert!(matches!(
            timeline.insert(event(1e6, 0.0, Ramp::Hold)),
            Err(CurveError::TooLong { .. })
        ));
    }
}
