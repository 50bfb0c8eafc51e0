//! Recurring epoch timer.
//!
//! The scheduler posts one timer event per epoch and re-arms itself at each
//! firing until the simulation horizon is reached. The run length is a
//! configuration value, so this is an exit-condition check at every tick, not
//! a fixed N-shot countdown. The pending timer can be canceled if the host
//! stops early.
//!
//! Tie-break policy at epoch boundaries: events at the same simulated instant
//! run in posting order. The tick for time T is posted a full epoch earlier,
//! so work posted for T after that lands in the next epoch.

use lwsim_common::{EventId, EventPayload, SimContext, SimTime};
use tracing::debug;

/// Drives periodic epoch closing until the simulation horizon.
pub struct EpochScheduler {
    epoch_length: SimTime,
    horizon: SimTime,
    timer_id: u64,
    pending: Option<EventId>,
}

impl EpochScheduler {
    /// Create a scheduler with the given epoch length, horizon and timer id.
    /// The timer id must be unique among all timers the host dispatches.
    pub fn new(epoch_length: SimTime, horizon: SimTime, timer_id: u64) -> Self {
        EpochScheduler {
            epoch_length,
            horizon,
            timer_id,
            pending: None,
        }
    }

    /// Post the first tick, one epoch from the current time. Epoch ticks are
    /// posted with no entity targets; the event loop recognizes them through
    /// [`EpochScheduler::matches`].
    pub fn start(&mut self, ctx: &mut SimContext) {
        self.pending = Some(ctx.post_event(
            self.epoch_length,
            Vec::new(),
            EventPayload::Timer {
                timer_id: self.timer_id,
            },
        ));
    }

    /// Whether a payload is this scheduler's tick.
    pub fn matches(&self, payload: &EventPayload) -> bool {
        matches!(payload, EventPayload::Timer { timer_id } if *timer_id == self.timer_id)
    }

    /// Handle a tick: re-arm for the next epoch unless the horizon has been
    /// reached. Returns whether another tick was scheduled. The caller closes
    /// the accumulator epochs; this type only owns the cadence.
    pub fn on_tick(&mut self, ctx: &mut SimContext) -> bool {
        self.pending = None;
        if ctx.time() < self.horizon {
            self.start(ctx);
            true
        } else {
            debug!(
                time_secs = ctx.time().as_secs_f64(),
                "simulation horizon reached, epoch timer stops"
            );
            false
        }
    }

    /// Cancel the pending tick, if any. No other resources are held.
    pub fn cancel(&mut self, ctx: &mut SimContext) {
        if let Some(id) = self.pending.take() {
            ctx.cancel_event(id);
        }
    }

    /// Whether a tick is currently scheduled.
    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// The configured epoch length.
    pub fn epoch_length(&self) -> SimTime {
        self.epoch_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_time(ctx: &mut SimContext) -> SimTime {
        let events = ctx.take_pending_events();
        assert_eq!(events.len(), 1);
        events[0].time
    }

    #[test]
    fn test_start_posts_first_tick_one_epoch_out() {
        let mut ctx = SimContext::new(0);
        let mut scheduler =
            EpochScheduler::new(SimTime::from_hours(1), SimTime::from_hours(24), 0);
        scheduler.start(&mut ctx);
        assert!(scheduler.is_active());
        assert_eq!(tick_time(&mut ctx), SimTime::from_hours(1));
    }

    #[test]
    fn test_reschedules_until_horizon() {
        let mut ctx = SimContext::new(0);
        let mut scheduler =
            EpochScheduler::new(SimTime::from_hours(1), SimTime::from_hours(3), 0);

        ctx.set_time(SimTime::from_hours(1));
        assert!(scheduler.on_tick(&mut ctx));
        assert_eq!(tick_time(&mut ctx), SimTime::from_hours(2));

        ctx.set_time(SimTime::from_hours(2));
        assert!(scheduler.on_tick(&mut ctx));

        // The tick at exactly the horizon is terminal.
        ctx.take_pending_events();
        ctx.set_time(SimTime::from_hours(3));
        assert!(!scheduler.on_tick(&mut ctx));
        assert!(!scheduler.is_active());
        assert!(ctx.take_pending_events().is_empty());
    }

    #[test]
    fn test_matches_only_its_own_timer() {
        let scheduler = EpochScheduler::new(SimTime::from_hours(1), SimTime::from_hours(2), 7);
        assert!(scheduler.matches(&EventPayload::Timer { timer_id: 7 }));
        assert!(!scheduler.matches(&EventPayload::Timer { timer_id: 8 }));
        assert!(!scheduler.matches(&EventPayload::SimulationEnd));
    }

    #[test]
    fn test_cancel_revokes_pending_tick() {
        let mut ctx = SimContext::new(0);
        let mut scheduler =
            EpochScheduler::new(SimTime::from_hours(1), SimTime::from_hours(2), 0);
        scheduler.start(&mut ctx);
        let posted = ctx.take_pending_events();

        scheduler.cancel(&mut ctx);
        assert!(!scheduler.is_active());
        assert_eq!(ctx.take_cancellations(), vec![posted[0].id]);
    }
}
