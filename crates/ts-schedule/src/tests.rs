//! Unit tests for ts-schedule.

use ts_core::Tick;

use crate::{ActivityHandle, Priority, Schedule, ScheduleError, ScheduleParams};

fn p(v: i32) -> Priority {
    Priority::new(v).unwrap()
}

#[cfg(test)]
mod priority_tests {
    use super::*;

    #[test]
    fn reserved_values_rejected() {
        assert!(matches!(Priority::new(i32::MIN), Err(ScheduleError::ReservedPriority(_))));
        assert!(matches!(Priority::new(i32::MAX), Err(ScheduleError::ReservedPriority(_))));
        assert!(Priority::FIRST.is_reserved());
        assert!(!p(0).is_reserved());
    }

    #[test]
    fn brackets_order_outside_user_values() {
        assert!(Priority::FIRST < p(i32::MIN + 1));
        assert!(Priority::LAST > p(i32::MAX - 1));
        assert_eq!(Priority::FIRST.to_string(), "FIRST");
        assert_eq!(p(-3).to_string(), "-3");
    }
}

#[cfg(test)]
mod schedule_tests {
    use super::*;

    #[test]
    fn same_tick_orders_by_priority_then_registration() {
        let mut s = Schedule::new();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, Priority::LAST), "stop").unwrap();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, p(0)), "roads").unwrap();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, p(-10)), "speeds").unwrap();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, p(0)), "roads-2").unwrap();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, Priority::FIRST), "start").unwrap();

        for t in 0..3 {
            assert_eq!(
                s.drain_tick(Tick(t)).unwrap(),
                ["start", "speeds", "roads", "roads-2", "stop"]
            );
        }
    }

    #[test]
    fn intervals_and_offsets() {
        let mut s = Schedule::new();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, p(0)), 'r').unwrap();
        s.schedule(ScheduleParams::repeating(Tick(0), 3, p(1)), 'z').unwrap();
        s.schedule(ScheduleParams::repeating(Tick(4), 4, p(9)), 'P').unwrap();

        let fired: Vec<String> = (0..9)
            .map(|t| s.drain_tick(Tick(t)).unwrap().into_iter().collect())
            .collect();
        assert_eq!(fired, ["rz", "r", "r", "rz", "rP", "r", "rz", "r", "rP"]);
    }

    #[test]
    fn once_fires_exactly_once() {
        let mut s = Schedule::new();
        s.schedule(ScheduleParams::once(Tick(2), p(0)), 1).unwrap();
        assert!(s.drain_tick(Tick(0)).unwrap().is_empty());
        assert!(s.drain_tick(Tick(1)).unwrap().is_empty());
        assert_eq!(s.drain_tick(Tick(2)).unwrap(), [1]);
        assert!(s.drain_tick(Tick(3)).unwrap().is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn past_start_rolls_onto_grid() {
        let mut s = Schedule::new();
        for t in 0..7 {
            s.drain_tick(Tick(t)).unwrap();
        }
        // grid 1, 4, 7, 10 ... → first fire at 7
        s.schedule(ScheduleParams::repeating(Tick(1), 3, p(0)), 'x').unwrap();
        assert_eq!(s.next_tick(), Some(Tick(7)));
        // past one-shot fires on the next drain
        s.schedule(ScheduleParams::once(Tick(2), p(1)), 'y').unwrap();
        assert_eq!(s.drain_tick(Tick(7)).unwrap(), ['x', 'y']);
    }

    #[test]
    fn skipped_ticks_do_not_lose_activities() {
        let mut s = Schedule::new();
        s.schedule(ScheduleParams::repeating(Tick(0), 2, p(0)), 'a').unwrap();
        assert_eq!(s.drain_tick(Tick(5)).unwrap(), ['a']);
        assert_eq!(s.next_tick(), Some(Tick(6)));
    }

    #[test]
    fn draining_backwards_is_an_error() {
        let mut s: Schedule<u8> = Schedule::new();
        s.drain_tick(Tick(3)).unwrap();
        assert!(matches!(
            s.drain_tick(Tick(3)),
            Err(ScheduleError::TickAlreadyDrained { tick: Tick(3), next: Tick(4) })
        ));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut s = Schedule::new();
        assert!(matches!(
            s.schedule(ScheduleParams::repeating(Tick(0), 0, p(0)), ()),
            Err(ScheduleError::ZeroInterval)
        ));
    }

    #[test]
    fn cancel_removes_repeating_activity() {
        let mut s = Schedule::new();
        let a = s.schedule(ScheduleParams::repeating(Tick(0), 1, p(0)), 'a').unwrap();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, p(1)), 'b').unwrap();
        assert_eq!(s.drain_tick(Tick(0)).unwrap(), ['a', 'b']);
        s.cancel(a).unwrap();
        assert_eq!(s.drain_tick(Tick(1)).unwrap(), ['b']);
        assert!(matches!(s.cancel(a), Err(ScheduleError::UnknownActivity(_))));
        assert!(s.cancel(ActivityHandle(999)).is_err());
    }

    #[test]
    fn end_actions_drain_by_priority() {
        let mut s = Schedule::new();
        s.schedule_at_end("send-end", Priority::LAST);
        let h = s.schedule_at_end("never", p(0));
        s.schedule_at_end("stop-collect", p(-5));
        s.schedule_at_end("shutdown-pool", p(5));
        s.cancel(h).unwrap();
        assert_eq!(s.drain_end(), ["stop-collect", "shutdown-pool", "send-end"]);
        assert!(s.drain_end().is_empty());
    }

    #[test]
    fn len_tracks_queued_entries() {
        let mut s = Schedule::new();
        s.schedule(ScheduleParams::repeating(Tick(0), 1, p(0)), 0).unwrap();
        s.schedule(ScheduleParams::once(Tick(0), p(0)), 1).unwrap();
        assert_eq!(s.len(), 2);
        s.drain_tick(Tick(0)).unwrap();
        assert_eq!(s.len(), 1);
    }
}
