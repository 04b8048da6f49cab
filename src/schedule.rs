//! Hourly wake-ups aligned to the top of the hour.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Timelike, Utc};
use std::time::Duration;

/// The board updates around midnight UTC; checks at that tick wait a little longer.
pub const DAILY_RESET_HOUR: u32 = 0;
pub const RESET_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    WaitingForAlignment,
    Polling,
}

/// First top of the hour strictly after `now`.
pub fn next_tick(now: DateTime<Utc>) -> DateTime<Utc> {
    let hour = ChronoDuration::hours(1);
    match now.duration_trunc(hour) {
        Ok(start) => start + hour,
        Err(_) => now + hour,
    }
}

pub fn delay_until_next_tick(now: DateTime<Utc>) -> Duration {
    (next_tick(now) - now).to_std().unwrap_or_default()
}

/// Extra wait before checking at `tick`, if it is the daily reset boundary.
pub fn reset_grace(tick: DateTime<Utc>) -> Option<Duration> {
    (tick.hour() == DAILY_RESET_HOUR).then_some(RESET_GRACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    #[test]
    fn aligns_to_next_hour() {
        assert_eq!(
            delay_until_next_tick(at(14, 23, 10)),
            Duration::from_secs(36 * 60 + 50)
        );
        assert_eq!(next_tick(at(14, 23, 10)), at(15, 0, 0));
    }

    #[test]
    fn exact_boundary_waits_a_full_hour() {
        assert_eq!(next_tick(at(15, 0, 0)), at(16, 0, 0));
        assert_eq!(delay_until_next_tick(at(15, 0, 0)), Duration::from_secs(3600));
    }

    #[test]
    fn rolls_over_midnight() {
        assert_eq!(
            next_tick(at(23, 59, 59)),
            Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap()
        );
        assert_eq!(delay_until_next_tick(at(23, 59, 59)), Duration::from_secs(1));
    }

    #[test]
    fn grace_only_at_daily_reset() {
        assert_eq!(reset_grace(at(0, 0, 0)), Some(RESET_GRACE));
        assert_eq!(reset_grace(at(1, 0, 0)), None);
        assert_eq!(reset_grace(at(12, 0, 0)), None);
    }
}
