//! Time handling: cache slots in local civil time and upstream run references.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical local zone of the service (Asia/Taipei, no DST).
pub const TAIPEI_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Default cache slot width.
pub const DEFAULT_SLOT_MINUTES: u32 = 10;

/// Upstream model runs per day, as UTC hours.
pub const RUN_HOURS: [u32; 2] = [0, 12];

/// The Asia/Taipei offset.
pub fn taipei_offset() -> FixedOffset {
    FixedOffset::east_opt(TAIPEI_UTC_OFFSET_SECS).expect("UTC+08:00 is a valid offset")
}

/// A timestamp floored to a slot boundary, stored in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot(DateTime<Utc>);

impl TimeSlot {
    /// Wrap an instant already known to be a slot boundary (e.g. read from storage).
    pub fn from_stored(start: DateTime<Utc>) -> Self {
        Self(start)
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn start_local(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.0.with_timezone(&offset)
    }
}

/// Slot geometry: width and the zone in which boundaries are computed.
#[derive(Debug, Clone, Copy)]
pub struct SlotGrid {
    minutes: u32,
    offset: FixedOffset,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_MINUTES, taipei_offset())
    }
}

impl SlotGrid {
    /// `minutes` is clamped to at least one.
    pub fn new(minutes: u32, offset: FixedOffset) -> Self {
        Self {
            minutes: minutes.max(1),
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn step_secs(&self) -> i64 {
        self.minutes as i64 * 60
    }

    /// Floor `at` to the slot boundary in local civil time.
    pub fn slot_for(&self, at: DateTime<Utc>) -> TimeSlot {
        let local_secs = at.timestamp() + self.offset.local_minus_utc() as i64;
        let floored_local = local_secs - local_secs.rem_euclid(self.step_secs());
        let start_secs = floored_local - self.offset.local_minus_utc() as i64;
        // Flooring only moves backwards by less than one step, so this stays in range.
        let start = DateTime::from_timestamp(start_secs, 0).unwrap_or(at);
        TimeSlot(start)
    }

    /// True during the first minute of a slot, i.e. when the local wall
    /// clock reads an exact multiple of the slot width.
    pub fn is_boundary(&self, at: DateTime<Utc>) -> bool {
        let local_secs = at.timestamp() + self.offset.local_minus_utc() as i64;
        local_secs.rem_euclid(self.step_secs()) < 60
    }
}

/// One scheduled upstream model run: a UTC date and run hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReference {
    pub date: NaiveDate,
    pub hour: u32,
}

impl RunReference {
    pub fn new(date: NaiveDate, hour: u32) -> Self {
        Self { date, hour }
    }

    /// Candidate references newest first: today's runs (latest hour first),
    /// then yesterday's, all in UTC.
    pub fn candidates(now: DateTime<Utc>) -> Vec<RunReference> {
        let today = now.date_naive();
        let yesterday = today - Duration::days(1);

        [today, yesterday]
            .into_iter()
            .flat_map(|date| {
                RUN_HOURS
                    .iter()
                    .rev()
                    .map(move |&hour| RunReference::new(date, hour))
            })
            .collect()
    }

    /// Date in `YYYY-MM-DD` form.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Run time in `HH:MM` form.
    pub fn time_string(&self) -> String {
        format!("{:02}:00", self.hour)
    }

    /// Identifier recorded with cached measurements, e.g. "2025-07-01 12:00 UTC".
    pub fn label(&self) -> String {
        format!("{} {} UTC", self.date_string(), self.time_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_same_window_floors_to_same_instant() {
        let grid = SlotGrid::default();
        let a = Utc.with_ymd_and_hms(2025, 7, 1, 3, 21, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 7, 1, 3, 29, 59).unwrap();
        assert_eq!(grid.slot_for(a), grid.slot_for(b));
        assert_eq!(
            grid.slot_for(a).start_utc(),
            Utc.with_ymd_and_hms(2025, 7, 1, 3, 20, 0).unwrap()
        );
    }

    #[test]
    fn test_slot_local_rendering() {
        let grid = SlotGrid::default();
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 17, 55, 0).unwrap();
        let slot = grid.slot_for(at);
        let local = slot.start_local(grid.offset());
        assert_eq!(local.to_rfc3339(), "2025-07-02T01:50:00+08:00");
    }

    #[test]
    fn test_half_hour_offset_floors_in_local_time() {
        // With a +05:30 zone a 60 minute slot starts at :30 UTC.
        let grid = SlotGrid::new(60, FixedOffset::east_opt(5 * 3600 + 1800).unwrap());
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 10, 10, 0).unwrap();
        assert_eq!(
            grid.slot_for(at).start_utc(),
            Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_boundary_detection() {
        let grid = SlotGrid::default();
        assert!(grid.is_boundary(Utc.with_ymd_and_hms(2025, 7, 1, 3, 20, 0).unwrap()));
        assert!(grid.is_boundary(Utc.with_ymd_and_hms(2025, 7, 1, 3, 20, 59).unwrap()));
        assert!(!grid.is_boundary(Utc.with_ymd_and_hms(2025, 7, 1, 3, 21, 0).unwrap()));
    }

    #[test]
    fn test_candidates_order() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 3, 0, 0).unwrap();
        let labels: Vec<String> = RunReference::candidates(now)
            .iter()
            .map(RunReference::label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "2025-07-01 12:00 UTC",
                "2025-07-01 00:00 UTC",
                "2025-06-30 12:00 UTC",
                "2025-06-30 00:00 UTC",
            ]
        );
    }
}
