use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use log::{debug, info};
use rand::Rng;

use crate::db::Db;
use crate::models::DailySchedule;

/// Candidate run times (UTC), 6am–4pm US Pacific daylight time.
pub const TIME_SLOTS: [(u32, u32); 11] = [
    (13, 12),
    (14, 23),
    (15, 8),
    (16, 37),
    (17, 19),
    (18, 26),
    (19, 43),
    (20, 17),
    (21, 33),
    (22, 11),
    (23, 29),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleDecision {
    /// Current time falls inside today's slot.
    Run(DailySchedule),
    /// The force flag skipped the time check.
    Forced(DailySchedule),
    /// Not this invocation's turn.
    Skip(DailySchedule),
}

impl ScheduleDecision {
    pub fn should_run(&self) -> bool {
        !matches!(self, ScheduleDecision::Skip(_))
    }

    pub fn schedule(&self) -> &DailySchedule {
        match self {
            ScheduleDecision::Run(s) | ScheduleDecision::Forced(s) | ScheduleDecision::Skip(s) => s,
        }
    }
}

/// Today's slot, picking and persisting one if this is the first call of the day.
pub fn ensure_schedule<R: Rng + ?Sized>(db: &Db, now: DateTime<Utc>, rng: &mut R) -> Result<DailySchedule> {
    let today = now.date_naive();

    if let Some(existing) = db.get_schedule(today)? {
        debug!("Reusing schedule for {}: slot {}", today, existing.slot_index);
        return Ok(existing);
    }

    let slot_index = rng.random_range(0..TIME_SLOTS.len());
    let (hour, minute) = TIME_SLOTS[slot_index];
    let stored = db.insert_schedule_if_absent(&DailySchedule {
        date: today,
        slot_index,
        hour,
        minute,
        created_at: now,
    })?;

    info!("Scheduled {} at {:02}:{:02} UTC", today, stored.hour, stored.minute);
    Ok(stored)
}

/// Whether `now` falls in the slot's UTC hour. Cron triggers drift by tens of
/// minutes, so the minute only matters for spreading slots across the day.
pub fn slot_matches(schedule: &DailySchedule, now: DateTime<Utc>) -> bool {
    now.hour() == schedule.hour
}

pub fn check<R: Rng + ?Sized>(
    db: &Db,
    now: DateTime<Utc>,
    force: bool,
    rng: &mut R,
) -> Result<ScheduleDecision> {
    let schedule = ensure_schedule(db, now, rng)?;

    if force {
        return Ok(ScheduleDecision::Forced(schedule));
    }

    if slot_matches(&schedule, now) {
        Ok(ScheduleDecision::Run(schedule))
    } else {
        Ok(ScheduleDecision::Skip(schedule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, hour, minute, 0).unwrap()
    }

    fn schedule(hour: u32, minute: u32) -> DailySchedule {
        DailySchedule {
            date: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            slot_index: 0,
            hour,
            minute,
            created_at: at(0, 0),
        }
    }

    #[test]
    fn repeated_calls_keep_the_first_pick() {
        let db = Db::open_in_memory().unwrap();
        let first = ensure_schedule(&db, at(1, 0), &mut StdRng::seed_from_u64(1)).unwrap();

        for seed in 2..20 {
            let again = ensure_schedule(&db, at(2 + (seed % 20) as u32, 5), &mut StdRng::seed_from_u64(seed)).unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(TIME_SLOTS[first.slot_index], (first.hour, first.minute));
    }

    #[test]
    fn a_new_day_gets_a_new_row() {
        let db = Db::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let today = ensure_schedule(&db, at(8, 0), &mut rng).unwrap();
        let tomorrow = ensure_schedule(&db, at(8, 0) + Duration::days(1), &mut rng).unwrap();

        assert_eq!(tomorrow.date, today.date.succ_opt().unwrap());
        assert!(db.get_schedule(today.date).unwrap().is_some());
    }

    #[test]
    fn any_minute_of_the_slot_hour_matches() {
        let s = schedule(13, 12);
        assert!(slot_matches(&s, at(13, 12)));
        assert!(slot_matches(&s, at(13, 0)));
        assert!(slot_matches(&s, at(13, 50)));
        assert!(slot_matches(&s, at(13, 59)));
    }

    #[test]
    fn neighbouring_hours_do_not_match() {
        let s = schedule(13, 12);
        assert!(!slot_matches(&s, at(12, 45)));
        assert!(!slot_matches(&s, at(12, 59)));
        assert!(!slot_matches(&s, at(14, 0)));

        let late = schedule(23, 50);
        assert!(slot_matches(&late, at(23, 5)));
        assert!(!slot_matches(&late, at(0, 10)));
    }

    #[test]
    fn off_slot_invocation_skips() {
        let db = Db::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let stored = ensure_schedule(&db, at(0, 1), &mut rng).unwrap();

        // Every slot is between 13:00 and 23:59, so 03:00 never matches.
        let decision = check(&db, at(3, 0), false, &mut rng).unwrap();
        assert!(!decision.should_run());
        assert_eq!(decision.schedule(), &stored);
        assert_eq!(decision, ScheduleDecision::Skip(stored));
    }

    #[test]
    fn on_slot_invocation_runs() {
        let db = Db::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let stored = ensure_schedule(&db, at(0, 1), &mut rng).unwrap();

        let decision = check(&db, at(stored.hour, 59), false, &mut rng).unwrap();
        assert_eq!(decision, ScheduleDecision::Run(stored));
    }

    #[test]
    fn force_bypasses_time_check() {
        let db = Db::open_in_memory().unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let decision = check(&db, at(3, 0), true, &mut rng).unwrap();
        assert!(matches!(decision, ScheduleDecision::Forced(_)));
        assert!(decision.should_run());
        // the day's pick is still recorded
        assert!(db.get_schedule(at(3, 0).date_naive()).unwrap().is_some());
    }
}
