use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_utils::clock::Clock;

use crate::models::{
    day_of_week, Doctor, DoctorError, GenerateScheduleRequest, LeaveRecord, ScheduleKey, ScheduleUpsert,
    WeeklyScheduleEntry, REST_DAY_LEAVE_REASON,
};
use crate::services::locks::SlotLocks;
use crate::store::AvailabilityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestDayAction {
    Work,
    Skip,
    /// Skip the date and record a leave for it.
    SkipWithLeave,
}

/// Decides what the generator does with each calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestDayPolicy {
    rest_days: Vec<Weekday>,
    auto_leave: bool,
}

impl RestDayPolicy {
    pub fn new(rest_days: Vec<Weekday>, auto_leave: bool) -> Self {
        Self { rest_days, auto_leave }
    }

    pub fn from_config(config: &SchedulingConfig) -> Self {
        Self::new(config.rest_days.clone(), config.auto_leave_on_rest_days)
    }

    pub fn decide(&self, date: NaiveDate) -> RestDayAction {
        if !self.rest_days.contains(&date.weekday()) {
            RestDayAction::Work
        } else if self.auto_leave {
            RestDayAction::SkipWithLeave
        } else {
            RestDayAction::Skip
        }
    }
}

/// Materializes per-date schedule rows for a doctor.
pub struct ScheduleGenerator {
    store: Arc<dyn AvailabilityStore>,
    config: SchedulingConfig,
    policy: RestDayPolicy,
    locks: Arc<SlotLocks>,
    clock: Arc<dyn Clock>,
}

impl ScheduleGenerator {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        config: SchedulingConfig,
        locks: Arc<SlotLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = RestDayPolicy::from_config(&config);
        Self {
            store,
            config,
            policy,
            locks,
            clock,
        }
    }

    /// Fills in the defaults and checks the bounds of a generation request.
    pub fn resolve_range(&self, request: &GenerateScheduleRequest) -> Result<(NaiveDate, NaiveDate), DoctorError> {
        let start = request.start_date.unwrap_or_else(|| self.clock.today());
        let end = match request.end_date {
            Some(end) => end,
            None => week_end_on_or_after(start, self.config.week_ends_on)?,
        };

        if end < start {
            return Err(DoctorError::validation("end_date", "End date must not be before start date"));
        }

        let days = (end - start).num_days() + 1;
        if days > self.config.max_schedule_days {
            return Err(DoctorError::validation(
                "end_date",
                format!(
                    "Range covers {} days, at most {} may be generated at once",
                    days, self.config.max_schedule_days
                ),
            ));
        }

        Ok((start, end))
    }

    /// Upserts one row per working date in the range and returns the touched
    /// rows in ascending date order. Running it again over the same range
    /// updates the same rows.
    pub async fn generate(
        &self,
        doctor: &Doctor,
        request: GenerateScheduleRequest,
    ) -> Result<Vec<WeeklyScheduleEntry>, DoctorError> {
        if !doctor.is_active {
            return Err(DoctorError::Inactive(doctor.id));
        }

        let (start, end) = self.resolve_range(&request)?;
        debug!("Generating schedule for doctor {} from {} to {}", doctor.id, start, end);

        let pattern = self.store.list_weekly_pattern(doctor.id).await?;
        let now = self.clock.now();
        let mut touched = Vec::new();
        let mut leaves_recorded = 0usize;

        for date in start.iter_days().take_while(|d| *d <= end) {
            let action = self.policy.decide(date);
            if action == RestDayAction::Skip {
                continue;
            }

            let _guard = self.locks.acquire(doctor.id, date).await;
            match action {
                RestDayAction::Work => {}
                RestDayAction::Skip => continue,
                RestDayAction::SkipWithLeave => {
                    if self.record_rest_day_leave(doctor, date).await?.is_some() {
                        leaves_recorded += 1;
                    }
                    continue;
                }
            }

            let weekday = day_of_week(date);
            let (start_time, end_time) = match pattern.iter().find(|row| row.day_of_week == weekday) {
                Some(row) if !row.is_active => continue,
                Some(row) => (row.start_time, row.end_time),
                None => (self.config.default_start_time, self.config.default_end_time),
            };

            let entry = self
                .store
                .upsert_schedule_entry(ScheduleUpsert {
                    doctor_id: doctor.id,
                    key: ScheduleKey::Date(date),
                    start_time,
                    end_time,
                    is_active: true,
                    at: now,
                })
                .await?;
            touched.push(entry);
        }

        info!(
            "Generated {} schedule entries for doctor {} ({} rest-day leaves)",
            touched.len(),
            doctor.id,
            leaves_recorded
        );
        Ok(touched)
    }

    /// Records the rest-day leave unless the date already has one. The caller
    /// holds the date's guard.
    async fn record_rest_day_leave(&self, doctor: &Doctor, date: NaiveDate) -> Result<Option<LeaveRecord>, DoctorError> {
        if self.store.find_leave(doctor.id, date).await?.is_some() {
            return Ok(None);
        }

        let leave = LeaveRecord {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            date,
            reason: Some(REST_DAY_LEAVE_REASON.to_string()),
            created_at: self.clock.now(),
        };
        match self.store.insert_leave(leave).await {
            Ok(leave) => Ok(Some(leave)),
            Err(err) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// The first `week_end` on or after `date`.
pub fn week_end_on_or_after(date: NaiveDate, week_end: Weekday) -> Result<NaiveDate, DoctorError> {
    let offset = (7 + week_end.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
    date.checked_add_days(Days::new(u64::from(offset)))
        .ok_or_else(|| DoctorError::validation("start_date", "date is out of range"))
}
