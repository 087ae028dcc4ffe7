use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

/// Idle entries are dropped once a map grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusion for everything a booking decision reads.
///
/// Each doctor has a gate and each (doctor, date) a mutex. Work on one date
/// (bookings, status changes, leaves, pinned schedule rows) holds the gate
/// shared and the date exclusively. Changes that reach every date of a doctor
/// (deactivation, the daily cap, recurring pattern rows) hold the gate
/// exclusively. Guards are not reentrant: never acquire while holding one.
#[derive(Default)]
pub struct SlotLocks {
    doctors: DashMap<Uuid, Arc<RwLock<()>>>,
    days: DashMap<(Uuid, NaiveDate), Arc<Mutex<()>>>,
}

/// Held while one (doctor, date) is read, checked and written.
pub struct DayGuard {
    _day: OwnedMutexGuard<()>,
    _doctor: OwnedRwLockReadGuard<()>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: Uuid, date: NaiveDate) -> DayGuard {
        // Clone the Arcs out so no map shard stays locked across an await.
        let gate = self.gate(doctor_id);
        let day = self
            .days
            .entry((doctor_id, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        self.prune_if_large();

        let doctor = gate.read_owned().await;
        let day = day.lock_owned().await;
        DayGuard {
            _day: day,
            _doctor: doctor,
        }
    }

    /// Waits for every in-flight date of the doctor and blocks new ones.
    pub async fn acquire_doctor(&self, doctor_id: Uuid) -> OwnedRwLockWriteGuard<()> {
        let gate = self.gate(doctor_id);
        self.prune_if_large();
        gate.write_owned().await
    }

    /// Removes locks nobody holds or waits on.
    pub fn prune(&self) {
        self.days.retain(|_, lock| Arc::strong_count(lock) > 1);
        self.doctors.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of (doctor, date) locks held in the map.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    fn gate(&self, doctor_id: Uuid) -> Arc<RwLock<()>> {
        self.doctors
            .entry(doctor_id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .value()
            .clone()
    }

    fn prune_if_large(&self) {
        if self.days.len() > PRUNE_THRESHOLD || self.doctors.len() > PRUNE_THRESHOLD {
            self.prune();
        }
    }
}
