//! Storage collaborator
//!
//! The accrual engine never persists anything itself. [`AccrualStore`] is the
//! seam to whatever backend owns user state; every call is treated as a
//! fallible remote call. `apply_accrual` must be atomic per user so concurrent
//! deltas from unrelated sources never lose updates.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::encoder::MeasurementRecord;
use crate::error::VibeError;
use crate::presets::LocationType;
use crate::resonance::UserAccrualState;

/// Persistence of user accrual state and measurements
#[async_trait]
pub trait AccrualStore: Send + Sync {
    async fn load_user_state(&self, user_id: &str) -> Result<UserAccrualState, VibeError>;

    /// Persist a measurement and update the user's measurement counters.
    ///
    /// `streak_days` is the streak the accrual was computed with and is
    /// stored as is.
    async fn save_measurement(
        &self,
        record: &MeasurementRecord,
        streak_days: u32,
    ) -> Result<Uuid, VibeError>;

    /// Atomically add `points` to the user's vibrations, returning the new total
    async fn apply_accrual(&self, user_id: &str, points: u64) -> Result<u64, VibeError>;

    /// Mark badges as earned; already earned ids are ignored
    async fn record_badges(&self, user_id: &str, badge_ids: &[String]) -> Result<(), VibeError>;
}

/// Serializable contents of an [`InMemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub users: BTreeMap<String, UserAccrualState>,
    pub measurements: Vec<MeasurementRecord>,
    /// Location ids each user has measured
    pub rated_locations: BTreeMap<String, BTreeSet<String>>,
    /// Cities each user has measured in
    pub rated_cities: BTreeMap<String, BTreeSet<String>>,
    /// Users each user has sent vibes to
    pub vibe_recipients: BTreeMap<String, BTreeSet<String>>,
}

/// Process-local store, serializable to JSON between runs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `users`
    pub fn with_users(users: impl IntoIterator<Item = UserAccrualState>) -> Self {
        let snapshot = StoreSnapshot {
            users: users.into_iter().map(|u| (u.user_id.clone(), u)).collect(),
            ..Default::default()
        };
        Self::from_snapshot(snapshot)
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    /// Load store contents from JSON
    pub fn from_json(json: &str) -> Result<Self, VibeError> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    /// Save store contents to JSON
    pub async fn to_json(&self) -> Result<String, VibeError> {
        let inner = self.inner.lock().await;
        serde_json::to_string_pretty(&*inner).map_err(VibeError::JsonError)
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.inner.lock().await.clone()
    }

    /// Add a user unless one with the same id exists. Returns whether it was added.
    pub async fn register(&self, state: UserAccrualState) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(&state.user_id) {
            return false;
        }
        inner.users.insert(state.user_id.clone(), state);
        true
    }

    /// Record that `sender` sent vibes to `recipient`, returning the sender's
    /// distinct recipient count
    pub async fn record_vibe_sent(&self, sender: &str, recipient: &str) -> Result<u32, VibeError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(sender) {
            return Err(VibeError::UnknownUser(sender.to_string()));
        }
        let recipients = inner.vibe_recipients.entry(sender.to_string()).or_default();
        recipients.insert(recipient.to_string());
        let count = recipients.len() as u32;

        if let Some(user) = inner.users.get_mut(sender) {
            user.distinct_vibe_recipients = count;
        }
        Ok(count)
    }
}

#[async_trait]
impl AccrualStore for InMemoryStore {
    async fn load_user_state(&self, user_id: &str) -> Result<UserAccrualState, VibeError> {
        let inner = self.inner.lock().await;
        inner
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| VibeError::UnknownUser(user_id.to_string()))
    }

    async fn save_measurement(
        &self,
        record: &MeasurementRecord,
        streak_days: u32,
    ) -> Result<Uuid, VibeError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let user_id = &record.target.user_id;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| VibeError::UnknownUser(user_id.clone()))?;

        let created_at = record.result.created_at;
        user.streak_days = streak_days;
        // A late-arriving older measurement never moves the last one back
        user.last_measured_at = Some(
            user.last_measured_at
                .map_or(created_at, |last| last.max(created_at)),
        );
        user.total_measurements += 1;

        // A measurement without a location id creates a new location
        let location_id = record
            .target
            .location_id
            .clone()
            .unwrap_or_else(|| record.id.to_string());
        let first_visit = inner
            .rated_locations
            .entry(user_id.clone())
            .or_default()
            .insert(location_id);
        if first_visit {
            match record.target.location_type {
                Some(LocationType::Cafe) => user.cafes_rated += 1,
                Some(LocationType::Library) => user.libraries_rated += 1,
                _ => {}
            }
        }

        if let Some(city) = &record.target.city {
            let cities = inner.rated_cities.entry(user_id.clone()).or_default();
            if cities.insert(city.trim().to_lowercase()) {
                user.cities_rated = cities.len() as u32;
            }
        }

        inner.measurements.push(record.clone());
        debug!(user_id = %user_id, measurement_id = %record.id, "measurement saved");
        Ok(record.id)
    }

    async fn apply_accrual(&self, user_id: &str, points: u64) -> Result<u64, VibeError> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| VibeError::UnknownUser(user_id.to_string()))?;
        user.vibrations = user.vibrations.saturating_add(points);
        Ok(user.vibrations)
    }

    async fn record_badges(&self, user_id: &str, badge_ids: &[String]) -> Result<(), VibeError> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| VibeError::UnknownUser(user_id.to_string()))?;
        user.earned_badge_ids.extend(badge_ids.iter().cloned());
        Ok(())
    }
}
