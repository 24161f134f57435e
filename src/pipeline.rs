//! Accrual pipeline
//!
//! Orchestrates one scored measurement through the accrual engine and the
//! storage collaborator:
//!
//! 1. Load user state
//! 2. Compute points from the result and caller context
//! 3. Save the measurement record with the streak the points used
//! 4. Check newly earned badges
//! 5. Apply the points delta atomically in storage
//! 6. Record the badges, whether or not the apply succeeded
//! 7. Detect a rank-up on the exact before/after totals of that delta

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::encoder::{MeasurementEncoder, MeasurementTarget};
use crate::error::VibeError;
use crate::resonance::calendar::{is_first_measurement_today, next_streak_days};
use crate::resonance::{
    AccrualContext, BadgeCatalog, BadgeDefinition, LevelUpCelebration, PointsBreakdown,
    RankCatalog, RankDefinition, UserAccrualState,
};
use crate::store::AccrualStore;
use crate::types::MeasurementResult;

/// Points, rank and badge deltas of a pure accrual evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualDelta {
    pub points: PointsBreakdown,
    pub vibrations_before: u64,
    pub vibrations_after: u64,
    pub rank: RankDefinition,
    pub rank_up: Option<RankDefinition>,
    pub new_badges: Vec<BadgeDefinition>,
}

/// Evaluate a measurement against `state` without persisting anything.
///
/// `state` is the user's state before the measurement; the measurement is
/// counted and `streak_days` applied before badges are checked.
pub fn evaluate_accrual(
    state: &UserAccrualState,
    result: &MeasurementResult,
    context: &AccrualContext,
    streak_days: u32,
    ranks: &RankCatalog,
    badges: &BadgeCatalog,
) -> AccrualDelta {
    let points = PointsBreakdown::compute(result.vibe_score, context, streak_days);
    let vibrations_before = state.vibrations;
    let vibrations_after = vibrations_before.saturating_add(points.total);

    let mut stats = state.clone();
    stats.total_measurements += 1;
    stats.streak_days = streak_days;

    AccrualDelta {
        points,
        vibrations_before,
        vibrations_after,
        rank: ranks.current_rank(vibrations_after).clone(),
        rank_up: ranks.detect_rank_up(vibrations_before, vibrations_after).cloned(),
        new_badges: badges.check(&stats, result),
    }
}

/// Result of recording one measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualOutcome {
    pub measurement_id: Uuid,
    pub points: PointsBreakdown,
    pub previous_vibrations: u64,
    pub vibrations: u64,
    pub rank: RankDefinition,
    pub rank_up: Option<RankDefinition>,
    pub celebration: Option<LevelUpCelebration>,
    pub new_badges: Vec<BadgeDefinition>,
    /// Earned badge ids storage did not confirm; the caller must record them
    pub unrecorded_badge_ids: Vec<String>,
}

/// Stateful accrual processor over a storage collaborator.
///
/// Use this when totals live behind an [`AccrualStore`]; use
/// [`evaluate_accrual`] for a side-effect-free preview.
pub struct ResonanceProcessor<S> {
    store: S,
    encoder: MeasurementEncoder,
    ranks: RankCatalog,
    badges: BadgeCatalog,
}

impl<S: AccrualStore> ResonanceProcessor<S> {
    /// Processor with the standard rank and badge catalogs
    pub fn new(store: S) -> Self {
        Self {
            store,
            encoder: MeasurementEncoder::new(),
            ranks: RankCatalog::standard().clone(),
            badges: BadgeCatalog::standard().clone(),
        }
    }

    pub fn with_ranks(mut self, ranks: RankCatalog) -> Self {
        self.ranks = ranks;
        self
    }

    pub fn with_badges(mut self, badges: BadgeCatalog) -> Self {
        self.badges = badges;
        self
    }

    pub fn with_encoder(mut self, encoder: MeasurementEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ranks(&self) -> &RankCatalog {
        &self.ranks
    }

    /// Record a measurement, deriving the daily flag and streak from the
    /// user's last measurement on their local calendar
    pub async fn record(
        &self,
        target: &MeasurementTarget,
        result: &MeasurementResult,
        is_new_location: bool,
    ) -> Result<AccrualOutcome, VibeError> {
        let state = self.store.load_user_state(&target.user_id).await?;
        let now = result.created_at;
        let context = AccrualContext {
            is_first_today: is_first_measurement_today(
                state.last_measured_at,
                now,
                state.utc_offset_minutes,
            ),
            is_new_location,
        };
        let streak_days = next_streak_days(
            state.last_measured_at,
            state.streak_days,
            now,
            state.utc_offset_minutes,
        );
        self.accrue(state, target, result, &context, streak_days).await
    }

    /// Record a measurement with caller-supplied context and streak
    pub async fn record_with_context(
        &self,
        target: &MeasurementTarget,
        result: &MeasurementResult,
        context: &AccrualContext,
        streak_days: u32,
    ) -> Result<AccrualOutcome, VibeError> {
        let state = self.store.load_user_state(&target.user_id).await?;
        self.accrue(state, target, result, context, streak_days).await
    }

    /// Re-apply a delta reported by [`VibeError::AccrualNotApplied`].
    ///
    /// Pending badges are recorded first, since recording is idempotent and
    /// a failure there leaves the points untouched for another retry.
    /// Returns the new total and any rank reached by this delta.
    pub async fn apply_pending(
        &self,
        user_id: &str,
        points: u64,
        pending_badge_ids: &[String],
    ) -> Result<(u64, Option<RankDefinition>), VibeError> {
        if !pending_badge_ids.is_empty() {
            self.store.record_badges(user_id, pending_badge_ids).await?;
        }
        let vibrations = self.store.apply_accrual(user_id, points).await?;
        let previous = vibrations.saturating_sub(points);
        Ok((vibrations, self.ranks.detect_rank_up(previous, vibrations).cloned()))
    }

    async fn accrue(
        &self,
        state: UserAccrualState,
        target: &MeasurementTarget,
        result: &MeasurementResult,
        context: &AccrualContext,
        streak_days: u32,
    ) -> Result<AccrualOutcome, VibeError> {
        let user_id = target.user_id.as_str();
        let points = PointsBreakdown::compute(result.vibe_score, context, streak_days);

        let record = self.encoder.encode(result, target);
        let measurement_id = self.store.save_measurement(&record, streak_days).await?;

        let mut stats = match self.store.load_user_state(user_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(user_id, error = %e, "reload after save failed, checking badges on local state");
                let mut stats = state;
                stats.total_measurements += 1;
                stats
            }
        };
        stats.streak_days = streak_days;
        let new_badges = self.badges.check(&stats, result);

        // Badges do not depend on the apply succeeding
        let applied = self.store.apply_accrual(user_id, points.total).await;

        let badge_ids: Vec<String> = new_badges.iter().map(|b| b.id.clone()).collect();
        let unrecorded_badge_ids = if badge_ids.is_empty() {
            Vec::new()
        } else {
            match self.store.record_badges(user_id, &badge_ids).await {
                Ok(()) => Vec::new(),
                Err(e) => {
                    warn!(user_id, error = %e, "failed to record earned badges");
                    badge_ids
                }
            }
        };

        let vibrations = applied.map_err(|e| VibeError::AccrualNotApplied {
            user_id: user_id.to_string(),
            points: points.total,
            pending_badge_ids: unrecorded_badge_ids.clone(),
            reason: e.to_string(),
        })?;
        // Other deltas may have landed since the load; only this pair is exact
        let previous_vibrations = vibrations.saturating_sub(points.total);
        let rank_up = self.ranks.detect_rank_up(previous_vibrations, vibrations).cloned();

        info!(
            user_id,
            %measurement_id,
            vibe_score = result.vibe_score,
            points = points.total,
            vibrations,
            rank_up = rank_up.as_ref().map(|r| r.name.as_str()),
            badges = new_badges.len(),
            "measurement accrued"
        );

        Ok(AccrualOutcome {
            measurement_id,
            points,
            previous_vibrations,
            vibrations,
            rank: self.ranks.current_rank(vibrations).clone(),
            celebration: rank_up.as_ref().map(LevelUpCelebration::for_rank),
            rank_up,
            new_badges,
            unrecorded_badge_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::LocationType;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    fn result(vibe_score: u8, comfort_rating: u8, created_at: DateTime<Utc>) -> MeasurementResult {
        MeasurementResult {
            sound_db: 50.0,
            light_lux: 400.0,
            stability_percent: 90.0,
            sound_score: vibe_score,
            light_score: vibe_score,
            stability_score: vibe_score,
            vibe_score,
            comfort_rating,
            frequency_data: Vec::new(),
            duration_seconds: 17,
            sample_count: 170,
            created_at,
        }
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, day, 12, 0, 0).unwrap()
    }

    /// Store whose writes can fail or race with another writer
    struct FlakyStore {
        inner: InMemoryStore,
        fail_accrual: AtomicBool,
        fail_badges: AtomicBool,
        /// Applied just before the next accrual, as if from another source
        concurrent_delta: AtomicU64,
    }

    impl FlakyStore {
        fn new(state: UserAccrualState) -> Self {
            Self {
                inner: InMemoryStore::with_users([state]),
                fail_accrual: AtomicBool::new(false),
                fail_badges: AtomicBool::new(false),
                concurrent_delta: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl AccrualStore for FlakyStore {
        async fn load_user_state(&self, user_id: &str) -> Result<UserAccrualState, VibeError> {
            self.inner.load_user_state(user_id).await
        }

        async fn save_measurement(
            &self,
            record: &crate::encoder::MeasurementRecord,
            streak_days: u32,
        ) -> Result<Uuid, VibeError> {
            self.inner.save_measurement(record, streak_days).await
        }

        async fn apply_accrual(&self, user_id: &str, points: u64) -> Result<u64, VibeError> {
            if self.fail_accrual.load(Ordering::SeqCst) {
                return Err(VibeError::Storage("connection reset".to_string()));
            }
            let concurrent = self.concurrent_delta.swap(0, Ordering::SeqCst);
            if concurrent > 0 {
                self.inner.apply_accrual(user_id, concurrent).await?;
            }
            self.inner.apply_accrual(user_id, points).await
        }

        async fn record_badges(&self, user_id: &str, badge_ids: &[String]) -> Result<(), VibeError> {
            if self.fail_badges.load(Ordering::SeqCst) {
                return Err(VibeError::Storage("timeout".to_string()));
            }
            self.inner.record_badges(user_id, badge_ids).await
        }
    }

    #[test]
    fn test_evaluate_accrual_is_pure() {
        let mut state = UserAccrualState::new("u1");
        state.vibrations = 90;
        let context = AccrualContext {
            is_first_today: true,
            is_new_location: false,
        };

        let delta = evaluate_accrual(
            &state,
            &result(50, 5, noon(1)),
            &context,
            0,
            RankCatalog::standard(),
            BadgeCatalog::standard(),
        );
        assert_eq!(delta.points.total, 15);
        assert_eq!(delta.vibrations_before, 90);
        assert_eq!(delta.vibrations_after, 105);
        assert_eq!(delta.rank_up.map(|r| r.name), Some("Sensor".to_string()));
        assert_eq!(delta.new_badges.len(), 1);
        assert_eq!(delta.new_badges[0].id, "first_vibe");
        assert_eq!(state.vibrations, 90);
    }

    #[tokio::test]
    async fn test_first_measurement() {
        let processor = ResonanceProcessor::new(InMemoryStore::with_users([UserAccrualState::new("u1")]));
        let target = MeasurementTarget::new("u1");

        let outcome = processor.record(&target, &result(95, 10, noon(1)), true).await.unwrap();

        // (10+5+10) * 1.1 + 5 + 15 = 47.5 -> 48
        assert_eq!(outcome.points.total, 48);
        assert_eq!(outcome.previous_vibrations, 0);
        assert_eq!(outcome.vibrations, 48);
        assert_eq!(outcome.rank.name, "Listener");
        assert_eq!(outcome.rank_up, None);
        let ids: Vec<&str> = outcome.new_badges.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["first_vibe", "perfect_10"]);
        assert!(outcome.unrecorded_badge_ids.is_empty());

        let state = processor.store().load_user_state("u1").await.unwrap();
        assert_eq!(state.vibrations, 48);
        assert!(state.has_badge("first_vibe"));
        assert!(state.has_badge("perfect_10"));
    }

    #[tokio::test]
    async fn test_second_measurement_same_day() {
        let processor = ResonanceProcessor::new(InMemoryStore::with_users([UserAccrualState::new("u1")]));
        let target = MeasurementTarget::new("u1").at_location("cafe-1", LocationType::Cafe);

        processor.record(&target, &result(50, 5, noon(1)), false).await.unwrap();
        let later = noon(1) + chrono::Duration::hours(2);
        let outcome = processor.record(&target, &result(50, 5, later), false).await.unwrap();

        // streak 1 keeps 1.1x, no daily bonus: 10 * 1.1 = 11
        assert_eq!(outcome.points.daily_bonus, 0);
        assert_eq!(outcome.points.total, 11);
        assert!(outcome.new_badges.is_empty());
    }

    #[tokio::test]
    async fn test_rank_up_with_celebration() {
        let mut state = UserAccrualState::new("u1");
        state.vibrations = 90;
        state.total_measurements = 4;
        let processor = ResonanceProcessor::new(InMemoryStore::with_users([state]));
        let context = AccrualContext::default();

        let outcome = processor
            .record_with_context(&MeasurementTarget::new("u1"), &result(50, 5, noon(2)), &context, 0)
            .await
            .unwrap();

        assert_eq!(outcome.vibrations, 100);
        assert_eq!(outcome.rank_up.as_ref().map(|r| r.name.as_str()), Some("Sensor"));
        assert_eq!(outcome.celebration.unwrap().colors[0], "#3B82F6");
    }

    #[tokio::test]
    async fn test_rank_up_uses_atomic_total() {
        let mut state = UserAccrualState::new("u1");
        state.vibrations = 80;
        let store = FlakyStore::new(state);
        store.concurrent_delta.store(15, Ordering::SeqCst);
        let processor = ResonanceProcessor::new(store);

        let outcome = processor
            .record_with_context(
                &MeasurementTarget::new("u1"),
                &result(50, 5, noon(3)),
                &AccrualContext::default(),
                0,
            )
            .await
            .unwrap();
        // 80 loaded, 95 after the concurrent award, 105 after this measurement
        assert_eq!(outcome.previous_vibrations, 95);
        assert_eq!(outcome.vibrations, 105);
        assert_eq!(outcome.rank_up.map(|r| r.name), Some("Sensor".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_user_saves_nothing() {
        let processor = ResonanceProcessor::new(InMemoryStore::new());
        let err = processor
            .record(&MeasurementTarget::new("ghost"), &result(50, 5, noon(1)), false)
            .await
            .unwrap_err();
        assert!(matches!(err, VibeError::UnknownUser(_)));
        assert!(processor.store().snapshot().await.measurements.is_empty());
    }

    #[tokio::test]
    async fn test_failed_accrual_reports_delta() {
        let store = FlakyStore::new(UserAccrualState::new("u1"));
        store.fail_accrual.store(true, Ordering::SeqCst);
        let processor = ResonanceProcessor::new(store);

        let err = processor
            .record_with_context(
                &MeasurementTarget::new("u1"),
                &result(95, 10, noon(1)),
                &AccrualContext::default(),
                0,
            )
            .await
            .unwrap_err();

        let (user_id, points, pending) = match err {
            VibeError::AccrualNotApplied {
                user_id,
                points,
                pending_badge_ids,
                ..
            } => (user_id, points, pending_badge_ids),
            other => panic!("expected AccrualNotApplied, got {other:?}"),
        };
        assert_eq!(user_id, "u1");
        assert_eq!(points, 25);
        assert!(pending.is_empty());
        let state = processor.store().inner.load_user_state("u1").await.unwrap();
        assert_eq!(state.vibrations, 0);
        // badges earned by the measurement are kept even though the points are not
        assert!(state.has_badge("first_vibe"));
        assert!(state.has_badge("perfect_10"));

        processor.store().fail_accrual.store(false, Ordering::SeqCst);
        let (total, rank_up) = processor.apply_pending(&user_id, points, &pending).await.unwrap();
        assert_eq!(total, 25);
        assert_eq!(rank_up, None);
    }

    #[tokio::test]
    async fn test_failed_accrual_and_badge_write_retried_together() {
        let store = FlakyStore::new(UserAccrualState::new("u1"));
        store.fail_accrual.store(true, Ordering::SeqCst);
        store.fail_badges.store(true, Ordering::SeqCst);
        let processor = ResonanceProcessor::new(store);
        let target = MeasurementTarget::new("u1");

        let err = processor
            .record(&target, &result(95, 10, noon(1)), false)
            .await
            .unwrap_err();
        let (points, pending) = match err {
            VibeError::AccrualNotApplied {
                points,
                pending_badge_ids,
                ..
            } => (points, pending_badge_ids),
            other => panic!("expected AccrualNotApplied, got {other:?}"),
        };
        assert_eq!(pending, vec!["first_vibe".to_string(), "perfect_10".to_string()]);

        processor.store().fail_accrual.store(false, Ordering::SeqCst);
        processor.store().fail_badges.store(false, Ordering::SeqCst);
        let (total, _) = processor.apply_pending("u1", points, &pending).await.unwrap();
        assert_eq!(total, points);

        // a later measurement must not re-award or lose the retried badges
        let next = processor
            .record(&target, &result(95, 10, noon(1) + chrono::Duration::hours(1)), false)
            .await
            .unwrap();
        assert!(next.new_badges.is_empty());
        let state = processor.store().load_user_state("u1").await.unwrap();
        assert!(state.has_badge("first_vibe"));
        assert!(state.has_badge("perfect_10"));
        assert_eq!(state.vibrations, points + next.points.total);
    }

    #[tokio::test]
    async fn test_pending_badges_block_points_until_recorded() {
        let store = FlakyStore::new(UserAccrualState::new("u1"));
        store.fail_badges.store(true, Ordering::SeqCst);
        let processor = ResonanceProcessor::new(store);

        let err = processor
            .apply_pending("u1", 30, &["first_vibe".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, VibeError::Storage(_)));
        assert_eq!(processor.store().inner.load_user_state("u1").await.unwrap().vibrations, 0);
    }

    #[tokio::test]
    async fn test_stored_streak_matches_caller_streak() {
        let mut state = UserAccrualState::new("u1");
        state.last_measured_at = Some(noon(1));
        state.streak_days = 2;
        state.total_measurements = 5;
        let processor = ResonanceProcessor::new(InMemoryStore::with_users([state]));

        // caller-supplied streak wins over the day gap
        let outcome = processor
            .record_with_context(
                &MeasurementTarget::new("u1"),
                &result(50, 5, noon(5)),
                &AccrualContext::default(),
                3,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = outcome.new_badges.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["streak_3"]);
        assert_eq!(processor.store().load_user_state("u1").await.unwrap().streak_days, 3);
    }

    #[tokio::test]
    async fn test_failed_badge_write_is_reported() {
        let store = FlakyStore::new(UserAccrualState::new("u1"));
        store.fail_badges.store(true, Ordering::SeqCst);
        let processor = ResonanceProcessor::new(store);

        let outcome = processor
            .record(&MeasurementTarget::new("u1"), &result(50, 5, noon(1)), false)
            .await
            .unwrap();
        assert_eq!(outcome.unrecorded_badge_ids, vec!["first_vibe".to_string()]);
        assert_eq!(outcome.vibrations, outcome.points.total);
    }

    #[tokio::test]
    async fn test_cafe_hunter_on_tenth_cafe() {
        let mut state = UserAccrualState::new("u1");
        state.cafes_rated = 9;
        state.total_measurements = 30;
        let processor = ResonanceProcessor::new(InMemoryStore::with_users([state]));

        let target = MeasurementTarget::new("u1").at_location("cafe-10", LocationType::Cafe);
        let outcome = processor.record(&target, &result(60, 6, noon(5)), false).await.unwrap();
        let ids: Vec<&str> = outcome.new_badges.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["cafe_hunter"]);
    }
}
