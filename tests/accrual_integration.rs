//! End-to-end: simulated run → analysis → accrual through the in-memory store

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use vibe_flux::encoder::MeasurementTarget;
use vibe_flux::resonance::calendar::local_date;
use vibe_flux::session::NoopObserver;
use vibe_flux::{
    AccrualStore, InMemoryStore, LocationType, MeasurementConfig, ResonanceProcessor,
    SimulatedSource, UserAccrualState, VibeAnalyzer, VibeError,
};

#[tokio::test(start_paused = true)]
async fn test_measure_then_accrue() {
    let analyzer = VibeAnalyzer::new();
    let run = analyzer
        .start_with_source(MeasurementConfig::default(), Box::new(SimulatedSource::seeded(17)))
        .unwrap()
        .for_location(LocationType::Cafe)
        .with_observer(Box::new(NoopObserver));
    let result = run.execute().await.unwrap().expect("run was not stopped");
    assert!(!analyzer.is_active());
    assert_eq!(result.sample_count, 170);

    let processor = ResonanceProcessor::new(InMemoryStore::with_users([UserAccrualState::new("ada")]));
    let target = MeasurementTarget::new("ada")
        .at_location("cafe-1", LocationType::Cafe)
        .in_city("Lisbon");
    let outcome = processor.record(&target, &result, true).await.unwrap();

    // first measurement ever: daily and new-location bonuses, streak of 1
    assert_eq!(outcome.points.daily_bonus, 5);
    assert_eq!(outcome.points.new_location_bonus, 15);
    assert_eq!(outcome.points.multiplier_tenths, 11);
    assert!(outcome.new_badges.iter().any(|b| b.id == "first_vibe"));

    let state = processor.store().load_user_state("ada").await.unwrap();
    assert_eq!(state.vibrations, outcome.vibrations);
    assert_eq!(state.total_measurements, 1);
    assert_eq!(state.cafes_rated, 1);
    assert_eq!(state.cities_rated, 1);
    assert!(state.has_badge("first_vibe"));
}

#[tokio::test(start_paused = true)]
async fn test_week_of_measurements_builds_streak_and_rank() {
    let processor = ResonanceProcessor::new(InMemoryStore::with_users([
        UserAccrualState::new("bo").with_utc_offset(60)
    ]));
    let analyzer = VibeAnalyzer::new();
    let start = Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap();

    let mut earned = Vec::new();
    let mut rank_ups = Vec::new();
    for day in 0..7u32 {
        let run = analyzer
            .start_with_source(
                MeasurementConfig::with_duration(5),
                Box::new(SimulatedSource::seeded(u64::from(day))),
            )
            .unwrap();
        let mut result = run.execute().await.unwrap().unwrap();
        result.created_at = start + Duration::days(i64::from(day));

        let target = MeasurementTarget::new("bo").at_location(format!("loc-{day}"), LocationType::Office);
        let outcome = processor.record(&target, &result, true).await.unwrap();
        earned.extend(outcome.new_badges.into_iter().map(|b| b.id));
        rank_ups.extend(outcome.rank_up.map(|r| r.name));
    }

    let state = processor.store().load_user_state("bo").await.unwrap();
    assert_eq!(state.streak_days, 7);
    assert_eq!(state.total_measurements, 7);
    assert_eq!(
        local_date(state.last_measured_at.unwrap(), 60),
        (start + Duration::days(6)).date_naive()
    );
    for id in ["first_vibe", "streak_3", "streak_7"] {
        assert!(earned.iter().any(|e| e == id), "missing {id}");
    }
    // each day earns at least (10 * multiplier) + 5 + 15, so Sensor is passed early
    assert!(state.vibrations >= 7 * 31);
    assert_eq!(rank_ups.first().map(String::as_str), Some("Sensor"));
    // no badge is awarded twice
    let mut deduped = earned.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), earned.len());
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let processor = ResonanceProcessor::new(InMemoryStore::new());
    let result = vibe_flux::analyze(
        &[vibe_flux::Sample {
            timestamp: 0,
            sound: 50.0,
            light: 400.0,
            motion: Default::default(),
        }],
        5,
    )
    .unwrap();
    let err = processor
        .record(&MeasurementTarget::new("nobody"), &result, false)
        .await
        .unwrap_err();
    assert!(matches!(err, VibeError::UnknownUser(_)));
}
