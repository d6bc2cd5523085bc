use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use warden_core::models::{
    AlertRecord, AlertTarget, Category, FeatureFlag, FlagTier, Outcome, OverrideRecord,
    Severity, Thresholds,
};
use warden_core::traits::{PersistedRecord, PersistedState, RecordKind, RetentionPolicy};
use warden_storage::retained;

const FLAGS: [&str; 3] = ["keyword_detection", "anomaly_detection", "auto_moderation"];
const CATEGORIES: [Category; 2] = [Category::Critical, Category::LowRisk];

fn arb_record() -> impl Strategy<Value = PersistedRecord> {
    let at = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
    prop_oneof![
        (0usize..3, any::<bool>()).prop_map(|(i, enabled)| {
            PersistedRecord::Flag(FeatureFlag::new(FLAGS[i], FlagTier::Advanced, enabled))
        }),
        any::<bool>().prop_map(move |enabled| PersistedRecord::SafeMode { enabled, at }),
        (0usize..2, 0.0f64..=1.0).prop_map(move |(i, min_confidence)| {
            PersistedRecord::Threshold {
                category: CATEGORIES[i],
                thresholds: Thresholds {
                    min_confidence,
                    ..Thresholds::default_for(CATEGORIES[i])
                },
                at,
            }
        }),
        (0u32..1000, 0i64..30).prop_map(move |(n, days)| {
            PersistedRecord::Override(OverrideRecord {
                id: format!("ovr-{n}"),
                decision_id: format!("dec-{n}"),
                source: "scanner".into(),
                automated_outcome: Outcome::Abstain,
                human_outcome: Outcome::Act,
                reviewer_id: "mod-1".into(),
                reason: "confirmed".into(),
                timestamp: at - Duration::days(days),
            })
        }),
        (0u32..4, 0u32..5).prop_map(move |(n, escalations)| {
            let mut alert = AlertRecord::new(
                format!("alr-{n}"),
                AlertTarget::Decision(format!("dec-{n}")),
                Severity::Critical,
                at,
            );
            alert.escalation_count = escalations;
            PersistedRecord::Alert(alert)
        }),
    ]
}

fn kept(records: &[PersistedRecord], policy: &RetentionPolicy) -> Vec<PersistedRecord> {
    let now = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
    records
        .iter()
        .zip(retained(records, policy, now))
        .filter(|(_, keep)| *keep)
        .map(|(r, _)| r.clone())
        .collect()
}

fn sorted_alerts(state: &PersistedState) -> Vec<AlertRecord> {
    let mut alerts = state.alerts.clone();
    alerts.sort_by(|a, b| a.id.cmp(&b.id));
    alerts
}

proptest! {
    #[test]
    fn unbounded_retention_preserves_replayed_state(
        records in prop::collection::vec(arb_record(), 0..80),
    ) {
        let policy = RetentionPolicy { max_records_per_kind: None, max_age_days: None };
        let full = PersistedState::replay(records.clone());
        let compacted = PersistedState::replay(kept(&records, &policy));

        prop_assert_eq!(&compacted.flags, &full.flags);
        prop_assert_eq!(compacted.safe_mode, full.safe_mode);
        prop_assert_eq!(&compacted.thresholds, &full.thresholds);
        prop_assert_eq!(&compacted.overrides, &full.overrides);
        prop_assert_eq!(sorted_alerts(&compacted), sorted_alerts(&full));
    }

    #[test]
    fn bounded_retention_never_drops_state(
        records in prop::collection::vec(arb_record(), 0..80),
        max in 0usize..10,
        max_age_days in 0i64..40,
    ) {
        let policy = RetentionPolicy {
            max_records_per_kind: Some(max),
            max_age_days: Some(max_age_days),
        };
        let survivors = kept(&records, &policy);
        let full = PersistedState::replay(records.clone());
        let compacted = PersistedState::replay(survivors.clone());

        prop_assert_eq!(&compacted.flags, &full.flags);
        prop_assert_eq!(compacted.safe_mode, full.safe_mode);
        prop_assert_eq!(&compacted.thresholds, &full.thresholds);
        for kind in [RecordKind::Override, RecordKind::Alert] {
            prop_assert!(survivors.iter().filter(|r| r.kind() == kind).count() <= max);
        }
    }
}
