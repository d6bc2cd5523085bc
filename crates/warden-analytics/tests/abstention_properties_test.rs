use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use warden_analytics::{abstention_trends, TimeBucket};
use warden_core::models::{Category, Decision, Outcome, SignalType, Thresholds};

fn decision(minutes: i64, category: Category, outcome: Outcome) -> Decision {
    Decision {
        id: format!("dec-{minutes}"),
        signal_id: format!("sig-{minutes}"),
        source: "s".into(),
        signal_type: SignalType::AnomalyDetected,
        category,
        confidence_snapshot: 0.5,
        uncertainty: 0.5,
        sample_count: 1,
        disagreement_rate: 0.0,
        threshold_snapshot: Thresholds::default_for(category),
        outcome,
        reasons: Vec::new(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
    }
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    (
        0i64..(3 * 24 * 60),
        prop_oneof![
            Just(Category::Critical),
            Just(Category::Security),
            Just(Category::Moderation),
            Just(Category::LowRisk),
        ],
        prop_oneof![Just(Outcome::Act), Just(Outcome::Abstain)],
    )
        .prop_map(|(minutes, category, outcome)| decision(minutes, category, outcome))
}

proptest! {
    #[test]
    fn bucket_and_category_totals_agree(
        decisions in prop::collection::vec(arb_decision(), 0..200),
        bucket in prop_oneof![Just(TimeBucket::Minute), Just(TimeBucket::Hour), Just(TimeBucket::Day)],
    ) {
        let trends = abstention_trends(&decisions, bucket);
        let bucket_total: u64 = trends.buckets.iter().map(|b| b.acted + b.abstained).sum();
        let category_total: u64 = trends.by_category.values().map(|c| c.total()).sum();
        prop_assert_eq!(bucket_total, decisions.len() as u64);
        prop_assert_eq!(category_total, decisions.len() as u64);
        prop_assert!(trends.buckets.windows(2).all(|w| w[0].start < w[1].start));
        for b in &trends.buckets {
            prop_assert!((0.0..=1.0).contains(&b.abstention_rate));
            prop_assert!(b.acted + b.abstained > 0);
        }
    }
}
