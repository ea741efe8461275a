//! Property-based tests for the scoring and allocation invariants:
//! - the update rule keeps scores inside [0, 1] and is monotone for
//!   correct answers
//! - the classifier is total (every input maps to exactly one tag)
//! - time allocation sums exactly to the requested total and floors every
//!   non-last block at the minimum

use proptest::prelude::*;

use medprep_backend::services::mastery_engine::{
    apply_answer, classify_priority, review_priority, MasteryParams, ReviewPriority,
};
use medprep_backend::services::planner::{allocate_time, split_review_practice, MIN_BLOCK_MINUTES};

fn arb_score() -> impl Strategy<Value = f64> {
    (0u64..=10_000u64).prop_map(|v| v as f64 / 10_000.0)
}

fn arb_days() -> impl Strategy<Value = Option<i64>> {
    proptest::option::of(0i64..=3650)
}

fn arb_priority() -> impl Strategy<Value = ReviewPriority> {
    prop_oneof![
        Just(ReviewPriority::High),
        Just(ReviewPriority::Medium),
        Just(ReviewPriority::Low),
    ]
}

proptest! {
    #[test]
    fn correct_update_stays_in_unit_interval_and_grows(score in arb_score()) {
        let params = MasteryParams::default();
        let updated = apply_answer(score, true, &params);

        prop_assert!(updated >= score);
        prop_assert!(updated <= 1.0);
        if score < 1.0 {
            prop_assert!(updated > score);
        }
    }

    #[test]
    fn incorrect_update_is_exact_flat_penalty(score in arb_score()) {
        let params = MasteryParams::default();
        let updated = apply_answer(score, false, &params);

        prop_assert!(updated >= 0.0);
        prop_assert!((updated - (score - params.incorrect_decrement).max(0.0)).abs() < 1e-12);
    }

    #[test]
    fn classifier_is_total_and_pure(score in arb_score(), days in arb_days()) {
        let params = MasteryParams::default();
        let first = classify_priority(score, days, &params);
        let second = classify_priority(score, days, &params);

        prop_assert_eq!(first, second);
        prop_assert!(matches!(
            first,
            ReviewPriority::High | ReviewPriority::Medium | ReviewPriority::Low
        ));
    }

    #[test]
    fn composite_priority_is_bounded(score in arb_score(), days in arb_days()) {
        let priority = review_priority(score, days);
        prop_assert!((0.0..=150.0).contains(&priority));
    }

    #[test]
    fn allocation_sum_is_exact(
        priorities in proptest::collection::vec(arb_priority(), 1..=8),
        total in 30i64..=300,
    ) {
        let allocations = allocate_time(&priorities, total);

        prop_assert_eq!(allocations.len(), priorities.len());
        prop_assert_eq!(allocations.iter().sum::<i64>(), total);

        for allocated in &allocations[..allocations.len() - 1] {
            prop_assert!(*allocated >= MIN_BLOCK_MINUTES);
        }
    }

    #[test]
    fn review_practice_split_partitions_the_block(
        score in arb_score(),
        minutes in 20i64..=120,
    ) {
        let (review, practice) = split_review_practice(score, minutes);
        prop_assert_eq!(review + practice, minutes);
        prop_assert!(review >= 0);
        prop_assert!(practice >= 0);
    }
}
