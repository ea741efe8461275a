//! Behavioral tests for the mastery update rule and the review-priority
//! classifier, covering the documented scoring scenarios.

use medprep_backend::services::mastery_engine::{
    apply_answer, classify_priority, rank_for_review, review_priority, MasteryParams,
    ReviewCandidate, ReviewPriority,
};

fn params() -> MasteryParams {
    MasteryParams::default()
}

#[test]
fn default_params_match_documented_algorithm() {
    let p = params();
    assert_eq!(p.initial_score, 0.0);
    assert_eq!(p.correct_increment, 0.10);
    assert_eq!(p.incorrect_decrement, 0.05);
    assert_eq!(p.weak_threshold, 0.70);
    assert_eq!(p.spaced_repetition_days, 2);
}

#[test]
fn first_correct_answer_lands_at_ten_percent() {
    assert!((apply_answer(0.0, true, &params()) - 0.10).abs() < 1e-12);
}

#[test]
fn reward_shrinks_near_the_ceiling() {
    let new_score = apply_answer(0.95, true, &params());
    assert!((new_score - 0.955).abs() < 1e-12);

    // reward at the bottom of the scale beats reward at the top
    let low_gain = apply_answer(0.1, true, &params()) - 0.1;
    let high_gain = apply_answer(0.9, true, &params()) - 0.9;
    assert!(low_gain > high_gain);
}

#[test]
fn incorrect_answer_is_a_flat_penalty() {
    assert!((apply_answer(0.5, false, &params()) - 0.45).abs() < 1e-12);
    assert_eq!(apply_answer(0.05, false, &params()), 0.0);
    assert_eq!(apply_answer(0.0, false, &params()), 0.0);
}

#[test]
fn near_mastery_a_miss_costs_more_than_a_hit_earns() {
    let p = params();
    let gain = apply_answer(0.9, true, &p) - 0.9;
    let loss = 0.9 - apply_answer(0.9, false, &p);
    assert!(loss > gain);
}

#[test]
fn repeated_correct_answers_never_exceed_one() {
    let p = params();
    let mut score = 0.0;
    for _ in 0..1000 {
        score = apply_answer(score, true, &p);
        assert!(score <= 1.0);
    }
    assert!(score > 0.999);
}

#[test]
fn classifier_covers_the_documented_scenarios() {
    let p = params();

    // weak and stale
    assert_eq!(classify_priority(0.5, Some(10), &p), ReviewPriority::High);
    // medium band, stale past a week
    assert_eq!(classify_priority(0.8, Some(10), &p), ReviewPriority::Medium);
    // strong regardless of staleness
    assert_eq!(classify_priority(0.85, Some(100), &p), ReviewPriority::Low);
    assert_eq!(classify_priority(0.97, Some(0), &p), ReviewPriority::Low);
    // weak but just reviewed: catch-all
    assert_eq!(classify_priority(0.5, Some(1), &p), ReviewPriority::Medium);
    // medium band reviewed this week: catch-all
    assert_eq!(classify_priority(0.8, Some(3), &p), ReviewPriority::Medium);
    // never reviewed counts as infinitely stale
    assert_eq!(classify_priority(0.3, None, &p), ReviewPriority::High);
    assert_eq!(classify_priority(0.75, None, &p), ReviewPriority::Medium);
}

#[test]
fn classifier_is_deterministic() {
    let p = params();
    for _ in 0..10 {
        assert_eq!(classify_priority(0.64, Some(4), &p), ReviewPriority::High);
    }
}

#[test]
fn tag_parsing_is_case_insensitive() {
    assert_eq!(ReviewPriority::from_str("high"), ReviewPriority::High);
    assert_eq!(ReviewPriority::from_str("HIGH"), ReviewPriority::High);
    assert_eq!(ReviewPriority::from_str("Low"), ReviewPriority::Low);
    assert_eq!(ReviewPriority::from_str("unknown"), ReviewPriority::Medium);
}

#[test]
fn priority_tags_serialize_as_uppercase() {
    assert_eq!(
        serde_json::to_string(&ReviewPriority::High).unwrap(),
        "\"HIGH\""
    );
    assert_eq!(ReviewPriority::Medium.as_str(), "MEDIUM");
}

#[test]
fn composite_priority_weighs_gap_then_staleness() {
    // untouched topic with zero mastery maxes out
    assert!((review_priority(0.0, None) - 150.0).abs() < 1e-9);
    // staleness bonus saturates at 50 points
    assert_eq!(review_priority(0.4, Some(10)), review_priority(0.4, Some(400)));
    // a big mastery gap beats any amount of staleness
    assert!(review_priority(0.2, Some(0)) > review_priority(0.9, Some(365)));
}

#[test]
fn ranking_is_stable_under_input_permutation() {
    let build = |ids: &[&str]| -> Vec<ReviewCandidate> {
        ids.iter()
            .map(|id| ReviewCandidate {
                topic_id: id.to_string(),
                score: 0.5,
                days_since_review: Some(4),
            })
            .collect()
    };

    let forward = rank_for_review(build(&["a", "b", "c"]), 3);
    let backward = rank_for_review(build(&["c", "b", "a"]), 3);

    let forward_ids: Vec<_> = forward.iter().map(|c| c.topic_id.as_str()).collect();
    let backward_ids: Vec<_> = backward.iter().map(|c| c.topic_id.as_str()).collect();
    assert_eq!(forward_ids, backward_ids);
}
