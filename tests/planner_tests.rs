//! End-to-end exercises of the plan pipeline's pure stages: selection cap,
//! time allocation, block construction, and plan assembly.

use chrono::Utc;

use medprep_backend::services::mastery_engine::{MasteryParams, ReviewPriority};
use medprep_backend::services::planner::{
    allocate_time, assemble_plan, build_block, max_candidates, suggested_question_count,
    PlanCandidate, TopicRef, MIN_BLOCK_MINUTES,
};

fn candidate(id: &str, score: f64, days: Option<i64>, priority: ReviewPriority) -> PlanCandidate {
    PlanCandidate {
        topic: TopicRef {
            id: id.to_string(),
            name: format!("Topic {id}"),
            system_name: Some("Endocrine".to_string()),
        },
        mastery_score: score,
        days_since_review: days,
        priority,
    }
}

#[test]
fn three_equal_high_candidates_split_120_minutes_evenly() {
    let allocations = allocate_time(
        &[ReviewPriority::High, ReviewPriority::High, ReviewPriority::High],
        120,
    );
    assert_eq!(allocations, vec![40, 40, 40]);
}

#[test]
fn allocation_always_sums_to_requested_total() {
    use ReviewPriority::*;
    let mixes: Vec<Vec<ReviewPriority>> = vec![
        vec![High],
        vec![High, Low],
        vec![High, Medium, Low],
        vec![Medium, Medium, Medium, Medium],
        vec![Low, Low, High, High, Medium, Medium],
    ];

    for priorities in &mixes {
        for total in [60, 90, 120, 180, 240, 300] {
            let allocations = allocate_time(priorities, total);
            assert_eq!(
                allocations.iter().sum::<i64>(),
                total,
                "sum broken for {priorities:?} at {total} minutes"
            );
            for allocated in &allocations[..allocations.len() - 1] {
                assert!(*allocated >= MIN_BLOCK_MINUTES);
            }
        }
    }
}

#[test]
fn weaker_priorities_get_less_time() {
    let allocations = allocate_time(
        &[ReviewPriority::High, ReviewPriority::Medium, ReviewPriority::Low],
        160,
    );
    // HIGH share > MEDIUM share; the LOW block is last and absorbs rounding
    assert!(allocations[0] > allocations[1]);
    assert_eq!(allocations.iter().sum::<i64>(), 160);
}

#[test]
fn session_length_caps_topic_count() {
    assert_eq!(max_candidates(60), 3);
    assert_eq!(max_candidates(140), 4);
    assert_eq!(max_candidates(280), 8);
}

#[test]
fn full_pipeline_produces_consistent_plan() {
    let params = MasteryParams::default();
    let candidates = vec![
        candidate("dka", 0.2, None, ReviewPriority::High),
        candidate("chf", 0.55, Some(9), ReviewPriority::High),
        candidate("afib", 0.75, Some(12), ReviewPriority::Medium),
    ];
    let duration = 150;

    let priorities: Vec<_> = candidates.iter().map(|c| c.priority).collect();
    let allocations = allocate_time(&priorities, duration);

    let blocks: Vec<_> = candidates
        .iter()
        .zip(&allocations)
        .map(|(c, minutes)| build_block(c, *minutes, &params))
        .collect();

    let plan = assemble_plan("user-42", duration, Utc::now(), blocks);

    assert_eq!(plan.total_topics, 3);
    assert_eq!(
        plan.blocks.iter().map(|b| b.duration_minutes).sum::<i64>(),
        duration
    );
    assert_eq!(plan.focus_areas.len(), 3);
    assert!(plan.message.is_none());

    for block in &plan.blocks {
        assert_eq!(block.review_minutes + block.practice_minutes, block.duration_minutes);
        assert_eq!(
            block.quiz_question_count,
            suggested_question_count(block.practice_minutes)
        );
        assert!(block.quiz_question_count >= 3);
        assert!((0.0..=1.0).contains(&block.current_mastery));
    }

    // never-reviewed weak topic explains itself
    assert!(plan.blocks[0].reason.contains("Never reviewed"));
    assert!(plan.blocks[0].reason.contains("Low mastery"));
}

#[test]
fn weak_topics_review_more_and_practice_less() {
    let params = MasteryParams::default();
    let weak = build_block(&candidate("a", 0.1, Some(5), ReviewPriority::High), 60, &params);
    let strong = build_block(&candidate("b", 0.8, Some(5), ReviewPriority::Low), 60, &params);

    assert!(weak.review_minutes > weak.practice_minutes);
    assert!(strong.practice_minutes > strong.review_minutes);
}

#[test]
fn empty_selection_yields_explanatory_plan() {
    let plan = assemble_plan("user-42", 120, Utc::now(), Vec::new());

    assert_eq!(plan.total_topics, 0);
    assert_eq!(plan.total_questions, 0);
    assert_eq!(plan.average_current_mastery, 0.0);
    assert!(plan.blocks.is_empty());
    assert!(plan.focus_areas.is_empty());
    assert!(plan
        .message
        .as_deref()
        .is_some_and(|m| m.contains("No topics available")));
}

#[test]
fn plan_serializes_with_camel_case_fields() {
    let params = MasteryParams::default();
    let block = build_block(&candidate("dka", 0.2, None, ReviewPriority::High), 40, &params);
    let plan = assemble_plan("user-42", 40, Utc::now(), vec![block]);

    let json = serde_json::to_value(&plan).unwrap();
    assert!(json.get("totalTopics").is_some());
    assert!(json.get("averageCurrentMastery").is_some());
    assert_eq!(json["blocks"][0]["priority"], "HIGH");
    assert!(json.get("message").is_none());
}
