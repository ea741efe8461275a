use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::services::mastery_engine::{MasteryParams, ReviewPriority};

pub const MIN_BLOCK_MINUTES: i64 = 20;
/// Assumed size of one review-plus-practice block when capping how many
/// topics fit a session.
pub const MINUTES_PER_TOPIC: i64 = 35;

const LOW_MASTERY_CUTOFF: f64 = 0.3;
const FOCUS_AREA_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRef {
    pub id: String,
    pub name: String,
    pub system_name: Option<String>,
}

/// A topic picked for the session, with the mastery snapshot the planner
/// saw when it was selected.
#[derive(Debug, Clone)]
pub struct PlanCandidate {
    pub topic: TopicRef,
    pub mastery_score: f64,
    pub days_since_review: Option<i64>,
    pub priority: ReviewPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub label: String,
    pub text: String,
}

/// Practice question attached to a block by the enrichment boundary. The
/// planner only guarantees the slot; content comes from outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    pub question_id: String,
    pub stem: String,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyBlock {
    pub topic_id: String,
    pub topic: String,
    pub duration_minutes: i64,
    pub review_minutes: i64,
    pub practice_minutes: i64,
    pub review_material: String,
    pub quiz_questions: Vec<QuizItem>,
    pub quiz_question_count: i64,
    pub current_mastery: f64,
    pub reason: String,
    pub priority: ReviewPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub user_id: String,
    pub duration_minutes: i64,
    pub generated_at: String,
    pub blocks: Vec<StudyBlock>,
    pub total_topics: usize,
    pub total_questions: usize,
    pub average_current_mastery: f64,
    pub focus_areas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How many topics a session of this length can hold, floored at three so
/// short sessions still rotate across weak areas.
pub fn max_candidates(duration_minutes: i64) -> usize {
    (duration_minutes / MINUTES_PER_TOPIC).max(3) as usize
}

/// Proportional time allocation over priority weights.
///
/// Every candidate except the last gets `floor(weight / total_weight * total)`
/// floored at [`MIN_BLOCK_MINUTES`]; the last absorbs whatever is left so
/// the minutes sum to `total_minutes` exactly regardless of rounding.
pub fn allocate_time(priorities: &[ReviewPriority], total_minutes: i64) -> Vec<i64> {
    if priorities.is_empty() {
        return Vec::new();
    }

    let total_weight: f64 = priorities.iter().map(|p| p.weight()).sum();
    let mut allocations = Vec::with_capacity(priorities.len());
    let mut remaining = total_minutes;

    for (i, priority) in priorities.iter().enumerate() {
        if i == priorities.len() - 1 {
            allocations.push(remaining);
        } else {
            let share = (priority.weight() / total_weight) * total_minutes as f64;
            let allocated = (share.floor() as i64).max(MIN_BLOCK_MINUTES);
            allocations.push(allocated);
            remaining -= allocated;
        }
    }

    allocations
}

/// Weaker topics spend more of their block on passive review, stronger
/// ones on active practice.
pub fn split_review_practice(mastery_score: f64, allocated_minutes: i64) -> (i64, i64) {
    let review_fraction = if mastery_score < LOW_MASTERY_CUTOFF {
        0.6
    } else if mastery_score < 0.7 {
        0.5
    } else {
        0.4
    };

    let review = (allocated_minutes as f64 * review_fraction).floor() as i64;
    (review, allocated_minutes - review)
}

/// Roughly two minutes per question, never fewer than three questions.
pub fn suggested_question_count(practice_minutes: i64) -> i64 {
    (practice_minutes / 2).max(3)
}

pub fn recommendation_reason(
    mastery_score: f64,
    days_since_review: Option<i64>,
    params: &MasteryParams,
) -> String {
    let mut reasons: Vec<String> = Vec::new();

    if mastery_score < 0.5 {
        reasons.push("Low mastery - needs foundational review".to_string());
    } else if mastery_score < params.weak_threshold {
        reasons.push("Below target mastery".to_string());
    }

    match days_since_review {
        Some(days) if days > params.spaced_repetition_days => {
            reasons.push(format!("Not reviewed for {days} days - spaced repetition"));
        }
        Some(_) => {}
        None => reasons.push("Never reviewed - new topic".to_string()),
    }

    if reasons.is_empty() {
        "Recommended for review".to_string()
    } else {
        reasons.join(" | ")
    }
}

pub fn build_block(
    candidate: &PlanCandidate,
    allocated_minutes: i64,
    params: &MasteryParams,
) -> StudyBlock {
    let (review_minutes, practice_minutes) =
        split_review_practice(candidate.mastery_score, allocated_minutes);

    StudyBlock {
        topic_id: candidate.topic.id.clone(),
        topic: candidate.topic.name.clone(),
        duration_minutes: allocated_minutes,
        review_minutes,
        practice_minutes,
        review_material: format!(
            "Review {} for {} minutes",
            candidate.topic.name, review_minutes
        ),
        quiz_questions: Vec::new(),
        quiz_question_count: suggested_question_count(practice_minutes),
        current_mastery: round3(candidate.mastery_score),
        reason: recommendation_reason(candidate.mastery_score, candidate.days_since_review, params),
        priority: candidate.priority,
    }
}

pub fn assemble_plan(
    user_id: &str,
    duration_minutes: i64,
    generated_at: DateTime<Utc>,
    blocks: Vec<StudyBlock>,
) -> StudyPlan {
    let total_topics = blocks.len();
    let total_questions = blocks.iter().map(|b| b.quiz_questions.len()).sum();

    let average_current_mastery = if blocks.is_empty() {
        0.0
    } else {
        round3(blocks.iter().map(|b| b.current_mastery).sum::<f64>() / blocks.len() as f64)
    };

    // blocks arrive priority-sorted from selection, so the head of the list
    // is the session's focus
    let focus_areas = blocks
        .iter()
        .take(FOCUS_AREA_COUNT)
        .map(|b| b.topic.clone())
        .collect();

    let message = if blocks.is_empty() {
        Some(
            "No topics available for study. Start by uploading content or taking quizzes."
                .to_string(),
        )
    } else {
        None
    };

    StudyPlan {
        user_id: user_id.to_string(),
        duration_minutes,
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        blocks,
        total_topics,
        total_questions,
        average_current_mastery,
        focus_areas,
        message,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mastery_engine::ReviewPriority::{High, Low, Medium};

    fn candidate(id: &str, score: f64, days: Option<i64>, priority: ReviewPriority) -> PlanCandidate {
        PlanCandidate {
            topic: TopicRef {
                id: id.to_string(),
                name: format!("Topic {id}"),
                system_name: None,
            },
            mastery_score: score,
            days_since_review: days,
            priority,
        }
    }

    #[test]
    fn equal_high_priorities_split_evenly() {
        let allocations = allocate_time(&[High, High, High], 120);
        assert_eq!(allocations, vec![40, 40, 40]);
    }

    #[test]
    fn allocation_sums_to_total() {
        let cases: &[(&[ReviewPriority], i64)] = &[
            (&[High, Medium, Low], 120),
            (&[High, High, Medium, Low, Low], 180),
            (&[Medium], 45),
            (&[Low, Low], 60),
        ];
        for (priorities, total) in cases {
            let allocations = allocate_time(priorities, *total);
            assert_eq!(allocations.iter().sum::<i64>(), *total);
            for allocated in &allocations[..allocations.len() - 1] {
                assert!(*allocated >= MIN_BLOCK_MINUTES);
            }
        }
    }

    #[test]
    fn empty_candidates_allocate_nothing() {
        assert!(allocate_time(&[], 120).is_empty());
    }

    #[test]
    fn high_priority_outweighs_low() {
        let allocations = allocate_time(&[High, Low, Medium], 128);
        assert!(allocations[0] > allocations[1]);
    }

    #[test]
    fn candidate_cap_scales_with_duration() {
        assert_eq!(max_candidates(30), 3);
        assert_eq!(max_candidates(120), 3);
        assert_eq!(max_candidates(180), 5);
        assert_eq!(max_candidates(300), 8);
    }

    #[test]
    fn review_practice_split_follows_mastery_tier() {
        assert_eq!(split_review_practice(0.1, 60), (36, 24));
        assert_eq!(split_review_practice(0.5, 60), (30, 30));
        assert_eq!(split_review_practice(0.8, 60), (24, 36));
    }

    #[test]
    fn question_count_has_floor() {
        assert_eq!(suggested_question_count(2), 3);
        assert_eq!(suggested_question_count(30), 15);
    }

    #[test]
    fn reason_mentions_staleness_and_weakness() {
        let params = MasteryParams::default();

        let reason = recommendation_reason(0.4, Some(10), &params);
        assert!(reason.contains("Low mastery"));
        assert!(reason.contains("10 days"));

        let reason = recommendation_reason(0.6, None, &params);
        assert!(reason.contains("Never reviewed"));

        assert_eq!(
            recommendation_reason(0.9, Some(1), &params),
            "Recommended for review"
        );
    }

    #[test]
    fn block_carries_snapshot_and_counts() {
        let params = MasteryParams::default();
        let block = build_block(&candidate("t1", 0.123456, Some(5), High), 40, &params);

        assert_eq!(block.duration_minutes, 40);
        assert_eq!(block.review_minutes + block.practice_minutes, 40);
        assert_eq!(block.current_mastery, 0.123);
        assert_eq!(block.priority, High);
        assert!(block.quiz_questions.is_empty());
        assert_eq!(
            block.quiz_question_count,
            suggested_question_count(block.practice_minutes)
        );
    }

    #[test]
    fn assembled_plan_aggregates_blocks() {
        let params = MasteryParams::default();
        let blocks = vec![
            build_block(&candidate("a", 0.2, Some(5), High), 60, &params),
            build_block(&candidate("b", 0.4, None, High), 60, &params),
        ];

        let plan = assemble_plan("user-1", 120, Utc::now(), blocks);
        assert_eq!(plan.total_topics, 2);
        assert_eq!(plan.focus_areas, vec!["Topic a", "Topic b"]);
        assert!((plan.average_current_mastery - 0.3).abs() < 1e-9);
        assert!(plan.message.is_none());
    }

    #[test]
    fn empty_plan_explains_itself() {
        let plan = assemble_plan("user-1", 120, Utc::now(), Vec::new());
        assert_eq!(plan.total_topics, 0);
        assert_eq!(plan.average_current_mastery, 0.0);
        assert!(plan.focus_areas.is_empty());
        assert!(plan.message.is_some());
    }
}
