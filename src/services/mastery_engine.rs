use serde::{Deserialize, Serialize};

const STRONG_THRESHOLD: f64 = 0.85;
const MEDIUM_STALE_DAYS: i64 = 7;
const RECENCY_POINTS_PER_DAY: f64 = 5.0;
const RECENCY_POINTS_CAP: f64 = 50.0;

/// Tunable knobs of the mastery update rule. Defaults match the documented
/// algorithm; every value can be overridden from the environment.
#[derive(Debug, Clone, Copy)]
pub struct MasteryParams {
    pub initial_score: f64,
    pub correct_increment: f64,
    pub incorrect_decrement: f64,
    pub weak_threshold: f64,
    pub spaced_repetition_days: i64,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            initial_score: 0.0,
            correct_increment: 0.10,
            incorrect_decrement: 0.05,
            weak_threshold: 0.70,
            spaced_repetition_days: 2,
        }
    }
}

impl MasteryParams {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_score: env_f64("MASTERY_INITIAL_SCORE").unwrap_or(defaults.initial_score),
            correct_increment: env_f64("MASTERY_CORRECT_INCREMENT")
                .unwrap_or(defaults.correct_increment),
            incorrect_decrement: env_f64("MASTERY_INCORRECT_DECREMENT")
                .unwrap_or(defaults.incorrect_decrement),
            weak_threshold: env_f64("MASTERY_WEAK_THRESHOLD").unwrap_or(defaults.weak_threshold),
            spaced_repetition_days: env_i64("SPACED_REPETITION_THRESHOLD_DAYS")
                .unwrap_or(defaults.spaced_repetition_days),
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewPriority {
    High,
    Medium,
    Low,
}

impl ReviewPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "HIGH" => Self::High,
            "LOW" => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Relative share of study time this tag earns during allocation.
    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 1.5,
            Self::Medium => 1.0,
            Self::Low => 0.7,
        }
    }
}

/// One quiz answer folded into a mastery score.
///
/// A correct answer approaches 1.0 asymptotically, so the reward shrinks as
/// mastery nears perfect. An incorrect answer is a flat penalty: near the
/// top of the scale a miss costs more than a hit earns.
pub fn apply_answer(score: f64, correct: bool, params: &MasteryParams) -> f64 {
    if correct {
        let increment = params.correct_increment * (1.0 - score);
        (score + increment).min(1.0)
    } else {
        (score - params.incorrect_decrement).max(0.0)
    }
}

/// Coarse review urgency. `days_since_review` is `None` for a topic that
/// has never been reviewed, which counts as infinitely stale.
///
/// Total over its inputs: anything that is neither urgent, comfortably
/// scheduled, nor mastered lands on MEDIUM so no topic is ever dropped.
pub fn classify_priority(
    score: f64,
    days_since_review: Option<i64>,
    params: &MasteryParams,
) -> ReviewPriority {
    let stale_beyond = |threshold: i64| days_since_review.map_or(true, |days| days > threshold);

    if score < params.weak_threshold && stale_beyond(params.spaced_repetition_days) {
        return ReviewPriority::High;
    }

    if score >= params.weak_threshold && score < STRONG_THRESHOLD && stale_beyond(MEDIUM_STALE_DAYS)
    {
        return ReviewPriority::Medium;
    }

    if score >= STRONG_THRESHOLD {
        return ReviewPriority::Low;
    }

    ReviewPriority::Medium
}

/// Composite ranking score for review ordering: the mastery gap dominates,
/// staleness adds up to 50 bonus points. Never-reviewed topics take the
/// full bonus.
pub fn review_priority(score: f64, days_since_review: Option<i64>) -> f64 {
    let gap_points = (1.0 - score) * 100.0;
    let recency_points = match days_since_review {
        Some(days) => ((days as f64) * RECENCY_POINTS_PER_DAY).min(RECENCY_POINTS_CAP),
        None => RECENCY_POINTS_CAP,
    };
    gap_points + recency_points
}

#[derive(Debug, Clone)]
pub struct ReviewCandidate {
    pub topic_id: String,
    pub score: f64,
    pub days_since_review: Option<i64>,
}

/// Order candidates by composite review priority, highest first, and keep
/// the top `limit`. Equal priorities tie-break on topic id so the result
/// does not depend on input order.
pub fn rank_for_review(mut candidates: Vec<ReviewCandidate>, limit: usize) -> Vec<ReviewCandidate> {
    candidates.sort_by(|a, b| {
        let pa = review_priority(a.score, a.days_since_review);
        let pb = review_priority(b.score, b.days_since_review);
        pb.partial_cmp(&pa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.topic_id.cmp(&b.topic_id))
    });
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MasteryParams {
        MasteryParams::default()
    }

    #[test]
    fn correct_answer_from_zero() {
        let new_score = apply_answer(0.0, true, &params());
        assert!((new_score - 0.10).abs() < 1e-9);
    }

    #[test]
    fn correct_answer_near_ceiling() {
        let new_score = apply_answer(0.95, true, &params());
        assert!((new_score - 0.955).abs() < 1e-9);
        assert!(new_score < 1.0);
    }

    #[test]
    fn correct_answer_at_ceiling_stays_put() {
        assert_eq!(apply_answer(1.0, true, &params()), 1.0);
    }

    #[test]
    fn incorrect_answer_clamps_at_zero() {
        let new_score = apply_answer(0.05, false, &params());
        assert_eq!(new_score, 0.0);
        assert_eq!(apply_answer(0.0, false, &params()), 0.0);
    }

    #[test]
    fn correct_answer_monotone_over_range() {
        let mut score = 0.0;
        for _ in 0..200 {
            let next = apply_answer(score, true, &params());
            assert!(next >= score);
            assert!(next <= 1.0);
            score = next;
        }
    }

    #[test]
    fn weak_stale_topic_is_high() {
        assert_eq!(
            classify_priority(0.5, Some(10), &params()),
            ReviewPriority::High
        );
    }

    #[test]
    fn medium_mastery_stale_topic_is_medium() {
        assert_eq!(
            classify_priority(0.8, Some(10), &params()),
            ReviewPriority::Medium
        );
    }

    #[test]
    fn strong_topic_is_low_even_when_stale() {
        assert_eq!(
            classify_priority(0.9, Some(30), &params()),
            ReviewPriority::Low
        );
        assert_eq!(classify_priority(0.9, None, &params()), ReviewPriority::Low);
    }

    #[test]
    fn recently_reviewed_weak_topic_falls_back_to_medium() {
        assert_eq!(
            classify_priority(0.5, Some(1), &params()),
            ReviewPriority::Medium
        );
    }

    #[test]
    fn never_reviewed_weak_topic_is_high() {
        assert_eq!(classify_priority(0.2, None, &params()), ReviewPriority::High);
    }

    #[test]
    fn review_priority_caps_recency_bonus() {
        assert!((review_priority(0.0, Some(100)) - 150.0).abs() < 1e-9);
        assert!((review_priority(0.0, None) - 150.0).abs() < 1e-9);
        assert!((review_priority(1.0, Some(0)) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_orders_by_priority_then_topic_id() {
        let candidates = vec![
            ReviewCandidate {
                topic_id: "b".into(),
                score: 0.5,
                days_since_review: Some(3),
            },
            ReviewCandidate {
                topic_id: "a".into(),
                score: 0.5,
                days_since_review: Some(3),
            },
            ReviewCandidate {
                topic_id: "c".into(),
                score: 0.1,
                days_since_review: None,
            },
        ];

        let ranked = rank_for_review(candidates, 10);
        assert_eq!(ranked[0].topic_id, "c");
        assert_eq!(ranked[1].topic_id, "a");
        assert_eq!(ranked[2].topic_id, "b");
    }

    #[test]
    fn ranking_respects_limit() {
        let candidates = (0..20)
            .map(|i| ReviewCandidate {
                topic_id: format!("t{i:02}"),
                score: 0.5,
                days_since_review: Some(i),
            })
            .collect();
        assert_eq!(rank_for_review(candidates, 10).len(), 10);
    }
}
