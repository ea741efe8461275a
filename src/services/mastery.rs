use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::operations::mastery::{self as mastery_ops, MasteryRecord};
use crate::db::operations::{answers, topics, users};
use crate::services::mastery_engine::{self, MasteryParams, ReviewCandidate};

const DASHBOARD_LIST_LIMIT: usize = 10;
const RECENT_ACTIVITY_LIMIT: usize = 10;
const ACCURACY_ANSWER_WINDOW: i64 = 200;

#[derive(Debug, Error)]
pub enum MasteryError {
    #[error("user not found")]
    UserNotFound,
    #[error("topic not found")]
    TopicNotFound,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

pub fn days_since(timestamp: NaiveDateTime) -> i64 {
    (Utc::now().naive_utc() - timestamp).num_days()
}

fn format_naive_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fold one graded quiz answer into the user's mastery record. The pure
/// transition lives in `mastery_engine`; this applies it and persists the
/// result through the idempotent upsert.
pub async fn update_mastery_from_quiz(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
    correct: bool,
    params: &MasteryParams,
) -> Result<MasteryRecord, MasteryError> {
    let mut record =
        mastery_ops::get_or_create_mastery(pool, user_id, topic_id, params.initial_score).await?;

    let old_score = record.score;
    let now = Utc::now().naive_utc();

    record.score = mastery_engine::apply_answer(record.score, correct, params);
    record.last_reviewed_at = Some(now);
    record.review_count += 1;
    record.updated_at = now;

    mastery_ops::persist(pool, &record).await?;

    tracing::info!(
        user_id,
        topic_id,
        old_score = format!("{old_score:.3}").as_str(),
        new_score = format!("{:.3}", record.score).as_str(),
        correct,
        "mastery updated"
    );

    Ok(record)
}

/// Records most in need of review, ranked by the composite priority score.
pub async fn weak_topics_for_review(
    pool: &PgPool,
    user_id: &str,
    limit: usize,
) -> Result<Vec<MasteryRecord>, sqlx::Error> {
    let records = mastery_ops::list_for_user(pool, user_id).await?;

    let candidates = records
        .iter()
        .map(|record| ReviewCandidate {
            topic_id: record.topic_id.clone(),
            score: record.score,
            days_since_review: record.last_reviewed_at.map(days_since),
        })
        .collect();

    let ranked = mastery_engine::rank_for_review(candidates, limit);

    let ordered = ranked
        .into_iter()
        .filter_map(|candidate| {
            records
                .iter()
                .find(|record| record.topic_id == candidate.topic_id)
                .cloned()
        })
        .collect();

    Ok(ordered)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryScoreDto {
    pub topic_id: String,
    pub topic_name: String,
    pub system_name: Option<String>,
    pub mastery_score: f64,
    pub last_reviewed_at: Option<String>,
    pub review_count: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMasteryDto {
    pub system_name: String,
    pub count: usize,
    pub average_mastery: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryDashboard {
    pub user_id: String,
    pub overall_mastery: f64,
    pub total_topics: usize,
    pub strong_topics: Vec<MasteryScoreDto>,
    pub weak_topics: Vec<MasteryScoreDto>,
    pub recent_activity: Vec<MasteryScoreDto>,
    pub by_system: Vec<SystemMasteryDto>,
}

pub async fn get_user_mastery_dashboard(
    pool: &PgPool,
    user_id: &str,
    params: &MasteryParams,
) -> Result<MasteryDashboard, MasteryError> {
    let user = users::get_user(pool, user_id).await?;
    if user.is_none() {
        return Err(MasteryError::UserNotFound);
    }

    let records = mastery_ops::list_for_user(pool, user_id).await?;
    if records.is_empty() {
        return Ok(MasteryDashboard {
            user_id: user_id.to_string(),
            overall_mastery: 0.0,
            total_topics: 0,
            strong_topics: Vec::new(),
            weak_topics: Vec::new(),
            recent_activity: Vec::new(),
            by_system: Vec::new(),
        });
    }

    let overall_mastery =
        records.iter().map(|r| r.score).sum::<f64>() / records.len() as f64;

    let topic_ids: Vec<String> = records.iter().map(|r| r.topic_id.clone()).collect();
    let topic_list = topics::list_topics_by_ids(pool, &topic_ids).await?;

    // records whose topic row has vanished are skipped rather than surfaced
    // with an empty name
    let mut scored: Vec<(MasteryRecord, String, Option<String>)> = Vec::new();
    for record in records.iter() {
        if let Some(topic) = topic_list.iter().find(|t| t.id == record.topic_id) {
            scored.push((record.clone(), topic.name.clone(), topic.system_name.clone()));
        }
    }

    let to_dto = |(record, name, system): &(MasteryRecord, String, Option<String>)| {
        MasteryScoreDto {
            topic_id: record.topic_id.clone(),
            topic_name: name.clone(),
            system_name: system.clone(),
            mastery_score: record.score,
            last_reviewed_at: record.last_reviewed_at.map(format_naive_iso),
            review_count: record.review_count,
        }
    };

    let mut strong: Vec<_> = scored
        .iter()
        .filter(|(record, _, _)| record.score >= params.weak_threshold)
        .collect();
    strong.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut weak: Vec<_> = scored
        .iter()
        .filter(|(record, _, _)| record.score < params.weak_threshold)
        .collect();
    weak.sort_by(|a, b| {
        a.0.score
            .partial_cmp(&b.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut recent: Vec<_> = scored
        .iter()
        .filter(|(record, _, _)| record.last_reviewed_at.is_some())
        .collect();
    recent.sort_by(|a, b| b.0.last_reviewed_at.cmp(&a.0.last_reviewed_at));

    let by_system = aggregate_by_system(&scored);

    Ok(MasteryDashboard {
        user_id: user_id.to_string(),
        overall_mastery: round3(overall_mastery),
        total_topics: scored.len(),
        strong_topics: strong
            .into_iter()
            .take(DASHBOARD_LIST_LIMIT)
            .map(to_dto)
            .collect(),
        weak_topics: weak
            .into_iter()
            .take(DASHBOARD_LIST_LIMIT)
            .map(to_dto)
            .collect(),
        recent_activity: recent
            .into_iter()
            .take(RECENT_ACTIVITY_LIMIT)
            .map(to_dto)
            .collect(),
        by_system,
    })
}

fn aggregate_by_system(
    scored: &[(MasteryRecord, String, Option<String>)],
) -> Vec<SystemMasteryDto> {
    let mut systems: Vec<(String, usize, f64)> = Vec::new();

    for (record, _, system) in scored {
        let name = system.clone().unwrap_or_else(|| "General".to_string());
        match systems.iter_mut().find(|(existing, _, _)| *existing == name) {
            Some((_, count, sum)) => {
                *count += 1;
                *sum += record.score;
            }
            None => systems.push((name, 1, record.score)),
        }
    }

    systems.sort_by(|a, b| a.0.cmp(&b.0));
    systems
        .into_iter()
        .map(|(system_name, count, sum)| SystemMasteryDto {
            system_name,
            count,
            average_mastery: round3(sum / count as f64),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMasteryDetail {
    pub topic_id: String,
    pub topic_name: String,
    pub mastery_score: f64,
    pub last_reviewed_at: Option<String>,
    pub review_count: i32,
    pub total_questions_answered: usize,
    pub correct_answers: usize,
    pub accuracy: f64,
    pub needs_review: bool,
    pub recommended_action: String,
}

pub async fn get_topic_mastery_detail(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
    params: &MasteryParams,
) -> Result<TopicMasteryDetail, MasteryError> {
    let topic = topics::get_topic(pool, topic_id)
        .await?
        .ok_or(MasteryError::TopicNotFound)?;

    let record =
        mastery_ops::get_or_create_mastery(pool, user_id, topic_id, params.initial_score).await?;

    let recent =
        answers::fetch_recent_answers(pool, user_id, topic_id, ACCURACY_ANSWER_WINDOW).await?;
    let total_questions = recent.len();
    let correct_answers = recent.iter().filter(|a| a.correct).count();
    let accuracy = if total_questions > 0 {
        correct_answers as f64 / total_questions as f64
    } else {
        0.0
    };

    let stale = record
        .last_reviewed_at
        .map(|ts| days_since(ts) > params.spaced_repetition_days)
        .unwrap_or(false);

    let (needs_review, recommended_action) = if record.score < params.weak_threshold {
        (
            true,
            "Study content and practice more questions".to_string(),
        )
    } else if stale {
        (true, "Review for spaced repetition".to_string())
    } else {
        (false, "Keep learning".to_string())
    };

    Ok(TopicMasteryDetail {
        topic_id: topic_id.to_string(),
        topic_name: topic.name,
        mastery_score: record.score,
        last_reviewed_at: record.last_reviewed_at.map(format_naive_iso),
        review_count: record.review_count,
        total_questions_answered: total_questions,
        correct_answers,
        accuracy: round3(accuracy),
        needs_review,
        recommended_action,
    })
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
