use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::operations::mastery::{self as mastery_ops, MasteryRecord};
use crate::db::operations::{plan_logs, topics, users};
use crate::services::llm_provider::LLMProvider;
use crate::services::mastery::{days_since, weak_topics_for_review};
use crate::services::mastery_engine::{self, MasteryParams};
use crate::services::planner::{self, PlanCandidate, QuizItem, StudyPlan, TopicRef};
use crate::services::{content, quiz};

const WEAK_TOPIC_POOL: usize = 10;
const MIN_PLAN_MINUTES: i64 = 30;
const MAX_PLAN_MINUTES: i64 = 300;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub duration_minutes: i64,
    pub focus_topic_ids: Option<Vec<String>>,
    pub include_quiz: bool,
}

/// Full plan pipeline: select candidates, allocate minutes, build blocks,
/// enrich them through the content/quiz boundaries, assemble, then log the
/// result for analytics without letting the log write fail the request.
pub async fn generate_study_plan(
    pool: &PgPool,
    llm: &LLMProvider,
    user_id: &str,
    request: PlanRequest,
    params: &MasteryParams,
) -> Result<StudyPlan, RecommendError> {
    if users::get_user(pool, user_id).await?.is_none() {
        return Err(RecommendError::UserNotFound);
    }

    let duration = request
        .duration_minutes
        .clamp(MIN_PLAN_MINUTES, MAX_PLAN_MINUTES);

    tracing::info!(user_id, duration, "generating study plan");

    let candidates = match &request.focus_topic_ids {
        Some(focus_ids) if !focus_ids.is_empty() => {
            select_focus_topics(pool, user_id, focus_ids, params).await?
        }
        _ => select_adaptive_topics(pool, user_id, duration, params).await?,
    };

    let priorities: Vec<_> = candidates.iter().map(|c| c.priority).collect();
    let allocations = planner::allocate_time(&priorities, duration);

    let mut blocks = Vec::with_capacity(candidates.len());
    for (candidate, allocated) in candidates.iter().zip(allocations) {
        let mut block = planner::build_block(candidate, allocated, params);
        enrich_block(pool, llm, &mut block, request.include_quiz).await;
        blocks.push(block);
    }

    let plan = planner::assemble_plan(user_id, duration, Utc::now(), blocks);

    log_study_plan(pool, &plan);

    tracing::info!(
        user_id,
        blocks = plan.total_topics,
        questions = plan.total_questions,
        "study plan generated"
    );

    Ok(plan)
}

/// Focus mode: exactly the requested topics, in the requested order.
/// Unknown ids are skipped; mastery records are created lazily.
async fn select_focus_topics(
    pool: &PgPool,
    user_id: &str,
    focus_ids: &[String],
    params: &MasteryParams,
) -> Result<Vec<PlanCandidate>, RecommendError> {
    let topic_rows = topics::list_topics_by_ids(pool, focus_ids).await?;

    let mut candidates = Vec::with_capacity(focus_ids.len());
    for topic_id in focus_ids {
        let Some(topic) = topic_rows.iter().find(|t| &t.id == topic_id) else {
            tracing::warn!(topic_id = topic_id.as_str(), "focus topic does not exist, skipping");
            continue;
        };

        let record =
            mastery_ops::get_or_create_mastery(pool, user_id, topic_id, params.initial_score)
                .await?;
        candidates.push(to_candidate(topic_ref(topic), &record, params));
    }

    Ok(candidates)
}

/// Adaptive mode: weakest and stalest topics first, capped by how many
/// blocks the session can hold.
async fn select_adaptive_topics(
    pool: &PgPool,
    user_id: &str,
    duration_minutes: i64,
    params: &MasteryParams,
) -> Result<Vec<PlanCandidate>, RecommendError> {
    let weak_records = weak_topics_for_review(pool, user_id, WEAK_TOPIC_POOL).await?;

    let topic_ids: Vec<String> = weak_records.iter().map(|r| r.topic_id.clone()).collect();
    let topic_rows = topics::list_topics_by_ids(pool, &topic_ids).await?;

    let mut candidates = Vec::new();
    for record in &weak_records {
        let Some(topic) = topic_rows.iter().find(|t| t.id == record.topic_id) else {
            continue;
        };
        candidates.push(to_candidate(topic_ref(topic), record, params));
    }

    candidates.truncate(planner::max_candidates(duration_minutes));
    Ok(candidates)
}

fn topic_ref(topic: &topics::TopicRecord) -> TopicRef {
    TopicRef {
        id: topic.id.clone(),
        name: topic.name.clone(),
        system_name: topic.system_name.clone(),
    }
}

fn to_candidate(topic: TopicRef, record: &MasteryRecord, params: &MasteryParams) -> PlanCandidate {
    let days = record.last_reviewed_at.map(days_since);
    PlanCandidate {
        priority: mastery_engine::classify_priority(record.score, days, params),
        mastery_score: record.score,
        days_since_review: days,
        topic,
    }
}

/// Attach review material and practice questions to a block skeleton.
/// Either boundary failing leaves the block intact with placeholders.
async fn enrich_block(
    pool: &PgPool,
    llm: &LLMProvider,
    block: &mut planner::StudyBlock,
    include_quiz: bool,
) {
    match content::get_topic_summary(pool, llm, &block.topic_id, true).await {
        Ok(summary) => block.review_material = summary.summary,
        Err(err) => {
            tracing::warn!(topic_id = block.topic_id.as_str(), error = %err, "no summary for block");
            block.review_material = format!("Study materials for {}", block.topic);
        }
    }

    if include_quiz && block.quiz_question_count > 0 {
        match quiz::generate_or_fetch_questions(
            pool,
            llm,
            &block.topic_id,
            block.quiz_question_count as usize,
            None,
        )
        .await
        {
            Ok(question_rows) => {
                block.quiz_questions = question_rows
                    .iter()
                    .map(|record| {
                        let dto = quiz::format_question(record);
                        QuizItem {
                            question_id: dto.id,
                            stem: dto.stem,
                            options: dto.options,
                        }
                    })
                    .collect();
            }
            Err(err) => {
                tracing::warn!(topic_id = block.topic_id.as_str(), error = %err, "no questions for block");
            }
        }
    }
}

/// Analytics write, fire-and-forget: a failed insert is logged and
/// swallowed so plan generation never fails because of it.
fn log_study_plan(pool: &PgPool, plan: &StudyPlan) {
    let plan_json = match serde_json::to_value(plan) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "study plan not serializable for logging");
            return;
        }
    };

    let pool = pool.clone();
    let user_id = plan.user_id.clone();
    let duration = plan.duration_minutes;

    tokio::spawn(async move {
        match plan_logs::insert_plan_log(&pool, &user_id, &plan_json, duration).await {
            Ok(log_id) => {
                tracing::debug!(log_id = log_id.as_str(), user_id = user_id.as_str(), "study plan logged")
            }
            Err(err) => {
                tracing::error!(user_id = user_id.as_str(), error = %err, "failed to log study plan")
            }
        }
    });
}
