use rand::seq::IndexedRandom;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::operations::questions::{self, NewQuestion, QuestionRecord};
use crate::db::operations::{answers, chunks, topics, users};
use crate::services::llm_provider::LLMProvider;
use crate::services::mastery::{self, MasteryError};
use crate::services::mastery_engine::MasteryParams;
use crate::services::planner::QuestionOption;

const CONTEXT_CHUNK_LIMIT: i64 = 5;
const CONTEXT_CHUNKS_IN_PROMPT: usize = 3;
const VALID_OPTIONS: [&str; 4] = ["A", "B", "C", "D"];

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("user not found")]
    UserNotFound,
    #[error("topic not found")]
    TopicNotFound,
    #[error("question not found")]
    QuestionNotFound,
    #[error("no content available for this topic to generate questions")]
    NoContent,
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

impl From<MasteryError> for QuizError {
    fn from(err: MasteryError) -> Self {
        match err {
            MasteryError::UserNotFound => Self::UserNotFound,
            MasteryError::TopicNotFound => Self::TopicNotFound,
            MasteryError::Sql(e) => Self::Sql(e),
        }
    }
}

/// Question as served to a student: options only, never the answer key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionDto {
    pub id: String,
    pub topic_id: String,
    pub stem: String,
    pub options: Vec<QuestionOption>,
    pub difficulty: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerResult {
    pub answer_id: String,
    pub correct: bool,
    pub correct_option: String,
    pub explanation: Option<String>,
    pub user_answer: String,
    pub topic_id: String,
    pub new_mastery_score: f64,
}

pub fn format_question(record: &QuestionRecord) -> QuizQuestionDto {
    QuizQuestionDto {
        id: record.id.clone(),
        topic_id: record.topic_id.clone(),
        stem: record.stem.clone(),
        options: vec![
            QuestionOption {
                label: "A".to_string(),
                text: record.option_a.clone(),
            },
            QuestionOption {
                label: "B".to_string(),
                text: record.option_b.clone(),
            },
            QuestionOption {
                label: "C".to_string(),
                text: record.option_c.clone(),
            },
            QuestionOption {
                label: "D".to_string(),
                text: record.option_d.clone(),
            },
        ],
        difficulty: record.difficulty.clone(),
    }
}

/// Serve questions for a topic, generating the shortfall through the LLM
/// when the bank is thin. Generation failures degrade to whatever is
/// already stored instead of failing the request.
pub async fn generate_or_fetch_questions(
    pool: &PgPool,
    llm: &LLMProvider,
    topic_id: &str,
    count: usize,
    difficulty: Option<&str>,
) -> Result<Vec<QuestionRecord>, QuizError> {
    let topic = topics::get_topic(pool, topic_id)
        .await?
        .ok_or(QuizError::TopicNotFound)?;

    let existing = questions::list_for_topic(pool, topic_id, difficulty).await?;

    if existing.len() >= count {
        return Ok(sample(&existing, count));
    }

    tracing::info!(
        topic_id,
        requested = count,
        existing = existing.len(),
        "generating new quiz questions"
    );

    let chunk_rows = chunks::list_for_topic(pool, topic_id, CONTEXT_CHUNK_LIMIT).await?;
    if chunk_rows.is_empty() {
        if existing.is_empty() {
            return Err(QuizError::NoContent);
        }
        return Ok(sample(&existing, count.min(existing.len())));
    }

    let context = chunk_rows
        .iter()
        .take(CONTEXT_CHUNKS_IN_PROMPT)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let difficulty_str = difficulty.unwrap_or("medium");
    let mut generated: Vec<QuestionRecord> = Vec::new();

    match llm
        .generate_questions(&topic.name, &context, count - existing.len(), difficulty_str)
        .await
    {
        Ok(drafts) => {
            for draft in drafts {
                let correct_option = draft.correct_option.to_uppercase();
                if !VALID_OPTIONS.contains(&correct_option.as_str()) {
                    tracing::warn!(topic_id, "discarding generated question with bad answer key");
                    continue;
                }
                let new_question = NewQuestion {
                    topic_id: topic_id.to_string(),
                    stem: draft.stem,
                    option_a: draft.option_a,
                    option_b: draft.option_b,
                    option_c: draft.option_c,
                    option_d: draft.option_d,
                    correct_option,
                    explanation: (!draft.explanation.is_empty()).then_some(draft.explanation),
                    difficulty: difficulty_str.to_string(),
                    source_chunk_id: chunk_rows.first().map(|c| c.id.clone()),
                };
                generated.push(questions::insert_question(pool, &new_question).await?);
            }
            tracing::info!(topic_id, stored = generated.len(), "stored generated questions");
        }
        Err(err) => {
            tracing::warn!(topic_id, error = %err, "question generation failed");
        }
    }

    let mut combined = existing;
    combined.extend(generated);
    Ok(sample(&combined, count.min(combined.len())))
}

fn sample(records: &[QuestionRecord], count: usize) -> Vec<QuestionRecord> {
    let mut rng = rand::rng();
    records
        .choose_multiple(&mut rng, count)
        .cloned()
        .collect()
}

/// Grade one answer, store it, and apply the mastery update rule. Returns
/// the explanation and the fresh mastery score for immediate feedback.
pub async fn submit_answer(
    pool: &PgPool,
    user_id: &str,
    question_id: &str,
    chosen_option: &str,
    response_time_sec: Option<f64>,
    params: &MasteryParams,
) -> Result<QuizAnswerResult, QuizError> {
    let user = users::get_user(pool, user_id).await?;
    if user.is_none() {
        return Err(QuizError::UserNotFound);
    }

    let question = questions::get_question(pool, question_id)
        .await?
        .ok_or(QuizError::QuestionNotFound)?;

    let chosen = chosen_option.trim().to_uppercase();
    if !VALID_OPTIONS.contains(&chosen.as_str()) {
        return Err(QuizError::Validation(
            "chosenOption must be one of A, B, C, D".to_string(),
        ));
    }

    let correct = chosen == question.correct_option;

    let answer = answers::insert_answer(
        pool,
        user_id,
        question_id,
        &chosen,
        correct,
        response_time_sec,
    )
    .await?;

    tracing::info!(user_id, question_id, correct, "quiz answer recorded");

    let record =
        mastery::update_mastery_from_quiz(pool, user_id, &question.topic_id, correct, params)
            .await?;

    Ok(QuizAnswerResult {
        answer_id: answer.id,
        correct,
        correct_option: question.correct_option,
        explanation: question.explanation,
        user_answer: chosen,
        topic_id: question.topic_id,
        new_mastery_score: record.score,
    })
}

#[derive(Debug, Clone)]
pub struct CreateQuestionInput {
    pub topic_id: String,
    pub stem: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
}

pub async fn create_question(
    pool: &PgPool,
    input: CreateQuestionInput,
) -> Result<QuestionRecord, QuizError> {
    let topic = topics::get_topic(pool, &input.topic_id).await?;
    if topic.is_none() {
        return Err(QuizError::TopicNotFound);
    }

    let correct_option = input.correct_option.trim().to_uppercase();
    if !VALID_OPTIONS.contains(&correct_option.as_str()) {
        return Err(QuizError::Validation(
            "correctOption must be one of A, B, C, D".to_string(),
        ));
    }

    let record = questions::insert_question(
        pool,
        &NewQuestion {
            topic_id: input.topic_id,
            stem: input.stem,
            option_a: input.option_a,
            option_b: input.option_b,
            option_c: input.option_c,
            option_d: input.option_d,
            correct_option,
            explanation: input.explanation,
            difficulty: input.difficulty.unwrap_or_else(|| "medium".to_string()),
            source_chunk_id: None,
        },
    )
    .await?;

    tracing::info!(question_id = record.id.as_str(), "question created");
    Ok(record)
}

pub async fn get_question_detail(
    pool: &PgPool,
    question_id: &str,
) -> Result<QuestionRecord, QuizError> {
    questions::get_question(pool, question_id)
        .await?
        .ok_or(QuizError::QuestionNotFound)
}
