use sqlx::PgPool;

/// Idempotent schema setup, applied on startup. Statement order matters
/// because of the foreign keys.
const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "users" (
        "id" TEXT PRIMARY KEY,
        "phoneNumber" TEXT NOT NULL UNIQUE,
        "name" TEXT NOT NULL,
        "studyLevel" TEXT NOT NULL DEFAULT 'intern',
        "targetSpecialty" TEXT,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW(),
        "updatedAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "sessions" (
        "token" TEXT PRIMARY KEY,
        "userId" TEXT NOT NULL REFERENCES "users"("id") ON DELETE CASCADE,
        "expiresAt" TIMESTAMP NOT NULL,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "topics" (
        "id" TEXT PRIMARY KEY,
        "parentId" TEXT REFERENCES "topics"("id") ON DELETE SET NULL,
        "name" TEXT NOT NULL,
        "systemName" TEXT,
        "sourceReference" TEXT,
        "description" TEXT,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "chunks" (
        "id" TEXT PRIMARY KEY,
        "topicId" TEXT NOT NULL REFERENCES "topics"("id") ON DELETE CASCADE,
        "chunkIndex" INTEGER NOT NULL DEFAULT 0,
        "pageStart" INTEGER,
        "pageEnd" INTEGER,
        "text" TEXT NOT NULL,
        "wordCount" INTEGER NOT NULL DEFAULT 0,
        "sourceDocument" TEXT,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "ingestion_jobs" (
        "id" TEXT PRIMARY KEY,
        "userId" TEXT NOT NULL REFERENCES "users"("id") ON DELETE CASCADE,
        "topicId" TEXT NOT NULL REFERENCES "topics"("id") ON DELETE CASCADE,
        "status" TEXT NOT NULL DEFAULT 'queued',
        "sourceFilename" TEXT,
        "chunkCount" INTEGER,
        "errorMessage" TEXT,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW(),
        "finishedAt" TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "quiz_questions" (
        "id" TEXT PRIMARY KEY,
        "topicId" TEXT NOT NULL REFERENCES "topics"("id") ON DELETE CASCADE,
        "stem" TEXT NOT NULL,
        "optionA" TEXT NOT NULL,
        "optionB" TEXT NOT NULL,
        "optionC" TEXT NOT NULL,
        "optionD" TEXT NOT NULL,
        "correctOption" TEXT NOT NULL,
        "explanation" TEXT,
        "difficulty" TEXT NOT NULL DEFAULT 'medium',
        "sourceChunkId" TEXT REFERENCES "chunks"("id") ON DELETE SET NULL,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "quiz_answers" (
        "id" TEXT PRIMARY KEY,
        "userId" TEXT NOT NULL REFERENCES "users"("id") ON DELETE CASCADE,
        "questionId" TEXT NOT NULL REFERENCES "quiz_questions"("id") ON DELETE CASCADE,
        "chosenOption" TEXT NOT NULL,
        "correct" BOOLEAN NOT NULL,
        "responseTimeSec" DOUBLE PRECISION,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "masteries" (
        "id" TEXT PRIMARY KEY,
        "userId" TEXT NOT NULL REFERENCES "users"("id") ON DELETE CASCADE,
        "topicId" TEXT NOT NULL REFERENCES "topics"("id") ON DELETE CASCADE,
        "score" DOUBLE PRECISION NOT NULL DEFAULT 0,
        "lastReviewedAt" TIMESTAMP,
        "reviewCount" INTEGER NOT NULL DEFAULT 0,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW(),
        "updatedAt" TIMESTAMP NOT NULL DEFAULT NOW(),
        CONSTRAINT "unique_user_topic_mastery" UNIQUE ("userId", "topicId")
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "study_plan_logs" (
        "id" TEXT PRIMARY KEY,
        "userId" TEXT NOT NULL REFERENCES "users"("id") ON DELETE CASCADE,
        "planJson" JSONB NOT NULL,
        "durationMinutes" INTEGER NOT NULL,
        "completed" INTEGER NOT NULL DEFAULT 0,
        "createdAt" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_topics_parent" ON "topics"("parentId")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_topics_system" ON "topics"("systemName")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_chunks_topic" ON "chunks"("topicId")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_questions_topic" ON "quiz_questions"("topicId")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_answers_user" ON "quiz_answers"("userId")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_masteries_user" ON "masteries"("userId")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_plan_logs_user" ON "study_plan_logs"("userId")"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_ingestion_jobs_user" ON "ingestion_jobs"("userId")"#,
];

pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "database schema ensured");
    Ok(())
}
