use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TopicRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub system_name: Option<String>,
    pub source_reference: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub parent_id: Option<String>,
    pub name: String,
    pub system_name: Option<String>,
    pub source_reference: Option<String>,
    pub description: Option<String>,
}

pub async fn insert_topic(pool: &PgPool, topic: &NewTopic) -> Result<TopicRecord, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "topics" ("id","parentId","name","systemName","sourceReference","description","createdAt")
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        "#,
    )
    .bind(&id)
    .bind(topic.parent_id.as_deref())
    .bind(&topic.name)
    .bind(topic.system_name.as_deref())
    .bind(topic.source_reference.as_deref())
    .bind(topic.description.as_deref())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(TopicRecord {
        id,
        parent_id: topic.parent_id.clone(),
        name: topic.name.clone(),
        system_name: topic.system_name.clone(),
        source_reference: topic.source_reference.clone(),
        description: topic.description.clone(),
        created_at: now,
    })
}

pub async fn get_topic(pool: &PgPool, topic_id: &str) -> Result<Option<TopicRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","parentId","name","systemName","sourceReference","description","createdAt"
        FROM "topics"
        WHERE "id" = $1
        "#,
    )
    .bind(topic_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_topic_row(&r)))
}

pub async fn list_topics(
    pool: &PgPool,
    system_name: Option<&str>,
    parent_id: Option<&str>,
) -> Result<Vec<TopicRecord>, sqlx::Error> {
    let mut qb = QueryBuilder::<sqlx::Postgres>::new(
        r#"
        SELECT "id","parentId","name","systemName","sourceReference","description","createdAt"
        FROM "topics"
        WHERE 1 = 1
        "#,
    );
    if let Some(system) = system_name {
        qb.push(r#" AND "systemName" = "#);
        qb.push_bind(system);
    }
    if let Some(parent) = parent_id {
        qb.push(r#" AND "parentId" = "#);
        qb.push_bind(parent);
    }
    qb.push(r#" ORDER BY "name" ASC"#);

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(map_topic_row).collect())
}

pub async fn list_topics_by_ids(
    pool: &PgPool,
    topic_ids: &[String],
) -> Result<Vec<TopicRecord>, sqlx::Error> {
    if topic_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<sqlx::Postgres>::new(
        r#"
        SELECT "id","parentId","name","systemName","sourceReference","description","createdAt"
        FROM "topics"
        WHERE "id" IN (
        "#,
    );
    {
        let mut sep = qb.separated(", ");
        for id in topic_ids {
            sep.push_bind(id);
        }
        sep.push_unseparated(")");
    }

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(map_topic_row).collect())
}

fn map_topic_row(row: &sqlx::postgres::PgRow) -> TopicRecord {
    TopicRecord {
        id: row.try_get("id").unwrap_or_default(),
        parent_id: row.try_get("parentId").ok(),
        name: row.try_get("name").unwrap_or_default(),
        system_name: row.try_get("systemName").ok(),
        source_reference: row.try_get("sourceReference").ok(),
        description: row.try_get("description").ok(),
        created_at: row
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }
}
