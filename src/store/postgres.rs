//! Relational implementation of [`super::Store`] backed by a [`sqlx::PgPool`].
//!
//! Each logical collection from the façade maps onto one table:
//! `trending_scores`, `posts`, `recommendations`, `remix_chain_edges`, and
//! `users`. Schema lives in `migrations/` and is applied via `sqlx::migrate!`
//! at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;

use super::Store;
use crate::error::{EngineError, Result};
use crate::models::{Content, ContentType, InteractionKind, Recommendation, TrendingScore, UserProfile};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(())
    }

    fn parse_content_type(raw: &str) -> Result<ContentType> {
        match raw {
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            "music" => Ok(ContentType::Music),
            "voice" => Ok(ContentType::Voice),
            "text" => Ok(ContentType::Text),
            other => Err(EngineError::Programmer(format!(
                "unrecognised content_type in storage: {other}"
            ))),
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn save_aggregate(&self, aggregate: &TrendingScore) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trending_scores
                (post_id, score, viral_probability, engagement_rate, view_count,
                 like_count, comment_count, share_count, remix_count,
                 engagement_velocity, calculated_at, time_window)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (post_id) DO UPDATE SET
                score = EXCLUDED.score,
                viral_probability = EXCLUDED.viral_probability,
                engagement_rate = EXCLUDED.engagement_rate,
                view_count = EXCLUDED.view_count,
                like_count = EXCLUDED.like_count,
                comment_count = EXCLUDED.comment_count,
                share_count = EXCLUDED.share_count,
                remix_count = EXCLUDED.remix_count,
                engagement_velocity = EXCLUDED.engagement_velocity,
                calculated_at = EXCLUDED.calculated_at,
                time_window = EXCLUDED.time_window
            "#,
        )
        .bind(&aggregate.post_id)
        .bind(aggregate.score)
        .bind(aggregate.viral_probability)
        .bind(aggregate.engagement_rate)
        .bind(aggregate.view_count)
        .bind(aggregate.like_count)
        .bind(aggregate.comment_count)
        .bind(aggregate.share_count)
        .bind(aggregate.remix_count)
        .bind(aggregate.engagement_velocity)
        .bind(aggregate.calculated_at)
        .bind(&aggregate.time_window)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_post_stats(&self, post_id: &str) -> Result<TrendingScore> {
        let row = sqlx::query(
            r#"
            SELECT post_id, score, viral_probability, engagement_rate, view_count,
                   like_count, comment_count, share_count, remix_count,
                   engagement_velocity, calculated_at, time_window
            FROM trending_scores WHERE post_id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("aggregate {post_id}")))?;

        Ok(TrendingScore {
            post_id: row.try_get("post_id")?,
            score: row.try_get("score")?,
            viral_probability: row.try_get("viral_probability")?,
            engagement_rate: row.try_get("engagement_rate")?,
            view_count: row.try_get("view_count")?,
            like_count: row.try_get("like_count")?,
            comment_count: row.try_get("comment_count")?,
            share_count: row.try_get("share_count")?,
            remix_count: row.try_get("remix_count")?,
            engagement_velocity: row.try_get("engagement_velocity")?,
            calculated_at: row.try_get("calculated_at")?,
            time_window: row.try_get("time_window")?,
            content_type: None,
            output_urls: Vec::new(),
            title: None,
            description: None,
            instructions: None,
        })
    }

    async fn get_trending_posts(&self, limit: usize) -> Result<Vec<TrendingScore>> {
        let capped = limit.min(100) as i64;
        let rows = sqlx::query(
            r#"
            SELECT ts.post_id, ts.score, ts.viral_probability, ts.engagement_rate,
                   ts.view_count, ts.like_count, ts.comment_count, ts.share_count,
                   ts.remix_count, ts.engagement_velocity, ts.calculated_at, ts.time_window,
                   p.content_type, p.output_urls, p.title, p.description, p.instructions
            FROM trending_scores ts
            LEFT JOIN posts p ON p.post_id = ts.post_id
            ORDER BY ts.score DESC
            LIMIT $1
            "#,
        )
        .bind(capped)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let content_type: Option<String> = row.try_get("content_type")?;
                Ok(TrendingScore {
                    post_id: row.try_get("post_id")?,
                    score: row.try_get("score")?,
                    viral_probability: row.try_get("viral_probability")?,
                    engagement_rate: row.try_get("engagement_rate")?,
                    view_count: row.try_get("view_count")?,
                    like_count: row.try_get("like_count")?,
                    comment_count: row.try_get("comment_count")?,
                    share_count: row.try_get("share_count")?,
                    remix_count: row.try_get("remix_count")?,
                    engagement_velocity: row.try_get("engagement_velocity")?,
                    calculated_at: row.try_get("calculated_at")?,
                    time_window: row.try_get("time_window")?,
                    content_type: content_type.map(|s| Self::parse_content_type(&s)).transpose()?,
                    output_urls: row.try_get("output_urls").unwrap_or_default(),
                    title: row.try_get("title").ok(),
                    description: row.try_get("description").ok(),
                    instructions: row.try_get("instructions").ok(),
                })
            })
            .collect()
    }

    async fn get_all_aggregates(&self) -> Result<Vec<TrendingScore>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, score, viral_probability, engagement_rate, view_count,
                   like_count, comment_count, share_count, remix_count,
                   engagement_velocity, calculated_at, time_window
            FROM trending_scores
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(TrendingScore {
                    post_id: row.try_get("post_id")?,
                    score: row.try_get("score")?,
                    viral_probability: row.try_get("viral_probability")?,
                    engagement_rate: row.try_get("engagement_rate")?,
                    view_count: row.try_get("view_count")?,
                    like_count: row.try_get("like_count")?,
                    comment_count: row.try_get("comment_count")?,
                    share_count: row.try_get("share_count")?,
                    remix_count: row.try_get("remix_count")?,
                    engagement_velocity: row.try_get("engagement_velocity")?,
                    calculated_at: row.try_get("calculated_at")?,
                    time_window: row.try_get("time_window")?,
                    content_type: None,
                    output_urls: Vec::new(),
                    title: None,
                    description: None,
                    instructions: None,
                })
            })
            .collect()
    }

    async fn increment_view_count(&self, post_id: &str, viewed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE posts SET view_count = view_count + 1, last_viewed_at = $2 WHERE post_id = $1",
        )
        .bind(post_id)
        .bind(viewed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_content_metadata(
        &self,
        post_id: &str,
        keywords: &[String],
        category: &str,
        style: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE posts SET keywords = $2, category = $3, style = $4 WHERE post_id = $1",
        )
        .bind(post_id)
        .bind(keywords)
        .bind(category)
        .bind(style)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_post_analytics(&self, post_id: &str, kind: InteractionKind) -> Result<()> {
        let column = match kind {
            InteractionKind::View => "view_count",
            InteractionKind::Like => "like_count",
            InteractionKind::Comment => "comment_count",
            InteractionKind::Share => "share_count",
        };
        let query = format!("UPDATE posts SET {column} = {column} + 1 WHERE post_id = $1");
        let result = sqlx::query(&query).bind(post_id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("content {post_id}")));
        }
        Ok(())
    }

    async fn get_content(&self, post_id: &str) -> Result<Content> {
        let row = sqlx::query(
            r#"
            SELECT post_id, creator_id, content_type, output_urls, title, description,
                   instructions, view_count, like_count, comment_count, share_count,
                   is_public, created_at, keywords, category, style
            FROM posts WHERE post_id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("content {post_id}")))?;

        row_to_content(row)
    }

    async fn list_public_content(&self, limit: usize) -> Result<Vec<Content>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, creator_id, content_type, output_urls, title, description,
                   instructions, view_count, like_count, comment_count, share_count,
                   is_public, created_at, keywords, category, style
            FROM posts WHERE is_public = true
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_content).collect()
    }

    async fn list_content_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Content>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, creator_id, content_type, output_urls, title, description,
                   instructions, view_count, like_count, comment_count, share_count,
                   is_public, created_at, keywords, category, style
            FROM posts WHERE created_at >= $1 AND created_at < $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_content).collect()
    }

    async fn get_user_recommendations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, post_id, score, reason, category, generated_at
            FROM recommendations WHERE user_id = $1
            ORDER BY score DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Recommendation {
                    user_id: row.try_get("user_id")?,
                    post_id: row.try_get("post_id")?,
                    score: row.try_get("score")?,
                    reason: row.try_get("reason")?,
                    category: row.try_get("category")?,
                    generated_at: row.try_get("generated_at")?,
                })
            })
            .collect()
    }

    async fn save_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendations (user_id, post_id, score, reason, category, generated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, post_id) DO UPDATE SET
                score = EXCLUDED.score,
                reason = EXCLUDED.reason,
                category = EXCLUDED.category,
                generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(&recommendation.user_id)
        .bind(&recommendation.post_id)
        .bind(recommendation.score)
        .bind(&recommendation.reason)
        .bind(&recommendation.category)
        .bind(recommendation.generated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn track_remix_chain(
        &self,
        original_post_id: &str,
        remix_post_id: &str,
        remixed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO remix_chain_edges (original_post_id, remix_post_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (original_post_id, remix_post_id) DO NOTHING
            "#,
        )
        .bind(original_post_id)
        .bind(remix_post_id)
        .bind(remixed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_remix_count(&self, post_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM remix_chain_edges WHERE original_post_id = $1",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT user_id, username, display_name, photo_url, follower_count FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(UserProfile {
                user_id: row.try_get("user_id")?,
                username: row.try_get("username")?,
                display_name: row.try_get("display_name")?,
                photo_url: row.try_get("photo_url")?,
                follower_count: row.try_get("follower_count")?,
            })
        })
        .transpose()
    }

    async fn count_distinct_creators(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(DISTINCT creator_id) AS count FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }
}

fn row_to_content(row: sqlx::postgres::PgRow) -> Result<Content> {
    let content_type: String = row.try_get("content_type")?;
    Ok(Content {
        post_id: row.try_get("post_id")?,
        creator_id: row.try_get("creator_id")?,
        content_type: PostgresStore::parse_content_type(&content_type)?,
        output_urls: row.try_get("output_urls")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        instructions: row.try_get("instructions")?,
        view_count: row.try_get("view_count")?,
        like_count: row.try_get("like_count")?,
        comment_count: row.try_get("comment_count")?,
        share_count: row.try_get("share_count")?,
        is_public: row.try_get("is_public")?,
        created_at: row.try_get("created_at")?,
        keywords: row.try_get("keywords")?,
        category: row.try_get("category")?,
        style: row.try_get("style")?,
    })
}
