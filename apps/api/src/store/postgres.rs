use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{AchievementStatus, Reference};
use crate::models::profile::{Lecturer, Student, UserAccount};
use crate::store::{Directory, ReferenceFilter, ReferenceStore, ReferenceTransition};

pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        PgReferenceStore { pool }
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn create(&self, reference: &Reference) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO achievement_references
                (id, student_id, document_id, status, submitted_at, verified_at, verified_by,
                 rejected_at, rejected_by, rejection_note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(reference.id)
        .bind(reference.student_id)
        .bind(&reference.document_id)
        .bind(reference.status.as_str())
        .bind(reference.submitted_at)
        .bind(reference.verified_at)
        .bind(reference.verified_by)
        .bind(reference.rejected_at)
        .bind(reference.rejected_by)
        .bind(&reference.rejection_note)
        .bind(reference.created_at)
        .bind(reference.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reference>, AppError> {
        Ok(sqlx::query_as::<_, Reference>(
            "SELECT * FROM achievement_references WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        change: ReferenceTransition,
    ) -> Result<bool, AppError> {
        let now = Utc::now();
        let result = match change {
            ReferenceTransition::Submit { at } => {
                sqlx::query(
                    r#"
                    UPDATE achievement_references
                    SET status = 'submitted', submitted_at = $3, updated_at = $4
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(id)
                .bind(expected.as_str())
                .bind(at)
                .bind(now)
                .execute(&self.pool)
                .await?
            }
            ReferenceTransition::Verify { at, by } => {
                sqlx::query(
                    r#"
                    UPDATE achievement_references
                    SET status = 'verified', verified_at = $3, verified_by = $4, updated_at = $5
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(id)
                .bind(expected.as_str())
                .bind(at)
                .bind(by)
                .bind(now)
                .execute(&self.pool)
                .await?
            }
            ReferenceTransition::Reject { at, by, note } => {
                sqlx::query(
                    r#"
                    UPDATE achievement_references
                    SET status = 'rejected', rejected_at = $3, rejected_by = $4,
                        rejection_note = $5, updated_at = $6
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(id)
                .bind(expected.as_str())
                .bind(at)
                .bind(by)
                .bind(note)
                .bind(now)
                .execute(&self.pool)
                .await?
            }
            ReferenceTransition::SoftDelete => {
                sqlx::query(
                    r#"
                    UPDATE achievement_references
                    SET status = 'deleted', updated_at = $3
                    WHERE id = $1 AND status = $2
                    "#,
                )
                .bind(id)
                .bind(expected.as_str())
                .bind(now)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn list_by_student(
        &self,
        student_id: Uuid,
        filter: ReferenceFilter,
    ) -> Result<Vec<Reference>, AppError> {
        Ok(sqlx::query_as::<_, Reference>(
            r#"
            SELECT * FROM achievement_references
            WHERE student_id = $1
              AND status != 'deleted'
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(student_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_by_student(
        &self,
        student_id: Uuid,
        status: Option<AchievementStatus>,
    ) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM achievement_references
            WHERE student_id = $1
              AND status != 'deleted'
              AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(student_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_by_advisor(
        &self,
        advisor_id: Uuid,
        filter: ReferenceFilter,
    ) -> Result<Vec<Reference>, AppError> {
        Ok(sqlx::query_as::<_, Reference>(
            r#"
            SELECT ar.* FROM achievement_references ar
            JOIN students s ON ar.student_id = s.id
            WHERE s.advisor_id = $1
              AND ar.status != 'deleted'
              AND ($2::text IS NULL OR ar.status = $2)
            ORDER BY ar.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(advisor_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_by_advisor(
        &self,
        advisor_id: Uuid,
        status: Option<AchievementStatus>,
    ) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM achievement_references ar
            JOIN students s ON ar.student_id = s.id
            WHERE s.advisor_id = $1
              AND ar.status != 'deleted'
              AND ($2::text IS NULL OR ar.status = $2)
            "#,
        )
        .bind(advisor_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_all(&self, filter: ReferenceFilter) -> Result<Vec<Reference>, AppError> {
        Ok(sqlx::query_as::<_, Reference>(
            r#"
            SELECT * FROM achievement_references
            WHERE status != 'deleted'
              AND ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_all(&self, status: Option<AchievementStatus>) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM achievement_references
            WHERE status != 'deleted'
              AND ($1::text IS NULL OR status = $1)
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?)
    }
}

pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        PgDirectory { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(
            sqlx::query_as::<_, Student>("SELECT * FROM students WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(
            sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn lecturer_by_user_id(&self, user_id: Uuid) -> Result<Option<Lecturer>, AppError> {
        Ok(
            sqlx::query_as::<_, Lecturer>("SELECT * FROM lecturers WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, AppError> {
        Ok(
            sqlx::query_as::<_, UserAccount>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
