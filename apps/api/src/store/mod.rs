pub mod mongo;
pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{AchievementDoc, AchievementStatus, Attachment, Reference};
use crate::models::profile::{Lecturer, Student, UserAccount};

/// Column updates applied by a status transition. Paired with the expected
/// current status in `ReferenceStore::transition`, which performs a
/// compare-and-swap so a concurrent writer loses deterministically instead of
/// silently overwriting.
#[derive(Debug, Clone)]
pub enum ReferenceTransition {
    Submit {
        at: DateTime<Utc>,
    },
    Verify {
        at: DateTime<Utc>,
        by: Uuid,
    },
    Reject {
        at: DateTime<Utc>,
        by: Uuid,
        note: String,
    },
    SoftDelete,
}

impl ReferenceTransition {
    pub fn target_status(&self) -> AchievementStatus {
        match self {
            ReferenceTransition::Submit { .. } => AchievementStatus::Submitted,
            ReferenceTransition::Verify { .. } => AchievementStatus::Verified,
            ReferenceTransition::Reject { .. } => AchievementStatus::Rejected,
            ReferenceTransition::SoftDelete => AchievementStatus::Deleted,
        }
    }
}

/// Listing filter. `status = Some(Deleted)` yields nothing: listing queries
/// always exclude soft-deleted rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceFilter {
    pub status: Option<AchievementStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl ReferenceFilter {
    pub fn all(limit: i64) -> Self {
        ReferenceFilter {
            status: None,
            limit,
            offset: 0,
        }
    }
}

/// Relational store for workflow reference rows.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn create(&self, reference: &Reference) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Reference>, AppError>;

    /// Compare-and-swap status transition. Returns `false` without writing
    /// when the row's status no longer matches `expected`.
    async fn transition(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        change: ReferenceTransition,
    ) -> Result<bool, AppError>;

    async fn list_by_student(
        &self,
        student_id: Uuid,
        filter: ReferenceFilter,
    ) -> Result<Vec<Reference>, AppError>;

    async fn count_by_student(
        &self,
        student_id: Uuid,
        status: Option<AchievementStatus>,
    ) -> Result<i64, AppError>;

    async fn list_by_advisor(
        &self,
        advisor_id: Uuid,
        filter: ReferenceFilter,
    ) -> Result<Vec<Reference>, AppError>;

    async fn count_by_advisor(
        &self,
        advisor_id: Uuid,
        status: Option<AchievementStatus>,
    ) -> Result<i64, AppError>;

    async fn list_all(&self, filter: ReferenceFilter) -> Result<Vec<Reference>, AppError>;

    async fn count_all(&self, status: Option<AchievementStatus>) -> Result<i64, AppError>;
}

/// Document store for the flexible achievement payload.
#[async_trait]
pub trait AchievementStore: Send + Sync {
    /// Inserts the document and returns its opaque key.
    async fn insert(&self, doc: &AchievementDoc) -> Result<String, AppError>;

    async fn fetch(&self, id: &str) -> Result<Option<AchievementDoc>, AppError>;

    async fn replace(&self, id: &str, doc: &AchievementDoc) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Appends to the attachment list and stamps the document `updated_at`.
    async fn push_attachment(&self, id: &str, attachment: &Attachment) -> Result<(), AppError>;
}

/// Profile lookups used by the authorization resolver and for display-name
/// attribution. Read-only from this service's point of view; profile CRUD is
/// managed elsewhere.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>, AppError>;

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>, AppError>;

    async fn lecturer_by_user_id(&self, user_id: Uuid) -> Result<Option<Lecturer>, AppError>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, AppError>;
}
