use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Workflow status of an achievement reference. The reference row in Postgres
/// is the single source of truth for this; the document record never carries
/// a status.
///
/// Transitions: draft -> submitted -> {verified | rejected}, draft -> deleted.
/// verified, rejected and deleted are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
    Deleted,
}

impl AchievementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementStatus::Draft => "draft",
            AchievementStatus::Submitted => "submitted",
            AchievementStatus::Verified => "verified",
            AchievementStatus::Rejected => "rejected",
            AchievementStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AchievementStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(AchievementStatus::Draft),
            "submitted" => Ok(AchievementStatus::Submitted),
            "verified" => Ok(AchievementStatus::Verified),
            "rejected" => Ok(AchievementStatus::Rejected),
            "deleted" => Ok(AchievementStatus::Deleted),
            other => Err(format!("unknown achievement status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    Academic,
    Competition,
    Organization,
    Publication,
    Certification,
    Other,
}

impl AchievementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementType::Academic => "academic",
            AchievementType::Competition => "competition",
            AchievementType::Organization => "organization",
            AchievementType::Publication => "publication",
            AchievementType::Certification => "certification",
            AchievementType::Other => "other",
        }
    }
}

/// Attachment metadata embedded in the achievement document.
/// The list is append-only; no delete operation exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Flexible achievement payload stored in MongoDB. `details` is an
/// open-ended map whose shape varies by achievement type; specific keys
/// (e.g. `competitionLevel`) are validated only where they are consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: Uuid,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: i32,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Workflow reference row in Postgres, one per achievement document.
/// `rejected_at`/`rejected_by` are dedicated columns; `verified_*` is never
/// reused for rejections.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reference {
    pub id: Uuid,
    pub student_id: Uuid,
    pub document_id: String,
    #[sqlx(try_from = "String")]
    pub status: AchievementStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejection_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reference {
    pub fn new(student_id: Uuid, document_id: String) -> Self {
        let now = Utc::now();
        Reference {
            id: Uuid::new_v4(),
            student_id,
            document_id,
            status: AchievementStatus::Draft,
            submitted_at: None,
            verified_at: None,
            verified_by: None,
            rejected_at: None,
            rejected_by: None,
            rejection_note: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAchievementRequest {
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: i32,
}

/// Partial update. Absent fields are left untouched; a supplied field always
/// overwrites, so `points: 0` is a real reset rather than "not supplied".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAchievementRequest {
    pub achievement_type: Option<AchievementType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<Map<String, Value>>,
    pub tags: Option<Vec<String>>,
    pub points: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RejectAchievementRequest {
    pub rejection_note: String,
}

/// Combined read model: the document payload joined with its workflow
/// reference. The `id` is the reference id, which is what every endpoint
/// addresses achievements by.
#[derive(Debug, Serialize)]
pub struct AchievementView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    pub details: Map<String, Value>,
    pub tags: Vec<String>,
    pub points: i32,
    pub attachments: Vec<Attachment>,
    pub status: AchievementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AchievementView {
    pub fn from_parts(doc: AchievementDoc, reference: &Reference) -> Self {
        AchievementView {
            id: reference.id,
            student_id: doc.student_id,
            achievement_type: doc.achievement_type,
            title: doc.title,
            description: doc.description,
            details: doc.details,
            tags: doc.tags,
            points: doc.points,
            attachments: doc.attachments,
            status: reference.status,
            submitted_at: reference.submitted_at,
            verified_at: reference.verified_at,
            verified_by: reference.verified_by,
            rejected_at: reference.rejected_at,
            rejected_by: reference.rejected_by,
            rejection_note: reference.rejection_note.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}
