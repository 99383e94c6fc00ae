//! Status history reconstructed from the reference row's timestamps.
//! No separate audit table exists; each lifecycle step stamps its own
//! column, and this module reads them back in order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{AchievementStatus, Reference};
use crate::store::Directory;

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub status: AchievementStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub async fn reconstruct(
    directory: &dyn Directory,
    reference: &Reference,
) -> Result<Vec<HistoryEntry>, AppError> {
    let mut entries = vec![HistoryEntry {
        status: AchievementStatus::Draft,
        timestamp: reference.created_at,
        actor: None,
        actor_id: None,
        action: "achievement created".to_string(),
        notes: None,
    }];

    if let Some(submitted_at) = reference.submitted_at {
        entries.push(HistoryEntry {
            status: AchievementStatus::Submitted,
            timestamp: submitted_at,
            actor: None,
            actor_id: None,
            action: "submitted for verification".to_string(),
            notes: None,
        });
    }

    match reference.status {
        AchievementStatus::Verified => {
            entries.push(HistoryEntry {
                status: AchievementStatus::Verified,
                timestamp: reference.verified_at.unwrap_or(reference.updated_at),
                actor: display_name(directory, reference.verified_by).await?,
                actor_id: reference.verified_by,
                action: "achievement verified".to_string(),
                notes: None,
            });
        }
        AchievementStatus::Rejected => {
            entries.push(HistoryEntry {
                status: AchievementStatus::Rejected,
                timestamp: reference.rejected_at.unwrap_or(reference.updated_at),
                actor: display_name(directory, reference.rejected_by).await?,
                actor_id: reference.rejected_by,
                action: "achievement rejected".to_string(),
                notes: reference.rejection_note.clone(),
            });
        }
        AchievementStatus::Deleted => {
            entries.push(HistoryEntry {
                status: AchievementStatus::Deleted,
                timestamp: reference.updated_at,
                actor: None,
                actor_id: None,
                action: "achievement deleted".to_string(),
                notes: None,
            });
        }
        AchievementStatus::Draft | AchievementStatus::Submitted => {}
    }

    Ok(entries)
}

async fn display_name(
    directory: &dyn Directory,
    user_id: Option<Uuid>,
) -> Result<Option<String>, AppError> {
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    Ok(directory.user_by_id(user_id).await?.map(|u| u.full_name))
}
