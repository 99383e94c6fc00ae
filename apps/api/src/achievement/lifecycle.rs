//! The achievement workflow state machine.
//!
//! Every achievement is a pair of records: a flexible payload document in the
//! document store and a workflow reference row in Postgres. The reference is
//! the source of truth for status; all transitions go through a
//! compare-and-swap on the status column so concurrent writers lose
//! deterministically. The pair is created document-first with a compensating
//! document delete if the reference insert fails.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::resolver;
use crate::errors::AppError;
use crate::models::achievement::{
    AchievementDoc, AchievementStatus, AchievementView, Attachment, CreateAchievementRequest,
    Reference, UpdateAchievementRequest,
};
use crate::store::{AchievementStore, Directory, ReferenceStore, ReferenceTransition};

pub struct AchievementLifecycle {
    references: Arc<dyn ReferenceStore>,
    achievements: Arc<dyn AchievementStore>,
    directory: Arc<dyn Directory>,
}

impl AchievementLifecycle {
    pub fn new(
        references: Arc<dyn ReferenceStore>,
        achievements: Arc<dyn AchievementStore>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        AchievementLifecycle {
            references,
            achievements,
            directory,
        }
    }

    async fn reference(&self, id: Uuid) -> Result<Reference, AppError> {
        self.references
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("achievement not found".to_string()))
    }

    async fn document(&self, reference: &Reference) -> Result<AchievementDoc, AppError> {
        self.achievements
            .fetch(&reference.document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("achievement detail not found".to_string()))
    }

    /// Creates the document record first, then the reference with status
    /// `draft`. A reference-insert failure triggers a compensating document
    /// delete so the caller is never left with an orphaned document.
    pub async fn create(
        &self,
        claims: &Claims,
        request: CreateAchievementRequest,
    ) -> Result<AchievementView, AppError> {
        validate_create(&request)?;
        let student = resolver::require_student_profile(self.directory.as_ref(), claims).await?;

        let now = Utc::now();
        let doc = AchievementDoc {
            id: None,
            student_id: student.id,
            achievement_type: request.achievement_type,
            title: request.title,
            description: request.description,
            details: request.details,
            tags: request.tags,
            points: request.points,
            attachments: vec![],
            created_at: now,
            updated_at: now,
        };
        let document_id = self.achievements.insert(&doc).await?;

        let reference = Reference::new(student.id, document_id.clone());
        if let Err(e) = self.references.create(&reference).await {
            warn!("reference insert failed for document {document_id}, compensating: {e}");
            if let Err(cleanup) = self.achievements.delete(&document_id).await {
                // A crash here would also orphan the document; acceptable,
                // but it must be visible in the logs.
                tracing::error!(
                    "compensating delete failed, document {document_id} is orphaned: {cleanup}"
                );
            }
            return Err(AppError::Persistence(format!(
                "failed to create achievement reference: {e}"
            )));
        }

        info!(
            "achievement {} created for student {} (document {document_id})",
            reference.id, student.id
        );
        Ok(AchievementView::from_parts(doc, &reference))
    }

    pub async fn get(&self, claims: &Claims, id: Uuid) -> Result<AchievementView, AppError> {
        let reference = self.reference(id).await?;
        resolver::authorize_read(self.directory.as_ref(), claims, reference.student_id).await?;
        let doc = self.document(&reference).await?;
        Ok(AchievementView::from_parts(doc, &reference))
    }

    /// Partial update: supplied fields overwrite, absent fields are left
    /// untouched. Owner-only, and only while the reference is still `draft`.
    pub async fn update(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateAchievementRequest,
    ) -> Result<AchievementView, AppError> {
        let reference = self.reference(id).await?;
        resolver::require_owner(self.directory.as_ref(), claims, reference.student_id).await?;
        if reference.status != AchievementStatus::Draft {
            return Err(AppError::InvalidState(
                "can only update achievement with status draft".to_string(),
            ));
        }

        let mut doc = self.document(&reference).await?;
        if let Some(achievement_type) = request.achievement_type {
            doc.achievement_type = achievement_type;
        }
        if let Some(title) = request.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("title must not be empty".to_string()));
            }
            doc.title = title;
        }
        if let Some(description) = request.description {
            if description.trim().is_empty() {
                return Err(AppError::Validation(
                    "description must not be empty".to_string(),
                ));
            }
            doc.description = description;
        }
        if let Some(details) = request.details {
            doc.details = details;
        }
        if let Some(tags) = request.tags {
            doc.tags = tags;
        }
        if let Some(points) = request.points {
            if points < 0 {
                return Err(AppError::Validation(
                    "points must not be negative".to_string(),
                ));
            }
            doc.points = points;
        }
        doc.updated_at = Utc::now();

        self.achievements.replace(&reference.document_id, &doc).await?;
        Ok(AchievementView::from_parts(doc, &reference))
    }

    /// Soft delete. The document is removed first (fail-fast: a document
    /// delete failure aborts before the reference is touched); the reference
    /// row persists with status `deleted` for audit and listing exclusion.
    pub async fn delete(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        let reference = self.reference(id).await?;
        resolver::require_owner(self.directory.as_ref(), claims, reference.student_id).await?;
        if reference.status != AchievementStatus::Draft {
            return Err(AppError::InvalidState(
                "can only delete achievement with status draft".to_string(),
            ));
        }

        self.achievements.delete(&reference.document_id).await?;
        let swapped = self
            .references
            .transition(id, AchievementStatus::Draft, ReferenceTransition::SoftDelete)
            .await?;
        if !swapped {
            // The document is already gone but a concurrent transition moved
            // the reference off draft; it now points at nothing.
            warn!(
                "reference {id} left draft during delete; document {} is gone and the reference is orphaned",
                reference.document_id
            );
            return Err(AppError::InvalidState(
                "can only delete achievement with status draft".to_string(),
            ));
        }
        info!("achievement {id} soft-deleted");
        Ok(())
    }

    pub async fn submit(&self, claims: &Claims, id: Uuid) -> Result<Reference, AppError> {
        let reference = self.reference(id).await?;
        resolver::require_owner(self.directory.as_ref(), claims, reference.student_id).await?;
        if reference.status != AchievementStatus::Draft {
            return Err(AppError::InvalidState(
                "achievement already submitted or processed".to_string(),
            ));
        }

        let swapped = self
            .references
            .transition(
                id,
                AchievementStatus::Draft,
                ReferenceTransition::Submit { at: Utc::now() },
            )
            .await?;
        if !swapped {
            return Err(AppError::InvalidState(
                "achievement already submitted or processed".to_string(),
            ));
        }
        info!("achievement {id} submitted for verification");
        self.reference(id).await
    }

    pub async fn verify(&self, claims: &Claims, id: Uuid) -> Result<Reference, AppError> {
        let reference = self.reference(id).await?;
        resolver::require_advisor_of(self.directory.as_ref(), claims, reference.student_id)
            .await?;
        if reference.status != AchievementStatus::Submitted {
            return Err(AppError::InvalidState(
                "achievement must be in status submitted".to_string(),
            ));
        }

        let swapped = self
            .references
            .transition(
                id,
                AchievementStatus::Submitted,
                ReferenceTransition::Verify {
                    at: Utc::now(),
                    by: claims.user_id,
                },
            )
            .await?;
        if !swapped {
            return Err(AppError::InvalidState(
                "achievement must be in status submitted".to_string(),
            ));
        }
        info!("achievement {id} verified by user {}", claims.user_id);
        self.reference(id).await
    }

    pub async fn reject(
        &self,
        claims: &Claims,
        id: Uuid,
        rejection_note: &str,
    ) -> Result<Reference, AppError> {
        if rejection_note.trim().is_empty() {
            return Err(AppError::Validation(
                "rejection_note is required".to_string(),
            ));
        }
        let reference = self.reference(id).await?;
        resolver::require_advisor_of(self.directory.as_ref(), claims, reference.student_id)
            .await?;
        if reference.status != AchievementStatus::Submitted {
            return Err(AppError::InvalidState(
                "achievement must be in status submitted".to_string(),
            ));
        }

        let swapped = self
            .references
            .transition(
                id,
                AchievementStatus::Submitted,
                ReferenceTransition::Reject {
                    at: Utc::now(),
                    by: claims.user_id,
                    note: rejection_note.trim().to_string(),
                },
            )
            .await?;
        if !swapped {
            return Err(AppError::InvalidState(
                "achievement must be in status submitted".to_string(),
            ));
        }
        info!("achievement {id} rejected by user {}", claims.user_id);
        self.reference(id).await
    }

    /// Owner and status gate for attachment uploads, run before the file
    /// bytes are stored. Attachments may be added while `draft` or
    /// `submitted`.
    pub async fn attachment_target(
        &self,
        claims: &Claims,
        id: Uuid,
    ) -> Result<Reference, AppError> {
        let reference = self.reference(id).await?;
        resolver::require_owner(self.directory.as_ref(), claims, reference.student_id).await?;
        if !matches!(
            reference.status,
            AchievementStatus::Draft | AchievementStatus::Submitted
        ) {
            return Err(AppError::InvalidState(
                "can only add attachments with status draft or submitted".to_string(),
            ));
        }
        Ok(reference)
    }

    /// Appends stored attachment metadata to the document. The caller has
    /// already passed `attachment_target` and stored the file bytes.
    pub async fn append_attachment(
        &self,
        reference: &Reference,
        attachment: &Attachment,
    ) -> Result<(), AppError> {
        self.achievements
            .push_attachment(&reference.document_id, attachment)
            .await
    }
}

fn validate_create(request: &CreateAchievementRequest) -> Result<(), AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("description is required".to_string()));
    }
    if request.points < 0 {
        return Err(AppError::Validation(
            "points must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use crate::models::achievement::AchievementType;
    use crate::store::memory::{
        lecturer, student, MemoryAchievementStore, MemoryDirectory, MemoryReferenceStore,
    };

    struct Harness {
        lifecycle: AchievementLifecycle,
        references: Arc<MemoryReferenceStore>,
        achievements: Arc<MemoryAchievementStore>,
        student_claims: Claims,
        advisor_claims: Claims,
        other_student_claims: Claims,
        other_advisor_claims: Claims,
    }

    fn claims(user_id: Uuid, role: Role) -> Claims {
        Claims {
            user_id,
            role,
            permissions: vec![],
            exp: usize::MAX,
        }
    }

    async fn harness() -> Harness {
        let references = Arc::new(MemoryReferenceStore::new());
        let achievements = Arc::new(MemoryAchievementStore::new());
        let directory = Arc::new(MemoryDirectory::new());

        let advisor_user = Uuid::new_v4();
        let advisor = lecturer(advisor_user);
        let student_user = Uuid::new_v4();
        let owner = student(student_user, Some(advisor.id));

        // A second advisor with their own advisee, for cross-student checks.
        let other_advisor_user = Uuid::new_v4();
        let other_advisor = lecturer(other_advisor_user);
        let other_student_user = Uuid::new_v4();
        let other = student(other_student_user, Some(other_advisor.id));

        directory.add_lecturer(advisor).await;
        directory.add_lecturer(other_advisor).await;
        directory.add_student(owner).await;
        directory.add_student(other).await;

        let lifecycle = AchievementLifecycle::new(
            references.clone(),
            achievements.clone(),
            directory.clone(),
        );

        Harness {
            lifecycle,
            references,
            achievements,
            student_claims: claims(student_user, Role::Student),
            advisor_claims: claims(advisor_user, Role::Advisor),
            other_student_claims: claims(other_student_user, Role::Student),
            other_advisor_claims: claims(other_advisor_user, Role::Advisor),
        }
    }

    fn create_request(title: &str, points: i32) -> CreateAchievementRequest {
        CreateAchievementRequest {
            achievement_type: AchievementType::Competition,
            title: title.to_string(),
            description: "National programming contest".to_string(),
            details: serde_json::Map::new(),
            tags: vec!["programming".to_string()],
            points,
        }
    }

    fn attachment() -> Attachment {
        Attachment {
            file_name: "certificate.pdf".to_string(),
            file_url: "attachments/test/certificate.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_returns_draft_with_no_attachments() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let fetched = h.lifecycle.get(&h.student_claims, created.id).await.unwrap();
        assert_eq!(fetched.status, AchievementStatus::Draft);
        assert!(fetched.attachments.is_empty());
        assert_eq!(fetched.title, "Juara 1");
        assert_eq!(fetched.points, 100);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let h = harness().await;
        let err = h
            .lifecycle
            .create(&h.student_claims, create_request("   ", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_negative_points() {
        let h = harness().await;
        let err = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", -5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_compensates_document_on_reference_failure() {
        let h = harness().await;
        h.references.fail_next_create();

        let err = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        // No orphaned document left behind.
        assert_eq!(h.achievements.len().await, 0);
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let err = h
            .lifecycle
            .update(
                &h.other_student_claims,
                created.id,
                UpdateAchievementRequest::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_after_submit_is_invalid_state() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();

        let err = h
            .lifecycle
            .update(
                &h.student_claims,
                created.id,
                UpdateAchievementRequest::default(),
            )
            .await
            .unwrap_err();
        match err {
            AppError::InvalidState(msg) => {
                assert_eq!(msg, "can only update achievement with status draft")
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_applies_only_supplied_fields() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let updated = h
            .lifecycle
            .update(
                &h.student_claims,
                created.id,
                UpdateAchievementRequest {
                    title: Some("Juara 2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Juara 2");
        assert_eq!(updated.points, 100);
        assert_eq!(updated.description, "National programming contest");
    }

    #[tokio::test]
    async fn test_update_can_reset_points_to_zero() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let updated = h
            .lifecycle
            .update(
                &h.student_claims,
                created.id,
                UpdateAchievementRequest {
                    points: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.points, 0);
    }

    #[tokio::test]
    async fn test_delete_twice_reports_invalid_state_not_missing() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        h.lifecycle
            .delete(&h.student_claims, created.id)
            .await
            .unwrap();
        // The reference persists after soft delete; a second delete sees the
        // terminal status, not a missing row.
        let err = h
            .lifecycle
            .delete(&h.student_claims, created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_submit_stamps_submitted_at() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let reference = h
            .lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();
        assert_eq!(reference.status, AchievementStatus::Submitted);
        assert!(reference.submitted_at.is_some());
    }

    #[tokio::test]
    async fn test_double_submit_is_invalid_state() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();

        let err = h
            .lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap_err();
        match err {
            AppError::InvalidState(msg) => {
                assert_eq!(msg, "achievement already submitted or processed")
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_requires_submitted_status() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let err = h
            .lifecycle
            .verify(&h.advisor_claims, created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_verify_by_wrong_advisor_is_forbidden() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();

        let err = h
            .lifecycle
            .verify(&h.other_advisor_claims, created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_full_round_trip_to_verified() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();
        let reference = h
            .lifecycle
            .verify(&h.advisor_claims, created.id)
            .await
            .unwrap();

        assert_eq!(reference.status, AchievementStatus::Verified);
        assert!(reference.verified_at.is_some());
        assert_eq!(reference.verified_by, Some(h.advisor_claims.user_id));

        // The document payload is untouched by the workflow.
        let view = h.lifecycle.get(&h.advisor_claims, created.id).await.unwrap();
        assert_eq!(view.title, "Juara 1");
        assert_eq!(view.points, 100);
    }

    #[tokio::test]
    async fn test_reject_requires_note() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();

        let err = h
            .lifecycle
            .reject(&h.advisor_claims, created.id, "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reject_stamps_rejection_fields_only() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();

        let reference = h
            .lifecycle
            .reject(&h.advisor_claims, created.id, "missing certificate scan")
            .await
            .unwrap();
        assert_eq!(reference.status, AchievementStatus::Rejected);
        assert_eq!(
            reference.rejection_note.as_deref(),
            Some("missing certificate scan")
        );
        assert_eq!(reference.rejected_by, Some(h.advisor_claims.user_id));
        assert!(reference.rejected_at.is_some());
        // verified_* is never reused for rejections.
        assert!(reference.verified_at.is_none());
        assert!(reference.verified_by.is_none());
    }

    #[tokio::test]
    async fn test_attachments_allowed_while_draft_and_submitted() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();

        let target = h
            .lifecycle
            .attachment_target(&h.student_claims, created.id)
            .await
            .unwrap();
        h.lifecycle
            .append_attachment(&target, &attachment())
            .await
            .unwrap();

        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();
        let target = h
            .lifecycle
            .attachment_target(&h.student_claims, created.id)
            .await
            .unwrap();
        h.lifecycle
            .append_attachment(&target, &attachment())
            .await
            .unwrap();

        let view = h.lifecycle.get(&h.student_claims, created.id).await.unwrap();
        assert_eq!(view.attachments.len(), 2);
    }

    #[tokio::test]
    async fn test_attachments_rejected_once_verified() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();
        h.lifecycle
            .verify(&h.advisor_claims, created.id)
            .await
            .unwrap();

        let err = h
            .lifecycle
            .attachment_target(&h.student_claims, created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let h = harness().await;
        let err = h
            .lifecycle
            .get(&h.student_claims, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cas_transition_with_stale_expected_status_writes_nothing() {
        let h = harness().await;
        let created = h
            .lifecycle
            .create(&h.student_claims, create_request("Juara 1", 100))
            .await
            .unwrap();
        h.lifecycle
            .submit(&h.student_claims, created.id)
            .await
            .unwrap();

        // A writer that still believes the row is draft loses the race.
        let swapped = h
            .references
            .transition(
                created.id,
                AchievementStatus::Draft,
                ReferenceTransition::SoftDelete,
            )
            .await
            .unwrap();
        assert!(!swapped);

        let reference = h.references.get(created.id).await.unwrap().unwrap();
        assert_eq!(reference.status, AchievementStatus::Submitted);
    }
}
