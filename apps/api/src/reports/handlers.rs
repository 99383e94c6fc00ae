use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::achievement::listing::{self, Page};
use crate::auth::claims::Claims;
use crate::auth::resolver;
use crate::errors::AppError;
use crate::models::achievement::AchievementStatus;
use crate::reports::statistics::{self, Statistics};
use crate::state::AppState;
use crate::store::ReferenceFilter;

/// Upper bound on rows scanned for an in-memory aggregation pass.
const AGGREGATION_SCAN_LIMIT: i64 = 10_000;

#[derive(Serialize)]
pub struct RecentAchievement {
    pub title: String,
    pub achievement_type: String,
    pub status: AchievementStatus,
    pub points: i32,
    pub date: String,
}

#[derive(Serialize)]
pub struct StudentReport {
    pub student_id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub program_study: String,
    pub academic_year: String,
    pub total_achievements: i64,
    pub total_points: i64,
    pub verified: i64,
    pub submitted: i64,
    pub rejected: i64,
    pub by_type: BTreeMap<String, i64>,
    pub recent: Vec<RecentAchievement>,
}

/// GET /api/v1/reports/statistics
///
/// Scoped the same way listing is: students aggregate over their own
/// references, advisors over their advisees', admins over everything.
pub async fn handle_statistics(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Statistics>, AppError> {
    let scan = Page {
        page: 1,
        page_size: AGGREGATION_SCAN_LIMIT,
    };
    let (references, _) = listing::scoped_references(
        state.references.as_ref(),
        state.directory.as_ref(),
        &claims,
        None,
        scan,
    )
    .await?;
    let stats = statistics::aggregate(
        references,
        state.achievements.as_ref(),
        state.directory.as_ref(),
    )
    .await?;
    Ok(Json(stats))
}

/// GET /api/v1/reports/students/:id
pub async fn handle_student_report(
    State(state): State<AppState>,
    claims: Claims,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentReport>, AppError> {
    let student = state
        .directory
        .student_by_id(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("student not found".to_string()))?;
    resolver::authorize_read(state.directory.as_ref(), &claims, student_id).await?;

    let full_name = state
        .directory
        .user_by_id(student.user_id)
        .await?
        .map(|u| u.full_name)
        .unwrap_or_default();

    let references = state
        .references
        .list_by_student(student_id, ReferenceFilter::all(AGGREGATION_SCAN_LIMIT))
        .await?;
    let stats = statistics::aggregate(
        references.clone(),
        state.achievements.as_ref(),
        state.directory.as_ref(),
    )
    .await?;

    let count = |status: AchievementStatus| {
        stats
            .by_status
            .get(status.as_str())
            .copied()
            .unwrap_or_default()
    };
    let (verified, submitted, rejected) = (
        count(AchievementStatus::Verified),
        count(AchievementStatus::Submitted),
        count(AchievementStatus::Rejected),
    );

    // References come back newest first; the five most recent with a live
    // document form the recent-activity strip. Fetch failures are skipped
    // the same way the aggregator skips them.
    let mut recent = Vec::new();
    for reference in &references {
        if recent.len() == 5 {
            break;
        }
        let doc = match state.achievements.fetch(&reference.document_id).await {
            Ok(Some(doc)) => doc,
            _ => continue,
        };
        recent.push(RecentAchievement {
            title: doc.title,
            achievement_type: doc.achievement_type.as_str().to_string(),
            status: reference.status,
            points: doc.points,
            date: doc.created_at.format("%Y-%m-%d").to_string(),
        });
    }

    Ok(Json(StudentReport {
        student_id,
        student_number: student.student_number,
        full_name,
        program_study: student.program_study,
        academic_year: student.academic_year,
        total_achievements: stats.total_achievements,
        total_points: stats.total_points,
        verified,
        submitted,
        rejected,
        by_type: stats.by_type,
        recent,
    }))
}
