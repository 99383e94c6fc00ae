//! Role-scoped listing with pagination. Students see their own references,
//! advisors their advisees', admins everything. Soft-deleted rows never
//! appear; the stores filter them out.

use serde::Serialize;
use tracing::warn;

use crate::auth::claims::{Claims, Role};
use crate::errors::AppError;
use crate::models::achievement::{AchievementStatus, AchievementView, Reference};
use crate::store::{AchievementStore, Directory, ReferenceFilter, ReferenceStore};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Normalized pagination window. Out-of-range input falls back to the
/// defaults rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    pub fn from_params(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p,
            _ => 1,
        };
        let page_size = match page_size {
            Some(s) if (1..=MAX_PAGE_SIZE).contains(&s) => s,
            _ => DEFAULT_PAGE_SIZE,
        };
        Page { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.page_size - 1) / self.page_size
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Fetches one page of references visible to the caller, plus the total
/// count for the same scope and status filter.
pub async fn scoped_references(
    references: &dyn ReferenceStore,
    directory: &dyn Directory,
    claims: &Claims,
    status: Option<AchievementStatus>,
    page: Page,
) -> Result<(Vec<Reference>, Pagination), AppError> {
    let filter = ReferenceFilter {
        status,
        limit: page.page_size,
        offset: page.offset(),
    };

    let (rows, total) = match claims.role {
        Role::Student => {
            let student = directory
                .student_by_user_id(claims.user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("student profile not found".to_string()))?;
            let rows = references.list_by_student(student.id, filter).await?;
            let total = references.count_by_student(student.id, status).await?;
            (rows, total)
        }
        Role::Advisor => {
            let lecturer = directory
                .lecturer_by_user_id(claims.user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("lecturer profile not found".to_string()))?;
            let rows = references.list_by_advisor(lecturer.id, filter).await?;
            let total = references.count_by_advisor(lecturer.id, status).await?;
            (rows, total)
        }
        Role::Admin => {
            let rows = references.list_all(filter).await?;
            let total = references.count_all(status).await?;
            (rows, total)
        }
    };

    let pagination = Pagination {
        page: page.page,
        page_size: page.page_size,
        total,
        total_pages: page.total_pages(total),
    };
    Ok((rows, pagination))
}

/// Joins references with their documents. A reference whose document is
/// missing or fails to fetch is logged and skipped rather than failing the
/// whole page, the same tolerance the statistics aggregator applies.
pub async fn build_views(
    achievements: &dyn AchievementStore,
    references: Vec<Reference>,
) -> Result<Vec<AchievementView>, AppError> {
    let mut views = Vec::with_capacity(references.len());
    for reference in references {
        match achievements.fetch(&reference.document_id).await {
            Ok(Some(doc)) => views.push(AchievementView::from_parts(doc, &reference)),
            Ok(None) => warn!(
                "reference {} points at missing document {}",
                reference.id, reference.document_id
            ),
            Err(e) => warn!(
                "skipping reference {}: fetch of document {} failed: {e}",
                reference.id, reference.document_id
            ),
        }
    }
    Ok(views)
}
