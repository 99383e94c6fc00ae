//! Authorization decisions for achievement access. Pure reads over the
//! profile directory; nothing here mutates state.

use uuid::Uuid;

use crate::auth::claims::{Claims, Role};
use crate::errors::AppError;
use crate::models::profile::{Lecturer, Student};
use crate::store::Directory;

/// Read eligibility for a reference owned by `target_student_id`:
/// students see their own, advisors see their advisees', admins see all.
pub async fn authorize_read(
    directory: &dyn Directory,
    claims: &Claims,
    target_student_id: Uuid,
) -> Result<(), AppError> {
    match claims.role {
        Role::Student => {
            let student = directory.student_by_user_id(claims.user_id).await?;
            match student {
                Some(s) if s.id == target_student_id => Ok(()),
                _ => Err(AppError::Forbidden("access denied".to_string())),
            }
        }
        Role::Advisor => {
            require_advisor_of(directory, claims, target_student_id).await?;
            Ok(())
        }
        Role::Admin => Ok(()),
    }
}

/// Resolves the caller's student profile and checks it owns the reference.
/// Callers without a student profile (e.g. admins) are rejected: owner-only
/// operations really are owner-only.
pub async fn require_owner(
    directory: &dyn Directory,
    claims: &Claims,
    target_student_id: Uuid,
) -> Result<Student, AppError> {
    let student = directory
        .student_by_user_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("access denied".to_string()))?;
    if student.id != target_student_id {
        return Err(AppError::Forbidden("access denied".to_string()));
    }
    Ok(student)
}

/// Resolves the caller's lecturer profile and checks it is the advisor of
/// `student_id`, following the student -> advisor -> lecturer chain.
pub async fn require_advisor_of(
    directory: &dyn Directory,
    claims: &Claims,
    student_id: Uuid,
) -> Result<Lecturer, AppError> {
    let lecturer = directory
        .lecturer_by_user_id(claims.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Forbidden("you are not the advisor of this student".to_string())
        })?;
    let student = directory.student_by_id(student_id).await?;
    match student {
        Some(s) if s.advisor_id == Some(lecturer.id) => Ok(lecturer),
        _ => Err(AppError::Forbidden(
            "you are not the advisor of this student".to_string(),
        )),
    }
}

/// Resolves the caller's own student profile, for operations that create
/// records on the student's behalf.
pub async fn require_student_profile(
    directory: &dyn Directory,
    claims: &Claims,
) -> Result<Student, AppError> {
    directory
        .student_by_user_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("student profile not found".to_string()))
}
