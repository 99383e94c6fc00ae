//! Aggregated achievement statistics.
//!
//! Aggregation happens in memory over the references visible to the caller.
//! A reference whose document is missing contributes to nothing, including
//! the total. The top-students ranking is a stable descending sort on points
//! with no tiebreak, so students with equal points keep the order in which
//! they were first seen.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{AchievementType, Reference};
use crate::store::{AchievementStore, Directory};

const TOP_STUDENTS: usize = 10;

#[derive(Debug, Serialize)]
pub struct StudentRank {
    pub student_id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub total_achievements: i64,
    pub total_points: i64,
}

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_achievements: i64,
    pub total_points: i64,
    pub by_type: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
    pub by_period: BTreeMap<String, i64>,
    pub competition_levels: BTreeMap<String, i64>,
    pub top_students: Vec<StudentRank>,
}

pub async fn aggregate(
    references: Vec<Reference>,
    achievements: &dyn AchievementStore,
    directory: &dyn Directory,
) -> Result<Statistics, AppError> {
    let mut total_achievements = 0i64;
    let mut total_points = 0i64;
    let mut by_type = BTreeMap::new();
    let mut by_status = BTreeMap::new();
    let mut by_period = BTreeMap::new();
    let mut competition_levels = BTreeMap::new();

    let mut per_student: HashMap<Uuid, (i64, i64)> = HashMap::new();
    let mut student_order: Vec<Uuid> = Vec::new();

    for reference in &references {
        let doc = match achievements.fetch(&reference.document_id).await {
            Ok(Some(doc)) => doc,
            _ => continue,
        };

        total_achievements += 1;
        total_points += i64::from(doc.points);
        *by_type
            .entry(doc.achievement_type.as_str().to_string())
            .or_insert(0) += 1;
        *by_status
            .entry(reference.status.as_str().to_string())
            .or_insert(0) += 1;
        *by_period
            .entry(doc.created_at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        if doc.achievement_type == AchievementType::Competition {
            if let Some(Value::String(level)) = doc.details.get("competitionLevel") {
                *competition_levels.entry(level.clone()).or_insert(0) += 1;
            }
        }

        let entry = per_student.entry(reference.student_id).or_insert_with(|| {
            student_order.push(reference.student_id);
            (0, 0)
        });
        entry.0 += 1;
        entry.1 += i64::from(doc.points);
    }

    let mut ranked: Vec<(Uuid, i64, i64)> = student_order
        .into_iter()
        .map(|sid| {
            let (count, points) = per_student[&sid];
            (sid, count, points)
        })
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2));
    ranked.truncate(TOP_STUDENTS);

    let mut top_students = Vec::with_capacity(ranked.len());
    for (student_id, total_achievements, total_points) in ranked {
        let (student_number, full_name) = resolve_identity(directory, student_id).await?;
        top_students.push(StudentRank {
            student_id,
            student_number,
            full_name,
            total_achievements,
            total_points,
        });
    }

    Ok(Statistics {
        total_achievements,
        total_points,
        by_type,
        by_status,
        by_period,
        competition_levels,
        top_students,
    })
}

async fn resolve_identity(
    directory: &dyn Directory,
    student_id: Uuid,
) -> Result<(String, String), AppError> {
    let Some(student) = directory.student_by_id(student_id).await? else {
        return Ok((String::new(), String::new()));
    };
    let full_name = directory
        .user_by_id(student.user_id)
        .await?
        .map(|u| u.full_name)
        .unwrap_or_default();
    Ok((student.student_number, full_name))
}
