//! In-memory implementations of the store traits, used by unit tests in
//! place of live Postgres/MongoDB connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::{AchievementDoc, AchievementStatus, Attachment, Reference};
use crate::models::profile::{Lecturer, Student, UserAccount};
use crate::store::{
    AchievementStore, Directory, ReferenceFilter, ReferenceStore, ReferenceTransition,
};

#[derive(Default)]
pub struct MemoryReferenceStore {
    rows: RwLock<HashMap<Uuid, Reference>>,
    /// student_id -> advisor_id, mirroring the join the Postgres store does.
    advisees: RwLock<HashMap<Uuid, Uuid>>,
    fail_create: AtomicBool,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create` call fail, for exercising the compensating
    /// document delete.
    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub async fn set_advisor(&self, student_id: Uuid, advisor_id: Uuid) {
        self.advisees.write().await.insert(student_id, advisor_id);
    }

    async fn select(
        &self,
        filter: ReferenceFilter,
        matches: impl Fn(&Reference) -> bool,
    ) -> Vec<Reference> {
        let rows = self.rows.read().await;
        let mut selected: Vec<Reference> = rows
            .values()
            .filter(|r| r.status != AchievementStatus::Deleted)
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| matches(r))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect()
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn create(&self, reference: &Reference) -> Result<(), AppError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::Persistence(
                "simulated reference insert failure".to_string(),
            ));
        }
        self.rows
            .write()
            .await
            .insert(reference.id, reference.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reference>, AppError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        change: ReferenceTransition,
    ) -> Result<bool, AppError> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.status != expected {
            return Ok(false);
        }
        row.status = change.target_status();
        row.updated_at = Utc::now();
        match change {
            ReferenceTransition::Submit { at } => row.submitted_at = Some(at),
            ReferenceTransition::Verify { at, by } => {
                row.verified_at = Some(at);
                row.verified_by = Some(by);
            }
            ReferenceTransition::Reject { at, by, note } => {
                row.rejected_at = Some(at);
                row.rejected_by = Some(by);
                row.rejection_note = Some(note);
            }
            ReferenceTransition::SoftDelete => {}
        }
        Ok(true)
    }

    async fn list_by_student(
        &self,
        student_id: Uuid,
        filter: ReferenceFilter,
    ) -> Result<Vec<Reference>, AppError> {
        Ok(self
            .select(filter, |r| r.student_id == student_id)
            .await)
    }

    async fn count_by_student(
        &self,
        student_id: Uuid,
        status: Option<AchievementStatus>,
    ) -> Result<i64, AppError> {
        let filter = ReferenceFilter {
            status,
            limit: i64::MAX,
            offset: 0,
        };
        Ok(self.select(filter, |r| r.student_id == student_id).await.len() as i64)
    }

    async fn list_by_advisor(
        &self,
        advisor_id: Uuid,
        filter: ReferenceFilter,
    ) -> Result<Vec<Reference>, AppError> {
        let advisees = self.advisees.read().await.clone();
        Ok(self
            .select(filter, |r| advisees.get(&r.student_id) == Some(&advisor_id))
            .await)
    }

    async fn count_by_advisor(
        &self,
        advisor_id: Uuid,
        status: Option<AchievementStatus>,
    ) -> Result<i64, AppError> {
        let filter = ReferenceFilter {
            status,
            limit: i64::MAX,
            offset: 0,
        };
        let advisees = self.advisees.read().await.clone();
        Ok(self
            .select(filter, |r| advisees.get(&r.student_id) == Some(&advisor_id))
            .await
            .len() as i64)
    }

    async fn list_all(&self, filter: ReferenceFilter) -> Result<Vec<Reference>, AppError> {
        Ok(self.select(filter, |_| true).await)
    }

    async fn count_all(&self, status: Option<AchievementStatus>) -> Result<i64, AppError> {
        let filter = ReferenceFilter {
            status,
            limit: i64::MAX,
            offset: 0,
        };
        Ok(self.select(filter, |_| true).await.len() as i64)
    }
}

#[derive(Default)]
pub struct MemoryAchievementStore {
    docs: RwLock<HashMap<String, AchievementDoc>>,
    fail_fetch: AtomicBool,
}

impl MemoryAchievementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Makes the next `fetch` call fail, for exercising the skip-on-failure
    /// tolerance in listing and aggregation.
    pub fn fail_next_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AchievementStore for MemoryAchievementStore {
    async fn insert(&self, doc: &AchievementDoc) -> Result<String, AppError> {
        let oid = ObjectId::new();
        let mut stored = doc.clone();
        stored.id = Some(oid);
        self.docs.write().await.insert(oid.to_hex(), stored);
        Ok(oid.to_hex())
    }

    async fn fetch(&self, id: &str) -> Result<Option<AchievementDoc>, AppError> {
        if self.fail_fetch.swap(false, Ordering::SeqCst) {
            return Err(AppError::Persistence(
                "simulated document fetch failure".to_string(),
            ));
        }
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn replace(&self, id: &str, doc: &AchievementDoc) -> Result<(), AppError> {
        let mut docs = self.docs.write().await;
        if !docs.contains_key(id) {
            return Err(AppError::Persistence(format!(
                "document '{id}' does not exist"
            )));
        }
        docs.insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.docs.write().await.remove(id);
        Ok(())
    }

    async fn push_attachment(&self, id: &str, attachment: &Attachment) -> Result<(), AppError> {
        let mut docs = self.docs.write().await;
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| AppError::Persistence(format!("document '{id}' does not exist")))?;
        doc.attachments.push(attachment.clone());
        doc.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    students: RwLock<HashMap<Uuid, Student>>,
    lecturers: RwLock<HashMap<Uuid, Lecturer>>,
    users: RwLock<HashMap<Uuid, UserAccount>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_student(&self, student: Student) {
        self.students.write().await.insert(student.id, student);
    }

    pub async fn add_lecturer(&self, lecturer: Lecturer) {
        self.lecturers.write().await.insert(lecturer.id, lecturer);
    }

    pub async fn add_user(&self, user: UserAccount) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(self
            .students
            .read()
            .await
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>, AppError> {
        Ok(self.students.read().await.get(&id).cloned())
    }

    async fn lecturer_by_user_id(&self, user_id: Uuid) -> Result<Option<Lecturer>, AppError> {
        Ok(self
            .lecturers
            .read()
            .await
            .values()
            .find(|l| l.user_id == user_id)
            .cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

/// Builders shared across test modules.
pub fn student(user_id: Uuid, advisor_id: Option<Uuid>) -> Student {
    Student {
        id: Uuid::new_v4(),
        user_id,
        student_number: format!("NIM-{}", &user_id.simple().to_string()[..8]),
        program_study: "Informatics".to_string(),
        academic_year: "2024/2025".to_string(),
        advisor_id,
        created_at: Utc::now(),
    }
}

pub fn lecturer(user_id: Uuid) -> Lecturer {
    Lecturer {
        id: Uuid::new_v4(),
        user_id,
        lecturer_number: format!("NIP-{}", &user_id.simple().to_string()[..8]),
        department: "Computer Science".to_string(),
        created_at: Utc::now(),
    }
}

pub fn user(id: Uuid, full_name: &str) -> UserAccount {
    UserAccount {
        id,
        username: full_name.to_lowercase().replace(' ', "."),
        email: format!("{}@campus.test", full_name.to_lowercase().replace(' ', ".")),
        full_name: full_name.to_string(),
        is_active: true,
        created_at: Utc::now(),
    }
}
