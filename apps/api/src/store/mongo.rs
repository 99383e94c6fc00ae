use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{self, doc, oid::ObjectId};
use mongodb::Collection;

use crate::errors::AppError;
use crate::models::achievement::{AchievementDoc, Attachment};
use crate::store::AchievementStore;

const COLLECTION: &str = "achievements";

pub struct MongoAchievementStore {
    collection: Collection<AchievementDoc>,
}

impl MongoAchievementStore {
    pub fn new(database: &mongodb::Database) -> Self {
        MongoAchievementStore {
            collection: database.collection(COLLECTION),
        }
    }
}

fn parse_object_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id)
        .map_err(|_| AppError::NotFound(format!("achievement document '{id}' not found")))
}

#[async_trait]
impl AchievementStore for MongoAchievementStore {
    async fn insert(&self, doc: &AchievementDoc) -> Result<String, AppError> {
        let result = self.collection.insert_one(doc, None).await?;
        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| {
                AppError::Persistence("document insert returned a non-ObjectId key".to_string())
            })
    }

    async fn fetch(&self, id: &str) -> Result<Option<AchievementDoc>, AppError> {
        let oid = match ObjectId::parse_str(id) {
            Ok(oid) => oid,
            Err(_) => return Ok(None),
        };
        Ok(self.collection.find_one(doc! { "_id": oid }, None).await?)
    }

    async fn replace(&self, id: &str, doc: &AchievementDoc) -> Result<(), AppError> {
        let oid = parse_object_id(id)?;
        let mut update = bson::to_document(doc)
            .map_err(|e| AppError::Persistence(format!("serialize achievement document: {e}")))?;
        update.remove("_id");
        self.collection
            .update_one(doc! { "_id": oid }, doc! { "$set": update }, None)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let oid = parse_object_id(id)?;
        self.collection.delete_one(doc! { "_id": oid }, None).await?;
        Ok(())
    }

    async fn push_attachment(&self, id: &str, attachment: &Attachment) -> Result<(), AppError> {
        let oid = parse_object_id(id)?;
        let attachment = bson::to_bson(attachment)
            .map_err(|e| AppError::Persistence(format!("serialize attachment: {e}")))?;
        let updated_at = bson::to_bson(&Utc::now())
            .map_err(|e| AppError::Persistence(format!("serialize timestamp: {e}")))?;
        self.collection
            .update_one(
                doc! { "_id": oid },
                doc! {
                    "$push": { "attachments": attachment },
                    "$set": { "updated_at": updated_at },
                },
                None,
            )
            .await?;
        Ok(())
    }
}
