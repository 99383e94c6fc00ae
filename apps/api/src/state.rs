use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use jsonwebtoken::DecodingKey;

use crate::achievement::lifecycle::AchievementLifecycle;
use crate::config::Config;
use crate::store::{AchievementStore, Directory, ReferenceStore};

/// Shared application state, cloned per request by axum.
#[derive(Clone)]
pub struct AppState {
    pub s3: S3Client,
    pub config: Config,
    pub decoding_key: Arc<DecodingKey>,
    pub references: Arc<dyn ReferenceStore>,
    pub achievements: Arc<dyn AchievementStore>,
    pub directory: Arc<dyn Directory>,
    pub lifecycle: Arc<AchievementLifecycle>,
}
