use std::sync::Arc;

use tracing::instrument;

use crate::{
    course::CourseKey,
    errors::PartitionError,
    partitions::partition_models::UserId,
    redis::{Client, CustomRedisError},
};

pub const USER_TAGS_CACHE_PREFIX: &str = "course_partitions:user_tags:";

/// Per-user, per-course key/value tags. Schemes use these to remember
/// which group a learner was put in.
pub struct UserTagStore {
    client: Arc<dyn Client + Send + Sync>,
}

impl UserTagStore {
    pub fn new(client: Arc<dyn Client + Send + Sync>) -> Self {
        UserTagStore { client }
    }

    pub fn tag_key(course_id: &CourseKey, user_id: UserId, key: &str) -> String {
        format!("{USER_TAGS_CACHE_PREFIX}{course_id}:{user_id}:{key}")
    }

    #[instrument(skip_all)]
    pub async fn get_course_tag(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        key: &str,
    ) -> Result<Option<String>, PartitionError> {
        match self
            .client
            .get(Self::tag_key(course_id, user_id, key))
            .await
        {
            Ok(value) => Ok(Some(value)),
            Err(CustomRedisError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all)]
    pub async fn set_course_tag(
        &self,
        user_id: UserId,
        course_id: &CourseKey,
        key: &str,
        value: String,
    ) -> Result<(), PartitionError> {
        self.client
            .set(Self::tag_key(course_id, user_id, key), value)
            .await?;
        Ok(())
    }
}
