use std::sync::Arc;

use tracing::instrument;

use crate::{
    course::{CourseKey, CourseProvider},
    errors::PartitionError,
    partitions::{
        group_cache::RequestCache,
        partition_lookup::{get_course_user_partitions, get_partition_from_id},
        partition_models::{Group, GroupId, PartitionId, User, UserPartition},
    },
    schemes::{AssignmentTracker, SchemeRegistry},
};

/// Resolves which group a user belongs to in each of a course's partitions.
///
/// One service is built per (user, course) request. Resolved group ids are
/// kept in the optional cache; assignment itself is left to each
/// partition's scheme.
pub struct PartitionService {
    user: User,
    course_id: CourseKey,
    courses: Arc<dyn CourseProvider + Send + Sync>,
    registry: Arc<SchemeRegistry>,
    tracker: Option<Arc<dyn AssignmentTracker + Send + Sync>>,
    cache: Option<Arc<dyn RequestCache + Send + Sync>>,
}

impl PartitionService {
    pub fn new(
        user: User,
        course_id: CourseKey,
        courses: Arc<dyn CourseProvider + Send + Sync>,
        registry: Arc<SchemeRegistry>,
    ) -> Self {
        PartitionService {
            user,
            course_id,
            courses,
            registry,
            tracker: None,
            cache: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn AssignmentTracker + Send + Sync>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn RequestCache + Send + Sync>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// All partitions of the course, static and dynamic.
    pub async fn course_partitions(&self) -> Result<Vec<UserPartition>, PartitionError> {
        let course = self.courses.get_course(&self.course_id).await?;
        Ok(get_course_user_partitions(&course, &self.registry))
    }

    pub fn cache_key(&self, partition_id: PartitionId) -> String {
        format!(
            "PartitionService.ugidfp.{}.{}.{}",
            self.user.id, self.course_id, partition_id
        )
    }

    /// Returns the id of the user's group in the given partition, assigning
    /// and persisting one through the partition's scheme if needed.
    ///
    /// `Ok(None)` means the scheme put the user in no group. Fails with
    /// `PartitionError::PartitionNotFound` if the course has no partition
    /// with this id.
    #[instrument(skip_all)]
    pub async fn get_user_group_id_for_partition(
        &self,
        partition_id: PartitionId,
    ) -> Result<Option<GroupId>, PartitionError> {
        let cache_key = self.cache_key(partition_id);

        if let Some(cache) = &self.cache {
            match cache.get(&cache_key).await {
                Ok(Some(group_id)) => return Ok(group_id),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to read group cache: {}", e),
            }
        }

        let user_partition = self.get_user_partition(partition_id).await?.ok_or_else(|| {
            PartitionError::PartitionNotFound {
                partition_id,
                course_id: self.course_id.to_string(),
            }
        })?;

        let group = self.get_group(&user_partition, true).await?;
        let group_id = group.map(|g| g.id);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&cache_key, group_id).await {
                tracing::warn!("Failed to update group cache: {}", e);
            }
        }

        Ok(group_id)
    }

    async fn get_user_partition(
        &self,
        partition_id: PartitionId,
    ) -> Result<Option<UserPartition>, PartitionError> {
        let partitions = self.course_partitions().await?;
        Ok(get_partition_from_id(&partitions, partition_id).cloned())
    }

    /// Returns the user's group in `user_partition`. With `assign` unset this
    /// is a pure lookup and never records a new assignment.
    #[instrument(skip_all)]
    pub async fn get_group(
        &self,
        user_partition: &UserPartition,
        assign: bool,
    ) -> Result<Option<Group>, PartitionError> {
        user_partition
            .scheme
            .get_group_for_user(
                &self.course_id,
                &self.user,
                user_partition,
                assign,
                self.tracker.as_deref(),
            )
            .await
    }
}
