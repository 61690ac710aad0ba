use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sha1::{Digest, Sha1};

use crate::{
    course::CourseKey,
    errors::PartitionError,
    partitions::partition_models::{Group, PartitionId, User, UserPartition},
    schemes::{AssignmentTracker, PartitionScheme},
    user_tags::UserTagStore,
};

pub const RANDOM_SCHEME: &str = "random";
pub const ASSIGNED_USER_TO_PARTITION_EVENT: &str = "xmodule.partitions.assigned_user_to_partition";

const LONG_SCALE: u64 = 0xfffffffffffffff;

/// Spreads learners evenly over a partition's groups and remembers the
/// choice in the user's course tags.
pub struct RandomScheme {
    tag_store: Arc<UserTagStore>,
}

impl RandomScheme {
    pub fn new(tag_store: Arc<UserTagStore>) -> Self {
        RandomScheme { tag_store }
    }

    pub fn key_for_partition(partition_id: PartitionId) -> String {
        format!("xblock.partition_service.partition_{partition_id}")
    }

    /// Returns a float between 0 and 1 that is stable for the same course,
    /// partition and user, and uniformly distributed across users.
    pub fn get_hash(course_id: &CourseKey, partition_id: PartitionId, user: &User) -> f64 {
        let hash_key = format!("{}.{}.{}", course_id, partition_id, user.id);
        let mut hasher = Sha1::new();
        hasher.update(hash_key.as_bytes());
        let result = hasher.finalize();
        // only the leading 60 bits are used, so the value fits in LONG_SCALE
        let mut leading = [0u8; 8];
        leading.copy_from_slice(&result[..8]);
        let hash_val = u64::from_be_bytes(leading) >> 4;

        hash_val as f64 / LONG_SCALE as f64
    }

    fn choose_group<'a>(
        course_id: &CourseKey,
        partition: &'a UserPartition,
        user: &User,
    ) -> Option<&'a Group> {
        let hash = Self::get_hash(course_id, partition.id, user);
        let index = (hash * partition.groups.len() as f64) as usize;
        partition
            .groups
            .get(index.min(partition.groups.len().saturating_sub(1)))
    }
}

#[async_trait]
impl PartitionScheme for RandomScheme {
    fn name(&self) -> &str {
        RANDOM_SCHEME
    }

    async fn get_group_for_user(
        &self,
        course_id: &CourseKey,
        user: &User,
        partition: &UserPartition,
        assign: bool,
        tracker: Option<&(dyn AssignmentTracker + Send + Sync)>,
    ) -> Result<Option<Group>, PartitionError> {
        let partition_key = Self::key_for_partition(partition.id);
        let stored = self
            .tag_store
            .get_course_tag(user.id, course_id, &partition_key)
            .await?;

        if let Some(raw) = stored {
            match raw.parse::<i64>().ok().and_then(|id| partition.get_group(id)) {
                Some(group) => return Ok(Some(group.clone())),
                None => tracing::warn!(
                    "group {} not found in partition {} for user {}, reassigning",
                    raw,
                    partition.id,
                    user.id
                ),
            }
        }

        if !assign || partition.groups.is_empty() {
            return Ok(None);
        }

        let Some(group) = Self::choose_group(course_id, partition, user) else {
            return Ok(None);
        };

        self.tag_store
            .set_course_tag(user.id, course_id, &partition_key, group.id.to_string())
            .await?;

        tracing::debug!(
            user_id = user.id,
            partition_id = partition.id,
            group_id = group.id,
            "assigned user to partition group"
        );

        if let Some(tracker) = tracker {
            tracker.track(
                ASSIGNED_USER_TO_PARTITION_EVENT,
                json!({
                    "partition_id": partition.id,
                    "partition_name": partition.name,
                    "group_id": group.id,
                    "group_name": group.name,
                }),
            );
        }

        Ok(Some(group.clone()))
    }
}
