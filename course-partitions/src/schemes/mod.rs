use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    course::CourseKey,
    errors::PartitionError,
    partitions::partition_models::{Group, User, UserPartition},
    user_tags::UserTagStore,
};

pub mod enrollment_track_scheme;
pub mod random_scheme;

pub use enrollment_track_scheme::{EnrollmentStore, EnrollmentTrackScheme};
pub use random_scheme::RandomScheme;

/// Receives analytics events emitted when a scheme makes a new assignment.
pub trait AssignmentTracker {
    fn track(&self, event_name: &str, payload: Value);
}

impl<F> AssignmentTracker for F
where
    F: Fn(&str, Value),
{
    fn track(&self, event_name: &str, payload: Value) {
        self(event_name, payload)
    }
}

#[async_trait]
pub trait PartitionScheme {
    fn name(&self) -> &str;

    /// Groups a partition built from this scheme starts with.
    fn default_groups(&self) -> Vec<Group> {
        Vec::new()
    }

    /// Returns the user's group in `partition`. When the user has none and
    /// `assign` is set, the scheme may pick one and persist it.
    async fn get_group_for_user(
        &self,
        course_id: &CourseKey,
        user: &User,
        partition: &UserPartition,
        assign: bool,
        tracker: Option<&(dyn AssignmentTracker + Send + Sync)>,
    ) -> Result<Option<Group>, PartitionError>;
}

#[derive(Default, Clone)]
pub struct SchemeRegistry {
    schemes: HashMap<String, Arc<dyn PartitionScheme + Send + Sync>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the bundled schemes. `enrollment_track` is only available
    /// when an enrollment store is supplied.
    pub fn with_default_schemes(
        tag_store: Arc<UserTagStore>,
        enrollment_store: Option<Arc<dyn EnrollmentStore + Send + Sync>>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RandomScheme::new(tag_store)));
        if let Some(store) = enrollment_store {
            registry.register(Arc::new(EnrollmentTrackScheme::new(store)));
        }
        registry
    }

    pub fn register(&mut self, scheme: Arc<dyn PartitionScheme + Send + Sync>) {
        self.schemes.insert(scheme.name().to_string(), scheme);
    }

    pub fn get_scheme(
        &self,
        name: &str,
    ) -> Result<Arc<dyn PartitionScheme + Send + Sync>, PartitionError> {
        self.schemes
            .get(name)
            .cloned()
            .ok_or_else(|| PartitionError::SchemeNotFound(name.to_string()))
    }
}
