use anyhow::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{
    course::{Course, CourseKey, CourseProvider},
    errors::PartitionError,
    partitions::partition_models::{Group, GroupId, PartitionId, User, UserId, UserPartition},
    redis::{Client, MockRedisClient},
    schemes::{
        enrollment_track_scheme::{Enrollment, EnrollmentStore},
        AssignmentTracker, PartitionScheme, SchemeRegistry,
    },
    user_tags::UserTagStore,
};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn random_user() -> User {
    let id = rand::thread_rng().gen_range(0..10_000_000);
    User {
        id,
        username: random_string("learner_", 8),
    }
}

pub fn test_user(id: UserId) -> User {
    User {
        id,
        username: format!("learner_{id}"),
    }
}

pub fn setup_mock_redis_client() -> Arc<MockRedisClient> {
    Arc::new(MockRedisClient::new())
}

pub async fn insert_course_tag_in_redis(
    client: Arc<MockRedisClient>,
    course_id: &CourseKey,
    user_id: UserId,
    key: &str,
    value: &str,
) -> Result<(), Error> {
    client
        .set(
            UserTagStore::tag_key(course_id, user_id, key),
            value.to_string(),
        )
        .await?;
    Ok(())
}

/// A registry holding a `MockScheme` for each name.
pub fn registry_with_mock_schemes(names: &[&str]) -> SchemeRegistry {
    let mut registry = SchemeRegistry::new();
    for name in names {
        registry.register(Arc::new(MockScheme::new(name)));
    }
    registry
}

pub fn create_partition(
    registry: &SchemeRegistry,
    id: PartitionId,
    scheme: &str,
    group_ids: &[GroupId],
) -> UserPartition {
    let groups = group_ids
        .iter()
        .map(|g| Group::new(*g, &format!("group {g}")))
        .collect();
    let scheme = registry
        .get_scheme(scheme)
        .expect("scheme should be registered");
    UserPartition::new(
        id,
        &format!("Partition {id}"),
        "",
        groups,
        scheme,
        HashMap::new(),
    )
}

/// Hands out a fixed group on assignment and remembers it per user and
/// partition, recording every call.
pub struct MockScheme {
    name: String,
    group: Option<Group>,
    assignments: Mutex<HashMap<(PartitionId, UserId), Group>>,
    calls: Mutex<Vec<(PartitionId, bool)>>,
}

impl MockScheme {
    pub fn new(name: &str) -> Self {
        MockScheme {
            name: name.to_string(),
            group: None,
            assignments: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn assigning(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    pub fn calls(&self) -> Vec<(PartitionId, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartitionScheme for MockScheme {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_group_for_user(
        &self,
        _course_id: &CourseKey,
        user: &User,
        partition: &UserPartition,
        assign: bool,
        _tracker: Option<&(dyn AssignmentTracker + Send + Sync)>,
    ) -> Result<Option<Group>, PartitionError> {
        self.calls.lock().unwrap().push((partition.id, assign));

        let mut assignments = self.assignments.lock().unwrap();
        let key = (partition.id, user.id);
        if let Some(group) = assignments.get(&key) {
            return Ok(Some(group.clone()));
        }
        match (&self.group, assign) {
            (Some(group), true) => {
                assignments.insert(key, group.clone());
                Ok(Some(group.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MockCourseProvider {
    courses: HashMap<CourseKey, Course>,
    requests: Mutex<usize>,
}

impl MockCourseProvider {
    pub fn with_course(course: Course) -> Self {
        let mut provider = Self::default();
        provider.courses.insert(course.id.clone(), course);
        provider
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl CourseProvider for MockCourseProvider {
    async fn get_course(&self, course_id: &CourseKey) -> Result<Course, PartitionError> {
        *self.requests.lock().unwrap() += 1;
        self.courses
            .get(course_id)
            .cloned()
            .ok_or_else(|| PartitionError::CourseNotFound(course_id.to_string()))
    }
}

#[derive(Default)]
pub struct MockEnrollmentStore {
    enrollments: Mutex<HashMap<(CourseKey, UserId), Enrollment>>,
}

impl MockEnrollmentStore {
    pub fn with_enrollment(
        self,
        course_id: &CourseKey,
        user_id: UserId,
        mode: &str,
        is_active: bool,
    ) -> Self {
        self.set_enrollment(course_id, user_id, mode, is_active);
        self
    }

    /// Changes an enrollment in place, e.g. an upgrade between requests.
    pub fn set_enrollment(
        &self,
        course_id: &CourseKey,
        user_id: UserId,
        mode: &str,
        is_active: bool,
    ) {
        self.enrollments.lock().unwrap().insert(
            (course_id.clone(), user_id),
            Enrollment {
                mode: mode.to_string(),
                is_active,
            },
        );
    }
}

#[async_trait]
impl EnrollmentStore for MockEnrollmentStore {
    async fn enrollment_for_user(
        &self,
        course_id: &CourseKey,
        user_id: UserId,
    ) -> Result<Option<Enrollment>, PartitionError> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .get(&(course_id.clone(), user_id))
            .cloned())
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingTracker {
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }
}

impl AssignmentTracker for RecordingTracker {
    fn track(&self, event_name: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((event_name.to_string(), payload));
    }
}
