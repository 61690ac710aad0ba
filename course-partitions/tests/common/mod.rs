use std::sync::Arc;

use course_partitions::{
    course::{Course, CourseDefinition, CourseKey},
    partitions::{
        group_cache::MemoryCache, partition_models::User, partition_service::PartitionService,
    },
    redis::MockRedisClient,
    schemes::{EnrollmentStore, SchemeRegistry},
    test_utils::{setup_mock_redis_client, test_user, MockCourseProvider, RecordingTracker},
    user_tags::UserTagStore,
};
use once_cell::sync::Lazy;
use serde_json::json;
use tracing_subscriber::EnvFilter;

static TRACING: Lazy<()> = Lazy::new(|| {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub fn demo_course_id() -> CourseKey {
    CourseKey::new("edX", "DemoX", "2024_T1")
}

pub fn demo_course_definition(extra_partition_id: Option<i64>) -> CourseDefinition {
    let mut partitions = vec![json!({
        "id": 1,
        "name": "Video or text",
        "description": "Which format works better",
        "scheme": "random",
        "groups": [{"id": 0, "name": "video"}, {"id": 1, "name": "text"}]
    })];
    if let Some(id) = extra_partition_id {
        partitions.push(json!({
            "id": id,
            "name": "Legacy experiment",
            "scheme": "random",
            "groups": [{"id": 5, "name": "legacy"}]
        }));
    }

    serde_json::from_value(json!({
        "id": demo_course_id().to_string(),
        "user_partitions": partitions,
    }))
    .expect("course definition should parse")
}

pub struct Harness {
    pub redis: Arc<MockRedisClient>,
    pub registry: Arc<SchemeRegistry>,
    pub courses: Arc<MockCourseProvider>,
    pub tracker: Arc<RecordingTracker>,
}

impl Harness {
    pub fn new(
        enrollment_store: Option<Arc<dyn EnrollmentStore + Send + Sync>>,
        extra_partition_id: Option<i64>,
    ) -> Harness {
        init_tracing();

        let redis = setup_mock_redis_client();
        let tag_store = Arc::new(UserTagStore::new(redis.clone()));
        let registry = Arc::new(SchemeRegistry::with_default_schemes(
            tag_store,
            enrollment_store,
        ));
        let course = Course::from_definition(demo_course_definition(extra_partition_id), &registry)
            .expect("schemes should resolve");

        Harness {
            redis,
            registry,
            courses: Arc::new(MockCourseProvider::with_course(course)),
            tracker: Arc::new(RecordingTracker::default()),
        }
    }

    pub fn service(&self, user_id: i64, cache: Option<Arc<MemoryCache>>) -> PartitionService {
        self.service_for_user(test_user(user_id), cache)
    }

    pub fn service_for_user(
        &self,
        user: User,
        cache: Option<Arc<MemoryCache>>,
    ) -> PartitionService {
        let service = PartitionService::new(
            user,
            demo_course_id(),
            self.courses.clone(),
            self.registry.clone(),
        )
        .with_tracker(self.tracker.clone());

        match cache {
            Some(cache) => service.with_cache(cache),
            None => service,
        }
    }
}
