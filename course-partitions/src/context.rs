use std::sync::Arc;

use crate::{
    config::Config,
    course::{CourseKey, CourseProvider},
    errors::PartitionError,
    partitions::{
        group_cache::{MemoryCache, RedisGroupCache},
        partition_models::User,
        partition_service::PartitionService,
    },
    redis::{Client, RedisClient},
    schemes::{EnrollmentStore, SchemeRegistry},
    user_tags::UserTagStore,
};

/// Long-lived pieces shared by every request: the redis connection, the
/// scheme registry and the course provider. Hands out a `PartitionService`
/// per request.
pub struct PartitionContext {
    pub config: Config,
    pub redis_client: Arc<dyn Client + Send + Sync>,
    pub registry: Arc<SchemeRegistry>,
    pub courses: Arc<dyn CourseProvider + Send + Sync>,
}

impl PartitionContext {
    pub fn new(
        config: Config,
        courses: Arc<dyn CourseProvider + Send + Sync>,
        enrollment_store: Option<Arc<dyn EnrollmentStore + Send + Sync>>,
    ) -> Result<Self, PartitionError> {
        let redis_client =
            RedisClient::with_timeout(config.redis_url.clone(), config.redis_timeout_ms.0)
                .map_err(|e| {
                    tracing::error!("Failed to create redis client: {}", e);
                    PartitionError::RedisUnavailable
                })?;

        Ok(Self::with_client(
            config,
            Arc::new(redis_client),
            courses,
            enrollment_store,
        ))
    }

    pub fn with_client(
        config: Config,
        redis_client: Arc<dyn Client + Send + Sync>,
        courses: Arc<dyn CourseProvider + Send + Sync>,
        enrollment_store: Option<Arc<dyn EnrollmentStore + Send + Sync>>,
    ) -> Self {
        let tag_store = Arc::new(UserTagStore::new(redis_client.clone()));
        let registry = Arc::new(SchemeRegistry::with_default_schemes(
            tag_store,
            enrollment_store,
        ));

        PartitionContext {
            config,
            redis_client,
            registry,
            courses,
        }
    }

    /// Builds the service for one request. Groups are cached for the
    /// request only, unless `ENABLE_GROUP_CACHE` opts into sharing them
    /// across requests through redis.
    pub fn service_for(&self, user: User, course_id: CourseKey) -> PartitionService {
        let service = PartitionService::new(
            user,
            course_id,
            self.courses.clone(),
            self.registry.clone(),
        );

        if self.config.enable_group_cache {
            service.with_cache(Arc::new(RedisGroupCache::new(
                self.redis_client.clone(),
                self.config.group_cache_ttl_seconds,
            )))
        } else {
            service.with_cache(Arc::new(MemoryCache::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use envconfig::Envconfig;

    use super::*;
    use crate::{
        course::{Course, CourseDefinition},
        partitions::partition_lookup::ENROLLMENT_TRACK_PARTITION_ID,
        redis::MockRedisClient,
        test_utils::{test_user, MockCourseProvider, MockEnrollmentStore},
    };

    fn config(env: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::init_from_hashmap(&env).unwrap()
    }

    fn course_definition() -> CourseDefinition {
        serde_json::from_value(serde_json::json!({
            "id": "course-v1:edX+DemoX+2024",
            "user_partitions": [{
                "id": 1,
                "name": "Experiment",
                "scheme": "random",
                "groups": [{"id": 0, "name": "control"}, {"id": 1, "name": "treatment"}]
            }]
        }))
        .unwrap()
    }

    fn course_id() -> CourseKey {
        CourseKey::new("edX", "DemoX", "2024")
    }

    fn context(
        env: &[(&str, &str)],
        client: Arc<MockRedisClient>,
        enrollments: Arc<MockEnrollmentStore>,
    ) -> PartitionContext {
        let tag_store = Arc::new(UserTagStore::new(client.clone()));
        let registry = SchemeRegistry::with_default_schemes(tag_store, None);
        let course = Course::from_definition(course_definition(), &registry).unwrap();

        PartitionContext::with_client(
            config(env),
            client,
            Arc::new(MockCourseProvider::with_course(course)),
            Some(enrollments),
        )
    }

    fn verified_learner() -> Arc<MockEnrollmentStore> {
        Arc::new(MockEnrollmentStore::default().with_enrollment(&course_id(), 1, "verified", true))
    }

    #[tokio::test]
    async fn test_service_caches_groups_for_the_request_by_default() {
        let client = Arc::new(MockRedisClient::new());
        let context = context(&[], client.clone(), verified_learner());
        let service = context.service_for(test_user(1), course_id());

        let group = service.get_user_group_id_for_partition(1).await.unwrap();
        assert!(matches!(group, Some(0) | Some(1)));
        let reads = client.calls_for("get");
        assert_eq!(service.get_user_group_id_for_partition(1).await.unwrap(), group);
        assert_eq!(client.calls_for("get"), reads);

        let track = service
            .get_user_group_id_for_partition(ENROLLMENT_TRACK_PARTITION_ID)
            .await
            .unwrap();
        assert_eq!(track, Some(2));

        // only the random assignment's tag reaches redis
        assert_eq!(client.calls_for("set"), 1);
        assert_eq!(client.calls_for("set_ex"), 0);
    }

    #[tokio::test]
    async fn test_enrollment_change_is_seen_by_the_next_request() {
        let client = Arc::new(MockRedisClient::new());
        let enrollments = Arc::new(
            MockEnrollmentStore::default().with_enrollment(&course_id(), 1, "audit", true),
        );
        let context = context(&[], client, enrollments.clone());

        let before = context
            .service_for(test_user(1), course_id())
            .get_user_group_id_for_partition(ENROLLMENT_TRACK_PARTITION_ID)
            .await
            .unwrap();
        enrollments.set_enrollment(&course_id(), 1, "verified", true);
        let after = context
            .service_for(test_user(1), course_id())
            .get_user_group_id_for_partition(ENROLLMENT_TRACK_PARTITION_ID)
            .await
            .unwrap();

        assert_eq!(before, Some(1));
        assert_eq!(after, Some(2));
    }

    #[tokio::test]
    async fn test_redis_group_cache_is_opt_in() {
        let client = Arc::new(MockRedisClient::new());
        let context = context(
            &[("ENABLE_GROUP_CACHE", "true")],
            client.clone(),
            verified_learner(),
        );
        let service = context.service_for(test_user(1), course_id());

        service.get_user_group_id_for_partition(1).await.unwrap();
        service
            .get_user_group_id_for_partition(ENROLLMENT_TRACK_PARTITION_ID)
            .await
            .unwrap();

        // one cache write per partition, shared with later requests
        assert_eq!(client.calls_for("set_ex"), 2);
        let cached = context
            .service_for(test_user(1), course_id())
            .get_user_group_id_for_partition(ENROLLMENT_TRACK_PARTITION_ID)
            .await
            .unwrap();
        assert_eq!(cached, Some(2));
        assert_eq!(client.calls_for("set_ex"), 2);
    }

    #[test]
    fn test_invalid_redis_url_is_rejected() {
        let result = PartitionContext::new(
            config(&[("REDIS_URL", "not a url")]),
            Arc::new(MockCourseProvider::default()),
            None,
        );

        assert!(matches!(result, Err(PartitionError::RedisUnavailable)));
    }
}
