use thiserror::Error;

use crate::redis::CustomRedisError;

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("No scheme registered with name '{0}'")]
    SchemeNotFound(String),
    #[error("Configuration problem!  No user_partition with id {partition_id} in course {course_id}")]
    PartitionNotFound { partition_id: i64, course_id: String },
    #[error("Course {0} not found")]
    CourseNotFound(String),
    #[error("Invalid course key: {0}")]
    InvalidCourseKey(String),
    #[error("Failed to parse data")]
    DataParsingError,
    #[error("redis unavailable")]
    RedisUnavailable,
    #[error("Timed out while fetching data")]
    TimeoutError,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CustomRedisError> for PartitionError {
    fn from(e: CustomRedisError) -> Self {
        match e {
            CustomRedisError::NotFound => PartitionError::Internal(
                "missing key should be handled by the caller".to_string(),
            ),
            CustomRedisError::ParseError(_) => {
                tracing::error!("failed to parse redis data: {}", e);
                PartitionError::DataParsingError
            }
            CustomRedisError::Timeout => PartitionError::TimeoutError,
            CustomRedisError::Redis(_) => {
                tracing::error!("Unknown redis error: {}", e);
                PartitionError::RedisUnavailable
            }
        }
    }
}

impl From<serde_json::Error> for PartitionError {
    fn from(e: serde_json::Error) -> Self {
        tracing::error!("failed to parse data: {}", e);
        PartitionError::DataParsingError
    }
}
