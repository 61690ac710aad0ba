use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    errors::PartitionError,
    partitions::partition_models::{UserPartition, UserPartitionDefinition},
    schemes::SchemeRegistry,
};

const COURSE_KEY_PREFIX: &str = "course-v1:";
const BRANCH_PREFIX: &str = "branch@";

/// Identifies a course run, e.g. `course-v1:edX+DemoX+2024_T1`.
///
/// Keys may carry a content branch (`...+branch@draft`). Partitions are
/// always parameterized with the branch-free form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    pub run: String,
    pub branch: Option<String>,
}

impl CourseKey {
    pub fn new(org: &str, course: &str, run: &str) -> Self {
        CourseKey {
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
            branch: None,
        }
    }

    pub fn for_branch(&self, branch: Option<&str>) -> Self {
        CourseKey {
            branch: branch.map(str::to_string),
            ..self.clone()
        }
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}+{}+{}",
            COURSE_KEY_PREFIX, self.org, self.course, self.run
        )?;
        if let Some(branch) = &self.branch {
            write!(f, "+{BRANCH_PREFIX}{branch}")?;
        }
        Ok(())
    }
}

impl FromStr for CourseKey {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PartitionError::InvalidCourseKey(s.to_string());

        let body = s.strip_prefix(COURSE_KEY_PREFIX).ok_or_else(invalid)?;
        let parts: Vec<&str> = body.split('+').collect();

        let (org, course, run, branch) = match parts.as_slice() {
            [org, course, run] => (*org, *course, *run, None),
            [org, course, run, branch] => {
                let branch = branch.strip_prefix(BRANCH_PREFIX).ok_or_else(invalid)?;
                (*org, *course, *run, Some(branch))
            }
            _ => return Err(invalid()),
        };

        if [org, course, run].iter().any(|p| p.is_empty()) || branch == Some("") {
            return Err(invalid());
        }

        Ok(CourseKey::new(org, course, run).for_branch(branch))
    }
}

impl TryFrom<String> for CourseKey {
    type Error = PartitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: CourseKey,
    pub user_partitions: Vec<UserPartition>,
}

/// Serialized form of a course's partition configuration, with schemes
/// referenced by name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CourseDefinition {
    pub id: CourseKey,
    #[serde(default)]
    pub user_partitions: Vec<UserPartitionDefinition>,
}

impl Course {
    pub fn from_definition(
        definition: CourseDefinition,
        registry: &SchemeRegistry,
    ) -> Result<Course, PartitionError> {
        let user_partitions = definition
            .user_partitions
            .into_iter()
            .map(|p| UserPartition::from_definition(p, registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Course {
            id: definition.id,
            user_partitions,
        })
    }
}

/// Supplies the course a partition service works against.
#[async_trait]
pub trait CourseProvider {
    async fn get_course(&self, course_id: &CourseKey) -> Result<Course, PartitionError>;
}
