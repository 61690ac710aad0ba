use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    errors::PartitionError,
    schemes::{PartitionScheme, SchemeRegistry},
};

pub type GroupId = i64;
pub type PartitionId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub fn new(id: GroupId, name: &str) -> Self {
        Group {
            id,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
}

/// A named way of splitting a course's learners into groups. How a learner
/// lands in a group is up to the partition's scheme.
#[derive(Clone)]
pub struct UserPartition {
    pub id: PartitionId,
    pub name: String,
    pub description: String,
    pub scheme: Arc<dyn PartitionScheme + Send + Sync>,
    pub groups: Vec<Group>,
    pub parameters: HashMap<String, String>,
}

impl UserPartition {
    pub fn new(
        id: PartitionId,
        name: &str,
        description: &str,
        groups: Vec<Group>,
        scheme: Arc<dyn PartitionScheme + Send + Sync>,
        parameters: HashMap<String, String>,
    ) -> Self {
        UserPartition {
            id,
            name: name.to_string(),
            description: description.to_string(),
            scheme,
            groups,
            parameters,
        }
    }

    pub fn from_definition(
        definition: UserPartitionDefinition,
        registry: &SchemeRegistry,
    ) -> Result<UserPartition, PartitionError> {
        let scheme = registry.get_scheme(&definition.scheme)?;

        Ok(UserPartition {
            id: definition.id,
            name: definition.name,
            description: definition.description,
            scheme,
            groups: definition.groups,
            parameters: definition.parameters,
        })
    }

    pub fn get_group(&self, group_id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }
}

impl fmt::Debug for UserPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPartition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("scheme", &self.scheme.name())
            .field("groups", &self.groups)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserPartitionDefinition {
    pub id: PartitionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scheme: String,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}
