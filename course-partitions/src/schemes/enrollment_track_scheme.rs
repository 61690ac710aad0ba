use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    course::CourseKey,
    errors::PartitionError,
    partitions::partition_models::{Group, GroupId, User, UserId, UserPartition},
    schemes::{AssignmentTracker, PartitionScheme},
};

pub const ENROLLMENT_TRACK_SCHEME: &str = "enrollment_track";

// Group ids are fixed per track so content gated on a track survives
// course reruns.
const ENROLLMENT_TRACK_GROUPS: [(&str, GroupId, &str); 7] = [
    ("audit", 1, "Audit"),
    ("verified", 2, "Verified Certificate"),
    ("professional", 3, "Professional Education"),
    ("no-id-professional", 4, "Professional Education"),
    ("credit", 5, "Credit"),
    ("honor", 6, "Honor Certificate"),
    ("masters", 7, "Master's"),
];

const DEFAULT_TRACK: (&str, GroupId, &str) = ENROLLMENT_TRACK_GROUPS[0];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Enrollment {
    pub mode: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Where the enrollment track scheme learns a learner's enrollment mode.
#[async_trait]
pub trait EnrollmentStore {
    async fn enrollment_for_user(
        &self,
        course_id: &CourseKey,
        user_id: UserId,
    ) -> Result<Option<Enrollment>, PartitionError>;
}

/// Puts each learner in the group matching their enrollment mode. Nothing is
/// persisted, so `assign` has no effect.
pub struct EnrollmentTrackScheme {
    store: Arc<dyn EnrollmentStore + Send + Sync>,
}

impl EnrollmentTrackScheme {
    pub fn new(store: Arc<dyn EnrollmentStore + Send + Sync>) -> Self {
        EnrollmentTrackScheme { store }
    }

    /// Unknown modes fall back to the audit track.
    pub fn group_for_mode(mode: &str) -> Group {
        let (_, id, name) = ENROLLMENT_TRACK_GROUPS
            .iter()
            .find(|(slug, _, _)| *slug == mode)
            .copied()
            .unwrap_or(DEFAULT_TRACK);
        Group::new(id, name)
    }
}

#[async_trait]
impl PartitionScheme for EnrollmentTrackScheme {
    fn name(&self) -> &str {
        ENROLLMENT_TRACK_SCHEME
    }

    fn default_groups(&self) -> Vec<Group> {
        ENROLLMENT_TRACK_GROUPS
            .iter()
            .map(|(_, id, name)| Group::new(*id, name))
            .collect()
    }

    async fn get_group_for_user(
        &self,
        course_id: &CourseKey,
        user: &User,
        _partition: &UserPartition,
        _assign: bool,
        _tracker: Option<&(dyn AssignmentTracker + Send + Sync)>,
    ) -> Result<Option<Group>, PartitionError> {
        let enrollment = self.store.enrollment_for_user(course_id, user.id).await?;

        Ok(match enrollment {
            Some(Enrollment {
                mode,
                is_active: true,
            }) => Some(Self::group_for_mode(&mode)),
            _ => None,
        })
    }
}
