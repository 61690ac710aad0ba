use std::collections::HashMap;

use crate::{
    course::Course,
    partitions::partition_models::{PartitionId, UserPartition},
    schemes::{enrollment_track_scheme::ENROLLMENT_TRACK_SCHEME, SchemeRegistry},
};

pub const ENROLLMENT_TRACK_PARTITION_ID: PartitionId = 50;

/// Returns every partition of a course: the statically configured ones in
/// their configured order, followed by the dynamically generated ones.
pub fn get_course_user_partitions(course: &Course, registry: &SchemeRegistry) -> Vec<UserPartition> {
    let mut partitions = course.user_partitions.clone();
    partitions.extend(get_dynamic_partitions(course, registry));
    partitions
}

fn get_dynamic_partitions(course: &Course, registry: &SchemeRegistry) -> Vec<UserPartition> {
    create_enrollment_track_partition(course, registry)
        .into_iter()
        .collect()
}

fn create_enrollment_track_partition(
    course: &Course,
    registry: &SchemeRegistry,
) -> Option<UserPartition> {
    let Ok(scheme) = registry.get_scheme(ENROLLMENT_TRACK_SCHEME) else {
        tracing::warn!(
            "No '{}' scheme registered, enrollment track partition will not be created.",
            ENROLLMENT_TRACK_SCHEME
        );
        return None;
    };

    if let Some(existing) =
        get_partition_from_id(&course.user_partitions, ENROLLMENT_TRACK_PARTITION_ID)
    {
        tracing::warn!(
            "Cannot add '{}' partition, as ID {} is assigned to {}",
            ENROLLMENT_TRACK_SCHEME,
            ENROLLMENT_TRACK_PARTITION_ID,
            existing.name
        );
        return None;
    }

    let course_id = course.id.for_branch(None).to_string();

    Some(UserPartition::new(
        ENROLLMENT_TRACK_PARTITION_ID,
        "Enrollment Track Partition",
        "Partition for segmenting users by enrollment track",
        scheme.default_groups(),
        scheme,
        HashMap::from([("course_id".to_string(), course_id)]),
    ))
}

/// Finds the first partition with the given id.
pub fn get_partition_from_id(
    partitions: &[UserPartition],
    partition_id: PartitionId,
) -> Option<&UserPartition> {
    partitions.iter().find(|p| p.id == partition_id)
}
