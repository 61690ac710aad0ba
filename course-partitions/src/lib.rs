pub mod config;
pub mod context;
pub mod course;
pub mod errors;
pub mod partitions;
pub mod redis;
pub mod schemes;
pub mod user_tags;

pub mod test_utils;
