pub mod group_cache;
pub mod partition_lookup;
pub mod partition_models;
pub mod partition_service;
