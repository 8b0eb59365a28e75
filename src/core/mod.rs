// Core modules: configuration, error model, task keys and the request registry.
pub mod config;
pub mod error;
pub mod payload;
pub mod registry;
pub mod task_key;
