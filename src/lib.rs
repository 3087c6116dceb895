// Library for tests to access modules

pub mod config;
pub mod context;
pub mod docker_repo;
pub mod error;
pub mod finalizer;
pub mod models;
pub mod normalizer;
pub mod sample_buffer;
pub mod sysinfo_repo;
pub mod worker;
