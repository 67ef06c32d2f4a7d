pub mod artifact;
pub mod config;
pub mod init;
pub mod phase;
pub mod show;
pub mod status;
pub mod task;
pub mod validate;
