pub mod artifact;
pub mod collab;
pub mod config;
pub mod document;
pub mod error;
pub mod gate;
pub mod gates;
pub mod io;
pub mod numbering;
pub mod paths;
pub mod report;
pub mod store;
pub mod structure;
pub mod task;
pub mod trace;
pub mod transition;
pub mod types;

pub use error::{Result, SpecflowError};
