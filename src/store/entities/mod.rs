//! Table definitions for the lab registry

pub mod faculty;
pub mod registry;
pub mod session;
pub mod student;
pub mod subject;
