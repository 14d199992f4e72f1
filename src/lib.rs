pub mod error;
pub mod geometry;
pub mod grader;
pub mod pose;
pub mod replay;
pub mod scoring;
pub mod session;
