pub mod attendance;
pub mod core;
pub mod ingest;
pub mod lessons;
pub mod questions;
pub mod scores;
pub mod students;
