pub mod availability;
pub mod committer;
pub mod store;
