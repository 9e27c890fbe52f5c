pub mod availability;
pub mod registry;
