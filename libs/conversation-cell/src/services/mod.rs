pub mod engine;
pub mod extractor;
pub mod session;
