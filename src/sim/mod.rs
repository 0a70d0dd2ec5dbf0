pub mod automation;
pub mod types;
