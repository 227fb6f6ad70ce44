pub mod error;
pub mod events;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod progress;
pub mod store;
pub mod validate;
