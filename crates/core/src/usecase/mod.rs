pub mod job_registry;
pub mod monitor;
pub mod orchestrator;
