pub mod agents;
pub mod persistence;
pub mod storage;
pub mod workflow;
