pub mod cache;
pub mod orchestrator;
pub mod scoring;
pub mod simulation;
