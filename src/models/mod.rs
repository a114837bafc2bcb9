pub mod hazard;
pub mod location;
pub mod route;
pub mod routine;
pub mod simulation;
