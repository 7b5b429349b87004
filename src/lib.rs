pub mod admin;
pub mod config;
pub mod executor;
pub mod output;
pub mod planner;
pub mod provision;
pub mod state;
