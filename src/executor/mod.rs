pub mod parallel;
pub mod retry;
