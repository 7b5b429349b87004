pub mod lock;
pub mod models;
pub mod store;
