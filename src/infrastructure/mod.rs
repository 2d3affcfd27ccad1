pub mod core;
pub mod feeds;
pub mod mock;
pub mod observability;
pub mod persistence;
