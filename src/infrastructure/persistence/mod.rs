pub mod agent_repository;
pub mod cleanup;
pub mod database;
pub mod kv_repository;
pub mod message_repository;

pub use agent_repository::AgentRepository;
pub use cleanup::CleanupTask;
pub use database::Database;
pub use kv_repository::KvRepository;
pub use message_repository::MessageRepository;
