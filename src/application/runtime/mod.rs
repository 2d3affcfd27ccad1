pub mod agent;

pub use agent::{AgentContext, CFO, SUPERVISOR, WorkerAgent, drain_batch, start_worker, stop_worker};
