// Worker agents
pub mod agents;

// Shared agent runtime (lifecycle, heartbeats, bus access)
pub mod runtime;

// Message router, publication gate, child management, briefings
pub mod supervisor;

// Autonomous decision engine
pub mod engine;

// Retrospective learning
pub mod learning;

// Digest rendering
pub mod reporting;

// System orchestrator
pub mod system;
