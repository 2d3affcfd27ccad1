// Bus envelope and agent registry
pub mod message;

// Typed payload contracts between agents
pub mod payloads;

// Decision model and tier gating
pub mod decision;

// Per-cycle portfolio snapshot
pub mod portfolio;

// Swarm intelligence composite
pub mod intel;

// Adaptive learning parameters
pub mod learning;

// Outbound-content fingerprints
pub mod fingerprint;

// Collaborator port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
