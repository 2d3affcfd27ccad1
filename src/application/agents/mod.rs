// Worker agents - the swarm's long-running specialists
pub mod analyst;
pub mod cfo;
pub mod community;
pub mod guardian;
pub mod health;
pub mod launcher;
pub mod scout;
pub mod token_child;
