pub mod analyzer;
pub mod auth;
pub mod decision;
pub mod encryption;
pub mod extract;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod storage;
pub mod vision;
