pub mod health;
pub mod metrics;
pub mod review;
pub mod verify;
