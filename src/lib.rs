//! Identity Document Verification Pipeline
//!
//! This library provides the core functionality for the id-verify system:
//! users submit identity documents (ID card, tax ID card, driver's license,
//! passport), a background worker extracts structured claims from each
//! image via Cloudflare Workers AI, and a deterministic decision engine
//! approves, rejects, or defers the submission to a human reviewer.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
