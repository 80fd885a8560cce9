// Domain-driven module structure for the Linetail Agent.

// Core infrastructure
pub mod config;
pub mod message;

// Domain modules
pub mod handler;
pub mod runtime;
