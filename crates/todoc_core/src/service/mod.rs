//! Presentation-facing use-case services.
//!
//! # Responsibility
//! - Coordinate repositories for the UI layer.
//! - Own the background worker that applies every task write.
//!
//! # See also
//! - `store` for the observable contract forwarded by these services.

pub mod task_orchestrator;
