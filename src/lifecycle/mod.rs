//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build resources and probe targets → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop serving → Close every resource → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Resources are built before the listener binds
//! - Closing resources is bounded by a timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{close_all, Shutdown};
pub use signals::wait_for_signal;
pub use startup::{pool_resource, Components, StartupError};
