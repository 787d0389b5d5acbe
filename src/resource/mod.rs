//! Supervised resources.
//!
//! A resource wraps a user-supplied `initialize` function and manages the
//! lifetime of the instance it produces: single-flight initialization,
//! health checks, automatic healing, and teardown on close.

pub mod error;
pub mod heal;
pub mod state;
pub mod supervised;

pub use error::{ResourceError, ResourceResult};
pub use heal::HealStrategy;
pub use state::{HealStatus, ResourceStatus};
pub use supervised::{ManagedResource, Resource, ResourceBuilder, ResourceSnapshot};
