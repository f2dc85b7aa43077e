//! Shared Waymark data models consumed by the core library and host surfaces.

pub mod changes;
pub mod resolved;
pub mod tour;

pub use changes::*;
pub use resolved::*;
pub use tour::*;
