//! Shared model infrastructure used by all architecture implementations.

pub mod beam;
pub mod device;
pub mod weights;
