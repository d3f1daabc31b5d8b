//! Native model implementations and registry.

pub mod architectures;
pub mod registry;
pub mod shared;

pub use shared::beam;
pub use shared::device;
pub use shared::weights;

pub use architectures::{SequenceClassifier, T5Rewriter};
pub use registry::ModelRegistry;
pub use shared::device::{DeviceProfile, DeviceSelector};
