pub mod registry;
pub mod stager;

pub use registry::NativeLibRegistry;
pub use stager::NativeStager;
