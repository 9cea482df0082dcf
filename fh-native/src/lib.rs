//! Runtime-loaded native backends for fanhal
//!
//! - [`dynlib`]: load a shared library and resolve typed entry points
//! - [`nvml`]: NVIDIA Management Library (GPU temperatures)
//! - [`atasmart`]: libatasmart (disk S.M.A.R.T. temperatures)
//!
//! Nothing here is linked at build time; a missing library surfaces as a
//! `FanhalError::System` when the corresponding driver is constructed.

pub mod atasmart;
pub mod dynlib;
pub mod nvml;

pub use atasmart::SkDisk;
pub use dynlib::DynamicLibrary;
pub use nvml::{Nvml, NvmlDevice};
