mod config;
mod device;
mod fs;

pub use config::DevFsConfig;
pub use device::{Device, MemoryRegion, StaticRegion};
pub use fs::DevFs;
