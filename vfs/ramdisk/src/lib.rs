mod config;
mod device;
mod fs;

pub use config::RamDiskConfig;
pub use device::{BlockDevice, RamImage, SECTOR_SIZE};
pub use fs::RamDiskFs;
