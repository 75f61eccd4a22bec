#[derive(Clone, Debug)]
pub struct RamDiskConfig {
    /// Volume label reported through `Ioctl::Label`.
    pub label: String,
    /// Volume serial reported through `Ioctl::Serial`.
    pub serial: String,
    /// Max files plus directories, the root included.
    pub max_nodes: usize,
    /// If true, every mutating operation fails with `PermissionDenied`.
    pub read_only: bool,
}

impl Default for RamDiskConfig {
    fn default() -> Self {
        Self {
            label: "RAMDISK".to_string(),
            serial: "00000000".to_string(),
            max_nodes: 256,
            read_only: false,
        }
    }
}
