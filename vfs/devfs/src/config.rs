#[derive(Clone, Debug)]
pub struct DevFsConfig {
    /// Volume label reported through `Ioctl::Label`.
    pub label: String,
    /// Volume serial reported through `Ioctl::Serial`.
    pub serial: String,
}

impl Default for DevFsConfig {
    fn default() -> Self {
        Self {
            label: "devfs".to_string(),
            serial: String::new(),
        }
    }
}
