use serde::{Deserialize, Serialize};

/// Per-instance launch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub java: Option<JavaConfig>,
    pub window: Option<WindowConfig>,
    pub mod_loader: Option<ModLoader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaConfig {
    /// Absolute path of the Java executable, or empty to use the system one
    pub path: String,
    pub min_memory_mb: u64,
    pub max_memory_mb: u64,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub width: u64,
    pub height: u64,
    #[serde(default)]
    pub start_maximized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModLoader {
    pub name: ModLoaderName,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModLoaderName {
    Vanilla,
    Forge,
    NeoForge,
    Fabric,
    Quilt,
}
