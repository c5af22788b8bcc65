use {
    prometheus::{Encoder, Registry, TextEncoder},
    prometheus_metric_storage::StorageRegistry,
    std::sync::OnceLock,
};

/// Global metrics registry shared by the whole process.
fn storage_registry() -> &'static StorageRegistry {
    static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| StorageRegistry::new(Registry::new()))
}

/// Returns the storage registry metric structs register themselves against.
pub fn get_storage_registry() -> &'static StorageRegistry {
    storage_registry()
}

/// Returns the underlying prometheus registry.
pub fn get_registry() -> &'static Registry {
    storage_registry().registry()
}

/// Renders all registered metrics in the prometheus text exposition format.
pub fn encode() -> String {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&get_registry().gather(), &mut buffer)
        .unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
