mod context;
mod device;
mod entry;
mod error;
mod extensions;
mod functions;
mod instance;
mod loader;
mod physical_device;
mod present;
mod surface;
mod system_info;
mod table;
#[cfg(test)]
mod testing;
#[cfg(feature = "enable_tracing")]
mod tracing;
mod version;

pub use ash;
pub use context::{Context, ContextBuilder};
pub use device::{Device, DeviceBuilder};
pub use entry::Entry;
pub use error::*;
pub use extensions::{
    ExtensionDescriptor, enumerate_extensions, is_extension_available, require_extensions,
};
pub use functions::{
    DEBUG_REPORT_EXT_NAME, DEBUG_UTILS_EXT_NAME, DEVICE_EXTENSION_FUNCTIONS, DEVICE_FUNCTIONS,
    EXPORTED_FUNCTIONS, GLOBAL_FUNCTIONS, INSTANCE_EXTENSION_FUNCTIONS, INSTANCE_FUNCTIONS,
    SURFACE_EXT_NAME, SWAPCHAIN_EXT_NAME,
};
pub use instance::{Instance, InstanceBuilder, WindowTraits};
pub use loader::{DeviceLoader, InstanceLoader, LIBRARY, Library, Module};
pub use physical_device::{
    FEATURE_NAMES, PhysicalDevice, PhysicalDeviceSelector, QueueFamilyDescriptor,
    enabled_feature_subset, merge_features, pick_single_device, select_queue_families,
};
pub use present::{FALLBACK_PRESENT_MODE, find_desired_present_mode, select_present_mode};
pub use surface::{Surface, required_extensions as required_surface_extensions};
pub use system_info::{SystemInfo, VALIDATION_LAYER_NAME};
pub use table::{
    CapabilityTable, EntryPoint, EntryPointSpec, ProcSource, Tier, resolve_extension_entry,
};
pub use version::Version;
