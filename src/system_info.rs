use crate::entry::Entry;
use crate::extensions::{
    ExtensionDescriptor, enumerate, enumerate_extensions, fixed_cstr, is_extension_available,
};
use crate::functions::DEBUG_UTILS_EXT_NAME;
use ash::vk;
use std::ffi::{CStr, CString};

pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// What the driver offers before any instance exists.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub available_layers: Vec<CString>,
    /// Instance extensions, including those only provided by a layer.
    pub available_extensions: Vec<ExtensionDescriptor>,
    pub validation_layers_available: bool,
    pub debug_utils_available: bool,
}

impl SystemInfo {
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all))]
    pub fn query(entry: &Entry) -> crate::Result<Self> {
        let global = entry.global_table();
        let enumerate_extension_properties: vk::PFN_vkEnumerateInstanceExtensionProperties =
            unsafe { global.require(c"vkEnumerateInstanceExtensionProperties") }?;
        let enumerate_layer_properties: vk::PFN_vkEnumerateInstanceLayerProperties =
            unsafe { global.require(c"vkEnumerateInstanceLayerProperties") }?;

        let mut available_extensions =
            enumerate_extensions("vkEnumerateInstanceExtensionProperties", |count, out| unsafe {
                enumerate_extension_properties(std::ptr::null(), count, out)
            })?;

        // A driver without any layers installed is normal.
        let available_layers: Vec<CString> = enumerate(
            "vkEnumerateInstanceLayerProperties",
            |count, out: *mut vk::LayerProperties| unsafe { enumerate_layer_properties(count, out) },
        )?
        .iter()
        .map(|layer| fixed_cstr(&layer.layer_name).to_owned())
        .collect();

        for layer in &available_layers {
            let layer_extensions: Vec<ExtensionDescriptor> = enumerate(
                "vkEnumerateInstanceExtensionProperties",
                |count, out: *mut vk::ExtensionProperties| unsafe {
                    enumerate_extension_properties(layer.as_ptr(), count, out)
                },
            )?
            .iter()
            .map(ExtensionDescriptor::from)
            .collect();

            for ext in layer_extensions {
                if !is_extension_available(&available_extensions, &ext.name) {
                    available_extensions.push(ext);
                }
            }
        }

        let validation_layers_available = available_layers
            .iter()
            .any(|layer| layer.as_c_str() == VALIDATION_LAYER_NAME);
        let debug_utils_available =
            is_extension_available(&available_extensions, DEBUG_UTILS_EXT_NAME);

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(
            layers = available_layers.len(),
            extensions = available_extensions.len(),
            validation_layers_available,
            debug_utils_available
        );

        Ok(Self {
            available_layers,
            available_extensions,
            validation_layers_available,
            debug_utils_available,
        })
    }

    pub fn is_extension_available(&self, extension: &CStr) -> bool {
        is_extension_available(&self.available_extensions, extension)
    }

    pub fn is_layer_available(&self, layer: &CStr) -> bool {
        self.available_layers
            .iter()
            .any(|available| available.as_c_str() == layer)
    }
}
