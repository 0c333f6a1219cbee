//! The fixed entry point lists resolved at each tier.

use crate::table::{EntryPointSpec, Tier};
use std::ffi::CStr;

pub const DEBUG_UTILS_EXT_NAME: &CStr = ash::ext::debug_utils::NAME;
pub const DEBUG_REPORT_EXT_NAME: &CStr = ash::ext::debug_report::NAME;
pub const SURFACE_EXT_NAME: &CStr = ash::khr::surface::NAME;
pub const SWAPCHAIN_EXT_NAME: &CStr = ash::khr::swapchain::NAME;

const fn exported(name: &'static CStr) -> EntryPointSpec {
    EntryPointSpec::new(Tier::Exported, name)
}

const fn global(name: &'static CStr) -> EntryPointSpec {
    EntryPointSpec::new(Tier::Global, name)
}

const fn instance(name: &'static CStr) -> EntryPointSpec {
    EntryPointSpec::new(Tier::Instance, name)
}

const fn instance_ext(name: &'static CStr, extension: &'static CStr) -> EntryPointSpec {
    EntryPointSpec::gated(Tier::InstanceExtension, name, extension)
}

const fn device(name: &'static CStr) -> EntryPointSpec {
    EntryPointSpec::new(Tier::Device, name)
}

const fn device_ext(name: &'static CStr, extension: &'static CStr) -> EntryPointSpec {
    EntryPointSpec::gated(Tier::DeviceExtension, name, extension)
}

pub const EXPORTED_FUNCTIONS: &[EntryPointSpec] = &[exported(c"vkGetInstanceProcAddr")];

pub const GLOBAL_FUNCTIONS: &[EntryPointSpec] = &[
    global(c"vkCreateInstance"),
    global(c"vkEnumerateInstanceExtensionProperties"),
    global(c"vkEnumerateInstanceLayerProperties"),
];

pub const INSTANCE_FUNCTIONS: &[EntryPointSpec] = &[
    instance(c"vkCreateDevice"),
    instance(c"vkDestroyInstance"),
    instance(c"vkEnumerateDeviceExtensionProperties"),
    instance(c"vkEnumeratePhysicalDevices"),
    instance(c"vkGetDeviceProcAddr"),
    instance(c"vkGetPhysicalDeviceFeatures"),
    instance(c"vkGetPhysicalDeviceProperties"),
    instance(c"vkGetPhysicalDeviceQueueFamilyProperties"),
];

pub const INSTANCE_EXTENSION_FUNCTIONS: &[EntryPointSpec] = &[
    instance_ext(c"vkCmdBeginDebugUtilsLabelEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkCmdEndDebugUtilsLabelEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkCmdInsertDebugUtilsLabelEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkCreateDebugUtilsMessengerEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkDestroyDebugUtilsMessengerEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkQueueBeginDebugUtilsLabelEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkQueueEndDebugUtilsLabelEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkQueueInsertDebugUtilsLabelEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkSetDebugUtilsObjectNameEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkSetDebugUtilsObjectTagEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkSubmitDebugUtilsMessageEXT", DEBUG_UTILS_EXT_NAME),
    instance_ext(c"vkCreateDebugReportCallbackEXT", DEBUG_REPORT_EXT_NAME),
    instance_ext(c"vkDebugReportMessageEXT", DEBUG_REPORT_EXT_NAME),
    instance_ext(c"vkDestroyDebugReportCallbackEXT", DEBUG_REPORT_EXT_NAME),
    instance_ext(c"vkDestroySurfaceKHR", SURFACE_EXT_NAME),
    instance_ext(c"vkGetPhysicalDeviceSurfacePresentModesKHR", SURFACE_EXT_NAME),
    instance_ext(c"vkGetPhysicalDeviceSurfaceSupportKHR", SURFACE_EXT_NAME),
];

pub const DEVICE_FUNCTIONS: &[EntryPointSpec] = &[
    device(c"vkCreateBuffer"),
    device(c"vkDestroyDevice"),
    device(c"vkDeviceWaitIdle"),
    device(c"vkGetBufferMemoryRequirements"),
    device(c"vkGetDeviceQueue"),
];

pub const DEVICE_EXTENSION_FUNCTIONS: &[EntryPointSpec] = &[
    device_ext(c"vkAcquireNextImageKHR", SWAPCHAIN_EXT_NAME),
    device_ext(c"vkCreateSwapchainKHR", SWAPCHAIN_EXT_NAME),
    device_ext(c"vkDestroySwapchainKHR", SWAPCHAIN_EXT_NAME),
    device_ext(c"vkGetSwapchainImagesKHR", SWAPCHAIN_EXT_NAME),
    device_ext(c"vkQueuePresentKHR", SWAPCHAIN_EXT_NAME),
];
