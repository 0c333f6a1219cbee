//! In-process fake driver for unit tests.
//!
//! Each test thread owns its own [`FakeDriver`]. Tests configure it with
//! [`install`], run the code under test against [`FakeModule`], and read the
//! recorded calls back with [`driver`].

use crate::extensions::write_fixed;
use crate::table::ProcSource;
use ash::vk::{self, Handle};
use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};

pub(crate) const INSTANCE: u64 = 0x1000;
pub(crate) const PHYSICAL_DEVICE: u64 = 0x2000;
pub(crate) const DEVICE: u64 = 0x3000;
pub(crate) const QUEUE: u64 = 0x4000;
pub(crate) const MESSENGER: u64 = 0x5000;
pub(crate) const SURFACE: u64 = 0x6000;

pub(crate) unsafe extern "system" fn noop() {}

/// Resolves exactly the listed names, all to [`noop`].
pub(crate) struct FakeSource {
    names: Vec<&'static CStr>,
}

impl FakeSource {
    pub(crate) fn with(names: &[&'static CStr]) -> Self {
        Self {
            names: names.to_vec(),
        }
    }
}

impl ProcSource for FakeSource {
    fn lookup(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
        self.names
            .iter()
            .any(|listed| *listed == name)
            .then_some(noop as unsafe extern "system" fn())
    }
}

/// Stands in for the driver library. Only exports `vkGetInstanceProcAddr`.
pub(crate) struct FakeModule;

impl ProcSource for FakeModule {
    fn lookup(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
        if name != c"vkGetInstanceProcAddr" || is_unresolvable(name) {
            return None;
        }
        Some(erase(fake_get_instance_proc_addr as *const ()))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeDriver {
    pub instance_extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
    pub layer_extensions: Vec<&'static CStr>,
    pub device_extensions: Vec<&'static CStr>,
    pub physical_device_count: usize,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub features: vk::PhysicalDeviceFeatures,
    /// Present support per family index. Families past the end support presentation.
    pub present_support: Vec<bool>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub unresolvable: Vec<&'static CStr>,
    pub create_instance_result: vk::Result,
    pub create_device_result: vk::Result,

    pub created_instances: usize,
    pub destroyed_instances: usize,
    pub created_devices: usize,
    pub destroyed_devices: usize,
    pub destroyed_messengers: usize,
    pub destroyed_surfaces: usize,
    pub wait_idle_calls: usize,
    pub enabled_instance_extensions: Vec<CString>,
    pub enabled_layers: Vec<CString>,
    pub device_requests: Vec<(u32, Vec<f32>)>,
    pub enabled_device_features: Option<vk::PhysicalDeviceFeatures>,
    pub enabled_device_extensions: Vec<CString>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self {
            instance_extensions: vec![c"VK_KHR_surface", c"VK_EXT_debug_utils"],
            layers: vec![],
            layer_extensions: vec![],
            device_extensions: vec![c"VK_KHR_swapchain"],
            physical_device_count: 1,
            queue_families: vec![
                vk::QueueFamilyProperties {
                    queue_flags: vk::QueueFlags::GRAPHICS
                        | vk::QueueFlags::COMPUTE
                        | vk::QueueFlags::TRANSFER,
                    queue_count: 4,
                    ..Default::default()
                },
                vk::QueueFamilyProperties {
                    queue_flags: vk::QueueFlags::TRANSFER,
                    queue_count: 2,
                    ..Default::default()
                },
            ],
            features: vk::PhysicalDeviceFeatures {
                tessellation_shader: vk::TRUE,
                sampler_anisotropy: vk::TRUE,
                ..Default::default()
            },
            present_support: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            unresolvable: vec![],
            create_instance_result: vk::Result::SUCCESS,
            create_device_result: vk::Result::SUCCESS,
            created_instances: 0,
            destroyed_instances: 0,
            created_devices: 0,
            destroyed_devices: 0,
            destroyed_messengers: 0,
            destroyed_surfaces: 0,
            wait_idle_calls: 0,
            enabled_instance_extensions: vec![],
            enabled_layers: vec![],
            device_requests: vec![],
            enabled_device_features: None,
            enabled_device_extensions: vec![],
        }
    }
}

thread_local! {
    static DRIVER: RefCell<FakeDriver> = RefCell::new(FakeDriver::default());
}

pub(crate) fn install(fake: FakeDriver) {
    DRIVER.with(|cell| *cell.borrow_mut() = fake);
}

pub(crate) fn driver<R>(f: impl FnOnce(&mut FakeDriver) -> R) -> R {
    DRIVER.with(|cell| f(&mut cell.borrow_mut()))
}

fn is_unresolvable(name: &CStr) -> bool {
    driver(|d| d.unresolvable.iter().any(|listed| *listed == name))
}

fn erase(address: *const ()) -> unsafe extern "system" fn() {
    unsafe { std::mem::transmute::<*const (), unsafe extern "system" fn()>(address) }
}

unsafe fn fill<T: Copy>(items: &[T], count: *mut u32, out: *mut T) -> vk::Result {
    unsafe {
        if out.is_null() {
            *count = items.len() as u32;
            return vk::Result::SUCCESS;
        }
        let written = (*count as usize).min(items.len());
        std::ptr::copy_nonoverlapping(items.as_ptr(), out, written);
        *count = written as u32;
        if written < items.len() {
            vk::Result::INCOMPLETE
        } else {
            vk::Result::SUCCESS
        }
    }
}

unsafe fn names(ptr: *const *const c_char, count: u32) -> Vec<CString> {
    if ptr.is_null() || count == 0 {
        return vec![];
    }
    unsafe {
        std::slice::from_raw_parts(ptr, count as usize)
            .iter()
            .map(|&name| CStr::from_ptr(name).to_owned())
            .collect()
    }
}

fn extension_properties(names: &[&CStr]) -> Vec<vk::ExtensionProperties> {
    names
        .iter()
        .map(|name| {
            let mut properties = vk::ExtensionProperties {
                spec_version: 1,
                ..Default::default()
            };
            write_fixed(&mut properties.extension_name, name);
            properties
        })
        .collect()
}

unsafe extern "system" fn fake_get_instance_proc_addr(
    _instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = unsafe { CStr::from_ptr(p_name) };
    if is_unresolvable(name) {
        return None;
    }

    let address = match name.to_bytes() {
        b"vkGetInstanceProcAddr" => fake_get_instance_proc_addr as *const (),
        b"vkCreateInstance" => fake_create_instance as *const (),
        b"vkEnumerateInstanceExtensionProperties" => {
            fake_enumerate_instance_extension_properties as *const ()
        }
        b"vkEnumerateInstanceLayerProperties" => fake_enumerate_instance_layer_properties as *const (),
        b"vkDestroyInstance" => fake_destroy_instance as *const (),
        b"vkEnumeratePhysicalDevices" => fake_enumerate_physical_devices as *const (),
        b"vkGetPhysicalDeviceFeatures" => fake_get_physical_device_features as *const (),
        b"vkGetPhysicalDeviceProperties" => fake_get_physical_device_properties as *const (),
        b"vkGetPhysicalDeviceQueueFamilyProperties" => {
            fake_get_physical_device_queue_family_properties as *const ()
        }
        b"vkEnumerateDeviceExtensionProperties" => {
            fake_enumerate_device_extension_properties as *const ()
        }
        b"vkCreateDevice" => fake_create_device as *const (),
        b"vkGetDeviceProcAddr" => fake_get_device_proc_addr as *const (),
        b"vkCreateDebugUtilsMessengerEXT" => fake_create_debug_utils_messenger as *const (),
        b"vkDestroyDebugUtilsMessengerEXT" => fake_destroy_debug_utils_messenger as *const (),
        b"vkGetPhysicalDeviceSurfaceSupportKHR" => fake_get_surface_support as *const (),
        b"vkGetPhysicalDeviceSurfacePresentModesKHR" => fake_get_surface_present_modes as *const (),
        b"vkDestroySurfaceKHR" => fake_destroy_surface as *const (),
        _ => noop as *const (),
    };
    Some(erase(address))
}

unsafe extern "system" fn fake_get_device_proc_addr(
    _device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = unsafe { CStr::from_ptr(p_name) };
    if is_unresolvable(name) {
        return None;
    }

    let address = match name.to_bytes() {
        b"vkDestroyDevice" => fake_destroy_device as *const (),
        b"vkDeviceWaitIdle" => fake_device_wait_idle as *const (),
        b"vkGetDeviceQueue" => fake_get_device_queue as *const (),
        _ => noop as *const (),
    };
    Some(erase(address))
}

unsafe extern "system" fn fake_create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let result = driver(|d| d.create_instance_result);
    if result != vk::Result::SUCCESS {
        return result;
    }

    unsafe {
        let info = &*p_create_info;
        let extensions = names(info.pp_enabled_extension_names, info.enabled_extension_count);
        let layers = names(info.pp_enabled_layer_names, info.enabled_layer_count);
        driver(|d| {
            d.created_instances += 1;
            d.enabled_instance_extensions = extensions;
            d.enabled_layers = layers;
        });
        *p_instance = vk::Instance::from_raw(INSTANCE);
    }
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_enumerate_instance_extension_properties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    let properties = driver(|d| {
        if p_layer_name.is_null() {
            return Some(extension_properties(&d.instance_extensions));
        }
        let layer = unsafe { CStr::from_ptr(p_layer_name) };
        d.layers
            .iter()
            .any(|listed| *listed == layer)
            .then(|| extension_properties(&d.layer_extensions))
    });

    match properties {
        Some(properties) => unsafe { fill(&properties, p_property_count, p_properties) },
        None => vk::Result::ERROR_LAYER_NOT_PRESENT,
    }
}

unsafe extern "system" fn fake_enumerate_instance_layer_properties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    let layers: Vec<vk::LayerProperties> = driver(|d| {
        d.layers
            .iter()
            .map(|name| {
                let mut properties = vk::LayerProperties::default();
                write_fixed(&mut properties.layer_name, name);
                properties
            })
            .collect()
    });
    unsafe { fill(&layers, p_property_count, p_properties) }
}

unsafe extern "system" fn fake_destroy_instance(
    _instance: vk::Instance,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    driver(|d| d.destroyed_instances += 1);
}

unsafe extern "system" fn fake_enumerate_physical_devices(
    _instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let devices: Vec<vk::PhysicalDevice> = (0..driver(|d| d.physical_device_count))
        .map(|i| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE + i as u64))
        .collect();
    unsafe { fill(&devices, p_physical_device_count, p_physical_devices) }
}

unsafe extern "system" fn fake_get_physical_device_features(
    _physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures,
) {
    unsafe { *p_features = driver(|d| d.features) };
}

unsafe extern "system" fn fake_get_physical_device_properties(
    _physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties,
) {
    let mut properties = vk::PhysicalDeviceProperties {
        api_version: vk::API_VERSION_1_3,
        device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
        ..Default::default()
    };
    write_fixed(&mut properties.device_name, c"Fake GPU");
    unsafe { *p_properties = properties };
}

unsafe extern "system" fn fake_get_physical_device_queue_family_properties(
    _physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    let families = driver(|d| d.queue_families.clone());
    // vkGetPhysicalDeviceQueueFamilyProperties has no result to report.
    let _ = unsafe {
        fill(
            &families,
            p_queue_family_property_count,
            p_queue_family_properties,
        )
    };
}

unsafe extern "system" fn fake_enumerate_device_extension_properties(
    _physical_device: vk::PhysicalDevice,
    _p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    let properties = driver(|d| extension_properties(&d.device_extensions));
    unsafe { fill(&properties, p_property_count, p_properties) }
}

unsafe extern "system" fn fake_create_device(
    _physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    let result = driver(|d| d.create_device_result);
    if result != vk::Result::SUCCESS {
        return result;
    }

    unsafe {
        let info = &*p_create_info;
        let requests: Vec<(u32, Vec<f32>)> = std::slice::from_raw_parts(
            info.p_queue_create_infos,
            info.queue_create_info_count as usize,
        )
        .iter()
        .map(|queue_info| {
            let priorities = std::slice::from_raw_parts(
                queue_info.p_queue_priorities,
                queue_info.queue_count as usize,
            );
            (queue_info.queue_family_index, priorities.to_vec())
        })
        .collect();
        let features = info.p_enabled_features.as_ref().copied();
        let extensions = names(info.pp_enabled_extension_names, info.enabled_extension_count);

        driver(|d| {
            d.created_devices += 1;
            d.device_requests = requests;
            d.enabled_device_features = features;
            d.enabled_device_extensions = extensions;
        });
        *p_device = vk::Device::from_raw(DEVICE);
    }
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_destroy_device(
    _device: vk::Device,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    driver(|d| d.destroyed_devices += 1);
}

unsafe extern "system" fn fake_device_wait_idle(_device: vk::Device) -> vk::Result {
    driver(|d| d.wait_idle_calls += 1);
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_get_device_queue(
    _device: vk::Device,
    queue_family_index: u32,
    queue_index: u32,
    p_queue: *mut vk::Queue,
) {
    let raw = QUEUE + ((queue_family_index as u64) << 8) + queue_index as u64;
    unsafe { *p_queue = vk::Queue::from_raw(raw) };
}

unsafe extern "system" fn fake_create_debug_utils_messenger(
    _instance: vk::Instance,
    _p_create_info: *const vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_messenger: *mut vk::DebugUtilsMessengerEXT,
) -> vk::Result {
    unsafe { *p_messenger = vk::DebugUtilsMessengerEXT::from_raw(MESSENGER) };
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_destroy_debug_utils_messenger(
    _instance: vk::Instance,
    _messenger: vk::DebugUtilsMessengerEXT,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    driver(|d| d.destroyed_messengers += 1);
}

unsafe extern "system" fn fake_get_surface_support(
    _physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    _surface: vk::SurfaceKHR,
    p_supported: *mut vk::Bool32,
) -> vk::Result {
    let supported = driver(|d| {
        d.present_support
            .get(queue_family_index as usize)
            .copied()
            .unwrap_or(true)
    });
    unsafe { *p_supported = if supported { vk::TRUE } else { vk::FALSE } };
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_get_surface_present_modes(
    _physical_device: vk::PhysicalDevice,
    _surface: vk::SurfaceKHR,
    p_present_mode_count: *mut u32,
    p_present_modes: *mut vk::PresentModeKHR,
) -> vk::Result {
    let modes = driver(|d| d.present_modes.clone());
    unsafe { fill(&modes, p_present_mode_count, p_present_modes) }
}

unsafe extern "system" fn fake_destroy_surface(
    _instance: vk::Instance,
    _surface: vk::SurfaceKHR,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    driver(|d| d.destroyed_surfaces += 1);
}
