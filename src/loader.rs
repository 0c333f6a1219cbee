//! Sources of function addresses: the driver library and the two bootstrap functions.

use crate::error::LoaderError;
use crate::table::ProcSource;
use ash::vk;
use std::ffi::{CStr, OsStr};
use std::sync::{Arc, Weak};

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
pub const LIBRARY: &str = "libvulkan.so.1";

#[cfg(target_os = "android")]
pub const LIBRARY: &str = "libvulkan.so";

#[cfg(windows)]
pub const LIBRARY: &str = "vulkan-1.dll";

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const LIBRARY: &str = "libvulkan.dylib";

/// The opened driver module. Unloaded when dropped.
pub struct Library {
    library: libloading::Library,
    path: String,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

impl Library {
    /// Opens the driver module at `path`, a bare library name or a full path.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all))]
    pub fn load(path: impl AsRef<OsStr>) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        #[cfg(feature = "enable_tracing")]
        tracing::trace!(?path, "Loading Vulkan library...");

        let library = unsafe { libloading::Library::new(path) }.map_err(|source| {
            LoaderError::ModuleLoadFailure {
                path: path.to_string_lossy().into_owned(),
                source,
            }
        })?;

        #[cfg(feature = "enable_tracing")]
        tracing::info!(?path, "Vulkan library loaded");

        Ok(Self {
            library,
            path: path.to_string_lossy().into_owned(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ProcSource for Library {
    fn lookup(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
        // Option<fn> keeps a null symbol address as None.
        unsafe { self.library.get::<vk::PFN_vkVoidFunction>(name.to_bytes_with_nul()) }
            .ok()
            .and_then(|symbol| *symbol)
    }
}

/// Shared ownership of the driver module.
///
/// Instances and devices hold a clone, so the module stays mapped until the
/// last object resolved from it is gone. Entries built from another
/// [`ProcSource`] carry an empty module that only tracks its users.
#[derive(Debug, Clone)]
pub struct Module(Arc<Option<Library>>);

impl Module {
    pub(crate) fn new(library: Option<Library>) -> Self {
        Self(Arc::new(library))
    }

    pub fn path(&self) -> Option<&str> {
        self.0.as_ref().as_ref().map(Library::path)
    }

    pub(crate) fn watch(&self) -> Weak<Option<Library>> {
        Arc::downgrade(&self.0)
    }
}

/// `vkGetInstanceProcAddr` bound to an instance handle. A null handle resolves global functions.
#[derive(Debug, Clone)]
pub struct InstanceLoader {
    get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    instance: vk::Instance,
    module: Option<Module>,
}

impl InstanceLoader {
    pub fn new(get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr, instance: vk::Instance) -> Self {
        Self {
            get_instance_proc_addr,
            instance,
            module: None,
        }
    }

    /// Keeps `module` loaded for as long as this loader, or anything it resolved, is in use.
    pub fn with_module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    /// The same bootstrap and module, bound to `instance`.
    pub fn for_instance(&self, instance: vk::Instance) -> Self {
        Self {
            instance,
            ..self.clone()
        }
    }

    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    pub fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    pub(crate) fn detach_module(&mut self) -> Option<Module> {
        self.module.take()
    }
}

impl ProcSource for InstanceLoader {
    fn lookup(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
        unsafe { (self.get_instance_proc_addr)(self.instance, name.as_ptr()) }
    }
}

/// `vkGetDeviceProcAddr` bound to a logical device handle.
#[derive(Debug, Clone)]
pub struct DeviceLoader {
    get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr,
    device: vk::Device,
    module: Option<Module>,
}

impl DeviceLoader {
    pub fn new(get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr, device: vk::Device) -> Self {
        Self {
            get_device_proc_addr,
            device,
            module: None,
        }
    }

    /// Keeps `module` loaded for as long as this loader, or anything it resolved, is in use.
    pub fn with_module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    pub(crate) fn detach_module(&mut self) -> Option<Module> {
        self.module.take()
    }
}

impl ProcSource for DeviceLoader {
    fn lookup(&self, name: &CStr) -> vk::PFN_vkVoidFunction {
        unsafe { (self.get_device_proc_addr)(self.device, name.as_ptr()) }
    }
}
