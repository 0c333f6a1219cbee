use crate::entry::Entry;
use crate::error::SurfaceError;
use crate::extensions::enumerate;
use crate::instance::{Instance, WindowTraits};
use ash::vk;
use raw_window_handle::HasDisplayHandle;
use std::ffi::CStr;

/// Instance extensions needed to present to windows on `window`'s display.
pub fn required_extensions(window: &impl HasDisplayHandle) -> crate::Result<Vec<&'static CStr>> {
    let display = window.display_handle().map_err(SurfaceError::from)?;
    let extensions = ash_window::enumerate_required_extensions(display.as_raw())?;

    Ok(extensions
        .iter()
        .map(|&name| unsafe { CStr::from_ptr(name) })
        .collect())
}

/// A `VkSurfaceKHR`. Destroy it through the instance that created it.
#[derive(Debug)]
pub struct Surface {
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Creates a surface for `window`.
    ///
    /// The platform surface functions are not part of the fixed tables, so the
    /// library behind `entry` is reopened for `ash-window` to resolve them.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all))]
    pub fn new(entry: &Entry, instance: &Instance, window: &impl WindowTraits) -> crate::Result<Self> {
        let path = entry.library_path().ok_or_else(|| {
            anyhow::anyhow!("window surfaces need an entry loaded from a Vulkan library")
        })?;

        let display = window.display_handle().map_err(SurfaceError::from)?;
        let window = window.window_handle().map_err(SurfaceError::from)?;

        let surface = unsafe {
            let ash_entry = ash::Entry::load_from(path).map_err(anyhow::Error::from)?;
            let ash_instance = ash::Instance::load(ash_entry.static_fn(), instance.handle());
            ash_window::create_surface(
                &ash_entry,
                &ash_instance,
                display.as_raw(),
                window.as_raw(),
                None,
            )
        }
        .map_err(SurfaceError::FailedCreateSurface)?;

        #[cfg(feature = "enable_tracing")]
        tracing::info!(?surface, "Created surface");

        Ok(Self { surface })
    }

    /// Wraps a surface created elsewhere. It is destroyed by [`Surface::destroy`].
    pub fn from_raw(surface: vk::SurfaceKHR) -> Self {
        Self { surface }
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn is_destroyed(&self) -> bool {
        self.surface == vk::SurfaceKHR::null()
    }

    /// Whether queue family `family_index` of `physical_device` can present here.
    pub fn supports_present(
        &self,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
    ) -> crate::Result<bool> {
        let get_support: vk::PFN_vkGetPhysicalDeviceSurfaceSupportKHR =
            unsafe { instance.table().require(c"vkGetPhysicalDeviceSurfaceSupportKHR") }?;

        let mut supported = vk::FALSE;
        let result = unsafe { get_support(physical_device, family_index, self.surface, &mut supported) };
        if result != vk::Result::SUCCESS {
            return Err(SurfaceError::FailedQuerySupport(result).into());
        }

        Ok(supported != vk::FALSE)
    }

    pub fn present_modes(
        &self,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<Vec<vk::PresentModeKHR>> {
        let get_present_modes: vk::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR =
            unsafe { instance.table().require(c"vkGetPhysicalDeviceSurfacePresentModesKHR") }?;

        let modes = enumerate("vkGetPhysicalDeviceSurfacePresentModesKHR", |count, out| unsafe {
            get_present_modes(physical_device, self.surface, count, out)
        })?;

        Ok(modes)
    }

    /// Later calls do nothing.
    pub fn destroy(&mut self, instance: &Instance) {
        if self.is_destroyed() {
            return;
        }

        unsafe {
            if let Some(destroy_surface) = instance
                .table()
                .function::<vk::PFN_vkDestroySurfaceKHR>(c"vkDestroySurfaceKHR")
            {
                destroy_surface(instance.handle(), self.surface, std::ptr::null());
            }
        }
        self.surface = vk::SurfaceKHR::null();

        #[cfg(feature = "enable_tracing")]
        tracing::info!("Destroyed surface");
    }
}
