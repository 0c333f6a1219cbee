//! One-call initialization: library, instance, optional surface, physical and logical device.

use crate::device::{Device, DeviceBuilder};
use crate::entry::Entry;
use crate::functions::SWAPCHAIN_EXT_NAME;
use crate::instance::{Instance, InstanceBuilder, WindowTraits};
use crate::physical_device::PhysicalDeviceSelector;
use crate::present::select_present_mode;
use crate::surface::Surface;
use crate::version::Version;
use ash::vk;
use std::ffi::CStr;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

type CreateSurface<'a> = Box<dyn FnOnce(&Entry, &Instance) -> crate::Result<Surface> + 'a>;

pub struct ContextBuilder<'a> {
    library_path: Option<PathBuf>,
    app_name: String,
    engine_name: String,
    app_version: Version,
    engine_version: Version,
    api_version: Version,
    instance_extensions: Vec<&'a CStr>,
    device_extensions: Vec<&'a CStr>,
    required_features: vk::PhysicalDeviceFeatures,
    queue_flags: vk::QueueFlags,
    desired_present_mode: vk::PresentModeKHR,
    request_validation_layers: bool,
    debug_messenger: bool,
    window: Option<&'a dyn WindowTraits>,
    create_surface: Option<CreateSurface<'a>>,
}

impl Debug for ContextBuilder<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("library_path", &self.library_path)
            .field("app_name", &self.app_name)
            .field("api_version", &self.api_version)
            .field("instance_extensions", &self.instance_extensions)
            .field("device_extensions", &self.device_extensions)
            .field("queue_flags", &self.queue_flags)
            .field("desired_present_mode", &self.desired_present_mode)
            .field("window", &self.window.is_some())
            .field("create_surface", &self.create_surface.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ContextBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ContextBuilder<'a> {
    pub fn new() -> Self {
        Self {
            library_path: None,
            app_name: "".to_string(),
            engine_name: "".to_string(),
            app_version: Version::new(0, 0, 0),
            engine_version: Version::new(0, 0, 0),
            api_version: Version::V1_0_0,
            instance_extensions: vec![],
            device_extensions: vec![],
            required_features: vk::PhysicalDeviceFeatures::default(),
            queue_flags: vk::QueueFlags::GRAPHICS,
            desired_present_mode: vk::PresentModeKHR::FIFO,
            request_validation_layers: false,
            debug_messenger: false,
            window: None,
            create_surface: None,
        }
    }

    /// Load this library instead of the platform default.
    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn engine_name(mut self, name: impl Into<String>) -> Self {
        self.engine_name = name.into();
        self
    }

    pub fn app_version(mut self, version: Version) -> Self {
        self.app_version = version;
        self
    }

    pub fn engine_version(mut self, version: Version) -> Self {
        self.engine_version = version;
        self
    }

    pub fn require_api_version(mut self, version: Version) -> Self {
        self.api_version = version;
        self
    }

    pub fn instance_extension(mut self, extension: &'a CStr) -> Self {
        self.instance_extensions.push(extension);
        self
    }

    pub fn device_extension(mut self, extension: &'a CStr) -> Self {
        self.device_extensions.push(extension);
        self
    }

    pub fn required_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.required_features = features;
        self
    }

    pub fn queue_flags(mut self, flags: vk::QueueFlags) -> Self {
        self.queue_flags = flags;
        self
    }

    /// Used when the surface supports it, FIFO otherwise.
    pub fn present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.desired_present_mode = mode;
        self
    }

    pub fn request_validation_layers(mut self, request: bool) -> Self {
        self.request_validation_layers = request;
        self
    }

    /// Route validation messages to `tracing` with `enable_tracing`, to stdout otherwise.
    pub fn debug_messenger(mut self, enable: bool) -> Self {
        self.debug_messenger = enable;
        self
    }

    /// Create a surface for `window` and only accept queue families that can present to it.
    pub fn window(mut self, window: &'a dyn WindowTraits) -> Self {
        self.window = Some(window);
        self
    }

    /// Create the surface with `create` once the instance exists, for windows
    /// that are not reachable through `raw-window-handle`. The surface
    /// extensions must be enabled with [`ContextBuilder::instance_extension`].
    /// Ignored when [`ContextBuilder::window`] is set.
    pub fn create_surface_with(
        mut self,
        create: impl FnOnce(&Entry, &Instance) -> crate::Result<Surface> + 'a,
    ) -> Self {
        self.create_surface = Some(Box::new(create));
        self
    }

    pub fn build(self) -> crate::Result<Context> {
        let entry = match &self.library_path {
            Some(path) => Entry::load_from(path)?,
            None => Entry::load()?,
        };
        self.build_with_entry(entry)
    }

    /// Runs every step after library loading against `entry`.
    ///
    /// On failure everything created so far is destroyed, `entry` included.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all))]
    pub fn build_with_entry(self, entry: Entry) -> crate::Result<Context> {
        let mut context = Context {
            device: None,
            surface: None,
            instance: None,
            present_mode: None,
            entry,
        };

        let mut instance_builder = InstanceBuilder::new(&context.entry)
            .app_name(self.app_name)
            .engine_name(self.engine_name)
            .app_version(self.app_version)
            .engine_version(self.engine_version)
            .require_api_version(self.api_version)
            .request_validation_layers(self.request_validation_layers);

        for extension in &self.instance_extensions {
            instance_builder = instance_builder.enable_extension(extension);
        }

        if self.debug_messenger {
            #[cfg(feature = "enable_tracing")]
            {
                instance_builder = instance_builder.use_default_tracing_messenger();
            }
            #[cfg(not(feature = "enable_tracing"))]
            {
                instance_builder = instance_builder.use_default_debug_messenger();
            }
        }

        if let Some(window) = self.window {
            instance_builder = instance_builder.require_surface_extensions(&window)?;
        }

        let instance: &Instance = context.instance.insert(instance_builder.build()?);

        let created = match (self.window, self.create_surface) {
            (Some(window), _) => Some(Surface::new(&context.entry, instance, &window)?),
            (None, Some(create)) => Some(create(&context.entry, instance)?),
            (None, None) => None,
        };
        let surface: Option<&Surface> = match created {
            Some(created) => Some(context.surface.insert(created)),
            None => None,
        };

        let mut selector = PhysicalDeviceSelector::new(instance)
            .required_queue_flags(self.queue_flags)
            .add_required_features(&self.required_features);
        for extension in &self.device_extensions {
            selector = selector.add_required_extension(extension);
        }
        if let Some(surface) = surface {
            selector = selector
                .surface(surface)
                .add_required_extension(SWAPCHAIN_EXT_NAME);
        }
        let physical_device = selector.select()?;

        if let Some(surface) = surface {
            let modes = surface.present_modes(instance, physical_device.handle())?;
            context.present_mode = Some(select_present_mode(self.desired_present_mode, &modes));
        }

        context.device = Some(DeviceBuilder::new(instance, physical_device).build()?);

        #[cfg(feature = "enable_tracing")]
        tracing::info!(present_mode = ?context.present_mode, "Context ready");

        Ok(context)
    }
}

/// Owns every object created during initialization and destroys them in reverse order.
pub struct Context {
    device: Option<Device>,
    surface: Option<Surface>,
    instance: Option<Instance>,
    present_mode: Option<vk::PresentModeKHR>,
    entry: Entry,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device)
            .field("surface", &self.surface)
            .field("instance", &self.instance)
            .field("present_mode", &self.present_mode)
            .field("entry", &self.entry)
            .finish()
    }
}

impl Context {
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// `None` once released.
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    /// The selected present mode. `None` without a window.
    pub fn present_mode(&self) -> Option<vk::PresentModeKHR> {
        self.present_mode
    }

    /// Destroys device, surface, debug messenger and instance, then unloads the
    /// library. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            if let Err(_err) = device.wait_idle() {
                #[cfg(feature = "enable_tracing")]
                tracing::warn!(%_err, "Device did not go idle before destruction");
            }
            device.destroy();
        }

        if let Some(mut surface) = self.surface.take() {
            if let Some(instance) = &self.instance {
                surface.destroy(instance);
            }
        }

        if let Some(mut instance) = self.instance.take() {
            instance.destroy();
        }

        self.present_mode = None;
        self.entry.release();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.release();
    }
}
