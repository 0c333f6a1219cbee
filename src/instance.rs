use crate::entry::Entry;
use crate::error::InstanceError;
use crate::extensions::{ExtensionDescriptor, filter_enabled, is_extension_available, require_extensions};
use crate::functions::{DEBUG_UTILS_EXT_NAME, INSTANCE_EXTENSION_FUNCTIONS, INSTANCE_FUNCTIONS};
use crate::loader::InstanceLoader;
use crate::system_info::{SystemInfo, VALIDATION_LAYER_NAME};
use crate::table::{CapabilityTable, ProcSource};
use crate::version::Version;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::borrow::Cow;
use std::ffi::{self, CStr, CString, c_char};

pub trait WindowTraits: HasDisplayHandle + HasWindowHandle {}
impl<T> WindowTraits for T where T: HasDisplayHandle + HasWindowHandle {}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    unsafe {
        let callback_data = &*p_callback_data;
        let message_id_number = callback_data.message_id_number;

        let message_id_name = if callback_data.p_message_id_name.is_null() {
            Cow::from("")
        } else {
            ffi::CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
        };

        let message = if callback_data.p_message.is_null() {
            Cow::from("")
        } else {
            ffi::CStr::from_ptr(callback_data.p_message).to_string_lossy()
        };

        println!(
            "{message_severity:?}:\n{message_type:?} [{message_id_name} ({message_id_number})] : {message}\n",
        );

        vk::FALSE
    }
}

fn push_unique<'a>(names: &mut Vec<&'a CStr>, name: &'a CStr) {
    if !names.contains(&name) {
        names.push(name);
    }
}

#[derive(Debug)]
pub struct InstanceBuilder<'a> {
    entry: &'a Entry,

    // VkApplicationInfo
    app_name: String,
    engine_name: String,
    application_version: Version,
    engine_version: Version,
    api_version: Version,

    // VkInstanceCreateInfo
    layers: Vec<&'a CStr>,
    extensions: Vec<&'a CStr>,
    flags: vk::InstanceCreateFlags,

    // debug callback
    debug_callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    debug_message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    debug_message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    use_debug_messenger: bool,

    request_validation_layers: bool,
    enable_validation_layers: bool,
}

impl<'a> InstanceBuilder<'a> {
    pub fn new(entry: &'a Entry) -> Self {
        Self {
            entry,
            app_name: "".to_string(),
            engine_name: "".to_string(),
            application_version: Version::new(0, 0, 0),
            engine_version: Version::new(0, 0, 0),
            api_version: Version::V1_0_0,
            layers: vec![],
            extensions: vec![],
            flags: vk::InstanceCreateFlags::empty(),
            debug_callback: None,
            debug_message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            debug_message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            use_debug_messenger: false,
            request_validation_layers: false,
            enable_validation_layers: false,
        }
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn engine_name(mut self, engine_name: impl Into<String>) -> Self {
        self.engine_name = engine_name.into();
        self
    }

    pub fn app_version(mut self, version: Version) -> Self {
        self.application_version = version;
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

    pub fn flags(mut self, flags: vk::InstanceCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn enable_layer(mut self, layer: &'a CStr) -> Self {
        push_unique(&mut self.layers, layer);
        self
    }

    pub fn enable_extension(mut self, extension: &'a CStr) -> Self {
        push_unique(&mut self.extensions, extension);
        self
    }

    pub fn enable_extensions(mut self, extensions: impl IntoIterator<Item = &'a CStr>) -> Self {
        for extension in extensions {
            push_unique(&mut self.extensions, extension);
        }
        self
    }

    /// Adds the platform surface extensions `window` needs for presentation.
    pub fn require_surface_extensions(self, window: &impl HasDisplayHandle) -> crate::Result<Self> {
        let extensions = crate::surface::required_extensions(window)?;
        Ok(self.enable_extensions(extensions))
    }

    /// Fail instance creation if the validation layer is missing.
    pub fn enable_validation_layers(mut self, enable: bool) -> Self {
        self.enable_validation_layers = enable;
        self
    }

    /// Enable the validation layer only when it is installed.
    pub fn request_validation_layers(mut self, request: bool) -> Self {
        self.request_validation_layers = request;
        self
    }

    pub fn use_default_debug_messenger(mut self) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = Some(vulkan_debug_callback);
        self
    }

    #[cfg(feature = "enable_tracing")]
    pub fn use_default_tracing_messenger(mut self) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = Some(crate::tracing::vulkan_tracing_callback);
        self
    }

    pub fn set_debug_messenger(mut self, callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = callback;
        self
    }

    pub fn debug_messenger_severity(
        mut self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> Self {
        self.debug_message_severity = severity;
        self
    }

    pub fn add_debug_messenger_severity(
        mut self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> Self {
        self.debug_message_severity |= severity;
        self
    }

    pub fn debug_messenger_type(mut self, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        self.debug_message_type = message_type;
        self
    }

    pub fn add_debug_messenger_type(
        mut self,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    ) -> Self {
        self.debug_message_type |= message_type;
        self
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn build(self) -> crate::Result<Instance> {
        let system_info = SystemInfo::query(self.entry)?;

        let mut enabled_extensions: Vec<&CStr> = self.extensions.clone();

        let use_debug_messenger = self.use_debug_messenger
            && self.debug_callback.is_some()
            && system_info.debug_utils_available;
        if use_debug_messenger {
            push_unique(&mut enabled_extensions, DEBUG_UTILS_EXT_NAME);
        }

        #[cfg(feature = "enable_tracing")]
        if self.use_debug_messenger && !use_debug_messenger {
            tracing::warn!("Debug messenger requested but VK_EXT_debug_utils is unavailable");
        }

        #[cfg(feature = "portability")]
        push_unique(
            &mut enabled_extensions,
            ash::khr::portability_enumeration::NAME,
        );

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(?enabled_extensions);

        require_extensions(
            &system_info.available_extensions,
            enabled_extensions.iter().copied(),
        )?;

        let mut enabled_layers: Vec<&CStr> = self.layers.clone();
        if self.enable_validation_layers
            || (self.request_validation_layers && system_info.validation_layers_available)
        {
            push_unique(&mut enabled_layers, VALIDATION_LAYER_NAME);
        }

        if let Some(missing) = enabled_layers
            .iter()
            .find(|layer| !system_info.is_layer_available(layer))
        {
            return Err(InstanceError::MissingLayer(missing.to_string_lossy().into_owned()).into());
        }

        let app_name = CString::new(self.app_name).map_err(anyhow::Error::from)?;
        let engine_name = CString::new(self.engine_name).map_err(anyhow::Error::from)?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(self.application_version.into())
            .engine_name(&engine_name)
            .engine_version(self.engine_version.into())
            .api_version(self.api_version.into());

        #[cfg(feature = "enable_tracing")]
        tracing::debug!(
            ?app_name,
            application_version = %self.application_version,
            ?engine_name,
            engine_version = %self.engine_version,
            api_version = %self.api_version,
            "Creating vkInstance with application info..."
        );

        let instance_create_flags = if cfg!(feature = "portability") {
            self.flags | vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            self.flags
        };

        let enabled_extension_ptr = enabled_extensions
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<*const c_char>>();

        let enabled_layers_ptr = enabled_layers
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<*const c_char>>();

        let instance_create_info = vk::InstanceCreateInfo::default()
            .flags(instance_create_flags)
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extension_ptr)
            .enabled_layer_names(&enabled_layers_ptr);

        let create_instance: vk::PFN_vkCreateInstance =
            unsafe { self.entry.global_table().require(c"vkCreateInstance") }?;
        let bootstrap = self.entry.instance_loader(vk::Instance::null())?;

        let mut handle = vk::Instance::null();
        let result = unsafe { create_instance(&instance_create_info, std::ptr::null(), &mut handle) };
        if result != vk::Result::SUCCESS {
            return Err(InstanceError::FailedCreateInstance(result).into());
        }
        if handle == vk::Instance::null() {
            return Err(
                InstanceError::FailedCreateInstance(vk::Result::ERROR_INITIALIZATION_FAILED).into(),
            );
        }

        #[cfg(feature = "enable_tracing")]
        tracing::info!("Created vkInstance");

        let loader = bootstrap.for_instance(handle);
        let enabled = filter_enabled(&system_info.available_extensions, &enabled_extensions);

        let table = match resolve_instance_table(&loader, &enabled) {
            Ok(table) => table,
            Err(err) => {
                unsafe { destroy_unresolved_instance(&loader) };
                return Err(err);
            }
        };

        let mut instance = Instance {
            instance: handle,
            loader,
            table,
            available_extensions: system_info.available_extensions,
            enabled_extensions: enabled,
            debug_messenger: None,
            api_version: self.api_version,
        };

        if use_debug_messenger {
            if let Err(err) = instance.create_debug_messenger(
                self.debug_message_severity,
                self.debug_message_type,
                self.debug_callback,
            ) {
                instance.destroy();
                return Err(err);
            }
        }

        Ok(instance)
    }
}

/// Resolves the instance tier, then the instance extension functions gated on `enabled`.
fn resolve_instance_table(
    loader: &InstanceLoader,
    enabled: &[ExtensionDescriptor],
) -> crate::Result<CapabilityTable> {
    let mut table = CapabilityTable::resolve(loader, INSTANCE_FUNCTIONS)?;

    #[cfg(feature = "enable_tracing")]
    tracing::trace!("Instance functions resolved");

    table.merge(CapabilityTable::resolve_gated(
        loader,
        INSTANCE_EXTENSION_FUNCTIONS,
        enabled,
    )?)?;

    #[cfg(feature = "enable_tracing")]
    tracing::trace!("Instance extension functions resolved");

    Ok(table)
}

/// Destroys an instance whose table could not be built, if the driver offers a way to.
unsafe fn destroy_unresolved_instance(loader: &InstanceLoader) {
    if let Some(destroy) = loader.lookup(c"vkDestroyInstance") {
        unsafe {
            let destroy: vk::PFN_vkDestroyInstance = std::mem::transmute(destroy);
            destroy(loader.instance(), std::ptr::null());
        }
    }
}

#[derive(Debug)]
pub struct Instance {
    instance: vk::Instance,
    loader: InstanceLoader,
    table: CapabilityTable,
    available_extensions: Vec<ExtensionDescriptor>,
    enabled_extensions: Vec<ExtensionDescriptor>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub api_version: Version,
}

impl Instance {
    fn create_debug_messenger(
        &mut self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
        callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    ) -> crate::Result<()> {
        let create: vk::PFN_vkCreateDebugUtilsMessengerEXT =
            unsafe { self.table.require(c"vkCreateDebugUtilsMessengerEXT") }?;

        let messenger_create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity)
            .message_type(message_type)
            .pfn_user_callback(callback);

        let mut messenger = vk::DebugUtilsMessengerEXT::null();
        let result =
            unsafe { create(self.instance, &messenger_create_info, std::ptr::null(), &mut messenger) };
        if result != vk::Result::SUCCESS {
            return Err(InstanceError::FailedCreateDebugMessenger(result).into());
        }

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(?callback, "Using debug messenger");

        self.debug_messenger = Some(messenger);
        Ok(())
    }

    /// The raw handle, null once destroyed.
    pub fn handle(&self) -> vk::Instance {
        self.instance
    }

    pub fn is_destroyed(&self) -> bool {
        self.instance == vk::Instance::null()
    }

    /// Instance-level functions plus the extension functions whose extension is enabled.
    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// `vkGetInstanceProcAddr` bound to this instance, for functions outside the fixed lists.
    pub fn loader(&self) -> &InstanceLoader {
        &self.loader
    }

    pub fn available_extensions(&self) -> &[ExtensionDescriptor] {
        &self.available_extensions
    }

    pub fn enabled_extensions(&self) -> &[ExtensionDescriptor] {
        &self.enabled_extensions
    }

    pub fn is_extension_enabled(&self, extension: &CStr) -> bool {
        is_extension_available(&self.enabled_extensions, extension)
    }

    pub fn debug_messenger(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.debug_messenger
    }

    /// Destroys the debug messenger and the instance, then empties the table and
    /// gives up this instance's share of the module. Later calls do nothing.
    ///
    /// Every device and surface created from this instance must be destroyed first.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }

        unsafe {
            if let Some(messenger) = self.debug_messenger.take() {
                if let Some(destroy) = self
                    .table
                    .function::<vk::PFN_vkDestroyDebugUtilsMessengerEXT>(c"vkDestroyDebugUtilsMessengerEXT")
                {
                    destroy(self.instance, messenger, std::ptr::null());
                }
            }
            if let Some(destroy_instance) =
                self.table.function::<vk::PFN_vkDestroyInstance>(c"vkDestroyInstance")
            {
                destroy_instance(self.instance, std::ptr::null());
            }
        }
        self.instance = vk::Instance::null();
        self.table = CapabilityTable::default();
        drop(self.loader.detach_module());

        #[cfg(feature = "enable_tracing")]
        tracing::info!("Destroyed vkInstance");
    }
}

impl AsRef<CapabilityTable> for Instance {
    fn as_ref(&self) -> &CapabilityTable {
        &self.table
    }
}
