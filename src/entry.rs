use crate::error::LoaderError;
use crate::functions::{EXPORTED_FUNCTIONS, GLOBAL_FUNCTIONS};
use crate::loader::{InstanceLoader, LIBRARY, Library, Module};
use crate::table::{CapabilityTable, ProcSource};
use ash::vk;
use std::ffi::OsStr;
use std::fmt::{Debug, Formatter};
use std::sync::Weak;

/// Process-level state: the driver module plus the exported and global tables.
///
/// Shares the module handle with every loader handed out by
/// [`Entry::instance_loader`]. [`Entry::release`] gives up this entry's share;
/// the module is unloaded once the instances and devices built from it are
/// destroyed too.
pub struct Entry {
    module: Option<Module>,
    module_watch: Weak<Option<Library>>,
    exported: CapabilityTable,
    global: CapabilityTable,
    get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
}

impl Debug for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("module", &self.module)
            .field("exported", &self.exported)
            .field("global", &self.global)
            .finish()
    }
}

impl Entry {
    /// Loads the platform's default Vulkan library.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(LIBRARY)
    }

    pub fn load_from(path: impl AsRef<OsStr>) -> crate::Result<Self> {
        let library = Library::load(path)?;
        let entry = unsafe { Self::from_source(&library) }?;
        Ok(entry.with_module(Module::new(Some(library))))
    }

    /// Resolves the exported and global tiers from `source`.
    ///
    /// # Safety
    /// Addresses returned by `source` must be real Vulkan entry points matching
    /// their names, and must stay valid for as long as this entry is used.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all))]
    pub unsafe fn from_source(source: &impl ProcSource) -> crate::Result<Self> {
        let exported = CapabilityTable::resolve(source, EXPORTED_FUNCTIONS)?;
        let get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr =
            unsafe { exported.require(c"vkGetInstanceProcAddr") }?;

        #[cfg(feature = "enable_tracing")]
        tracing::trace!("Exported functions resolved");

        let global = CapabilityTable::resolve(
            &InstanceLoader::new(get_instance_proc_addr, vk::Instance::null()),
            GLOBAL_FUNCTIONS,
        )?;

        #[cfg(feature = "enable_tracing")]
        tracing::trace!("Global functions resolved");

        Ok(Self {
            module: None,
            module_watch: Weak::new(),
            exported,
            global,
            get_instance_proc_addr: Some(get_instance_proc_addr),
        }
        .with_module(Module::new(None)))
    }

    fn with_module(mut self, module: Module) -> Self {
        self.module_watch = module.watch();
        self.module = Some(module);
        self
    }

    pub fn exported_table(&self) -> &CapabilityTable {
        &self.exported
    }

    pub fn global_table(&self) -> &CapabilityTable {
        &self.global
    }

    /// Path of the loaded module, if this entry opened one itself.
    pub fn library_path(&self) -> Option<&str> {
        self.module.as_ref().and_then(Module::path)
    }

    pub fn is_released(&self) -> bool {
        self.get_instance_proc_addr.is_none()
    }

    /// Whether the module is still mapped. It can outlive [`Entry::release`]
    /// while instances or devices built from this entry are alive.
    pub fn is_module_loaded(&self) -> bool {
        self.module_watch.strong_count() > 0
    }

    pub fn get_instance_proc_addr(&self) -> crate::Result<vk::PFN_vkGetInstanceProcAddr> {
        self.get_instance_proc_addr.ok_or_else(|| {
            LoaderError::SymbolNotFound {
                tier: crate::Tier::Exported,
                name: "vkGetInstanceProcAddr".to_string(),
            }
            .into()
        })
    }

    /// The instance-level bootstrap for `instance`. It shares this entry's module.
    pub fn instance_loader(&self, instance: vk::Instance) -> crate::Result<InstanceLoader> {
        let loader = InstanceLoader::new(self.get_instance_proc_addr()?, instance);
        Ok(match &self.module {
            Some(module) => loader.with_module(module.clone()),
            None => loader,
        })
    }

    /// Clears the tables and drops this entry's share of the module. Calling it
    /// again does nothing.
    pub fn release(&mut self) {
        if self.get_instance_proc_addr.take().is_none() {
            return;
        }
        self.global = CapabilityTable::default();
        self.exported = CapabilityTable::default();
        drop(self.module.take());

        #[cfg(feature = "enable_tracing")]
        tracing::info!(
            unloaded = !self.is_module_loaded(),
            "Vulkan library released"
        );
    }
}
