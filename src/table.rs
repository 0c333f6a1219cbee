//! Capability tables: named entry points resolved for one tier context.
//!
//! A table is built in one go by [`CapabilityTable::resolve`] or
//! [`CapabilityTable::resolve_gated`] and is read-only afterwards. Resolution
//! never hands out a partially filled table: on the first failure the table
//! under construction is dropped and the error names the missing function.

use crate::error::LoaderError;
use crate::extensions::{ExtensionDescriptor, is_extension_available};
use ash::vk;
use std::collections::BTreeMap;
use std::ffi::CStr;
use std::fmt::{self, Debug, Display, Formatter};

/// Resolution level of an entry point. Each level needs a different bootstrap context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Looked up directly in the driver library.
    Exported,
    /// Resolved through `vkGetInstanceProcAddr` with a null instance.
    Global,
    Instance,
    InstanceExtension,
    /// Resolved through `vkGetDeviceProcAddr`.
    Device,
    DeviceExtension,
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Exported => "exported",
            Tier::Global => "global-level",
            Tier::Instance => "instance-level",
            Tier::InstanceExtension => "instance-level extension",
            Tier::Device => "device-level",
            Tier::DeviceExtension => "device-level extension",
        })
    }
}

/// Static description of one function to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPointSpec {
    pub tier: Tier,
    pub name: &'static CStr,
    /// Extension that must be enabled before the function is looked up.
    pub extension: Option<&'static CStr>,
}

impl EntryPointSpec {
    pub const fn new(tier: Tier, name: &'static CStr) -> Self {
        Self {
            tier,
            name,
            extension: None,
        }
    }

    pub const fn gated(tier: Tier, name: &'static CStr, extension: &'static CStr) -> Self {
        Self {
            tier,
            name,
            extension: Some(extension),
        }
    }
}

/// Anything that maps a function name to an address: the driver library itself,
/// or a bootstrap function bound to an instance or device handle.
///
/// A `None` return means the function is absent. A null address is never a valid function.
pub trait ProcSource {
    fn lookup(&self, name: &CStr) -> vk::PFN_vkVoidFunction;
}

/// A resolved, non-null function address tagged with its name and tier.
#[derive(Clone, Copy)]
pub struct EntryPoint {
    name: &'static CStr,
    tier: Tier,
    address: unsafe extern "system" fn(),
}

impl EntryPoint {
    pub fn name(&self) -> &'static CStr {
        self.name
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn address(&self) -> unsafe extern "system" fn() {
        self.address
    }
}

impl Debug for EntryPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("address", &(self.address as *const ()))
            .finish()
    }
}

fn resolve_one(
    source: &impl ProcSource,
    spec: &EntryPointSpec,
) -> Result<EntryPoint, LoaderError> {
    match source.lookup(spec.name) {
        Some(address) => Ok(EntryPoint {
            name: spec.name,
            tier: spec.tier,
            address,
        }),
        None => Err(LoaderError::SymbolNotFound {
            tier: spec.tier,
            name: spec.name.to_string_lossy().into_owned(),
        }),
    }
}

/// Resolves `spec` only if its owning extension is in `enabled`.
///
/// [`Instance`](crate::Instance) and [`Device`](crate::Device) pass the
/// extensions enabled at creation, not everything the driver advertises: an
/// extension that is available but was not enabled leaves its functions out
/// of the table.
///
/// Returns `Ok(None)` when the extension is absent. When the extension is
/// listed but the source still returns no address, that is an error: the
/// driver claims support it does not provide. Specs without an owning
/// extension are resolved unconditionally.
pub fn resolve_extension_entry(
    source: &impl ProcSource,
    spec: &EntryPointSpec,
    enabled: &[ExtensionDescriptor],
) -> Result<Option<EntryPoint>, LoaderError> {
    if let Some(extension) = spec.extension {
        if !is_extension_available(enabled, extension) {
            #[cfg(feature = "enable_tracing")]
            tracing::debug!(name = ?spec.name, ?extension, "Skipping, extension not enabled");
            return Ok(None);
        }
    }

    resolve_one(source, spec).map(Some)
}

/// Name to entry point mapping for one tier context.
#[derive(Debug, Default, Clone)]
pub struct CapabilityTable {
    entries: BTreeMap<&'static CStr, EntryPoint>,
}

impl CapabilityTable {
    /// Resolves every function in `specs`. Any absent function fails the whole call.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all, fields(count = specs.len())))]
    pub fn resolve(source: &impl ProcSource, specs: &[EntryPointSpec]) -> Result<Self, LoaderError> {
        let mut table = Self::default();
        for spec in specs {
            table.insert(resolve_one(source, spec)?)?;
        }

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(resolved = table.len());

        Ok(table)
    }

    /// Resolves the functions of `specs` whose owning extension is in `enabled`.
    /// Functions gated on any other extension are left out of the table.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip_all, fields(count = specs.len())))]
    pub fn resolve_gated(
        source: &impl ProcSource,
        specs: &[EntryPointSpec],
        enabled: &[ExtensionDescriptor],
    ) -> Result<Self, LoaderError> {
        let mut table = Self::default();
        for spec in specs {
            if let Some(entry) = resolve_extension_entry(source, spec, enabled)? {
                table.insert(entry)?;
            }
        }

        #[cfg(feature = "enable_tracing")]
        tracing::trace!(resolved = table.len(), skipped = specs.len() - table.len());

        Ok(table)
    }

    fn insert(&mut self, entry: EntryPoint) -> Result<(), LoaderError> {
        if self.entries.contains_key(entry.name) {
            return Err(LoaderError::DuplicateEntryPoint(
                entry.name.to_string_lossy().into_owned(),
            ));
        }
        self.entries.insert(entry.name, entry);
        Ok(())
    }

    /// Folds `other` into this table. Fails without modifying `self` if a name appears in both.
    pub(crate) fn merge(&mut self, other: CapabilityTable) -> Result<(), LoaderError> {
        if let Some(name) = other.entries.keys().find(|name| self.entries.contains_key(*name)) {
            return Err(LoaderError::DuplicateEntryPoint(
                name.to_string_lossy().into_owned(),
            ));
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    pub fn get(&self, name: &CStr) -> Option<&EntryPoint> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &CStr) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryPoint> {
        self.entries.values()
    }

    pub fn entries_of(&self, tier: Tier) -> impl Iterator<Item = &EntryPoint> {
        self.entries.values().filter(move |entry| entry.tier == tier)
    }

    /// Returns the entry point reinterpreted as the function pointer type `F`.
    ///
    /// # Safety
    /// `F` must be the `PFN_*` type matching `name`.
    pub unsafe fn function<F: Copy>(&self, name: &CStr) -> Option<F> {
        assert_eq!(
            size_of::<F>(),
            size_of::<unsafe extern "system" fn()>(),
            "entry points can only be cast to function pointers"
        );
        self.entries
            .get(name)
            .map(|entry| unsafe { std::mem::transmute_copy::<unsafe extern "system" fn(), F>(&entry.address) })
    }

    /// Like [`Self::function`], but an empty slot is an error naming the function.
    ///
    /// # Safety
    /// `F` must be the `PFN_*` type matching `name`.
    pub(crate) unsafe fn require<F: Copy>(&self, name: &CStr) -> crate::Result<F> {
        unsafe { self.function(name) }
            .ok_or_else(|| crate::Error::EntryPointUnavailable(name.to_string_lossy().into_owned()))
    }
}
