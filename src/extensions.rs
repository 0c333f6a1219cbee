use crate::error::QueryError;
use ash::vk;
use std::ffi::{CStr, CString, c_char};

/// Snapshot of one extension reported by the driver or a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionDescriptor {
    pub name: CString,
    pub spec_version: u32,
}

impl ExtensionDescriptor {
    pub fn new(name: &CStr, spec_version: u32) -> Self {
        Self {
            name: name.to_owned(),
            spec_version,
        }
    }
}

impl From<&vk::ExtensionProperties> for ExtensionDescriptor {
    fn from(properties: &vk::ExtensionProperties) -> Self {
        Self::new(fixed_cstr(&properties.extension_name), properties.spec_version)
    }
}

/// Reads a NUL terminated name out of one of Vulkan's fixed size `char` arrays.
pub(crate) fn fixed_cstr(raw: &[c_char]) -> &CStr {
    // c_char and u8 share size and alignment.
    let bytes = unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<u8>(), raw.len()) };
    CStr::from_bytes_until_nul(bytes).unwrap_or_default()
}

#[cfg(test)]
/// Copies `name` into a fixed size `char` array, truncating so a NUL always fits.
pub(crate) fn write_fixed(dst: &mut [c_char], name: &CStr) {
    let bytes = name.to_bytes();
    let len = bytes.len().min(dst.len().saturating_sub(1));
    for (slot, byte) in dst.iter_mut().zip(&bytes[..len]) {
        *slot = *byte as c_char;
    }
    if let Some(terminator) = dst.get_mut(len) {
        *terminator = 0;
    }
}

/// Runs the count-then-fill idiom of the Vulkan enumeration calls.
///
/// `query` receives the count pointer and either a null or a sized output
/// pointer. `VK_INCOMPLETE` on the fill call means the set grew in between and
/// the whole sequence is repeated.
pub(crate) fn enumerate<T: Default + Clone>(
    call: &'static str,
    mut query: impl FnMut(&mut u32, *mut T) -> vk::Result,
) -> Result<Vec<T>, QueryError> {
    loop {
        let mut count = 0;
        let result = query(&mut count, std::ptr::null_mut());
        if result != vk::Result::SUCCESS {
            return Err(QueryError::QueryFailure { call, result });
        }

        let mut items = vec![T::default(); count as usize];
        match query(&mut count, items.as_mut_ptr()) {
            vk::Result::SUCCESS => {
                items.truncate(count as usize);
                return Ok(items);
            }
            vk::Result::INCOMPLETE => continue,
            result => return Err(QueryError::QueryFailure { call, result }),
        }
    }
}

/// [`enumerate`], but an empty result is an error.
pub(crate) fn enumerate_nonempty<T: Default + Clone>(
    call: &'static str,
    query: impl FnMut(&mut u32, *mut T) -> vk::Result,
) -> Result<Vec<T>, QueryError> {
    let items = enumerate(call, query)?;
    if items.is_empty() {
        return Err(QueryError::NothingReported(call));
    }
    Ok(items)
}

/// Queries an extension list through `query`, which wraps
/// `vkEnumerateInstanceExtensionProperties` or `vkEnumerateDeviceExtensionProperties`
/// bound to its context. Reporting no extensions at all is treated as a failure.
pub fn enumerate_extensions(
    call: &'static str,
    query: impl FnMut(&mut u32, *mut vk::ExtensionProperties) -> vk::Result,
) -> Result<Vec<ExtensionDescriptor>, QueryError> {
    let properties = enumerate_nonempty(call, query)?;

    #[cfg(feature = "enable_tracing")]
    tracing::trace!(call, count = properties.len(), "Enumerated extensions");

    Ok(properties.iter().map(ExtensionDescriptor::from).collect())
}

pub fn is_extension_available(available: &[ExtensionDescriptor], name: &CStr) -> bool {
    available.iter().any(|ext| ext.name.as_c_str() == name)
}

/// Checks that every desired extension is available. Fails on the first one missing.
pub fn require_extensions<'a>(
    available: &[ExtensionDescriptor],
    desired: impl IntoIterator<Item = &'a CStr>,
) -> crate::Result<()> {
    for name in desired {
        if !is_extension_available(available, name) {
            return Err(crate::Error::MissingExtension(
                name.to_string_lossy().into_owned(),
            ));
        }
    }
    Ok(())
}

/// The subset of `available` whose names appear in `enabled`.
pub(crate) fn filter_enabled(
    available: &[ExtensionDescriptor],
    enabled: &[&CStr],
) -> Vec<ExtensionDescriptor> {
    available
        .iter()
        .filter(|ext| enabled.iter().any(|name| *name == ext.name.as_c_str()))
        .cloned()
        .collect()
}
