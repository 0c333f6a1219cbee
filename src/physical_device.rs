use crate::error::PhysicalDeviceError;
use crate::extensions::{
    ExtensionDescriptor, enumerate, enumerate_extensions, filter_enabled, fixed_cstr,
    require_extensions,
};
use crate::instance::Instance;
use crate::surface::Surface;
use crate::version::Version;
use ash::vk;
use std::ffi::CStr;

pub const FEATURE_COUNT: usize = 55;

/// Names of the `VkPhysicalDeviceFeatures` members, in declaration order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "robustBufferAccess",
    "fullDrawIndexUint32",
    "imageCubeArray",
    "independentBlend",
    "geometryShader",
    "tessellationShader",
    "sampleRateShading",
    "dualSrcBlend",
    "logicOp",
    "multiDrawIndirect",
    "drawIndirectFirstInstance",
    "depthClamp",
    "depthBiasClamp",
    "fillModeNonSolid",
    "depthBounds",
    "wideLines",
    "largePoints",
    "alphaToOne",
    "multiViewport",
    "samplerAnisotropy",
    "textureCompressionETC2",
    "textureCompressionASTC_LDR",
    "textureCompressionBC",
    "occlusionQueryPrecise",
    "pipelineStatisticsQuery",
    "vertexPipelineStoresAndAtomics",
    "fragmentStoresAndAtomics",
    "shaderTessellationAndGeometryPointSize",
    "shaderImageGatherExtended",
    "shaderStorageImageExtendedFormats",
    "shaderStorageImageMultisample",
    "shaderStorageImageReadWithoutFormat",
    "shaderStorageImageWriteWithoutFormat",
    "shaderUniformBufferArrayDynamicIndexing",
    "shaderSampledImageArrayDynamicIndexing",
    "shaderStorageBufferArrayDynamicIndexing",
    "shaderStorageImageArrayDynamicIndexing",
    "shaderClipDistance",
    "shaderCullDistance",
    "shaderFloat64",
    "shaderInt64",
    "shaderInt16",
    "shaderResourceResidency",
    "shaderResourceMinLod",
    "sparseBinding",
    "sparseResidencyBuffer",
    "sparseResidencyImage2D",
    "sparseResidencyImage3D",
    "sparseResidency2Samples",
    "sparseResidency4Samples",
    "sparseResidency8Samples",
    "sparseResidency16Samples",
    "sparseResidencyAliased",
    "variableMultisampleRate",
    "inheritedQueries",
];

// The struct is a plain run of VkBool32 members.
const _: () = assert!(
    size_of::<vk::PhysicalDeviceFeatures>() == FEATURE_COUNT * size_of::<vk::Bool32>()
);

fn feature_flags(features: &vk::PhysicalDeviceFeatures) -> &[vk::Bool32; FEATURE_COUNT] {
    unsafe { &*(features as *const vk::PhysicalDeviceFeatures).cast::<[vk::Bool32; FEATURE_COUNT]>() }
}

fn feature_flags_mut(features: &mut vk::PhysicalDeviceFeatures) -> &mut [vk::Bool32; FEATURE_COUNT] {
    unsafe { &mut *(features as *mut vk::PhysicalDeviceFeatures).cast::<[vk::Bool32; FEATURE_COUNT]>() }
}

/// Bitwise OR of two feature sets.
pub fn merge_features(
    a: &vk::PhysicalDeviceFeatures,
    b: &vk::PhysicalDeviceFeatures,
) -> vk::PhysicalDeviceFeatures {
    let mut merged = *a;
    for (out, flag) in feature_flags_mut(&mut merged).iter_mut().zip(feature_flags(b)) {
        if *flag != vk::FALSE {
            *out = vk::TRUE;
        }
    }
    merged
}

/// The features to enable: exactly `required`, provided `available` covers it.
///
/// Anything not required stays zero even if the device offers it.
pub fn enabled_feature_subset(
    required: &vk::PhysicalDeviceFeatures,
    available: &vk::PhysicalDeviceFeatures,
) -> Result<vk::PhysicalDeviceFeatures, PhysicalDeviceError> {
    let mut enabled = vk::PhysicalDeviceFeatures::default();
    let slots = feature_flags(required)
        .iter()
        .zip(feature_flags(available))
        .zip(feature_flags_mut(&mut enabled).iter_mut());

    for (index, ((required, available), enabled)) in slots.enumerate() {
        if *required == vk::FALSE {
            continue;
        }
        if *available == vk::FALSE {
            return Err(PhysicalDeviceError::MissingFeature(FEATURE_NAMES[index]));
        }
        *enabled = vk::TRUE;
    }

    Ok(enabled)
}

/// Single-device policy: exactly one physical device must be present.
pub fn pick_single_device(
    devices: &[vk::PhysicalDevice],
) -> Result<vk::PhysicalDevice, PhysicalDeviceError> {
    match devices {
        [] => Err(PhysicalDeviceError::NoDeviceFound),
        [device] => Ok(*device),
        _ => Err(PhysicalDeviceError::UnsupportedDeviceCount(devices.len())),
    }
}

/// A queue family chosen for device creation, with one priority per queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFamilyDescriptor {
    pub family_index: u32,
    pub queue_count: u32,
    pub flags: vk::QueueFlags,
    pub priorities: Vec<f32>,
}

impl QueueFamilyDescriptor {
    /// Requests every queue of the family, sharing priority evenly.
    pub fn new(family_index: u32, properties: &vk::QueueFamilyProperties) -> Self {
        let queue_count = properties.queue_count;
        let priority = 1.0 / queue_count as f32;
        Self {
            family_index,
            queue_count,
            flags: properties.queue_flags,
            priorities: vec![priority; queue_count as usize],
        }
    }

    pub fn supports(&self, flags: vk::QueueFlags) -> bool {
        self.flags.contains(flags)
    }
}

/// Picks every family whose flags cover `required` and that `present` accepts.
///
/// `present` answers whether a family index can present to the target
/// surface. Without a surface it should always answer yes.
pub fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    required: vk::QueueFlags,
    mut present: impl FnMut(u32) -> crate::Result<bool>,
) -> crate::Result<Vec<QueueFamilyDescriptor>> {
    let mut selected = vec![];

    for (index, properties) in families.iter().enumerate() {
        let index = index as u32;
        if properties.queue_count == 0 || !properties.queue_flags.contains(required) {
            continue;
        }
        if !present(index)? {
            #[cfg(feature = "enable_tracing")]
            tracing::debug!(family = index, "Queue family cannot present, skipping");
            continue;
        }
        selected.push(QueueFamilyDescriptor::new(index, properties));
    }

    if selected.is_empty() {
        return Err(PhysicalDeviceError::NoSuitableQueueFamily.into());
    }

    Ok(selected)
}

#[derive(Debug, Clone)]
pub struct PhysicalDevice {
    name: String,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    enabled_features: vk::PhysicalDeviceFeatures,
    available_extensions: Vec<ExtensionDescriptor>,
    enabled_extensions: Vec<ExtensionDescriptor>,
    queue_family_properties: Vec<vk::QueueFamilyProperties>,
    queue_families: Vec<QueueFamilyDescriptor>,
}

impl PhysicalDevice {
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn api_version(&self) -> Version {
        Version::from(self.properties.api_version)
    }

    pub fn available_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    /// Exactly the required features; what device creation will enable.
    pub fn enabled_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.enabled_features
    }

    pub fn available_extensions(&self) -> &[ExtensionDescriptor] {
        &self.available_extensions
    }

    pub fn enabled_extensions(&self) -> &[ExtensionDescriptor] {
        &self.enabled_extensions
    }

    pub fn queue_family_properties(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_family_properties
    }

    /// The families selected for queue creation.
    pub fn queue_families(&self) -> &[QueueFamilyDescriptor] {
        &self.queue_families
    }
}

#[derive(Debug)]
struct SelectionCriteria<'a> {
    required_queue_flags: vk::QueueFlags,
    required_extensions: Vec<&'a CStr>,
    required_features: vk::PhysicalDeviceFeatures,
}

impl Default for SelectionCriteria<'_> {
    fn default() -> Self {
        Self {
            required_queue_flags: vk::QueueFlags::GRAPHICS,
            required_extensions: vec![],
            required_features: vk::PhysicalDeviceFeatures::default(),
        }
    }
}

#[derive(Debug)]
pub struct PhysicalDeviceSelector<'a> {
    instance: &'a Instance,
    surface: Option<&'a Surface>,
    selection_criteria: SelectionCriteria<'a>,
}

impl<'a> PhysicalDeviceSelector<'a> {
    pub fn new(instance: &'a Instance) -> PhysicalDeviceSelector<'a> {
        Self {
            instance,
            surface: None,
            selection_criteria: SelectionCriteria::default(),
        }
    }

    /// Only families able to present to `surface` are selected.
    pub fn surface(mut self, surface: &'a Surface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn required_queue_flags(mut self, flags: vk::QueueFlags) -> Self {
        self.selection_criteria.required_queue_flags = flags;
        self
    }

    pub fn add_required_extension(mut self, extension: &'a CStr) -> Self {
        if !self.selection_criteria.required_extensions.contains(&extension) {
            self.selection_criteria.required_extensions.push(extension);
        }
        self
    }

    pub fn add_required_extensions(mut self, extensions: impl IntoIterator<Item = &'a CStr>) -> Self {
        for extension in extensions {
            self = self.add_required_extension(extension);
        }
        self
    }

    pub fn add_required_features(mut self, features: &vk::PhysicalDeviceFeatures) -> Self {
        self.selection_criteria.required_features =
            merge_features(&self.selection_criteria.required_features, features);
        self
    }

    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn select(self) -> crate::Result<PhysicalDevice> {
        let instance = self.instance;
        let handle = instance.handle();
        let table = instance.table();

        let enumerate_physical_devices: vk::PFN_vkEnumeratePhysicalDevices =
            unsafe { table.require(c"vkEnumeratePhysicalDevices") }?;
        let get_properties: vk::PFN_vkGetPhysicalDeviceProperties =
            unsafe { table.require(c"vkGetPhysicalDeviceProperties") }?;
        let get_features: vk::PFN_vkGetPhysicalDeviceFeatures =
            unsafe { table.require(c"vkGetPhysicalDeviceFeatures") }?;
        let get_queue_family_properties: vk::PFN_vkGetPhysicalDeviceQueueFamilyProperties =
            unsafe { table.require(c"vkGetPhysicalDeviceQueueFamilyProperties") }?;
        let enumerate_device_extensions: vk::PFN_vkEnumerateDeviceExtensionProperties =
            unsafe { table.require(c"vkEnumerateDeviceExtensionProperties") }?;

        let physical_devices = enumerate("vkEnumeratePhysicalDevices", |count, out| unsafe {
            enumerate_physical_devices(handle, count, out)
        })?;
        let physical_device = pick_single_device(&physical_devices)?;

        let mut properties = vk::PhysicalDeviceProperties::default();
        let mut features = vk::PhysicalDeviceFeatures::default();
        unsafe {
            get_properties(physical_device, &mut properties);
            get_features(physical_device, &mut features);
        }
        let name = fixed_cstr(&properties.device_name)
            .to_string_lossy()
            .into_owned();

        #[cfg(feature = "enable_tracing")]
        tracing::info!(
            %name,
            device_type = ?properties.device_type,
            api_version = %Version::from(properties.api_version),
            "Found physical device"
        );

        let queue_family_properties = enumerate(
            "vkGetPhysicalDeviceQueueFamilyProperties",
            |count, out| unsafe {
                get_queue_family_properties(physical_device, count, out);
                vk::Result::SUCCESS
            },
        )?;

        let available_extensions =
            enumerate_extensions("vkEnumerateDeviceExtensionProperties", |count, out| unsafe {
                enumerate_device_extensions(physical_device, std::ptr::null(), count, out)
            })?;

        let required_extensions = &self.selection_criteria.required_extensions;
        require_extensions(&available_extensions, required_extensions.iter().copied())?;
        let enabled_extensions = filter_enabled(&available_extensions, required_extensions);

        let enabled_features =
            enabled_feature_subset(&self.selection_criteria.required_features, &features)?;

        let queue_families = select_queue_families(
            &queue_family_properties,
            self.selection_criteria.required_queue_flags,
            |family_index| match self.surface {
                Some(surface) => surface.supports_present(instance, physical_device, family_index),
                None => Ok(true),
            },
        )?;

        #[cfg(feature = "enable_tracing")]
        tracing::debug!(?queue_families, "Selected queue families");

        Ok(PhysicalDevice {
            name,
            physical_device,
            properties,
            features,
            enabled_features,
            available_extensions,
            enabled_extensions,
            queue_family_properties,
            queue_families,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{self, FakeDriver};
    use crate::{Entry, InstanceBuilder};
    use ash::vk::Handle;

    fn family(flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count,
            ..Default::default()
        }
    }

    #[test]
    fn family_must_cover_required_flags() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::COMPUTE, 1),
        ];

        let selected =
            select_queue_families(&families, vk::QueueFlags::GRAPHICS, |_| Ok(true)).unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].family_index, 0);
        assert!(selected[0].supports(vk::QueueFlags::GRAPHICS));
    }

    #[test]
    fn compute_only_family_does_not_qualify_for_graphics() {
        let families = [family(vk::QueueFlags::COMPUTE, 2)];

        let err = select_queue_families(&families, vk::QueueFlags::GRAPHICS, |_| Ok(true))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PhysicalDevice(PhysicalDeviceError::NoSuitableQueueFamily)
        ));
    }

    #[test]
    fn priorities_are_split_evenly() {
        let families = [family(vk::QueueFlags::GRAPHICS, 4)];

        let selected =
            select_queue_families(&families, vk::QueueFlags::GRAPHICS, |_| Ok(true)).unwrap();

        assert_eq!(selected[0].priorities, vec![0.25; 4]);
    }

    #[test]
    fn families_without_present_support_are_skipped() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];

        let selected =
            select_queue_families(&families, vk::QueueFlags::GRAPHICS, |index| Ok(index == 1))
                .unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].family_index, 1);
    }

    #[test]
    fn device_count_policy() {
        let one = vk::PhysicalDevice::from_raw(1);
        let two = vk::PhysicalDevice::from_raw(2);

        assert_eq!(pick_single_device(&[]), Err(PhysicalDeviceError::NoDeviceFound));
        assert_eq!(pick_single_device(&[one]), Ok(one));
        assert_eq!(
            pick_single_device(&[one, two]),
            Err(PhysicalDeviceError::UnsupportedDeviceCount(2))
        );
    }

    #[test]
    fn feature_subset_is_exactly_the_required_set() {
        let required = vk::PhysicalDeviceFeatures {
            tessellation_shader: vk::TRUE,
            ..Default::default()
        };
        let available = vk::PhysicalDeviceFeatures {
            tessellation_shader: vk::TRUE,
            geometry_shader: vk::TRUE,
            ..Default::default()
        };

        let enabled = enabled_feature_subset(&required, &available).unwrap();
        assert_eq!(enabled.tessellation_shader, vk::TRUE);
        assert_eq!(enabled.geometry_shader, vk::FALSE);
    }

    #[test]
    fn missing_feature_is_named() {
        let required = vk::PhysicalDeviceFeatures {
            inherited_queries: vk::TRUE,
            ..Default::default()
        };

        let err = enabled_feature_subset(&required, &vk::PhysicalDeviceFeatures::default())
            .unwrap_err();
        assert_eq!(err, PhysicalDeviceError::MissingFeature("inheritedQueries"));
    }

    fn instance(entry: &Entry) -> Instance {
        InstanceBuilder::new(entry).build().unwrap()
    }

    #[test]
    fn selects_the_only_device() {
        testing::install(FakeDriver::default());
        let entry = unsafe { Entry::from_source(&testing::FakeModule) }.unwrap();
        let mut instance = instance(&entry);

        let physical_device = PhysicalDeviceSelector::new(&instance)
            .add_required_extension(c"VK_KHR_swapchain")
            .add_required_features(&vk::PhysicalDeviceFeatures {
                sampler_anisotropy: vk::TRUE,
                ..Default::default()
            })
            .select()
            .unwrap();

        assert_eq!(physical_device.name(), "Fake GPU");
        assert_eq!(physical_device.api_version(), Version::V1_3_0);
        assert_eq!(physical_device.enabled_extensions().len(), 1);
        assert_eq!(physical_device.enabled_features().sampler_anisotropy, vk::TRUE);
        assert_eq!(physical_device.enabled_features().tessellation_shader, vk::FALSE);
        assert_eq!(physical_device.queue_families().len(), 1);
        assert_eq!(physical_device.queue_families()[0].queue_count, 4);

        instance.destroy();
    }

    #[test]
    fn two_devices_are_refused() {
        testing::install(FakeDriver {
            physical_device_count: 2,
            ..Default::default()
        });
        let entry = unsafe { Entry::from_source(&testing::FakeModule) }.unwrap();
        let mut instance = instance(&entry);

        let err = PhysicalDeviceSelector::new(&instance).select().unwrap_err();
        assert!(matches!(
            err,
            Error::PhysicalDevice(PhysicalDeviceError::UnsupportedDeviceCount(2))
        ));

        instance.destroy();
    }

    #[test]
    fn missing_device_extension_is_named() {
        testing::install(FakeDriver::default());
        let entry = unsafe { Entry::from_source(&testing::FakeModule) }.unwrap();
        let mut instance = instance(&entry);

        let err = PhysicalDeviceSelector::new(&instance)
            .add_required_extension(c"VK_KHR_ray_query")
            .select()
            .unwrap_err();
        assert!(matches!(err, Error::MissingExtension(name) if name == "VK_KHR_ray_query"));

        instance.destroy();
    }
}
