use crate::error::{DeviceError, PhysicalDeviceError};
use crate::extensions::ExtensionDescriptor;
use crate::functions::{DEVICE_EXTENSION_FUNCTIONS, DEVICE_FUNCTIONS};
use crate::instance::Instance;
use crate::loader::DeviceLoader;
use crate::physical_device::{PhysicalDevice, QueueFamilyDescriptor};
use crate::table::{CapabilityTable, ProcSource};
use ash::vk;
use std::ffi::c_char;

pub struct DeviceBuilder<'a> {
    instance: &'a Instance,
    physical_device: PhysicalDevice,
    flags: vk::DeviceCreateFlags,
}

impl<'a> DeviceBuilder<'a> {
    pub fn new(instance: &'a Instance, physical_device: PhysicalDevice) -> DeviceBuilder<'a> {
        Self {
            instance,
            physical_device,
            flags: vk::DeviceCreateFlags::empty(),
        }
    }

    pub fn flags(mut self, flags: vk::DeviceCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Creates the device with one queue request per selected family, the
    /// selected extensions and exactly the validated feature subset.
    #[cfg_attr(feature = "enable_tracing", tracing::instrument(skip(self)))]
    pub fn build(self) -> crate::Result<Device> {
        let table = self.instance.table();
        let create_device: vk::PFN_vkCreateDevice = unsafe { table.require(c"vkCreateDevice") }?;
        let get_device_proc_addr: vk::PFN_vkGetDeviceProcAddr =
            unsafe { table.require(c"vkGetDeviceProcAddr") }?;

        let physical_device = self.physical_device;

        let queue_create_infos = physical_device
            .queue_families()
            .iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family.family_index)
                    .queue_priorities(&family.priorities)
            })
            .collect::<Vec<_>>();

        let extension_names = physical_device
            .enabled_extensions()
            .iter()
            .map(|ext| ext.name.as_ptr())
            .collect::<Vec<*const c_char>>();

        let enabled_features = *physical_device.enabled_features();

        let device_create_info = vk::DeviceCreateInfo::default()
            .flags(self.flags)
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&enabled_features);

        #[cfg(feature = "enable_tracing")]
        tracing::debug!(
            queue_families = queue_create_infos.len(),
            extensions = extension_names.len(),
            "Creating vkDevice..."
        );

        let mut handle = vk::Device::null();
        let result = unsafe {
            create_device(
                physical_device.handle(),
                &device_create_info,
                std::ptr::null(),
                &mut handle,
            )
        };
        if result != vk::Result::SUCCESS {
            return Err(DeviceError::DeviceCreationFailure(result).into());
        }
        if handle == vk::Device::null() {
            return Err(
                DeviceError::DeviceCreationFailure(vk::Result::ERROR_INITIALIZATION_FAILED).into(),
            );
        }

        #[cfg(feature = "enable_tracing")]
        tracing::info!(name = physical_device.name(), "Created vkDevice");

        let mut loader = DeviceLoader::new(get_device_proc_addr, handle);
        if let Some(module) = self.instance.loader().module() {
            loader = loader.with_module(module.clone());
        }
        let table = match resolve_device_table(&loader, physical_device.enabled_extensions()) {
            Ok(table) => table,
            Err(err) => {
                unsafe { destroy_unresolved_device(&loader) };
                return Err(err);
            }
        };

        Ok(Device {
            device: handle,
            physical_device,
            loader,
            table,
        })
    }
}

fn resolve_device_table(
    loader: &DeviceLoader,
    enabled: &[ExtensionDescriptor],
) -> crate::Result<CapabilityTable> {
    let mut table = CapabilityTable::resolve(loader, DEVICE_FUNCTIONS)?;
    table.merge(CapabilityTable::resolve_gated(
        loader,
        DEVICE_EXTENSION_FUNCTIONS,
        enabled,
    )?)?;

    #[cfg(feature = "enable_tracing")]
    tracing::trace!(resolved = table.len(), "Device functions resolved");

    Ok(table)
}

unsafe fn destroy_unresolved_device(loader: &DeviceLoader) {
    if let Some(destroy) = loader.lookup(c"vkDestroyDevice") {
        unsafe {
            let destroy: vk::PFN_vkDestroyDevice = std::mem::transmute(destroy);
            destroy(loader.device(), std::ptr::null());
        }
    }
}

#[derive(Debug)]
pub struct Device {
    device: vk::Device,
    physical_device: PhysicalDevice,
    loader: DeviceLoader,
    table: CapabilityTable,
}

impl Device {
    /// The raw handle, null once destroyed.
    pub fn handle(&self) -> vk::Device {
        self.device
    }

    pub fn is_destroyed(&self) -> bool {
        self.device == vk::Device::null()
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    pub fn loader(&self) -> &DeviceLoader {
        &self.loader
    }

    pub fn queue_families(&self) -> &[QueueFamilyDescriptor] {
        self.physical_device.queue_families()
    }

    /// Queue `queue_index` of family `family_index`. Only requested queues can be fetched.
    pub fn get_queue(&self, family_index: u32, queue_index: u32) -> crate::Result<vk::Queue> {
        if self.is_destroyed() {
            return Err(DeviceError::Destroyed.into());
        }

        let requested = self
            .queue_families()
            .iter()
            .any(|family| family.family_index == family_index && queue_index < family.queue_count);
        if !requested {
            return Err(DeviceError::QueueIndexOutOfBounds {
                family_index,
                queue_index,
            }
            .into());
        }

        let get_device_queue: vk::PFN_vkGetDeviceQueue =
            unsafe { self.table.require(c"vkGetDeviceQueue") }?;
        let mut queue = vk::Queue::null();
        unsafe { get_device_queue(self.device, family_index, queue_index, &mut queue) };

        Ok(queue)
    }

    /// The first queue of the first requested family supporting `flags`.
    pub fn first_queue_with(&self, flags: vk::QueueFlags) -> crate::Result<(u32, vk::Queue)> {
        let family = self
            .queue_families()
            .iter()
            .find(|family| family.supports(flags))
            .ok_or(PhysicalDeviceError::NoSuitableQueueFamily)?;

        Ok((family.family_index, self.get_queue(family.family_index, 0)?))
    }

    pub fn wait_idle(&self) -> crate::Result<()> {
        if self.is_destroyed() {
            return Err(DeviceError::Destroyed.into());
        }

        let wait_idle: vk::PFN_vkDeviceWaitIdle = unsafe { self.table.require(c"vkDeviceWaitIdle") }?;
        match unsafe { wait_idle(self.device) } {
            vk::Result::SUCCESS => Ok(()),
            result => Err(result.into()),
        }
    }

    /// Empties the table and gives up this device's share of the module. Later calls do nothing.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }

        unsafe {
            if let Some(destroy_device) =
                self.table.function::<vk::PFN_vkDestroyDevice>(c"vkDestroyDevice")
            {
                destroy_device(self.device, std::ptr::null());
            }
        }
        self.device = vk::Device::null();
        self.table = CapabilityTable::default();
        drop(self.loader.detach_module());

        #[cfg(feature = "enable_tracing")]
        tracing::info!("Destroyed vkDevice");
    }
}

impl AsRef<CapabilityTable> for Device {
    fn as_ref(&self) -> &CapabilityTable {
        &self.table
    }
}
