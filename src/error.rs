use crate::table::Tier;
use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    #[error("Instance error: {0}")]
    Instance(#[from] InstanceError),
    #[error("Physical device error: {0}")]
    PhysicalDevice(#[from] PhysicalDeviceError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Failed to find requested extension: {0}")]
    MissingExtension(String),
    #[error("Entry point {0} is not available (owning extension missing)")]
    EntryPointUnavailable(String),
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to load Vulkan library {path}: {source}")]
    ModuleLoadFailure {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("Could not resolve {tier} function {name}")]
    SymbolNotFound { tier: Tier, name: String },
    #[error("Entry point {0} resolved twice")]
    DuplicateEntryPoint(String),
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{call} failed: {result}")]
    QueryFailure {
        call: &'static str,
        result: vk::Result,
    },
    #[error("{0} reported nothing")]
    NothingReported(&'static str),
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("Failed to find requested layer: {0}")]
    MissingLayer(String),
    #[error("Failed to create instance: {0}")]
    FailedCreateInstance(vk::Result),
    #[error("Failed to create debug messenger: {0}")]
    FailedCreateDebugMessenger(vk::Result),
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum PhysicalDeviceError {
    #[error("No physical devices found")]
    NoDeviceFound,
    #[error("Found {0} physical devices, exactly one is supported")]
    UnsupportedDeviceCount(usize),
    #[error("No queue family supports the required capabilities")]
    NoSuitableQueueFamily,
    #[error("Required device feature unavailable: {0}")]
    MissingFeature(&'static str),
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailure(vk::Result),
    #[error("Queue {queue_index} of family {family_index} was not requested")]
    QueueIndexOutOfBounds { family_index: u32, queue_index: u32 },
    #[error("Device was already destroyed")]
    Destroyed,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Window handle unavailable: {0}")]
    Handle(#[from] raw_window_handle::HandleError),
    #[error("Failed to create surface: {0}")]
    FailedCreateSurface(vk::Result),
    #[error("Failed to query surface support: {0}")]
    FailedQuerySupport(vk::Result),
}

pub type Result<T> = std::result::Result<T, Error>;
