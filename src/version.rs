use ash::vk;
use std::fmt::{Display, Formatter};

/// A packed Vulkan API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

impl Version {
    pub const V1_0_0: Version = Version(vk::API_VERSION_1_0);
    pub const V1_1_0: Version = Version(vk::API_VERSION_1_1);
    pub const V1_2_0: Version = Version(vk::API_VERSION_1_2);
    pub const V1_3_0: Version = Version(vk::API_VERSION_1_3);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self(vk::make_api_version(0, major, minor, patch))
    }

    pub const fn major(self) -> u32 {
        vk::api_version_major(self.0)
    }

    pub const fn minor(self) -> u32 {
        vk::api_version_minor(self.0)
    }

    pub const fn patch(self) -> u32 {
        vk::api_version_patch(self.0)
    }
}

impl From<u32> for Version {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl From<Version> for u32 {
    fn from(version: Version) -> Self {
        version.0
    }
}
