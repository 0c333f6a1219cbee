use ash::vk;

/// Every implementation must support FIFO.
pub const FALLBACK_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// First mode of `desired`, in order, that `available` contains.
pub fn find_desired_present_mode(
    available: &[vk::PresentModeKHR],
    desired: &[vk::PresentModeKHR],
) -> Option<vk::PresentModeKHR> {
    desired
        .iter()
        .find(|mode| available.contains(mode))
        .copied()
}

/// `desired` if the surface supports it, otherwise [`FALLBACK_PRESENT_MODE`].
pub fn select_present_mode(
    desired: vk::PresentModeKHR,
    available: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    let mode = find_desired_present_mode(available, &[desired]).unwrap_or(FALLBACK_PRESENT_MODE);

    #[cfg(feature = "enable_tracing")]
    if mode != desired {
        tracing::warn!(?desired, fallback = ?mode, "Present mode unsupported, falling back");
    }

    mode
}
