use ash::vk;
use ash::vk::DebugUtilsMessageSeverityFlagsEXT;
use std::borrow::Cow;
use std::ffi;

/// Forwards validation messages to `tracing` at the matching level.
pub unsafe extern "system" fn vulkan_tracing_callback(
    message_severity: DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    unsafe {
        let callback_data = &*p_callback_data;
        let id = callback_data.message_id_number;

        let id_name = if callback_data.p_message_id_name.is_null() {
            Cow::from("")
        } else {
            ffi::CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
        };

        let message = if callback_data.p_message.is_null() {
            Cow::from("")
        } else {
            ffi::CStr::from_ptr(callback_data.p_message).to_string_lossy()
        };

        match message_severity {
            DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
                tracing::trace!(target: "vulkan", ?message_type, %id_name, id, "{message}");
            }
            DebugUtilsMessageSeverityFlagsEXT::INFO => {
                tracing::info!(target: "vulkan", ?message_type, %id_name, id, "{message}");
            }
            DebugUtilsMessageSeverityFlagsEXT::WARNING => {
                tracing::warn!(target: "vulkan", ?message_type, %id_name, id, "{message}");
            }
            DebugUtilsMessageSeverityFlagsEXT::ERROR => {
                tracing::error!(target: "vulkan", ?message_type, %id_name, id, "{message}");
            }
            _ => tracing::debug!(target: "vulkan", ?message_type, %id_name, id, "{message}"),
        }

        vk::FALSE
    }
}
