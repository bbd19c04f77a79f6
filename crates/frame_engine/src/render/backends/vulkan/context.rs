//! Vulkan instance, physical device selection and logical device
//!
//! These are created once per process, in order, and torn down in reverse by
//! [`VulkanDevice`](super::VulkanDevice).

use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};

use crate::render::api::DeviceError;

use super::window::GlfwWindow;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

fn init_error(what: &str, e: impl std::fmt::Debug) -> DeviceError {
    DeviceError::Api(format!("{what}: {e:?}"))
}

/// Vulkan instance with its optional validation messenger
pub struct VulkanInstance {
    /// Loaded Vulkan entry points
    pub entry: Entry,
    /// Instance handle
    pub instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the extensions GLFW needs, plus validation when requested
    ///
    /// Validation is silently skipped when the layer is not installed.
    pub fn new(window: &GlfwWindow, app_name: &str, enable_validation: bool) -> Result<Self, DeviceError> {
        let entry = unsafe { Entry::load() }.map_err(|e| init_error("failed to load Vulkan", e))?;

        let app_name_cstr = CString::new(app_name).map_err(|e| init_error("application name", e))?;
        let engine_name_cstr = CString::new("frame_engine").map_err(|e| init_error("engine name", e))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| init_error("failed to query instance extensions", e))?;
        let mut cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| init_error("instance extension name", e))?;

        let validation = enable_validation && Self::validation_layer_available(&entry);
        if enable_validation && !validation {
            log::warn!("{VALIDATION_LAYER} requested but not available, continuing without validation");
        }
        if validation {
            cstr_extensions.push(DebugUtils::name().to_owned());
        }
        let extensions: Vec<*const c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let layer_names = if validation {
            vec![CString::new(VALIDATION_LAYER).map_err(|e| init_error("layer name", e))?]
        } else {
            Vec::new()
        };
        let layer_names_ptrs: Vec<*const c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| init_error("failed to create instance", e))?;

        let debug_utils = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            Some((debug_utils, messenger))
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers.iter().any(|layer| {
                    let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    name.to_bytes() == VALIDATION_LAYER.as_bytes()
                })
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> Result<vk::DebugUtilsMessengerEXT, DeviceError> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| init_error("failed to create debug messenger", e))
    }

    /// Destroy the messenger and the instance; everything created from it must be gone
    pub(super) unsafe fn destroy(&mut self) {
        if let Some((debug_utils, messenger)) = self.debug_utils.take() {
            debug_utils.destroy_debug_utils_messenger(messenger, None);
        }
        self.instance.destroy_instance(None);
    }
}

/// Validation layer messages go to the log
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected physical device and its queue families
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Graphics queue family
    pub graphics_family: u32,
    /// Presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the first device with graphics and present support, the swapchain extension,
    /// at least one surface format and one present mode
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> Result<Self, DeviceError> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| init_error("failed to enumerate GPUs", e))?;
        log::info!("Device count: {}", devices.len());

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => {
                    log::info!("Selected GPU: {}", unsafe {
                        CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
                    });
                    return Ok(info);
                }
                Err(reason) => log::debug!("Skipping GPU: {reason}"),
            }
        }

        Err(DeviceError::Api("failed to find a suitable GPU".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> Result<Self, DeviceError> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            if family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support = unsafe { surface_loader.get_physical_device_surface_support(device, index, surface) }
                .map_err(|e| init_error("surface support query", e))?;
            if family.queue_count > 0 && present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let graphics_family =
            graphics_family.ok_or_else(|| DeviceError::Api("no graphics queue family".to_string()))?;
        let present_family = present_family.ok_or_else(|| DeviceError::Api("no present queue family".to_string()))?;

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(|e| init_error("device extension query", e))?;
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(DeviceError::Api("swapchain extension not supported".to_string()));
        }

        let formats = unsafe { surface_loader.get_physical_device_surface_formats(device, surface) }
            .map_err(|e| init_error("surface format query", e))?;
        let present_modes = unsafe { surface_loader.get_physical_device_surface_present_modes(device, surface) }
            .map_err(|e| init_error("present mode query", e))?;
        if formats.is_empty() || present_modes.is_empty() {
            return Err(DeviceError::Api("inadequate swapchain support".to_string()));
        }

        Ok(Self {
            device,
            properties,
            graphics_family,
            present_family,
        })
    }
}

/// Logical device, its queues and the swapchain loader
pub struct LogicalDevice {
    /// Device function table
    pub device: Device,
    /// Graphics queue
    pub graphics_queue: vk::Queue,
    /// Presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> Result<Self, DeviceError> {
        let unique_families: HashSet<u32> = [physical_device_info.graphics_family, physical_device_info.present_family]
            .into_iter()
            .collect();

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder().build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device_info.device, &create_info, None) }
            .map_err(|e| init_error("failed to create logical device", e))?;

        let graphics_queue = unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device_info.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}
