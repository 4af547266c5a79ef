//! Vulkan context management
//!
//! Instance, presentation surface, physical device selection and logical
//! device, each wrapped with RAII cleanup.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use super::SurfaceSource;

/// Name of the Khronos validation layer
const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance
    ///
    /// Validation is only switched on in debug builds, and only when the
    /// layer is actually installed; otherwise instance creation would fail.
    pub fn new(source: &dyn SurfaceSource, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("Application name contains NUL".to_string()))?;
        let engine_name_cstr = CString::new("Clearwin").map_err(|_| {
            VulkanError::InitializationFailed("Engine name contains NUL".to_string())
        })?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = source.required_instance_extensions()?;
        let mut cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::InitializationFailed("Extension name contains NUL".to_string()))?;

        let validation = cfg!(debug_assertions) && enable_validation && Self::layer_available(&entry, VALIDATION_LAYER);
        if validation {
            cstr_extensions.push(DebugUtils::name().to_owned());
        } else if enable_validation && cfg!(debug_assertions) {
            log::warn!("{} not installed, continuing without validation", VALIDATION_LAYER);
        }

        let extensions: Vec<*const std::os::raw::c_char> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let layer_names = if validation {
            vec![CString::new(VALIDATION_LAYER).map_err(|_| {
                VulkanError::InitializationFailed("Layer name contains NUL".to_string())
            })?]
        } else {
            Vec::new()
        };
        let layer_names_ptrs: Vec<*const std::os::raw::c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    log::warn!("Debug messenger unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    #[allow(unused_unsafe)]
    fn layer_available(entry: &Entry, wanted: &str) -> bool {
        let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
            Ok(layers) => layers,
            Err(e) => {
                log::debug!("Could not enumerate instance layers: {:?}", e);
                return false;
            }
        };
        layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_str().map_or(false, |name| name == wanted)
        })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
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

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = &self.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Presentation surface with RAII cleanup
///
/// Must be dropped after every swapchain built on it and before the instance.
pub struct SurfaceHandle {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl SurfaceHandle {
    /// Create the surface through the window system
    pub fn new(instance: &VulkanInstance, source: &dyn SurfaceSource) -> VulkanResult<Self> {
        let loader = Surface::new(&instance.entry, &instance.instance);
        let surface = source.create_surface(instance.instance.handle())?;
        Ok(Self { loader, surface })
    }

    /// Get the underlying surface handle
    pub const fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the surface loader
    pub const fn loader(&self) -> &Surface {
        &self.loader
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device name as reported by the driver
    pub name: String,
    /// Kind of device (discrete, integrated, CPU, ...)
    pub device_type: vk::PhysicalDeviceType,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the best suitable physical device for presenting to `surface`
    ///
    /// `driver` restricts the choice to devices whose name contains it.
    /// With `accelerated` set, software rasterizers are never picked.
    pub fn select(
        instance: &Instance,
        surface: &SurfaceHandle,
        driver: Option<&str>,
        accelerated: bool,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };

        let mut best: Option<(u32, Self)> = None;
        for device in devices {
            let info = match Self::evaluate_device(instance, device, surface) {
                Ok(info) => info,
                Err(e) => {
                    log::debug!("Skipping device: {}", e);
                    continue;
                }
            };

            if !name_matches(&info.name, driver) {
                log::debug!("Skipping {}: does not match driver filter", info.name);
                continue;
            }

            let Some(rank) = rank_device_type(info.device_type, accelerated) else {
                log::debug!("Skipping {}: not hardware accelerated", info.name);
                continue;
            };

            if best.as_ref().map_or(true, |(best_rank, _)| rank > *best_rank) {
                best = Some((rank, info));
            }
        }

        let (_, info) = best.ok_or_else(|| {
            VulkanError::InitializationFailed(match driver {
                Some(driver) => format!("No suitable GPU matching \"{driver}\" found"),
                None => "No suitable GPU found".to_string(),
            })
        })?;
        log::info!("Selected GPU: {} ({:?})", info.name, info.device_type);
        Ok(info)
    }

    fn evaluate_device(instance: &Instance, device: vk::PhysicalDevice, surface: &SurfaceHandle) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let (graphics_family, present_family) = find_queue_families(&queue_families, |index| unsafe {
            surface
                .loader()
                .get_physical_device_surface_support(device, index, surface.handle())
                .map_err(VulkanError::Api)
        })?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(format!(
                "{name}: swapchain extension not supported"
            )));
        }

        Ok(Self {
            device,
            name,
            device_type: properties.device_type,
            graphics_family,
            present_family,
        })
    }
}

/// Preference of a device type; `None` when it must not be used
pub(crate) fn rank_device_type(device_type: vk::PhysicalDeviceType, accelerated: bool) -> Option<u32> {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => Some(4),
        vk::PhysicalDeviceType::INTEGRATED_GPU => Some(3),
        vk::PhysicalDeviceType::VIRTUAL_GPU => Some(2),
        vk::PhysicalDeviceType::CPU if !accelerated => Some(1),
        vk::PhysicalDeviceType::CPU => None,
        _ if accelerated => None,
        _ => Some(0),
    }
}

/// Case-insensitive substring match against an optional driver filter
pub(crate) fn name_matches(name: &str, driver: Option<&str>) -> bool {
    driver.map_or(true, |driver| name.to_lowercase().contains(&driver.to_lowercase()))
}

/// Pick graphics and present queue families
///
/// A single family that can do both is preferred over a split pair.
pub(crate) fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut present_support: impl FnMut(u32) -> VulkanResult<bool>,
) -> VulkanResult<(u32, u32)> {
    let mut graphics_family = None;
    let mut present_family = None;

    for (index, family) in (0u32..).zip(families) {
        let graphics = family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present = present_support(index)?;

        if graphics && present {
            return Ok((index, index));
        }
        if graphics && graphics_family.is_none() {
            graphics_family = Some(index);
        }
        if present && present_family.is_none() {
            present_family = Some(index);
        }
    }

    let graphics_family = graphics_family
        .ok_or_else(|| VulkanError::InitializationFailed("No graphics queue family found".to_string()))?;
    let present_family = present_family
        .ok_or_else(|| VulkanError::InitializationFailed("No present queue family found".to_string()))?;
    Ok((graphics_family, present_family))
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Create a new logical device with required queues
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut families = vec![physical_device.graphics_family];
        if physical_device.present_family != physical_device.graphics_family {
            families.push(physical_device.present_family);
        }

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device.present_family, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) {
        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            log::warn!("device_wait_idle failed: {:?}", e);
        }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        self.wait_idle();
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
