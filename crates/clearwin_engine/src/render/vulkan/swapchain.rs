//! Vulkan swapchain management
//!
//! Handles swapchain creation and recreation following RAII principles.
//! The selection helpers are plain functions over surface queries so they can
//! be tested without a device.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};

use super::context::{PhysicalDeviceInfo, SurfaceHandle, VulkanError, VulkanResult};

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for `surface`
    ///
    /// Pass the handle being replaced as `old_swapchain` when recreating, or
    /// `vk::SwapchainKHR::null()` for the first one.
    pub fn new(
        instance: &Instance,
        device: Device,
        surface: &SurfaceHandle,
        physical_device: &PhysicalDeviceInfo,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let swapchain_loader = SwapchainLoader::new(instance, &device);
        let surface_caps = surface.capabilities(physical_device.device)?;

        let surface_formats = unsafe {
            surface
                .loader()
                .get_physical_device_surface_formats(physical_device.device, surface.handle())
                .map_err(VulkanError::Api)?
        };
        let format = choose_surface_format(&surface_formats)?;

        let present_modes = unsafe {
            surface
                .loader()
                .get_physical_device_surface_present_modes(physical_device.device, surface.handle())
                .map_err(VulkanError::Api)?
        };
        let present_mode = choose_present_mode(&present_modes);

        let extent = choose_extent(&surface_caps, window_extent);
        let image_count = choose_image_count(&surface_caps);

        log::debug!(
            "Swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            image_count,
            format.format,
            present_mode
        );

        let queue_family_indices = [physical_device.graphics_family, physical_device.present_family];
        let mut swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        swapchain_create_info = if physical_device.graphics_family == physical_device.present_family {
            swapchain_create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            swapchain_create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        };

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            match unsafe { device.create_image_view(&create_info, None) } {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    unsafe {
                        for view in image_views {
                            device.destroy_image_view(view, None);
                        }
                        swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(VulkanError::Api(e));
                }
            }
        }

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            image_views,
            format,
            extent,
        })
    }

    /// Get swapchain extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub const fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get swapchain handle
    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get swapchain loader
    pub const fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Prefer 8-bit sRGB BGRA, otherwise take whatever the surface lists first
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))
}

/// Whether writes to `format` are sRGB-encoded by the hardware
pub(crate) const fn is_srgb(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::B8G8R8A8_SRGB
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::A8B8G8R8_SRGB_PACK32
            | vk::Format::B8G8R8_SRGB
            | vk::Format::R8G8B8_SRGB
    )
}

/// Prefer modes that do not wait for vertical blank
///
/// FIFO is the only mode every implementation must support.
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|preferred| modes.contains(preferred))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's own extent when it has one, else clamp the window's
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window_extent
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more image than the minimum, within the surface's maximum (0 = unbounded)
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        }
    }

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn srgb_bgra_format_is_preferred() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [surface_format(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn srgb_formats_are_recognized() {
        assert!(is_srgb(vk::Format::B8G8R8A8_SRGB));
        assert!(is_srgb(vk::Format::R8G8B8A8_SRGB));
        assert!(!is_srgb(vk::Format::B8G8R8A8_UNORM));
        assert!(!is_srgb(vk::Format::A2B10G10R10_UNORM_PACK32));
    }

    #[test]
    fn present_mode_avoids_vsync_when_possible() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(choose_present_mode(&all), vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn surface_extent_wins_when_defined() {
        let caps = caps((1024, 768), (1, 1), (4096, 4096));
        let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn window_extent_is_clamped_when_surface_is_undefined() {
        let caps = caps((u32::MAX, u32::MAX), (100, 100), (640, 480));
        let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 50 });
        assert_eq!((extent.width, extent.height), (640, 100));
    }

    #[test]
    fn image_count_respects_bounds() {
        let mut caps = caps((800, 600), (1, 1), (800, 600));
        assert_eq!(choose_image_count(&caps), 3);
        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);
        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 3);
    }
}
