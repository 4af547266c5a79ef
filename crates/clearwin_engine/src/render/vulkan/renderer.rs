//! Vulkan clear-and-present renderer
//!
//! A frame is opened lazily by the first `clear` or `present` after the
//! previous frame was presented: wait for the frame slot's fence, acquire a
//! swapchain image, start recording and open the render pass. `clear` then
//! records an attachment clear and `present` closes, submits and presents.

use ash::vk;

use super::commands::{CommandPool, CommandRecorder};
use super::context::{LogicalDevice, PhysicalDeviceInfo, SurfaceHandle, VulkanError, VulkanInstance, VulkanResult};
use super::framebuffer::Framebuffer;
use super::render_pass::RenderPass;
use super::swapchain::{is_srgb, Swapchain};
use super::sync::{FrameSync, Semaphore};
use super::{SharedExtent, SurfaceSource};
use crate::config::RendererConfig;
use crate::render::{Color, Renderer};

/// Per frame-in-flight resources
struct FrameSlot {
    sync: FrameSync,
    command_buffer: vk::CommandBuffer,
}

/// Frame between acquisition and presentation
struct ActiveFrame {
    image_index: u32,
    recorder: CommandRecorder,
}

/// How far the current frame slot got since its last submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameStage {
    /// Nothing pending: the slot's fence and semaphore belong to the last submit
    Idle,
    /// An image was acquired; its semaphore is signaled and the fence may be reset
    Acquired,
}

/// Cleanup owed by a frame abandoned part-way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Recovery {
    /// Replace the slot's fence and semaphore with fresh ones
    pub rebuild_sync: bool,
    /// Rebuild the swapchain, giving back the acquired image
    pub mark_stale: bool,
}

impl FrameStage {
    pub(crate) const fn recovery(self) -> Recovery {
        match self {
            Self::Idle => Recovery {
                rebuild_sync: false,
                mark_stale: false,
            },
            Self::Acquired => Recovery {
                rebuild_sync: true,
                mark_stale: true,
            },
        }
    }
}

/// Clear value for `color` as written to an attachment of `format`
pub(crate) fn clear_value_for(color: Color, format: vk::Format) -> [f32; 4] {
    if is_srgb(format) {
        color.to_linear_f32_array()
    } else {
        color.to_f32_array()
    }
}

/// Hardware-accelerated renderer bound to one window surface
///
/// Fields are declared in release order: everything that lives on the
/// device goes before the device, the swapchain before the surface, and the
/// instance last.
pub struct VulkanRenderer {
    draw_color: Color,
    active: Option<ActiveFrame>,
    stage: FrameStage,
    current_slot: usize,
    swapchain_stale: bool,
    window_extent: SharedExtent,
    slots: Vec<FrameSlot>,
    render_finished: Vec<Semaphore>,
    framebuffers: Vec<Framebuffer>,
    #[allow(dead_code)] // Owns the slots' command buffers
    command_pool: CommandPool,
    render_pass: RenderPass,
    swapchain: Swapchain,
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: SurfaceHandle,
    instance: VulkanInstance,
}

impl VulkanRenderer {
    /// Build the full Vulkan stack for the window behind `source`
    pub fn new(source: &dyn SurfaceSource, config: &RendererConfig) -> VulkanResult<Self> {
        log::info!("Creating Vulkan instance...");
        let instance = VulkanInstance::new(source, &config.application_name, config.validation)?;
        let surface = SurfaceHandle::new(&instance, source)?;

        let physical_device = PhysicalDeviceInfo::select(
            &instance.instance,
            &surface,
            config.driver.as_deref(),
            config.accelerated,
        )?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        let window_extent = source.framebuffer_extent();
        let swapchain = Swapchain::new(
            &instance.instance,
            device.device.clone(),
            &surface,
            &physical_device,
            window_extent.get(),
            vk::SwapchainKHR::null(),
        )?;

        let render_pass = RenderPass::new_present_pass(device.device.clone(), swapchain.format().format)?;
        let framebuffers = Framebuffer::for_each_view(
            &device.device,
            render_pass.handle(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        let render_finished = swapchain
            .image_views()
            .iter()
            .map(|_| Semaphore::new(device.device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        let command_pool = CommandPool::new(device.device.clone(), physical_device.graphics_family)?;
        let slot_count = config.max_frames_in_flight.max(1);
        let command_buffers = command_pool.allocate_command_buffers(slot_count)?;
        let slots = command_buffers
            .into_iter()
            .map(|command_buffer| {
                Ok(FrameSlot {
                    sync: FrameSync::new(device.device.clone())?,
                    command_buffer,
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!(
            "Vulkan renderer ready: {}x{}, {} swapchain images, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            framebuffers.len(),
            slots.len()
        );

        Ok(Self {
            draw_color: Color::default(),
            active: None,
            stage: FrameStage::Idle,
            current_slot: 0,
            swapchain_stale: false,
            window_extent,
            slots,
            render_finished,
            framebuffers,
            command_pool,
            render_pass,
            swapchain,
            device,
            physical_device,
            surface,
            instance,
        })
    }

    fn full_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.swapchain.extent(),
        }
    }

    /// Rebuild the swapchain and everything sized by it
    ///
    /// Returns `false` while the surface has no area (e.g. minimized); the
    /// swapchain stays stale and frames are skipped until it grows again.
    fn recreate_swapchain(&mut self) -> VulkanResult<bool> {
        let caps = self.surface.capabilities(self.physical_device.device)?;
        if caps.current_extent.width == 0 || caps.current_extent.height == 0 {
            return Ok(false);
        }

        self.device.wait_idle();
        self.framebuffers.clear();

        let swapchain = Swapchain::new(
            &self.instance.instance,
            self.device.device.clone(),
            &self.surface,
            &self.physical_device,
            self.window_extent.get(),
            self.swapchain.handle(),
        )?;
        let old_format = self.swapchain.format().format;
        self.swapchain = swapchain;

        if self.swapchain.format().format != old_format {
            self.render_pass = RenderPass::new_present_pass(self.device.device.clone(), self.swapchain.format().format)?;
        }

        self.framebuffers = Framebuffer::for_each_view(
            &self.device.device,
            self.render_pass.handle(),
            self.swapchain.image_views(),
            self.swapchain.extent(),
        )?;
        self.render_finished = self
            .swapchain
            .image_views()
            .iter()
            .map(|_| Semaphore::new(self.device.device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        self.swapchain_stale = false;
        log::debug!(
            "Swapchain recreated at {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(true)
    }

    /// Open a frame if none is open; `false` means this frame is skipped
    fn begin_frame(&mut self) -> VulkanResult<bool> {
        if self.active.is_some() {
            return Ok(true);
        }
        if self.swapchain_stale && !self.recreate_swapchain()? {
            return Ok(false);
        }

        let slot = &self.slots[self.current_slot];
        slot.sync.in_flight.wait(u64::MAX)?;

        let acquired = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                slot.sync.image_available.handle(),
                vk::Fence::null(),
            )
        };
        let image_index = match acquired {
            Ok((index, suboptimal)) => {
                self.swapchain_stale |= suboptimal;
                self.stage = FrameStage::Acquired;
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.swapchain_stale = true;
                return Ok(false);
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Swapchain returned unknown image {image_index}"),
            })?
            .handle();

        let mut recorder = CommandRecorder::new(slot.command_buffer, self.device.device.clone());
        recorder.begin()?;
        recorder.begin_render_pass(self.render_pass.handle(), framebuffer, self.full_area())?;

        self.active = Some(ActiveFrame { image_index, recorder });
        Ok(true)
    }

    fn try_clear(&mut self) -> VulkanResult<()> {
        if !self.begin_frame()? {
            return Ok(());
        }
        let area = self.full_area();
        let rgba = clear_value_for(self.draw_color, self.swapchain.format().format);
        if let Some(frame) = self.active.as_mut() {
            frame.recorder.clear_color(rgba, area)?;
        }
        Ok(())
    }

    fn try_present(&mut self) -> VulkanResult<()> {
        if !self.begin_frame()? {
            return Ok(());
        }
        let Some(frame) = self.active.take() else {
            return Ok(());
        };

        let command_buffer = frame.recorder.finish()?;
        let slot = &self.slots[self.current_slot];
        let render_finished = self.render_finished[frame.image_index as usize].handle();

        let wait_semaphores = [slot.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        slot.sync.in_flight.reset()?;
        unsafe {
            self.device
                .device
                .queue_submit(self.device.graphics_queue, &[submit_info], slot.sync.in_flight.handle())
                .map_err(VulkanError::Api)?;
        }
        self.stage = FrameStage::Idle;

        let swapchains = [self.swapchain.handle()];
        let image_indices = [frame.image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.device.present_queue, &present_info)
        };
        self.current_slot = (self.current_slot + 1) % self.slots.len();

        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.swapchain_stale = true;
                Ok(())
            }
            Err(e) => {
                self.swapchain_stale = true;
                Err(VulkanError::Api(e))
            }
        }
    }

    /// Drop a frame that failed part-way so the next one starts clean
    fn abandon_frame(&mut self) {
        self.active = None;
        let recovery = self.stage.recovery();
        self.stage = FrameStage::Idle;

        if recovery.mark_stale {
            self.swapchain_stale = true;
        }
        if recovery.rebuild_sync {
            // The old fence may be reset with no submission left to signal it
            self.device.wait_idle();
            match FrameSync::new(self.device.device.clone()) {
                Ok(sync) => self.slots[self.current_slot].sync = sync,
                Err(e) => log::error!("Failed to rebuild frame sync: {}", e),
            }
        }
    }
}

impl Renderer for VulkanRenderer {
    fn set_draw_color(&mut self, color: Color) {
        self.draw_color = color;
    }

    fn clear(&mut self) {
        if let Err(e) = self.try_clear() {
            log::error!("Clear failed: {}", e);
            self.abandon_frame();
        }
    }

    fn present(&mut self) {
        if let Err(e) = self.try_present() {
            log::error!("Present failed: {}", e);
            self.abandon_frame();
        }
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan renderer");
        // Nothing may be released while the GPU still uses it
        self.device.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_failure_needs_no_cleanup() {
        let recovery = FrameStage::Idle.recovery();
        assert!(!recovery.rebuild_sync);
        assert!(!recovery.mark_stale);
    }

    #[test]
    fn failure_after_acquire_replaces_sync_and_swapchain() {
        let recovery = FrameStage::Acquired.recovery();
        assert!(recovery.rebuild_sync);
        assert!(recovery.mark_stale);
    }

    #[test]
    fn srgb_targets_get_linear_clear_values() {
        let color = Color::rgb(10, 20, 30);
        assert_eq!(
            clear_value_for(color, vk::Format::B8G8R8A8_SRGB),
            color.to_linear_f32_array()
        );
        assert_eq!(
            clear_value_for(color, vk::Format::B8G8R8A8_UNORM),
            color.to_f32_array()
        );
        assert_eq!(
            clear_value_for(Color::BLUE, vk::Format::B8G8R8A8_SRGB),
            [0.0, 0.0, 1.0, 1.0]
        );
    }
}
