//! Command buffer management
//!
//! Command pool with RAII cleanup and a recorder that checks the command
//! buffer state machine before every call into the driver.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees every buffer allocated from it
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Where a command buffer is in its recording lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not recording
    Initial,
    /// Recording, outside a render pass
    Recording,
    /// Recording inside a render pass
    InRenderPass,
}

/// Operation a recorder is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecorderOp {
    Begin,
    BeginRenderPass,
    Clear,
    EndRenderPass,
    End,
}

impl RecorderState {
    /// State after `op`, or an error if `op` is illegal here
    pub(crate) fn after(self, op: RecorderOp) -> VulkanResult<Self> {
        match (self, op) {
            (Self::Initial, RecorderOp::Begin) => Ok(Self::Recording),
            (Self::Recording, RecorderOp::BeginRenderPass) => Ok(Self::InRenderPass),
            (Self::InRenderPass, RecorderOp::Clear) => Ok(Self::InRenderPass),
            (Self::InRenderPass, RecorderOp::EndRenderPass) => Ok(Self::Recording),
            (Self::Recording, RecorderOp::End) => Ok(Self::Initial),
            (state, op) => Err(VulkanError::InvalidOperation {
                reason: format!("{op:?} while command buffer is {state:?}"),
            }),
        }
    }
}

/// Records one frame's commands into a primary command buffer
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    state: RecorderState,
}

impl CommandRecorder {
    /// Create a new command recorder
    pub const fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            state: RecorderState::Initial,
        }
    }

    fn advance(&mut self, op: RecorderOp) -> VulkanResult<()> {
        self.state = self.state.after(op)?;
        Ok(())
    }

    /// Reset the buffer and begin one-time-submit recording
    pub fn begin(&mut self) -> VulkanResult<()> {
        let next = self.state.after(RecorderOp::Begin)?;
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.state = next;
        Ok(())
    }

    /// Begin render pass
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
    ) -> VulkanResult<()> {
        self.advance(RecorderOp::BeginRenderPass)?;

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    /// Fill `area` of color attachment 0 with `rgba`, given in the attachment's encoding
    pub fn clear_color(&mut self, rgba: [f32; 4], area: vk::Rect2D) -> VulkanResult<()> {
        self.advance(RecorderOp::Clear)?;

        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: rgba,
                },
            },
        };
        let rect = vk::ClearRect {
            rect: area,
            base_array_layer: 0,
            layer_count: 1,
        };

        unsafe {
            self.device
                .cmd_clear_attachments(self.command_buffer, &[attachment], &[rect]);
        }
        Ok(())
    }

    /// Close the render pass and finish recording
    pub fn finish(mut self) -> VulkanResult<vk::CommandBuffer> {
        if self.state == RecorderState::InRenderPass {
            self.advance(RecorderOp::EndRenderPass)?;
            unsafe {
                self.device.cmd_end_render_pass(self.command_buffer);
            }
        }

        self.advance(RecorderOp::End)?;
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }
        Ok(self.command_buffer)
    }
}
