//! Main renderer orchestration.
//!
//! [`Renderer`] owns every Vulkan object through a [`GpuState`] that can be
//! dropped and rebuilt as a unit when the device is lost. The CPU-side assets
//! stay in the renderer, so a rebuild needs nothing from the caller.
//!
//! # Frame Flow
//!
//! ```text
//! update():  write instance records into the current frame slot
//! render():  record + submit the current slot
//!            present
//!            (recreate swapchain if resized or out of date)
//!            acquire next image, advance_frame -> next slot is now current
//! ```

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use instancing_core::config::{CLEAR_COLOR, SWAP_BUFFER_COUNT};
use instancing_core::{FrameSlot, InstanceCount, MeshSlot};
use instancing_platform::{Surface, Window};
use instancing_resources::{LoadedAssets, MeshRange, SceneGeometry, TextureData};
use instancing_rhi::buffer::{Buffer, BufferUsage};
use instancing_rhi::command::{CommandBuffer, CommandPool, ImageTransition};
use instancing_rhi::descriptor::{DescriptorHeap, DescriptorKind, TableLayouts};
use instancing_rhi::device::Device;
use instancing_rhi::image::{DEPTH_FORMAT, Image};
use instancing_rhi::instance::Instance;
use instancing_rhi::physical_device::select_physical_device;
use instancing_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use instancing_rhi::sampler::Sampler;
use instancing_rhi::shader::{Shader, ShaderStage};
use instancing_rhi::swapchain::{AcquiredImage, PresentOutcome, Swapchain};
use instancing_rhi::RhiError;
use instancing_rhi::sync::{Semaphore, TimelineSemaphore};
use instancing_scene::{Camera, SceneInstances};

use crate::descriptor_layout::{DescriptorLayout, HeapEntry};
use crate::draw::DrawSequencer;
use crate::error::{RenderError, RenderResult};
use crate::frame_ring::{FrameResourceRing, ResourcePlan, SlotBuffer};
use crate::frame_sync::FrameSync;
use crate::instance_data::{InstanceRecord, PassConstants};
use crate::vulkan::{CommandRecorder, QueueTimeline, mesh_vertex_layout};

const VERTEX_SHADER: &str = "shaders/spirv/instanced.vert.spv";
const FRAGMENT_SHADER: &str = "shaders/spirv/instanced.frag.spv";

/// Consecutive out-of-date acquires tolerated before giving up.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

/// Renders the instanced scene into a window.
pub struct Renderer {
    window: Window,
    assets: LoadedAssets,
    gpu: Option<GpuState>,
    width: u32,
    height: u32,
    /// A resize arrived since the last present.
    resize_pending: bool,
    /// The current slot holds instance data written by `update`.
    has_update: bool,
}

impl Renderer {
    /// Creates the renderer and every GPU object for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object cannot be created or the asset
    /// upload fails.
    pub fn new(window: Window, assets: LoadedAssets) -> RenderResult<Self> {
        let (width, height) = (window.width(), window.height());
        info!("Initializing Vulkan renderer ({}x{})", width, height);
        let gpu = GpuState::new(&window, &assets, width, height)?;
        Ok(Self {
            window,
            assets,
            gpu: Some(gpu),
            width,
            height,
            resize_pending: false,
            has_update: false,
        })
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The swapchain is rebuilt after the next present.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        debug!(
            "Resize triggered: {}x{} -> {}x{}",
            self.width, self.height, width, height
        );
        self.width = width;
        self.height = height;
        self.window.resize(width, height);
        self.resize_pending = true;
    }

    /// Writes every instance's transforms into the current frame slot.
    pub fn update(&mut self, scene: &SceneInstances, phase: f32, camera: &Camera) -> RenderResult<()> {
        let result = self
            .gpu_state()
            .and_then(|gpu| gpu.write_instances(scene, phase, camera));
        match result {
            Ok(()) => {
                self.has_update = true;
                Ok(())
            }
            Err(e) if e.is_device_lost() => self.recover_from_device_loss(e),
            Err(e) => Err(e),
        }
    }

    /// Draws and presents the current frame slot, then moves to the next one.
    ///
    /// Device loss is handled here by rebuilding every GPU object.
    pub fn render_frame(&mut self) -> RenderResult<()> {
        if !self.has_update || self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let (width, height) = (self.width, self.height);
        let resize = self.resize_pending;

        let result = self
            .gpu_state()
            .and_then(|gpu| gpu.draw_and_present(width, height, resize));
        match result {
            Ok(()) => {
                self.resize_pending = false;
                // The next slot holds whatever it was last given.
                self.has_update = false;
                Ok(())
            }
            Err(e) if e.is_device_lost() => self.recover_from_device_loss(e),
            Err(e) => Err(e),
        }
    }

    /// Number of frame-resource slots in the ring.
    pub fn frame_slots(&self) -> usize {
        self.gpu
            .as_ref()
            .map_or(0, |gpu| gpu.frames.layout.frame_slots())
    }

    fn gpu_state(&mut self) -> RenderResult<&mut GpuState> {
        if self.gpu.is_none() {
            self.gpu = Some(GpuState::new(
                &self.window,
                &self.assets,
                self.width,
                self.height,
            )?);
        }
        self.gpu
            .as_mut()
            .ok_or_else(|| RenderError::Sequencing("GPU state missing after rebuild".into()))
    }

    fn recover_from_device_loss(&mut self, cause: RenderError) -> RenderResult<()> {
        warn!("Device lost ({}), rebuilding all GPU objects", cause);
        // Dropping tears everything down in dependency order.
        self.gpu = None;
        self.has_update = false;
        self.resize_pending = false;
        self.gpu = Some(GpuState::new(
            &self.window,
            &self.assets,
            self.width,
            self.height,
        )?);
        info!("Device recovered");
        Ok(())
    }
}

/// Static geometry in device-local memory.
struct GeometryBuffers {
    vertex: Buffer,
    index: Buffer,
}

/// Everything sized by the frame-slot count.
struct FrameState {
    heap: DescriptorHeap,
    ring: FrameResourceRing<Buffer>,
    /// Per slot; freed with `command_pools`.
    commands: Vec<CommandBuffer>,
    command_pools: Vec<CommandPool>,
    /// Instance counts last written into each slot.
    counts: Vec<Vec<InstanceCount>>,
    layout: DescriptorLayout,
}

/// Every Vulkan object the renderer uses.
///
/// Fields drop in declaration order, which is reverse creation order.
struct GpuState {
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    frames: FrameState,
    sampler_heap: DescriptorHeap,
    table_layouts: TableLayouts,
    sampler: Sampler,
    textures: Vec<Image>,
    geometry: Option<GeometryBuffers>,
    /// Ring of image-count + 1 semaphores for acquisition.
    acquire_semaphores: Vec<Semaphore>,
    /// One per swapchain image.
    render_finished: Vec<Semaphore>,
    timeline: TimelineSemaphore,
    depth: Image,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    sync: FrameSync,
    ranges: Vec<MeshRange>,
    /// Semaphore the next submission waits on.
    pending_acquire: vk::Semaphore,
    next_acquire: usize,
    /// The last acquire reported a suboptimal swapchain.
    acquired_suboptimal: bool,
}

impl GpuState {
    fn new(window: &Window, assets: &LoadedAssets, width: u32, height: u32) -> RenderResult<Self> {
        let enable_validation = cfg!(debug_assertions);
        let extensions = window.required_extensions()?;
        let instance = Instance::new(c"Instanced Rendering", &extensions, enable_validation)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            SWAP_BUFFER_COUNT as u32,
        )?;
        let depth = Image::depth(device.clone(), swapchain.extent())?;
        let timeline = TimelineSemaphore::new(device.clone(), 0)?;
        let image_count = swapchain.image_count();
        let render_finished = Semaphore::many(&device, image_count)?;
        let acquire_semaphores = Semaphore::many(&device, image_count + 1)?;

        // Uploads are fenced through a provisional sync on slot 0; the real
        // first slot is known only after the first acquire.
        let mut sync = FrameSync::new(image_count, FrameSlot::new(0, image_count)?)?;
        let (geometry, textures) = {
            let timeline = QueueTimeline::new(&timeline, device.graphics_queue());
            upload_assets(&device, assets, &mut sync, &timeline)?
        };

        let table_layouts = TableLayouts::new(device.clone())?;
        let sampler = Sampler::linear_repeat(device.clone())?;
        let mut sampler_heap =
            DescriptorHeap::new(device.clone(), &table_layouts, &[DescriptorKind::Sampler])?;
        {
            let mut writer = sampler_heap.writer();
            writer.sampler(sampler.handle())?;
            writer.finish()?;
        }

        let frames = FrameState::new(
            &device,
            &table_layouts,
            image_count,
            assets.mesh_count(),
            &textures,
        )?;

        let pipeline_layout = PipelineLayout::new(device.clone(), &table_layouts.handles())?;
        let pipeline = create_pipeline(&device, &pipeline_layout, swapchain.format())?;

        let mut gpu = Self {
            pipeline,
            pipeline_layout,
            frames,
            sampler_heap,
            table_layouts,
            sampler,
            textures,
            geometry,
            acquire_semaphores,
            render_finished,
            timeline,
            depth,
            swapchain,
            device,
            surface,
            instance,
            sync,
            ranges: assets.geometry.ranges().to_vec(),
            pending_acquire: vk::Semaphore::null(),
            next_acquire: 0,
            acquired_suboptimal: false,
        };
        gpu.acquire_next(width, height)?;

        info!(
            "Renderer ready: {} frame slots, {} mesh slots, {} textures, {} descriptors",
            gpu.frames.layout.frame_slots(),
            gpu.frames.layout.mesh_slots(),
            gpu.frames.layout.textures(),
            gpu.frames.layout.total()
        );
        Ok(gpu)
    }

    /// Writes this tick's instance records into the current slot.
    fn write_instances(
        &mut self,
        scene: &SceneInstances,
        phase: f32,
        camera: &Camera,
    ) -> RenderResult<()> {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let frame = self.sync.current();
        let mesh_slots = self.frames.layout.mesh_slots();

        let slot = self.frames.ring.slot_for_write(frame, &self.sync)?;
        let mut counts = vec![InstanceCount::ZERO; mesh_slots];
        for (mesh, instances) in scene.iter() {
            let records: Vec<InstanceRecord> = instances
                .iter()
                .map(|instance| InstanceRecord::from(instance.transforms(phase, &view, &projection)))
                .collect();
            let buffer = slot.instances_mut(mesh)?;
            buffer.map::<InstanceRecord>()?.write_slice(&records)?;
            counts[mesh.index()] = scene.instance_count(mesh);
        }
        self.frames.counts[frame.index()] = counts;
        Ok(())
    }

    /// Records, submits and presents the current slot, then acquires the next.
    fn draw_and_present(&mut self, width: u32, height: u32, resize: bool) -> RenderResult<()> {
        let frame = self.sync.current();
        let image_index = frame.index() as u32;
        let cmd = &self.frames.commands[frame.index()];

        cmd.reset()?;
        cmd.begin()?;
        self.record_frame(cmd, frame)?;
        cmd.end()?;

        let wait_semaphores = [self.pending_acquire];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[frame.index()].handle()];
        let command_buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())?;
        }

        let outcome = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            signal_semaphores[0],
        )?;
        if needs_recreate(resize, self.acquired_suboptimal, outcome) {
            self.recreate_swapchain(width, height)?;
        }
        self.acquire_next(width, height)
    }

    fn record_frame(&self, cmd: &CommandBuffer, frame: FrameSlot) -> RenderResult<()> {
        let index = frame.index();
        let extent = self.swapchain.extent();
        let image = self.swapchain.image(index);

        cmd.transition_image(image, ImageTransition::UndefinedToColorAttachment);
        cmd.transition_image(
            self.depth.handle(),
            ImageTransition::UndefinedToDepthAttachment,
        );

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(index))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            })];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);
        cmd.set_full_viewport(extent);
        cmd.bind_graphics_pipeline(self.pipeline.handle());

        let layout = self.pipeline_layout.handle();
        let texture_set = self.frames.heap.set(
            self.frames.layout.texture_offset(0)?,
            DescriptorKind::SampledImage,
        )?;
        cmd.bind_descriptor_set(layout, DescriptorKind::SampledImage.set_index(), texture_set);
        let sampler_set = self.sampler_heap.set(0, DescriptorKind::Sampler)?;
        cmd.bind_descriptor_set(layout, DescriptorKind::Sampler.set_index(), sampler_set);

        if let Some(geometry) = &self.geometry {
            cmd.bind_vertex_buffer(geometry.vertex.handle());
            cmd.bind_index_buffer(geometry.index.handle());
            self.record_draws(cmd, frame)?;
        }

        cmd.end_rendering();
        cmd.transition_image(image, ImageTransition::ColorAttachmentToPresent);
        Ok(())
    }

    fn record_draws(&self, cmd: &CommandBuffer, frame: FrameSlot) -> RenderResult<()> {
        let index = frame.index();
        let layout = self.pipeline_layout.handle();
        let counts = &self.frames.counts[index];
        let sequencer = DrawSequencer::new(&self.frames.layout, &self.ranges)?;
        let mut recorder = CommandRecorder::new(cmd, layout, &self.frames.heap);
        sequencer.record(&mut recorder, frame, |mesh: MeshSlot| {
            counts
                .get(mesh.index())
                .copied()
                .unwrap_or(InstanceCount::ZERO)
        })?;
        Ok(())
    }

    /// Acquires the next image and makes its slot current.
    fn acquire_next(&mut self, width: u32, height: u32) -> RenderResult<()> {
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let semaphore = self.acquire_semaphores[self.next_acquire].handle();
            match self.swapchain.acquire_next_image(semaphore)? {
                AcquiredImage::Ready { index, suboptimal } => {
                    if suboptimal {
                        debug!("Swapchain suboptimal, recreating after this frame");
                    }
                    self.acquired_suboptimal = suboptimal;
                    self.next_acquire = (self.next_acquire + 1) % self.acquire_semaphores.len();
                    self.pending_acquire = semaphore;
                    let next = FrameSlot::new(index as usize, self.frames.layout.frame_slots())?;
                    let timeline = QueueTimeline::new(&self.timeline, self.device.graphics_queue());
                    self.sync.advance_frame(&timeline, next)?;
                    return Ok(());
                }
                AcquiredImage::OutOfDate => {
                    debug!("Swapchain out of date during acquire");
                    self.recreate_swapchain(width, height)?;
                }
            }
        }
        Err(RhiError::SwapchainError(format!(
            "swapchain still out of date after {MAX_ACQUIRE_ATTEMPTS} rebuilds"
        ))
        .into())
    }

    /// Rebuilds the swapchain, depth buffer and presentation semaphores.
    ///
    /// The frame ring and descriptor heap are rebuilt only when the image
    /// count changes.
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let timeline = QueueTimeline::new(&self.timeline, self.device.graphics_queue());
        self.sync.wait_for_gpu_idle(&timeline)?;
        // Presentation is not covered by the timeline.
        self.device.wait_idle()?;

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            width,
            height,
            SWAP_BUFFER_COUNT as u32,
        )?;
        self.depth = Image::depth(self.device.clone(), self.swapchain.extent())?;

        let image_count = self.swapchain.image_count();
        self.render_finished = Semaphore::many(&self.device, image_count)?;
        self.acquire_semaphores = Semaphore::many(&self.device, image_count + 1)?;
        self.next_acquire = 0;
        self.pending_acquire = vk::Semaphore::null();

        let mesh_slots = self.frames.layout.mesh_slots();
        refit_frame_state(&mut self.sync, &mut self.frames, image_count, |slots| {
            FrameState::new(
                &self.device,
                &self.table_layouts,
                slots,
                mesh_slots,
                &self.textures,
            )
        })?;
        Ok(())
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        // A lost device reports an error here; teardown continues regardless.
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {}", e);
        }
        debug!("Releasing GPU state");
    }
}

impl FrameState {
    fn new(
        device: &Arc<Device>,
        table_layouts: &TableLayouts,
        frame_slots: usize,
        mesh_slots: usize,
        textures: &[Image],
    ) -> RenderResult<Self> {
        let layout = DescriptorLayout::new(frame_slots, mesh_slots, textures.len())?;

        let ring = FrameResourceRing::new(ResourcePlan::new(frame_slots, mesh_slots), |role, size| {
            match role {
                SlotBuffer::Pass(_) => {
                    let mut buffer = Buffer::new(device.clone(), BufferUsage::Uniform, size)?;
                    buffer
                        .map::<PassConstants>()?
                        .write_slice(&[PassConstants::default()])?;
                    Ok(buffer)
                }
                SlotBuffer::Instances(..) => {
                    Ok(Buffer::new(device.clone(), BufferUsage::Storage, size)?)
                }
            }
        })?;

        let mut heap = DescriptorHeap::new(device.clone(), table_layouts, &layout.kinds()?)?;
        {
            let mut writer = heap.writer();
            for entry in layout.entries()? {
                match entry {
                    HeapEntry::Pass(frame) => {
                        let buffer = &ring.slot(frame)?.pass;
                        writer.uniform_buffer(buffer.handle(), PassConstants::SIZE as u64)?;
                    }
                    HeapEntry::Instances(frame, mesh) => {
                        let buffer = ring.slot(frame)?.instances.get(mesh.index()).ok_or_else(|| {
                            RenderError::Sequencing(format!("{frame} has no buffer for {mesh}"))
                        })?;
                        writer.storage_buffer(buffer.handle(), buffer.size())?;
                    }
                    HeapEntry::Texture(index) => {
                        writer.sampled_image(textures[index].view())?;
                    }
                }
            }
            writer.finish()?;
        }

        let command_pools = (0..frame_slots)
            .map(|_| CommandPool::new(device.clone(), device.graphics_family()))
            .collect::<Result<Vec<_>, _>>()?;
        let commands = command_pools
            .iter()
            .map(|pool| CommandBuffer::new(device.clone(), pool))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            heap,
            ring,
            commands,
            command_pools,
            counts: vec![vec![InstanceCount::ZERO; mesh_slots]; frame_slots],
            layout,
        })
    }
}

/// Whether the swapchain must be rebuilt after presenting.
fn needs_recreate(resize_pending: bool, acquired_suboptimal: bool, outcome: PresentOutcome) -> bool {
    resize_pending || acquired_suboptimal || outcome == PresentOutcome::NeedsRecreate
}

/// Fits the per-frame state to a rebuilt swapchain.
///
/// Call only while the GPU is idle. With an unchanged image count `frames` is
/// kept and every fence value is reset to the current one; otherwise `build`
/// creates a new state for the new count and the sync ring is resized.
/// Returns whether `frames` was rebuilt.
fn refit_frame_state<S, F>(
    sync: &mut FrameSync,
    frames: &mut S,
    image_count: usize,
    build: F,
) -> RenderResult<bool>
where
    F: FnOnce(usize) -> RenderResult<S>,
{
    if image_count == sync.slot_count() {
        sync.reset_all_to_current();
        return Ok(false);
    }
    info!(
        "Swapchain image count changed {} -> {}, rebuilding frame resources",
        sync.slot_count(),
        image_count
    );
    *frames = build(image_count)?;
    sync.resize(image_count)?;
    Ok(true)
}

/// Fails with a build hint when a compiled shader is missing.
fn ensure_shader_built(path: &Path) -> RenderResult<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(RhiError::ShaderError(format!(
        "{} not found; compile shaders/instanced.vert and shaders/instanced.frag with glslc (see README.md)",
        path.display()
    ))
    .into())
}

fn create_pipeline(
    device: &Arc<Device>,
    layout: &PipelineLayout,
    color_format: vk::Format,
) -> RenderResult<Pipeline> {
    ensure_shader_built(Path::new(VERTEX_SHADER))?;
    ensure_shader_built(Path::new(FRAGMENT_SHADER))?;
    let vertex_shader =
        Shader::from_spirv_file(device.clone(), Path::new(VERTEX_SHADER), ShaderStage::Vertex)?;
    let fragment_shader = Shader::from_spirv_file(
        device.clone(),
        Path::new(FRAGMENT_SHADER),
        ShaderStage::Fragment,
    )?;

    let pipeline = GraphicsPipelineBuilder::new()
        .vertex_shader(&vertex_shader)
        .fragment_shader(&fragment_shader)
        .vertex_layout(&mesh_vertex_layout())
        .cull_mode(CullMode::None)
        .color_attachment_format(color_format)
        .depth_attachment_format(DEPTH_FORMAT)
        .build(device.clone(), layout)?;

    info!("Instanced pipeline created");
    Ok(pipeline)
}

/// Copies geometry and textures into device-local memory and waits for the
/// copies to finish before the staging buffers are freed.
fn upload_assets(
    device: &Arc<Device>,
    assets: &LoadedAssets,
    sync: &mut FrameSync,
    timeline: &QueueTimeline<'_>,
) -> RenderResult<(Option<GeometryBuffers>, Vec<Image>)> {
    let pool = CommandPool::new(device.clone(), device.graphics_family())?;
    let mut staging = Vec::new();

    let geometry = stage_geometry(device, &assets.geometry, &mut staging)?;
    let textures = assets
        .textures
        .iter()
        .map(|texture| stage_texture(device, texture, &mut staging))
        .collect::<RenderResult<Vec<_>>>()?;

    pool.record_one_time(|cmd| {
        for copy in &staging {
            match copy.target {
                StagedTarget::Buffer(dst) => cmd.copy_buffer(copy.source.handle(), dst, copy.source.size()),
                StagedTarget::Image(dst, extent) => {
                    cmd.transition_image(dst, ImageTransition::UndefinedToTransferDst);
                    cmd.copy_buffer_to_image(copy.source.handle(), dst, extent);
                    cmd.transition_image(dst, ImageTransition::TransferDstToShaderRead);
                }
            }
        }
    })?;
    sync.wait_for_gpu_idle(timeline)?;

    debug!(
        "Uploaded {} staging buffers ({} bytes)",
        staging.len(),
        staging.iter().map(|s| s.source.size()).sum::<u64>()
    );
    Ok((geometry, textures))
}

enum StagedTarget {
    Buffer(vk::Buffer),
    Image(vk::Image, vk::Extent2D),
}

struct StagedCopy {
    source: Buffer,
    target: StagedTarget,
}

fn stage_geometry(
    device: &Arc<Device>,
    geometry: &SceneGeometry,
    staging: &mut Vec<StagedCopy>,
) -> RenderResult<Option<GeometryBuffers>> {
    if geometry.vertices.is_empty() || geometry.indices.is_empty() {
        warn!("No geometry to upload");
        return Ok(None);
    }

    let vertex = Buffer::new(device.clone(), BufferUsage::Vertex, geometry.vertex_bytes())?;
    let index = Buffer::new(device.clone(), BufferUsage::Index, geometry.index_bytes())?;

    staging.push(StagedCopy {
        source: Buffer::new_with_data(
            device.clone(),
            BufferUsage::Staging,
            bytemuck::cast_slice(&geometry.vertices),
        )?,
        target: StagedTarget::Buffer(vertex.handle()),
    });
    staging.push(StagedCopy {
        source: Buffer::new_with_data(
            device.clone(),
            BufferUsage::Staging,
            bytemuck::cast_slice(&geometry.indices),
        )?,
        target: StagedTarget::Buffer(index.handle()),
    });

    Ok(Some(GeometryBuffers { vertex, index }))
}

fn stage_texture(
    device: &Arc<Device>,
    texture: &TextureData,
    staging: &mut Vec<StagedCopy>,
) -> RenderResult<Image> {
    let extent = vk::Extent2D {
        width: texture.width,
        height: texture.height,
    };
    let image = Image::texture(device.clone(), extent)?;
    staging.push(StagedCopy {
        source: Buffer::new_with_data(device.clone(), BufferUsage::Staging, &texture.pixels)?,
        target: StagedTarget::Image(image.handle(), extent),
    });
    debug!("Staged texture {} ({}x{})", texture.name, texture.width, texture.height);
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::gpu::GpuTimeline;

    #[test]
    fn test_shader_paths() {
        assert!(VERTEX_SHADER.ends_with("instanced.vert.spv"));
        assert!(FRAGMENT_SHADER.ends_with("instanced.frag.spv"));
    }

    #[test]
    fn test_missing_shader_names_build_step() {
        let err = ensure_shader_built(Path::new("shaders/spirv/does_not_exist.spv")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("does_not_exist.spv"));
        assert!(message.contains("glslc"));
    }

    #[test]
    fn test_needs_recreate() {
        assert!(!needs_recreate(false, false, PresentOutcome::Presented));
        assert!(needs_recreate(true, false, PresentOutcome::Presented));
        assert!(needs_recreate(false, true, PresentOutcome::Presented));
        assert!(needs_recreate(false, false, PresentOutcome::NeedsRecreate));
    }

    /// Completes every signal immediately.
    #[derive(Default)]
    struct InstantTimeline {
        completed: Cell<u64>,
    }

    impl GpuTimeline for InstantTimeline {
        fn completed_value(&self) -> RenderResult<u64> {
            Ok(self.completed.get())
        }

        fn signal(&self, value: u64) -> RenderResult<()> {
            assert!(value > self.completed.get(), "timeline must increase");
            self.completed.set(value);
            Ok(())
        }

        fn wait_for(&self, value: u64) -> RenderResult<()> {
            assert!(self.completed.get() >= value);
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    struct FakeBuffer {
        size: u64,
    }

    struct FakeFrames {
        layout: DescriptorLayout,
        ring: FrameResourceRing<FakeBuffer>,
    }

    impl FakeFrames {
        fn build(frame_slots: usize) -> RenderResult<Self> {
            Ok(Self {
                layout: DescriptorLayout::new(frame_slots, 3, 1)?,
                ring: FrameResourceRing::new(ResourcePlan::new(frame_slots, 3), |_, size| {
                    Ok(FakeBuffer { size })
                })?,
            })
        }

        fn buffer_sizes(&self) -> Vec<u64> {
            self.ring
                .iter()
                .flat_map(|slot| std::iter::once(&slot.pass).chain(slot.instances.iter()))
                .map(|buffer| buffer.size)
                .collect()
        }
    }

    fn fence_values(sync: &FrameSync) -> Vec<u64> {
        (0..sync.slot_count())
            .map(|i| sync.fence_value(FrameSlot::new(i, sync.slot_count()).unwrap()))
            .collect()
    }

    /// Runs the idle wait and refit a swapchain rebuild performs.
    fn rebuild(
        timeline: &InstantTimeline,
        sync: &mut FrameSync,
        frames: &mut FakeFrames,
        image_count: usize,
    ) -> bool {
        sync.wait_for_gpu_idle(timeline).unwrap();
        refit_frame_state(sync, frames, image_count, FakeFrames::build).unwrap()
    }

    #[test]
    fn test_same_size_rebuilds_keep_frame_state() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(SWAP_BUFFER_COUNT, FrameSlot::new(0, SWAP_BUFFER_COUNT).unwrap())
            .unwrap();
        let mut frames = FakeFrames::build(SWAP_BUFFER_COUNT).unwrap();
        for next in [1, 2, 0, 1] {
            sync.advance_frame(&timeline, FrameSlot::new(next, SWAP_BUFFER_COUNT).unwrap())
                .unwrap();
        }

        let total = frames.layout.total();
        let plan = *frames.ring.plan();
        let sizes = frames.buffer_sizes();

        assert!(!rebuild(&timeline, &mut sync, &mut frames, SWAP_BUFFER_COUNT));
        let after_first = fence_values(&sync);
        assert!(after_first.windows(2).all(|w| w[0] == w[1]));

        assert!(!rebuild(&timeline, &mut sync, &mut frames, SWAP_BUFFER_COUNT));
        let after_second = fence_values(&sync);

        assert_eq!(frames.layout.total(), total);
        assert_eq!(*frames.ring.plan(), plan);
        assert_eq!(frames.buffer_sizes(), sizes);
        assert!(
            after_first
                .iter()
                .zip(&after_second)
                .all(|(first, second)| second >= first)
        );

        // The ring keeps running on the kept state.
        sync.advance_frame(&timeline, FrameSlot::new(2, SWAP_BUFFER_COUNT).unwrap())
            .unwrap();
    }

    #[test]
    fn test_image_count_change_rebuilds_frame_state() {
        let timeline = InstantTimeline::default();
        let mut sync = FrameSync::new(SWAP_BUFFER_COUNT, FrameSlot::new(0, SWAP_BUFFER_COUNT).unwrap())
            .unwrap();
        let mut frames = FakeFrames::build(SWAP_BUFFER_COUNT).unwrap();
        sync.advance_frame(&timeline, FrameSlot::new(1, SWAP_BUFFER_COUNT).unwrap())
            .unwrap();
        let before = sync.fence_value(sync.current());

        assert!(rebuild(&timeline, &mut sync, &mut frames, 4));
        assert_eq!(sync.slot_count(), 4);
        assert_eq!(frames.layout.frame_slots(), 4);
        assert_eq!(frames.ring.len(), 4);
        assert!(fence_values(&sync).iter().all(|&v| v > before));

        sync.advance_frame(&timeline, FrameSlot::new(3, 4).unwrap()).unwrap();
    }
}
