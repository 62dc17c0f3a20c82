//! GPU Propagator - GPU-accelerated Grey-Scott stepping.

use std::sync::Arc;

use super::interop::{
    InteropFailure, InteropNegotiator, InteropState, SURFACE_TEXEL_BYTES, SharedSurface,
};
use super::kernel::{self, ENTRY_POINT, KernelArgs};
use super::timer::StepTimer;
use super::{GpuError, wait_for_mapping, wait_idle};
use crate::compute::{BackendMode, COMPONENTS, SyncError};
use crate::schema::{SimulationConfig, SimulationParams};

/// GPU-based Grey-Scott propagator using a WebGPU compute shader.
///
/// Two device buffers alternate as current/next. After each step the result
/// reaches the display either through a device-side copy into the shared
/// surface (zero-copy) or through a host readback (buffer-copy).
pub struct GpuPropagator {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,

    pipeline: wgpu::ComputePipeline,

    // GPU buffers
    args_buffer: wgpu::Buffer,
    state_buffers: [wgpu::Buffer; 2],
    staging_buffer: wgpu::Buffer,

    /// `bind_groups[i]` reads `state_buffers[i]` and writes the other one.
    bind_groups: [wgpu::BindGroup; 2],
    /// Index of the authoritative buffer.
    current: usize,

    /// Host copy of the authoritative state.
    host_data: Vec<f32>,
    /// Set when the device advanced without a readback (zero-copy mode).
    host_stale: bool,

    negotiator: InteropNegotiator,
    surface: Option<Arc<SharedSurface>>,

    timer: StepTimer,
    last_compute_ms: f32,
}

impl GpuPropagator {
    /// Create a new GPU propagator.
    ///
    /// Fails if no adapter or device is available, the kernel cannot be
    /// loaded or compiled, or the state buffers exceed device limits. A
    /// failed zero-copy probe is not an error; it selects buffer-copy mode.
    pub async fn new(config: &SimulationConfig) -> Result<Self, GpuError> {
        config.validate()?;

        // 1. Load and validate the kernel before touching the device
        let source = kernel::load_source(config.kernel_path.as_deref())?;
        kernel::validate_source(&source)?;

        // 2. Create wgpu instance
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // 3. Request adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using GPU adapter: {} ({:?})", info.name, info.backend);

        // 4. Request device and queue, with timestamps when available
        let required_features = adapter.features() & wgpu::Features::TIMESTAMP_QUERY;
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Grey-Scott GPU"),
                required_features,
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        // 5. Check buffer sizes against device limits
        let width = config.width as u32;
        let height = config.height as u32;
        let state_len = config.data_len();
        let state_buffer_size = (state_len * std::mem::size_of::<f32>()) as u64;

        let limits = device.limits();
        let binding_limit =
            u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if state_buffer_size > binding_limit {
            return Err(GpuError::Allocation {
                label: "State Buffer",
                size: state_buffer_size,
                limit: binding_limit,
            });
        }

        // 6. Create shader module and pipeline
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grey-Scott Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = create_step_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grey-Scott Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            ..Default::default()
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Grey-Scott Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        // 7. Create GPU buffers
        let args_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Args"),
            size: std::mem::size_of::<KernelArgs>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let state_buffers = [
            create_state_buffer(&device, "State Buffer A", state_buffer_size),
            create_state_buffer(&device, "State Buffer B", state_buffer_size),
        ];
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: state_buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_groups = [
            create_step_bind_group(&device, &bind_group_layout, &state_buffers, &args_buffer, 0),
            create_step_bind_group(&device, &bind_group_layout, &state_buffers, &args_buffer, 1),
        ];

        // 8. Upload the rest state
        let mut host_data = vec![0.0f32; state_len];
        for cell in host_data.chunks_exact_mut(COMPONENTS) {
            cell[0] = 1.0;
        }
        queue.write_buffer(&state_buffers[0], 0, bytemuck::cast_slice(&host_data));

        let timer = StepTimer::new(&device, &queue);

        // 9. Negotiate the presentation path once
        let mut negotiator = InteropNegotiator::new();
        let surface = if config.interop {
            negotiator
                .probe(|| SharedSurface::create(&device, width, height))
                .map(Arc::new)
        } else {
            negotiator.disable();
            None
        };

        log::info!(
            "GPU propagator ready: {}x{} grid, {} mode, timing with {}",
            width,
            height,
            BackendMode::from(negotiator.state()),
            if timer.uses_device_timestamps() {
                "device timestamps"
            } else {
                "host clock"
            }
        );

        let mut propagator = Self {
            device,
            queue,
            width,
            height,
            pipeline,
            args_buffer,
            state_buffers,
            staging_buffer,
            bind_groups,
            current: 0,
            host_data,
            host_stale: false,
            negotiator,
            surface,
            timer,
            last_compute_ms: 0.0,
        };
        propagator.present_current();
        propagator.wait()?;

        Ok(propagator)
    }

    /// Perform one simulation step with the given parameter snapshot.
    ///
    /// Blocks until the device has finished. On error the step is abandoned:
    /// the current buffer is unchanged and the next call retries from it.
    pub fn step(&mut self, params: &SimulationParams) -> Result<(), GpuError> {
        let next = 1 - self.current;

        let args = KernelArgs::new(params, self.width, self.height);
        self.queue
            .write_buffer(&self.args_buffer, 0, bytemuck::bytes_of(&args));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Step Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Grey-Scott Pass"),
                timestamp_writes: self.timer.timestamp_writes(),
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.current], &[]);
            pass.dispatch_workgroups(
                kernel::workgroup_count(self.width),
                kernel::workgroup_count(self.height),
                1,
            );
        }
        self.timer.resolve(&mut encoder);

        self.timer.begin();
        self.queue.submit(std::iter::once(encoder.finish()));

        // Zero-copy: acquire -> device copy -> release, then block below.
        let presented = match self.copy_to_surface(next) {
            Some(Ok(())) => true,
            Some(Err(failure)) => {
                self.negotiator.demote(failure);
                self.surface = None;
                false
            }
            None => false,
        };

        if presented {
            if let Err(e) = self.wait() {
                // The surface may already show `next`; put `current` back.
                self.present_current();
                return Err(e);
            }
            self.host_stale = true;
        } else {
            self.read_buffer_into_host(next)?;
            self.host_stale = false;
        }

        self.last_compute_ms = match self.timer.finish(&self.device) {
            Ok(ms) => ms,
            Err(e) => {
                log::debug!("Step timing unavailable: {}", e);
                0.0
            }
        };

        self.current = next;
        Ok(())
    }

    /// Run simulation for specified number of steps.
    pub fn run(&mut self, params: &SimulationParams, steps: u64) -> Result<(), GpuError> {
        for _ in 0..steps {
            self.step(params)?;
        }
        Ok(())
    }

    /// Host copy of the state. Stale in zero-copy mode until [`Self::read_back`].
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.host_data
    }

    /// Whether [`Self::data`] lags behind the device.
    #[inline]
    pub fn is_host_stale(&self) -> bool {
        self.host_stale
    }

    /// Refresh the host copy from the authoritative device buffer if stale.
    pub fn read_back(&mut self) -> Result<(), GpuError> {
        if self.host_stale {
            self.read_buffer_into_host(self.current)?;
            self.host_stale = false;
        }
        Ok(())
    }

    /// Replace the authoritative state with `data` and re-upload it.
    pub fn sync_from(&mut self, data: &[f32]) -> Result<(), SyncError> {
        if data.len() != self.host_data.len() {
            return Err(SyncError::LengthMismatch {
                expected: self.host_data.len(),
                actual: data.len(),
            });
        }

        self.host_data.copy_from_slice(data);
        self.queue.write_buffer(
            &self.state_buffers[self.current],
            0,
            bytemuck::cast_slice(&self.host_data),
        );
        self.host_stale = false;
        self.present_current();
        self.wait()?;
        Ok(())
    }

    /// Execution mode decided by interop negotiation.
    pub fn mode(&self) -> BackendMode {
        BackendMode::from(self.negotiator.state())
    }

    pub fn interop_state(&self) -> InteropState {
        self.negotiator.state()
    }

    /// Why zero-copy is not in use, if it is not.
    pub fn interop_failure(&self) -> Option<&InteropFailure> {
        self.negotiator.failure()
    }

    /// Surface for the renderer to sample in zero-copy mode.
    pub fn shared_surface(&self) -> Option<Arc<SharedSurface>> {
        self.surface.clone()
    }

    /// Device for collaborators that render from the shared surface.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Elapsed device time of the most recent step in milliseconds.
    #[inline]
    pub fn last_compute_time_ms(&self) -> f32 {
        self.last_compute_ms
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height as usize
    }

    /// Copy `state_buffers[index]` into the shared surface.
    ///
    /// Returns `None` outside zero-copy mode. The lease is released on every
    /// path, including failures between acquire and release.
    fn copy_to_surface(&self, index: usize) -> Option<Result<(), InteropFailure>> {
        if !self.negotiator.is_zero_copy() {
            return None;
        }
        let surface = self.surface.as_ref()?;

        Some(self.encode_surface_copy(surface, index))
    }

    fn encode_surface_copy(
        &self,
        surface: &SharedSurface,
        index: usize,
    ) -> Result<(), InteropFailure> {
        let lease = surface.acquire_for_device()?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Surface Copy Encoder"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &self.state_buffers[index],
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.width * SURFACE_TEXEL_BYTES),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: surface.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            surface.extent(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        lease.release()
    }

    /// Push the current buffer to the surface outside a step (init, sync).
    fn present_current(&mut self) {
        if let Some(Err(failure)) = self.copy_to_surface(self.current) {
            self.negotiator.demote(failure);
            self.surface = None;
        }
    }

    /// Block until all submitted work has finished.
    fn wait(&self) -> Result<(), GpuError> {
        wait_idle(&self.device)
    }

    /// Synchronous readback of `state_buffers[index]` into the host copy.
    fn read_buffer_into_host(&mut self, index: usize) -> Result<(), GpuError> {
        let size = self.staging_buffer.size();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &self.state_buffers[index],
            0,
            &self.staging_buffer,
            0,
            size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.staging_buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        wait_for_mapping(&self.device, &self.staging_buffer, &rx)?;

        {
            let data = buffer_slice.get_mapped_range();
            self.host_data.copy_from_slice(bytemuck::cast_slice(&data));
        }

        self.staging_buffer.unmap();
        Ok(())
    }
}

fn create_state_buffer(device: &wgpu::Device, label: &'static str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

fn create_step_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    state_buffers: &[wgpu::Buffer; 2],
    args_buffer: &wgpu::Buffer,
    current: usize,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Step Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: state_buffers[current].as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: state_buffers[1 - current].as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: args_buffer.as_entire_binding(),
            },
        ],
    })
}

fn create_step_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Step Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}
