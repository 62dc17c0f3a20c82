//! Elapsed-time measurement for GPU steps.

use std::time::Instant;

use super::{GpuError, wait_for_mapping};

/// Bytes needed to resolve a begin/end timestamp pair.
const TIMESTAMP_BYTES: u64 = 2 * std::mem::size_of::<u64>() as u64;

/// Measures how long the kernel ran.
///
/// Uses hardware timestamp queries when the device was created with
/// `TIMESTAMP_QUERY`; otherwise measures host wall-clock around submit and wait.
pub enum StepTimer {
    Device {
        query_set: wgpu::QuerySet,
        resolve_buffer: wgpu::Buffer,
        readback_buffer: wgpu::Buffer,
        /// Nanoseconds per timestamp tick.
        period_ns: f32,
    },
    Host {
        started: Option<Instant>,
    },
}

impl StepTimer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            log::info!("Timestamp queries unavailable, timing steps on the host");
            return StepTimer::Host { started: None };
        }

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Step Timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: 2,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Resolve Buffer"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Readback Buffer"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        StepTimer::Device {
            query_set,
            resolve_buffer,
            readback_buffer,
            period_ns: queue.get_timestamp_period(),
        }
    }

    pub fn uses_device_timestamps(&self) -> bool {
        matches!(self, StepTimer::Device { .. })
    }

    /// Timestamp writes to attach to the compute pass, if supported.
    pub fn timestamp_writes(&self) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        match self {
            StepTimer::Device { query_set, .. } => Some(wgpu::ComputePassTimestampWrites {
                query_set,
                beginning_of_pass_write_index: Some(0),
                end_of_pass_write_index: Some(1),
            }),
            StepTimer::Host { .. } => None,
        }
    }

    /// Mark the host-side start, before submission.
    pub fn begin(&mut self) {
        if let StepTimer::Host { started } = self {
            *started = Some(Instant::now());
        }
    }

    /// Encode the query resolve after the compute pass.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        if let StepTimer::Device {
            query_set,
            resolve_buffer,
            readback_buffer,
            ..
        } = self
        {
            encoder.resolve_query_set(query_set, 0..2, resolve_buffer, 0);
            encoder.copy_buffer_to_buffer(resolve_buffer, 0, readback_buffer, 0, TIMESTAMP_BYTES);
        }
    }

    /// Elapsed milliseconds of the last step. Call after the device finished.
    pub fn finish(&mut self, device: &wgpu::Device) -> Result<f32, GpuError> {
        match self {
            StepTimer::Host { started } => Ok(started
                .take()
                .map(|t| t.elapsed().as_secs_f32() * 1000.0)
                .unwrap_or(0.0)),
            StepTimer::Device {
                readback_buffer,
                period_ns,
                ..
            } => {
                let slice = readback_buffer.slice(..);
                let (tx, rx) = std::sync::mpsc::channel();
                slice.map_async(wgpu::MapMode::Read, move |result| {
                    let _ = tx.send(result);
                });
                wait_for_mapping(device, readback_buffer, &rx)?;

                let ticks = {
                    let data = slice.get_mapped_range();
                    let stamps: &[u64] = bytemuck::cast_slice(&data);
                    stamps[1].saturating_sub(stamps[0])
                };
                readback_buffer.unmap();

                Ok(ticks_to_ms(ticks, *period_ns))
            }
        }
    }
}

/// Convert a tick delta to milliseconds.
#[inline]
pub fn ticks_to_ms(ticks: u64, period_ns: f32) -> f32 {
    (ticks as f64 * period_ns as f64 / 1_000_000.0) as f32
}
