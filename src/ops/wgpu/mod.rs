//! GPU-accelerated kernels using WGPU.
//!
//! This module implements compute kernels on the GPU using WGPU + WGSL.
//! It owns GPU context initialization, shader compilation (once, via `lazy_static`),
//! and compute dispatch for:
//!
//! - `activation`: element-wise activation forward pass
//! - `sgd_mom_update`: fused momentum SGD step
//!
//! Tensor data is copied to the GPU as `f32` and read back into the executor's
//! tensors. Every entry point returns `None`/`false` instead of failing, so the
//! dispatcher can run the CPU kernel.

use std::sync::mpsc;

use log::{debug, warn};
use thiserror::Error;

mod activation;
pub use self::activation::wgpu_activation;

mod sgd_mom;
pub use self::sgd_mom::wgpu_sgd_mom_update;

const ACTIVATION: &str = include_str!("shaders/activation.wgsl");
const SGD_MOM: &str = include_str!("shaders/sgd_mom.wgsl");

/// Threads per workgroup in every shader.
const WORKGROUP_SIZE: usize = 64;

/// Errors from GPU setup or execution.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("adapter request failed: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("buffer mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("buffer mapping callback was dropped")]
    MapAborted,

    #[error("{0} elements need more workgroups than the device allows")]
    TooLarge(usize),
}

/// Holds the WGPU device and queue used for executing compute pipelines.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// A queue for information related to the device.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Initializes a new GPU context, selecting the default adapter and creating a device + queue.
    ///
    /// # Errors
    ///
    /// `Err(GpuError)` if adapter or device acquisition fails.
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        debug!("wgpu adapter: {:?}", adapter.get_info());
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("briny_opbench"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;

        Ok(Self { device, queue })
    }

    /// Workgroups needed for `len` elements, if the device can dispatch that many.
    fn workgroups_for(&self, len: usize) -> Result<u32, GpuError> {
        let groups = len.div_ceil(WORKGROUP_SIZE);
        let limit = self.device.limits().max_compute_workgroups_per_dimension as usize;
        if groups > limit {
            return Err(GpuError::TooLarge(len));
        }
        u32::try_from(groups).map_err(|_| GpuError::TooLarge(len))
    }
}

/// A compiled compute pipeline with its bind group layout.
pub(crate) struct Kernel {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl Kernel {
    fn new(
        device: &wgpu::Device,
        label: &str,
        source: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });
        Self { layout, pipeline }
    }

    /// Binds `buffers` in order and dispatches `workgroups` groups.
    fn dispatch(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &[&wgpu::Buffer],
        workgroups: u32,
    ) {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .zip(0u32..)
            .map(|(buffer, binding)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &self.layout,
            entries: &entries,
        });

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: None,
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &bind_group, &[]);
        cpass.dispatch_workgroups(workgroups, 1, 1);
    }
}

/// The GPU context and every pipeline this crate dispatches.
pub(crate) struct GpuKernels {
    ctx: GpuContext,
    activation: Kernel,
    sgd_mom: Kernel,
}

impl GpuKernels {
    fn new() -> Result<Self, GpuError> {
        let ctx = GpuContext::new()?;
        let activation = Kernel::new(
            &ctx.device,
            "activation",
            ACTIVATION,
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        );
        let sgd_mom = Kernel::new(
            &ctx.device,
            "sgd_mom_update",
            SGD_MOM,
            &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        Ok(Self {
            ctx,
            activation,
            sgd_mom,
        })
    }
}

lazy_static::lazy_static! {
    static ref GPU_KERNELS: Option<GpuKernels> = match GpuKernels::new() {
        Ok(kernels) => Some(kernels),
        Err(e) => {
            warn!("GPU backend unavailable, kernels will run on the CPU: {e}");
            None
        }
    };
}

/// The shared kernels, or `None` when no usable GPU exists.
pub(crate) fn kernels() -> Option<&'static GpuKernels> {
    GPU_KERNELS.as_ref()
}

/// Whether a GPU adapter and device could be acquired.
#[must_use]
pub fn is_available() -> bool {
    kernels().is_some()
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Copies each `(buffer, len)` into a staging buffer, submits `encoder` and
/// reads the `f32` contents back.
fn submit_and_read(
    ctx: &GpuContext,
    mut encoder: wgpu::CommandEncoder,
    sources: &[(&wgpu::Buffer, usize)],
) -> Result<Vec<Vec<f32>>, GpuError> {
    let staging: Vec<wgpu::Buffer> = sources
        .iter()
        .map(|&(src, len)| {
            let size = (len * size_of::<f32>()) as u64;
            let dst = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("staging"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            encoder.copy_buffer_to_buffer(src, 0, &dst, 0, size);
            dst
        })
        .collect();

    ctx.queue.submit(Some(encoder.finish()));

    let (tx, rx) = mpsc::channel();
    for buffer in &staging {
        let tx = tx.clone();
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
    }
    drop(tx);

    ctx.device.poll(wgpu::PollType::Wait)?;

    for _ in &staging {
        rx.recv().map_err(|_| GpuError::MapAborted)??;
    }

    let mut out = Vec::with_capacity(staging.len());
    for buffer in &staging {
        let view = buffer.slice(..).get_mapped_range();
        out.push(bytemuck::cast_slice::<u8, f32>(&view).to_vec());
        drop(view);
        buffer.unmap();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::{ApproxEquality, approx_eq, approx_within};
    use crate::ops::{ActType, SgdParams, cpu};
    use crate::tensors::Tensor;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn activation_matches_cpu() {
        if !is_available() {
            return;
        }
        let input = Tensor::random([3, 5, 7], &mut StdRng::seed_from_u64(1));
        for act in ActType::ALL {
            let gpu = wgpu_activation(act, &input).expect("gpu activation");
            let cpu = cpu::activation(act, &input);
            assert_eq!(gpu.shape, cpu.shape);
            for (g, c) in gpu.data.iter().zip(&cpu.data) {
                assert!(approx_eq(g, c) || (g - c).abs() < 1e-5, "{act}: {g} != {c}");
            }
        }
    }

    #[test]
    fn sgd_mom_update_matches_cpu() {
        if !is_available() {
            return;
        }
        let mut rng = StdRng::seed_from_u64(2);
        let grad = Tensor::random([130], &mut rng);
        let mut w_gpu = Tensor::random([130], &mut rng);
        let mut m_gpu = Tensor::random([130], &mut rng);
        let mut w_cpu = w_gpu.clone();
        let mut m_cpu = m_gpu.clone();
        let p = SgdParams {
            lr: 0.1,
            momentum: 0.9,
            wd: 0.01,
            rescale_grad: 1.5,
            clip_gradient: 0.5,
        };

        assert!(wgpu_sgd_mom_update(&mut w_gpu, &grad, &mut m_gpu, &p));
        cpu::sgd_mom_update(&mut w_cpu, &grad, &mut m_cpu, &p);

        // The shader computes in f32 whatever `TensorFloat` is.
        let tol = ApproxEquality::Partial;
        assert!(approx_within(&w_gpu.data[..], &w_cpu.data[..], tol));
        assert!(approx_within(&m_gpu.data[..], &m_cpu.data[..], tol));
    }

    #[test]
    fn empty_tensors_are_declined() {
        let empty = Tensor::zeros([0]);
        assert!(wgpu_activation(ActType::Relu, &empty).is_none());
    }
}
