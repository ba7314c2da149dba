use log::warn;
use wgpu::util::DeviceExt;

use super::{GpuError, GpuKernels, kernels, submit_and_read};
use crate::TensorFloat;
use crate::ops::ActType;
use crate::tensors::Tensor;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ActivationParams {
    act: u32,
    len: u32,
    _pad: [u32; 2],
}

/// Performs an element-wise activation on the GPU.
///
/// # Returns
///
/// - `Some(Tensor)` on success
/// - `None` for empty input, no usable GPU, or a failed dispatch
///
/// # Notes
///
/// - Uses f32 precision on GPU
#[must_use]
pub fn wgpu_activation(act: ActType, input: &Tensor<TensorFloat>) -> Option<Tensor<TensorFloat>> {
    if input.is_empty() {
        return None;
    }
    let kernels = kernels()?;

    #[allow(clippy::unnecessary_cast)]
    let data: Vec<f32> = input.data.iter().map(|&x| x as f32).collect();
    match run_activation_shader(kernels, act, &data) {
        Ok(output) => {
            #[allow(clippy::unnecessary_cast)]
            let output = output.into_iter().map(|y| y as TensorFloat).collect();
            Some(Tensor::new(input.shape.clone(), output))
        }
        Err(e) => {
            warn!("GPU activation `{act}` failed, using CPU: {e}");
            None
        }
    }
}

fn run_activation_shader(
    kernels: &GpuKernels,
    act: ActType,
    input: &[f32],
) -> Result<Vec<f32>, GpuError> {
    let ctx = &kernels.ctx;
    let workgroups = ctx.workgroups_for(input.len())?;
    let len = u32::try_from(input.len()).map_err(|_| GpuError::TooLarge(input.len()))?;

    let params = ActivationParams {
        act: act.code(),
        len,
        _pad: [0; 2],
    };
    let params_buf = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("activation_params"),
        contents: bytemuck::bytes_of(&params),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let input_buf = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("activation_input"),
        contents: bytemuck::cast_slice(input),
        usage: wgpu::BufferUsages::STORAGE,
    });
    let output_buf = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("activation_output"),
        size: (input.len() * size_of::<f32>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("activation_encoder"),
        });
    kernels
        .activation
        .dispatch(ctx, &mut encoder, &[&params_buf, &input_buf, &output_buf], workgroups);

    let mut out = submit_and_read(ctx, encoder, &[(&output_buf, input.len())])?;
    Ok(out.remove(0))
}
