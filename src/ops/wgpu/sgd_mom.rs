use log::warn;
use wgpu::util::DeviceExt;

use super::{GpuError, GpuKernels, kernels, submit_and_read};
use crate::TensorFloat;
use crate::ops::SgdParams;
use crate::tensors::Tensor;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SgdMomParams {
    lr: f32,
    momentum: f32,
    wd: f32,
    rescale_grad: f32,
    clip_gradient: f32,
    len: u32,
    _pad: [u32; 2],
}

/// Performs a fused momentum SGD step on the GPU, updating `weight` and `mom` in place.
///
/// # Returns
///
/// - `true` if the update ran on the GPU
/// - `false` if nothing was touched and the caller should use the CPU kernel
#[allow(clippy::unnecessary_cast)]
pub fn wgpu_sgd_mom_update(
    weight: &mut Tensor<TensorFloat>,
    grad: &Tensor<TensorFloat>,
    mom: &mut Tensor<TensorFloat>,
    params: &SgdParams,
) -> bool {
    if weight.is_empty() || weight.shape != grad.shape || weight.shape != mom.shape {
        return false;
    }
    let Some(kernels) = kernels() else {
        return false;
    };

    let to_f32 = |t: &Tensor<TensorFloat>| t.data.iter().map(|&x| x as f32).collect::<Vec<f32>>();
    let (w, g, m) = (to_f32(weight), to_f32(grad), to_f32(mom));

    match run_sgd_mom_shader(kernels, &w, &g, &m, params) {
        Ok((new_w, new_m)) => {
            for (dst, src) in weight.data.iter_mut().zip(new_w) {
                *dst = src as TensorFloat;
            }
            for (dst, src) in mom.data.iter_mut().zip(new_m) {
                *dst = src as TensorFloat;
            }
            true
        }
        Err(e) => {
            warn!("GPU sgd_mom_update failed, using CPU: {e}");
            false
        }
    }
}

#[allow(clippy::unnecessary_cast)]
fn run_sgd_mom_shader(
    kernels: &GpuKernels,
    weight: &[f32],
    grad: &[f32],
    mom: &[f32],
    p: &SgdParams,
) -> Result<(Vec<f32>, Vec<f32>), GpuError> {
    let ctx = &kernels.ctx;
    let n = weight.len();
    let workgroups = ctx.workgroups_for(n)?;

    let params = SgdMomParams {
        lr: p.lr as f32,
        momentum: p.momentum as f32,
        wd: p.wd as f32,
        rescale_grad: p.rescale_grad as f32,
        clip_gradient: p.clip_gradient as f32,
        len: u32::try_from(n).map_err(|_| GpuError::TooLarge(n))?,
        _pad: [0; 2],
    };

    let init = |label: &str, contents: &[u8], usage: wgpu::BufferUsages| {
        ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        })
    };
    let rw = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC;
    let params_buf = init(
        "sgd_mom_params",
        bytemuck::bytes_of(&params),
        wgpu::BufferUsages::UNIFORM,
    );
    let weight_buf = init("sgd_mom_weight", bytemuck::cast_slice(weight), rw);
    let grad_buf = init("sgd_mom_grad", bytemuck::cast_slice(grad), wgpu::BufferUsages::STORAGE);
    let mom_buf = init("sgd_mom_mom", bytemuck::cast_slice(mom), rw);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sgd_mom_encoder"),
        });
    kernels.sgd_mom.dispatch(
        ctx,
        &mut encoder,
        &[&params_buf, &weight_buf, &grad_buf, &mom_buf],
        workgroups,
    );

    let mut out = submit_and_read(ctx, encoder, &[(&weight_buf, n), (&mom_buf, n)])?;
    let new_mom = out.pop().unwrap_or_default();
    let new_weight = out.pop().unwrap_or_default();
    Ok((new_weight, new_mom))
}
