//! Operator performance runs.
//!
//! `OPBENCH_PERF=1` times the long shape lists; `OPBENCH_VERBOSE=1` with
//! `RUST_LOG=debug` dumps the tensors of the bidirectional runs.

use briny_opbench::kwargs::{BWD_OP_NAME_NONE, Kwargs};
use briny_opbench::perf::{run_core_op_bidirectional, run_core_op_timing_test, run_fc_timing_test};
use briny_opbench::runner::{BACKWARD, FORWARD};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sgd_kwargs(clip_gradient: &str) -> Kwargs {
    Kwargs::from([("lr", "0.01"), ("clip_gradient", clip_gradient)])
}

fn sgd_mom_timing(is_gpu: bool) {
    for (heading, clip) in [("NEGATIVE CLIP GRADIENT", "-1"), ("POSITIVE CLIP GRADIENT", "1")] {
        println!("{heading}");
        let reports =
            run_core_op_timing_test(is_gpu, &sgd_kwargs(clip), "sgd_mom_update", BWD_OP_NAME_NONE)
                .unwrap();
        assert!(!reports.is_empty());
        for report in &reports {
            assert_eq!(report.get(FORWARD).unwrap().calls, 10);
            assert!(report.get(BACKWARD).is_none());
        }
    }
}

fn act_timing(is_gpu: bool) {
    println!("Activation with tanh");
    let reports = run_core_op_timing_test(
        is_gpu,
        &Kwargs::from([("act_type", "tanh")]),
        "Activation",
        BWD_OP_NAME_NONE,
    )
    .unwrap();
    let pu = if is_gpu { "GPU" } else { "CPU" };
    assert!(reports.iter().all(|r| r.label == format!("Activation Operator {pu}")));
}

fn fc_timing(is_gpu: bool) {
    println!("FullyConnected");
    let reports = run_fc_timing_test(
        is_gpu,
        &Kwargs::from([("no_bias", "true"), ("num_hidden", "250")]),
        "FullyConnected",
        BWD_OP_NAME_NONE,
    )
    .unwrap();
    for report in &reports {
        assert_eq!(report.shapes.len(), 2);
        assert_eq!(report.get(FORWARD).unwrap().calls, 10);
    }
}

#[test]
fn sgdmom_perf_execute_bidirectional() {
    init_logger();
    for (heading, clip) in [("NEGATIVE CLIP GRADIENT", "-1"), ("POSITIVE CLIP GRADIENT", "1")] {
        println!("{heading}");
        let op =
            run_core_op_bidirectional(false, &sgd_kwargs(clip), "sgd_mom_update", BWD_OP_NAME_NONE)
                .unwrap();
        assert!(!op.has_backward());
        assert_eq!(op.outputs()[0].shape.dims(), &[5, 5]);
        assert_eq!(op.outputs()[0], op.inputs()[0]);
    }
}

#[test]
fn act_perf_execute_bidirectional() {
    init_logger();
    let kwargs = Kwargs::from([("act_type", "tanh")]);
    let op = run_core_op_bidirectional(false, &kwargs, "Activation", "").unwrap();
    assert!(op.has_backward());
    assert_eq!(op.bwd_outputs()[0].shape.dims(), &[5, 5]);
}

#[test]
fn sgdmom_perf_timing_cpu() {
    init_logger();
    sgd_mom_timing(false);
}

#[test]
fn act_perf_timing_cpu() {
    init_logger();
    act_timing(false);
}

#[test]
fn fc_perf_timing_cpu() {
    init_logger();
    fc_timing(false);
}

#[cfg(feature = "wgpu")]
#[test]
fn sgdmom_perf_timing_gpu() {
    init_logger();
    sgd_mom_timing(true);
}

#[cfg(feature = "wgpu")]
#[test]
fn act_perf_timing_gpu() {
    init_logger();
    act_timing(true);
}

#[cfg(feature = "wgpu")]
#[test]
fn fc_perf_timing_gpu() {
    init_logger();
    fc_timing(true);
}
