//! Service construction, initialization errors, cleanup and reset

mod common;

use std::sync::Arc;

use aria_audio::AudioBuffer;
use aria_core::{Accelerator, AriaError, CheckpointWriter, SimulatedAccelerator, EXPRESSION_DIM, GIB};
use aria_inference::DeformationModel;
use aria_runtime::{EngineConfig, HostAccelerator, RenderingService, SessionState};

use common::*;

fn config_for(path: &std::path::Path) -> EngineConfig {
    EngineConfig {
        model_path: path.to_path_buf(),
        ..test_config()
    }
}

#[tokio::test(start_paused = true)]
async fn initialize_from_checkpoint_and_render() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avatar.safetensors");
    write_checkpoint(&path, true, true);

    let device = device();
    let service = RenderingService::initialize(config_for(&path), device.clone()).unwrap();
    assert_eq!(service.state(), SessionState::Idle);
    assert!(service.is_loaded());
    assert_eq!(device.memory().used(), GAUSSIANS as u64 * 28);

    let frames = service.render_frames(silence(16_000)).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 30);
}

#[test]
fn missing_model_is_model_not_found() {
    let result = RenderingService::initialize(config_for("/no/such/model.safetensors".as_ref()), device());
    assert!(matches!(result, Err(AriaError::ModelNotFound { .. })));
}

#[test]
fn missing_config_file_is_model_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avatar.safetensors");
    write_checkpoint(&path, true, true);

    let config = EngineConfig {
        config_path: Some(dir.path().join("missing.yaml")),
        ..config_for(&path)
    };
    assert!(matches!(
        RenderingService::initialize(config, device()),
        Err(AriaError::ModelNotFound { .. })
    ));
}

#[test]
fn corrupt_checkpoint_is_model_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.safetensors");
    std::fs::write(&path, b"definitely not safetensors").unwrap();

    let result = RenderingService::initialize(config_for(&path), device());
    assert!(matches!(result, Err(AriaError::ModelLoad(_))));
}

#[test]
fn checkpoint_without_expression_network_is_model_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene_only.safetensors");
    write_checkpoint(&path, false, false);

    let result = RenderingService::initialize(config_for(&path), device());
    assert!(matches!(result, Err(AriaError::ModelLoad(_))));
}

#[test]
fn missing_deformation_falls_back_to_neutral() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_deformation.safetensors");
    write_checkpoint(&path, true, false);

    let service = RenderingService::initialize(config_for(&path), device()).unwrap();
    assert!(service.is_loaded());
}

#[test]
fn separate_expression_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let scene = dir.path().join("scene.safetensors");
    let nets = dir.path().join("nets.safetensors");
    write_checkpoint(&scene, false, false);
    write_checkpoint(&nets, true, true);

    let config = EngineConfig {
        expression_model_path: Some(nets.clone()),
        deformation_model_path: Some(nets),
        ..config_for(&scene)
    };
    assert!(RenderingService::initialize(config, device()).is_ok());
}

#[test]
fn accelerator_preflight() {
    let absent = RenderingService::with_components(test_config(), Arc::new(SimulatedAccelerator::absent()), components(1));
    assert!(matches!(absent, Err(AriaError::GpuNotFound(_))));

    let small = RenderingService::with_components(
        test_config(),
        Arc::new(SimulatedAccelerator::new("small", 2 * GIB)),
        components(1),
    );
    assert!(matches!(small, Err(AriaError::GpuMemory { .. })));
}

#[test]
fn scene_over_budget_is_rejected() {
    let footprint = GAUSSIANS as u64 * 28;
    let config = EngineConfig {
        min_gpu_memory_gb: 0.0,
        memory_safety_fraction: 0.5,
        ..test_config()
    };

    // budget == footprint: admitted
    let exact = RenderingService::with_components(
        config.clone(),
        Arc::new(SimulatedAccelerator::new("exact", footprint * 2)),
        components(1),
    );
    assert!(exact.is_ok());

    // budget == footprint - 1: rejected
    let short = RenderingService::with_components(
        config,
        Arc::new(SimulatedAccelerator::new("short", footprint * 2 - 2)),
        components(1),
    );
    assert!(matches!(short, Err(AriaError::GpuMemory { .. })));
}

#[test]
fn incompatible_deformation_is_model_load() {
    let mut parts = components(1);
    parts.deformation = DeformationModel::new(vec![0.0; 5 * 3 * EXPRESSION_DIM], vec![0.0; 5 * 3]).unwrap();

    let result = RenderingService::with_components(test_config(), device(), parts);
    assert!(matches!(result, Err(AriaError::ModelLoad(_))));
}

#[test]
fn invalid_render_config_is_rejected() {
    let mut config = test_config();
    config.render.near_plane = 10.0;
    config.render.far_plane = 1.0;
    let result = RenderingService::with_components(config, device(), components(1));
    assert!(matches!(result, Err(AriaError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn cleanup_then_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avatar.safetensors");
    write_checkpoint(&path, true, true);

    let device = device();
    let mut service = RenderingService::initialize(config_for(&path), device.clone()).unwrap();

    service.cleanup().unwrap();
    assert!(!service.is_loaded());
    assert_eq!(device.memory().used(), 0);
    assert!(device.release_count() >= 1);
    assert!(matches!(service.render_frames(silence(16_000)), Err(AriaError::Processing(_))));

    service.reset().unwrap();
    assert!(service.is_loaded());
    assert_eq!(service.state(), SessionState::Idle);
    let frames = service.render_frames(silence(16_000)).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 30);
}

#[tokio::test(start_paused = true)]
async fn reset_with_provided_components() {
    let mut service = RenderingService::with_components(test_config(), device(), components(1)).unwrap();
    service.reset().unwrap();
    let frames = service.render_frames(silence(3_200)).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 6);
}

#[test]
fn reset_failure_leaves_service_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("avatar.safetensors");
    write_checkpoint(&path, true, true);

    let mut service = RenderingService::initialize(config_for(&path), device()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(service.reset().is_err());
    assert_eq!(service.state(), SessionState::Failed);
    assert!(!service.is_loaded());
}

#[tokio::test(start_paused = true)]
async fn audio_at_other_sample_rate_is_resampled() {
    let service = RenderingService::with_components(test_config(), device(), components(1)).unwrap();
    let audio = AudioBuffer::silence(8_000, 8_000).unwrap();
    assert_eq!(service.total_frames(&audio), 30);

    let frames = service.render_frames(audio).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 30);
}

#[tokio::test(start_paused = true)]
async fn frame_count_uses_input_rate_before_resampling() {
    let service = RenderingService::with_components(test_config(), device(), components(1)).unwrap();

    // exactly one frame period at 48 kHz
    let audio = AudioBuffer::silence(1_600, 48_000).unwrap();
    assert_eq!(service.total_frames(&audio), 1);
    let frames = service.render_frames(audio).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 1);

    // 19 frame periods; the resampled length alone would give 18
    let audio = AudioBuffer::silence(30_400, 48_000).unwrap();
    assert_eq!(service.total_frames(&audio), 19);
    let frames = service.render_frames(audio).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 19);
}

#[tokio::test(start_paused = true)]
async fn reset_and_cleanup_refused_while_streaming() {
    let device = device();
    let mut service = RenderingService::with_components(test_config(), device.clone(), components(1)).unwrap();
    let scene_bytes = device.memory().used();

    let mut stream = service.render_frames(silence(16_000)).unwrap();
    assert!(stream.next().await.unwrap().is_ok());

    assert!(matches!(service.reset(), Err(AriaError::Processing(_))));
    assert!(matches!(service.cleanup(), Err(AriaError::Processing(_))));
    assert_eq!(service.state(), SessionState::Streaming);
    assert!(service.is_loaded());
    assert_eq!(device.memory().used(), scene_bytes);
    assert!(matches!(service.render_frames(silence(16_000)), Err(AriaError::Processing(_))));

    let mut rest = 0;
    while let Some(frame) = stream.next().await {
        frame.unwrap();
        rest += 1;
    }
    assert_eq!(rest, 29);
    assert_eq!(service.state(), SessionState::Idle);

    service.reset().unwrap();
    assert_eq!(device.memory().used(), scene_bytes);
    let frames = service.render_frames(silence(16_000)).unwrap().collect_frames().await.unwrap();
    assert_eq!(frames.len(), 30);
}

#[test]
fn host_accelerator_reports_system_memory() {
    let host = HostAccelerator::detect();
    if let Some(info) = host.info() {
        assert!(info.total_memory > 0);
    }
}

#[test]
fn checkpoint_with_bad_opacity_shape_is_model_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.safetensors");
    CheckpointWriter::new()
        .tensor("gaussians", &[2, 3], &[0.0; 6])
        .tensor("colors", &[2, 3], &[0.5; 6])
        .tensor("opacities", &[3], &[1.0; 3])
        .write(&path)
        .unwrap();

    let result = RenderingService::initialize(config_for(&path), device());
    assert!(matches!(result, Err(AriaError::ModelLoad(_))));
}
