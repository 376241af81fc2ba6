use super::*;
use crate::pool::SimulationContext;
use crate::sdk::sim::{SimDevice, SimulatedService};
use crate::sdk::{ClientInfo, GraphicsApi, SdkError, TextureHandle, SDK_TYPE_ENGINE_PLUGIN};
use crate::session::SessionPolicy;
use glam::Quat;
use std::time::Duration;

struct Rig {
    sim: Arc<SimulatedService>,
    pool: Arc<DevicePool>,
    simulation: SimulationContext,
    presentation: PresentationContext,
}

fn rig(devices: Vec<SimDevice>, display: DisplayConfig) -> Rig {
    let sim = Arc::new(SimulatedService::with_devices(
        ClientInfo {
            application_id: "t5-bridge-tests".into(),
            application_version: "0.0.1".into(),
            sdk_type: SDK_TYPE_ENGINE_PLUGIN,
        },
        devices,
    ));
    let policy = SessionPolicy {
        display_name: "Frame Tests".into(),
        ready_retry_limit: 10,
        ready_retry_delay: Duration::ZERO,
    };
    let pool = Arc::new(DevicePool::new(sim.clone(), policy, 1.0));
    let (tx, rx) = crossbeam::channel::unbounded();
    let graphics = GraphicsBinding {
        api: GraphicsApi::D3d11,
        native_device: None,
    };
    Rig {
        simulation: SimulationContext::new(pool.clone(), tx),
        presentation: PresentationContext::new(pool.clone(), rx, &display, graphics),
        sim,
        pool,
    }
}

fn targets() -> EyeTargets {
    EyeTargets {
        left: TextureHandle(1),
        right: TextureHandle(2),
        width: 1216,
        height: 768,
        srgb: false,
    }
}

#[test]
fn test_snapshot_reaches_presentation() {
    let mut rig = rig(vec![SimDevice::new("T5-A")], DisplayConfig::default());

    assert!(!rig.presentation.begin_step());
    assert!(rig.presentation.glasses_transform(0).is_none());

    rig.simulation.begin_step(0.0, Some(100.0));
    rig.simulation.begin_step(0.016, Some(80.0));

    assert!(rig.presentation.begin_step());
    assert_eq!(rig.presentation.frame(), 2);
    assert_eq!(rig.presentation.world().world_to_meters, 80.0);
    assert!(rig.presentation.glasses_transform(0).is_some());
    assert!(rig.presentation.glasses_transform(1).is_none());

    // Nothing new: previous transforms stay in place
    assert!(!rig.presentation.begin_step());
    assert!(rig.presentation.glasses_transform(0).is_some());
}

#[test]
fn test_late_update_overrides_snapshot() {
    let mut rig = rig(vec![SimDevice::new("T5-A")], DisplayConfig::default());
    rig.simulation.begin_step(0.0, None);

    let corrected = RigidTransform::new(Quat::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
    assert!(rig.pool.apply_late_update(0, corrected));

    rig.presentation.begin_step();
    assert_eq!(rig.presentation.glasses_transform(0), Some(corrected));
}

#[test]
fn test_submit_frames_once_per_enabled_slot() {
    let mut rig = rig(
        vec![SimDevice::new("T5-A"), SimDevice::new("T5-B")],
        DisplayConfig::default(),
    );
    rig.simulation.begin_step(0.0, None);
    rig.presentation.begin_step();

    // Slot without targets is skipped
    rig.presentation.set_eye_targets(0, targets());
    assert_eq!(rig.presentation.submit_frames(), 1);

    rig.presentation.set_eye_targets(1, targets());
    assert_eq!(rig.presentation.submit_frames(), 2);

    let calls = rig.sim.calls();
    assert_eq!(calls.frames.len(), 3);
    assert_eq!(calls.graphics_inits.len(), 2);
    assert!(calls.graphics_inits.iter().all(|(_, api)| *api == GraphicsApi::D3d11));
}

#[test]
fn test_graphics_failure_retried_next_tick() {
    let mut rig = rig(vec![SimDevice::new("T5-A")], DisplayConfig::default());
    rig.simulation.begin_step(0.0, None);
    rig.presentation.begin_step();
    rig.presentation.set_eye_targets(0, targets());

    rig.sim.inject(|f| f.graphics = Some(SdkError::Internal("device lost".into())));
    assert_eq!(rig.presentation.submit_frames(), 0);
    assert_eq!(rig.presentation.submit_frames(), 0);

    rig.sim.inject(|f| f.graphics = None);
    assert_eq!(rig.presentation.submit_frames(), 1);
    assert_eq!(rig.sim.calls().graphics_inits.len(), 3);
}

#[test]
fn test_fov_overrides() {
    let display = DisplayConfig {
        player_fov: vec![70.0, 55.0],
        ..DisplayConfig::default()
    };
    let mut rig = rig(vec![], display);

    assert_eq!(rig.presentation.fov(1), Some(55.0));
    assert_eq!(rig.presentation.fov(2), Some(70.0));

    assert!(rig.presentation.override_fov(3, 90.0));
    assert!(!rig.presentation.override_fov(3, 0.0));
    assert!(!rig.presentation.override_fov(9, 60.0));
    assert_eq!(rig.presentation.fov(3), Some(90.0));

    let proj = rig.presentation.stereo_projection(3);
    assert!((proj.x_axis.x - 1.0).abs() < 1e-5);
}

#[test]
fn test_view_rects_and_eye_offsets() {
    let rig = rig(vec![], DisplayConfig::default());
    let rect = rig.presentation.view_rect(1, Eye::Left);
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 768, 1216, 768));

    let offset = rig.presentation.relative_eye_offset(0, Eye::Right);
    assert!((offset.y - 0.5 * DEFAULT_IPD * 100.0).abs() < 1e-5);
}

#[test]
fn test_refetch_uses_live_pose() {
    let display = DisplayConfig {
        refetch_presentation_pose: true,
        ..DisplayConfig::default()
    };
    let mut rig = rig(vec![SimDevice::new("T5-A")], display);
    rig.simulation.begin_step(0.0, None);
    rig.presentation.begin_step();
    let before = rig.presentation.glasses_transform(0).unwrap();

    rig.sim.set_pose(
        "T5-A",
        crate::sdk::GlassesPose {
            rot_to_glasses: Quat::IDENTITY,
            pos_glasses: Vec3::new(0.0, 0.0, 1.0),
            gameboard: crate::sdk::GameboardKind::Xe,
        },
    );
    rig.presentation.begin_step();
    let after = rig.presentation.glasses_transform(0).unwrap();

    assert_ne!(before.translation, after.translation);
    assert!((after.translation - Vec3::new(0.0, 0.0, 100.0)).length() < 1e-4);
}
