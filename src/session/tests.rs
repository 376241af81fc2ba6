use super::*;
use crate::sdk::sim::{SimDevice, SimulatedService};
use crate::sdk::{ClientInfo, GraphicsApi, SDK_TYPE_ENGINE_PLUGIN};
use glam::{Quat, Vec3};

fn client() -> ClientInfo {
    ClientInfo {
        application_id: "t5-bridge-tests".into(),
        application_version: "0.0.1".into(),
        sdk_type: SDK_TYPE_ENGINE_PLUGIN,
    }
}

fn policy() -> SessionPolicy {
    SessionPolicy {
        display_name: "Bridge Tests".into(),
        ready_retry_limit: 10,
        ready_retry_delay: Duration::ZERO,
    }
}

fn setup(devices: Vec<SimDevice>) -> (Arc<SimulatedService>, DeviceSession) {
    let sim = Arc::new(SimulatedService::with_devices(client(), devices));
    let session = DeviceSession::new(0, sim.clone(), policy());
    (sim, session)
}

#[test]
fn test_claim_happy_path() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC").with_ipd(0.061)]);
    let mut cursor = RoundRobinCursor::new();

    let outcome = session.poll(&mut cursor, &[]);

    assert_eq!(outcome, PollOutcome::Claimed { id: "T5-ABC".into() });
    assert!(session.is_enabled());
    assert_eq!(session.phase(), SlotPhase::ExclusiveReady);
    assert_eq!(session.glasses_id().as_deref(), Some("T5-ABC"));
    assert!((session.ipd() - 0.061).abs() < 1e-6);
    assert!(session.is_version_compatible());
    assert_eq!(cursor.position(), 1);

    let calls = sim.calls();
    assert_eq!(calls.reserved, vec![("T5-ABC".to_string(), "Bridge Tests".to_string())]);
}

#[test]
fn test_second_poll_only_verifies() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::StillExclusive);
    assert_eq!(sim.calls().created.len(), 1);
    assert_eq!(cursor.position(), 1);
}

#[test]
fn test_slot_gated_by_visible_count() {
    let sim = Arc::new(SimulatedService::with_devices(client(), vec![SimDevice::new("T5-ABC")]));
    let second = DeviceSession::new(1, sim.clone(), policy());
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(second.poll(&mut cursor, &[]), PollOutcome::NoCandidate);
    assert!(!second.is_enabled());
    assert!(sim.calls().created.is_empty());
}

#[test]
fn test_version_mismatch_flags_incompatible() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.list = Some(SdkError::ServiceIncompatible));
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Incompatible);
    assert!(!session.is_version_compatible());
    assert!(!session.is_enabled());

    // A later successful listing clears the flag
    sim.inject(|f| f.list = None);
    session.poll(&mut cursor, &[]);
    assert!(session.is_version_compatible());
    assert!(session.is_enabled());
}

#[test]
fn test_incompatible_reservation_abandons_claim() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.reserve = Some(SdkError::ServiceIncompatible));
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Incompatible);
    assert_eq!(session.phase(), SlotPhase::Disconnected);
    assert!(!session.is_version_compatible());
    assert!(!session.is_enabled());

    let calls = sim.calls();
    assert_eq!(calls.created, vec!["T5-ABC".to_string()]);
    assert_eq!(calls.destroyed.len(), 1);
    assert!(calls.reserved.is_empty());
    assert_eq!(calls.ensure_ready, 0);
}

#[test]
fn test_transient_reservation_failure() {
    for err in [SdkError::NoService, SdkError::IoFailure] {
        let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
        sim.inject(|f| f.reserve = Some(err.clone()));
        let mut cursor = RoundRobinCursor::new();

        assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Transient);
        assert_eq!(session.phase(), SlotPhase::Disconnected);
        assert!(session.is_version_compatible());

        let calls = sim.calls();
        assert_eq!(calls.destroyed.len(), 1);
        assert_eq!(calls.ensure_ready, 0);

        // Next tick claims once the service answers
        sim.inject(|f| f.reserve = None);
        assert!(matches!(session.poll(&mut cursor, &[]), PollOutcome::Claimed { .. }));
    }
}

#[test]
fn test_no_service_is_silent_transient() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.list = Some(SdkError::NoService));
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Transient);
    assert!(session.is_version_compatible());
    assert_eq!(session.phase(), SlotPhase::Disconnected);
}

#[test]
fn test_ipd_incompatible_keeps_claim() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.ipd = Some(SdkError::ServiceIncompatible));
    let mut cursor = RoundRobinCursor::new();

    assert!(matches!(session.poll(&mut cursor, &[]), PollOutcome::Claimed { .. }));
    assert!(session.is_enabled());
    assert!(!session.is_version_compatible());
    assert!((session.ipd() - DEFAULT_IPD).abs() < 1e-6);
}

#[test]
fn test_ready_retries_are_bounded() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC").with_ready_after(50)]);
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::RetriesExhausted);

    let calls = sim.calls();
    assert_eq!(calls.ensure_ready, 10);
    assert_eq!(calls.released.len(), 1);
    assert_eq!(calls.destroyed.len(), 1);
    assert!(!session.is_enabled());
    assert_eq!(session.phase(), SlotPhase::Disconnected);
}

#[test]
fn test_ready_within_budget() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC").with_ready_after(3)]);
    let mut cursor = RoundRobinCursor::new();

    assert!(matches!(session.poll(&mut cursor, &[]), PollOutcome::Claimed { .. }));
    assert_eq!(sim.calls().ensure_ready, 4);
}

#[test]
fn test_non_retryable_ready_error_releases() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.ready = Some(SdkError::IoFailure));
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Failed);
    assert_eq!(sim.calls().ensure_ready, 1);
    assert_eq!(sim.calls().destroyed.len(), 1);
}

#[test]
fn test_reserve_failure_destroys_handle() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.reserve = Some(SdkError::Unavailable));
    let mut cursor = RoundRobinCursor::new();

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Failed);
    assert_eq!(sim.calls().destroyed.len(), 1);
    assert!(!session.is_enabled());
}

#[test]
fn test_two_slots_never_share_glasses() {
    let sim = Arc::new(SimulatedService::with_devices(client(), vec![SimDevice::new("T5-ABC")]));
    let first = DeviceSession::new(0, sim.clone(), policy());
    let other = DeviceSession::new(0, sim.clone(), policy());
    let mut cursor = RoundRobinCursor::new();

    assert!(matches!(first.poll(&mut cursor, &[]), PollOutcome::Claimed { .. }));
    // Even without the bound list, the service refuses a second reservation
    assert_eq!(other.poll(&mut cursor, &[]), PollOutcome::Failed);
    assert!(first.is_enabled());
    assert!(!other.is_enabled());
}

#[test]
fn test_lost_connection_releases() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);
    let glasses = session.exclusive_glasses().unwrap();

    sim.remove_device("T5-ABC");

    assert_eq!(session.poll(&mut cursor, &[]), PollOutcome::Lost);
    assert!(!session.is_enabled());
    assert_eq!(session.exclusive_glasses(), None);
    assert_eq!(sim.calls().destroyed, vec![glasses]);
}

#[test]
fn test_fetch_pose_requires_claim() {
    let (_sim, session) = setup(vec![SimDevice::new("T5-ABC").with_position(Vec3::new(0.1, 0.2, 0.3))]);
    assert!(!session.fetch_pose(PoseUsage::GlassesPresentation, 100.0).valid);

    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);
    let pose = session.fetch_pose(PoseUsage::GlassesPresentation, 100.0);
    assert!(pose.valid);
    assert!((pose.position - Vec3::new(20.0, 10.0, 30.0)).length() < 1e-4);
}

#[test]
fn test_late_update_only_when_exclusive() {
    let (_sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    let t = RigidTransform::new(Quat::IDENTITY, Vec3::X);

    session.set_late_update(t);
    assert_eq!(session.take_late_update(), None);

    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);
    session.set_late_update(t);
    assert_eq!(session.take_late_update(), Some(t));
    assert_eq!(session.take_late_update(), None);
}

#[test]
fn test_graphics_init_once_per_claim() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    let binding = GraphicsBinding {
        api: GraphicsApi::Gl,
        native_device: None,
    };
    let frame = FrameInfo {
        left_texture: Default::default(),
        right_texture: Default::default(),
        texture_width: 1216,
        texture_height: 768,
        is_srgb: false,
        is_upside_down: true,
        view_cone: Default::default(),
        rot_to_left_eye: Quat::IDENTITY,
        rot_to_right_eye: Quat::IDENTITY,
        pos_left_eye: Vec3::ZERO,
        pos_right_eye: Vec3::ZERO,
    };

    assert_eq!(session.submit_frame(&frame, &binding), Err(FrameError::NotExclusive));

    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);
    session.submit_frame(&frame, &binding).unwrap();
    session.submit_frame(&frame, &binding).unwrap();

    let calls = sim.calls();
    assert_eq!(calls.graphics_inits.len(), 1);
    assert_eq!(calls.frames.len(), 2);
}

#[test]
fn test_graphics_init_failure_skips_send() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    sim.inject(|f| f.graphics = Some(SdkError::Internal("no device".into())));
    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);

    let frame = FrameInfo {
        left_texture: Default::default(),
        right_texture: Default::default(),
        texture_width: 1,
        texture_height: 1,
        is_srgb: false,
        is_upside_down: true,
        view_cone: Default::default(),
        rot_to_left_eye: Quat::IDENTITY,
        rot_to_right_eye: Quat::IDENTITY,
        pos_left_eye: Vec3::ZERO,
        pos_right_eye: Vec3::ZERO,
    };
    let result = session.submit_frame(&frame, &GraphicsBinding::default());
    assert!(matches!(result, Err(FrameError::GraphicsInit(_))));
    assert!(sim.calls().frames.is_empty());
}

#[test]
fn test_shutdown_releases() {
    let (sim, session) = setup(vec![SimDevice::new("T5-ABC")]);
    let mut cursor = RoundRobinCursor::new();
    session.poll(&mut cursor, &[]);

    session.shutdown();

    assert!(!session.is_enabled());
    assert_eq!(sim.calls().released.len(), 1);
    // Glasses are free for the next claim
    assert!(matches!(session.poll(&mut cursor, &[]), PollOutcome::Claimed { .. }));
}
