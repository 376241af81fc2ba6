//! Simulation and presentation loops
//!
//! Each context runs on its own blocking thread at the configured rate. The
//! simulation thread drives discovery, pose capture and wand decoding; decoded
//! [`InputEvent`]s are forwarded to async listeners through an unbounded
//! channel. The presentation thread builds and submits one frame per enabled
//! slot from the latest snapshot.

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, trace, warn};

use crate::config::AppConfig;
use crate::frame::{EyeTargets, PresentationContext};
use crate::input::{HapticFeedback, InputDecoder, InputEvent};
use crate::pool::{DevicePool, SimulationContext, SlotStatus};
use crate::sdk::{HardwareService, TextureHandle};

/// Callback invoked for every decoded input event
pub type EventCallback = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// Hook run at the start of every simulation step with the elapsed seconds
pub type StepHook = Box<dyn FnMut(f64) + Send>;

enum Control {
    Reconfigure(Arc<AppConfig>),
    Shutdown,
}

/// Running simulation and presentation threads
pub struct Runtime {
    pool: Arc<DevicePool>,
    input: Arc<Mutex<InputDecoder>>,
    listeners: Arc<RwLock<Vec<EventCallback>>>,
    controls: Vec<Sender<Control>>,
    threads: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Build the pool and both contexts, then start the loops
    ///
    /// # Arguments
    /// * `config` - Application configuration
    /// * `service` - Hardware service shared by every slot
    /// * `on_step` - Optional hook run before each simulation step
    ///
    /// # Returns
    /// Running runtime; call [`Runtime::shutdown`] to stop it
    pub async fn start(
        config: &AppConfig,
        service: Arc<dyn HardwareService>,
        on_step: Option<StepHook>,
    ) -> Result<Self> {
        let pool = Arc::new(DevicePool::from_config(service, config));
        let input = Arc::new(Mutex::new(InputDecoder::new(pool.clone(), config.input.clone())));
        let listeners = Arc::new(RwLock::new(Vec::<EventCallback>::new()));

        let (handoff_tx, handoff_rx) = channel::unbounded();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<InputEvent>();

        let simulation = SimulationLoop {
            context: SimulationContext::new(pool.clone(), handoff_tx),
            input: input.clone(),
            events: event_tx,
            on_step,
            world_to_meters: config.display.world_to_meters,
            period: period_from_hz(config.runtime.simulation_hz),
        };
        let presentation = PresentationLoop {
            context: PresentationContext::from_config(pool.clone(), handoff_rx, config),
            srgb: config.display.srgb,
            period: period_from_hz(config.runtime.presentation_hz),
        };

        let (sim_ctl_tx, sim_ctl_rx) = channel::unbounded();
        let (present_ctl_tx, present_ctl_rx) = channel::unbounded();

        let sim_thread = std::thread::Builder::new()
            .name("t5-simulation".into())
            .spawn(move || simulation.run(sim_ctl_rx))
            .context("Failed to spawn simulation thread")?;
        let present_thread = std::thread::Builder::new()
            .name("t5-presentation".into())
            .spawn(move || presentation.run(present_ctl_rx))
            .context("Failed to spawn presentation thread")?;

        // Forward events from the simulation thread to async listeners
        let listeners_clone = listeners.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let listeners = listeners_clone.read().await;
                for callback in listeners.iter() {
                    callback(event.clone());
                }
            }
        });

        info!(
            "Runtime started (simulation {:.0} Hz, presentation {:.0} Hz)",
            config.runtime.simulation_hz, config.runtime.presentation_hz
        );

        Ok(Self {
            pool,
            input,
            listeners,
            controls: vec![sim_ctl_tx, present_ctl_tx],
            threads: vec![sim_thread, present_thread],
        })
    }

    /// Subscribe to decoded input events
    pub async fn subscribe(&self, callback: EventCallback) {
        let mut listeners = self.listeners.write().await;
        listeners.push(callback);
    }

    pub fn pool(&self) -> &Arc<DevicePool> {
        &self.pool
    }

    pub fn status(&self) -> Vec<SlotStatus> {
        self.pool.status()
    }

    pub fn set_spectated_player(&self, slot: usize) -> bool {
        self.pool.set_spectated_player(slot)
    }

    pub fn set_haptic_feedback(&self, slot: usize, hand: usize, feedback: HapticFeedback) -> bool {
        self.input.lock().set_haptic_feedback(slot, hand, feedback)
    }

    /// Apply a reloaded configuration to the running loops
    ///
    /// Input tuning, poll interval, FOV, render layout and loop rates take
    /// effect on the next step. Simulator devices and client info are fixed
    /// at startup.
    pub fn apply_config(&self, config: &AppConfig) {
        self.pool.set_poll_interval(config.session.poll_interval_secs);
        self.input.lock().set_tuning(config.input.clone());

        let shared = Arc::new(config.clone());
        for control in &self.controls {
            if control.send(Control::Reconfigure(shared.clone())).is_err() {
                warn!("Runtime loop already stopped, config not applied");
            }
        }
        info!("Runtime configuration applied");
    }

    /// Stop both loops and release every claimed device
    pub fn shutdown(mut self) {
        for control in self.controls.drain(..) {
            let _ = control.send(Control::Shutdown);
        }
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                warn!("Runtime thread panicked during shutdown");
            }
        }
        self.pool.shutdown();
        info!("Runtime stopped");
    }
}

fn period_from_hz(hz: f64) -> Duration {
    if hz.is_finite() && hz > 0.0 {
        Duration::from_secs_f64(1.0 / hz)
    } else {
        Duration::from_secs_f64(1.0 / 60.0)
    }
}

/// Wait out the rest of the step period while listening for control messages
///
/// # Returns
/// `false` once the loop should stop
fn wait_for_next_step(
    control: &Receiver<Control>,
    deadline: Instant,
    mut reconfigure: impl FnMut(&AppConfig),
) -> bool {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match control.recv_timeout(remaining) {
            Ok(Control::Reconfigure(config)) => reconfigure(&config),
            Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => return false,
            Err(RecvTimeoutError::Timeout) => return true,
        }
    }
}

struct SimulationLoop {
    context: SimulationContext,
    input: Arc<Mutex<InputDecoder>>,
    events: mpsc::UnboundedSender<InputEvent>,
    on_step: Option<StepHook>,
    world_to_meters: f32,
    period: Duration,
}

impl SimulationLoop {
    fn run(mut self, control: Receiver<Control>) {
        let started = Instant::now();
        let mut next = started;

        loop {
            let now = started.elapsed().as_secs_f64();
            self.step(now);

            next += self.period;
            if next < Instant::now() {
                trace!("Simulation step overran its period");
                next = Instant::now();
            }

            let mut updated = None;
            let running = wait_for_next_step(&control, next, |config| {
                updated = Some((config.display.world_to_meters, period_from_hz(config.runtime.simulation_hz)));
            });
            if let Some((world_to_meters, period)) = updated {
                self.world_to_meters = world_to_meters;
                self.period = period;
            }
            if !running {
                break;
            }
        }

        debug!("Simulation loop stopped after {} frames", self.context.frame());
    }

    fn step(&mut self, now: f64) {
        if let Some(hook) = self.on_step.as_mut() {
            hook(now);
        }

        self.context.begin_step(now, Some(self.world_to_meters));

        let events = self.input.lock().poll();
        for event in events {
            if self.events.send(event).is_err() {
                trace!("No input listener running, event dropped");
            }
        }
    }
}

struct PresentationLoop {
    context: PresentationContext,
    srgb: bool,
    period: Duration,
}

impl PresentationLoop {
    fn run(mut self, control: Receiver<Control>) {
        let mut next = Instant::now();
        let mut submitted = 0usize;

        loop {
            submitted += self.step();

            next += self.period;
            if next < Instant::now() {
                next = Instant::now();
            }

            let mut updated = None;
            let running = wait_for_next_step(&control, next, |config| updated = Some(config.clone()));
            if let Some(config) = updated {
                self.context.apply_display(&config.display);
                self.srgb = config.display.srgb;
                self.period = period_from_hz(config.runtime.presentation_hz);
            }
            if !running {
                break;
            }
        }

        debug!("Presentation loop stopped after {} submitted frames", submitted);
    }

    fn step(&mut self) -> usize {
        self.context.begin_step();

        let layout = self.context.layout();
        for slot in self.context.enabled_slots() {
            let base = (slot as u64) * 2;
            self.context.set_eye_targets(
                slot,
                EyeTargets {
                    left: TextureHandle(base + 1),
                    right: TextureHandle(base + 2),
                    width: layout.eye_width,
                    height: layout.eye_height,
                    srgb: self.srgb,
                },
            );
        }

        self.context.submit_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimDeviceConfig;
    use crate::sdk::sim::SimulatedService;
    use crate::sdk::{WandHandle, WandStreamEvent};
    use crate::session::SlotPhase;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.session.ready_retry_delay_ms = 0;
        config.runtime.simulation_hz = 200.0;
        config.runtime.presentation_hz = 200.0;
        config.simulator.devices = vec![SimDeviceConfig {
            id: "T5-RT".into(),
            ipd: 0.062,
            ready_after: 0,
            wands: 1,
            position: None,
        }];
        config
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_period_from_hz() {
        assert_eq!(period_from_hz(50.0), Duration::from_millis(20));
        assert_eq!(period_from_hz(0.0), period_from_hz(60.0));
        assert_eq!(period_from_hz(f64::NAN), period_from_hz(60.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runtime_claims_presents_and_forwards_input() {
        let config = test_config();
        let sim = Arc::new(SimulatedService::with_devices(
            config.application.client_info(),
            config.simulator.to_devices(),
        ));
        let runtime = Runtime::start(&config, sim.clone(), None).await.unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        runtime
            .subscribe(Arc::new(move |event: InputEvent| sink.lock().push(event)))
            .await;

        assert!(wait_until(|| runtime.status()[0].phase == SlotPhase::ExclusiveReady).await);
        assert!(wait_until(|| !sim.calls().frames.is_empty()).await);

        sim.push_wand_event("T5-RT", WandStreamEvent::Connect { wand: WandHandle(1) });
        assert!(
            wait_until(|| received
                .lock()
                .iter()
                .any(|e| matches!(e, InputEvent::Connection { connected: true, .. })))
            .await
        );

        assert!(runtime.set_haptic_feedback(0, 0, HapticFeedback::new(0.5, 0.2)));
        assert_eq!(sim.calls().impulses.len(), 1);

        let pool = runtime.pool().clone();
        runtime.shutdown();

        assert_eq!(pool.status()[0].phase, SlotPhase::Disconnected);
        let calls = sim.calls();
        assert_eq!(calls.released.len(), 1);
        assert_eq!(calls.destroyed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_apply_config_reaches_loops() {
        let config = test_config();
        let sim = Arc::new(SimulatedService::with_devices(
            config.application.client_info(),
            config.simulator.to_devices(),
        ));
        let runtime = Runtime::start(&config, sim.clone(), None).await.unwrap();
        assert!(wait_until(|| runtime.status()[0].phase == SlotPhase::ExclusiveReady).await);

        let mut updated = config.clone();
        updated.input.stick_deadzone = 0.4;
        updated.display.fov_degrees = 90.0;
        runtime.apply_config(&updated);

        assert_eq!(runtime.input.lock().tuning().stick_deadzone, 0.4);
        assert!(runtime.set_spectated_player(0));
        assert!(!runtime.set_spectated_player(3));

        // 90° FOV gives a view cone two units wide
        let seen = sim.calls().frames.len();
        assert!(
            wait_until(|| {
                let calls = sim.calls();
                calls.frames.len() > seen + 2
                    && calls.frames.last().is_some_and(|(_, f)| (f.view_cone.width - 2.0).abs() < 1e-3)
            })
            .await
        );

        runtime.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_step_hook_runs() {
        let config = test_config();
        let sim = Arc::new(SimulatedService::with_devices(
            config.application.client_info(),
            config.simulator.to_devices(),
        ));
        let steps = Arc::new(Mutex::new(0u32));
        let counter = steps.clone();
        let hook: StepHook = Box::new(move |_: f64| *counter.lock() += 1);

        let runtime = Runtime::start(&config, sim, Some(hook)).await.unwrap();
        assert!(wait_until(|| *steps.lock() >= 3).await);
        runtime.shutdown();
    }
}
