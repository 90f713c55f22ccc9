pub mod integrator;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod smoother;
pub mod types;

pub use pipeline::{PipelineError, PipelineSettings, TiltPipeline};
pub use types::{Axis, AxisReading, Orientation};

use anyhow::Result;
use protocol::TiltAdvertisement;
use registry::{Admission, SensorRegistry};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Commands sent to the pipeline task.
enum TiltCommand {
    Reading(AxisReading),
    Sample(Axis, i8),
    Advertisement { address: String, payload: Vec<u8> },
    StartTicking(Duration),
    StopTicking,
    ResetSmoothing,
    Select(Option<String>),
    SelectNext,
    SelectPrevious,
    Selected(oneshot::Sender<Option<String>>),
    Shutdown,
}

/// Settings for [`TiltClient`].
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub pipeline: PipelineSettings,
    /// Sensors not heard from for this long are forgotten.
    pub sensor_timeout: Duration,
    /// How often stale sensors are pruned.
    pub prune_interval: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            sensor_timeout: Duration::from_secs(30),
            prune_interval: Duration::from_secs(1),
        }
    }
}

/// Handle to the tilt pipeline task.
///
/// The task is the only writer of pipeline state: samples and advertisements
/// are queued to it, the easing tick runs inside it, and each new orientation
/// is published over a watch channel so readers only ever see copies.
pub struct TiltClient {
    orientation_rx: watch::Receiver<Orientation>,
    command_tx: mpsc::UnboundedSender<TiltCommand>,
    task: tokio::task::JoinHandle<()>,
}

impl TiltClient {
    /// Build the pipeline and start its task. Ticking is off until [`start_ticking`](Self::start_ticking).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(settings: ClientSettings) -> Result<Self> {
        settings.pipeline.validate()?;
        if settings.prune_interval.is_zero() {
            anyhow::bail!("Sensor prune interval must be non-zero");
        }
        let pipeline = TiltPipeline::new(&settings.pipeline)?;

        let (orientation_tx, orientation_rx) = watch::channel(pipeline.orientation());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(pipeline_loop(pipeline, orientation_tx, command_rx, settings));
        tracing::info!(
            capacity = settings.pipeline.smoother_capacity,
            base_delta = settings.pipeline.base_delta,
            acceleration = settings.pipeline.acceleration,
            "Tilt pipeline started"
        );

        Ok(Self {
            orientation_rx,
            command_tx,
            task,
        })
    }

    /// Queue one raw sample for `axis`. Values outside `i8` are rejected here.
    pub fn submit_sample(&self, axis: Axis, value: i32) -> Result<(), PipelineError> {
        let sample = i8::try_from(value).map_err(|_| PipelineError::InvalidSample { axis, value })?;
        self.send(TiltCommand::Sample(axis, sample));
        Ok(())
    }

    /// Queue a full three-axis reading.
    pub fn submit_reading(&self, reading: AxisReading) {
        self.send(TiltCommand::Reading(reading));
    }

    /// Queue a raw advertisement from `address`. Only the selected sensor's
    /// tilt records reach the pipeline.
    pub fn submit_advertisement(&self, address: impl Into<String>, payload: Vec<u8>) {
        self.send(TiltCommand::Advertisement {
            address: address.into(),
            payload,
        });
    }

    /// Latest eased orientation (non-blocking).
    pub fn orientation(&self) -> Orientation {
        *self.orientation_rx.borrow()
    }

    /// Receiver that is notified on every tick.
    pub fn subscribe(&self) -> watch::Receiver<Orientation> {
        self.orientation_rx.clone()
    }

    /// Run the easing tick every `period`, replacing any previous schedule.
    pub fn start_ticking(&self, period: Duration) {
        self.send(TiltCommand::StartTicking(period));
    }

    pub fn stop_ticking(&self) {
        self.send(TiltCommand::StopTicking);
    }

    /// Clear the moving-average history on all axes.
    pub fn reset_smoothing(&self) {
        self.send(TiltCommand::ResetSmoothing);
    }

    /// Feed from the sensor at `address`, or from nobody with `None`. With no
    /// selection the next sensor to advertise is picked up automatically.
    /// Unknown addresses are ignored.
    pub fn select_sensor(&self, address: Option<&str>) {
        self.send(TiltCommand::Select(address.map(str::to_string)));
    }

    pub fn select_next_sensor(&self) {
        self.send(TiltCommand::SelectNext);
    }

    pub fn select_previous_sensor(&self) {
        self.send(TiltCommand::SelectPrevious);
    }

    /// Address of the sensor currently feeding the pipeline.
    pub async fn selected_sensor(&self) -> Result<Option<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(TiltCommand::Selected(reply_tx))
            .map_err(|_| anyhow::anyhow!("Tilt pipeline task has stopped"))?;
        Ok(reply_rx.await?)
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.send(TiltCommand::Shutdown);
        self.task.await?;
        Ok(())
    }

    fn send(&self, command: TiltCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!("Tilt pipeline task has stopped; command dropped");
        }
    }
}

/// Background task: apply queued input, tick on schedule, prune stale sensors.
async fn pipeline_loop(
    mut pipeline: TiltPipeline,
    orientation_tx: watch::Sender<Orientation>,
    mut command_rx: mpsc::UnboundedReceiver<TiltCommand>,
    settings: ClientSettings,
) {
    let mut registry = SensorRegistry::new();
    let mut ticker: Option<Interval> = None;
    let mut pruner = delayed_interval(settings.prune_interval, MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    TiltCommand::Reading(reading) => {
                        pipeline.submit_reading(reading);
                    }
                    TiltCommand::Sample(axis, sample) => {
                        if let Err(e) = pipeline.submit_sample(axis, i32::from(sample)) {
                            tracing::warn!(?e, "Rejected sample");
                        }
                    }
                    TiltCommand::Advertisement { address, payload } => {
                        handle_advertisement(&mut pipeline, &mut registry, &address, &payload);
                    }
                    TiltCommand::StartTicking(period) if period.is_zero() => {
                        tracing::warn!("Ignoring zero tick period");
                    }
                    TiltCommand::StartTicking(period) => {
                        tracing::info!(period_ms = period.as_millis() as u64, "Ticking started");
                        ticker = Some(delayed_interval(period, MissedTickBehavior::Burst));
                    }
                    TiltCommand::StopTicking => {
                        tracing::info!(ticks = pipeline.ticks(), "Ticking stopped");
                        ticker = None;
                    }
                    TiltCommand::ResetSmoothing => pipeline.reset_smoothing(),
                    TiltCommand::Select(address) => {
                        change_selection(&mut pipeline, &mut registry, |registry| {
                            if !registry.select(address.as_deref()) {
                                tracing::warn!(?address, "Cannot select unknown sensor");
                            }
                        });
                    }
                    TiltCommand::SelectNext => {
                        change_selection(&mut pipeline, &mut registry, |registry| {
                            registry.select_next();
                        });
                    }
                    TiltCommand::SelectPrevious => {
                        change_selection(&mut pipeline, &mut registry, |registry| {
                            registry.select_previous();
                        });
                    }
                    TiltCommand::Selected(reply) => {
                        let _ = reply.send(registry.selected().map(str::to_string));
                    }
                    TiltCommand::Shutdown => break,
                }
            }
            _ = next_tick(&mut ticker) => {
                let orientation = pipeline.tick();
                let _ = orientation_tx.send(orientation);
                if pipeline.ticks() % 600 == 0 {
                    tracing::debug!(ticks = pipeline.ticks(), tilt = orientation.tilt, "Tilt heartbeat");
                }
            }
            _ = pruner.tick() => {
                let removed = registry.prune(Instant::now().into_std(), settings.sensor_timeout);
                if removed > 0 {
                    tracing::debug!(removed, remaining = registry.sensors().len(), "Pruned stale sensors");
                }
            }
        }
    }

    tracing::info!(ticks = pipeline.ticks(), "Tilt pipeline stopped");
}

fn handle_advertisement(
    pipeline: &mut TiltPipeline,
    registry: &mut SensorRegistry,
    address: &str,
    payload: &[u8],
) {
    let advertisement = match TiltAdvertisement::decode(payload) {
        Ok(ad) => ad,
        Err(e) => {
            tracing::trace!(?e, %address, "Skipping non-tilt advertisement");
            return;
        }
    };

    match registry.observe(address, Instant::now().into_std()) {
        Admission::Feed => {
            let target = pipeline.submit_reading(advertisement.reading);
            tracing::trace!(%address, counter = ?advertisement.counter, x = target.x, y = target.y, z = target.z, "Tilt reading");
        }
        // Readings from the previously selected sensor must not blend into this one.
        Admission::Selected => pipeline.reset_smoothing(),
        Admission::Ignore => {}
    }
}

/// Apply a selection change, restarting smoothing if a different sensor is now selected.
fn change_selection(
    pipeline: &mut TiltPipeline,
    registry: &mut SensorRegistry,
    change: impl FnOnce(&mut SensorRegistry),
) {
    let before = registry.selected().map(str::to_string);
    change(registry);
    let after = registry.selected();
    if before.as_deref() != after {
        tracing::info!(from = ?before, to = ?after, "Tilt sensor selection changed");
        pipeline.reset_smoothing();
    }
}

/// Interval whose first tick is one period from now.
fn delayed_interval(period: Duration, behavior: MissedTickBehavior) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(behavior);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
