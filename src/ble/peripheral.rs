//! Peripheral coordinator.
//!
//! Owns the whole emulator lifecycle: service registration and advertising,
//! the notification scheduler, the simulation engine and its inputs, the
//! control-point machine, rolling revolution counters, and the backpressure
//! queue toward the transport. All mutation happens on the caller's thread;
//! observers receive immutable snapshots over a channel.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use uuid::Uuid;

use crate::ble::codec::{
    self, CrankRevolutionData, WheelRevolutionData,
};
use crate::ble::control_point::{ControlPoint, ControlState, OpCode, ResultCode};
use crate::ble::scheduler::{NotificationScheduler, SchedulerDelegate};
use crate::ble::transport::{
    AdvertisingData, CharacteristicDef, CharacteristicProperties, ServiceDef, Transport,
    TransportEvent, TransportState,
};
use crate::ble::uuids::*;
use crate::config::{CadenceMode, EmulatorConfig, FieldToggles, ServiceToggles};
use crate::events::{
    BroadcastState, EmulatorEvent, EmulatorUpdate, EventCategory, EventLog, EventSeverity,
    LiveStats,
};
use crate::metrics::{MetricsTracker, SessionMetrics};
use crate::sim::{SimulationEngine, SimulationInput};

/// Fixed wheel speed backing the CPS wheel-revolution stream, m/s.
const CPS_WHEEL_SPEED_MPS: f64 = 5.0;
/// Minimum interval between published stats snapshots while idle.
const STATS_PUBLISH_PERIOD: Duration = Duration::from_secs(1);

/// Wrapping revolution counters behind the CPS measurement.
///
/// Fractional revolutions accrue tick by tick; the wire counters and their
/// event timestamps advance only when a whole revolution has accumulated, so
/// a central dividing deltas sees real cadence and wheel speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingCounters {
    crank_revs: u16,
    crank_event_time_1024: u16,
    crank_accum: f64,
    wheel_revs: u32,
    wheel_event_time_2048: u16,
    wheel_accum: f64,
}

impl RollingCounters {
    /// Advance by one tick of length `dt_s` ending at `elapsed_s` since the
    /// coordinator started.
    pub fn advance(
        &mut self,
        dt_s: f64,
        cadence_rpm: f64,
        wheel_circumference_m: f64,
        elapsed_s: f64,
    ) {
        self.crank_accum += dt_s * cadence_rpm.max(0.0) / 60.0;
        if self.crank_accum >= 1.0 {
            let revs = self.crank_accum.round();
            self.crank_revs = self.crank_revs.wrapping_add(revs as u16);
            self.crank_accum -= revs;
            self.crank_event_time_1024 = (elapsed_s * 1024.0).floor() as u64 as u16;
        }

        let wheel_rate = CPS_WHEEL_SPEED_MPS / wheel_circumference_m.max(0.001);
        self.wheel_accum += dt_s * wheel_rate;
        if self.wheel_accum >= 1.0 {
            let revs = self.wheel_accum.round();
            self.wheel_revs = self.wheel_revs.wrapping_add(revs as u32);
            self.wheel_accum -= revs;
            self.wheel_event_time_2048 = (elapsed_s * 2048.0).floor() as u64 as u16;
        }
    }

    /// Current crank data for the wire.
    pub fn crank(&self) -> CrankRevolutionData {
        CrankRevolutionData {
            cumulative_revs: self.crank_revs,
            last_event_time_1024: self.crank_event_time_1024,
        }
    }

    /// Current wheel data for the wire.
    pub fn wheel(&self) -> WheelRevolutionData {
        WheelRevolutionData {
            cumulative_revs: self.wheel_revs,
            last_event_time_2048: self.wheel_event_time_2048,
        }
    }
}

/// The coordinator. Generic over the transport so tests can script one.
pub struct PeripheralCoordinator<T: Transport> {
    transport: T,
    transport_state: TransportState,
    config: EmulatorConfig,
    control_point: ControlPoint,
    control: ControlState,
    engine: SimulationEngine,
    input: SimulationInput,
    scheduler: NotificationScheduler,
    counters: RollingCounters,
    metrics: MetricsTracker,
    pending_updates: VecDeque<(Uuid, Vec<u8>)>,
    /// Delayed status notifications: (due, payload).
    pending_statuses: Vec<(Instant, Vec<u8>)>,
    /// Start request received while the transport was not ready.
    pending_broadcast: bool,
    /// Services registered but not yet confirmed by the transport.
    registering: HashSet<Uuid>,
    state: BroadcastState,
    is_advertising: bool,
    subscriber_count: usize,
    last_error: Option<String>,
    event_log: EventLog,
    update_tx: Option<Sender<EmulatorUpdate>>,
    started_at: Instant,
    last_engine_tick: Option<Instant>,
    last_stats_publish: Option<Instant>,
}

impl<T: Transport> PeripheralCoordinator<T> {
    /// Build a coordinator over a transport with the given configuration.
    pub fn new(transport: T, config: EmulatorConfig, seed: u64) -> Self {
        let engine = SimulationEngine::new(
            config.rider,
            crate::sim::Gearset::default(),
            seed,
        );
        let input = SimulationInput {
            target_power_w: 250,
            manual_cadence_rpm: match config.cadence_mode {
                CadenceMode::Manual => Some(config.manual_cadence_rpm),
                CadenceMode::Auto => None,
            },
            grade_pct: 0.0,
            randomness: config.randomness,
            is_resting: false,
        };
        Self {
            transport,
            transport_state: TransportState::Off,
            config,
            control_point: ControlPoint::new(),
            control: ControlState::default(),
            engine,
            input,
            scheduler: NotificationScheduler::new(),
            counters: RollingCounters::default(),
            metrics: MetricsTracker::new(),
            pending_updates: VecDeque::new(),
            pending_statuses: Vec::new(),
            pending_broadcast: false,
            registering: HashSet::new(),
            state: BroadcastState::Idle,
            is_advertising: false,
            subscriber_count: 0,
            last_error: None,
            event_log: EventLog::new(),
            update_tx: None,
            started_at: Instant::now(),
            last_engine_tick: None,
            last_stats_publish: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Request a broadcast. Queued if the transport is not ready yet; the
    /// most recent queued request runs when it becomes ready.
    pub fn start_broadcast(&mut self) {
        if self.transport_state != TransportState::Ready {
            self.pending_broadcast = true;
            self.log(
                EventSeverity::Info,
                EventCategory::Bluetooth,
                "broadcast requested before transport ready, queued",
            );
            return;
        }
        self.begin_registration();
    }

    /// Stop advertising, cancel all timers, and drop queued work.
    /// Idempotent.
    pub fn stop_broadcast(&mut self) {
        self.transport.stop_advertising();
        self.scheduler.stop();
        self.pending_updates.clear();
        self.pending_statuses.clear();
        self.pending_broadcast = false;
        self.registering.clear();
        self.is_advertising = false;
        if self.state != BroadcastState::Failed {
            self.set_state(BroadcastState::Stopped);
        }
        self.log(
            EventSeverity::Info,
            EventCategory::Advertising,
            "broadcast stopped",
        );
    }

    fn begin_registration(&mut self) {
        self.set_state(BroadcastState::Starting);
        let services = self.build_services();
        if services.is_empty() {
            self.start_advertising();
            return;
        }
        self.registering = services.iter().map(|s| s.uuid).collect();
        for service in services {
            self.transport.add_service(service);
        }
    }

    fn start_advertising(&mut self) {
        let data = AdvertisingData {
            local_name: self.config.local_name.clone(),
            service_uuids: self.enabled_service_uuids(),
        };
        self.transport.start_advertising(data);
    }

    fn enabled_service_uuids(&self) -> Vec<Uuid> {
        let mut uuids = Vec::new();
        if self.config.services.ftms {
            uuids.push(FTMS_SERVICE_UUID);
        }
        if self.config.services.cps {
            uuids.push(CYCLING_POWER_SERVICE_UUID);
        }
        if self.config.services.rsc {
            uuids.push(RSC_SERVICE_UUID);
        }
        uuids
    }

    fn build_services(&self) -> Vec<ServiceDef> {
        let mut services = Vec::new();
        if self.config.services.ftms {
            services.push(ServiceDef {
                uuid: FTMS_SERVICE_UUID,
                characteristics: vec![
                    CharacteristicDef {
                        uuid: FTMS_FEATURE_UUID,
                        properties: CharacteristicProperties {
                            read: true,
                            ..Default::default()
                        },
                        user_description: "Fitness Machine Feature",
                    },
                    CharacteristicDef {
                        uuid: INDOOR_BIKE_DATA_UUID,
                        properties: CharacteristicProperties {
                            notify: true,
                            ..Default::default()
                        },
                        user_description: "Indoor Bike Data",
                    },
                    CharacteristicDef {
                        uuid: FTMS_STATUS_UUID,
                        properties: CharacteristicProperties {
                            notify: true,
                            ..Default::default()
                        },
                        user_description: "Fitness Machine Status",
                    },
                    CharacteristicDef {
                        uuid: FTMS_CONTROL_POINT_UUID,
                        properties: CharacteristicProperties {
                            write: true,
                            indicate: true,
                            ..Default::default()
                        },
                        user_description: "Fitness Machine Control Point",
                    },
                    CharacteristicDef {
                        uuid: SUPPORTED_POWER_RANGE_UUID,
                        properties: CharacteristicProperties {
                            read: true,
                            ..Default::default()
                        },
                        user_description: "Supported Power Range",
                    },
                ],
            });
        }
        if self.config.services.cps {
            services.push(ServiceDef {
                uuid: CYCLING_POWER_SERVICE_UUID,
                characteristics: vec![
                    CharacteristicDef {
                        uuid: CYCLING_POWER_MEASUREMENT_UUID,
                        properties: CharacteristicProperties {
                            notify: true,
                            ..Default::default()
                        },
                        user_description: "Cycling Power Measurement",
                    },
                    CharacteristicDef {
                        uuid: CYCLING_POWER_FEATURE_UUID,
                        properties: CharacteristicProperties {
                            read: true,
                            ..Default::default()
                        },
                        user_description: "Cycling Power Feature",
                    },
                    CharacteristicDef {
                        uuid: SENSOR_LOCATION_UUID,
                        properties: CharacteristicProperties {
                            read: true,
                            ..Default::default()
                        },
                        user_description: "Sensor Location",
                    },
                ],
            });
        }
        if self.config.services.rsc {
            services.push(ServiceDef {
                uuid: RSC_SERVICE_UUID,
                characteristics: vec![
                    CharacteristicDef {
                        uuid: RSC_MEASUREMENT_UUID,
                        properties: CharacteristicProperties {
                            notify: true,
                            ..Default::default()
                        },
                        user_description: "RSC Measurement",
                    },
                    CharacteristicDef {
                        uuid: RSC_FEATURE_UUID,
                        properties: CharacteristicProperties {
                            read: true,
                            ..Default::default()
                        },
                        user_description: "RSC Feature",
                    },
                    CharacteristicDef {
                        uuid: SENSOR_LOCATION_UUID,
                        properties: CharacteristicProperties {
                            read: true,
                            ..Default::default()
                        },
                        user_description: "Sensor Location",
                    },
                ],
            });
        }
        services
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    /// Feed one transport event into the coordinator.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::StateChanged(state) => self.on_transport_state(state),
            TransportEvent::ServiceAdded { uuid, ok } => self.on_service_added(uuid, ok),
            TransportEvent::AdvertisingStarted { ok } => self.on_advertising_started(ok),
            TransportEvent::Subscribed(characteristic) => self.on_subscribed(characteristic, now),
            TransportEvent::Unsubscribed(characteristic) => self.on_unsubscribed(characteristic),
            TransportEvent::Read(characteristic) => self.on_read(characteristic),
            TransportEvent::Write {
                characteristic,
                data,
            } => self.on_write(characteristic, &data, now),
            TransportEvent::ReadyToUpdate => self.drain_pending(),
        }
    }

    fn on_transport_state(&mut self, state: TransportState) {
        self.transport_state = state;
        match state {
            TransportState::Ready => {
                self.log(
                    EventSeverity::Info,
                    EventCategory::Bluetooth,
                    "transport ready",
                );
                if self.pending_broadcast {
                    self.pending_broadcast = false;
                    self.begin_registration();
                }
            }
            TransportState::Off | TransportState::Unavailable => {
                self.last_error = Some(format!("bluetooth {}", state));
                self.log(
                    EventSeverity::Error,
                    EventCategory::Bluetooth,
                    format!("transport became {}", state),
                );
                self.stop_broadcast();
                self.set_state(BroadcastState::Failed);
            }
        }
    }

    fn on_service_added(&mut self, uuid: Uuid, ok: bool) {
        if !ok {
            self.last_error = Some(format!("service {} registration failed", uuid));
            self.registering.clear();
            self.set_state(BroadcastState::Failed);
            self.log(
                EventSeverity::Error,
                EventCategory::Bluetooth,
                format!("service {} registration failed", uuid),
            );
            return;
        }
        self.registering.remove(&uuid);
        if self.registering.is_empty() && self.state == BroadcastState::Starting {
            self.start_advertising();
        }
    }

    fn on_advertising_started(&mut self, ok: bool) {
        if ok {
            self.is_advertising = true;
            self.set_state(BroadcastState::Advertising);
            self.log(
                EventSeverity::Info,
                EventCategory::Advertising,
                format!("advertising as \"{}\"", self.config.local_name),
            );
        } else {
            self.is_advertising = false;
            self.last_error = Some("advertising failed".to_string());
            self.set_state(BroadcastState::Failed);
            self.log(
                EventSeverity::Error,
                EventCategory::Advertising,
                "advertising failed",
            );
        }
    }

    fn on_subscribed(&mut self, characteristic: Uuid, now: Instant) {
        self.subscriber_count += 1;
        self.log(
            EventSeverity::Info,
            EventCategory::Notification,
            format!("subscriber on {}", characteristic),
        );
        if !self.scheduler.is_running() {
            self.scheduler.start(now);
        }
    }

    fn on_unsubscribed(&mut self, characteristic: Uuid) {
        self.subscriber_count = self.subscriber_count.saturating_sub(1);
        self.log(
            EventSeverity::Info,
            EventCategory::Notification,
            format!("subscriber left {}", characteristic),
        );
        if self.subscriber_count == 0 {
            self.scheduler.stop();
        }
    }

    fn on_read(&mut self, characteristic: Uuid) {
        let value: Option<Vec<u8>> = if characteristic == FTMS_FEATURE_UUID {
            Some(
                codec::encode_ftms_feature(self.config.fields.cadence, self.config.fields.power)
                    .to_vec(),
            )
        } else if characteristic == SUPPORTED_POWER_RANGE_UUID {
            Some(codec::encode_supported_power_range().to_vec())
        } else if characteristic == CYCLING_POWER_FEATURE_UUID {
            Some(codec::encode_cps_feature().to_vec())
        } else if characteristic == RSC_FEATURE_UUID {
            Some(codec::encode_rsc_feature().to_vec())
        } else if characteristic == SENSOR_LOCATION_UUID {
            // Rear hub when CPS is enabled, "other" otherwise.
            Some(vec![if self.config.services.cps { 13 } else { 0 }])
        } else {
            None
        };
        self.transport.respond_to_read(characteristic, value);
    }

    fn on_write(&mut self, characteristic: Uuid, data: &[u8], now: Instant) {
        if characteristic != FTMS_CONTROL_POINT_UUID {
            self.transport.respond_to_write(characteristic, false);
            self.log(
                EventSeverity::Warning,
                EventCategory::Control,
                format!("write to unexpected characteristic {}", characteristic),
            );
            return;
        }
        self.transport.respond_to_write(characteristic, true);

        let result = self.control_point.handle(&mut self.control, data);

        let severity = match &result.response {
            Some(resp) if resp.get(2) == Some(&(ResultCode::Success as u8)) => EventSeverity::Info,
            Some(_) => EventSeverity::Warning,
            None => EventSeverity::Warning,
        };
        self.log(severity, EventCategory::Control, result.log.clone());

        // Indication first, then the status notifications it triggered.
        if let Some(response) = result.response {
            self.send_value(FTMS_CONTROL_POINT_UUID, response);
        }
        for status in result.statuses {
            if status.delay_s <= 0.0 {
                self.send_value(FTMS_STATUS_UUID, status.payload);
            } else {
                self.pending_statuses
                    .push((now + Duration::from_secs_f64(status.delay_s), status.payload));
            }
        }

        // Mirror protocol state into the simulation inputs. Grade follows
        // every change; target power only when the writer set it, so a
        // consumer-dial wattage is not overwritten by unrelated commands.
        self.input.grade_pct = self.control.grade_pct;
        self.input.is_resting = !self.control.is_started;
        if result.opcode == Some(OpCode::SetTargetPower) {
            self.input.target_power_w = self.control.target_power_w;
        }
        if result.opcode == Some(OpCode::Reset) {
            self.metrics.reset();
        }
    }

    // ------------------------------------------------------------------
    // Ticks and backpressure
    // ------------------------------------------------------------------

    /// Fire any due timers and delayed statuses, and refresh observers.
    pub fn poll(&mut self, now: Instant) {
        // The scheduler is taken out for the duration of the callbacks so
        // they can borrow the coordinator mutably; tick handlers never touch
        // the scheduler themselves.
        let mut scheduler = std::mem::take(&mut self.scheduler);
        scheduler.poll(now, &mut TickDelegate { coordinator: self, now });
        self.scheduler = scheduler;
        self.flush_due_statuses(now);
        self.maybe_publish_stats(now);
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let status_due = self.pending_statuses.iter().map(|(due, _)| *due).min();
        match (self.scheduler.next_deadline(), status_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn flush_due_statuses(&mut self, now: Instant) {
        let mut due: Vec<Vec<u8>> = Vec::new();
        self.pending_statuses.retain(|(when, payload)| {
            if *when <= now {
                due.push(payload.clone());
                false
            } else {
                true
            }
        });
        for payload in due {
            self.send_value(FTMS_STATUS_UUID, payload);
        }
    }

    fn tick_simulation(&mut self, now: Instant) {
        let dt = match self.last_engine_tick {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f64().max(0.001),
            None => 0.25,
        };
        self.last_engine_tick = Some(now);

        self.input.target_power_w = self.input.target_power_w.clamp(0, 4000);
        let state = self.engine.step(&self.input, dt);
        self.metrics.record(&state, dt);

        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        self.counters.advance(
            dt,
            state.cadence_rpm as f64,
            self.control.cps_wheel_circumference_m,
            elapsed,
        );
    }

    fn ftms_tick(&mut self, now: Instant) {
        self.tick_simulation(now);
        if !self.config.services.ftms {
            return;
        }
        let state = self.engine.last_state();
        let data = codec::encode_indoor_bike_data(
            state.cadence_rpm.clamp(0, u16::MAX as i32) as u16,
            state.power_w.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            self.config.fields.cadence,
            self.config.fields.power,
        );
        self.send_value(INDOOR_BIKE_DATA_UUID, data);
        self.publish_stats(now);
    }

    fn cps_tick(&mut self, now: Instant) {
        self.tick_simulation(now);
        if !self.config.services.cps {
            return;
        }
        let state = self.engine.last_state();
        let data = codec::encode_cps_measurement(
            state.power_w.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            Some(self.counters.wheel()),
            Some(self.counters.crank()),
        );
        self.send_value(CYCLING_POWER_MEASUREMENT_UUID, data);
    }

    fn rsc_tick(&mut self, now: Instant) {
        self.tick_simulation(now);
        if !self.config.services.rsc {
            return;
        }
        let state = self.engine.last_state();
        let data = codec::encode_rsc_measurement(
            state.speed_mps,
            state.cadence_rpm.clamp(0, u8::MAX as i32) as u8,
        );
        self.send_value(RSC_MEASUREMENT_UUID, data);
    }

    fn send_value(&mut self, characteristic: Uuid, data: Vec<u8>) {
        if !self.transport.update_value(characteristic, &data) {
            self.pending_updates.push_back((characteristic, data));
        }
    }

    fn drain_pending(&mut self) {
        while let Some((characteristic, data)) = self.pending_updates.pop_front() {
            if !self.transport.update_value(characteristic, &data) {
                self.pending_updates.push_front((characteristic, data));
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Consumer-facing inputs
    // ------------------------------------------------------------------

    /// Set the ERG target from the consumer side.
    pub fn set_target_power(&mut self, watts: i32) {
        let watts = watts.clamp(0, 4000);
        self.input.target_power_w = watts;
        self.control.target_power_w = watts;
    }

    /// Force a cadence, or return to the model with `None`.
    pub fn set_manual_cadence(&mut self, cadence_rpm: Option<i32>) {
        self.input.manual_cadence_rpm = cadence_rpm.map(|c| c.clamp(0, 180));
        self.config.cadence_mode = match cadence_rpm {
            Some(_) => CadenceMode::Manual,
            None => CadenceMode::Auto,
        };
    }

    /// Set the simulated grade from the consumer side.
    pub fn set_grade(&mut self, grade_pct: f64) {
        let grade = grade_pct.clamp(-30.0, 30.0);
        self.input.grade_pct = grade;
        self.control.grade_pct = grade;
    }

    /// Set the randomness dial (0–100).
    pub fn set_randomness(&mut self, randomness: i32) {
        self.input.randomness = randomness.clamp(0, 100);
        self.config.randomness = self.input.randomness;
    }

    /// Set the UI step for target-power adjustments (1–100 W).
    pub fn set_increment(&mut self, watts: i32) {
        self.config.increment_w = watts.clamp(1, 100);
    }

    /// Nudge the target power by whole increments (negative steps lower it).
    pub fn nudge_target_power(&mut self, steps: i32) {
        self.set_target_power(self.input.target_power_w + steps * self.config.increment_w);
    }

    /// Choose which services to advertise; applies on the next broadcast.
    pub fn set_service_toggles(&mut self, services: ServiceToggles) {
        self.config.services = services;
    }

    /// Choose which fields the measurement payloads carry.
    pub fn set_field_toggles(&mut self, fields: FieldToggles) {
        self.config.fields = fields;
    }

    /// Set the advertised local name; applies on the next broadcast start.
    pub fn set_local_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.trim().is_empty() {
            self.config.local_name = name;
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Channel of state transitions, stats snapshots and log events.
    pub fn update_receiver(&mut self) -> Receiver<EmulatorUpdate> {
        let (tx, rx) = unbounded();
        self.update_tx = Some(tx);
        rx
    }

    /// Current broadcast state.
    pub fn state(&self) -> BroadcastState {
        self.state
    }

    /// True while the transport is advertising.
    pub fn is_advertising(&self) -> bool {
        self.is_advertising
    }

    /// Connected subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    /// Most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Snapshot of the bounded event feed.
    pub fn events(&self) -> Vec<EmulatorEvent> {
        self.event_log.entries()
    }

    /// Protocol-owned trainer state.
    pub fn control_state(&self) -> &ControlState {
        &self.control
    }

    /// Updates waiting for the transport to become ready, in order.
    pub fn pending_updates(&self) -> &VecDeque<(Uuid, Vec<u8>)> {
        &self.pending_updates
    }

    /// Accumulated session metrics.
    pub fn session_metrics(&self) -> SessionMetrics {
        self.metrics.snapshot()
    }

    /// Start a fresh metrics session without touching the broadcast.
    pub fn reset_session(&mut self) {
        self.metrics.reset();
    }

    /// Live telemetry snapshot from the last engine tick.
    pub fn live_stats(&self) -> LiveStats {
        let state = self.engine.last_state();
        LiveStats {
            speed_kmh: state.speed_mps * 3.6,
            power_w: state.power_w,
            cadence_rpm: state.cadence_rpm,
            mode: self.config.cadence_mode.to_string(),
            gear: state.gear.to_string(),
            target_cadence_rpm: state.target_cadence_rpm,
            fatigue: state.fatigue,
            noise_rpm: state.noise_rpm,
            grade_pct: self.input.grade_pct,
        }
    }

    fn set_state(&mut self, state: BroadcastState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(tx) = &self.update_tx {
            let _ = tx.send(EmulatorUpdate::StateChanged(state));
        }
    }

    fn publish_stats(&mut self, now: Instant) {
        self.last_stats_publish = Some(now);
        if let Some(tx) = &self.update_tx {
            let _ = tx.send(EmulatorUpdate::Stats(self.live_stats()));
        }
    }

    fn maybe_publish_stats(&mut self, now: Instant) {
        let due = match self.last_stats_publish {
            Some(prev) => now.saturating_duration_since(prev) >= STATS_PUBLISH_PERIOD,
            None => true,
        };
        if due {
            self.publish_stats(now);
        }
    }

    fn log(&mut self, severity: EventSeverity, category: EventCategory, message: impl Into<String>) {
        let message = message.into();
        match severity {
            EventSeverity::Info => tracing::info!(target: "velotrain", "{}", message),
            EventSeverity::Warning => tracing::warn!(target: "velotrain", "{}", message),
            EventSeverity::Error => tracing::error!(target: "velotrain", "{}", message),
        }
        let event = EmulatorEvent::new(severity, category, message);
        if let Some(tx) = &self.update_tx {
            let _ = tx.send(EmulatorUpdate::Event(event.clone()));
        }
        self.event_log.push(event);
    }
}

/// Borrow adapter wiring scheduler callbacks back into the coordinator.
struct TickDelegate<'a, T: Transport> {
    coordinator: &'a mut PeripheralCoordinator<T>,
    now: Instant,
}

impl<T: Transport> SchedulerDelegate for TickDelegate<'_, T> {
    fn on_ftms_tick(&mut self) {
        self.coordinator.ftms_tick(self.now);
    }

    fn on_cps_tick(&mut self) {
        self.coordinator.cps_tick(self.now);
    }

    fn on_rsc_tick(&mut self) {
        self.coordinator.rsc_tick(self.now);
    }

    fn current_cadence(&self) -> f64 {
        self.coordinator.engine.last_state().cadence_rpm as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_counters_accumulate_whole_revolutions() {
        let mut counters = RollingCounters::default();
        // 90 rpm for 2 s at 4 Hz: 3 crank revolutions.
        let mut elapsed = 0.0;
        for _ in 0..8 {
            elapsed += 0.25;
            counters.advance(0.25, 90.0, 2.096, elapsed);
        }
        assert_eq!(counters.crank().cumulative_revs, 3);
        // 5 m/s over 2.096 m: 2.386 rev/s → 4 whole revs in 2 s.
        assert_eq!(counters.wheel().cumulative_revs, 4);
    }

    #[test]
    fn test_rolling_counters_wrap() {
        let mut counters = RollingCounters {
            crank_revs: u16::MAX,
            ..Default::default()
        };
        counters.advance(1.0, 120.0, 2.096, 1.0);
        assert_eq!(counters.crank().cumulative_revs, 1);
    }

    #[test]
    fn test_crank_event_time_only_moves_with_revolutions() {
        let mut counters = RollingCounters::default();
        counters.advance(0.25, 60.0, 2.096, 0.25);
        let t0 = counters.crank().last_event_time_1024;
        // A quarter revolution: timestamp must hold still.
        counters.advance(0.25, 60.0, 2.096, 0.5);
        assert_eq!(counters.crank().last_event_time_1024, t0);
    }
}
