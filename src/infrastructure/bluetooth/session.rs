//! Tracker Session Controller
//!
//! Coordinates one connected SN60 Plus: runs the initialization sequence,
//! routes inbound notifications to the codec and engines, drives the periodic
//! realtime tick, and issues one-shot outbound commands. Events for the
//! application surface on an unbounded channel.

use crate::domain::models::{
    ActivitySample, AlarmSpec, ConnectionState, MessageSeverity, SampleKind, SessionEvent,
    StatusMessage, VersionInfo,
};
use crate::domain::realtime::RealtimeSamples;
use crate::domain::reconcile::Reconciler;
use crate::domain::settings::SettingsService;
use crate::error::DeviceError;
use crate::infrastructure::bluetooth::protocol::{self, Icon, NotificationKind};
use crate::infrastructure::bluetooth::transport::{BleTransport, Characteristic, TransportError};
use crate::infrastructure::store::SampleStore;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub struct TrackerSession {
    transport: Arc<dyn BleTransport>,
    store: Arc<dyn SampleStore>,
    settings: Arc<Mutex<SettingsService>>,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    reconciler: Reconciler,
    device_id: String,
    user_id: String,
    /// Spawned tasks carry a clone of this weak handle and upgrade it per
    /// iteration, so they stop once the owner drops its last `Arc`.
    self_ref: Weak<Self>,

    state: Mutex<ConnectionState>,
    /// Session-owned realtime differencing state; one per connected device,
    /// guarded by a single lock since both the tick task and the
    /// notification path touch it.
    realtime: Mutex<RealtimeSamples>,
    realtime_task: Mutex<Option<JoinHandle<()>>>,
    fetch_task: Mutex<Option<JoinHandle<()>>>,
    last_activity_frame: Mutex<Instant>,
    version: Mutex<VersionInfo>,
}

impl TrackerSession {
    pub fn new(
        transport: Arc<dyn BleTransport>,
        store: Arc<dyn SampleStore>,
        settings: Arc<Mutex<SettingsService>>,
        event_sender: mpsc::UnboundedSender<SessionEvent>,
        device_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Arc<Self> {
        let device_id = device_id.into();
        let user_id = user_id.into();
        Arc::new_cyclic(|self_ref| Self {
            transport,
            store,
            settings,
            event_sender,
            reconciler: Reconciler::new(device_id.clone(), user_id.clone()),
            device_id,
            user_id,
            self_ref: self_ref.clone(),
            state: Mutex::new(ConnectionState::Disconnected),
            realtime: Mutex::new(RealtimeSamples::new()),
            realtime_task: Mutex::new(None),
            fetch_task: Mutex::new(None),
            last_activity_frame: Mutex::new(Instant::now()),
            version: Mutex::new(VersionInfo::default()),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Run the initialization sequence: subscribe to activity data, then
    /// request device info, battery level and heart-rate sensor location.
    /// All requests are fire-and-forget; individual failures are logged but
    /// never abort the sequence.
    pub fn initialize(&self) {
        info!(device = %self.device_id, "initializing session");
        self.set_state(ConnectionState::Initializing);

        {
            let mut settings = lock(&self.settings);
            settings.get_mut().last_connected_address = Some(self.device_id.clone());
            if let Err(e) = settings.add_known_address(&self.device_id) {
                warn!("could not persist device address: {e}");
            }
        }

        if let Err(e) = self.transport.read(Characteristic::ActivityData) {
            warn!("initial activity read failed: {e}");
        }
        if let Err(e) = self.transport.subscribe(Characteristic::ActivityData, true) {
            warn!("activity subscription failed: {e}");
            self.emit_message(
                MessageSeverity::Warning,
                "Connected (activity notifications may be limited)",
            );
        }
        for characteristic in [
            Characteristic::FirmwareRevision,
            Characteristic::HardwareRevision,
            Characteristic::BatteryLevel,
            Characteristic::BodySensorLocation,
        ] {
            if let Err(e) = self.transport.read(characteristic) {
                warn!("request for {characteristic:?} failed: {e}");
            }
        }

        self.set_state(ConnectionState::Initialized);
        info!("initialization done");
    }

    pub fn disconnect(&self) {
        self.stop_realtime_task();
        if let Some(handle) = lock(&self.fetch_task).take() {
            handle.abort();
        }
        *lock(&self.realtime) = RealtimeSamples::new();
        self.set_state(ConnectionState::Disconnected);
        info!(device = %self.device_id, "session closed");
        self.emit_message(MessageSeverity::Info, "Disconnected from device");
    }

    /// Entry point for transports that deliver raw UUID strings.
    pub fn handle_raw_notification(&self, uuid: &str, payload: &[u8]) {
        self.handle_notification(Characteristic::from_uuid(uuid), payload);
    }

    /// Inbound dispatch. The transport calls this serially, in arrival
    /// order; there are no concurrent decodes within a session.
    pub fn handle_notification(&self, characteristic: Characteristic, payload: &[u8]) {
        match characteristic {
            Characteristic::ActivityData => self.handle_activity_data(payload),
            Characteristic::HeartRateMeasurement => self.handle_heart_rate(payload),
            Characteristic::BatteryLevel => {
                if let Some(&level) = payload.first() {
                    debug!("battery level: {level}%");
                    self.emit(SessionEvent::BatteryLevel(level));
                }
            }
            Characteristic::FirmwareRevision => {
                let mut version = lock(&self.version);
                version.firmware = Some(String::from_utf8_lossy(payload).into_owned());
                self.emit(SessionEvent::Version(version.clone()));
            }
            Characteristic::HardwareRevision => {
                let mut version = lock(&self.version);
                version.hardware = Some(String::from_utf8_lossy(payload).into_owned());
                self.emit(SessionEvent::Version(version.clone()));
            }
            Characteristic::BodySensorLocation => {
                debug!("body sensor location: {:02x?}", payload);
            }
            Characteristic::Control | Characteristic::Unrecognized => {
                debug!(
                    "unhandled payload on {characteristic:?}: {:02x?}",
                    payload
                );
            }
        }
    }

    fn handle_activity_data(&self, payload: &[u8]) {
        *lock(&self.last_activity_frame) = Instant::now();

        let counters = match protocol::decode_activity(payload) {
            Ok(counters) => counters,
            Err(e) => {
                warn!("dropping activity frame: {e}");
                return;
            }
        };

        match self
            .reconciler
            .reconcile(self.store.as_ref(), &counters, Utc::now().timestamp())
        {
            Ok(Some(sample)) => {
                debug!(steps = sample.steps, "recorded reconciled sample");
                self.emit(SessionEvent::SampleRecorded(sample));
            }
            Ok(None) => trace!("device counters not ahead of stored total"),
            Err(e) => {
                warn!("could not reconcile activity data: {e}");
                self.emit_message(MessageSeverity::Error, &format!("Sample store error: {e}"));
            }
        }

        // The live display reflects the latest cumulative reading whether or
        // not a persisted sample was created.
        lock(&self.realtime).set_counters(&counters);
    }

    fn handle_heart_rate(&self, payload: &[u8]) {
        let Some(bpm) = protocol::decode_heart_rate(payload) else {
            trace!("unrecognized heart-rate frame: {:02x?}", payload);
            return;
        };
        debug!("heart rate: {bpm} bpm");

        let running = {
            let mut realtime = lock(&self.realtime);
            realtime.set_heart_rate(bpm as i64);
            realtime.is_running()
        };
        if !running {
            // Single-shot measurement: publish without waiting for a tick.
            self.flush_current_sample();
        }
    }

    /// One tick of the realtime loop: take the per-metric deltas, persist
    /// them as a sample and broadcast it, then advance the baselines. A tick
    /// in which nothing arrived produces no sample.
    fn flush_current_sample(&self) {
        let deltas = lock(&self.realtime).flush_tick();
        let Some(deltas) = deltas else {
            return;
        };

        let sample = ActivitySample {
            device_id: self.device_id.clone(),
            user_id: self.user_id.clone(),
            timestamp: Utc::now().timestamp(),
            steps: deltas.steps.unwrap_or(0),
            distance_meters: deltas.meters.unwrap_or(0),
            calories_burnt: deltas.calories.unwrap_or(0),
            heart_rate: deltas.heart_rate,
            kind: SampleKind::Activity,
        };

        match self.store.append(sample.clone()) {
            Ok(()) => {
                trace!(?deltas, "realtime sample");
                self.emit(SessionEvent::RealtimeSample(sample));
            }
            Err(e) => {
                // The tick's sample is discarded; engine baselines already
                // advanced, which only delays the steps to the next poll's
                // reconciliation.
                warn!("could not persist realtime sample: {e}");
                self.emit_message(MessageSeverity::Error, &format!("Sample store error: {e}"));
            }
        }
    }

    /// Start or stop the periodic realtime differencing loop. Disabling
    /// aborts the tick task and discards the session's realtime state; a
    /// partially computed tick is simply dropped.
    pub fn enable_realtime(&self, enable: bool) {
        if !enable {
            self.stop_realtime_task();
            *lock(&self.realtime) = RealtimeSamples::new();
            info!("realtime sampling stopped");
            return;
        }

        let mut task = lock(&self.realtime_task);
        if task.is_some() {
            return;
        }

        let period = Duration::from_millis(self.settings_snapshot(|s| s.realtime_tick_ms));
        lock(&self.realtime).set_running(true);

        // The task holds only the weak handle and upgrades per tick, so it
        // ends with the session instead of keeping it alive.
        let session = Weak::clone(&self.self_ref);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.flush_current_sample();
            }
        }));
        info!("realtime sampling started, period {period:?}");
    }

    fn stop_realtime_task(&self) {
        if let Some(handle) = lock(&self.realtime_task).take() {
            handle.abort();
        }
        lock(&self.realtime).set_running(false);
    }

    /// Request the device's recorded step history. The protocol has no
    /// end-of-transfer marker, so a watchdog returns the session to
    /// `Initialized` once activity frames stop arriving.
    pub fn fetch_recorded_data(&self) -> Result<(), DeviceError> {
        self.ensure_initialized()?;

        // Discard any partially observed tick before the bulk transfer.
        lock(&self.realtime).clear_current();
        *lock(&self.last_activity_frame) = Instant::now();
        self.set_state(ConnectionState::BusyFetching);

        if let Err(e) = self.write_control("fetch activity data", &protocol::encode_fetch_steps()) {
            self.set_state(ConnectionState::Initialized);
            return Err(e);
        }

        let idle = Duration::from_millis(self.settings_snapshot(|s| s.fetch_idle_timeout_ms));
        let session = Weak::clone(&self.self_ref);
        let mut fetch_task = lock(&self.fetch_task);
        if let Some(old) = fetch_task.take() {
            old.abort();
        }
        *fetch_task = Some(tokio::spawn(async move {
            let check = idle.min(Duration::from_millis(500));
            loop {
                tokio::time::sleep(check).await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if session.state() != ConnectionState::BusyFetching {
                    break;
                }
                if lock(&session.last_activity_frame).elapsed() >= idle {
                    debug!("no activity frames for {idle:?}, fetch considered done");
                    session.set_state(ConnectionState::Initialized);
                    break;
                }
            }
        }));
        Ok(())
    }

    pub fn vibrate(&self, duration: u8, count: u8) -> Result<(), DeviceError> {
        self.ensure_initialized()?;
        self.write_control("vibrate", &protocol::encode_vibration(duration, count))
    }

    /// "Find my device": a short vibration burst.
    pub fn find_device(&self) -> Result<(), DeviceError> {
        self.vibrate(1, 3)
    }

    pub fn show_icon(&self, icon: Icon) -> Result<(), DeviceError> {
        self.ensure_initialized()?;
        self.write_control("show icon", &protocol::encode_icon(icon))
    }

    /// Flash a notification: text body first, then the type frame.
    pub fn show_notification(&self, kind: NotificationKind, text: &str) -> Result<(), DeviceError> {
        self.ensure_initialized()?;
        self.write_control("show notification", &protocol::encode_notification_text(text))?;
        self.write_control(
            "show notification",
            &protocol::encode_notification_kind(kind),
        )
    }

    pub fn stop_notification(&self) -> Result<(), DeviceError> {
        self.ensure_initialized()?;
        self.write_control("stop notification", &protocol::encode_notification_stop())
    }

    /// Program the device's alarm slots. Every slot is validated before any
    /// frame is written, so an over-limit request leaves the device
    /// untouched.
    pub fn set_alarms(&self, alarms: &[AlarmSpec]) -> Result<(), DeviceError> {
        self.ensure_initialized()?;

        let mut frames = Vec::with_capacity(alarms.len());
        for alarm in alarms {
            match protocol::encode_alarm(alarm) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    if alarm.enabled {
                        self.emit_message(
                            MessageSeverity::Warning,
                            "Only 3 alarms are supported.",
                        );
                        return Err(e);
                    }
                    // A disabled out-of-range slot is silently skipped.
                }
            }
        }
        for frame in &frames {
            self.write_control("set alarm", frame)?;
        }
        Ok(())
    }

    pub fn set_time(&self) -> Result<(), DeviceError> {
        self.ensure_initialized()?;
        self.write_control("set time", &protocol::encode_set_time_now())
    }

    /// Push the wearer profile and device preferences.
    pub fn send_settings(&self) -> Result<(), DeviceError> {
        self.ensure_initialized()?;

        let (user_data, device_settings, display_settings) = self.settings_snapshot(|s| {
            (
                protocol::encode_user_data(&s.user_profile, s.device_preferences.lift_wrist),
                protocol::encode_device_settings(s.device_preferences.inactivity_alarm),
                protocol::encode_display_settings(
                    s.device_preferences.metric_units,
                    s.device_preferences.time_format,
                ),
            )
        });

        self.write_control("send user data", &user_data)?;
        self.write_control("send device settings", &device_settings)?;
        self.write_control("send display settings", &display_settings)
    }

    pub fn factory_reset(&self) -> Result<(), DeviceError> {
        self.ensure_initialized()?;
        self.write_control("factory reset", &protocol::encode_factory_reset())
    }

    fn ensure_initialized(&self) -> Result<(), DeviceError> {
        match self.state() {
            ConnectionState::Initialized | ConnectionState::BusyFetching => Ok(()),
            _ => Err(DeviceError::Transport(TransportError::NotConnected)),
        }
    }

    fn write_control(&self, what: &str, frame: &[u8]) -> Result<(), DeviceError> {
        if let Err(e) = self.transport.write(Characteristic::Control, frame) {
            warn!("unable to {what}: {e}");
            self.emit_message(MessageSeverity::Error, &format!("Failed to {what}: {e}"));
            return Err(e.into());
        }
        Ok(())
    }

    fn set_state(&self, new_state: ConnectionState) {
        let mut state = lock(&self.state);
        if *state != new_state {
            debug!("session state {:?} -> {new_state:?}", *state);
            *state = new_state;
            drop(state);
            self.emit(SessionEvent::ConnectionState(new_state));
        }
    }

    fn settings_snapshot<T>(&self, read: impl FnOnce(&crate::domain::settings::Settings) -> T) -> T {
        let settings = lock(&self.settings);
        read(settings.get())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_sender.send(event);
    }

    fn emit_message(&self, severity: MessageSeverity, message: &str) {
        self.emit(SessionEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

impl Drop for TrackerSession {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.realtime_task).take() {
            handle.abort();
        }
        if let Some(handle) = lock(&self.fetch_task).take() {
            handle.abort();
        }
    }
}

/// All session state is small and updated under short critical sections; if
/// a holder panicked mid-update the values are still structurally valid, so
/// recover the guard instead of propagating the poison.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
