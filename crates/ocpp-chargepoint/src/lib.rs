//! # OCPP 1.6J Charge Point Runtime
//!
//! An embeddable charge point: the protocol runtime between a Central
//! System speaking OCPP 1.6J over WebSocket and the local EVSE hardware.
//! The host owns the transport and the hardware; the runtime owns the
//! registration state machine, per-connector state machines, the durable
//! transaction lifecycle, the reliable outbound queue and the smart
//! charging engine.
//!
//! The host wires three things: a [`Transport`] for outbound frames,
//! inbound frames via [`ChargePoint::handle_message`], and the
//! [`Callbacks`] that actuate hardware.

pub mod callbacks;
pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod pki;
pub mod queue;
pub mod smart_charging;
pub mod state_machine;
pub mod store;
pub mod transaction;

use crate::callbacks::{Callbacks, DataTransferCallback, DataTransferCallbacks};
use crate::config::{ChargePointSettings, Configuration};
use crate::connector::ConnectorTable;
use crate::error::{ChargePointError, ChargePointResult};
use crate::pki::PkiHandler;
use crate::queue::{EnhancedMessage, MessageQueue, Transport};
use crate::smart_charging::{ProfileLimits, SmartChargingHandler};
use crate::state_machine::{ConnectorEvent, StateTransition};
use crate::store::{Repository, TransactionRow};
use crate::transaction::{StampedEnergy, Transaction, TransactionManager};
use chrono::{DateTime, Timelike, Utc};
use ocpp_messages::v16j::*;
use ocpp_messages::{utils, OcppAction, OcppResponse};
use ocpp_types::common::{
    AuthorizationStatus, AvailabilityType, ChargingRateUnitType, ChargingSchedule, IdTagInfo,
    Measurand, MeterValue, Powermeter, ReadingContext, Reason, SampledValue,
    SessionStartedReason, ValueFormat,
};
use ocpp_types::v16j::{
    ChargePointErrorCode, ChargePointStatus, DataTransferStatus, DiagnosticsStatus,
    FirmwareStatus, RegistrationStatus, ResetType, SecurityEvent, SignedFirmwareStatus,
    UploadLogStatus,
};
use ocpp_types::CallErrorMessage;
use ocpp_types::TransactionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long a Reset waits for StopTransactionResponses before forcing
/// shutdown
const RESET_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection lifecycle of the charge point towards the Central System
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Transport is up, BootNotification not yet answered
    Connected,
    /// Central System answered Pending
    Pending,
    /// Central System answered Rejected
    Rejected,
    /// Accepted; normal operation
    Booted,
}

/// The charge point core. Construct one per process with
/// [`ChargePoint::new`] and keep it behind the returned `Arc`.
pub struct ChargePoint {
    config: Arc<Configuration>,
    store: Arc<dyn Repository>,
    pki: Option<Arc<dyn PkiHandler>>,
    transport: Arc<dyn Transport>,
    queue: StdRwLock<Arc<MessageQueue>>,
    pub(crate) connectors: ConnectorTable,
    pub(crate) transactions: TransactionManager,
    pub(crate) smart_charging: SmartChargingHandler,
    pub(crate) callbacks: StdRwLock<Callbacks>,
    pub(crate) data_transfer_callbacks: DataTransferCallbacks,

    connection_state: StdRwLock<ConnectionState>,
    registration_status: StdRwLock<RegistrationStatus>,
    boot_time: StdRwLock<Option<DateTime<Utc>>>,
    connected: AtomicBool,
    initialized: AtomicBool,
    stopped: AtomicBool,

    /// Availability changes deferred until the blocking transaction ends
    pub(crate) change_availability_queue: StdMutex<HashMap<u32, AvailabilityType>>,
    /// Signalled on every StopTransactionResponse (Reset waits on this)
    pub(crate) stop_tx_notify: Notify,

    queue_worker: StdMutex<Option<JoinHandle<()>>>,
    heartbeat_timer: StdMutex<Option<JoinHandle<()>>>,
    boot_retry_timer: StdMutex<Option<JoinHandle<()>>>,
    clock_aligned_timer: StdMutex<Option<JoinHandle<()>>>,
    status_timers: StdMutex<HashMap<u32, JoinHandle<()>>>,

    /// Last reported statuses, re-sent on TriggerMessage
    pub(crate) diagnostics_status: StdMutex<DiagnosticsStatus>,
    pub(crate) firmware_status: StdMutex<FirmwareStatus>,
    pub(crate) log_status: StdMutex<(UploadLogStatus, i32)>,
    pub(crate) signed_firmware_status: StdMutex<(SignedFirmwareStatus, i32)>,
}

impl ChargePoint {
    pub fn new(
        settings: ChargePointSettings,
        store: Arc<dyn Repository>,
        transport: Arc<dyn Transport>,
        pki: Option<Arc<dyn PkiHandler>>,
    ) -> Arc<Self> {
        let config = Arc::new(Configuration::new(settings));
        let queue = Arc::new(MessageQueue::new(
            Arc::clone(&transport),
            config.transaction_message_attempts(),
            Duration::from_secs(config.transaction_message_retry_interval()),
        ));
        let connectors = ConnectorTable::new(config.number_of_connectors());

        let cp = Arc::new(Self {
            config,
            store,
            pki,
            transport,
            queue: StdRwLock::new(queue),
            connectors,
            transactions: TransactionManager::new(),
            smart_charging: SmartChargingHandler::new(),
            callbacks: StdRwLock::new(Callbacks::default()),
            data_transfer_callbacks: DataTransferCallbacks::default(),
            connection_state: StdRwLock::new(ConnectionState::Disconnected),
            registration_status: StdRwLock::new(RegistrationStatus::Pending),
            boot_time: StdRwLock::new(None),
            connected: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            stopped: AtomicBool::new(true),
            change_availability_queue: StdMutex::new(HashMap::new()),
            stop_tx_notify: Notify::new(),
            queue_worker: StdMutex::new(None),
            heartbeat_timer: StdMutex::new(None),
            boot_retry_timer: StdMutex::new(None),
            clock_aligned_timer: StdMutex::new(None),
            status_timers: StdMutex::new(HashMap::new()),
            diagnostics_status: StdMutex::new(DiagnosticsStatus::Idle),
            firmware_status: StdMutex::new(FirmwareStatus::Idle),
            log_status: StdMutex::new((UploadLogStatus::Idle, -1)),
            signed_firmware_status: StdMutex::new((SignedFirmwareStatus::Idle, -1)),
        });
        cp.install_send_gate(&cp.queue());
        cp
    }

    /// Gate consulted by the queue worker before every dequeue
    fn install_send_gate(self: &Arc<Self>, queue: &MessageQueue) {
        let weak = Arc::downgrade(self);
        queue.set_send_gate(Arc::new(move |message_type| {
            weak.upgrade()
                .map(|cp| cp.allowed_to_send(message_type))
                .unwrap_or(false)
        }));
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub(crate) fn repository(&self) -> &dyn Repository {
        self.store.as_ref()
    }

    pub(crate) fn pki_handler(&self) -> Option<&Arc<dyn PkiHandler>> {
        self.pki.as_ref()
    }

    pub(crate) fn queue(&self) -> Arc<MessageQueue> {
        Arc::clone(&self.queue.read().unwrap())
    }

    /// Register the host callbacks. Call before `start()`.
    pub fn register_callbacks(&self, callbacks: Callbacks) {
        *self.callbacks.write().unwrap() = callbacks;
    }

    pub fn register_data_transfer_callback(
        &self,
        vendor_id: &str,
        message_id: &str,
        callback: DataTransferCallback,
    ) {
        self.data_transfer_callbacks
            .register(vendor_id, message_id, callback);
    }

    pub(crate) fn callback<T: Clone>(&self, pick: impl Fn(&Callbacks) -> Option<T>) -> Option<T> {
        pick(&self.callbacks.read().unwrap())
    }

    // -- lifecycle ----------------------------------------------------------

    /// Start the runtime: queue worker, crash recovery, profile reload. The
    /// host connects the transport afterwards and calls `on_connected`.
    pub async fn start(self: &Arc<Self>) -> ChargePointResult<()> {
        info!("Starting charge point {}", self.config.charge_point_id());
        self.stopped.store(false, Ordering::SeqCst);

        let worker = self.queue().spawn();
        *self.queue_worker.lock().unwrap() = Some(worker);

        self.stop_pending_transactions().await?;
        self.load_charging_profiles().await?;
        Ok(())
    }

    /// Stop the runtime: stop active transactions, timers and the queue
    pub async fn stop(self: &Arc<Self>) -> ChargePointResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            warn!("Charge point already stopped");
            return Ok(());
        }
        info!("Stopping charge point {}", self.config.charge_point_id());
        self.initialized.store(false, Ordering::SeqCst);

        self.stop_all_transactions(Reason::Other).await;
        self.abort_timers();
        self.transactions.abort_all_samplers();
        self.queue().stop();
        if let Some(worker) = self.queue_worker.lock().unwrap().take() {
            worker.abort();
        }
        Ok(())
    }

    /// Restart after `stop()`: a fresh queue on the same transport, then the
    /// normal start path.
    pub async fn restart(self: &Arc<Self>) -> ChargePointResult<()> {
        if !self.stopped.load(Ordering::SeqCst) {
            warn!("Attempting to restart charge point that was not stopped");
            return Err(ChargePointError::invalid_state("not stopped"));
        }
        let queue = Arc::new(MessageQueue::new(
            Arc::clone(&self.transport),
            self.config.transaction_message_attempts(),
            Duration::from_secs(self.config.transaction_message_retry_interval()),
        ));
        self.install_send_gate(&queue);
        *self.queue.write().unwrap() = queue;
        self.start().await
    }

    fn abort_timers(&self) {
        for slot in [
            &self.heartbeat_timer,
            &self.boot_retry_timer,
            &self.clock_aligned_timer,
        ] {
            if let Some(handle) = slot.lock().unwrap().take() {
                handle.abort();
            }
        }
        let mut status_timers = self.status_timers.lock().unwrap();
        for (_, handle) in status_timers.drain() {
            handle.abort();
        }
    }

    // -- transport events ---------------------------------------------------

    /// The transport established (or re-established) the connection
    pub async fn on_connected(self: &Arc<Self>) {
        self.connected.store(true, Ordering::SeqCst);
        self.queue().resume();
        if let Some(cb) = self.callback(|c| c.connection_state_changed.clone()) {
            cb(true);
        }

        let state = self.connection_state();
        match state {
            ConnectionState::Booted => {
                // no BootNotification after a reconnect, but a
                // StatusNotification for every connector including 0
                for connector in 0..=self.connectors.count() {
                    let status = self
                        .connectors
                        .state(connector)
                        .unwrap_or(ChargePointStatus::Available);
                    self.status_notification(
                        connector,
                        self.connectors.error_code(connector),
                        status,
                    );
                }
            }
            _ => {
                *self.connection_state.write().unwrap() = ConnectionState::Connected;
                self.boot_notification();
            }
        }
    }

    /// The transport lost the connection
    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.queue().pause();
        if let Some(cb) = self.callback(|c| c.connection_state_changed.clone()) {
            cb(false);
        }
    }

    // -- outbound plumbing --------------------------------------------------

    pub(crate) fn allowed_to_send(&self, message_type: MessageType) -> bool {
        let always = matches!(
            message_type,
            MessageType::BootNotification | MessageType::StopTransaction
        );
        if !self.initialized.load(Ordering::SeqCst) {
            return always;
        }
        match self.registration_status() {
            RegistrationStatus::Rejected => {
                let boot_time = *self.boot_time.read().unwrap();
                if let Some(boot_time) = boot_time {
                    let retry_at = boot_time
                        + chrono::Duration::seconds(self.config.heartbeat_interval() as i64);
                    if Utc::now() < retry_at {
                        debug!("Rejected and retry deadline not reached, holding message");
                        return false;
                    }
                }
                true
            }
            RegistrationStatus::Pending => always,
            RegistrationStatus::Accepted => true,
        }
    }

    /// Queue a request, subject to allowed-to-send gating
    pub(crate) fn send_request<T: OcppAction>(&self, request: &T) -> bool {
        let message_type = match MessageType::from_action(T::ACTION_NAME) {
            Some(mt) => mt,
            None => return false,
        };
        if !self.allowed_to_send(message_type) {
            debug!("Not allowed to send {} in current state", T::ACTION_NAME);
            return false;
        }
        match utils::create_call(request) {
            Ok(call) => {
                self.queue().push(call);
                true
            }
            Err(e) => {
                error!("Failed to build {}: {}", T::ACTION_NAME, e);
                false
            }
        }
    }

    /// Queue a request and await its response (or offline notification)
    pub(crate) async fn send_request_async<T: OcppAction>(
        &self,
        request: &T,
    ) -> ChargePointResult<EnhancedMessage> {
        let call = utils::create_call(request)?;
        let rx = self.queue().push_with_waiter(call);
        rx.await.map_err(|_| ChargePointError::Stopped)
    }

    pub(crate) async fn send_response<T: OcppResponse>(&self, unique_id: String, response: &T) {
        match utils::create_call_result(unique_id, response) {
            Ok(result) => {
                if let Err(e) = self.queue().send_call_result(result).await {
                    warn!("Failed to send response: {}", e);
                }
            }
            Err(e) => error!("Failed to encode response: {}", e),
        }
    }

    pub(crate) async fn send_call_error(&self, error_message: CallErrorMessage) {
        if let Err(e) = self.queue().send_call_error(error_message).await {
            warn!("Failed to send CallError: {}", e);
        }
    }

    // -- periodic messages --------------------------------------------------

    pub(crate) fn boot_notification(self: &Arc<Self>) {
        debug!("Sending BootNotification");
        let request = BootNotificationRequest::from(&self.config.settings().info);
        self.send_request(&request);
    }

    pub(crate) fn heartbeat(&self) {
        debug!("Sending Heartbeat");
        self.send_request(&HeartbeatRequest {});
    }

    fn start_heartbeat_timer(self: &Arc<Self>) {
        let cp = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let interval = cp.config.heartbeat_interval().max(1);
                tokio::time::sleep(Duration::from_secs(interval)).await;
                cp.heartbeat();
            }
        });
        if let Some(previous) = self.heartbeat_timer.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn schedule_boot_retry(self: &Arc<Self>, delay_s: u64) {
        let cp = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_s.max(1))).await;
            cp.boot_notification();
        });
        if let Some(previous) = self.boot_retry_timer.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// (Re)start the clock-aligned sampler after boot or a configuration
    /// change. A zero interval disables the feature.
    pub(crate) fn restart_clock_aligned_timer(self: &Arc<Self>) {
        let cp = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let interval = cp.config.clock_aligned_data_interval();
                if interval == 0 {
                    return;
                }
                let wait = seconds_to_next_aligned_sample(Utc::now(), interval);
                tokio::time::sleep(wait).await;
                cp.clock_aligned_sample().await;
            }
        });
        if let Some(previous) = self.clock_aligned_timer.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    async fn clock_aligned_sample(&self) {
        if !self.initialized.load(Ordering::SeqCst) {
            return;
        }
        debug!("Taking clock-aligned meter samples");
        let measurands = self.config.meter_values_aligned_data();
        for connector in 1..=self.connectors.count() {
            let Some(meter_value) = self.connectors.latest_meter_value(
                connector,
                &measurands,
                ReadingContext::SampleClock,
            ) else {
                continue;
            };
            if meter_value.sampled_value.is_empty() {
                continue;
            }
            self.transactions
                .add_meter_value(connector, meter_value.clone())
                .await;
            self.send_meter_value(connector, meter_value).await;
        }
    }

    pub(crate) async fn send_meter_value(&self, connector: u32, meter_value: MeterValue) {
        if meter_value.sampled_value.is_empty() {
            return;
        }
        let transaction_id = self
            .transactions
            .transaction_id(connector)
            .await
            .filter(|id| id.is_assigned())
            .map(|id| id.value());
        let request = MeterValuesRequest {
            connector_id: connector,
            transaction_id,
            meter_value: vec![meter_value],
        };
        self.send_request(&request);
    }

    // -- status notifications -----------------------------------------------

    pub(crate) fn status_notification(
        &self,
        connector: u32,
        error_code: ChargePointErrorCode,
        status: ChargePointStatus,
    ) {
        let request = StatusNotificationRequest {
            connector_id: connector,
            error_code,
            info: None,
            status,
            timestamp: Some(Utc::now()),
            vendor_id: None,
            vendor_error_code: None,
        };
        self.send_request(&request);
    }

    /// Drive a connector state machine and schedule the debounced
    /// StatusNotification. Any further transition within the debounce window
    /// replaces the pending notification.
    pub(crate) fn submit_connector_event(self: &Arc<Self>, connector: u32, event: ConnectorEvent) {
        let Some(transition) = self.connectors.submit_event(connector, event) else {
            warn!("Event for unknown connector {}", connector);
            return;
        };
        if !transition.changed {
            return;
        }
        self.schedule_status_notification(connector, transition);
    }

    fn schedule_status_notification(self: &Arc<Self>, connector: u32, transition: StateTransition) {
        let debounce = self.config.minimum_status_duration();
        let mut timers = self.status_timers.lock().unwrap();
        if let Some(pending) = timers.remove(&connector) {
            pending.abort();
        }
        let cp = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if debounce > 0 {
                tokio::time::sleep(Duration::from_secs(debounce)).await;
            }
            cp.status_notification(connector, transition.error_code, transition.to);
        });
        timers.insert(connector, handle);
    }

    // -- inbound ------------------------------------------------------------

    /// Entry point for raw frames from the transport
    pub async fn handle_message(self: &Arc<Self>, raw: &str) -> ChargePointResult<()> {
        let enhanced = match self.queue().receive(raw) {
            Ok(enhanced) => enhanced,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return Err(e.into());
            }
        };
        self.dispatch(enhanced).await;
        Ok(())
    }

    pub(crate) fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().unwrap()
    }

    pub(crate) fn registration_status(&self) -> RegistrationStatus {
        *self.registration_status.read().unwrap()
    }

    // -- boot handling (called from the dispatcher) -------------------------

    pub(crate) async fn handle_boot_notification_response(
        self: &Arc<Self>,
        response: BootNotificationResponse,
    ) {
        info!("BootNotification answered with {:?}", response.status);
        *self.registration_status.write().unwrap() = response.status;
        self.initialized.store(true, Ordering::SeqCst);
        *self.boot_time.write().unwrap() = Some(Utc::now());
        if response.interval > 0 {
            self.config.set_heartbeat_interval(response.interval);
        }
        if let Some(cb) = self.callback(|c| c.set_system_time.clone()) {
            cb(response.current_time.to_rfc3339());
        }

        match response.status {
            RegistrationStatus::Accepted => {
                *self.connection_state.write().unwrap() = ConnectionState::Booted;
                self.start_heartbeat_timer();
                self.restart_clock_aligned_timer();

                let availability = self
                    .store
                    .get_all_connector_availability()
                    .await
                    .unwrap_or_default();
                self.connectors.seed_from_availability(&availability);
                // initial notifications are not debounced
                for connector in 0..=self.connectors.count() {
                    let status = self
                        .connectors
                        .state(connector)
                        .unwrap_or(ChargePointStatus::Available);
                    self.status_notification(
                        connector,
                        self.connectors.error_code(connector),
                        status,
                    );
                }
            }
            RegistrationStatus::Pending => {
                *self.connection_state.write().unwrap() = ConnectionState::Pending;
                self.schedule_boot_retry(response.interval.max(0) as u64);
            }
            RegistrationStatus::Rejected => {
                *self.connection_state.write().unwrap() = ConnectionState::Rejected;
                let delay = if response.interval > 0 {
                    response.interval as u64
                } else {
                    self.config.heartbeat_interval()
                };
                debug!("BootNotification rejected, retrying in {}s", delay);
                self.schedule_boot_retry(delay);
            }
        }
        // the new registration state may unblock gated messages
        self.queue().kick();
    }

    // -- transactions -------------------------------------------------------

    /// A local charging session began (plug-in or authorization)
    pub fn on_session_started(
        self: &Arc<Self>,
        connector: u32,
        session_id: &str,
        reason: SessionStartedReason,
    ) {
        debug!(connector, session_id, ?reason, "Session started");
        let reserved = self.connectors.state(connector) == Some(ChargePointStatus::Reserved);
        if !reserved || reason == SessionStartedReason::Authorized {
            self.submit_connector_event(connector, ConnectorEvent::UsageInitiated);
        }
    }

    /// The session ended without (or after) a transaction
    pub fn on_session_stopped(self: &Arc<Self>, connector: u32) {
        match self.connectors.state(connector) {
            Some(ChargePointStatus::Faulted) => {
                self.submit_connector_event(connector, ConnectorEvent::ReturnToAvailable);
            }
            Some(ChargePointStatus::Reserved) | Some(ChargePointStatus::Unavailable) | None => {}
            _ => {
                self.submit_connector_event(connector, ConnectorEvent::BecomeAvailable);
            }
        }
    }

    /// Energy delivery to the EV began; creates and persists the
    /// transaction and issues StartTransaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn on_transaction_started(
        self: &Arc<Self>,
        connector: u32,
        session_id: &str,
        id_token: &str,
        meter_start: i32,
        reservation_id: Option<i32>,
        timestamp: DateTime<Utc>,
        signed_meter_value: Option<String>,
    ) -> ChargePointResult<()> {
        if !self.connectors.exists(connector) || connector == 0 {
            return Err(ChargePointError::UnknownConnector(connector));
        }
        if self.connectors.state(connector) == Some(ChargePointStatus::Reserved) {
            self.submit_connector_event(connector, ConnectorEvent::UsageInitiated);
        }

        let mut transaction = Transaction::new(
            connector,
            session_id.to_string(),
            id_token.to_string(),
            meter_start,
            reservation_id,
            timestamp,
        );
        if let Some(signed) = signed_meter_value {
            transaction.add_meter_value(signed_meter_value_entry(
                signed,
                ReadingContext::TransactionBegin,
                timestamp,
            ));
        }

        let request = StartTransactionRequest {
            connector_id: connector,
            id_tag: id_token.to_string(),
            meter_start,
            reservation_id,
            timestamp,
        };
        let call = utils::create_call(&request)?;
        transaction.set_start_message_id(call.unique_id.clone());

        self.store
            .insert_transaction(TransactionRow {
                session_id: session_id.to_string(),
                transaction_id: TransactionId::UNASSIGNED.value(),
                connector_id: connector,
                id_tag: id_token.to_string(),
                start_time: timestamp,
                meter_start,
                reservation_id,
                parent_id_tag: None,
                last_meter_wh: None,
                meter_stop: None,
                stop_time: None,
                stop_reason: None,
            })
            .await
            .map_err(|e| ChargePointError::store(e.to_string()))?;

        self.transactions.add_transaction(transaction).await;
        self.connectors
            .set_transaction_session(connector, Some(session_id.to_string()));
        self.start_meter_sampler(connector);

        // StartTransaction is transactional: queue it regardless of the
        // registration gate, the queue holds it until sending is allowed
        self.queue().push(call);
        Ok(())
    }

    fn start_meter_sampler(self: &Arc<Self>, connector: u32) {
        let cp = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let interval = cp.config.meter_value_sample_interval();
                if interval == 0 {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
                let measurands = cp.config.meter_values_sampled_data();
                let Some(meter_value) = cp.connectors.latest_meter_value(
                    connector,
                    &measurands,
                    ReadingContext::SamplePeriodic,
                ) else {
                    continue;
                };
                if meter_value.sampled_value.is_empty() {
                    continue;
                }
                cp.transactions
                    .add_meter_value(connector, meter_value.clone())
                    .await;
                // track the last sample for crash recovery
                if let Some(energy) = energy_import_total(&meter_value) {
                    if let Some(session_id) = cp.connectors.transaction_session(connector) {
                        if let Err(e) = cp
                            .store
                            .update_transaction_meter(&session_id, energy.round() as i32)
                            .await
                        {
                            warn!("Failed to persist meter sample: {}", e);
                        }
                    }
                }
                cp.send_meter_value(connector, meter_value).await;
            }
        });
        self.transactions.register_sampler(connector, handle);
    }

    /// Energy delivery ended; issues StopTransaction with the buffered
    /// transaction data.
    #[allow(clippy::too_many_arguments)]
    pub async fn on_transaction_stopped(
        self: &Arc<Self>,
        connector: u32,
        session_id: &str,
        reason: Reason,
        timestamp: DateTime<Utc>,
        energy_wh_import: f32,
        id_tag_end: Option<String>,
        signed_meter_value: Option<String>,
    ) -> ChargePointResult<()> {
        self.submit_connector_event(
            connector,
            ConnectorEvent::TransactionStoppedAndUserActionRequired,
        );

        let Some(mut transaction) = self.transactions.take_active(connector).await else {
            warn!(connector, "Stop for a connector without active transaction");
            return Err(ChargePointError::NoActiveTransaction(connector));
        };

        if let Some(signed) = signed_meter_value {
            transaction.add_meter_value(signed_meter_value_entry(
                signed,
                ReadingContext::TransactionEnd,
                timestamp,
            ));
        }
        transaction.add_stop_energy(StampedEnergy {
            timestamp,
            energy_wh: energy_wh_import,
        });

        if reason == Reason::EVDisconnected && self.config.unlock_connector_on_ev_side_disconnect()
        {
            if let Some(cb) = self.callback(|c| c.unlock_connector.clone()) {
                cb(connector);
            }
        }

        let meter_stop = energy_wh_import.round() as i32;
        let transaction_data: Vec<MeterValue> = transaction.transaction_data().to_vec();
        let request = StopTransactionRequest {
            id_tag: id_tag_end,
            meter_stop,
            timestamp,
            transaction_id: transaction.transaction_id().value(),
            reason: Some(reason),
            transaction_data: if transaction_data.is_empty() {
                None
            } else {
                Some(transaction_data)
            },
        };
        let call = utils::create_call(&request)?;
        transaction.set_stop_message_id(call.unique_id.clone());
        transaction.set_finished();

        // StopTransaction is always allowed to be queued
        self.queue().push(call);
        self.transactions.insert_stopped(transaction).await;

        self.store
            .close_transaction(session_id, meter_stop, timestamp, reason)
            .await
            .map_err(|e| ChargePointError::store(e.to_string()))?;

        self.transactions.abort_sampler(connector);
        self.connectors.set_transaction_session(connector, None);
        self.smart_charging.clear_tx_profiles(connector);
        Ok(())
    }

    /// Ask the host to stop every active transaction with the given reason
    pub(crate) async fn stop_all_transactions(self: &Arc<Self>, reason: Reason) {
        let connectors = self.transactions.active_connectors().await;
        if connectors.is_empty() {
            return;
        }
        let Some(cb) = self.callback(|c| c.stop_transaction.clone()) else {
            warn!("No stop_transaction callback registered");
            return;
        };
        for connector in connectors {
            cb(connector, reason);
        }
    }

    /// Close transactions left open by a crash: enqueue a StopTransaction
    /// with reason PowerLoss for each, exactly once.
    async fn stop_pending_transactions(&self) -> ChargePointResult<()> {
        let open = self
            .store
            .unfinished_transactions()
            .await
            .map_err(|e| ChargePointError::store(e.to_string()))?;
        if open.is_empty() {
            return Ok(());
        }
        info!("Recovering {} interrupted transaction(s)", open.len());
        for row in open {
            let meter_stop = row.last_meter_wh.unwrap_or(row.meter_start);
            let timestamp = Utc::now();
            let request = StopTransactionRequest {
                id_tag: None,
                meter_stop,
                timestamp,
                transaction_id: row.transaction_id,
                reason: Some(Reason::PowerLoss),
                transaction_data: None,
            };
            let call = utils::create_call(&request)?;
            self.queue().push(call);
            self.store
                .close_transaction(&row.session_id, meter_stop, timestamp, Reason::PowerLoss)
                .await
                .map_err(|e| ChargePointError::store(e.to_string()))?;
        }
        Ok(())
    }

    /// Reload persisted charging profiles, dropping the ones that no longer
    /// validate.
    async fn load_charging_profiles(&self) -> ChargePointResult<()> {
        let profiles = self
            .store
            .charging_profiles()
            .await
            .map_err(|e| ChargePointError::store(e.to_string()))?;
        if profiles.is_empty() {
            return Ok(());
        }
        info!("Found {} charging profile(s) in the store", profiles.len());
        let limits = self.profile_limits();
        for profile in profiles {
            let connector = self
                .store
                .connector_for_profile(profile.charging_profile_id)
                .await
                .map_err(|e| ChargePointError::store(e.to_string()))?
                .unwrap_or(0);
            let valid = self.smart_charging.validate_profile(
                &profile,
                connector,
                false,
                self.connectors.count(),
                &limits,
                None,
            );
            if valid {
                self.smart_charging.add_profile(profile, connector);
            } else {
                self.store
                    .delete_charging_profile(profile.charging_profile_id)
                    .await
                    .map_err(|e| ChargePointError::store(e.to_string()))?;
            }
        }
        Ok(())
    }

    pub(crate) fn profile_limits(&self) -> ProfileLimits {
        ProfileLimits {
            max_stack_level: self.config.charge_profile_max_stack_level(),
            max_installed: self.config.max_charging_profiles_installed(),
            max_periods: self.config.charging_schedule_max_periods(),
            allowed_units: self.config.allowed_charging_rate_units(),
        }
    }

    // -- hardware events ----------------------------------------------------

    pub fn on_meter_values(&self, connector: u32, powermeter: Powermeter) {
        self.connectors.set_powermeter(connector, powermeter);
    }

    pub fn on_max_current_offered(&self, connector: u32, amps: f32) {
        self.connectors.set_max_current_offered(connector, amps);
    }

    pub fn on_error(self: &Arc<Self>, connector: u32, error_code: ChargePointErrorCode) {
        self.submit_connector_event(connector, ConnectorEvent::FaultDetected(error_code));
    }

    pub fn on_fault_cleared(self: &Arc<Self>, connector: u32) {
        self.submit_connector_event(connector, ConnectorEvent::ReturnToAvailable);
    }

    pub fn on_suspend_charging_ev(self: &Arc<Self>, connector: u32) {
        self.submit_connector_event(connector, ConnectorEvent::PauseChargingEV);
    }

    pub fn on_suspend_charging_evse(self: &Arc<Self>, connector: u32) {
        self.submit_connector_event(connector, ConnectorEvent::PauseChargingEVSE);
    }

    pub fn on_resume_charging(self: &Arc<Self>, connector: u32) {
        self.submit_connector_event(connector, ConnectorEvent::StartCharging);
    }

    pub fn on_reservation_start(self: &Arc<Self>, connector: u32) {
        self.submit_connector_event(connector, ConnectorEvent::ReserveConnector);
    }

    pub fn on_reservation_end(self: &Arc<Self>, connector: u32) {
        self.submit_connector_event(connector, ConnectorEvent::BecomeAvailable);
    }

    // -- status notifications from the host ---------------------------------

    pub fn on_log_status_notification(&self, request_id: i32, status: UploadLogStatus) {
        // request id -1 means the legacy DiagnosticsStatusNotification path
        if request_id != -1 {
            self.log_status_notification(status, request_id);
        } else {
            let status = match status {
                UploadLogStatus::Uploaded => DiagnosticsStatus::Uploaded,
                UploadLogStatus::Uploading => DiagnosticsStatus::Uploading,
                UploadLogStatus::UploadFailure => DiagnosticsStatus::UploadFailed,
                _ => DiagnosticsStatus::Idle,
            };
            self.diagnostics_status_notification(status);
        }
    }

    pub fn on_firmware_update_status_notification(
        &self,
        request_id: i32,
        status: SignedFirmwareStatus,
    ) {
        if request_id != -1 {
            self.signed_firmware_update_status_notification(status, request_id);
        } else {
            let status = match status {
                SignedFirmwareStatus::Downloaded => FirmwareStatus::Downloaded,
                SignedFirmwareStatus::DownloadFailed => FirmwareStatus::DownloadFailed,
                SignedFirmwareStatus::Downloading => FirmwareStatus::Downloading,
                SignedFirmwareStatus::InstallationFailed => FirmwareStatus::InstallationFailed,
                SignedFirmwareStatus::Installing => FirmwareStatus::Installing,
                SignedFirmwareStatus::Installed => FirmwareStatus::Installed,
                _ => FirmwareStatus::Idle,
            };
            self.firmware_status_notification(status);
        }
    }

    pub(crate) fn diagnostics_status_notification(&self, status: DiagnosticsStatus) {
        *self.diagnostics_status.lock().unwrap() = status;
        self.send_request(&DiagnosticsStatusNotificationRequest { status });
    }

    pub(crate) fn firmware_status_notification(&self, status: FirmwareStatus) {
        *self.firmware_status.lock().unwrap() = status;
        self.send_request(&FirmwareStatusNotificationRequest { status });
    }

    pub(crate) fn log_status_notification(&self, status: UploadLogStatus, request_id: i32) {
        *self.log_status.lock().unwrap() = (status, request_id);
        self.send_request(&LogStatusNotificationRequest { status, request_id });
    }

    pub(crate) fn signed_firmware_update_status_notification(
        &self,
        status: SignedFirmwareStatus,
        request_id: i32,
    ) {
        *self.signed_firmware_status.lock().unwrap() = (status, request_id);
        self.send_request(&SignedFirmwareStatusNotificationRequest { status, request_id });
        if status == SignedFirmwareStatus::InvalidSignature {
            self.security_event_notification(
                SecurityEvent::InvalidFirmwareSignature,
                Some("Invalid firmware signature".to_string()),
            );
        }
    }

    pub(crate) fn security_event_notification(
        &self,
        event_type: SecurityEvent,
        tech_info: Option<String>,
    ) {
        let request = SecurityEventNotificationRequest {
            event_type,
            timestamp: Utc::now(),
            tech_info,
        };
        self.send_request(&request);
    }

    /// Build and send a SignCertificate CSR through the PKI handler
    pub(crate) fn sign_certificate(&self) {
        let Some(pki) = self.pki.as_ref() else {
            warn!("No PKI handler configured, cannot sign certificate");
            return;
        };
        let Some(cpo_name) = self.config.cpo_name() else {
            warn!("CpoName not configured, cannot build CSR");
            return;
        };
        let serial = self
            .config
            .settings()
            .info
            .charge_box_serial_number
            .clone()
            .unwrap_or_default();
        match pki.generate_csr(&cpo_name, &serial) {
            Some(csr) => {
                self.send_request(&SignCertificateRequest { csr });
            }
            None => warn!("PKI handler failed to generate a CSR"),
        }
    }

    // -- core profile public API --------------------------------------------

    /// Authorize an id token: local list, then cache, then the Central
    /// System, honoring the pre-authorize and offline policies.
    pub async fn authorize_id_token(self: &Arc<Self>, id_tag: &str) -> IdTagInfo {
        let connected = self.connected.load(Ordering::SeqCst);
        let local_allowed = (self.config.local_pre_authorize() && connected)
            || (self.config.local_authorize_offline() && !connected);

        if local_allowed {
            if self.config.local_auth_list_enabled() {
                if let Ok(Some(info)) = self.store.get_local_authorization_entry(id_tag).await {
                    info!("Found id tag {} in local authorization list", id_tag);
                    return info;
                }
            }
            if self.config.authorization_cache_enabled() {
                if let Some(info) = self.validate_against_cache(id_tag).await {
                    info!("Found valid id tag {} in authorization cache", id_tag);
                    return info;
                }
            }
        }

        let request = AuthorizeRequest {
            id_tag: id_tag.to_string(),
        };
        let enhanced = match self.send_request_async(&request).await {
            Ok(enhanced) => enhanced,
            Err(_) => return IdTagInfo::invalid(),
        };

        if !enhanced.offline {
            if let Some(ocpp_types::Message::CallResult(result)) = enhanced.message {
                if let Ok(response) = result.payload_as::<AuthorizeResponse>() {
                    if response.id_tag_info.status == AuthorizationStatus::Accepted
                        && self.config.authorization_cache_enabled()
                    {
                        if let Err(e) = self
                            .store
                            .upsert_authorization_cache_entry(id_tag, response.id_tag_info.clone())
                            .await
                        {
                            warn!("Failed to cache authorization: {}", e);
                        }
                    }
                    return response.id_tag_info;
                }
            }
            return IdTagInfo::invalid();
        }

        if self.config.allow_offline_tx_for_unknown_id() {
            return IdTagInfo::accepted();
        }
        IdTagInfo::invalid()
    }

    /// Accepted cache entries past their expiry date are rewritten to
    /// Expired and rejected.
    async fn validate_against_cache(&self, id_tag: &str) -> Option<IdTagInfo> {
        let entry = self
            .store
            .get_authorization_cache_entry(id_tag)
            .await
            .ok()??;
        if entry.status != AuthorizationStatus::Accepted {
            return None;
        }
        if let Some(expiry) = entry.expiry_date {
            if expiry < Utc::now() {
                let mut expired = entry;
                expired.status = AuthorizationStatus::Expired;
                let _ = self
                    .store
                    .upsert_authorization_cache_entry(id_tag, expired)
                    .await;
                return None;
            }
        }
        Some(entry)
    }

    /// Vendor-specific DataTransfer towards the Central System
    pub async fn data_transfer(
        self: &Arc<Self>,
        vendor_id: &str,
        message_id: Option<&str>,
        data: Option<String>,
    ) -> DataTransferResponse {
        let rejected = DataTransferResponse {
            status: DataTransferStatus::Rejected,
            data: None,
        };
        let request = DataTransferRequest {
            vendor_id: vendor_id.to_string(),
            message_id: message_id.map(String::from),
            data,
        };
        let enhanced = match self.send_request_async(&request).await {
            Ok(enhanced) => enhanced,
            Err(_) => return rejected,
        };
        if enhanced.offline {
            // offline is reported as Rejected, the closest status the
            // protocol offers
            return rejected;
        }
        match enhanced.message {
            Some(ocpp_types::Message::CallResult(result)) => result
                .payload_as::<DataTransferResponse>()
                .unwrap_or(rejected),
            _ => rejected,
        }
    }

    /// Composite schedules for all connectors (0 = whole charge point)
    pub async fn get_all_composite_charging_schedules(
        &self,
        duration_s: i32,
    ) -> HashMap<u32, ChargingSchedule> {
        let mut schedules = HashMap::new();
        let start = Utc::now();
        for connector in 0..=self.connectors.count() {
            let tx_start = self
                .transactions
                .get(connector)
                .await
                .map(|tx| tx.start_time);
            let schedule = self.smart_charging.composite_schedule(
                connector,
                start,
                duration_s,
                ChargingRateUnitType::A,
                self.config.connector_phases(),
                tx_start,
            );
            schedules.insert(connector, schedule);
        }
        schedules
    }

    // -- reset support (used by the dispatcher) -----------------------------

    /// Wait until all active transactions are acknowledged, then stop the
    /// runtime and invoke the host reset callback. Runs as a separate task
    /// so the dispatcher is not blocked.
    pub(crate) fn spawn_reset_task(self: &Arc<Self>, reset_type: ResetType) {
        let cp = Arc::clone(self);
        tokio::spawn(async move {
            debug!("Waiting for transactions to stop before reset");
            let deadline = tokio::time::Instant::now() + RESET_STOP_TIMEOUT;
            while cp.transactions.any_active().await {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    warn!("Reset proceeding with transactions still pending");
                    break;
                }
                let _ = tokio::time::timeout(remaining, cp.stop_tx_notify.notified()).await;
            }
            if let Err(e) = cp.stop().await {
                warn!("Stop before reset failed: {}", e);
            }
            if let Some(cb) = cp.callback(|c| c.reset.clone()) {
                cb(reset_type);
            }
        });
    }
}

/// Time until the next sample instant aligned to midnight UTC
fn seconds_to_next_aligned_sample(now: DateTime<Utc>, interval_s: u64) -> Duration {
    let seconds_today = now.num_seconds_from_midnight() as u64;
    let next = (seconds_today / interval_s + 1) * interval_s;
    let wait = next - seconds_today;
    Duration::from_secs(wait.max(1))
}

fn signed_meter_value_entry(
    signed_value: String,
    context: ReadingContext,
    timestamp: DateTime<Utc>,
) -> MeterValue {
    MeterValue {
        timestamp,
        sampled_value: vec![SampledValue {
            value: signed_value,
            context: Some(context),
            format: Some(ValueFormat::SignedData),
            measurand: None,
            phase: None,
            location: None,
            unit: None,
        }],
    }
}

/// Total imported energy (Wh) carried by a sample, if present
fn energy_import_total(meter_value: &MeterValue) -> Option<f32> {
    meter_value
        .sampled_value
        .iter()
        .find(|sample| {
            sample.measurand == Some(Measurand::EnergyActiveImportRegister)
                && sample.phase.is_none()
        })
        .and_then(|sample| sample.value.parse().ok())
}

// re-exports for hosts
pub use ocpp_messages as messages;
pub use ocpp_types as types;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    pub(crate) struct ChannelTransport {
        pub frames: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn send_frame(&self, frame: String) -> bool {
            self.frames.send(frame).is_ok()
        }
    }

    pub(crate) fn charge_point() -> (Arc<ChargePoint>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cp = ChargePoint::new(
            ChargePointSettings::default(),
            Arc::new(InMemoryRepository::new()),
            Arc::new(ChannelTransport { frames: tx }),
            None,
        );
        (cp, rx)
    }

    pub(crate) async fn recv_call(
        rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> ocpp_types::CallMessage {
        let frame = rx.recv().await.expect("expected a frame");
        match ocpp_types::Message::from_frame(&frame).unwrap() {
            ocpp_types::Message::Call(call) => call,
            other => panic!("expected CALL, got {:?}", other),
        }
    }

    pub(crate) fn result_frame(unique_id: &str, payload: serde_json::Value) -> String {
        format!("[3,\"{}\",{}]", unique_id, payload)
    }

    #[test]
    fn test_aligned_sample_arithmetic() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T00:10:30Z")
            .unwrap()
            .with_timezone(&Utc);
        // 900 s interval: next boundary at 00:15:00
        assert_eq!(
            seconds_to_next_aligned_sample(now, 900),
            Duration::from_secs(270)
        );
        // exactly on a boundary: the full interval
        let on_boundary = DateTime::parse_from_rfc3339("2024-05-01T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            seconds_to_next_aligned_sample(on_boundary, 3600),
            Duration::from_secs(3600)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_boot_accepted_starts_heartbeat() {
        let (cp, mut rx) = charge_point();
        cp.start().await.unwrap();
        cp.config().set_internal("HeartbeatInterval", "1");
        cp.on_connected().await;

        let boot = recv_call(&mut rx).await;
        assert_eq!(boot.action, "BootNotification");
        assert_eq!(
            boot.payload["chargePointVendor"],
            serde_json::json!(cp.config().settings().info.charge_point_vendor)
        );

        cp.handle_message(&result_frame(
            &boot.unique_id,
            serde_json::json!({
                "currentTime": "2024-01-01T00:00:00Z",
                "interval": 1,
                "status": "Accepted"
            }),
        ))
        .await
        .unwrap();

        assert_eq!(cp.connection_state(), ConnectionState::Booted);
        assert_eq!(cp.registration_status(), RegistrationStatus::Accepted);

        // initial StatusNotifications for connectors 0..=2
        for _ in 0..=cp.connectors.count() {
            let call = recv_call(&mut rx).await;
            assert_eq!(call.action, "StatusNotification");
        }

        // heartbeat fires after the server-chosen interval
        let heartbeat = recv_call(&mut rx).await;
        assert_eq!(heartbeat.action, "Heartbeat");
        cp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_boot_pending_defers_other_messages() {
        let (cp, mut rx) = charge_point();
        cp.start().await.unwrap();
        cp.on_connected().await;

        let boot = recv_call(&mut rx).await;
        cp.handle_message(&result_frame(
            &boot.unique_id,
            serde_json::json!({
                "currentTime": "2024-01-01T00:00:00Z",
                "interval": 30,
                "status": "Pending"
            }),
        ))
        .await
        .unwrap();

        assert_eq!(cp.connection_state(), ConnectionState::Pending);
        assert!(cp.allowed_to_send(MessageType::BootNotification));
        assert!(cp.allowed_to_send(MessageType::StopTransaction));
        assert!(!cp.allowed_to_send(MessageType::Heartbeat));
        assert!(!cp.allowed_to_send(MessageType::StatusNotification));
        cp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_start_stop_patches_transaction_id() {
        let (cp, mut rx) = charge_point();
        cp.start().await.unwrap();

        // transport down: transactions still happen locally
        let t0 = Utc::now();
        cp.on_transaction_started(1, "sess-1", "T1", 1000, None, t0, None)
            .await
            .unwrap();
        cp.on_transaction_stopped(
            1,
            "sess-1",
            Reason::EVDisconnected,
            t0 + chrono::Duration::seconds(60),
            1500.0,
            None,
            None,
        )
        .await
        .unwrap();

        // reconnect: StartTransaction goes out first
        cp.on_connected().await;
        let boot = recv_call(&mut rx).await;
        assert_eq!(boot.action, "BootNotification");
        cp.handle_message(&result_frame(
            &boot.unique_id,
            serde_json::json!({
                "currentTime": "2024-01-01T00:00:00Z",
                "interval": 300,
                "status": "Accepted"
            }),
        ))
        .await
        .unwrap();

        // skip the initial status notifications
        let mut call = recv_call(&mut rx).await;
        while call.action == "StatusNotification" {
            call = recv_call(&mut rx).await;
        }
        assert_eq!(call.action, "StartTransaction");

        cp.handle_message(&result_frame(
            &call.unique_id,
            serde_json::json!({
                "idTagInfo": {"status": "Accepted"},
                "transactionId": 42
            }),
        ))
        .await
        .unwrap();

        let stop = recv_call(&mut rx).await;
        assert_eq!(stop.action, "StopTransaction");
        assert_eq!(stop.payload["transactionId"], 42);
        assert_eq!(stop.payload["meterStop"], 1500);
        cp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_crash_recovery_enqueues_power_loss_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = Arc::new(InMemoryRepository::new());
        store
            .insert_transaction(TransactionRow {
                session_id: "sess-crashed".into(),
                transaction_id: 17,
                connector_id: 1,
                id_tag: "T1".into(),
                start_time: Utc::now(),
                meter_start: 1000,
                reservation_id: None,
                parent_id_tag: None,
                last_meter_wh: Some(1450),
                meter_stop: None,
                stop_time: None,
                stop_reason: None,
            })
            .await
            .unwrap();

        let cp = ChargePoint::new(
            ChargePointSettings::default(),
            store.clone(),
            Arc::new(ChannelTransport { frames: tx }),
            None,
        );
        cp.start().await.unwrap();
        cp.queue().resume();

        let stop = recv_call(&mut rx).await;
        assert_eq!(stop.action, "StopTransaction");
        assert_eq!(stop.payload["transactionId"], 17);
        assert_eq!(stop.payload["reason"], "PowerLoss");
        // last persisted sample, not meterStart
        assert_eq!(stop.payload["meterStop"], 1450);

        // the row is closed: a second recovery pass finds nothing
        assert!(store.unfinished_transactions().await.unwrap().is_empty());
        cp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_authorize_offline_policy() {
        let (cp, _rx) = charge_point();
        cp.start().await.unwrap();
        // offline, unknown tag, AllowOfflineTxForUnknownId enabled
        cp.config()
            .set_internal("AllowOfflineTxForUnknownId", "true");
        cp.config().set_internal("LocalAuthorizeOffline", "false");

        // queue is paused (offline): the future completes offline
        let queue = cp.queue();
        let cp2 = Arc::clone(&cp);
        let authorize = tokio::spawn(async move { cp2.authorize_id_token("UNKNOWN").await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.pause();
        let info = authorize.await.unwrap();
        assert_eq!(info.status, AuthorizationStatus::Accepted);

        cp.config()
            .set_internal("AllowOfflineTxForUnknownId", "false");
        let cp2 = Arc::clone(&cp);
        let authorize = tokio::spawn(async move { cp2.authorize_id_token("UNKNOWN").await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cp.queue().pause();
        let info = authorize.await.unwrap();
        assert_eq!(info.status, AuthorizationStatus::Invalid);
        cp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_authorize_prefers_local_list_when_offline() {
        let (cp, _rx) = charge_point();
        cp.start().await.unwrap();
        cp.repository()
            .upsert_local_authorization_entries(vec![AuthorizationData {
                id_tag: "LOCAL1".into(),
                id_tag_info: Some(IdTagInfo::accepted()),
            }])
            .await
            .unwrap();

        // LocalAuthorizeOffline defaults to true and we are offline
        let info = cp.authorize_id_token("LOCAL1").await;
        assert_eq!(info.status, AuthorizationStatus::Accepted);
        cp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_cache_entry_rewritten() {
        let (cp, _rx) = charge_point();
        cp.start().await.unwrap();
        cp.repository()
            .upsert_authorization_cache_entry(
                "CACHED",
                IdTagInfo {
                    status: AuthorizationStatus::Accepted,
                    expiry_date: Some(Utc::now() - chrono::Duration::hours(1)),
                    parent_id_tag: None,
                },
            )
            .await
            .unwrap();
        cp.config()
            .set_internal("AllowOfflineTxForUnknownId", "false");

        let cp2 = Arc::clone(&cp);
        let authorize = tokio::spawn(async move { cp2.authorize_id_token("CACHED").await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cp.queue().pause();
        let info = authorize.await.unwrap();
        assert_eq!(info.status, AuthorizationStatus::Invalid);

        let entry = cp
            .repository()
            .get_authorization_cache_entry("CACHED")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, AuthorizationStatus::Expired);
        cp.stop().await.unwrap();
    }
}
