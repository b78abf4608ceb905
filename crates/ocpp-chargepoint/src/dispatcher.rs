//! Inbound message dispatcher
//!
//! Single entry point for decoded frames: classifies CALL / CALLRESULT /
//! CALLERROR, gates by the registration state, routes CALLs to their
//! handlers and consumes the response types the runtime itself tracks
//! (BootNotification, StartTransaction, StopTransaction). Every CALL handler
//! produces exactly one response and may additionally enqueue side-effect
//! messages.

use crate::error::ChargePointResult;
use crate::queue::EnhancedMessage;
use crate::state_machine::ConnectorEvent;
use crate::ChargePoint;
use crate::ConnectionState;
use ocpp_messages::v16j::*;
use ocpp_types::common::{AvailabilityStatus, AvailabilityType, ChargingProfilePurposeType};
use ocpp_types::v16j::*;
use ocpp_types::{
    CallErrorCode, CallErrorMessage, CallMessage, CallResultMessage, Message, TransactionId,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl ChargePoint {
    pub(crate) async fn dispatch(self: &Arc<Self>, enhanced: EnhancedMessage) {
        let Some(message) = enhanced.message else {
            return;
        };
        let Some(message_type) = enhanced.message_type else {
            match message {
                Message::Call(call) => {
                    warn!("Received unsupported action {}", call.action);
                    self.send_call_error(CallErrorMessage::new(
                        call.unique_id,
                        CallErrorCode::NotSupported,
                        String::new(),
                        None,
                    ))
                    .await;
                }
                _ => debug!("Dropping uncorrelated response {}", enhanced.unique_id),
            }
            return;
        };

        match self.connection_state() {
            ConnectionState::Disconnected => {
                error!("Received a message in disconnected state, this cannot be correct");
            }
            ConnectionState::Connected | ConnectionState::Rejected => {
                // before Accepted only the BootNotification answer matters
                if message_type == MessageType::BootNotificationResponse {
                    if let Message::CallResult(result) = message {
                        self.handle_call_result(message_type, result).await;
                    }
                } else {
                    debug!("Ignoring {} before registration", message_type);
                }
            }
            ConnectionState::Pending | ConnectionState::Booted => match message {
                Message::Call(call) => self.handle_call(message_type, call).await,
                Message::CallResult(result) => {
                    self.handle_call_result(message_type, result).await
                }
                Message::CallError(err) => {
                    warn!(
                        unique_id = %err.unique_id,
                        code = %err.error_code,
                        "Central System answered with CallError: {}",
                        err.error_description
                    );
                }
            },
        }
    }

    async fn handle_call(self: &Arc<Self>, message_type: MessageType, call: CallMessage) {
        debug!("Received {} with id {}", call.action, call.unique_id);
        let unique_id = call.unique_id.clone();
        let outcome = match message_type {
            MessageType::CancelReservation => self.handle_cancel_reservation(call).await,
            MessageType::CertificateSigned => self.handle_certificate_signed(call).await,
            MessageType::ChangeAvailability => self.handle_change_availability(call).await,
            MessageType::ChangeConfiguration => self.handle_change_configuration(call).await,
            MessageType::ClearCache => self.handle_clear_cache(call).await,
            MessageType::ClearChargingProfile => self.handle_clear_charging_profile(call).await,
            MessageType::DataTransfer => self.handle_data_transfer(call).await,
            MessageType::DeleteCertificate => self.handle_delete_certificate(call).await,
            MessageType::ExtendedTriggerMessage => {
                self.handle_extended_trigger_message(call).await
            }
            MessageType::GetCompositeSchedule => self.handle_get_composite_schedule(call).await,
            MessageType::GetConfiguration => self.handle_get_configuration(call).await,
            MessageType::GetDiagnostics => self.handle_get_diagnostics(call).await,
            MessageType::GetInstalledCertificateIds => {
                self.handle_get_installed_certificate_ids(call).await
            }
            MessageType::GetLocalListVersion => self.handle_get_local_list_version(call).await,
            MessageType::GetLog => self.handle_get_log(call).await,
            MessageType::InstallCertificate => self.handle_install_certificate(call).await,
            MessageType::RemoteStartTransaction => {
                self.handle_remote_start_transaction(call).await
            }
            MessageType::RemoteStopTransaction => self.handle_remote_stop_transaction(call).await,
            MessageType::ReserveNow => self.handle_reserve_now(call).await,
            MessageType::Reset => self.handle_reset(call).await,
            MessageType::SendLocalList => self.handle_send_local_list(call).await,
            MessageType::SetChargingProfile => self.handle_set_charging_profile(call).await,
            MessageType::SignedUpdateFirmware => self.handle_signed_update_firmware(call).await,
            MessageType::TriggerMessage => self.handle_trigger_message(call).await,
            MessageType::UnlockConnector => self.handle_unlock_connector(call).await,
            MessageType::UpdateFirmware => self.handle_update_firmware(call).await,
            other => {
                warn!("No handler for CS-initiated {}", other);
                self.send_call_error(CallErrorMessage::new(
                    unique_id,
                    CallErrorCode::NotSupported,
                    String::new(),
                    None,
                ))
                .await;
                return;
            }
        };
        if let Err(e) = outcome {
            warn!("Handler for {} failed: {}", message_type, e);
            self.send_call_error(CallErrorMessage::new(
                unique_id,
                CallErrorCode::FormationViolation,
                e.to_string(),
                None,
            ))
            .await;
        }
    }

    async fn handle_call_result(
        self: &Arc<Self>,
        message_type: MessageType,
        result: CallResultMessage,
    ) {
        match message_type {
            MessageType::BootNotificationResponse => {
                match result.payload_as::<BootNotificationResponse>() {
                    Ok(response) => self.handle_boot_notification_response(response).await,
                    Err(e) => error!("Malformed BootNotificationResponse: {}", e),
                }
            }
            MessageType::StartTransactionResponse => {
                self.handle_start_transaction_response(result).await;
            }
            MessageType::StopTransactionResponse => {
                self.handle_stop_transaction_response(result).await;
            }
            // consumed by the futures of send_request_async
            other => debug!("Response {} handled by its awaiting future", other),
        }
    }

    // -- transaction responses ----------------------------------------------

    async fn handle_start_transaction_response(self: &Arc<Self>, result: CallResultMessage) {
        let response = match result.payload_as::<StartTransactionResponse>() {
            Ok(response) => response,
            Err(e) => {
                error!("Malformed StartTransactionResponse: {}", e);
                self.queue().notify_start_transaction_handled();
                return;
            }
        };

        let binding = self
            .transactions
            .bind_transaction_id(&result.unique_id, TransactionId::new(response.transaction_id))
            .await;
        let Some(binding) = binding else {
            warn!(
                unique_id = %result.unique_id,
                "StartTransactionResponse for unknown transaction"
            );
            self.queue().notify_start_transaction_handled();
            return;
        };

        // a StopTransaction may already be queued; patch its id before the
        // queue moves on
        if binding.finished {
            if let Some(stop_message_id) = &binding.stop_message_id {
                self.queue()
                    .add_stopped_transaction_id(stop_message_id, response.transaction_id);
            }
        }
        self.queue().notify_start_transaction_handled();

        if let Err(e) = self
            .repository()
            .update_transaction_cs_id(
                &binding.session_id,
                response.transaction_id,
                response.id_tag_info.parent_id_tag.clone(),
            )
            .await
        {
            error!("Failed to persist transaction id: {}", e);
        }

        if self.config().authorization_cache_enabled() {
            if let Err(e) = self
                .repository()
                .upsert_authorization_cache_entry(&binding.id_tag, response.id_tag_info.clone())
                .await
            {
                warn!("Failed to update authorization cache: {}", e);
            }
        }

        if response.id_tag_info.status != ocpp_types::common::AuthorizationStatus::Accepted {
            info!(
                connector = binding.connector_id,
                "Transaction authorization became invalid"
            );
            if let Some(cb) = self.callback(|c| c.pause_charging.clone()) {
                cb(binding.connector_id);
            }
            if self.config().stop_transaction_on_invalid_id() {
                if let Some(cb) = self.callback(|c| c.stop_transaction.clone()) {
                    cb(binding.connector_id, ocpp_types::common::Reason::DeAuthorized);
                }
            }
        }
    }

    async fn handle_stop_transaction_response(self: &Arc<Self>, result: CallResultMessage) {
        let response = match result.payload_as::<StopTransactionResponse>() {
            Ok(response) => response,
            Err(e) => {
                error!("Malformed StopTransactionResponse: {}", e);
                return;
            }
        };

        if let Some(id_tag_info) = response.id_tag_info {
            if let Some(id_tag) = self.transactions.stopped_id_tag(&result.unique_id).await {
                if let Err(e) = self
                    .repository()
                    .upsert_authorization_cache_entry(&id_tag, id_tag_info)
                    .await
                {
                    warn!("Failed to update authorization cache: {}", e);
                }
            }
        }

        let stopped = self.transactions.erase_stopped(&result.unique_id).await;

        // apply a deferred ChangeAvailability now that the transaction ended
        if let Some(transaction) = stopped {
            let connector = transaction.connector_id;
            let deferred = self
                .change_availability_queue
                .lock()
                .unwrap()
                .remove(&connector);
            if let Some(availability) = deferred {
                info!(connector, ?availability, "Applying deferred availability change");
                self.apply_availability_change(&[connector], availability)
                    .await;
            }
        }

        self.stop_tx_notify.notify_waiters();
    }

    async fn apply_availability_change(
        self: &Arc<Self>,
        connectors: &[u32],
        availability: AvailabilityType,
    ) {
        if let Err(e) = self
            .repository()
            .upsert_connector_availability(connectors, availability)
            .await
        {
            error!("Failed to persist availability: {}", e);
        }
        for connector in connectors {
            self.connectors.set_availability(*connector, availability);
            match availability {
                AvailabilityType::Operative => {
                    if let Some(cb) = self.callback(|c| c.enable_evse.clone()) {
                        cb(*connector);
                    }
                    self.submit_connector_event(*connector, ConnectorEvent::BecomeAvailable);
                }
                AvailabilityType::Inoperative => {
                    if let Some(cb) = self.callback(|c| c.disable_evse.clone()) {
                        cb(*connector);
                    }
                    self.submit_connector_event(
                        *connector,
                        ConnectorEvent::ChangeAvailabilityToUnavailable,
                    );
                }
            }
        }
    }

    // -- core profile handlers ----------------------------------------------

    async fn handle_change_availability(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: ChangeAvailabilityRequest = call.payload_as()?;
        let count = self.connectors.count() as i32;

        let response = if request.connector_id < 0 || request.connector_id > count {
            ChangeAvailabilityResponse {
                status: AvailabilityStatus::Rejected,
            }
        } else {
            let mut free_connectors: Vec<u32> = Vec::new();
            let mut transaction_running = false;

            if request.connector_id == 0 {
                for connector in 1..=self.connectors.count() {
                    if self.transactions.transaction_active(connector).await {
                        transaction_running = true;
                        self.change_availability_queue
                            .lock()
                            .unwrap()
                            .insert(connector, request.availability_type);
                    } else {
                        free_connectors.push(connector);
                    }
                }
            } else {
                let connector = request.connector_id as u32;
                if self.transactions.transaction_active(connector).await {
                    transaction_running = true;
                    self.change_availability_queue
                        .lock()
                        .unwrap()
                        .insert(connector, request.availability_type);
                } else {
                    free_connectors.push(connector);
                }
            }

            if transaction_running {
                ChangeAvailabilityResponse {
                    status: AvailabilityStatus::Scheduled,
                }
            } else {
                self.apply_availability_change(&free_connectors, request.availability_type)
                    .await;
                ChangeAvailabilityResponse {
                    status: AvailabilityStatus::Accepted,
                }
            }
        };

        self.send_response(call.unique_id, &response).await;
        Ok(())
    }

    async fn handle_change_configuration(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: ChangeConfigurationRequest = call.payload_as()?;

        let known = self.config().get(&request.key).is_some();
        let status = if known || request.key == "AuthorizationKey" {
            if request.key != "AuthorizationKey"
                && self.config().is_readonly(&request.key) == Some(true)
            {
                ConfigurationStatus::Rejected
            } else {
                self.config().set(&request.key, &request.value)
            }
        } else {
            ConfigurationStatus::NotSupported
        };

        // the response goes out before any side effect that touches the
        // connection
        self.send_response(
            call.unique_id,
            &ChangeConfigurationResponse { status },
        )
        .await;

        if request.key == "SecurityProfile" && status == ConfigurationStatus::Rejected {
            let requested: i32 = request.value.parse().unwrap_or(-1);
            if (0..=3).contains(&requested) && requested < self.config().security_profile() {
                self.security_event_notification(
                    SecurityEvent::ReconfigurationOfSecurityParameters,
                    Some(format!(
                        "Rejected SecurityProfile downgrade to {}",
                        requested
                    )),
                );
            }
        }

        if status == ConfigurationStatus::Accepted {
            match request.key.as_str() {
                "ClockAlignedDataInterval" => self.restart_clock_aligned_timer(),
                "ConnectionTimeOut" => {
                    if let Some(cb) = self.callback(|c| c.set_connection_timeout.clone()) {
                        cb(self.config().connection_timeout());
                    }
                }
                "TransactionMessageAttempts" => {
                    self.queue()
                        .update_transaction_message_attempts(
                            self.config().transaction_message_attempts(),
                        );
                }
                "TransactionMessageRetryInterval" => {
                    self.queue().update_transaction_message_retry_interval(
                        std::time::Duration::from_secs(
                            self.config().transaction_message_retry_interval(),
                        ),
                    );
                }
                "AuthorizationKey" => {
                    let profile = self.config().security_profile();
                    if profile == 1 || profile == 2 {
                        info!("AuthorizationKey changed, transport must reconnect");
                    }
                }
                "SecurityProfile" => {
                    info!(
                        "SecurityProfile changed to {}, transport must reconnect",
                        self.config().security_profile()
                    );
                }
                // HeartbeatInterval and MeterValueSampleInterval are read
                // from the configuration on every timer tick
                _ => {}
            }
        }
        Ok(())
    }

    async fn handle_clear_cache(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let _request: ClearCacheRequest = call.payload_as()?;
        let status = if self.config().authorization_cache_enabled() {
            match self.repository().clear_authorization_cache().await {
                Ok(()) => ClearCacheStatus::Accepted,
                Err(e) => {
                    error!("Failed to clear authorization cache: {}", e);
                    ClearCacheStatus::Rejected
                }
            }
        } else {
            ClearCacheStatus::Rejected
        };
        self.send_response(call.unique_id, &ClearCacheResponse { status })
            .await;
        Ok(())
    }

    async fn handle_data_transfer(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: DataTransferRequest = call.payload_as()?;
        let message_id = request.message_id.clone().unwrap_or_default();

        let lookup = self
            .data_transfer_callbacks
            .lookup(&request.vendor_id, &message_id);
        let (status, callback) = match lookup {
            Ok(callback) => (DataTransferStatus::Accepted, Some(callback)),
            Err(true) => (DataTransferStatus::UnknownMessageId, None),
            Err(false) => (DataTransferStatus::UnknownVendorId, None),
        };

        self.send_response(
            call.unique_id,
            &DataTransferResponse { status, data: None },
        )
        .await;

        // invoked after the response went out
        if let Some(callback) = callback {
            callback(request.data.unwrap_or_default());
        }
        Ok(())
    }

    async fn handle_get_configuration(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: GetConfigurationRequest = call.payload_as()?;

        let mut configuration_key = Vec::new();
        let mut unknown_key = Vec::new();

        match request.key {
            None => configuration_key = self.config().get_all_key_value(),
            Some(keys) if keys.is_empty() => {
                configuration_key = self.config().get_all_key_value()
            }
            Some(keys) => {
                for key in keys {
                    match self.config().get(&key) {
                        Some(kv) => configuration_key.push(kv),
                        None => unknown_key.push(key),
                    }
                }
            }
        }

        let response = GetConfigurationResponse {
            configuration_key: if configuration_key.is_empty() {
                None
            } else {
                Some(configuration_key)
            },
            unknown_key: if unknown_key.is_empty() {
                None
            } else {
                Some(unknown_key)
            },
        };
        self.send_response(call.unique_id, &response).await;
        Ok(())
    }

    async fn handle_remote_start_transaction(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: RemoteStartTransactionRequest = call.payload_as()?;
        let rejected = RemoteStartTransactionResponse {
            status: RemoteStartStopStatus::Rejected,
        };

        if let Some(connector) = request.connector_id {
            if connector == 0 || !self.connectors.exists(connector) {
                warn!("RemoteStartTransaction for invalid connector {}", connector);
                self.send_response(call.unique_id, &rejected).await;
                return Ok(());
            }
            let availability = self
                .repository()
                .get_connector_availability(connector)
                .await
                .unwrap_or(AvailabilityType::Operative);
            if availability == AvailabilityType::Inoperative {
                warn!("RemoteStartTransaction for inoperative connector {}", connector);
                self.send_response(call.unique_id, &rejected).await;
                return Ok(());
            }
            if self.transactions.transaction_active(connector).await
                || self.connectors.state(connector) == Some(ChargePointStatus::Finishing)
            {
                debug!("RemoteStartTransaction for busy connector {}", connector);
                self.send_response(call.unique_id, &rejected).await;
                return Ok(());
            }
        }

        if let Some(profile) = request.charging_profile.clone() {
            let valid = request.connector_id.is_some()
                && profile.charging_profile_purpose == ChargingProfilePurposeType::TxProfile
                && self.smart_charging.validate_profile(
                    &profile,
                    request.connector_id.unwrap_or(0),
                    true,
                    self.connectors.count(),
                    &self.profile_limits(),
                    None,
                );
            if valid {
                self.smart_charging
                    .add_profile(profile, request.connector_id.unwrap_or(0));
            } else {
                self.send_response(call.unique_id, &rejected).await;
                return Ok(());
            }
        }

        let referenced_connectors = match request.connector_id {
            Some(connector) => vec![connector],
            None => (1..=self.connectors.count()).collect(),
        };

        self.send_response(
            call.unique_id,
            &RemoteStartTransactionResponse {
                status: RemoteStartStopStatus::Accepted,
            },
        )
        .await;

        let prevalidated = !self.config().authorize_remote_tx_requests();
        if let Some(cb) = self.callback(|c| c.provide_token.clone()) {
            cb(request.id_tag, referenced_connectors, prevalidated);
        }
        Ok(())
    }

    async fn handle_remote_stop_transaction(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: RemoteStopTransactionRequest = call.payload_as()?;
        let connector = self
            .transactions
            .connector_for_transaction_id(request.transaction_id)
            .await;

        let status = match connector {
            Some(_) => RemoteStartStopStatus::Accepted,
            None => RemoteStartStopStatus::Rejected,
        };
        self.send_response(
            call.unique_id,
            &RemoteStopTransactionResponse { status },
        )
        .await;

        if let Some(connector) = connector {
            if let Some(cb) = self.callback(|c| c.stop_transaction.clone()) {
                cb(connector, ocpp_types::common::Reason::Remote);
            }
        }
        Ok(())
    }

    async fn handle_reset(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: ResetRequest = call.payload_as()?;

        let is_allowed = self.callback(|c| c.is_reset_allowed.clone());
        let reset_cb = self.callback(|c| c.reset.clone());
        let accepted = match (&is_allowed, &reset_cb) {
            (Some(is_allowed), Some(_)) => is_allowed(request.reset_type),
            _ => false,
        };

        let status = if accepted {
            ResetStatus::Accepted
        } else {
            ResetStatus::Rejected
        };
        self.send_response(call.unique_id, &ResetResponse { status })
            .await;

        if accepted {
            // the wait for StopTransactionResponses runs off the dispatcher
            self.spawn_reset_task(request.reset_type);
            let reason = match request.reset_type {
                ResetType::Soft => ocpp_types::common::Reason::SoftReset,
                ResetType::Hard => ocpp_types::common::Reason::HardReset,
            };
            self.stop_all_transactions(reason).await;
        }
        Ok(())
    }

    async fn handle_unlock_connector(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: UnlockConnectorRequest = call.payload_as()?;
        let connector = request.connector_id;

        let status = if connector == 0 || !self.connectors.exists(connector) {
            UnlockStatus::NotSupported
        } else {
            // not a remote stop, but an ongoing transaction is stopped first
            if self.transactions.transaction_active(connector).await {
                info!(connector, "Unlock requested with active session");
                if let Some(cb) = self.callback(|c| c.stop_transaction.clone()) {
                    cb(connector, ocpp_types::common::Reason::UnlockCommand);
                }
            }
            match self.callback(|c| c.unlock_connector.clone()) {
                Some(cb) => {
                    if cb(connector) {
                        UnlockStatus::Unlocked
                    } else {
                        UnlockStatus::UnlockFailed
                    }
                }
                None => UnlockStatus::NotSupported,
            }
        };

        self.send_response(call.unique_id, &UnlockConnectorResponse { status })
            .await;
        Ok(())
    }

    // -- smart charging handlers --------------------------------------------

    async fn handle_set_charging_profile(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: SetChargingProfileRequest = call.payload_as()?;
        let profile = request.cs_charging_profiles;
        let connector = request.connector_id;

        let active_tx_id = self
            .transactions
            .transaction_id(connector)
            .await
            .filter(|id| id.is_assigned())
            .map(|id| id.value());

        let valid = self.smart_charging.validate_profile(
            &profile,
            connector,
            false,
            self.connectors.count(),
            &self.profile_limits(),
            active_tx_id,
        );

        let status = if valid {
            self.smart_charging.add_profile(profile.clone(), connector);
            if let Err(e) = self
                .repository()
                .insert_charging_profile(connector, profile)
                .await
            {
                warn!("Failed to persist charging profile: {}", e);
            }
            ChargingProfileStatus::Accepted
        } else {
            ChargingProfileStatus::Rejected
        };

        self.send_response(call.unique_id, &SetChargingProfileResponse { status })
            .await;

        if status == ChargingProfileStatus::Accepted {
            if let Some(cb) = self.callback(|c| c.signal_set_charging_profiles.clone()) {
                cb();
            }
        }
        Ok(())
    }

    async fn handle_get_composite_schedule(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: GetCompositeScheduleRequest = call.payload_as()?;
        let allowed_units = self.config().allowed_charging_rate_units();

        let response = if !self.connectors.exists(request.connector_id) {
            GetCompositeScheduleResponse {
                status: GetCompositeScheduleStatus::Rejected,
                connector_id: None,
                schedule_start: None,
                charging_schedule: None,
            }
        } else if request
            .charging_rate_unit
            .map(|unit| !allowed_units.contains(&unit))
            .unwrap_or(false)
        {
            warn!("GetCompositeSchedule with disallowed charging rate unit");
            GetCompositeScheduleResponse {
                status: GetCompositeScheduleStatus::Rejected,
                connector_id: None,
                schedule_start: None,
                charging_schedule: None,
            }
        } else {
            let max_duration = self.config().max_composite_schedule_duration();
            if request.duration > max_duration {
                warn!(
                    "Requested composite schedule duration {}s clamped to {}s",
                    request.duration, max_duration
                );
            }
            let duration = request.duration.min(max_duration);
            let start = chrono::Utc::now();
            let tx_start = self
                .transactions
                .get(request.connector_id)
                .await
                .map(|tx| tx.start_time);
            let unit = request
                .charging_rate_unit
                .unwrap_or(ocpp_types::common::ChargingRateUnitType::A);
            let schedule = self.smart_charging.composite_schedule(
                request.connector_id,
                start,
                duration,
                unit,
                self.config().connector_phases(),
                tx_start,
            );
            GetCompositeScheduleResponse {
                status: GetCompositeScheduleStatus::Accepted,
                connector_id: Some(request.connector_id),
                schedule_start: Some(start),
                charging_schedule: Some(schedule),
            }
        };

        self.send_response(call.unique_id, &response).await;
        Ok(())
    }

    async fn handle_clear_charging_profile(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: ClearChargingProfileRequest = call.payload_as()?;
        let before: Vec<i32> = self
            .smart_charging
            .profiles_with_connectors()
            .iter()
            .map(|(_, p)| p.charging_profile_id)
            .collect();

        let no_filter = request.id.is_none()
            && request.connector_id.is_none()
            && request.charging_profile_purpose.is_none()
            && request.stack_level.is_none();

        let matched = if no_filter {
            self.smart_charging.clear_all_profiles();
            true
        } else if request.id.is_some()
            && self.smart_charging.clear_with_filter(
                request.id,
                request.connector_id,
                request.stack_level,
                request.charging_profile_purpose,
                true,
            )
        {
            true
        } else {
            self.smart_charging.clear_with_filter(
                request.id,
                request.connector_id,
                request.stack_level,
                request.charging_profile_purpose,
                false,
            )
        };

        if matched {
            // drop removed profiles from the store as well
            let remaining: std::collections::HashSet<i32> = self
                .smart_charging
                .profiles_with_connectors()
                .iter()
                .map(|(_, p)| p.charging_profile_id)
                .collect();
            for profile_id in before {
                if !remaining.contains(&profile_id) {
                    if let Err(e) = self.repository().delete_charging_profile(profile_id).await {
                        warn!("Failed to delete persisted profile {}: {}", profile_id, e);
                    }
                }
            }
        }

        let status = if matched {
            ClearChargingProfileStatus::Accepted
        } else {
            ClearChargingProfileStatus::Unknown
        };
        self.send_response(call.unique_id, &ClearChargingProfileResponse { status })
            .await;
        Ok(())
    }

    // -- remote trigger handlers --------------------------------------------

    async fn handle_trigger_message(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: TriggerMessageRequest = call.payload_as()?;
        let connector = request.connector_id.unwrap_or(0);
        let valid = self.connectors.exists(connector);

        let status = if valid {
            TriggerMessageStatus::Accepted
        } else {
            TriggerMessageStatus::Rejected
        };
        self.send_response(call.unique_id, &TriggerMessageResponse { status })
            .await;

        if !valid {
            return Ok(());
        }

        match request.requested_message {
            MessageTrigger::BootNotification => self.boot_notification(),
            MessageTrigger::DiagnosticsStatusNotification => {
                let status = *self.diagnostics_status.lock().unwrap();
                self.diagnostics_status_notification(status);
            }
            MessageTrigger::FirmwareStatusNotification => {
                let status = *self.firmware_status.lock().unwrap();
                self.firmware_status_notification(status);
            }
            MessageTrigger::Heartbeat => self.heartbeat(),
            MessageTrigger::MeterValues => {
                let measurands = self.config().meter_values_sampled_data();
                if let Some(meter_value) = self.connectors.latest_meter_value(
                    connector,
                    &measurands,
                    ocpp_types::common::ReadingContext::Trigger,
                ) {
                    self.send_meter_value(connector, meter_value).await;
                }
            }
            MessageTrigger::StatusNotification => {
                let status = self
                    .connectors
                    .state(connector)
                    .unwrap_or(ChargePointStatus::Available);
                self.status_notification(connector, self.connectors.error_code(connector), status);
            }
        }
        Ok(())
    }

    async fn handle_extended_trigger_message(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: ExtendedTriggerMessageRequest = call.payload_as()?;
        let connector = request.connector_id.unwrap_or(0);

        let mut status = TriggerMessageStatus::Accepted;
        if request.requested_message == ExtendedMessageTrigger::SignChargePointCertificate
            && self.config().cpo_name().is_none()
        {
            warn!("SignChargePointCertificate triggered but no CpoName is set");
            status = TriggerMessageStatus::Rejected;
        }
        if !self.connectors.exists(connector) {
            status = TriggerMessageStatus::Rejected;
        }

        self.send_response(
            call.unique_id,
            &ExtendedTriggerMessageResponse { status },
        )
        .await;

        if status != TriggerMessageStatus::Accepted {
            return Ok(());
        }

        match request.requested_message {
            ExtendedMessageTrigger::BootNotification => self.boot_notification(),
            ExtendedMessageTrigger::LogStatusNotification => {
                let (status, request_id) = *self.log_status.lock().unwrap();
                self.log_status_notification(status, request_id);
            }
            ExtendedMessageTrigger::FirmwareStatusNotification => {
                let (status, request_id) = *self.signed_firmware_status.lock().unwrap();
                self.signed_firmware_update_status_notification(status, request_id);
            }
            ExtendedMessageTrigger::Heartbeat => self.heartbeat(),
            ExtendedMessageTrigger::MeterValues => {
                let measurands = self.config().meter_values_sampled_data();
                if let Some(meter_value) = self.connectors.latest_meter_value(
                    connector,
                    &measurands,
                    ocpp_types::common::ReadingContext::Trigger,
                ) {
                    self.send_meter_value(connector, meter_value).await;
                }
            }
            ExtendedMessageTrigger::SignChargePointCertificate => self.sign_certificate(),
            ExtendedMessageTrigger::StatusNotification => {
                let status = self
                    .connectors
                    .state(connector)
                    .unwrap_or(ChargePointStatus::Available);
                self.status_notification(connector, self.connectors.error_code(connector), status);
            }
        }
        Ok(())
    }

    // -- firmware / diagnostics handlers ------------------------------------

    async fn handle_get_diagnostics(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: GetDiagnosticsRequest = call.payload_as()?;
        let response = match self.callback(|c| c.upload_diagnostics.clone()) {
            Some(cb) => {
                let upload = cb(request);
                GetDiagnosticsResponse {
                    file_name: upload.filename,
                }
            }
            None => GetDiagnosticsResponse { file_name: None },
        };
        self.send_response(call.unique_id, &response).await;
        Ok(())
    }

    async fn handle_update_firmware(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: UpdateFirmwareRequest = call.payload_as()?;
        self.send_response(call.unique_id, &UpdateFirmwareResponse {})
            .await;
        if let Some(cb) = self.callback(|c| c.update_firmware.clone()) {
            cb(request);
        }
        Ok(())
    }

    async fn handle_signed_update_firmware(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: SignedUpdateFirmwareRequest = call.payload_as()?;

        let certificate_ok = self
            .pki_handler()
            .map(|pki| pki.verify_firmware_certificate(&request.firmware.signing_certificate))
            .unwrap_or(false);

        let status = if !certificate_ok {
            SignedUpdateFirmwareStatus::InvalidCertificate
        } else {
            match self.callback(|c| c.signed_update_firmware.clone()) {
                Some(cb) => cb(request),
                None => SignedUpdateFirmwareStatus::Rejected,
            }
        };

        self.send_response(call.unique_id, &SignedUpdateFirmwareResponse { status })
            .await;

        if status == SignedUpdateFirmwareStatus::InvalidCertificate {
            self.security_event_notification(
                SecurityEvent::InvalidFirmwareSigningCertificate,
                Some("Certificate is invalid.".to_string()),
            );
        }
        Ok(())
    }

    async fn handle_get_log(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: GetLogRequest = call.payload_as()?;
        let response = match self.callback(|c| c.upload_logs.clone()) {
            Some(cb) => cb(request),
            None => GetLogResponse {
                status: LogStatus::Rejected,
                filename: None,
            },
        };
        self.send_response(call.unique_id, &response).await;
        Ok(())
    }

    // -- certificate handlers -----------------------------------------------

    async fn handle_certificate_signed(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: CertificateSignedRequest = call.payload_as()?;
        let serial = self
            .config()
            .settings()
            .info
            .charge_box_serial_number
            .clone()
            .unwrap_or_default();

        let mut verification = None;
        let status = match self.pki_handler() {
            Some(pki) => {
                let result =
                    pki.verify_charge_point_certificate(&request.certificate_chain, &serial);
                verification = Some(result);
                if result == crate::pki::CertificateVerificationResult::Valid
                    && pki.write_client_certificate(&request.certificate_chain)
                {
                    CertificateSignedStatus::Accepted
                } else {
                    CertificateSignedStatus::Rejected
                }
            }
            None => CertificateSignedStatus::Rejected,
        };

        self.send_response(call.unique_id, &CertificateSignedResponse { status })
            .await;

        if status == CertificateSignedStatus::Rejected {
            let tech_info = verification
                .map(|v| v.as_str().to_string())
                .unwrap_or_else(|| "NoPkiHandler".to_string());
            self.security_event_notification(
                SecurityEvent::InvalidChargePointCertificate,
                Some(tech_info),
            );
        }

        // with profile 3 the transport reconnects using the new client
        // certificate once it is valid
        if status == CertificateSignedStatus::Accepted && self.config().security_profile() == 3 {
            if let Some(pki) = self.pki_handler() {
                let valid_in = pki.valid_in_seconds(&request.certificate_chain);
                if valid_in <= 0 {
                    info!("New client certificate valid now, transport should reconnect");
                } else {
                    info!(
                        "New client certificate valid in {}s, reconnect scheduled",
                        valid_in
                    );
                }
            }
        }
        Ok(())
    }

    async fn handle_install_certificate(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: InstallCertificateRequest = call.payload_as()?;

        let result = self.pki_handler().map(|pki| {
            pki.install_root_certificate(
                &request.certificate,
                request.certificate_type,
                self.config().certificate_store_max_length(),
                self.config().additional_root_certificate_check(),
            )
        });

        let status = match result {
            Some(crate::pki::InstallCertificateResult::Accepted) => {
                InstallCertificateStatus::Accepted
            }
            Some(crate::pki::InstallCertificateResult::WriteError) => {
                InstallCertificateStatus::Failed
            }
            Some(_) | None => InstallCertificateStatus::Rejected,
        };

        self.send_response(call.unique_id, &InstallCertificateResponse { status })
            .await;

        if status == InstallCertificateStatus::Rejected {
            let tech_info = result.map(|r| r.as_str().to_string());
            self.security_event_notification(
                SecurityEvent::InvalidCentralSystemCertificate,
                tech_info,
            );
        }
        Ok(())
    }

    async fn handle_delete_certificate(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: DeleteCertificateRequest = call.payload_as()?;
        let status = match self.pki_handler() {
            Some(pki) => pki.delete_root_certificate(
                &request.certificate_hash_data,
                self.config().security_profile(),
            ),
            None => DeleteCertificateStatus::NotFound,
        };
        self.send_response(call.unique_id, &DeleteCertificateResponse { status })
            .await;
        Ok(())
    }

    async fn handle_get_installed_certificate_ids(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let request: GetInstalledCertificateIdsRequest = call.payload_as()?;
        let hash_data = self
            .pki_handler()
            .and_then(|pki| pki.root_certificate_hash_data(request.certificate_type));

        let response = match hash_data {
            Some(data) if !data.is_empty() => GetInstalledCertificateIdsResponse {
                status: GetInstalledCertificateStatus::Accepted,
                certificate_hash_data: Some(data),
            },
            _ => GetInstalledCertificateIdsResponse {
                status: GetInstalledCertificateStatus::NotFound,
                certificate_hash_data: None,
            },
        };
        self.send_response(call.unique_id, &response).await;
        Ok(())
    }

    // -- reservation handlers -----------------------------------------------

    async fn handle_reserve_now(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: ReserveNowRequest = call.payload_as()?;

        let status = if self.connectors.state(request.connector_id)
            == Some(ChargePointStatus::Faulted)
        {
            ReservationStatus::Faulted
        } else if self.config().has_feature_profile("Reservation") {
            match self.callback(|c| c.reserve_now.clone()) {
                Some(cb) => cb(
                    request.reservation_id,
                    request.connector_id,
                    request.expiry_date,
                    request.id_tag,
                    request.parent_id_tag,
                ),
                None => ReservationStatus::Rejected,
            }
        } else {
            ReservationStatus::Rejected
        };

        self.send_response(call.unique_id, &ReserveNowResponse { status })
            .await;
        Ok(())
    }

    async fn handle_cancel_reservation(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: CancelReservationRequest = call.payload_as()?;
        let status = match self.callback(|c| c.cancel_reservation.clone()) {
            Some(cb) if cb(request.reservation_id) => CancelReservationStatus::Accepted,
            _ => CancelReservationStatus::Rejected,
        };
        self.send_response(call.unique_id, &CancelReservationResponse { status })
            .await;
        Ok(())
    }

    // -- local list handlers ------------------------------------------------

    async fn handle_send_local_list(self: &Arc<Self>, call: CallMessage) -> ChargePointResult<()> {
        let request: SendLocalListRequest = call.payload_as()?;

        let status = if !self.config().local_auth_list_enabled() {
            UpdateStatus::NotSupported
        } else {
            match request.update_type {
                UpdateType::Full => {
                    let outcome = async {
                        self.repository().clear_local_authorization_list().await?;
                        self.repository()
                            .set_local_list_version(request.list_version)
                            .await?;
                        if let Some(entries) = request.local_authorization_list {
                            self.repository()
                                .upsert_local_authorization_entries(entries)
                                .await?;
                        }
                        Ok::<(), crate::store::StoreError>(())
                    }
                    .await;
                    match outcome {
                        Ok(()) => UpdateStatus::Accepted,
                        Err(e) => {
                            error!("Full local list update failed: {}", e);
                            UpdateStatus::Failed
                        }
                    }
                }
                UpdateType::Differential => match request.local_authorization_list {
                    Some(entries) => {
                        let stored_version = self
                            .repository()
                            .get_local_list_version()
                            .await
                            .unwrap_or(-1);
                        if stored_version < request.list_version {
                            let outcome = async {
                                self.repository()
                                    .set_local_list_version(request.list_version)
                                    .await?;
                                self.repository()
                                    .upsert_local_authorization_entries(entries)
                                    .await?;
                                Ok::<(), crate::store::StoreError>(())
                            }
                            .await;
                            match outcome {
                                Ok(()) => UpdateStatus::Accepted,
                                Err(e) => {
                                    error!("Differential local list update failed: {}", e);
                                    UpdateStatus::Failed
                                }
                            }
                        } else {
                            UpdateStatus::VersionMismatch
                        }
                    }
                    None => UpdateStatus::Failed,
                },
            }
        };

        self.send_response(call.unique_id, &SendLocalListResponse { status })
            .await;
        Ok(())
    }

    async fn handle_get_local_list_version(
        self: &Arc<Self>,
        call: CallMessage,
    ) -> ChargePointResult<()> {
        let list_version = if !self
            .config()
            .has_feature_profile("LocalAuthListManagement")
        {
            // -1 reports the feature as unsupported
            -1
        } else {
            self.repository().get_local_list_version().await.unwrap_or(0)
        };
        self.send_response(
            call.unique_id,
            &GetLocalListVersionResponse { list_version },
        )
        .await;
        Ok(())
    }
}
