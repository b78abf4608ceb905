//! Consumer callbacks
//!
//! The host registers these to let the runtime actuate hardware and local
//! policy: enabling EVSEs, stopping sessions, unlocking connectors,
//! performing resets and file transfers. Callbacks may block; the runtime
//! invokes the long-running ones from spawned tasks.

use chrono::{DateTime, Utc};
use ocpp_messages::v16j::{
    GetDiagnosticsRequest, GetLogRequest, GetLogResponse, SignedUpdateFirmwareRequest,
    UpdateFirmwareRequest,
};
use ocpp_types::common::Reason;
use ocpp_types::v16j::{ReservationStatus, ResetType, SignedUpdateFirmwareStatus};
use std::collections::HashMap;
use std::sync::Arc;

pub type ConnectorCallback = Arc<dyn Fn(u32) -> bool + Send + Sync>;
pub type ProvideTokenCallback = Arc<dyn Fn(String, Vec<u32>, bool) + Send + Sync>;
pub type StopTransactionCallback = Arc<dyn Fn(u32, Reason) -> bool + Send + Sync>;
pub type ReserveNowCallback =
    Arc<dyn Fn(i32, u32, DateTime<Utc>, String, Option<String>) -> ReservationStatus + Send + Sync>;
pub type CancelReservationCallback = Arc<dyn Fn(i32) -> bool + Send + Sync>;
pub type SetMaxCurrentCallback = Arc<dyn Fn(u32, f32) -> bool + Send + Sync>;
pub type IsResetAllowedCallback = Arc<dyn Fn(ResetType) -> bool + Send + Sync>;
pub type ResetCallback = Arc<dyn Fn(ResetType) + Send + Sync>;
pub type SetSystemTimeCallback = Arc<dyn Fn(String) + Send + Sync>;
pub type SignalSetChargingProfilesCallback = Arc<dyn Fn() + Send + Sync>;
pub type UploadDiagnosticsCallback =
    Arc<dyn Fn(GetDiagnosticsRequest) -> GetLogResponse + Send + Sync>;
pub type UpdateFirmwareCallback = Arc<dyn Fn(UpdateFirmwareRequest) + Send + Sync>;
pub type SignedUpdateFirmwareCallback =
    Arc<dyn Fn(SignedUpdateFirmwareRequest) -> SignedUpdateFirmwareStatus + Send + Sync>;
pub type UploadLogsCallback = Arc<dyn Fn(GetLogRequest) -> GetLogResponse + Send + Sync>;
pub type SetConnectionTimeoutCallback = Arc<dyn Fn(i32) + Send + Sync>;
pub type ConnectionStateChangedCallback = Arc<dyn Fn(bool) + Send + Sync>;
pub type DataTransferCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Registered host callbacks. All optional; handlers answer NotSupported or
/// Rejected when a required callback is missing.
#[derive(Default, Clone)]
pub struct Callbacks {
    pub enable_evse: Option<ConnectorCallback>,
    pub disable_evse: Option<ConnectorCallback>,
    pub pause_charging: Option<ConnectorCallback>,
    pub resume_charging: Option<ConnectorCallback>,
    pub provide_token: Option<ProvideTokenCallback>,
    pub stop_transaction: Option<StopTransactionCallback>,
    pub reserve_now: Option<ReserveNowCallback>,
    pub cancel_reservation: Option<CancelReservationCallback>,
    pub unlock_connector: Option<ConnectorCallback>,
    pub set_max_current: Option<SetMaxCurrentCallback>,
    pub is_reset_allowed: Option<IsResetAllowedCallback>,
    pub reset: Option<ResetCallback>,
    pub set_system_time: Option<SetSystemTimeCallback>,
    pub signal_set_charging_profiles: Option<SignalSetChargingProfilesCallback>,
    pub upload_diagnostics: Option<UploadDiagnosticsCallback>,
    pub update_firmware: Option<UpdateFirmwareCallback>,
    pub signed_update_firmware: Option<SignedUpdateFirmwareCallback>,
    pub upload_logs: Option<UploadLogsCallback>,
    pub set_connection_timeout: Option<SetConnectionTimeoutCallback>,
    pub connection_state_changed: Option<ConnectionStateChangedCallback>,
}

/// Vendor-specific DataTransfer handlers, keyed by (vendorId, messageId).
/// Callbacks are invoked after the response was sent, outside the guard.
#[derive(Default)]
pub struct DataTransferCallbacks {
    map: std::sync::Mutex<HashMap<String, HashMap<String, DataTransferCallback>>>,
}

impl DataTransferCallbacks {
    pub fn register(&self, vendor_id: &str, message_id: &str, callback: DataTransferCallback) {
        let mut map = self.map.lock().unwrap();
        map.entry(vendor_id.to_string())
            .or_default()
            .insert(message_id.to_string(), callback);
    }

    /// Ok(callback) on a full match, Err(true) for a known vendor with an
    /// unknown message id, Err(false) for an unknown vendor
    pub fn lookup(
        &self,
        vendor_id: &str,
        message_id: &str,
    ) -> Result<DataTransferCallback, bool> {
        let map = self.map.lock().unwrap();
        match map.get(vendor_id) {
            Some(messages) => messages.get(message_id).cloned().ok_or(true),
            None => Err(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_data_transfer_lookup() {
        let callbacks = DataTransferCallbacks::default();
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);
        callbacks.register(
            "VendorX",
            "MsgA",
            Arc::new(move |_data| {
                flag.store(true, Ordering::SeqCst);
            }),
        );

        assert!(matches!(callbacks.lookup("NoVendor", "MsgA"), Err(false)));
        assert!(matches!(callbacks.lookup("VendorX", "NoMsg"), Err(true)));

        let callback = callbacks.lookup("VendorX", "MsgA").unwrap();
        callback("payload".to_string());
        assert!(invoked.load(Ordering::SeqCst));
    }
}
