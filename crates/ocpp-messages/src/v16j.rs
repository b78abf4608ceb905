//! OCPP 1.6J message definitions
//!
//! All message types defined in the OCPP 1.6J specification plus the
//! Security Whitepaper extensions, organized by functional profile. Each
//! request implements [`OcppAction`] to bind it to its response type.

use crate::validation::{check_ci_string, CI_STRING_20, CI_STRING_255, CI_STRING_50};
use crate::{OcppAction, OcppResponse};
use chrono::{DateTime, Utc};
use ocpp_types::common::*;
use ocpp_types::v16j::*;
use ocpp_types::{IdToken, OcppResult};
use serde::{Deserialize, Serialize};

/// Every OCPP 1.6J action and its response, used for routing and gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Authorize,
    AuthorizeResponse,
    BootNotification,
    BootNotificationResponse,
    CancelReservation,
    CancelReservationResponse,
    CertificateSigned,
    CertificateSignedResponse,
    ChangeAvailability,
    ChangeAvailabilityResponse,
    ChangeConfiguration,
    ChangeConfigurationResponse,
    ClearCache,
    ClearCacheResponse,
    ClearChargingProfile,
    ClearChargingProfileResponse,
    DataTransfer,
    DataTransferResponse,
    DeleteCertificate,
    DeleteCertificateResponse,
    DiagnosticsStatusNotification,
    DiagnosticsStatusNotificationResponse,
    ExtendedTriggerMessage,
    ExtendedTriggerMessageResponse,
    FirmwareStatusNotification,
    FirmwareStatusNotificationResponse,
    GetCompositeSchedule,
    GetCompositeScheduleResponse,
    GetConfiguration,
    GetConfigurationResponse,
    GetDiagnostics,
    GetDiagnosticsResponse,
    GetInstalledCertificateIds,
    GetInstalledCertificateIdsResponse,
    GetLocalListVersion,
    GetLocalListVersionResponse,
    GetLog,
    GetLogResponse,
    Heartbeat,
    HeartbeatResponse,
    InstallCertificate,
    InstallCertificateResponse,
    LogStatusNotification,
    LogStatusNotificationResponse,
    MeterValues,
    MeterValuesResponse,
    RemoteStartTransaction,
    RemoteStartTransactionResponse,
    RemoteStopTransaction,
    RemoteStopTransactionResponse,
    ReserveNow,
    ReserveNowResponse,
    Reset,
    ResetResponse,
    SecurityEventNotification,
    SecurityEventNotificationResponse,
    SendLocalList,
    SendLocalListResponse,
    SetChargingProfile,
    SetChargingProfileResponse,
    SignCertificate,
    SignCertificateResponse,
    SignedFirmwareStatusNotification,
    SignedFirmwareStatusNotificationResponse,
    SignedUpdateFirmware,
    SignedUpdateFirmwareResponse,
    StartTransaction,
    StartTransactionResponse,
    StatusNotification,
    StatusNotificationResponse,
    StopTransaction,
    StopTransactionResponse,
    TriggerMessage,
    TriggerMessageResponse,
    UnlockConnector,
    UnlockConnectorResponse,
    UpdateFirmware,
    UpdateFirmwareResponse,
}

impl MessageType {
    /// Resolve a CALL action name to its message type
    pub fn from_action(action: &str) -> Option<MessageType> {
        use MessageType::*;
        Some(match action {
            "Authorize" => Authorize,
            "BootNotification" => BootNotification,
            "CancelReservation" => CancelReservation,
            "CertificateSigned" => CertificateSigned,
            "ChangeAvailability" => ChangeAvailability,
            "ChangeConfiguration" => ChangeConfiguration,
            "ClearCache" => ClearCache,
            "ClearChargingProfile" => ClearChargingProfile,
            "DataTransfer" => DataTransfer,
            "DeleteCertificate" => DeleteCertificate,
            "DiagnosticsStatusNotification" => DiagnosticsStatusNotification,
            "ExtendedTriggerMessage" => ExtendedTriggerMessage,
            "FirmwareStatusNotification" => FirmwareStatusNotification,
            "GetCompositeSchedule" => GetCompositeSchedule,
            "GetConfiguration" => GetConfiguration,
            "GetDiagnostics" => GetDiagnostics,
            "GetInstalledCertificateIds" => GetInstalledCertificateIds,
            "GetLocalListVersion" => GetLocalListVersion,
            "GetLog" => GetLog,
            "Heartbeat" => Heartbeat,
            "InstallCertificate" => InstallCertificate,
            "LogStatusNotification" => LogStatusNotification,
            "MeterValues" => MeterValues,
            "RemoteStartTransaction" => RemoteStartTransaction,
            "RemoteStopTransaction" => RemoteStopTransaction,
            "ReserveNow" => ReserveNow,
            "Reset" => Reset,
            "SecurityEventNotification" => SecurityEventNotification,
            "SendLocalList" => SendLocalList,
            "SetChargingProfile" => SetChargingProfile,
            "SignCertificate" => SignCertificate,
            "SignedFirmwareStatusNotification" => SignedFirmwareStatusNotification,
            "SignedUpdateFirmware" => SignedUpdateFirmware,
            "StartTransaction" => StartTransaction,
            "StatusNotification" => StatusNotification,
            "StopTransaction" => StopTransaction,
            "TriggerMessage" => TriggerMessage,
            "UnlockConnector" => UnlockConnector,
            "UpdateFirmware" => UpdateFirmware,
            _ => return None,
        })
    }

    /// Wire action name for CALL message types
    pub fn action_name(&self) -> Option<&'static str> {
        use MessageType::*;
        Some(match self {
            Authorize => "Authorize",
            BootNotification => "BootNotification",
            CancelReservation => "CancelReservation",
            CertificateSigned => "CertificateSigned",
            ChangeAvailability => "ChangeAvailability",
            ChangeConfiguration => "ChangeConfiguration",
            ClearCache => "ClearCache",
            ClearChargingProfile => "ClearChargingProfile",
            DataTransfer => "DataTransfer",
            DeleteCertificate => "DeleteCertificate",
            DiagnosticsStatusNotification => "DiagnosticsStatusNotification",
            ExtendedTriggerMessage => "ExtendedTriggerMessage",
            FirmwareStatusNotification => "FirmwareStatusNotification",
            GetCompositeSchedule => "GetCompositeSchedule",
            GetConfiguration => "GetConfiguration",
            GetDiagnostics => "GetDiagnostics",
            GetInstalledCertificateIds => "GetInstalledCertificateIds",
            GetLocalListVersion => "GetLocalListVersion",
            GetLog => "GetLog",
            Heartbeat => "Heartbeat",
            InstallCertificate => "InstallCertificate",
            LogStatusNotification => "LogStatusNotification",
            MeterValues => "MeterValues",
            RemoteStartTransaction => "RemoteStartTransaction",
            RemoteStopTransaction => "RemoteStopTransaction",
            ReserveNow => "ReserveNow",
            Reset => "Reset",
            SecurityEventNotification => "SecurityEventNotification",
            SendLocalList => "SendLocalList",
            SetChargingProfile => "SetChargingProfile",
            SignCertificate => "SignCertificate",
            SignedFirmwareStatusNotification => "SignedFirmwareStatusNotification",
            SignedUpdateFirmware => "SignedUpdateFirmware",
            StartTransaction => "StartTransaction",
            StatusNotification => "StatusNotification",
            StopTransaction => "StopTransaction",
            TriggerMessage => "TriggerMessage",
            UnlockConnector => "UnlockConnector",
            UpdateFirmware => "UpdateFirmware",
            _ => return None,
        })
    }

    /// Message type of the response correlated with this CALL
    pub fn response(&self) -> Option<MessageType> {
        use MessageType::*;
        Some(match self {
            Authorize => AuthorizeResponse,
            BootNotification => BootNotificationResponse,
            CancelReservation => CancelReservationResponse,
            CertificateSigned => CertificateSignedResponse,
            ChangeAvailability => ChangeAvailabilityResponse,
            ChangeConfiguration => ChangeConfigurationResponse,
            ClearCache => ClearCacheResponse,
            ClearChargingProfile => ClearChargingProfileResponse,
            DataTransfer => DataTransferResponse,
            DeleteCertificate => DeleteCertificateResponse,
            DiagnosticsStatusNotification => DiagnosticsStatusNotificationResponse,
            ExtendedTriggerMessage => ExtendedTriggerMessageResponse,
            FirmwareStatusNotification => FirmwareStatusNotificationResponse,
            GetCompositeSchedule => GetCompositeScheduleResponse,
            GetConfiguration => GetConfigurationResponse,
            GetDiagnostics => GetDiagnosticsResponse,
            GetInstalledCertificateIds => GetInstalledCertificateIdsResponse,
            GetLocalListVersion => GetLocalListVersionResponse,
            GetLog => GetLogResponse,
            Heartbeat => HeartbeatResponse,
            InstallCertificate => InstallCertificateResponse,
            LogStatusNotification => LogStatusNotificationResponse,
            MeterValues => MeterValuesResponse,
            RemoteStartTransaction => RemoteStartTransactionResponse,
            RemoteStopTransaction => RemoteStopTransactionResponse,
            ReserveNow => ReserveNowResponse,
            Reset => ResetResponse,
            SecurityEventNotification => SecurityEventNotificationResponse,
            SendLocalList => SendLocalListResponse,
            SetChargingProfile => SetChargingProfileResponse,
            SignCertificate => SignCertificateResponse,
            SignedFirmwareStatusNotification => SignedFirmwareStatusNotificationResponse,
            SignedUpdateFirmware => SignedUpdateFirmwareResponse,
            StartTransaction => StartTransactionResponse,
            StatusNotification => StatusNotificationResponse,
            StopTransaction => StopTransactionResponse,
            TriggerMessage => TriggerMessageResponse,
            UnlockConnector => UnlockConnectorResponse,
            UpdateFirmware => UpdateFirmwareResponse,
            _ => return None,
        })
    }

    /// True for *Response variants
    pub fn is_response(&self) -> bool {
        self.action_name().is_none()
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// Core Profile
// =============================================================================

/// Authorize request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    /// The identifier that needs to be authorized
    #[serde(rename = "idTag")]
    pub id_tag: IdToken,
}

impl OcppAction for AuthorizeRequest {
    const ACTION_NAME: &'static str = "Authorize";
    type Response = AuthorizeResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("idTag", &self.id_tag, CI_STRING_20)
    }
}

/// Authorize response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    #[serde(rename = "idTagInfo")]
    pub id_tag_info: IdTagInfo,
}

impl OcppAction for AuthorizeResponse {
    const ACTION_NAME: &'static str = "AuthorizeResponse";
    type Response = Self;
}

impl OcppResponse for AuthorizeResponse {}

/// BootNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootNotificationRequest {
    #[serde(rename = "chargePointVendor")]
    pub charge_point_vendor: String,
    #[serde(rename = "chargePointModel")]
    pub charge_point_model: String,
    #[serde(
        rename = "chargePointSerialNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub charge_point_serial_number: Option<String>,
    #[serde(
        rename = "chargeBoxSerialNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub charge_box_serial_number: Option<String>,
    #[serde(rename = "firmwareVersion", skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iccid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imsi: Option<String>,
    #[serde(rename = "meterType", skip_serializing_if = "Option::is_none")]
    pub meter_type: Option<String>,
    #[serde(rename = "meterSerialNumber", skip_serializing_if = "Option::is_none")]
    pub meter_serial_number: Option<String>,
}

impl From<&ChargePointInfo> for BootNotificationRequest {
    fn from(info: &ChargePointInfo) -> Self {
        Self {
            charge_point_vendor: info.charge_point_vendor.clone(),
            charge_point_model: info.charge_point_model.clone(),
            charge_point_serial_number: info.charge_point_serial_number.clone(),
            charge_box_serial_number: info.charge_box_serial_number.clone(),
            firmware_version: info.firmware_version.clone(),
            iccid: info.iccid.clone(),
            imsi: info.imsi.clone(),
            meter_type: info.meter_type.clone(),
            meter_serial_number: info.meter_serial_number.clone(),
        }
    }
}

impl OcppAction for BootNotificationRequest {
    const ACTION_NAME: &'static str = "BootNotification";
    type Response = BootNotificationResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("chargePointVendor", &self.charge_point_vendor, CI_STRING_20)?;
        check_ci_string("chargePointModel", &self.charge_point_model, CI_STRING_20)
    }
}

/// BootNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootNotificationResponse {
    #[serde(rename = "currentTime")]
    pub current_time: DateTime<Utc>,
    /// Heartbeat interval in seconds; in Pending/Rejected the retry interval
    pub interval: i32,
    pub status: RegistrationStatus,
}

impl OcppAction for BootNotificationResponse {
    const ACTION_NAME: &'static str = "BootNotificationResponse";
    type Response = Self;
}

impl OcppResponse for BootNotificationResponse {}

/// CancelReservation request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelReservationRequest {
    #[serde(rename = "reservationId")]
    pub reservation_id: i32,
}

impl OcppAction for CancelReservationRequest {
    const ACTION_NAME: &'static str = "CancelReservation";
    type Response = CancelReservationResponse;
}

/// CancelReservation response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelReservationResponse {
    pub status: CancelReservationStatus,
}

impl OcppAction for CancelReservationResponse {
    const ACTION_NAME: &'static str = "CancelReservationResponse";
    type Response = Self;
}

impl OcppResponse for CancelReservationResponse {}

/// ChangeAvailability request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAvailabilityRequest {
    /// Connector to change; 0 addresses the whole charge point
    #[serde(rename = "connectorId")]
    pub connector_id: i32,
    #[serde(rename = "type")]
    pub availability_type: AvailabilityType,
}

impl OcppAction for ChangeAvailabilityRequest {
    const ACTION_NAME: &'static str = "ChangeAvailability";
    type Response = ChangeAvailabilityResponse;
}

/// ChangeAvailability response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAvailabilityResponse {
    pub status: AvailabilityStatus,
}

impl OcppAction for ChangeAvailabilityResponse {
    const ACTION_NAME: &'static str = "ChangeAvailabilityResponse";
    type Response = Self;
}

impl OcppResponse for ChangeAvailabilityResponse {}

/// ChangeConfiguration request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeConfigurationRequest {
    pub key: String,
    pub value: String,
}

impl OcppAction for ChangeConfigurationRequest {
    const ACTION_NAME: &'static str = "ChangeConfiguration";
    type Response = ChangeConfigurationResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("key", &self.key, CI_STRING_50)?;
        check_ci_string("value", &self.value, 500)
    }
}

/// ChangeConfiguration response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeConfigurationResponse {
    pub status: ConfigurationStatus,
}

impl OcppAction for ChangeConfigurationResponse {
    const ACTION_NAME: &'static str = "ChangeConfigurationResponse";
    type Response = Self;
}

impl OcppResponse for ChangeConfigurationResponse {}

/// ClearCache request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearCacheRequest {}

impl OcppAction for ClearCacheRequest {
    const ACTION_NAME: &'static str = "ClearCache";
    type Response = ClearCacheResponse;
}

/// ClearCache response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub status: ClearCacheStatus,
}

impl OcppAction for ClearCacheResponse {
    const ACTION_NAME: &'static str = "ClearCacheResponse";
    type Response = Self;
}

impl OcppResponse for ClearCacheResponse {}

/// DataTransfer request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransferRequest {
    #[serde(rename = "vendorId")]
    pub vendor_id: String,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl OcppAction for DataTransferRequest {
    const ACTION_NAME: &'static str = "DataTransfer";
    type Response = DataTransferResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("vendorId", &self.vendor_id, CI_STRING_255)?;
        if let Some(message_id) = &self.message_id {
            check_ci_string("messageId", message_id, CI_STRING_50)?;
        }
        Ok(())
    }
}

/// DataTransfer response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransferResponse {
    pub status: DataTransferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl OcppAction for DataTransferResponse {
    const ACTION_NAME: &'static str = "DataTransferResponse";
    type Response = Self;
}

impl OcppResponse for DataTransferResponse {}

/// GetConfiguration request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetConfigurationRequest {
    /// Requested keys; absent or empty means "all"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Vec<String>>,
}

impl OcppAction for GetConfigurationRequest {
    const ACTION_NAME: &'static str = "GetConfiguration";
    type Response = GetConfigurationResponse;
}

/// GetConfiguration response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetConfigurationResponse {
    #[serde(rename = "configurationKey", skip_serializing_if = "Option::is_none")]
    pub configuration_key: Option<Vec<KeyValue>>,
    #[serde(rename = "unknownKey", skip_serializing_if = "Option::is_none")]
    pub unknown_key: Option<Vec<String>>,
}

impl OcppAction for GetConfigurationResponse {
    const ACTION_NAME: &'static str = "GetConfigurationResponse";
    type Response = Self;
}

impl OcppResponse for GetConfigurationResponse {}

/// Heartbeat request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {}

impl OcppAction for HeartbeatRequest {
    const ACTION_NAME: &'static str = "Heartbeat";
    type Response = HeartbeatResponse;
}

/// Heartbeat response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(rename = "currentTime")]
    pub current_time: DateTime<Utc>,
}

impl OcppAction for HeartbeatResponse {
    const ACTION_NAME: &'static str = "HeartbeatResponse";
    type Response = Self;
}

impl OcppResponse for HeartbeatResponse {}

/// MeterValues request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValuesRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
    /// Present when the values belong to a running transaction
    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i32>,
    #[serde(rename = "meterValue")]
    pub meter_value: Vec<MeterValue>,
}

impl OcppAction for MeterValuesRequest {
    const ACTION_NAME: &'static str = "MeterValues";
    type Response = MeterValuesResponse;
}

/// MeterValues response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValuesResponse {}

impl OcppAction for MeterValuesResponse {
    const ACTION_NAME: &'static str = "MeterValuesResponse";
    type Response = Self;
}

impl OcppResponse for MeterValuesResponse {}

/// RemoteStartTransaction request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStartTransactionRequest {
    #[serde(rename = "connectorId", skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
    #[serde(rename = "idTag")]
    pub id_tag: IdToken,
    /// Must be a TxProfile when present
    #[serde(rename = "chargingProfile", skip_serializing_if = "Option::is_none")]
    pub charging_profile: Option<ChargingProfile>,
}

impl OcppAction for RemoteStartTransactionRequest {
    const ACTION_NAME: &'static str = "RemoteStartTransaction";
    type Response = RemoteStartTransactionResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("idTag", &self.id_tag, CI_STRING_20)
    }
}

/// RemoteStartTransaction response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStartTransactionResponse {
    pub status: RemoteStartStopStatus,
}

impl OcppAction for RemoteStartTransactionResponse {
    const ACTION_NAME: &'static str = "RemoteStartTransactionResponse";
    type Response = Self;
}

impl OcppResponse for RemoteStartTransactionResponse {}

/// RemoteStopTransaction request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStopTransactionRequest {
    #[serde(rename = "transactionId")]
    pub transaction_id: i32,
}

impl OcppAction for RemoteStopTransactionRequest {
    const ACTION_NAME: &'static str = "RemoteStopTransaction";
    type Response = RemoteStopTransactionResponse;
}

/// RemoteStopTransaction response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStopTransactionResponse {
    pub status: RemoteStartStopStatus,
}

impl OcppAction for RemoteStopTransactionResponse {
    const ACTION_NAME: &'static str = "RemoteStopTransactionResponse";
    type Response = Self;
}

impl OcppResponse for RemoteStopTransactionResponse {}

/// Reset request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "type")]
    pub reset_type: ResetType,
}

impl OcppAction for ResetRequest {
    const ACTION_NAME: &'static str = "Reset";
    type Response = ResetResponse;
}

/// Reset response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: ResetStatus,
}

impl OcppAction for ResetResponse {
    const ACTION_NAME: &'static str = "ResetResponse";
    type Response = Self;
}

impl OcppResponse for ResetResponse {}

/// StartTransaction request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTransactionRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
    #[serde(rename = "idTag")]
    pub id_tag: IdToken,
    /// Meter reading at transaction start in Wh
    #[serde(rename = "meterStart")]
    pub meter_start: i32,
    #[serde(rename = "reservationId", skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl OcppAction for StartTransactionRequest {
    const ACTION_NAME: &'static str = "StartTransaction";
    type Response = StartTransactionResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("idTag", &self.id_tag, CI_STRING_20)
    }
}

/// StartTransaction response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTransactionResponse {
    #[serde(rename = "idTagInfo")]
    pub id_tag_info: IdTagInfo,
    /// Transaction id assigned by the Central System
    #[serde(rename = "transactionId")]
    pub transaction_id: i32,
}

impl OcppAction for StartTransactionResponse {
    const ACTION_NAME: &'static str = "StartTransactionResponse";
    type Response = Self;
}

impl OcppResponse for StartTransactionResponse {}

/// StatusNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusNotificationRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
    #[serde(rename = "errorCode")]
    pub error_code: ChargePointErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub status: ChargePointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "vendorId", skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(rename = "vendorErrorCode", skip_serializing_if = "Option::is_none")]
    pub vendor_error_code: Option<String>,
}

impl OcppAction for StatusNotificationRequest {
    const ACTION_NAME: &'static str = "StatusNotification";
    type Response = StatusNotificationResponse;

    fn validate(&self) -> OcppResult<()> {
        if let Some(info) = &self.info {
            check_ci_string("info", info, CI_STRING_50)?;
        }
        if let Some(vendor_id) = &self.vendor_id {
            check_ci_string("vendorId", vendor_id, CI_STRING_255)?;
        }
        if let Some(vendor_error_code) = &self.vendor_error_code {
            check_ci_string("vendorErrorCode", vendor_error_code, CI_STRING_50)?;
        }
        Ok(())
    }
}

/// StatusNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusNotificationResponse {}

impl OcppAction for StatusNotificationResponse {
    const ACTION_NAME: &'static str = "StatusNotificationResponse";
    type Response = Self;
}

impl OcppResponse for StatusNotificationResponse {}

/// StopTransaction request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTransactionRequest {
    #[serde(rename = "idTag", skip_serializing_if = "Option::is_none")]
    pub id_tag: Option<IdToken>,
    /// Meter reading at transaction end in Wh
    #[serde(rename = "meterStop")]
    pub meter_stop: i32,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "transactionId")]
    pub transaction_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(rename = "transactionData", skip_serializing_if = "Option::is_none")]
    pub transaction_data: Option<Vec<MeterValue>>,
}

impl OcppAction for StopTransactionRequest {
    const ACTION_NAME: &'static str = "StopTransaction";
    type Response = StopTransactionResponse;
}

/// StopTransaction response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTransactionResponse {
    #[serde(rename = "idTagInfo", skip_serializing_if = "Option::is_none")]
    pub id_tag_info: Option<IdTagInfo>,
}

impl OcppAction for StopTransactionResponse {
    const ACTION_NAME: &'static str = "StopTransactionResponse";
    type Response = Self;
}

impl OcppResponse for StopTransactionResponse {}

/// UnlockConnector request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockConnectorRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
}

impl OcppAction for UnlockConnectorRequest {
    const ACTION_NAME: &'static str = "UnlockConnector";
    type Response = UnlockConnectorResponse;
}

/// UnlockConnector response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockConnectorResponse {
    pub status: UnlockStatus,
}

impl OcppAction for UnlockConnectorResponse {
    const ACTION_NAME: &'static str = "UnlockConnectorResponse";
    type Response = Self;
}

impl OcppResponse for UnlockConnectorResponse {}

// =============================================================================
// Firmware Management Profile
// =============================================================================

/// DiagnosticsStatusNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsStatusNotificationRequest {
    pub status: DiagnosticsStatus,
}

impl OcppAction for DiagnosticsStatusNotificationRequest {
    const ACTION_NAME: &'static str = "DiagnosticsStatusNotification";
    type Response = DiagnosticsStatusNotificationResponse;
}

/// DiagnosticsStatusNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsStatusNotificationResponse {}

impl OcppAction for DiagnosticsStatusNotificationResponse {
    const ACTION_NAME: &'static str = "DiagnosticsStatusNotificationResponse";
    type Response = Self;
}

impl OcppResponse for DiagnosticsStatusNotificationResponse {}

/// FirmwareStatusNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareStatusNotificationRequest {
    pub status: FirmwareStatus,
}

impl OcppAction for FirmwareStatusNotificationRequest {
    const ACTION_NAME: &'static str = "FirmwareStatusNotification";
    type Response = FirmwareStatusNotificationResponse;
}

/// FirmwareStatusNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareStatusNotificationResponse {}

impl OcppAction for FirmwareStatusNotificationResponse {
    const ACTION_NAME: &'static str = "FirmwareStatusNotificationResponse";
    type Response = Self;
}

impl OcppResponse for FirmwareStatusNotificationResponse {}

/// GetDiagnostics request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDiagnosticsRequest {
    /// Upload destination URI
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
    #[serde(rename = "retryInterval", skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i32>,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "stopTime", skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
}

impl OcppAction for GetDiagnosticsRequest {
    const ACTION_NAME: &'static str = "GetDiagnostics";
    type Response = GetDiagnosticsResponse;
}

/// GetDiagnostics response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDiagnosticsResponse {
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl OcppAction for GetDiagnosticsResponse {
    const ACTION_NAME: &'static str = "GetDiagnosticsResponse";
    type Response = Self;
}

impl OcppResponse for GetDiagnosticsResponse {}

/// UpdateFirmware request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFirmwareRequest {
    /// Firmware download URI
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
    #[serde(rename = "retrieveDate")]
    pub retrieve_date: DateTime<Utc>,
    #[serde(rename = "retryInterval", skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i32>,
}

impl OcppAction for UpdateFirmwareRequest {
    const ACTION_NAME: &'static str = "UpdateFirmware";
    type Response = UpdateFirmwareResponse;
}

/// UpdateFirmware response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFirmwareResponse {}

impl OcppAction for UpdateFirmwareResponse {
    const ACTION_NAME: &'static str = "UpdateFirmwareResponse";
    type Response = Self;
}

impl OcppResponse for UpdateFirmwareResponse {}

// =============================================================================
// Local Auth List Management Profile
// =============================================================================

/// Entry of the local authorization list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationData {
    #[serde(rename = "idTag")]
    pub id_tag: IdToken,
    /// Absent in a Differential update means "remove this entry"
    #[serde(rename = "idTagInfo", skip_serializing_if = "Option::is_none")]
    pub id_tag_info: Option<IdTagInfo>,
}

/// GetLocalListVersion request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetLocalListVersionRequest {}

impl OcppAction for GetLocalListVersionRequest {
    const ACTION_NAME: &'static str = "GetLocalListVersion";
    type Response = GetLocalListVersionResponse;
}

/// GetLocalListVersion response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetLocalListVersionResponse {
    /// -1 when the feature is not supported, 0 when the list is empty
    #[serde(rename = "listVersion")]
    pub list_version: i32,
}

impl OcppAction for GetLocalListVersionResponse {
    const ACTION_NAME: &'static str = "GetLocalListVersionResponse";
    type Response = Self;
}

impl OcppResponse for GetLocalListVersionResponse {}

/// SendLocalList request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendLocalListRequest {
    #[serde(rename = "listVersion")]
    pub list_version: i32,
    #[serde(
        rename = "localAuthorizationList",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_authorization_list: Option<Vec<AuthorizationData>>,
    #[serde(rename = "updateType")]
    pub update_type: UpdateType,
}

impl OcppAction for SendLocalListRequest {
    const ACTION_NAME: &'static str = "SendLocalList";
    type Response = SendLocalListResponse;
}

/// SendLocalList response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendLocalListResponse {
    pub status: UpdateStatus,
}

impl OcppAction for SendLocalListResponse {
    const ACTION_NAME: &'static str = "SendLocalListResponse";
    type Response = Self;
}

impl OcppResponse for SendLocalListResponse {}

// =============================================================================
// Reservation Profile
// =============================================================================

/// ReserveNow request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveNowRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
    #[serde(rename = "expiryDate")]
    pub expiry_date: DateTime<Utc>,
    #[serde(rename = "idTag")]
    pub id_tag: IdToken,
    #[serde(rename = "parentIdTag", skip_serializing_if = "Option::is_none")]
    pub parent_id_tag: Option<IdToken>,
    #[serde(rename = "reservationId")]
    pub reservation_id: i32,
}

impl OcppAction for ReserveNowRequest {
    const ACTION_NAME: &'static str = "ReserveNow";
    type Response = ReserveNowResponse;

    fn validate(&self) -> OcppResult<()> {
        check_ci_string("idTag", &self.id_tag, CI_STRING_20)
    }
}

/// ReserveNow response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveNowResponse {
    pub status: ReservationStatus,
}

impl OcppAction for ReserveNowResponse {
    const ACTION_NAME: &'static str = "ReserveNowResponse";
    type Response = Self;
}

impl OcppResponse for ReserveNowResponse {}

// =============================================================================
// Smart Charging Profile
// =============================================================================

/// ClearChargingProfile request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearChargingProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(rename = "connectorId", skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
    #[serde(
        rename = "chargingProfilePurpose",
        skip_serializing_if = "Option::is_none"
    )]
    pub charging_profile_purpose: Option<ChargingProfilePurposeType>,
    #[serde(rename = "stackLevel", skip_serializing_if = "Option::is_none")]
    pub stack_level: Option<i32>,
}

impl OcppAction for ClearChargingProfileRequest {
    const ACTION_NAME: &'static str = "ClearChargingProfile";
    type Response = ClearChargingProfileResponse;
}

/// ClearChargingProfile response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearChargingProfileResponse {
    pub status: ClearChargingProfileStatus,
}

impl OcppAction for ClearChargingProfileResponse {
    const ACTION_NAME: &'static str = "ClearChargingProfileResponse";
    type Response = Self;
}

impl OcppResponse for ClearChargingProfileResponse {}

/// GetCompositeSchedule request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCompositeScheduleRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
    /// Length of the requested schedule in seconds
    pub duration: i32,
    #[serde(rename = "chargingRateUnit", skip_serializing_if = "Option::is_none")]
    pub charging_rate_unit: Option<ChargingRateUnitType>,
}

impl OcppAction for GetCompositeScheduleRequest {
    const ACTION_NAME: &'static str = "GetCompositeSchedule";
    type Response = GetCompositeScheduleResponse;
}

/// GetCompositeSchedule response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCompositeScheduleResponse {
    pub status: GetCompositeScheduleStatus,
    #[serde(rename = "connectorId", skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
    #[serde(rename = "scheduleStart", skip_serializing_if = "Option::is_none")]
    pub schedule_start: Option<DateTime<Utc>>,
    #[serde(rename = "chargingSchedule", skip_serializing_if = "Option::is_none")]
    pub charging_schedule: Option<ChargingSchedule>,
}

impl OcppAction for GetCompositeScheduleResponse {
    const ACTION_NAME: &'static str = "GetCompositeScheduleResponse";
    type Response = Self;
}

impl OcppResponse for GetCompositeScheduleResponse {}

/// SetChargingProfile request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetChargingProfileRequest {
    #[serde(rename = "connectorId")]
    pub connector_id: u32,
    #[serde(rename = "csChargingProfiles")]
    pub cs_charging_profiles: ChargingProfile,
}

impl OcppAction for SetChargingProfileRequest {
    const ACTION_NAME: &'static str = "SetChargingProfile";
    type Response = SetChargingProfileResponse;
}

/// SetChargingProfile response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetChargingProfileResponse {
    pub status: ChargingProfileStatus,
}

impl OcppAction for SetChargingProfileResponse {
    const ACTION_NAME: &'static str = "SetChargingProfileResponse";
    type Response = Self;
}

impl OcppResponse for SetChargingProfileResponse {}

// =============================================================================
// Remote Trigger Profile
// =============================================================================

/// TriggerMessage request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMessageRequest {
    #[serde(rename = "requestedMessage")]
    pub requested_message: MessageTrigger,
    #[serde(rename = "connectorId", skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
}

impl OcppAction for TriggerMessageRequest {
    const ACTION_NAME: &'static str = "TriggerMessage";
    type Response = TriggerMessageResponse;
}

/// TriggerMessage response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMessageResponse {
    pub status: TriggerMessageStatus,
}

impl OcppAction for TriggerMessageResponse {
    const ACTION_NAME: &'static str = "TriggerMessageResponse";
    type Response = Self;
}

impl OcppResponse for TriggerMessageResponse {}

// =============================================================================
// Security Whitepaper extensions
// =============================================================================

/// Generic Accepted/Rejected status used by the security extension messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GenericStatus {
    Accepted,
    Rejected,
}

/// CertificateSigned request message (CS -> CP)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSignedRequest {
    /// PEM encoded certificate chain answering a SignCertificate CSR
    #[serde(rename = "certificateChain")]
    pub certificate_chain: String,
}

impl OcppAction for CertificateSignedRequest {
    const ACTION_NAME: &'static str = "CertificateSigned";
    type Response = CertificateSignedResponse;
}

/// CertificateSigned response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSignedResponse {
    pub status: CertificateSignedStatus,
}

impl OcppAction for CertificateSignedResponse {
    const ACTION_NAME: &'static str = "CertificateSignedResponse";
    type Response = Self;
}

impl OcppResponse for CertificateSignedResponse {}

/// DeleteCertificate request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteCertificateRequest {
    #[serde(rename = "certificateHashData")]
    pub certificate_hash_data: CertificateHashData,
}

impl OcppAction for DeleteCertificateRequest {
    const ACTION_NAME: &'static str = "DeleteCertificate";
    type Response = DeleteCertificateResponse;
}

/// DeleteCertificate response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteCertificateResponse {
    pub status: DeleteCertificateStatus,
}

impl OcppAction for DeleteCertificateResponse {
    const ACTION_NAME: &'static str = "DeleteCertificateResponse";
    type Response = Self;
}

impl OcppResponse for DeleteCertificateResponse {}

/// ExtendedTriggerMessage request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTriggerMessageRequest {
    #[serde(rename = "requestedMessage")]
    pub requested_message: ExtendedMessageTrigger,
    #[serde(rename = "connectorId", skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
}

impl OcppAction for ExtendedTriggerMessageRequest {
    const ACTION_NAME: &'static str = "ExtendedTriggerMessage";
    type Response = ExtendedTriggerMessageResponse;
}

/// ExtendedTriggerMessage response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTriggerMessageResponse {
    pub status: TriggerMessageStatus,
}

impl OcppAction for ExtendedTriggerMessageResponse {
    const ACTION_NAME: &'static str = "ExtendedTriggerMessageResponse";
    type Response = Self;
}

impl OcppResponse for ExtendedTriggerMessageResponse {}

/// GetInstalledCertificateIds request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetInstalledCertificateIdsRequest {
    #[serde(rename = "certificateType")]
    pub certificate_type: CertificateUse,
}

impl OcppAction for GetInstalledCertificateIdsRequest {
    const ACTION_NAME: &'static str = "GetInstalledCertificateIds";
    type Response = GetInstalledCertificateIdsResponse;
}

/// GetInstalledCertificateIds response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetInstalledCertificateIdsResponse {
    pub status: GetInstalledCertificateStatus,
    #[serde(
        rename = "certificateHashData",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_hash_data: Option<Vec<CertificateHashData>>,
}

impl OcppAction for GetInstalledCertificateIdsResponse {
    const ACTION_NAME: &'static str = "GetInstalledCertificateIdsResponse";
    type Response = Self;
}

impl OcppResponse for GetInstalledCertificateIdsResponse {}

/// Parameters of a GetLog request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogParameters {
    #[serde(rename = "remoteLocation")]
    pub remote_location: String,
    #[serde(rename = "oldestTimestamp", skip_serializing_if = "Option::is_none")]
    pub oldest_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "latestTimestamp", skip_serializing_if = "Option::is_none")]
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// GetLog request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetLogRequest {
    pub log: LogParameters,
    #[serde(rename = "logType")]
    pub log_type: LogType,
    #[serde(rename = "requestId")]
    pub request_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
    #[serde(rename = "retryInterval", skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i32>,
}

impl OcppAction for GetLogRequest {
    const ACTION_NAME: &'static str = "GetLog";
    type Response = GetLogResponse;
}

/// GetLog response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetLogResponse {
    pub status: LogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl OcppAction for GetLogResponse {
    const ACTION_NAME: &'static str = "GetLogResponse";
    type Response = Self;
}

impl OcppResponse for GetLogResponse {}

/// InstallCertificate request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallCertificateRequest {
    #[serde(rename = "certificateType")]
    pub certificate_type: CertificateUse,
    /// PEM encoded X.509 certificate
    pub certificate: String,
}

impl OcppAction for InstallCertificateRequest {
    const ACTION_NAME: &'static str = "InstallCertificate";
    type Response = InstallCertificateResponse;
}

/// InstallCertificate response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallCertificateResponse {
    pub status: InstallCertificateStatus,
}

impl OcppAction for InstallCertificateResponse {
    const ACTION_NAME: &'static str = "InstallCertificateResponse";
    type Response = Self;
}

impl OcppResponse for InstallCertificateResponse {}

/// LogStatusNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStatusNotificationRequest {
    pub status: UploadLogStatus,
    #[serde(rename = "requestId")]
    pub request_id: i32,
}

impl OcppAction for LogStatusNotificationRequest {
    const ACTION_NAME: &'static str = "LogStatusNotification";
    type Response = LogStatusNotificationResponse;
}

/// LogStatusNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStatusNotificationResponse {}

impl OcppAction for LogStatusNotificationResponse {
    const ACTION_NAME: &'static str = "LogStatusNotificationResponse";
    type Response = Self;
}

impl OcppResponse for LogStatusNotificationResponse {}

/// SecurityEventNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventNotificationRequest {
    #[serde(rename = "type")]
    pub event_type: SecurityEvent,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "techInfo", skip_serializing_if = "Option::is_none")]
    pub tech_info: Option<String>,
}

impl OcppAction for SecurityEventNotificationRequest {
    const ACTION_NAME: &'static str = "SecurityEventNotification";
    type Response = SecurityEventNotificationResponse;
}

/// SecurityEventNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventNotificationResponse {}

impl OcppAction for SecurityEventNotificationResponse {
    const ACTION_NAME: &'static str = "SecurityEventNotificationResponse";
    type Response = Self;
}

impl OcppResponse for SecurityEventNotificationResponse {}

/// SignCertificate request message (CP -> CS)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignCertificateRequest {
    /// PEM encoded certificate signing request
    pub csr: String,
}

impl OcppAction for SignCertificateRequest {
    const ACTION_NAME: &'static str = "SignCertificate";
    type Response = SignCertificateResponse;
}

/// SignCertificate response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignCertificateResponse {
    pub status: GenericStatus,
}

impl OcppAction for SignCertificateResponse {
    const ACTION_NAME: &'static str = "SignCertificateResponse";
    type Response = Self;
}

impl OcppResponse for SignCertificateResponse {}

/// SignedFirmwareStatusNotification request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedFirmwareStatusNotificationRequest {
    pub status: SignedFirmwareStatus,
    #[serde(rename = "requestId")]
    pub request_id: i32,
}

impl OcppAction for SignedFirmwareStatusNotificationRequest {
    const ACTION_NAME: &'static str = "SignedFirmwareStatusNotification";
    type Response = SignedFirmwareStatusNotificationResponse;
}

/// SignedFirmwareStatusNotification response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedFirmwareStatusNotificationResponse {}

impl OcppAction for SignedFirmwareStatusNotificationResponse {
    const ACTION_NAME: &'static str = "SignedFirmwareStatusNotificationResponse";
    type Response = Self;
}

impl OcppResponse for SignedFirmwareStatusNotificationResponse {}

/// Firmware descriptor of a SignedUpdateFirmware request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareType {
    pub location: String,
    #[serde(rename = "retrieveDateTime")]
    pub retrieve_date_time: DateTime<Utc>,
    #[serde(rename = "installDateTime", skip_serializing_if = "Option::is_none")]
    pub install_date_time: Option<DateTime<Utc>>,
    /// PEM encoded certificate the firmware was signed with
    #[serde(rename = "signingCertificate")]
    pub signing_certificate: String,
    /// Base64 encoded firmware signature
    pub signature: String,
}

/// SignedUpdateFirmware request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUpdateFirmwareRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
    #[serde(rename = "retryInterval", skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i32>,
    #[serde(rename = "requestId")]
    pub request_id: i32,
    pub firmware: FirmwareType,
}

impl OcppAction for SignedUpdateFirmwareRequest {
    const ACTION_NAME: &'static str = "SignedUpdateFirmware";
    type Response = SignedUpdateFirmwareResponse;
}

/// SignedUpdateFirmware response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedUpdateFirmwareResponse {
    pub status: SignedUpdateFirmwareStatus,
}

impl OcppAction for SignedUpdateFirmwareResponse {
    const ACTION_NAME: &'static str = "SignedUpdateFirmwareResponse";
    type Response = Self;
}

impl OcppResponse for SignedUpdateFirmwareResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_action_roundtrip() {
        for action in [
            "Authorize",
            "BootNotification",
            "ChangeAvailability",
            "GetCompositeSchedule",
            "SignedUpdateFirmware",
            "SecurityEventNotification",
            "StopTransaction",
        ] {
            let mt = MessageType::from_action(action).unwrap();
            assert_eq!(mt.action_name(), Some(action));
            assert!(!mt.is_response());
            assert!(mt.response().unwrap().is_response());
        }
        assert!(MessageType::from_action("NoSuchAction").is_none());
    }

    #[test]
    fn test_boot_notification_wire_format() {
        let request = BootNotificationRequest {
            charge_point_vendor: "Vendor".to_string(),
            charge_point_model: "Model-X".to_string(),
            charge_point_serial_number: None,
            charge_box_serial_number: Some("CB001".to_string()),
            firmware_version: Some("1.2.3".to_string()),
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["chargePointVendor"], "Vendor");
        assert_eq!(value["chargeBoxSerialNumber"], "CB001");
        assert!(value.get("iccid").is_none());

        let back: BootNotificationRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_boot_notification_response_decode() {
        let response: BootNotificationResponse = serde_json::from_value(json!({
            "currentTime": "2024-01-01T00:00:00Z",
            "interval": 300,
            "status": "Accepted"
        }))
        .unwrap();

        assert_eq!(response.interval, 300);
        assert_eq!(response.status, RegistrationStatus::Accepted);
    }

    #[test]
    fn test_start_transaction_roundtrip() {
        let request = StartTransactionRequest {
            connector_id: 1,
            id_tag: "TAG1".to_string(),
            meter_start: 1000,
            reservation_id: None,
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("meterStart"));
        let back: StartTransactionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_stop_transaction_optional_fields_skipped() {
        let request = StopTransactionRequest {
            id_tag: None,
            meter_stop: 1500,
            timestamp: DateTime::from_timestamp(1_700_000_060, 0).unwrap(),
            transaction_id: -1,
            reason: Some(Reason::EVDisconnected),
            transaction_data: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("idTag").is_none());
        assert!(value.get("transactionData").is_none());
        assert_eq!(value["transactionId"], -1);
        assert_eq!(value["reason"], "EVDisconnected");
    }

    #[test]
    fn test_reset_type_field_rename() {
        let request = ResetRequest {
            reset_type: ResetType::Soft,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "Soft");
    }

    #[test]
    fn test_change_availability_field_rename() {
        let request: ChangeAvailabilityRequest = serde_json::from_value(json!({
            "connectorId": 0,
            "type": "Inoperative"
        }))
        .unwrap();
        assert_eq!(request.availability_type, AvailabilityType::Inoperative);
    }

    #[test]
    fn test_authorize_validation() {
        let ok = AuthorizeRequest {
            id_tag: "SHORT".to_string(),
        };
        assert!(ok.validate().is_ok());

        let too_long = AuthorizeRequest {
            id_tag: "X".repeat(21),
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_set_charging_profile_decode() {
        let request: SetChargingProfileRequest = serde_json::from_value(json!({
            "connectorId": 1,
            "csChargingProfiles": {
                "chargingProfileId": 3,
                "stackLevel": 0,
                "chargingProfilePurpose": "TxDefaultProfile",
                "chargingProfileKind": "Absolute",
                "chargingSchedule": {
                    "chargingRateUnit": "A",
                    "chargingSchedulePeriod": [
                        {"startPeriod": 0, "limit": 16.0}
                    ]
                }
            }
        }))
        .unwrap();

        assert_eq!(request.cs_charging_profiles.charging_profile_id, 3);
        assert_eq!(
            request.cs_charging_profiles.charging_profile_purpose,
            ChargingProfilePurposeType::TxDefaultProfile
        );
    }

    #[test]
    fn test_security_event_notification_type_rename() {
        let request = SecurityEventNotificationRequest {
            event_type: SecurityEvent::InvalidFirmwareSignature,
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            tech_info: Some("signature mismatch".to_string()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "InvalidFirmwareSignature");
        assert_eq!(value["techInfo"], "signature mismatch");
    }

    #[test]
    fn test_send_local_list_decode() {
        let request: SendLocalListRequest = serde_json::from_value(json!({
            "listVersion": 2,
            "updateType": "Full",
            "localAuthorizationList": [
                {"idTag": "TAG1", "idTagInfo": {"status": "Accepted"}},
                {"idTag": "TAG2"}
            ]
        }))
        .unwrap();

        let list = request.local_authorization_list.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[1].id_tag_info.is_none());
    }
}
