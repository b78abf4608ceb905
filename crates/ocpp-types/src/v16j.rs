//! OCPP 1.6J status enums, including the Security Whitepaper extensions

use serde::{Deserialize, Serialize};

/// Operational status of a connector as reported in StatusNotification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChargePointStatus {
    /// Available for a new transaction
    Available,
    /// A transaction is about to start (cable plugged or token presented)
    Preparing,
    /// Energy is being transferred
    Charging,
    /// Charging suspended by the EV
    SuspendedEV,
    /// Charging suspended by the EVSE
    SuspendedEVSE,
    /// Transaction finished, user action required
    Finishing,
    /// Reserved for a specific id tag
    Reserved,
    /// Unavailable due to a local or remote action
    Unavailable,
    /// Out of order
    Faulted,
}

impl std::fmt::Display for ChargePointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChargePointStatus::Available => "Available",
            ChargePointStatus::Preparing => "Preparing",
            ChargePointStatus::Charging => "Charging",
            ChargePointStatus::SuspendedEV => "SuspendedEV",
            ChargePointStatus::SuspendedEVSE => "SuspendedEVSE",
            ChargePointStatus::Finishing => "Finishing",
            ChargePointStatus::Reserved => "Reserved",
            ChargePointStatus::Unavailable => "Unavailable",
            ChargePointStatus::Faulted => "Faulted",
        };
        write!(f, "{}", s)
    }
}

/// Error code carried by StatusNotification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChargePointErrorCode {
    ConnectorLockFailure,
    EVCommunicationError,
    GroundFailure,
    HighTemperature,
    InternalError,
    LocalListConflict,
    NoError,
    OtherError,
    OverCurrentFailure,
    OverVoltage,
    PowerMeterFailure,
    PowerSwitchFailure,
    ReaderFailure,
    ResetFailure,
    UnderVoltage,
    WeakSignal,
}

/// Status in the BootNotification response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RegistrationStatus {
    /// Charge point is accepted by the Central System
    Accepted,
    /// Central System is not yet ready, retry later
    Pending,
    /// Charge point is not accepted
    Rejected,
}

/// Status of a diagnostics upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DiagnosticsStatus {
    Idle,
    Uploaded,
    UploadFailed,
    Uploading,
}

/// Status of a firmware download/installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FirmwareStatus {
    Downloaded,
    DownloadFailed,
    Downloading,
    Idle,
    InstallationFailed,
    Installing,
    Installed,
}

/// Response status for RemoteStart/RemoteStopTransaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RemoteStartStopStatus {
    Accepted,
    Rejected,
}

/// Response status for ReserveNow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReservationStatus {
    Accepted,
    Faulted,
    Occupied,
    Rejected,
    Unavailable,
}

/// Response status for CancelReservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CancelReservationStatus {
    Accepted,
    Rejected,
}

/// Response status for UnlockConnector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UnlockStatus {
    Unlocked,
    UnlockFailed,
    NotSupported,
}

/// Response status for ChangeConfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConfigurationStatus {
    Accepted,
    Rejected,
    RebootRequired,
    NotSupported,
}

/// Requested reset kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResetType {
    Hard,
    Soft,
}

/// Response status for Reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResetStatus {
    Accepted,
    Rejected,
}

/// Response status for ClearCache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ClearCacheStatus {
    Accepted,
    Rejected,
}

/// Response status for DataTransfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataTransferStatus {
    Accepted,
    Rejected,
    UnknownMessageId,
    UnknownVendorId,
}

/// Response status for SetChargingProfile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChargingProfileStatus {
    Accepted,
    Rejected,
    NotSupported,
}

/// Response status for ClearChargingProfile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ClearChargingProfileStatus {
    Accepted,
    Unknown,
}

/// Response status for GetCompositeSchedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GetCompositeScheduleStatus {
    Accepted,
    Rejected,
}

/// Response status for TriggerMessage / ExtendedTriggerMessage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TriggerMessageStatus {
    Accepted,
    Rejected,
    NotImplemented,
}

/// Message that may be requested via TriggerMessage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MessageTrigger {
    BootNotification,
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
    Heartbeat,
    MeterValues,
    StatusNotification,
}

/// Message that may be requested via ExtendedTriggerMessage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ExtendedMessageTrigger {
    BootNotification,
    LogStatusNotification,
    FirmwareStatusNotification,
    Heartbeat,
    MeterValues,
    SignChargePointCertificate,
    StatusNotification,
}

/// Kind of a SendLocalList update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UpdateType {
    Differential,
    Full,
}

/// Response status for SendLocalList
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UpdateStatus {
    Accepted,
    Failed,
    NotSupported,
    VersionMismatch,
}

// ---------------------------------------------------------------------------
// Security Whitepaper extensions
// ---------------------------------------------------------------------------

/// Response status for CertificateSigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CertificateSignedStatus {
    Accepted,
    Rejected,
}

/// Which certificate store a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CertificateUse {
    CentralSystemRootCertificate,
    ManufacturerRootCertificate,
}

/// Response status for InstallCertificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InstallCertificateStatus {
    Accepted,
    Failed,
    Rejected,
}

/// Response status for DeleteCertificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DeleteCertificateStatus {
    Accepted,
    Failed,
    NotFound,
}

/// Response status for GetInstalledCertificateIds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GetInstalledCertificateStatus {
    Accepted,
    NotFound,
}

/// Hash algorithm used for certificate hash data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    SHA256,
    SHA384,
    SHA512,
}

/// Identification of an installed certificate by hashes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateHashData {
    #[serde(rename = "hashAlgorithm")]
    pub hash_algorithm: HashAlgorithm,
    #[serde(rename = "issuerNameHash")]
    pub issuer_name_hash: String,
    #[serde(rename = "issuerKeyHash")]
    pub issuer_key_hash: String,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
}

/// Kind of log requested by GetLog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LogType {
    DiagnosticsLog,
    SecurityLog,
}

/// Response status for GetLog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LogStatus {
    Accepted,
    Rejected,
    AcceptedCanceled,
}

/// Status of a log upload (LogStatusNotification)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UploadLogStatus {
    BadMessage,
    Idle,
    NotSupportedOperation,
    PermissionDenied,
    Uploaded,
    UploadFailure,
    Uploading,
}

/// Status of a signed firmware update (SignedFirmwareStatusNotification)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SignedFirmwareStatus {
    Downloaded,
    DownloadFailed,
    Downloading,
    DownloadScheduled,
    DownloadPaused,
    Idle,
    InstallationFailed,
    Installing,
    Installed,
    InstallRebooting,
    InstallScheduled,
    InstallVerificationFailed,
    InvalidSignature,
    SignatureVerified,
}

/// Response status for SignedUpdateFirmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SignedUpdateFirmwareStatus {
    Accepted,
    Rejected,
    AcceptedCanceled,
    InvalidCertificate,
    RevokedCertificate,
}

/// Security event types emitted via SecurityEventNotification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SecurityEvent {
    FirmwareUpdated,
    FailedToAuthenticateAtCentralSystem,
    CentralSystemFailedToAuthenticate,
    SettingSystemTime,
    StartupOfTheDevice,
    ResetOrReboot,
    SecurityLogWasCleared,
    ReconfigurationOfSecurityParameters,
    MemoryExhaustion,
    InvalidMessages,
    AttemptedReplayAttacks,
    TamperDetectionActivated,
    InvalidFirmwareSignature,
    InvalidFirmwareSigningCertificate,
    InvalidCentralSystemCertificate,
    InvalidChargePointCertificate,
    InvalidTLSVersion,
    InvalidTLSCipherSuite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_point_status_serialization() {
        let json = serde_json::to_string(&ChargePointStatus::SuspendedEVSE).unwrap();
        assert_eq!(json, "\"SuspendedEVSE\"");

        let status: ChargePointStatus = serde_json::from_str("\"Preparing\"").unwrap();
        assert_eq!(status, ChargePointStatus::Preparing);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ChargePointErrorCode::OverCurrentFailure).unwrap();
        assert_eq!(json, "\"OverCurrentFailure\"");
    }

    #[test]
    fn test_registration_status_roundtrip() {
        for status in [
            RegistrationStatus::Accepted,
            RegistrationStatus::Pending,
            RegistrationStatus::Rejected,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: RegistrationStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_security_event_names() {
        let json = serde_json::to_string(&SecurityEvent::InvalidCentralSystemCertificate).unwrap();
        assert_eq!(json, "\"InvalidCentralSystemCertificate\"");
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(ChargePointStatus::SuspendedEV.to_string(), "SuspendedEV");
        assert_eq!(ChargePointStatus::Available.to_string(), "Available");
    }
}
