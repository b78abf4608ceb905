//! Common domain types shared by the message definitions and the runtime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nominal grid voltage used for A <-> W conversions in composite schedules
pub const LOW_VOLTAGE: f32 = 230.0;

/// Default and maximum number of phases per connector
pub const DEFAULT_AND_MAX_NUMBER_PHASES: i32 = 3;

/// Limit reported for schedule periods not covered by any profile
pub const NO_LIMIT_SPECIFIED: f32 = -1.0;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// Meter value: a timestamped collection of sampled values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValue {
    /// Timestamp when the values were sampled
    pub timestamp: DateTime<Utc>,
    /// Collection of sampled values
    #[serde(rename = "sampledValue")]
    pub sampled_value: Vec<SampledValue>,
}

/// Individual sampled value from a meter reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledValue {
    /// Value as string (numeric readings are rendered in decimal)
    pub value: String,
    /// Context of the reading (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ReadingContext>,
    /// Format of the value (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,
    /// What was measured (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurand: Option<Measurand>,
    /// Phase of the electrical system (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Location of measurement (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Unit of measurement (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitOfMeasure>,
}

/// Context in which a meter value was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingContext {
    #[serde(rename = "Interruption.Begin")]
    InterruptionBegin,
    #[serde(rename = "Interruption.End")]
    InterruptionEnd,
    /// Clock-aligned sample
    #[serde(rename = "Sample.Clock")]
    SampleClock,
    /// Periodic sample while a transaction is running
    #[serde(rename = "Sample.Periodic")]
    SamplePeriodic,
    #[serde(rename = "Transaction.Begin")]
    TransactionBegin,
    #[serde(rename = "Transaction.End")]
    TransactionEnd,
    /// Taken in response to a TriggerMessage
    Trigger,
    Other,
}

/// Format of the sampled value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ValueFormat {
    /// Plain decimal value
    Raw,
    /// Digitally signed binary blob
    SignedData,
}

/// Type of measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measurand {
    #[serde(rename = "Energy.Active.Import.Register")]
    EnergyActiveImportRegister,
    #[serde(rename = "Energy.Active.Export.Register")]
    EnergyActiveExportRegister,
    #[serde(rename = "Power.Active.Import")]
    PowerActiveImport,
    #[serde(rename = "Power.Active.Export")]
    PowerActiveExport,
    #[serde(rename = "Current.Import")]
    CurrentImport,
    #[serde(rename = "Current.Export")]
    CurrentExport,
    #[serde(rename = "Current.Offered")]
    CurrentOffered,
    Voltage,
    Frequency,
    Temperature,
    SoC,
}

/// Phase of the electrical system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    L1,
    L2,
    L3,
    N,
    #[serde(rename = "L1-N")]
    L1N,
    #[serde(rename = "L2-N")]
    L2N,
    #[serde(rename = "L3-N")]
    L3N,
    #[serde(rename = "L1-L2")]
    L1L2,
    #[serde(rename = "L2-L3")]
    L2L3,
    #[serde(rename = "L3-L1")]
    L3L1,
}

/// Location of the measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Location {
    Cable,
    EV,
    Inlet,
    Outlet,
    Body,
}

/// Unit of measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    Wh,
    #[serde(rename = "kWh")]
    KWh,
    W,
    #[serde(rename = "kW")]
    KW,
    A,
    V,
    K,
    Celsius,
    Percent,
}

/// A reading decomposed into a total plus optional per-phase values.
///
/// Missing phases are permitted; single-phase meters only fill `total`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PhasedReading {
    pub total: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l1: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3: Option<f32>,
}

impl PhasedReading {
    pub fn total(total: f32) -> Self {
        Self {
            total,
            l1: None,
            l2: None,
            l3: None,
        }
    }

    pub fn phase(&self, phase: Phase) -> Option<f32> {
        match phase {
            Phase::L1 => self.l1,
            Phase::L2 => self.l2,
            Phase::L3 => self.l3,
            _ => None,
        }
    }
}

/// Snapshot of the power meter attached to a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Powermeter {
    pub timestamp: DateTime<Utc>,
    /// Imported energy in Wh (from grid)
    pub energy_wh_import: PhasedReading,
    /// Exported energy in Wh (to grid)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_wh_export: Option<PhasedReading>,
    /// Instantaneous power in W
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_w: Option<PhasedReading>,
    /// Supply voltage in V
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_v: Option<PhasedReading>,
    /// Current flow in A
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_a: Option<PhasedReading>,
    /// Grid frequency in Hz
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<PhasedReading>,
}

impl Powermeter {
    /// Minimal snapshot carrying only the energy import register
    pub fn energy_only(timestamp: DateTime<Utc>, energy_wh: f32) -> Self {
        Self {
            timestamp,
            energy_wh_import: PhasedReading::total(energy_wh),
            energy_wh_export: None,
            power_w: None,
            voltage_v: None,
            current_a: None,
            frequency_hz: None,
        }
    }
}

/// Generic key-value configuration pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub readonly: bool,
}

/// Id tag info containing authorization data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTagInfo {
    /// Authorization status
    pub status: AuthorizationStatus,
    /// Expiry date (optional)
    #[serde(rename = "expiryDate", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Parent id tag (optional)
    #[serde(rename = "parentIdTag", skip_serializing_if = "Option::is_none")]
    pub parent_id_tag: Option<String>,
}

impl IdTagInfo {
    pub fn accepted() -> Self {
        Self {
            status: AuthorizationStatus::Accepted,
            expiry_date: None,
            parent_id_tag: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            status: AuthorizationStatus::Invalid,
            expiry_date: None,
            parent_id_tag: None,
        }
    }
}

/// Authorization status for id tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AuthorizationStatus {
    /// Identifier is allowed for charging
    Accepted,
    /// Identifier has been blocked
    Blocked,
    /// Identifier has expired
    Expired,
    /// Identifier is unknown or invalid
    Invalid,
    /// Identifier is already involved in another transaction
    ConcurrentTx,
}

/// Reason for stopping a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Reason {
    EmergencyStop,
    EVDisconnected,
    HardReset,
    Local,
    Other,
    PowerLoss,
    Reboot,
    Remote,
    SoftReset,
    UnlockCommand,
    DeAuthorized,
}

/// Response status for ChangeAvailability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AvailabilityStatus {
    Accepted,
    Rejected,
    /// Deferred until the running transaction finishes
    Scheduled,
}

/// Requested availability of a connector or the charge point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AvailabilityType {
    Operative,
    Inoperative,
}

/// Why a local session was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStartedReason {
    /// The EV was plugged in
    EVConnected,
    /// A token was presented first
    Authorized,
}

// ---------------------------------------------------------------------------
// Smart charging
// ---------------------------------------------------------------------------

/// Charging rate unit for schedule limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargingRateUnitType {
    A,
    W,
}

/// Purpose of a charging profile, the precedence class in composite scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargingProfilePurposeType {
    /// Hard ceiling for the whole charge point (connector 0 only)
    ChargePointMaxProfile,
    /// Default limit applied to transactions without a TxProfile
    TxDefaultProfile,
    /// Limit bound to one running transaction
    TxProfile,
}

/// Kind of a charging profile schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingProfileKindType {
    /// Schedule periods are relative to a fixed start point
    Absolute,
    /// Schedule restarts periodically
    Recurring,
    /// Schedule periods are relative to transaction start
    Relative,
}

/// Recurrency of a recurring profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencyKindType {
    Daily,
    Weekly,
}

/// One period of a charging schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSchedulePeriod {
    /// Start offset in seconds from the schedule start; period 0 starts at 0
    #[serde(rename = "startPeriod")]
    pub start_period: i32,
    /// Limit in the schedule's charging rate unit
    pub limit: f32,
    /// Number of phases the limit applies to
    #[serde(rename = "numberPhases", skip_serializing_if = "Option::is_none")]
    pub number_phases: Option<i32>,
}

/// A charging schedule: ordered limit periods in one rate unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSchedule {
    /// Schedule duration in seconds; open-ended when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    /// Absolute start; absent for Relative profiles
    #[serde(rename = "startSchedule", skip_serializing_if = "Option::is_none")]
    pub start_schedule: Option<DateTime<Utc>>,
    #[serde(rename = "chargingRateUnit")]
    pub charging_rate_unit: ChargingRateUnitType,
    #[serde(rename = "chargingSchedulePeriod")]
    pub charging_schedule_period: Vec<ChargingSchedulePeriod>,
    #[serde(rename = "minChargingRate", skip_serializing_if = "Option::is_none")]
    pub min_charging_rate: Option<f32>,
}

/// A declarative limit schedule installed by the Central System
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingProfile {
    #[serde(rename = "chargingProfileId")]
    pub charging_profile_id: i32,
    /// Running transaction this TxProfile is bound to
    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i32>,
    /// 0 = lowest precedence within the purpose class
    #[serde(rename = "stackLevel")]
    pub stack_level: i32,
    #[serde(rename = "chargingProfilePurpose")]
    pub charging_profile_purpose: ChargingProfilePurposeType,
    #[serde(rename = "chargingProfileKind")]
    pub charging_profile_kind: ChargingProfileKindType,
    #[serde(rename = "recurrencyKind", skip_serializing_if = "Option::is_none")]
    pub recurrency_kind: Option<RecurrencyKindType>,
    #[serde(rename = "validFrom", skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(rename = "validTo", skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(rename = "chargingSchedule")]
    pub charging_schedule: ChargingSchedule,
}

/// Static vendor/model/serial fields assembled into the BootNotification payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargePointInfo {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_context_wire_names() {
        let json = serde_json::to_string(&ReadingContext::SampleClock).unwrap();
        assert_eq!(json, "\"Sample.Clock\"");
        let json = serde_json::to_string(&ReadingContext::SamplePeriodic).unwrap();
        assert_eq!(json, "\"Sample.Periodic\"");
        let json = serde_json::to_string(&ReadingContext::Trigger).unwrap();
        assert_eq!(json, "\"Trigger\"");
    }

    #[test]
    fn test_measurand_wire_names() {
        let json = serde_json::to_string(&Measurand::EnergyActiveImportRegister).unwrap();
        assert_eq!(json, "\"Energy.Active.Import.Register\"");
        let json = serde_json::to_string(&Measurand::CurrentOffered).unwrap();
        assert_eq!(json, "\"Current.Offered\"");
    }

    #[test]
    fn test_meter_value_roundtrip() {
        let meter_value = MeterValue {
            timestamp: DateTime::from_timestamp(1_640_995_200, 0).unwrap(),
            sampled_value: vec![SampledValue {
                value: "1234.5".to_string(),
                context: Some(ReadingContext::SamplePeriodic),
                format: Some(ValueFormat::Raw),
                measurand: Some(Measurand::EnergyActiveImportRegister),
                phase: None,
                location: Some(Location::Outlet),
                unit: Some(UnitOfMeasure::Wh),
            }],
        };

        let json = serde_json::to_string(&meter_value).unwrap();
        let deserialized: MeterValue = serde_json::from_str(&json).unwrap();
        assert_eq!(meter_value, deserialized);
    }

    #[test]
    fn test_phased_reading_lookup() {
        let reading = PhasedReading {
            total: 30.0,
            l1: Some(10.0),
            l2: Some(10.0),
            l3: None,
        };
        assert_eq!(reading.phase(Phase::L1), Some(10.0));
        assert_eq!(reading.phase(Phase::L3), None);
        assert_eq!(reading.phase(Phase::N), None);
    }

    #[test]
    fn test_id_tag_info_roundtrip() {
        let info = IdTagInfo {
            status: AuthorizationStatus::Accepted,
            expiry_date: Some(DateTime::from_timestamp(1_640_995_200, 0).unwrap()),
            parent_id_tag: Some("PARENT123".to_string()),
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("expiryDate"));
        let deserialized: IdTagInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, deserialized);
    }

    #[test]
    fn test_charging_profile_roundtrip() {
        let profile = ChargingProfile {
            charging_profile_id: 7,
            transaction_id: None,
            stack_level: 1,
            charging_profile_purpose: ChargingProfilePurposeType::TxDefaultProfile,
            charging_profile_kind: ChargingProfileKindType::Recurring,
            recurrency_kind: Some(RecurrencyKindType::Daily),
            valid_from: None,
            valid_to: None,
            charging_schedule: ChargingSchedule {
                duration: Some(3600),
                start_schedule: Some(DateTime::from_timestamp(1_640_995_200, 0).unwrap()),
                charging_rate_unit: ChargingRateUnitType::A,
                charging_schedule_period: vec![ChargingSchedulePeriod {
                    start_period: 0,
                    limit: 16.0,
                    number_phases: Some(3),
                }],
                min_charging_rate: None,
            },
        };

        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("chargingProfileId"));
        assert!(json.contains("startPeriod"));
        let deserialized: ChargingProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, deserialized);
    }

    #[test]
    fn test_key_value_optional_fields() {
        let kv = KeyValue {
            key: "HeartbeatInterval".to_string(),
            value: None,
            readonly: false,
        };

        let json = serde_json::to_string(&kv).unwrap();
        assert!(!json.contains("\"value\""));
    }
}
