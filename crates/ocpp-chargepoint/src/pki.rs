//! Abstract interface to the X.509/PKI certificate handler
//!
//! The concrete PKI implementation (key storage, CSR generation, chain
//! verification) lives outside the runtime; the dispatcher drives it through
//! this trait when handling the Security Whitepaper messages.

use ocpp_types::v16j::{CertificateHashData, CertificateUse, DeleteCertificateStatus};

/// Outcome of verifying a charge point certificate chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateVerificationResult {
    Valid,
    Expired,
    InvalidSignature,
    InvalidCertificateChain,
    /// Common name does not match the charge box serial number
    InvalidCommonName,
    NoLeafCertificate,
}

impl CertificateVerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::Expired => "Expired",
            Self::InvalidSignature => "InvalidSignature",
            Self::InvalidCertificateChain => "InvalidCertificateChain",
            Self::InvalidCommonName => "InvalidCommonName",
            Self::NoLeafCertificate => "NoLeafCertificate",
        }
    }
}

/// Outcome of installing a root certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallCertificateResult {
    Accepted,
    WriteError,
    Expired,
    InvalidFormat,
    InvalidSignature,
    CertificateStoreMaxLengthExceeded,
}

impl InstallCertificateResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::WriteError => "WriteError",
            Self::Expired => "Expired",
            Self::InvalidFormat => "InvalidFormat",
            Self::InvalidSignature => "InvalidSignature",
            Self::CertificateStoreMaxLengthExceeded => "CertificateStoreMaxLengthExceeded",
        }
    }
}

/// Certificate handler consumed by the runtime.
///
/// Implementations may block (file and crypto operations); the dispatcher
/// invokes them from blocking-capable contexts only.
pub trait PkiHandler: Send + Sync {
    /// Generate a CSR for this charge point; `None` when no key pair exists
    fn generate_csr(&self, cpo_name: &str, charge_box_serial: &str) -> Option<String>;

    /// Verify a chain returned via CertificateSigned against the CSR's key
    /// and the charge box serial number
    fn verify_charge_point_certificate(
        &self,
        certificate_chain: &str,
        charge_box_serial: &str,
    ) -> CertificateVerificationResult;

    /// Persist the new client certificate chain
    fn write_client_certificate(&self, certificate_chain: &str) -> bool;

    /// Seconds until the leaf certificate becomes valid; <= 0 when already valid
    fn valid_in_seconds(&self, certificate_chain: &str) -> i64;

    /// Verify a firmware signing certificate
    fn verify_firmware_certificate(&self, certificate: &str) -> bool;

    /// Install a root certificate into the given store
    fn install_root_certificate(
        &self,
        certificate: &str,
        certificate_use: CertificateUse,
        store_max_length: i32,
        additional_root_certificate_check: bool,
    ) -> InstallCertificateResult;

    /// Delete a root certificate identified by its hash data
    fn delete_root_certificate(
        &self,
        hash_data: &CertificateHashData,
        security_profile: i32,
    ) -> DeleteCertificateStatus;

    /// Hash data of the installed root certificates of the given use
    fn root_certificate_hash_data(
        &self,
        certificate_use: CertificateUse,
    ) -> Option<Vec<CertificateHashData>>;
}
