use std::net::IpAddr;

use async_trait::async_trait;
use derive_more::Display;

use crate::credentials::AccessToken;
use crate::error::UpdateError;

pub mod azure;

/// Type of the record set this service maintains. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
    #[allow(clippy::upper_case_acronyms)]
    AAAA,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
        }
    }

    /// Whether a candidate address belongs in a record set of this type.
    pub fn matches(self, ip: IpAddr) -> bool {
        match self {
            Self::A => ip.is_ipv4(),
            Self::AAAA => ip.is_ipv6(),
        }
    }
}

/// Opaque concurrency token returned on read and required on write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct VersionTag(pub String);

/// Provider-scoped path of the record set within its zone.
#[derive(Debug, Clone)]
pub struct RecordIdentity {
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
    pub record_set_name: String,
    pub record_type: RecordType,
}

/// Snapshot of the record as observed at read time. The version tag pins
/// the conditional write; the TTL is carried so the write preserves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: String,
    pub version_tag: VersionTag,
    pub ttl: u64,
}

#[async_trait]
pub trait DnsRecordStore {
    /// Read the current record fresh from the zone. A missing record set is
    /// a read error, the record is assumed to pre-exist.
    async fn fetch(&self, token: &AccessToken) -> Result<AddressRecord, UpdateError>;

    /// Write `new_address` into the record set, conditioned on the version
    /// tag in `observed`. A concurrent change since the read rejects the
    /// write with [`UpdateError::ConcurrencyConflict`].
    async fn update(
        &self,
        token: &AccessToken,
        observed: &AddressRecord,
        new_address: &str,
    ) -> Result<(), UpdateError>;
}
