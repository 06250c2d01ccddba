pub mod client;
#[cfg(test)]
pub mod fake;

use serde::{Deserialize, Deserializer};

use crate::auth::Session;
use crate::error::RemoteError;

pub use client::RingClient;

pub type DeviceId = u64;

/// Token pair issued by the OAuth endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Grant {
    pub access_token: String,
    /// Empty when the service did not rotate the token.
    pub refresh_token: String,
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grant").finish_non_exhaustive()
    }
}

/// Expected outcomes of a token request. Transport trouble is a `RemoteError` instead.
#[derive(Debug)]
pub enum LoginResponse {
    Granted(Grant),
    /// A code was sent out of band; the payload says where to.
    SecondFactorRequired(String),
    Throttled,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: DeviceId,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceList {
    pub authorized_doorbots: Vec<Device>,
    pub doorbots: Vec<Device>,
    pub stickup_cams: Vec<Device>,
}

impl DeviceList {
    pub fn count(&self) -> usize {
        self.authorized_doorbots.len() + self.doorbots.len() + self.stickup_cams.len()
    }
}

/// When the latest snapshot of a device was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTimestamp {
    pub device_id: DeviceId,
    pub epoch_seconds: Option<i64>,
}

/// Operations the snapshot pipeline needs from the Ring service.
pub trait RingApi {
    fn authenticate(
        &self,
        username: &str,
        password: &str,
        hardware_id: &str,
    ) -> Result<LoginResponse, RemoteError>;

    fn authenticate_by_refresh_token(
        &self,
        refresh_token: &str,
        hardware_id: &str,
    ) -> Result<LoginResponse, RemoteError>;

    /// Repeats the password grant carrying the out-of-band code.
    fn submit_second_factor(
        &self,
        username: &str,
        password: &str,
        hardware_id: &str,
        code: &str,
    ) -> Result<LoginResponse, RemoteError>;

    fn list_devices(&self, session: &Session) -> Result<DeviceList, RemoteError>;

    fn trigger_capture(&self, session: &Session, device_id: DeviceId) -> Result<(), RemoteError>;

    /// Timestamps for the whole account; callers filter by device.
    fn fetch_latest_timestamps(
        &self,
        session: &Session,
        device_id: DeviceId,
    ) -> Result<Vec<SnapshotTimestamp>, RemoteError>;

    fn fetch_image(&self, session: &Session, device_id: DeviceId) -> Result<Vec<u8>, RemoteError>;
}

pub(crate) fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<DeviceId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(DeviceId),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
