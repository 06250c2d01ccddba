//! Scripted `RingApi` for tests. Each queue is consumed in order; an empty
//! queue falls back to a failure (or an empty answer for timestamps).

use std::cell::RefCell;
use std::collections::VecDeque;

use super::{DeviceId, DeviceList, Grant, LoginResponse, RingApi, SnapshotTimestamp};
use crate::auth::Session;
use crate::error::RemoteError;

#[derive(Default)]
pub struct FakeRing {
    pub logins: RefCell<VecDeque<LoginResponse>>,
    pub refreshes: RefCell<VecDeque<LoginResponse>>,
    pub second_factors: RefCell<VecDeque<LoginResponse>>,
    pub triggers: RefCell<VecDeque<Result<(), RemoteError>>>,
    pub timestamps: RefCell<VecDeque<Result<Vec<SnapshotTimestamp>, RemoteError>>>,
    pub images: RefCell<VecDeque<Result<Vec<u8>, RemoteError>>>,
    pub devices: DeviceList,
    calls: RefCell<Vec<&'static str>>,
}

pub fn granted(access: &str, refresh: &str) -> LoginResponse {
    LoginResponse::Granted(Grant {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    })
}

pub fn session() -> Session {
    Session::from_grant(Grant {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
    })
}

pub fn server_error() -> RemoteError {
    RemoteError::Status {
        status: 500,
        body: "scripted failure".to_string(),
    }
}

pub fn not_found() -> RemoteError {
    RemoteError::NotFound("snapshots/image".to_string())
}

impl FakeRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logins(self, responses: impl IntoIterator<Item = LoginResponse>) -> Self {
        self.logins.borrow_mut().extend(responses);
        self
    }

    pub fn with_refreshes(self, responses: impl IntoIterator<Item = LoginResponse>) -> Self {
        self.refreshes.borrow_mut().extend(responses);
        self
    }

    pub fn with_second_factors(self, responses: impl IntoIterator<Item = LoginResponse>) -> Self {
        self.second_factors.borrow_mut().extend(responses);
        self
    }

    pub fn with_triggers(self, results: impl IntoIterator<Item = Result<(), RemoteError>>) -> Self {
        self.triggers.borrow_mut().extend(results);
        self
    }

    pub fn with_timestamps(self, records: Vec<SnapshotTimestamp>) -> Self {
        self.timestamps.borrow_mut().push_back(Ok(records));
        self
    }

    pub fn with_timestamp_error(self) -> Self {
        self.timestamps.borrow_mut().push_back(Err(server_error()));
        self
    }

    pub fn with_images(self, results: impl IntoIterator<Item = Result<Vec<u8>, RemoteError>>) -> Self {
        self.images.borrow_mut().extend(results);
        self
    }

    pub fn with_devices(mut self, devices: DeviceList) -> Self {
        self.devices = devices;
        self
    }

    /// How many times the named operation was invoked.
    pub fn calls(&self, name: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.calls.borrow_mut().push(name);
    }
}

fn next_login(queue: &RefCell<VecDeque<LoginResponse>>) -> Result<LoginResponse, RemoteError> {
    queue.borrow_mut().pop_front().ok_or_else(server_error)
}

impl RingApi for FakeRing {
    fn authenticate(&self, _: &str, _: &str, _: &str) -> Result<LoginResponse, RemoteError> {
        self.record("authenticate");
        next_login(&self.logins)
    }

    fn authenticate_by_refresh_token(&self, _: &str, _: &str) -> Result<LoginResponse, RemoteError> {
        self.record("authenticate_by_refresh_token");
        next_login(&self.refreshes)
    }

    fn submit_second_factor(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<LoginResponse, RemoteError> {
        self.record("submit_second_factor");
        next_login(&self.second_factors)
    }

    fn list_devices(&self, _: &Session) -> Result<DeviceList, RemoteError> {
        self.record("list_devices");
        Ok(self.devices.clone())
    }

    fn trigger_capture(&self, _: &Session, _: DeviceId) -> Result<(), RemoteError> {
        self.record("trigger_capture");
        self.triggers.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    fn fetch_latest_timestamps(
        &self,
        _: &Session,
        _: DeviceId,
    ) -> Result<Vec<SnapshotTimestamp>, RemoteError> {
        self.record("fetch_latest_timestamps");
        self.timestamps.borrow_mut().pop_front().unwrap_or(Ok(Vec::new()))
    }

    fn fetch_image(&self, _: &Session, _: DeviceId) -> Result<Vec<u8>, RemoteError> {
        self.record("fetch_image");
        self.images
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(server_error()))
    }
}
