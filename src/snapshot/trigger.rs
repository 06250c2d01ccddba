use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::auth::Session;
use crate::error::RemoteError;
use crate::ring::{DeviceId, RingApi};

/// Ask the camera for a new frame, then wait `settle` so it can upload it.
///
/// The wait happens whether or not the request went through; a failure is
/// returned for the operator but the cached snapshot may still be downloaded.
pub fn request_fresh_capture<A: RingApi + ?Sized>(
    api: &A,
    session: &Session,
    device_id: DeviceId,
    settle: Duration,
) -> Result<(), RemoteError> {
    let result = api.trigger_capture(session, device_id);

    debug!("Waiting {:?} for device {} to capture", settle, device_id);
    thread::sleep(settle);

    result
}
