use chrono::{DateTime, Local, TimeZone};
use tracing::warn;

use crate::auth::Session;
use crate::ring::{DeviceId, RingApi, SnapshotTimestamp};

const FILE_TIME_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// When the newest snapshot of `device_id` was taken, according to `records`.
pub fn latest_for_device(
    records: &[SnapshotTimestamp],
    device_id: DeviceId,
) -> Option<DateTime<Local>> {
    let latest = records
        .iter()
        .filter(|r| r.device_id == device_id)
        .max_by_key(|r| r.epoch_seconds)?;

    Local.timestamp_opt(latest.epoch_seconds?, 0).single()
}

/// Capture time of the latest snapshot, falling back to now. Never fails.
pub fn resolve_latest_timestamp<A: RingApi + ?Sized>(
    api: &A,
    session: &Session,
    device_id: DeviceId,
) -> DateTime<Local> {
    let resolved = match api.fetch_latest_timestamps(session, device_id) {
        Ok(records) => latest_for_device(&records, device_id),
        Err(e) => {
            warn!("Could not retrieve snapshot timestamps: {}", e);
            None
        }
    };

    let (taken_at, from_ring) = match resolved {
        Some(taken_at) => (taken_at, true),
        None => (Local::now(), false),
    };
    eprintln!("{}", describe_timestamp(device_id, &taken_at, from_ring));
    taken_at
}

fn describe_timestamp(device_id: DeviceId, taken_at: &DateTime<Local>, from_ring: bool) -> String {
    let when = taken_at.format(FILE_TIME_FORMAT);
    if from_ring {
        format!("Latest snapshot of device {} was taken at {}", device_id, when)
    } else {
        format!(
            "No snapshot timestamp from Ring for device {}, using current time {}",
            device_id, when
        )
    }
}

pub fn snapshot_file_name(device_id: DeviceId, taken_at: &DateTime<Local>) -> String {
    format!("{} - {}.jpg", device_id, taken_at.format(FILE_TIME_FORMAT))
}
