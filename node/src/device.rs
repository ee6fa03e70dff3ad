//! Device identity.
//!
//! Each device registers a random identifier on first start and keeps it in
//! its lock store, so its voter lock follows it across restarts.

use clipvote_store::VoterLockStore;
use clipvote_types::DeviceId;
use tracing::info;

use crate::NodeError;

const DEVICE_ID_BYTES: usize = 16;

/// Resolve this device's identifier.
///
/// A configured id wins and is persisted; otherwise the stored id is used;
/// otherwise a fresh `dev-<hex>` id is generated and stored.
pub fn load_or_create_device_id(
    locks: &dyn VoterLockStore,
    configured: Option<&str>,
) -> Result<DeviceId, NodeError> {
    if let Some(raw) = configured {
        let device = DeviceId::new(raw)?;
        locks.set_device_id(&device)?;
        return Ok(device);
    }

    if let Some(device) = locks.device_id()? {
        return Ok(device);
    }

    let device = generate_device_id()?;
    locks.set_device_id(&device)?;
    info!(%device, "registered new device");
    Ok(device)
}

fn generate_device_id() -> Result<DeviceId, NodeError> {
    let mut bytes = [0u8; DEVICE_ID_BYTES];
    getrandom::getrandom(&mut bytes).map_err(|e| NodeError::Random(e.to_string()))?;
    Ok(DeviceId::new(format!("dev-{}", hex::encode(bytes)))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipvote_nullables::NullLockStore;

    #[test]
    fn generated_id_is_persisted_and_reused() {
        let locks = NullLockStore::new();
        let first = load_or_create_device_id(&locks, None).unwrap();
        assert!(first.as_str().starts_with("dev-"));
        assert_eq!(first.as_str().len(), 4 + DEVICE_ID_BYTES * 2);

        let second = load_or_create_device_id(&locks, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn configured_id_overrides_stored() {
        let locks = NullLockStore::new();
        load_or_create_device_id(&locks, None).unwrap();
        let device = load_or_create_device_id(&locks, Some("kiosk-1")).unwrap();
        assert_eq!(device.as_str(), "kiosk-1");
        assert_eq!(load_or_create_device_id(&locks, None).unwrap(), device);
    }

    #[test]
    fn invalid_configured_id_rejected() {
        let locks = NullLockStore::new();
        assert!(matches!(
            load_or_create_device_id(&locks, Some("has space")),
            Err(NodeError::Invalid(_))
        ));
    }
}
