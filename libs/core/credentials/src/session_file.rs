// [libs/core/credentials/src/session_file.rs]
//! Disk persistence for sealed session envelopes, stored with
//! owner-only permissions. Grounded on the persistence layer's
//! exclusion-lock file handling: plain `std::fs`, permissions
//! tightened immediately after creation rather than relying on an
//! inherited umask.

use crate::errors::RegistryError;
use crate::vault::SessionEnvelope;
use std::path::Path;

pub fn write(path: &Path, envelope: &SessionEnvelope) -> Result<(), RegistryError> {
    let json = serde_json::to_vec_pretty(envelope).map_err(|e| RegistryError::Serialization(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| RegistryError::Io(e.to_string()))?;
    tighten_permissions(path)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<SessionEnvelope, RegistryError> {
    let bytes = std::fs::read(path).map_err(|e| RegistryError::Io(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| RegistryError::Serialization(e.to_string()))
}

#[cfg(unix)]
fn tighten_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path).map_err(|e| RegistryError::Io(e.to_string()))?.permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(path, permissions).map_err(|e| RegistryError::Io(e.to_string()))
}

#[cfg(not(unix))]
fn tighten_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_restricts_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let envelope = SessionEnvelope { cipher_text_base64: "a".into(), nonce_base64: "b".into(), salt_base64: "c".into() };

        write(&path, &envelope).unwrap();
        let loaded = read(&path).unwrap();
        assert_eq!(loaded.cipher_text_base64, "a");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }
}
