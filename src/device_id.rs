//! Persistent device identifier
//!
//! A random UUID stored in `~/.jarvis/device_id`, used to recognise the same
//! device across sessions without signing in. Clearing it makes the
//! assistant treat the device as a new user.

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::get_config_dir;

const DEVICE_ID_FILE: &str = "device_id";

/// Path of the device id file inside `dir`
pub fn device_id_path(dir: &Path) -> PathBuf {
    dir.join(DEVICE_ID_FILE)
}

/// Get or create the device id in the default config directory
pub fn get_device_id() -> std::io::Result<String> {
    get_device_id_in(&get_config_dir())
}

/// Get or create the device id stored in `dir`
pub fn get_device_id_in(dir: &Path) -> std::io::Result<String> {
    let path = device_id_path(dir);

    if path.exists() {
        let stored = fs::read_to_string(&path)?;
        let stored = stored.trim();
        if Uuid::parse_str(stored).is_ok() {
            return Ok(stored.to_string());
        }
        tracing::warn!("Ignoring malformed device id in {:?}", path);
    }

    fs::create_dir_all(dir)?;
    let device_id = Uuid::new_v4().to_string();
    fs::write(&path, &device_id)?;
    tracing::info!("Created new device id: {}", device_id);
    Ok(device_id)
}

/// Remove the device id from the default config directory
pub fn clear_device_id() -> std::io::Result<()> {
    clear_device_id_in(&get_config_dir())
}

/// Remove the device id stored in `dir`, if any
pub fn clear_device_id_in(dir: &Path) -> std::io::Result<()> {
    let path = device_id_path(dir);
    if path.exists() {
        fs::remove_file(&path)?;
        tracing::info!("Device id cleared");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_device_id_is_created_and_reused() {
        let dir = TempDir::new().unwrap();
        let first = get_device_id_in(dir.path()).unwrap();
        let second = get_device_id_in(dir.path()).unwrap();

        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_clear_creates_new_identity() {
        let dir = TempDir::new().unwrap();
        let first = get_device_id_in(dir.path()).unwrap();
        clear_device_id_in(dir.path()).unwrap();
        assert!(!device_id_path(dir.path()).exists());

        let second = get_device_id_in(dir.path()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_id_is_replaced() {
        let dir = TempDir::new().unwrap();
        fs::write(device_id_path(dir.path()), "not-a-uuid").unwrap();

        let id = get_device_id_in(dir.path()).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_clear_without_file_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(clear_device_id_in(dir.path()).is_ok());
    }
}
