use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::*;

const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.json";

pub struct CredentialStore {
    config_path: PathBuf,
    credentials_path: PathBuf,
}

impl CredentialStore {
    /// Store under the platform config directory (`~/.config/ringsnap` on Linux).
    pub fn new() -> Self {
        let config_dir = match dirs::config_dir() {
            Some(dir) => dir.join("ringsnap"),
            None => {
                warn!("Could not determine config directory, using the current directory");
                PathBuf::from(".")
            }
        };
        Self::at(config_dir)
    }

    /// A directory that cannot be created is not fatal: loads then yield
    /// defaults and saves log their failure.
    pub fn at(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        if let Err(e) = fs::create_dir_all(&config_dir) {
            warn!(
                "Could not create config directory {}: {}",
                config_dir.display(),
                e
            );
        }

        Self {
            config_path: config_dir.join(CONFIG_FILE),
            credentials_path: config_dir.join(CREDENTIALS_FILE),
        }
    }

    // -- Config (no secrets) --------------------------------------------------

    pub fn load_config(&self) -> Config {
        load_or_default(&self.config_path, |s| toml::from_str(s).map_err(Into::into))
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }

    // -- Credentials (secrets, 0600) ------------------------------------------

    /// Load credentials, minting and persisting a hardware id on first use.
    pub fn load_credentials(&self) -> Credentials {
        let mut creds: Credentials = load_or_default(&self.credentials_path, |s| {
            serde_json::from_str(s).map_err(Into::into)
        });

        if creds.hardware_id.trim().is_empty() {
            creds.hardware_id = uuid::Uuid::new_v4().to_string();
            debug!("Generated hardware id {}", creds.hardware_id);
            self.persist_credentials(&creds);
        }

        creds
    }

    pub fn save_credentials(&self, creds: &Credentials) -> Result<()> {
        let contents = serde_json::to_string_pretty(creds)?;
        fs::write(&self.credentials_path, &contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.credentials_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Best-effort save: a failure is logged and the run carries on.
    pub fn persist_credentials(&self, creds: &Credentials) {
        if let Err(e) = self.save_credentials(creds) {
            warn!(
                "Could not save credentials to {}: {:#}",
                self.credentials_path.display(),
                e
            );
        }
    }
}

fn load_or_default<T, F>(path: &Path, parse: F) -> T
where
    T: DeserializeOwned + Default,
    F: FnOnce(&str) -> Result<T>,
{
    if !path.exists() {
        return T::default();
    }

    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|contents| parse(&contents));

    match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Ignoring unreadable settings file {}: {:#}",
                path.display(),
                e
            );
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        assert_eq!(store.load_config(), Config::default());
        let creds = store.load_credentials();
        assert!(creds.username.is_none());
        assert!(!creds.hardware_id.is_empty());
    }

    #[test]
    fn uncreatable_directory_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "plain file").unwrap();
        let store = CredentialStore::at(blocker.join("ringsnap"));

        assert_eq!(store.load_config(), Config::default());
        let mut creds = store.load_credentials();
        assert!(!creds.hardware_id.is_empty());

        creds.refresh_token = Some("rotated".into());
        store.persist_credentials(&creds);
        assert!(store.save_credentials(&creds).is_err());
    }

    #[test]
    fn hardware_id_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        let first = store.load_credentials().hardware_id;
        let second = store.load_credentials().hardware_id;
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_files_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "device_id = [not toml").unwrap();
        fs::write(dir.path().join(CREDENTIALS_FILE), "{ broken").unwrap();
        let store = CredentialStore::at(dir.path());

        assert_eq!(store.load_config(), Config::default());
        assert!(store.load_credentials().refresh_token.is_none());
    }

    #[test]
    fn refresh_token_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());

        let mut creds = store.load_credentials();
        creds.refresh_token = Some("rotated".into());
        store.save_credentials(&creds).unwrap();

        let reloaded = CredentialStore::at(dir.path()).load_credentials();
        assert_eq!(reloaded.refresh_token.as_deref(), Some("rotated"));
        assert_eq!(reloaded.hardware_id, creds.hardware_id);
    }

    #[cfg(unix)]
    #[test]
    fn credentials_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());
        store.save_credentials(&Credentials::default()).unwrap();

        let mode = fs::metadata(dir.path().join(CREDENTIALS_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path());
        let config = Config {
            device_id: Some(12345),
            max_retries: 5,
            ..Default::default()
        };
        store.save_config(&config).unwrap();
        assert_eq!(store.load_config(), config);
    }
}
