use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::auth::{Authenticator, Login, Session};
use crate::error::AuthError;
use crate::ring::{DeviceId, DeviceList, RingApi, RingClient};
use crate::snapshot::{self, RetryPolicy, Retrieved, SnapshotRequest};
use crate::storage::{Config, CredentialStore, Credentials};

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config_dir: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Command-line overrides for a snapshot run. `None` defers to config.toml.
#[derive(Debug, Clone, Default)]
pub struct SnapshotArgs {
    pub device_id: Option<DeviceId>,
    pub out: Option<PathBuf>,
    pub force_update: Option<bool>,
    pub validate: bool,
    pub max_retries: Option<u32>,
    pub remember: bool,
}

/// Effective settings for one snapshot run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPlan {
    pub device_id: DeviceId,
    pub force_refresh: bool,
    pub validate_image: bool,
    pub max_attempts: u32,
    pub output_dir: PathBuf,
}

impl SnapshotPlan {
    fn into_request(self, file_name: String) -> SnapshotRequest {
        SnapshotRequest {
            device_id: self.device_id,
            force_refresh: self.force_refresh,
            validate_image: self.validate_image,
            max_attempts: self.max_attempts.max(1),
            output_path: self.output_dir.join(file_name),
        }
    }
}

pub fn cmd_snapshot(global: &GlobalOptions, args: &SnapshotArgs) -> Result<()> {
    let store = open_store(global);
    let mut config = store.load_config();
    let mut creds = store.load_credentials();
    apply_login_overrides(&mut creds, global);

    let plan = plan_snapshot(&config, args)?;

    if args.remember {
        config.device_id = Some(plan.device_id);
        config.output_dir = Some(plan.output_dir.display().to_string());
        config.force_update = plan.force_refresh;
        config.validate_image = plan.validate_image;
        config.max_retries = plan.max_attempts;
        if let Err(e) = store.save_config(&config) {
            warn!("Could not save config.toml: {:#}", e);
        }
    }

    let policy = retry_policy(&config);
    let client = RingClient::new()?;

    let retrieved = run_snapshot(&client, &store, &mut creds, plan, &policy, prompt_for_code)?;
    info!(
        "Snapshot stored at {} ({} bytes) after {} attempt(s)",
        retrieved.path.display(),
        retrieved.bytes,
        retrieved.attempts
    );

    eprintln!("Done");
    Ok(())
}

pub fn cmd_list(global: &GlobalOptions) -> Result<()> {
    let store = open_store(global);
    let mut creds = store.load_credentials();
    apply_login_overrides(&mut creds, global);

    let client = RingClient::new()?;
    let devices = run_list(&client, &store, &mut creds, prompt_for_code)?;

    print!("{}", format_devices(&devices));
    Ok(())
}

/// Authenticate (storing the rotated refresh token) and fetch every device
/// on the account.
pub fn run_list<A, P>(
    api: &A,
    store: &CredentialStore,
    creds: &mut Credentials,
    prompt: P,
) -> Result<DeviceList>
where
    A: RingApi + ?Sized,
    P: FnMut(&str) -> Option<String>,
{
    let session = authenticate(api, store, creds, prompt)?;

    eprint!("Retrieving all devices... ");
    let devices = api
        .list_devices(&session)
        .context("Could not retrieve devices")?;
    eprintln!("{} found", devices.count());

    Ok(devices)
}

/// Authenticate, trigger, resolve the file name and retrieve. The rotated
/// refresh token is stored before any snapshot work starts.
pub fn run_snapshot<A, P>(
    api: &A,
    store: &CredentialStore,
    creds: &mut Credentials,
    plan: SnapshotPlan,
    policy: &RetryPolicy,
    prompt: P,
) -> Result<Retrieved>
where
    A: RingApi + ?Sized,
    P: FnMut(&str) -> Option<String>,
{
    let session = authenticate(api, store, creds, prompt)?;

    if plan.force_refresh {
        eprintln!("Requesting Ring device to capture a new snapshot");
        if let Err(e) =
            snapshot::request_fresh_capture(api, &session, plan.device_id, policy.settle_delay)
        {
            eprintln!(
                "Capture request failed ({}), downloading the latest cached snapshot instead",
                e
            );
        }
    }

    let taken_at = snapshot::resolve_latest_timestamp(api, &session, plan.device_id);
    let file_name = snapshot::snapshot_file_name(plan.device_id, &taken_at);
    let request = plan.into_request(file_name);

    let retrieved = snapshot::retrieve(api, &session, &request, policy)?;
    Ok(retrieved)
}

/// Produce a session from stored or supplied credentials. Prefers the refresh
/// token and falls back to username and password when the token is rejected.
pub fn authenticate<A, P>(
    api: &A,
    store: &CredentialStore,
    creds: &mut Credentials,
    mut prompt: P,
) -> Result<Session>
where
    A: RingApi + ?Sized,
    P: FnMut(&str) -> Option<String>,
{
    if !creds.can_authenticate() {
        return Err(AuthError::MissingCredentials.into());
    }

    eprintln!("Connecting to Ring services");
    let authenticator = Authenticator::new(api, &creds.hardware_id);

    let mut session = None;
    if let Some(token) = creds.refresh_token() {
        eprintln!("Authenticating using refresh token from previous session");
        match authenticator.with_refresh_token(token) {
            Ok(s) => session = Some(s),
            Err(e) if creds.login().is_some() => {
                eprintln!("Refresh token not accepted ({}), trying username and password", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let session = match session {
        Some(session) => session,
        None => {
            let (username, password) = creds.login().ok_or(AuthError::MissingCredentials)?;
            eprintln!("Authenticating using provided username and password");
            match authenticator.with_credentials(username, password)? {
                Login::Authenticated(session) => session,
                Login::AwaitingSecondFactor(challenge) => loop {
                    let code = prompt(challenge.hint()).ok_or_else(|| {
                        AuthError::SecondFactorRejected("no code entered".to_string())
                    })?;
                    match authenticator.submit_second_factor(&challenge, &code) {
                        Ok(session) => break session,
                        Err(AuthError::SecondFactorRejected(reason)) => {
                            eprintln!("Code not accepted ({}), please try again", reason);
                        }
                        Err(e) => return Err(e.into()),
                    }
                },
            }
        }
    };

    // so the next run can skip the password
    if let Some(token) = session.refresh_token() {
        creds.refresh_token = Some(token.to_string());
    }
    store.persist_credentials(creds);

    Ok(session)
}

pub fn format_devices(devices: &DeviceList) -> String {
    let sections = [
        ("Authorized Doorbells", &devices.authorized_doorbots),
        ("Doorbells", &devices.doorbots),
        ("Stickup cams", &devices.stickup_cams),
    ];

    let mut out = String::new();
    for (title, list) in sections {
        if list.is_empty() {
            continue;
        }
        out.push_str(title);
        out.push('\n');
        for device in list {
            out.push_str(&format!("{} - {}\n", device.id, device.description));
        }
        out.push('\n');
    }
    out
}

fn open_store(global: &GlobalOptions) -> CredentialStore {
    match &global.config_dir {
        Some(dir) => CredentialStore::at(dir),
        None => CredentialStore::new(),
    }
}

fn apply_login_overrides(creds: &mut Credentials, global: &GlobalOptions) {
    if let Some(username) = &global.username {
        creds.username = Some(username.clone());
    }
    if let Some(password) = &global.password {
        creds.password = Some(password.clone());
    }
}

fn plan_snapshot(config: &Config, args: &SnapshotArgs) -> Result<SnapshotPlan> {
    let device_id = args.device_id.or(config.device_id).context(
        "--device-id is required (or set device_id in config.toml). Run `ringsnap list` to see your devices",
    )?;

    let output_dir = match (&args.out, &config.output_dir) {
        (Some(out), _) => out.clone(),
        (None, Some(dir)) => PathBuf::from(dir),
        (None, None) => std::env::current_dir().context("Could not determine current directory")?,
    };

    Ok(SnapshotPlan {
        device_id,
        force_refresh: args.force_update.unwrap_or(config.force_update),
        validate_image: args.validate || config.validate_image,
        max_attempts: args.max_retries.unwrap_or(config.max_retries).max(1),
        output_dir,
    })
}

fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy {
        settle_delay: Duration::from_millis(config.settle_delay_ms),
        retry_delay: Duration::from_millis(config.retry_delay_ms),
    }
}

fn prompt_for_code(hint: &str) -> Option<String> {
    eprintln!(
        "Two factor authentication enabled on this account, please enter the code sent to {}:",
        hint
    );

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    let code = line.trim();
    (!code.is_empty()).then(|| code.to_string())
}
