//! CLI configuration: thin wrapper around `fleetdash_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--url,
//! --token, --insecure, ...) on top of the selected profile.

use std::time::Duration;

use secrecy::SecretString;

use fleetdash_core::{SyncConfig, TlsVerification, TransportPolicy};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use fleetdash_config::{
    Config, Profile, config_path, load_config_or_default, parse_transport, save_config,
};

/// Everything a live command needs to talk to one backend.
#[derive(Debug)]
pub struct Resolved {
    pub profile: String,
    pub sync: SyncConfig,
    /// Rooms from the profile; commands append their own `--room`s.
    pub rooms: Vec<String>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Load the config file and resolve it against the global flags.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    resolve_with(global, &load_config_or_default())
}

/// Translate the active profile + global flags into a `SyncConfig`.
///
/// With no matching profile, `--url` alone is enough; an explicitly
/// requested profile that doesn't exist is an error.
pub fn resolve_with(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let name = active_profile_name(global, config);

    let (mut sync, rooms) = if let Some(profile) = config.profiles.get(&name) {
        (
            fleetdash_config::profile_to_sync_config(profile, &config.defaults)?,
            profile.rooms.clone(),
        )
    } else {
        if global.profile.is_some() {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(config),
            });
        }
        let url = global.url.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let adhoc = Profile {
            url,
            ..Profile::default()
        };
        (
            fleetdash_config::profile_to_sync_config(&adhoc, &config.defaults)?,
            Vec::new(),
        )
    };

    apply_overrides(&mut sync, global)?;

    Ok(Resolved {
        profile: name,
        sync,
        rooms,
    })
}

fn apply_overrides(sync: &mut SyncConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref raw) = global.url {
        sync.url = raw.parse::<url::Url>().map_err(|_| CliError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }
    if let Some(ref token) = global.token {
        sync.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        sync.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        sync.timeout = Duration::from_secs(secs);
    }
    if global.polling_only {
        sync.push.transports = TransportPolicy::PollingOnly;
    }
    Ok(())
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
