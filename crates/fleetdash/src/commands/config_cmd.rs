//! Config subcommand handlers.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}

/// Format config for display. Expects an already redacted config.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "color = \"{}\"", d.color);
    let _ = writeln!(out, "insecure = {}", d.insecure);
    let _ = writeln!(out, "timeout = {}", d.timeout);
    let _ = writeln!(out, "dashboard_poll_secs = {}", d.dashboard_poll_secs);
    let _ = writeln!(out, "sensor_table_limit = {}", d.sensor_table_limit);
    let _ = writeln!(out, "chart_window = {}", d.chart_window);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        if let Some(ref token) = p.token {
            let _ = writeln!(out, "token = \"{token}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref transport) = p.transport {
            let _ = writeln!(out, "transport = \"{transport}\"");
        }
        if let Some(send) = p.send_credentials {
            let _ = writeln!(out, "send_credentials = {send}");
        }
        if let Some(secs) = p.reconnect_max_secs {
            let _ = writeln!(out, "reconnect_max_secs = {secs}");
        }
        if let Some(retries) = p.max_retries {
            let _ = writeln!(out, "max_retries = {retries}");
        }
        if !p.rooms.is_empty() {
            let _ = writeln!(out, "rooms = {:?}", p.rooms);
        }
    }

    out.trim_end().to_owned()
}

fn check_url(raw: &str) -> Result<(), CliError> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|_| CliError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {raw}"),
        })
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str, expect: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expect}"),
    })
}

/// Apply one `config set` key to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "url" => {
            check_url(&value)?;
            profile.url = value;
        }
        "token" => profile.token = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_value(key, &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_value(key, &value, "a number (seconds)")?),
        "transport" => {
            config::parse_transport(&value)?;
            profile.transport = Some(value.to_ascii_lowercase());
        }
        "send_credentials" | "send-credentials" => {
            profile.send_credentials = Some(parse_value(key, &value, "'true' or 'false'")?);
        }
        "reconnect_max_secs" | "reconnect-max-secs" => {
            profile.reconnect_max_secs = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        "max_retries" | "max-retries" => {
            profile.max_retries = Some(parse_value(key, &value, "a whole number")?);
        }
        "rooms" => {
            profile.rooms = value
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_owned)
                .collect();
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: url, token, token_env, ca_cert, \
                     insecure, timeout, transport, send_credentials, reconnect_max_secs, \
                     max_retries, rooms"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            url,
            name,
            token_env,
            rooms,
            force,
        } => {
            check_url(&url)?;
            let mut cfg = config::load_config_or_default();
            if cfg.profiles.contains_key(&name) && !force {
                return Err(CliError::Validation {
                    field: "name".into(),
                    reason: format!("profile '{name}' already exists (use --force to replace it)"),
                });
            }

            cfg.profiles.insert(
                name.clone(),
                Profile {
                    url,
                    token_env,
                    rooms,
                    ..Profile::default()
                },
            );
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }

            let path = config::save_config(&cfg)?;
            output::print_status(
                &format!("✓ Profile '{name}' written to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            set_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            output::print_status(&format!("✓ Set {key} on profile '{profile_name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                output::print_status(
                    "No profiles configured. Run: fleetdash config init --url <URL>",
                    global.quiet,
                );
            } else {
                let listing: Vec<String> = cfg
                    .profiles
                    .iter()
                    .map(|(name, p)| {
                        let marker = if name == default { " *" } else { "" };
                        format!("{name}{marker}\t{}", p.url)
                    })
                    .collect();
                output::print_output(&listing.join("\n"), global.quiet);
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::print_status(&format!("✓ Default profile set to '{name}'"), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_key_validates_values() {
        let mut profile = Profile::default();
        set_key(&mut profile, "url", "http://fleet.local:5000".into()).unwrap();
        set_key(&mut profile, "transport", "WebSocket".into()).unwrap();
        set_key(&mut profile, "max-retries", "5".into()).unwrap();
        set_key(&mut profile, "rooms", "site-1, gw-2,,".into()).unwrap();

        assert_eq!(profile.url, "http://fleet.local:5000");
        assert_eq!(profile.transport.as_deref(), Some("websocket"));
        assert_eq!(profile.max_retries, Some(5));
        assert_eq!(profile.rooms, vec!["site-1", "gw-2"]);

        assert!(set_key(&mut profile, "url", "nope".into()).is_err());
        assert!(set_key(&mut profile, "transport", "carrier-pigeon".into()).is_err());
        assert!(set_key(&mut profile, "insecure", "maybe".into()).is_err());
        assert!(set_key(&mut profile, "colour", "red".into()).is_err());
    }

    #[test]
    fn show_masks_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                url: "http://fleet.lab".into(),
                token: Some("secret-jwt".into()),
                ..Profile::default()
            },
        );
        let shown = format_config(&redacted(&cfg));
        assert!(shown.contains("[profiles.lab]"));
        assert!(shown.contains(MASK));
        assert!(!shown.contains("secret-jwt"));
    }
}
