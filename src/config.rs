//! Configuration management for PageRelay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, an optional TOML file, environment variables and
//! command-line arguments into a single immutable value built once at startup.

use crate::cli::Cli;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map, Value},
    Error, Figment, Metadata, Profile, Provider,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

pub const PAGERDUTY_ENDPOINT: &str = "https://events.pagerduty.com/v2/enqueue";
pub const GARMIN_ENDPOINT: &str =
    "https://ipcinbound.inreachapp.com/IPC/IPCInboundApi/api/Messaging/Message";
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Unprefixed environment variable names understood for compatibility with
/// existing deployments, and the config key each one sets.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("PD_ROUTING_KEY", "pagerduty.routing_key"),
    ("GARMIN_API_KEY", "garmin.api_key"),
    ("GARMIN_IMEI", "garmin.imei"),
    ("GARMIN_SENDER", "garmin.sender"),
    ("OPENAI_API_KEY", "suggest.api_key"),
    ("PORT", "server.port"),
    ("SHORT_NAME", "contact.short_name"),
    ("CONTACT_NAME", "contact.name"),
    ("CONTACT_PHONE", "contact.phone"),
    ("CONTACT_SMS", "contact.sms"),
    ("CONTACT_IMESSAGE", "contact.imessage"),
    ("CONTACT_WHATSAPP", "contact.whatsapp"),
    ("CONTACT_PAGE_EMAIL", "contact.page_email"),
];

/// Keys whose environment values are taken verbatim. Parsing them as numbers
/// would drop a leading `+` or leading zeros from phone numbers and IMEIs.
const STRING_KEYS: &[&str] = &[
    "log_level",
    "pagerduty.routing_key",
    "pagerduty.endpoint",
    "garmin.api_key",
    "garmin.imei",
    "garmin.sender",
    "garmin.endpoint",
    "suggest.api_key",
    "suggest.model",
    "suggest.endpoint",
    "contact.short_name",
    "contact.name",
    "contact.phone",
    "contact.sms",
    "contact.imessage",
    "contact.whatsapp",
    "contact.page_email",
];

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the inbound HTTP server.
    pub server: ServerConfig,
    /// PagerDuty Events API channel. Disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagerduty: Option<PagerDutyConfig>,
    /// Garmin inReach satellite messenger channel. Disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garmin: Option<GarminConfig>,
    /// AI page-text suggestions. Disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest: Option<SuggestConfig>,
    /// Alternate contact details shown on the status page.
    #[serde(default)]
    pub contact: ContactConfig,
    /// Configuration for Prometheus metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Request timeout for channels that do not set their own `timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
}

/// Configuration for the inbound HTTP server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address to bind to.
    pub bind_address: IpAddr,
    /// The port to listen on. `0` picks a free port.
    pub port: u16,
}

/// Configuration for the PagerDuty channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PagerDutyConfig {
    /// The integration routing key, embedded in every event.
    #[serde(deserialize_with = "de::string_or_number")]
    pub routing_key: String,
    /// The Events API v2 enqueue URL.
    #[serde(default = "default_pagerduty_endpoint")]
    pub endpoint: String,
    /// Also require the response body to report `"status": "success"`.
    #[serde(default = "default_true")]
    pub verify_response: bool,
    /// Upper bound on the whole request, in milliseconds. No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Configuration for the Garmin inReach channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GarminConfig {
    /// Sent in the `x-api-key` header.
    #[serde(deserialize_with = "de::string_or_number")]
    pub api_key: String,
    /// IMEI of the receiving device.
    #[serde(deserialize_with = "de::string_or_number")]
    pub imei: String,
    /// Display name shown as the message sender.
    #[serde(deserialize_with = "de::string_or_number")]
    pub sender: String,
    #[serde(default = "default_garmin_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Configuration for the chat-completion suggestion client.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SuggestConfig {
    #[serde(deserialize_with = "de::string_or_number")]
    pub api_key: String,
    #[serde(default = "default_suggest_model")]
    pub model: String,
    #[serde(default = "default_suggest_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Alternate ways to reach the person being paged.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ContactConfig {
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub short_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub sms: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub imessage: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub whatsapp: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::option_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_email: Option<String>,
}

/// Configuration for Prometheus metrics.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,
}

fn default_pagerduty_endpoint() -> String {
    PAGERDUTY_ENDPOINT.to_string()
}

fn default_garmin_endpoint() -> String {
    GARMIN_ENDPOINT.to_string()
}

fn default_suggest_endpoint() -> String {
    OPENAI_ENDPOINT.to_string()
}

fn default_suggest_model() -> String {
    "gpt-4o".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// the TOML file named on the command line, legacy environment variables,
    /// `PAGERELAY_`-prefixed environment variables, and finally CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(VerbatimEnv(legacy_env()))
            // e.g. PAGERELAY_PAGERDUTY__ROUTING_KEY=...
            .merge(VerbatimEnv(Env::prefixed("PAGERELAY_").split("__")))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }

    /// Checks that at least one channel is configured and that the fields
    /// each enabled channel needs are not blank.
    pub fn validate(&self) -> Result<()> {
        if self.pagerduty.is_none() && self.garmin.is_none() {
            bail!(
                "no notification channels configured: \
                 please set PD_ROUTING_KEY or the GARMIN_* variables"
            );
        }
        if let Some(pd) = &self.pagerduty {
            require("pagerduty.routing_key", &pd.routing_key)?;
            require("pagerduty.endpoint", &pd.endpoint)?;
        }
        if let Some(garmin) = &self.garmin {
            require("garmin.api_key", &garmin.api_key)?;
            require("garmin.imei", &garmin.imei)?;
            require("garmin.sender", &garmin.sender)?;
            require("garmin.endpoint", &garmin.endpoint)?;
        }
        if let Some(suggest) = &self.suggest {
            require("suggest.api_key", &suggest.api_key)?;
        }
        Ok(())
    }
}

fn require(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("please set {}", key);
    }
    Ok(())
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map_or_else(|| key.as_str().to_string(), |(_, target)| target.to_string())
            .into()
    })
}

/// An environment provider that keeps the values of `STRING_KEYS` as
/// strings. Every other value is parsed the way `Env` parses it.
struct VerbatimEnv(Env);

impl Provider for VerbatimEnv {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        for (key, raw) in self.0.iter() {
            let value = if STRING_KEYS.contains(&key.as_str()) {
                Value::from(raw)
            } else {
                raw.parse::<Value>().unwrap_or_else(|never| match never {})
            };
            insert_nested(&mut dict, key.as_str(), value);
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Inserts `value` under a dotted `key`, creating intermediate tables.
fn insert_nested(dict: &mut Dict, key: &str, value: Value) {
    match key.split_once('.') {
        Some((head, rest)) => {
            let entry = dict
                .entry(head.to_string())
                .or_insert_with(|| Value::from(Dict::new()));
            if let Value::Dict(_, inner) = entry {
                insert_nested(inner, rest, value);
            }
        }
        None => {
            dict.insert(key.to_string(), value);
        }
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 80,
            },
            pagerduty: None,
            garmin: None,
            suggest: None,
            contact: ContactConfig::default(),
            metrics: MetricsConfig::default(),
            default_timeout_ms: None,
        }
    }
}

/// A TOML file may spell an IMEI or phone number as a bare integer. These
/// accept either form for string fields.
mod de {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        d.deserialize_any(StringOrNumber)
    }

    struct OptionStringOrNumber;

    impl<'de> Visitor<'de> for OptionStringOrNumber {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an optional string or number")
        }

        fn visit_none<E: de::Error>(self) -> Result<Option<String>, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Option<String>, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Option<String>, D::Error> {
            string_or_number(d).map(Some)
        }
    }

    pub fn option_string_or_number<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        d.deserialize_option(OptionStringOrNumber)
    }
}
