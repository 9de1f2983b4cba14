// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! A mosquitto-style, line-oriented configuration file.
//!
//! Unlike the TOML configuration the broker's ancestor used, the directive
//! format here is plain text: one directive per line, `#` starts a comment,
//! and `listener { ... }` opens a nested block for per-listener TLS options.
//! Unknown directives are logged and ignored so older config files keep
//! loading after new directives are added.

use std::fs;
use std::path::Path;

use crate::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerProtocol {
    Mqtt,
    MqttSn,
    Http,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsConfig {
    pub cafile: Option<String>,
    pub certfile: Option<String>,
    pub keyfile: Option<String>,
    pub require_certificate: bool,
    pub allow_non_sni_connections: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    pub port: u16,
    pub bind: String,
    pub protocol: ListenerProtocol,
    pub tls: Option<TlsConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub receive_maximum: u16,
    pub topic_alias_maximum: u16,
    pub maximum_packet_size: u32,
    pub maximum_qos: u8,
    pub retain_available: bool,
    pub shared_subscription_available: bool,
    pub server_keep_alive: Option<u16>,
    pub persistence: bool,
    pub listeners: Vec<ListenerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            receive_maximum: u16::MAX,
            topic_alias_maximum: 0,
            maximum_packet_size: u32::MAX,
            maximum_qos: 2,
            retain_available: true,
            shared_subscription_available: true,
            server_keep_alive: None,
            persistence: false,
            listeners: vec![ListenerConfig {
                port: 1883,
                bind: "0.0.0.0".to_string(),
                protocol: ListenerProtocol::Mqtt,
                tls: None,
            }],
        }
    }
}

impl Config {
    /// Loads and parses a config file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses the directive text directly; exposed separately from `load`
    /// so tests can exercise the grammar without touching the filesystem.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let mut config = Self::default();
        config.listeners.clear();

        let mut lines = content.lines().peekable();
        while let Some(raw_line) = lines.next() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let directive = parts.next().unwrap_or_default();
            let rest = parts.next().unwrap_or_default().trim();

            match directive {
                "loglevel" => config.log_level = rest.to_string(),
                "receive_maximum" => config.receive_maximum = parse_u16(rest)?,
                "topic_alias_maximum" => config.topic_alias_maximum = parse_u16(rest)?,
                "maximum_packet_size" => config.maximum_packet_size = parse_u32(rest)?,
                "maximum_qos" => config.maximum_qos = parse_u8(rest)?,
                "retain_available" => config.retain_available = parse_bool(rest)?,
                "shared_subscription_available" => {
                    config.shared_subscription_available = parse_bool(rest)?;
                }
                "server_keep_alive" => config.server_keep_alive = Some(parse_u16(rest)?),
                "persistence" => config.persistence = parse_bool(rest)?,
                "listener" => {
                    let listener = parse_listener(rest, &mut lines)?;
                    config.listeners.push(listener);
                }
                other => {
                    log::warn!("Ignoring unknown config directive: {}", other);
                }
            }
        }

        if config.listeners.is_empty() {
            config.listeners.push(ListenerConfig {
                port: 1883,
                bind: "0.0.0.0".to_string(),
                protocol: ListenerProtocol::Mqtt,
                tls: None,
            });
        }

        Ok(config)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_u8(s: &str) -> Result<u8, Error> {
    s.parse()
        .map_err(|_| Error::new(ErrorKind::ConfigError, &format!("invalid integer: {s}")))
}

fn parse_u16(s: &str) -> Result<u16, Error> {
    s.parse()
        .map_err(|_| Error::new(ErrorKind::ConfigError, &format!("invalid integer: {s}")))
}

fn parse_u32(s: &str) -> Result<u32, Error> {
    s.parse()
        .map_err(|_| Error::new(ErrorKind::ConfigError, &format!("invalid integer: {s}")))
}

fn parse_bool(s: &str) -> Result<bool, Error> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::new(
            ErrorKind::ConfigError,
            &format!("invalid boolean: {s}"),
        )),
    }
}

fn parse_listener<'a, I>(rest: &str, lines: &mut std::iter::Peekable<I>) -> Result<ListenerConfig, Error>
where
    I: Iterator<Item = &'a str>,
{
    let rest = rest.trim_end_matches('{').trim();
    let mut tokens = rest.split_whitespace();
    let port = parse_u16(tokens.next().ok_or_else(|| {
        Error::new(ErrorKind::ConfigError, "listener directive requires a port")
    })?)?;
    let bind = tokens.next().unwrap_or("0.0.0.0").to_string();
    let protocol = match tokens.next().unwrap_or("mqtt") {
        "mqtt" => ListenerProtocol::Mqtt,
        "mqttsn" => ListenerProtocol::MqttSn,
        "http" => ListenerProtocol::Http,
        other => {
            return Err(Error::new(
                ErrorKind::ConfigError,
                &format!("unknown listener protocol: {other}"),
            ))
        }
    };

    let mut tls: Option<TlsConfig> = None;
    if rest.contains('{') || matches!(lines.peek(), Some(next) if next.trim().starts_with('{')) {
        if matches!(lines.peek(), Some(next) if next.trim().starts_with('{')) {
            lines.next();
        }
        let mut block = TlsConfig::default();
        for line in lines.by_ref() {
            let line = strip_comment(line).trim();
            if line == "}" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default().trim();
            match key {
                "cafile" => block.cafile = Some(value.to_string()),
                "certfile" => block.certfile = Some(value.to_string()),
                "keyfile" => block.keyfile = Some(value.to_string()),
                "require_certificate" => block.require_certificate = parse_bool(value)?,
                "allow_non_sni_connections" => block.allow_non_sni_connections = parse_bool(value)?,
                other => log::warn!("Ignoring unknown listener directive: {}", other),
            }
        }
        tls = Some(block);
    }

    Ok(ListenerConfig {
        port,
        bind,
        protocol,
        tls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_on_empty_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].port, 1883);
    }

    #[test]
    fn test_parse_simple_directives() {
        let content = "\
loglevel DEBUG
receive_maximum 32
maximum_qos 1
retain_available false
";
        let config = Config::parse(content).unwrap();
        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.receive_maximum, 32);
        assert_eq!(config.maximum_qos, 1);
        assert!(!config.retain_available);
    }

    #[test]
    fn test_parse_listener_with_tls_block() {
        let content = "\
listener 8883 0.0.0.0 mqtt {
    cafile /etc/mqttd/ca.pem
    certfile /etc/mqttd/cert.pem
    keyfile /etc/mqttd/key.pem
    require_certificate true
}
";
        let config = Config::parse(content).unwrap();
        assert_eq!(config.listeners.len(), 1);
        let listener = &config.listeners[0];
        assert_eq!(listener.port, 8883);
        let tls = listener.tls.as_ref().unwrap();
        assert_eq!(tls.certfile.as_deref(), Some("/etc/mqttd/cert.pem"));
        assert!(tls.require_certificate);
    }

    #[test]
    fn test_unknown_directive_is_ignored_not_fatal() {
        let config = Config::parse("frobnicate true\nloglevel WARN\n").unwrap();
        assert_eq!(config.log_level, "WARN");
    }
}
