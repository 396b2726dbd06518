//! Engine Configuration
//!
//! The engine owns its configuration schema. This module only models the
//! envelope the binding layer needs to reason about:
//!
//! - `inbounds`: listener definitions (opaque JSON objects)
//! - `outbounds`: dialer definitions (opaque JSON objects)
//! - `apps`: ordered list of engine subsystems, each tagged with its kind
//!
//! An [`EngineConfig`] can only be obtained through validation, either from a
//! [`ConfigLoader`] or by finalizing a [`ConfigDraft`], and is never mutated
//! afterwards.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Engine subsystem kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppKind {
    Log,
    Dispatcher,
    InboundManager,
    OutboundManager,
    Router,
    Dns,
    Policy,
    Stats,
    Api,
    Observatory,
    /// Subsystem unknown to the binding layer, kept as-is
    Other(String),
}

impl AppKind {
    /// Canonical config name
    pub fn name(&self) -> &str {
        match self {
            AppKind::Log => "log",
            AppKind::Dispatcher => "dispatcher",
            AppKind::InboundManager => "inbound",
            AppKind::OutboundManager => "outbound",
            AppKind::Router => "router",
            AppKind::Dns => "dns",
            AppKind::Policy => "policy",
            AppKind::Stats => "stats",
            AppKind::Api => "api",
            AppKind::Observatory => "observatory",
            AppKind::Other(name) => name,
        }
    }
}

impl From<String> for AppKind {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "log" => AppKind::Log,
            "dispatcher" => AppKind::Dispatcher,
            "inbound" => AppKind::InboundManager,
            "outbound" => AppKind::OutboundManager,
            "router" | "routing" => AppKind::Router,
            "dns" => AppKind::Dns,
            "policy" => AppKind::Policy,
            "stats" => AppKind::Stats,
            "api" => AppKind::Api,
            "observatory" => AppKind::Observatory,
            _ => AppKind::Other(s),
        }
    }
}

impl From<AppKind> for String {
    fn from(kind: AppKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One engine subsystem entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppModule {
    /// Subsystem kind
    pub kind: AppKind,
    /// Subsystem settings, passed through to the engine untouched
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
}

impl AppModule {
    /// Create a module with no settings
    pub fn new(kind: AppKind) -> Self {
        Self {
            kind,
            settings: Value::Null,
        }
    }
}

/// Serialized form shared by every loader
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    inbounds: Vec<Value>,
    #[serde(default)]
    outbounds: Vec<Value>,
    #[serde(default)]
    apps: Vec<AppModule>,
}

/// Validated, immutable engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    inbounds: Vec<Value>,
    outbounds: Vec<Value>,
    apps: Vec<AppModule>,
}

impl EngineConfig {
    /// Listener definitions
    pub fn inbounds(&self) -> &[Value] {
        &self.inbounds
    }

    /// Dialer definitions
    pub fn outbounds(&self) -> &[Value] {
        &self.outbounds
    }

    /// Subsystems in configured order
    pub fn apps(&self) -> &[AppModule] {
        &self.apps
    }

    /// Does this config bind any listener?
    pub fn has_inbounds(&self) -> bool {
        !self.inbounds.is_empty()
    }

    /// Check whether a subsystem is configured
    pub fn has_app(&self, kind: &AppKind) -> bool {
        self.apps.iter().any(|app| &app.kind == kind)
    }

    /// Copy into a mutable draft
    pub fn to_draft(&self) -> ConfigDraft {
        ConfigDraft {
            inbounds: self.inbounds.clone(),
            outbounds: self.outbounds.clone(),
            apps: self.apps.clone(),
        }
    }

    /// Export as JSON
    pub fn to_json(&self) -> String {
        let doc = ConfigDocument {
            inbounds: self.inbounds.clone(),
            outbounds: self.outbounds.clone(),
            apps: self.apps.clone(),
        };
        serde_json::to_string_pretty(&doc).unwrap_or_default()
    }
}

/// Mutable configuration, produced by the text loader
///
/// Callers may strip listeners or subsystems before calling
/// [`ConfigDraft::finalize`], which re-validates the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDraft {
    pub inbounds: Vec<Value>,
    pub outbounds: Vec<Value>,
    pub apps: Vec<AppModule>,
}

impl ConfigDraft {
    /// Remove every listener definition
    pub fn clear_inbounds(&mut self) {
        self.inbounds.clear();
    }

    /// Keep only the subsystems whose kind is in `allowed`.
    ///
    /// Relative order of the surviving modules is preserved.
    pub fn retain_apps(&mut self, allowed: &[AppKind]) {
        self.apps.retain(|app| allowed.contains(&app.kind));
    }

    /// Validate into an immutable [`EngineConfig`]
    pub fn finalize(self) -> Result<EngineConfig, ConfigError> {
        if self.outbounds.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one outbound is required".into(),
            ));
        }

        for (i, inbound) in self.inbounds.iter().enumerate() {
            if !inbound.is_object() {
                return Err(ConfigError::Invalid(format!("inbound #{i} is not an object")));
            }
        }

        for (i, outbound) in self.outbounds.iter().enumerate() {
            if !outbound.is_object() {
                return Err(ConfigError::Invalid(format!("outbound #{i} is not an object")));
            }
        }

        let mut seen = HashSet::new();
        for app in &self.apps {
            if !seen.insert(&app.kind) {
                return Err(ConfigError::Invalid(format!("duplicate app module: {}", app.kind)));
            }
        }

        Ok(EngineConfig {
            inbounds: self.inbounds,
            outbounds: self.outbounds,
            apps: self.apps,
        })
    }
}

impl ConfigDocument {
    fn into_draft(self) -> ConfigDraft {
        ConfigDraft {
            inbounds: self.inbounds,
            outbounds: self.outbounds,
            apps: self.apps,
        }
    }
}

/// Text configuration format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    #[default]
    Json,
    Toml,
}

/// Turns raw payloads into engine configurations
pub trait ConfigLoader: Send + Sync {
    /// Decode the binary payload handed over by the host on start
    fn decode_binary(&self, bytes: &[u8]) -> Result<EngineConfig, ConfigError>;

    /// Decode a text payload into a draft that may still be edited
    fn decode_text(&self, text: &str) -> Result<ConfigDraft, ConfigError>;
}

/// Default loader for the config envelope
///
/// The binary path always carries UTF-8 JSON. The text path uses the format
/// chosen at construction.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    text_format: ConfigFormat,
}

impl DocumentLoader {
    /// Create a loader with the given text format
    pub fn new(text_format: ConfigFormat) -> Self {
        Self { text_format }
    }

    /// Text format used by [`ConfigLoader::decode_text`]
    pub fn text_format(&self) -> ConfigFormat {
        self.text_format
    }

    fn parse_json(content: &str) -> Result<ConfigDocument, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Decode(e.to_string()))
    }

    fn parse_toml(content: &str) -> Result<ConfigDocument, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Decode(e.to_string()))
    }
}

impl ConfigLoader for DocumentLoader {
    fn decode_binary(&self, bytes: &[u8]) -> Result<EngineConfig, ConfigError> {
        let content = std::str::from_utf8(bytes).map_err(|_| ConfigError::Encoding)?;
        Self::parse_json(content)?.into_draft().finalize()
    }

    fn decode_text(&self, text: &str) -> Result<ConfigDraft, ConfigError> {
        let doc = match self.text_format {
            ConfigFormat::Json => Self::parse_json(text)?,
            ConfigFormat::Toml => Self::parse_toml(text)?,
        };
        Ok(doc.into_draft())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "inbounds": [{ "protocol": "socks", "port": 10808 }],
        "outbounds": [{ "protocol": "vless", "tag": "proxy" }],
        "apps": [
            { "kind": "log" },
            { "kind": "dispatcher" },
            { "kind": "inbound" },
            { "kind": "outbound" },
            { "kind": "router", "settings": { "domainStrategy": "AsIs" } },
            { "kind": "stats" },
            { "kind": "api" }
        ]
    }"#;

    #[test]
    fn test_app_kind_names() {
        assert_eq!(AppKind::from("routing".to_string()), AppKind::Router);
        assert_eq!(AppKind::from("Log".to_string()), AppKind::Log);
        assert_eq!(
            AppKind::from("reverse".to_string()),
            AppKind::Other("reverse".into())
        );
        assert_eq!(AppKind::InboundManager.to_string(), "inbound");
    }

    #[test]
    fn test_decode_binary() {
        let loader = DocumentLoader::default();
        let config = loader.decode_binary(SAMPLE.as_bytes()).unwrap();

        assert!(config.has_inbounds());
        assert_eq!(config.outbounds().len(), 1);
        assert_eq!(config.apps().len(), 7);
        assert!(config.has_app(&AppKind::Stats));
        assert_eq!(config.apps()[4].settings["domainStrategy"], "AsIs");
    }

    #[test]
    fn test_decode_binary_rejects_garbage() {
        let loader = DocumentLoader::default();

        assert!(matches!(
            loader.decode_binary(b"{ not json"),
            Err(ConfigError::Decode(_))
        ));
        assert!(matches!(
            loader.decode_binary(&[0xff, 0xfe, 0x00]),
            Err(ConfigError::Encoding)
        ));
    }

    #[test]
    fn test_validation() {
        let draft = ConfigDraft::default();
        assert!(matches!(draft.finalize(), Err(ConfigError::Invalid(_))));

        let draft = ConfigDraft {
            outbounds: vec![json!("freedom")],
            ..Default::default()
        };
        assert!(matches!(draft.finalize(), Err(ConfigError::Invalid(_))));

        let draft = ConfigDraft {
            outbounds: vec![json!({ "protocol": "freedom" })],
            apps: vec![AppModule::new(AppKind::Log), AppModule::new(AppKind::Log)],
            ..Default::default()
        };
        let err = draft.finalize().unwrap_err();
        assert!(err.to_string().contains("duplicate app module: log"));
    }

    #[test]
    fn test_draft_trimming() {
        let loader = DocumentLoader::default();
        let mut draft = loader.decode_text(SAMPLE).unwrap();

        draft.clear_inbounds();
        draft.retain_apps(&[AppKind::Router, AppKind::Log]);
        let config = draft.finalize().unwrap();

        assert!(!config.has_inbounds());
        let kinds: Vec<_> = config.apps().iter().map(|a| a.kind.clone()).collect();
        assert_eq!(kinds, vec![AppKind::Log, AppKind::Router]);
    }

    #[test]
    fn test_draft_from_validated_config() {
        let loader = DocumentLoader::default();
        let config = loader.decode_binary(SAMPLE.as_bytes()).unwrap();

        let mut draft = config.to_draft();
        draft.clear_inbounds();
        let trimmed = draft.finalize().unwrap();

        assert!(config.has_inbounds());
        assert!(!trimmed.has_inbounds());
        assert_eq!(trimmed.apps(), config.apps());
    }

    #[test]
    fn test_decode_toml() {
        let loader = DocumentLoader::new(ConfigFormat::Toml);
        assert_eq!(loader.text_format(), ConfigFormat::Toml);
        assert_eq!(DocumentLoader::default().text_format(), ConfigFormat::Json);
        let toml = r#"
            [[outbounds]]
            protocol = "freedom"

            [[apps]]
            kind = "log"

            [[apps]]
            kind = "observatory"
        "#;

        let config = loader.decode_text(toml).unwrap().finalize().unwrap();
        assert_eq!(config.outbounds()[0]["protocol"], "freedom");
        assert!(config.has_app(&AppKind::Observatory));
    }

    #[test]
    fn test_json_export() {
        let loader = DocumentLoader::default();
        let config = loader.decode_binary(SAMPLE.as_bytes()).unwrap();

        let reparsed = loader.decode_binary(config.to_json().as_bytes()).unwrap();
        assert_eq!(reparsed, config);
    }
}
