// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.
//
// The configuration file is TOML.  Each `[printers.<id>]` table names a
// printer family (`type`), how to reach the device, and its label types.
// Label types are either inline tables or a path to a TOML file holding one
// label-type table, resolved relative to the configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LabelError, Result};
use crate::label::LabelType;
use crate::schema::{FieldKind, FieldSpec, Schema};

/// Default HTTP listen port.
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default serial line speed when only a device path is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default wait between lost-wakeup polls of an idle worker.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time `stop()` waits for an in-flight print.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Default number of finished jobs kept per printer.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub printers: BTreeMap<String, PrinterConfig>,
    /// Directory that relative label-type paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Supported printer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrinterKind {
    /// Cognitive Solutions LBT42 thermal label printer.
    #[serde(rename = "cognitive-lbt42")]
    CognitiveLbt42,
}

impl std::fmt::Display for PrinterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CognitiveLbt42 => "cognitive-lbt42",
        })
    }
}

/// One `[printers.<id>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    #[serde(rename = "type")]
    pub kind: PrinterKind,
    pub name: Option<String>,
    /// TCP host name or address of the device.
    pub hostname: Option<String>,
    /// TCP port; the printer family supplies a default.
    pub port: Option<u16>,
    /// Serial device path, used instead of `hostname`.
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    /// Pause after each successful print; the printer family supplies a default.
    pub job_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub stop_grace_ms: Option<u64>,
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub label_types: BTreeMap<String, LabelTypeSource>,
}

/// Resolved device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Tcp { host: String, port: u16 },
    Serial { device: String, baud_rate: u32 },
}

impl PrinterConfig {
    /// A minimal TCP printer table, mostly for tests and tooling.
    pub fn tcp(kind: PrinterKind, hostname: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            kind,
            name: None,
            hostname: Some(hostname.into()),
            port,
            device: None,
            baud_rate: None,
            job_delay_ms: None,
            poll_interval_ms: None,
            stop_grace_ms: None,
            history_limit: None,
            label_types: BTreeMap::new(),
        }
    }

    /// Resolve the device address, filling in `default_port` for TCP.
    ///
    /// Exactly one of `hostname` and `device` must be set.
    pub fn connection(&self, default_port: u16) -> Result<Connection> {
        match (&self.hostname, &self.device) {
            (Some(host), None) if !host.is_empty() => Ok(Connection::Tcp {
                host: host.clone(),
                port: self.port.unwrap_or(default_port),
            }),
            (None, Some(device)) if !device.is_empty() => Ok(Connection::Serial {
                device: device.clone(),
                baud_rate: self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            }),
            (Some(_), Some(_)) => Err(LabelError::Configuration(
                "specify either hostname/port or a serial device, not both".into(),
            )),
            _ => Err(LabelError::Configuration(
                "hostname/port or a serial device must be specified".into(),
            )),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_STOP_GRACE)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    /// Build every configured label type.
    pub fn build_label_types(&self, base_dir: &Path) -> Result<Vec<LabelType>> {
        self.label_types
            .iter()
            .map(|(id, source)| source.build(id, base_dir))
            .collect()
    }
}

/// A label type given inline or as a path to its own file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelTypeSource {
    File(PathBuf),
    Inline(LabelTypeConfig),
}

impl LabelTypeSource {
    pub fn build(&self, id: &str, base_dir: &Path) -> Result<LabelType> {
        match self {
            Self::Inline(config) => config.build(id),
            Self::File(path) => {
                let path = base_dir.join(path);
                debug!(label_type = id, path = %path.display(), "loading label type file");
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    LabelError::Configuration(format!(
                        "label type {id}: cannot read {}: {e}",
                        path.display()
                    ))
                })?;
                let config: LabelTypeConfig = toml::from_str(&text).map_err(|e| {
                    LabelError::Configuration(format!("label type {id}: {}: {e}", path.display()))
                })?;
                config.build(id)
            }
        }
    }
}

/// Label type table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelTypeConfig {
    pub name: Option<String>,
    pub template: String,
    pub schema: Option<BTreeMap<String, FieldConfig>>,
}

impl LabelTypeConfig {
    pub fn build(&self, id: &str) -> Result<LabelType> {
        let schema = match &self.schema {
            Some(fields) => {
                let mut schema = Schema::new();
                for (name, field) in fields {
                    schema = schema.field(name.clone(), field.build().map_err(|e| {
                        LabelError::Configuration(format!("label type {id}: field {name}: {e}"))
                    })?);
                }
                Some(schema)
            }
            None => None,
        };
        LabelType::new(id, self.name.clone(), &self.template, schema)
    }
}

/// One schema entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    pub default: Option<serde_json::Value>,
}

impl FieldConfig {
    fn build(&self) -> std::result::Result<FieldSpec, String> {
        let spec = FieldSpec {
            kind: self.kind,
            required: self.required,
            default: None,
        };
        match &self.default {
            Some(raw) => spec.with_default(raw).map_err(|e| format!("default: {e}")),
            None => Ok(spec),
        }
    }
}

impl Config {
    /// Parse a configuration document.  Relative label-type paths resolve
    /// against `base_dir`.
    pub fn from_toml(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LabelError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let config = Self::from_toml(&text, base_dir)?;
        info!(
            path = %path.display(),
            printers = config.printers.len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldValue;
    use serde_json::json;

    const SAMPLE: &str = r#"
        [server]
        host = "0.0.0.0"
        port = 8080

        [printers.front]
        type = "cognitive-lbt42"
        name = "Front desk"
        hostname = "10.0.0.5"

        [printers.front.label_types.count]
        name = "Counter"
        template = "COUNT=%(count)s\n"

        [printers.front.label_types.count.schema.count]
        type = "integer"
        required = true

        [printers.front.label_types.count.schema.copies]
        type = "integer"
        default = 1

        [printers.back]
        type = "cognitive-lbt42"
        device = "/dev/ttyUSB0"
        job_delay_ms = 0
    "#;

    #[test]
    fn parses_sample() {
        let config = Config::from_toml(SAMPLE, ".").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.printers.len(), 2);

        let front = &config.printers["front"];
        assert_eq!(front.kind, PrinterKind::CognitiveLbt42);
        assert_eq!(
            front.connection(9100).unwrap(),
            Connection::Tcp {
                host: "10.0.0.5".into(),
                port: 9100
            }
        );

        let labels = front.build_label_types(Path::new(".")).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name(), "Counter");
        let copies = labels[0]
            .schema()
            .and_then(|s| s.fields().find(|(n, _)| *n == "copies"))
            .map(|(_, spec)| spec.default.clone());
        assert_eq!(copies, Some(Some(FieldValue::Integer(1))));

        let back = &config.printers["back"];
        assert_eq!(
            back.connection(9100).unwrap(),
            Connection::Serial {
                device: "/dev/ttyUSB0".into(),
                baud_rate: DEFAULT_BAUD_RATE
            }
        );
    }

    #[test]
    fn defaults_apply_when_absent() {
        let config = Config::from_toml("", ".").unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
        assert!(config.printers.is_empty());

        let printer = PrinterConfig::tcp(PrinterKind::CognitiveLbt42, "h", None);
        assert_eq!(printer.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(printer.stop_grace(), DEFAULT_STOP_GRACE);
        assert_eq!(printer.history_limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn unknown_printer_type_is_rejected() {
        let err = Config::from_toml("[printers.x]\ntype = \"laserjet\"\nhostname = \"h\"\n", ".")
            .unwrap_err();
        assert!(matches!(err, LabelError::Toml(_)));
    }

    #[test]
    fn connection_requires_exactly_one_target() {
        let mut printer = PrinterConfig::tcp(PrinterKind::CognitiveLbt42, "h", Some(1));
        printer.device = Some("/dev/ttyS0".into());
        assert!(printer.connection(9100).is_err());

        printer.hostname = None;
        printer.device = None;
        assert!(matches!(
            printer.connection(9100),
            Err(LabelError::Configuration(_))
        ));
    }

    #[test]
    fn default_of_wrong_kind_is_configuration_error() {
        let config = LabelTypeConfig {
            name: None,
            template: "%(flag)s".into(),
            schema: Some(BTreeMap::from([(
                "flag".to_string(),
                FieldConfig {
                    kind: FieldKind::Boolean,
                    required: false,
                    default: Some(json!("yes")),
                },
            )])),
        };
        let err = config.build("flags").unwrap_err();
        assert!(err.to_string().contains("field flag"));
    }

    #[test]
    fn label_type_can_live_in_its_own_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("labels")).unwrap();
        std::fs::write(
            dir.path().join("labels/asset.toml"),
            "name = \"Asset\"\ntemplate = \"ASSET %(tag)s\"\n\n[schema.tag]\ntype = \"string\"\nrequired = true\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("labelserver.toml"),
            "[printers.p]\ntype = \"cognitive-lbt42\"\nhostname = \"h\"\n\n[printers.p.label_types]\nasset = \"labels/asset.toml\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path().join("labelserver.toml")).unwrap();
        let labels = config.printers["p"]
            .build_label_types(&config.base_dir)
            .unwrap();
        assert_eq!(labels[0].id(), "asset");
        assert_eq!(labels[0].name(), "Asset");
    }

    #[test]
    fn missing_label_type_file_is_reported() {
        let source = LabelTypeSource::File("nope.toml".into());
        let err = source.build("x", Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, LabelError::Configuration(_)));
    }
}
