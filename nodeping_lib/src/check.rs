//! Check records: monitor configurations returned by the `checks` endpoint.

use crate::error::{MalformedResponseError, Result};
use crate::helpers::{
    deserialize_null_default, deserialize_truthy, serialize_whole_as_int, timestamp_ms_to_datetime,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Value of the raw `enable` field for a running check.
pub const ENABLE_ACTIVE: &str = "active";

/// Kind of monitor. Unknown values are preserved in [`CheckType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckType {
    Agent,
    Audio,
    Cluster,
    Dns,
    DohDot,
    Ftp,
    Http,
    HttpAdv,
    HttpContent,
    HttpParse,
    Imap4,
    Mysql,
    Ntp,
    Ping,
    Pop3,
    Port,
    Push,
    Rbl,
    Rdp,
    Sip,
    Smtp,
    Snmp,
    Ssh,
    Ssl,
    Websocket,
    Whois,
    Other(String),
}

impl CheckType {
    /// Wire name, e.g. `"HTTPCONTENT"`.
    pub fn as_str(&self) -> &str {
        match self {
            CheckType::Agent => "AGENT",
            CheckType::Audio => "AUDIO",
            CheckType::Cluster => "CLUSTER",
            CheckType::Dns => "DNS",
            CheckType::DohDot => "DOHDOT",
            CheckType::Ftp => "FTP",
            CheckType::Http => "HTTP",
            CheckType::HttpAdv => "HTTPADV",
            CheckType::HttpContent => "HTTPCONTENT",
            CheckType::HttpParse => "HTTPPARSE",
            CheckType::Imap4 => "IMAP4",
            CheckType::Mysql => "MYSQL",
            CheckType::Ntp => "NTP",
            CheckType::Ping => "PING",
            CheckType::Pop3 => "POP3",
            CheckType::Port => "PORT",
            CheckType::Push => "PUSH",
            CheckType::Rbl => "RBL",
            CheckType::Rdp => "RDP",
            CheckType::Sip => "SIP",
            CheckType::Smtp => "SMTP",
            CheckType::Snmp => "SNMP",
            CheckType::Ssh => "SSH",
            CheckType::Ssl => "SSL",
            CheckType::Websocket => "WEBSOCKET",
            CheckType::Whois => "WHOIS",
            CheckType::Other(s) => s,
        }
    }
}

impl From<String> for CheckType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "AGENT" => CheckType::Agent,
            "AUDIO" => CheckType::Audio,
            "CLUSTER" => CheckType::Cluster,
            "DNS" => CheckType::Dns,
            "DOHDOT" => CheckType::DohDot,
            "FTP" => CheckType::Ftp,
            "HTTP" => CheckType::Http,
            "HTTPADV" => CheckType::HttpAdv,
            "HTTPCONTENT" => CheckType::HttpContent,
            "HTTPPARSE" => CheckType::HttpParse,
            "IMAP4" => CheckType::Imap4,
            "MYSQL" => CheckType::Mysql,
            "NTP" => CheckType::Ntp,
            "PING" => CheckType::Ping,
            "POP3" => CheckType::Pop3,
            "PORT" => CheckType::Port,
            "PUSH" => CheckType::Push,
            "RBL" => CheckType::Rbl,
            "RDP" => CheckType::Rdp,
            "SIP" => CheckType::Sip,
            "SMTP" => CheckType::Smtp,
            "SNMP" => CheckType::Snmp,
            "SSH" => CheckType::Ssh,
            "SSL" => CheckType::Ssl,
            "WEBSOCKET" => CheckType::Websocket,
            "WHOIS" => CheckType::Whois,
            _ => CheckType::Other(s),
        }
    }
}

impl From<&str> for CheckType {
    fn from(s: &str) -> Self {
        CheckType::from(s.to_string())
    }
}

impl From<CheckType> for String {
    fn from(t: CheckType) -> Self {
        match t {
            CheckType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check object as the API sends it.
#[derive(Deserialize)]
struct WireCheck {
    #[serde(rename = "_id")]
    id: String,
    customer_id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    label: String,
    interval: f64,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    notifications: Vec<Value>,
    created: i64,
    #[serde(rename = "type")]
    check_type: CheckType,
    enable: String,
    #[serde(default, deserialize_with = "deserialize_truthy")]
    public: bool,
    modified: i64,
    parameters: Value,
    uuid: String,
    status: String,
    queue: Option<String>,
    description: Option<String>,
}

/// A configured monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub id: String,
    /// Customer ID that owns this check.
    pub customer_id: String,
    pub label: String,
    /// Interval between runs, in seconds. Fractional values occur for
    /// sub-minute schedules; whole values serialize as integers.
    #[serde(serialize_with = "serialize_whole_as_int")]
    pub interval: f64,
    /// Notification targets, passed through as sent.
    pub notifications: Vec<Value>,
    /// Unix timestamp (ms) of creation.
    pub created_ts: i64,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    /// Raw enable status; `"active"` when the check runs.
    pub enable: String,
    /// `enable == "active"`.
    pub enabled: bool,
    pub public: bool,
    /// Unix timestamp (ms) of last modification.
    pub modified_ts: i64,
    /// Type-specific settings (target, thresholds, ...). Shape varies by check type.
    pub parameters: Value,
    pub uuid: String,
    pub status: String,
    pub queue: Option<String>,
    pub description: Option<String>,
}

impl Check {
    /// Map one raw check object.
    ///
    /// Fails when `_id`, `customer_id`, `interval`, `type`, `enable`, `created`,
    /// `modified`, `parameters`, `uuid` or `status` is missing or mistyped.
    pub fn from_value(value: &Value) -> Result<Self> {
        let wire = WireCheck::deserialize(value).map_err(|e| {
            MalformedResponseError::new(format!("invalid check: {}", e), Some(value.clone()))
        })?;
        Ok(wire.into())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp_ms_to_datetime(self.created_ts)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        timestamp_ms_to_datetime(self.modified_ts)
    }
}

impl From<WireCheck> for Check {
    fn from(w: WireCheck) -> Self {
        let enabled = w.enable == ENABLE_ACTIVE;
        Self {
            id: w.id,
            customer_id: w.customer_id,
            label: w.label,
            interval: w.interval,
            notifications: w.notifications,
            created_ts: w.created,
            check_type: w.check_type,
            enable: w.enable,
            enabled,
            public: w.public,
            modified_ts: w.modified,
            parameters: w.parameters,
            uuid: w.uuid,
            status: w.status,
            queue: w.queue,
            description: w.description,
        }
    }
}
