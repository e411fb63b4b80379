//! Records decoded from `occtl -j` output
//!
//! Field names follow occtl's JSON keys. Scalars are decoded leniently since
//! occtl prints some counters as strings and others as numbers depending on
//! version; everything defaults when absent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Connected session as printed by `show users` and `show user <name>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineUser {
    #[serde(rename = "ID", alias = "id", deserialize_with = "lenient_u64")]
    pub id: Option<u64>,
    #[serde(rename = "Username", alias = "username", deserialize_with = "lenient_string")]
    pub username: Option<String>,
    #[serde(rename = "Groupname", alias = "groupname", deserialize_with = "lenient_string")]
    pub groupname: Option<String>,
    #[serde(rename = "State", alias = "state", deserialize_with = "lenient_string")]
    pub state: Option<String>,
    #[serde(rename = "vhost", deserialize_with = "lenient_string")]
    pub vhost: Option<String>,
    #[serde(rename = "Device", alias = "device", deserialize_with = "lenient_string")]
    pub device: Option<String>,
    #[serde(rename = "MTU", alias = "mtu", deserialize_with = "lenient_string")]
    pub mtu: Option<String>,
    #[serde(rename = "Remote IP", alias = "remote_ip", deserialize_with = "lenient_string")]
    pub remote_ip: Option<String>,
    #[serde(rename = "Location", alias = "location", deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(rename = "Local Device IP", deserialize_with = "lenient_string")]
    pub local_device_ip: Option<String>,
    #[serde(rename = "IPv4", alias = "ipv4", deserialize_with = "lenient_string")]
    pub ipv4: Option<String>,
    #[serde(rename = "P-t-P IPv4", deserialize_with = "lenient_string")]
    pub ptp_ipv4: Option<String>,
    #[serde(rename = "IPv6", alias = "ipv6", deserialize_with = "lenient_string")]
    pub ipv6: Option<String>,
    #[serde(rename = "P-t-P IPv6", deserialize_with = "lenient_string")]
    pub ptp_ipv6: Option<String>,
    #[serde(rename = "User-Agent", alias = "user_agent", deserialize_with = "lenient_string")]
    pub user_agent: Option<String>,
    #[serde(rename = "Hostname", alias = "hostname", deserialize_with = "lenient_string")]
    pub hostname: Option<String>,
    #[serde(rename = "RX", alias = "rx", deserialize_with = "lenient_string")]
    pub rx: Option<String>,
    #[serde(rename = "TX", alias = "tx", deserialize_with = "lenient_string")]
    pub tx: Option<String>,
    #[serde(rename = "_RX", deserialize_with = "lenient_string")]
    pub rx_human: Option<String>,
    #[serde(rename = "_TX", deserialize_with = "lenient_string")]
    pub tx_human: Option<String>,
    #[serde(rename = "Average RX", deserialize_with = "lenient_string")]
    pub average_rx: Option<String>,
    #[serde(rename = "Average TX", deserialize_with = "lenient_string")]
    pub average_tx: Option<String>,
    #[serde(rename = "DPD", alias = "dpd", deserialize_with = "lenient_string")]
    pub dpd: Option<String>,
    #[serde(rename = "KeepAlive", alias = "keepalive", deserialize_with = "lenient_string")]
    pub keepalive: Option<String>,
    #[serde(rename = "Connected at", deserialize_with = "lenient_string")]
    pub connected_at: Option<String>,
    #[serde(rename = "_Connected at", deserialize_with = "lenient_string")]
    pub connected_for: Option<String>,
    #[serde(rename = "Full session", deserialize_with = "lenient_string")]
    pub full_session: Option<String>,
    #[serde(rename = "Session", alias = "session", deserialize_with = "lenient_string")]
    pub session: Option<String>,
    #[serde(rename = "TLS ciphersuite", deserialize_with = "lenient_string")]
    pub tls_ciphersuite: Option<String>,
    #[serde(rename = "DTLS cipher", deserialize_with = "lenient_string")]
    pub dtls_cipher: Option<String>,
    #[serde(rename = "CSTP compression", deserialize_with = "lenient_string")]
    pub cstp_compression: Option<String>,
    #[serde(rename = "DTLS compression", deserialize_with = "lenient_string")]
    pub dtls_compression: Option<String>,
    #[serde(rename = "DNS", alias = "dns")]
    pub dns: Vec<String>,
    #[serde(rename = "NBNS", alias = "nbns")]
    pub nbns: Vec<String>,
    #[serde(rename = "Split-DNS-Domains")]
    pub split_dns_domains: Vec<String>,
    #[serde(rename = "Routes", alias = "routes", deserialize_with = "lenient_list")]
    pub routes: Vec<String>,
    #[serde(rename = "No-routes", deserialize_with = "lenient_list")]
    pub no_routes: Vec<String>,
    #[serde(rename = "iRoutes", alias = "iroutes", deserialize_with = "lenient_list")]
    pub iroutes: Vec<String>,
    #[serde(rename = "Restricted to routes", deserialize_with = "lenient_string")]
    pub restricted_to_routes: Option<String>,
    #[serde(rename = "Restricted to ports", deserialize_with = "lenient_list")]
    pub restricted_to_ports: Vec<String>,
}

/// Entry of `show ip bans`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpBan {
    #[serde(rename = "IP", alias = "ip", deserialize_with = "lenient_string")]
    pub ip: Option<String>,
    #[serde(rename = "Since", alias = "since", deserialize_with = "lenient_string")]
    pub since: Option<String>,
    #[serde(rename = "_Since", deserialize_with = "lenient_string")]
    pub since_relative: Option<String>,
    #[serde(rename = "Score", alias = "score", deserialize_with = "lenient_u64")]
    pub score: Option<u64>,
}

/// Entry of `show ip bans points`, including IPs not (yet) banned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpBanPoints {
    #[serde(rename = "IP", alias = "ip", deserialize_with = "lenient_string")]
    pub ip: Option<String>,
    #[serde(rename = "Since", alias = "since", deserialize_with = "lenient_string")]
    pub since: Option<String>,
    #[serde(rename = "_Since", deserialize_with = "lenient_string")]
    pub since_relative: Option<String>,
    #[serde(rename = "Score", alias = "score", deserialize_with = "lenient_u64")]
    pub score: Option<u64>,
}

/// Entry of `show iroutes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IRoute {
    #[serde(rename = "ID", alias = "id", deserialize_with = "lenient_u64")]
    pub id: Option<u64>,
    #[serde(rename = "Username", alias = "username", deserialize_with = "lenient_string")]
    pub username: Option<String>,
    #[serde(rename = "vhost", deserialize_with = "lenient_string")]
    pub vhost: Option<String>,
    #[serde(rename = "Device", alias = "device", deserialize_with = "lenient_string")]
    pub device: Option<String>,
    #[serde(rename = "IP", alias = "ip", deserialize_with = "lenient_string")]
    pub ip: Option<String>,
    #[serde(rename = "iRoutes", alias = "iroutes", deserialize_with = "lenient_list")]
    pub iroutes: Vec<String>,
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

// occtl prints an empty list as a bare string in a few places
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        Value::Null => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        other => scalar_to_string(other).into_iter().collect(),
    })
}
