//! ocserv group configuration file codec
//!
//! Group files are flat `key=value` text, one directive per line. Blank lines
//! and lines starting with `#` are ignored, and `dns=` may repeat.
//!
//! Reading produces a typed [`GroupConfig`] in which every field is either
//! present or absent. Unknown keys and values that fail to convert are skipped
//! without failing the file. Writing goes the other way from an untyped
//! [`WriteMap`] and does not check keys against the recognised set.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::{OcError, OcResult};

/// Generic key to value input for creating or rewriting a group file
pub type WriteMap = HashMap<String, Value>;

/// Keys understood by [`GroupConfig`], as they appear in the file
pub const GROUP_CONFIG_KEYS: &[&str] = &[
    "rx-data-per-sec",
    "tx-data-per-sec",
    "max-same-clients",
    "ipv4-network",
    "dns",
    "no-udp",
    "keepalive",
    "dpd",
    "mobile-dpd",
    "tunnel-all-dns",
    "restrict-user-to-routes",
    "stats-report-time",
    "mtu",
    "idle-timeout",
    "mobile-idle-timeout",
    "session-timeout",
];

/// Parsed group configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_data_per_sec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_data_per_sec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_same_clients: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_network: Option<String>,
    /// Every `dns=` line in file order
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_udp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpd: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_dpd: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_all_dns: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict_user_to_routes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_report_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_idle_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<i64>,
}

impl GroupConfig {
    /// Parse group file content held in memory
    pub fn parse_str(content: &str) -> Self {
        let mut config = GroupConfig::default();
        for line in content.lines() {
            config.apply_line(line);
        }
        config
    }

    /// Apply one raw line of a group file
    pub fn apply_line(&mut self, line: &str) {
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let Some((key, value)) = line.split_once('=') else {
            trace!("skipping line without '=': {:?}", line);
            return;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "rx-data-per-sec" => self.rx_data_per_sec = Some(value.to_string()),
            "tx-data-per-sec" => self.tx_data_per_sec = Some(value.to_string()),
            "max-same-clients" => set_int(&mut self.max_same_clients, key, value),
            "ipv4-network" => self.ipv4_network = Some(value.to_string()),
            "dns" => self.dns.push(value.to_string()),
            "no-udp" => set_bool(&mut self.no_udp, key, value),
            "keepalive" => set_int(&mut self.keepalive, key, value),
            "dpd" => set_int(&mut self.dpd, key, value),
            "mobile-dpd" => set_int(&mut self.mobile_dpd, key, value),
            "tunnel-all-dns" => set_bool(&mut self.tunnel_all_dns, key, value),
            "restrict-user-to-routes" => set_bool(&mut self.restrict_user_to_routes, key, value),
            "stats-report-time" => set_int(&mut self.stats_report_time, key, value),
            "mtu" => set_int(&mut self.mtu, key, value),
            "idle-timeout" => set_int(&mut self.idle_timeout, key, value),
            "mobile-idle-timeout" => set_int(&mut self.mobile_idle_timeout, key, value),
            "session-timeout" => set_int(&mut self.session_timeout, key, value),
            _ => trace!("ignoring unknown key {:?}", key),
        }
    }

    /// Present fields as a write-map, keyed the way they appear in the file
    pub fn to_write_map(&self) -> WriteMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => WriteMap::new(),
        }
    }
}

// A value that fails to convert is dropped; the field keeps whatever an
// earlier line set, or stays absent.
fn set_int(field: &mut Option<i64>, key: &str, value: &str) {
    match value.parse::<i64>() {
        Ok(v) => *field = Some(v),
        Err(_) => trace!("ignoring non-integer {}={:?}", key, value),
    }
}

fn set_bool(field: &mut Option<bool>, key: &str, value: &str) {
    match value.parse::<bool>() {
        Ok(v) => *field = Some(v),
        Err(_) => trace!("ignoring non-boolean {}={:?}", key, value),
    }
}

/// Parse the group file at `path`.
///
/// Failing to open the file is a plain I/O error. Failing partway through
/// reading returns [`OcError::PartialRead`] carrying what was parsed so far.
pub async fn parse_conf_file(path: impl AsRef<Path>) -> OcResult<GroupConfig> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .map_err(|e| OcError::io(format!("Failed to open {}", path.display()), e))?;

    let mut lines = BufReader::new(file).lines();
    let mut config = GroupConfig::default();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => config.apply_line(&line),
            Ok(None) => break,
            Err(e) => {
                return Err(OcError::PartialRead {
                    path: path.to_path_buf(),
                    partial: Box::new(config),
                    source: e,
                });
            }
        }
    }

    Ok(config)
}

/// Textual form of a write-map value: strings raw, everything else as JSON
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write `config` to `writer` as `key=value` lines.
///
/// Null entries are skipped. `dns` must be an array and becomes one `dns=`
/// line per element, in order. Key order across distinct keys is unspecified.
pub async fn write_group<W>(writer: &mut W, config: &WriteMap) -> OcResult<()>
where
    W: AsyncWrite + Unpin,
{
    for (key, value) in config {
        if value.is_null() {
            continue;
        }

        if key == "dns" {
            let items = value.as_array().ok_or_else(|| OcError::InvalidWriteValue {
                key: key.clone(),
                reason: "expected a list".to_string(),
            })?;
            for item in items.iter().filter(|v| !v.is_null()) {
                write_line(writer, key, &render_value(item)).await?;
            }
        } else {
            write_line(writer, key, &render_value(value)).await?;
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| OcError::io("failed to write to file", e))
}

async fn write_line<W>(writer: &mut W, key: &str, value: &str) -> OcResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("{}={}\n", key, value).as_bytes())
        .await
        .map_err(|e| OcError::io("failed to write to file", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> WriteMap {
        value.as_object().unwrap().clone().into_iter().collect()
    }

    async fn render(config: &WriteMap) -> String {
        let mut buf: Vec<u8> = Vec::new();
        write_group(&mut buf, config).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_parse_all_fields() {
        let content = "\
rx-data-per-sec=40000
tx-data-per-sec=50000
max-same-clients=2
ipv4-network=192.168.10.0/24
dns=1.1.1.1
no-udp=true
keepalive=300
dpd=90
mobile-dpd=1800
tunnel-all-dns=false
restrict-user-to-routes=true
stats-report-time=360
mtu=1400
idle-timeout=1200
mobile-idle-timeout=2400
session-timeout=86400
";
        let config = GroupConfig::parse_str(content);
        assert_eq!(config.rx_data_per_sec.as_deref(), Some("40000"));
        assert_eq!(config.tx_data_per_sec.as_deref(), Some("50000"));
        assert_eq!(config.max_same_clients, Some(2));
        assert_eq!(config.ipv4_network.as_deref(), Some("192.168.10.0/24"));
        assert_eq!(config.dns, vec!["1.1.1.1"]);
        assert_eq!(config.no_udp, Some(true));
        assert_eq!(config.keepalive, Some(300));
        assert_eq!(config.dpd, Some(90));
        assert_eq!(config.mobile_dpd, Some(1800));
        assert_eq!(config.tunnel_all_dns, Some(false));
        assert_eq!(config.restrict_user_to_routes, Some(true));
        assert_eq!(config.stats_report_time, Some(360));
        assert_eq!(config.mtu, Some(1400));
        assert_eq!(config.idle_timeout, Some(1200));
        assert_eq!(config.mobile_idle_timeout, Some(2400));
        assert_eq!(config.session_timeout, Some(86400));
    }

    #[test]
    fn test_parse_skips_comments_blank_and_bare_lines() {
        let config = GroupConfig::parse_str("# mtu=1000\n\nmtu 1200\njust-text\n");
        assert_eq!(config, GroupConfig::default());
    }

    #[test]
    fn test_parse_trims_and_splits_on_first_equals() {
        let config = GroupConfig::parse_str("  ipv4-network =  10.0.0.0/8=x  \n");
        assert_eq!(config.ipv4_network.as_deref(), Some("10.0.0.0/8=x"));
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let config = GroupConfig::parse_str("route=10.0.0.0/8\nmtu=1300\nbanner=hi\n");
        assert_eq!(config.mtu, Some(1300));
        assert_eq!(config.dns, Vec::<String>::new());
    }

    #[test]
    fn test_parse_bad_values_stay_absent() {
        let config = GroupConfig::parse_str("max-same-clients=abc\nno-udp=maybe\nmtu=1400\n");
        assert_eq!(config.max_same_clients, None);
        assert_eq!(config.no_udp, None);
        assert_eq!(config.mtu, Some(1400));
    }

    #[test]
    fn test_parse_bad_value_keeps_earlier_one() {
        let config = GroupConfig::parse_str("mtu=1400\nmtu=big\n");
        assert_eq!(config.mtu, Some(1400));
    }

    #[test]
    fn test_parse_dns_accumulates_in_order() {
        let config = GroupConfig::parse_str("dns=8.8.8.8\nmtu=1\ndns=1.1.1.1\ndns=8.8.8.8\n");
        assert_eq!(config.dns, vec!["8.8.8.8", "1.1.1.1", "8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_parse_conf_file_missing() {
        let err = parse_conf_file("/nonexistent/group.conf").await.unwrap_err();
        assert!(matches!(err, OcError::Io { .. }));
    }

    #[tokio::test]
    async fn test_parse_conf_file_partial_on_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken");
        std::fs::write(&path, b"mtu=1400\ndns=9.9.9.9\n\xff\xfe\nkeepalive=10\n").unwrap();

        match parse_conf_file(&path).await.unwrap_err() {
            OcError::PartialRead { partial, .. } => {
                assert_eq!(partial.mtu, Some(1400));
                assert_eq!(partial.dns, vec!["9.9.9.9"]);
                assert_eq!(partial.keepalive, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_skips_null_and_expands_dns() {
        let config = map(json!({
            "mtu": 1400,
            "dns": ["1.1.1.1", "8.8.8.8"],
            "no-udp": null,
        }));
        let out = render(&config).await;
        let mut lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);

        let dns: Vec<&str> = lines.iter().copied().filter(|l| l.starts_with("dns=")).collect();
        assert_eq!(dns, vec!["dns=1.1.1.1", "dns=8.8.8.8"]);

        lines.retain(|l| !l.starts_with("dns="));
        assert_eq!(lines, vec!["mtu=1400"]);
    }

    #[tokio::test]
    async fn test_write_renders_values() {
        let config = map(json!({
            "rx-data-per-sec": "40000",
            "tunnel-all-dns": true,
            "custom-key": "anything goes",
        }));
        let out = render(&config).await;
        assert!(out.contains("rx-data-per-sec=40000\n"));
        assert!(out.contains("tunnel-all-dns=true\n"));
        assert!(out.contains("custom-key=anything goes\n"));
    }

    #[tokio::test]
    async fn test_write_rejects_scalar_dns() {
        let config = map(json!({ "dns": "1.1.1.1" }));
        let mut buf: Vec<u8> = Vec::new();
        let err = write_group(&mut buf, &config).await.unwrap_err();
        assert!(matches!(err, OcError::InvalidWriteValue { .. }));
    }

    #[tokio::test]
    async fn test_write_then_parse_round_trip() {
        let original = GroupConfig {
            rx_data_per_sec: Some("1000".to_string()),
            max_same_clients: Some(3),
            ipv4_network: Some("172.16.0.0/16".to_string()),
            dns: vec!["9.9.9.9".to_string(), "1.0.0.1".to_string()],
            no_udp: Some(false),
            restrict_user_to_routes: Some(true),
            mtu: Some(1280),
            session_timeout: Some(3600),
            ..Default::default()
        };

        let out = render(&original.to_write_map()).await;
        assert_eq!(GroupConfig::parse_str(&out), original);
    }

    struct FailingWriter {
        attempts: usize,
    }

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
            _: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.attempts += 1;
            std::task::Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_stops_at_first_failure() {
        let config = map(json!({ "mtu": 1400, "dns": ["1.1.1.1", "8.8.8.8"], "keepalive": 30 }));
        let mut writer = FailingWriter { attempts: 0 };

        let err = write_group(&mut writer, &config).await.unwrap_err();
        assert!(matches!(err, OcError::Io { .. }));
        assert_eq!(err.to_string(), "failed to write to file: disk gone");
        assert_eq!(writer.attempts, 1);
    }
}
