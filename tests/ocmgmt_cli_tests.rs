//! Integration tests for the ocmgmt binary
//!
//! Each test points the CLI at a temporary ocserv layout through a TOML
//! config file, with stand-in scripts in place of occtl and ocpasswd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Layout {
    dir: TempDir,
    config: PathBuf,
}

impl Layout {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("groups")).unwrap();
        fs::write(root.join("defaults.conf"), "idle-timeout=60\n").unwrap();
        fs::write(
            root.join("occtl.sh"),
            format!("echo \"$*\" >> '{}'\n", root.join("occtl.log").display()),
        )
        .unwrap();
        fs::write(
            root.join("ocpasswd.sh"),
            format!(
                "echo \"args: $*\" >> '{log}'\ncat >> '{log}'\n",
                log = root.join("ocpasswd.log").display()
            ),
        )
        .unwrap();

        let config = root.join("ocmgmt.toml");
        fs::write(
            &config,
            format!(
                r#"
[paths]
group_dir = "{root}/groups"
default_group = "{root}/defaults.conf"
passwd_file = "{root}/ocpasswd"

[commands]
occtl = "sh {root}/occtl.sh"
ocpasswd = "sh {root}/ocpasswd.sh"

[timeouts]
default_secs = 10
"#,
                root = root.display()
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ocmgmt").unwrap();
        cmd.arg("--config").arg(&self.config);
        cmd
    }
}

#[test]
fn test_help_command() {
    Command::cargo_bin("ocmgmt")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ocserv management"));
}

#[test]
fn test_group_names_sorted() {
    let layout = Layout::new();
    fs::write(layout.path("groups/zeta"), "mtu=1300\n").unwrap();
    fs::write(layout.path("groups/alpha"), "mtu=1400\n").unwrap();

    layout
        .cmd()
        .args(["group", "names"])
        .assert()
        .success()
        .stdout("alpha\nzeta\n");
}

#[test]
fn test_group_list_json() {
    let layout = Layout::new();
    fs::write(layout.path("groups/staff"), "mtu=1400\ndns=1.1.1.1\n").unwrap();

    layout
        .cmd()
        .args(["group", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"staff\""))
        .stdout(predicate::str::contains("\"mtu\": 1400"));
}

#[test]
fn test_group_create_and_reload() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["group", "create", "staff", "--set", "no-udp=true", "--dns", "1.1.1.1", "--dns", "8.8.8.8", "--reload"])
        .assert()
        .success();

    let content = fs::read_to_string(layout.path("groups/staff")).unwrap();
    assert!(content.contains("no-udp=true\n"));
    assert!(content.contains("dns=1.1.1.1\ndns=8.8.8.8\n"));
    assert_eq!(fs::read_to_string(layout.path("occtl.log")).unwrap(), "reload\n");
}

#[test]
fn test_group_update_missing() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["group", "update", "ghost", "--set", "mtu=1200"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("group ghost does not exist"));
}

#[test]
fn test_group_update_default() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["group", "update-default", "--set", "session-timeout=600"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(layout.path("defaults.conf")).unwrap(),
        "session-timeout=600\n"
    );
}

#[test]
fn test_group_delete_defaults_refused() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["group", "delete", "defaults"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("default group cannot be deleted"));
}

#[test]
fn test_session_disconnect_and_unban() {
    let layout = Layout::new();

    layout.cmd().args(["session", "disconnect", "bob"]).assert().success();
    layout.cmd().args(["session", "unban", "198.51.100.4"]).assert().success();

    assert_eq!(
        fs::read_to_string(layout.path("occtl.log")).unwrap(),
        "disconnect user bob\nunban ip 198.51.100.4\n"
    );
}

#[test]
fn test_session_rejects_bad_ip() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["session", "unban", "1.2.3.4;id"])
        .assert()
        .failure();

    assert!(!layout.path("occtl.log").exists());
}

#[test]
fn test_account_create_reads_password_from_stdin() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["account", "create", "alice", "--group", "staff"])
        .write_stdin("s3cret\n")
        .assert()
        .success();

    let recorded = fs::read_to_string(layout.path("ocpasswd.log")).unwrap();
    assert_eq!(
        recorded,
        format!(
            "args: -g staff -c {} alice\ns3cret\ns3cret\n",
            layout.path("ocpasswd").display()
        )
    );
}

#[test]
fn test_account_create_without_password() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["account", "create", "alice"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no password given on stdin"));
}

#[test]
fn test_group_set_values_written_as_typed() {
    let layout = Layout::new();

    layout
        .cmd()
        .args(["group", "create", "lab", "--set", "tx-data-per-sec=1.50", "--set", "ipv4-network=null"])
        .assert()
        .success();

    let content = fs::read_to_string(layout.path("groups/lab")).unwrap();
    assert!(content.contains("tx-data-per-sec=1.50\n"), "{}", content);
    assert!(content.contains("ipv4-network=null\n"), "{}", content);
}
