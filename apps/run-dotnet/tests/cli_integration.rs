#![warn(clippy::pedantic)]

//! Integration tests for the run-dotnet binary.
//!
//! These tests spawn the compiled executable and check its stdout, stderr,
//! exit codes and the files it leaves behind. Release metadata and archives
//! are served by a local `mockito` server; the "SDK" is a tarball holding a
//! shell script, so the end-to-end tests only run on Unix.
//!
//! ## Test Strategy
//!
//! 1. **Argument handling**: invalid version tokens fail before any network access
//! 2. **Bootstrap**: index and channel lookup, download, extraction, view and pin
//! 3. **Handoff**: argument forwarding, exit code propagation, restore step
//! 4. **Usage**: running without dotnet arguments still installs, then fails
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p run-dotnet
//! ```

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const CONFIG_VARS: [&str; 9] = [
    "RUN_DOTNET_HOME",
    "RUN_DOTNET_INDEX_URL",
    "RUN_DOTNET_RID",
    "RUN_DOTNET_TIMEOUT_SECS",
    "RUN_DOTNET_METADATA_TTL_SECS",
    "RUN_DOTNET_ALLOW_HTTP",
    "RUN_DOTNET_SKIP_RESTORE",
    "RUN_DOTNET_LOG",
    "RUST_LOG",
];

/// Returns the binary under test with every configuration variable cleared.
fn run_dotnet() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("run-dotnet"));
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn invalid_version_token_fails_without_network() {
    let temp = assert_fs::TempDir::new().unwrap();

    run_dotnet()
        .current_dir(temp.path())
        .env("RUN_DOTNET_HOME", temp.child("store").path())
        .env("RUN_DOTNET_INDEX_URL", "https://127.0.0.1:1/releases-index.json")
        .args(["8.x", "build"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid arguments"))
        .stderr(predicate::str::contains("'8.x' is not a version"));

    temp.child(".dotnet").assert(predicate::path::missing());
}

#[test]
fn unknown_rid_override_is_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();

    run_dotnet()
        .current_dir(temp.path())
        .env("RUN_DOTNET_HOME", temp.child("store").path())
        .env("RUN_DOTNET_RID", "plan9-mips")
        .arg("--info")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("plan9-mips"));
}

#[test]
fn unreachable_index_is_reported() {
    let temp = assert_fs::TempDir::new().unwrap();

    run_dotnet()
        .current_dir(temp.path())
        .env("RUN_DOTNET_HOME", temp.child("store").path())
        .env("RUN_DOTNET_INDEX_URL", "http://127.0.0.1:1/releases-index.json")
        .env("RUN_DOTNET_ALLOW_HTTP", "1")
        .env("RUN_DOTNET_RID", "linux-x64")
        .arg("--info")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("network error"));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use sha2::{Digest, Sha512};

    const SDK_FILE: &str = "dotnet-sdk-8.0.404-linux-x64.tar.gz";

    /// Fake `dotnet`: records restore calls, exits with `$FAKE_EXIT`, echoes its arguments.
    const FAKE_DOTNET: &str = r#"#!/bin/sh
if [ "$1" = "restore" ]; then
    echo "$@" > "$PWD/restore.log"
    exit 0
fi
echo "fake dotnet $*"
exit "${FAKE_EXIT:-0}"
"#;

    fn sdk_tarball() -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let files: [(&str, &[u8], u32); 3] = [
            ("./dotnet", FAKE_DOTNET.as_bytes(), 0o755),
            ("./LICENSE.txt", b"MIT", 0o644),
            ("./sdk/8.0.404/dotnet.dll", b"dll", 0o644),
        ];
        for (path, data, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(mode);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Serves an index with active LTS 8.0 and STS 9.0, and an 8.0.11 release.
    ///
    /// Each document and the archive are expected to be requested once.
    fn serve_releases(server: &mut mockito::Server) -> Vec<mockito::Mock> {
        let base = server.url();
        let tarball = sdk_tarball();
        let hash = hex::encode(Sha512::digest(&tarball));

        let index = format!(
            r#"{{ "releases-index": [
                {{ "channel-version": "9.0", "release-type": "sts", "support-phase": "active",
                   "releases.json": "{base}/9.0/releases.json" }},
                {{ "channel-version": "8.0", "release-type": "lts", "support-phase": "active",
                   "releases.json": "{base}/8.0/releases.json" }}
            ] }}"#
        );
        let channel = format!(
            r#"{{ "latest-release": "8.0.11", "releases": [
                {{ "release-version": "8.0.11",
                   "sdk": {{ "files": [
                       {{ "name": "dotnet-sdk-linux-x64.tar.gz", "rid": "linux-x64",
                          "url": "{base}/files/{SDK_FILE}", "hash": "{hash}" }}
                   ] }} }}
            ] }}"#
        );

        vec![
            server
                .mock("GET", "/releases-index.json")
                .with_body(index)
                .expect(1)
                .create(),
            server
                .mock("GET", "/8.0/releases.json")
                .with_body(channel)
                .expect(1)
                .create(),
            server
                .mock("GET", format!("/files/{SDK_FILE}").as_str())
                .with_body(tarball)
                .expect(1)
                .create(),
        ]
    }

    fn bootstrap_env(cmd: &mut Command, server: &mockito::Server, store: &std::path::Path) {
        cmd.env("RUN_DOTNET_HOME", store)
            .env(
                "RUN_DOTNET_INDEX_URL",
                format!("{}/releases-index.json", server.url()),
            )
            .env("RUN_DOTNET_ALLOW_HTTP", "1")
            .env("RUN_DOTNET_RID", "linux-x64");
    }

    #[test]
    fn installs_pins_and_runs_dotnet() {
        let mut server = mockito::Server::new();
        let mocks = serve_releases(&mut server);
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.create_dir_all().unwrap();

        let mut cmd = run_dotnet();
        bootstrap_env(&mut cmd, &server, temp.child("store").path());
        cmd.current_dir(project.path())
            .args(["--info", "-v", "q"])
            .assert()
            .success()
            .stdout(predicate::str::contains("fake dotnet --info -v q"));

        for mock in &mocks {
            mock.assert();
        }
        project
            .child(".dotnet/.pinned-major")
            .assert(predicate::str::diff("8\n"));
        temp.child("store/archives")
            .child(SDK_FILE)
            .assert(predicate::path::is_file());
        temp.child("store/versions/8.0.11/dotnet-sdk-8.0.404-linux-x64/dotnet")
            .assert(predicate::path::is_file());
    }

    #[test]
    fn second_run_uses_cached_metadata_and_install() {
        let mut server = mockito::Server::new();
        let mocks = serve_releases(&mut server);
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.create_dir_all().unwrap();

        for _ in 0..2 {
            let mut cmd = run_dotnet();
            bootstrap_env(&mut cmd, &server, temp.child("store").path());
            cmd.current_dir(project.path()).arg("build").assert().success();
        }

        // Every mock expects exactly one hit.
        for mock in &mocks {
            mock.assert();
        }
    }

    #[test]
    fn forwards_child_exit_code() {
        let mut server = mockito::Server::new();
        let _mocks = serve_releases(&mut server);
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.create_dir_all().unwrap();

        let mut cmd = run_dotnet();
        bootstrap_env(&mut cmd, &server, temp.child("store").path());
        cmd.current_dir(project.path())
            .env("FAKE_EXIT", "42")
            .arg("test")
            .assert()
            .code(42)
            .stderr(predicate::str::contains("Error:").not());
    }

    #[test]
    fn restores_project_file_before_command() {
        let mut server = mockito::Server::new();
        let _mocks = serve_releases(&mut server);
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.child("App.csproj").touch().unwrap();

        let mut cmd = run_dotnet();
        bootstrap_env(&mut cmd, &server, temp.child("store").path());
        cmd.current_dir(project.path())
            .arg("build")
            .assert()
            .success();

        project
            .child("restore.log")
            .assert(predicate::str::starts_with("restore "))
            .assert(predicate::str::contains("App.csproj"));
    }

    #[test]
    fn skip_restore_disables_restore() {
        let mut server = mockito::Server::new();
        let _mocks = serve_releases(&mut server);
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.child("App.csproj").touch().unwrap();

        let mut cmd = run_dotnet();
        bootstrap_env(&mut cmd, &server, temp.child("store").path());
        cmd.current_dir(project.path())
            .env("RUN_DOTNET_SKIP_RESTORE", "1")
            .arg("build")
            .assert()
            .success();

        project.child("restore.log").assert(predicate::path::missing());
    }

    #[test]
    fn no_arguments_installs_then_prints_usage() {
        let mut server = mockito::Server::new();
        let _mocks = serve_releases(&mut server);
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.create_dir_all().unwrap();

        let mut cmd = run_dotnet();
        bootstrap_env(&mut cmd, &server, temp.child("store").path());
        cmd.current_dir(project.path())
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains(
                "Usage: run-dotnet [VERSION] <args to dotnet>",
            ));

        project
            .child(".dotnet/.pinned-major")
            .assert(predicate::str::diff("8\n"));
        project
            .child(".dotnet/dotnet")
            .assert(predicate::path::exists());
    }

    #[test]
    fn checksum_mismatch_fails_and_leaves_no_view() {
        let mut server = mockito::Server::new();
        let base = server.url();
        let temp = assert_fs::TempDir::new().unwrap();
        let project = temp.child("project");
        project.create_dir_all().unwrap();

        let _index = server
            .mock("GET", "/releases-index.json")
            .with_body(format!(
                r#"{{ "releases-index": [
                    {{ "channel-version": "8.0", "release-type": "lts", "support-phase": "active",
                       "releases.json": "{base}/8.0/releases.json" }}
                ] }}"#
            ))
            .create();
        let _channel = server
            .mock("GET", "/8.0/releases.json")
            .with_body(format!(
                r#"{{ "latest-release": "8.0.11", "releases": [
                    {{ "release-version": "8.0.11",
                       "sdk": {{ "files": [
                           {{ "name": "dotnet-sdk-linux-x64.tar.gz", "rid": "linux-x64",
                              "url": "{base}/files/{SDK_FILE}", "hash": "{}" }}
                       ] }} }}
                ] }}"#,
                "0".repeat(128)
            ))
            .create();
        let _archive = server
            .mock("GET", format!("/files/{SDK_FILE}").as_str())
            .with_body(sdk_tarball())
            .create();

        let mut cmd = run_dotnet();
        bootstrap_env(&mut cmd, &server, temp.child("store").path());
        cmd.current_dir(project.path())
            .arg("build")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("checksum mismatch"));

        project
            .child(".dotnet/.pinned-major")
            .assert(predicate::path::missing());
        temp.child("store/archives")
            .child(SDK_FILE)
            .assert(predicate::path::missing());
    }
}
