// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Full deployments driven from a YAML config against a mock GitHub API.

mod common;

use common::{manifest_line, tar_gz, zip};
use serde_json::json;
use slotswap_core::{Config, CycleOutcome, DeployerBuilder, Slot};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn publish(server: &MockServer, tag: &str, assets: &[(&str, Vec<u8>)]) {
    let listed: Vec<_> = assets
        .iter()
        .map(|(name, _)| {
            json!({
                "name": name,
                "browser_download_url": format!("{}/download/{}/{}", server.uri(), tag, name),
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"tag_name": tag, "assets": listed})),
        )
        .mount(server)
        .await;

    for (name, body) in assets {
        Mock::given(method("GET"))
            .and(path(format!("/download/{}/{}", tag, name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(server)
            .await;
    }
}

fn config(temp: &TempDir, server: &MockServer, extra: &str) -> Config {
    let yaml = format!(
        "repo: owner/app
asset_suffix: linux-amd64.tar.gz
install_dir: {install}
current_symlink: {link}
github_api_url: {api}
{extra}",
        install = temp.path().join("app").display(),
        link = temp.path().join("current").display(),
        api = server.uri(),
        extra = extra,
    );
    let config = Config::parse(&yaml).unwrap();
    config.validate().unwrap();
    config
}

#[tokio::test]
async fn test_deploy_from_github_feed() {
    let server = MockServer::start().await;
    let archive = tar_gz(&[("VERSION", "v2.0.0"), ("bin/app", "#!/bin/sh\necho v2\n")]);
    publish(
        &server,
        "v2.0.0",
        &[
            ("app-linux-amd64.tar.gz", archive.clone()),
            (
                "app-linux-amd64_checksums.txt",
                manifest_line("app-linux-amd64.tar.gz", &archive).into_bytes(),
            ),
        ],
    )
    .await;

    let temp = TempDir::new().unwrap();
    let config = config(&temp, &server, "verify_checksums: true\n");

    let mut deployer = DeployerBuilder::from_config(&config)
        .unwrap()
        .build()
        .await
        .unwrap();
    let outcome = deployer.check_and_deploy().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Deployed {
            version: "v2.0.0".to_string(),
            slot: Slot::Green,
        }
    );
    let link = temp.path().join("current");
    assert_eq!(std::fs::read_to_string(link.join("VERSION")).unwrap(), "v2.0.0");
    let state = std::fs::read_to_string(temp.path().join("app").join("state.yaml")).unwrap();
    assert!(state.contains("active_slot: green"));
    assert!(state.contains("green_version: v2.0.0"));
}

#[tokio::test]
async fn test_install_hook_runs_through_shell() {
    let server = MockServer::start().await;
    publish(
        &server,
        "v3.0.0",
        &[("app-linux-amd64.tar.gz", tar_gz(&[("VERSION", "v3.0.0")]))],
    )
    .await;

    let temp = TempDir::new().unwrap();
    let config = config(
        &temp,
        &server,
        "run_command: cp VERSION INSTALLED\nhook_timeout_seconds: 30\n",
    );

    let mut deployer = DeployerBuilder::from_config(&config)
        .unwrap()
        .build()
        .await
        .unwrap();
    deployer.check_and_deploy().await.unwrap();

    let installed = temp.path().join("current").join("INSTALLED");
    assert_eq!(std::fs::read_to_string(installed).unwrap(), "v3.0.0");
}

#[tokio::test]
async fn test_zip_asset() {
    let server = MockServer::start().await;
    publish(
        &server,
        "v1.0.0",
        &[("app-windows.zip", zip(&[("app/VERSION", "v1.0.0")]))],
    )
    .await;

    let temp = TempDir::new().unwrap();
    let mut config = config(&temp, &server, "");
    config.asset_suffix = ".zip".to_string();

    let mut deployer = DeployerBuilder::from_config(&config)
        .unwrap()
        .build()
        .await
        .unwrap();
    deployer.check_and_deploy().await.unwrap();

    let version = temp.path().join("current").join("app").join("VERSION");
    assert_eq!(std::fs::read_to_string(version).unwrap(), "v1.0.0");
}

#[tokio::test]
async fn test_health_gate_from_config() {
    let server = MockServer::start().await;
    publish(
        &server,
        "v1.0.0",
        &[("app-linux-amd64.tar.gz", tar_gz(&[("VERSION", "v1.0.0")]))],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1..)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = config(
        &temp,
        &server,
        &format!("health_check_url: {}/health\nhealth_check_timeout: 5\n", server.uri()),
    );

    let mut deployer = DeployerBuilder::from_config(&config)
        .unwrap()
        .build()
        .await
        .unwrap();

    assert!(matches!(
        deployer.check_and_deploy().await.unwrap(),
        CycleOutcome::Deployed { .. }
    ));
}
