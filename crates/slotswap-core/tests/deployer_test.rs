// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment cycle, cutover and rollback scenarios against a mock feed.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{TestContext, blue_ledger, manifest_line, tar_gz};
use slotswap_core::{
    CutoverError, CycleOutcome, Error, HealthGate, MockHookRunner, RollbackError,
    RollbackOutcome, Slot, SlotLedger, StageError,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Check cycle
// ============================================================================

#[tokio::test]
async fn test_same_version_is_a_no_op() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.0.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.0.0")]));
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let mut deployer = ctx.deployer().await;
    let outcome = deployer.check_and_deploy().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::UpToDate {
            version: "v1.0.0".to_string()
        }
    );
    assert_eq!(ctx.source.download_calls(), 0);
    assert!(!ctx.slot_dir(Slot::Green).exists());
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
}

#[tokio::test]
async fn test_new_release_is_cut_over_to_inactive_slot() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0"), ("bin/app", "#!/bin/sh\n")]));

    let mut deployer = ctx.deployer().await;
    let outcome = deployer.check_and_deploy().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Deployed {
            version: "v1.1.0".to_string(),
            slot: Slot::Green,
        }
    );

    let expected = SlotLedger {
        active_slot: Slot::Green,
        blue_version: "v1.0.0".to_string(),
        green_version: "v1.1.0".to_string(),
    };
    assert_eq!(deployer.ledger(), &expected);
    assert_eq!(ctx.store().load().await.unwrap(), expected);
    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Green)));
    assert_eq!(
        common::read_to_string(&ctx.link.join("VERSION")),
        "v1.1.0"
    );
    assert_eq!(
        common::read_to_string(&ctx.slot_dir(Slot::Blue).join("VERSION")),
        "v1.0.0"
    );
}

#[tokio::test]
async fn test_consecutive_releases_alternate_slots() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "next")]));
    let mut deployer = ctx.deployer().await;

    ctx.source.publish("v1.1.0");
    deployer.check_and_deploy().await.unwrap();
    ctx.source.publish("v1.2.0");
    let outcome = deployer.check_and_deploy().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Deployed {
            version: "v1.2.0".to_string(),
            slot: Slot::Blue,
        }
    );
    let ledger = ctx.store().load().await.unwrap();
    assert_eq!(ledger.active_slot, Slot::Blue);
    assert_eq!(ledger.blue_version, "v1.2.0");
    assert_eq!(ledger.green_version, "v1.1.0");
    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Blue)));
}

#[tokio::test]
async fn test_install_hook_failure_leaves_live_slot_untouched() {
    let ctx = TestContext::with_hooks(MockHookRunner::failing_on("install.sh"));
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let mut deployer = ctx
        .builder()
        .install_command(Some("./install.sh".to_string()))
        .build()
        .await
        .unwrap();
    let err = deployer.check_and_deploy().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Stage(StageError::InstallHookFailure { .. })
    ));
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
    assert_eq!(deployer.ledger(), &blue_ledger("v1.0.0", ""));
    // The partial attempt stays in place for inspection.
    assert!(ctx.slot_dir(Slot::Green).join("VERSION").exists());
    assert_eq!(
        ctx.hooks.invocations(),
        vec![(ctx.slot_dir(Slot::Green), "./install.sh".to_string())]
    );
}

#[tokio::test]
async fn test_no_matching_asset_has_no_side_effects() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source.add_asset("app.deb", b"deb".to_vec());
    let ledger_before = ctx.ledger_bytes();

    let mut deployer = ctx.deployer().await;
    let err = deployer.check_and_deploy().await.unwrap_err();

    assert!(matches!(err, Error::Stage(StageError::NoMatchingAsset { .. })));
    assert!(!ctx.slot_dir(Slot::Green).exists());
    assert_eq!(ctx.ledger_bytes(), ledger_before);
}

#[tokio::test]
async fn test_feed_failure_is_reported() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;

    let mut deployer = ctx.deployer().await;
    let err = deployer.check_and_deploy().await.unwrap_err();

    assert!(matches!(err, Error::Release(_)));
}

// ============================================================================
// Checksum policy
// ============================================================================

#[tokio::test]
async fn test_missing_manifest_fails_without_mutation() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let mut deployer = ctx.builder().verify_checksums(true).build().await.unwrap();
    let err = deployer.check_and_deploy().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Stage(StageError::ChecksumPolicyViolation { .. })
    ));
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
}

#[tokio::test]
async fn test_digest_mismatch_skips_extraction() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    ctx.source
        .add_asset("app_checksums.txt", manifest_line("app.tar.gz", b"something else"));
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let mut deployer = ctx.builder().verify_checksums(true).build().await.unwrap();
    let err = deployer.check_and_deploy().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Stage(StageError::IntegrityFailure { .. })
    ));
    assert!(!ctx.slot_dir(Slot::Green).join("VERSION").exists());
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
}

#[tokio::test]
async fn test_matching_digest_deploys() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    let archive = tar_gz(&[("VERSION", "v1.1.0")]);
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("checksums.txt", manifest_line("app.tar.gz", &archive));
    ctx.source.add_asset("app.tar.gz", archive);

    let mut deployer = ctx.builder().verify_checksums(true).build().await.unwrap();
    let outcome = deployer.check_and_deploy().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Deployed { .. }));
    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Green)));
}

// ============================================================================
// Health gate and hooks
// ============================================================================

#[tokio::test]
async fn test_health_timeout_leaves_live_slot_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let gate = HealthGate::new(format!("{}/health", server.uri()), Duration::from_millis(300))
        .unwrap()
        .with_poll_interval(Duration::from_millis(50));
    let mut deployer = ctx.builder().health_gate(Some(gate)).build().await.unwrap();
    let err = deployer.check_and_deploy().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Cutover(CutoverError::HealthCheckTimeout(_))
    ));
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
}

#[tokio::test]
async fn test_healthy_endpoint_allows_cutover() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));

    let gate = HealthGate::new(format!("{}/health", server.uri()), Duration::from_secs(5)).unwrap();
    let mut deployer = ctx.builder().health_gate(Some(gate)).build().await.unwrap();

    assert!(matches!(
        deployer.check_and_deploy().await.unwrap(),
        CycleOutcome::Deployed { .. }
    ));
}

#[tokio::test]
async fn test_post_deploy_failure_does_not_revert() {
    let ctx = TestContext::with_hooks(MockHookRunner::failing_on("restart"));
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));

    let mut deployer = ctx
        .builder()
        .post_deploy_command(Some("systemctl restart app".to_string()))
        .build()
        .await
        .unwrap();
    deployer.check_and_deploy().await.unwrap();

    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Green)));
    assert_eq!(ctx.store().load().await.unwrap().active_slot, Slot::Green);
    assert_eq!(
        ctx.hooks.invocations(),
        vec![(PathBuf::from("/"), "systemctl restart app".to_string())]
    );
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test]
async fn test_dry_run_announces_only() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let mut deployer = ctx.builder().dry_run(true).build().await.unwrap();
    let outcome = deployer.check_and_deploy().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::DryRun {
            version: "v1.1.0".to_string(),
            slot: Slot::Green,
        }
    );
    assert_eq!(ctx.source.download_calls(), 0);
    assert!(!ctx.slot_dir(Slot::Green).exists());
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
}

// ============================================================================
// Rollback
// ============================================================================

#[tokio::test]
async fn test_double_rollback_round_trip() {
    let ctx = TestContext::new();
    let original = SlotLedger {
        active_slot: Slot::Green,
        blue_version: "v1.0.0".to_string(),
        green_version: "v1.1.0".to_string(),
    };
    ctx.seed(&original).await;
    let mut deployer = ctx.deployer().await;

    let first = deployer.rollback().await.unwrap();
    assert_eq!(
        first,
        RollbackOutcome::RolledBack {
            slot: Slot::Blue,
            version: "v1.0.0".to_string(),
        }
    );
    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Blue)));
    assert_eq!(ctx.store().load().await.unwrap().active_slot, Slot::Blue);

    deployer.rollback().await.unwrap();
    assert_eq!(deployer.ledger(), &original);
    assert_eq!(ctx.store().load().await.unwrap(), original);
    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Green)));
}

#[tokio::test]
async fn test_rollback_to_never_staged_slot() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();
    let mut deployer = ctx.deployer().await;

    let err = deployer.rollback().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Rollback(RollbackError::InvalidRollbackTarget {
            slot: Slot::Green,
            ..
        })
    ));
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
}

#[tokio::test]
async fn test_rollback_refuses_slot_left_by_failed_install() {
    let ctx = TestContext::with_hooks(MockHookRunner::failing_on("install.sh"));
    ctx.seed(&SlotLedger {
        active_slot: Slot::Green,
        blue_version: String::new(),
        green_version: "v1.0.0".to_string(),
    })
    .await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    let mut deployer = ctx
        .builder()
        .install_command(Some("./install.sh".to_string()))
        .build()
        .await
        .unwrap();
    deployer.check_and_deploy().await.unwrap_err();
    assert!(ctx.slot_dir(Slot::Blue).join("VERSION").exists());
    let ledger_before = ctx.ledger_bytes();
    let link_before = ctx.link_target();

    let err = deployer.rollback().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Rollback(RollbackError::InvalidRollbackTarget {
            slot: Slot::Blue,
            ..
        })
    ));
    assert_eq!(ctx.ledger_bytes(), ledger_before);
    assert_eq!(ctx.link_target(), link_before);
    assert_eq!(deployer.ledger().active_slot, Slot::Green);
}

#[tokio::test]
async fn test_rollback_after_deploy_restores_previous_release() {
    let ctx = TestContext::new();
    ctx.seed(&blue_ledger("v1.0.0", "")).await;
    ctx.source.publish("v1.1.0");
    ctx.source
        .add_asset("app.tar.gz", tar_gz(&[("VERSION", "v1.1.0")]));
    let mut deployer = ctx.deployer().await;
    deployer.check_and_deploy().await.unwrap();

    deployer.rollback().await.unwrap();

    assert_eq!(ctx.link_target(), Some(ctx.slot_dir(Slot::Blue)));
    assert_eq!(common::read_to_string(&ctx.link.join("VERSION")), "v1.0.0");
    let ledger = ctx.store().load().await.unwrap();
    assert_eq!(ledger.active_slot, Slot::Blue);
    assert_eq!(ledger.green_version, "v1.1.0");
}

// ============================================================================
// Startup reconciliation
// ============================================================================

#[tokio::test]
async fn test_startup_trusts_entry_point_over_ledger() {
    let ctx = TestContext::new();
    ctx.seed(&SlotLedger {
        active_slot: Slot::Green,
        blue_version: "v1.0.0".to_string(),
        green_version: "v1.1.0".to_string(),
    })
    .await;
    // Ledger written ahead of a switch that never happened.
    slotswap_core::entry_point::switch(&ctx.link, &ctx.slot_dir(Slot::Blue))
        .await
        .unwrap();

    let deployer = ctx.deployer().await;

    assert_eq!(deployer.ledger().active_slot, Slot::Blue);
    assert_eq!(ctx.store().load().await.unwrap().active_slot, Slot::Blue);
}

#[tokio::test]
async fn test_unknown_slot_in_ledger_fails_startup() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(&ctx.install_dir).unwrap();
    std::fs::write(
        &ctx.state_file,
        "active_slot: purple\nblue_version: v1\ngreen_version: v2\n",
    )
    .unwrap();

    let result = ctx.builder().build().await;

    assert!(matches!(result, Err(Error::Ledger(_))));
}
