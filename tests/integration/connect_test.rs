// tests/integration/connect_test.rs

//! Integration tests for connect
//! Tests: session naming, login rejection, connector failures, the login timeout
//! and cancellation races

use super::fixtures::*;
use super::test_helpers::TestContext;
use plmgate::config::SessionConfig;
use plmgate::core::connection::ConnectionRequest;
use plmgate::core::metrics;
use plmgate::core::{ErrorKind, GatewayError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Polls `done` every 10ms for up to two seconds.
async fn eventually(done: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

// ===== Successful Logins =====

#[tokio::test]
async fn test_connect_without_name_uses_default_session() {
    let ctx = TestContext::new();
    ctx.server.set_login_delay(Duration::from_millis(10));

    let response = ctx
        .manager
        .connect(request_as("alice"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.message, "Successfully connected");
    assert_eq!(response.session_name.as_deref(), Some("default"));
    let info = response.server_info.unwrap();
    assert_eq!(info.user_name, "alice");
    assert_eq!(info.user_id, user_id_for("alice"));
    assert_eq!(info.url, TEST_URL);
    assert_eq!(info.database, TEST_DATABASE);

    let listing = ctx.caller("default").get_all_sessions();
    assert_eq!(listing.current_session, "default");
    assert_eq!(listing.sessions.len(), 1);
    assert_eq!(listing.sessions[0].name, "default");
    assert!(listing.sessions[0].is_current);
}

#[tokio::test]
async fn test_connect_prefers_request_name_over_resolved_name() {
    let ctx = TestContext::new();
    let response = ctx
        .caller("from-header")
        .connect(
            request().with_session_name("explicit"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.session_name.as_deref(), Some("explicit"));
    assert!(ctx.store.contains("explicit"));
    assert!(!ctx.store.contains("from-header"));
}

#[tokio::test]
async fn test_connect_falls_back_to_resolved_name() {
    let ctx = TestContext::new();
    let response = ctx
        .caller("from-header")
        .connect(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.session_name.as_deref(), Some("from-header"));
    assert!(ctx.caller("from-header").is_connected());
}

#[tokio::test]
async fn test_connect_treats_empty_request_name_as_absent() {
    let ctx = TestContext::new();
    let response = ctx
        .manager
        .connect(request().with_session_name(""), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.session_name.as_deref(), Some("default"));
}

#[tokio::test]
async fn test_reconnect_replaces_session() {
    let ctx = TestContext::new();
    ctx.connect("s").await;
    ctx.manager
        .connect(
            request_as("bob").with_session_name("s"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(ctx.store.len(), 1);
    let info = ctx.caller("s").current_server_info().unwrap();
    assert_eq!(info.user_name, "bob");
    assert_eq!(ctx.server.logins(), 2);
}

// ===== Failed Logins =====

#[tokio::test]
async fn test_rejected_login_is_auth_error_and_stores_nothing() {
    let ctx = TestContext::new();
    let mut bad = request().with_session_name("s");
    bad.password = BAD_PASSWORD.to_string();

    let err = ctx
        .manager
        .connect(bad, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.message(), "Authentication failed for user");
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_connector_failure_is_infrastructure_error() {
    let ctx = TestContext::new();
    let mut unreachable = request();
    unreachable.url = String::new();

    let err = ctx
        .manager
        .connect(unreachable, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GatewayError::infrastructure("Connection failed: invalid server url")
    );
    assert_eq!(ctx.server.logins(), 0);
}

// ===== Timeout and Cancellation =====

#[tokio::test]
async fn test_default_login_timeout_is_45_seconds() {
    let ctx = TestContext::new();
    assert_eq!(ctx.manager.login_timeout(), Duration::from_secs(45));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_login_times_out_at_login_timeout() {
    let ctx = TestContext::new();
    ctx.server.hang_logins();

    let manager = ctx.manager.clone();
    let connect =
        tokio::spawn(async move { manager.connect(request(), &CancellationToken::new()).await });

    // Let the connect task start its login and arm its timer.
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(44)).await;
    assert!(!connect.is_finished(), "timed out before 45s");

    tokio::time::advance(Duration::from_millis(1001)).await;
    let err = connect.await.unwrap().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert_eq!(err.message(), "Connection timed out after 45s.");
    assert!(ctx.store.is_empty());
    ctx.server.release_logins();
}

#[tokio::test]
async fn test_slow_login_times_out_in_real_time() {
    let ctx = TestContext::with_login_timeout(Duration::from_millis(200));
    ctx.server.hang_logins();

    let started = std::time::Instant::now();
    let err = ctx
        .manager
        .connect(request(), &CancellationToken::new())
        .await
        .unwrap_err();
    let elapsed = started.elapsed();
    ctx.server.release_logins();

    assert_eq!(err.message(), "Connection timed out after 200ms.");
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}

#[tokio::test]
async fn test_abandoned_login_is_never_stored() {
    let ctx = TestContext::with_login_timeout(Duration::from_millis(100));
    ctx.server.set_login_delay(Duration::from_millis(300));

    let err = ctx
        .manager
        .connect(request().with_session_name("late"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);

    // The abandoned login finishes in the background and is logged out.
    assert!(eventually(|| ctx.server.logouts() == 1).await);
    assert!(!ctx.store.contains("late"));
    assert_eq!(ctx.server.logins(), 1);
    assert_eq!(ctx.store.stats().get_logout_failures(), 0);
}

#[tokio::test]
async fn test_cancelled_login_that_succeeds_late_is_logged_out() {
    let ctx = TestContext::new();
    ctx.server.hang_logins();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ctx
        .manager
        .connect(request().with_session_name("s"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(ctx.server.logouts(), 0);

    ctx.server.release_logins();
    assert!(eventually(|| ctx.server.logouts() == 1).await);
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_failed_logout_of_abandoned_login_is_counted() {
    let ctx = TestContext::with_login_timeout(Duration::from_millis(100));
    ctx.server.set_login_delay(Duration::from_millis(300));
    ctx.server.fail_logouts();
    let before = metrics::LOGOUT_FAILURES_TOTAL.get();

    let err = ctx
        .manager
        .connect(request(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Connection timed out after 100ms.");

    assert!(eventually(|| ctx.store.stats().get_logout_failures() == 1).await);
    assert_eq!(ctx.server.logouts(), 1);
    assert!(metrics::LOGOUT_FAILURES_TOTAL.get() > before);
}

#[tokio::test]
async fn test_rejected_late_login_is_not_logged_out() {
    let ctx = TestContext::with_login_timeout(Duration::from_millis(100));
    ctx.server.set_login_delay(Duration::from_millis(200));

    let late = ConnectionRequest::new(TEST_URL, TEST_DATABASE, "alice", BAD_PASSWORD);
    ctx.manager
        .connect(late, &CancellationToken::new())
        .await
        .unwrap_err();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(ctx.server.logins(), 1);
    assert_eq!(ctx.server.logouts(), 0);
}

// ===== Blocking Work Stays Off The Runtime =====

#[tokio::test]
async fn test_connect_sweep_logouts_do_not_stall_the_runtime() {
    let ctx = TestContext::with_config(SessionConfig {
        ttl: Duration::from_millis(100),
        cleanup_interval: Duration::from_millis(100),
        ..SessionConfig::default()
    });
    ctx.store.add_session(session(&ctx.server, "old", TEST_USER));
    ctx.server.set_logout_delay(Duration::from_millis(300));
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Single-threaded runtime: the ticker only advances while connect yields.
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let ticker = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    ctx.connect("new").await;
    ticker.abort();

    assert_eq!(ctx.server.logouts(), 1);
    assert!(!ctx.store.contains("old"));
    assert!(ctx.store.contains("new"));
    let ticks = ticks.load(Ordering::SeqCst);
    assert!(ticks >= 10, "runtime stalled during connect ({ticks} ticks)");
}

#[tokio::test]
async fn test_cancelled_connect_is_cancellation_not_timeout() {
    let ctx = TestContext::new();
    ctx.server.hang_logins();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = ctx
        .manager
        .connect(request().with_session_name("s"), &cancel)
        .await
        .unwrap_err();
    ctx.server.release_logins();

    assert_eq!(err, GatewayError::cancelled("Connection attempt was cancelled."));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!ctx.store.contains("s"));
}

#[tokio::test]
async fn test_already_cancelled_token_fails_fast() {
    let ctx = TestContext::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ctx.manager.connect(request(), &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(ctx.store.is_empty());
}
