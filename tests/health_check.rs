//! Liveness prober tests against raw and mock backends.

use std::time::Duration;

use axum::http::StatusCode;
use tokio::net::TcpStream;

use waf_client::config::{HealthCheckConfig, MockServerConfig};
use waf_client::health::{health_check, HealthFlag, HealthMonitor, HealthProbe};
use waf_client::lifecycle::Shutdown;
use waf_client::mock::MockWafServer;
use waf_client::{Stage, WafError};

mod common;

#[tokio::test]
async fn test_healthy_backend() {
    let (addr, _rx) = common::start_capturing_backend(200, r#"{"result_flag":0,"msg":"Succ"}"#).await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let status = health_check(conn).await.unwrap();
    assert!(status.is_healthy());
    assert_eq!(status.message, "Succ");
}

#[tokio::test]
async fn test_request_bytes_on_the_wire() {
    let (addr, mut rx) = common::start_capturing_backend(200, r#"{"result_flag":0,"msg":"Succ"}"#).await;
    let conn = TcpStream::connect(addr).await.unwrap();
    health_check(conn).await.unwrap();

    let raw = rx.recv().await.unwrap();
    let expected = format!(
        "GET /hccheck HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        addr
    );
    assert_eq!(String::from_utf8(raw).unwrap(), expected);
}

#[tokio::test]
async fn test_unhealthy_flag_is_error_naming_flag() {
    let (addr, _rx) =
        common::start_capturing_backend(200, r#"{"result_flag":1,"msg":"server unavailable"}"#).await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let err = health_check(conn).await.unwrap_err();
    match &err {
        WafError::Unhealthy { flag, message } => {
            assert_eq!(*flag, 1);
            assert_eq!(message, "server unavailable");
        }
        other => panic!("expected Unhealthy, got {:?}", other),
    }
    assert!(err.to_string().contains("flag:1"));
}

#[tokio::test]
async fn test_chunked_reply_returns_while_socket_stays_open() {
    let addr = common::start_raw_backend(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1e\r\n{\"result_flag\":0,\"msg\":\"Succ\"}\r\n0\r\n\r\n",
    )
    .await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let status = tokio::time::timeout(Duration::from_secs(3), health_check(conn))
        .await
        .expect("health check did not return after the final chunk")
        .unwrap();
    assert!(status.is_healthy());
    assert_eq!(status.message, "Succ");
}

#[tokio::test]
async fn test_content_length_reply_returns_while_socket_stays_open() {
    let addr = common::start_raw_backend(
        b"HTTP/1.1 200 OK\r\nContent-Length: 34\r\n\r\n{\"result_flag\":3,\"msg\":\"overload\"}",
    )
    .await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(3), health_check(conn))
        .await
        .expect("health check did not return after the body")
        .unwrap_err();
    assert!(matches!(err, WafError::Unhealthy { flag: 3, .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_missing_fields_default_to_healthy() {
    let (addr, _rx) = common::start_capturing_backend(200, "{}").await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let status = health_check(conn).await.unwrap();
    assert_eq!(status.flag, HealthFlag::Healthy);
    assert_eq!(status.message, "");
}

#[tokio::test]
async fn test_non_200_is_backend_status() {
    let (addr, _rx) = common::start_capturing_backend(503, "").await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let err = health_check(conn).await.unwrap_err();
    match err {
        WafError::BackendStatus { status } => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
        other => panic!("expected BackendStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn test_garbage_body_is_decode_error() {
    let (addr, _rx) = common::start_capturing_backend(200, "<html>oops</html>").await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let err = health_check(conn).await.unwrap_err();
    assert!(matches!(err, WafError::Decode { payload: "health", .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_hangup_is_read_error() {
    let addr = common::start_hangup_backend().await;
    let conn = TcpStream::connect(addr).await.unwrap();

    let err = health_check(conn).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Read));
}

#[tokio::test]
async fn test_probe_against_mock_server() {
    let shutdown = Shutdown::new();
    let server = MockWafServer::new(MockServerConfig::default()).with_health_flag(0);
    let stats = server.stats();
    let addr = server
        .spawn("127.0.0.1:0".parse().unwrap(), shutdown.subscribe())
        .await
        .unwrap();

    let probe = HealthProbe::new(addr, &HealthCheckConfig::default());
    let status = probe.check().await.unwrap();
    assert_eq!(status.message, "Succ");
    assert_eq!(stats.health_requests(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_probe_reports_unhealthy_mock() {
    let shutdown = Shutdown::new();
    let addr = MockWafServer::new(MockServerConfig::default())
        .with_health_flag(2)
        .spawn("127.0.0.1:0".parse().unwrap(), shutdown.subscribe())
        .await
        .unwrap();

    let probe = HealthProbe::new(addr, &HealthCheckConfig::default());
    let err = probe.check().await.unwrap_err();
    assert!(matches!(err, WafError::Unhealthy { flag: 2, .. }));

    shutdown.trigger();
}

#[tokio::test]
async fn test_probe_dial_failure() {
    let addr = common::unused_addr().await;
    let probe = HealthProbe::new(addr, &HealthCheckConfig::default());

    let err = probe.check().await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Dial));
}

#[tokio::test]
async fn test_probe_times_out_on_silent_backend() {
    let addr = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, r#"{"result_flag":0,"msg":"Succ"}"#.to_string())
    })
    .await;
    let config = HealthCheckConfig {
        timeout_secs: 1,
        ..HealthCheckConfig::default()
    };

    let err = HealthProbe::new(addr, &config).check().await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Timeout));
}

#[tokio::test]
async fn test_monitor_marks_unreachable_backend_unhealthy() {
    let addr = common::unused_addr().await;
    let config = HealthCheckConfig {
        interval_secs: 1,
        unhealthy_threshold: 1,
        ..HealthCheckConfig::default()
    };
    let monitor = std::sync::Arc::new(HealthMonitor::new(HealthProbe::new(addr, &config), &config));
    assert!(monitor.is_healthy());

    let shutdown = Shutdown::new();
    let handle = {
        let monitor = monitor.clone();
        let rx = shutdown.subscribe();
        tokio::spawn(async move { monitor.run(rx).await })
    };

    // The first tick fires immediately.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!monitor.is_healthy());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}
