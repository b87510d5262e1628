//! Secure upgrade of plaintext requests over the wire.

use std::net::SocketAddr;

use balancing_proxy::{
    EndPoint, EndPoints, LoadBalancerBuilder, Priority, SecureUpgrade, SecureUpgradeBuilder, Shutdown,
};

mod common;

async fn start_upgrading_proxy(
    backend_addr: SocketAddr,
    proxy_addr: SocketAddr,
    secure_port: Option<u16>,
    mode: SecureUpgrade,
) -> Shutdown {
    common::start_mock_backend(backend_addr, "plain").await;

    let mut endpoints = vec![EndPoint::new(proxy_addr.ip(), proxy_addr.port(), false)];
    if let Some(port) = secure_port {
        endpoints.push(EndPoint::new(proxy_addr.ip(), port, true));
    }

    let shutdown = Shutdown::new();
    let handler = LoadBalancerBuilder::new()
        .proxy(format!("http://{}", backend_addr), Priority::Medium)
        .concern(SecureUpgradeBuilder::new(EndPoints::new(endpoints)).mode(mode))
        .build()
        .unwrap();
    common::start_proxy(proxy_addr, handler, &shutdown).await;
    shutdown
}

#[tokio::test]
async fn test_force_redirects_permanently() {
    let backend_addr: SocketAddr = "127.0.0.1:28601".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28602".parse().unwrap();
    let shutdown = start_upgrading_proxy(backend_addr, proxy_addr, Some(443), SecureUpgrade::Force).await;

    let res = common::client()
        .post(format!("http://{}/foo?x=1", proxy_addr))
        .header("Host", "example.com:28602")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 308);
    assert_eq!(res.headers()["location"], "https://example.com/foo?x=1");
    assert!(res.headers().get("vary").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_force_keeps_non_default_secure_port() {
    let backend_addr: SocketAddr = "127.0.0.1:28611".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28612".parse().unwrap();
    let shutdown = start_upgrading_proxy(backend_addr, proxy_addr, Some(8443), SecureUpgrade::Force).await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 308);
    assert_eq!(res.headers()["location"], "https://127.0.0.1:8443/");

    shutdown.trigger();
}

#[tokio::test]
async fn test_allow_redirects_only_on_signal() {
    let backend_addr: SocketAddr = "127.0.0.1:28621".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28622".parse().unwrap();
    let shutdown = start_upgrading_proxy(backend_addr, proxy_addr, Some(443), SecureUpgrade::Allow).await;

    let client = common::client();

    let res = client
        .get(format!("http://{}/page", proxy_addr))
        .header("Host", "example.com")
        .header("Upgrade-Insecure-Requests", "1")
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "https://example.com/page");
    assert_eq!(res.headers()["vary"], "Upgrade-Insecure-Requests");

    let res = client
        .get(format!("http://{}/page", proxy_addr))
        .header("Host", "example.com")
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "plain");

    shutdown.trigger();
}

#[tokio::test]
async fn test_plaintext_only_deployment_is_served() {
    let backend_addr: SocketAddr = "127.0.0.1:28631".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28632".parse().unwrap();
    let shutdown = start_upgrading_proxy(backend_addr, proxy_addr, None, SecureUpgrade::Force).await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "plain");

    shutdown.trigger();
}
