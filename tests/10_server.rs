mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn root_describes_service() -> Result<()> {
    let server = common::start_server().await?;

    let res = common::client().get(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK, "expected 200 OK, got {}", res.status());

    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true, "success flag false or missing: {}", body);
    assert_eq!(body["data"]["name"], "autoclean-api", "unexpected service name: {}", body);
    assert_eq!(body["data"]["environment"], "test", "server should run in test mode: {}", body);
    assert!(body["timestamp"].is_string(), "missing timestamp: {}", body);

    Ok(())
}

#[tokio::test]
async fn unknown_route_returns_not_found_envelope() -> Result<()> {
    let server = common::start_server().await?;

    let res = common::client()
        .delete(server.url("/v1/external/nothing-here"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false, "{}", body);
    assert_eq!(body["error"]["code"], "NOT_FOUND", "{}", body);
    assert_eq!(body["error"]["message"], "routeNotFound", "{}", body);
    assert_eq!(body["error"]["path"], "/v1/external/nothing-here", "{}", body);
    assert_eq!(body["error"]["method"], "DELETE", "{}", body);

    Ok(())
}

#[tokio::test]
async fn health_reflects_database_state() -> Result<()> {
    let server = common::start_server().await?;

    let res = common::client().get(server.url("/health")).send().await?;
    let status = res.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "expected 200 or 503, got {}",
        status
    );

    let body = res.json::<Value>().await?;
    if status == StatusCode::OK {
        assert_eq!(body["data"]["database"], "ok", "{}", body);
    } else {
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE", "{}", body);
    }

    Ok(())
}
