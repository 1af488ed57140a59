use crate::common::{
    create_session, create_session_reply, get_with_session, proxy_error, solution, test_transport,
    test_user_agent,
};
use futures_util::future::join_all;
use polite_fetch::config::{Config, ProxySettings, SessionMode};
use polite_fetch::{Dispatcher, FetchError, SessionError, SessionToken};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PAGE: &str = "https://example.com/page";

fn proxy_dispatcher(server: &MockServer) -> Dispatcher {
    let endpoint = server.uri().parse().expect("Failed to parse mock URI");
    Dispatcher::via_proxy(test_transport(), ProxySettings::new(endpoint))
}

#[tokio::test]
async fn test_solution_body_returned_verbatim() {
    let server = MockServer::start().await;
    create_session("s-1").expect(1).mount(&server).await;
    get_with_session(PAGE, "s-1")
        .and(body_partial_json(json!({ "maxTimeout": 60000 })))
        .respond_with(solution("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let body = dispatcher.fetch(PAGE).await.expect("Fetch failed");

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_session_reused_across_fetches() {
    let server = MockServer::start().await;
    create_session("s-1").expect(1).mount(&server).await;
    get_with_session(PAGE, "s-1")
        .respond_with(solution("<html>again</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    for _ in 0..3 {
        assert_eq!(dispatcher.fetch(PAGE).await.unwrap(), "<html>again</html>");
    }

    let sessions = dispatcher.sessions().expect("proxy route has sessions");
    assert_eq!(sessions.current(), Some(SessionToken::new("s-1")));
}

#[tokio::test]
async fn test_concurrent_cold_fetches_create_one_session() {
    let server = MockServer::start().await;
    create_session_reply(
        json!({ "status": "ok", "session": "shared" }),
        Duration::from_millis(300),
    )
    .expect(1)
    .mount(&server)
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "cmd": "request.get", "session": "shared" })))
        .respond_with(solution("<html>shared</html>"))
        .expect(10)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let urls: Vec<String> = (0..10)
        .map(|i| format!("https://example.com/{}", i))
        .collect();
    let results = join_all(urls.iter().map(|url| dispatcher.fetch(url))).await;

    for result in results {
        assert_eq!(result.unwrap(), "<html>shared</html>");
    }
}

#[tokio::test]
async fn test_concurrent_cold_fetches_share_creation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "cmd": "sessions.create" })))
        .respond_with(proxy_error("Chrome failed to start").set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "cmd": "request.get" })))
        .respond_with(solution("unreachable"))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let results = join_all((0..5).map(|_| dispatcher.fetch(PAGE))).await;

    for result in results {
        match result {
            Err(FetchError::SessionCreation(SessionError::Rejected(message))) => {
                assert_eq!(message, "Chrome failed to start")
            }
            other => panic!("expected session creation failure, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_session_error_retried_once_with_new_session() {
    let server = MockServer::start().await;
    create_session("stale").up_to_n_times(1).expect(1).mount(&server).await;
    create_session("fresh").expect(1).mount(&server).await;
    get_with_session(PAGE, "stale")
        .respond_with(proxy_error("Error: invalid session"))
        .expect(1)
        .mount(&server)
        .await;
    get_with_session(PAGE, "fresh")
        .respond_with(solution("<html>recovered</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let body = dispatcher.fetch(PAGE).await.expect("Retry should succeed");

    assert_eq!(body, "<html>recovered</html>");
    let sessions = dispatcher.sessions().unwrap();
    assert_eq!(sessions.current(), Some(SessionToken::new("fresh")));
}

#[tokio::test]
async fn test_second_session_error_is_not_retried() {
    let server = MockServer::start().await;
    create_session("first").up_to_n_times(1).expect(1).mount(&server).await;
    create_session("second").expect(1).mount(&server).await;
    get_with_session(PAGE, "first")
        .respond_with(proxy_error("invalid session"))
        .expect(1)
        .mount(&server)
        .await;
    get_with_session(PAGE, "second")
        .respond_with(proxy_error("session still invalid"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    match result {
        Err(FetchError::Proxy { url, message }) => {
            assert_eq!(url, PAGE);
            assert_eq!(message, "session still invalid");
        }
        other => panic!("expected proxy error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_session_error_surfaces_immediately() {
    let server = MockServer::start().await;
    create_session("s-1").expect(1).mount(&server).await;
    get_with_session(PAGE, "s-1")
        .respond_with(proxy_error("Error solving the challenge. Timeout after 60.0 seconds."))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    assert!(matches!(
        result,
        Err(FetchError::Proxy { message, .. }) if message.starts_with("Error solving the challenge")
    ));
    // The session survives errors unrelated to it
    assert_eq!(
        dispatcher.sessions().unwrap().current(),
        Some(SessionToken::new("s-1"))
    );
}

#[tokio::test]
async fn test_missing_solution_is_protocol_error() {
    let server = MockServer::start().await;
    create_session("s-1").mount(&server).await;
    get_with_session(PAGE, "s-1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    assert!(matches!(result, Err(FetchError::ProxyProtocol { .. })));
}

#[tokio::test]
async fn test_empty_solution_is_protocol_error() {
    let server = MockServer::start().await;
    create_session("s-1").mount(&server).await;
    get_with_session(PAGE, "s-1")
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ok", "solution": { "response": "" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    assert!(matches!(result, Err(FetchError::ProxyProtocol { .. })));
}

#[tokio::test]
async fn test_capitalized_session_message_is_not_retried() {
    let server = MockServer::start().await;
    create_session("a").expect(1).mount(&server).await;
    get_with_session(PAGE, "a")
        .respond_with(proxy_error("Session limit reached"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    assert!(matches!(
        result,
        Err(FetchError::Proxy { message, .. }) if message == "Session limit reached"
    ));
    assert_eq!(
        dispatcher.sessions().unwrap().current(),
        Some(SessionToken::new("a"))
    );
}

#[tokio::test]
async fn test_recreation_failure_during_retry_surfaces() {
    let server = MockServer::start().await;
    create_session("stale").up_to_n_times(1).expect(1).mount(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "cmd": "sessions.create" })))
        .respond_with(proxy_error("Chrome failed to start"))
        .expect(1)
        .mount(&server)
        .await;
    get_with_session(PAGE, "stale")
        .respond_with(proxy_error("invalid session"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    match result {
        Err(FetchError::SessionCreation(SessionError::Rejected(message))) => {
            assert_eq!(message, "Chrome failed to start")
        }
        other => panic!("expected session creation failure, got {:?}", other),
    }
    assert!(dispatcher.sessions().unwrap().current().is_none());
}

#[tokio::test]
async fn test_retry_without_solution_is_protocol_error() {
    let server = MockServer::start().await;
    create_session("stale").up_to_n_times(1).expect(1).mount(&server).await;
    create_session("fresh").expect(1).mount(&server).await;
    get_with_session(PAGE, "stale")
        .respond_with(proxy_error("invalid session"))
        .expect(1)
        .mount(&server)
        .await;
    get_with_session(PAGE, "fresh")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = proxy_dispatcher(&server);
    let result = dispatcher.fetch(PAGE).await;

    assert!(matches!(result, Err(FetchError::ProxyProtocol { .. })));
}

#[tokio::test]
async fn test_proxy_route_never_consults_robots() {
    let proxy = MockServer::start().await;
    let site = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("direct"))
        .expect(0)
        .mount(&site)
        .await;

    let target = format!("{}/private", site.uri());
    create_session("s-1").mount(&proxy).await;
    get_with_session(&target, "s-1")
        .respond_with(solution("<html>via proxy</html>"))
        .expect(1)
        .mount(&proxy)
        .await;

    let mut config = Config {
        user_agent: test_user_agent(),
        ..Config::default()
    };
    config.robots.base_url = Some(site.uri());
    config.proxy.endpoint = Some(proxy.uri());

    let dispatcher = Dispatcher::from_config(&config).expect("Failed to build dispatcher");
    let body = dispatcher.fetch(&target).await.unwrap();

    assert_eq!(body, "<html>via proxy</html>");
}

#[tokio::test]
async fn test_stateless_mode_sends_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "cmd": "sessions.create" })))
        .respond_with(solution("unused"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "cmd": "request.get", "url": PAGE })))
        .and(|request: &Request| {
            request
                .body_json::<Value>()
                .map(|body| body.get("session").is_none())
                .unwrap_or(false)
        })
        .respond_with(solution("<html>stateless</html>"))
        .expect(2)
        .mount(&server)
        .await;

    let endpoint = server.uri().parse().unwrap();
    let settings = ProxySettings::new(endpoint).with_session_mode(SessionMode::Stateless);
    let dispatcher = Dispatcher::via_proxy(test_transport(), settings);

    for _ in 0..2 {
        assert_eq!(dispatcher.fetch(PAGE).await.unwrap(), "<html>stateless</html>");
    }
    assert!(dispatcher.sessions().unwrap().current().is_none());
}

#[tokio::test]
async fn test_stateless_mode_does_not_retry_session_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(proxy_error("session not found"))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = server.uri().parse().unwrap();
    let settings = ProxySettings::new(endpoint).with_session_mode(SessionMode::Stateless);
    let dispatcher = Dispatcher::via_proxy(test_transport(), settings);

    assert!(matches!(
        dispatcher.fetch(PAGE).await,
        Err(FetchError::Proxy { .. })
    ));
}

#[tokio::test]
async fn test_configured_max_timeout_is_sent() {
    let server = MockServer::start().await;
    create_session("s-1").mount(&server).await;
    get_with_session(PAGE, "s-1")
        .and(body_partial_json(json!({ "maxTimeout": 15000 })))
        .respond_with(solution("<html>quick</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = server.uri().parse().unwrap();
    let settings = ProxySettings::new(endpoint).with_max_timeout_ms(15_000);
    let dispatcher = Dispatcher::via_proxy(test_transport(), settings);

    assert_eq!(dispatcher.fetch(PAGE).await.unwrap(), "<html>quick</html>");
}
