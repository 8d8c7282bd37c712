use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xpanel::panel::{AttemptFailure, ClientRecord, NegotiationError, PanelClient, build_http_client};
use xpanel::session::{CookieSet, Session};

fn panel() -> PanelClient {
    PanelClient::new(build_http_client(true).unwrap())
}

fn session(server: &MockServer) -> Session {
    let mut cookies = CookieSet::default();
    cookies.insert("3x-ui", "cookie-1");
    Session::new(server.uri(), cookies)
}

async fn request_lines(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| match r.url.query() {
            Some(q) => format!("{} {}?{q}", r.method, r.url.path()),
            None => format!("{} {}", r.method, r.url.path()),
        })
        .collect()
}

#[tokio::test]
async fn get_inbound_uses_first_dialect_and_sends_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/get/3"))
        .and(header("cookie", "3x-ui=cookie-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "msg": "",
            "obj": {"id": 3, "port": 443, "streamSettings": {"network": "ws"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let inbound = panel().get_inbound(&session(&server), 3).await.unwrap();
    assert_eq!(inbound.id, Some(3));
    assert_eq!(inbound.port, Some(443));
    assert_eq!(inbound.network(), "ws");
    assert_eq!(request_lines(&server).await.len(), 1);
}

#[tokio::test]
async fn get_inbound_order_is_stable_when_only_third_dialect_answers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xui/inbound/get/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "obj": {"id": 3, "port": 8080}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = panel();
    let s = session(&server);
    for _ in 0..2 {
        let inbound = client.get_inbound(&s, 3).await.unwrap();
        assert_eq!(inbound.port, Some(8080));
    }

    let one_round = [
        "GET /panel/api/inbounds/get/3",
        "GET /panel/api/inbounds/get?id=3",
        "GET /xui/inbound/get/3",
    ];
    let expected: Vec<String> = one_round
        .iter()
        .chain(one_round.iter())
        .map(|s| s.to_string())
        .collect();
    assert_eq!(request_lines(&server).await, expected);
}

#[tokio::test]
async fn get_inbound_query_dialect_and_post_dialect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/get"))
        .and(query_param("id", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 4, "port": 1})))
        .mount(&server)
        .await;

    let inbound = panel().get_inbound(&session(&server), 4).await.unwrap();
    assert_eq!(inbound.port, Some(1));

    let legacy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xui/inbound/get"))
        .and(body_json(json!({"id": 4})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "obj": {"id": 4, "port": 2}
        })))
        .expect(1)
        .mount(&legacy)
        .await;

    let inbound = panel().get_inbound(&session(&legacy), 4).await.unwrap();
    assert_eq!(inbound.port, Some(2));
    assert_eq!(request_lines(&legacy).await.len(), 5);
}

#[tokio::test]
async fn unexpected_shapes_are_skipped_not_returned() {
    let server = MockServer::start().await;
    // Bare object for a different inbound.
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/get/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 99})))
        .mount(&server)
        .await;
    // Not JSON at all (login page served instead of the API).
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/get"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/xui/inbound/get/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "obj": {"id": 3, "port": 3000}
        })))
        .mount(&server)
        .await;

    let inbound = panel().get_inbound(&session(&server), 3).await.unwrap();
    assert_eq!(inbound.port, Some(3000));
}

#[tokio::test]
async fn get_inbound_exhaustion_keeps_per_attempt_diagnostics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/panel/api/inbounds/get/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/panel/api/inbounds/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "msg": "not found", "obj": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/xui/inbound/get"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = panel().get_inbound(&session(&server), 3).await.unwrap_err();
    let NegotiationError::Exhausted { attempts, .. } = &err;
    assert_eq!(attempts.len(), 5);
    assert!(matches!(attempts[0].failure, AttemptFailure::InvalidJson(_)));
    assert_eq!(attempts[1].failure, AttemptFailure::Status(404));
    assert_eq!(attempts[2].failure, AttemptFailure::Status(404));
    assert!(matches!(
        attempts[3].failure,
        AttemptFailure::UnexpectedShape(_)
    ));
    assert_eq!(attempts[4].failure, AttemptFailure::Status(500));
    assert!(err.to_string().starts_with("cannot fetch inbound"));
}

#[tokio::test]
async fn transport_errors_are_swallowed_until_exhaustion() {
    // Nothing listens on port 1.
    let s = Session::new("http://127.0.0.1:1", CookieSet::default());
    let err = panel().get_inbound(&s, 1).await.unwrap_err();
    assert_eq!(err.attempts().len(), 5);
    assert!(
        err.attempts()
            .iter()
            .all(|a| matches!(a.failure, AttemptFailure::Transport(_)))
    );
}

#[tokio::test]
async fn add_client_sends_clients_array_first() {
    let server = MockServer::start().await;
    let mut record = ClientRecord::new(3, "user01", "11111111-1111-1111-1111-111111111111");
    record.total_gb = 10;

    Mock::given(method("POST"))
        .and(path("/panel/api/inbounds/addClient"))
        .and(body_json(json!({
            "id": 3,
            "clients": [{
                "id": "11111111-1111-1111-1111-111111111111",
                "email": "user01",
                "flow": "",
                "limitIp": 0,
                "totalGB": 10_737_418_240_u64,
                "expiryTime": 0,
                "enable": true
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "msg": "Client(s) added"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = panel().add_client(&session(&server), &record).await.unwrap();
    assert_eq!(resp["msg"], json!("Client(s) added"));
}

#[tokio::test]
async fn add_client_falls_through_to_settings_then_legacy() {
    let server = MockServer::start().await;
    // Both current-path variants answer but report failure.
    Mock::given(method("POST"))
        .and(path("/panel/api/inbounds/addClient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/xui/inbound/addClient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "ok"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = panel();
    let s = session(&server);
    let record = ClientRecord::new(3, "user01", "uuid-1");
    for _ in 0..2 {
        let resp = client.add_client(&s, &record).await.unwrap();
        assert_eq!(resp, json!({"msg": "ok"}));
    }

    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<serde_json::Value> = requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies.len(), 6);
    for round in bodies.chunks(3) {
        assert!(round[0].get("clients").is_some());
        assert!(round[1].get("settings").is_some());
        assert_eq!(round[2]["uuid"], json!("uuid-1"));
        assert_eq!(round[2]["email"], json!("user01"));
    }
}

#[tokio::test]
async fn add_client_exhaustion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": "false"})))
        .mount(&server)
        .await;

    let err = panel()
        .add_client(&session(&server), &ClientRecord::new(1, "a", "b"))
        .await
        .unwrap_err();
    assert_eq!(err.attempts().len(), 3);
    assert!(
        err.to_string()
            .starts_with("add client failed on all known endpoints")
    );
}
