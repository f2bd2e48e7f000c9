use busline_session::auth::Role;
use busline_session::config::{ClientOptions, ExecutionContext};
use busline_session::error::Error;
use busline_session::guard::GuardOutcome;
use busline_session::store::{CredentialField, CredentialStore, FileStorage};
use busline_session::Busline;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

fn busline_with_store(mock_server: &MockServer, store: CredentialStore) -> Busline {
    init_logging();
    Busline::new_with_store(ClientOptions::new(&mock_server.uri()), store).unwrap()
}

async fn mount_company_login(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/company/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "T1",
            "role": "COMPANY",
            "data": {"companyId": "9", "companyName": "Acme"}
        })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_company_login_end_to_end() {
    let mock_server = MockServer::start().await;
    mount_company_login(&mock_server).await;

    let store = CredentialStore::in_memory();
    let busline = busline_with_store(&mock_server, store.clone());

    let principal = busline
        .auth()
        .login_company("a@b.com", "secret")
        .await
        .unwrap();

    assert_eq!(principal.role(), Role::Company);
    assert!(busline.session().is_company());
    assert_eq!(store.get(CredentialField::UserRole).as_deref(), Some("COMPANY"));
    assert_eq!(store.get(CredentialField::Token).as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_user_login_sets_user_role() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "U1",
            "role": "USER",
            "data": {
                "id": 3,
                "name": "Ann",
                "email": "ann@example.com",
                "phone": "555",
                "role": "USER"
            }
        })))
        .mount(&mock_server)
        .await;

    let busline = busline_with_store(&mock_server, CredentialStore::in_memory());
    busline.auth().login_user("ann@example.com", "pw").await.unwrap();

    assert!(busline.session().is_authenticated());
    assert_eq!(busline.session().current_role(), Some(Role::User));
}

#[tokio::test]
async fn test_failed_login_leaves_previous_session() {
    let mock_server = MockServer::start().await;
    mount_company_login(&mock_server).await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&mock_server)
        .await;

    let store = CredentialStore::in_memory();
    let busline = busline_with_store(&mock_server, store.clone());
    busline.auth().login_company("a@b.com", "secret").await.unwrap();

    let before = (busline.session().current_principal(), store.load());
    let err = busline.auth().login_user("a@b.com", "wrong").await.unwrap_err();
    let after = (busline.session().current_principal(), store.load());

    match err {
        Error::Authentication { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_failed_login_from_anonymous_stays_anonymous() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/company/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Company not approved"))
        .mount(&mock_server)
        .await;

    let store = CredentialStore::in_memory();
    let busline = busline_with_store(&mock_server, store.clone());
    let err = busline.auth().login_company("a@b.com", "secret").await.unwrap_err();

    assert!(err.is_authentication());
    assert!(err.to_string().contains("Company not approved"));
    assert!(!busline.session().is_authenticated());
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn test_rotated_token_is_echoed_on_next_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/routes"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-CORS-TOKEN", "abc123")
                .set_body_json(json!([])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("X-CORS-TOKEN", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let busline = busline_with_store(&mock_server, CredentialStore::in_memory());
    let _: Vec<Value> = busline.routes().list().await.unwrap();
    let _: Vec<Value> = busline.tickets().list().await.unwrap();
}

#[tokio::test]
async fn test_rotation_applies_to_error_responses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buses/404"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("X-CORS-TOKEN", "after-error")
                .set_body_json(json!({"message": "Bus not found"})),
        )
        .mount(&mock_server)
        .await;

    let store = CredentialStore::in_memory();
    let busline = busline_with_store(&mock_server, store.clone());
    let err = busline.buses().get::<Value>("404").await.unwrap_err();

    assert!(matches!(err, Error::Api { status: 404, .. }));
    assert_eq!(store.anti_forgery_token(), "after-error");
}

#[tokio::test]
async fn test_transport_failure_keeps_store() {
    init_logging();
    let store = CredentialStore::in_memory();
    store.save(CredentialField::CorsToken, "kept");
    // nothing listens on port 9 of localhost
    let options = ClientOptions::new("http://127.0.0.1:9");
    let busline = Busline::new_with_store(options, store.clone()).unwrap();

    let err = busline.routes().list::<Value>().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(store.anti_forgery_token(), "kept");
}

#[tokio::test]
async fn test_login_never_carries_authorization() {
    let mock_server = MockServer::start().await;
    // mounted first so they win over the plain login mock
    for name in ["Authorization", "X-CORS-TOKEN"] {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(header_exists(name))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "unexpected headers"})),
            )
            .expect(0)
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "U2",
            "role": "USER",
            "data": {"id": "1", "name": "Ann", "email": "ann@example.com"}
        })))
        .mount(&mock_server)
        .await;

    // token left over from a prior session
    let store = CredentialStore::in_memory();
    store.save(CredentialField::Token, "OLD");
    store.save(CredentialField::CorsToken, "c0");

    let busline = busline_with_store(&mock_server, store.clone());
    busline.auth().login_user("ann@example.com", "pw").await.unwrap();
    assert_eq!(store.token().as_deref(), Some("U2"));
}

#[tokio::test]
async fn test_authenticated_calls_carry_bearer() {
    let mock_server = MockServer::start().await;
    mount_company_login(&mock_server).await;
    Mock::given(method("POST"))
        .and(path("/buses"))
        .and(header("Authorization", "Bearer T1"))
        .and(header_exists("X-CORS-TOKEN"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let busline = busline_with_store(&mock_server, CredentialStore::in_memory());
    busline.auth().login_company("a@b.com", "secret").await.unwrap();
    let created: Value = busline.buses().create(&json!({"plate": "AB 1"})).await.unwrap();
    assert_eq!(created["id"], 1);
}

#[tokio::test]
async fn test_non_interactive_context_is_stateless() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/routes"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/routes"))
        .and(header_exists("X-CORS-TOKEN"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-CORS-TOKEN", "server-side")
                .set_body_json(json!([])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let options = ClientOptions::new(&mock_server.uri())
        .with_context(ExecutionContext::NonInteractive)
        .with_storage_path(Some(dir.path().join("session.json")));
    let busline = Busline::new_with_options(options).unwrap();

    let _: Vec<Value> = busline.routes().list().await.unwrap();
    assert!(!busline.session().store().is_available());
    assert_eq!(busline.session().store().anti_forgery_token(), "");
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn test_session_survives_restart_with_file_storage() {
    let mock_server = MockServer::start().await;
    mount_company_login(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let options = ClientOptions::new(&mock_server.uri())
        .with_storage_path(Some(dir.path().join("session.json")));

    {
        let busline = Busline::new_with_options(options.clone()).unwrap();
        busline.auth().login_company("a@b.com", "secret").await.unwrap();
    }

    let restarted = Busline::new_with_options(options.clone()).unwrap();
    assert!(restarted.session().is_company());
    assert_eq!(*restarted.session().role().borrow(), Some(Role::Company));
    assert!(restarted.navigate("/company/dashboard").is_allowed());

    restarted.auth().logout();
    let storage = FileStorage::open(dir.path().join("session.json")).unwrap();
    let store = CredentialStore::new(Arc::new(storage));
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn test_guards_after_login() {
    let mock_server = MockServer::start().await;
    mount_company_login(&mock_server).await;

    let busline = busline_with_store(&mock_server, CredentialStore::in_memory());
    assert_eq!(busline.navigate("/dashboard").target(), Some("/login"));

    busline.auth().login_company("a@b.com", "secret").await.unwrap();
    match busline.navigate("/dashboard") {
        GuardOutcome::Redirect { target, notice } => {
            assert_eq!(target, "/company/dashboard");
            assert_eq!(notice.map(|n| n.required_role), Some(Role::User));
        }
        GuardOutcome::Allow => panic!("company must not enter rider pages"),
    }
    assert!(busline.navigate("/company/routes").is_allowed());
}

#[tokio::test]
async fn test_stray_stored_token_is_not_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/routes"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/routes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // token without the identity and role that belong to it
    let store = CredentialStore::in_memory();
    store.save(CredentialField::Token, "OLD");

    let busline = busline_with_store(&mock_server, store.clone());
    assert!(!busline.session().is_authenticated());
    assert_eq!(store.token(), None);

    let _: Vec<Value> = busline.routes().list().await.unwrap();
}
