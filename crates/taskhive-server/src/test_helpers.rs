use axum::Router;
use tokio::net::TcpListener;

use taskhive_db::Db;
use taskhive_service::TaskService;
use taskhive_store::{AttachmentStore, StoreConfig};

use crate::auth::AuthConfig;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// In-memory SQLite plus a tempdir-backed local store, with the minimum
/// bcrypt cost so tests stay fast. The tempdir leaks for the lifetime of
/// the test process.
pub fn test_service() -> TaskService {
    let db = Db::open_in_memory().unwrap();
    let config = StoreConfig {
        endpoint_url: None,
        region: None,
        bucket: None,
        access_key_id: None,
        secret_access_key: None,
        local_upload_dir: Some(
            tempfile::tempdir()
                .unwrap()
                .keep()
                .to_string_lossy()
                .to_string(),
        ),
    };
    let store = AttachmentStore::new(&config).unwrap();
    TaskService::new(db, store).with_bcrypt_cost(taskhive_service::MIN_BCRYPT_COST)
}

pub fn test_router() -> Router {
    crate::routes::build_router(test_service(), AuthConfig::new(TEST_JWT_SECRET))
}

/// A running test server on a random port.
pub struct TestServer {
    pub base_url: String,
    /// The service behind the router, for seeding state tests cannot reach
    /// over HTTP (admin accounts, promotions).
    pub service: TaskService,
    _handle: tokio::task::JoinHandle<()>,
}

pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    let service = test_service();
    let app = crate::routes::build_router(service.clone(), AuthConfig::new(TEST_JWT_SECRET));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url,
        service,
        _handle: handle,
    }
}
