pub mod auth;
mod multipart;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use anyhow::Result;
use taskhive_service::TaskService;
use tokio::net::TcpListener;

use auth::AuthConfig;

pub async fn serve(listener: TcpListener, service: TaskService, auth: AuthConfig) -> Result<()> {
    let app = routes::build_router(service, auth);
    axum::serve(listener, app).await?;
    Ok(())
}
