use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    socket_link: watch::Receiver<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub socket: HealthCheck,
    pub checked_at: String,
}

pub fn router(socket_link: watch::Receiver<bool>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { socket_link })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    socket_link: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(socket_link)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let socket = socket_check(&state.socket_link);
    let ready = socket.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "redbridge-server runtime initialized".to_string(),
        },
        socket,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn socket_check(link: &watch::Receiver<bool>) -> HealthCheck {
    if *link.borrow() {
        HealthCheck { status: "ready", detail: "socket mode link is up".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "socket mode link is down".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use tokio::sync::watch;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_the_socket_link_is_up() {
        let (sender, socket_link) = watch::channel(true);

        let (status, Json(payload)) = health(State(HealthState { socket_link })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.socket.status, "ready");
        assert_eq!(payload.service.status, "ready");
        drop(sender);
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_the_socket_link_is_down() {
        let (sender, socket_link) = watch::channel(false);

        let (status, Json(payload)) = health(State(HealthState { socket_link })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.socket.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        drop(sender);
    }
}
