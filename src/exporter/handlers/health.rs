use crate::{
    diagnostics::CommandRunner,
    exporter::{GIT_COMMIT_HASH, Target},
};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    pid: u32,
    jvm: String,
}

// Never waits on an attach that is still in progress
fn check_jvm_health(commands: &CommandRunner) -> Result<(), &'static str> {
    match commands.attach_state() {
        Some(true) => Ok(()),
        Some(false) => {
            error!("JVM diagnostics are not available");
            Err("unavailable")
        }
        None => {
            warn!("Still attaching to the JVM");
            Err("pending")
        }
    }
}

fn create_health_response(target: Target, jvm_result: &Result<(), &'static str>) -> Health {
    Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pid: target.pid,
        jvm: match jvm_result {
            Ok(()) => "ok",
            Err(state) => state,
        }
        .to_string(),
    }
}

fn create_response_body(method: &Method, health: &Health) -> Body {
    if method == Method::GET {
        Json(health).into_response().into_body()
    } else {
        Body::empty()
    }
}

// X-App: <name>:<version>:<short hash>
fn create_app_headers(health: &Health) -> HeaderMap {
    let short_hash = health.commit.get(..7).unwrap_or("");
    let header_value = format!("{}:{}:{}", health.name, health.version, short_hash);

    let mut headers = HeaderMap::new();
    match header_value.parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => debug!("Failed to parse X-App header: {err}"),
    }
    headers
}

pub async fn health(
    method: Method,
    Extension(commands): Extension<CommandRunner>,
    Extension(target): Extension<Target>,
) -> impl IntoResponse {
    let jvm_result = check_jvm_health(&commands);
    let health = create_health_response(target, &jvm_result);
    let body = create_response_body(&method, &health);
    let headers = create_app_headers(&health);

    let status = if jvm_result.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, headers, body)
}
