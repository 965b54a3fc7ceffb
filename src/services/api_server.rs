// src/services/api_server.rs
//! HTTP server guarded by DID authentication.
//!
//! Every route sits behind [`did_auth_middleware`], which runs the
//! [`Authenticator`] pipeline before the handler:
//! - exempt paths pass straight through
//! - authenticated requests get an [`AuthenticatedDid`] extension, and a
//!   freshly issued token is returned in the response `Authorization` header
//! - failures are answered with the error's status and a JSON body
//!
//! Routes:
//! - `GET /` landing text (exempt)
//! - `GET /.well-known/agent-descriptions` discovery document (exempt)
//! - `GET /ad.json` agent description for the authenticated caller

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use log::{info, warn};
use serde_json::json;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::error::AuthError;
use crate::models::credential::BEARER_SCHEME;
use crate::services::authenticator::{AuthOutcome, Authenticator};

/// DID of the caller, inserted into request extensions after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedDid(pub String);

/// API server state shared by the middleware and handlers
pub struct ApiServer {
    /// Authentication pipeline
    authenticator: Arc<Authenticator>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `authenticator` - Pipeline run in front of every route
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        ApiServer { authenticator }
    }

    /// Builds the application router with authentication, CORS and panic
    /// handling applied.
    pub fn router(self) -> Router {
        let routes = Router::new()
            .route("/", get(Self::index_handler))
            .route(
                "/.well-known/agent-descriptions",
                get(Self::agent_descriptions_handler),
            )
            .route("/ad.json", get(Self::agent_description_handler));
        self.wrap(routes)
    }

    /// Puts `routes` behind authentication, CORS and panic handling.
    fn wrap(self, routes: Router) -> Router {
        let state = Arc::new(self);
        routes
            .layer(middleware::from_fn_with_state(state, did_auth_middleware))
            .layer(CorsLayer::permissive())
            .layer(CatchPanicLayer::custom(|_: Box<dyn Any + Send + 'static>| {
                AuthError::Internal("handler panicked".to_string()).into_response()
            }))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:9870")
    ///
    /// # Errors
    /// Fails if the address cannot be bound or the server stops abnormally.
    pub async fn run(self, addr: SocketAddr) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server running at http://{}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Landing page
    ///
    /// # Endpoint
    /// GET /
    async fn index_handler() -> &'static str {
        "DID authenticated agent service"
    }

    /// Lists the agent descriptions hosted here
    ///
    /// # Endpoint
    /// GET /.well-known/agent-descriptions
    async fn agent_descriptions_handler() -> impl IntoResponse {
        Json(json!({
            "@context": {"ad": "https://agent-network-protocol.com/ad#"},
            "@type": "CollectionPage",
            "items": [{
                "@type": "ad:AgentDescription",
                "name": "did-auth-service",
                "@id": "/ad.json"
            }]
        }))
    }

    /// Agent description for the authenticated caller
    ///
    /// # Endpoint
    /// GET /ad.json
    ///
    /// # Responses
    /// - 200 OK: Description naming the caller's DID
    /// - 401/403: Authentication failed (answered by the middleware)
    async fn agent_description_handler(
        Extension(AuthenticatedDid(did)): Extension<AuthenticatedDid>,
    ) -> impl IntoResponse {
        (
            StatusCode::OK,
            Json(json!({
                "@type": "ad:AgentDescription",
                "name": "did-auth-service",
                "securityDefinitions": {
                    "didwba_sc": {"scheme": "didwba", "in": "header", "name": "Authorization"}
                },
                "security": "didwba_sc",
                "caller": did,
            })),
        )
    }
}

/// Authenticates every request before it reaches a handler.
async fn did_auth_middleware(
    State(state): State<Arc<ApiServer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host());
    let domain = state.authenticator.serving_domain(host);
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let outcome = state
        .authenticator
        .authenticate(&path, authorization.as_deref(), &domain)
        .await;

    match outcome {
        Ok(AuthOutcome::Exempt) => next.run(request).await,
        Ok(AuthOutcome::Authenticated { did, token }) => {
            request.extensions_mut().insert(AuthenticatedDid(did));
            let mut response = next.run(request).await;
            if let Some(token) = token {
                match HeaderValue::from_str(&format!("{} {}", BEARER_SCHEME, token)) {
                    Ok(value) => {
                        response.headers_mut().insert(header::AUTHORIZATION, value);
                    }
                    Err(e) => warn!("Issued token is not a valid header value: {}", e),
                }
            }
            response
        }
        Err(e) => e.into_response(),
    }
}
