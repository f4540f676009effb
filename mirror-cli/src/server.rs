//! HTTP front end: stream resolution, the signed m3u8 proxy and the
//! provider listing.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use md5::{Digest, Md5};
use mirror_resolver::extractor::default::random_user_agent;
use mirror_resolver::{
    ContentId, EpisodeMeta, MirrorEntry, ProxySigner, Resolver, StreamAssembler, StreamsResponse,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

const STREAMS_CACHE_CONTROL: &str = "public, s-max-age=600";
const M3U8_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: Resolver,
    assembler: StreamAssembler,
    /// Only used by `/proxy/m3u8`; resolution builds its own client per request
    proxy_client: Client,
    signer: ProxySigner,
}

impl AppState {
    pub fn new(resolver: Resolver, proxy_client: Client, signer: ProxySigner) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                assembler: StreamAssembler::new(),
                proxy_client,
                signer,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamsRequest {
    pub content_id: String,
    #[serde(default)]
    pub anime_name: Option<String>,
    #[serde(default)]
    pub privileged: bool,
    pub mirrors: Vec<MirrorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
    referer: Option<String>,
    user_agent: Option<String>,
    use_proxy: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProviderInfo {
    name: String,
    domains: Vec<String>,
    aliases: Vec<String>,
    privileged: bool,
    enabled: bool,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/streams", post(streams))
        .route("/proxy/m3u8", get(proxy_m3u8))
        .route("/providers", get(providers))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds `bind` and serves until ctrl-c.
pub async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Quoted-less md5 of the body, compared verbatim against `If-None-Match`.
fn etag(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

async fn streams(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StreamsRequest>,
) -> Response {
    let content: ContentId = match request.content_id.parse() {
        Ok(content) => content,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    // a fresh pool per request, closed once the report is in
    let report = match state
        .inner
        .resolver
        .resolve(&request.mirrors, request.privileged)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            warn!(%content, "resolution could not start: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };
    let meta = EpisodeMeta::new(content.to_string(), request.anime_name, content.episode);
    let response = StreamsResponse {
        streams: state.inner.assembler.assemble(report.streams, &meta),
    };

    let body = match serde_json::to_string(&response) {
        Ok(body) => body,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let etag = etag(&body);

    let cached = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if cached {
        debug!(%content, "streams unchanged");
        return StatusCode::NOT_MODIFIED.into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CACHE_CONTROL, STREAMS_CACHE_CONTROL.to_string()),
            (header::ETAG, etag),
        ],
        body,
    )
        .into_response()
}

async fn proxy_m3u8(State(state): State<AppState>, Query(query): Query<ProxyQuery>) -> Response {
    let Some(token) = query.url.filter(|t| !t.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing url parameter").into_response();
    };
    let signer = &state.inner.signer;
    let url = match signer.decode(&token) {
        Ok(url) => url,
        Err(e) => {
            debug!("rejected proxy token: {e}");
            return (StatusCode::FORBIDDEN, "Invalid or tampered URL").into_response();
        }
    };
    let referer = match query.referer.filter(|r| !r.is_empty()) {
        Some(token) => match signer.decode(&token) {
            Ok(referer) => Some(referer),
            Err(_) => return (StatusCode::FORBIDDEN, "Invalid or tampered referer").into_response(),
        },
        None => None,
    };

    let user_agent = query
        .user_agent
        .unwrap_or_else(|| random_user_agent().to_string());
    let relay = state.inner.resolver.config().relay.as_ref();
    let target = match relay {
        Some(relay) if query.use_proxy.as_deref() == Some("1") => relay.wrap(&url, &user_agent),
        _ => url,
    };

    let mut request = state
        .inner
        .proxy_client
        .get(&target)
        .header(reqwest::header::USER_AGENT, &user_agent);
    if let Some(referer) = &referer {
        request = request.header(reqwest::header::REFERER, referer);
    }

    let result = async {
        request
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
    .await;

    match result {
        Ok(manifest) => ([(header::CONTENT_TYPE, M3U8_CONTENT_TYPE)], manifest).into_response(),
        Err(e) => {
            warn!("failed to fetch proxied manifest: {e}");
            (StatusCode::BAD_GATEWAY, format!("Error fetching m3u8: {e}")).into_response()
        }
    }
}

async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    let providers = state
        .inner
        .resolver
        .registry()
        .descriptors()
        .iter()
        .map(|descriptor| ProviderInfo {
            name: descriptor.name.clone(),
            domains: descriptor.domain_patterns.clone(),
            aliases: descriptor.aliases.clone(),
            privileged: descriptor.requires_privilege,
            enabled: descriptor.enabled,
        })
        .collect();
    Json(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_resolver::ResolverConfig;
    use std::net::SocketAddr;

    const SECRET: &str = "test-secret";

    async fn spawn(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    async fn spawn_front_end() -> SocketAddr {
        let resolver = Resolver::from_config(ResolverConfig::default());
        let state = AppState::new(resolver, Client::new(), ProxySigner::new(SECRET));
        spawn(router(state)).await
    }

    /// Manifest host that only answers requests carrying the expected referer.
    async fn spawn_upstream() -> SocketAddr {
        let app = Router::new().route(
            "/master.m3u8",
            get(|headers: HeaderMap| async move {
                let referer = headers
                    .get(header::REFERER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if referer == "https://player.example/" {
                    (StatusCode::OK, "#EXTM3U\n#EXT-X-ENDLIST\n")
                } else {
                    (StatusCode::FORBIDDEN, "")
                }
            }),
        );
        spawn(app).await
    }

    #[test]
    fn test_etag_is_md5_hex() {
        assert_eq!(etag(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn test_proxy_m3u8() {
        let front = spawn_front_end().await;
        let upstream = spawn_upstream().await;
        let signer = ProxySigner::new(SECRET);
        let client = Client::new();

        let url = signer.encode(&format!("http://{upstream}/master.m3u8"));
        let referer = signer.encode("https://player.example/");

        let response = client
            .get(format!("http://{front}/proxy/m3u8"))
            .query(&[("url", url.as_str()), ("referer", referer.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            M3U8_CONTENT_TYPE
        );
        assert_eq!(response.text().await.unwrap(), "#EXTM3U\n#EXT-X-ENDLIST\n");

        // upstream refuses without the referer
        let response = client
            .get(format!("http://{front}/proxy/m3u8"))
            .query(&[("url", url.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_proxy_m3u8_rejects_bad_requests() {
        let front = spawn_front_end().await;
        let client = Client::new();

        let response = client
            .get(format!("http://{front}/proxy/m3u8"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let forged = ProxySigner::new("other-secret").encode("https://evil.example/x.m3u8");
        let response = client
            .get(format!("http://{front}/proxy/m3u8"))
            .query(&[("url", forged.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_streams_etag_and_cors() {
        let front = spawn_front_end().await;
        let client = Client::new();
        let request = serde_json::json!({
            "content_id": "mal:21:1",
            "anime_name": "One Piece",
            "mirrors": [
                {"player": "https://nowhere.example/1", "player_hosting": "mystery", "translator_title": "x"}
            ]
        });

        let response = client
            .post(format!("http://{front}/streams"))
            .header(reqwest::header::ORIGIN, "https://app.example")
            .json(&request)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[reqwest::header::CACHE_CONTROL], STREAMS_CACHE_CONTROL);
        assert_eq!(headers[reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = response.text().await.unwrap();
        assert_eq!(body, r#"{"streams":[]}"#);
        let tag = headers[reqwest::header::ETAG].to_str().unwrap().to_string();
        assert_eq!(tag, etag(&body));

        let response = client
            .post(format!("http://{front}/streams"))
            .header(reqwest::header::IF_NONE_MATCH, tag)
            .json(&request)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_streams_rejects_bad_content_id() {
        let front = spawn_front_end().await;
        let response = Client::new()
            .post(format!("http://{front}/streams"))
            .json(&serde_json::json!({"content_id": "nope", "mirrors": []}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_providers_listing() {
        let front = spawn_front_end().await;
        let providers: Vec<serde_json::Value> = Client::new()
            .get(format!("http://{front}/providers"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let voe = providers.iter().find(|p| p["name"] == "voe").unwrap();
        assert_eq!(voe["privileged"], true);
        assert!(providers.iter().any(|p| p["name"] == "cda"));
    }
}
