/// HTTP Router and Server Startup
///
/// Exposes tool calls over three request shapes:
/// - `GET /mcp` opens a legacy HTTP+SSE session;
/// - `POST /mcp/message?sessionId=..` and `POST /mcp?sessionId=..` deliver
///   messages into a live session;
/// - `POST /mcp` without a session id is answered statelessly.

use actix_web::http::header;
use actix_web::middleware::{Compress, DefaultHeaders, Logger};
use actix_web::{App, HttpResponse, HttpServer, guard, web};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::ServerConfig;
use crate::core::engine::{McpEngine, ServerInfo};
use crate::core::error::HttpError;
use crate::core::protocol::{MCPMessage, MCPRequest};
use crate::core::registry::ToolRegistry;
use crate::core::session::SessionTable;
use crate::core::transport::SseTransport;
use crate::tools::horoscope::render::STORY_SIZE;
use crate::tools::horoscope::writer::OpenAiWriter;
use crate::tools::horoscope::{CardOptions, HoroscopeTool};

/// Path announced in the `endpoint` event.
pub const MESSAGE_PATH: &str = "/mcp/message";
/// Response header carrying the new session id on `GET /mcp`.
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

/// Application state shared across all worker threads.
#[derive(Clone)]
pub struct AppState {
    pub server_name: String,
    pub server_version: String,
    /// Directory served under `/output`
    pub output_dir: PathBuf,
    /// Idle interval between keep-alive comments on SSE streams
    pub keep_alive: Duration,
}

#[derive(Deserialize, Debug)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

impl SessionQuery {
    /// Empty values count as absent.
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// `GET /` - health and endpoint summary.
async fn info(state: web::Data<AppState>, sessions: web::Data<SessionTable>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "name": state.server_name,
        "version": state.server_version,
        "status": "running",
        "sessions": sessions.len(),
        "endpoints": {
            "streamable-http": "POST /mcp (newer protocol)",
            "legacy-sse": "GET /mcp (legacy HTTP+SSE)",
            "legacy-message": "POST /mcp/message (legacy)"
        }
    }))
}

/// CORS preflight for any path.
async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// `GET /mcp` - open a legacy SSE session.
///
/// The session is registered before the response is returned and removes
/// itself from the table when its stream closes.
async fn open_sse_session(
    state: web::Data<AppState>,
    engine: web::Data<McpEngine>,
    sessions: web::Data<SessionTable>,
) -> Result<HttpResponse, HttpError> {
    let (transport, stream) =
        SseTransport::connect(engine.into_inner(), MESSAGE_PATH, state.keep_alive);
    let session_id = stream.session_id().to_string();

    sessions
        .register(Arc::clone(&transport))
        .map_err(|e| HttpError::Internal(e.to_string()))?;
    let table = sessions.into_inner();
    transport.on_close(move |id| {
        table.unregister(id);
    });
    transport.open();

    info!(session_id = %session_id, "new SSE connection");

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
        // Disable proxy buffering and keep compression off the stream
        .insert_header(("x-accel-buffering", "no"))
        .insert_header((header::CONTENT_ENCODING, "identity"))
        .insert_header((SESSION_ID_HEADER, session_id))
        .streaming(stream))
}

fn parse_message(body: &[u8]) -> Result<MCPMessage, HttpError> {
    serde_json::from_slice(body).map_err(|e| HttpError::InvalidMessage(e.to_string()))
}

/// Feed a POSTed body into a live session. The reply travels on the stream.
fn deliver(transport: &SseTransport, body: &[u8]) -> Result<HttpResponse, HttpError> {
    let message = parse_message(body)?;
    for request in message.into_requests() {
        transport.handle_post_message(request).map_err(|e| {
            warn!(session_id = %transport.session_id(), error = %e, "message for closed session");
            HttpError::SessionNotFound
        })?;
    }
    Ok(HttpResponse::Accepted().body("Accepted"))
}

fn lookup_session(sessions: &SessionTable, id: &str) -> Result<Arc<SseTransport>, HttpError> {
    sessions.lookup(id).ok_or_else(|| {
        warn!(session_id = %id, "no transport found for session");
        HttpError::SessionNotFound
    })
}

/// `POST /mcp` - session continuation or stateless JSON-RPC.
///
/// A session id that does not resolve is a 404; it never falls back to
/// stateless handling.
async fn streamable_post(
    query: web::Query<SessionQuery>,
    body: web::Bytes,
    engine: web::Data<McpEngine>,
    sessions: web::Data<SessionTable>,
) -> Result<HttpResponse, HttpError> {
    info!(session = query.session_id().unwrap_or("new"), "POST /mcp");

    if let Some(id) = query.session_id() {
        let transport = lookup_session(&sessions, id)?;
        return deliver(&transport, &body);
    }

    let request: MCPRequest =
        serde_json::from_slice(&body).map_err(|e| HttpError::InvalidMessage(e.to_string()))?;
    match request.method.as_str() {
        "tools/list" | "tools/call" => {
            let response = engine.dispatch(request).await;
            Ok(HttpResponse::Ok().json(response))
        }
        _ => Err(HttpError::UnknownMethod(request.method)),
    }
}

/// `POST /mcp/message` - legacy per-message delivery.
async fn legacy_message(
    query: web::Query<SessionQuery>,
    body: web::Bytes,
    sessions: web::Data<SessionTable>,
) -> Result<HttpResponse, HttpError> {
    let id = query.session_id().ok_or(HttpError::MissingSessionId)?;
    info!(session_id = %id, "received message");
    let transport = lookup_session(&sessions, id)?;
    deliver(&transport, &body)
}

/// `GET /output/{file}` - previously generated cards.
async fn serve_output(
    file: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, HttpError> {
    let name = file.into_inner();
    if name.is_empty()
        || name.contains(['/', '\\'])
        || name.contains("..")
        || !name.ends_with(".png")
    {
        return Err(HttpError::InvalidFileName(name));
    }

    match tokio::fs::read(state.output_dir.join(&name)).await {
        Ok(bytes) => Ok(HttpResponse::Ok().content_type("image/png").body(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HttpError::FileNotFound(name)),
        Err(e) => Err(HttpError::Internal(e.to_string())),
    }
}

/// CORS and security headers applied to every response.
pub fn default_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
        .add(("Access-Control-Allow-Headers", "Content-Type"))
        .add(("X-Content-Type-Options", "nosniff"))
}

/// Register all routes.
///
/// # Arguments
/// * `cfg` - Service config of an `App` that already carries `AppState`,
///   `McpEngine` and `SessionTable` as app data
///
/// Handlers extract those three through `web::Data`; a missing one makes
/// the affected routes answer 500.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{tail:.*}")
            .guard(guard::Options())
            .to(preflight),
    )
    .route("/", web::get().to(info))
    .route("/mcp", web::get().to(open_sse_session))
    .route("/mcp", web::post().to(streamable_post))
    .route("/mcp/message", web::post().to(legacy_message))
    .route("/output/{file}", web::get().to(serve_output));
}

/// Build the tool registry.
///
/// Add new tool registrations here.
///
/// # Arguments
/// * `config` - Server configuration; tools read their API and output
///   settings from it
///
/// # Returns
/// The frozen registry shared by every worker's engine
pub fn initialize_tools(config: &ServerConfig) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    let writer = OpenAiWriter::new(config.openai.clone());
    let options = CardOptions {
        output_dir: config.output_dir.clone(),
        size: STORY_SIZE,
    };
    registry.register(Arc::new(HoroscopeTool::new(writer, options, config.seed)));

    Arc::new(registry)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Run the MCP server over HTTP.
///
/// Live sessions are closed on shutdown so their SSE streams end and the
/// graceful stop does not wait on them.
///
/// # Arguments
/// * `config` - Server configuration (bind address, workers, tools)
///
/// # Returns
/// Ok once the server has stopped, or the bind error
pub async fn run_server_http(config: ServerConfig) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();

    let app_state = web::Data::new(AppState {
        server_name: config.server_name.clone(),
        server_version: config.server_version.clone(),
        output_dir: config.output_dir.clone(),
        keep_alive: config.keep_alive,
    });
    let engine = web::Data::new(McpEngine::new(
        ServerInfo {
            name: config.server_name.clone(),
            version: config.server_version.clone(),
        },
        initialize_tools(&config),
    ));
    let sessions = web::Data::new(SessionTable::new());

    if config.openai.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; horoscope generation will report errors");
    }
    info!(
        name = %config.server_name,
        version = %config.server_version,
        bind = %bind_addr,
        workers = config.workers,
        output_dir = %config.output_dir.display(),
        keep_alive_secs = config.keep_alive.as_secs(),
        "MCP server starting"
    );

    // Each worker builds its own App; the Data handles share one state.
    let app_sessions = sessions.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(engine.clone())
            .app_data(app_sessions.clone())
            .wrap(Compress::default())
            .wrap(default_headers())
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .workers(config.workers)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .disable_signals()
    .bind(&bind_addr)?
    .run();

    // Close sessions before stopping, or graceful stop waits on open streams.
    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutting down server");
        sessions.close_all();
        handle.stop(true).await;
    });

    server.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ToolResult;
    use crate::core::registry::{MCPTool, Tool};
    use actix_web::body::MessageBody;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};
    use std::future::poll_fn;
    use std::pin::Pin;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// Long enough that no ping lands inside an in-process test.
    const QUIET: Duration = Duration::from_secs(600);

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    struct Echo;

    impl Tool for Echo {
        type Args = EchoArgs;

        fn descriptor(&self) -> MCPTool {
            MCPTool {
                name: "echo".to_string(),
                description: "Echoes text".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            }
        }

        async fn call(&self, args: EchoArgs) -> ToolResult {
            ToolResult::success(vec![crate::core::protocol::ContentBlock::text(args.text)])
        }
    }

    struct Harness {
        sessions: web::Data<SessionTable>,
        engine: web::Data<McpEngine>,
        state: web::Data<AppState>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        harness_with(Arc::new(registry), TempDir::new().unwrap(), QUIET)
    }

    fn harness_with(registry: Arc<ToolRegistry>, dir: TempDir, keep_alive: Duration) -> Harness {
        Harness {
            sessions: web::Data::new(SessionTable::new()),
            engine: web::Data::new(McpEngine::new(
                ServerInfo {
                    name: "astro-daily".to_string(),
                    version: "1.0.0".to_string(),
                },
                registry,
            )),
            state: web::Data::new(AppState {
                server_name: "astro-daily".to_string(),
                server_version: "1.0.0".to_string(),
                output_dir: dir.path().to_path_buf(),
                keep_alive,
            }),
            _dir: dir,
        }
    }

    macro_rules! app {
        ($h:expr) => {
            test::init_service(
                App::new()
                    .app_data($h.state.clone())
                    .app_data($h.engine.clone())
                    .app_data($h.sessions.clone())
                    .wrap(default_headers())
                    .configure(configure),
            )
            .await
        };
    }

    async fn next_frame<B: MessageBody + Unpin>(body: &mut B) -> String {
        let chunk = tokio::time::timeout(
            Duration::from_secs(5),
            poll_fn(|cx| Pin::new(&mut *body).poll_next(cx)),
        )
        .await
        .expect("timed out waiting for SSE frame")
        .expect("stream ended");
        let bytes = chunk.ok().expect("stream error");
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn frame_data(frame: &str) -> &str {
        frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap()
    }

    #[actix_rt::test]
    async fn info_lists_endpoints() {
        let h = harness();
        let app = app!(h);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["name"], "astro-daily");
        assert_eq!(body["status"], "running");
        assert!(body["endpoints"]["legacy-sse"].is_string());
    }

    #[actix_rt::test]
    async fn options_short_circuits() {
        let h = harness();
        let app = app!(h);
        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/mcp/message")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Methods").unwrap(),
            "GET, POST, OPTIONS"
        );
    }

    #[actix_rt::test]
    async fn legacy_message_requires_session_id() {
        let h = harness();
        let app = app!(h);
        let req = test::TestRequest::post()
            .uri("/mcp/message")
            .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing sessionId query parameter");
    }

    #[actix_rt::test]
    async fn unknown_session_is_not_found_on_both_paths() {
        let h = harness();
        let app = app!(h);
        for uri in ["/mcp/message?sessionId=nope", "/mcp?sessionId=nope"] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
            let body: Value = test::read_body_json(resp).await;
            assert!(body["error"].as_str().unwrap().contains("Session not found"));
        }
        assert!(h.sessions.is_empty());
    }

    #[actix_rt::test]
    async fn stateless_tools_list_and_call() {
        let h = harness();
        let app = app!(h);

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 1);
        assert_eq!(body["result"]["tools"][0]["name"], "echo");

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_json(json!({"method": "tools/call", "params": {"name": "echo", "arguments": {"text": "hi"}}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(body["result"]["content"][0]["text"], "hi");

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_json(json!({"method": "tools/call", "params": {"name": "echo", "arguments": {}}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"]["isError"], true);

        assert!(h.sessions.is_empty());
    }

    #[actix_rt::test]
    async fn stateless_rejects_other_methods() {
        let h = harness();
        let app = app!(h);
        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Unknown method: initialize");
    }

    #[actix_rt::test]
    async fn malformed_body_is_bad_request() {
        let h = harness();
        let app = app!(h);
        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn sse_session_round_trip() {
        let h = harness();
        let app = app!(h);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/mcp").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        let session_id = resp
            .headers()
            .get(SESSION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(h.sessions.lookup(&session_id).is_some());

        let mut body = resp.into_body();
        let endpoint = next_frame(&mut body).await;
        assert!(endpoint.starts_with("event: endpoint\n"));
        assert_eq!(
            frame_data(&endpoint),
            format!("/mcp/message?sessionId={session_id}")
        );

        let req = test::TestRequest::post()
            .uri(&format!("/mcp/message?sessionId={session_id}"))
            .set_json(json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let message = next_frame(&mut body).await;
        assert!(message.starts_with("event: message\n"));
        let response: Value = serde_json::from_str(frame_data(&message)).unwrap();
        assert_eq!(response["id"], 7);
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");

        // Streamable-HTTP continuation reaches the same session.
        let req = test::TestRequest::post()
            .uri(&format!("/mcp?sessionId={session_id}"))
            .set_json(json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);
        let pong: Value = serde_json::from_str(frame_data(&next_frame(&mut body).await)).unwrap();
        assert_eq!(pong["id"], 8);

        // Client disconnect: the body is dropped and the session disappears.
        drop(body);
        assert!(h.sessions.lookup(&session_id).is_none());

        let req = test::TestRequest::post()
            .uri(&format!("/mcp/message?sessionId={session_id}"))
            .set_json(json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn concurrent_sessions_do_not_cross_talk() {
        let h = harness();
        let app = app!(h);

        let a = test::call_service(&app, test::TestRequest::get().uri("/mcp").to_request()).await;
        let b = test::call_service(&app, test::TestRequest::get().uri("/mcp").to_request()).await;
        let a_id = a.headers().get(SESSION_ID_HEADER).unwrap().to_str().unwrap().to_string();
        let b_id = b.headers().get(SESSION_ID_HEADER).unwrap().to_str().unwrap().to_string();
        assert_ne!(a_id, b_id);
        assert_eq!(h.sessions.len(), 2);

        let mut a_body = a.into_body();
        let mut b_body = b.into_body();
        next_frame(&mut a_body).await;
        next_frame(&mut b_body).await;

        let req = test::TestRequest::post()
            .uri(&format!("/mcp/message?sessionId={a_id}"))
            .set_json(json!({"jsonrpc": "2.0", "id": "for-a", "method": "ping"}))
            .to_request();
        test::call_service(&app, req).await;

        let frame = next_frame(&mut a_body).await;
        let response: Value = serde_json::from_str(frame_data(&frame)).unwrap();
        assert_eq!(response["id"], "for-a");

        let quiet = tokio::time::timeout(
            Duration::from_millis(100),
            poll_fn(|cx| Pin::new(&mut b_body).poll_next(cx)),
        )
        .await;
        assert!(quiet.is_err(), "session b saw session a's traffic");
    }

    #[actix_rt::test]
    async fn serves_generated_cards_only() {
        let h = harness();
        std::fs::write(h.state.output_dir.join("leo_minimalist_1.png"), b"\x89PNG").unwrap();
        let app = app!(h);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/output/leo_minimalist_1.png").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/output/missing.png").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/output/notes.txt").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn registered_tools_are_listed_over_a_session() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().display().to_string();
        let config = ServerConfig::from_lookup(|key| match key {
            "OUTPUT_DIR" => Some(output.clone()),
            _ => None,
        });
        let h = harness_with(initialize_tools(&config), dir, QUIET);
        let app = app!(h);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/mcp").to_request()).await;
        let session_id = resp
            .headers()
            .get(SESSION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let mut body = resp.into_body();
        next_frame(&mut body).await;

        let req = test::TestRequest::post()
            .uri(&format!("/mcp/message?sessionId={session_id}"))
            .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

        let response: Value = serde_json::from_str(frame_data(&next_frame(&mut body).await)).unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "generate_daily_horoscope");
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["zodiac_sign"]));
    }

    #[actix_rt::test]
    async fn dropped_socket_deregisters_its_session() {
        let h = harness_with(
            {
                let mut registry = ToolRegistry::new();
                registry.register(Arc::new(Echo));
                Arc::new(registry)
            },
            TempDir::new().unwrap(),
            Duration::from_millis(50),
        );
        let (state, engine, sessions) = (h.state.clone(), h.engine.clone(), h.sessions.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .app_data(engine.clone())
                .app_data(sessions.clone())
                .configure(configure)
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(b"GET /mcp HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&seen).contains("event: endpoint") {
            let n = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf))
                .await
                .expect("timed out waiting for endpoint event")
                .unwrap();
            assert!(n > 0, "server closed the stream early");
            seen.extend_from_slice(&buf[..n]);
        }
        assert_eq!(h.sessions.len(), 1);

        // Vanish without a word; only the next ping can notice.
        drop(socket);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !h.sessions.is_empty() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "session outlived its client"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        handle.stop(false).await;
    }
}
