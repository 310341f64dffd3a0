use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::chunk::{ChunkStore, WriteOutcome, chunk_filename, effective_chunk_count};
use crate::config::Settings;
use crate::dispatch::split_and_send;
use crate::error::{Error, Result};
use crate::loader::SampleStore;
use crate::login::{
    SessionStore, UserStore, handle_change_password, handle_login, handle_logout,
    handle_register,
};
use crate::orient::{self, Orient};
use crate::planner::plan_chunk_count;

/// Everything the handlers share, built once at start-up.
pub struct AppContext {
    pub settings: Settings,
    pub chunks: ChunkStore,
    pub samples: SampleStore,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub http: reqwest::Client,
}

impl AppContext {
    pub fn new(settings: Settings) -> Result<Self> {
        let ttl = settings.session_ttl()?;
        let users = UserStore::open(&settings.users_file)?;
        Ok(AppContext {
            chunks: ChunkStore::new(&settings.chunk_dir),
            samples: SampleStore::new(&settings.data_dir),
            sessions: SessionStore::new(ttl),
            http: reqwest::Client::new(),
            users,
            settings,
        })
    }
}

#[derive(Deserialize)]
struct ChunkQuery {
    n_chunks: Option<usize>,
}

#[derive(Deserialize)]
struct SendRequest {
    url: String,
    n_chunks: Option<usize>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidInput(_) | Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Io { .. } | Error::Serialization(_) | Error::Internal(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        let message = match &self {
            Error::Validation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Build the application router over a shared context.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/io/sample-data/:name", get(sample_data))
        .route("/api/v1/io/sample-data/:name/:orient", get(sample_data_oriented))
        .route("/api/v1/io/datasets", get(list_datasets))
        .route("/api/v1/io/data/get-chunk-count/:name", get(get_chunk_count))
        .route("/api/v1/io/data/chunk-dataset/:name", post(chunk_dataset))
        .route("/api/v1/io/data/chunk/:name/:chunk", get(get_chunk))
        .route("/api/v1/io/data/send-chunks/:name", post(send_chunks))
        .route("/api/v1/io/upload", post(upload))
        .route("/api/v1/auth/register", post(handle_register))
        .route("/api/v1/auth/login", post(handle_login))
        .route("/api/v1/auth/logout", post(handle_logout))
        .route("/api/v1/auth/password/change", post(handle_change_password))
        .with_state(ctx)
}

/// Start the HTTP server on `settings.bind_addr`.
pub async fn run(settings: Settings) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = settings.bind_addr.clone();
    let ctx = Arc::new(AppContext::new(settings)?);
    let app = router(ctx);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// Filesystem and CPU work leaves the async runtime
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("background task failed: {e}")))?
}

async fn sample_data(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    render(ctx, name, Orient::default()).await
}

async fn sample_data_oriented(
    State(ctx): State<Arc<AppContext>>,
    Path((name, orient)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let orient: Orient = orient.parse()?;
    render(ctx, name, orient).await
}

async fn render(ctx: Arc<AppContext>, name: String, orient: Orient) -> Result<Json<Value>> {
    let doc = blocking(move || orient::to_json(&ctx.samples.load(&name)?, orient)).await?;
    Ok(Json(doc))
}

async fn list_datasets(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>> {
    let names = blocking(move || ctx.samples.list()).await?;
    Ok(Json(json!({ "datasets": names })))
}

async fn get_chunk_count(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let name = SampleStore::normalize_name(&name)?;
    let loaded = name.clone();
    let rows = blocking(move || Ok(ctx.samples.load(&loaded)?.len())).await?;
    Ok(Json(json!({ "dataset": name, "n_chunks": plan_chunk_count(rows) })))
}

async fn chunk_dataset(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
    Query(query): Query<ChunkQuery>,
) -> Result<Json<Value>> {
    let name = SampleStore::normalize_name(&name)?;
    let job_name = name.clone();
    let job_ctx = ctx.clone();

    let outcome = blocking(move || {
        let dataset = job_ctx.samples.load(&job_name)?;
        let count = query
            .n_chunks
            .unwrap_or_else(|| plan_chunk_count(dataset.len()));
        job_ctx.chunks.write_chunks(&dataset, count, &job_name, true)
    })
    .await?;

    let total = outcome.chunk_count();
    let status = match outcome {
        WriteOutcome::Written { .. } => "written",
        WriteOutcome::Skipped { .. } => "skipped",
    };
    let files: Vec<String> = (0..total).map(|i| chunk_filename(&name, i, total)).collect();

    Ok(Json(json!({
        "success": true,
        "dataset": name,
        "n_chunks": total,
        "status": status,
        "files": files,
    })))
}

async fn get_chunk(
    State(ctx): State<Arc<AppContext>>,
    Path((name, chunk)): Path<(String, usize)>,
    Query(query): Query<ChunkQuery>,
) -> Result<Response> {
    if chunk == 0 {
        return Err(Error::invalid("chunk numbers start at 1"));
    }
    let name = SampleStore::normalize_name(&name)?;

    let body = blocking(move || {
        let total = match query.n_chunks {
            Some(total) => total,
            None => {
                let rows = ctx.samples.load(&name)?.len();
                effective_chunk_count(rows, plan_chunk_count(rows))?
            }
        };
        ctx.chunks.read_chunk(&name, chunk - 1, total)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn send_chunks(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
    Json(request): Json<SendRequest>,
) -> Result<Json<Value>> {
    if request.url.trim().is_empty() {
        return Err(Error::invalid("missing target url"));
    }
    let name = SampleStore::normalize_name(&name)?;
    let loaded = name.clone();
    let job_ctx = ctx.clone();
    let dataset = blocking(move || job_ctx.samples.load(&loaded)).await?;

    let count = request
        .n_chunks
        .unwrap_or_else(|| plan_chunk_count(dataset.len()));
    let report = split_and_send(&ctx.http, &dataset, &request.url, count).await?;

    let results: Vec<Value> = report
        .deliveries
        .iter()
        .map(|delivery| match &delivery.outcome {
            Ok(body) => json!({ "index": delivery.index + 1, "ok": true, "response": body }),
            Err(e) => json!({ "index": delivery.index + 1, "ok": false, "error": e.to_string() }),
        })
        .collect();

    Ok(Json(json!({
        "success": report.all_ok(),
        "dataset": name,
        "n_chunks": report.len(),
        "succeeded": report.succeeded(),
        "failed": report.failed(),
        "results": results,
    })))
}

async fn upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(format!("malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::invalid("No selected file"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::invalid(format!("malformed upload: {e}")))?;

        let name = blocking(move || ctx.samples.store_upload(&filename, &bytes)).await?;
        info!("dataset `{}` uploaded", name);
        return Ok((
            StatusCode::CREATED,
            Json(json!({ "success": true, "dataset": name })),
        ));
    }

    Err(Error::invalid("No file part"))
}
