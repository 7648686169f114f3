use std::collections::{BTreeMap, HashSet};
use std::env;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::middleware::{Next, from_fn};
use axum::response::Response;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use url::Url;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

mod youtube;
use youtube::{YouTube, YouTubeError};

const MAX_RESULTS: usize = 10;
const MOVIE_MARKERS: [&str; 3] = ["movie", "film", "full"];
const THUMBNAIL_PREFERENCE: [&str; 3] = ["high", "medium", "default"];

#[derive(Clone)]
struct AppState {
    youtube: Arc<YouTube>,
    api_key: String,
    started: Instant,
}

impl AppState {
    fn new(api_key: String) -> Result<Self, reqwest::Error> {
        Ok(Self {
            youtube: Arc::new(YouTube::new(api_key.clone())?),
            api_key,
            started: Instant::now(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
struct SearchParams {
    name: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
struct Movie {
    title: String,
    url: String,
    thumbnail: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct MovieListResponse {
    movies: Vec<Movie>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct AllMoviesResponse {
    all_movies: BTreeMap<String, Vec<Movie>>,
}

#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    message: String,
    uptime: String,
    youtube_api: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct HealthErrorResponse {
    status: String,
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
}

/// Movies collected for one request, with a marker for a quota signal
/// that cut the term fan-out short.
struct SearchBatch {
    movies: Vec<Movie>,
    quota_exhausted: bool,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "movieflix",
        version = "0.1.0"
    ),
    paths(search_movie, popular_movies, list_all, health),
    components(schemas(
        SearchParams,
        Movie,
        MovieListResponse,
        AllMoviesResponse,
        HealthResponse,
        HealthErrorResponse,
        ErrorResponse
    )),
    tags(
        (name = "movieflix", description = "Movie search endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(filter)
        .init();

    let api_key = match env::var("YOUTUBE_API_KEY") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            eprintln!("YOUTUBE_API_KEY is required but was not set.");
            std::process::exit(1);
        }
    };

    let state = AppState::new(api_key).unwrap();

    let api_router = Router::new()
        .route("/search_movie", get(search_movie))
        .route("/popular_movies", get(popular_movies))
        .route("/list_all", get(list_all))
        .route("/health", get(health).head(health))
        .with_state(state);

    let app = Router::new()
        .merge(SwaggerUi::new("/").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(from_fn(request_logging_middleware));

    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    println!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[utoipa::path(
    get,
    path = "/search_movie",
    params(
        ("name" = Option<String>, Query, description = "Movie name to search for"),
        ("category" = Option<String>, Query, description = "Genre category to expand into keyword searches")
    ),
    responses(
        (status = 200, description = "Matching movies", body = MovieListResponse),
        (status = 400, description = "Unrecognized category", body = ErrorResponse),
        (status = 502, description = "Upstream search failed", body = ErrorResponse)
    ),
    tag = "movieflix"
)]
async fn search_movie(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<MovieListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let name = normalized(params.name.as_deref());
    let raw_category = normalized(params.category.as_deref());
    let category = match raw_category {
        Some(raw) => Some(
            Category::parse(raw).ok_or_else(|| bad_request(format!("unknown category: {raw}")))?,
        ),
        None => None,
    };

    tracing::info!(
        name = name.unwrap_or(""),
        category = raw_category.unwrap_or(""),
        "search request"
    );

    let terms = build_search_terms(name, category);
    let mut seen = HashSet::new();
    let batch = collect_movies(&state.youtube, &terms, &mut seen)
        .await
        .map_err(upstream_error)?;

    let count = batch.movies.len();
    let message = if batch.movies.is_empty() {
        Some("No movies found matching your criteria".to_string())
    } else {
        None
    };
    Ok(Json(MovieListResponse {
        movies: batch.movies,
        count,
        message,
    }))
}

#[utoipa::path(
    get,
    path = "/popular_movies",
    responses(
        (status = 200, description = "Popular movies for the default search", body = MovieListResponse),
        (status = 502, description = "Upstream search failed", body = ErrorResponse)
    ),
    tag = "movieflix"
)]
async fn popular_movies(
    State(state): State<AppState>,
) -> Result<Json<MovieListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let terms = build_search_terms(None, None);
    let mut seen = HashSet::new();
    let batch = collect_movies(&state.youtube, &terms, &mut seen)
        .await
        .map_err(upstream_error)?;

    let count = batch.movies.len();
    Ok(Json(MovieListResponse {
        movies: batch.movies,
        count,
        message: None,
    }))
}

#[utoipa::path(
    get,
    path = "/list_all",
    responses(
        (status = 200, description = "Movies grouped per category", body = AllMoviesResponse),
        (status = 502, description = "Upstream search failed", body = ErrorResponse)
    ),
    tag = "movieflix"
)]
async fn list_all(
    State(state): State<AppState>,
) -> Result<Json<AllMoviesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut all_movies = BTreeMap::new();
    let mut seen = HashSet::new();
    for category in Category::ALL {
        let terms = build_search_terms(None, Some(category));
        let batch = collect_movies(&state.youtube, &terms, &mut seen)
            .await
            .map_err(upstream_error)?;
        let quota_exhausted = batch.quota_exhausted;
        all_movies.insert(category.as_str().to_string(), batch.movies);
        if quota_exhausted {
            tracing::warn!(
                category = category.as_str(),
                "quota exhausted, returning partial category listing"
            );
            break;
        }
    }
    Ok(Json(AllMoviesResponse { all_movies }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
        (status = 500, description = "Client construction failed", body = HealthErrorResponse)
    ),
    tag = "movieflix"
)]
async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthErrorResponse>)> {
    if let Err(err) = YouTube::new(state.api_key.clone()) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthErrorResponse {
                status: "ERROR".to_string(),
                message: err.to_string(),
            }),
        ));
    }

    Ok(Json(HealthResponse {
        status: "OK".to_string(),
        message: "Server is running".to_string(),
        uptime: format!("{:.2} seconds", state.started.elapsed().as_secs_f64()),
        youtube_api: "Connected".to_string(),
    }))
}

async fn request_logging_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path();
    if path == "/health" {
        return next.run(req).await;
    }

    let start = std::time::Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis(),
        "request"
    );
    response
}

fn normalized(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn bad_request(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

fn upstream_error(err: YouTubeError) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %err, "youtube search failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: "search request to youtube failed".to_string(),
        }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Comedy,
    Action,
    Animation,
    Cartoon,
    SciFi,
    Fantasy,
    History,
}

impl Category {
    const ALL: [Category; 7] = [
        Category::Comedy,
        Category::Action,
        Category::Animation,
        Category::Cartoon,
        Category::SciFi,
        Category::Fantasy,
        Category::History,
    ];

    fn parse(value: &str) -> Option<Category> {
        match value {
            "comedy" => Some(Category::Comedy),
            "action" => Some(Category::Action),
            "animation" => Some(Category::Animation),
            "cartoon" => Some(Category::Cartoon),
            "sci-fi" => Some(Category::SciFi),
            "fantasy" => Some(Category::Fantasy),
            "history" => Some(Category::History),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Category::Comedy => "comedy",
            Category::Action => "action",
            Category::Animation => "animation",
            Category::Cartoon => "cartoon",
            Category::SciFi => "sci-fi",
            Category::Fantasy => "fantasy",
            Category::History => "history",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::Comedy => &["comedy movie", "funny movie", "comedy film", "humorous movie"],
            Category::Action => &[
                "action movie",
                "action film",
                "adventure movie",
                "thriller movie",
            ],
            Category::Animation => &["animated movie", "animation film", "animated feature"],
            Category::Cartoon => &["cartoon movie", "animated film", "family movie"],
            Category::SciFi => &["science fiction movie", "sci-fi film", "sci fi movie"],
            Category::Fantasy => &["fantasy movie", "fantasy film", "magical movie"],
            Category::History => &["historical movie", "history film", "biography movie"],
        }
    }
}

fn build_search_terms(name: Option<&str>, category: Option<Category>) -> Vec<String> {
    let mut terms = Vec::new();
    if let Some(name) = name {
        terms.push(format!("{name} full movie"));
    }
    if let Some(category) = category {
        terms.extend(category.keywords().iter().map(|keyword| keyword.to_string()));
    }
    if terms.is_empty() {
        terms.push("full movie".to_string());
    }
    terms
}

async fn collect_movies(
    youtube: &YouTube,
    terms: &[String],
    seen: &mut HashSet<String>,
) -> Result<SearchBatch, YouTubeError> {
    let mut movies = Vec::new();
    let mut quota_exhausted = false;
    for term in terms {
        if movies.len() >= MAX_RESULTS {
            break;
        }
        let items = match youtube.search(term).await {
            Ok(items) => items,
            Err(YouTubeError::Quota) => {
                tracing::warn!(term = %term, "quota exhausted or rate limited, halting search");
                quota_exhausted = true;
                break;
            }
            Err(err) => return Err(err),
        };
        accumulate_movies(&items, seen, &mut movies);
    }
    Ok(SearchBatch {
        movies,
        quota_exhausted,
    })
}

fn accumulate_movies(items: &[Value], seen: &mut HashSet<String>, movies: &mut Vec<Movie>) {
    for item in items {
        if movies.len() >= MAX_RESULTS {
            return;
        }
        let Some(video_id) = extract_video_id(item) else {
            continue;
        };
        if seen.contains(video_id) {
            continue;
        }
        let Some(title) = extract_title(item) else {
            continue;
        };
        if !looks_like_movie(title) {
            continue;
        }
        seen.insert(video_id.to_string());
        movies.push(Movie {
            title: title.to_string(),
            url: watch_url(video_id),
            thumbnail: best_thumbnail(item),
        });
    }
}

fn extract_video_id(item: &Value) -> Option<&str> {
    item.get("id")
        .and_then(|id| id.get("videoId"))
        .and_then(|id| id.as_str())
}

fn extract_title(item: &Value) -> Option<&str> {
    item.get("snippet")
        .and_then(|snippet| snippet.get("title"))
        .and_then(|title| title.as_str())
}

fn looks_like_movie(title: &str) -> bool {
    let title = title.to_lowercase();
    MOVIE_MARKERS.iter().any(|marker| title.contains(marker))
}

fn best_thumbnail(item: &Value) -> Option<String> {
    let thumbnails = item
        .get("snippet")
        .and_then(|snippet| snippet.get("thumbnails"))?;
    THUMBNAIL_PREFERENCE.iter().find_map(|size| {
        thumbnails
            .get(size)
            .and_then(|thumbnail| thumbnail.get("url"))
            .and_then(|url| url.as_str())
            .map(str::to_string)
    })
}

fn watch_url(video_id: &str) -> String {
    let mut url = Url::parse("https://www.youtube.com/watch").unwrap();
    url.query_pairs_mut().append_pair("v", video_id);
    url.into()
}
