// Petclinic - Web Server
// REST API with Axum over the same edit workflow the terminal UI uses

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use petclinic::{
    edit, open_database, DatabaseLocation, Entity, Error, Owner, Pet, PetType, Specialty, Vet,
    VetSpecialty, Visit,
};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "petclinic-server", version, about = "Petclinic REST API")]
struct Args {
    /// SQLite database file, or :memory: for a seeded throwaway database
    #[arg(long, env = "PETCLINIC_DATABASE", default_value = "petclinic.db")]
    database: DatabaseLocation,

    /// Address to listen on
    #[arg(long, env = "PETCLINIC_BIND", default_value = "127.0.0.1:3000")]
    bind: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Library error rendered as a response
///
/// A validation failure carries the structured error in `data`.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, data) = match &self.0 {
            Error::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, serde_json::to_value(err).ok()),
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            Error::ReferentialIntegrity { .. } => (StatusCode::CONFLICT, None),
            Error::Database(err) => {
                tracing::error!(error = %err, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ApiResponse {
            success: false,
            data,
            error: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

/// Run `f` against the shared connection
fn with_db<T>(
    state: &AppState,
    f: impl FnOnce(&Connection) -> petclinic::Result<T>,
) -> std::result::Result<T, ApiError> {
    // a panic in another handler leaves the connection itself usable
    let conn = state.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(f(&conn)?)
}

fn not_found<E: Entity>(key: impl ToString) -> Error {
    Error::NotFound {
        entity: E::CAPTION,
        key: key.to_string(),
    }
}

/// Entities served over the API
trait Resource: Entity + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<E> Resource for E where E: Entity + Serialize + DeserializeOwned + Send + Sync + 'static {}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/{table} - All rows, or those matching `?search=`
async fn list<E: Resource>(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<E>> {
    let rows = with_db(&state, |conn| match query.search.as_deref() {
        Some(term) => edit::search::<E>(conn, term),
        None => edit::select_all::<E>(conn),
    })?;
    ok(rows)
}

/// GET /api/{table}/{key}
async fn fetch<E: Resource>(State(state): State<AppState>, Path(key): Path<E::Key>) -> ApiResult<E> {
    let row = with_db(&state, |conn| {
        edit::select_by_key::<E>(conn, key)?.ok_or_else(|| not_found::<E>(key))
    })?;
    ok(row)
}

/// POST /api/{table}
async fn create<E: Resource>(State(state): State<AppState>, Json(entity): Json<E>) -> ApiResult<E> {
    let row = with_db(&state, |conn| {
        let key = edit::insert(conn, &entity)?;
        edit::select_by_key::<E>(conn, key)?.ok_or_else(|| not_found::<E>(key))
    })?;

    tracing::info!(table = E::TABLE, "row created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(row))))
}

/// PUT /api/{table}/{key} - Replace the row stored under the path key
async fn replace<E: Resource>(
    State(state): State<AppState>,
    Path(original): Path<E::Key>,
    Json(entity): Json<E>,
) -> ApiResult<E> {
    let row = with_db(&state, |conn| {
        edit::update(conn, original, &entity)?;
        let key = entity.updated_key(original);
        edit::select_by_key::<E>(conn, key)?.ok_or_else(|| not_found::<E>(key))
    })?;
    ok(row)
}

/// DELETE /api/{table}/{key}
async fn remove<E: Resource>(State(state): State<AppState>, Path(key): Path<E::Key>) -> ApiResult<E::Key> {
    with_db(&state, |conn| edit::delete::<E>(conn, key))?;
    ok(key)
}

/// Detail rows of one master row; 404 if the master does not exist
fn details<M: Entity<Key = i64>, D: Resource>(
    state: &AppState,
    column: &str,
    id: i64,
) -> ApiResult<Vec<D>> {
    let rows = with_db(state, |conn| {
        edit::select_by_key::<M>(conn, id)?.ok_or_else(|| not_found::<M>(id))?;
        edit::select_details::<D>(conn, column, id)
    })?;
    ok(rows)
}

/// GET /api/owners/:id/pets
async fn owner_pets(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<Pet>> {
    details::<Owner, Pet>(&state, "owner_id", id)
}

/// GET /api/pets/:id/visits
async fn pet_visits(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<Visit>> {
    details::<Pet, Visit>(&state, "pet_id", id)
}

/// GET /api/vets/:id/specialties
async fn vet_specialties(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<VetSpecialty>> {
    details::<Vet, VetSpecialty>(&state, "vet", id)
}

// ============================================================================
// Router
// ============================================================================

/// Collection and single-row routes for a table keyed by id
fn resource<E: Resource + Entity<Key = i64>>(router: Router<AppState>, path: &str) -> Router<AppState> {
    router
        .route(path, get(list::<E>).post(create::<E>))
        .route(
            &format!("{}/:id", path),
            get(fetch::<E>).put(replace::<E>).delete(remove::<E>),
        )
}

fn app(conn: Connection) -> Router {
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let mut api_routes = Router::new().route("/health", get(health_check));
    api_routes = resource::<Owner>(api_routes, "/owners");
    api_routes = resource::<Pet>(api_routes, "/pets");
    api_routes = resource::<Visit>(api_routes, "/visits");
    api_routes = resource::<Vet>(api_routes, "/vets");
    api_routes = resource::<Specialty>(api_routes, "/specialties");
    api_routes = resource::<PetType>(api_routes, "/pet-types");

    let api_routes = api_routes
        .route(
            "/vet-specialties",
            get(list::<VetSpecialty>).post(create::<VetSpecialty>),
        )
        .route(
            "/vet-specialties/:vet/:specialty",
            get(fetch::<VetSpecialty>)
                .put(replace::<VetSpecialty>)
                .delete(remove::<VetSpecialty>),
        )
        .route("/owners/:id/pets", get(owner_pets))
        .route("/pets/:id/visits", get(pet_visits))
        .route("/vets/:id/specialties", get(vet_specialties))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    petclinic::init_logging();
    let args = Args::parse();

    println!("🌐 Petclinic - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database))?;
    println!("✓ Database opened: {}", args.database);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", args.bind))?;

    println!("\n🚀 Server running on http://{}", args.bind);
    println!("   API: http://{}/api/vet-specialties", args.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(conn))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
