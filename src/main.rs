//! Quote Ingest - Sales-quote authoring server with heuristic spreadsheet import.

mod builder;
mod classify;
mod coerce;
mod columns;
mod ingest;
mod model;
mod scan;
mod store;
mod template;
mod workbook;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use ingest::{parse_clipboard_paste, parse_workbook, ParseOptions};
use model::{backfill_totals, ColumnVisibility, ParsedResult, Quote};
use store::QuoteStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    quotes: QuoteStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quote_ingest=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState {
        quotes: QuoteStore::new(),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/quotes", post(create_quote).get(list_quotes))
        .route(
            "/quotes/:id",
            get(get_quote).put(update_quote).delete(delete_quote),
        )
        .route("/quotes/:id/import", post(import_workbook))
        .route("/quotes/:id/paste", post(paste_rows))
        .route("/quotes/:id/export", get(export_quote))
        .route("/template", get(download_template))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = std::env::var("QUOTE_INGEST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn create_quote(State(state): State<AppState>) -> Json<Quote> {
    Json(state.quotes.create())
}

async fn list_quotes(State(state): State<AppState>) -> Json<Vec<Quote>> {
    Json(state.quotes.list())
}

async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Quote>, StatusCode> {
    state.quotes.get(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut quote): Json<Quote>,
) -> Result<Json<Quote>, StatusCode> {
    quote.recalculate();
    state
        .quotes
        .update(&id, quote)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn delete_quote(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.quotes.delete(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(serde::Deserialize)]
struct ImportQuery {
    #[serde(default = "default_true")]
    validate: bool,
    #[serde(default = "default_true")]
    partial: bool,
}

fn default_true() -> bool {
    true
}

#[derive(serde::Serialize)]
struct ImportResponse {
    quote: Quote,
    result: ParsedResult,
}

/// Upload a spreadsheet and merge the recovered content into a quote.
async fn import_workbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, (StatusCode, String)> {
    if state.quotes.get(&id).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("Unknown quote: {}", id)));
    }

    // Read the uploaded file
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("workbook").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e)))?
                .to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let sheets = workbook::decode_file(&filename, &file_data).map_err(|e| {
        error!("Workbook decode failed: {}", e);
        (StatusCode::UNPROCESSABLE_ENTITY, format!("{}", e))
    })?;

    let options = ParseOptions {
        validate_data: query.validate,
        allow_partial_data: query.partial,
    };
    let result = parse_workbook(&sheets, options);

    if !result.is_usable() {
        info!("Import of {} recovered nothing usable", filename);
    }

    let quote = state
        .quotes
        .modify(&id, |quote| result.merge_into(quote))
        .ok_or((StatusCode::NOT_FOUND, format!("Unknown quote: {}", id)))?;

    info!(
        "Import into {}: {} group(s), {} cost line(s), {} warning(s), {} error(s)",
        id,
        result.bom_groups.len(),
        result.cost_items.len(),
        result.warnings.len(),
        result.errors.len()
    );

    Ok(Json(ImportResponse { quote, result }))
}

#[derive(serde::Deserialize)]
struct PasteRequest {
    text: String,
    /// Target group; defaults to the quote's first group.
    group_id: Option<String>,
}

#[derive(serde::Serialize)]
struct PasteResponse {
    quote: Quote,
    items_added: usize,
    warnings: Vec<String>,
}

/// Parse tab-separated rows pasted into a BOM grid and append them to a group.
///
/// The target group is resolved under the store's write lock: a group list
/// fetched before the lock can shrink in the meantime (concurrent PUT or
/// import), so a pre-resolved index is not trustworthy.
async fn paste_rows(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PasteRequest>,
) -> Result<Json<PasteResponse>, (StatusCode, String)> {
    let result = state
        .quotes
        .try_modify(&id, |quote| {
            let group_index = match &request.group_id {
                Some(gid) => quote
                    .groups
                    .iter()
                    .position(|g| &g.id == gid)
                    .ok_or((StatusCode::NOT_FOUND, format!("Unknown group: {}", gid)))?,
                None => {
                    if quote.groups.is_empty() {
                        return Err((StatusCode::BAD_REQUEST, "Quote has no groups".to_string()));
                    }
                    0
                }
            };

            let existing = quote.groups[group_index].items.len();
            let outcome = parse_clipboard_paste(&request.text, existing, quote.visibility);

            let items_added = outcome.items.len();
            quote.groups[group_index].items.extend(outcome.items);
            quote.groups[group_index].renumber();
            if outcome.visibility != quote.visibility {
                quote.visibility = outcome.visibility;
                backfill_totals(&mut quote.groups, &outcome.visibility);
            }
            Ok((items_added, outcome.warnings))
        })
        .ok_or((StatusCode::NOT_FOUND, format!("Unknown quote: {}", id)))?;

    let ((items_added, warnings), quote) = result?;

    Ok(Json(PasteResponse {
        quote,
        items_added,
        warnings,
    }))
}

#[derive(serde::Deserialize)]
struct TemplateQuery {
    #[serde(default)]
    prices: bool,
    /// Which seed sheet to download: "bom" (default), "info" or "costs".
    sheet: Option<String>,
}

/// Download a seed template sheet as CSV.
async fn download_template(
    Query(query): Query<TemplateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let visibility = if query.prices {
        ColumnVisibility::default().with_prices()
    } else {
        ColumnVisibility::default()
    };
    let sheet = query.sheet.as_deref().unwrap_or("bom");
    let (grid, filename) = match sheet {
        "bom" => (template::bom_template_grid(&visibility), "bom-template.csv"),
        "info" => (template::quote_info_template_grid(), "quote-info-template.csv"),
        "costs" => (template::cost_template_grid(), "cost-template.csv"),
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown template sheet: {}. Expected bom, info or costs", other),
            ));
        }
    };
    csv_attachment(&grid, filename)
}

/// Export a quote's BOM groups as CSV in the same shape as the template.
async fn export_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quote = state
        .quotes
        .get(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("Unknown quote: {}", id)))?;

    let grid = template::bom_export_grid(&quote.groups, &quote.visibility);
    csv_attachment(&grid, "quote-bom.csv")
}

fn csv_attachment(
    grid: &ingest::Grid,
    filename: &str,
) -> Result<([(header::HeaderName, String); 2], String), (StatusCode, String)> {
    let csv = template::grid_to_csv(grid)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", e)))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    ))
}
