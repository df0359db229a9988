//! Product route handlers: upload, live list, delete.

use std::convert::Infallible;

use askama::Template;
use axum::{
    Router,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::{
        Html, IntoResponse, Redirect, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use shopfloor_core::{Product, ProductId};

use crate::{
    error::AppError,
    filters,
    ingest::ImageFile,
    middleware::{RequireAdminAuth, set_flash},
    models::Flash,
    routes::dashboard::{DashboardTemplate, UploadFormView},
    services::{ListError, Page, UploadForm},
    state::AppState,
};

/// SSE event name carrying a list error.
const LIST_ERROR_EVENT: &str = "list-error";

/// Product view for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: String,
    pub image_src: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.to_string(),
            category: product.category.to_string(),
            price: product.price.display(),
            image_src: product.image_base64.clone(),
        }
    }
}

/// Product list fragment (also included by the dashboard).
#[derive(Template)]
#[template(path = "products/list.html")]
struct ProductListTemplate {
    products: Vec<ProductView>,
    list_error: Option<String>,
}

impl ProductListTemplate {
    fn from_result(result: Result<Vec<Product>, ListError>) -> Self {
        match result {
            Ok(products) => Self {
                products: products.iter().map(ProductView::from).collect(),
                list_error: None,
            },
            Err(e) => {
                warn!(error = %e, "Failed to load products");
                Self {
                    products: Vec::new(),
                    list_error: Some(e.user_message().to_string()),
                }
            }
        }
    }

    fn render_or_log(&self) -> String {
        self.render().unwrap_or_else(|e| {
            tracing::error!("Template render error: {}", e);
            "Internal Server Error".to_string()
        })
    }
}

/// Delete confirmation page.
#[derive(Template)]
#[template(path = "products/confirm_delete.html")]
struct ConfirmDeleteTemplate {
    admin_email: String,
    current_path: String,
    product: ProductView,
}

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", post(upload))
        .route("/products/list", get(list_fragment))
        .route("/products/stream", get(stream))
        .route("/products/{id}/delete", get(confirm_delete).post(delete))
}

fn bad_multipart(err: &MultipartError) -> Response {
    warn!(error = %err, "Rejected upload body");
    (err.status(), err.body_text()).into_response()
}

/// Collect the upload form from a multipart body.
///
/// A file input left empty arrives as a part with no file name and no
/// bytes; it counts as no image.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "name" => form.name = field.text().await?,
            "price" => form.price = field.text().await?,
            "category" => form.category = field.text().await?,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let media_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                if !file_name.is_empty() || !bytes.is_empty() {
                    form.image = Some(ImageFile {
                        file_name,
                        media_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Upload a product.
///
/// POST /products
#[instrument(skip_all)]
async fn upload(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(e) => return Ok(bad_multipart(&e)),
    };
    let echoed = UploadFormView::from(&form);

    match state.uploads(&admin.auth).upload(form).await {
        Ok(outcome) => {
            info!(product_id = %outcome.id, encoded_len = outcome.encoded_len, "Product uploaded");
            let mut flash = Flash::success("Product uploaded successfully!");
            if let Some(warning) = outcome.warnings.first() {
                flash = flash.with_detail(warning.message());
            }
            set_flash(&session, flash).await?;
            Ok(Redirect::to(Page::Dashboard.path()).into_response())
        }
        Err(err) => {
            warn!(error = %err, "Product upload failed");
            let status = if err.is_local() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::BAD_GATEWAY
            };
            let page =
                DashboardTemplate::load(&state, &admin, None, echoed, Some(err.user_message()))
                    .await;
            Ok(page.into_response_with(status))
        }
    }
}

/// Current product list as an HTML fragment.
///
/// GET /products/list
#[instrument(skip_all)]
async fn list_fragment(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Html<String> {
    let result = state.catalog(&admin.auth).list().await;
    Html(ProductListTemplate::from_result(result).render_or_log())
}

/// Live product list: one rendered fragment per snapshot.
///
/// The stream ends after reporting an error.
///
/// GET /products/stream
async fn stream(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let products = state.catalog(&admin.auth).subscribe();

    let events = products.map(|snapshot| {
        let event = match snapshot {
            Ok(products) => {
                let html = ProductListTemplate::from_result(Ok(products)).render_or_log();
                // SSE data lines cannot carry carriage returns
                Event::default().data(html.replace('\r', ""))
            }
            Err(e) => {
                warn!(error = %e, "Product subscription failed");
                Event::default()
                    .event(LIST_ERROR_EVENT)
                    .data(ListError::Backend(e).user_message())
            }
        };
        Ok::<_, Infallible>(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn parse_product_id(id: &str) -> Result<ProductId, AppError> {
    ProductId::parse(id).map_err(|_| AppError::NotFound(format!("product {id}")))
}

/// Ask before deleting a product.
///
/// GET /products/{id}/delete
#[instrument(skip(state, admin))]
async fn confirm_delete(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .catalog(&admin.auth)
        .find(&product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let template = ConfirmDeleteTemplate {
        admin_email: admin.email.to_string(),
        current_path: "/".to_string(),
        product: ProductView::from(&product),
    };
    Ok(Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
    .into_response())
}

/// Delete a product.
///
/// POST /products/{id}/delete
#[instrument(skip(state, session, admin))]
async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let product_id = parse_product_id(&id)?;

    let flash = match state.catalog(&admin.auth).delete(&product_id).await {
        Ok(()) => Flash::success("Product deleted successfully!"),
        Err(err) => {
            warn!(error = %err, "Product delete failed");
            Flash::error(err.user_message())
        }
    };
    set_flash(&session, flash).await?;

    Ok(Redirect::to(Page::Dashboard.path()).into_response())
}
