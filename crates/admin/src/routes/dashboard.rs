//! Dashboard route handler.

use askama::Template;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tower_sessions::Session;
use tracing::{instrument, warn};

use shopfloor_core::Category;

use crate::{
    error::AppError,
    filters,
    middleware::{RequireAdminAuth, take_flash},
    models::{CurrentAdmin, Flash},
    routes::products::ProductView,
    services::UploadForm,
    state::AppState,
};

/// Upload form values echoed back into the page.
#[derive(Debug, Clone, Default)]
pub struct UploadFormView {
    pub name: String,
    pub price: String,
    pub category: String,
}

impl From<&UploadForm> for UploadFormView {
    fn from(form: &UploadForm) -> Self {
        Self {
            name: form.name.clone(),
            price: form.price.clone(),
            category: form.category.clone(),
        }
    }
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_email: String,
    pub current_path: String,
    pub flash: Option<Flash>,
    pub form: UploadFormView,
    pub form_error: Option<String>,
    pub categories: Vec<&'static str>,
    pub products: Vec<ProductView>,
    pub list_error: Option<String>,
}

impl DashboardTemplate {
    /// Load the current product list and assemble the page.
    pub async fn load(
        state: &AppState,
        admin: &CurrentAdmin,
        flash: Option<Flash>,
        form: UploadFormView,
        form_error: Option<String>,
    ) -> Self {
        let (products, list_error) = match state.catalog(&admin.auth).list().await {
            Ok(products) => (products.iter().map(ProductView::from).collect(), None),
            Err(e) => {
                warn!(error = %e, "Failed to load products for dashboard");
                (Vec::new(), Some(e.user_message().to_string()))
            }
        };

        Self {
            admin_email: admin.email.to_string(),
            current_path: "/".to_string(),
            flash,
            form,
            form_error,
            categories: Category::SUGGESTED.to_vec(),
            products,
            list_error,
        }
    }

    /// Render with the given status.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        let body = self.render().unwrap_or_else(|e| {
            tracing::error!("Template render error: {}", e);
            "Internal Server Error".to_string()
        });
        (status, Html(body)).into_response()
    }
}

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

/// Dashboard page handler.
///
/// GET /
#[instrument(skip_all)]
async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireAdminAuth(admin): RequireAdminAuth,
) -> Result<Response, AppError> {
    let flash = take_flash(&session).await?;
    let page =
        DashboardTemplate::load(&state, &admin, flash, UploadFormView::default(), None).await;
    Ok(page.into_response_with(StatusCode::OK))
}
