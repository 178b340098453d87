//! HTTP 路由

pub mod auth;
pub mod dashboard;
pub mod pages;
pub mod products;
pub mod public;
pub mod quotations;
pub mod reports;
pub mod sales;
pub mod users;

use crate::auth::{require_admin, require_auth, require_page_auth, require_staff, JwtManager};
use crate::config::AppConfig;
use crate::pdf::PdfRenderer;
use crate::service::{
    DashboardService, ProductService, QuotationService, ReportService, SaleService, UserService,
};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// 共享状态: 连接池, 配置, 各业务服务
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtManager>,
    pub sales: Arc<SaleService>,
    pub products: Arc<ProductService>,
    pub quotations: Arc<QuotationService>,
    pub users: Arc<UserService>,
    pub dashboard: Arc<DashboardService>,
    pub reports: Arc<ReportService>,
    pub pdf: Arc<PdfRenderer>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            jwt: Arc::new(JwtManager::new(
                config.auth.jwt_secret.clone(),
                config.auth.token_ttl_secs,
            )),
            sales: Arc::new(SaleService::new(pool.clone())),
            products: Arc::new(ProductService::new(pool.clone())),
            quotations: Arc::new(QuotationService::new(pool.clone())),
            users: Arc::new(UserService::new(pool.clone(), config.auth.reset_password.clone())),
            dashboard: Arc::new(DashboardService::new(pool.clone())),
            reports: Arc::new(ReportService::new(pool.clone())),
            pdf: Arc::new(PdfRenderer::new(&config.pdf, &config.store)),
            config: Arc::new(config),
            pool,
        }
    }
}

/// 健康检查
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `application/pdf` 附件
pub(crate) fn pdf_attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    (
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (axum::http::header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

/// genpdf 是同步渲染, 放到阻塞线程池
pub(crate) async fn render_pdf<F>(state: &AppState, render: F) -> Result<Vec<u8>, crate::error::AppError>
where
    F: FnOnce(&PdfRenderer) -> Result<Vec<u8>, crate::error::AppError> + Send + 'static,
{
    let renderer = state.pdf.clone();
    tokio::task::spawn_blocking(move || render(&renderer))
        .await
        .map_err(|e| crate::error::AppError::Internal(format!("pdf task failed: {}", e)))?
}

/// 只放行配置中的来源; 无法解析的来源记录后跳过
fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers([axum::http::header::CONTENT_DISPOSITION])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// 组装全部路由
pub fn build_router(state: AppState) -> Router {
    // 管理员与销售员
    let staff_api = Router::new()
        .nest("/ventas", sales::routes())
        .nest("/cotizaciones", quotations::routes())
        .nest("/productos", products::routes())
        .nest("/dashboard", dashboard::routes())
        .route_layer(middleware::from_fn(require_staff));

    // 仅管理员
    let admin_api = Router::new()
        .nest("/usuarios", users::routes())
        .nest("/reportes", reports::routes())
        .route_layer(middleware::from_fn(require_admin));

    let protected_api = Router::new()
        .nest("/intranet/api", staff_api.merge(admin_api))
        .route("/auth/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let protected_pages = pages::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_page_auth));

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/intranet/login", get(pages::login))
        .nest("/api", public::routes())
        .route("/carrito/api/enviar-cotizacion", post(public::submit_quotation));

    let cors_layer = cors(&state.config.server.allowed_origins);

    Router::new()
        .merge(public)
        .merge(protected_api)
        .merge(protected_pages)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

async fn not_found() -> crate::error::AppError {
    crate::error::AppError::NotFound("Recurso no encontrado".to_string())
}
