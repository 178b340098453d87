use dencanto_backend::{build_router, create_pool, run_migrations, AppConfig, AppState};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式, 级别由 RUST_LOG 控制
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    run_migrations(&pool).await?;
    info!("Migrations applied");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(pool, config);

    if let Err(e) = state.users.ensure_admin().await {
        warn!(error = %e, "could not bootstrap admin user");
    }

    let app = build_router(state);

    // 启动服务器
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /auth/login                 - login (JWT + cookie)");
    info!("  *    /intranet/api/ventas         - sales");
    info!("  *    /intranet/api/cotizaciones   - quotations");
    info!("  *    /intranet/api/productos      - products");
    info!("  *    /intranet/api/usuarios       - users (ADMIN)");
    info!("  GET  /intranet/api/dashboard/estadisticas");
    info!("  GET  /intranet/api/reportes/*     - reports (ADMIN)");
    info!("  *    /api/carrito, /api/util, /api/imagen - public helpers");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
