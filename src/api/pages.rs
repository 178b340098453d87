//! 内网页面 (最简 HTML 外壳, 数据由前端调用 `/intranet/api/*` 获取)

use super::AppState;
use crate::auth::{require_admin, CurrentUser};
use axum::response::Html;
use axum::routing::get;
use axum::{middleware, Router};

pub fn routes() -> Router<AppState> {
    let staff = Router::new()
        .route("/intranet/dashboard", get(dashboard))
        .route("/intranet/productos", get(products))
        .route("/intranet/ventas", get(sales))
        .route("/intranet/historialVentas", get(sales_history))
        .route("/intranet/cotizaciones", get(quotations));

    let admin = Router::new()
        .route("/intranet/reportes", get(reports))
        .route("/intranet/usuarios", get(users))
        .route_layer(middleware::from_fn(require_admin));

    staff.merge(admin)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn shell(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head><meta charset=\"utf-8\"><title>{title} | D'Encanto</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    ))
}

fn page(title: &str, user: &CurrentUser) -> Html<String> {
    let body = format!(
        "<header><h1>{}</h1><p>Usuario: {} ({})</p><form method=\"post\" action=\"/auth/logout\"><button>Cerrar sesión</button></form></header>\n<main id=\"app\" data-page=\"{}\"></main>",
        escape(title),
        escape(user.0.display_name()),
        escape(&user.0.role),
        escape(&title.to_lowercase()),
    );
    shell(title, &body)
}

pub async fn login() -> Html<String> {
    shell(
        "Iniciar sesión",
        "<h1>Intranet D'Encanto</h1>\n<form id=\"login\" data-action=\"/auth/login\">\n<input name=\"username\" placeholder=\"Usuario\">\n<input name=\"password\" type=\"password\" placeholder=\"Contraseña\">\n<button type=\"submit\">Ingresar</button>\n</form>",
    )
}

pub async fn dashboard(user: CurrentUser) -> Html<String> {
    page("Dashboard", &user)
}

pub async fn products(user: CurrentUser) -> Html<String> {
    page("Productos", &user)
}

pub async fn sales(user: CurrentUser) -> Html<String> {
    page("Ventas", &user)
}

pub async fn sales_history(user: CurrentUser) -> Html<String> {
    page("Historial de Ventas", &user)
}

pub async fn quotations(user: CurrentUser) -> Html<String> {
    page("Cotizaciones", &user)
}

pub async fn reports(user: CurrentUser) -> Html<String> {
    page("Reportes", &user)
}

pub async fn users(user: CurrentUser) -> Html<String> {
    page("Usuarios", &user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{User, SELLER_ROLE};

    #[test]
    fn page_names_user_and_escapes_markup() {
        let user = CurrentUser(User {
            id: 3,
            username: "ana".into(),
            password_hash: String::new(),
            full_name: Some("Ana <b>Ruiz</b>".into()),
            email: None,
            phone: None,
            role_id: 2,
            role: SELLER_ROLE.into(),
        });
        let Html(html) = page("Ventas", &user);
        assert!(html.contains("<h1>Ventas</h1>"));
        assert!(html.contains("Ana &lt;b&gt;Ruiz&lt;/b&gt; (VENDEDOR)"));
        assert!(html.contains("data-page=\"ventas\""));
    }
}
