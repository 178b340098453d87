use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pdf: PdfConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许携带凭证跨域访问的前端来源, 为空则不放行任何跨域请求
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// JWT 与账号相关配置
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// 令牌有效期 (秒), 同时作为 cookie 的 Max-Age
    pub token_ttl_secs: i64,
    pub cookie_name: String,
    /// 管理员重置密码后的默认密码
    pub reset_password: String,
}

// 不把密钥打进日志
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

/// PDF 字体配置: 目录下需要 `<family>-Regular.ttf` / `-Bold.ttf` / `-Italic.ttf` / `-BoldItalic.ttf`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    pub font_dir: String,
    pub font_family: String,
}

/// 门店信息, 用于 PDF 页眉页脚
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    pub slogan: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "COLCHONES D'ENCANTO".to_string(),
            slogan: "Tu descanso, nuestro compromiso".to_string(),
            phone: "(01) 234-5678".to_string(),
            email: "ventas@dencanto.pe".to_string(),
            address: "Av. Principal 123, Lima".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                allowed_origins: vec![
                    "http://localhost:8080".to_string(),
                    "http://127.0.0.1:8080".to_string(),
                ],
            },
            database: DatabaseConfig {
                url: "postgres://localhost/dencanto".to_string(),
                max_connections: 20,
                acquire_timeout_secs: 10,
            },
            auth: AuthConfig {
                jwt_secret: "dencanto-dev-secret-change-me".to_string(),
                token_ttl_secs: 86_400,
                cookie_name: "jwt_token".to_string(),
                reset_password: "123456".to_string(),
            },
            pdf: PdfConfig {
                font_dir: "fonts".to_string(),
                font_family: "LiberationSans".to_string(),
            },
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> 配置文件(可选) -> 环境变量
    ///
    /// 配置文件路径取 `DENCANTO_CONFIG`, 默认 `config/dencanto`(扩展名由 config 自动识别)。
    /// 环境变量形如 `DENCANTO__AUTH__JWT_SECRET`, 另外兼容 `DATABASE_URL` / `SERVER_HOST` /
    /// `SERVER_PORT` / `JWT_SECRET`。
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("DENCANTO_CONFIG").unwrap_or_else(|_| "config/dencanto".to_string());

        Self::defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("DENCANTO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins"),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
    }

    /// 以 `Default` 为基础的 builder
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let d = Self::default();
        Config::builder()
            .set_default("server.host", d.server.host)?
            .set_default("server.port", d.server.port as i64)?
            .set_default("server.allowed_origins", d.server.allowed_origins)?
            .set_default("database.url", d.database.url)?
            .set_default("database.max_connections", d.database.max_connections as i64)?
            .set_default("database.acquire_timeout_secs", d.database.acquire_timeout_secs as i64)?
            .set_default("auth.jwt_secret", d.auth.jwt_secret)?
            .set_default("auth.token_ttl_secs", d.auth.token_ttl_secs)?
            .set_default("auth.cookie_name", d.auth.cookie_name)?
            .set_default("auth.reset_password", d.auth.reset_password)?
            .set_default("pdf.font_dir", d.pdf.font_dir)?
            .set_default("pdf.font_family", d.pdf.font_family)?
            .set_default("store.name", d.store.name)?
            .set_default("store.slogan", d.store.slogan)?
            .set_default("store.phone", d.store.phone)?
            .set_default("store.email", d.store.email)?
            .set_default("store.address", d.store.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_to_default_struct() {
        let cfg: AppConfig = AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn overrides_replace_single_keys() {
        let cfg: AppConfig = AppConfig::defaults()
            .unwrap()
            .set_override("server.port", 9090)
            .unwrap()
            .set_override("auth.token_ttl_secs", 60)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.auth.token_ttl_secs, 60);
        assert_eq!(cfg.auth.cookie_name, "jwt_token");
    }

    #[test]
    fn allowed_origins_can_be_replaced() {
        let cfg: AppConfig = AppConfig::defaults()
            .unwrap()
            .set_override("server.allowed_origins", vec!["https://dencanto.pe"])
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.server.allowed_origins, vec!["https://dencanto.pe".to_string()]);
    }

    #[test]
    fn debug_hides_jwt_secret() {
        let cfg = AppConfig::default();
        let dbg = format!("{:?}", cfg.auth);
        assert!(!dbg.contains(&cfg.auth.jwt_secret));
    }
}
