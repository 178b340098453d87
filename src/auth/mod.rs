//! 认证: JWT 令牌, 密码哈希, 请求中间件

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtManager};
pub use middleware::{require_admin, require_auth, require_page_auth, require_staff, CurrentUser};
pub use password::{hash_password, verify_password};
