pub mod pool;
pub mod products;
pub mod quotations;
pub mod sales;
pub mod users;

pub use pool::{create_pool, run_migrations};
pub use sales::SaleFilter;
