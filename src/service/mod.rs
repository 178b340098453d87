pub mod calendar;
pub mod cart;
pub mod dashboard;
pub mod product;
pub mod quotation;
pub mod report;
pub mod sale;
pub mod user;
pub mod util;
pub mod validation;

pub use dashboard::DashboardService;
pub use product::ProductService;
pub use quotation::QuotationService;
pub use report::ReportService;
pub use sale::SaleService;
pub use user::UserService;
