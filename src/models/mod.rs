pub mod product;
pub mod quotation;
pub mod sale;
pub mod user;

pub use product::{
    Product, ProductForm, ProductImages, ProductInput, ProductStatus, ProductSummary,
    LOW_STOCK_THRESHOLD,
};
pub use quotation::{
    NewQuotation, Quotation, QuotedProduct, CLOSED_STATUS, DEFAULT_QUOTATION_STATUS, QUOTATION_STATUSES,
};
pub use sale::{
    DeliveryType, PaymentMethod, PlannedLine, RegisterSaleRequest, Sale, SaleItemRequest,
    SaleItemView, SalePlan, SaleStatus, SaleTotals, TransitionEffect,
};
pub use user::{Role, User, UserForm, UserInfo, ADMIN_ROLE, SELLER_ROLE};

/// 数据库中的文本值无法映射到枚举
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("valor desconocido para {kind}: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}
