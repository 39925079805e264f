//! Storefront availability client.
//!
//! Two reads make up a stock check: the product detail page (only its status code
//! matters, a redirect means the storefront is funnelling visitors into a queue) and
//! the product list API (the first product's stock level status).

pub mod client;
pub mod error;
pub mod models;
pub mod parser;

pub use client::{Endpoints, StorefrontApi, StorefrontClient, create_client_builder, install_rustls_provider};
pub use error::{Result, StorefrontError};
pub use models::{Product, ProductListResponse, Stock};
pub use parser::parse_product_list;
