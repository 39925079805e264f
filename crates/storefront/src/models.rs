//! Product list payload returned by the storefront commerce API.
//!
//! Every field is defaulted so partial payloads (and the sparser XML rendition of the
//! same resource) still decode. Only `Product::stock` drives availability decisions;
//! the rest is kept for debugging and for richer chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductListResponse {
    pub current_page: i32,
    pub total_page_count: i32,
    pub total_product_count: i32,
    pub products: Vec<Product>,
}

impl ProductListResponse {
    /// The first listed product, which is the one the product code resolves to.
    pub fn first(&self) -> Option<&Product> {
        self.products.first()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub base_product: String,
    pub category_hierarchy: Vec<Category>,
    pub code: String,
    pub compatibility_notices: Vec<CompatibilityNotice>,
    pub legal_disclosure: String,
    pub login_gated: bool,
    pub long_description: String,
    pub long_description_header: String,
    pub max_order_quantity: i32,
    pub name: String,
    pub overline: String,
    pub pre_order_product: bool,
    pub price: Price,
    pub primary_category_name: String,
    pub purchasable: bool,
    pub release_date_display: String,
    pub sie_product_features: Vec<String>,
    pub stock: Stock,
    pub street_date: Option<DateTime<Utc>>,
    pub url: String,
    pub valid_product_code: bool,
}

impl Product {
    pub fn stock_level_status(&self) -> &str {
        &self.stock.stock_level_status
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompatibilityNotice {
    pub is_bold: bool,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Price {
    pub base_price: String,
    pub currency_iso: String,
    pub currency_symbol: String,
    pub decimal_price: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stock {
    pub stock_level_status: String,
}
