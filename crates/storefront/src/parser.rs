//! Product list decoding.
//!
//! The commerce API answers with JSON when asked nicely, but some edge nodes ignore the
//! `Accept` header and serve the XML rendition of the same resource. JSON is tried
//! first, XML second; when both fail the error carries a short preview of the body.

use tracing::{debug, warn};

use crate::error::{Result, StorefrontError};
use crate::models::ProductListResponse;

/// Maximum number of payload bytes included in a parse error.
pub const PREVIEW_LEN: usize = 128;

pub fn parse_product_list(body: &[u8]) -> Result<ProductListResponse> {
    let json_err = match serde_json::from_slice::<ProductListResponse>(body) {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    debug!(error = %json_err, "product list is not json, trying xml");

    let xml_result = std::str::from_utf8(body)
        .map_err(|e| e.to_string())
        .and_then(|text| {
            quick_xml::de::from_str::<ProductListResponse>(text).map_err(|e| e.to_string())
        });

    match xml_result {
        Ok(response) => Ok(response),
        Err(xml_err) => {
            let preview = preview(body);
            warn!(json = %json_err, xml = %xml_err, preview = %preview, "failed to parse product list");
            Err(StorefrontError::Parse {
                json: json_err.to_string(),
                xml: xml_err,
                preview,
            })
        }
    }
}

/// Lossy, char-boundary-safe prefix of `body` for diagnostics.
pub fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= PREVIEW_LEN {
        return text.into_owned();
    }

    let mut end = PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_BODY: &str = r#"{
        "currentPage": 0,
        "totalPageCount": 1,
        "totalProductCount": 1,
        "products": [
            {
                "code": "3005816",
                "name": "PlayStation 5 Console",
                "preOrderProduct": false,
                "purchasable": true,
                "price": {
                    "basePrice": "$499.99",
                    "currencyIso": "USD",
                    "currencySymbol": "$",
                    "decimalPrice": "499.99",
                    "value": 499.99
                },
                "stock": { "stockLevelStatus": "outOfStock" },
                "streetDate": "2020-11-12T05:00:00Z",
                "categoryHierarchy": [{ "code": "consoles", "name": "Consoles" }]
            }
        ]
    }"#;

    const XML_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<productList>
    <currentPage>0</currentPage>
    <totalPageCount>1</totalPageCount>
    <totalProductCount>1</totalProductCount>
    <products>
        <code>3005816</code>
        <name>PlayStation 5 Console</name>
        <preOrderProduct>false</preOrderProduct>
        <purchasable>true</purchasable>
        <price>
            <basePrice>$499.99</basePrice>
            <currencyIso>USD</currencyIso>
            <currencySymbol>$</currencySymbol>
            <decimalPrice>499.99</decimalPrice>
            <value>499.99</value>
        </price>
        <stock>
            <stockLevelStatus>outOfStock</stockLevelStatus>
        </stock>
        <streetDate>2020-11-12T05:00:00Z</streetDate>
        <categoryHierarchy>
            <code>consoles</code>
            <name>Consoles</name>
        </categoryHierarchy>
    </products>
</productList>"#;

    #[test]
    fn test_parse_json() {
        let response = parse_product_list(JSON_BODY.as_bytes()).unwrap();
        assert_eq!(response.total_product_count, 1);
        let product = response.first().unwrap();
        assert_eq!(product.code, "3005816");
        assert_eq!(product.stock_level_status(), "outOfStock");
        assert_eq!(product.price.currency_iso, "USD");
        assert!(product.street_date.is_some());
    }

    #[test]
    fn test_xml_fallback_matches_json() {
        let from_json = parse_product_list(JSON_BODY.as_bytes()).unwrap();
        let from_xml = parse_product_list(XML_BODY.as_bytes()).unwrap();
        assert_eq!(from_json, from_xml);
    }

    #[test]
    fn test_empty_product_list() {
        let response = parse_product_list(br#"{"currentPage":0,"products":[]}"#).unwrap();
        assert!(response.is_empty());
        assert!(response.first().is_none());
    }

    #[test]
    fn test_garbage_reports_preview() {
        let body = "x".repeat(400);
        let err = parse_product_list(body.as_bytes()).unwrap_err();
        match err {
            StorefrontError::Parse { preview, .. } => {
                assert_eq!(preview.len(), PREVIEW_LEN + 3);
                assert!(preview.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let body = "é".repeat(100);
        let preview = preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert!(preview.len() <= PREVIEW_LEN + 3);
    }

    #[test]
    fn test_short_preview_is_verbatim() {
        assert_eq!(preview(b"oops"), "oops");
    }
}
