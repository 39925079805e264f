use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA, UPGRADE_INSECURE_REQUESTS};
use reqwest::{Client, ClientBuilder, redirect};
use tracing::{debug, trace};

use crate::error::{Result, StorefrontError};
use crate::models::ProductListResponse;
use crate::parser::parse_product_list;

pub const DEFAULT_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Product detail page watched for queue redirects.
pub const DEFAULT_PRODUCT_URL: &str =
    "https://direct.playstation.com/en-us/consoles/console/playstation5-console.3005816";

/// Product list endpoint; `{code}` is replaced with the product code.
pub const DEFAULT_PRODUCT_LIST_URL: &str = "https://api.direct.playstation.com/commercewebservices/ps-direct-us/users/anonymous/products/productList?fields=BASIC&productCodes={code}";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Install the process-wide rustls crypto provider once.
///
/// reqwest is built without a bundled provider, so this must run before the first
/// client is constructed.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client builder shared by storefront requests.
///
/// Redirects are never followed: a 3xx on the product page is the queue signal.
pub fn create_client_builder(timeout: Duration) -> ClientBuilder {
    install_rustls_provider();

    let mut builder = Client::builder()
        .user_agent(DEFAULT_UA)
        .redirect(redirect::Policy::none());
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }
    builder
}

/// Endpoints of the storefront being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub product_url: String,
    pub product_list_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            product_url: DEFAULT_PRODUCT_URL.to_string(),
            product_list_url: DEFAULT_PRODUCT_LIST_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Resolve the product list URL for `code`.
    pub fn product_list_url(&self, code: &str) -> Result<String> {
        if !self.product_list_url.contains("{code}") {
            return Err(StorefrontError::InvalidUrl(format!(
                "product list url has no {{code}} placeholder: {}",
                self.product_list_url
            )));
        }
        let resolved = self.product_list_url.replace("{code}", code);
        url::Url::parse(&resolved)
            .map_err(|e| StorefrontError::InvalidUrl(format!("{resolved}: {e}")))?;
        Ok(resolved)
    }
}

/// The two storefront reads a stock check needs.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// URL of the watched product page.
    fn product_url(&self) -> &str;

    /// Whether the product page currently answers with a redirect (3xx), which is how
    /// the storefront pushes visitors into its waiting queue.
    async fn would_enqueue(&self) -> Result<bool>;

    /// Fetch and decode the product list for `code`.
    async fn product_list(&self, code: &str) -> Result<ProductListResponse>;
}

#[derive(Debug, Clone)]
pub struct StorefrontClient {
    client: Client,
    endpoints: Endpoints,
}

impl StorefrontClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let client = create_client_builder(timeout).build()?;
        Ok(Self::with_client(client, endpoints))
    }

    pub fn with_client(client: Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn no_cache_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers
    }
}

#[async_trait]
impl StorefrontApi for StorefrontClient {
    fn product_url(&self) -> &str {
        &self.endpoints.product_url
    }

    async fn would_enqueue(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.endpoints.product_url)
            .headers(Self::no_cache_headers())
            .send()
            .await?;

        let status = response.status();
        trace!(status = %status, url = %self.endpoints.product_url, "product page status");
        Ok(status.is_redirection())
    }

    async fn product_list(&self, code: &str) -> Result<ProductListResponse> {
        let url = self.endpoints.product_list_url(code)?;

        let mut headers = Self::no_cache_headers();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self.client.get(&url).headers(headers).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        trace!(status = %status, bytes = body.len(), "product list response");

        parse_product_list(&body)
    }
}
