//! Catalog page fetcher and listing parser.
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{header, Client, StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::model::Product;

const MAX_REDIRECTS: usize = 10;

static LI_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<li\b([^>]*)>").expect("li regex"));
static LI_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<li\b[^>]*>|</li\s*>").expect("li tag regex"));
static A_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>").expect("a regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute regex")
});
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);").expect("entity regex")
});

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid catalog URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("host {host} is outside the allowed domain {allowed}")]
    DomainNotAllowed { host: String, allowed: String },
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog returned {status} for {url}")]
    Status { status: StatusCode, url: String },
}

/// Anything that can produce the current list of catalog products.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Product>, FetchError>;
}

/// Class names that identify listings, their title link and the sold-out flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMarkers {
    pub product_class: String,
    pub title_link_class: String,
    pub out_of_stock_class: String,
}

impl ListingMarkers {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            product_class: cfg.catalog.product_class.clone(),
            title_link_class: cfg.catalog.title_link_class.clone(),
            out_of_stock_class: cfg.catalog.out_of_stock_class.clone(),
        }
    }
}

impl Default for ListingMarkers {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Fetches one fixed catalog page over HTTP, never leaving `allowed_domain`.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: Client,
    url: String,
    allowed_domain: String,
    markers: ListingMarkers,
}

impl HttpCatalog {
    pub fn new(
        url: impl Into<String>,
        allowed_domain: impl Into<String>,
        markers: ListingMarkers,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let allowed_domain = allowed_domain.into().to_ascii_lowercase();
        let redirect_domain = allowed_domain.clone();
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let on_domain = attempt
                .url()
                .host_str()
                .is_some_and(|h| h.eq_ignore_ascii_case(&redirect_domain));
            if on_domain {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });
        let http = Client::builder()
            .user_agent(concat!("matcha-stockbot/", env!("CARGO_PKG_VERSION")))
            .redirect(policy)
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            allowed_domain,
            markers,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, FetchError> {
        Self::new(
            cfg.catalog.url.clone(),
            cfg.catalog.allowed_domain.clone(),
            ListingMarkers::from_config(cfg),
            Duration::from_secs(cfg.app.request_timeout_secs),
        )
    }

    /// Parse the configured URL and make sure it points at the allowed domain.
    pub fn checked_url(&self) -> Result<Url, FetchError> {
        let url = Url::parse(&self.url).map_err(|e| FetchError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        self.ensure_allowed(&url)?;
        Ok(url)
    }

    fn ensure_allowed(&self, url: &Url) -> Result<(), FetchError> {
        match url.host_str() {
            Some(host) if host.eq_ignore_ascii_case(&self.allowed_domain) => Ok(()),
            host => Err(FetchError::DomainNotAllowed {
                host: host.unwrap_or_default().to_string(),
                allowed: self.allowed_domain.clone(),
            }),
        }
    }

    async fn fetch_page(&self) -> Result<String, FetchError> {
        let url = self.checked_url()?;
        info!(%url, "fetching catalog page");
        let res = self.http.get(url.clone()).send().await?;
        let status = res.status();

        if status.is_redirection() {
            // Same-domain hops were already followed; anything left points elsewhere.
            let target = res
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| res.url().join(loc).ok());
            let host = target
                .as_ref()
                .and_then(|u| u.host_str())
                .unwrap_or_default()
                .to_string();
            warn!(%status, %host, "catalog redirected off the allowed domain");
            return Err(FetchError::DomainNotAllowed {
                host,
                allowed: self.allowed_domain.clone(),
            });
        }
        if !status.is_success() {
            warn!(%status, "catalog returned an error status");
            return Err(FetchError::Status {
                status,
                url: res.url().to_string(),
            });
        }

        Ok(res.text().await?)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<Vec<Product>, FetchError> {
        let html = self.fetch_page().await?;
        let products = parse_products(&html, &self.markers);
        info!(count = products.len(), "parsed catalog listings");
        Ok(products)
    }
}

/// Extract every product listing from a catalog page, in page order.
///
/// A listing is an `<li>` carrying `markers.product_class`. Its title comes
/// from the `title` attribute of the first link with `markers.title_link_class`
/// (empty when absent). It is in stock unless its own class list carries
/// `markers.out_of_stock_class`.
pub fn parse_products(html: &str, markers: &ListingMarkers) -> Vec<Product> {
    let listings: Vec<(usize, usize, String)> = LI_OPEN_RE
        .captures_iter(html)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let class = parse_attrs(cap.get(1)?.as_str())
                .remove("class")
                .unwrap_or_default();
            has_class(&class, &markers.product_class).then(|| (whole.start(), whole.end(), class))
        })
        .collect();

    listings
        .iter()
        .enumerate()
        .map(|(i, (_, open_end, class))| {
            let limit = listings.get(i + 1).map(|l| l.0).unwrap_or(html.len());
            let body = listing_body(&html[*open_end..limit]);
            let title = listing_title(body, &markers.title_link_class).unwrap_or_else(|| {
                debug!("listing without a title link");
                String::new()
            });
            let in_stock = !has_class(class, &markers.out_of_stock_class);
            Product { title, in_stock }
        })
        .collect()
}

/// Cut `rest` at the `</li>` that closes the listing, skipping nested lists.
fn listing_body(rest: &str) -> &str {
    let mut depth = 1usize;
    for tag in LI_TAG_RE.find_iter(rest) {
        if tag.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                return &rest[..tag.start()];
            }
        } else {
            depth += 1;
        }
    }
    rest
}

fn listing_title(body: &str, link_class: &str) -> Option<String> {
    A_OPEN_RE.captures_iter(body).find_map(|cap| {
        let mut attrs = parse_attrs(cap.get(1)?.as_str());
        let class = attrs.remove("class").unwrap_or_default();
        if !has_class(&class, link_class) {
            return None;
        }
        Some(decode_entities(attrs.get("title").map(String::as_str).unwrap_or("")).trim().to_string())
    })
}

fn parse_attrs(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for cap in ATTR_RE.captures_iter(raw) {
        let name = cap[1].to_ascii_lowercase();
        let value = cap
            .get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        attrs.entry(name).or_insert(value);
    }
    attrs
}

fn has_class(class_attr: &str, wanted: &str) -> bool {
    class_attr.split_ascii_whitespace().any(|c| c == wanted)
}

fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |cap: &regex::Captures| {
            let ent = &cap[1];
            let decoded = if let Some(hex) = ent.strip_prefix("#x").or_else(|| ent.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = ent.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match ent {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map(String::from).unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}
