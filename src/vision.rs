use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::VisionError;
use crate::fs_util::{is_zip_name, validate_zip};

pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://data.binance.vision";
pub const DEFAULT_LISTING_BASE_URL: &str = "https://s3-ap-northeast-1.amazonaws.com/data.binance.vision";

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<Key>([^<]*)</Key>").unwrap());
static TRUNCATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<IsTruncated>\s*(true|false)\s*</IsTruncated>").unwrap());
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>").unwrap()
});

pub trait VisionClient: Send + Sync {
    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, VisionError>;

    fn download(&self, key: &str, destination: &Path) -> Result<(), VisionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Clone)]
pub struct VisionHttpClient {
    client: Client,
    download_base_url: String,
    listing_base_url: String,
}

impl VisionHttpClient {
    pub fn new(download_base_url: &str, listing_base_url: &str) -> Result<Self, VisionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("vision-trades/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| VisionError::DownloadHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| VisionError::DownloadHttp(err.to_string()))?;
        Ok(Self {
            client,
            download_base_url: download_base_url.trim_end_matches('/').to_string(),
            listing_base_url: listing_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.download_base_url, key.trim_start_matches('/'))
    }

    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListingPage, VisionError> {
        let response = send_with_retries(
            || {
                let mut request = self
                    .client
                    .get(&self.listing_base_url)
                    .query(&[("list-type", "2"), ("prefix", prefix)]);
                if let Some(token) = token {
                    request = request.query(&[("continuation-token", token)]);
                }
                request
            },
            VisionError::ListingHttp,
        )?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "bucket listing failed".to_string());
            return Err(VisionError::ListingStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| VisionError::ListingHttp(err.to_string()))?;
        parse_listing_page(&body)
    }
}

impl VisionClient for VisionHttpClient {
    fn list_objects(&self, prefix: &str) -> Result<Vec<String>, VisionError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(prefix, token.as_deref())?;
            debug!(prefix, keys = page.keys.len(), "listing page");
            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(keys)
    }

    fn download(&self, key: &str, destination: &Path) -> Result<(), VisionError> {
        let url = self.object_url(key);
        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| VisionError::DownloadHttp(format!("{url}: {err}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(VisionError::ObjectNotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(VisionError::DownloadStatus {
                status: response.status().as_u16(),
                key: key.to_string(),
            });
        }
        let mut file =
            File::create(destination).map_err(|err| VisionError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| VisionError::DownloadHttp(format!("{url}: {err}")))?;
        if is_zip_name(key) {
            validate_zip(destination)?;
        }
        Ok(())
    }
}

pub fn parse_listing_page(xml: &str) -> Result<ListingPage, VisionError> {
    if !xml.contains("<ListBucketResult") {
        return Err(VisionError::ListingParse(
            "response is not a ListBucketResult document".to_string(),
        ));
    }
    let keys = KEY_RE
        .captures_iter(xml)
        .map(|caps| unescape_xml(&caps[1]))
        .collect();
    let truncated = TRUNCATED_RE
        .captures(xml)
        .map(|caps| &caps[1] == "true")
        .unwrap_or(false);
    let next_token = if truncated {
        let token = TOKEN_RE
            .captures(xml)
            .map(|caps| unescape_xml(&caps[1]))
            .ok_or_else(|| {
                VisionError::ListingParse("truncated listing without continuation token".into())
            })?;
        Some(token)
    } else {
        None
    };
    Ok(ListingPage { keys, next_token })
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub(crate) fn send_with_retries<F>(
    mut make_req: F,
    on_error: fn(String) -> VisionError,
) -> Result<reqwest::blocking::Response, VisionError>
where
    F: FnMut() -> reqwest::blocking::RequestBuilder,
{
    const MAX_RETRIES: usize = 3;
    const BASE_DELAY_MS: u64 = 200;
    let mut attempt = 0usize;
    loop {
        let response = make_req().send();
        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                    thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                    thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                    continue;
                }
                return Err(on_error(err.to_string()));
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
