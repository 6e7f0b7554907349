//! Blob container client (source side).
//!
//! REST calls used:
//! - `GET /<container>?restype=container&comp=list[&prefix=..][&marker=..]`
//! - `HEAD /<container>/<blob>` (Get Blob Properties)
//!
//! Auth is either an account SAS appended to every URL, or SharedKey
//! (HMAC-SHA256 over the canonical request, keyed with the account key).

use chrono::Utc;
use reqwest::{Method, Response, Url};
use std::fmt;

use crate::sign::{http_date, shared_key_authorization, shared_key_string_to_sign, uri_encode, SharedKeyRequest};
use crate::xml::{parse_http_date, parse_listing, ListingShape};
use crate::{ListPage, ObjectProps, ObjectStore, StoreError};

/// Service version sent with every request.
pub const API_VERSION: &str = "2021-08-06";

const BLOB_LISTING: ListingShape = ListingShape {
    record: "Blob",
    name: "Name",
    size: "Content-Length",
    modified: "Last-Modified",
    marker: "NextMarker",
    parse_time: parse_http_date,
};

/// How requests to the container are authorized.
#[derive(Clone)]
pub enum BlobAuth {
    SharedKey { account: String, key: String },
    /// SAS query string, with or without the leading `?`.
    Sas(String),
    Anonymous,
}

impl fmt::Debug for BlobAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobAuth::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<REDACTED>")
                .finish(),
            BlobAuth::Sas(_) => f.write_str("Sas(<REDACTED>)"),
            BlobAuth::Anonymous => f.write_str("Anonymous"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AzureBlobContainer {
    http: reqwest::Client,
    endpoint: Url,
    container: String,
    auth: BlobAuth,
}

impl AzureBlobContainer {
    /// `endpoint` is the account blob endpoint, e.g.
    /// `https://<account>.blob.core.windows.net`.
    pub fn new(endpoint: &str, container: impl Into<String>, auth: BlobAuth) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| StoreError::Transport(format!("invalid blob endpoint '{endpoint}': {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            container: container.into(),
            auth,
        })
    }

    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Encoded path for the container or one blob in it.
    fn path(&self, blob: Option<&str>) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        match blob {
            Some(b) => format!("{base}/{}/{}", self.container, uri_encode(b, true)),
            None => format!("{base}/{}", self.container),
        }
    }

    async fn send(
        &self,
        method: Method,
        blob: Option<&str>,
        query: &[(&str, &str)],
    ) -> Result<Response, StoreError> {
        let path = self.path(blob);

        let mut query_string: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k, false), uri_encode(v, false)))
            .collect();
        if let BlobAuth::Sas(token) = &self.auth {
            query_string.push(token.trim_start_matches('?').to_string());
        }

        let mut url = self.endpoint.clone();
        url.set_path(&path);
        let qs = query_string.join("&");
        url.set_query(if qs.is_empty() { None } else { Some(qs.as_str()) });

        let date = http_date(Utc::now());
        let mut req = self
            .http
            .request(method.clone(), url)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", &date);

        if let BlobAuth::SharedKey { account, key } = &self.auth {
            let to_sign = shared_key_string_to_sign(&SharedKeyRequest {
                method: method.as_str(),
                ms_headers: &[("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)],
                account,
                path: &path,
                query,
            });
            req = req.header("authorization", shared_key_authorization(account, key, &to_sign)?);
        }

        Ok(req.send().await?)
    }
}

#[async_trait::async_trait]
impl ObjectStore for AzureBlobContainer {
    fn location(&self) -> &str {
        &self.container
    }

    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut query = vec![("restype", "container"), ("comp", "list")];
        if let Some(p) = prefix.filter(|p| !p.is_empty()) {
            query.push(("prefix", p));
        }
        if let Some(m) = continuation {
            query.push(("marker", m));
        }

        let resp = self.send(Method::GET, None, &query).await?;
        let status = resp.status();
        if !status.is_success() {
            // A missing container is a listing failure, not an empty listing.
            if status.as_u16() == 404 {
                return Err(StoreError::Transport(format!(
                    "container '{}' not found",
                    self.container
                )));
            }
            return Err(StoreError::from_status(status, "list blobs"));
        }

        let body = resp.text().await?;
        parse_listing(&body, &BLOB_LISTING)
    }

    async fn head(&self, key: &str) -> Result<ObjectProps, StoreError> {
        let resp = self.send(Method::HEAD, Some(key), &[]).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::from_status(status, "get blob properties"));
        }
        props_from_headers(&resp)
    }
}

pub(crate) fn props_from_headers(resp: &Response) -> Result<ObjectProps, StoreError> {
    let headers = resp.headers();
    let size = headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| StoreError::Decode("response without content-length".to_string()))?
        .trim()
        .parse::<u64>()
        .map_err(|e| StoreError::Decode(format!("bad content-length: {e}")))?;
    let last_modified = headers
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);
    Ok(ObjectProps {
        size,
        last_modified,
    })
}
