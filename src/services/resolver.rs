// src/services/resolver.rs
//! DID document resolution.
//!
//! The authenticator only needs `resolve(did) -> DidDocument`. Two
//! implementations are provided:
//! - [`HttpDidResolver`] fetches `did:wba` documents over HTTPS
//! - [`StaticResolver`] serves documents pinned in memory
//!
//! Documents are fetched on every call. There is no cache and no retry; any
//! failure (network, timeout, status, decoding, subject mismatch) surfaces as
//! `ResolutionFailure` and ends the request.

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::AuthError;
use crate::models::did::DidDocument;

const DID_WBA_PREFIX: &str = "did:wba:";

/// Retrieves the verification material published for a DID.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves `did` to its document.
    ///
    /// # Errors
    /// `ResolutionFailure` if the document cannot be obtained.
    async fn resolve(&self, did: &str) -> Result<DidDocument, AuthError>;
}

/// Resolver for the `did:wba` method.
///
/// `did:wba:<host>[%3A<port>][:<segment>...]` maps to
/// `https://<host>[:port]/<segment>/.../did.json`, or to
/// `https://<host>[:port]/.well-known/did.json` when there are no path
/// segments.
#[derive(Clone)]
pub struct HttpDidResolver {
    client: reqwest::Client,
    scheme: String,
}

impl HttpDidResolver {
    /// Creates a resolver whose requests give up after `timeout`.
    ///
    /// # Errors
    /// `Internal` if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            scheme: "https".to_string(),
        })
    }

    /// Overrides the URL scheme. Only meant for local development, where the
    /// directory is served over plain HTTP.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Computes the document URL for a `did:wba` identifier.
    ///
    /// # Errors
    /// `ResolutionFailure` for other DID methods or malformed identifiers.
    pub fn document_url(&self, did: &str) -> Result<String, AuthError> {
        let specific = did
            .strip_prefix(DID_WBA_PREFIX)
            .ok_or_else(|| failure(did, "unsupported DID method"))?;

        let mut segments = specific.split(':');
        let host = decode_segment(did, segments.next().unwrap_or_default())?;
        if host.is_empty() || host.contains(['/', '@', '?', '#']) {
            return Err(failure(did, "invalid host"));
        }

        let path = segments
            .map(|segment| decode_segment(did, segment))
            .collect::<Result<Vec<_>, _>>()?;
        let unsafe_segment = |segment: &String| {
            segment.is_empty() || segment == ".." || segment.contains(['/', '?', '#'])
        };
        if path.iter().any(unsafe_segment) {
            return Err(failure(did, "invalid path segment"));
        }

        Ok(if path.is_empty() {
            format!("{}://{}/.well-known/did.json", self.scheme, host)
        } else {
            format!("{}://{}/{}/did.json", self.scheme, host, path.join("/"))
        })
    }
}

#[async_trait]
impl IdentityResolver for HttpDidResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument, AuthError> {
        let url = self.document_url(did)?;
        debug!("Resolving {} via {}", did, url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| failure(did, &format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(did, &format!("GET {} returned {}", url, status)));
        }

        let document: DidDocument = response
            .json()
            .await
            .map_err(|e| failure(did, &format!("decoding document from {}: {}", url, e)))?;

        if document.id != did {
            return Err(failure(
                did,
                &format!("document describes {} instead", document.id),
            ));
        }
        Ok(document)
    }
}

/// Resolver over a fixed set of documents held in memory.
#[derive(Default)]
pub struct StaticResolver {
    documents: RwLock<HashMap<String, DidDocument>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document, keyed by its `id`.
    pub fn with_document(self, document: DidDocument) -> Self {
        self.insert(document);
        self
    }

    /// Adds or replaces a document, keyed by its `id`.
    pub fn insert(&self, document: DidDocument) {
        self.documents.write().insert(document.id.clone(), document);
    }

    /// Removes the document for `did`; returns whether it was present.
    pub fn remove(&self, did: &str) -> bool {
        self.documents.write().remove(did).is_some()
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument, AuthError> {
        self.documents
            .read()
            .get(did)
            .cloned()
            .ok_or_else(|| failure(did, "no pinned document"))
    }
}

fn decode_segment(did: &str, segment: &str) -> Result<String, AuthError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| failure(did, "segment is not UTF-8"))
}

fn failure(did: &str, detail: &str) -> AuthError {
    debug!("Failed to resolve DID {}: {}", did, detail);
    AuthError::ResolutionFailure(detail.to_string())
}
