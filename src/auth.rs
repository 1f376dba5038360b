//! SharedKey authorization for outgoing Azure Blob Storage requests.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// Storage account credential that signs requests with the account key.
#[derive(Debug, Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: String,
}

impl SharedKeyCredential {
    pub fn new(account: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            key: key.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Builds the `Authorization` header value for a request.
    ///
    /// `path` is the URL path exactly as sent on the wire, `query` the
    /// request's query parameters, and `ms_headers` every `x-ms-*` header
    /// (BTreeMap keeps them in the sorted order the signature requires).
    pub fn authorization(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        ms_headers: &BTreeMap<String, String>,
        content_length: u64,
    ) -> Result<String, StoreError> {
        let string_to_sign = self.string_to_sign(method, path, query, ms_headers, content_length);
        let signature = compute_signature(&string_to_sign, &self.key)?;
        Ok(format!("SharedKey {}:{}", self.account, signature))
    }

    /// Builds the string-to-sign for SharedKey authorization.
    fn string_to_sign(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        ms_headers: &BTreeMap<String, String>,
        content_length: u64,
    ) -> String {
        let mut parts = Vec::new();

        // VERB
        parts.push(method.to_uppercase());

        // Content headers in Azure's fixed order: content-encoding,
        // content-language, content-length, content-md5, content-type.
        // Only Content-Length is ever set by this client, and it must be the
        // empty string when zero.
        parts.push(String::new());
        parts.push(String::new());
        parts.push(if content_length == 0 {
            String::new()
        } else {
            content_length.to_string()
        });
        parts.push(String::new());
        parts.push(String::new());

        // Date is left empty; x-ms-date rides in the canonicalized headers.
        parts.push(String::new());

        // Conditional headers: if-modified-since, if-match, if-none-match,
        // if-unmodified-since, range. Page writes use x-ms-range, so the
        // plain range slot stays empty.
        for _ in 0..5 {
            parts.push(String::new());
        }

        let headers_str = parts.join("\n");
        let canonicalized_headers = canonicalized_headers(ms_headers);
        let canonicalized_resource = self.canonicalized_resource(path, query);

        format!("{}\n{}{}", headers_str, canonicalized_headers, canonicalized_resource)
    }

    /// Builds the canonicalized resource: `/{account}{path}` followed by the
    /// query parameters sorted by lowercase key, one per line.
    fn canonicalized_resource(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut resource = format!("/{}{}", self.account, path);

        let mut sorted: Vec<_> = query.to_vec();
        sorted.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

        for (key, value) in sorted {
            resource.push('\n');
            resource.push_str(&key.to_lowercase());
            resource.push(':');
            resource.push_str(value);
        }

        resource
    }
}

/// Builds the canonicalized headers block, each `x-ms-*` header on its own
/// line with a trailing newline.
fn canonicalized_headers(ms_headers: &BTreeMap<String, String>) -> String {
    let mut result = String::new();
    for (name, value) in ms_headers {
        let normalized_value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        result.push_str(&name.to_lowercase());
        result.push(':');
        result.push_str(&normalized_value);
        result.push('\n');
    }
    result
}

/// Computes the HMAC-SHA256 signature over the string-to-sign.
fn compute_signature(string_to_sign: &str, account_key: &str) -> Result<String, StoreError> {
    let key_bytes = BASE64
        .decode(account_key)
        .map_err(|_| StoreError::Auth("invalid account key encoding".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(&key_bytes)
        .map_err(|_| StoreError::Auth("account key is not a valid HMAC key".to_string()))?;

    mac.update(string_to_sign.as_bytes());
    let result = mac.finalize();

    Ok(BASE64.encode(result.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

    #[test]
    fn test_compute_signature() {
        let signature = compute_signature("test string", TEST_KEY).unwrap();
        assert!(!signature.is_empty());
    }

    #[test]
    fn string_to_sign_layout() {
        let credential = SharedKeyCredential::new("devstoreaccount1", TEST_KEY);
        let mut headers = BTreeMap::new();
        headers.insert("x-ms-date".to_string(), "Mon, 27 Jul 2009 12:28:30 GMT".to_string());
        headers.insert("x-ms-version".to_string(), "2021-10-04".to_string());
        headers.insert("x-ms-page-write".to_string(), "update".to_string());

        let sts = credential.string_to_sign(
            "PUT",
            "/disks/disk.img",
            &[("comp", "page")],
            &headers,
            1024,
        );

        assert!(sts.starts_with("PUT\n\n\n1024\n\n\n\n\n\n\n\n\n"));
        assert!(sts.contains("x-ms-date:Mon, 27 Jul 2009 12:28:30 GMT\n"));
        assert!(sts.contains("x-ms-page-write:update\n"));
        assert!(sts.ends_with("/devstoreaccount1/disks/disk.img\ncomp:page"));
    }

    #[test]
    fn zero_content_length_is_empty_slot() {
        let credential = SharedKeyCredential::new("devstoreaccount1", TEST_KEY);
        let headers = BTreeMap::new();
        let sts = credential.string_to_sign("PUT", "/disks", &[], &headers, 0);
        assert!(sts.starts_with("PUT\n\n\n\n\n\n\n\n\n\n\n\n"));
    }

    #[test]
    fn invalid_key_is_rejected() {
        let err = compute_signature("anything", "not base64!!!").unwrap_err();
        assert!(matches!(err, StoreError::Auth(_)));
    }
}
