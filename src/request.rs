use bytes::Bytes;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::Uri;

/// Description of the request to sign.
///
/// The signer never mutates this value; attach the returned headers to the
/// outgoing request yourself.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URI carrying host, path and optionally a query string.
    pub uri: Uri,
    /// Caller supplied headers. Merged over the configured defaults; the
    /// caller wins on collision.
    pub headers: HeaderMap,
    /// Extra query parameters, merged over the URI's own query string.
    /// An entry here replaces a URI query parameter with the same key.
    pub params: Vec<(String, String)>,
    /// Raw payload bytes. Takes precedence over `data`.
    pub body: Option<Bytes>,
    /// Logical payload, run through the configured payload serializer when
    /// `body` is absent.
    pub data: Option<serde_json::Value>,
}

impl SigningRequest {
    /// Create a request descriptor for the given method and URI.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: None,
            data: None,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add an extra query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Set the raw payload bytes.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the logical payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Working set for one signing call.
///
/// Built fresh at the start of every `sign_at`, consumed entirely within
/// that call and dropped on return. Never shared across calls.
#[derive(Debug)]
pub(crate) struct SigningContext {
    /// HTTP method.
    pub method: Method,
    /// HTTP path.
    pub path: String,
    /// HTTP query parameters, URI query merged with the extra params.
    pub query: Vec<(String, String)>,
    /// Normalized headers, all of which get signed.
    pub headers: HeaderMap,
    /// Payload bytes. `None` for bodiless requests.
    pub payload: Option<Bytes>,
}

impl SigningContext {
    /// Normalize header value.
    ///
    /// Surrounding spaces are not part of the signed value, per step 4 of
    /// the AWS canonical request rules.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let bs = v.as_bytes();

        let starting_index = bs.iter().position(|b| *b != b' ').unwrap_or(0);
        let ending_offset = bs.iter().rev().position(|b| *b != b' ').unwrap_or(0);
        let ending_index = bs.len() - ending_offset;

        // This can't fail because we started with a valid HeaderValue and then only trimmed spaces
        *v = HeaderValue::from_bytes(&bs[starting_index..ending_index])
            .expect("invalid header value")
    }

    /// Get header names as sorted vector.
    pub fn header_name_to_vec_sorted(&self) -> Vec<&str> {
        let mut h = self
            .headers
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<&str>>();
        h.sort_unstable();

        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_normalize() {
        let mut v = HeaderValue::from_static("  value  ");
        SigningContext::header_value_normalize(&mut v);
        assert_eq!(v, HeaderValue::from_static("value"));
    }

    #[test]
    fn test_header_names_sorted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-date", HeaderValue::from_static("a"));
        headers.insert("host", HeaderValue::from_static("b"));
        headers.insert("accept", HeaderValue::from_static("c"));

        let ctx = SigningContext {
            method: Method::GET,
            path: "/".to_string(),
            query: vec![],
            headers,
            payload: None,
        };

        assert_eq!(
            ctx.header_name_to_vec_sorted(),
            vec!["accept", "host", "x-amz-date"]
        );
    }
}
