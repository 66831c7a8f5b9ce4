use crate::config::Config;
use crate::constants::{
    AWS4_HMAC_SHA256, AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, UNSIGNED_PAYLOAD,
    X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::crypto::Crypto;
use crate::request::{SigningContext, SigningRequest};
use crate::time::{format_date, format_iso8601, now, DateTime};
use crate::{Error, Result};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue};
use log::debug;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use std::fmt::Write;

/// Signer that implements AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// The signer holds immutable configuration only; every call to
/// [`sign`](Signer::sign) builds its own working set, so one instance can be
/// shared freely across threads.
#[derive(Debug)]
pub struct Signer {
    config: Config,
}

impl Signer {
    /// Create a new signer from the given config.
    ///
    /// Fails with [`ErrorKind::ConfigInvalid`](crate::ErrorKind::ConfigInvalid)
    /// when either credential field is empty.
    pub fn new(config: Config) -> Result<Self> {
        if config.access_key_id.is_empty() {
            return Err(Error::config_invalid("access_key_id must not be empty"));
        }
        if config.secret_access_key.is_empty() {
            return Err(Error::config_invalid("secret_access_key must not be empty"));
        }

        Ok(Self { config })
    }

    /// Sign the request at the current time, returning the headers to attach
    /// to the outgoing request.
    pub fn sign(&self, req: &SigningRequest) -> Result<HeaderMap> {
        self.sign_at(req, now())
    }

    /// Sign the request at an explicit time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests. Use this function
    /// for reproducing signatures against known test vectors.
    pub fn sign_at(&self, req: &SigningRequest, now: DateTime) -> Result<HeaderMap> {
        let ctx = self.prepare(req, now)?;

        // build canonical request and string to sign.
        let creq = canonical_request_string(&ctx, self.config.crypto.as_ref())?;
        debug!("calculated canonical request: {creq}");
        let encoded_req = self.config.crypto.hex_hash(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.config.region,
            self.config.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "{}", AWS4_HMAC_SHA256)?;
            writeln!(f, "{}", format_iso8601(now))?;
            writeln!(f, "{}", &scope)?;
            write!(f, "{}", &encoded_req)?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key = generate_signing_key(
            self.config.crypto.as_ref(),
            &self.config.secret_access_key,
            now,
            &self.config.region,
            &self.config.service,
        );
        let signature = hex::encode(
            self.config
                .crypto
                .hmac(&signing_key, string_to_sign.as_bytes()),
        );

        let mut authorization = HeaderValue::from_str(&format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            AWS4_HMAC_SHA256,
            self.config.access_key_id,
            scope,
            ctx.header_name_to_vec_sorted().join(";"),
            signature
        ))?;
        authorization.set_sensitive(true);

        self.assemble(&ctx, authorization)
    }

    /// Stage 1: build the working set.
    ///
    /// Merges defaults and caller headers, determines the payload, folds the
    /// extra params into the query.
    fn prepare(&self, req: &SigningRequest, now: DateTime) -> Result<SigningContext> {
        let authority = req
            .uri
            .authority()
            .ok_or_else(|| Error::request_invalid("request without authority cannot be signed"))?
            .clone();

        // URI query merged with the extra params; an explicit param replaces
        // URI entries with the same key.
        let mut query: Vec<(String, String)> = req
            .uri
            .query()
            .map(|v| {
                form_urlencoded::parse(v.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        for (k, v) in req.params.iter() {
            query.retain(|(qk, _)| qk != k);
            query.push((k.clone(), v.clone()));
        }

        // Payload: raw body wins over logical data.
        let payload: Option<Bytes> = match (&req.body, &req.data) {
            (Some(body), _) => Some(body.clone()),
            (None, Some(data)) => Some(Bytes::from((self.config.serialize_payload)(data)?)),
            (None, None) => None,
        };

        // Base header set.
        let mut headers = HeaderMap::with_capacity(req.headers.len() + 5);
        headers.insert(header::HOST, authority.as_str().parse()?);
        if let Some(v) = &self.config.default_content_type {
            headers.insert(header::CONTENT_TYPE, v.parse()?);
        }
        if let Some(v) = &self.config.default_accept_type {
            headers.insert(header::ACCEPT, v.parse()?);
        }
        if let Some(v) = &self.config.default_expect_type {
            headers.insert(header::EXPECT, v.parse()?);
        }
        headers.insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

        // Caller headers win on collision. HeaderMap keys are already
        // lower-cased, so Content-Type and content-type collapse here.
        for (name, value) in req.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        // AWS does not sign a content-type for bodiless requests.
        if payload.is_none() {
            headers.remove(header::CONTENT_TYPE);
        }

        // Strip content-type parameters; clients may append charset
        // parameters the server never sees.
        let stripped = match headers.get(header::CONTENT_TYPE) {
            Some(v) => Some(
                v.to_str()?
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            ),
            None => None,
        };
        if let Some(v) = stripped {
            headers.insert(header::CONTENT_TYPE, v.parse()?);
        }

        // Header values need to be normalized according to Step 4 of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
        for (_, value) in headers.iter_mut() {
            SigningContext::header_value_normalize(value)
        }

        Ok(SigningContext {
            method: req.method.clone(),
            path: req.uri.path().to_string(),
            query,
            headers,
            payload,
        })
    }

    /// Stage 4 tail: assemble the output header mapping.
    fn assemble(&self, ctx: &SigningContext, authorization: HeaderValue) -> Result<HeaderMap> {
        let mut out = HeaderMap::with_capacity(7);

        for name in [header::ACCEPT, header::EXPECT, header::CONTENT_TYPE] {
            if let Some(v) = ctx.headers.get(&name) {
                out.insert(name, v.clone());
            }
        }
        if let Some(payload) = &ctx.payload {
            out.insert(header::CONTENT_LENGTH, HeaderValue::from(payload.len()));
        }
        out.insert(X_AMZ_DATE, ctx.headers[X_AMZ_DATE].clone());
        out.insert(header::AUTHORIZATION, authorization);

        // Passed through after signing; the token itself is not part of the
        // canonical headers.
        if let Some(token) = &self.config.session_token {
            let mut value = HeaderValue::from_str(token)?;
            // Set token value sensitive to avoid leaking.
            value.set_sensitive(true);
            out.insert(X_AMZ_SECURITY_TOKEN, value);
        }

        Ok(out)
    }
}

/// Stage 2: the canonical request string.
fn canonical_request_string(ctx: &SigningContext, crypto: &dyn Crypto) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    // Insert method
    writeln!(f, "{}", ctx.method)?;
    // Insert encoded path. Decode first so pre-encoded paths don't get
    // double-encoded; the encode set leaves '/' untouched.
    let path = percent_decode_str(&ctx.path)
        .decode_utf8()
        .map_err(|e| Error::request_invalid(format!("failed to decode path: {}", e)))?;
    writeln!(f, "{}", utf8_percent_encode(&path, &AWS_URI_ENCODE_SET))?;
    // Insert query, sorted by raw key before encoding.
    let mut query = ctx.query.clone();
    query.sort();
    writeln!(
        f,
        "{}",
        query
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET),
                    utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    )?;
    // Insert canonical + signed headers
    let signed_headers = ctx.header_name_to_vec_sorted();
    for name in signed_headers.iter() {
        writeln!(f, "{}:{}", name, ctx.headers[*name].to_str()?)?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;

    // Insert payload hash. The UNSIGNED-PAYLOAD literal passes through
    // verbatim when the caller explicitly asked for it.
    match ctx.headers.get(X_AMZ_CONTENT_SHA_256) {
        Some(v) if v.as_bytes() == UNSIGNED_PAYLOAD.as_bytes() => {
            write!(f, "{}", UNSIGNED_PAYLOAD)?
        }
        _ => write!(
            f,
            "{}",
            crypto.hex_hash(ctx.payload.as_deref().unwrap_or_default())
        )?,
    }

    Ok(f)
}

/// Stage 4: derive the scoped signing key.
///
/// Four chained HMAC operations, each keyed with the previous output. The
/// "AWS4" prefix and "aws4_request" terminator are mandated by AWS.
fn generate_signing_key(
    crypto: &dyn Crypto,
    secret: &str,
    time: DateTime,
    region: &str,
    service: &str,
) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = crypto.hmac(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = crypto.hmac(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = crypto.hmac(sign_region.as_slice(), service.as_bytes());
    // Sign request
    crypto.hmac(sign_service.as_slice(), "aws4_request".as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Crypto;
    use chrono::{TimeZone, Utc};
    use http::Method;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Fixed timestamp used across the AWS-published SigV4 test suite.
    fn suite_time() -> DateTime {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    /// Config matching the AWS-published SigV4 test suite: no default
    /// headers beyond what the suite's requests carry.
    fn suite_config() -> Config {
        Config {
            region: "us-east-1".to_string(),
            service: "service".to_string(),
            default_content_type: None,
            default_accept_type: None,
            default_expect_type: None,
            ..Config::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
        }
    }

    fn get_request(uri: &str) -> SigningRequest {
        SigningRequest::new(Method::GET, uri.parse().expect("uri must be valid"))
    }

    #[test]
    fn test_known_vector_get_vanilla() {
        init();

        let signer = Signer::new(suite_config()).expect("signer must build");
        let req = get_request("https://example.amazonaws.com/");

        let headers = signer.sign_at(&req, suite_time()).expect("must sign");

        assert_eq!(
            headers[header::AUTHORIZATION],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, SignedHeaders=host;x-amz-date, Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(headers[X_AMZ_DATE], "20150830T123600Z");
    }

    #[test]
    fn test_known_vector_canonical_request() {
        init();

        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/");

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        let creq = canonical_request_string(&ctx, &Sha256Crypto).unwrap();

        assert_eq!(
            creq,
            "GET\n\
             /\n\
             \n\
             host:example.amazonaws.com\n\
             x-amz-date:20150830T123600Z\n\
             \n\
             host;x-amz-date\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_signing_key_chain() {
        // Worked example from the AWS signature documentation (iam service).
        let key = generate_signing_key(
            &Sha256Crypto,
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            suite_time(),
            "us-east-1",
            "iam",
        );

        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_deterministic() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/path?b=2&a=1")
            .with_body(&b"{\"k\":\"v\"}"[..]);

        let first = signer.sign_at(&req, suite_time()).unwrap();
        let second = signer.sign_at(&req, suite_time()).unwrap();

        assert_eq!(first, second);
    }

    #[test_case("", "secret"; "empty access key id")]
    #[test_case("akid", ""; "empty secret access key")]
    fn test_empty_credentials_rejected(ak: &str, sk: &str) {
        let err = Signer::new(Config::new(ak, sk)).expect_err("must fail");
        assert_eq!(err.kind(), crate::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_canonical_query_ordering() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/?b=2&a=1");

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        let creq = canonical_request_string(&ctx, &Sha256Crypto).unwrap();

        assert!(creq.contains("\na=1&b=2\n"), "got: {creq}");
    }

    #[test]
    fn test_params_override_uri_query() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/?key=from-url&other=1")
            .with_param("key", "from-params");

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        let creq = canonical_request_string(&ctx, &Sha256Crypto).unwrap();

        assert!(creq.contains("\nkey=from-params&other=1\n"), "got: {creq}");
    }

    #[test]
    fn test_header_case_insensitive_merge() {
        let signer = Signer::new(suite_config()).unwrap();
        // Mixed-case name from the caller must collapse onto the same key.
        let name: http::header::HeaderName = "Content-Type".parse().unwrap();
        let req = get_request("https://example.amazonaws.com/")
            .with_header(name, HeaderValue::from_static("text/plain"))
            .with_body(&b"hello"[..]);

        let ctx = signer.prepare(&req, suite_time()).unwrap();

        assert_eq!(ctx.headers.get_all(header::CONTENT_TYPE).iter().count(), 1);
        assert_eq!(ctx.headers[header::CONTENT_TYPE], "text/plain");

        let creq = canonical_request_string(&ctx, &Sha256Crypto).unwrap();
        assert_eq!(creq.matches("content-type:").count(), 1);
    }

    #[test]
    fn test_content_type_parameters_stripped() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/")
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=UTF-8"),
            )
            .with_body(&b"{}"[..]);

        let ctx = signer.prepare(&req, suite_time()).unwrap();

        assert_eq!(ctx.headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_unsigned_payload_literal() {
        let signer = Signer::new(suite_config()).unwrap();
        let name: http::header::HeaderName = X_AMZ_CONTENT_SHA_256.parse().unwrap();
        let req = get_request("https://example.amazonaws.com/")
            .with_header(name, HeaderValue::from_static(UNSIGNED_PAYLOAD))
            .with_body(&b"some body"[..]);

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        let creq = canonical_request_string(&ctx, &Sha256Crypto).unwrap();

        assert!(creq.ends_with("\nUNSIGNED-PAYLOAD"), "got: {creq}");
    }

    #[test]
    fn test_bodiless_request_omits_content_type() {
        let signer = Signer::new(Config::new("akid", "secret")).unwrap();
        let req = get_request("https://example.amazonaws.com/things");

        let headers = signer.sign_at(&req, suite_time()).unwrap();

        assert!(headers.get(header::CONTENT_TYPE).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(headers[X_AMZ_DATE], "20150830T123600Z");
        assert!(headers
            .get(header::AUTHORIZATION)
            .is_some_and(|v| v.to_str().unwrap().starts_with("AWS4-HMAC-SHA256 ")));
        // Default accept survives; content-type was removed before signing.
        assert_eq!(headers[header::ACCEPT], "application/json");
    }

    #[test]
    fn test_expect_default_signed_and_surfaced() {
        let config = Config {
            default_expect_type: Some("100-continue".to_string()),
            ..suite_config()
        };
        let signer = Signer::new(config).unwrap();
        let req = get_request("https://example.amazonaws.com/");

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        assert_eq!(
            ctx.header_name_to_vec_sorted(),
            vec!["expect", "host", "x-amz-date"]
        );

        let headers = signer.sign_at(&req, suite_time()).unwrap();
        assert_eq!(headers[header::EXPECT], "100-continue");
        assert!(headers[header::AUTHORIZATION]
            .to_str()
            .unwrap()
            .contains("SignedHeaders=expect;host;x-amz-date,"));
    }

    #[test]
    fn test_session_token_passthrough() {
        let config = Config {
            session_token: Some("session-token".to_string()),
            ..suite_config()
        };
        let signer = Signer::new(config).unwrap();
        let req = get_request("https://example.amazonaws.com/");

        let headers = signer.sign_at(&req, suite_time()).unwrap();
        assert_eq!(headers[X_AMZ_SECURITY_TOKEN], "session-token");

        // The token is attached after signing, so the signature matches the
        // token-less vector exactly.
        assert_eq!(
            headers[header::AUTHORIZATION],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, SignedHeaders=host;x-amz-date, Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn test_session_token_absent() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/");

        let headers = signer.sign_at(&req, suite_time()).unwrap();
        assert!(headers.get(X_AMZ_SECURITY_TOKEN).is_none());
    }

    #[test]
    fn test_data_through_serializer() {
        let signer = Signer::new(Config::new("akid", "secret")).unwrap();
        let req = SigningRequest::new(
            Method::POST,
            "https://example.amazonaws.com/items".parse().unwrap(),
        )
        .with_data(json!({"a": 1}));

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        assert_eq!(ctx.payload.as_deref(), Some(&b"{\"a\":1}"[..]));

        let headers = signer.sign_at(&req, suite_time()).unwrap();
        assert_eq!(headers[header::CONTENT_LENGTH], "7");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_body_takes_precedence_over_data() {
        let signer = Signer::new(Config::new("akid", "secret")).unwrap();
        let req = SigningRequest::new(
            Method::POST,
            "https://example.amazonaws.com/items".parse().unwrap(),
        )
        .with_body(&b"raw"[..])
        .with_data(json!({"ignored": true}));

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        assert_eq!(ctx.payload.as_deref(), Some(&b"raw"[..]));
    }

    #[test]
    fn test_path_not_double_encoded() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/documents%20and%20settings/");

        let ctx = signer.prepare(&req, suite_time()).unwrap();
        let creq = canonical_request_string(&ctx, &Sha256Crypto).unwrap();

        assert!(
            creq.contains("\n/documents%20and%20settings/\n"),
            "got: {creq}"
        );
    }

    #[test]
    fn test_missing_authority_rejected() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = SigningRequest::new(Method::GET, "/relative/path".parse().unwrap());

        let err = signer.sign_at(&req, suite_time()).expect_err("must fail");
        assert_eq!(err.kind(), crate::ErrorKind::RequestInvalid);
    }

    #[test]
    fn test_input_request_not_mutated() {
        let signer = Signer::new(suite_config()).unwrap();
        let req = get_request("https://example.amazonaws.com/?b=2&a=1");
        let before = format!("{req:?}");

        signer.sign_at(&req, suite_time()).unwrap();

        assert_eq!(before, format!("{req:?}"));
    }
}
