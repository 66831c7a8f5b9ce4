//! Compute AWS SigV4 authentication headers without effort.
//!
//! This crate implements the [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
//! for clients that call AWS-compatible APIs (API Gateway, S3, ...) without
//! pulling in a full AWS SDK. Given credentials and a request description it
//! produces the headers to attach to the outgoing request: `authorization`,
//! `x-amz-date`, content negotiation headers and, when configured, the
//! session token. Sending the request stays entirely in the caller's hands.
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use sigv4::{Config, Signer, SigningRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = Signer::new(Config::new("access_key_id", "secret_access_key"))?;
//!
//! let request = SigningRequest::new(
//!     Method::GET,
//!     "https://abc123.execute-api.eu-west-1.amazonaws.com/prod/items".parse()?,
//! )
//! .with_param("limit", "10");
//!
//! // Attach these to your outgoing request and send it with any HTTP client.
//! let headers = signer.sign(&request)?;
//! assert!(headers.contains_key(http::header::AUTHORIZATION));
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//!
//! Signing is a pure, synchronous pipeline: normalize the request, build the
//! canonical request, derive the string-to-sign, then run the scoped HMAC
//! chain. The signer holds only immutable configuration and is safe to share
//! across threads. The payload serializer and the hash/HMAC provider are
//! pluggable through [`Config`]; the defaults are JSON text encoding and
//! SHA-256/HMAC-SHA256.

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod crypto;
pub mod time;
pub mod utils;

mod config;
pub use config::{Config, PayloadSerializer};
mod constants;
mod error;
pub use error::{Error, ErrorKind, Result};
mod request;
pub use request::SigningRequest;
mod sign;
pub use sign::Signer;
