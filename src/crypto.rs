// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Hash and HMAC primitives used by the signing pipeline.

use hmac::Hmac;
use hmac::Mac;
use sha2::Digest;
use sha2::Sha256;
use std::fmt::Debug;

/// The hash/HMAC provider consumed by the signing pipeline.
///
/// SigV4 mandates SHA-256 and HMAC-SHA256; [`Sha256Crypto`] is the
/// implementation used unless the configuration swaps in another one.
/// Implementations must be reentrant: `sign` may be called concurrently
/// from multiple threads with the same provider instance.
pub trait Crypto: Debug + Send + Sync + 'static {
    /// Hash the content, returning the digest hex-encoded.
    fn hex_hash(&self, content: &[u8]) -> String;

    /// Keyed MAC over the content, returning the raw bytes.
    fn hmac(&self, key: &[u8], content: &[u8]) -> Vec<u8>;
}

/// SHA-256 based [`Crypto`] provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Crypto;

impl Crypto for Sha256Crypto {
    fn hex_hash(&self, content: &[u8]) -> String {
        hex_sha256(content)
    }

    fn hmac(&self, key: &[u8], content: &[u8]) -> Vec<u8> {
        hmac_sha256(key, content)
    }
}

/// Hex encoded SHA256 hash.
///
/// Use this function instead of `hex::encode(sha256(content))` can reduce
/// extra copy.
pub fn hex_sha256(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content).as_slice())
}

/// HMAC with SHA256 hash.
pub fn hmac_sha256(key: &[u8], content: &[u8]) -> Vec<u8> {
    // SAFETY: HMAC's new_from_slice always returns Ok - it handles any key length
    let mut h = Hmac::<Sha256>::new_from_slice(key).unwrap();
    h.update(content);

    h.finalize().into_bytes().to_vec()
}
