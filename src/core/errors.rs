// Copyright (c) 2026 Tangled
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error taxonomy for the tangle core.
//!
//! Kinds mirror the four failure domains of the system: validation (rejected
//! at the tangle boundary, surfaced verbatim to the submitter), protocol
//! (per-connection, aborts the current splice rather than the process),
//! storage (I/O and on-disk consistency), and connectivity (dialing/timeout).

use thiserror::Error;

/// Rejections raised while verifying or admitting a site into the tangle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `site.hash().weight() < MINIMUM_WEIGHT`.
    #[error("site hash weight too low")]
    WeightTooLow,
    /// `|site.validates| < MINIMUM_VALIDATIONS`.
    #[error("too few validations")]
    TooFewValidations,
    /// A site in `validates` is not yet known to the tangle.
    #[error("unknown ancestor")]
    UnknownAncestor,
    /// `site.content != payload.hash()`.
    #[error("content hash mismatch")]
    ContentMismatch,
    /// Caller-supplied expected hash disagrees with the computed hash.
    #[error("hash mismatch")]
    HashMismatch,
    /// Payload carries a signature/verification step and it failed.
    #[error("payload failed verification: {0}")]
    PayloadUnverified(String),
    /// `Add` requires validating at least one current tip.
    #[error("site does not validate any current tip")]
    NotValidating,
    /// Payload `type` tag is not one of the known variants.
    #[error("unknown payload type: {0}")]
    InvalidSiteType(String),
}

/// Per-connection protocol failures. These abort the current exchange, not
/// the process.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A splice's buffered sites never became injectable (a progress-free
    /// pass over the buffer).
    #[error("merge failed: splice buffer made no progress")]
    MergeFailed,
    /// A decoded frame named a payload type the receiver does not recognize.
    #[error("invalid site type: {0}")]
    InvalidSiteType(String),
    /// A frame exceeded the maximum wire message size.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
    /// The remote closed the stream or connection unexpectedly.
    #[error("remote closed connection")]
    RemoteClosed,
    /// Validation failed while the protocol layer was injecting a site.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Durable-storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying key/value engine returned an I/O error.
    #[error("storage I/O error: {0}")]
    Io(String),
    /// A stored record's key did not match the hash of its decoded value.
    #[error("storage corruption detected for key")]
    Corruption,
    /// The store could not be (re)opened, e.g. held by another process.
    #[error("failed to reopen store: {0}")]
    Reopen(String),
    /// Canonical encode/decode of a stored record failed.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Remote-dial and handshake failures.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// Outbound dial did not complete.
    #[error("dial failed: {0}")]
    DialFailed(String),
    /// An RPC exceeded its deadline.
    #[error("request timed out")]
    Timeout,
}

/// Aggregate error for tangle-level operations (`verify`/`add`/`inject`),
/// which can fail either on rejection or on the store beneath them.
#[derive(Debug, Error)]
pub enum TangleError {
    /// The site or payload was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The durable store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<sled::transaction::TransactionError<StorageError>> for StorageError {
    fn from(e: sled::transaction::TransactionError<StorageError>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => StorageError::Io(e.to_string()),
        }
    }
}
