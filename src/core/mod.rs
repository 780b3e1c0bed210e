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

//! The tangle core: hashing, the site/payload model, durable storage, the
//! in-memory DAG, and node configuration.

/// Node configuration (TOML file + environment overrides).
pub mod config;
/// Error taxonomy shared across the core.
pub mod errors;
/// 32-byte content hash with weight, codecs, and set-diff.
pub mod hash;
/// Opaque typed payload carried by a site's `content`.
pub mod payload;
/// Signature verification for signed payload variants.
pub mod signing;
/// Immutable DAG node: validations, nonce, content hash, type.
pub mod site;
/// Durable key/value backing for sites, tips, and payload bytes.
pub mod store;
/// In-memory DAG overlay: tip tracking, weight, verify/add/inject.
pub mod tangle;
