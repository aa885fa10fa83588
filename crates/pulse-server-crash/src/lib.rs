// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side symbolication and error grouping for Pulse.
//!
//! This crate wires the pure pieces from `pulse-crash-core` and
//! `pulse-crash-symbolicate` to storage and caching:
//!
//! - [`SymbolFileStore`] holds uploaded mapping files (in memory or SQLite)
//! - [`MappingArtifactCache`] keeps parsed artifacts warm
//! - [`PresenceCache`] remembers which builds lack a mapping
//! - [`Symbolicator`] resolves frames, degrading to raw tokens on any failure
//! - [`ErrorGroupingService`] turns ingested records into grouped
//!   [`StackTraceEvent`] rows for an [`AnalyticsSink`]

pub mod artifacts;
pub mod cache;
pub mod error;
pub mod event;
pub mod grouping;
pub mod presence;
pub mod sink;
pub mod store;
pub mod symbolicate;
pub mod upload;

pub use artifacts::MappingArtifactCache;
pub use cache::{Expiry, TtlCache};
pub use error::{CrashServerError, ResolveError, Result};
pub use event::{format_timestamp, span_id_hex, trace_id_hex, IngestRecord, StackTraceEvent};
pub use grouping::{ErrorGroupingService, ProcessingResult};
pub use presence::{Presence, PresenceCache};
pub use sink::{AnalyticsSink, InMemorySink};
pub use store::{InMemorySymbolFileStore, SqliteSymbolFileStore, StoredSymbolFile, SymbolFileStore};
pub use symbolicate::Symbolicator;
pub use upload::{SymbolFileService, UploadEntry, UploadedFile};
