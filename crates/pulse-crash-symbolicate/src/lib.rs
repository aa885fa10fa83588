// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mapping artifact engines for Pulse error grouping.
//!
//! This crate provides functionality for:
//! - Parsing JavaScript / React Native source maps (v3) and resolving
//!   1-indexed bundle positions to original files and identifiers
//! - Indexing ProGuard / R8 mapping files and retracing obfuscated JVM
//!   frames, expanding inlined calls
//!
//! # Example
//!
//! ```
//! use pulse_crash_symbolicate::ParsedSourceMap;
//!
//! let source_map_json = r#"{
//!     "version": 3,
//!     "sources": ["src/screens/Home.tsx"],
//!     "names": ["renderScreen"],
//!     "mappings": ";;;;;;;;;IAAAA"
//! }"#;
//! let map = ParsedSourceMap::from_bytes(source_map_json.as_bytes()).unwrap();
//! let pos = map.lookup(10, 5).unwrap().unwrap();
//! assert_eq!(pos.source, "src/screens/Home.tsx");
//! assert_eq!(pos.name.as_deref(), Some("renderScreen"));
//! ```

pub mod error;
pub mod retrace;
pub mod sourcemap;
pub mod vlq;

pub use error::{Result, SymbolicateError};
pub use retrace::{parse_frame_line, render_java_frame, ObfuscatedFrame, ProguardMapping, Retraced};
pub use sourcemap::{OriginalPosition, ParsedSourceMap};
pub use vlq::{decode_vlq_mappings, decode_vlq_segment, DecodedMappings, Mapping, OriginalLocation};
