// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Pulse error grouping engine.
//!
//! This crate holds everything that is pure computation: the lane-tagged
//! frame model, the raw stack-trace parser, in-app classification, display
//! shortening, and the signature/fingerprint/group-id pipeline. It is used by
//! the server-side symbolication and grouping services
//! (`pulse-server-crash`) and by the `pulse-crash` CLI.
//!
//! # Overview
//!
//! - Raw traces are parsed into JS, JAVA and NATIVE lanes
//! - Each frame keeps its raw line and its 0-based position in the trace
//! - Resolved tokens of the primary lane are filtered to in-app frames and
//!   hashed into a stable fingerprint and `EXC-` group id

pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod inapp;
pub mod meta;
pub mod normalize;
pub mod parser;
pub mod reconstruct;

pub use error::{CrashError, Result};
pub use fingerprint::{
	build_display_name, build_signature, choose_primary, fingerprint, group_id,
	select_signature_tokens, types_for_primary, Group, DEFAULT_TOP_N_FRAMES,
};
pub use frame::{Frame, FrameDetail, JavaFrame, JsFrame, Lane, NativeFrame, ResolvedToken};
pub use inapp::InAppRules;
pub use meta::{ArtifactKind, EventMeta, UploadMetadata};
pub use normalize::shorten;
pub use parser::{parse_stacktrace, ParsedFrames};
pub use reconstruct::CompleteSymbolication;
