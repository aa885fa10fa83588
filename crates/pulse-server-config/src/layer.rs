// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration produced by each source.

use serde::{Deserialize, Serialize};

use crate::sections::{GroupingConfigLayer, LoggingConfigLayer, SymbolicationConfigLayer};

/// One source's view of the configuration; `None` means "not set here".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfigLayer {
	pub symbolication: Option<SymbolicationConfigLayer>,
	pub grouping: Option<GroupingConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.symbolication, other.symbolication, |b, o| b.merge(o));
		merge_section(&mut self.grouping, other.grouping, |b, o| b.merge(o));
		merge_section(&mut self.logging, other.logging, |b, o| b.merge(o));
	}
}
