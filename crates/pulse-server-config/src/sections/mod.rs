// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod grouping;
mod logging;
mod symbolication;

pub use grouping::{GroupingConfig, GroupingConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use symbolication::{SymbolicationConfig, SymbolicationConfigLayer};
