// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token normalisation and display shortening.
//!
//! Shortening is cosmetic and only feeds display names. Signatures are always
//! built from the full tokens.

use crate::frame::{Lane, ANONYMOUS};

/// Normalise a parsed JS function name.
pub fn normalize_js_function(function: Option<&str>) -> String {
	let Some(function) = function else {
		return ANONYMOUS.to_string();
	};
	let mut f = function.trim();
	if let Some(stripped) = f.strip_prefix("bound ") {
		f = stripped;
	}
	if f.is_empty() || f == "<anonymous>" {
		return ANONYMOUS.to_string();
	}
	f.to_string()
}

/// Strip query strings and fragments from a JS file reference.
pub fn sanitize_js_file(file: Option<&str>) -> String {
	let Some(file) = file else {
		return "unknown".to_string();
	};
	let mut f = file.trim();
	if let Some(q) = f.find('?') {
		f = &f[..q];
	}
	if let Some(h) = f.find('#') {
		f = &f[..h];
	}
	f.to_string()
}

/// Normalise a JVM class name: anonymous-class suffixes (`$1`) are dropped.
pub fn normalize_java_class(class: &str) -> String {
	let mut out = String::with_capacity(class.len());
	let mut chars = class.chars().peekable();
	while let Some(c) = chars.next() {
		if c == '$' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
			while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
				chars.next();
			}
			continue;
		}
		out.push(c);
	}
	out
}

/// Normalise a JVM method name: synthetic lambdas collapse to `lambda`.
pub fn normalize_java_method(method: &str) -> String {
	if method.contains("lambda$") {
		"lambda".to_string()
	} else {
		method.to_string()
	}
}

fn split_token(token: &str) -> (&str, &str) {
	match token.find('#') {
		Some(h) => (&token[..h], &token[h + 1..]),
		None => (token, ""),
	}
}

fn with_suffix(base: String, suffix: &str) -> String {
	if suffix.is_empty() {
		base
	} else {
		format!("{base}#{suffix}")
	}
}

/// Keep at most the last two dot-separated class segments plus the method.
pub fn shorten_java(token: &str) -> String {
	if token.trim().is_empty() {
		return String::new();
	}
	let (class, method) = split_token(token);
	let segments: Vec<&str> = class.split('.').collect();
	let base = if segments.len() >= 2 {
		segments[segments.len() - 2..].join(".")
	} else {
		class.to_string()
	};
	with_suffix(base, method)
}

/// Keep at most the last two path segments of the file plus the function.
pub fn shorten_js(token: &str) -> String {
	if token.trim().is_empty() {
		return String::new();
	}
	let (file, function) = split_token(token);
	let normalized = file.replace('\\', "/");
	let segments: Vec<&str> = normalized.split('/').collect();
	let base = if segments.len() >= 2 {
		segments[segments.len() - 2..].join("/")
	} else {
		file.to_string()
	};
	with_suffix(base, function)
}

/// Lane-aware display shortening.
pub fn shorten(lane: Lane, token: &str) -> String {
	match lane {
		Lane::Java => shorten_java(token),
		Lane::Js => shorten_js(token),
		Lane::Native | Lane::Unknown => token.to_string(),
	}
}
