// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fingerprinting algorithm for grouping similar error events.
//!
//! The canonical signature is
//!
//! ```text
//! v1|platform:<tag>|exc:<type>>...>|frames:<token>>...
//! ```
//!
//! built from the primary lane's exception types and its top in-app tokens
//! (full tokens, never shortened). The fingerprint is the SHA-1 hex digest of
//! the signature and the group id is `EXC-` followed by the first ten hex
//! characters in upper case. Any change to this format re-keys every
//! existing group.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::frame::{Lane, ResolvedToken};
use crate::inapp::InAppRules;
use crate::normalize::shorten;
use crate::parser::ParsedFrames;

pub const SIGNATURE_VERSION: &str = "v1";
pub const GROUP_ID_PREFIX: &str = "EXC-";
pub const GROUP_ID_HEX_LEN: usize = 10;

/// Default number of frames that participate in a signature.
pub const DEFAULT_TOP_N_FRAMES: usize = 10;

/// A deduplicated error identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
	pub platform: String,
	pub signature: String,
	pub fingerprint: String,
	pub group_id: String,
	pub display_name: String,
}

impl Group {
	/// Build the group for a lane from its exception types and the tokens
	/// chosen for the signature.
	pub fn from_tokens<T: AsRef<str>, U: AsRef<str>>(
		lane: Lane,
		exception_types: &[T],
		tokens: &[U],
	) -> Self {
		let platform = lane.platform_tag().to_string();
		let signature = build_signature(&platform, exception_types, tokens);
		let fingerprint = fingerprint(&signature);
		let group_id = group_id(&fingerprint);
		let display_name = build_display_name(lane, exception_types, tokens, &group_id);
		Self {
			platform,
			signature,
			fingerprint,
			group_id,
			display_name,
		}
	}
}

fn join_into<T: AsRef<str>>(out: &mut String, items: &[T]) {
	for (i, item) in items.iter().enumerate() {
		if i > 0 {
			out.push('>');
		}
		out.push_str(item.as_ref());
	}
}

/// Build the canonical, order-preserving signature.
pub fn build_signature<T: AsRef<str>, U: AsRef<str>>(
	platform: &str,
	exception_types: &[T],
	tokens: &[U],
) -> String {
	let mut sig = String::with_capacity(
		50 + platform.len() + exception_types.len() * 20 + tokens.len() * 30,
	);
	sig.push_str(SIGNATURE_VERSION);
	sig.push_str("|platform:");
	sig.push_str(platform);
	sig.push_str("|exc:");
	join_into(&mut sig, exception_types);
	sig.push_str("|frames:");
	join_into(&mut sig, tokens);
	sig
}

/// SHA-1 hex digest of a signature.
pub fn fingerprint(signature: &str) -> String {
	hex::encode(Sha1::digest(signature.as_bytes()))
}

/// Short, human-facing group id derived from a fingerprint.
pub fn group_id(fingerprint: &str) -> String {
	let prefix: String = fingerprint.chars().take(GROUP_ID_HEX_LEN).collect();
	format!("{GROUP_ID_PREFIX}{}", prefix.to_ascii_uppercase())
}

/// Human-facing title such as `TypeError in screens/Home.tsx#render [EXC-…]`.
pub fn build_display_name<T: AsRef<str>, U: AsRef<str>>(
	lane: Lane,
	exception_types: &[T],
	tokens: &[U],
	group_id: &str,
) -> String {
	let headline = match exception_types {
		[] if lane == Lane::Native => "NativeError".to_string(),
		[] => "Error".to_string(),
		[first, .., last] if lane == Lane::Java => {
			format!("{} caused by {}", first.as_ref(), last.as_ref())
		}
		[first, ..] => first.as_ref().to_string(),
	};

	let location = tokens
		.first()
		.map(|t| shorten(lane, t.as_ref()))
		.unwrap_or_default();

	if location.is_empty() {
		format!("{headline} [{group_id}]")
	} else {
		let joiner = if lane == Lane::Js { "in" } else { "at" };
		format!("{headline} {joiner} {location} [{group_id}]")
	}
}

/// Choose the lane whose frames define the group.
///
/// The lane of the topmost exception wins when it has frames; otherwise the
/// lane with most frames, ties going JS, then JAVA, then NATIVE.
pub fn choose_primary(parsed: &ParsedFrames) -> Lane {
	let js = parsed.js_frames.len();
	let java = parsed.java_frames.len();
	let native = parsed.native_frames.len();

	if js == 0 && java == 0 && native == 0 {
		return Lane::Unknown;
	}

	if let Some(lane) = parsed.primary_exception_lane {
		if !parsed.frames(lane).is_empty() {
			return lane;
		}
	}

	let max = js.max(java).max(native);
	if js == max {
		Lane::Js
	} else if java == max {
		Lane::Java
	} else {
		Lane::Native
	}
}

/// Exception types for the primary lane, falling back to any lane that
/// recorded types.
pub fn types_for_primary(parsed: &ParsedFrames, lane: Lane) -> Vec<String> {
	let types = parsed.types(lane);
	if !types.is_empty() {
		return types.to_vec();
	}
	[Lane::Js, Lane::Java, Lane::Native]
		.into_iter()
		.map(|l| parsed.types(l))
		.find(|t| !t.is_empty())
		.map(<[String]>::to_vec)
		.unwrap_or_default()
}

/// Pick the tokens that enter the signature: the first `top_n` in-app
/// tokens, or the first `top_n` tokens when none is in-app.
pub fn select_signature_tokens<'a>(
	rules: &InAppRules,
	resolved: &'a [ResolvedToken],
	top_n: usize,
) -> Vec<&'a str> {
	let in_app: Vec<&str> = resolved
		.iter()
		.filter(|r| rules.is_resolved_in_app(r))
		.take(top_n)
		.map(|r| r.token.as_str())
		.collect();
	if !in_app.is_empty() {
		return in_app;
	}
	resolved.iter().take(top_n).map(|r| r.token.as_str()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::frame::{Frame, JsFrame};
	use proptest::prelude::*;

	fn resolved(lane: Lane, position: usize, token: &str) -> ResolvedToken {
		ResolvedToken {
			lane,
			original_position: position,
			token: token.to_string(),
			line: token.to_string(),
		}
	}

	fn js(position: usize) -> Frame {
		Frame::js(
			position,
			"",
			JsFrame {
				file: "a.js".to_string(),
				function: "f".to_string(),
				line: None,
				column: None,
			},
		)
	}

	#[test]
	fn signature_with_all_components() {
		let sig = build_signature(
			"js",
			&["Error", "TypeError"],
			&["src/a.js#one", "src/b.js#two"],
		);
		assert_eq!(
			sig,
			"v1|platform:js|exc:Error>TypeError|frames:src/a.js#one>src/b.js#two"
		);
	}

	#[test]
	fn signature_with_empty_parts() {
		let empty: [&str; 0] = [];
		assert_eq!(
			build_signature("java", &empty, &["Main#run"]),
			"v1|platform:java|exc:|frames:Main#run"
		);
		assert_eq!(
			build_signature("android-ndk", &["SIGSEGV"], &empty),
			"v1|platform:android-ndk|exc:SIGSEGV|frames:"
		);
	}

	#[test]
	fn fingerprint_is_sha1_hex() {
		// sha1("abc")
		assert_eq!(fingerprint("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
	}

	#[test]
	fn group_id_uses_upper_case_prefix() {
		assert_eq!(
			group_id("a9993e364706816aba3e25717850c26c9cd0d89d"),
			"EXC-A9993E3647"
		);
	}

	#[test]
	fn display_name_for_java_cause_chain() {
		let name = build_display_name(
			Lane::Java,
			&["RuntimeException", "NullPointerException"],
			&["com.example.ui.Home#onCreate"],
			"EXC-456DEF",
		);
		assert_eq!(
			name,
			"RuntimeException caused by NullPointerException at ui.Home#onCreate [EXC-456DEF]"
		);
	}

	#[test]
	fn display_name_for_js_and_native() {
		assert_eq!(
			build_display_name(
				Lane::Js,
				&["TypeError"],
				&["app/utils/helper.js#myFunction"],
				"EXC-1"
			),
			"TypeError in utils/helper.js#myFunction [EXC-1]"
		);
		let empty: [&str; 0] = [];
		assert_eq!(
			build_display_name(Lane::Native, &empty, &["libapp.so#crash"], "EXC-2"),
			"NativeError at libapp.so#crash [EXC-2]"
		);
		assert_eq!(
			build_display_name(Lane::Js, &["Error"], &empty, "EXC-3"),
			"Error [EXC-3]"
		);
		assert_eq!(
			build_display_name(Lane::Java, &empty, &["Main#run"], "EXC-4"),
			"Error at Main#run [EXC-4]"
		);
	}

	#[test]
	fn primary_lane_prefers_exception_lane_with_frames() {
		let mut parsed = ParsedFrames::default();
		assert_eq!(choose_primary(&parsed), Lane::Unknown);

		parsed.js_frames = vec![js(0)];
		parsed.native_frames = vec![js(1), js(2)];
		parsed.primary_exception_lane = Some(Lane::Js);
		assert_eq!(choose_primary(&parsed), Lane::Js);

		parsed.primary_exception_lane = Some(Lane::Java);
		assert_eq!(choose_primary(&parsed), Lane::Native);

		parsed.native_frames.clear();
		parsed.java_frames = vec![js(3)];
		parsed.primary_exception_lane = None;
		assert_eq!(choose_primary(&parsed), Lane::Js);
	}

	#[test]
	fn types_fall_back_across_lanes() {
		let parsed = ParsedFrames {
			java_types: vec!["IllegalStateException".to_string()],
			..Default::default()
		};
		assert_eq!(
			types_for_primary(&parsed, Lane::Js),
			vec!["IllegalStateException"]
		);
		assert!(types_for_primary(&ParsedFrames::default(), Lane::Java).is_empty());
	}

	#[test]
	fn third_party_tokens_do_not_enter_signature() {
		let rules = InAppRules::default();
		let tokens = vec![
			resolved(Lane::Js, 0, "node_modules/react/index.js#render"),
			resolved(Lane::Js, 1, "src/App.tsx#App"),
			resolved(Lane::Js, 2, "src/index.tsx#main"),
		];
		assert_eq!(
			select_signature_tokens(&rules, &tokens, 10),
			vec!["src/App.tsx#App", "src/index.tsx#main"]
		);
		assert_eq!(
			select_signature_tokens(&rules, &tokens, 1),
			vec!["src/App.tsx#App"]
		);
	}

	#[test]
	fn all_third_party_falls_back_to_top_frames() {
		let rules = InAppRules::default();
		let tokens = vec![
			resolved(Lane::Js, 0, "node_modules/a.js#x"),
			resolved(Lane::Js, 1, "node_modules/b.js#y"),
		];
		assert_eq!(select_signature_tokens(&rules, &tokens, 1), vec!["node_modules/a.js#x"]);
	}

	#[test]
	fn runtime_noise_does_not_change_group() {
		let rules = InAppRules::default();
		let first = vec![
			resolved(Lane::Js, 0, "src/Home.tsx#renderScreen"),
			resolved(Lane::Js, 1, "node_modules/react-native/Renderer.js#commitRoot"),
		];
		let second = vec![
			resolved(Lane::Js, 0, "src/Home.tsx#renderScreen"),
			resolved(Lane::Js, 1, "node_modules/react-native/Renderer.js#performWork"),
			resolved(Lane::Js, 2, "node_modules/scheduler/index.js#flush"),
		];
		let a = Group::from_tokens(
			Lane::Js,
			&["TypeError"],
			&select_signature_tokens(&rules, &first, 10),
		);
		let b = Group::from_tokens(
			Lane::Js,
			&["TypeError"],
			&select_signature_tokens(&rules, &second, 10),
		);
		assert_eq!(a.group_id, b.group_id);
		assert_eq!(a, b);
	}

	proptest! {
		#[test]
		fn signature_is_deterministic(
			types in proptest::collection::vec("[A-Za-z]{1,12}", 0..4),
			tokens in proptest::collection::vec("[a-z/]{1,12}#[a-z]{1,8}", 0..8),
		) {
			let a = Group::from_tokens(Lane::Js, &types, &tokens);
			let b = Group::from_tokens(Lane::Js, &types.clone(), &tokens.clone());
			prop_assert_eq!(&a, &b);
			prop_assert_eq!(a.fingerprint.len(), 40);
			prop_assert!(a.group_id.starts_with(GROUP_ID_PREFIX));
			prop_assert_eq!(a.group_id.len(), GROUP_ID_PREFIX.len() + GROUP_ID_HEX_LEN);
		}

		#[test]
		fn frame_order_matters(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
			prop_assume!(a != b);
			let forward = build_signature("js", &["Error"], &[a.as_str(), b.as_str()]);
			let reverse = build_signature("js", &["Error"], &[b.as_str(), a.as_str()]);
			prop_assert_ne!(fingerprint(&forward), fingerprint(&reverse));
		}
	}
}
