//! Relevance scoring. Every proposal's rank is the sum of independent
//! weighted terms; no term looks at any other proposal, so scoring is O(1)
//! per proposal and final ordering is a plain stable sort on the total.

use crate::completion::matching::MatchQuality;

pub const R_DEFAULT: i32 = 30;
/// Flat bonuses that keep semantically resolved proposals above
/// heuristic/unresolved ones.
pub const R_RESOLVED: i32 = 10;
pub const R_INTERESTING: i32 = 5;
pub const R_NON_RESTRICTED: i32 = 3;

// Name-match ladder. Mutually exclusive; first applicable rule wins.
pub const R_EXACT_CASE: i32 = 40;
pub const R_EXACT_NAME: i32 = 30;
pub const R_CASE_PREFIX: i32 = 25;
pub const R_CAMEL_CASE: i32 = 20;
pub const R_SUBSTRING: i32 = 15;
pub const R_SUBWORD: i32 = 10;

// Expected-type tiers.
pub const R_EXACT_EXPECTED_TYPE: i32 = 30;
pub const R_EXPECTED_TYPE: i32 = 20;
/// Compatible but already handled by an inner catch clause.
pub const R_DISCOURAGED_EXPECTED_TYPE: i32 = 5;
/// Proposal of an unnamed-package type that still fits the expected type.
pub const R_UNNAMED_PACKAGE_EXPECTED_TYPE: i32 = 10;
/// `void` where a value is expected ranks below the default tier.
pub const R_VOID: i32 = -15;

// Qualification. Exactly one of these (or neither) applies to a proposal.
pub const R_UNQUALIFIED: i32 = 3;
pub const R_QUALIFIED: i32 = 2;

/// Declared directly on the qualifying type rather than inherited.
pub const R_EXACT_DECLARING_TYPE: i32 = 5;
/// Instance member reached through instance qualification.
pub const R_NON_STATIC_ACCESS: i32 = 5;

pub const R_CONSTRUCTOR: i32 = 3;
pub const R_ENUM_CONSTANT: i32 = 5;
/// Kind bonuses, applied only inside extends/implements completion.
pub const R_TARGET_KIND: i32 = 5;
/// Types under `java.`.
pub const R_JAVA_LIBRARY: i32 = 2;
/// Annotation type usable at the completed position per its `@Target`.
pub const R_ANNOTATION_TARGET: i32 = 5;
/// `final` constant proposed as a `case` label.
pub const R_FINAL: i32 = 3;
pub const R_DEPRECATED: i32 = -5;

/// Baseline for proposals backed by a resolved binding.
pub fn baseline_resolved() -> i32 {
    R_DEFAULT + R_RESOLVED + R_INTERESTING + R_NON_RESTRICTED
}

/// Baseline for keywords and other proposals with no binding behind them.
pub fn baseline_unresolved() -> i32 {
    R_DEFAULT + R_INTERESTING + R_NON_RESTRICTED
}

pub fn name_match_bonus(quality: MatchQuality) -> i32 {
    match quality {
        MatchQuality::ExactCase => R_EXACT_CASE,
        MatchQuality::ExactIgnoreCase => R_EXACT_NAME,
        MatchQuality::PrefixCase => R_CASE_PREFIX,
        MatchQuality::Prefix => 0,
        MatchQuality::CamelCase => R_CAMEL_CASE,
        MatchQuality::Substring => R_SUBSTRING,
        MatchQuality::Subword => R_SUBWORD,
    }
}

/// Qualification bonus. `qualified` is whether the completion text carries
/// a qualifier; `required` is whether an unqualified reference would not
/// resolve. The two bonuses are mutually exclusive by construction.
pub fn qualification_bonus(qualified: bool, required: bool) -> i32 {
    match (qualified, required) {
        (false, false) => R_UNQUALIFIED,
        (true, true) => R_QUALIFIED,
        _ => 0,
    }
}

pub fn deprecation_penalty(deprecated: bool) -> i32 {
    if deprecated { R_DEPRECATED } else { 0 }
}
