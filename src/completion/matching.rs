use nucleo_matcher::{
    Config, Matcher, Utf32Str,
    pattern::{CaseMatching, Normalization, Pattern},
};

/// Which match rules beyond prefix matching are active for this request.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub camel_case: bool,
    pub substring: bool,
    pub subword: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            camel_case: true,
            substring: false,
            subword: false,
        }
    }
}

/// How a candidate name matched the token, strongest first. Rules are
/// mutually exclusive: the first applicable one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchQuality {
    ExactCase,
    ExactIgnoreCase,
    PrefixCase,
    Prefix,
    CamelCase,
    Substring,
    Subword,
}

pub fn match_name(token: &str, candidate: &str, policy: &MatchPolicy) -> Option<MatchQuality> {
    if token.is_empty() {
        return Some(MatchQuality::Prefix);
    }
    if candidate == token {
        return Some(MatchQuality::ExactCase);
    }
    if candidate.eq_ignore_ascii_case(token) {
        return Some(MatchQuality::ExactIgnoreCase);
    }
    if candidate.starts_with(token) {
        return Some(MatchQuality::PrefixCase);
    }
    let token_lower = token.to_lowercase();
    let candidate_lower = candidate.to_lowercase();
    if candidate_lower.starts_with(&token_lower) {
        return Some(MatchQuality::Prefix);
    }
    if policy.camel_case && camel_case_match(token, candidate) {
        return Some(MatchQuality::CamelCase);
    }
    if policy.substring && candidate_lower.contains(&token_lower) {
        return Some(MatchQuality::Substring);
    }
    if policy.subword && subword_match(token, candidate).is_some() {
        return Some(MatchQuality::Subword);
    }
    None
}

/// CamelCase matching: the token splits into chunks at its uppercase
/// boundaries, and each chunk must prefix a word of the candidate, in
/// order, anchored at the first word. `newFi` matches
/// `newFixedThreadPool`; `NPE` matches `NullPointerException`.
pub fn camel_case_match(token: &str, candidate: &str) -> bool {
    let chunks = camel_words(token);
    let words = camel_words(candidate);
    if chunks.is_empty() || words.is_empty() {
        return false;
    }
    if !starts_with_ignore_case(words[0], chunks[0]) {
        return false;
    }
    let mut word_idx = 1;
    for chunk in &chunks[1..] {
        let mut matched = false;
        while word_idx < words.len() {
            if starts_with_ignore_case(words[word_idx], chunk) {
                matched = true;
                word_idx += 1;
                break;
            }
            word_idx += 1;
        }
        if !matched {
            return false;
        }
    }
    true
}

fn starts_with_ignore_case(word: &str, prefix: &str) -> bool {
    word.len() >= prefix.len() && word[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Split an identifier at camel-hump boundaries. A run of uppercase
/// letters counts as one word start per letter, so `NPE` yields three
/// single-letter words.
fn camel_words(ident: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    for (i, ch) in ident.char_indices() {
        if i > 0 && ch.is_uppercase() {
            words.push(&ident[start..i]);
            start = i;
        }
    }
    if start < ident.len() {
        words.push(&ident[start..]);
    }
    words
}

/// Subword matching, delegated to the fuzzy matcher. Returns the match
/// score (`None` when the token is not a subsequence of the candidate).
pub fn subword_match(token: &str, candidate: &str) -> Option<u32> {
    if token.is_empty() {
        return Some(0);
    }
    let mut matcher = Matcher::new(Config::DEFAULT);
    let pat = Pattern::parse(token, CaseMatching::Ignore, Normalization::Smart);
    let mut buf = Vec::new();
    let haystack = Utf32Str::new(candidate, &mut buf);
    pat.score(haystack, &mut matcher)
}
