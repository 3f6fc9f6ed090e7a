//! Repair pipeline for malformed resource files.
//!
//! Recovery is an ordered list of attempts, from the least destructive
//! (quoting fixes) to the most destructive (truncation, which may drop
//! trailing keys). Every attempt produces candidate text which is accepted
//! only if the strict parser accepts it; the first accepted attempt wins.
//!
//! The three text rewrites are cumulative: attempt *k* runs on the output of
//! attempt *k-1*. The lenient parse and the truncation both start again from
//! the original bytes. All rewrites leave the inside of string literals
//! untouched.
//!
//! This module performs no I/O. Persisting a repair (backup, then overwrite)
//! is the loader's job.

use crate::i18n::parser::parse_document;
use crate::i18n::tree::ResourceTree;
use regex::{Captures, Regex};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// One step of the repair chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStrategy {
    /// Input already parsed; nothing was done
    None,
    KeyQuoting,
    TrailingComma,
    BareValueQuoting,
    LenientParse,
    BraceTruncation,
}

impl RepairStrategy {
    /// Attempt order after the identity check
    pub const CHAIN: [RepairStrategy; 5] = [
        RepairStrategy::KeyQuoting,
        RepairStrategy::TrailingComma,
        RepairStrategy::BareValueQuoting,
        RepairStrategy::LenientParse,
        RepairStrategy::BraceTruncation,
    ];

    /// Stable name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            RepairStrategy::None => "none",
            RepairStrategy::KeyQuoting => "key-quoting-repair",
            RepairStrategy::TrailingComma => "trailing-comma-repair",
            RepairStrategy::BareValueQuoting => "bare-value-quoting-repair",
            RepairStrategy::LenientParse => "lenient-parse",
            RepairStrategy::BraceTruncation => "brace-balanced-truncation",
        }
    }
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A successfully recovered document.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedDocument {
    /// Parsed document with original scalar types
    pub document: Map<String, Value>,

    /// Resource tree built from `document`
    pub tree: ResourceTree,

    /// Normalized text to persist (pretty-printed JSON, trailing newline)
    pub text: String,
}

/// Every strategy was tried and none produced valid data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairExhausted {
    /// Last strategy attempted before giving up
    pub last_attempted: RepairStrategy,

    /// Why the last attempt was rejected
    pub reason: String,
}

impl fmt::Display for RepairExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repair exhausted (last attempted: {}): {}",
            self.last_attempted, self.reason
        )
    }
}

/// Result of running the pipeline over one file. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// Strategy whose output re-validated (`None` for already-valid input)
    pub strategy_used: RepairStrategy,

    /// Transforms that actually changed the text, in the order applied
    pub applied: Vec<RepairStrategy>,

    pub result: Result<RepairedDocument, RepairExhausted>,
}

impl RepairOutcome {
    /// Whether the file was recovered
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    /// Recovered tree, if any
    pub fn tree(&self) -> Option<&ResourceTree> {
        self.result.as_ref().ok().map(|repaired| &repaired.tree)
    }

    /// Whether the recovered text differs from the input and should be persisted
    pub fn needs_write(&self) -> bool {
        self.success() && self.strategy_used != RepairStrategy::None
    }
}

/// Run the repair chain over raw file content.
pub fn repair(bytes: &[u8]) -> RepairOutcome {
    if let Ok(document) = parse_document(bytes) {
        return accept(RepairStrategy::None, Vec::new(), document);
    }

    let original = match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}'),
        Err(e) => {
            return exhausted(
                Vec::new(),
                RepairStrategy::None,
                format!("input is not valid UTF-8: {}", e),
            )
        }
    };

    let mut text = original.to_string();
    let mut applied = Vec::new();
    let mut last_reason = String::new();

    for strategy in [
        RepairStrategy::KeyQuoting,
        RepairStrategy::TrailingComma,
        RepairStrategy::BareValueQuoting,
    ] {
        let candidate = rewrite(strategy, &text);
        if candidate != text {
            applied.push(strategy);
            text = candidate;
        }
        match parse_document(text.as_bytes()) {
            Ok(document) => return accept(strategy, applied, document),
            Err(e) => {
                debug!("{} did not restore validity: {}", strategy, e);
                last_reason = e.to_string();
            }
        }
    }

    match lenient_candidate(original) {
        Ok(candidate) => match parse_document(candidate.as_bytes()) {
            Ok(document) => {
                return accept(
                    RepairStrategy::LenientParse,
                    vec![RepairStrategy::LenientParse],
                    document,
                )
            }
            Err(e) => last_reason = e.to_string(),
        },
        Err(reason) => {
            debug!("{} failed: {}", RepairStrategy::LenientParse, reason);
            last_reason = reason;
        }
    }

    match truncate_balanced(original) {
        Some(candidate) => match parse_document(candidate.as_bytes()) {
            Ok(document) => {
                return accept(
                    RepairStrategy::BraceTruncation,
                    vec![RepairStrategy::BraceTruncation],
                    document,
                )
            }
            Err(e) => {
                debug!("{} did not restore validity: {}", RepairStrategy::BraceTruncation, e);
                last_reason = e.to_string();
            }
        },
        None => last_reason = format!("no opening brace found ({})", last_reason),
    }

    exhausted(applied, RepairStrategy::BraceTruncation, last_reason)
}

fn accept(
    strategy: RepairStrategy,
    applied: Vec<RepairStrategy>,
    document: Map<String, Value>,
) -> RepairOutcome {
    let text = match serde_json::to_string_pretty(&document) {
        Ok(text) => text + "\n",
        Err(e) => return exhausted(applied, strategy, e.to_string()),
    };
    let tree = ResourceTree::from_json(Value::Object(document.clone())).unwrap_or_default();

    RepairOutcome {
        strategy_used: strategy,
        applied,
        result: Ok(RepairedDocument {
            document,
            tree,
            text,
        }),
    }
}

fn exhausted(
    applied: Vec<RepairStrategy>,
    last_attempted: RepairStrategy,
    reason: String,
) -> RepairOutcome {
    RepairOutcome {
        strategy_used: last_attempted,
        applied,
        result: Err(RepairExhausted {
            last_attempted,
            reason,
        }),
    }
}

// ==================== Text rewrites ====================

static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
static TRAILING_COMMA_REGEX: OnceLock<Regex> = OnceLock::new();
static BARE_VALUE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Apply one of the cumulative text rewrites.
fn rewrite(strategy: RepairStrategy, text: &str) -> String {
    match strategy {
        RepairStrategy::KeyQuoting => rewrite_outside_strings(text, quote_bare_keys),
        RepairStrategy::TrailingComma => rewrite_outside_strings(text, drop_trailing_commas),
        RepairStrategy::BareValueQuoting => rewrite_outside_strings(text, quote_bare_values),
        _ => text.to_string(),
    }
}

/// `{name: ...` / `, name: ...` -> `{"name": ...`
fn quote_bare_keys(code: &str) -> String {
    let regex = KEY_REGEX.get_or_init(|| {
        Regex::new(r"([{,]\s*)([A-Za-z0-9_$][A-Za-z0-9_$.\-]*)(\s*:)").unwrap()
    });
    regex.replace_all(code, r#"$1"$2"$3"#).into_owned()
}

/// `, }` -> ` }` and `, ]` -> ` ]`
fn drop_trailing_commas(code: &str) -> String {
    let regex = TRAILING_COMMA_REGEX.get_or_init(|| Regex::new(r",(\s*[}\]])").unwrap());
    regex.replace_all(code, "$1").into_owned()
}

/// `: Dashboard,` -> `: "Dashboard",` (numbers and true/false/null untouched)
fn quote_bare_values(code: &str) -> String {
    let regex = BARE_VALUE_REGEX.get_or_init(|| {
        Regex::new(r"(:\s*)([A-Za-z_$][A-Za-z0-9_$.\-]*)(\s*[,}])").unwrap()
    });
    regex
        .replace_all(code, |caps: &Captures| {
            let token = &caps[2];
            if matches!(token, "true" | "false" | "null") {
                caps[0].to_string()
            } else {
                format!("{}\"{}\"{}", &caps[1], token, &caps[3])
            }
        })
        .into_owned()
}

/// Apply `rewrite` to every stretch of text outside double-quoted strings.
fn rewrite_outside_strings(text: &str, rewrite: impl Fn(&str) -> String) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            out.push_str(&rewrite(&text[code_start..i]));
            let end = string_end(bytes, i);
            out.push_str(&text[i..end]);
            code_start = end;
            i = end;
        } else {
            i += 1;
        }
    }
    out.push_str(&rewrite(&text[code_start..]));
    out
}

/// Index just past the string literal opening at `start` (or end of input).
fn string_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

// ==================== Lenient parse ====================

/// Parse the original text with the JSON5 parser and re-render it as JSON.
///
/// `Infinity` and `NaN` have no JSON form; a document holding one is rejected
/// rather than rewritten with a made-up value.
fn lenient_candidate(original: &str) -> Result<String, String> {
    let FiniteValue(value) = json5::from_str(original).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("lenient parse produced a non-object top-level value".to_string());
    }
    serde_json::to_string(&value).map_err(|e| e.to_string())
}

/// A JSON value whose numbers are all finite.
struct FiniteValue(Value);

impl<'de> Deserialize<'de> for FiniteValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FiniteVisitor).map(FiniteValue)
    }
}

struct FiniteVisitor;

impl<'de> Visitor<'de> for FiniteVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value with finite numbers")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("number {} has no JSON representation", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(FiniteVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(FiniteValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut object = Map::new();
        while let Some((key, FiniteValue(value))) = map.next_entry::<String, FiniteValue>()? {
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }
}

// ==================== Truncation ====================

/// Keep the text from the first `{` up to the point where bracket depth
/// first returns to zero, closing with `}` if it does not already end in one.
/// If depth never returns to zero the whole remainder is kept and one `}` is
/// appended.
fn truncate_balanced(original: &str) -> Option<String> {
    let start = original.find('{')?;
    let bytes = original.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i);
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let mut kept = original[start..=i].to_string();
                    if !kept.ends_with('}') {
                        kept.push('}');
                    }
                    return Some(kept);
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut kept = original[start..].trim_end().to_string();
    kept.push('}');
    Some(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::parser::parse;
    use crate::i18n::tree::{KeyPath, ResourceNode};
    use proptest::prelude::*;

    fn compact(outcome: &RepairOutcome) -> String {
        let repaired = outcome.result.as_ref().expect("Should be repaired");
        serde_json::to_string(&repaired.document).unwrap()
    }

    // ==================== Identity Tests ====================

    #[test]
    fn test_valid_input_is_identity() {
        let outcome = repair(br#"{"a": "b"}"#);
        assert_eq!(outcome.strategy_used, RepairStrategy::None);
        assert!(outcome.applied.is_empty());
        assert!(outcome.success());
        assert!(!outcome.needs_write());
    }

    // ==================== Strategy Tests ====================

    #[test]
    fn test_key_quoting_repair() {
        let outcome = repair(br#"{name: "Dashboard"}"#);
        assert_eq!(outcome.strategy_used, RepairStrategy::KeyQuoting);
        assert_eq!(outcome.applied, vec![RepairStrategy::KeyQuoting]);
        assert_eq!(compact(&outcome), r#"{"name":"Dashboard"}"#);
        assert!(outcome.needs_write());
    }

    #[test]
    fn test_key_quoting_wins_over_later_strategies() {
        // The lenient parser would accept this too; the earlier strategy must win
        let outcome = repair(b"{title: \"Jobs\", nested: {count: 2}}");
        assert_eq!(outcome.strategy_used, RepairStrategy::KeyQuoting);
    }

    #[test]
    fn test_key_then_trailing_comma_repair() {
        let outcome = repair(br#"{name: "Dashboard", count: 5,}"#);
        assert_eq!(outcome.strategy_used, RepairStrategy::TrailingComma);
        assert_eq!(
            outcome.applied,
            vec![RepairStrategy::KeyQuoting, RepairStrategy::TrailingComma]
        );
        assert_eq!(compact(&outcome), r#"{"name":"Dashboard","count":5}"#);
    }

    #[test]
    fn test_trailing_comma_alone() {
        let outcome = repair(b"{\"items\": [\"a\", \"b\",], \"x\": \"y\",\n}");
        assert_eq!(outcome.strategy_used, RepairStrategy::TrailingComma);
        assert_eq!(outcome.applied, vec![RepairStrategy::TrailingComma]);
    }

    #[test]
    fn test_bare_value_quoting() {
        let outcome = repair(br#"{"status": pending, "enabled": true, "count": 3}"#);
        assert_eq!(outcome.strategy_used, RepairStrategy::BareValueQuoting);
        assert_eq!(
            compact(&outcome),
            r#"{"status":"pending","enabled":true,"count":3}"#
        );
    }

    #[test]
    fn test_bare_value_quoting_keeps_literals() {
        assert_eq!(quote_bare_values(": null}"), ": null}");
        assert_eq!(quote_bare_values(": false,"), ": false,");
        assert_eq!(quote_bare_values(": 42,"), ": 42,");
        assert_eq!(quote_bare_values(": yes,"), ": \"yes\",");
    }

    #[test]
    fn test_lenient_parse_handles_single_quotes_and_comments() {
        let input = b"{\n  // greeting\n  'hello': 'Bonjour'\n}";
        let outcome = repair(input);
        assert_eq!(outcome.strategy_used, RepairStrategy::LenientParse);
        assert_eq!(outcome.applied, vec![RepairStrategy::LenientParse]);
        assert_eq!(compact(&outcome), r#"{"hello":"Bonjour"}"#);
    }

    #[test]
    fn test_lenient_parse_rejects_non_finite_numbers() {
        assert!(lenient_candidate("{'a': NaN}").is_err());
        assert!(lenient_candidate("{'a': {'b': [1, Infinity]}}").is_err());

        let outcome = repair(b"{a: -Infinity}");
        assert!(!outcome.success());
    }

    #[test]
    fn test_lenient_parse_keeps_finite_numbers_and_null() {
        let candidate = lenient_candidate("{'ratio': 1.5, 'empty': null}").unwrap();
        assert_eq!(candidate, r#"{"ratio":1.5,"empty":null}"#);
    }

    #[test]
    fn test_truncation_drops_trailing_garbage() {
        let outcome = repair(br#"{"a": "x", "b": {"c": "y"}} <<<<<<< HEAD"#);
        assert_eq!(outcome.strategy_used, RepairStrategy::BraceTruncation);
        assert_eq!(compact(&outcome), r#"{"a":"x","b":{"c":"y"}}"#);
    }

    #[test]
    fn test_truncation_closes_unterminated_document() {
        let outcome = repair(br#"{"a": "x", "b": "y""#);
        assert_eq!(outcome.strategy_used, RepairStrategy::BraceTruncation);
        assert_eq!(compact(&outcome), r#"{"a":"x","b":"y"}"#);
    }

    #[test]
    fn test_truncation_ignores_braces_inside_strings() {
        let candidate = truncate_balanced(r#"{"a": "}{", "b": "c"} tail"#).unwrap();
        assert_eq!(candidate, r#"{"a": "}{", "b": "c"}"#);
    }

    #[test]
    fn test_truncation_without_brace() {
        assert!(truncate_balanced("no json here").is_none());
    }

    // ==================== Failure Tests ====================

    #[test]
    fn test_unrepairable_input_is_exhausted() {
        let outcome = repair(b"this is not json at all");
        assert!(!outcome.success());
        let failure = outcome.result.unwrap_err();
        assert_eq!(failure.last_attempted, RepairStrategy::BraceTruncation);
        assert!(failure.to_string().contains("brace-balanced-truncation"));
    }

    #[test]
    fn test_invalid_utf8_is_exhausted() {
        let outcome = repair(&[b'{', 0xff, 0xfe, b'}']);
        assert!(!outcome.success());
        assert!(outcome.result.unwrap_err().reason.contains("UTF-8"));
    }

    // ==================== String Literal Safety Tests ====================

    #[test]
    fn test_rewrites_leave_string_contents_alone() {
        let outcome = repair(br#"{greeting: "Hi, name: you,}", other: "a,]"}"#);
        assert_eq!(outcome.strategy_used, RepairStrategy::KeyQuoting);
        let tree = outcome.tree().unwrap();
        assert_eq!(
            tree.get(&KeyPath::new("greeting").unwrap()),
            Some(&ResourceNode::Leaf("Hi, name: you,}".to_string()))
        );
    }

    #[test]
    fn test_string_end_handles_escapes() {
        let text = br#""a\"b" rest"#;
        assert_eq!(string_end(text, 0), 6);
    }

    // ==================== Fixed Point Tests ====================

    #[test]
    fn test_repaired_text_is_fixed_point() {
        let first = repair(br#"{name: "Dashboard", count: 5,}"#);
        let repaired = first.result.as_ref().unwrap();

        let second = repair(repaired.text.as_bytes());
        assert_eq!(second.strategy_used, RepairStrategy::None);
        assert_eq!(second.tree(), Some(&repaired.tree));
        assert_eq!(parse(repaired.text.as_bytes()).unwrap(), repaired.tree);
    }

    #[test]
    fn test_strategy_names() {
        let names: Vec<_> = RepairStrategy::CHAIN.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "key-quoting-repair",
                "trailing-comma-repair",
                "bare-value-quoting-repair",
                "lenient-parse",
                "brace-balanced-truncation"
            ]
        );
        assert_eq!(RepairStrategy::None.to_string(), "none");
    }

    // ==================== Property Tests ====================

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = "[a-zA-Z0-9 ,:{}\\[\\]]{0,10}".prop_map(Value::String);
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(("[a-zA-Z_][a-zA-Z0-9_]{0,6}", inner), 1..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect()))
        })
    }

    fn arb_document() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::vec(("[a-zA-Z_][a-zA-Z0-9_]{0,6}", arb_value()), 1..5)
            .prop_map(|entries| entries.into_iter().collect())
    }

    /// Render an object with every key left unquoted.
    fn render_bare_keys(value: &Value) -> String {
        match value {
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, render_bare_keys(v)))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            other => serde_json::to_string(other).unwrap(),
        }
    }

    proptest! {
        #[test]
        fn prop_valid_documents_are_never_repaired(document in arb_document()) {
            let text = serde_json::to_string_pretty(&Value::Object(document)).unwrap();
            let outcome = repair(text.as_bytes());
            prop_assert_eq!(outcome.strategy_used, RepairStrategy::None);
        }

        #[test]
        fn prop_bare_keys_are_recovered_by_key_quoting(document in arb_document()) {
            let expected = ResourceTree::from_json(Value::Object(document.clone())).unwrap();
            let text = render_bare_keys(&Value::Object(document));
            let outcome = repair(text.as_bytes());
            prop_assert_eq!(outcome.strategy_used, RepairStrategy::KeyQuoting);
            prop_assert_eq!(outcome.tree(), Some(&expected));
        }

        #[test]
        fn prop_repair_output_is_fixed_point(document in arb_document()) {
            let text = render_bare_keys(&Value::Object(document));
            let first = repair(text.as_bytes());
            let repaired = first.result.as_ref().unwrap();
            let second = repair(repaired.text.as_bytes());
            prop_assert_eq!(second.strategy_used, RepairStrategy::None);
            prop_assert_eq!(second.tree(), Some(&repaired.tree));
        }
    }
}
