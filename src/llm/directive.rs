//! Extract a tool directive from free-form assistant text
//!
//! The model is asked to answer tool requests in exactly this shape:
//!
//! ```text
//! TOOL: listResources
//! ARGS: {"Kind": "Pod", "namespace": "gsoc"}
//! ```
//!
//! Each marker must start a line (leading whitespace is allowed). Only the
//! first `TOOL:` line and the first `ARGS:` line count: one directive per
//! turn. A reply with either marker missing is an ordinary answer.

use serde_json::{Map, Value};

use crate::error::ErrorKind;

/// Marker introducing the tool name
pub const TOOL_MARKER: &str = "TOOL:";
/// Marker introducing the JSON argument object
pub const ARGS_MARKER: &str = "ARGS:";

/// A tool call the agent asked for
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl Directive {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Render in the two-line form the parser accepts
    pub fn format(&self) -> String {
        format!(
            "{} {}\n{} {}",
            TOOL_MARKER,
            self.tool_name,
            ARGS_MARKER,
            Value::Object(self.arguments.clone())
        )
    }
}

/// Result of scanning one assistant reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// Both markers present and the arguments parse as an object
    Invocation(Directive),
    /// No directive; show the text as-is
    Plain,
    /// Both markers present but unusable
    Malformed { reason: String, payload: String },
}

impl ParsedReply {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            ParsedReply::Invocation(_) => "invocation",
            ParsedReply::Plain => "plain",
            ParsedReply::Malformed { .. } => "malformed",
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ParsedReply::Malformed { .. } => Some(ErrorKind::DirectiveMalformed),
            _ => None,
        }
    }
}

/// Text following `marker` on the first line that starts with it
fn marker_value<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.lines()
        .map(str::trim_start)
        .find_map(|line| line.strip_prefix(marker))
        .map(str::trim)
}

/// Scan `text` for a `TOOL:` / `ARGS:` directive
pub fn parse_directive(text: &str) -> ParsedReply {
    let (tool_name, raw_args) = match (
        marker_value(text, TOOL_MARKER),
        marker_value(text, ARGS_MARKER),
    ) {
        (Some(tool), Some(args)) => (tool, args),
        _ => return ParsedReply::Plain,
    };

    if tool_name.is_empty() {
        return ParsedReply::Malformed {
            reason: "empty tool name".to_string(),
            payload: raw_args.to_string(),
        };
    }

    match serde_json::from_str::<Value>(raw_args) {
        Ok(Value::Object(arguments)) => ParsedReply::Invocation(Directive::new(tool_name, arguments)),
        Ok(other) => ParsedReply::Malformed {
            reason: format!("arguments must be a JSON object, got {}", json_type(&other)),
            payload: raw_args.to_string(),
        },
        Err(e) => ParsedReply::Malformed {
            reason: e.to_string(),
            payload: raw_args.to_string(),
        },
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_round_trip() {
        let cases = vec![
            Directive::new("listResources", args(json!({"Kind": "Pod", "namespace": "gsoc"}))),
            Directive::new("getAPIResources", Map::new()),
            Directive::new(
                "describeResource",
                args(json!({"Kind": "Deployment", "name": "web", "labels": {"app": "x"}, "replicas": 3})),
            ),
        ];

        for directive in cases {
            assert_eq!(parse_directive(&directive.format()), ParsedReply::Invocation(directive.clone()));
        }
    }

    #[test]
    fn test_embedded_in_prose() {
        let text = "Sure, let me check.\n\n  TOOL: listResources\n  ARGS: {\"Kind\": \"Namespace\"}\n\nOne moment.";
        match parse_directive(text) {
            ParsedReply::Invocation(d) => {
                assert_eq!(d.tool_name, "listResources");
                assert_eq!(d.arguments["Kind"], "Namespace");
            }
            other => panic!("expected invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_marker_is_plain() {
        assert_eq!(parse_directive("There are 3 pods running."), ParsedReply::Plain);
        assert_eq!(parse_directive("TOOL: listResources"), ParsedReply::Plain);
        assert_eq!(parse_directive("ARGS: {}"), ParsedReply::Plain);
        assert_eq!(parse_directive(""), ParsedReply::Plain);
    }

    #[test]
    fn test_marker_must_start_a_line() {
        let text = "You could answer with TOOL: listResources and ARGS: {}";
        assert_eq!(parse_directive(text), ParsedReply::Plain);
    }

    #[test]
    fn test_malformed_args() {
        let reply = parse_directive("TOOL: listResources\nARGS: {\"Kind\": Pod}");
        match &reply {
            ParsedReply::Malformed { payload, .. } => assert_eq!(payload, "{\"Kind\": Pod}"),
            other => panic!("expected malformed, got {:?}", other),
        }
        assert_eq!(reply.error_kind(), Some(ErrorKind::DirectiveMalformed));
    }

    #[test]
    fn test_non_object_args_are_malformed() {
        let reply = parse_directive("TOOL: listResources\nARGS: [1, 2]");
        assert!(matches!(reply, ParsedReply::Malformed { .. }));
    }

    #[test]
    fn test_empty_tool_name_is_malformed() {
        let reply = parse_directive("TOOL:   \nARGS: {}");
        assert!(matches!(reply, ParsedReply::Malformed { .. }));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let text = "TOOL: first\nARGS: {\"n\": 1}\nTOOL: second\nARGS: {\"n\": 2}";
        match parse_directive(text) {
            ParsedReply::Invocation(d) => {
                assert_eq!(d.tool_name, "first");
                assert_eq!(d.arguments["n"], 1);
            }
            other => panic!("expected invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_args_before_tool() {
        let text = "ARGS: {\"Kind\": \"Pod\"}\nTOOL: listResources";
        assert!(matches!(parse_directive(text), ParsedReply::Invocation(_)));
    }

    fn starts_with_marker(line: &str) -> bool {
        let line = line.trim_start();
        line.starts_with(TOOL_MARKER) || line.starts_with(ARGS_MARKER)
    }

    // Identifier-like tool names, as servers advertise them
    fn tool_name_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,31}").unwrap()
    }

    fn json_leaf_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            ".{0,40}".prop_map(Value::String),
        ]
    }

    fn json_value_strategy() -> impl Strategy<Value = Value> {
        json_leaf_strategy().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec((".{0,12}", inner), 0..4)
                    .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
            ]
        })
    }

    fn arguments_strategy() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::vec((".{0,16}", json_value_strategy()), 0..6)
            .prop_map(|pairs| pairs.into_iter().collect())
    }

    // Lines of free text, none of which starts with a marker
    fn prose_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(".{0,60}", 0..8)
            .prop_filter("no marker lines", |lines| !lines.iter().any(|l| starts_with_marker(l)))
    }

    proptest! {
        /// Property: parse(format(directive)) gives back the same directive
        #[test]
        fn prop_format_parse_round_trip(
            name in tool_name_strategy(),
            arguments in arguments_strategy()
        ) {
            let directive = Directive::new(name, arguments);
            let parsed = parse_directive(&directive.format());
            prop_assert_eq!(parsed, ParsedReply::Invocation(directive));
        }

        /// Property: text without marker lines is a plain reply
        #[test]
        fn prop_no_markers_is_plain(lines in prose_strategy()) {
            prop_assert_eq!(parse_directive(&lines.join("\n")), ParsedReply::Plain);
        }

        /// Property: one marker alone is still a plain reply
        #[test]
        fn prop_single_marker_is_plain(
            lines in prose_strategy(),
            name in tool_name_strategy(),
            at in any::<prop::sample::Index>(),
            tool_only in any::<bool>()
        ) {
            let marker_line = if tool_only {
                format!("{} {}", TOOL_MARKER, name)
            } else {
                format!("{} {{}}", ARGS_MARKER)
            };
            let mut lines = lines;
            let position = at.index(lines.len() + 1);
            lines.insert(position, marker_line);

            prop_assert_eq!(parse_directive(&lines.join("\n")), ParsedReply::Plain);
        }

        /// Property: an ARGS payload that is not a JSON object is malformed
        #[test]
        fn prop_non_object_args_is_malformed(
            name in tool_name_strategy(),
            payload in ".{0,80}".prop_filter("not a JSON object", |p| {
                !matches!(serde_json::from_str::<Value>(p.trim()), Ok(Value::Object(_)))
            })
        ) {
            let text = format!("{} {}\n{} {}", TOOL_MARKER, name, ARGS_MARKER, payload);
            match parse_directive(&text) {
                ParsedReply::Malformed { payload: reported, .. } => {
                    prop_assert_eq!(reported, payload.trim().to_string());
                }
                other => prop_assert!(false, "expected malformed, got {:?}", other),
            }
        }
    }
}
