//! Integration tests for parse error reporting
//!
//! These tests verify that errors carry:
//! - The furthest position reached, with line and column
//! - Pointer text under the offending character
//! - The sorted set of expected terminals

use pegstream::prelude::*;

/// line+ followed by end of input; line = [a-z]+ '\n'
fn lines() -> Parser {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(vec![seq(vec![rule_ref("line").plus(), any().not()])], back(0))],
        )
        .ruleset(
            "line",
            vec![rule_text(vec![seq(vec![class("[a-z]").plus(), lit("\n")])])],
        )
        .build();
    Parser::new(grammar).unwrap()
}

#[test]
fn test_no_match_reports_furthest_position() {
    let err = lines().parse("abc\nde1\n").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::NoMatch);
    assert_eq!(err.code(), 200);
    assert_eq!(err.position, 6);
    assert_eq!(err.line, Some(2));
    assert_eq!(err.column, Some(3));
    assert_eq!(err.expected, vec!["\"\\n\"".to_string(), "[a-z]".to_string()]);
}

#[test]
fn test_pointer_text() {
    let err = lines().parse("abc\nde1\n").unwrap_err();
    assert_eq!(err.pointer.as_deref(), Some("de1\n  ^"));
    assert_eq!(
        err.format_with_pointer(),
        "no match at line 2, column 3; expected one of: \"\\n\", [a-z]\nde1\n  ^"
    );
}

#[test]
fn test_predicate_failures_are_not_expected() {
    // The `!.` fails at offset 4 but is not reported as expected input
    let err = lines().parse("abc\n!").unwrap_err();
    assert_eq!(err.position, 4);
    assert_eq!(err.expected, vec!["[a-z]".to_string()]);
}

#[test]
fn test_error_display() {
    let err = lines().parse("").unwrap_err();
    assert_eq!(
        err.to_string(),
        "no match at line 1, column 1; expected one of: [a-z]"
    );
    assert_eq!(err.reason(), "no match");
}

#[test]
fn test_expected_is_deduplicated_across_alternatives() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![
                rule(vec![seq(vec![lit("k"), lit("="), lit("1")])], back(0)),
                rule(vec![seq(vec![lit("k"), lit("="), lit("2")])], back(0)),
                rule(vec![seq(vec![lit("k"), lit("="), lit("1"), lit("!")])], back(0)),
            ],
        )
        .build();
    let err = Parser::new(grammar).unwrap().parse("k=3").unwrap_err();
    assert_eq!(err.position, 2);
    assert_eq!(err.expected, vec!["\"1\"".to_string(), "\"2\"".to_string()]);
}

#[test]
fn test_unconsumed_input_in_stream() {
    let grammar = GrammarBuilder::new()
        .ruleset("return", vec![rule(vec![seq(vec![lit("ok")])], back(0))])
        .build();
    let parser = Parser::new(grammar).unwrap();
    let mut stream = parser.stream();
    assert_eq!(stream.write("ok\nmore").unwrap(), Status::WaitInput);
    let err = stream.close().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnconsumedInput);
    assert_eq!(err.code(), 201);
    assert_eq!((err.line, err.column), (Some(1), Some(3)));
}

#[test]
fn test_errors_are_std_errors() {
    fn boxed(err: impl std::error::Error + 'static) -> Box<dyn std::error::Error> {
        Box::new(err)
    }
    let parse_err = lines().parse("?").unwrap_err();
    assert!(boxed(parse_err).to_string().starts_with("no match"));

    let grammar_err = Parser::new(GrammarBuilder::new().build()).unwrap_err();
    assert_eq!(boxed(grammar_err).to_string(), "grammar has no `return` ruleset");
}
