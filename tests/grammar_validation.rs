//! Integration tests for grammar compilation
//!
//! Every grammar error must surface from `Parser::new`, never while parsing.

use pegstream::prelude::*;
use pegstream::SourcePosition;

fn compile_error(grammar: Grammar) -> GrammarError {
    Parser::new(grammar).expect_err("grammar should be rejected")
}

fn return_a() -> Vec<pegstream::grammar::RuleNode> {
    vec![rule(vec![seq(vec![lit("a")])], back(0))]
}

#[test]
fn test_duplicate_ruleset() {
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset("return", vec![rule(vec![seq(vec![rule_ref("x")])], back(0))])
            .ruleset("x", return_a())
            .ruleset("x", return_a())
            .build(),
    );
    assert!(matches!(&err, GrammarError::DuplicateRuleset { name, .. } if name == "x"));
    assert_eq!(err.code(), 101);
}

#[test]
fn test_two_return_rulesets() {
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset("return", return_a())
            .ruleset("return", return_a())
            .build(),
    );
    assert_eq!(err, GrammarError::MultipleReturn { pos: None });
}

#[test]
fn test_missing_return() {
    let err = compile_error(GrammarBuilder::new().ruleset("main", return_a()).build());
    assert_eq!(err, GrammarError::MissingReturn);
    assert_eq!(err.code(), 103);
}

#[test]
fn test_backref_out_of_range() {
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset(
                "return",
                vec![rule(
                    vec![seq(vec![capture(vec![seq(vec![lit("a")])])])],
                    array(vec![back(1), back(2)]),
                )],
            )
            .build(),
    );
    assert!(matches!(
        err,
        GrammarError::BackRefOutOfRange { index: 2, arity: 1, .. }
    ));
}

#[test]
fn test_capture_count_mismatch_between_options() {
    // ({'a'} | 'b') has one capture in the first option and none in the second
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset(
                "return",
                vec![rule(
                    vec![
                        seq(vec![capture(vec![seq(vec![lit("a")])])]),
                        seq(vec![lit("b")]),
                    ],
                    back(0),
                )],
            )
            .build(),
    );
    assert_eq!(err.code(), 107);
}

#[test]
fn test_unresolved_constant() {
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset("return", vec![rule(vec![seq(vec![lit("a")])], var("missing"))])
            .build(),
    );
    assert!(matches!(err, GrammarError::UnresolvedVar { name, .. } if name == "missing"));
}

#[test]
fn test_duplicate_constant() {
    let err = compile_error(
        GrammarBuilder::new()
            .var("x", int(1))
            .var("x", int(2))
            .ruleset("return", return_a())
            .build(),
    );
    assert_eq!(err.code(), 112);
}

#[test]
fn test_unknown_callback() {
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset("return", vec![rule(vec![seq(vec![lit("a")])], call("upper", vec![back(0)]))])
            .build(),
    );
    assert!(matches!(err, GrammarError::UnknownCallback { name, .. } if name == "upper"));

    // Known once configured
    let grammar = GrammarBuilder::new()
        .ruleset("return", vec![rule(vec![seq(vec![lit("a")])], call("upper", vec![back(0)]))])
        .build();
    let config = ParserConfig::new().with_callback("upper", |args: &[Value]| -> Result<Value, String> {
        Ok(Value::from(args[0].as_str().unwrap_or_default().to_uppercase()))
    });
    let parser = Parser::with_config(grammar, config).unwrap();
    assert_eq!(parser.parse("a").unwrap(), Value::from("A"));
}

#[test]
fn test_inverted_class_range() {
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset("return", vec![rule(vec![seq(vec![class("[z-a]")])], back(0))])
            .build(),
    );
    assert!(matches!(err, GrammarError::InvalidClass { from: 'z', to: 'a', .. }));
}

#[test]
fn test_error_carries_position() {
    let pos = SourcePosition::new(42, 3, 7);
    let err = compile_error(
        GrammarBuilder::new()
            .ruleset("return", vec![rule(vec![seq(vec![rule_ref("nowhere").at(pos)])], back(0))])
            .build(),
    );
    assert!(matches!(err, GrammarError::UnresolvedRule { pos: Some(p), .. } if p == pos));
    assert!(err.to_string().ends_with("at line 3, column 7"));
}

#[test]
fn test_json_round_trip_compiles() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![capture_ref("word"), lit(",").opt()])],
                object(vec![pair("word", back(1)), pair("at", position())]),
            )],
        )
        .ruleset("word", vec![rule_text(vec![seq(vec![class("[a-z]").plus()])])])
        .build();

    let json = grammar.to_json().unwrap();
    let restored = Grammar::from_json(&json).unwrap();
    assert_eq!(restored, grammar);

    let parser = Parser::new(restored).unwrap();
    let value = parser.parse("hey,").unwrap();
    assert_eq!(value.get("word"), Some(&Value::from("hey")));
    assert_eq!(value.get("at"), Some(&Value::Int(0)));
}

#[test]
fn test_json_without_annotations() {
    let json = r#"{
        "rulesets": [{
            "name": "return",
            "rules": [{
                "patterns": [{
                    "tokens": [{ "descriptor": { "type": "string", "value": "ok" } }]
                }]
            }]
        }]
    }"#;
    let grammar = Grammar::from_json(json).unwrap();
    let parser = Parser::new(grammar).unwrap();
    assert_eq!(parser.parse("ok").unwrap(), Value::from("ok"));
    assert_eq!(parser.grammar().rulesets[0].id, 1);
}
