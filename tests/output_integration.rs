//! Integration tests for output templates
//!
//! Templates are exercised end to end: captures flow from the matcher into
//! arrays, objects, spreads, callbacks and pivots.

use pegstream::prelude::*;

fn strs(items: &[&str]) -> Value {
    Value::array(items.iter().map(|s| Value::from(*s)).collect())
}

/// row (newline row)*, each row a comma separated list of cells
fn csv(output: pegstream::grammar::ValueNode) -> Grammar {
    GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![
                    capture_ref("row"),
                    group(vec![seq(vec![lit("\n"), capture_ref("row")])]).star(),
                ])],
                output,
            )],
        )
        .ruleset(
            "row",
            vec![rule(
                vec![seq(vec![
                    capture_ref("cell"),
                    group(vec![seq(vec![lit(","), capture_ref("cell")])]).star(),
                ])],
                array(vec![back(1), spread(back(2))]),
            )],
        )
        .ruleset("cell", vec![rule_text(vec![seq(vec![class("[a-z0-9]").star()])])])
        .build()
}

#[test]
fn test_rows_with_spread() {
    let parser = Parser::new(csv(array(vec![back(1), spread(back(2))]))).unwrap();
    assert_eq!(
        parser.parse("a,b\nc,d").unwrap(),
        Value::array(vec![strs(&["a", "b"]), strs(&["c", "d"])])
    );
    assert_eq!(parser.parse("x").unwrap(), Value::array(vec![strs(&["x"])]));
}

#[test]
fn test_pivot_rows_into_columns() {
    let parser = Parser::new(csv(pivot(array(vec![back(1), spread(back(2))])))).unwrap();
    assert_eq!(
        parser.parse("a,b,c\nd,e").unwrap(),
        Value::array(vec![
            strs(&["a", "d"]),
            strs(&["b", "e"]),
            Value::array(vec![Value::from("c"), Value::Null]),
        ])
    );
}

#[test]
fn test_empty_cells_are_empty_strings() {
    let parser = Parser::new(csv(array(vec![back(1), spread(back(2))]))).unwrap();
    assert_eq!(
        parser.parse(",x,").unwrap(),
        Value::array(vec![strs(&["", "x", ""])])
    );
}

fn settings(callbacks: ParserConfig) -> Parser {
    // return = {entry} (';' {entry})* -> { ...[$1, ...$2] };
    // entry  = {[a-z]+} '=' {[0-9]+} -> [$1, int($2)];
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![
                    capture_ref("entry"),
                    group(vec![seq(vec![lit(";"), capture_ref("entry")])]).star(),
                ])],
                object(vec![merge(array(vec![back(1), spread(back(2))]))]),
            )],
        )
        .ruleset(
            "entry",
            vec![rule(
                vec![seq(vec![
                    capture(vec![seq(vec![class("[a-z]").plus()])]),
                    lit("="),
                    capture(vec![seq(vec![class("[0-9]").plus()])]),
                ])],
                array(vec![back(1), call("int", vec![back(2)])]),
            )],
        )
        .build();
    Parser::with_config(grammar, callbacks).unwrap()
}

fn int_callback() -> ParserConfig {
    ParserConfig::new().with_callback("int", |args: &[Value]| -> Result<Value, String> {
        let text = args.first().and_then(Value::as_str).unwrap_or_default();
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("{:?}: {}", text, e))
    })
}

#[test]
fn test_object_from_pairs_and_callback() {
    let parser = settings(int_callback());
    let value = parser.parse("width=80;height=24").unwrap();
    assert_eq!(value.get("width"), Some(&Value::Int(80)));
    assert_eq!(value.get("height"), Some(&Value::Int(24)));
    assert_eq!(value.to_json(), serde_json::json!({ "width": 80, "height": 24 }));
}

#[test]
fn test_callback_error_is_parse_error() {
    let parser = settings(int_callback());
    let err = parser.parse("big=99999999999999999999").unwrap_err();
    assert!(matches!(&err.kind, ParseErrorKind::Callback { name, .. } if name == "int"));
    assert_eq!(err.code(), 206);
}

#[test]
fn test_constants_and_literals() {
    let grammar = GrammarBuilder::new()
        .var("kind", text("greeting"))
        .var("tags", array(vec![text("a"), text("b")]))
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![lit("hi")])],
                object(vec![
                    pair("kind", var("kind")),
                    pair("tags", var("tags")),
                    pair("first", var("tags").index(0)),
                    pair("ok", boolean(true)),
                    pair("ratio", float(0.5)),
                    pair("none", null()),
                ]),
            )],
        )
        .build();
    let value = Parser::new(grammar).unwrap().parse("hi").unwrap();
    assert_eq!(value.get("kind"), Some(&Value::from("greeting")));
    assert_eq!(value.get("tags"), Some(&strs(&["a", "b"])));
    assert_eq!(value.get("first"), Some(&Value::from("a")));
    assert_eq!(value.get("ok"), Some(&Value::Bool(true)));
    assert_eq!(value.get("ratio"), Some(&Value::Float(0.5)));
    assert_eq!(value.get("none"), Some(&Value::Null));
}

#[test]
fn test_position_and_length_of_nested_rule() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![lit(" ").star(), capture_ref("word"), lit(" ").star()])],
                back(1),
            )],
        )
        .ruleset(
            "word",
            vec![rule(
                vec![seq(vec![class("[a-z]").plus()])],
                object(vec![pair("text", back(0)), pair("at", position()), pair("len", length())]),
            )],
        )
        .build();
    let value = Parser::new(grammar).unwrap().parse("   word  ").unwrap();
    assert_eq!(value.get("text"), Some(&Value::from("word")));
    assert_eq!(value.get("at"), Some(&Value::Int(3)));
    assert_eq!(value.get("len"), Some(&Value::Int(4)));
}

#[test]
fn test_access_failure_at_parse_time() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(vec![seq(vec![capture_ref("word")])], back(1).prop("missing"))],
        )
        .ruleset("word", vec![rule(vec![seq(vec![lit("w")])], object(vec![pair("w", int(1))]))])
        .build();
    let err = Parser::new(grammar).unwrap().parse("w").unwrap_err();
    assert_eq!(err.code(), 203);
    assert!(err.reason().contains("missing"));
}

#[test]
fn test_collapse_of_repeated_optional_captures() {
    // ({[a-z]}? ',')* -> [$1?]
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![group(vec![seq(vec![
                    capture(vec![seq(vec![class("[a-z]")])]).opt(),
                    lit(","),
                ])])
                .star()])],
                array(vec![spread(back(1).collapse())]),
            )],
        )
        .build();
    let parser = Parser::new(grammar).unwrap();
    assert_eq!(parser.parse("a,,b,").unwrap(), strs(&["a", "b"]));
}

#[test]
fn test_spread_string_into_characters() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![capture(vec![seq(vec![any().star()])])])],
                array(vec![spread(back(1))]),
            )],
        )
        .build();
    let parser = Parser::new(grammar).unwrap();
    assert_eq!(parser.parse("héy").unwrap(), strs(&["h", "é", "y"]));
}
