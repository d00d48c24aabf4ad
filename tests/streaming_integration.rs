//! Integration tests for streaming parses
//!
//! Covers suspension inside tokens, equivalence with whole-string parsing,
//! buffer eviction and reader-driven input.

use pegstream::prelude::*;
use pegstream::InputBuffer;

fn sentence() -> Grammar {
    // return {[a-zA-Z]+} ' '+ {[a-zA-Z]+} {[!.?]} -> [$1, $2, $3];
    GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![
                    capture(vec![seq(vec![class("[a-zA-Z]").plus()])]),
                    lit(" ").plus(),
                    capture(vec![seq(vec![class("[a-zA-Z]").plus()])]),
                    capture(vec![seq(vec![class("[!.?]")])]),
                ])],
                array(vec![back(1), back(2), back(3)]),
            )],
        )
        .build()
}

fn hello_world() -> Value {
    Value::array(vec![
        Value::from("Hello"),
        Value::from("world"),
        Value::from("!"),
    ])
}

#[test]
fn test_two_writes_match_whole_string() {
    let parser = Parser::new(sentence()).unwrap();

    let mut stream = parser.stream();
    assert_eq!(stream.write("Hello w").unwrap(), Status::WaitInput);
    stream.write("orld!").unwrap();
    let streamed = stream.close().unwrap();

    assert_eq!(streamed, hello_world());
    assert_eq!(streamed, parser.parse("Hello world!").unwrap());
}

#[test]
fn test_char_by_char() {
    let parser = Parser::new(sentence()).unwrap();
    let mut stream = parser.stream();
    for c in "Hello world!".chars() {
        stream.write(&c.to_string()).unwrap();
    }
    assert_eq!(stream.close().unwrap(), hello_world());
}

#[test]
fn test_literal_split_across_writes() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(vec![seq(vec![lit("begin"), lit("end")])], back(0))],
        )
        .build();
    let parser = Parser::new(grammar).unwrap();
    let mut stream = parser.stream();
    assert_eq!(stream.write("be").unwrap(), Status::WaitInput);
    assert_eq!(stream.position(), 0);
    assert_eq!(stream.write("gine").unwrap(), Status::WaitInput);
    assert_eq!(stream.position(), 5);
    assert_eq!(stream.write("nd").unwrap(), Status::Pass);
    assert_eq!(stream.close().unwrap(), Value::from("beginend"));
}

#[test]
fn test_empty_writes_are_harmless() {
    let parser = Parser::new(sentence()).unwrap();
    let mut stream = parser.stream();
    stream.write("").unwrap();
    stream.write("Hello ").unwrap();
    stream.write("").unwrap();
    stream.write("world!").unwrap();
    assert_eq!(stream.close().unwrap(), hello_world());
}

#[test]
fn test_trailing_repeat_finishes_on_close() {
    let grammar = GrammarBuilder::new()
        .ruleset("return", vec![rule(vec![seq(vec![lit("a").star()])], length())])
        .build();
    let parser = Parser::new(grammar).unwrap();
    let mut stream = parser.stream();
    assert_eq!(stream.write("aaa").unwrap(), Status::WaitInput);
    assert_eq!(stream.write("aa").unwrap(), Status::WaitInput);
    assert_eq!(stream.close().unwrap(), Value::Int(5));
}

#[test]
fn test_close_without_input() {
    let parser = Parser::new(sentence()).unwrap();
    let mut stream = parser.stream();
    let err = stream.close().unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::NoMatch);
    assert_eq!(err.position, 0);
    assert_eq!(err.expected, vec!["[a-zA-Z]".to_string()]);
}

#[test]
fn test_eviction_raises_input_freed() {
    // return {[a-z]+} ';' -> $1;  with no retention window
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![capture(vec![seq(vec![class("[a-z]").plus()])]), lit(";")])],
                back(1),
            )],
        )
        .build();
    let parser = Parser::with_config(grammar, ParserConfig::new().with_min_buffer_size(0)).unwrap();

    let mut stream = parser.stream();
    stream.write("abc").unwrap();
    stream.write("def").unwrap();
    assert!(stream.buffer().retained_from() > 0);

    let err = stream.write("gh;").unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::InputFreed { .. }), "{:?}", err);
    assert_eq!(err.code(), 202);
    // The stream stays failed
    assert_eq!(stream.close().unwrap_err(), err);
}

#[test]
fn test_large_window_keeps_everything() {
    let grammar = GrammarBuilder::new()
        .ruleset(
            "return",
            vec![rule(
                vec![seq(vec![capture(vec![seq(vec![class("[a-z]").plus()])]), lit(";")])],
                back(1),
            )],
        )
        .build();
    let parser = Parser::new(grammar).unwrap();
    let mut stream = parser.stream();
    for chunk in ["abc", "def", "gh;"] {
        stream.write(chunk).unwrap();
    }
    assert_eq!(stream.buffer().retained_from(), 0);
    assert_eq!(stream.close().unwrap(), Value::from("abcdefgh"));
}

#[test]
fn test_buffer_offsets_are_continuous() {
    let mut buffer = InputBuffer::new(usize::MAX);
    buffer.append("ab").unwrap();
    buffer.append("cd").unwrap();
    assert_eq!(buffer.len(), 4);
    assert_eq!(buffer.substr(1, 2).unwrap(), "bc");
    assert!(!buffer.is_closed());
}

#[test]
fn test_parse_reader_small_chunks() {
    let parser = Parser::new(sentence()).unwrap();
    let value = parser.parse_reader("Hello world!".as_bytes(), 3).unwrap();
    assert_eq!(value, hello_world());
}

#[test]
fn test_parse_reader_reports_parse_errors() {
    let parser = Parser::new(sentence()).unwrap();
    let err = parser.parse_reader("Hello 123".as_bytes(), 4).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::NoMatch);
    assert_eq!(err.position, 6);
}

#[test]
fn test_left_recursion_resumes_mid_growth() {
    // expr = {expr} '+' {num} -> [$1, $2], {num} -> $1;
    let grammar = GrammarBuilder::new()
        .ruleset("return", vec![rule(vec![seq(vec![capture_ref("expr")])], back(1))])
        .ruleset(
            "expr",
            vec![
                rule(
                    vec![seq(vec![capture_ref("expr"), lit("+"), capture_ref("num")])],
                    array(vec![back(1), back(2)]),
                ),
                rule(vec![seq(vec![capture_ref("num")])], back(1)),
            ],
        )
        .ruleset("num", vec![rule_text(vec![seq(vec![class("[0-9]").plus()])])])
        .build();
    let parser = Parser::new(grammar).unwrap();
    let input = "12+3+45";

    let mut stream = parser.stream();
    for c in input.chars() {
        assert_eq!(stream.write(&c.to_string()).unwrap(), Status::WaitInput);
    }
    let streamed = stream.close().unwrap();

    assert_eq!(streamed.to_string(), r#"[["12", "3"], "45"]"#);
    assert_eq!(streamed, parser.parse(input).unwrap());
}
