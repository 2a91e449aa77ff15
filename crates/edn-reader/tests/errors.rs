use std::error::Error as StdError;
use std::sync::Arc;

use edn_reader::{
    format_error, read, read_str, read_str_with, EdnError, ReadOptions, Source, Symbol, Value,
};

fn read_err(text: &str) -> EdnError {
    read_str(text).expect_err("expected a read failure")
}

fn message(text: &str) -> String {
    read_err(text).to_string()
}

#[test]
fn eof_with_no_eof_value_raises() {
    let err = read_str("   ").expect_err("eof");
    assert!(err.to_string().contains("EOF while reading"));
    assert!(matches!(err, EdnError::Eof(_)));
}

#[test]
fn unmatched_delimiters_carry_the_character() {
    let err = read_err(")");
    match &err {
        EdnError::UnmatchedDelimiter { delimiter, .. } => assert_eq!(*delimiter, ')'),
        other => panic!("expected UnmatchedDelimiter, got {other:?}"),
    }
    assert!(message("]").contains("Unmatched delimiter: ]"));
    assert!(message("(1 2]").contains("Unmatched delimiter: ]"));
    assert!(message("[1 2)").contains("Unmatched delimiter: )"));
}

#[test]
fn unterminated_collections_mention_their_starting_line() {
    let err = read_err("(1 2");
    assert!(matches!(err, EdnError::Eof(_)));
    assert!(err
        .to_string()
        .contains("Unexpected EOF while reading list, starting at line 1"));

    let err = read_err("[:a\n[1 2");
    assert!(err
        .to_string()
        .contains("Unexpected EOF while reading vector, starting at line 2"));

    assert!(message("{:a 1").contains("Unexpected EOF while reading map"));
    assert!(message("#{1").contains("Unexpected EOF while reading set"));
}

#[test]
fn non_indexing_sources_omit_positions() {
    let mut source = Source::from_string("(1 2").without_indexing();
    let err = read(&mut source, &ReadOptions::default()).expect_err("eof");
    assert_eq!(err.span(), None);
    assert_eq!(err.file(), None);
    assert!(err.to_string().contains("Unexpected EOF while reading list"));
    assert!(!err.to_string().contains("starting at line"));
}

#[test]
fn errors_carry_position_and_file() {
    let mut source = Source::from_string("(1 2").with_file("config.edn");
    let err = read(&mut source, &ReadOptions::default()).expect_err("eof");
    let span = err.span().expect("span");
    assert_eq!(span.line, 1);
    assert_eq!(err.file(), Some("config.edn"));
    assert!(format_error(&err).starts_with("config.edn:1:"));
}

#[test]
fn map_literals_require_even_forms() {
    assert!(message("{:a 1 :b}").contains("Map literal must contain an even number of forms"));
    assert!(message("{:a}").contains("even number of forms"));
}

#[test]
fn duplicate_keys_are_rejected() {
    assert!(message("{:a 1 :a 2}").contains("Duplicate key: :a"));
    assert!(message("#{1 1}").contains("Duplicate key: 1"));
    assert!(message("#{:x :y :x}").contains("Duplicate key: :x"));
}

#[test]
fn ratio_divide_by_zero() {
    assert!(message("3/0").contains("Divide by zero"));
}

#[test]
fn malformed_numbers_report_the_literal() {
    assert!(message("089").contains("Invalid number format 089."));
    assert!(message("12abc").contains("Invalid number format 12abc."));
    assert!(message("1.2.3").contains("Invalid number format 1.2.3."));
    assert!(message("2r19").contains("Invalid number format 2r19."));
}

#[test]
fn keyword_failures() {
    let err = message("::foo");
    assert!(err.contains("symbols cannot start with two colons"), "{err}");
    assert!(message(": foo").contains("A single colon is not a valid keyword"));
    assert!(message(":a::b").contains("Invalid keyword"));
    assert!(message(":foo/").contains("Invalid keyword"));
}

#[test]
fn symbol_failures() {
    assert!(message("foo/bar/baz").contains("Invalid symbol"));
    assert!(message("foo/").contains("Invalid symbol"));
    let err = message("@deref");
    assert!(
        err.contains("Invalid leading character at the start of a symbol"),
        "{err}"
    );
    let err = message("a~b");
    assert!(err.contains("Invalid character [~] in symbol starting with [a]"), "{err}");
}

#[test]
fn string_failures() {
    assert!(message("\"abc").contains("Unexpected EOF while reading string"));
    assert!(message("\"a\\qb\"").contains("Unsupported escape character: \\q"));
    assert!(message("\"\\u12\"").contains("Invalid digit"));
    assert!(message("\"\\uD800\"").contains("Invalid character constant: \\uD800"));
    assert!(message("\"\\8\"").contains("Invalid digit: 8"));
    assert!(message("\"\\400\"").contains("Octal escape sequence must be in range [0, 377]"));
}

#[test]
fn character_failures() {
    assert!(message("\\uD800").contains("Invalid character constant"));
    assert!(message("\\u12").contains("Invalid unicode character"));
    assert!(message("\\o400").contains("Octal escape sequence must be in range [0, 377]"));
    assert!(message("\\o1234").contains("Invalid octal escape sequence length"));
    assert!(message("\\frobnicate").contains("Unsupported character: \\frobnicate"));
    let err = read_err("\\");
    assert!(matches!(err, EdnError::Eof(_)));
}

#[test]
fn metadata_failures() {
    assert!(message("^1 x").contains("Metadata must be a symbol, keyword, string or map"));
    assert!(message("^:dynamic 5").contains("Metadata cannot be applied to integer"));
    assert!(message("^:dynamic \"s\"").contains("Metadata cannot be applied to string"));
}

#[test]
fn dispatch_failures() {
    assert!(message("#<unreadable>").contains("Unreadable form"));
    let err = read_err("#)");
    match &err {
        EdnError::NoDispatch { dispatch, .. } => assert_eq!(*dispatch, ')'),
        other => panic!("expected NoDispatch, got {other:?}"),
    }
    assert!(message("#1 2").contains("Reader tag must be a symbol"));
    let err = read_err("#");
    assert!(matches!(err, EdnError::Eof(_)));
}

#[test]
fn unknown_tags_fail_without_a_default() {
    let err = read_err("#nope 1");
    match &err {
        EdnError::NoTagReader { tag, .. } => assert_eq!(tag, &Symbol::simple("nope")),
        other => panic!("expected NoTagReader, got {other:?}"),
    }
    assert!(err.to_string().contains("No reader function for tag nope"));
}

#[test]
fn tag_reader_failures_are_wrapped_with_cause() {
    let opts = ReadOptions::default().with_tag_reader(
        Symbol::simple("boom"),
        Arc::new(|_| Err("the roof is on fire".into())),
    );
    let err = read_str_with("#boom 1", &opts).expect_err("tag failure");
    match &err {
        EdnError::TagReader { tag, message, .. } => {
            assert_eq!(tag, &Symbol::simple("boom"));
            assert!(message.contains("the roof is on fire"));
        }
        other => panic!("expected TagReader, got {other:?}"),
    }
    assert!(err.source().is_some());
    assert!(err.span().is_some());
}

#[test]
fn malformed_inst_and_uuid_fail() {
    assert!(message("#inst \"not-a-date\"").contains("failed"));
    assert!(message("#inst 42").contains("expects a string"));
    assert!(message("#uuid \"zzz\"").contains("failed"));
    assert!(message("#inst \"2000-13-01\"").contains("failed"));
}

#[test]
fn namespaced_map_failures() {
    assert!(message("#::foo{:a 1}")
        .contains("Auto-qualified namespace is not allowed in a namespaced map"));
    assert!(message("#:foo [1]").contains("does not specify a map"));
    assert!(message("#:foo{:a 1 :b}").contains("even number of forms"));
    assert!(message("#:a/b{:x 1}").contains("Invalid namespace token"));
}

#[test]
fn unreadable_reserved_characters() {
    assert!(message("`quoted").contains("Invalid leading character"));
    assert!(message("~unquote").contains("Invalid leading character"));
}

#[test]
fn eof_inside_discard_and_meta() {
    let err = read_err("#_");
    assert!(matches!(err, EdnError::Eof(_)));
    let err = read_err("^:kw");
    assert!(matches!(err, EdnError::Eof(_)));
}

#[test]
fn failed_reads_do_not_poison_later_values() {
    let opts = ReadOptions::default();
    let mut source = Source::from_string(")(1 2)");
    assert!(read(&mut source, &opts).is_err());
    assert_eq!(
        read(&mut source, &opts).expect("recovers"),
        Value::list(vec![Value::from(1), Value::from(2)])
    );
}

#[test]
fn duplicate_value_rendering_in_errors() {
    // Keys render in data notation in diagnostics.
    assert!(message("{\"k\" 1 \"k\" 2}").contains("Duplicate key: \"k\""));
    assert!(message("#{[1 2] [1 2]}").contains("Duplicate key: [1 2]"));
}
