//! End-to-end scenarios across the parse → read → validate pipeline.

use std::rc::Rc;

use unimark::format::format_data;
use unimark::input::input_from_source;
use unimark::item::{Item, TypeId};
use unimark::reader::ItemReader;
use unimark::validator::SchemaValidator;

#[test]
fn json_integer_roundtrip() {
    let source = r#"{"n": 9007199254740992}"#;
    let input = input_from_source(source, None, "json", None);
    assert!(!input.has_errors());

    let map = ItemReader::new(input.root.clone()).as_map();
    assert_eq!(map.length(), 1);
    assert_eq!(map.get("n").as_int64(), 9007199254740992);
    assert!(map.get("n").type_id().is_numeric());

    let emitted = format_data(&input.root, "json", None).unwrap();
    assert_eq!(emitted, r#"{"n":9007199254740992}"#);

    // logically equal to the original after whitespace normalisation
    let original: serde_json::Value = serde_json::from_str(source).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&emitted).unwrap();
    assert_eq!(original, reparsed);
}

#[test]
fn csv_header_detection_and_shared_shapes() {
    let input = input_from_source("name,age\nAlice,30\nBob,25\n", None, "csv", None);
    assert!(!input.has_errors());

    let rows = ItemReader::new(input.root.clone()).as_array();
    assert_eq!(rows.length(), 2);
    let alice = rows.get(0).as_map();
    assert_eq!(&*alice.get("name").as_str(), "Alice");
    assert_eq!(&*alice.get("age").as_str(), "30");
    let bob = rows.get(1).as_map();
    assert_eq!(&*bob.get("name").as_str(), "Bob");
    assert_eq!(&*bob.get("age").as_str(), "25");

    let (Item::Map(a), Item::Map(b)) = (rows.get(0).item().clone(), rows.get(1).item().clone())
    else {
        panic!("rows must be maps")
    };
    assert!(Rc::ptr_eq(&a.borrow().shape, &b.borrow().shape));
}

#[test]
fn xml_entity_preservation() {
    let input = input_from_source("<p>&copy; 2024 &mdash; &lt;ok&gt;</p>", None, "xml", None);
    assert!(!input.has_errors());

    let p = ItemReader::new(input.root.clone())
        .as_element()
        .child_at(0)
        .as_element();
    assert!(p.has_tag("p"));

    // named entities stay symbolic, ascii escapes decode into the text
    assert_eq!(&*p.child_at(0).as_symbol().unwrap().name, "copy");
    assert_eq!(&*p.child_at(1).as_str(), " 2024 ");
    assert_eq!(&*p.child_at(2).as_symbol().unwrap().name, "mdash");
    let tail = p.child_at(3).as_str();
    assert!(tail.contains("<ok>"));
}

#[test]
fn markdown_emoji_shortcodes() {
    let input = input_from_source("Hello :smile: world\n", None, "markup", Some("commonmark"));
    assert!(!input.has_errors());

    let p = ItemReader::new(input.root.clone())
        .as_element()
        .child_at(0)
        .as_element();
    assert!(p.has_tag("p"));
    assert_eq!(&*p.child_at(0).as_str(), "Hello ");
    assert_eq!(p.child_at(1).type_id(), TypeId::Symbol);
    assert_eq!(&*p.child_at(1).as_symbol().unwrap().name, "smile");
    assert_eq!(&*p.child_at(2).as_str(), " world");
}

#[test]
fn validator_occurrence_on_parsed_json() {
    let mut validator = SchemaValidator::new();
    validator.load_schema("type L = [int+]\n", "L").unwrap();

    let ok = input_from_source("[1,2,3]", None, "json", None);
    assert!(validator.validate(&ok.root, "L").valid);

    let empty = input_from_source("[]", None, "json", None);
    let result = validator.validate(&empty.root, "L");
    assert!(!result.valid);
    assert_eq!(result.error_count(), 1);
    assert!(result.errors[0].message.contains("minimum required is 1"));
}

#[test]
fn validator_format_unwrap() {
    let mut validator = SchemaValidator::new();
    validator
        .load_schema("type Article = <article>\n", "Article")
        .unwrap();

    let input = input_from_source("<document><article/></document>", None, "xml", None);
    assert!(!input.has_errors());

    let with_hint = validator.validate_with_format(&input.root, "Article", Some("xml"));
    assert!(with_hint.valid, "{:?}", with_hint.errors);
    assert_eq!(with_hint.error_count(), 0);

    // without a hint the wrapper is still recognised
    let detected = validator.validate_with_format(&input.root, "Article", None);
    assert!(detected.valid, "{:?}", detected.errors);

    // and a bare article parses to the same verdict
    let bare = input_from_source("<article/>", None, "xml", None);
    let result = validator.validate_with_format(&bare.root, "Article", Some("xml"));
    assert!(result.valid);
}
