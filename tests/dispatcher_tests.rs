//! Dispatcher coverage: every recognised format identifier produces a
//! sensible tree from a small representative input.

use rstest::rstest;

use unimark::input::input_from_source;
use unimark::item::TypeId;
use unimark::reader::ItemReader;

#[rstest]
#[case("json", r#"{"a": 1}"#, TypeId::Map)]
#[case("csv", "x,y\n1,2\n", TypeId::Array)]
#[case("tsv", "x\ty\n1\t2\n", TypeId::Array)]
#[case("xml", "<r/>", TypeId::Element)]
#[case("html", "<p>x</p>", TypeId::Element)]
#[case("yaml", "a: 1\n", TypeId::Map)]
#[case("toml", "a = 1\n", TypeId::Map)]
#[case("jsx", "<App/>", TypeId::Element)]
#[case("mdx", "# t\n", TypeId::Element)]
#[case("markup", "# t\n", TypeId::Element)]
#[case("vcf", "BEGIN:VCARD\nFN:x\nEND:VCARD\n", TypeId::Map)]
#[case("eml", "From: a@b.c\n\nhi\n", TypeId::Map)]
#[case("ics", "BEGIN:VCALENDAR\nEND:VCALENDAR\n", TypeId::Element)]
#[case("latex", "\\section{x}", TypeId::Element)]
fn formats_produce_expected_roots(
    #[case] format: &str,
    #[case] source: &str,
    #[case] expected: TypeId,
) {
    let input = input_from_source(source, None, format, None);
    assert_eq!(
        input.root.type_id(),
        expected,
        "format {format}: {}",
        input.errors.format_errors()
    );
}

#[rstest]
#[case("json")]
#[case("csv")]
#[case("xml")]
#[case("yaml")]
#[case("toml")]
#[case("markup")]
#[case("jsx")]
#[case("mdx")]
#[case("latex")]
#[case("vcf")]
#[case("ics")]
#[case("eml")]
fn empty_input_yields_null_root_without_errors(#[case] format: &str) {
    let input = input_from_source("", None, format, None);
    assert!(input.root.is_null(), "format {format}");
    assert!(!input.has_errors(), "format {format}");
}

#[test]
fn unknown_format_reports_one_error() {
    let input = input_from_source("{}", None, "protobuf", None);
    assert!(input.root.is_null());
    assert_eq!(input.errors.error_count(), 1);
}

#[test]
fn tsv_forces_tab_even_with_commas_present() {
    let input = input_from_source("a,b\tc\n1,2\t3\n", None, "tsv", None);
    let rows = ItemReader::new(input.root.clone()).as_array();
    let first = rows.get(0).as_map();
    // the comma stays inside the first field
    assert!(first.has("a,b"));
    assert_eq!(&*first.get("a,b").as_str(), "1,2");
}

#[test]
fn base_url_is_recorded() {
    let input = input_from_source("{}", Some("http://example.com/doc"), "json", None);
    assert_eq!(input.url.as_deref(), Some("http://example.com/doc"));
}

#[test]
fn dir_listing_via_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("f.txt"), b"data").unwrap();
    let input = input_from_source(
        dir.path().to_str().unwrap(),
        Some("http://host/base"),
        "dir",
        None,
    );
    assert!(!input.has_errors());
    let entries = ItemReader::new(input.root.clone()).as_array();
    assert_eq!(entries.length(), 1);
    let entry = entries.get(0).as_element();
    assert!(entry.has_tag("path"));
    assert_eq!(&*entry.get_string_attr("url"), "http://host/base/f.txt");
}
