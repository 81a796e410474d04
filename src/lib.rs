//! unimark — a uniform multi-format document tree
//!
//! Textual documents in a dozen concrete syntaxes (JSON, CSV/TSV, XML,
//! HTML, YAML, TOML, JSX, MDX, Markdown, vCard, iCal, EML, LaTeX, plus
//! directory listings) parse into one in-memory document model, with read,
//! edit, validation, and re-serialisation over that tree.
//!
//! ## Architecture
//!
//! The runtime value is a tagged [`item::Item`]; maps and elements store
//! their fields through deduplicated [`shape::Shape`] layouts, and
//! identifier-like strings intern through the [`name_pool::NamePool`].
//! Parsers drive the [`builder::MarkBuilder`] (write side) against an
//! [`input::InputContext`] that binds the source buffer, the
//! [`source_tracker::SourceTracker`] position cursor, and the
//! [`errors::ParseErrorList`] diagnostic collector. Consumers traverse the
//! result through the [`reader`] cursors, rewrite it through the
//! [`editor::MarkEditor`] (inline or copy-on-write), and check it against
//! a type grammar with the [`validator::SchemaValidator`].
//!
//! ```rust
//! use unimark::input::input_from_source;
//! use unimark::reader::ItemReader;
//!
//! let input = input_from_source("name,age\nAlice,30\n", None, "csv", None);
//! let rows = ItemReader::new(input.root.clone()).as_array();
//! assert_eq!(&*rows.get(0).as_map().get("name").as_str(), "Alice");
//! ```

pub mod builder;
pub mod datetime;
pub mod editor;
pub mod entities;
pub mod errors;
pub mod format;
pub mod input;
pub mod item;
pub mod name_pool;
pub mod reader;
pub mod shape;
pub mod shape_builder;
pub mod source_tracker;
pub mod validator;

pub use builder::MarkBuilder;
pub use editor::{EditMode, MarkEditor};
pub use errors::{ParseError, ParseErrorList, Severity};
pub use input::{input_from_source, Input, InputContext};
pub use item::{Item, TypeId};
pub use reader::{ArrayReader, ElementReader, ItemReader, MapReader};
pub use source_tracker::{SourceLocation, SourceTracker};
pub use validator::{SchemaValidator, ValidationResult};
