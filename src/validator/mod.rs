//! Schema validator
//!
//! A recursive descent keyed on the schema node kind. Every recursion
//! pushes a path scope (field name, index, element tag, attribute, union
//! arm) so diagnostics read like `users[2].name`. Stop conditions: the
//! error cap, the wall-clock timeout (sampled on every recursion), and the
//! depth bound.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use serde::Serialize;

use crate::item::{Item, TypeId};
use crate::reader::{ElementReader, ItemReader};

pub mod schema;
pub mod types;

pub use schema::SchemaError;
use types::{
    describe, is_optional_type, unwrap_type, BinaryOp, SchemaType, TypeArray, TypeBinary,
    TypeElmt, TypeMap, TypeUnary,
};

#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Unknown map fields are errors.
    pub strict_mode: bool,
    pub allow_unknown_fields: bool,
    pub max_depth: u32,
    /// 0 means unlimited.
    pub timeout_ms: u64,
    /// 0 means collect everything.
    pub max_errors: usize,
    pub show_suggestions: bool,
    pub show_context: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        ValidatorOptions {
            strict_mode: false,
            allow_unknown_fields: true,
            max_depth: 100,
            timeout_ms: 0,
            max_errors: 0,
            show_suggestions: true,
            show_context: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationErrorKind {
    TypeMismatch,
    MissingField,
    NullValue,
    ConstraintViolation,
    UnknownField,
    TagMismatch,
    ContentLengthMismatch,
    TimeoutExceeded,
    DepthExceeded,
    UnknownType,
    UnsupportedType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[derive(Debug)]
pub struct SchemaValidator {
    types: HashMap<String, Rc<SchemaType>>,
    options: ValidatorOptions,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        SchemaValidator::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        SchemaValidator {
            types: HashMap::new(),
            options: ValidatorOptions::default(),
        }
    }

    /// Compile `schema_text` and register its definitions. `root_type`
    /// must be one of them.
    pub fn load_schema(&mut self, schema_text: &str, root_type: &str) -> Result<(), SchemaError> {
        let compiled = schema::compile_schema(schema_text)?;
        if !compiled.contains_key(root_type) {
            return Err(SchemaError::UnknownType {
                name: root_type.to_string(),
            });
        }
        self.types.extend(compiled);
        Ok(())
    }

    pub fn set_strict_mode(&mut self, strict: bool) {
        self.options.strict_mode = strict;
        self.options.allow_unknown_fields = !strict;
    }

    pub fn set_max_errors(&mut self, max_errors: usize) {
        self.options.max_errors = max_errors;
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ValidatorOptions {
        &mut self.options
    }

    pub fn validate(&self, item: &Item, type_name: &str) -> ValidationResult {
        let Some(ty) = self.types.get(type_name) else {
            return ValidationResult {
                valid: false,
                errors: vec![ValidationError {
                    kind: ValidationErrorKind::UnknownType,
                    message: format!("no type named '{type_name}' is loaded"),
                    path: String::new(),
                }],
            };
        };
        let mut walk = Walk::new(self);
        walk.validate_item(item, ty);
        walk.finish()
    }

    /// Format-aware validation: unwrap the format's framing before the
    /// walk. Without an explicit hint the format is detected from the
    /// root.
    pub fn validate_with_format(
        &self,
        item: &Item,
        type_name: &str,
        format: Option<&str>,
    ) -> ValidationResult {
        let format = format
            .map(str::to_string)
            .or_else(|| detect_input_format(item).map(str::to_string));
        let unwrapped = match format.as_deref() {
            Some("xml") => unwrap_document(item),
            Some("html") => unwrap_html(item),
            _ => item.clone(),
        };
        self.validate(&unwrapped, type_name)
    }
}

/// Inspect the root to pick a default format.
pub fn detect_input_format(item: &Item) -> Option<&'static str> {
    match item {
        Item::Element(e) => match &*e.borrow().name {
            "document" => Some("xml"),
            "html" => Some("html"),
            "doc" => Some("markup"),
            "mdx_document" => Some("mdx"),
            _ => None,
        },
        Item::Map(_) | Item::Array(_) | Item::List(_) => Some("json"),
        _ => None,
    }
}

/// Descend through `document` wrappers to the first element child. Both
/// the parser's synthetic wrapper and a literal `<document>` root unwrap.
fn unwrap_document(item: &Item) -> Item {
    let mut current = item.clone();
    for _ in 0..4 {
        let reader = ElementReader::new(current.clone());
        if !reader.has_tag("document") {
            return current;
        }
        let mut next = None;
        for child in reader.children() {
            if child.is_element() {
                next = Some(child.into_item());
                break;
            }
        }
        match next {
            Some(next) => current = next,
            None if reader.child_count() > 0 => return reader.child_at(0).into_item(),
            None => return current,
        }
    }
    current
}

fn unwrap_html(item: &Item) -> Item {
    let unwrapped = unwrap_document(item);
    let reader = ElementReader::new(unwrapped.clone());
    if reader.has_tag("html") {
        for child in reader.children() {
            if child.is_element() && child.as_element().has_tag("body") {
                return child.into_item();
            }
        }
    }
    unwrapped
}

#[derive(Debug, Clone)]
enum PathSegment {
    Index(usize),
    Field(Rc<str>),
    Tag(Rc<str>),
    Attr(Rc<str>),
    UnionArm(usize),
}

struct Walk<'a> {
    validator: &'a SchemaValidator,
    path: Vec<PathSegment>,
    depth: u32,
    started: Instant,
    errors: Vec<ValidationError>,
    timed_out: bool,
}

impl<'a> Walk<'a> {
    fn new(validator: &'a SchemaValidator) -> Self {
        Walk {
            validator,
            path: Vec::new(),
            depth: 0,
            started: Instant::now(),
            errors: Vec::new(),
            timed_out: false,
        }
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
        }
    }

    fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Index(i) => out.push_str(&format!("[{i}]")),
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Tag(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push('<');
                    out.push_str(name);
                    out.push('>');
                }
                PathSegment::Attr(name) => {
                    out.push('@');
                    out.push_str(name);
                }
                PathSegment::UnionArm(i) => out.push_str(&format!("|{i}")),
            }
        }
        out
    }

    fn error(&mut self, kind: ValidationErrorKind, message: String) {
        let cap = self.validator.options.max_errors;
        if cap == 0 || self.errors.len() < cap {
            self.errors.push(ValidationError {
                kind,
                message,
                path: self.path_string(),
            });
        }
    }

    /// True once a stop condition holds; callers return immediately.
    fn stopped(&mut self) -> bool {
        let max_errors = self.validator.options.max_errors;
        let timeout_ms = self.validator.options.timeout_ms;
        if max_errors > 0 && self.errors.len() >= max_errors {
            return true;
        }
        if timeout_ms > 0
            && !self.timed_out
            && self.started.elapsed().as_millis() as u64 >= timeout_ms
        {
            self.timed_out = true;
            self.error(
                ValidationErrorKind::TimeoutExceeded,
                format!("validation exceeded {timeout_ms} ms"),
            );
            return true;
        }
        self.timed_out
    }

    fn validate_item(&mut self, item: &Item, ty: &Rc<SchemaType>) {
        if self.stopped() {
            return;
        }
        if self.depth + 1 > self.validator.options.max_depth {
            self.error(
                ValidationErrorKind::DepthExceeded,
                format!(
                    "validation depth exceeds {} levels",
                    self.validator.options.max_depth
                ),
            );
            return;
        }
        self.depth += 1;
        self.validate_dispatch(item, ty);
        self.depth -= 1;
    }

    fn validate_dispatch(&mut self, item: &Item, ty: &Rc<SchemaType>) {
        let base = unwrap_type(ty);
        match &*base {
            SchemaType::Any => {}
            SchemaType::Primitive(expected) => self.validate_primitive(item, *expected),
            SchemaType::Array(array_type) => self.validate_array(item, array_type),
            SchemaType::Map(map_type) => self.validate_map(item, map_type),
            SchemaType::Element(elmt_type) => self.validate_element(item, elmt_type),
            SchemaType::Unary(unary) => self.validate_occurrence(item, unary),
            SchemaType::Binary(binary) => self.validate_binary(item, binary),
            SchemaType::Func(_) => self.error(
                ValidationErrorKind::UnsupportedType,
                "function types cannot validate document data".to_string(),
            ),
            SchemaType::Named(reference) => self.error(
                ValidationErrorKind::UnknownType,
                format!("unresolved type reference '{}'", reference.name),
            ),
        }
    }

    fn validate_primitive(&mut self, item: &Item, expected: TypeId) {
        let actual = item.type_id();
        let ok = if expected.is_numeric() {
            // numeric promotion: an int satisfies int64/float/number slots
            actual.is_numeric() && actual <= expected
        } else {
            actual == expected
        };
        if !ok {
            self.error(
                ValidationErrorKind::TypeMismatch,
                format!("type mismatch: expected {}, got {}", expected.name(), actual.name()),
            );
        }
    }

    fn validate_array(&mut self, item: &Item, array_type: &TypeArray) {
        let reader = ItemReader::new(item.clone());
        if !reader.is_array() && !reader.is_list() {
            self.error(
                ValidationErrorKind::TypeMismatch,
                format!(
                    "type mismatch: expected array, got {}",
                    item.type_id().name()
                ),
            );
            return;
        }
        let array = reader.as_array();
        let length = array.length() as i64;

        if let Some(expected_length) = array_type.length {
            if length != expected_length {
                self.error(
                    ValidationErrorKind::ConstraintViolation,
                    format!("array length mismatch: expected {expected_length}, got {length}"),
                );
            }
        }

        let Some(nested) = &array_type.item else {
            return;
        };
        let nested_base = unwrap_type(nested);

        // an occurrence operator on the nested type constrains the array
        // itself
        if let SchemaType::Unary(unary) = &*nested_base {
            if !self.check_count(length, unary) {
                return;
            }
            // typed numeric arrays satisfy [int*] by construction
            if self.typed_array_shortcut(item, &unary.operand) {
                return;
            }
            self.validate_elements(&array, &unary.operand);
            return;
        }

        if self.typed_array_shortcut(item, nested) {
            return;
        }
        self.validate_elements(&array, nested);
    }

    /// Count check for an occurrence-constrained collection. Returns false
    /// when the count already failed.
    fn check_count(&mut self, length: i64, unary: &TypeUnary) -> bool {
        if length < unary.min_count {
            self.error(
                ValidationErrorKind::ConstraintViolation,
                format!(
                    "occurrence constraint failed: minimum required is {}, got {length}",
                    unary.min_count
                ),
            );
            return false;
        }
        if unary.max_count >= 0 && length > unary.max_count {
            self.error(
                ValidationErrorKind::ConstraintViolation,
                format!(
                    "occurrence constraint failed: at most {} allowed, got {length}",
                    unary.max_count
                ),
            );
            return false;
        }
        true
    }

    /// `[int*]` over an int32/int64/float array needs no per-element walk;
    /// the container's element type already matches.
    fn typed_array_shortcut(&mut self, item: &Item, operand: &Rc<SchemaType>) -> bool {
        let base = unwrap_type(operand);
        let SchemaType::Primitive(expected) = &*base else {
            return false;
        };
        match (item.type_id(), expected) {
            (TypeId::ArrayInt, t) | (TypeId::ArrayInt64, t) if t.is_numeric() => true,
            (TypeId::ArrayFloat, t) => {
                if *t >= TypeId::Float && t.is_numeric() {
                    true
                } else {
                    self.error(
                        ValidationErrorKind::TypeMismatch,
                        format!("float array does not satisfy element type {}", t.name()),
                    );
                    true
                }
            }
            _ => false,
        }
    }

    fn validate_elements(&mut self, array: &crate::reader::ArrayReader, ty: &Rc<SchemaType>) {
        for (index, child) in array.items().enumerate() {
            if self.stopped() {
                return;
            }
            self.path.push(PathSegment::Index(index));
            self.validate_item(child.item(), ty);
            self.path.pop();
        }
    }

    fn validate_map(&mut self, item: &Item, map_type: &TypeMap) {
        let reader = ItemReader::new(item.clone());
        if !reader.is_map() {
            self.error(
                ValidationErrorKind::TypeMismatch,
                format!("type mismatch: expected map, got {}", item.type_id().name()),
            );
            return;
        }
        let map = reader.as_map();

        for field in &map_type.fields {
            if self.stopped() {
                return;
            }
            self.path.push(PathSegment::Field(field.name.clone()));
            let optional = field.optional || is_optional_type(&field.ty);
            if !map.has(&field.name) {
                if !optional {
                    self.error(
                        ValidationErrorKind::MissingField,
                        format!("missing required field '{}'", field.name),
                    );
                }
            } else {
                let value = map.get(&field.name);
                if value.is_null() {
                    if !optional {
                        self.error(
                            ValidationErrorKind::NullValue,
                            format!("required field '{}' is null", field.name),
                        );
                    }
                } else {
                    self.validate_item(value.item(), &field.ty);
                }
            }
            self.path.pop();
        }

        if self.validator.options.strict_mode && !self.validator.options.allow_unknown_fields {
            for key in map.keys() {
                if !map_type.fields.iter().any(|f| f.name == key) {
                    self.path.push(PathSegment::Field(key.clone()));
                    self.error(
                        ValidationErrorKind::UnknownField,
                        format!("unknown field '{key}'"),
                    );
                    self.path.pop();
                }
            }
        }
    }

    fn validate_element(&mut self, item: &Item, elmt_type: &TypeElmt) {
        let reader = ItemReader::new(item.clone());
        if !reader.is_element() {
            self.error(
                ValidationErrorKind::TypeMismatch,
                format!(
                    "type mismatch: expected element <{}>, got {}",
                    elmt_type.name,
                    item.type_id().name()
                ),
            );
            return;
        }
        let element = reader.as_element();
        let tag = element.tag_name();
        if &*tag != &*elmt_type.name {
            self.error(
                ValidationErrorKind::TagMismatch,
                format!("tag mismatch: expected <{}>, got <{}>", elmt_type.name, tag),
            );
            return;
        }

        self.path.push(PathSegment::Tag(tag.clone()));

        for field in &elmt_type.attrs {
            if self.stopped() {
                break;
            }
            self.path.push(PathSegment::Attr(field.name.clone()));
            let optional = field.optional || is_optional_type(&field.ty);
            if !element.has_attr(&field.name) {
                if !optional {
                    self.error(
                        ValidationErrorKind::MissingField,
                        format!("missing required attribute '{}'", field.name),
                    );
                }
            } else {
                let value = element.get_attr(&field.name);
                if value.is_null() {
                    if !optional {
                        self.error(
                            ValidationErrorKind::NullValue,
                            format!("required attribute '{}' is null", field.name),
                        );
                    }
                } else {
                    self.validate_item(value.item(), &field.ty);
                }
            }
            self.path.pop();
        }

        // exact child count only when the type demands one
        if elmt_type.content_length > 0 {
            let count = element.child_count() as i64;
            if count != elmt_type.content_length {
                self.error(
                    ValidationErrorKind::ContentLengthMismatch,
                    format!(
                        "content length mismatch: expected {} children, got {count}",
                        elmt_type.content_length
                    ),
                );
            }
        }

        self.path.pop();
    }

    /// Occurrence over an item: containers count their elements, a scalar
    /// counts as a collection of length 1.
    fn validate_occurrence(&mut self, item: &Item, unary: &TypeUnary) {
        let reader = ItemReader::new(item.clone());
        if reader.is_array() || reader.is_list() {
            let array = reader.as_array();
            if !self.check_count(array.length() as i64, unary) {
                return;
            }
            if self.typed_array_shortcut(item, &unary.operand) {
                return;
            }
            self.validate_elements(&array, &unary.operand);
            return;
        }
        let length = if item.is_null() { 0 } else { 1 };
        if !self.check_count(length, unary) {
            return;
        }
        if length == 1 {
            self.validate_item(item, &unary.operand);
        }
    }

    fn validate_binary(&mut self, item: &Item, binary: &TypeBinary) {
        match binary.op {
            BinaryOp::Union => self.validate_union(item, binary),
            BinaryOp::Intersect => {
                let left = self.validate_fresh(item, &binary.left, 0);
                let right = self.validate_fresh(item, &binary.right, 1);
                if !left.valid {
                    self.errors.extend(left.errors);
                }
                if !right.valid {
                    self.errors.extend(right.errors);
                }
            }
            BinaryOp::Exclude => {
                let left = self.validate_fresh(item, &binary.left, 0);
                if !left.valid {
                    self.errors.extend(left.errors);
                    return;
                }
                let right = self.validate_fresh(item, &binary.right, 1);
                if right.valid {
                    self.error(
                        ValidationErrorKind::ConstraintViolation,
                        format!(
                            "value matches excluded type {}",
                            describe(&binary.right)
                        ),
                    );
                }
            }
        }
    }

    /// Try each arm in order, succeeding on the first match; otherwise
    /// surface the arm with the fewest errors plus a summary.
    fn validate_union(&mut self, item: &Item, binary: &TypeBinary) {
        let mut arms: Vec<Rc<SchemaType>> = Vec::new();
        collect_union_arms(binary, &mut arms);

        let mut best: Option<ValidationResult> = None;
        for (index, arm) in arms.iter().enumerate() {
            let result = self.validate_fresh(item, arm, index);
            if result.valid {
                return;
            }
            let better = match &best {
                Some(current) => result.error_count() < current.error_count(),
                None => true,
            };
            if better {
                best = Some(result);
            }
        }
        if let Some(best) = best {
            self.errors.extend(best.errors);
        }
        self.error(
            ValidationErrorKind::TypeMismatch,
            format!(
                "value matches no arm of union {}",
                describe(&SchemaType::Binary(TypeBinary {
                    op: binary.op,
                    left: binary.left.clone(),
                    right: binary.right.clone(),
                }))
            ),
        );
    }

    /// Validate into an isolated result, preserving the shared path and
    /// clock.
    fn validate_fresh(&mut self, item: &Item, ty: &Rc<SchemaType>, arm: usize) -> ValidationResult {
        let mut sub = Walk {
            validator: self.validator,
            path: self.path.clone(),
            depth: self.depth,
            started: self.started,
            errors: Vec::new(),
            timed_out: self.timed_out,
        };
        sub.path.push(PathSegment::UnionArm(arm));
        sub.validate_item(item, ty);
        sub.finish()
    }
}

/// Flatten a left-nested union tree into its arms, in declaration order.
fn collect_union_arms(binary: &TypeBinary, arms: &mut Vec<Rc<SchemaType>>) {
    for side in [&binary.left, &binary.right] {
        let base = unwrap_type(side);
        match &*base {
            SchemaType::Binary(inner) if inner.op == BinaryOp::Union => {
                collect_union_arms(inner, arms);
            }
            _ => arms.push(side.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MarkBuilder;
    use crate::name_pool::NamePool;
    use crate::shape::ShapePool;

    fn builder() -> MarkBuilder {
        MarkBuilder::new(NamePool::new(), ShapePool::new())
    }

    fn validator_with(schema: &str, root: &str) -> SchemaValidator {
        let mut v = SchemaValidator::new();
        v.load_schema(schema, root).expect("schema compiles");
        v
    }

    fn int_array(b: &MarkBuilder, values: &[i64]) -> Item {
        let mut arr = b.array();
        for v in values {
            arr.append(b.create_int(*v));
        }
        arr.finish()
    }

    #[test]
    fn one_or_more_accepts_non_empty() {
        let v = validator_with("type L = [int+]\n", "L");
        let b = builder();
        let result = v.validate(&int_array(&b, &[1, 2, 3]), "L");
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn one_or_more_rejects_empty_with_min_message() {
        let v = validator_with("type L = [int+]\n", "L");
        let b = builder();
        let result = v.validate(&int_array(&b, &[]), "L");
        assert!(!result.valid);
        assert_eq!(result.error_count(), 1);
        assert!(result.errors[0].message.contains("minimum required is 1"));
    }

    #[test]
    fn zero_or_more_validates_every_element() {
        let v = validator_with("type L = [int*]\n", "L");
        let b = builder();
        assert!(v.validate(&int_array(&b, &[]), "L").valid);
        assert!(v.validate(&int_array(&b, &[1, 2]), "L").valid);

        let mut arr = b.array();
        arr.append(b.create_int(1));
        arr.append(b.create_string("nope"));
        let mixed = arr.finish();
        let result = v.validate(&mixed, "L");
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::TypeMismatch);
        assert!(result.errors[0].path.contains("[1]"));
    }

    #[test]
    fn scalar_counts_as_length_one() {
        let v = validator_with("type T = int?\n", "T");
        let b = builder();
        assert!(v.validate(&b.create_int(5), "T").valid);
        assert!(v.validate(&Item::Null, "T").valid);
    }

    #[test]
    fn union_matches_either_arm() {
        let v = validator_with("type Id = int | string\n", "Id");
        let b = builder();
        assert!(v.validate(&b.create_int(7), "Id").valid);
        assert!(v.validate(&b.create_string("x"), "Id").valid);
        let result = v.validate(&b.create_bool(true), "Id");
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("union")));
    }

    #[test]
    fn intersection_requires_all_arms() {
        let v = validator_with("type T = any & int\n", "T");
        let b = builder();
        assert!(v.validate(&b.create_int(1), "T").valid);
        assert!(!v.validate(&b.create_string("s"), "T").valid);
    }

    #[test]
    fn exclusion_requires_left_without_right() {
        let v = validator_with("type T = any \\ string\n", "T");
        let b = builder();
        assert!(v.validate(&b.create_int(1), "T").valid);
        let result = v.validate(&b.create_string("s"), "T");
        assert!(!result.valid);
        assert!(result.errors[0].message.contains("excluded"));
    }

    #[test]
    fn missing_required_field_is_one_error() {
        let v = validator_with("type P = {name: string, age: int}\n", "P");
        let b = builder();
        let mut mb = b.map();
        mb.put_str("name", b.create_string("x"));
        let result = v.validate(&mb.finish(), "P");
        assert!(!result.valid);
        let missing: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::MissingField)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].path, "age");
    }

    #[test]
    fn null_in_required_slot() {
        let v = validator_with("type P = {name: string}\n", "P");
        let b = builder();
        let mut mb = b.map();
        mb.put_null("name");
        let result = v.validate(&mb.finish(), "P");
        assert_eq!(result.errors[0].kind, ValidationErrorKind::NullValue);
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        let v = validator_with("type P = {name: string, nick?: string}\n", "P");
        let b = builder();
        let mut mb = b.map();
        mb.put_str("name", b.create_string("x"));
        assert!(v.validate(&mb.finish(), "P").valid);
    }

    #[test]
    fn strict_mode_flags_unknown_fields() {
        let mut v = validator_with("type P = {name: string}\n", "P");
        let b = builder();
        let make = |b: &MarkBuilder| {
            let mut mb = b.map();
            mb.put_str("name", b.create_string("x"));
            mb.put_str("extra", b.create_int(1));
            mb.finish()
        };
        assert!(v.validate(&make(&b), "P").valid);
        v.set_strict_mode(true);
        let result = v.validate(&make(&b), "P");
        assert!(!result.valid);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::UnknownField);
    }

    #[test]
    fn numeric_promotion() {
        let v = validator_with("type F = float\ntype N = number\n", "F");
        let b = builder();
        assert!(v.validate(&b.create_int(1), "F").valid);
        assert!(v.validate(&b.create_float(1.5), "F").valid);
        assert!(v.validate(&b.create_int(1), "N").valid);
        assert!(!v.validate(&b.create_string("1"), "N").valid);
    }

    #[test]
    fn int64_accepts_big_and_small_ints() {
        let v = validator_with("type T = int64\n", "T");
        let b = builder();
        assert!(v.validate(&b.create_int(5), "T").valid);
        assert!(v.validate(&b.create_int(i64::MAX), "T").valid);
        assert!(!v.validate(&b.create_float(0.5), "T").valid);
    }

    #[test]
    fn typed_int_array_satisfies_count_only() {
        let v = validator_with("type L = [int*]\n", "L");
        let b = builder();
        assert!(v.validate(&b.create_array_int64(vec![1, 2, 3]), "L").valid);
        assert!(v.validate(&b.create_array_int(vec![1]), "L").valid);
    }

    #[test]
    fn element_tag_and_attrs() {
        let v = validator_with("type A = <article lang: string>\n", "A");
        let b = builder();
        let mut good = b.element("article");
        good.attr_str("lang", "en");
        assert!(v.validate(&good.finish(), "A").valid, "good article");

        let bad_tag = b.element("section").finish();
        let result = v.validate(&bad_tag, "A");
        assert_eq!(result.errors[0].kind, ValidationErrorKind::TagMismatch);

        let missing = b.element("article").finish();
        let result = v.validate(&missing, "A");
        assert_eq!(result.errors[0].kind, ValidationErrorKind::MissingField);
        assert!(result.errors[0].path.contains("@lang"));
    }

    #[test]
    fn format_unwrap_xml_document() {
        let v = validator_with("type Article = <article>\n", "Article");
        let b = builder();
        let mut doc = b.element("document");
        doc.child(b.element("article").finish());
        let wrapped = doc.finish();

        let with_hint = v.validate_with_format(&wrapped, "Article", Some("xml"));
        assert!(with_hint.valid, "{:?}", with_hint.errors);
        assert_eq!(with_hint.error_count(), 0);

        // no hint: the format is detected from the wrapper
        let detected = v.validate_with_format(&wrapped, "Article", None);
        assert!(detected.valid);
    }

    #[test]
    fn format_unwrap_html_body() {
        let v = validator_with("type B = <body>\n", "B");
        let b = builder();
        let mut html = b.element("html");
        html.child(b.element("head").finish());
        html.child(b.element("body").finish());
        let mut doc = b.element("document");
        doc.child(html.finish());
        let result = v.validate_with_format(&doc.finish(), "B", Some("html"));
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn depth_bound_stops_descent() {
        let mut v = validator_with("type T = {child: T | int}\n", "T");
        v.options_mut().max_depth = 5;
        let b = builder();
        // deep chain of nested maps
        let mut current = {
            let mut mb = b.map();
            mb.put_str("child", b.create_int(1));
            mb.finish()
        };
        for _ in 0..10 {
            let mut mb = b.map();
            mb.put_str("child", current);
            current = mb.finish();
        }
        let result = v.validate(&current, "T");
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DepthExceeded));
    }

    #[test]
    fn max_errors_caps_collection() {
        let mut v = validator_with("type L = [int*]\n", "L");
        v.set_max_errors(2);
        let b = builder();
        let mut arr = b.array();
        for _ in 0..10 {
            arr.append(b.create_string("bad"));
        }
        let result = v.validate(&arr.finish(), "L");
        assert!(!result.valid);
        assert_eq!(result.error_count(), 2);
    }

    #[test]
    fn unknown_root_type() {
        let v = SchemaValidator::new();
        let result = v.validate(&Item::Null, "Nope");
        assert_eq!(result.errors[0].kind, ValidationErrorKind::UnknownType);
    }
}
