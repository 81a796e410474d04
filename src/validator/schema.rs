//! Schema text compiler
//!
//! Compiles `type Name = expr` definitions into the grammar of
//! [`super::types`]. The expression grammar, loosest first: union `|`,
//! intersection `&`, exclusion `\`, then a postfix occurrence (`?`, `+`,
//! `*`, `[n]`, `[n+]`, `[n,m]`) on a primary. Primaries are the primitive
//! names, `any`, `[T]` arrays, `{field: T, opt?: T}` maps, `<tag attr: T>`
//! elements, and bare identifiers as named references, resolved after the
//! whole schema has been read.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::item::TypeId;

use super::types::{
    BinaryOp, OccurrenceOp, SchemaField, SchemaType, TypeArray, TypeBinary, TypeElmt, TypeMap,
    TypeRef, TypeUnary,
};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema parse error at line {line}: {message}")]
    Parse { line: u32, message: String },
    #[error("unknown type name '{name}'")]
    UnknownType { name: String },
    #[error("duplicate type definition '{name}'")]
    DuplicateType { name: String },
}

pub fn compile_schema(text: &str) -> Result<HashMap<String, Rc<SchemaType>>, SchemaError> {
    let mut parser = SchemaParser::new(text);
    let mut definitions: HashMap<String, Rc<SchemaType>> = HashMap::new();
    let mut references: Vec<Rc<SchemaType>> = Vec::new();

    loop {
        parser.skip_trivia();
        if parser.at_eof() {
            break;
        }
        let keyword = parser.read_ident();
        if keyword != "type" {
            return Err(parser.error(format!("expected 'type', got '{keyword}'")));
        }
        parser.skip_trivia();
        let name = parser.read_ident();
        if name.is_empty() {
            return Err(parser.error("expected type name after 'type'"));
        }
        if definitions.contains_key(&name) {
            return Err(SchemaError::DuplicateType { name });
        }
        parser.skip_trivia();
        if !parser.eat('=') {
            return Err(parser.error(format!("expected '=' after 'type {name}'")));
        }
        let ty = parser.parse_expr(&mut references)?;
        definitions.insert(name, ty);
    }

    // resolve named references now that every definition is known
    for reference in &references {
        if let SchemaType::Named(r) = &**reference {
            match definitions.get(&*r.name) {
                Some(target) => {
                    *r.resolved.borrow_mut() = Some(target.clone());
                }
                None => {
                    return Err(SchemaError::UnknownType {
                        name: r.name.to_string(),
                    })
                }
            }
        }
    }

    Ok(definitions)
}

struct SchemaParser<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    _text: &'a str,
}

impl<'a> SchemaParser<'a> {
    fn new(text: &'a str) -> Self {
        SchemaParser {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            _text: text,
        }
    }

    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Whitespace and `//` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn read_int(&mut self) -> Option<i64> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out.parse().ok()
    }

    fn parse_expr(
        &mut self,
        references: &mut Vec<Rc<SchemaType>>,
    ) -> Result<Rc<SchemaType>, SchemaError> {
        let mut left = self.parse_intersect(references)?;
        loop {
            self.skip_inline();
            if self.eat('|') {
                let right = self.parse_intersect(references)?;
                left = Rc::new(SchemaType::Binary(TypeBinary {
                    op: BinaryOp::Union,
                    left,
                    right,
                }));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_intersect(
        &mut self,
        references: &mut Vec<Rc<SchemaType>>,
    ) -> Result<Rc<SchemaType>, SchemaError> {
        let mut left = self.parse_exclude(references)?;
        loop {
            self.skip_inline();
            if self.eat('&') {
                let right = self.parse_exclude(references)?;
                left = Rc::new(SchemaType::Binary(TypeBinary {
                    op: BinaryOp::Intersect,
                    left,
                    right,
                }));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_exclude(
        &mut self,
        references: &mut Vec<Rc<SchemaType>>,
    ) -> Result<Rc<SchemaType>, SchemaError> {
        let mut left = self.parse_postfix(references)?;
        loop {
            self.skip_inline();
            if self.eat('\\') {
                let right = self.parse_postfix(references)?;
                left = Rc::new(SchemaType::Binary(TypeBinary {
                    op: BinaryOp::Exclude,
                    left,
                    right,
                }));
            } else {
                return Ok(left);
            }
        }
    }

    /// Spaces and tabs only; an expression ends at a newline.
    fn skip_inline(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    fn parse_postfix(
        &mut self,
        references: &mut Vec<Rc<SchemaType>>,
    ) -> Result<Rc<SchemaType>, SchemaError> {
        self.skip_trivia();
        let mut ty = self.parse_primary(references)?;
        loop {
            match self.peek() {
                Some('?') => {
                    self.bump();
                    ty = unary(OccurrenceOp::Optional, ty, 0, 1);
                }
                Some('+') => {
                    self.bump();
                    ty = unary(OccurrenceOp::OneOrMore, ty, 1, -1);
                }
                Some('*') => {
                    self.bump();
                    ty = unary(OccurrenceOp::ZeroOrMore, ty, 0, -1);
                }
                Some('[') if self.chars.get(self.pos + 1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                    let min = self
                        .read_int()
                        .ok_or_else(|| self.error("expected count in '[n]'"))?;
                    let (min, max) = if self.eat('+') {
                        (min, -1)
                    } else if self.eat(',') {
                        self.skip_inline();
                        let max = self
                            .read_int()
                            .ok_or_else(|| self.error("expected upper bound in '[n,m]'"))?;
                        (min, max)
                    } else {
                        (min, min)
                    };
                    if !self.eat(']') {
                        return Err(self.error("expected ']' after repeat bounds"));
                    }
                    ty = unary(OccurrenceOp::Repeat, ty, min, max);
                }
                _ => return Ok(ty),
            }
        }
    }

    fn parse_primary(
        &mut self,
        references: &mut Vec<Rc<SchemaType>>,
    ) -> Result<Rc<SchemaType>, SchemaError> {
        self.skip_trivia();
        match self.peek() {
            Some('[') => {
                self.bump();
                self.skip_trivia();
                if self.eat(']') {
                    return Ok(Rc::new(SchemaType::Array(TypeArray::default())));
                }
                let item = self.parse_expr(references)?;
                self.skip_trivia();
                if !self.eat(']') {
                    return Err(self.error("expected ']' to close array type"));
                }
                Ok(Rc::new(SchemaType::Array(TypeArray {
                    item: Some(item),
                    length: None,
                })))
            }
            Some('{') => {
                self.bump();
                let fields = self.parse_fields(references, '}')?;
                Ok(Rc::new(SchemaType::Map(TypeMap { fields })))
            }
            Some('<') => {
                self.bump();
                self.skip_trivia();
                let name = self.read_ident();
                if name.is_empty() {
                    return Err(self.error("expected element name after '<'"));
                }
                self.skip_trivia();
                let attrs = if self.peek() == Some('>') {
                    Vec::new()
                } else {
                    self.parse_fields(references, '>')?
                };
                if self.chars.get(self.pos - 1) != Some(&'>') && !self.eat('>') {
                    return Err(self.error("expected '>' to close element type"));
                }
                Ok(Rc::new(SchemaType::Element(TypeElmt {
                    name: Rc::from(name.as_str()),
                    attrs,
                    content_length: 0,
                })))
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                let ident = self.read_ident();
                Ok(match primitive_for(&ident) {
                    Some(type_id) => Rc::new(SchemaType::Primitive(type_id)),
                    None if ident == "any" => Rc::new(SchemaType::Any),
                    None => {
                        let reference = Rc::new(SchemaType::Named(TypeRef {
                            name: Rc::from(ident.as_str()),
                            resolved: std::cell::RefCell::new(None),
                        }));
                        references.push(reference.clone());
                        reference
                    }
                })
            }
            Some(other) => Err(self.error(format!("unexpected character '{other}' in type"))),
            None => Err(self.error("unexpected end of schema")),
        }
    }

    /// `name: T, opt?: T` until the closing delimiter (consumed).
    fn parse_fields(
        &mut self,
        references: &mut Vec<Rc<SchemaType>>,
        close: char,
    ) -> Result<Vec<SchemaField>, SchemaError> {
        let mut fields = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(close) {
                return Ok(fields);
            }
            let name = self.read_ident();
            if name.is_empty() {
                return Err(self.error(format!("expected field name or '{close}'")));
            }
            let optional_marker = self.eat('?');
            self.skip_trivia();
            if !self.eat(':') {
                return Err(self.error(format!("expected ':' after field '{name}'")));
            }
            let ty = self.parse_expr(references)?;
            let optional = optional_marker || super::types::is_optional_type(&ty);
            fields.push(SchemaField {
                name: Rc::from(name.as_str()),
                ty,
                optional,
            });
            self.skip_trivia();
            if self.eat(',') {
                continue;
            }
            if self.eat(close) {
                return Ok(fields);
            }
            return Err(self.error(format!("expected ',' or '{close}' in field list")));
        }
    }
}

fn unary(op: OccurrenceOp, operand: Rc<SchemaType>, min: i64, max: i64) -> Rc<SchemaType> {
    Rc::new(SchemaType::Unary(TypeUnary {
        op,
        operand,
        min_count: min,
        max_count: max,
    }))
}

fn primitive_for(ident: &str) -> Option<TypeId> {
    Some(match ident {
        "null" => TypeId::Null,
        "bool" => TypeId::Bool,
        "int" => TypeId::Int,
        "int64" => TypeId::Int64,
        "float" => TypeId::Float,
        "decimal" => TypeId::Decimal,
        "number" => TypeId::Number,
        "datetime" => TypeId::DateTime,
        "symbol" => TypeId::Symbol,
        "string" => TypeId::String,
        "binary" => TypeId::Binary,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::super::types::{describe, unwrap_type};
    use super::*;

    #[test]
    fn primitive_and_array() {
        let defs = compile_schema("type L = [int+]\n").unwrap();
        let l = defs.get("L").unwrap();
        let SchemaType::Array(arr) = &**l else {
            panic!("expected array")
        };
        let item = arr.item.clone().unwrap();
        let SchemaType::Unary(u) = &*item else {
            panic!("expected unary")
        };
        assert_eq!(u.op, OccurrenceOp::OneOrMore);
        assert_eq!((u.min_count, u.max_count), (1, -1));
    }

    #[test]
    fn map_with_optional_fields() {
        let defs = compile_schema("type P = {name: string, age?: int, tags: [string]}\n").unwrap();
        let SchemaType::Map(map) = &**defs.get("P").unwrap() else {
            panic!()
        };
        assert_eq!(map.fields.len(), 3);
        assert!(!map.fields[0].optional);
        assert!(map.fields[1].optional);
    }

    #[test]
    fn element_with_attrs() {
        let defs = compile_schema("type A = <article lang: string, id?: string>\n").unwrap();
        let SchemaType::Element(e) = &**defs.get("A").unwrap() else {
            panic!()
        };
        assert_eq!(&*e.name, "article");
        assert_eq!(e.attrs.len(), 2);
        assert_eq!(e.content_length, 0);
    }

    #[test]
    fn bare_element() {
        let defs = compile_schema("type Article = <article>\n").unwrap();
        let SchemaType::Element(e) = &**defs.get("Article").unwrap() else {
            panic!()
        };
        assert_eq!(&*e.name, "article");
        assert!(e.attrs.is_empty());
    }

    #[test]
    fn unions_and_references() {
        let defs = compile_schema("type Id = int | string\ntype Row = {id: Id}\n").unwrap();
        let SchemaType::Binary(b) = &**defs.get("Id").unwrap() else {
            panic!()
        };
        assert_eq!(b.op, BinaryOp::Union);
        let SchemaType::Map(row) = &**defs.get("Row").unwrap() else {
            panic!()
        };
        let resolved = unwrap_type(&row.fields[0].ty);
        assert!(matches!(&*resolved, SchemaType::Binary(_)));
    }

    #[test]
    fn repeat_bounds() {
        let defs = compile_schema("type T = int[2,4]\ntype U = string[3+]\n").unwrap();
        let SchemaType::Unary(t) = &**defs.get("T").unwrap() else {
            panic!()
        };
        assert_eq!((t.min_count, t.max_count), (2, 4));
        let SchemaType::Unary(u) = &**defs.get("U").unwrap() else {
            panic!()
        };
        assert_eq!((u.min_count, u.max_count), (3, -1));
        assert_eq!(describe(u.operand.as_ref()), "string");
    }

    #[test]
    fn unknown_reference_is_an_error() {
        assert!(matches!(
            compile_schema("type T = Missing\n"),
            Err(SchemaError::UnknownType { .. })
        ));
    }

    #[test]
    fn duplicate_definition_is_an_error() {
        assert!(matches!(
            compile_schema("type T = int\ntype T = string\n"),
            Err(SchemaError::DuplicateType { .. })
        ));
    }

    #[test]
    fn comments_are_ignored() {
        let defs = compile_schema("// schema\ntype T = int // trailing\n").unwrap();
        assert!(defs.contains_key("T"));
    }
}
