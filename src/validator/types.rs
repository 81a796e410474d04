//! Schema grammar types
//!
//! A value-type DSL built by the schema loader and never mutated by the
//! validator. Named references (`TypeRef`) resolve after load; unwrapping a
//! reference chain is depth-capped so it always terminates.

use std::cell::RefCell;
use std::rc::Rc;

use crate::item::TypeId;

/// Occurrence operator of a `TypeUnary`. The shorthands `?`, `+`, `*`
/// desugar to the explicit `min_count`/`max_count` pair; `Repeat` covers
/// `[n]`, `[n+]`, and `[n,m]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceOp {
    Optional,
    OneOrMore,
    ZeroOrMore,
    Repeat,
}

#[derive(Debug)]
pub struct TypeUnary {
    pub op: OccurrenceOp,
    pub operand: Rc<SchemaType>,
    pub min_count: i64,
    /// -1 means unbounded.
    pub max_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Union,
    Intersect,
    Exclude,
}

#[derive(Debug)]
pub struct TypeBinary {
    pub op: BinaryOp,
    pub left: Rc<SchemaType>,
    pub right: Rc<SchemaType>,
}

#[derive(Debug)]
pub struct SchemaField {
    pub name: Rc<str>,
    pub ty: Rc<SchemaType>,
    pub optional: bool,
}

#[derive(Debug, Default)]
pub struct TypeMap {
    pub fields: Vec<SchemaField>,
}

/// Extends the map shape with a tag name and an expected child count
/// (0 means unconstrained).
#[derive(Debug)]
pub struct TypeElmt {
    pub name: Rc<str>,
    pub attrs: Vec<SchemaField>,
    pub content_length: i64,
}

#[derive(Debug, Default)]
pub struct TypeArray {
    pub item: Option<Rc<SchemaType>>,
    pub length: Option<i64>,
}

/// Function signature node. The grammar carries it; the validator reports
/// it as unsupported for document validation.
#[derive(Debug)]
pub struct TypeFunc {
    pub params: Vec<Rc<SchemaType>>,
    pub returned: Option<Rc<SchemaType>>,
}

/// Named type reference; resolved against the loaded definitions.
#[derive(Debug)]
pub struct TypeRef {
    pub name: Rc<str>,
    pub resolved: RefCell<Option<Rc<SchemaType>>>,
}

#[derive(Debug)]
pub enum SchemaType {
    Primitive(TypeId),
    Any,
    Array(TypeArray),
    Map(TypeMap),
    Element(TypeElmt),
    Unary(TypeUnary),
    Binary(TypeBinary),
    Func(TypeFunc),
    Named(TypeRef),
}

const MAX_UNWRAP_DEPTH: usize = 32;

/// Follow `Named` wrappers to the underlying type. Only reference wrappers
/// unwrap; `Unary`/`Binary` operands stay put. The chain is capped, so a
/// reference cycle yields the last wrapper instead of looping.
pub fn unwrap_type(ty: &Rc<SchemaType>) -> Rc<SchemaType> {
    let mut current = ty.clone();
    for _ in 0..MAX_UNWRAP_DEPTH {
        let next = match &*current {
            SchemaType::Named(reference) => match reference.resolved.borrow().as_ref() {
                Some(resolved) => resolved.clone(),
                None => return current.clone(),
            },
            _ => return current,
        };
        current = next;
    }
    current
}

/// A field whose type admits zero occurrences is optional.
pub fn is_optional_type(ty: &Rc<SchemaType>) -> bool {
    match &*unwrap_type(ty) {
        SchemaType::Unary(unary) => unary.min_count == 0,
        _ => false,
    }
}

/// Human-readable name for diagnostics.
pub fn describe(ty: &SchemaType) -> String {
    match ty {
        SchemaType::Primitive(t) => t.name().to_string(),
        SchemaType::Any => "any".to_string(),
        SchemaType::Array(_) => "array".to_string(),
        SchemaType::Map(_) => "map".to_string(),
        SchemaType::Element(e) => format!("<{}>", e.name),
        SchemaType::Unary(u) => {
            let suffix = match u.op {
                OccurrenceOp::Optional => "?".to_string(),
                OccurrenceOp::OneOrMore => "+".to_string(),
                OccurrenceOp::ZeroOrMore => "*".to_string(),
                OccurrenceOp::Repeat => {
                    if u.max_count < 0 {
                        format!("[{}+]", u.min_count)
                    } else if u.min_count == u.max_count {
                        format!("[{}]", u.min_count)
                    } else {
                        format!("[{},{}]", u.min_count, u.max_count)
                    }
                }
            };
            format!("{}{}", describe(&u.operand), suffix)
        }
        SchemaType::Binary(b) => {
            let op = match b.op {
                BinaryOp::Union => "|",
                BinaryOp::Intersect => "&",
                BinaryOp::Exclude => "\\",
            };
            format!("{} {} {}", describe(&b.left), op, describe(&b.right))
        }
        SchemaType::Func(_) => "fn".to_string(),
        SchemaType::Named(r) => r.name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_follows_reference_chains() {
        let base = Rc::new(SchemaType::Primitive(TypeId::Int));
        let inner = Rc::new(SchemaType::Named(TypeRef {
            name: Rc::from("A"),
            resolved: RefCell::new(Some(base.clone())),
        }));
        let outer = Rc::new(SchemaType::Named(TypeRef {
            name: Rc::from("B"),
            resolved: RefCell::new(Some(inner)),
        }));
        assert!(matches!(
            &*unwrap_type(&outer),
            SchemaType::Primitive(TypeId::Int)
        ));
    }

    #[test]
    fn unwrap_terminates_on_cycles() {
        let a = Rc::new(SchemaType::Named(TypeRef {
            name: Rc::from("A"),
            resolved: RefCell::new(None),
        }));
        let b = Rc::new(SchemaType::Named(TypeRef {
            name: Rc::from("B"),
            resolved: RefCell::new(Some(a.clone())),
        }));
        if let SchemaType::Named(reference) = &*a {
            *reference.resolved.borrow_mut() = Some(b.clone());
        }
        // cycle: must still return
        let out = unwrap_type(&a);
        assert!(matches!(&*out, SchemaType::Named(_)));
    }

    #[test]
    fn optionality_comes_from_min_count() {
        let int = Rc::new(SchemaType::Primitive(TypeId::Int));
        let optional = Rc::new(SchemaType::Unary(TypeUnary {
            op: OccurrenceOp::Optional,
            operand: int.clone(),
            min_count: 0,
            max_count: 1,
        }));
        let required = Rc::new(SchemaType::Unary(TypeUnary {
            op: OccurrenceOp::OneOrMore,
            operand: int.clone(),
            min_count: 1,
            max_count: -1,
        }));
        assert!(is_optional_type(&optional));
        assert!(!is_optional_type(&required));
        assert!(!is_optional_type(&int));
    }
}
