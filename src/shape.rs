//! Shape pool — field-layout deduplication for maps and elements
//!
//! A shape is the ordered field layout of a map or element: interned field
//! names, declared field types, and the byte offset each field would occupy
//! in a packed buffer. Two maps with the same field list share one
//! `Rc<Shape>`, so a million-row document pays for its row layout once.
//!
//! Lookup is keyed by a 64-bit signature folding every field's name bytes
//! with its type bits, compared together with the total byte size; element
//! shapes additionally fold the tag name, so two elements of different tags
//! never share a shape even when their attribute lists coincide.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::item::{hash_bytes, TypeId};

/// Shape chains longer than this are rejected; the runtime is designed for
/// small, uniform maps.
pub const MAX_SHAPE_FIELDS: usize = 64;

#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("shape has too many fields: {count} (max {MAX_SHAPE_FIELDS})")]
    TooManyFields { count: usize },
}

/// One field of a shape.
#[derive(Debug, Clone)]
pub struct ShapeField {
    pub name: Rc<str>,
    pub type_id: TypeId,
    pub byte_offset: usize,
}

/// An immutable, pool-interned field layout.
#[derive(Debug)]
pub struct Shape {
    element_name: Option<Rc<str>>,
    fields: Vec<ShapeField>,
    byte_size: usize,
    signature: u64,
}

impl Shape {
    pub fn element_name(&self) -> Option<&Rc<str>> {
        self.element_name.as_ref()
    }

    pub fn fields(&self) -> &[ShapeField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Slot of the named field. Average O(shape length).
    pub fn find(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| &*f.name == name)
    }

    pub fn field_type(&self, name: &str) -> Option<TypeId> {
        self.find(name).map(|slot| self.fields[slot].type_id)
    }

    /// Total byte size of the packed layout this shape describes.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn signature(&self) -> u64 {
        self.signature
    }

    /// Structural equality: same tag name, same fields in name, type, and
    /// order.
    pub fn shapes_equal(&self, other: &Shape) -> bool {
        self.element_name == other.element_name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.name == b.name && a.type_id == b.type_id)
    }
}

fn compute_signature(element_name: Option<&str>, fields: &[(Rc<str>, TypeId)]) -> u64 {
    let mut h: u64 = 0;
    if let Some(name) = element_name {
        h ^= hash_bytes(name.as_bytes());
        h = h.rotate_left(7);
    }
    for (name, type_id) in fields {
        h = (h ^ hash_bytes(name.as_bytes())).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        h = (h ^ *type_id as u64).rotate_left(5);
    }
    h
}

fn build_shape(element_name: Option<Rc<str>>, fields: &[(Rc<str>, TypeId)]) -> Rc<Shape> {
    let signature = compute_signature(element_name.as_deref(), fields);
    let mut offset = 0usize;
    let shaped: Vec<ShapeField> = fields
        .iter()
        .map(|(name, type_id)| {
            let field = ShapeField {
                name: name.clone(),
                type_id: *type_id,
                byte_offset: offset,
            };
            offset += type_id.byte_width();
            field
        })
        .collect();
    Rc::new(Shape {
        element_name,
        fields: shaped,
        byte_size: offset,
        signature,
    })
}

/// Hash-indexed deduplication cache for shapes. Children delegate lookups to
/// their parent; inserts stay local.
#[derive(Debug, Default)]
pub struct ShapePool {
    shapes: RefCell<HashMap<(u64, usize), Vec<Rc<Shape>>>>,
    parent: Option<Rc<ShapePool>>,
}

impl ShapePool {
    pub fn new() -> Rc<Self> {
        Rc::new(ShapePool::default())
    }

    pub fn with_parent(parent: Rc<ShapePool>) -> Rc<Self> {
        Rc::new(ShapePool {
            shapes: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Existing shape for this layout, or a freshly interned one.
    pub fn get_map_shape(&self, fields: &[(Rc<str>, TypeId)]) -> Result<Rc<Shape>, ShapeError> {
        self.get_shape(None, fields)
    }

    /// As [`get_map_shape`](Self::get_map_shape), with the tag name folded
    /// into the signature.
    pub fn get_element_shape(
        &self,
        element_name: &Rc<str>,
        fields: &[(Rc<str>, TypeId)],
    ) -> Result<Rc<Shape>, ShapeError> {
        self.get_shape(Some(element_name.clone()), fields)
    }

    fn get_shape(
        &self,
        element_name: Option<Rc<str>>,
        fields: &[(Rc<str>, TypeId)],
    ) -> Result<Rc<Shape>, ShapeError> {
        if fields.len() > MAX_SHAPE_FIELDS {
            return Err(ShapeError::TooManyFields {
                count: fields.len(),
            });
        }
        let signature = compute_signature(element_name.as_deref(), fields);
        let byte_size: usize = fields.iter().map(|(_, t)| t.byte_width()).sum();
        let key = (signature, byte_size);

        if let Some(found) = self.lookup(key, element_name.as_deref(), fields) {
            return Ok(found);
        }

        let shape = build_shape(element_name, fields);
        self.shapes
            .borrow_mut()
            .entry(key)
            .or_default()
            .push(shape.clone());
        Ok(shape)
    }

    fn lookup(
        &self,
        key: (u64, usize),
        element_name: Option<&str>,
        fields: &[(Rc<str>, TypeId)],
    ) -> Option<Rc<Shape>> {
        if let Some(bucket) = self.shapes.borrow().get(&key) {
            for shape in bucket {
                let name_matches = match (shape.element_name.as_deref(), element_name) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                };
                if name_matches
                    && shape.fields.len() == fields.len()
                    && shape
                        .fields
                        .iter()
                        .zip(fields.iter())
                        .all(|(f, (name, type_id))| f.name == *name && f.type_id == *type_id)
                {
                    return Some(shape.clone());
                }
            }
        }
        match &self.parent {
            Some(parent) => parent.lookup(key, element_name, fields),
            None => None,
        }
    }

    /// Number of shapes interned in this pool (excluding parents).
    pub fn count(&self) -> usize {
        self.shapes.borrow().values().map(|b| b.len()).sum()
    }

    pub fn print_stats(&self) {
        tracing::debug!(
            shapes = self.count(),
            buckets = self.shapes.borrow().len(),
            "shape pool stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Rc<str> {
        Rc::from(s)
    }

    #[test]
    fn identical_layouts_share_one_shape() {
        let pool = ShapePool::new();
        let fields = [(n("name"), TypeId::String), (n("age"), TypeId::String)];
        let a = pool.get_map_shape(&fields).unwrap();
        let b = pool.get_map_shape(&fields).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn field_order_distinguishes_shapes() {
        let pool = ShapePool::new();
        let a = pool
            .get_map_shape(&[(n("a"), TypeId::Int), (n("b"), TypeId::Int)])
            .unwrap();
        let b = pool
            .get_map_shape(&[(n("b"), TypeId::Int), (n("a"), TypeId::Int)])
            .unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(!a.shapes_equal(&b));
    }

    #[test]
    fn element_tag_participates_in_identity() {
        let pool = ShapePool::new();
        let fields = [(n("href"), TypeId::String)];
        let a = pool.get_element_shape(&n("a"), &fields).unwrap();
        let link = pool.get_element_shape(&n("link"), &fields).unwrap();
        assert!(!Rc::ptr_eq(&a, &link));
    }

    #[test]
    fn offsets_are_monotone_and_sum_to_byte_size() {
        let pool = ShapePool::new();
        let shape = pool
            .get_map_shape(&[
                (n("flag"), TypeId::Bool),
                (n("count"), TypeId::Int),
                (n("label"), TypeId::String),
            ])
            .unwrap();
        let mut prev = 0;
        for field in shape.fields() {
            assert!(field.byte_offset >= prev);
            prev = field.byte_offset;
        }
        assert_eq!(shape.byte_size(), 1 + 8 + 8);
    }

    #[test]
    fn oversized_chain_is_rejected() {
        let pool = ShapePool::new();
        let fields: Vec<(Rc<str>, TypeId)> = (0..MAX_SHAPE_FIELDS + 1)
            .map(|i| (n(&format!("f{i}")), TypeId::Int))
            .collect();
        assert!(pool.get_map_shape(&fields).is_err());
    }

    #[test]
    fn child_pool_sees_parent_shapes() {
        let parent = ShapePool::new();
        let fields = [(n("x"), TypeId::Float)];
        let from_parent = parent.get_map_shape(&fields).unwrap();
        let child = ShapePool::with_parent(parent);
        let from_child = child.get_map_shape(&fields).unwrap();
        assert!(Rc::ptr_eq(&from_parent, &from_child));
        assert_eq!(child.count(), 0);
    }
}
