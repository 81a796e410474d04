//! Mark builder — the write side of the runtime
//!
//! Every parser constructs items through this API. Atomic creators hand back
//! scalars; `array()`, `map()` and `element()` open sub-builders that are
//! consumed by `finish()`. Map and element finalisation obtains a
//! deduplicated shape from the pool and lays the values out in slot order.
//!
//! Sub-builders hold their own pool handles, so a parser can keep a builder
//! open while reporting diagnostics through the owning context.

use std::cell::RefCell;
use std::rc::Rc;

use crate::datetime::DateTime;
use crate::item::{Array, Element, Item, List, Map, Target, TypeId};
use crate::name_pool::NamePool;
use crate::shape::ShapePool;
use crate::shape_builder::ShapeBuilder;

#[derive(Debug, Clone)]
pub struct MarkBuilder {
    name_pool: Rc<NamePool>,
    shape_pool: Rc<ShapePool>,
}

impl MarkBuilder {
    pub fn new(name_pool: Rc<NamePool>, shape_pool: Rc<ShapePool>) -> Self {
        MarkBuilder {
            name_pool,
            shape_pool,
        }
    }

    pub fn name_pool(&self) -> &Rc<NamePool> {
        &self.name_pool
    }

    pub fn shape_pool(&self) -> &Rc<ShapePool> {
        &self.shape_pool
    }

    pub fn create_null(&self) -> Item {
        Item::Null
    }

    pub fn create_bool(&self, value: bool) -> Item {
        Item::Bool(value)
    }

    /// Integers promote from the inline 56-bit form to int64 by magnitude;
    /// both live in the same variant, the tag follows the value.
    pub fn create_int(&self, value: i64) -> Item {
        Item::Int(value)
    }

    pub fn create_float(&self, value: f64) -> Item {
        Item::Float(value)
    }

    pub fn create_decimal(&self, literal: &str) -> Item {
        Item::Decimal(Rc::from(literal))
    }

    /// Unshared string allocation.
    pub fn create_string(&self, text: &str) -> Item {
        Item::String(Rc::from(text))
    }

    /// Interned identifier via the name pool.
    pub fn create_name(&self, name: &str) -> Rc<str> {
        self.name_pool.create_name(name)
    }

    pub fn create_symbol(&self, name: &str) -> Item {
        Item::Symbol(self.name_pool.create_symbol(name, None))
    }

    pub fn create_symbol_with_target(&self, name: &str, target: Rc<Target>) -> Item {
        Item::Symbol(self.name_pool.create_symbol(name, Some(target)))
    }

    pub fn create_datetime(&self, dt: DateTime) -> Item {
        Item::DateTime(Rc::new(dt))
    }

    pub fn create_binary(&self, bytes: &[u8]) -> Item {
        Item::Binary(Rc::from(bytes))
    }

    pub fn create_range(&self, start: i64, end: i64) -> Item {
        Item::Range(Rc::new(crate::item::Range { start, end }))
    }

    pub fn create_array_int(&self, values: Vec<i32>) -> Item {
        Item::ArrayInt(Rc::new(RefCell::new(values)))
    }

    pub fn create_array_int64(&self, values: Vec<i64>) -> Item {
        Item::ArrayInt64(Rc::new(RefCell::new(values)))
    }

    pub fn create_array_float(&self, values: Vec<f64>) -> Item {
        Item::ArrayFloat(Rc::new(RefCell::new(values)))
    }

    pub fn array(&self) -> ArrayBuilder {
        ArrayBuilder { items: Vec::new() }
    }

    pub fn map(&self) -> MapBuilder {
        MapBuilder {
            name_pool: self.name_pool.clone(),
            shape_pool: self.shape_pool.clone(),
            fields: Vec::new(),
        }
    }

    pub fn element(&self, tag: &str) -> ElementBuilder {
        ElementBuilder {
            name_pool: self.name_pool.clone(),
            shape_pool: self.shape_pool.clone(),
            name: self.name_pool.create_name(tag),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Insert-or-replace a field on an already-built map. Existing fields
    /// of the same declared type are written in place; anything else goes
    /// through a shape rebuild.
    pub fn put_to_map(&self, map_item: &Item, key: &str, value: Item) {
        let Item::Map(map_rc) = map_item else {
            tracing::warn!("put_to_map on non-map item ignored");
            return;
        };
        let mut map = map_rc.borrow_mut();
        if let Some(slot) = map.shape.find(key) {
            if map.shape.fields()[slot].type_id == value.type_id() {
                map.values[slot] = value;
                return;
            }
        }
        let mut shaper = ShapeBuilder::new();
        shaper.import_shape(&map.shape);
        let key = self.name_pool.create_name(key);
        if shaper.add_field(key.clone(), value.type_id()).is_err() {
            tracing::warn!(key = %key, "put_to_map dropped field: shape full");
            return;
        }
        let new_shape = match shaper.finish(&self.shape_pool) {
            Ok(shape) => shape,
            Err(err) => {
                tracing::warn!(error = %err, "put_to_map shape rebuild failed");
                return;
            }
        };
        let mut values = Vec::with_capacity(new_shape.len());
        for field in new_shape.fields() {
            if &*field.name == &*key {
                values.push(value.clone());
            } else {
                match map.shape.find(&field.name) {
                    Some(old_slot) => values.push(map.values[old_slot].clone()),
                    None => values.push(Item::Null),
                }
            }
        }
        map.shape = new_shape;
        map.values = values;
    }
}

/// Fluent array construction; `finish` consumes the builder.
#[derive(Debug, Default)]
pub struct ArrayBuilder {
    items: Vec<Item>,
}

impl ArrayBuilder {
    pub fn append(&mut self, item: Item) -> &mut Self {
        self.items.push(item);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self) -> Item {
        Item::Array(Rc::new(RefCell::new(Array {
            item_type: TypeId::Any,
            items: self.items,
        })))
    }

    /// Finalise as a plain list instead of an array.
    pub fn finish_list(self) -> Item {
        Item::List(Rc::new(RefCell::new(List { items: self.items })))
    }
}

/// Map construction. Duplicate keys replace the earlier value, so the shape
/// never carries the same name twice.
#[derive(Debug)]
pub struct MapBuilder {
    name_pool: Rc<NamePool>,
    shape_pool: Rc<ShapePool>,
    fields: Vec<(Rc<str>, Item)>,
}

impl MapBuilder {
    pub fn put(&mut self, key: Rc<str>, value: Item) -> &mut Self {
        if let Some(slot) = self.fields.iter().position(|(k, _)| *k == key) {
            self.fields[slot].1 = value;
        } else {
            self.fields.push((key, value));
        }
        self
    }

    pub fn put_str(&mut self, key: &str, value: Item) -> &mut Self {
        let key = self.name_pool.create_name(key);
        self.put(key, value)
    }

    pub fn put_null(&mut self, key: &str) -> &mut Self {
        let key = self.name_pool.create_name(key);
        self.put(key, Item::Null)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Obtain the deduplicated shape and lay values out in slot order.
    /// A layout the shape pool rejects yields the error item.
    pub fn finish(self) -> Item {
        let mut shaper = ShapeBuilder::new();
        for (key, value) in &self.fields {
            if shaper.add_field(key.clone(), value.type_id()).is_err() {
                tracing::warn!("map build abandoned: too many fields");
                return Item::Error;
            }
        }
        let shape = match shaper.finish(&self.shape_pool) {
            Ok(shape) => shape,
            Err(err) => {
                tracing::warn!(error = %err, "map build abandoned");
                return Item::Error;
            }
        };
        let values = self.fields.into_iter().map(|(_, v)| v).collect();
        Item::Map(Rc::new(RefCell::new(Map { shape, values })))
    }
}

/// Element construction: attributes plus children.
#[derive(Debug)]
pub struct ElementBuilder {
    name_pool: Rc<NamePool>,
    shape_pool: Rc<ShapePool>,
    name: Rc<str>,
    attrs: Vec<(Rc<str>, Item)>,
    children: Vec<Item>,
}

impl ElementBuilder {
    pub fn tag_name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn attr(&mut self, name: &str, value: Item) -> &mut Self {
        let name = self.name_pool.create_name(name);
        if let Some(slot) = self.attrs.iter().position(|(k, _)| *k == name) {
            self.attrs[slot].1 = value;
        } else {
            self.attrs.push((name, value));
        }
        self
    }

    pub fn attr_str(&mut self, name: &str, value: &str) -> &mut Self {
        self.attr(name, Item::String(Rc::from(value)))
    }

    pub fn child(&mut self, item: Item) -> &mut Self {
        self.children.push(item);
        self
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn finish(self) -> Item {
        let mut shaper = ShapeBuilder::for_element(self.name.clone());
        for (key, value) in &self.attrs {
            if shaper.add_field(key.clone(), value.type_id()).is_err() {
                tracing::warn!(tag = %self.name, "element build abandoned: too many attributes");
                return Item::Error;
            }
        }
        let shape = match shaper.finish(&self.shape_pool) {
            Ok(shape) => shape,
            Err(err) => {
                tracing::warn!(tag = %self.name, error = %err, "element build abandoned");
                return Item::Error;
            }
        };
        let attrs = self.attrs.into_iter().map(|(_, v)| v).collect();
        Item::Element(Rc::new(RefCell::new(Element {
            name: self.name,
            shape,
            attrs,
            children: self.children,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MarkBuilder {
        MarkBuilder::new(NamePool::new(), ShapePool::new())
    }

    #[test]
    fn scalar_creators() {
        let b = builder();
        assert_eq!(b.create_null().type_id(), TypeId::Null);
        assert_eq!(b.create_bool(true), Item::Bool(true));
        assert_eq!(b.create_int(42).type_id(), TypeId::Int);
        assert_eq!(b.create_int(1 << 60).type_id(), TypeId::Int64);
        assert_eq!(b.create_string("hi").text().unwrap().as_ref(), "hi");
    }

    #[test]
    fn map_builder_replaces_duplicate_keys() {
        let b = builder();
        let mut mb = b.map();
        mb.put_str("k", b.create_int(1));
        mb.put_str("k", b.create_int(2));
        let map = mb.finish();
        let Item::Map(m) = &map else { panic!() };
        assert_eq!(m.borrow().len(), 1);
        assert_eq!(*m.borrow().get("k").unwrap(), Item::Int(2));
    }

    #[test]
    fn identical_maps_share_shapes() {
        let b = builder();
        let build = |age: i64| {
            let mut mb = b.map();
            mb.put_str("name", b.create_string("x"));
            mb.put_str("age", b.create_int(age));
            mb.finish()
        };
        let (m1, m2) = (build(1), build(2));
        let (Item::Map(a), Item::Map(bm)) = (&m1, &m2) else {
            panic!()
        };
        assert!(Rc::ptr_eq(&a.borrow().shape, &bm.borrow().shape));
    }

    #[test]
    fn element_builder_collects_attrs_and_children() {
        let b = builder();
        let mut eb = b.element("a");
        eb.attr_str("href", "http://example.com");
        eb.child(b.create_string("link text"));
        let item = eb.finish();
        let Item::Element(e) = &item else { panic!() };
        let e = e.borrow();
        assert_eq!(&*e.name, "a");
        assert_eq!(e.children.len(), 1);
        assert!(e.has_attr("href"));
    }

    #[test]
    fn put_to_map_inserts_and_replaces() {
        let b = builder();
        let mut mb = b.map();
        mb.put_str("a", b.create_int(1));
        let map = mb.finish();
        b.put_to_map(&map, "a", b.create_int(5));
        b.put_to_map(&map, "b", b.create_string("new"));
        let Item::Map(m) = &map else { panic!() };
        assert_eq!(*m.borrow().get("a").unwrap(), Item::Int(5));
        assert_eq!(m.borrow().len(), 2);
    }
}
