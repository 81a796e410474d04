//! Incremental shape construction, finalised through the pool
//!
//! A stack-local buffer collecting `(name, type)` pairs. The builder holds at
//! most [`MAX_SHAPE_FIELDS`] fields; exceeding the bound fails the build.

use std::rc::Rc;

use crate::item::TypeId;
use crate::shape::{Shape, ShapeError, ShapePool, MAX_SHAPE_FIELDS};

#[derive(Debug, Default)]
pub struct ShapeBuilder {
    element_name: Option<Rc<str>>,
    fields: Vec<(Rc<str>, TypeId)>,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        ShapeBuilder::default()
    }

    pub fn for_element(name: Rc<str>) -> Self {
        ShapeBuilder {
            element_name: Some(name),
            fields: Vec::new(),
        }
    }

    /// Add a field, or overwrite the declared type of an existing one.
    pub fn add_field(&mut self, name: Rc<str>, type_id: TypeId) -> Result<(), ShapeError> {
        if let Some(slot) = self.fields.iter().position(|(n, _)| *n == name) {
            self.fields[slot].1 = type_id;
            return Ok(());
        }
        if self.fields.len() >= MAX_SHAPE_FIELDS {
            return Err(ShapeError::TooManyFields {
                count: self.fields.len() + 1,
            });
        }
        self.fields.push((name, type_id));
        Ok(())
    }

    /// Remove a field; returns whether it was present.
    pub fn remove_field(&mut self, name: &str) -> bool {
        match self.fields.iter().position(|(n, _)| &**n == name) {
            Some(slot) => {
                self.fields.remove(slot);
                true
            }
            None => false,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| &**n == name)
    }

    pub fn field_type(&self, name: &str) -> Option<TypeId> {
        self.fields
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, t)| *t)
    }

    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| &**n == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Clone an existing chain into the builder, replacing current fields.
    pub fn import_shape(&mut self, shape: &Shape) {
        self.element_name = shape.element_name().cloned();
        self.fields = shape
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.type_id))
            .collect();
    }

    pub fn clear(&mut self) {
        self.element_name = None;
        self.fields.clear();
    }

    /// Finalise through the pool; the result is deduplicated.
    pub fn finish(&self, pool: &ShapePool) -> Result<Rc<Shape>, ShapeError> {
        match &self.element_name {
            Some(name) => pool.get_element_shape(name, &self.fields),
            None => pool.get_map_shape(&self.fields),
        }
    }
}
