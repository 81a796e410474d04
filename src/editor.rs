//! Mark editor — CRUD over an existing tree
//!
//! Two modes. Inline mutates containers in place through their shared
//! handles; replaced values are simply dropped. Immutable is copy-on-write:
//! every operation returns a new container sharing unchanged children, and
//! a version chain supports commit/undo/redo. Switching back to inline
//! clears the chain.
//!
//! Shapes are never mutated: every field or attribute change either writes
//! a type-compatible value at the existing slot or obtains a new shape from
//! the pool and migrates the slot vector.

use std::rc::Rc;

use crate::builder::MarkBuilder;
use crate::item::{Array, Element, Item, List, Map};
use crate::shape::Shape;
use crate::shape_builder::ShapeBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Inline,
    Immutable,
}

/// One committed state of the document.
#[derive(Debug, Clone)]
pub struct EditVersion {
    pub root: Item,
    pub version_number: i32,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct MarkEditor {
    builder: MarkBuilder,
    mode: EditMode,
    versions: Vec<EditVersion>,
    current: usize,
    next_version: i32,
}

impl MarkEditor {
    pub fn new(builder: MarkBuilder, mode: EditMode) -> Self {
        MarkEditor {
            builder,
            mode,
            versions: Vec::new(),
            current: 0,
            next_version: 1,
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Switching to inline mode clears the version chain.
    pub fn set_mode(&mut self, mode: EditMode) {
        if mode == EditMode::Inline && self.mode == EditMode::Immutable {
            self.versions.clear();
            self.current = 0;
        }
        self.mode = mode;
    }

    pub fn builder(&self) -> &MarkBuilder {
        &self.builder
    }

    // -- map operations --------------------------------------------------

    /// Insert-or-replace one field.
    pub fn map_update(&mut self, map: &Item, key: &str, value: Item) -> Item {
        self.map_update_batch(map, &[(key, value)])
    }

    /// Alias of update; insertion works the same way.
    pub fn map_insert(&mut self, map: &Item, key: &str, value: Item) -> Item {
        self.map_update(map, key, value)
    }

    /// Apply several field updates with a single shape rebuild.
    pub fn map_update_batch(&mut self, map: &Item, updates: &[(&str, Item)]) -> Item {
        let Item::Map(map_rc) = map else {
            tracing::warn!("map_update on non-map item");
            return map.clone();
        };

        // fast path: every key exists with a matching declared type
        if self.mode == EditMode::Inline {
            let mut m = map_rc.borrow_mut();
            let compatible = updates.iter().all(|(key, value)| {
                m.shape
                    .field_type(key)
                    .is_some_and(|t| t == value.type_id())
            });
            if compatible {
                for (key, value) in updates {
                    let slot = m.shape.find(key).expect("checked above");
                    m.values[slot] = value.clone();
                }
                drop(m);
                return map.clone();
            }
        }

        let mut fields = map_fields(&map_rc.borrow());
        for (key, value) in updates {
            match fields.iter_mut().find(|(k, _)| &**k == *key) {
                Some(entry) => entry.1 = value.clone(),
                None => fields.push((self.builder.create_name(key), value.clone())),
            }
        }
        self.rebuild_map(map_rc, fields)
    }

    /// Remove one field, migrating the remaining data to a new shape.
    pub fn map_delete(&mut self, map: &Item, key: &str) -> Item {
        self.map_delete_batch(map, &[key])
    }

    pub fn map_delete_batch(&mut self, map: &Item, keys: &[&str]) -> Item {
        let Item::Map(map_rc) = map else {
            tracing::warn!("map_delete on non-map item");
            return map.clone();
        };
        let mut fields = map_fields(&map_rc.borrow());
        fields.retain(|(k, _)| !keys.contains(&&**k));
        self.rebuild_map(map_rc, fields)
    }

    /// Preserve the value under a new key.
    pub fn map_rename(&mut self, map: &Item, old_key: &str, new_key: &str) -> Item {
        let Item::Map(map_rc) = map else {
            tracing::warn!("map_rename on non-map item");
            return map.clone();
        };
        let mut fields = map_fields(&map_rc.borrow());
        match fields.iter_mut().find(|(k, _)| &**k == old_key) {
            Some(entry) => entry.0 = self.builder.create_name(new_key),
            None => {
                tracing::warn!(key = old_key, "map_rename: no such field");
                return map.clone();
            }
        }
        self.rebuild_map(map_rc, fields)
    }

    fn rebuild_map(
        &mut self,
        map_rc: &Rc<std::cell::RefCell<Map>>,
        fields: Vec<(Rc<str>, Item)>,
    ) -> Item {
        let Some((shape, values)) = self.shape_for_fields(None, &fields) else {
            return Item::Error;
        };
        match self.mode {
            EditMode::Inline => {
                let mut m = map_rc.borrow_mut();
                m.shape = shape;
                m.values = values;
                drop(m);
                Item::Map(map_rc.clone())
            }
            EditMode::Immutable => Item::Map(Rc::new(std::cell::RefCell::new(Map {
                shape,
                values,
            }))),
        }
    }

    // -- element operations ----------------------------------------------

    pub fn elmt_update_attr(&mut self, element: &Item, attr: &str, value: Item) -> Item {
        self.elmt_update_attr_batch(element, &[(attr, value)])
    }

    pub fn elmt_update_attr_batch(&mut self, element: &Item, updates: &[(&str, Item)]) -> Item {
        let Item::Element(elmt_rc) = element else {
            tracing::warn!("elmt_update_attr on non-element item");
            return element.clone();
        };
        if self.mode == EditMode::Inline {
            let mut e = elmt_rc.borrow_mut();
            let compatible = updates.iter().all(|(key, value)| {
                e.shape
                    .field_type(key)
                    .is_some_and(|t| t == value.type_id())
            });
            if compatible {
                for (key, value) in updates {
                    let slot = e.shape.find(key).expect("checked above");
                    e.attrs[slot] = value.clone();
                }
                drop(e);
                return element.clone();
            }
        }
        let (name, mut attrs, children) = element_parts(&elmt_rc.borrow());
        for (key, value) in updates {
            match attrs.iter_mut().find(|(k, _)| &**k == *key) {
                Some(entry) => entry.1 = value.clone(),
                None => attrs.push((self.builder.create_name(key), value.clone())),
            }
        }
        self.rebuild_element(elmt_rc, name, attrs, children)
    }

    pub fn elmt_delete_attr(&mut self, element: &Item, attr: &str) -> Item {
        let Item::Element(elmt_rc) = element else {
            tracing::warn!("elmt_delete_attr on non-element item");
            return element.clone();
        };
        let (name, mut attrs, children) = element_parts(&elmt_rc.borrow());
        attrs.retain(|(k, _)| &**k != attr);
        self.rebuild_element(elmt_rc, name, attrs, children)
    }

    /// Insert at `index`; `-1` appends.
    pub fn elmt_insert_child(&mut self, element: &Item, index: i64, child: Item) -> Item {
        self.elmt_insert_children(element, index, &[child])
    }

    pub fn elmt_append_child(&mut self, element: &Item, child: Item) -> Item {
        self.elmt_insert_child(element, -1, child)
    }

    pub fn elmt_insert_children(&mut self, element: &Item, index: i64, new: &[Item]) -> Item {
        self.with_children(element, |children| {
            let at = normalize_insert_index(index, children.len());
            for (offset, child) in new.iter().enumerate() {
                children.insert(at + offset, child.clone());
            }
        })
    }

    pub fn elmt_replace_child(&mut self, element: &Item, index: usize, new_child: Item) -> Item {
        self.with_children(element, |children| {
            if index < children.len() {
                children[index] = new_child.clone();
            } else {
                tracing::warn!(index, "elmt_replace_child out of bounds");
            }
        })
    }

    pub fn elmt_delete_child(&mut self, element: &Item, index: usize) -> Item {
        self.with_children(element, |children| {
            if index < children.len() {
                children.remove(index);
            } else {
                tracing::warn!(index, "elmt_delete_child out of bounds");
            }
        })
    }

    /// Delete children in `[start, end)`.
    pub fn elmt_delete_children(&mut self, element: &Item, start: usize, end: usize) -> Item {
        self.with_children(element, |children| {
            let end = end.min(children.len());
            if start < end {
                children.drain(start..end);
            }
        })
    }

    /// New element with the same attributes and children, different tag.
    pub fn elmt_rename(&mut self, element: &Item, new_tag: &str) -> Item {
        let Item::Element(elmt_rc) = element else {
            tracing::warn!("elmt_rename on non-element item");
            return element.clone();
        };
        let (_, attrs, children) = element_parts(&elmt_rc.borrow());
        let name = self.builder.create_name(new_tag);
        // the tag participates in shape identity, so renaming always goes
        // through the pool even in inline mode
        let Some((shape, values)) = self.shape_for_fields(Some(name.clone()), &attrs) else {
            return Item::Error;
        };
        let rebuilt = Element {
            name,
            shape,
            attrs: values,
            children,
        };
        match self.mode {
            EditMode::Inline => {
                *elmt_rc.borrow_mut() = rebuilt;
                Item::Element(elmt_rc.clone())
            }
            EditMode::Immutable => Item::Element(Rc::new(std::cell::RefCell::new(rebuilt))),
        }
    }

    fn with_children<F>(&mut self, element: &Item, edit: F) -> Item
    where
        F: FnOnce(&mut Vec<Item>),
    {
        let Item::Element(elmt_rc) = element else {
            tracing::warn!("child edit on non-element item");
            return element.clone();
        };
        match self.mode {
            EditMode::Inline => {
                edit(&mut elmt_rc.borrow_mut().children);
                Item::Element(elmt_rc.clone())
            }
            EditMode::Immutable => {
                let e = elmt_rc.borrow();
                let mut children = e.children.clone();
                edit(&mut children);
                Item::Element(Rc::new(std::cell::RefCell::new(Element {
                    name: e.name.clone(),
                    shape: e.shape.clone(),
                    attrs: e.attrs.clone(),
                    children,
                })))
            }
        }
    }

    fn rebuild_element(
        &mut self,
        elmt_rc: &Rc<std::cell::RefCell<Element>>,
        name: Rc<str>,
        attrs: Vec<(Rc<str>, Item)>,
        children: Vec<Item>,
    ) -> Item {
        let Some((shape, values)) = self.shape_for_fields(Some(name.clone()), &attrs) else {
            return Item::Error;
        };
        let rebuilt = Element {
            name,
            shape,
            attrs: values,
            children,
        };
        match self.mode {
            EditMode::Inline => {
                *elmt_rc.borrow_mut() = rebuilt;
                Item::Element(elmt_rc.clone())
            }
            EditMode::Immutable => Item::Element(Rc::new(std::cell::RefCell::new(rebuilt))),
        }
    }

    fn shape_for_fields(
        &self,
        element_name: Option<Rc<str>>,
        fields: &[(Rc<str>, Item)],
    ) -> Option<(Rc<Shape>, Vec<Item>)> {
        let mut shaper = match element_name {
            Some(name) => ShapeBuilder::for_element(name),
            None => ShapeBuilder::new(),
        };
        for (key, value) in fields {
            if let Err(err) = shaper.add_field(key.clone(), value.type_id()) {
                tracing::warn!(error = %err, "edit abandoned: shape rebuild failed");
                return None;
            }
        }
        match shaper.finish(self.builder.shape_pool()) {
            Ok(shape) => {
                let values = fields.iter().map(|(_, v)| v.clone()).collect();
                Some((shape, values))
            }
            Err(err) => {
                tracing::warn!(error = %err, "edit abandoned: shape rebuild failed");
                None
            }
        }
    }

    // -- array operations ------------------------------------------------

    pub fn array_set(&mut self, array: &Item, index: usize, value: Item) -> Item {
        self.with_items(array, |items| {
            if index < items.len() {
                items[index] = value.clone();
            } else {
                tracing::warn!(index, "array_set out of bounds");
            }
        })
    }

    pub fn array_insert(&mut self, array: &Item, index: i64, value: Item) -> Item {
        self.with_items(array, |items| {
            let at = normalize_insert_index(index, items.len());
            items.insert(at, value.clone());
        })
    }

    pub fn array_delete(&mut self, array: &Item, index: usize) -> Item {
        self.with_items(array, |items| {
            if index < items.len() {
                items.remove(index);
            } else {
                tracing::warn!(index, "array_delete out of bounds");
            }
        })
    }

    pub fn array_append(&mut self, array: &Item, value: Item) -> Item {
        self.array_insert(array, -1, value)
    }

    fn with_items<F>(&mut self, array: &Item, edit: F) -> Item
    where
        F: FnOnce(&mut Vec<Item>),
    {
        match array {
            Item::Array(arr_rc) => match self.mode {
                EditMode::Inline => {
                    edit(&mut arr_rc.borrow_mut().items);
                    Item::Array(arr_rc.clone())
                }
                EditMode::Immutable => {
                    let a = arr_rc.borrow();
                    let mut items = a.items.clone();
                    edit(&mut items);
                    Item::Array(Rc::new(std::cell::RefCell::new(Array {
                        item_type: a.item_type,
                        items,
                    })))
                }
            },
            Item::List(list_rc) => match self.mode {
                EditMode::Inline => {
                    edit(&mut list_rc.borrow_mut().items);
                    Item::List(list_rc.clone())
                }
                EditMode::Immutable => {
                    let mut items = list_rc.borrow().items.clone();
                    edit(&mut items);
                    Item::List(Rc::new(std::cell::RefCell::new(List { items })))
                }
            },
            _ => {
                tracing::warn!("array edit on non-sequence item");
                array.clone()
            }
        }
    }

    // -- version control (immutable mode) --------------------------------

    /// Record `root` as a new version; an undo's forward chain is
    /// truncated.
    pub fn commit(&mut self, root: &Item, description: Option<&str>) -> i32 {
        if self.mode != EditMode::Immutable {
            tracing::warn!("commit outside immutable mode is ignored");
            return 0;
        }
        if !self.versions.is_empty() {
            self.versions.truncate(self.current + 1);
        }
        let number = self.next_version;
        self.next_version += 1;
        self.versions.push(EditVersion {
            root: root.clone(),
            version_number: number,
            description: description.map(str::to_string),
        });
        self.current = self.versions.len() - 1;
        number
    }

    pub fn undo(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.current + 1 < self.versions.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Root of the current version; null before any commit.
    pub fn current(&self) -> Item {
        self.versions
            .get(self.current)
            .map(|v| v.root.clone())
            .unwrap_or(Item::Null)
    }

    pub fn get_version(&self, version_number: i32) -> Option<Item> {
        self.versions
            .iter()
            .find(|v| v.version_number == version_number)
            .map(|v| v.root.clone())
    }

    pub fn list_versions(&self) -> &[EditVersion] {
        &self.versions
    }
}

fn map_fields(map: &Map) -> Vec<(Rc<str>, Item)> {
    map.shape
        .fields()
        .iter()
        .zip(map.values.iter())
        .map(|(f, v)| (f.name.clone(), v.clone()))
        .collect()
}

fn element_parts(element: &Element) -> (Rc<str>, Vec<(Rc<str>, Item)>, Vec<Item>) {
    let attrs = element
        .shape
        .fields()
        .iter()
        .zip(element.attrs.iter())
        .map(|(f, v)| (f.name.clone(), v.clone()))
        .collect();
    (element.name.clone(), attrs, element.children.clone())
}

fn normalize_insert_index(index: i64, len: usize) -> usize {
    if index < 0 {
        len
    } else {
        (index as usize).min(len)
    }
}
