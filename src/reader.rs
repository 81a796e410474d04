//! Mark reader — type-safe cursors over items
//!
//! Readers are lightweight value types wrapping shared handles; they never
//! mutate the underlying data. Projections on a mismatched tag return a
//! defined empty sentinel (empty string, zero, null) instead of failing, so
//! consumers that cannot guarantee tags route through here.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::datetime::DateTime;
use crate::item::{Element, Item, Map, Symbol, TypeId};

/// Depth bound carried by the tree iterators; pathological nesting stops
/// silently rather than exhausting memory.
const MAX_ITER_DEPTH: usize = 512;

/// Cursor over a single item.
#[derive(Debug, Clone)]
pub struct ItemReader {
    item: Item,
}

impl ItemReader {
    pub fn new(item: Item) -> Self {
        ItemReader { item }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn into_item(self) -> Item {
        self.item
    }

    pub fn type_id(&self) -> TypeId {
        self.item.type_id()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.item, Item::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.item, Item::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self.item, Item::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self.item, Item::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.item, Item::String(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.item, Item::Symbol(_))
    }

    pub fn is_datetime(&self) -> bool {
        matches!(self.item, Item::DateTime(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.item, Item::List(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self.item,
            Item::Array(_) | Item::ArrayInt(_) | Item::ArrayInt64(_) | Item::ArrayFloat(_)
        )
    }

    pub fn is_map(&self) -> bool {
        matches!(self.item, Item::Map(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self.item, Item::Element(_))
    }

    pub fn as_bool(&self) -> bool {
        match self.item {
            Item::Bool(v) => v,
            _ => false,
        }
    }

    pub fn as_int64(&self) -> i64 {
        match self.item {
            Item::Int(v) => v,
            Item::Float(v) => v as i64,
            _ => 0,
        }
    }

    pub fn as_int32(&self) -> i32 {
        self.as_int64() as i32
    }

    pub fn as_float(&self) -> f64 {
        match self.item {
            Item::Float(v) => v,
            Item::Int(v) => v as f64,
            _ => 0.0,
        }
    }

    /// String or symbol text; empty for any other tag.
    pub fn as_str(&self) -> Rc<str> {
        self.item.text().unwrap_or_else(|| Rc::from(""))
    }

    pub fn as_symbol(&self) -> Option<Rc<Symbol>> {
        match &self.item {
            Item::Symbol(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<Rc<DateTime>> {
        match &self.item {
            Item::DateTime(dt) => Some(dt.clone()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> ArrayReader {
        ArrayReader::new(self.item.clone())
    }

    pub fn as_map(&self) -> MapReader {
        MapReader::new(self.item.clone())
    }

    pub fn as_element(&self) -> ElementReader {
        ElementReader::new(self.item.clone())
    }
}

/// Cursor over any sequence container (list, array, typed arrays, range).
#[derive(Debug, Clone)]
pub struct ArrayReader {
    item: Item,
}

impl ArrayReader {
    pub fn new(item: Item) -> Self {
        match item {
            Item::List(_)
            | Item::Array(_)
            | Item::ArrayInt(_)
            | Item::ArrayInt64(_)
            | Item::ArrayFloat(_)
            | Item::Range(_) => ArrayReader { item },
            _ => ArrayReader { item: Item::Null },
        }
    }

    pub fn length(&self) -> usize {
        match &self.item {
            Item::List(l) => l.borrow().items.len(),
            Item::Array(a) => a.borrow().items.len(),
            Item::ArrayInt(a) => a.borrow().len(),
            Item::ArrayInt64(a) => a.borrow().len(),
            Item::ArrayFloat(a) => a.borrow().len(),
            Item::Range(r) => r.len() as usize,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Item at `index`; the null reader out of bounds.
    pub fn get(&self, index: usize) -> ItemReader {
        let item = match &self.item {
            Item::List(l) => l.borrow().items.get(index).cloned(),
            Item::Array(a) => a.borrow().items.get(index).cloned(),
            Item::ArrayInt(a) => a.borrow().get(index).map(|v| Item::Int(*v as i64)),
            Item::ArrayInt64(a) => a.borrow().get(index).map(|v| Item::Int(*v)),
            Item::ArrayFloat(a) => a.borrow().get(index).map(|v| Item::Float(*v)),
            Item::Range(r) => {
                let i = index as i64;
                if i < r.len() {
                    Some(Item::Int(r.start + i))
                } else {
                    None
                }
            }
            _ => None,
        };
        ItemReader::new(item.unwrap_or(Item::Null))
    }

    /// Restartable forward iterator.
    pub fn items(&self) -> ArrayItems {
        ArrayItems {
            reader: self.clone(),
            index: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArrayItems {
    reader: ArrayReader,
    index: usize,
}

impl Iterator for ArrayItems {
    type Item = ItemReader;

    fn next(&mut self) -> Option<ItemReader> {
        if self.index >= self.reader.length() {
            return None;
        }
        let out = self.reader.get(self.index);
        self.index += 1;
        Some(out)
    }
}

/// Cursor over a map. Lookup is shape-indexed, average O(shape length).
#[derive(Debug, Clone)]
pub struct MapReader {
    map: Option<Rc<std::cell::RefCell<Map>>>,
}

impl MapReader {
    pub fn new(item: Item) -> Self {
        match item {
            Item::Map(m) => MapReader { map: Some(m) },
            _ => MapReader { map: None },
        }
    }

    pub fn length(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.as_ref().is_some_and(|m| m.borrow().has(key))
    }

    pub fn get(&self, key: &str) -> ItemReader {
        let item = self
            .map
            .as_ref()
            .and_then(|m| m.borrow().get(key).cloned())
            .unwrap_or(Item::Null);
        ItemReader::new(item)
    }

    pub fn keys(&self) -> MapKeys {
        MapKeys {
            reader: self.clone(),
            index: 0,
        }
    }

    pub fn entries(&self) -> MapEntries {
        MapEntries {
            reader: self.clone(),
            index: 0,
        }
    }

    fn key_at(&self, index: usize) -> Option<Rc<str>> {
        self.map
            .as_ref()
            .and_then(|m| m.borrow().shape.fields().get(index).map(|f| f.name.clone()))
    }

    fn value_at(&self, index: usize) -> Option<Item> {
        self.map
            .as_ref()
            .and_then(|m| m.borrow().values.get(index).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct MapKeys {
    reader: MapReader,
    index: usize,
}

impl Iterator for MapKeys {
    type Item = Rc<str>;

    fn next(&mut self) -> Option<Rc<str>> {
        let key = self.reader.key_at(self.index)?;
        self.index += 1;
        Some(key)
    }
}

#[derive(Debug, Clone)]
pub struct MapEntries {
    reader: MapReader,
    index: usize,
}

impl Iterator for MapEntries {
    type Item = (Rc<str>, ItemReader);

    fn next(&mut self) -> Option<(Rc<str>, ItemReader)> {
        let key = self.reader.key_at(self.index)?;
        let value = self.reader.value_at(self.index).unwrap_or(Item::Null);
        self.index += 1;
        Some((key, ItemReader::new(value)))
    }
}

/// Traversal mode of the element iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Children,
    DepthFirst,
    BreadthFirst,
    TextOnly,
}

/// Cursor over an element: tag, attributes, children.
#[derive(Debug, Clone)]
pub struct ElementReader {
    elmt: Option<Rc<std::cell::RefCell<Element>>>,
}

impl ElementReader {
    pub fn new(item: Item) -> Self {
        match item {
            Item::Element(e) => ElementReader { elmt: Some(e) },
            _ => ElementReader { elmt: None },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.elmt.is_some()
    }

    pub fn tag_name(&self) -> Rc<str> {
        self.elmt
            .as_ref()
            .map(|e| e.borrow().name.clone())
            .unwrap_or_else(|| Rc::from(""))
    }

    pub fn has_tag(&self, name: &str) -> bool {
        &*self.tag_name() == name
    }

    pub fn child_count(&self) -> usize {
        self.elmt.as_ref().map_or(0, |e| e.borrow().children.len())
    }

    pub fn child_at(&self, index: usize) -> ItemReader {
        let item = self
            .elmt
            .as_ref()
            .and_then(|e| e.borrow().children.get(index).cloned())
            .unwrap_or(Item::Null);
        ItemReader::new(item)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.elmt
            .as_ref()
            .is_some_and(|e| e.borrow().has_attr(name))
    }

    pub fn get_attr(&self, name: &str) -> ItemReader {
        let item = self
            .elmt
            .as_ref()
            .and_then(|e| e.borrow().attr(name).cloned())
            .unwrap_or(Item::Null);
        ItemReader::new(item)
    }

    /// Attribute text; empty when absent or not text-like.
    pub fn get_string_attr(&self, name: &str) -> Rc<str> {
        self.get_attr(name).as_str()
    }

    pub fn attr_names(&self) -> Vec<Rc<str>> {
        self.elmt.as_ref().map_or_else(Vec::new, |e| {
            e.borrow()
                .shape
                .fields()
                .iter()
                .map(|f| f.name.clone())
                .collect()
        })
    }

    pub fn attr_count(&self) -> usize {
        self.elmt.as_ref().map_or(0, |e| e.borrow().shape.len())
    }

    fn direct_children(&self) -> Vec<Item> {
        self.elmt
            .as_ref()
            .map_or_else(Vec::new, |e| e.borrow().children.clone())
    }

    pub fn iter(&self, mode: Traversal) -> ElementIter {
        let mut pending = VecDeque::new();
        for child in self.direct_children() {
            pending.push_back((child, 1usize));
        }
        ElementIter { mode, pending }
    }

    pub fn children(&self) -> ElementIter {
        self.iter(Traversal::Children)
    }

    pub fn descendants(&self) -> ElementIter {
        self.iter(Traversal::DepthFirst)
    }

    pub fn breadth_first(&self) -> ElementIter {
        self.iter(Traversal::BreadthFirst)
    }

    /// Yields only the string children.
    pub fn text_children(&self) -> ElementIter {
        self.iter(Traversal::TextOnly)
    }

    /// Concatenated text of all string children.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in self.text_children() {
            out.push_str(&child.as_str());
        }
        out
    }
}

/// Iterator over element content; the mode is fixed at construction. The
/// iterator owns its own frontier and never mutates the tree.
#[derive(Debug, Clone)]
pub struct ElementIter {
    mode: Traversal,
    pending: VecDeque<(Item, usize)>,
}

impl Iterator for ElementIter {
    type Item = ItemReader;

    fn next(&mut self) -> Option<ItemReader> {
        loop {
            let (item, depth) = self.pending.pop_front()?;
            match self.mode {
                Traversal::Children => return Some(ItemReader::new(item)),
                Traversal::TextOnly => {
                    if matches!(item, Item::String(_)) {
                        return Some(ItemReader::new(item));
                    }
                }
                Traversal::DepthFirst => {
                    if let Item::Element(e) = &item {
                        if depth < MAX_ITER_DEPTH {
                            for (i, child) in e.borrow().children.iter().enumerate() {
                                self.pending.insert(i, (child.clone(), depth + 1));
                            }
                        }
                    }
                    return Some(ItemReader::new(item));
                }
                Traversal::BreadthFirst => {
                    if let Item::Element(e) = &item {
                        if depth < MAX_ITER_DEPTH {
                            for child in e.borrow().children.iter() {
                                self.pending.push_back((child.clone(), depth + 1));
                            }
                        }
                    }
                    return Some(ItemReader::new(item));
                }
            }
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

    #[test]
    fn wrong_tag_projections_return_sentinels() {
        let r = ItemReader::new(Item::Bool(true));
        assert_eq!(&*r.as_str(), "");
        assert_eq!(r.as_int64(), 0);
        assert_eq!(r.as_map().length(), 0);
        assert_eq!(r.as_array().length(), 0);
        assert!(!r.as_element().is_valid());
    }

    #[test]
    fn map_entries_agree_with_get() {
        let b = builder();
        let mut mb = b.map();
        mb.put_str("a", b.create_int(1));
        mb.put_str("b", b.create_string("two"));
        let map = ItemReader::new(mb.finish()).as_map();

        for (key, value) in map.entries() {
            assert_eq!(map.get(&key).item(), value.item());
        }
        let keys: Vec<_> = map.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn typed_arrays_read_as_items() {
        let b = builder();
        let arr = ItemReader::new(b.create_array_int64(vec![10, 20])).as_array();
        assert_eq!(arr.length(), 2);
        assert_eq!(arr.get(1).as_int64(), 20);
        assert!(arr.get(5).is_null());

        let range = ItemReader::new(b.create_range(3, 5)).as_array();
        assert_eq!(range.length(), 3);
        assert_eq!(range.get(2).as_int64(), 5);
    }

    fn sample_tree(b: &MarkBuilder) -> Item {
        // <doc><p>"hello" <b>"bold"</b></p> "tail"</doc>
        let mut bold = b.element("b");
        bold.child(b.create_string("bold"));
        let mut p = b.element("p");
        p.child(b.create_string("hello"));
        p.child(bold.finish());
        let mut doc = b.element("doc");
        doc.child(p.finish());
        doc.child(b.create_string("tail"));
        doc.finish()
    }

    #[test]
    fn traversal_modes() {
        let b = builder();
        let doc = ItemReader::new(sample_tree(&b)).as_element();

        let children: Vec<_> = doc.children().map(|c| c.type_id()).collect();
        assert_eq!(children, vec![TypeId::Element, TypeId::String]);

        let depth_tags: Vec<String> = doc
            .descendants()
            .map(|c| {
                if c.is_element() {
                    c.as_element().tag_name().to_string()
                } else {
                    c.as_str().to_string()
                }
            })
            .collect();
        assert_eq!(depth_tags, vec!["p", "hello", "b", "bold", "tail"]);

        let breadth_tags: Vec<String> = doc
            .breadth_first()
            .map(|c| {
                if c.is_element() {
                    c.as_element().tag_name().to_string()
                } else {
                    c.as_str().to_string()
                }
            })
            .collect();
        assert_eq!(breadth_tags, vec!["p", "tail", "hello", "b", "bold"]);

        let text: Vec<String> = doc.text_children().map(|c| c.as_str().to_string()).collect();
        assert_eq!(text, vec!["tail"]);
    }
}
