//! Node structures for the XML tree.
//!
//! Nodes are reference counted with a weak parent pointer, so selectors can
//! walk upwards and elements can be detached and re-attached while the
//! exporter reshapes a skeleton document.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::content::{XmlContent, XmlElement};

/// A reference-counted pointer to a node.
pub type XmlNodeRef = Rc<RefCell<XmlNode>>;

/// Creates a new node reference.
pub fn new_node(content: XmlContent) -> XmlNodeRef {
    Rc::new(RefCell::new(XmlNode::new(content)))
}

/// Creates a new element node with no attributes.
pub fn new_element(name: impl Into<String>) -> XmlNodeRef {
    new_node(XmlContent::Element(XmlElement::new(name)))
}

/// Creates a new text node.
pub fn new_text(text: impl Into<String>) -> XmlNodeRef {
    new_node(XmlContent::Text(text.into()))
}

/// The inner data of a node in the parse tree.
///
/// Each node has:
/// - 0 or more children
/// - XML content (element, text, comment, ...)
/// - A parent (except for the document node and detached nodes)
/// - A position among siblings
#[derive(Debug)]
pub struct XmlNode {
    /// Child nodes.
    children: Vec<XmlNodeRef>,
    /// XML content of this node.
    content: XmlContent,
    /// Weak reference to parent node.
    parent: Weak<RefCell<XmlNode>>,
    /// Zero-based position among siblings.
    child_pos: usize,
}

impl XmlNode {
    fn new(content: XmlContent) -> Self {
        XmlNode {
            children: Vec::new(),
            content,
            parent: Weak::new(),
            child_pos: 0,
        }
    }

    /// Returns the content of this node.
    pub fn content(&self) -> &XmlContent {
        &self.content
    }

    /// Returns a mutable reference to the content.
    pub fn content_mut(&mut self) -> &mut XmlContent {
        &mut self.content
    }

    /// Returns the element content, if this is an element.
    pub fn element(&self) -> Option<&XmlElement> {
        self.content.as_element()
    }

    /// Returns the mutable element content, if this is an element.
    pub fn element_mut(&mut self) -> Option<&mut XmlElement> {
        self.content.as_element_mut()
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns the children as a slice.
    pub fn children(&self) -> &[XmlNodeRef] {
        &self.children
    }

    /// Returns a weak reference to the parent.
    pub fn parent(&self) -> &Weak<RefCell<XmlNode>> {
        &self.parent
    }

    /// Returns the child position (0-based index among siblings).
    pub fn child_pos(&self) -> usize {
        self.child_pos
    }
}

/// Helper functions that work with XmlNodeRef.
impl XmlNode {
    /// Adds a child node at the end.
    pub fn add_child_to_ref(parent_ref: &XmlNodeRef, child_ref: XmlNodeRef) {
        let len = parent_ref.borrow().children.len();
        Self::add_child_at_to_ref(parent_ref, len, child_ref);
    }

    /// Inserts a child at the given index.
    ///
    /// A node still attached elsewhere is detached first.
    pub fn add_child_at_to_ref(parent_ref: &XmlNodeRef, index: usize, child_ref: XmlNodeRef) {
        Self::detach(&child_ref);
        {
            let mut child = child_ref.borrow_mut();
            child.parent = Rc::downgrade(parent_ref);
        }
        let mut parent = parent_ref.borrow_mut();
        let index = index.min(parent.children.len());
        parent.children.insert(index, child_ref);
        for i in index..parent.children.len() {
            parent.children[i].borrow_mut().child_pos = i;
        }
    }

    /// Removes the child at the given index, returning it.
    pub fn remove_child_to_ref(parent_ref: &XmlNodeRef, index: usize) -> Option<XmlNodeRef> {
        let mut parent = parent_ref.borrow_mut();
        if index >= parent.children.len() {
            return None;
        }
        let removed = parent.children.remove(index);
        for i in index..parent.children.len() {
            parent.children[i].borrow_mut().child_pos = i;
        }
        drop(parent);
        removed.borrow_mut().parent = Weak::new();
        Some(removed)
    }

    /// Removes all children.
    pub fn remove_children_to_ref(parent_ref: &XmlNodeRef) {
        let children = std::mem::take(&mut parent_ref.borrow_mut().children);
        for child in children {
            child.borrow_mut().parent = Weak::new();
        }
    }

    /// Detaches a node from its parent, if it has one.
    pub fn detach(node_ref: &XmlNodeRef) {
        let (parent, pos) = {
            let node = node_ref.borrow();
            (node.parent.upgrade(), node.child_pos)
        };
        if let Some(parent) = parent {
            let is_same = parent
                .borrow()
                .children
                .get(pos)
                .is_some_and(|c| Rc::ptr_eq(c, node_ref));
            if is_same {
                Self::remove_child_to_ref(&parent, pos);
            }
        }
    }

    /// Gets the left sibling of a node.
    pub fn left_sibling_of_ref(node_ref: &XmlNodeRef) -> Option<XmlNodeRef> {
        let node = node_ref.borrow();
        if node.child_pos == 0 {
            return None;
        }
        let parent = node.parent.upgrade()?;
        let parent_borrowed = parent.borrow();
        parent_borrowed.children.get(node.child_pos - 1).cloned()
    }

    /// Returns the element children of a node.
    pub fn element_children(node_ref: &XmlNodeRef) -> Vec<XmlNodeRef> {
        node_ref
            .borrow()
            .children
            .iter()
            .filter(|c| c.borrow().content.is_element())
            .cloned()
            .collect()
    }

    /// Concatenates the text of all descendant text and CDATA nodes.
    pub fn text_content(node_ref: &XmlNodeRef) -> String {
        let mut out = String::new();
        collect_text(node_ref, &mut out);
        out
    }

    /// Replaces all children with a single text node.
    pub fn set_text_content(node_ref: &XmlNodeRef, text: &str) {
        Self::remove_children_to_ref(node_ref);
        if !text.is_empty() {
            Self::add_child_to_ref(node_ref, new_text(text));
        }
    }

    /// Copies a subtree into fresh, detached nodes.
    pub fn deep_clone(node_ref: &XmlNodeRef) -> XmlNodeRef {
        let node = node_ref.borrow();
        let copy = new_node(node.content.clone());
        for child in &node.children {
            Self::add_child_to_ref(&copy, Self::deep_clone(child));
        }
        copy
    }
}

fn collect_text(node_ref: &XmlNodeRef, out: &mut String) {
    let node = node_ref.borrow();
    match &node.content {
        XmlContent::Text(t) | XmlContent::CData(t) => out.push_str(t),
        XmlContent::Element(_) => {
            for child in &node.children {
                collect_text(child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_child() {
        let parent = new_element("parent");
        let child1 = new_element("child1");
        let child2 = new_element("child2");

        XmlNode::add_child_to_ref(&parent, child1.clone());
        XmlNode::add_child_to_ref(&parent, child2.clone());

        assert_eq!(parent.borrow().child_count(), 2);
        assert_eq!(child1.borrow().child_pos(), 0);
        assert_eq!(child2.borrow().child_pos(), 1);
        assert!(Rc::ptr_eq(
            &child2.borrow().parent().upgrade().unwrap(),
            &parent
        ));
    }

    #[test]
    fn test_remove_child() {
        let parent = new_element("p");
        let child1 = new_element("a");
        let child2 = new_element("b");
        let child3 = new_element("c");

        XmlNode::add_child_to_ref(&parent, child1.clone());
        XmlNode::add_child_to_ref(&parent, child2.clone());
        XmlNode::add_child_to_ref(&parent, child3.clone());

        let removed = XmlNode::remove_child_to_ref(&parent, 1).unwrap();

        assert!(Rc::ptr_eq(&removed, &child2));
        assert!(child2.borrow().parent().upgrade().is_none());
        assert_eq!(parent.borrow().child_count(), 2);
        assert_eq!(child1.borrow().child_pos(), 0);
        assert_eq!(child3.borrow().child_pos(), 1);
    }

    #[test]
    fn test_insert_child_moves_node() {
        let first = new_element("first");
        let second = new_element("second");
        let child = new_element("child");

        XmlNode::add_child_to_ref(&first, child.clone());
        XmlNode::add_child_at_to_ref(&second, 0, child.clone());

        assert_eq!(first.borrow().child_count(), 0);
        assert_eq!(second.borrow().child_count(), 1);
        assert_eq!(child.borrow().child_pos(), 0);
    }

    #[test]
    fn test_left_sibling() {
        let parent = new_element("p");
        let ws = new_text("\n  ");
        let child = new_element("a");
        XmlNode::add_child_to_ref(&parent, ws.clone());
        XmlNode::add_child_to_ref(&parent, child.clone());

        let left = XmlNode::left_sibling_of_ref(&child).unwrap();
        assert!(Rc::ptr_eq(&left, &ws));
        assert!(XmlNode::left_sibling_of_ref(&ws).is_none());
    }

    #[test]
    fn test_text_content_and_deep_clone() {
        let p = new_element("element");
        XmlNode::add_child_to_ref(&p, new_text("Hello "));
        let strong = new_element("strong");
        XmlNode::add_child_to_ref(&strong, new_text("world"));
        XmlNode::add_child_to_ref(&p, strong);

        let copy = XmlNode::deep_clone(&p);
        XmlNode::set_text_content(&p, "changed");

        assert_eq!(XmlNode::text_content(&copy), "Hello world");
        assert_eq!(XmlNode::text_content(&p), "changed");
        assert_eq!(XmlNode::element_children(&copy).len(), 1);
    }
}
