//! Container layout: the whitespace and comments around element children.
//!
//! Rebuilding a container from the model replaces its element children but
//! keeps the non-element nodes the skeleton had between them, so an unchanged
//! document keeps its exact formatting.

use crate::xml::{XmlNode, XmlNodeRef};

#[derive(Debug, Default)]
pub(crate) struct Layout {
    /// Non-element nodes preceding each element child.
    gaps: Vec<Vec<XmlNodeRef>>,
    /// Non-element nodes after the last element child.
    trailing: Vec<XmlNodeRef>,
}

impl Layout {
    /// Captures the layout of `container`, copying the nodes it keeps.
    pub fn of(container: &XmlNodeRef) -> Layout {
        let mut layout = Layout::default();
        let mut run = Vec::new();
        for child in container.borrow().children() {
            if child.borrow().content().is_element() {
                layout.gaps.push(std::mem::take(&mut run));
            } else {
                run.push(XmlNode::deep_clone(child));
            }
        }
        layout.trailing = run;
        layout
    }

    /// The whitespace indenting the last element child, if any.
    pub fn indent(&self) -> Option<XmlNodeRef> {
        self.gaps
            .iter()
            .rev()
            .find_map(|gap| gap.last())
            .filter(|node| node.borrow().content().is_whitespace())
            .map(XmlNode::deep_clone)
    }

    /// Replaces the children of `container` with `elements` laid out like the
    /// captured children. Extra elements get the last indentation.
    pub fn rebuild(&self, container: &XmlNodeRef, elements: Vec<XmlNodeRef>) {
        XmlNode::remove_children_to_ref(container);
        let indent = self.indent();
        for (index, element) in elements.into_iter().enumerate() {
            match self.gaps.get(index) {
                Some(gap) => {
                    for node in gap {
                        XmlNode::add_child_to_ref(container, XmlNode::deep_clone(node));
                    }
                }
                None => {
                    if let Some(indent) = &indent {
                        XmlNode::add_child_to_ref(container, XmlNode::deep_clone(indent));
                    }
                }
            }
            XmlNode::add_child_to_ref(container, element);
        }
        for node in &self.trailing {
            XmlNode::add_child_to_ref(container, XmlNode::deep_clone(node));
        }
    }
}

/// Inserts `element` after the last element child of `container`, indented
/// like its siblings.
pub(crate) fn append_indented(container: &XmlNodeRef, element: XmlNodeRef) {
    let indent = Layout::of(container).indent();
    let mut position = {
        let borrowed = container.borrow();
        borrowed
            .children()
            .iter()
            .rposition(|c| c.borrow().content().is_element())
            .map_or(0, |p| p + 1)
    };
    if let Some(indent) = indent {
        XmlNode::add_child_at_to_ref(container, position, indent);
        position += 1;
    }
    XmlNode::add_child_at_to_ref(container, position, element);
}

/// Removes `child` from its parent together with the whitespace before it.
pub(crate) fn remove_indented(child: &XmlNodeRef) {
    let Some(parent) = child.borrow().parent().upgrade() else {
        return;
    };
    let position = child.borrow().child_pos();
    let indent = position.checked_sub(1).and_then(|p| {
        let borrowed = parent.borrow();
        borrowed.children().get(p).cloned()
    });
    XmlNode::remove_child_to_ref(&parent, position);
    if let Some(indent) = indent {
        if indent.borrow().content().is_whitespace() {
            XmlNode::detach(&indent);
        }
    }
}
