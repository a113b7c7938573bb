//! Markup to plain text, for emptiness checks.
//!
//! Spans are raw slices of a document and are often not well-formed on their
//! own (they start mid-body and may cut through open elements), so they go
//! through html5ever's error-tolerant tree builder rather than an XML parser.
//! The sink keeps only element names and text; attributes, comments and
//! doctypes are dropped on the way in.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::LazyLock;

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, ParseOpts, QualName, parse_document};
use regex::Regex;

/// Elements whose contents never count as readable text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title", "noscript", "template"];

/// Elements that flow inside a line; every other element separates words.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "del", "dfn", "em", "font", "i",
    "ins", "kbd", "mark", "q", "rp", "rt", "ruby", "s", "samp", "small", "span", "strong", "sub",
    "sup", "time", "u", "var",
];

/// XHTML shorthand like `<script src="a.js"/>` opens a raw-text element in
/// HTML and would swallow the rest of the span.
static SELF_CLOSED_RAW_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<(script|style|title|textarea|noscript|iframe|noembed|noframes|xmp)\b([^>]*?)/>",
    )
    .expect("self-closed raw text pattern compiles")
});

/// Strip tags from `markup`, decode entities and collapse whitespace.
pub fn plain_text(markup: &str) -> String {
    let markup: Cow<'_, str> = SELF_CLOSED_RAW_TEXT.replace_all(markup, "<$1$2></$1>");
    parse_document(TextSink::new(), ParseOpts::default())
        .from_utf8()
        .one(markup.as_bytes())
}

/// Number of characters of readable text in `markup`.
pub fn text_len(markup: &str) -> usize {
    plain_text(markup).chars().count()
}

// ----------------------------------------------------------------------------
// Tree sink
// ----------------------------------------------------------------------------

type Handle = Rc<Node>;

/// A tree node. Documents, comments and doctypes have no name.
struct Node {
    name: Option<QualName>,
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<Child>>,
}

enum Child {
    Node(Handle),
    Text(String),
}

impl Node {
    fn new(name: Option<QualName>) -> Handle {
        Rc::new(Self {
            name,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    fn position_of(&self, child: &Handle) -> Option<usize> {
        self.children
            .borrow()
            .iter()
            .position(|c| matches!(c, Child::Node(node) if Rc::ptr_eq(node, child)))
    }
}

fn into_child(parent: &Handle, child: NodeOrText<Handle>) -> Child {
    match child {
        NodeOrText::AppendNode(node) => {
            *node.parent.borrow_mut() = Rc::downgrade(parent);
            Child::Node(node)
        }
        NodeOrText::AppendText(text) => Child::Text(text.to_string()),
    }
}

/// Collects the readable text of a document while html5ever builds it.
struct TextSink {
    document: Handle,
}

impl TextSink {
    fn new() -> Self {
        Self {
            document: Node::new(None),
        }
    }
}

impl TreeSink for TextSink {
    type Handle = Handle;
    type Output = String;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let mut raw = String::new();
        collect_text(&self.document, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {}

    fn get_document(&self) -> Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Handle) -> Self::ElemName<'a> {
        static UNNAMED: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };
        target.name.as_ref().unwrap_or(&UNNAMED)
    }

    fn create_element(
        &self,
        name: QualName,
        _attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Handle {
        Node::new(Some(name))
    }

    fn create_comment(&self, _text: StrTendril) -> Handle {
        Node::new(None)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Handle {
        Node::new(None)
    }

    fn append(&self, parent: &Handle, child: NodeOrText<Handle>) {
        let child = into_child(parent, child);
        let mut children = parent.children.borrow_mut();
        match child {
            Child::Text(text) => {
                if let Some(Child::Text(existing)) = children.last_mut() {
                    existing.push_str(&text);
                } else {
                    children.push(Child::Text(text));
                }
            }
            child => children.push(child),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Handle,
        prev_element: &Handle,
        child: NodeOrText<Handle>,
    ) {
        if element.parent.borrow().upgrade().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Handle) -> Handle {
        target.clone()
    }

    fn same_node(&self, x: &Handle, y: &Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Handle, new_node: NodeOrText<Handle>) {
        let Some(parent) = sibling.parent.borrow().upgrade() else {
            return;
        };
        let index = parent.position_of(sibling).unwrap_or(0);
        let child = into_child(&parent, new_node);
        parent.children.borrow_mut().insert(index, child);
    }

    fn add_attrs_if_missing(&self, _target: &Handle, _attrs: Vec<Attribute>) {}

    fn remove_from_parent(&self, target: &Handle) {
        let parent = target.parent.replace(Weak::new()).upgrade();
        if let Some(parent) = parent
            && let Some(index) = parent.position_of(target)
        {
            parent.children.borrow_mut().remove(index);
        }
    }

    fn reparent_children(&self, node: &Handle, new_parent: &Handle) {
        let children = std::mem::take(&mut *node.children.borrow_mut());
        for child in &children {
            if let Child::Node(child) = child {
                *child.parent.borrow_mut() = Rc::downgrade(new_parent);
            }
        }
        new_parent.children.borrow_mut().extend(children);
    }
}

fn collect_text(node: &Node, out: &mut String) {
    for child in node.children.borrow().iter() {
        match child {
            Child::Text(text) => out.push_str(text),
            Child::Node(element) => {
                let Some(name) = &element.name else {
                    continue;
                };
                let local: &str = &name.local;
                if SKIPPED_ELEMENTS.contains(&local) {
                    continue;
                }
                let inline = INLINE_ELEMENTS.contains(&local);
                if !inline {
                    out.push(' ');
                }
                collect_text(element, out);
                if !inline {
                    out.push(' ');
                }
            }
        }
    }
}
