//! XML document trees
//!
//! A small ordered tree of elements, text and comments. Validation only
//! looks at child order and names, so the tree keeps exactly that plus
//! attributes; namespaces are kept as prefixed names.

use std::fmt::{self, Write as _};
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::validators::ast::Token;

/// One validation token among a list of children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildToken {
    /// Index of the node carrying the token
    pub index: usize,
    /// Index of the last node the token covers
    pub last: usize,
    /// The token
    pub token: Token,
    /// Whitespace-only character data
    pub blank: bool,
}

/// Validation tokens of a child list
///
/// Comments carry no token. Text nodes separated only by comments form a
/// single run of character data and carry one `#text` token, held by the
/// first node of the run; the run is blank when every piece is whitespace.
pub fn tokenize(children: &[Node]) -> Vec<ChildToken> {
    let mut slots: Vec<ChildToken> = Vec::new();
    let mut in_text = false;
    for (index, node) in children.iter().enumerate() {
        match node {
            Node::Comment(_) => {}
            Node::Text(_) if in_text => {
                if let Some(run) = slots.last_mut() {
                    run.last = index;
                    run.blank &= node.is_whitespace();
                }
            }
            Node::Text(_) => {
                in_text = true;
                slots.push(ChildToken {
                    index,
                    last: index,
                    token: Token::Text,
                    blank: node.is_whitespace(),
                });
            }
            Node::Element(element) => {
                in_text = false;
                slots.push(ChildToken {
                    index,
                    last: index,
                    token: Token::element(element.name.as_str()),
                    blank: false,
                });
            }
        }
    }
    slots
}

/// Child of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Character data
    Text(String),
    /// Comment, ignored by validation
    Comment(String),
}

impl Node {
    /// Create a text node
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// Create a comment node
    pub fn comment(text: impl Into<String>) -> Self {
        Node::Comment(text.into())
    }

    /// Borrow the element, if this is one
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Check if this is a text node holding only whitespace
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }

    /// Check if this is a comment
    pub fn is_comment(&self) -> bool {
        matches!(self, Node::Comment(_))
    }

    /// Serialize this node as XML
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_xml(out),
            Node::Text(text) => out.push_str(&escape(text.as_str())),
            Node::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// XML element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Tag name, including any prefix
    pub name: String,
    /// Attributes in document order
    pub attributes: IndexMap<String, String>,
    /// Children in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a child (builder style)
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Add a text child (builder style)
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text.into());
        self
    }

    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Append a child
    pub fn push(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    /// Append character data, merging with a preceding text node
    pub fn push_text(&mut self, text: String) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(&text);
        } else {
            self.children.push(Node::Text(text));
        }
    }

    /// Child elements, skipping text and comments
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Tokens of the children in order
    ///
    /// See [`tokenize`] for how comments and text runs are treated.
    pub fn child_tokens(&self) -> Vec<Token> {
        tokenize(&self.children).into_iter().map(|slot| slot.token).collect()
    }

    /// Concatenated text of all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => out.push_str(&element.text_content()),
                Node::Comment(_) => {}
            }
        }
        out
    }

    /// Serialize this element as XML
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            // writing to a String cannot fail
            let _ = write!(out, " {}=\"{}\"", name, escape(value.as_str()));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// Parsed XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Root element
    pub root: Element,
}

impl Document {
    /// Wrap a root element
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse an XML document from a string
    ///
    /// Whitespace is kept; comments are kept as [`Node::Comment`];
    /// processing instructions and the prolog are dropped.
    pub fn from_string(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(Self::parse_element(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("Unbalanced end tag".to_string()))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                    if let Some(current) = stack.last_mut() {
                        current.push_text(text.into_owned());
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = std::str::from_utf8(&e)
                        .map_err(|e| Error::Xml(format!("Invalid CDATA section: {}", e)))?
                        .to_string();
                    if let Some(current) = stack.last_mut() {
                        current.push_text(text);
                    }
                }
                Ok(Event::Comment(e)) => {
                    let text = std::str::from_utf8(&e)
                        .map_err(|e| Error::Xml(format!("Invalid comment: {}", e)))?
                        .to_string();
                    if let Some(current) = stack.last_mut() {
                        current.push(Node::Comment(text));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml(format!("Unclosed element <{}>", stack[stack.len() - 1].name)));
        }
        root.map(Document::new)
            .ok_or_else(|| Error::Xml("Document has no root element".to_string()))
    }

    /// Read and parse an XML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_string(&xml)
    }

    /// Serialize the document as XML (no prolog)
    pub fn to_xml(&self) -> String {
        self.root.to_xml()
    }

    fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.push(element),
            None if root.is_none() => *root = Some(element),
            None => return Err(Error::Xml("Multiple root elements".to_string())),
        }
        Ok(())
    }

    fn parse_element(start: &BytesStart) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();
        let mut element = Element::new(name);

        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .into_owned();
            element.attributes.insert(key, value);
        }

        Ok(element)
    }
}
