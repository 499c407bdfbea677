//! Minimal element tree over quick-xml.
//!
//! Names are kept qualified (`saml2:Issuer`) and looked up by local name.
//! The serialized form is canonical: namespace declarations first, then
//! attributes, each group sorted by name, no insignificant whitespace and
//! explicit end tags. Digests are always computed over this form of a parsed
//! tree, so producer and consumer agree byte for byte.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

/// XML declaration prefixed by [`Element::to_document`].
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data, unescaped.
    Text(String),
}

/// XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Child nodes.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Adds an attribute when `value` is present.
    #[must_use]
    pub fn with_opt_attr<V: Into<String>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_attr(name, v),
            None => self,
        }
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Appends a child element when present.
    #[must_use]
    pub fn with_opt_child(self, child: Option<Self>) -> Self {
        match child {
            Some(c) => self.with_child(c),
            None => self,
        }
    }

    /// Appends character data.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text.into());
        self
    }

    /// Appends a child element.
    pub fn push_child(&mut self, child: Self) {
        self.children.push(Node::Element(child));
    }

    /// Inserts a child element at node index `index`.
    pub fn insert_child(&mut self, index: usize, child: Self) {
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
    }

    fn push_text(&mut self, text: String) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(&text);
        } else {
            self.children.push(Node::Text(text));
        }
    }

    /// Returns the name without its prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Returns the prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Returns the value of the attribute with the exact name `name`.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// Iterates over the child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Returns the first child element with local name `local`.
    #[must_use]
    pub fn child(&self, local: &str) -> Option<&Self> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Returns the first child element with local name `local`, mutably.
    pub fn child_mut(&mut self, local: &str) -> Option<&mut Self> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.local_name() == local => Some(e),
            _ => None,
        })
    }

    /// Returns the child element with local name `local` or a
    /// [`SamlError::MissingElement`].
    pub fn required_child(&self, local: &str) -> SamlResult<&Self> {
        self.child(local)
            .ok_or_else(|| SamlError::MissingElement(format!("{}/{local}", self.local_name())))
    }

    /// Iterates over the child elements with local name `local`.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.elements().filter(move |e| e.local_name() == local)
    }

    /// Returns the concatenated character data of this element.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Returns the trimmed text of the child `local`, if present.
    #[must_use]
    pub fn child_text(&self, local: &str) -> Option<String> {
        self.child(local).map(|c| c.text().trim().to_string())
    }

    /// Returns the node index of the first child element named `local`.
    #[must_use]
    pub fn position_of(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.local_name() == local))
    }

    /// Removes the direct children named `local`; returns how many were removed.
    pub fn remove_children_named(&mut self, local: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.local_name() == local));
        before - self.children.len()
    }

    /// Returns a copy without the direct children named `local`.
    #[must_use]
    pub fn without_children_named(&self, local: &str) -> Self {
        let mut copy = self.clone();
        copy.remove_children_named(local);
        copy
    }

    /// Finds the element (self included) whose `ID` attribute equals `id`.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Self> {
        if self.attr("ID") == Some(id) {
            return Some(self);
        }
        self.elements().find_map(|e| e.find_by_id(id))
    }

    /// Mutable variant of [`Element::find_by_id`].
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Self> {
        if self.attr("ID") == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) => e.find_by_id_mut(id),
            Node::Text(_) => None,
        })
    }

    /// Counts elements (self included) carrying the `ID` value `id`.
    #[must_use]
    pub fn count_id(&self, id: &str) -> usize {
        usize::from(self.attr("ID") == Some(id)) + self.elements().map(|e| e.count_id(id)).sum::<usize>()
    }

    /// Returns the canonical serialization.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    /// Returns the canonical serialization preceded by the XML declaration.
    #[must_use]
    pub fn to_document(&self) -> String {
        format!("{XML_DECLARATION}{}", self.to_canonical_string())
    }

    fn write_canonical(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);

        let (mut namespaces, mut others): (Vec<_>, Vec<_>) =
            self.attributes.iter().partition(|(k, _)| is_namespace_decl(k));
        namespaces.sort_by(|a, b| a.0.cmp(&b.0));
        others.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in namespaces.into_iter().chain(others) {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        out.push('>');

        for child in &self.children {
            match child {
                Node::Element(e) => e.write_canonical(out),
                Node::Text(t) => out.push_str(&escape(t.as_str())),
            }
        }

        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Returns the part of a qualified name after the prefix.
#[must_use]
pub fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn is_namespace_decl(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

fn utf8(bytes: &[u8]) -> SamlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| SamlError::XmlParse(format!("invalid UTF-8: {e}")))
}

fn element_from(start: &BytesStart<'_>) -> SamlResult<Element> {
    let mut element = Element::new(utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(element);
        Ok(())
    } else if root.is_some() {
        Err(SamlError::XmlParse("multiple root elements".to_string()))
    } else {
        *root = Some(element);
        Ok(())
    }
}

/// Parses a document into its root element.
///
/// Document type declarations are rejected. Comments, processing
/// instructions and whitespace-only text are dropped.
pub fn parse(xml: &str) -> SamlResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unexpected end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.push_text(text),
                    None if text.trim().is_empty() => {}
                    None => return Err(SamlError::XmlParse("text outside the root element".to_string())),
                }
            }
            Event::CData(data) => {
                let text = utf8(&data)?;
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(text);
                }
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SamlError::XmlParse("unclosed element".to_string()));
    }
    root.ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_navigate() {
        let xml = r#"<?xml version="1.0"?>
            <!-- comment -->
            <p:Root xmlns:p="urn:p" ID="_1">
                <p:Issuer>issuer &amp; co</p:Issuer>
                <p:Item n="1"/>
                <p:Item n="2"><![CDATA[<raw>]]></p:Item>
            </p:Root>"#;
        let root = parse(xml).unwrap();

        assert_eq!(root.local_name(), "Root");
        assert_eq!(root.prefix(), Some("p"));
        assert_eq!(root.child_text("Issuer").as_deref(), Some("issuer & co"));
        assert_eq!(root.children_named("Item").count(), 2);
        assert_eq!(root.children_named("Item").nth(1).unwrap().text(), "<raw>");
        assert_eq!(root.find_by_id("_1").map(Element::local_name), Some("Root"));
        assert!(root.required_child("Missing").is_err());
    }

    #[test]
    fn canonical_form_is_stable() {
        let a = parse(r#"<a b="2" xmlns:z="urn:z" a="1" xmlns="urn:d"><c/>x &lt; y</a>"#).unwrap();
        let canonical = a.to_canonical_string();
        assert_eq!(
            canonical,
            r#"<a xmlns="urn:d" xmlns:z="urn:z" a="1" b="2"><c></c>x &lt; y</a>"#
        );
        assert_eq!(parse(&canonical).unwrap().to_canonical_string(), canonical);
        assert!(a.to_document().starts_with(XML_DECLARATION));
    }

    #[test]
    fn doctype_is_rejected() {
        let xml = r#"<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]><foo>&xxe;</foo>"#;
        assert!(matches!(parse(xml), Err(SamlError::XmlParse(_))));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(parse("").is_err());
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a/><b/>").is_err());
        assert!(parse(r#"<a x="1" x="2"/>"#).is_err());
    }

    #[test]
    fn child_removal_and_ids() {
        let mut root = Element::new("r")
            .with_attr("ID", "_r")
            .with_child(Element::new("ds:Signature"))
            .with_child(Element::new("inner").with_attr("ID", "_r"));
        assert_eq!(root.count_id("_r"), 2);
        assert_eq!(root.without_children_named("Signature").elements().count(), 1);
        assert_eq!(root.remove_children_named("Signature"), 1);
        assert_eq!(root.position_of("inner"), Some(0));
    }
}
