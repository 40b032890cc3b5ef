use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use tracing::trace;

use crate::error::{Error, Result};

/// Minimal navigable XML tree: elements with resolved namespace and text.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Resolved namespace URI, `None` when unqualified.
    pub namespace: Option<String>,
    pub name: String,
    pub children: Vec<Node>,
}

impl Element {
    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Child text nodes in document order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|n| match n {
            Node::Text(t) => Some(t.as_str()),
            Node::Element(_) => None,
        })
    }

    fn matches(&self, namespace: Option<&str>, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == namespace
    }

    /// All descendants reached by following `path` one child level per step,
    /// every step in `namespace`. Document order is preserved.
    pub fn select(&self, namespace: Option<&str>, path: &[&str]) -> Vec<&Element> {
        let mut current: Vec<&Element> = vec![self];
        for step in path {
            current = current
                .into_iter()
                .flat_map(|e| e.elements())
                .filter(|e| e.matches(namespace, step))
                .collect();
        }
        current
    }

    /// Text of every element at `path`, one entry per text node.
    pub fn select_text(&self, namespace: Option<&str>, path: &[&str]) -> Vec<String> {
        self.select(namespace, path)
            .into_iter()
            .flat_map(|e| e.texts())
            .map(str::to_owned)
            .collect()
    }

    fn push_text(&mut self, text: String) {
        if let Some(Node::Text(prev)) = self.children.last_mut() {
            prev.push_str(&text);
        } else {
            self.children.push(Node::Text(text));
        }
    }
}

fn new_element(ns: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(start.local_name().as_ref())
        .map_err(|e| Error::Parse(format!("element name is not utf-8: {}", e)))?
        .to_owned();
    let namespace = match ns {
        ResolveResult::Unbound => None,
        ResolveResult::Bound(uri) => Some(
            std::str::from_utf8(uri.as_ref())
                .map_err(|e| Error::Parse(format!("namespace is not utf-8: {}", e)))?
                .to_owned(),
        ),
        ResolveResult::Unknown(prefix) => {
            return Err(Error::Parse(format!(
                "undeclared namespace prefix {:?} on <{}>",
                String::from_utf8_lossy(&prefix),
                name
            )))
        }
    };
    Ok(Element {
        namespace,
        name,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => return Err(Error::Parse("multiple root elements".into())),
    }
    Ok(())
}

fn add_text(stack: &mut [Element], text: String) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.push_text(text),
        None if text.trim().is_empty() => {}
        None => return Err(Error::Parse("text outside the root element".into())),
    }
    Ok(())
}

/// Parse a complete document and return its root element.
pub fn parse_document(payload: &[u8]) -> Result<Element> {
    let mut reader = NsReader::from_reader(payload);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_resolved_event_into(&mut buf)? {
            (ns, Event::Start(e)) => stack.push(new_element(ns, &e)?),
            (ns, Event::Empty(e)) => {
                let el = new_element(ns, &e)?;
                attach(&mut stack, &mut root, el)?;
            }
            (_, Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| Error::Parse("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, el)?;
            }
            (_, Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Parse(e.to_string()))?
                    .into_owned();
                add_text(&mut stack, text)?;
            }
            (_, Event::CData(c)) => {
                let text = String::from_utf8(c.into_inner().into_owned())
                    .map_err(|e| Error::Parse(format!("CDATA is not utf-8: {}", e)))?;
                add_text(&mut stack, text)?;
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(Error::Parse(format!("unclosed element <{}>", open.name)));
    }
    let root = root.ok_or_else(|| Error::Parse("document has no root element".into()))?;
    trace!(root = %root.name, children = root.children.len(), "parsed xml tree");
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Root xmlns:t="http://tempuri.org/">
  <A><B>1</B><B>2 &amp; 3</B></A>
  <A><B><![CDATA[<4>]]></B><B/></A>
  <t:A><t:B>9</t:B></t:A>
</Root>"#;

    #[test]
    fn selects_paths_in_document_order() -> anyhow::Result<()> {
        let root = parse_document(DOC.as_bytes())?;
        assert_eq!(root.name, "Root");
        assert_eq!(root.select(None, &["A", "B"]).len(), 4);
        assert_eq!(
            root.select_text(None, &["A", "B"]),
            vec!["1", "2 & 3", "<4>"]
        );
        Ok(())
    }

    #[test]
    fn namespaced_elements_only_match_their_namespace() -> anyhow::Result<()> {
        let root = parse_document(DOC.as_bytes())?;
        assert_eq!(
            root.select_text(Some("http://tempuri.org/"), &["A", "B"]),
            vec!["9"]
        );
        Ok(())
    }

    #[test]
    fn malformed_documents_fail() {
        for bad in [
            "<a><b></a>",
            "<a>",
            "",
            "<a/><b/>",
            "<x:a/>",
            "not xml",
        ] {
            assert!(
                matches!(parse_document(bad.as_bytes()), Err(Error::Parse(_))),
                "expected parse error for {:?}",
                bad
            );
        }
    }
}
