//! Helpers for reading `roxmltree` nodes into owned names and attributes.

use roxmltree::Node;

use super::Attributes;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Local tag name, ignoring any namespace.
pub fn local_name<'a>(node: &Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Tag name as written, keeping a namespace prefix when the element uses one.
pub fn qualified_name(node: &Node<'_, '_>) -> String {
    let name = node.tag_name().name();
    match node
        .tag_name()
        .namespace()
        .and_then(|ns| prefix_for(node, ns))
    {
        Some(prefix) => format!("{prefix}:{name}"),
        None => name.to_string(),
    }
}

/// Whether the element belongs to the item vocabulary (no namespace or a QTI one).
pub fn is_item_namespace(node: &Node<'_, '_>) -> bool {
    match node.tag_name().namespace() {
        None => true,
        Some(ns) => ns.starts_with("http://www.imsglobal.org/xsd/"),
    }
}

/// Attributes in source order, with namespace declarations made on this
/// element re-expressed as `xmlns` attributes.
pub fn attributes(node: &Node<'_, '_>) -> Attributes {
    let mut out = Attributes::new();

    for (prefix, uri) in declared_namespaces(node) {
        let name = match prefix {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        out.insert(name, uri);
    }

    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(XML_NAMESPACE) => format!("xml:{}", attr.name()),
            Some(ns) => match prefix_for(node, ns) {
                Some(prefix) => format!("{prefix}:{}", attr.name()),
                None => attr.name().to_string(),
            },
            None => attr.name().to_string(),
        };
        out.insert(name, attr.value().to_string());
    }

    out
}

/// Exact source text of the element, start tag through end tag.
pub fn source_text<'s>(node: &Node<'_, '_>, source: &'s str) -> &'s str {
    source.get(node.range()).unwrap_or_default()
}

/// Direct child elements with the given local name.
pub fn child_elements<'a, 'i>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && local_name(child) == name)
}

fn prefix_for<'a>(node: &Node<'a, '_>, ns: &str) -> Option<&'a str> {
    if ns == XML_NAMESPACE {
        return Some("xml");
    }
    node.lookup_prefix(ns).filter(|prefix| !prefix.is_empty())
}

fn declared_namespaces(node: &Node<'_, '_>) -> Vec<(Option<String>, String)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| {
            parent
                .namespaces()
                .map(|ns| (ns.name(), ns.uri()))
                .collect()
        })
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.uri() != XML_NAMESPACE)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_elements_keep_their_prefix() {
        let xml = r#"<root xmlns:m="http://www.w3.org/1998/Math/MathML"><m:math/></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let math = doc.root_element().first_element_child().unwrap();

        assert_eq!(qualified_name(&math), "m:math");
        assert_eq!(local_name(&math), "math");
        assert!(!is_item_namespace(&math));
    }

    #[test]
    fn namespace_declared_on_element_becomes_attribute() {
        let xml = r#"<root><math xmlns="http://www.w3.org/1998/Math/MathML" display="block"/></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let math = doc.root_element().first_element_child().unwrap();

        let attrs = attributes(&math);
        assert_eq!(
            attrs.get("xmlns").map(String::as_str),
            Some("http://www.w3.org/1998/Math/MathML")
        );
        assert_eq!(attrs.get("display").map(String::as_str), Some("block"));
    }

    #[test]
    fn inherited_namespaces_are_not_repeated() {
        let xml = r#"<root xmlns="http://www.imsglobal.org/xsd/imsqti_v2p2"><p class="x"/></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let p = doc.root_element().first_element_child().unwrap();

        let attrs = attributes(&p);
        assert_eq!(attrs.len(), 1);
        assert!(is_item_namespace(&p));
    }

    #[test]
    fn xml_lang_keeps_prefix() {
        let xml = r#"<root><p xml:lang="fr">Bonjour</p></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let p = doc.root_element().first_element_child().unwrap();

        assert_eq!(
            attributes(&p).get("xml:lang").map(String::as_str),
            Some("fr")
        );
    }

    #[test]
    fn source_text_is_exact() {
        let xml = r#"<root><x  a = "1" >t</x></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let x = doc.root_element().first_element_child().unwrap();

        assert_eq!(source_text(&x, xml), r#"<x  a = "1" >t</x>"#);
    }
}
