//! Metadata file format.
//!
//! ```xml
//! <document nextId="9">
//!   <logical><struct id="1" type="Monograph">…</struct></logical>
//!   <physical><struct id="2" type="BoundBook">…</struct></physical>
//! </document>
//! ```
//! Read with `roxmltree`, written with `quick-xml`.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{AuthorityRef, ContentFile, DigitalDocument, DocumentError, Metadata, NodeId, Person};

struct PendingRef {
    source: NodeId,
    target: u64,
    link: String,
}

/// Parses a metadata file. References to unknown elements are dropped with a warning.
pub fn parse(text: &str) -> Result<DigitalDocument, DocumentError> {
    let xml = roxmltree::Document::parse(text).map_err(|e| DocumentError::Malformed(e.to_string()))?;
    let root = xml.root_element();
    if root.tag_name().name() != "document" {
        return Err(DocumentError::Malformed(format!(
            "expected <document>, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut doc = DigitalDocument::new();
    let mut pending = Vec::new();

    for section in root.children().filter(|n| n.is_element()) {
        let Some(top) = section.children().find(|n| n.has_tag_name("struct")) else {
            continue;
        };
        match section.tag_name().name() {
            "logical" => {
                let id = read_struct(&mut doc, top, None, &mut pending)?;
                doc.set_logical_root(id)?;
            }
            "physical" => {
                let id = read_struct(&mut doc, top, None, &mut pending)?;
                doc.set_physical_root(id)?;
            }
            other => tracing::debug!("Ignoring unknown section <{}>", other),
        }
    }

    for reference in pending {
        let target = NodeId(reference.target);
        if doc.contains(target) {
            doc.references_mut().add(reference.source, target, &reference.link);
        } else {
            tracing::warn!(
                "Dropping reference {} -> #{} ({}): target does not exist",
                reference.source,
                reference.target,
                reference.link
            );
        }
    }

    if let Some(next) = root.attribute("nextId").and_then(|v| v.parse::<u64>().ok()) {
        doc.reserve_ids(next);
    }
    Ok(doc)
}

fn read_struct(
    doc: &mut DigitalDocument,
    node: roxmltree::Node<'_, '_>,
    parent: Option<NodeId>,
    pending: &mut Vec<PendingRef>,
) -> Result<NodeId, DocumentError> {
    let id = match node.attribute("id") {
        Some(raw) => NodeId(
            raw.parse::<u64>()
                .map_err(|_| DocumentError::Malformed(format!("invalid struct id '{}'", raw)))?,
        ),
        None => NodeId(doc.next_id()),
    };
    let type_name = node
        .attribute("type")
        .ok_or_else(|| DocumentError::Malformed(format!("struct {} has no type", id)))?;
    doc.insert_with_id(id, type_name)?;
    if let Some(parent) = parent {
        doc.attach(parent, id, None)?;
    }

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "metadata" => {
                let type_name = required(child, "type")?;
                let value = child.text().unwrap_or("").to_string();
                doc.get_mut(id)?.metadata.push(Metadata { type_name: type_name.to_string(), value });
            }
            "person" => {
                let authority = match (
                    child.attribute("authority"),
                    child.attribute("authorityURI"),
                    child.attribute("valueURI"),
                ) {
                    (None, None, None) => None,
                    (a, u, v) => Some(AuthorityRef {
                        authority: a.unwrap_or("").to_string(),
                        authority_uri: u.unwrap_or("").to_string(),
                        value_uri: v.unwrap_or("").to_string(),
                    }),
                };
                doc.get_mut(id)?.persons.push(Person {
                    role: required(child, "role")?.to_string(),
                    first_name: child.attribute("firstName").unwrap_or("").to_string(),
                    last_name: child.attribute("lastName").unwrap_or("").to_string(),
                    authority,
                });
            }
            "ref" => {
                let raw = required(child, "target")?;
                let target = raw
                    .parse::<u64>()
                    .map_err(|_| DocumentError::Malformed(format!("invalid ref target '{}'", raw)))?;
                pending.push(PendingRef {
                    source: id,
                    target,
                    link: child.attribute("type").unwrap_or(super::LOGICAL_PHYSICAL).to_string(),
                });
            }
            "file" => {
                let location = required(child, "location")?;
                let mut file = ContentFile::for_image(location);
                if let Some(mime) = child.attribute("mimeType") {
                    file.mime_type = mime.to_string();
                }
                doc.get_mut(id)?.content_file = Some(file);
            }
            "struct" => {
                read_struct(doc, child, Some(id), pending)?;
            }
            other => tracing::debug!("Ignoring unknown element <{}> in struct {}", other, id),
        }
    }
    Ok(id)
}

fn required<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Result<&'a str, DocumentError> {
    node.attribute(name).ok_or_else(|| {
        DocumentError::Malformed(format!("<{}> is missing attribute '{}'", node.tag_name().name(), name))
    })
}

/// Serializes the whole document.
pub fn write(doc: &DigitalDocument) -> Result<String, DocumentError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let next_id = doc.next_id().to_string();
    let mut start = BytesStart::new("document");
    start.push_attribute(("nextId", next_id.as_str()));
    emit(&mut writer, Event::Start(start))?;

    for (section, root) in [("logical", doc.logical_root()), ("physical", doc.physical_root())] {
        let Some(root) = root else {
            continue;
        };
        emit(&mut writer, Event::Start(BytesStart::new(section)))?;
        write_struct(&mut writer, doc, root)?;
        emit(&mut writer, Event::End(BytesEnd::new(section)))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("document")))?;
    String::from_utf8(writer.into_inner()).map_err(|e| DocumentError::Malformed(e.to_string()))
}

fn write_struct(writer: &mut Writer<Vec<u8>>, doc: &DigitalDocument, id: NodeId) -> Result<(), DocumentError> {
    let node = doc.get(id)?;
    let id_attr = id.0.to_string();
    let mut start = BytesStart::new("struct");
    start.push_attribute(("id", id_attr.as_str()));
    start.push_attribute(("type", node.type_name.as_str()));
    emit(writer, Event::Start(start))?;

    for md in &node.metadata {
        let mut start = BytesStart::new("metadata");
        start.push_attribute(("type", md.type_name.as_str()));
        emit(writer, Event::Start(start))?;
        emit(writer, Event::Text(BytesText::new(&md.value)))?;
        emit(writer, Event::End(BytesEnd::new("metadata")))?;
    }

    for person in &node.persons {
        let mut start = BytesStart::new("person");
        start.push_attribute(("role", person.role.as_str()));
        start.push_attribute(("firstName", person.first_name.as_str()));
        start.push_attribute(("lastName", person.last_name.as_str()));
        if let Some(authority) = &person.authority {
            start.push_attribute(("authority", authority.authority.as_str()));
            start.push_attribute(("authorityURI", authority.authority_uri.as_str()));
            start.push_attribute(("valueURI", authority.value_uri.as_str()));
        }
        emit(writer, Event::Empty(start))?;
    }

    for (target, link) in doc.references().all_targets(id) {
        let target_attr = target.0.to_string();
        let mut start = BytesStart::new("ref");
        start.push_attribute(("target", target_attr.as_str()));
        start.push_attribute(("type", link.as_str()));
        emit(writer, Event::Empty(start))?;
    }

    if let Some(file) = &node.content_file {
        let mut start = BytesStart::new("file");
        start.push_attribute(("location", file.location.as_str()));
        start.push_attribute(("mimeType", file.mime_type.as_str()));
        emit(writer, Event::Empty(start))?;
    }

    for &child in &node.children {
        write_struct(writer, doc, child)?;
    }

    emit(writer, Event::End(BytesEnd::new("struct")))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer.write_event(event).map_err(|e| DocumentError::Malformed(e.to_string()))
}
