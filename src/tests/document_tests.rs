#[cfg(test)]
mod tests {
    use crate::document::{
        xml, ContentFile, DigitalDocument, DocumentError, NodeId, ReferenceIndex, LOGICAL_PHYSICAL, PAGE_TYPE,
        PHYS_PAGE_NUMBER,
    };

    /// Monograph with two chapters and a physical root with `pages` pages, each
    /// referenced from the root.
    fn sample(pages: usize) -> (DigitalDocument, Vec<NodeId>, Vec<NodeId>) {
        let mut doc = DigitalDocument::with_logical_root("Monograph");
        let root = doc.logical_root().unwrap();
        let chapters: Vec<NodeId> = (0..2)
            .map(|_| {
                let c = doc.create("Chapter");
                doc.attach(root, c, None).unwrap();
                c
            })
            .collect();
        let book = doc.create("BoundBook");
        doc.set_physical_root(book).unwrap();
        let page_ids: Vec<NodeId> = (0..pages)
            .map(|i| {
                let p = doc.create(PAGE_TYPE);
                doc.attach(book, p, None).unwrap();
                doc.get_mut(p).unwrap().content_file = Some(ContentFile::for_image(&format!("{:08}.tif", i + 1)));
                doc.references_mut().add(root, p, LOGICAL_PHYSICAL);
                p
            })
            .collect();
        doc.renumber_pages();
        (doc, chapters, page_ids)
    }

    #[test]
    fn test_reference_index_forward_and_reverse() {
        let mut refs = ReferenceIndex::default();
        let (a, b, p) = (NodeId(1), NodeId(2), NodeId(10));
        assert!(refs.add(a, p, LOGICAL_PHYSICAL));
        assert!(!refs.add(a, p, LOGICAL_PHYSICAL));
        assert!(refs.add(b, p, LOGICAL_PHYSICAL));

        assert_eq!(refs.sources(p, LOGICAL_PHYSICAL), vec![a, b]);
        assert_eq!(refs.len(), 2);

        let affected = refs.remove_all_to(p);
        assert_eq!(affected, vec![a, b]);
        assert!(refs.is_empty());
        assert!(refs.targets(a, LOGICAL_PHYSICAL).is_empty());
    }

    #[test]
    fn test_replace_targets_keeps_order() {
        let mut refs = ReferenceIndex::default();
        refs.add(NodeId(1), NodeId(5), LOGICAL_PHYSICAL);
        refs.replace_targets(NodeId(1), LOGICAL_PHYSICAL, &[NodeId(7), NodeId(6)]);
        assert_eq!(refs.targets(NodeId(1), LOGICAL_PHYSICAL), vec![NodeId(7), NodeId(6)]);
        assert!(refs.sources(NodeId(5), LOGICAL_PHYSICAL).is_empty());

        refs.sort_targets_by_key(NodeId(1), |t| t.0);
        assert_eq!(refs.targets(NodeId(1), LOGICAL_PHYSICAL), vec![NodeId(6), NodeId(7)]);
    }

    #[test]
    fn test_attach_rejects_cycles_and_double_attach() {
        let (mut doc, chapters, _) = sample(0);
        let root = doc.logical_root().unwrap();
        let sub = doc.create("Chapter");
        doc.attach(chapters[0], sub, None).unwrap();

        assert_eq!(doc.attach(root, sub, None), Err(DocumentError::AlreadyAttached(sub)));
        assert_eq!(doc.reparent(chapters[0], sub, None), Err(DocumentError::Cycle(chapters[0])));
        assert_eq!(doc.detach(root), Err(DocumentError::RootImmutable));
        assert!(doc.is_ancestor(root, sub));
    }

    #[test]
    fn test_reparent_moves_subtree() {
        let (mut doc, chapters, _) = sample(0);
        let sub = doc.create("Chapter");
        doc.attach(chapters[0], sub, None).unwrap();

        doc.reparent(chapters[0], chapters[1], Some(0)).unwrap();
        assert_eq!(doc.parent(chapters[0]), Some(chapters[1]));
        assert_eq!(doc.children(chapters[1]), &[chapters[0]]);
        assert_eq!(doc.descendants(chapters[1]), vec![chapters[1], chapters[0], sub]);
    }

    #[test]
    fn test_remove_subtree_purges_references() {
        let (mut doc, chapters, pages) = sample(3);
        let root = doc.logical_root().unwrap();
        doc.references_mut().add(chapters[0], pages[1], LOGICAL_PHYSICAL);

        doc.remove_subtree(pages[1]).unwrap();
        assert!(!doc.contains(pages[1]));
        assert_eq!(doc.references().targets(root, LOGICAL_PHYSICAL), vec![pages[0], pages[2]]);
        assert!(doc.references().targets(chapters[0], LOGICAL_PHYSICAL).is_empty());

        doc.renumber_pages();
        let numbers: Vec<&str> =
            doc.pages().iter().map(|p| doc.first_value(*p, PHYS_PAGE_NUMBER).unwrap()).collect();
        assert_eq!(numbers, vec!["1", "2"]);
    }

    #[test]
    fn test_swap_content_files() {
        let (mut doc, _, pages) = sample(2);
        doc.swap_content_files(pages[0], pages[1]).unwrap();
        assert_eq!(doc.get(pages[0]).unwrap().image_name(), Some("00000002.tif"));
        assert_eq!(doc.get(pages[1]).unwrap().image_name(), Some("00000001.tif"));

        let err = doc.swap_content_files(pages[0], NodeId(999)).unwrap_err();
        assert_eq!(err, DocumentError::UnknownNode(NodeId(999)));
        assert_eq!(doc.get(pages[0]).unwrap().image_name(), Some("00000002.tif"));
    }

    #[test]
    fn test_compact_drops_empty_values_and_detached_nodes() {
        let (mut doc, chapters, _) = sample(1);
        doc.set_value(chapters[0], "TitleDocMain", "").unwrap();
        doc.set_value(chapters[1], "TitleDocMain", "Vorrede").unwrap();
        let loose = doc.create("Chapter");

        doc.compact();
        assert!(doc.get(chapters[0]).unwrap().metadata.is_empty());
        assert_eq!(doc.first_value(chapters[1], "TitleDocMain"), Some("Vorrede"));
        assert!(!doc.contains(loose));
    }

    #[test]
    fn test_content_file_mime_types() {
        assert_eq!(ContentFile::for_image("00000001.TIF").mime_type, "image/tiff");
        assert_eq!(ContentFile::for_image("a.jpeg").mime_type, "image/jpeg");
        assert_eq!(ContentFile::for_image("noext").mime_type, "application/octet-stream");
    }

    #[test]
    fn test_xml_round_trip_preserves_tree() {
        let (mut doc, chapters, pages) = sample(2);
        doc.set_value(chapters[0], "TitleDocMain", "Kapitel <1> & mehr").unwrap();
        doc.references_mut().add(chapters[0], pages[1], LOGICAL_PHYSICAL);

        let text = xml::write(&doc).unwrap();
        let parsed = xml::parse(&text).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.next_id(), doc.next_id());
    }

    #[test]
    fn test_xml_parse_drops_dangling_references() {
        let text = r#"<document nextId="3">
            <logical>
              <struct id="1" type="Monograph">
                <metadata type="TitleDocMain">Chronik</metadata>
                <person role="Author" firstName="Johann" lastName="Meyer" authority="gnd" valueURI="http://d-nb.info/gnd/1"/>
                <ref target="2"/>
                <ref target="42"/>
              </struct>
            </logical>
            <physical>
              <struct id="2" type="BoundBook">
                <struct id="5" type="page"><file location="00000001.tif"/></struct>
              </struct>
            </physical>
          </document>"#;
        let doc = xml::parse(text).unwrap();
        let root = doc.logical_root().unwrap();
        assert_eq!(doc.references().targets(root, LOGICAL_PHYSICAL), vec![NodeId(2)]);
        assert_eq!(doc.pages(), vec![NodeId(5)]);
        // nextId is raised past the highest id in the file
        assert_eq!(doc.next_id(), 6);

        let person = &doc.get(root).unwrap().persons[0];
        assert_eq!(person.last_name, "Meyer");
        assert_eq!(person.authority.as_ref().unwrap().value_uri, "http://d-nb.info/gnd/1");
        assert_eq!(doc.get(NodeId(5)).unwrap().content_file.as_ref().unwrap().mime_type, "image/tiff");
    }

    #[test]
    fn test_xml_parse_errors() {
        assert!(matches!(xml::parse("<foo/>"), Err(DocumentError::Malformed(_))));
        assert!(matches!(xml::parse("<document"), Err(DocumentError::Malformed(_))));
        let duplicate = r#"<document><logical><struct id="1" type="A"><struct id="1" type="B"/></struct></logical></document>"#;
        assert_eq!(xml::parse(duplicate), Err(DocumentError::DuplicateNode(NodeId(1))));
        let untyped = r#"<document><logical><struct id="1"/></logical></document>"#;
        assert!(matches!(xml::parse(untyped), Err(DocumentError::Malformed(_))));
    }
}
