#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{Duration, Utc};

    use crate::document::{LOGICAL_PAGE_NUMBER, LOGICAL_PHYSICAL, PHYS_PAGE_NUMBER, REPRESENTATIVE, TITLE};
    use crate::editor::pages::{PageDirection, PageSelector, PaginateRequest};
    use crate::editor::structure::{AddPosition, FieldWidget, MoveTarget, NewPerson};
    use crate::editor::{
        AddMode, Editor, EditorError, EditorPanel, EditorSession, MessageLevel, SessionState, View,
    };
    use crate::images::ImageError;
    use crate::paginator::{PaginationError, PaginationMode, PaginationScope, PaginationType};
    use crate::tests::fixtures::{list, touch, Fixture};

    const FIVE: [&str; 5] = ["00000001.tif", "00000002.tif", "00000003.tif", "00000004.tif", "00000005.tif"];
    const THREE: [&str; 3] = ["00000001.tif", "00000002.tif", "00000003.tif"];

    fn images(editor: &Editor) -> Vec<String> {
        editor.pages().unwrap().into_iter().map(|p| p.image.unwrap_or_default()).collect()
    }

    fn arabic_from_first(editor: &Editor) -> PaginateRequest {
        let first = editor.document().unwrap().pages()[0];
        PaginateRequest {
            pages: vec![first],
            kind: PaginationType::Arabic,
            mode: PaginationMode::Pages,
            scope: PaginationScope::FromFirst,
            start_value: "1".to_string(),
            fictitious: false,
            separator: None,
        }
    }

    #[test]
    fn test_load_builds_pagination_and_defaults() {
        let fx = Fixture::new(&THREE);
        let editor = fx.loaded();

        assert_eq!(editor.state(), SessionState::Loaded);
        assert_eq!(editor.panel(), EditorPanel::Metadaten);
        assert!(fx.env.locks.is_locked(1));
        assert_eq!(fx.env.locks.holder(1).as_deref(), Some("anna"));

        let doc = editor.document().unwrap();
        assert_eq!(editor.current(), doc.logical_root());
        assert_eq!(images(&editor), THREE.to_vec());

        let fields = editor.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert!(matches!(&fields[0], FieldWidget::Edit { type_name, value, readonly: false, .. }
            if type_name == TITLE && value.is_empty()));
        assert!(matches!(&fields[1], FieldWidget::PersonGroup { role, label, .. } if role == "Author" && label == "Verfasser"));
    }

    #[test]
    fn test_load_refused_while_other_user_holds_lock() {
        let fx = Fixture::new(&THREE);
        let mut anna = fx.loaded();

        let mut bert = fx.editor("bert");
        match bert.load() {
            Err(EditorError::Locked { holder }) => assert_eq!(holder, "anna"),
            other => panic!("expected Locked, got {:?}", other.map(|_| ())),
        }
        assert_eq!(bert.state(), SessionState::Unloaded);
        assert!(bert.document().is_none());

        anna.close();
        assert!(!fx.env.locks.is_locked(1));
        assert_eq!(bert.load().unwrap(), View::StructureTree);
    }

    #[test]
    fn test_load_rejects_unknown_root_type() {
        let fx = Fixture::with_root("Zeitung", &THREE);
        let mut editor = fx.editor("anna");

        assert!(matches!(editor.load(), Err(EditorError::LoadFailed(_))));
        assert_eq!(editor.state(), SessionState::Unloaded);
        assert!(!fx.env.locks.is_locked(1));
    }

    #[test]
    fn test_load_without_image_folder_warns() {
        let fx = Fixture::new(&[]);
        fs::remove_dir_all(fx.layout.tif_dir()).unwrap();
        let mut editor = fx.loaded();

        let messages = editor.take_messages();
        assert!(messages.iter().any(|m| m.level == MessageLevel::Warning));
        assert!(editor.pages().unwrap().is_empty());
        assert!(matches!(editor.reconcile(), Err(EditorError::Image(ImageError::MissingFolder(_)))));
    }

    #[test]
    fn test_concurrent_load_is_rejected() {
        let fx = Fixture::new(&THREE);
        let session = EditorSession::new(fx.editor("anna"));

        let reading = session.read_guard().unwrap();
        assert!(matches!(session.load(), Err(EditorError::LoadInProgress)));
        assert!(matches!(session.reload(), Err(EditorError::LoadInProgress)));
        drop(reading);

        assert_eq!(session.load().unwrap(), View::StructureTree);
    }

    #[test]
    fn test_operations_require_loaded_document() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.editor("anna");
        assert!(matches!(editor.tree(), Err(EditorError::NotLoaded)));
        assert!(matches!(editor.add_metadata(TITLE, "x"), Err(EditorError::NotLoaded)));
        assert!(matches!(editor.save(), Err(EditorError::NotLoaded)));
    }

    #[test]
    fn test_lock_expiry_keeps_mutation_until_reload() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        fx.env.locks.set_locked_at(1, "anna", Utc::now() - Duration::hours(1));

        assert!(matches!(editor.add_metadata("PublicationYear", "1700"), Err(EditorError::LockExpired)));
        assert_eq!(editor.state(), SessionState::LockExpired);
        let doc = editor.document().unwrap();
        assert_eq!(doc.first_value(doc.logical_root().unwrap(), "PublicationYear"), Some("1700"));
        assert_eq!(fx.env.metrics.get_snapshot().lock_expiries, 1);

        // everything but reload is refused now
        assert!(matches!(editor.tree(), Err(EditorError::LockExpired)));
        assert!(matches!(editor.save(), Err(EditorError::LockExpired)));

        let session = EditorSession::new(editor);
        let (view, statistics) = session.reload().unwrap();
        assert_eq!(view, View::StructureTree);
        assert!(statistics.is_none());

        let editor = session.editor();
        assert_eq!(editor.state(), SessionState::Loaded);
        let doc = editor.document().unwrap();
        assert_eq!(doc.first_value(doc.logical_root().unwrap(), "PublicationYear"), None);
    }

    #[test]
    fn test_reload_saves_loaded_session() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        editor.add_metadata(TITLE, "Chronik").unwrap();

        let session = EditorSession::new(editor);
        let (_, statistics) = session.reload().unwrap();
        assert_eq!(statistics.unwrap().image_count, 3);

        let editor = session.editor();
        let doc = editor.document().unwrap();
        assert_eq!(doc.first_value(doc.logical_root().unwrap(), TITLE), Some("Chronik"));
        assert!(fx.env.locks.is_locked(1));
    }

    #[test]
    fn test_add_and_select_nodes() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();

        let first = editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();
        assert_eq!(editor.current(), Some(first));
        let second = editor.add_node("Chapter", AddPosition::After, None, None).unwrap();
        assert!(matches!(
            editor.add_node("TitlePage", AddPosition::FirstChild, None, None),
            Err(EditorError::NotAllowed(_))
        ));

        editor.select(first).unwrap();
        let title_page = editor.add_node("TitlePage", AddPosition::Before, None, None).unwrap();
        let doc = editor.document().unwrap();
        assert_eq!(doc.children(root), &[title_page, first, second]);

        // new elements carry their default-display fields
        assert_eq!(doc.get(second).unwrap().metadata[0].type_name, TITLE);

        assert!(matches!(
            editor.add_node("Monograph", AddPosition::FirstChild, None, None),
            Err(EditorError::NotAllowed(_))
        ));
        editor.select(root).unwrap();
        assert!(matches!(editor.add_node("Chapter", AddPosition::Before, None, None), Err(EditorError::NotAllowed(_))));

        let pages = editor.document().unwrap().pages();
        assert!(matches!(editor.select(pages[0]), Err(EditorError::NotFound(_))));
    }

    #[test]
    fn test_add_node_with_page_range() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        editor.paginate(&arabic_from_first(&editor)).unwrap();
        let pages = editor.document().unwrap().pages();

        let chapter = editor
            .add_node(
                "Chapter",
                AddPosition::LastChild,
                Some(&PageSelector::Label("2: 2".to_string())),
                Some(&PageSelector::Id(pages[2])),
            )
            .unwrap();
        let doc = editor.document().unwrap();
        assert_eq!(doc.references().targets(chapter, LOGICAL_PHYSICAL), vec![pages[1], pages[2]]);

        let tree = editor.tree().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].first_page.as_deref(), Some("1"));
        assert_eq!(tree[1].depth, 1);
        assert_eq!(tree[1].first_page.as_deref(), Some("2"));
        assert_eq!(tree[1].last_page.as_deref(), Some("3"));
        assert!(tree[1].current);

        let reversed = editor.add_node(
            "Chapter",
            AddPosition::After,
            Some(&PageSelector::Id(pages[2])),
            Some(&PageSelector::Id(pages[0])),
        );
        assert!(matches!(reversed, Err(EditorError::Validation { .. })));
        let half = editor.add_node("Chapter", AddPosition::After, Some(&PageSelector::Id(pages[0])), None);
        assert!(matches!(half, Err(EditorError::Validation { .. })));
    }

    #[test]
    fn test_move_node() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();
        let a = editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();
        let b = editor.add_node("Chapter", AddPosition::After, None, None).unwrap();

        assert_eq!(editor.move_node(MoveTarget::Up).unwrap(), View::StructureTree);
        assert_eq!(editor.document().unwrap().children(root), &[b, a]);
        assert_eq!(editor.move_node(MoveTarget::Up).unwrap(), View::Stay);

        editor.move_node(MoveTarget::To { parent: a }).unwrap();
        let doc = editor.document().unwrap();
        assert_eq!(doc.children(root), &[a]);
        assert_eq!(doc.children(a), &[b]);

        editor.select(a).unwrap();
        assert!(matches!(editor.move_node(MoveTarget::To { parent: b }), Err(EditorError::NotAllowed(_))));
        editor.select(root).unwrap();
        assert!(matches!(editor.move_node(MoveTarget::Down), Err(EditorError::NotAllowed(_))));
    }

    #[test]
    fn test_change_type_checks_parent_and_children() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();
        let chapter = editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();
        editor.add_node("Chapter", AddPosition::FirstChild, None, None).unwrap();

        editor.select(chapter).unwrap();
        assert!(matches!(editor.change_type("TitlePage"), Err(EditorError::NotAllowed(_))));
        editor.select(root).unwrap();
        assert!(matches!(editor.change_type("Chapter"), Err(EditorError::NotAllowed(_))));
        assert!(matches!(editor.change_type("Zeitung"), Err(EditorError::NotAllowed(_))));

        let leaf = editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();
        editor.change_type("TitlePage").unwrap();
        assert_eq!(editor.document().unwrap().get(leaf).unwrap().type_name, "TitlePage");
    }

    #[test]
    fn test_delete_node_selects_parent() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();
        let pages = editor.document().unwrap().pages();
        let chapter = editor
            .add_node("Chapter", AddPosition::LastChild, Some(&PageSelector::Id(pages[0])), Some(&PageSelector::Id(pages[1])))
            .unwrap();
        let sub = editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();

        editor.select(chapter).unwrap();
        editor.delete_node().unwrap();
        assert_eq!(editor.current(), Some(root));
        let doc = editor.document().unwrap();
        assert!(!doc.contains(chapter));
        assert!(!doc.contains(sub));
        assert!(doc.references().sources(pages[0], LOGICAL_PHYSICAL).iter().all(|s| *s == root));
        assert_eq!(doc.pages().len(), 3);

        assert!(matches!(editor.delete_node(), Err(EditorError::NotAllowed(_))));
    }

    #[test]
    fn test_metadata_rules() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();

        // fills the empty placeholder
        editor.add_metadata(TITLE, "Chronik").unwrap();
        assert_eq!(editor.document().unwrap().get(root).unwrap().metadata.len(), 1);
        assert!(matches!(editor.add_metadata(TITLE, "Zweiter Titel"), Err(EditorError::Validation { .. })));

        editor.add_metadata("Subject", "Hanse").unwrap();
        editor.add_metadata("Subject", "Handel").unwrap();
        assert!(matches!(editor.add_metadata("DocLanguage", "fra"), Err(EditorError::Validation { .. })));
        editor.add_metadata("DocLanguage", "lat").unwrap();
        assert!(matches!(editor.add_metadata("CatalogIDDigital", "PPN1"), Err(EditorError::Validation { .. })));
        assert!(matches!(editor.add_metadata("Author", "Meyer"), Err(EditorError::Validation { .. })));
        assert!(matches!(editor.add_metadata("Shelfmark", "A 1"), Err(EditorError::NotAllowed(_))));

        let fields = editor.fields().unwrap();
        assert!(fields.iter().any(|f| matches!(f, FieldWidget::DropDown { value, options, .. }
            if value == "lat" && options.len() == 2)));

        editor.update_metadata(0, "Chronik der Stadt").unwrap();
        assert_eq!(editor.document().unwrap().first_value(root, TITLE), Some("Chronik der Stadt"));
        assert!(matches!(editor.update_metadata(99, "x"), Err(EditorError::NotFound(_))));

        editor.delete_metadata(1).unwrap();
        let subjects: Vec<String> = editor
            .document()
            .unwrap()
            .get(root)
            .unwrap()
            .metadata
            .iter()
            .filter(|m| m.type_name == "Subject")
            .map(|m| m.value.clone())
            .collect();
        assert_eq!(subjects, vec!["Handel"]);
        assert!(matches!(editor.delete_metadata(99), Err(EditorError::NotFound(_))));
    }

    #[test]
    fn test_metadata_not_allowed_on_chapter() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();
        assert!(matches!(editor.add_metadata("PublicationYear", "1700"), Err(EditorError::NotAllowed(_))));
    }

    #[test]
    fn test_persons() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();
        let author = |first: &str, last: &str| NewPerson {
            role: "Author".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            authority: None,
        };

        editor.add_person(author(" Johann ", "Meyer")).unwrap();
        let persons = &editor.document().unwrap().get(root).unwrap().persons;
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].first_name, "Johann");

        editor.add_person(author("Anna", "Schmidt")).unwrap();
        assert_eq!(editor.document().unwrap().get(root).unwrap().persons.len(), 2);

        let not_person = NewPerson { role: "Subject".to_string(), ..author("a", "b") };
        assert!(matches!(editor.add_person(not_person), Err(EditorError::NotAllowed(_))));

        editor.delete_person(0).unwrap();
        assert_eq!(editor.document().unwrap().get(root).unwrap().persons[0].last_name, "Schmidt");
        assert!(matches!(editor.delete_person(5), Err(EditorError::NotFound(_))));
    }

    #[test]
    fn test_add_mode_and_panels() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();

        assert_eq!(editor.begin_add(AddMode::Person).unwrap(), View::Stay);
        assert_eq!(editor.add_mode(), AddMode::Person);
        assert_eq!(editor.cancel().unwrap(), View::StructureTree);
        assert_eq!(editor.add_mode(), AddMode::None);

        assert_eq!(editor.set_panel(EditorPanel::Paginierung).unwrap(), View::Pagination);
        assert_eq!(editor.cancel().unwrap(), View::Pagination);
        assert_eq!(editor.summary().panel, EditorPanel::Paginierung);
    }

    #[test]
    fn test_paginate_through_editor() {
        let fx = Fixture::new(&FIVE);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();

        let mut request = arabic_from_first(&editor);
        request.pages = vec![pages[2]];
        request.kind = PaginationType::Roman;
        request.start_value = "i".to_string();
        assert_eq!(editor.paginate(&request).unwrap(), View::Pagination);

        let labels: Vec<String> = editor.pages().unwrap().into_iter().map(|p| p.logical).collect();
        assert_eq!(labels, vec!["uncounted", "uncounted", "i", "ii", "iii"]);
        assert_eq!(editor.pages().unwrap()[2].label, "3: i");

        request.start_value = "x1".to_string();
        request.kind = PaginationType::Arabic;
        assert!(matches!(
            editor.paginate(&request),
            Err(EditorError::Pagination(PaginationError::InvalidArabic(_)))
        ));
        request.pages.clear();
        assert!(matches!(editor.paginate(&request), Err(EditorError::Pagination(PaginationError::EmptySelection))));
    }

    #[test]
    fn test_page_assignment() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let root = editor.current().unwrap();
        let pages = editor.document().unwrap().pages();
        let a = editor.add_node("Chapter", AddPosition::LastChild, None, None).unwrap();

        let range = editor.assign_page_range(None, &PageSelector::Id(pages[1]), &PageSelector::Id(pages[2])).unwrap();
        assert_eq!(range, vec![pages[1], pages[2]]);
        assert!(editor.pages().unwrap()[1].assigned);
        assert!(!editor.pages().unwrap()[0].assigned);

        editor.remove_pages(&[pages[1]]).unwrap();
        editor.add_pages(&[pages[0]]).unwrap();
        assert_eq!(editor.document().unwrap().references().targets(a, LOGICAL_PHYSICAL), vec![pages[0], pages[2]]);

        let b = editor.add_node("Chapter", AddPosition::After, None, None).unwrap();
        editor.assign_page_range(Some(b), &PageSelector::Id(pages[1]), &PageSelector::Id(pages[1])).unwrap();

        editor.select(root).unwrap();
        let union = editor.assign_pages_from_children().unwrap();
        assert_eq!(union, pages);
        assert!(matches!(editor.add_pages(&[crate::document::NodeId(999)]), Err(EditorError::NotFound(_))));
    }

    #[test]
    fn test_delete_pages_renumbers_and_removes_files() {
        let fx = Fixture::new(&FIVE);
        let ocr = fx.layout.ocr_dir().join("hamburg_1700_txt");
        touch(&ocr, &["00000002.txt", "00000005.txt"]);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();

        assert_eq!(editor.delete_pages(&[pages[1], pages[3]]).unwrap(), View::Pagination);

        let doc = editor.document().unwrap();
        assert_eq!(doc.pages(), vec![pages[0], pages[2], pages[4]]);
        let numbers: Vec<&str> = doc.pages().iter().map(|p| doc.first_value(*p, PHYS_PAGE_NUMBER).unwrap()).collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);
        assert_eq!(list(&fx.layout.tif_dir()), vec!["00000001.tif", "00000003.tif", "00000005.tif"]);
        assert_eq!(list(&ocr), vec!["00000005.txt"]);
        assert_eq!(fx.env.metrics.get_snapshot().pages_deleted, 2);
    }

    #[test]
    fn test_reorder_pagination_renames_files() {
        let fx = Fixture::new(&FIVE);
        let ocr = fx.layout.ocr_dir().join("hamburg_1700_txt");
        touch(&ocr, &["00000005.txt"]);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();
        editor.delete_pages(&[pages[1], pages[3]]).unwrap();

        editor.reorder_pagination().unwrap();
        assert_eq!(list(&fx.layout.tif_dir()), vec!["00000001.tif", "00000002.tif", "00000003.tif"]);
        assert_eq!(list(&ocr), vec!["00000003.txt"]);
        assert_eq!(images(&editor), vec!["00000001.tif", "00000002.tif", "00000003.tif"]);
        // the former 00000005.tif keeps its content
        assert_eq!(fs::read(fx.layout.tif_dir().join("00000003.tif")).unwrap(), b"00000005.tif");
        assert!(editor.reconcile().unwrap().is_noop());
    }

    #[test]
    fn test_reorder_pagination_keeps_unbound_files() {
        let fx = Fixture::new(&FIVE);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();
        editor.delete_pages(&[pages[1], pages[3]]).unwrap();
        fs::write(fx.layout.tif_dir().join("00000002.tif"), b"stray").unwrap();

        let err = editor.reorder_pagination().unwrap_err();
        assert!(matches!(err, EditorError::Validation { ref field, .. } if field == "pages"));
        assert_eq!(
            list(&fx.layout.tif_dir()),
            vec!["00000001.tif", "00000002.tif", "00000003.tif", "00000005.tif"]
        );
        assert_eq!(fs::read(fx.layout.tif_dir().join("00000002.tif")).unwrap(), b"stray");
        assert_eq!(images(&editor), vec!["00000001.tif", "00000003.tif", "00000005.tif"]);
    }

    #[test]
    fn test_move_pages_swaps_images() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();

        let moved = editor.move_pages(&[pages[0], pages[1]], PageDirection::Down).unwrap();
        assert_eq!(moved, vec![pages[1], pages[2]]);
        assert_eq!(images(&editor), vec!["00000003.tif", "00000001.tif", "00000002.tif"]);

        // nothing moves past the first page
        let moved = editor.move_pages(&[pages[0]], PageDirection::Up).unwrap();
        assert!(moved.is_empty());
        assert_eq!(images(&editor), vec!["00000003.tif", "00000001.tif", "00000002.tif"]);
    }

    #[test]
    fn test_reconcile_picks_up_new_images() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        touch(&fx.layout.tif_dir(), &["00000004.tif"]);

        let report = editor.reconcile().unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(editor.pages().unwrap()[3].logical, "uncounted");
        assert!(editor.take_messages().iter().any(|m| m.level == MessageLevel::Info));
    }

    #[test]
    fn test_session_idle_detection() {
        let fx = Fixture::new(&THREE);
        let session = EditorSession::new(fx.loaded());
        let idle = fx.env.locks.timeout();
        let later = Utc::now() + idle + Duration::minutes(1);

        assert!(!session.is_idle_at(Utc::now(), idle));
        fx.env.locks.set_locked_at(1, "anna", later);
        assert!(!session.is_idle_at(later, idle));

        fx.env.locks.set_locked_at(1, "anna", Utc::now() - Duration::hours(3));
        assert!(session.is_idle_at(later, idle));

        session.close();
        assert!(session.is_idle_at(later, idle));
        let _editor = session.editor();
        assert!(!session.is_idle_at(later, idle));
    }

    #[test]
    fn test_representative_and_save() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        editor.add_metadata(TITLE, "Chronik").unwrap();
        let pages = editor.document().unwrap().pages();
        editor.set_representative(&PageSelector::Id(pages[1])).unwrap();
        assert!(editor.pages().unwrap()[1].representative);

        let statistics = editor.save().unwrap();
        assert_eq!(statistics.docstruct_count, 1);
        assert_eq!(statistics.metadata_count, 1);
        assert_eq!(statistics.image_count, 3);
        assert_eq!(editor.state(), SessionState::Unloaded);
        assert!(!fx.env.locks.is_locked(1));
        assert!(fx.layout.process_dir().join("meta.xml.1").exists());

        let saved = fx.layout.read_metadata().unwrap();
        assert_eq!(saved.first_value(saved.logical_root().unwrap(), TITLE), Some("Chronik"));
        assert_eq!(saved.first_value(saved.physical_root().unwrap(), REPRESENTATIVE), Some("2"));
        assert_eq!(saved.pages().len(), 3);
        assert_eq!(saved.first_value(saved.pages()[0], LOGICAL_PAGE_NUMBER), Some("uncounted"));

        editor.load().unwrap();
        assert_eq!(editor.representative(), Some(2));
    }

    #[test]
    fn test_representative_follows_its_page_on_delete() {
        let fx = Fixture::new(&FIVE);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();
        editor.set_representative(&PageSelector::Id(pages[4])).unwrap();

        editor.delete_pages(&[pages[0], pages[1]]).unwrap();
        assert_eq!(editor.representative(), Some(3));
        let listed = editor.pages().unwrap();
        assert!(listed[2].representative);
        assert_eq!(listed[2].image.as_deref(), Some("00000005.tif"));

        editor.save().unwrap();
        editor.load().unwrap();
        assert_eq!(editor.representative(), Some(3));
        assert_eq!(editor.pages().unwrap().len(), 3);
    }

    #[test]
    fn test_deleting_representative_page_clears_marker() {
        let fx = Fixture::new(&FIVE);
        let mut editor = fx.loaded();
        let pages = editor.document().unwrap().pages();
        editor.set_representative(&PageSelector::Id(pages[1])).unwrap();
        editor.save().unwrap();
        editor.load().unwrap();
        assert_eq!(editor.representative(), Some(2));

        let pages = editor.document().unwrap().pages();
        editor.delete_pages(&[pages[1]]).unwrap();
        assert_eq!(editor.representative(), None);

        editor.save().unwrap();
        let saved = fx.layout.read_metadata().unwrap();
        assert_eq!(saved.first_value(saved.physical_root().unwrap(), REPRESENTATIVE), None);
        editor.load().unwrap();
        assert_eq!(editor.representative(), None);
    }

    #[test]
    fn test_preview_navigation() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();

        let info = editor.go_to(2).unwrap();
        assert_eq!(info.index, 1);
        assert_eq!(info.image.as_deref(), Some("00000002.tif"));
        assert_eq!(info.file, Some(format!("{}_1.png", editor.session_id())));
        {
            let requests = fx.scaler.requests.lock();
            assert_eq!(requests[0].source, fx.layout.tif_dir().join("00000002.tif"));
            assert_eq!(requests[0].scale_percent, 40);
        }

        let info = editor.rotate_right().unwrap();
        assert_eq!(info.rotation, 90);
        assert_eq!(editor.rotate_left().unwrap().rotation, 0);
        assert_eq!(editor.rotate_left().unwrap().rotation, 270);
        assert_eq!(editor.navigate(10).unwrap().index, 2);
        assert_eq!(editor.navigate(-10).unwrap().index, 0);

        assert_eq!(editor.set_zoom(120).unwrap().zoom, 120);
        assert!(matches!(editor.set_zoom(0), Err(EditorError::Validation { .. })));
        assert!(matches!(editor.select_folder(Some("fehlt")), Err(EditorError::Validation { .. })));
        assert_eq!(editor.folders(), vec!["hamburg_1700_tif"]);
        assert!(fx.scaler.requests.lock().len() >= 6);
    }

    #[test]
    fn test_preview_from_other_folder_falls_back() {
        let fx = Fixture::new(&THREE);
        let orig = fx.layout.orig_dir();
        touch(&orig, &["00000001.jpg"]);
        let mut editor = fx.loaded();

        let info = editor.select_folder(Some("orig_hamburg_1700_tif")).unwrap();
        assert_eq!(info.folder.as_deref(), Some("orig_hamburg_1700_tif"));
        assert_eq!(fx.scaler.requests.lock().last().unwrap().source, orig.join("00000001.jpg"));

        editor.take_messages();
        editor.go_to(2).unwrap();
        assert_eq!(fx.scaler.requests.lock().last().unwrap().source, fx.layout.tif_dir().join("00000002.tif"));
        assert!(editor.take_messages().iter().any(|m| m.level == MessageLevel::Warning));
    }

    #[test]
    fn test_upload_and_import_after_page() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let folder = fx.layout.tif_folder_name();
        let pages = editor.document().unwrap().pages();

        editor.upload_file(&folder, "00000004.tif", b"neu").unwrap();
        assert!(matches!(editor.upload_file(&folder, "00000004.tif", b"neu"), Err(EditorError::Validation { .. })));
        assert!(matches!(editor.upload_file(&folder, "../x.tif", b"neu"), Err(EditorError::Validation { .. })));
        assert!(matches!(editor.upload_file("fehlt", "a.tif", b"neu"), Err(EditorError::Validation { .. })));
        assert_eq!(editor.staged_files(&folder), vec!["00000004.tif"]);

        let report = editor.import_files(&folder, Some(pages[0])).unwrap();
        assert_eq!(report.imported, vec!["00000004.tif"]);
        assert_eq!(report.created.len(), 1);
        assert_eq!(images(&editor), vec!["00000001.tif", "00000004.tif", "00000002.tif", "00000003.tif"]);
        assert!(editor.staged_files(&folder).is_empty());
        assert!(fx.layout.tif_dir().join("00000004.tif").exists());

        assert!(matches!(editor.import_files(&folder, None), Err(EditorError::Validation { .. })));
    }

    #[test]
    fn test_import_conflict_moves_nothing() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let folder = fx.layout.tif_folder_name();
        editor.upload_file(&folder, "00000002.tif", b"ersatz").unwrap();
        editor.upload_file(&folder, "00000009.tif", b"neu").unwrap();

        assert!(matches!(editor.import_files(&folder, None), Err(EditorError::Validation { .. })));
        assert_eq!(editor.staged_files(&folder).len(), 2);
        assert!(!fx.layout.tif_dir().join("00000009.tif").exists());
    }

    #[test]
    fn test_export_and_download() {
        let fx = Fixture::new(&THREE);
        let mut editor = fx.loaded();
        let folder = fx.layout.tif_folder_name();

        let exported = editor.export_files(&folder).unwrap();
        assert_eq!(exported, THREE.to_vec());
        assert_eq!(editor.download_file(&folder, "00000002.tif").unwrap(), b"00000002.tif");
        assert!(matches!(editor.download_file(&folder, "00000009.tif"), Err(EditorError::NotFound(_))));
        assert!(matches!(editor.download_file(&folder, ".."), Err(EditorError::Validation { .. })));
    }
}
