#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for revisioned pages: saving, publishing, visibility,
//! events and export/import.

use ramo_kernel::content::{SiteExport, ViolationReason};
use ramo_kernel::models::PublishState;
use ramo_kernel::{BlockRegistry, Config, ContentEvent, CoreError, PageService, ValidationMode};
use ramo_sdk::types::{BlockInstance, Document};
use ramo_test_utils::{docs, scenario_kinds, scenario_page_types};

fn service() -> PageService {
    let registry = BlockRegistry::new();
    registry.register_all(scenario_kinds()).unwrap();
    for page_type in scenario_page_types() {
        registry.register_page_type(page_type).unwrap();
    }
    PageService::new(registry)
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn create_save_publish_read() {
    let service = service();
    let a = service.create_page(None, "home", "home").unwrap();
    let b = service.create_page(Some(a.id), "blog", "blog").unwrap();
    assert_eq!(b.parent_id, Some(a.id));
    assert_eq!(b.depth, 2);
    assert!(b.path.starts_with(&a.path));
    assert_eq!(b.state, PublishState::Draft);
    let snapshot = service.snapshot();
    let children = snapshot.children(a.id).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, b.id);

    let sequence = service
        .save_revision(b.id, docs::single_section("Hi", 2), Some("editor"))
        .unwrap();
    assert_eq!(sequence, 1);
    assert_eq!(service.live_document(b.id).unwrap(), None);

    service.publish(b.id, sequence).unwrap();
    let page = service.page(b.id).unwrap();
    assert_eq!(page.state, PublishState::Live);
    assert_eq!(page.live_revision_id, Some(1));
    assert!(page.first_published_at.is_some());
    assert_eq!(
        service.live_document(b.id).unwrap(),
        Some(docs::single_section("Hi", 2))
    );

    assert!(matches!(
        service.create_page(Some(a.id), "blog", "blog"),
        Err(CoreError::SlugConflict { slug }) if slug == "blog"
    ));
    assert_eq!(service.pages().len(), 2);
}

#[test]
fn unknown_page_type_is_rejected() {
    let service = service();
    assert!(matches!(
        service.create_page(None, "home", "landing"),
        Err(CoreError::NotFound { entity: "page type", .. })
    ));
    assert!(service.pages().is_empty());
}

#[test]
fn invalid_documents_are_not_stored() {
    let service = service();
    let blog = service.create_page(None, "blog", "blog").unwrap();

    let err = service
        .save_revision(blog.id, Document::new(), None)
        .unwrap_err();
    let CoreError::Validation(report) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(
        report.violations()[0].reason,
        ViolationReason::TooFew { min: 1, found: 0 }
    );

    let not_allowed = Document::new().with(docs::cards(1));
    assert!(matches!(
        service.save_revision(blog.id, not_allowed, None),
        Err(CoreError::Validation(_))
    ));
    assert!(service.revisions(blog.id).unwrap().is_empty());
}

#[test]
fn config_sets_width_and_default_mode() {
    let registry = BlockRegistry::new();
    registry.register_all(scenario_kinds()).unwrap();
    let config = Config {
        validation_mode: ValidationMode::Lenient,
        segment_width: 2,
        ..Config::default()
    };
    let service = PageService::with_config(registry, &config);
    assert_eq!(service.validation_mode(), ValidationMode::Lenient);

    let home = service.create_page(None, "home", "home").unwrap();
    assert_eq!(home.path, "01");

    let future = Document::new()
        .with(docs::section("Hi", 1))
        .with(BlockInstance::opaque("future_block", serde_json::json!({ "x": 1 })));
    assert_eq!(service.save_revision(home.id, future.clone(), None).unwrap(), 1);
    assert!(matches!(
        service.save_revision_with_mode(home.id, future, None, ValidationMode::Strict),
        Err(CoreError::Validation(_))
    ));
}

// ============================================================================
// Revisions
// ============================================================================

#[test]
fn revisions_append_and_revert() {
    let service = service();
    let home = service.create_page(None, "home", "home").unwrap();
    let first = docs::single_section("First", 1);
    service.save_revision(home.id, first.clone(), None).unwrap();
    service
        .save_revision(home.id, docs::single_section("Second", 2), None)
        .unwrap();

    let reverted = service.revert_to_revision(home.id, 1, Some("editor")).unwrap();
    assert_eq!(reverted, 3);

    let history = service.revisions(home.id).unwrap();
    let sequences: Vec<u64> = history.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, [1, 2, 3]);
    assert_eq!(history[2].content, first);
    assert_eq!(history[2].author.as_deref(), Some("editor"));
    assert_eq!(service.latest_revision(home.id).unwrap().unwrap().sequence, 3);

    assert!(matches!(
        service.revision(home.id, 9),
        Err(CoreError::NotFound { entity: "revision", .. })
    ));
}

// ============================================================================
// Publish state machine
// ============================================================================

#[test]
fn publish_state_transitions() {
    let service = service();
    let home = service.create_page(None, "home", "home").unwrap();
    let seq = service
        .save_revision(home.id, docs::single_section("Hi", 1), None)
        .unwrap();

    assert!(matches!(
        service.unpublish(home.id),
        Err(CoreError::InvalidTransition { state: PublishState::Draft, .. })
    ));
    assert!(matches!(
        service.publish(home.id, 7),
        Err(CoreError::NotFound { .. })
    ));

    service.publish(home.id, seq).unwrap();
    assert!(matches!(
        service.publish(home.id, seq),
        Err(CoreError::InvalidTransition { state: PublishState::Live, .. })
    ));

    service.unpublish(home.id).unwrap();
    let page = service.page(home.id).unwrap();
    assert_eq!(page.state, PublishState::Unpublished);
    assert_eq!(page.live_revision_id, Some(seq));
    assert_eq!(service.live_document(home.id).unwrap(), None);
    assert!(matches!(
        service.unpublish(home.id),
        Err(CoreError::InvalidTransition { .. })
    ));

    let next = service
        .save_revision(home.id, docs::single_section("Again", 2), None)
        .unwrap();
    service.publish(home.id, next).unwrap();
    assert_eq!(
        service.live_document(home.id).unwrap(),
        Some(docs::single_section("Again", 2))
    );
}

#[test]
fn saving_a_draft_keeps_the_live_revision() {
    let service = service();
    let home = service.create_page(None, "home", "home").unwrap();
    let seq = service
        .save_revision(home.id, docs::single_section("Live", 1), None)
        .unwrap();
    service.publish(home.id, seq).unwrap();
    service
        .save_revision(home.id, docs::single_section("Draft", 2), None)
        .unwrap();

    assert_eq!(
        service.live_document(home.id).unwrap(),
        Some(docs::single_section("Live", 1))
    );
}

#[test]
fn members_only_pages_are_hidden_from_anonymous_readers() {
    let service = service();
    let home = service.create_page(None, "home", "home").unwrap();
    let seq = service
        .save_revision(home.id, docs::single_section("Secret", 1), None)
        .unwrap();
    service.set_members_only(home.id, true).unwrap();

    assert_eq!(service.visible_document(home.id, true).unwrap(), None);

    service.publish(home.id, seq).unwrap();
    assert_eq!(service.visible_document(home.id, false).unwrap(), None);
    assert!(service.visible_document(home.id, true).unwrap().is_some());
    assert!(!service.page(home.id).unwrap().is_visible(false));
}

#[test]
fn live_descendants_filter_by_type() {
    let service = service();
    let home = service.create_page(None, "home", "home").unwrap();
    let post = service.create_page(Some(home.id), "post", "blog").unwrap();
    let draft = service.create_page(Some(home.id), "draft", "blog").unwrap();
    let section = service.create_page(Some(home.id), "section", "home").unwrap();
    for id in [post.id, draft.id, section.id] {
        service
            .save_revision(id, docs::single_section("Hi", 1), None)
            .unwrap();
    }
    service.publish(post.id, 1).unwrap();
    service.publish(section.id, 1).unwrap();

    let blogs = service.live_descendants(home.id, Some("blog")).unwrap();
    assert_eq!(blogs.len(), 1);
    assert_eq!(blogs[0].id, post.id);
    assert_eq!(service.live_descendants(home.id, None).unwrap().len(), 2);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn content_changes_are_broadcast() {
    let service = service();
    let mut events = service.subscribe();

    let home = service.create_page(None, "home", "home").unwrap();
    let other = service.create_page(None, "other", "home").unwrap();
    let seq = service
        .save_revision(home.id, docs::single_section("Hi", 1), None)
        .unwrap();
    service.publish(home.id, seq).unwrap();
    service.unpublish(home.id).unwrap();
    let moved = service.move_page(other.id, Some(home.id), None).unwrap();
    service.delete_page(home.id, true).unwrap();

    let expected = [
        ContentEvent::RevisionSaved {
            page_id: home.id,
            sequence: 1,
        },
        ContentEvent::Published {
            page_id: home.id,
            sequence: 1,
        },
        ContentEvent::Unpublished { page_id: home.id },
        ContentEvent::PageMoved {
            page_id: other.id,
            path: moved.path,
        },
        ContentEvent::PagesDeleted {
            page_ids: vec![home.id, other.id],
        },
    ];
    for event in expected {
        assert_eq!(events.recv().await.unwrap(), event);
    }
}

// ============================================================================
// Export / import
// ============================================================================

#[test]
fn export_import_round_trip() {
    let source = service();
    let home = source.create_page(None, "home", "home").unwrap();
    let blog = source.create_page(Some(home.id), "blog", "blog").unwrap();
    source
        .save_revision(home.id, docs::single_section("Home", 1), None)
        .unwrap();
    source
        .save_revision(blog.id, docs::single_section("Blog", 2), Some("editor"))
        .unwrap();
    source.publish(blog.id, 1).unwrap();
    source.set_members_only(blog.id, true).unwrap();

    let text = serde_json::to_string(&source.export()).unwrap();
    let export: SiteExport = serde_json::from_str(&text).unwrap();
    let target = service();
    target.import(export).unwrap();

    assert_eq!(target.pages(), source.pages());
    assert_eq!(
        target.revisions(blog.id).unwrap(),
        source.revisions(blog.id).unwrap()
    );
    assert_eq!(
        target.live_document(blog.id).unwrap(),
        Some(docs::single_section("Blog", 2))
    );

    let extra = target.create_page(Some(home.id), "news", "blog").unwrap();
    assert!(extra.path > blog.path);
}

#[test]
fn import_rejects_inconsistent_exports() {
    let source = service();
    let home = source.create_page(None, "home", "home").unwrap();
    source
        .save_revision(home.id, docs::single_section("Home", 1), None)
        .unwrap();

    let mut gap = source.export();
    gap.revisions[0].sequence_number = 2;
    assert!(matches!(service().import(gap), Err(CoreError::Import { .. })));

    let mut live_without_revision = source.export();
    live_without_revision.pages[0].state = PublishState::Live;
    assert!(matches!(
        service().import(live_without_revision),
        Err(CoreError::Import { .. })
    ));

    let populated = service();
    populated.create_page(None, "home", "home").unwrap();
    assert!(matches!(
        populated.import(source.export()),
        Err(CoreError::Import { .. })
    ));
}
