//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use quarry_foundation::{Entity, Error, ErrorContext, ErrorKind};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_stale_handle() {
    let err = Error::stale_handle(Entity::new(4, 2));
    assert!(matches!(err.kind, ErrorKind::StaleHandle(e) if e.index == 4));
    assert!(err.is_invalid_entity());
    assert!(format!("{err}").contains("stale"));
}

#[test]
fn error_unknown_entity() {
    let err = Error::unknown_entity(Entity::new(9, 0));
    assert!(err.is_invalid_entity());
    assert!(format!("{err}").contains("unknown"));
}

#[test]
fn error_missing_component() {
    let err = Error::missing_component(Entity::new(1, 0), "Position");
    assert!(!err.is_invalid_entity());
    let msg = format!("{err}");
    assert!(msg.contains("Position"));
    assert!(msg.contains("missing"));
}

#[test]
fn error_duplicate_component() {
    let err = Error::duplicate_component(Entity::new(1, 0), "Velocity");
    assert!(matches!(
        err.kind,
        ErrorKind::DuplicateComponent { component: "Velocity", .. }
    ));
}

#[test]
fn error_resource_not_found() {
    let err = Error::resource_not_found("Gravity");
    assert_eq!(err.kind, ErrorKind::ResourceNotFound("Gravity"));
    assert!(format!("{err}").contains("Gravity"));
}

#[test]
fn error_supplementary_kinds() {
    assert!(matches!(
        Error::access_conflict("Position").kind,
        ErrorKind::AccessConflict { .. }
    ));
    assert!(matches!(
        Error::unresolved_provisional(3).kind,
        ErrorKind::UnresolvedProvisional(3)
    ));
    let (child, parent) = (Entity::new(1, 0), Entity::new(2, 0));
    assert_eq!(
        Error::hierarchy_cycle(child, parent).kind,
        ErrorKind::HierarchyCycle { child, parent }
    );
    assert!(format!("{}", Error::query_mismatch(child)).contains("query"));
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn context_is_optional() {
    let err = Error::unknown_entity(Entity::new(0, 0));
    assert!(err.context.is_none());
}

#[test]
fn context_records_source_and_frames() {
    let context = ErrorContext::new()
        .with_source("command #3 (insert)")
        .with_frame("apply");
    let err = Error::unknown_entity(Entity::new(0, 0)).with_context(context);

    let context = err.context.as_ref().unwrap();
    assert_eq!(context.source.as_deref(), Some("command #3 (insert)"));
    let rendered = context.to_string();
    assert!(rendered.starts_with("at command #3 (insert)"));
    assert!(rendered.contains("in apply"));
}
