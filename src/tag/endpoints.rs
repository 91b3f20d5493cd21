//! Tag CRUD endpoints.

use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    Error,
    app_state::DatabaseState,
    auth::session::Session,
    color::{DEFAULT_COLOR, validate_color},
    db::lock_database,
    family::require_family,
    tag::{
        db::{
            get_deleted_tag, get_tag, insert_tag, list_tags, purge_tag, restore_tag,
            soft_delete_tag, tag_name_exists, update_tag,
        },
        domain::{Tag, TagId, TagName},
    },
};

/// Form data for creating and editing tags.
#[derive(Debug, Deserialize)]
pub struct TagFormData {
    /// The tag name.
    pub name: String,
    /// The display color; defaults when omitted.
    pub color: Option<String>,
}

/// Handle tag creation form submission.
pub async fn create_tag_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Form(form): Form<TagFormData>,
) -> Result<impl IntoResponse, Error> {
    let name = TagName::new(&form.name)?;
    let color = form.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned());
    validate_color(&color)?;

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    if tag_name_exists(family_id, &name, None, &connection)? {
        return Err(Error::DuplicateTagName(name.to_string()));
    }

    let tag = insert_tag(family_id, &name, &color, now, &connection)?;

    Ok((StatusCode::CREATED, Json(tag)))
}

/// Handle tag edit form submission.
pub async fn update_tag_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(tag_id): Path<TagId>,
    Form(form): Form<TagFormData>,
) -> Result<Json<Tag>, Error> {
    let name = TagName::new(&form.name)?;
    let color = form.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned());
    validate_color(&color)?;

    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_tag(tag_id, family_id, &connection)?;

    if tag_name_exists(family_id, &name, Some(tag_id), &connection)? {
        return Err(Error::DuplicateTagName(name.to_string()));
    }

    update_tag(tag_id, &name, &color, now, &connection)?;

    get_tag(tag_id, family_id, &connection).map(Json)
}

/// Soft-delete a tag. Its junction rows stay in place so that a restore
/// brings the tag back with its attachments.
pub async fn delete_tag_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(tag_id): Path<TagId>,
) -> Result<StatusCode, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_tag(tag_id, family_id, &connection)?;
    soft_delete_tag(tag_id, now, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted tag, unless a live tag took its name meanwhile.
pub async fn restore_tag_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(tag_id): Path<TagId>,
) -> Result<Json<Tag>, Error> {
    let now = state.now();
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    let tag = get_deleted_tag(tag_id, family_id, &connection)?;

    if tag_name_exists(family_id, &tag.name, Some(tag_id), &connection)? {
        return Err(Error::DuplicateTagName(tag.name.to_string()));
    }

    restore_tag(tag_id, now, &connection)?;

    get_tag(tag_id, family_id, &connection).map(Json)
}

/// Permanently delete a soft-deleted tag, detaching it from every
/// transaction and recurring rule.
pub async fn purge_tag_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
    Path(tag_id): Path<TagId>,
) -> Result<StatusCode, Error> {
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    get_deleted_tag(tag_id, family_id, &connection)?;
    purge_tag(tag_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the family's live tags.
pub async fn list_tags_endpoint(
    State(state): State<DatabaseState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Tag>>, Error> {
    let connection = lock_database(&state.db_connection)?;
    let (family_id, _) = require_family(session.user_id, &connection)?;

    list_tags(family_id, &connection).map(Json)
}

#[cfg(test)]
mod tag_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        extract::{Path, State},
    };
    use rusqlite::Connection;

    use crate::{
        Error,
        app_state::DatabaseState,
        auth::session::Session,
        db::initialize,
        family::FamilyId,
        tag::db::test_utils::insert_test_tag,
        user::{
            UserRole, set_family,
            test_utils::{insert_test_family, insert_test_user, test_now},
        },
    };

    use super::{
        TagFormData, create_tag_endpoint, delete_tag_endpoint, list_tags_endpoint,
        restore_tag_endpoint, update_tag_endpoint,
    };

    fn get_test_state() -> (DatabaseState, Session, FamilyId) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");

        let family_id = insert_test_family(&connection);
        let user = insert_test_user("tester@example.com", &connection);
        set_family(user.id, Some(family_id), UserRole::Admin, test_now(), &connection).unwrap();

        let session = Session {
            id: "test-session".to_owned(),
            user_id: user.id,
            username: "tester".to_owned(),
            email: "tester@example.com".to_owned(),
            created_at: test_now(),
            fingerprint: "fp".to_owned(),
            csrf_token: "token".to_owned(),
            long_lived: false,
        };

        let state = DatabaseState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        (state, session, family_id)
    }

    #[tokio::test]
    async fn create_tag_succeeds() {
        let (state, session, _) = get_test_state();

        let result = create_tag_endpoint(
            State(state.clone()),
            Extension(session.clone()),
            Form(TagFormData {
                name: "groceries".to_owned(),
                color: None,
            }),
        )
        .await;

        assert!(result.is_ok());

        let tags = list_tags_endpoint(State(state), Extension(session))
            .await
            .unwrap();
        assert_eq!(tags.0.len(), 1);
        assert_eq!(tags.0[0].name.as_ref(), "groceries");
    }

    #[tokio::test]
    async fn create_tag_rejects_duplicate_name() {
        let (state, session, family_id) = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            insert_test_tag(family_id, "groceries", &connection);
        }

        let result = create_tag_endpoint(
            State(state),
            Extension(session),
            Form(TagFormData {
                name: "Groceries".to_owned(),
                color: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::DuplicateTagName(_))));
    }

    #[tokio::test]
    async fn create_tag_rejects_empty_name() {
        let (state, session, _) = get_test_state();

        let result = create_tag_endpoint(
            State(state),
            Extension(session),
            Form(TagFormData {
                name: "   ".to_owned(),
                color: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn update_tag_renames_and_recolors() {
        let (state, session, family_id) = get_test_state();
        let tag = {
            let connection = state.db_connection.lock().unwrap();
            insert_test_tag(family_id, "groceries", &connection)
        };

        let updated = update_tag_endpoint(
            State(state),
            Extension(session),
            Path(tag.id),
            Form(TagFormData {
                name: "food".to_owned(),
                color: Some("#A1B2C3".to_owned()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.0.name.as_ref(), "food");
        assert_eq!(updated.0.color, "#A1B2C3");
    }

    #[tokio::test]
    async fn delete_then_restore_round_trips() {
        let (state, session, family_id) = get_test_state();
        let tag = {
            let connection = state.db_connection.lock().unwrap();
            insert_test_tag(family_id, "groceries", &connection)
        };

        delete_tag_endpoint(State(state.clone()), Extension(session.clone()), Path(tag.id))
            .await
            .unwrap();

        let restored =
            restore_tag_endpoint(State(state), Extension(session), Path(tag.id))
                .await
                .unwrap();

        assert_eq!(restored.0.id, tag.id);
        assert!(restored.0.deleted_at.is_none());
    }

    #[tokio::test]
    async fn restore_refuses_when_name_is_taken() {
        let (state, session, family_id) = get_test_state();
        let tag = {
            let connection = state.db_connection.lock().unwrap();
            insert_test_tag(family_id, "groceries", &connection)
        };

        delete_tag_endpoint(State(state.clone()), Extension(session.clone()), Path(tag.id))
            .await
            .unwrap();

        {
            let connection = state.db_connection.lock().unwrap();
            insert_test_tag(family_id, "groceries", &connection);
        }

        let result = restore_tag_endpoint(State(state), Extension(session), Path(tag.id)).await;

        assert!(matches!(result, Err(Error::DuplicateTagName(_))));
    }
}
