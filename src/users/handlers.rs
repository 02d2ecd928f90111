use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        create_fields, profile_fields, CreateFormResponse, CreateUserRequest, EditFormResponse,
        FlashRedirect, IndexResponse, ShowResponse, UpdateUserRequest,
    },
    filters::{ListQuery, RawFilters},
    services::{self, INDEX_PATH},
    validation::{validate_create, validate_update},
};
use crate::{
    auth::{
        extractors::Actor,
        policy::{authorize, Ability},
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user-management", get(index).post(create))
        .route("/user-management/create", get(create_form))
        .route(
            "/user-management/:id",
            get(show).patch(update).delete(destroy),
        )
        .route("/user-management/:id/edit", get(edit_form))
}

/// Unparseable ids cannot name a row, so they are reported as missing.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

/// Bodies are read only after the caller is authorized.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn index(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(raw): Query<RawFilters>,
) -> Result<Json<IndexResponse>, AppError> {
    authorize(&actor, Ability::ViewAny, None)?;

    let filters = ListQuery::from_raw(&raw, &state.config.listing);
    let users = services::list_users(state.store.as_ref(), &filters).await?;
    Ok(Json(IndexResponse { users, filters }))
}

#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn show(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<ShowResponse>, AppError> {
    let user = services::find_user(state.store.as_ref(), parse_id(&id)?).await?;
    authorize(&actor, Ability::View, Some(&user))?;
    Ok(Json(ShowResponse { user }))
}

#[instrument(skip(actor), fields(actor_id = %actor.id))]
pub async fn create_form(Actor(actor): Actor) -> Result<Json<CreateFormResponse>, AppError> {
    authorize(&actor, Ability::Create, None)?;
    Ok(Json(CreateFormResponse {
        action: INDEX_PATH,
        method: "POST",
        fields: create_fields(),
    }))
}

#[instrument(skip(state, actor, payload), fields(actor_id = %actor.id))]
pub async fn create(
    State(state): State<AppState>,
    Actor(actor): Actor,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    authorize(&actor, Ability::Create, None)?;

    let input = validate_create(state.store.as_ref(), json_body(payload)?).await?;
    services::create_user(state.store.as_ref(), input, false).await?;
    Ok(FlashRedirect::to_index("User created successfully."))
}

#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn edit_form(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<EditFormResponse>, AppError> {
    let user = services::find_user(state.store.as_ref(), parse_id(&id)?).await?;
    authorize(&actor, Ability::Update, Some(&user))?;
    Ok(Json(EditFormResponse {
        action: format!("{INDEX_PATH}/{}", user.id),
        method: "PATCH",
        user,
        fields: profile_fields(),
    }))
}

#[instrument(skip(state, actor, payload), fields(actor_id = %actor.id))]
pub async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<FlashRedirect, AppError> {
    let target = services::find_user(state.store.as_ref(), parse_id(&id)?).await?;
    authorize(&actor, Ability::Update, Some(&target))?;

    let changes = validate_update(state.store.as_ref(), target.id, json_body(payload)?).await?;
    services::update_user(state.store.as_ref(), target.id, changes).await?;
    Ok(FlashRedirect::to_index("User updated successfully."))
}

#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn destroy(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let target = services::find_user(state.store.as_ref(), parse_id(&id)?).await?;
    authorize(&actor, Ability::Delete, Some(&target))?;

    services::delete_user(state.store.as_ref(), target.id).await?;
    Ok(FlashRedirect::to_index("User deleted successfully."))
}
