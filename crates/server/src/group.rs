//! Group entity and endpoints.
//!
//! A group is the long-lived container: a name, an owner and a member list.
//! Members are stored as a single JSON array; appending adds to it and any
//! removal rewrites the whole array. Deleting a group cascades to its events.

use api_types::group::{Group, GroupNew, MemberAdd, MemberView, MembersReplace};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::{ActiveValue, ColumnTrait, ConnectionTrait, QueryFilter, entity::prelude::*};
use uuid::Uuid;

use crate::{ServerError, event, server::ServerState, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub owner: String,
    /// JSON array of `{id, name}` member records.
    pub members: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event::Entity")]
    Events,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Looks a group up and checks the requester owns it.
pub(crate) async fn find_owned<C: ConnectionTrait>(
    db: &C,
    group_id: &str,
    username: &str,
) -> Result<Model, ServerError> {
    let group = Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::NotFound("group not exists".to_string()))?;
    if group.owner != username {
        return Err(ServerError::Forbidden("not the group owner".to_string()));
    }
    Ok(group)
}

pub(crate) fn parse_members(group: &Model) -> Result<Vec<MemberView>, ServerError> {
    Ok(serde_json::from_str(&group.members)?)
}

fn view(group: Model) -> Result<Group, ServerError> {
    let members = parse_members(&group)?;
    Ok(Group {
        id: group.id,
        name: group.name,
        owner: group.owner,
        members,
        created_at: group.created_at,
    })
}

/// Handle requests for creating a new group.
///
/// The owner becomes the first member, mirroring how a group is usable for
/// splitting right after creation.
pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<Json<Group>, ServerError> {
    let members = vec![MemberView {
        id: Uuid::new_v4(),
        name: user.username.clone(),
    }];

    let model = Model {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        owner: user.username,
        members: serde_json::to_string(&members)?,
        created_at: chrono::Utc::now(),
    };
    let active = ActiveModel {
        id: ActiveValue::Set(model.id.clone()),
        name: ActiveValue::Set(model.name.clone()),
        owner: ActiveValue::Set(model.owner.clone()),
        members: ActiveValue::Set(model.members.clone()),
        created_at: ActiveValue::Set(model.created_at),
    };
    active.insert(&state.db).await?;

    view(model).map(Json)
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, ServerError> {
    let group = find_owned(&state.db, &group_id, &user.username).await?;
    view(group).map(Json)
}

/// Deletes a group and all of its events.
pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let group = find_owned(&state.db, &group_id, &user.username).await?;

    event::Entity::delete_many()
        .filter(event::Column::GroupId.eq(group.id.clone()))
        .exec(&state.db)
        .await?;
    Entity::delete_by_id(group.id).exec(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a single member to the group.
pub async fn add_member(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<MemberAdd>,
) -> Result<Json<Group>, ServerError> {
    let group = find_owned(&state.db, &group_id, &user.username).await?;

    let mut members = parse_members(&group)?;
    members.push(MemberView {
        id: Uuid::new_v4(),
        name: payload.name,
    });
    let updated = store_members(&state.db, group, members).await?;

    view(updated).map(Json)
}

/// Replaces the member set wholesale. This is the only removal path.
pub async fn replace_members(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<MembersReplace>,
) -> Result<Json<Group>, ServerError> {
    let group = find_owned(&state.db, &group_id, &user.username).await?;
    let updated = store_members(&state.db, group, payload.members).await?;

    view(updated).map(Json)
}

async fn store_members<C: ConnectionTrait>(
    db: &C,
    group: Model,
    members: Vec<MemberView>,
) -> Result<Model, ServerError> {
    let encoded = serde_json::to_string(&members)?;
    let active = ActiveModel {
        id: ActiveValue::Set(group.id.clone()),
        members: ActiveValue::Set(encoded.clone()),
        ..Default::default()
    };
    active.update(db).await?;

    Ok(Model {
        members: encoded,
        ..group
    })
}
