//! Event entity and endpoints.
//!
//! An event is one shared expense inside a group. It carries a copy of the
//! member list taken at creation time, the calculation inputs (total, memo,
//! rounding, tip, currency, fixed amounts, weights), the payments recorded so
//! far and the cached result of the last calculation. Collection-valued
//! fields are stored as JSON text so the row mirrors the document the clients
//! exchange.

use std::collections::BTreeMap;

use api_types::event::{EventList, EventNew, EventSummary, EventUpdate, EventView, PaymentsReplace};
use api_types::group::MemberView;
use api_types::split::{SettlementView, SplitResult};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectionTrait, QueryFilter, QueryOrder, entity::prelude::*,
};
use uuid::Uuid;

use crate::{ServerError, group, server::ServerState, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub name: String,
    /// JSON copy of the group member list at event creation.
    pub participants: String,
    pub total: i64,
    pub memo: String,
    pub rounding: String,
    pub tip_rate: f64,
    pub currency: String,
    /// JSON array of optional fixed amounts, one slot per participant.
    pub fixed_amounts: String,
    /// JSON object: participant index → share weight.
    pub weights: String,
    /// JSON object: participant id → amount paid.
    pub payments: String,
    /// JSON cache of the last calculation, `{per, details, settlements, total}`.
    pub result: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group::Entity",
        from = "Column::GroupId",
        to = "super::group::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Groups,
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn parse_participants(event: &Model) -> Result<Vec<MemberView>, ServerError> {
    Ok(serde_json::from_str(&event.participants)?)
}

pub(crate) fn parse_result(event: &Model) -> Result<Option<SplitResult>, ServerError> {
    match &event.result {
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        None => Ok(None),
    }
}

// The rounding and currency columns only ever hold codes written through
// the typed request enums; anything else is a damaged row, not bad input.
fn parse_rounding(event: &Model) -> Result<engine::Rounding, ServerError> {
    engine::Rounding::try_from(event.rounding.as_str())
        .map_err(|err| ServerError::Corrupt(err.to_string()))
}

pub(crate) fn parse_currency(event: &Model) -> Result<engine::Currency, ServerError> {
    engine::Currency::try_from(event.currency.as_str())
        .map_err(|err| ServerError::Corrupt(err.to_string()))
}

/// Runs the core on the event's stored inputs.
///
/// Participant ids are mapped to contiguous indices in participant order
/// before calling the engine; the result refers back to those indices.
pub(crate) fn compute(event: &Model) -> Result<SplitResult, ServerError> {
    let participants = parse_participants(event)?;
    let rounding = parse_rounding(event)?;
    let weights: BTreeMap<usize, f64> = serde_json::from_str(&event.weights)?;
    let payments: BTreeMap<Uuid, i64> = serde_json::from_str(&event.payments)?;

    let mut fixed: Vec<Option<i64>> = serde_json::from_str(&event.fixed_amounts)?;
    fixed.resize(participants.len(), None);

    let total = event.total + engine::tip_amount(event.total, event.tip_rate);
    let allocation = engine::allocate(total, participants.len(), rounding, &fixed, &weights);

    let paid: Vec<Option<f64>> = participants
        .iter()
        .map(|member| payments.get(&member.id).map(|amount| *amount as f64))
        .collect();
    let settlements = engine::settle(&allocation.details, &paid)
        .into_iter()
        .map(|t| SettlementView {
            from: t.from,
            to: t.to,
            amount: t.amount,
        })
        .collect();

    Ok(SplitResult {
        per: allocation.per_share,
        details: allocation.details,
        settlements,
        total,
    })
}

pub(crate) async fn find_in_group<C: ConnectionTrait>(
    db: &C,
    group_id: &str,
    event_id: &str,
    username: &str,
) -> Result<Model, ServerError> {
    group::find_owned(db, group_id, username).await?;

    let event = Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::NotFound("event not exists".to_string()))?;
    if event.group_id != group_id {
        return Err(ServerError::NotFound("event not exists".to_string()));
    }
    Ok(event)
}

fn view(event: Model) -> Result<EventView, ServerError> {
    let participants = parse_participants(&event)?;
    let result = parse_result(&event)?;

    let rounding = match parse_rounding(&event)? {
        engine::Rounding::Floor => api_types::Rounding::Floor,
        engine::Rounding::Ceil => api_types::Rounding::Ceil,
        engine::Rounding::Nearest => api_types::Rounding::Nearest,
    };
    let currency = match parse_currency(&event)? {
        engine::Currency::Jpy => api_types::Currency::Jpy,
        engine::Currency::Usd => api_types::Currency::Usd,
        engine::Currency::Eur => api_types::Currency::Eur,
        engine::Currency::Gbp => api_types::Currency::Gbp,
        engine::Currency::Krw => api_types::Currency::Krw,
        engine::Currency::Cny => api_types::Currency::Cny,
    };

    Ok(EventView {
        id: event.id,
        name: event.name,
        participants,
        total: event.total,
        memo: event.memo,
        rounding,
        tip_rate: event.tip_rate,
        currency,
        fixed_amounts: serde_json::from_str(&event.fixed_amounts)?,
        weights: serde_json::from_str(&event.weights)?,
        payments: serde_json::from_str(&event.payments)?,
        result,
        created_at: event.created_at,
    })
}

/// Handle requests for creating a new event.
///
/// The group's current member list is copied onto the event; later group
/// edits do not touch events that were already created.
pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<EventNew>,
) -> Result<Json<EventView>, ServerError> {
    let group = group::find_owned(&state.db, &group_id, &user.username).await?;
    let members = group::parse_members(&group)?;

    let model = Model {
        id: Uuid::new_v4().to_string(),
        group_id: group.id,
        name: payload.name,
        participants: group.members,
        total: 0,
        memo: payload.memo.unwrap_or_default(),
        rounding: engine::Rounding::default().as_str().to_string(),
        tip_rate: 0.0,
        currency: engine::Currency::default().code().to_string(),
        fixed_amounts: serde_json::to_string(&vec![None::<i64>; members.len()])?,
        weights: "{}".to_string(),
        payments: "{}".to_string(),
        result: None,
        created_at: chrono::Utc::now(),
    };

    let active = ActiveModel {
        id: ActiveValue::Set(model.id.clone()),
        group_id: ActiveValue::Set(model.group_id.clone()),
        name: ActiveValue::Set(model.name.clone()),
        participants: ActiveValue::Set(model.participants.clone()),
        total: ActiveValue::Set(model.total),
        memo: ActiveValue::Set(model.memo.clone()),
        rounding: ActiveValue::Set(model.rounding.clone()),
        tip_rate: ActiveValue::Set(model.tip_rate),
        currency: ActiveValue::Set(model.currency.clone()),
        fixed_amounts: ActiveValue::Set(model.fixed_amounts.clone()),
        weights: ActiveValue::Set(model.weights.clone()),
        payments: ActiveValue::Set(model.payments.clone()),
        result: ActiveValue::Set(None),
        created_at: ActiveValue::Set(model.created_at),
    };
    active.insert(&state.db).await?;

    view(model).map(Json)
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<EventList>, ServerError> {
    group::find_owned(&state.db, &group_id, &user.username).await?;

    let events = Entity::find()
        .filter(Column::GroupId.eq(group_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|event| EventSummary {
            id: event.id,
            name: event.name,
            total: event.total,
            created_at: event.created_at,
        })
        .collect();

    Ok(Json(EventList { events }))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
) -> Result<Json<EventView>, ServerError> {
    let event = find_in_group(&state.db, &group_id, &event_id, &user.username).await?;
    view(event).map(Json)
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    let event = find_in_group(&state.db, &group_id, &event_id, &user.username).await?;
    Entity::delete_by_id(event.id).exec(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Updates the calculation inputs. Absent fields keep their stored value.
/// Any cached result refers to the old inputs and is dropped.
pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
    Json(payload): Json<EventUpdate>,
) -> Result<Json<EventView>, ServerError> {
    let mut event = find_in_group(&state.db, &group_id, &event_id, &user.username).await?;

    if let Some(total) = payload.total {
        event.total = total;
    }
    if let Some(memo) = payload.memo {
        event.memo = memo;
    }
    if let Some(rounding) = payload.rounding {
        event.rounding = rounding.as_str().to_string();
    }
    if let Some(tip_rate) = payload.tip_rate {
        event.tip_rate = tip_rate;
    }
    if let Some(currency) = payload.currency {
        event.currency = currency.as_str().to_string();
    }
    if let Some(fixed) = payload.fixed_amounts {
        event.fixed_amounts = serde_json::to_string(&fixed)?;
    }
    if let Some(weights) = payload.weights {
        event.weights = serde_json::to_string(&weights)?;
    }
    event.result = None;

    let active = ActiveModel {
        id: ActiveValue::Set(event.id.clone()),
        total: ActiveValue::Set(event.total),
        memo: ActiveValue::Set(event.memo.clone()),
        rounding: ActiveValue::Set(event.rounding.clone()),
        tip_rate: ActiveValue::Set(event.tip_rate),
        currency: ActiveValue::Set(event.currency.clone()),
        fixed_amounts: ActiveValue::Set(event.fixed_amounts.clone()),
        weights: ActiveValue::Set(event.weights.clone()),
        result: ActiveValue::Set(None),
        ..Default::default()
    };
    active.update(&state.db).await?;

    view(event).map(Json)
}

/// Replaces the payments map wholesale (last write wins). Any cached
/// result refers to the old payments and is dropped.
pub async fn replace_payments(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
    Json(payload): Json<PaymentsReplace>,
) -> Result<Json<EventView>, ServerError> {
    let mut event = find_in_group(&state.db, &group_id, &event_id, &user.username).await?;
    event.payments = serde_json::to_string(&payload.payments)?;
    event.result = None;

    let active = ActiveModel {
        id: ActiveValue::Set(event.id.clone()),
        payments: ActiveValue::Set(event.payments.clone()),
        result: ActiveValue::Set(None),
        ..Default::default()
    };
    active.update(&state.db).await?;

    view(event).map(Json)
}

/// Runs the allocator and settlement engine and caches the result.
pub async fn calculate(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
) -> Result<Json<SplitResult>, ServerError> {
    let event = find_in_group(&state.db, &group_id, &event_id, &user.username).await?;
    let result = compute(&event)?;

    let active = ActiveModel {
        id: ActiveValue::Set(event.id),
        result: ActiveValue::Set(Some(serde_json::to_string(&result)?)),
        ..Default::default()
    };
    active.update(&state.db).await?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(rounding: &str, currency: &str) -> Model {
        Model {
            id: "e1".to_string(),
            group_id: "g1".to_string(),
            name: "Dinner".to_string(),
            participants: "[]".to_string(),
            total: 0,
            memo: String::new(),
            rounding: rounding.to_string(),
            tip_rate: 0.0,
            currency: currency.to_string(),
            fixed_amounts: "[]".to_string(),
            weights: "{}".to_string(),
            payments: "{}".to_string(),
            result: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn damaged_rounding_code_is_reported_as_corrupt() {
        let event = stored("banker", "JPY");
        assert!(matches!(compute(&event), Err(ServerError::Corrupt(_))));
        assert!(matches!(view(event), Err(ServerError::Corrupt(_))));
    }

    #[test]
    fn damaged_currency_code_is_reported_as_corrupt() {
        let event = stored("round", "XXX");
        assert!(matches!(view(event), Err(ServerError::Corrupt(_))));
    }

    #[test]
    fn valid_codes_pass_through() {
        let event = stored("floor", "usd");
        let Ok(view) = view(event) else {
            panic!("valid codes should parse");
        };
        assert_eq!(view.rounding, api_types::Rounding::Floor);
        assert_eq!(view.currency, api_types::Currency::Usd);
    }
}
