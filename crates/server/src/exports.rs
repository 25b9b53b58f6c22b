//! Share/export endpoints.
//!
//! Formatting only: everything here renders the event's stored inputs and
//! the calculation result without altering any number.

use std::collections::BTreeMap;

use api_types::export::ShareView;
use api_types::group::MemberView;
use api_types::split::SplitResult;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use uuid::Uuid;

use crate::{ServerError, event, server::ServerState, user};

struct ExportInput {
    event: event::Model,
    participants: Vec<MemberView>,
    payments: BTreeMap<Uuid, i64>,
    result: SplitResult,
    symbol: &'static str,
}

async fn load(
    state: &ServerState,
    group_id: &str,
    event_id: &str,
    username: &str,
) -> Result<ExportInput, ServerError> {
    let event = event::find_in_group(&state.db, group_id, event_id, username).await?;
    let participants = event::parse_participants(&event)?;
    let payments: BTreeMap<Uuid, i64> = serde_json::from_str(&event.payments)?;
    // Use the cached result when present, otherwise compute on the fly
    // without persisting anything.
    let result = match event::parse_result(&event)? {
        Some(result) => result,
        None => event::compute(&event)?,
    };
    let symbol = event::parse_currency(&event)?.symbol();

    Ok(ExportInput {
        event,
        participants,
        payments,
        result,
        symbol,
    })
}

fn member_name(participants: &[MemberView], index: usize) -> String {
    participants
        .get(index)
        .map(|m| m.name.clone())
        .unwrap_or_else(|| format!("#{}", index + 1))
}

fn has_recorded_payments(payments: &BTreeMap<Uuid, i64>) -> bool {
    payments.values().any(|amount| *amount > 0)
}

/// Tip rate as a whole percentage, avoiding float-representation noise in
/// the rendered text (0.1 * 100 is not exactly 10 in f64).
fn percent(rate: f64) -> i64 {
    (rate * 100.0).round() as i64
}

fn share_text(input: &ExportInput) -> String {
    let ExportInput {
        event,
        participants,
        payments,
        result,
        symbol,
    } = input;

    let mut lines = vec![
        format!("Split: {}", event.name),
        format!("{} people, total {}{}", participants.len(), event.total, symbol),
    ];
    if event.tip_rate > 0.0 {
        let tip = engine::tip_amount(event.total, event.tip_rate);
        lines.push(format!("Tip ({}%): {}{}", percent(event.tip_rate), tip, symbol));
    }
    if !event.memo.is_empty() {
        lines.push(format!("Memo: {}", event.memo));
    }

    if has_recorded_payments(payments) {
        lines.push("Paid so far:".to_string());
        for (i, member) in participants.iter().enumerate() {
            let paid = payments.get(&member.id).copied().unwrap_or(0);
            lines.push(format!("{}: {}{}", member_name(participants, i), paid, symbol));
        }
        if result.settlements.is_empty() {
            lines.push("Nothing to settle.".to_string());
        } else {
            lines.push("Transfers:".to_string());
            for s in &result.settlements {
                lines.push(format!(
                    "{} -> {}: {}{}",
                    member_name(participants, s.from),
                    member_name(participants, s.to),
                    s.amount,
                    symbol
                ));
            }
        }
    } else {
        lines.push(format!("Per person: {}{}", result.per, symbol));
        for (i, amount) in result.details.iter().enumerate() {
            lines.push(format!("{}: {}{}", member_name(participants, i), amount, symbol));
        }
    }

    lines.join("\n")
}

fn csv_bytes(input: &ExportInput) -> Result<Vec<u8>, ServerError> {
    let ExportInput {
        event,
        participants,
        payments,
        result,
        symbol,
    } = input;

    let mut writer = csv::Writer::from_writer(vec![]);
    let write = |writer: &mut csv::Writer<Vec<u8>>, a: &str, b: &str| {
        writer
            .write_record([a, b])
            .map_err(|err| ServerError::Generic(err.to_string()))
    };

    write(&mut writer, "Item", "Value")?;
    write(&mut writer, "Currency", &event.currency)?;
    write(&mut writer, "People", &participants.len().to_string())?;
    write(&mut writer, "Total", &format!("{}{}", event.total, symbol))?;
    let tip_value = if event.tip_rate > 0.0 {
        let tip = engine::tip_amount(event.total, event.tip_rate);
        format!("{}% ({}{})", percent(event.tip_rate), tip, symbol)
    } else {
        "None".to_string()
    };
    write(&mut writer, "Tip", &tip_value)?;
    write(&mut writer, "Memo", &event.memo)?;
    write(&mut writer, "", "")?;

    if has_recorded_payments(payments) {
        write(&mut writer, "Payments", "")?;
        for (i, member) in participants.iter().enumerate() {
            let paid = payments.get(&member.id).copied().unwrap_or(0);
            write(
                &mut writer,
                &member_name(participants, i),
                &format!("{paid}{symbol}"),
            )?;
        }
        write(&mut writer, "", "")?;
        write(&mut writer, "Transfers", "")?;
        if result.settlements.is_empty() {
            write(&mut writer, "Nothing to settle", "")?;
        } else {
            for s in &result.settlements {
                write(
                    &mut writer,
                    &format!(
                        "{} -> {}",
                        member_name(participants, s.from),
                        member_name(participants, s.to)
                    ),
                    &format!("{}{}", s.amount, symbol),
                )?;
            }
        }
    } else {
        write(&mut writer, "Per person", &format!("{}{}", result.per, symbol))?;
        write(&mut writer, "", "")?;
        write(&mut writer, "Shares", "")?;
        for (i, amount) in result.details.iter().enumerate() {
            write(
                &mut writer,
                &member_name(participants, i),
                &format!("{amount}{symbol}"),
            )?;
        }
    }

    writer
        .into_inner()
        .map_err(|err| ServerError::Generic(err.to_string()))
}

/// Base64 payload for a shareable link: participant names plus the result,
/// verbatim.
fn link_payload(input: &ExportInput) -> Result<String, ServerError> {
    let names: Vec<&str> = input.participants.iter().map(|m| m.name.as_str()).collect();
    let doc = serde_json::json!({
        "event": input.event.name,
        "names": names,
        "result": input.result,
    });
    Ok(STANDARD.encode(serde_json::to_vec(&doc)?))
}

/// Handle requests for the human-readable share text and link payload.
pub async fn share(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
) -> Result<Json<ShareView>, ServerError> {
    let input = load(&state, &group_id, &event_id, &user.username).await?;

    Ok(Json(ShareView {
        text: share_text(&input),
        payload: link_payload(&input)?,
    }))
}

/// Handle requests for the tabular CSV export.
pub async fn csv_export(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, event_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let input = load(&state, &group_id, &event_id, &user.username).await?;
    let body = csv_bytes(&input)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"warikan.csv\"",
            ),
        ],
        body,
    ))
}
