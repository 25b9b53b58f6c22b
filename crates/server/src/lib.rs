use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;
use sea_orm::DbErr;

use serde::Serialize;
pub use server::{run, run_with_listener, spawn_with_listener};

mod event;
mod exports;
mod group;
mod server;
mod user;

pub mod types {
    pub mod group {
        pub use api_types::group::{Group, GroupNew, MemberAdd, MemberView, MembersReplace};
    }

    pub mod event {
        pub use api_types::event::{
            EventList, EventNew, EventSummary, EventUpdate, EventView, PaymentsReplace,
        };
    }

    pub mod split {
        pub use api_types::split::{SettlementView, SplitResult};
        pub use engine::{Allocation, Rounding, Transfer};
    }

    pub mod export {
        pub use api_types::export::ShareView;
    }
}

pub enum ServerError {
    Engine(EngineError),
    Database(DbErr),
    NotFound(String),
    Forbidden(String),
    /// A stored JSON column failed to parse; the row is damaged.
    Corrupt(String),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_error(err: &ServerError) -> StatusCode {
    match err {
        ServerError::Engine(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Database(_) | ServerError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServerError::Generic(_) => StatusCode::BAD_REQUEST,
    }
}

fn message_for_error(err: ServerError) -> String {
    match err {
        ServerError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        ServerError::Corrupt(detail) => {
            tracing::error!("corrupt record: {detail}");
            "internal server error".to_string()
        }
        ServerError::Engine(err) => err.to_string(),
        ServerError::NotFound(msg) | ServerError::Forbidden(msg) | ServerError::Generic(msg) => msg,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = status_for_error(&self);
        let error = message_for_error(self);

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<DbErr> for ServerError {
    fn from(value: DbErr) -> Self {
        Self::Database(value)
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Corrupt(value.to_string())
    }
}
