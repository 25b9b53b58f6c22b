use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::{event, exports, group, user};

#[derive(Clone)]
pub struct ServerState {
    pub db: DatabaseConnection,
}

async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Username.eq(auth_header.username()))
        .filter(user::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/groups", post(group::create))
        .route(
            "/groups/{group_id}",
            get(group::get).delete(group::delete),
        )
        .route(
            "/groups/{group_id}/members",
            post(group::add_member).put(group::replace_members),
        )
        .route(
            "/groups/{group_id}/events",
            post(event::create).get(event::list),
        )
        .route(
            "/groups/{group_id}/events/{event_id}",
            get(event::get)
                .delete(event::delete)
                .patch(event::update),
        )
        .route(
            "/groups/{group_id}/events/{event_id}/payments",
            put(event::replace_payments),
        )
        .route(
            "/groups/{group_id}/events/{event_id}/calculate",
            post(event::calculate),
        )
        .route(
            "/groups/{group_id}/events/{event_id}/share",
            get(exports::share),
        )
        .route(
            "/groups/{group_id}/events/{event_id}/export/csv",
            get(exports::csv_export),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { db };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, header};
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use http_body_util::BodyExt;
    use migration::MigratorTrait;
    use sea_orm::{ActiveModelTrait, ActiveValue};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn test_state() -> ServerState {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();

        let alice = user::ActiveModel {
            username: ActiveValue::Set("alice".to_string()),
            password: ActiveValue::Set("password".to_string()),
        };
        alice.insert(&db).await.unwrap();

        ServerState { db }
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request {
        let builder = Request::builder().method(method).uri(uri).header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("alice:password")),
        );
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(state: &ServerState, req: Request) -> (StatusCode, Value) {
        let res = router(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn create_group(state: &ServerState, names: &[&str]) -> Value {
        let (status, group) = send(
            state,
            request(Method::POST, "/groups", Some(json!({"name": "Trip"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let id = group["id"].as_str().unwrap().to_string();
        let mut latest = group;
        for name in names {
            let (status, updated) = send(
                state,
                request(
                    Method::POST,
                    &format!("/groups/{id}/members"),
                    Some(json!({"name": name})),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            latest = updated;
        }
        latest
    }

    async fn create_event(state: &ServerState, group_id: &str) -> Value {
        let (status, event) = send(
            state,
            request(
                Method::POST,
                &format!("/groups/{group_id}/events"),
                Some(json!({"name": "Dinner", "memo": "welcome party"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        event
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = test_state().await;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/groups")
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode("alice:wrong")),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"name": "Trip"}).to_string()))
            .unwrap();

        let res = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_group_seeds_owner_as_member() {
        let state = test_state().await;
        let group = create_group(&state, &[]).await;

        assert_eq!(group["owner"], "alice");
        assert_eq!(group["members"].as_array().unwrap().len(), 1);
        assert_eq!(group["members"][0]["name"], "alice");
    }

    #[tokio::test]
    async fn members_append_and_full_rewrite() {
        let state = test_state().await;
        let group = create_group(&state, &["bob", "carol"]).await;
        let id = group["id"].as_str().unwrap();
        assert_eq!(group["members"].as_array().unwrap().len(), 3);

        // Removal is a wholesale replacement of the member array.
        let remaining = json!({"members": [group["members"][0], group["members"][1]]});
        let (status, rewritten) = send(
            &state,
            request(Method::PUT, &format!("/groups/{id}/members"), Some(remaining)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rewritten["members"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn even_split_calculation_is_cached_on_the_event() {
        let state = test_state().await;
        let group = create_group(&state, &["bob", "carol"]).await;
        let group_id = group["id"].as_str().unwrap().to_string();
        let event = create_event(&state, &group_id).await;
        let event_id = event["id"].as_str().unwrap().to_string();
        let payer_id = event["participants"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            request(
                Method::PATCH,
                &format!("/groups/{group_id}/events/{event_id}"),
                Some(json!({"total": 9000})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &state,
            request(
                Method::PUT,
                &format!("/groups/{group_id}/events/{event_id}/payments"),
                Some(json!({"payments": {(payer_id.as_str()): 9000}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, result) = send(
            &state,
            request(
                Method::POST,
                &format!("/groups/{group_id}/events/{event_id}/calculate"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["per"], 3000);
        assert_eq!(result["details"], json!([3000, 3000, 3000]));
        assert_eq!(
            result["settlements"],
            json!([
                {"from": 1, "to": 0, "amount": 3000},
                {"from": 2, "to": 0, "amount": 3000},
            ])
        );

        let (status, fetched) = send(
            &state,
            request(
                Method::GET,
                &format!("/groups/{group_id}/events/{event_id}"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["result"], result);
    }

    #[tokio::test]
    async fn weighted_split_keeps_sum_invariant_over_http() {
        let state = test_state().await;
        let group = create_group(&state, &["bob", "carol"]).await;
        let group_id = group["id"].as_str().unwrap().to_string();
        let event = create_event(&state, &group_id).await;
        let event_id = event["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            request(
                Method::PATCH,
                &format!("/groups/{group_id}/events/{event_id}"),
                Some(json!({"total": 100, "weights": {"0": 100.0, "1": 0.0, "2": 0.0}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, result) = send(
            &state,
            request(
                Method::POST,
                &format!("/groups/{group_id}/events/{event_id}/calculate"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["details"], json!([100, 0, 0]));
    }

    #[tokio::test]
    async fn changing_inputs_drops_the_cached_result() {
        let state = test_state().await;
        let group = create_group(&state, &["bob"]).await;
        let group_id = group["id"].as_str().unwrap().to_string();
        let event = create_event(&state, &group_id).await;
        let event_id = event["id"].as_str().unwrap().to_string();
        let payer_id = event["participants"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            request(
                Method::PATCH,
                &format!("/groups/{group_id}/events/{event_id}"),
                Some(json!({"total": 1000})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, result) = send(
            &state,
            request(
                Method::POST,
                &format!("/groups/{group_id}/events/{event_id}/calculate"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["per"], 500);

        let (status, updated) = send(
            &state,
            request(
                Method::PATCH,
                &format!("/groups/{group_id}/events/{event_id}"),
                Some(json!({"total": 2000})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["result"], Value::Null);

        // The share document must agree with itself: the rendered total
        // and the shares both come from the current inputs.
        let (status, share) = send(
            &state,
            request(
                Method::GET,
                &format!("/groups/{group_id}/events/{event_id}/share"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = share["text"].as_str().unwrap();
        assert!(text.contains("total 2000"));
        assert!(text.contains("Per person: 1000"));

        // Recording payments invalidates it too.
        let (status, _) = send(
            &state,
            request(
                Method::POST,
                &format!("/groups/{group_id}/events/{event_id}/calculate"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, updated) = send(
            &state,
            request(
                Method::PUT,
                &format!("/groups/{group_id}/events/{event_id}/payments"),
                Some(json!({"payments": {(payer_id.as_str()): 2000}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["result"], Value::Null);
    }

    #[tokio::test]
    async fn deleting_a_group_cascades_to_events() {
        let state = test_state().await;
        let group = create_group(&state, &["bob"]).await;
        let group_id = group["id"].as_str().unwrap().to_string();
        create_event(&state, &group_id).await;

        let (status, _) = send(
            &state,
            request(Method::DELETE, &format!("/groups/{group_id}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let leftovers = event::Entity::find().all(&state.db).await.unwrap();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn share_and_csv_exports_render_without_persisted_result() {
        let state = test_state().await;
        let group = create_group(&state, &["bob"]).await;
        let group_id = group["id"].as_str().unwrap().to_string();
        let event = create_event(&state, &group_id).await;
        let event_id = event["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &state,
            request(
                Method::PATCH,
                &format!("/groups/{group_id}/events/{event_id}"),
                Some(json!({"total": 1000})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, share) = send(
            &state,
            request(
                Method::GET,
                &format!("/groups/{group_id}/events/{event_id}/share"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = share["text"].as_str().unwrap();
        assert!(text.contains("Split: Dinner"));
        assert!(text.contains("Per person: 500"));

        let res = router(state.clone())
            .oneshot(request(
                Method::GET,
                &format!("/groups/{group_id}/events/{event_id}/export/csv"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/csv");
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let csv = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(csv.starts_with("Item,Value"));
    }

    #[tokio::test]
    async fn foreign_group_is_not_found() {
        let state = test_state().await;
        let (status, _) = send(
            &state,
            request(Method::GET, "/groups/no-such-group", None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
