use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicAccount, SignupRequest},
        extractors::{authenticate, require_role, ValidatedJson},
        password,
        repo_types::NewAccount,
        Identity, Role,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Signup, login and `me` for one role. The role reaches the handlers as an
/// extension so both namespaces share the same code.
pub fn role_routes(role: Role, state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login));

    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(role, require_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    public.merge(protected).layer(Extension(role))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let password_hash = password::hash(payload.password).await?;

    let account = match state
        .accounts
        .create(
            role,
            NewAccount {
                name: payload.name,
                email: payload.email.clone(),
                password_hash,
            },
        )
        .await
    {
        Ok(a) => a,
        Err(e) => {
            warn!(email = %payload.email, error = %e, "signup failed");
            return Err(e.into());
        }
    };

    let token = state.jwt.issue(account.id, role)?;

    info!(account_id = %account.id, email = %account.email, "account created");
    Ok(Json(AuthResponse {
        message: "Signup successful".into(),
        token,
        account_id: account.id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let account = match state.accounts.find_by_email(role, &payload.email).await? {
        Some(a) => a,
        None => {
            password::verify_dummy(payload.password).await;
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let ok = password::verify(payload.password, account.password_hash.clone()).await?;
    if !ok {
        warn!(account_id = %account.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.jwt.issue(account.id, role)?;

    info!(account_id = %account.id, email = %account.email, "account logged in");
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        account_id: account.id,
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<PublicAccount>> {
    let account = state
        .accounts
        .find_by_id(identity.role, identity.subject_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    Ok(Json(account.into()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use time::{Duration as TimeDuration, OffsetDateTime};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::app::build_app;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn app_and_state() -> (Router, AppState) {
        let state = AppState::fake();
        (build_app(state.clone()), state)
    }

    #[tokio::test]
    async fn seeker_signup_then_login_issues_matching_tokens() {
        let (app, state) = app_and_state();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/signup",
            Some(json!({"name": "Alice", "email": "a@x.com", "password": "pw123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Signup successful");
        let account_id: Uuid = body["accountId"].as_str().unwrap().parse().unwrap();
        let signup_claims = state.jwt.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(signup_claims.sub, account_id);
        assert_eq!(signup_claims.role, Role::Seeker);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "a@x.com", "password": "pw123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        let claims = state.jwt.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.role, Role::Seeker);
        assert_eq!(body["accountId"], account_id.to_string());
    }

    #[tokio::test]
    async fn duplicate_provider_signup_is_a_conflict_and_keeps_first_account() {
        let (app, _) = app_and_state();
        let (status, first) = call(
            &app,
            Method::POST,
            "/api/authprovider/signup",
            Some(json!({"name": "Bob", "email": "b@x.com", "password": "pw1"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/authprovider/signup",
            Some(json!({"name": "Mallory", "email": "B@x.com", "password": "other"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({"message": "Email already registered"}));

        let (status, login) = call(
            &app,
            Method::POST,
            "/api/authprovider/login",
            Some(json!({"email": "b@x.com", "password": "pw1"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(login["accountId"], first["accountId"]);

        let (status, me) = call(
            &app,
            Method::GET,
            "/api/authprovider/me",
            None,
            login["token"].as_str(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "Bob");
        assert_eq!(me["role"], "provider");
        assert!(me.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn same_email_may_register_once_per_role() {
        let (app, _) = app_and_state();
        let payload = json!({"name": "Sam", "email": "sam@x.com", "password": "pw"});
        let (seeker, _) = call(&app, Method::POST, "/api/auth/signup", Some(payload.clone()), None).await;
        let (provider, _) =
            call(&app, Method::POST, "/api/authprovider/signup", Some(payload), None).await;
        assert_eq!(seeker, StatusCode::OK);
        assert_eq!(provider, StatusCode::OK);
    }

    #[tokio::test]
    async fn seeker_credentials_do_not_open_the_provider_namespace() {
        let (app, _) = app_and_state();
        call(
            &app,
            Method::POST,
            "/api/auth/signup",
            Some(json!({"name": "Only", "email": "only@x.com", "password": "pw"})),
            None,
        )
        .await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/authprovider/login",
            Some(json!({"email": "only@x.com", "password": "pw"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let (app, _) = app_and_state();
        call(
            &app,
            Method::POST,
            "/api/auth/signup",
            Some(json!({"name": "Alice", "email": "a@x.com", "password": "pw123"})),
            None,
        )
        .await;

        let wrong = call(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "a@x.com", "password": "nope"})),
            None,
        )
        .await;
        let unknown = call(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "ghost@x.com", "password": "pw123"})),
            None,
        )
        .await;
        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
        assert_eq!(wrong.1, json!({"message": "Invalid credentials"}));
    }

    #[tokio::test]
    async fn concurrent_signups_resolve_to_one_account() {
        let (app, _) = app_and_state();
        let payload = json!({"name": "Racer", "email": "race@x.com", "password": "pw"});
        let (a, b) = tokio::join!(
            call(&app, Method::POST, "/api/authprovider/signup", Some(payload.clone()), None),
            call(&app, Method::POST, "/api/authprovider/signup", Some(payload.clone()), None),
        );
        let mut statuses = vec![a.0.as_u16(), b.0.as_u16()];
        statuses.sort_unstable();
        assert_eq!(statuses, vec![200, 409]);
    }

    #[tokio::test]
    async fn invalid_payloads_get_json_400() {
        let (app, _) = app_and_state();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/signup",
            Some(json!({"email": "a@x.com", "password": "pw"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name is required");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            Some(json!({"email": "a@x.com", "password": ""})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password is required");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_bad_and_expired_tokens() {
        let (app, state) = app_and_state();
        let (status, missing) = call(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, garbage) =
            call(&app, Method::GET, "/api/auth/me", None, Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let expired = state
            .jwt
            .issue_at(
                Uuid::new_v4(),
                Role::Seeker,
                OffsetDateTime::now_utc() - TimeDuration::hours(2),
            )
            .unwrap();
        let (status, expired) =
            call(&app, Method::GET, "/api/auth/me", None, Some(expired.as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(missing, garbage);
        assert_eq!(garbage, expired);
    }

    #[tokio::test]
    async fn role_gate_forbids_the_other_namespace() {
        let (app, _) = app_and_state();
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/authprovider/signup",
            Some(json!({"name": "Bob", "email": "b@x.com", "password": "pw1"})),
            None,
        )
        .await;
        let provider_token = body["token"].as_str().unwrap().to_string();

        let (status, body) =
            call(&app, Method::GET, "/api/auth/me", None, Some(provider_token.as_str())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied for this role");
    }

    #[tokio::test]
    async fn token_outlives_its_account() {
        let (app, state) = app_and_state();
        let orphan = state.jwt.issue(Uuid::new_v4(), Role::Seeker).unwrap();
        let (status, body) = call(&app, Method::GET, "/api/auth/me", None, Some(orphan.as_str())).await;
        // Middleware accepts the token; only the lookup fails.
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Account not found");
    }
}
