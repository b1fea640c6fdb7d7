use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
            RegisteredResponse, SessionToken,
        },
        jwt::{expired_session_cookie, session_cookie},
        pages,
        services::{authenticate, refresh_session, register as register_user},
    },
    error::{ApiJson, AppError, Envelope},
    state::AppState,
};

type SetCookie = [(header::HeaderName, String); 1];

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/refresh", post(refresh))
        .route("/logout", get(logout))
}

async fn register_page() -> Html<&'static str> {
    Html(pages::REGISTER)
}

async fn login_page() -> Html<&'static str> {
    Html(pages::LOGIN)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<RegisteredResponse>>), AppError> {
    let user = register_user(
        &state,
        &payload.name,
        &payload.email,
        &payload.password,
        &payload.confirm_password,
    )
    .await?;

    let body = Envelope::success(RegisteredResponse {
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })
    .with_message("Registration Successfully");
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(SetCookie, Json<Envelope<AuthResponse>>), AppError> {
    let (user, session) = authenticate(&state, &payload.email, &payload.password).await?;

    let cookie = session_cookie(&session.access_token, Duration::from_secs(session.expires_in));
    let body = Envelope::success(AuthResponse {
        session,
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })
    .with_message("Login Successfully");
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<(SetCookie, Json<Envelope<SessionToken>>), AppError> {
    let session = refresh_session(&state, &payload.refresh_token)?;
    let cookie = session_cookie(&session.access_token, Duration::from_secs(session.expires_in));
    Ok(([(header::SET_COOKIE, cookie)], Json(Envelope::success(session))))
}

pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(Envelope::message("Logged out")),
    )
}
