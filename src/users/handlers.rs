use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument};

use crate::{
    openapi::ErrorResponse,
    auth::{
        expired_session_cookie,
        extractors::{ClientIp, SessionUser},
        session_cookie,
    },
    error::{AppError, AppResult},
    state::AppState,
    users::{
        dto::{
            ChangePasswordRequest, EmailQuery, ForgotPasswordRequest, LoginRequest, LoginResponse,
            MeResponse, MessageResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
            UpdateUserRequest, UsernameQuery,
        },
        repo_types::Role,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route("/users/getUserByEmail", get(get_user_by_email))
        .route("/users/getUserByUsername", get(get_user_by_username))
        .route("/users/update", put(update_user))
        .route("/users/delete", delete(delete_user))
        .route("/users/changePassword", put(change_password))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/me", get(me))
        .route("/users/forgot-password", post(forgot_password))
        .route("/users/reset-password", post(reset_password))
}

#[utoipa::path(get, path = "/users", tag = "users", responses((status = 200, description = "All users", body = [PublicUser])))]
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<PublicUser>>> {
    let users = services::list(&state).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[utoipa::path(
    get, path = "/users/getUserByEmail", tag = "users",
    params(EmailQuery),
    responses(
        (status = 200, description = "User found", body = PublicUser),
        (status = 400, description = "Blank email", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Query(q): Query<EmailQuery>,
) -> AppResult<Json<PublicUser>> {
    let user = services::get_by_email(&state, &q.email).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get, path = "/users/getUserByUsername", tag = "users",
    params(UsernameQuery),
    responses(
        (status = 200, description = "User found", body = PublicUser),
        (status = 400, description = "Blank username", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user_by_username(
    State(state): State<AppState>,
    Query(q): Query<UsernameQuery>,
) -> AppResult<Json<PublicUser>> {
    let user = services::get_by_username(&state, &q.username).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post, path = "/users", tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = PublicUser),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Admin role requires an admin session", body = ErrorResponse),
        (status = 409, description = "Username or email taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, session, payload))]
pub async fn register(
    State(state): State<AppState>,
    session: Option<SessionUser>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    if payload.role == Some(Role::Admin) && !session.as_ref().is_some_and(SessionUser::is_admin) {
        return Err(AppError::Forbidden(
            "Only an admin can create admin accounts".into(),
        ));
    }
    let user = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    post, path = "/users/login", tag = "session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse)
    )
)]
#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    if state.login_limiter.check(ip).is_err() {
        return Err(AppError::TooManyRequests(
            "Too many login attempts, please try again later".into(),
        ));
    }

    let (token, role) = services::authenticate(&state, &payload.username, &payload.password).await?;
    let jar = jar.add(session_cookie(token.clone()));
    Ok((
        jar,
        Json(LoginResponse {
            token,
            username: payload.username.trim().to_string(),
            role,
        }),
    ))
}

#[utoipa::path(post, path = "/users/logout", tag = "session", responses((status = 200, description = "Session cookie cleared", body = MessageResponse)))]
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(expired_session_cookie());
    info!("session cookie cleared");
    (jar, Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(
    get, path = "/users/me", tag = "session",
    responses((status = 200, description = "Current session", body = MeResponse), (status = 401, description = "No valid session", body = ErrorResponse))
)]
#[instrument(skip(session))]
pub async fn me(session: SessionUser) -> Json<MeResponse> {
    Json(MeResponse {
        username: session.username,
        role: session.role,
    })
}

#[utoipa::path(
    put, path = "/users/update", tag = "users",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = PublicUser),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not your account", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
#[instrument(skip(state, session, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    session: SessionUser,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    session.ensure_can_act_for(payload.username.trim())?;
    if payload.role.is_some() && !session.is_admin() {
        return Err(AppError::Forbidden("Only an admin can change roles".into()));
    }
    let user = services::update(&state, payload).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete, path = "/users/delete", tag = "users",
    params(UsernameQuery),
    responses(
        (status = 200, description = "Deleted with their payments", body = MessageResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not your account", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
#[instrument(skip(state, session))]
pub async fn delete_user(
    State(state): State<AppState>,
    session: SessionUser,
    Query(q): Query<UsernameQuery>,
) -> AppResult<Json<MessageResponse>> {
    session.ensure_can_act_for(q.username.trim())?;
    services::delete(&state, &q.username).await?;
    Ok(Json(MessageResponse::new(format!(
        "User {} deleted",
        q.username.trim()
    ))))
}

#[utoipa::path(
    put, path = "/users/changePassword", tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak password", body = ErrorResponse),
        (status = 401, description = "No session or wrong current password", body = ErrorResponse),
        (status = 403, description = "Not your account", body = ErrorResponse)
    )
)]
#[instrument(skip(state, session, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    session: SessionUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let username = payload.username.trim();
    session.ensure_can_act_for(username)?;
    services::change_password(
        &state,
        username,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

#[utoipa::path(
    post, path = "/users/forgot-password", tag = "session",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link mailed", body = MessageResponse),
        (status = 404, description = "No user with that email", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new("Password reset email sent")))
}

#[utoipa::path(
    post, path = "/users/reset-password", tag = "session",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Weak password", body = ErrorResponse),
        (status = 401, description = "Invalid or expired reset token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(&state, &payload.token, &payload.new_password).await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
