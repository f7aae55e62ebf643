use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    images::services::UploadItem,
    members::{
        dto::{
            EmailQuery, LoginRequest, MemberForm, MemberResponse, NicknameQuery, PasswordQuery,
            SearchQuery,
        },
        services,
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/members/check-email", get(check_email))
        .route("/api/members/check-nickname", get(check_nickname))
        .route("/api/members/search", get(search_members))
        .route("/api/members/nickname/:nickname", get(get_member_by_nickname))
        .route("/api/members/email/:email", get(get_member_by_email))
        .route("/api/members/:id", get(get_member).delete(delete_member))
        .route("/api/members/login", post(login))
        .route("/api/members/:id/password", patch(change_password))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/members/multipart", post(register))
        .route("/api/members/:id/multipart", put(update_member))
        .route("/api/members/:id/profile-image", patch(update_profile_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Pulls the `data` JSON part and the optional `profileImage` file off the body.
async fn read_member_parts(
    mut mp: Multipart,
) -> AppResult<(Option<MemberForm>, Option<UploadItem>)> {
    let mut form = None;
    let mut image = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("data") => {
                let raw = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let parsed: MemberForm = serde_json::from_slice(&raw)
                    .map_err(|e| AppError::BadRequest(format!("invalid data part: {e}")))?;
                form = Some(parsed);
            }
            Some("profileImage") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some(UploadItem { body, content_type });
            }
            _ => {}
        }
    }
    Ok((form, image))
}

fn require_form(form: Option<MemberForm>) -> AppResult<MemberForm> {
    form.ok_or_else(|| AppError::BadRequest("data part is required".into()))
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> AppResult<Json<MemberResponse>> {
    let (form, image) = read_member_parts(mp).await?;
    let member = services::register(&state, require_form(form)?, image).await?;
    Ok(Json(member.into()))
}

#[instrument(skip(state, payload), fields(nickname = %payload.nickname))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<MemberResponse>> {
    let member = services::authenticate(&state, &payload.nickname, &payload.password).await?;
    Ok(Json(member.into()))
}

#[instrument(skip(state))]
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<MemberResponse>> {
    Ok(Json(services::get(&state, id).await?.into()))
}

#[instrument(skip(state))]
pub async fn get_member_by_nickname(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> AppResult<Json<MemberResponse>> {
    Ok(Json(services::get_by_nickname(&state, &nickname).await?.into()))
}

#[instrument(skip(state))]
pub async fn get_member_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<MemberResponse>> {
    Ok(Json(services::get_by_email(&state, &email).await?.into()))
}

#[instrument(skip(state, mp))]
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mp: Multipart,
) -> AppResult<Json<MemberResponse>> {
    let (form, image) = read_member_parts(mp).await?;
    let member = services::update_profile(&state, id, require_form(form)?, image).await?;
    Ok(Json(member.into()))
}

#[instrument(skip(state, q))]
pub async fn change_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<PasswordQuery>,
) -> AppResult<StatusCode> {
    services::change_password(&state, id, &q.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, mp))]
pub async fn update_profile_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mp: Multipart,
) -> AppResult<StatusCode> {
    let (_, image) = read_member_parts(mp).await?;
    let image = image.ok_or_else(|| AppError::BadRequest("profileImage is required".into()))?;
    services::replace_profile_image(&state, id, image).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    services::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_email(
    State(state): State<AppState>,
    Query(q): Query<EmailQuery>,
) -> AppResult<Json<bool>> {
    Ok(Json(services::exists_by_email(&state, &q.email).await?))
}

pub async fn check_nickname(
    State(state): State<AppState>,
    Query(q): Query<NicknameQuery>,
) -> AppResult<Json<bool>> {
    Ok(Json(services::exists_by_nickname(&state, &q.nickname).await?))
}

#[instrument(skip(state))]
pub async fn search_members(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<MemberResponse>>> {
    let members = services::search(&state, &q.query).await?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}
