use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppResult,
    meals::{
        dto::{DateQuery, MealImageRequest, MealRequest, MealResponse, MemberIdQuery},
        repo_types::{Meal, MealType},
        services,
    },
    state::AppState,
};

pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/api/meals/updated-date", get(list_meals_by_updated_date))
        .route("/api/meals/member/:member_id", get(list_meals_by_member))
        .route(
            "/api/meals/member/:member_id/type/:meal_type",
            get(list_meals_by_member_and_type),
        )
}

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/api/meals", get(list_meals).post(create_meal))
        .route(
            "/api/meals/:id",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/api/meals/:id/image", patch(update_meal_image))
}

fn to_responses(meals: Vec<Meal>) -> Json<Vec<MealResponse>> {
    Json(meals.into_iter().map(Into::into).collect())
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    Query(q): Query<MemberIdQuery>,
    Json(body): Json<MealRequest>,
) -> AppResult<Json<MealResponse>> {
    let meal = services::create_meal(&state, q.member_id, body).await?;
    Ok(Json(meal.into()))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<MealResponse>> {
    Ok(Json(services::get_meal(&state, id).await?.into()))
}

#[instrument(skip(state))]
pub async fn list_meals(State(state): State<AppState>) -> AppResult<Json<Vec<MealResponse>>> {
    Ok(to_responses(services::list_all(&state).await?))
}

#[instrument(skip(state))]
pub async fn list_meals_by_member(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
) -> AppResult<Json<Vec<MealResponse>>> {
    Ok(to_responses(services::list_by_member(&state, member_id).await?))
}

#[instrument(skip(state))]
pub async fn list_meals_by_member_and_type(
    State(state): State<AppState>,
    Path((member_id, meal_type)): Path<(i64, MealType)>,
) -> AppResult<Json<Vec<MealResponse>>> {
    Ok(to_responses(
        services::list_by_member_and_type(&state, member_id, meal_type).await?,
    ))
}

#[instrument(skip(state))]
pub async fn list_meals_by_updated_date(
    State(state): State<AppState>,
    Query(q): Query<DateQuery>,
) -> AppResult<Json<Vec<MealResponse>>> {
    Ok(to_responses(services::list_by_updated_date(&state, q.date).await?))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MealRequest>,
) -> AppResult<Json<MealResponse>> {
    Ok(Json(services::update_meal(&state, id, body).await?.into()))
}

#[instrument(skip(state, body))]
pub async fn update_meal_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MealImageRequest>,
) -> AppResult<StatusCode> {
    services::update_meal_image(&state, id, body.image_url).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    services::delete_meal(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
