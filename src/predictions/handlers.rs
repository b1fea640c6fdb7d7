use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tracing::{instrument, warn};

use super::dto::{HistoryQuery, HistoryResponse, PredictionRecord};
use super::services::{list_recent_predictions, submit_prediction, PredictionError};
use crate::{
    auth::jwt::AuthUser,
    error::{ApiQuery, AppError, Envelope},
    state::AppState,
};

const IMAGE_FIELD: &str = "food_image";

pub fn predict_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/predict", get(history).post(predict))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// GET /predict?limit=5
#[instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(q): ApiQuery<HistoryQuery>,
) -> Result<Json<Envelope<HistoryResponse>>, AppError> {
    let predictions = list_recent_predictions(&state, user_id, q.limit).await?;
    Ok(Json(Envelope::success(HistoryResponse { predictions })))
}

/// POST /predict (multipart, file in `food_image`)
#[instrument(skip(state, mp))]
pub async fn predict(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<PredictionRecord>>, AppError> {
    let mut mp = mp?;
    let mut upload: Option<(String, Bytes)> = None;
    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "bad multipart body");
                return Err(e.into());
            }
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        upload = Some((filename, data));
    }

    let (filename, data) = upload.ok_or(PredictionError::MissingImage)?;
    let record = submit_prediction(&state, user_id, data, &filename).await?;
    Ok(Json(Envelope::success(record)))
}
