use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::PredictionRecord;
use super::interpret::{interpret, FoodEstimate, Interpretation};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::NewPrediction;
use crate::vision::{FoodVision, ImageInput, VisionError, FOOD_PROMPT};

pub const DEFAULT_HISTORY_LIMIT: i64 = 5;
const MAX_HISTORY_LIMIT: i64 = 50;
const MAX_ATTEMPTS: u32 = 2;
const RETRY_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Please Upload the Image")]
    MissingImage,
    #[error("Please Upload the Food Image (jpg, jpeg, png, or gif)")]
    InvalidFileType,
    #[error("Please Upload the Food Image")]
    NotFoodImage,
    #[error("Error processing image. Please try again.")]
    ServiceUnavailable(#[source] VisionError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<PredictionError> for AppError {
    fn from(e: PredictionError) -> Self {
        match e {
            PredictionError::MissingImage | PredictionError::InvalidFileType => {
                AppError::BadRequest(e.to_string())
            }
            PredictionError::NotFoodImage => AppError::Unprocessable(e.to_string()),
            PredictionError::ServiceUnavailable(_) => AppError::Upstream(e.to_string()),
            PredictionError::Internal(inner) => AppError::Internal(inner),
        }
    }
}

/// Lowercased extension if it is one of the accepted image types.
fn image_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" => Some("jpg"),
        "jpeg" => Some("jpeg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        _ => None,
    }
}

fn mime_from_ext(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// Runs one photo through the vision service and stores the outcome.
///
/// Nothing is written unless the service produced an answer that is not the
/// not-food sentinel. An unreadable answer is stored as the "Unknown Food"
/// fallback rather than reported.
#[instrument(skip(st, image), fields(%user_id, size = image.len()))]
pub async fn submit_prediction(
    st: &AppState,
    user_id: Uuid,
    image: Bytes,
    filename: &str,
) -> Result<PredictionRecord, PredictionError> {
    if image.is_empty() {
        return Err(PredictionError::MissingImage);
    }
    let ext = image_extension(filename).ok_or_else(|| {
        warn!(filename, "rejected upload with unsupported extension");
        PredictionError::InvalidFileType
    })?;
    let mime_type = mime_from_ext(ext);

    let input = ImageInput {
        mime_type,
        base64_data: Base64::encode_string(&image),
    };
    let timeout = Duration::from_secs(st.config.gemini.timeout_secs);
    let raw = describe_with_retry(st.vision.as_ref(), &input, timeout)
        .await
        .map_err(|e| {
            warn!(error = %e, "vision service unavailable");
            PredictionError::ServiceUnavailable(e)
        })?;

    let estimate = match interpret(&raw) {
        Interpretation::Parsed(fields) => FoodEstimate::from_fields(&fields),
        Interpretation::NotFood => {
            info!("vision service says the image is not food");
            return Err(PredictionError::NotFoodImage);
        }
        Interpretation::Malformed => {
            warn!(reply_len = raw.len(), "unreadable vision reply, storing fallback");
            FoodEstimate::fallback()
        }
    };

    let id = Uuid::new_v4();
    let image_key = format!("food_images/{user_id}/{id}.{ext}");
    st.storage
        .put_object(&image_key, image, mime_type)
        .await
        .context("store food image")?;

    let image_url = match st
        .storage
        .presign_get(&image_key, st.config.storage.url_ttl_secs)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            discard_image(st, &image_key).await;
            return Err(e.into());
        }
    };

    let row = match st
        .store
        .insert_prediction(NewPrediction {
            id,
            user_id,
            food_name: estimate.food_name,
            calories: estimate.calories,
            fat: estimate.fat,
            energy: estimate.energy,
            image_key: image_key.clone(),
        })
        .await
    {
        Ok(row) => row,
        Err(e) => {
            discard_image(st, &image_key).await;
            return Err(e.into());
        }
    };

    info!(prediction_id = %row.id, food = %row.food_name, calories = row.calories, "prediction stored");
    Ok(PredictionRecord::new(row, image_url))
}

async fn discard_image(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to remove orphaned image");
    }
}

/// Calls the vision service with a per-attempt timeout, retrying once on a
/// transient failure.
async fn describe_with_retry(
    vision: &dyn FoodVision,
    image: &ImageInput,
    timeout: Duration,
) -> Result<String, VisionError> {
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(timeout, vision.describe(FOOD_PROMPT, image)).await
        {
            Ok(r) => r,
            Err(_) => Err(VisionError::Transient(format!(
                "no answer within {}s",
                timeout.as_secs()
            ))),
        };
        match result {
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, error = %e, "vision call failed, retrying");
                attempt += 1;
                tokio::time::sleep(RETRY_PAUSE).await;
            }
            other => return other,
        }
    }
}

/// Most recent predictions of a user, newest first.
#[instrument(skip(st))]
pub async fn list_recent_predictions(
    st: &AppState,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<PredictionRecord>> {
    let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
    let rows = st.store.recent_predictions(user_id, limit).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let url = st
            .storage
            .presign_get(&row.image_key, st.config.storage.url_ttl_secs)
            .await?;
        out.push(PredictionRecord::new(row, url));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{fake_state, Fakes, ScriptedVision};
    use crate::store::FoodStore;

    const APPLE: &str = r#"Sure! {"food_name":"Apple","calories":52,"fat":0.2,"energy":218} enjoy!"#;

    fn jpeg() -> Bytes {
        Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }

    async fn user(fakes: &Fakes) -> Uuid {
        fakes
            .store
            .create_user("Ann", "ann@example.com", "hash")
            .await
            .expect("create user")
            .id
    }

    #[test]
    fn extension_allow_list() {
        assert_eq!(image_extension("photo.JPG"), Some("jpg"));
        assert_eq!(image_extension("a.b.jpeg"), Some("jpeg"));
        assert_eq!(image_extension("x.Png"), Some("png"));
        assert_eq!(image_extension("anim.gif"), Some("gif"));
        assert_eq!(image_extension("photo.txt"), None);
        assert_eq!(image_extension("photo"), None);
        assert_eq!(image_extension(".jpg"), None);
        assert_eq!(mime_from_ext("jpg"), "image/jpeg");
        assert_eq!(mime_from_ext("jpeg"), "image/jpeg");
        assert_eq!(mime_from_ext("gif"), "image/gif");
    }

    #[tokio::test]
    async fn successful_prediction_is_stored_once() {
        let (st, fakes) = fake_state(ScriptedVision::replying(APPLE));
        let user_id = user(&fakes).await;

        let record = submit_prediction(&st, user_id, jpeg(), "lunch.jpg")
            .await
            .expect("prediction should succeed");

        assert_eq!(record.food_name, "Apple");
        assert_eq!(record.calories, 52.0);
        assert_eq!(record.fat, 0.2);
        assert_eq!(record.energy, 218.0);
        assert!(record.image_url.starts_with("https://fake.local/food_images/"));
        assert!(record.image_url.ends_with(".jpg"));
        assert_eq!(fakes.store.prediction_count(), 1);
        assert_eq!(fakes.storage.object_count(), 1);
        assert_eq!(fakes.vision.calls(), 1);

        let key = record.image_url.trim_start_matches("https://fake.local/");
        assert_eq!(fakes.storage.content_type(key).as_deref(), Some("image/jpeg"));
        assert_eq!(fakes.vision.last_mime(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn wrong_extension_writes_nothing() {
        let (st, fakes) = fake_state(ScriptedVision::replying(APPLE));
        let user_id = user(&fakes).await;

        let err = submit_prediction(&st, user_id, jpeg(), "photo.txt")
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::InvalidFileType));
        assert_eq!(fakes.store.prediction_count(), 0);
        assert_eq!(fakes.storage.object_count(), 0);
        assert_eq!(fakes.vision.calls(), 0);
    }

    #[tokio::test]
    async fn empty_upload_is_missing_image() {
        let (st, fakes) = fake_state(ScriptedVision::replying(APPLE));
        let user_id = user(&fakes).await;
        let err = submit_prediction(&st, user_id, Bytes::new(), "a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::MissingImage));
    }

    #[tokio::test]
    async fn not_food_writes_nothing() {
        let (st, fakes) = fake_state(ScriptedVision::replying(
            r#"{"food_name":"This is not a food image"}"#,
        ));
        let user_id = user(&fakes).await;

        let err = submit_prediction(&st, user_id, jpeg(), "cat.png")
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::NotFoodImage));
        assert_eq!(fakes.store.prediction_count(), 0);
        assert_eq!(fakes.storage.object_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_reply_stores_fallback() {
        let (st, fakes) = fake_state(ScriptedVision::replying(r#"{"food_name":"Pie""#));
        let user_id = user(&fakes).await;

        let record = submit_prediction(&st, user_id, jpeg(), "pie.jpeg")
            .await
            .expect("fallback is still a success");

        assert_eq!(record.food_name, "Unknown Food");
        assert_eq!(record.calories, 0.0);
        assert_eq!(record.fat, 0.0);
        assert_eq!(record.energy, 0.0);
        assert_eq!(fakes.store.prediction_count(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let (st, fakes) = fake_state(ScriptedVision::script(vec![
            Err(VisionError::Transient("503".into())),
            Ok(APPLE.to_string()),
        ]));
        let user_id = user(&fakes).await;

        let record = submit_prediction(&st, user_id, jpeg(), "apple.gif")
            .await
            .expect("second attempt succeeds");

        assert_eq!(record.food_name, "Apple");
        assert_eq!(fakes.vision.calls(), 2);
        assert_eq!(fakes.vision.last_mime(), Some("image/gif"));
    }

    #[tokio::test]
    async fn repeated_transient_failure_gives_up() {
        let (st, fakes) = fake_state(ScriptedVision::script(vec![
            Err(VisionError::Transient("503".into())),
            Err(VisionError::Transient("503".into())),
            Ok(APPLE.to_string()),
        ]));
        let user_id = user(&fakes).await;

        let err = submit_prediction(&st, user_id, jpeg(), "apple.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::ServiceUnavailable(_)));
        assert_eq!(fakes.vision.calls(), 2);
        assert_eq!(fakes.store.prediction_count(), 0);
        assert_eq!(fakes.storage.object_count(), 0);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let (st, fakes) = fake_state(ScriptedVision::script(vec![
            Err(VisionError::Permanent("bad key".into())),
            Ok(APPLE.to_string()),
        ]));
        let user_id = user(&fakes).await;

        let err = submit_prediction(&st, user_id, jpeg(), "apple.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::ServiceUnavailable(_)));
        assert_eq!(fakes.vision.calls(), 1);
        assert_eq!(fakes.store.prediction_count(), 0);
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let (st, fakes) = fake_state(
            ScriptedVision::replying(APPLE).with_delay(Duration::from_secs(3)),
        );
        let user_id = user(&fakes).await;

        let err = submit_prediction(&st, user_id, jpeg(), "apple.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::ServiceUnavailable(VisionError::Transient(_))));
        assert_eq!(fakes.vision.calls(), 2);
        assert_eq!(fakes.store.prediction_count(), 0);
    }

    #[tokio::test]
    async fn failed_insert_removes_uploaded_image() {
        let (st, fakes) = crate::state::testing::fake_state_with_store(
            ScriptedVision::replying(APPLE),
            crate::store::memory::MemoryStore::failing_inserts(),
        );
        let user_id = Uuid::new_v4();

        let err = submit_prediction(&st, user_id, jpeg(), "apple.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, PredictionError::Internal(_)));
        assert_eq!(fakes.store.prediction_count(), 0);
        assert_eq!(fakes.storage.object_count(), 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let (st, fakes) = fake_state(ScriptedVision::replying(APPLE));
        let user_id = user(&fakes).await;
        for i in 0..7 {
            submit_prediction(&st, user_id, jpeg(), &format!("meal{i}.png"))
                .await
                .expect("prediction");
        }

        let recent = list_recent_predictions(&st, user_id, DEFAULT_HISTORY_LIMIT)
            .await
            .expect("history");
        assert_eq!(recent.len(), 5);
        assert!(recent
            .windows(2)
            .all(|w| w[0].created_at > w[1].created_at));

        let other = list_recent_predictions(&st, Uuid::new_v4(), 5)
            .await
            .expect("history");
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn history_limit_is_clamped() {
        let (st, fakes) = fake_state(ScriptedVision::replying(APPLE));
        let user_id = user(&fakes).await;
        submit_prediction(&st, user_id, jpeg(), "a.png").await.expect("prediction");
        submit_prediction(&st, user_id, jpeg(), "b.png").await.expect("prediction");

        let recent = list_recent_predictions(&st, user_id, 0).await.expect("history");
        assert_eq!(recent.len(), 1);
    }
}
