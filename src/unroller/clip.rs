//! Clip expansion: a clip without a poster passes through unchanged,
//! otherwise the poster reference is fetched and unrolled as an image set.

use serde_json::Value;

use crate::content::{extract_uuid, Content, API_URL_FIELD, CLIP_TYPE, POSTER_FIELD};
use crate::types::{Result, UnrollError};
use crate::unroller::{UniversalUnroller, UnrollEvent};

impl UniversalUnroller {
    pub(crate) async fn unroll_clip(&self, event: UnrollEvent) -> Result<Content> {
        if !event.content.is_type(CLIP_TYPE) {
            return Err(UnrollError::Validation(format!(
                "content {} is not a clip",
                event.uuid
            )));
        }

        let Some(poster) = event.content.get(POSTER_FIELD) else {
            return Ok(event.content.clone());
        };

        let poster_obj = poster
            .as_object()
            .ok_or_else(|| UnrollError::Conversion("poster field is not an object".to_string()))?;
        let api_url = poster_obj
            .get(API_URL_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| UnrollError::Conversion("poster apiUrl is not a string".to_string()))?;
        let poster_uuid = extract_uuid(api_url)?;

        let mut poster_map = self
            .reader()
            .get(&[poster_uuid.clone()], &event.transaction_id)
            .await?;
        let poster_content = poster_map.remove(&poster_uuid).ok_or_else(|| {
            UnrollError::Validation(format!("poster {} could not be fetched", poster_uuid))
        })?;

        let unrolled_poster = self
            .unroll_image_set(UnrollEvent {
                content: poster_content,
                transaction_id: event.transaction_id.clone(),
                uuid: poster_uuid,
            })
            .await?;

        let mut out = event.content.clone();
        out.insert(POSTER_FIELD, unrolled_poster.into_value());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{IMAGE_SET_TYPE, MEMBERS_FIELD};
    use crate::reader::testing::MockReader;
    use crate::reader::{ContentMap, Reader};
    use crate::unroller::testing::{content, event};
    use serde_json::json;
    use std::sync::Arc;

    const CLIP_UUID: &str = "22c0d426-1466-11e7-b0c1-37e417ee6c76";
    const POSTER_UUID: &str = "639cd952-149f-11e7-2ea7-a07ecd9ac73f";
    const POSTER_MEMBER: &str = "71231d3a-13c7-11e7-2ea7-a07ecd9ac73f";

    fn unroller(reader: Arc<MockReader>) -> UniversalUnroller {
        UniversalUnroller::new(reader as Arc<dyn Reader>, "test.api.ft.com")
    }

    #[tokio::test]
    async fn test_clip_without_poster_passes_through() {
        let reader = Arc::new(MockReader::new(ContentMap::new()));
        let u = unroller(Arc::clone(&reader));

        let ev = event(json!({"type": CLIP_TYPE, "title": "A clip"}), CLIP_UUID);
        let out = u.unroll_clip(ev.clone()).await.unwrap();
        assert_eq!(out, ev.content);
        assert_eq!(reader.call_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_fails_validation() {
        let u = unroller(Arc::new(MockReader::new(ContentMap::new())));
        let ev = event(json!({"type": "wrong"}), CLIP_UUID);
        assert!(matches!(
            u.unroll_clip(ev).await,
            Err(UnrollError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_poster_without_api_url_is_a_conversion_error() {
        let u = unroller(Arc::new(MockReader::new(ContentMap::new())));
        let ev = event(
            json!({"type": CLIP_TYPE, "poster": {"id": "no apiUrl"}}),
            CLIP_UUID,
        );
        assert!(matches!(
            u.unroll_clip(ev).await,
            Err(UnrollError::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn test_poster_is_fetched_and_unrolled_as_image_set() {
        let mut fetched = ContentMap::new();
        fetched.insert(
            POSTER_UUID.to_string(),
            content(json!({
                "id": POSTER_UUID,
                "type": IMAGE_SET_TYPE,
                "members": [{"id": format!("http://www.ft.com/thing/{}", POSTER_MEMBER)}],
            })),
        );
        fetched.insert(
            POSTER_MEMBER.to_string(),
            content(json!({"id": POSTER_MEMBER, "title": "Poster frame"})),
        );
        let reader = Arc::new(MockReader::new(fetched));
        let u = unroller(Arc::clone(&reader));

        let ev = event(
            json!({
                "type": CLIP_TYPE,
                "poster": {"apiUrl": format!("http://api.ft.com/content/{}", POSTER_UUID)},
            }),
            CLIP_UUID,
        );
        let out = u.unroll_clip(ev).await.unwrap();

        let poster = out.get(POSTER_FIELD).unwrap();
        assert_eq!(poster["id"], json!(POSTER_UUID));
        assert_eq!(
            poster[MEMBERS_FIELD][0]["title"],
            json!("Poster frame")
        );
        // One fetch for the poster, one for its members
        assert_eq!(reader.call_count(), 2);
    }
}
