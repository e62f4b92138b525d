//! ImageSet expansion: replace each member reference with the fetched
//! image, or a placeholder identifier record when the image is unknown.

use serde_json::Value;

use crate::content::{extract_uuid, Content, ID_FIELD, IMAGE_SET_TYPE, MEMBERS_FIELD};
use crate::types::{Result, UnrollError};
use crate::unroller::{placeholder, UniversalUnroller, UnrollEvent};

impl UniversalUnroller {
    pub(crate) async fn unroll_image_set(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_image_set(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} is not an image set with members",
                event.uuid
            )));
        }

        let members = event
            .content
            .get_array(MEMBERS_FIELD)
            .ok_or_else(|| UnrollError::Conversion("members is not a sequence".to_string()))?;
        if members.is_empty() {
            return Ok(event.content.clone());
        }

        let mut image_uuids = Vec::with_capacity(members.len());
        for member in members {
            let id = member
                .as_object()
                .and_then(|m| m.get(ID_FIELD))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    UnrollError::Conversion("image set member is missing a string id".to_string())
                })?;
            image_uuids.push(extract_uuid(id)?);
        }

        // The batched endpoint skips UUIDs it does not know but still
        // returns 200, so misses surface as absent keys here.
        let images = self.reader().get(&image_uuids, &event.transaction_id).await?;

        let unrolled: Vec<Value> = image_uuids
            .iter()
            .map(|image_uuid| {
                images
                    .get(image_uuid)
                    .cloned()
                    .unwrap_or_else(|| placeholder(self.api_host(), image_uuid))
                    .into_value()
            })
            .collect();

        let mut out = event.content.clone();
        out.insert(MEMBERS_FIELD, Value::Array(unrolled));
        Ok(out)
    }
}

fn validate_image_set(content: &Content) -> bool {
    content.contains(MEMBERS_FIELD) && content.is_type(IMAGE_SET_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::MockReader;
    use crate::reader::{ContentMap, Reader};
    use crate::unroller::testing::{content, event};
    use serde_json::json;
    use std::sync::Arc;

    const SET_UUID: &str = "22c0d426-1466-11e7-b0c1-37e417ee6c76";
    const IMAGE_1: &str = "639cd952-149f-11e7-2ea7-a07ecd9ac73f";
    const IMAGE_2: &str = "71231d3a-13c7-11e7-2ea7-a07ecd9ac73f";

    fn unroller(reader: Arc<MockReader>) -> UniversalUnroller {
        UniversalUnroller::new(reader as Arc<dyn Reader>, "test.api.ft.com")
    }

    #[tokio::test]
    async fn test_empty_members_is_identity_with_no_fetch() {
        let reader = Arc::new(MockReader::new(ContentMap::new()));
        let u = unroller(Arc::clone(&reader));

        let ev = event(json!({"type": IMAGE_SET_TYPE, "members": []}), SET_UUID);
        let out = u.unroll_image_set(ev.clone()).await.unwrap();
        assert_eq!(out, ev.content);
        assert_eq!(reader.call_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_fails_validation() {
        let u = unroller(Arc::new(MockReader::new(ContentMap::new())));
        let ev = event(json!({"type": "wrong", "members": []}), SET_UUID);
        assert!(matches!(
            u.unroll_image_set(ev).await,
            Err(UnrollError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_members_must_be_a_sequence() {
        let u = unroller(Arc::new(MockReader::new(ContentMap::new())));
        let ev = event(json!({"type": IMAGE_SET_TYPE, "members": "nope"}), SET_UUID);
        assert!(matches!(
            u.unroll_image_set(ev).await,
            Err(UnrollError::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn test_members_replaced_with_fetched_content_or_placeholder() {
        let mut fetched = ContentMap::new();
        fetched.insert(
            IMAGE_1.to_string(),
            content(json!({"id": IMAGE_1, "title": "Found image"})),
        );
        let reader = Arc::new(MockReader::new(fetched));
        let u = unroller(Arc::clone(&reader));

        let ev = event(
            json!({
                "type": IMAGE_SET_TYPE,
                "members": [
                    {"id": format!("http://www.ft.com/thing/{}", IMAGE_1)},
                    {"id": format!("http://www.ft.com/thing/{}", IMAGE_2)},
                ],
            }),
            SET_UUID,
        );
        let out = u.unroll_image_set(ev).await.unwrap();

        let members = out.get_array(MEMBERS_FIELD).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0]["title"], json!("Found image"));
        // Unknown image becomes a placeholder record pointing at /content
        assert_eq!(
            members[1]["id"],
            json!(format!("http://test.api.ft.com/content/{}", IMAGE_2))
        );
    }
}
