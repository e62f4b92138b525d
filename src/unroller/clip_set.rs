//! ClipSet expansion: members are `{id, format}` references. Clips are
//! fetched in one batch, each expanded as a clip, and `format` is carried
//! over to the expanded record. A clip the store does not know stays as
//! its original reference, in order.

use serde_json::Value;

use crate::content::{
    extract_uuid, Content, CLIP_SET_TYPE, FORMAT_FIELD, ID_FIELD, MEMBERS_FIELD,
};
use crate::types::{Result, UnrollError};
use crate::unroller::{UniversalUnroller, UnrollEvent};

impl UniversalUnroller {
    pub(crate) async fn unroll_clip_set(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_clip_set(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} is not a clip set with members",
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

        let mut clip_refs = Vec::with_capacity(members.len());
        for member in members {
            let member_obj = member.as_object().ok_or_else(|| {
                UnrollError::Conversion("clip set member is not an object".to_string())
            })?;
            let id = member_obj
                .get(ID_FIELD)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    UnrollError::Conversion("clip set member is missing a string id".to_string())
                })?;
            let format = member_obj
                .get(FORMAT_FIELD)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    UnrollError::Conversion(
                        "clip set member is missing a string format".to_string(),
                    )
                })?;
            clip_refs.push((extract_uuid(id)?, format.to_string(), member.clone()));
        }

        let clip_uuids: Vec<String> = clip_refs.iter().map(|(u, _, _)| u.clone()).collect();
        let clips = self.reader().get(&clip_uuids, &event.transaction_id).await?;

        let mut unrolled = Vec::with_capacity(clip_refs.len());
        for (clip_uuid, format, original) in clip_refs {
            match clips.get(&clip_uuid) {
                Some(clip) => {
                    let mut expanded = self
                        .unroll_clip(UnrollEvent {
                            content: clip.clone(),
                            transaction_id: event.transaction_id.clone(),
                            uuid: clip_uuid,
                        })
                        .await?;
                    expanded.insert(FORMAT_FIELD, Value::String(format));
                    unrolled.push(expanded.into_value());
                }
                // Keep the unresolved reference, format and all
                None => unrolled.push(original),
            }
        }

        let mut out = event.content.clone();
        out.insert(MEMBERS_FIELD, Value::Array(unrolled));
        Ok(out)
    }
}

fn validate_clip_set(content: &Content) -> bool {
    content.contains(MEMBERS_FIELD) && content.is_type(CLIP_SET_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::CLIP_TYPE;
    use crate::reader::testing::MockReader;
    use crate::reader::{ContentMap, Reader};
    use crate::unroller::testing::{content, event};
    use serde_json::json;
    use std::sync::Arc;

    const SET_UUID: &str = "22c0d426-1466-11e7-b0c1-37e417ee6c76";
    const CLIP_1: &str = "639cd952-149f-11e7-2ea7-a07ecd9ac73f";
    const CLIP_2: &str = "71231d3a-13c7-11e7-2ea7-a07ecd9ac73f";

    fn unroller(reader: Arc<MockReader>) -> UniversalUnroller {
        UniversalUnroller::new(reader as Arc<dyn Reader>, "test.api.ft.com")
    }

    fn clip_member(uuid: &str, format: &str) -> Value {
        json!({
            "id": format!("http://api.ft.com/content/{}", uuid),
            "format": format,
        })
    }

    #[tokio::test]
    async fn test_empty_members_is_identity_with_no_fetch() {
        let reader = Arc::new(MockReader::new(ContentMap::new()));
        let u = unroller(Arc::clone(&reader));
        let ev = event(json!({"type": CLIP_SET_TYPE, "members": []}), SET_UUID);
        let out = u.unroll_clip_set(ev.clone()).await.unwrap();
        assert_eq!(out, ev.content);
        assert_eq!(reader.call_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_fails_validation() {
        let u = unroller(Arc::new(MockReader::new(ContentMap::new())));
        let ev = event(json!({"type": "wrong"}), SET_UUID);
        assert!(matches!(
            u.unroll_clip_set(ev).await,
            Err(UnrollError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_member_without_format_is_a_conversion_error() {
        let u = unroller(Arc::new(MockReader::new(ContentMap::new())));
        let ev = event(
            json!({
                "type": CLIP_SET_TYPE,
                "members": [{"id": format!("http://api.ft.com/content/{}", CLIP_1)}],
            }),
            SET_UUID,
        );
        assert!(matches!(
            u.unroll_clip_set(ev).await,
            Err(UnrollError::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_fetch_keeps_every_member_in_order() {
        let mut fetched = ContentMap::new();
        fetched.insert(
            CLIP_1.to_string(),
            content(json!({"id": CLIP_1, "type": CLIP_TYPE, "title": "Found clip"})),
        );
        let reader = Arc::new(MockReader::new(fetched));
        let u = unroller(Arc::clone(&reader));

        let ev = event(
            json!({
                "type": CLIP_SET_TYPE,
                "members": [
                    clip_member(CLIP_1, "square"),
                    clip_member(CLIP_2, "wide"),
                ],
            }),
            SET_UUID,
        );
        let out = u.unroll_clip_set(ev).await.unwrap();

        let members = out.get_array(MEMBERS_FIELD).unwrap();
        assert_eq!(members.len(), 2);
        // Resolved member is the expanded clip with its format re-attached
        assert_eq!(members[0]["title"], json!("Found clip"));
        assert_eq!(members[0]["format"], json!("square"));
        // Unresolved member keeps its original reference and format
        assert_eq!(members[1], clip_member(CLIP_2, "wide"));
    }
}
