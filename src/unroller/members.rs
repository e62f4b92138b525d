//! Member and nested-reference resolution
//!
//! Shared machinery for splicing fetched documents back into containers:
//! set members (with clip-style posters), lead images, dynamic content and
//! the bodies of nested components. Everything here degrades gracefully on
//! a per-item basis; a member that cannot be resolved stays a reference.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, error, info};

use crate::content::{
    embedded_refs, extract_uuid, Content, API_URL_FIELD, BODY_XML_FIELD,
    CUSTOM_CODE_COMPONENT_TYPE, DYNAMIC_CONTENT_TYPE, EMBEDS_FIELD, ID_FIELD, IMAGE_FIELD,
    LEAD_IMAGES_FIELD, MEMBERS_FIELD, POSTER_FIELD, Schema,
};
use crate::reader::{ContentMap, Reader};
use crate::types::{Result, UnrollError};
use crate::unroller::extract_embedded_by_type;

/// A stand-in record for content that could not be fetched, carrying a
/// stable identifier instead of a bare UUID.
pub(crate) fn placeholder(api_host: &str, uuid: &str) -> Content {
    let mut content = Content::new();
    content.insert(
        ID_FIELD,
        Value::String(crate::content::build_id(api_host, "content", uuid)),
    );
    content
}

/// Merge the members of the set stored under `set_uuid` with the documents
/// in `content_map`, in place. Returns the positions of merged members that
/// carry a `poster` object still awaiting resolution.
///
/// A missing set becomes a placeholder record. A member whose identifier is
/// unusable is dropped; a member whose UUID was not fetched stays as its
/// original reference, in order.
fn merge_set_members(
    set_uuid: &str,
    content_map: &mut ContentMap,
    api_host: &str,
    tid: &str,
    uuid: &str,
) -> Vec<(usize, Value)> {
    if !content_map.contains_key(set_uuid) {
        debug!(transaction_id = %tid, uuid = %uuid, set = %set_uuid, "Cannot match to any found content UUID");
        content_map.insert(set_uuid.to_string(), placeholder(api_host, set_uuid));
        return Vec::new();
    }

    let members = match content_map.get(set_uuid).and_then(|c| c.get_array(MEMBERS_FIELD)) {
        Some(members) => members.clone(),
        None => return Vec::new(),
    };

    let mut expanded: Vec<Value> = Vec::with_capacity(members.len());
    let mut pending_posters = Vec::new();

    for member in members {
        let Some(member_content) = Content::from_value(member.clone()) else {
            debug!(transaction_id = %tid, uuid = %uuid, "Skipping set member that is not an object");
            continue;
        };
        let Some(member_id) = member_content.get_str(ID_FIELD).map(str::to_string) else {
            debug!(transaction_id = %tid, uuid = %uuid, "Skipping set member without an id");
            continue;
        };
        let member_uuid = match extract_uuid(&member_id) {
            Ok(member_uuid) => member_uuid,
            Err(err) => {
                error!(transaction_id = %tid, uuid = %uuid, identifier = %member_id, error = %err, "Error while extracting UUID from member id");
                continue;
            }
        };

        match content_map.get(&member_uuid) {
            None => expanded.push(member),
            Some(fetched) => {
                let mut merged = member_content;
                merged.merge(fetched);
                if let Some(poster) = fetched.get(POSTER_FIELD) {
                    pending_posters.push((expanded.len(), poster.clone()));
                }
                expanded.push(merged.into_value());
            }
        }
    }

    if let Some(set) = content_map.get_mut(set_uuid) {
        set.insert(MEMBERS_FIELD, Value::Array(expanded));
    }
    pending_posters
}

/// Merge set members and resolve any posters the merged members carry.
pub(crate) async fn resolve_set_members(
    reader: &dyn Reader,
    api_host: &str,
    set_uuid: &str,
    content_map: &mut ContentMap,
    tid: &str,
    uuid: &str,
) {
    let pending = merge_set_members(set_uuid, content_map, api_host, tid, uuid);

    for (index, poster) in pending {
        match resolve_poster(reader, api_host, &poster, tid, uuid).await {
            Ok(resolved) => {
                let member = content_map
                    .get_mut(set_uuid)
                    .and_then(|set| set.get_array_mut(MEMBERS_FIELD))
                    .and_then(|members| members.get_mut(index))
                    .and_then(Value::as_object_mut);
                if let Some(member) = member {
                    member.insert(POSTER_FIELD.to_string(), resolved);
                }
            }
            Err(err) => {
                error!(transaction_id = %tid, uuid = %uuid, error = %err, "Error while getting expanded poster content");
            }
        }
    }
}

/// Fetch a poster reference and merge its own members. Posters of poster
/// members are left untouched, which bounds the nesting.
async fn resolve_poster(
    reader: &dyn Reader,
    api_host: &str,
    poster: &Value,
    tid: &str,
    uuid: &str,
) -> Result<Value> {
    let poster_obj = poster
        .as_object()
        .ok_or_else(|| UnrollError::Conversion("poster field is not an object".to_string()))?;
    let api_url = poster_obj
        .get(API_URL_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| UnrollError::Conversion("poster apiUrl is not a string".to_string()))?;
    let poster_uuid = extract_uuid(api_url)?;

    let mut poster_map = reader.get(&[poster_uuid.clone()], tid).await?;
    let _ = merge_set_members(&poster_uuid, &mut poster_map, api_host, tid, uuid);

    Ok(poster_map
        .remove(&poster_uuid)
        .map(Content::into_value)
        .unwrap_or_else(|| placeholder(api_host, &poster_uuid).into_value()))
}

/// Expand the members of a set found inside a component body, fetching the
/// ones not yet loaded. Strict about member shape: every member must carry
/// a string `id` with an extractable UUID. Members that stay unresolved
/// after the fetch are dropped from the result.
pub(crate) async fn unroll_members_for_sets_in_body(
    reader: &dyn Reader,
    inner: &Content,
    loaded: &mut ContentMap,
    tid: &str,
) -> Result<Content> {
    let Some(members) = inner.get_array(MEMBERS_FIELD) else {
        // No members field, this is not a set. Return as it is.
        return Ok(inner.clone());
    };
    if members.is_empty() {
        return Ok(inner.clone());
    }

    let mut member_uuids = Vec::with_capacity(members.len());
    for member in members {
        let id = member
            .as_object()
            .and_then(|m| m.get(ID_FIELD))
            .and_then(Value::as_str)
            .ok_or_else(|| UnrollError::Conversion("set member is missing a string id".to_string()))?;
        member_uuids.push(extract_uuid(id)?);
    }

    let missing: Vec<String> = member_uuids
        .iter()
        .filter(|u| !loaded.contains_key(*u))
        .cloned()
        .collect();
    if !missing.is_empty() {
        let fetched = reader.get(&missing, tid).await?;
        for (fetched_uuid, fetched_content) in fetched {
            loaded.insert(fetched_uuid, fetched_content);
        }
    }

    let mut unrolled = Vec::with_capacity(member_uuids.len());
    for member_uuid in &member_uuids {
        match loaded.get(member_uuid) {
            Some(member_content) => unrolled.push(member_content.clone().into_value()),
            None => {
                info!(transaction_id = %tid, member = %member_uuid, "Image for set not found");
            }
        }
    }

    let mut out = inner.clone();
    out.insert(MEMBERS_FIELD, Value::Array(unrolled));
    Ok(out)
}

/// Load the references found in a component body: fetch the ones not yet
/// in the resolved map and expand the set members of each, storing the
/// expanded documents back in the map. References the store does not know
/// stay absent.
pub(crate) async fn process_content_for_embeds(
    reader: &dyn Reader,
    embed_uuids: &[String],
    found: &mut ContentMap,
    tid: &str,
    uuid: &str,
) -> Result<()> {
    let missing: Vec<String> = embed_uuids
        .iter()
        .filter(|u| !found.contains_key(*u))
        .cloned()
        .collect();
    if !missing.is_empty() {
        let fetched = reader.get(&missing, tid).await.map_err(|err| {
            info!(transaction_id = %tid, uuid = %uuid, error = %err, "failed to read component inner content");
            err
        })?;
        for fetched_uuid in &missing {
            if let Some(fetched_content) = fetched.get(fetched_uuid) {
                found.insert(fetched_uuid.clone(), fetched_content.clone());
            }
        }
    }

    for embed_uuid in embed_uuids {
        let Some(embed_content) = found.get(embed_uuid).cloned() else {
            info!(transaction_id = %tid, uuid = %uuid, embed = %embed_uuid, "failed to find inner component content for unroll");
            continue;
        };
        match unroll_members_for_sets_in_body(reader, &embed_content, found, tid).await {
            Ok(expanded) => {
                found.insert(embed_uuid.clone(), expanded);
            }
            Err(err) => {
                info!(transaction_id = %tid, uuid = %uuid, embed = %embed_uuid, error = %err, "failed to fill inner content members field");
            }
        }
    }
    Ok(())
}

/// Walk the bodies of embedded components, attaching an `embeds` sequence
/// to each component whose body references further content. `depth` bounds
/// how many levels of nesting are expanded; `visited` holds the UUIDs of
/// components already expanded, and a reference back to one of them is
/// treated as a cycle and skipped.
pub(crate) async fn resolve_inner_bodies(
    reader: &dyn Reader,
    embed_uuids: &[String],
    found: &mut ContentMap,
    accepted_types: &[&str],
    tid: &str,
    uuid: &str,
    depth: usize,
    visited: &mut HashSet<String>,
) {
    // Discover and fetch top-down, one level at a time.
    let mut attachments: Vec<(String, Vec<String>)> = Vec::new();
    let mut level: Vec<String> = embed_uuids.to_vec();

    for _ in 0..depth {
        if level.is_empty() {
            break;
        }
        let mut next_level: Vec<String> = Vec::new();

        for embed_uuid in &level {
            let Some(body) = found
                .get(embed_uuid)
                .and_then(|c| c.get_str(BODY_XML_FIELD))
                .map(str::to_string)
            else {
                continue;
            };

            let inner_uuids = match embedded_refs(&body, accepted_types) {
                Ok(inner_uuids) => inner_uuids,
                Err(err) => {
                    error!(transaction_id = %tid, uuid = %uuid, embed = %embed_uuid, error = %err, "Cannot parse bodyXML for component content");
                    continue;
                }
            };
            if inner_uuids.is_empty() {
                debug!(transaction_id = %tid, uuid = %uuid, embed = %embed_uuid, "No embedded unrollable content inside the component body");
                continue;
            }

            let expandable: Vec<String> = inner_uuids
                .into_iter()
                .filter(|inner_uuid| {
                    if visited.contains(inner_uuid) {
                        info!(transaction_id = %tid, uuid = %uuid, component = %inner_uuid, "Component cycle detected, skipping further expansion");
                        false
                    } else {
                        true
                    }
                })
                .collect();
            if expandable.is_empty() {
                continue;
            }

            if process_content_for_embeds(reader, &expandable, found, tid, uuid)
                .await
                .is_err()
            {
                continue;
            }

            for inner_uuid in &expandable {
                let is_component = found
                    .get(inner_uuid)
                    .map(|c| c.is_type(CUSTOM_CODE_COMPONENT_TYPE))
                    .unwrap_or(false);
                if is_component && visited.insert(inner_uuid.clone()) {
                    next_level.push(inner_uuid.clone());
                }
            }
            attachments.push((embed_uuid.clone(), expandable));
        }

        level = next_level;
    }

    // Attach embeds deepest level first so every parent captures its
    // children in fully expanded form.
    for (parent, children) in attachments.iter().rev() {
        let inner_embeds: Vec<Value> = children
            .iter()
            .filter_map(|child| found.get(child).cloned().map(Content::into_value))
            .collect();
        if !inner_embeds.is_empty() {
            if let Some(entry) = found.get_mut(parent) {
                entry.insert(EMBEDS_FIELD, Value::Array(inner_embeds));
            }
        }
    }
}

/// Splice resolved documents into the output: the main image replaces the
/// reference, embeds are attached in plan order, and the promotional image
/// lands back under `alternativeImages`. Roles whose document was never
/// resolved are left as supplied.
pub(crate) fn splice_expanded_fields(cc: &mut Content, schema: &Schema, content_map: &ContentMap) {
    use crate::content::{ALT_IMAGES_FIELD, MAIN_IMAGE_FIELD, PROMOTIONAL_IMAGE_FIELD};

    if let Some(main_image) = schema.main_image() {
        if let Some(image) = content_map.get(main_image) {
            cc.insert(MAIN_IMAGE_FIELD, image.clone().into_value());
        }
    }

    if !schema.embeds().is_empty() {
        let embedded: Vec<Value> = schema
            .embeds()
            .iter()
            .map(|e| {
                content_map
                    .get(e)
                    .cloned()
                    .map(Content::into_value)
                    .unwrap_or(Value::Null)
            })
            .collect();
        cc.insert(EMBEDS_FIELD, Value::Array(embedded));
    }

    if let Some(promotional) = schema.promotional_image() {
        if let Some(promo) = content_map.get(promotional).cloned() {
            if let Some(alt_images) = cc.get_object_mut(ALT_IMAGES_FIELD) {
                alt_images.insert(PROMOTIONAL_IMAGE_FIELD.to_string(), promo.into_value());
            }
        }
    }
}

/// Expand `leadImages` in place: each reference gains an `image` field with
/// the fetched document. A failed batch fetch leaves the field untouched;
/// an individual miss keeps the reference without the `image` key.
pub(crate) async fn unroll_lead_images(
    reader: &dyn Reader,
    cc: &mut Content,
    tid: &str,
    uuid: &str,
) -> bool {
    let Some(images) = cc.get_array(LEAD_IMAGES_FIELD) else {
        debug!(transaction_id = %tid, uuid = %uuid, "No lead images to expand for supplied content");
        return false;
    };
    if images.is_empty() {
        debug!(transaction_id = %tid, uuid = %uuid, "No lead images to expand for supplied content");
        return false;
    }

    let mut images = images.clone();
    let mut schema = Schema::new();
    for item in images.iter_mut() {
        let Some(lead_image) = item.as_object_mut() else {
            continue;
        };
        let Some(id) = lead_image.get(ID_FIELD).and_then(Value::as_str) else {
            error!(transaction_id = %tid, uuid = %uuid, "Lead image is missing the id field");
            continue;
        };
        match extract_uuid(id) {
            Ok(image_uuid) => {
                lead_image.insert(IMAGE_FIELD.to_string(), Value::String(image_uuid.clone()));
                schema.push_lead_image(image_uuid);
            }
            Err(err) => {
                error!(transaction_id = %tid, uuid = %uuid, identifier = %id, error = %err, "Error while getting UUID for lead image");
            }
        }
    }

    let image_map = match reader.get(&schema.to_uuids(), tid).await {
        Ok(image_map) => image_map,
        Err(err) => {
            error!(transaction_id = %tid, uuid = %uuid, error = %err, "Error while getting content for expanded images");
            return false;
        }
    };

    let mut expanded = Vec::with_capacity(images.len());
    for item in images {
        let Some(lead_image) = item.as_object() else {
            expanded.push(item);
            continue;
        };
        let Some(image_uuid) = lead_image
            .get(IMAGE_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            expanded.push(item);
            continue;
        };
        let mut enriched = lead_image.clone();
        match image_map.get(&image_uuid) {
            Some(image) => {
                enriched.insert(IMAGE_FIELD.to_string(), image.clone().into_value());
            }
            None => {
                debug!(transaction_id = %tid, uuid = %uuid, image = %image_uuid, "Missing image model. Returning only the id.");
                enriched.remove(IMAGE_FIELD);
            }
        }
        expanded.push(Value::Object(enriched));
    }

    cc.insert(LEAD_IMAGES_FIELD, Value::Array(expanded));
    true
}

/// Fetch dynamic content referenced in the body via the internal endpoint.
/// Returns the fetched documents in marker order, or `None` when there is
/// nothing to expand or the fetch failed.
pub(crate) async fn unroll_dynamic_content(
    reader: &dyn Reader,
    cc: &Content,
    tid: &str,
    uuid: &str,
) -> Option<Vec<Value>> {
    let embed_uuids = extract_embedded_by_type(cc, &[DYNAMIC_CONTENT_TYPE], tid, uuid)?;

    let content_map = match reader.get_internal(&embed_uuids, tid).await {
        Ok(content_map) => content_map,
        Err(err) => {
            error!(transaction_id = %tid, uuid = %uuid, error = %err, "Error while getting embedded dynamic content");
            return None;
        }
    };

    Some(
        embed_uuids
            .iter()
            .map(|u| {
                content_map
                    .get(u)
                    .cloned()
                    .map(Content::into_value)
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::MockReader;
    use crate::unroller::testing::content;
    use serde_json::json;

    const SET_UUID: &str = "22c0d426-1466-11e7-b0c1-37e417ee6c76";
    const MEMBER_1: &str = "639cd952-149f-11e7-2ea7-a07ecd9ac73f";
    const MEMBER_2: &str = "71231d3a-13c7-11e7-2ea7-a07ecd9ac73f";
    const API_HOST: &str = "test.api.ft.com";

    fn member_ref(uuid: &str) -> Value {
        json!({"id": format!("http://api.ft.com/content/{}", uuid)})
    }

    #[test]
    fn test_placeholder_carries_stable_identifier() {
        let p = placeholder(API_HOST, SET_UUID);
        assert_eq!(
            p.get_str(ID_FIELD),
            Some(format!("http://{}/content/{}", API_HOST, SET_UUID)).as_deref()
        );
    }

    #[tokio::test]
    async fn test_resolve_set_members_merges_hits_and_keeps_misses() {
        let mut map = ContentMap::new();
        map.insert(
            SET_UUID.to_string(),
            content(json!({
                "id": SET_UUID,
                "members": [member_ref(MEMBER_1), member_ref(MEMBER_2)],
            })),
        );
        map.insert(
            MEMBER_1.to_string(),
            content(json!({"id": MEMBER_1, "title": "Fetched image"})),
        );

        let reader = MockReader::new(ContentMap::new());
        resolve_set_members(&reader, API_HOST, SET_UUID, &mut map, "tid", "uuid").await;

        let members = map[SET_UUID].get_array(MEMBERS_FIELD).unwrap();
        assert_eq!(members.len(), 2);
        // Resolved member merged, fetched fields overwrite the reference id
        assert_eq!(members[0]["id"], json!(MEMBER_1));
        assert_eq!(members[0]["title"], json!("Fetched image"));
        // Unresolved member stays as the original reference
        assert_eq!(members[1], member_ref(MEMBER_2));
    }

    #[tokio::test]
    async fn test_resolve_set_members_inserts_placeholder_for_missing_set() {
        let mut map = ContentMap::new();
        let reader = MockReader::new(ContentMap::new());
        resolve_set_members(&reader, API_HOST, SET_UUID, &mut map, "tid", "uuid").await;

        let set = &map[SET_UUID];
        assert_eq!(
            set.get_str(ID_FIELD),
            Some(format!("http://{}/content/{}", API_HOST, SET_UUID)).as_deref()
        );
    }

    #[tokio::test]
    async fn test_resolve_set_members_resolves_posters_one_level() {
        let poster_uuid = "d02886fc-58ff-11e8-9859-6668838a4c10";
        let mut map = ContentMap::new();
        map.insert(
            SET_UUID.to_string(),
            content(json!({"members": [member_ref(MEMBER_1)]})),
        );
        map.insert(
            MEMBER_1.to_string(),
            content(json!({
                "id": MEMBER_1,
                "poster": {"apiUrl": format!("http://api.ft.com/content/{}", poster_uuid)},
            })),
        );

        let mut fetched = ContentMap::new();
        fetched.insert(
            poster_uuid.to_string(),
            content(json!({"id": poster_uuid, "title": "Poster image set"})),
        );
        let reader = MockReader::new(fetched);

        resolve_set_members(&reader, API_HOST, SET_UUID, &mut map, "tid", "uuid").await;

        let members = map[SET_UUID].get_array(MEMBERS_FIELD).unwrap();
        assert_eq!(members[0]["poster"]["title"], json!("Poster image set"));
        assert_eq!(reader.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unroll_members_for_sets_in_body_requires_member_ids() {
        let inner = content(json!({"members": [{"notId": true}]}));
        let mut loaded = ContentMap::new();
        let reader = MockReader::new(ContentMap::new());

        let err = unroll_members_for_sets_in_body(&reader, &inner, &mut loaded, "tid")
            .await
            .unwrap_err();
        assert!(matches!(err, UnrollError::Conversion(_)));
    }

    #[tokio::test]
    async fn test_unroll_members_for_sets_in_body_fetches_only_missing() {
        let inner = content(json!({"members": [member_ref(MEMBER_1), member_ref(MEMBER_2)]}));
        let mut loaded = ContentMap::new();
        loaded.insert(MEMBER_1.to_string(), content(json!({"id": MEMBER_1})));

        let mut fetched = ContentMap::new();
        fetched.insert(MEMBER_2.to_string(), content(json!({"id": MEMBER_2})));
        let reader = MockReader::new(fetched);

        let out = unroll_members_for_sets_in_body(&reader, &inner, &mut loaded, "tid")
            .await
            .unwrap();
        let members = out.get_array(MEMBERS_FIELD).unwrap();
        assert_eq!(members.len(), 2);

        let calls = reader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![MEMBER_2.to_string()]);
    }

    #[tokio::test]
    async fn test_unroll_lead_images_enriches_and_degrades_per_image() {
        let mut cc = content(json!({
            "leadImages": [member_ref(MEMBER_1), member_ref(MEMBER_2)],
        }));

        let mut fetched = ContentMap::new();
        fetched.insert(
            MEMBER_1.to_string(),
            content(json!({"id": MEMBER_1, "title": "Lead"})),
        );
        let reader = MockReader::new(fetched);

        assert!(unroll_lead_images(&reader, &mut cc, "tid", "uuid").await);

        let images = cc.get_array(LEAD_IMAGES_FIELD).unwrap();
        // Original reference fields kept, fetched document under `image`
        assert_eq!(images[0]["id"], member_ref(MEMBER_1)["id"]);
        assert_eq!(images[0]["image"]["title"], json!("Lead"));
        // Miss keeps the reference without an `image` key
        assert_eq!(images[1], member_ref(MEMBER_2));
    }

    #[tokio::test]
    async fn test_unroll_lead_images_fetch_failure_leaves_content_untouched() {
        let original = json!({"leadImages": [member_ref(MEMBER_1)]});
        let mut cc = content(original.clone());
        let reader = MockReader::failing();

        assert!(!unroll_lead_images(&reader, &mut cc, "tid", "uuid").await);
        assert_eq!(cc, content(original));
    }

    #[tokio::test]
    async fn test_unroll_dynamic_content_recovers_from_fetch_failure() {
        let dynamic_uuid = "d02886fc-58ff-11e8-9859-6668838a4c10";
        let body = format!(
            r#"<body><ft-content type="{}" url="http://api.ft.com/content/{}" data-embedded="true"></ft-content></body>"#,
            DYNAMIC_CONTENT_TYPE, dynamic_uuid
        );
        let cc = content(json!({"bodyXML": body}));

        let reader = MockReader::new(ContentMap::new()).failing_internal();
        assert!(unroll_dynamic_content(&reader, &cc, "tid", "uuid").await.is_none());

        let mut internal = ContentMap::new();
        internal.insert(
            dynamic_uuid.to_string(),
            content(json!({"id": dynamic_uuid, "kind": "dynamic"})),
        );
        let reader = MockReader::new(ContentMap::new()).with_internal(internal);
        let expanded = unroll_dynamic_content(&reader, &cc, "tid", "uuid").await.unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0]["kind"], json!("dynamic"));
    }
}
