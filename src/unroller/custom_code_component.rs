//! Custom code component expansion
//!
//! A component has no members; its payload is a body whose markers may
//! reference image sets, clip sets, dynamic content and further components.
//! The referenced content is fetched in one batch, set members are
//! expanded, and nested component bodies are walked to the configured
//! depth with an explicit visited set so self-references terminate.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::content::{
    Content, BODY_XML_FIELD, CLIP_SET_TYPE, CUSTOM_CODE_COMPONENT_TYPE, DYNAMIC_CONTENT_TYPE,
    EMBEDS_FIELD, IMAGE_SET_TYPE,
};
use crate::types::{Result, UnrollError};
use crate::unroller::{
    extract_embedded_by_type, placeholder, resolve_inner_bodies, unroll_members_for_sets_in_body,
    UniversalUnroller, UnrollEvent,
};

impl UniversalUnroller {
    pub(crate) async fn unroll_custom_code_component(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_custom_code_component(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} is not a custom code component with a body",
                event.uuid
            )));
        }

        let mut ccc = event.content.clone();
        let tid = &event.transaction_id;
        let uuid = &event.uuid;

        let accepted_types = [
            IMAGE_SET_TYPE,
            DYNAMIC_CONTENT_TYPE,
            CLIP_SET_TYPE,
            CUSTOM_CODE_COMPONENT_TYPE,
        ];
        let Some(embed_uuids) = extract_embedded_by_type(&ccc, &accepted_types, tid, uuid) else {
            debug!(transaction_id = %tid, uuid = %uuid, "No embedded components for component");
            return Ok(ccc);
        };

        let mut content_map = self.reader().get(&embed_uuids, tid).await.map_err(|err| {
            UnrollError::ContentStore(format!(
                "error while getting expanded content for uuid {} as uuids {:?}: {}",
                uuid, embed_uuids, err
            ))
        })?;

        // Expand the members of sets referenced directly by the body.
        for embed_uuid in &embed_uuids {
            if !content_map.contains_key(embed_uuid) {
                debug!(transaction_id = %tid, uuid = %uuid, embed = %embed_uuid, "Cannot match to any found content UUID");
                content_map.insert(embed_uuid.clone(), placeholder(self.api_host(), embed_uuid));
                continue;
            }
            let entry = content_map[embed_uuid].clone();
            match unroll_members_for_sets_in_body(self.reader(), &entry, &mut content_map, tid)
                .await
            {
                Ok(expanded) => {
                    content_map.insert(embed_uuid.clone(), expanded);
                }
                Err(err) => {
                    info!(transaction_id = %tid, uuid = %uuid, embed = %embed_uuid, error = %err, "failed to fill inner content members field");
                }
            }
        }

        // Walk nested component bodies. The subject component and every
        // component already fetched count as visited so a reference back to
        // any of them stops the walk instead of looping.
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(event.uuid.clone());
        for (fetched_uuid, fetched) in &content_map {
            if fetched.is_type(CUSTOM_CODE_COMPONENT_TYPE) {
                visited.insert(fetched_uuid.clone());
            }
        }
        resolve_inner_bodies(
            self.reader(),
            &embed_uuids,
            &mut content_map,
            &accepted_types,
            tid,
            uuid,
            self.component_unroll_depth(),
            &mut visited,
        )
        .await;

        let embedded: Vec<Value> = embed_uuids
            .iter()
            .map(|embed_uuid| {
                content_map
                    .get(embed_uuid)
                    .cloned()
                    .map(Content::into_value)
                    .unwrap_or(Value::Null)
            })
            .collect();
        ccc.insert(EMBEDS_FIELD, Value::Array(embedded));

        Ok(ccc)
    }
}

fn validate_custom_code_component(content: &Content) -> bool {
    content.contains(BODY_XML_FIELD) && content.is_type(CUSTOM_CODE_COMPONENT_TYPE)
}
