//! Generic expansion for any content that looks expandable. Same shape as
//! the article strategy but type-agnostic, with embedded components also
//! accepted and their bodies expanded one level.

use std::collections::HashSet;
use std::sync::Arc;

use crate::content::{
    Content, ALT_IMAGES_FIELD, BODY_XML_FIELD, CLIP_SET_TYPE, CUSTOM_CODE_COMPONENT_TYPE,
    DYNAMIC_CONTENT_TYPE, IMAGE_SET_TYPE, MAIN_IMAGE_FIELD,
};
use crate::reader::Reader;
use crate::types::{Result, UnrollError};
use crate::unroller::{
    build_content_schema, resolve_inner_bodies, resolve_set_members, splice_expanded_fields,
    UnrollEvent,
};

pub(crate) struct DefaultUnroller {
    reader: Arc<dyn Reader>,
    api_host: String,
    component_unroll_depth: usize,
}

impl DefaultUnroller {
    pub(crate) fn new(
        reader: Arc<dyn Reader>,
        api_host: &str,
        component_unroll_depth: usize,
    ) -> Self {
        Self {
            reader,
            api_host: api_host.to_string(),
            component_unroll_depth,
        }
    }

    pub(crate) async fn unroll(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_default_content(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} has nothing the generic strategy can expand",
                event.uuid
            )));
        }

        let mut cc = event.content.clone();
        let tid = &event.transaction_id;
        let uuid = &event.uuid;

        let accepted_types = [
            IMAGE_SET_TYPE,
            DYNAMIC_CONTENT_TYPE,
            CLIP_SET_TYPE,
            CUSTOM_CODE_COMPONENT_TYPE,
        ];
        let Some(schema) = build_content_schema(&cc, &accepted_types, tid, uuid) else {
            return Ok(cc);
        };

        let mut content_map = self
            .reader
            .get(&schema.to_uuids(), tid)
            .await
            .map_err(|err| {
                UnrollError::ContentStore(format!(
                    "error while getting expanded content for uuid {}: {}",
                    uuid, err
                ))
            })?;

        if let Some(main_image) = schema.main_image() {
            resolve_set_members(
                self.reader.as_ref(),
                &self.api_host,
                main_image,
                &mut content_map,
                tid,
                uuid,
            )
            .await;
        }
        for embed_uuid in schema.embeds() {
            resolve_set_members(
                self.reader.as_ref(),
                &self.api_host,
                embed_uuid,
                &mut content_map,
                tid,
                uuid,
            )
            .await;
        }

        // Embedded components carry their own bodies; expand those too,
        // bounded by the configured depth.
        let mut visited: HashSet<String> = content_map
            .iter()
            .filter(|(_, c)| c.is_type(CUSTOM_CODE_COMPONENT_TYPE))
            .map(|(k, _)| k.clone())
            .collect();
        visited.insert(uuid.clone());
        resolve_inner_bodies(
            self.reader.as_ref(),
            schema.embeds(),
            &mut content_map,
            &accepted_types,
            tid,
            uuid,
            self.component_unroll_depth,
            &mut visited,
        )
        .await;

        splice_expanded_fields(&mut cc, &schema, &content_map);
        Ok(cc)
    }
}

fn validate_default_content(content: &Content) -> bool {
    content.contains(MAIN_IMAGE_FIELD)
        || content.contains(BODY_XML_FIELD)
        || content.get_object(ALT_IMAGES_FIELD).is_some()
}
