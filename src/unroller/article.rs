//! Article expansion: main image, body embeds and promotional image are
//! planned, fetched in one batch, set members resolved and the results
//! spliced into the output. A failed batch fetch aborts the expansion.

use std::sync::Arc;

use crate::content::{
    Content, ALT_IMAGES_FIELD, ARTICLE_TYPE, BODY_XML_FIELD, CLIP_SET_TYPE, DYNAMIC_CONTENT_TYPE,
    IMAGE_SET_TYPE, MAIN_IMAGE_FIELD,
};
use crate::reader::Reader;
use crate::types::{Result, UnrollError};
use crate::unroller::{
    build_content_schema, resolve_set_members, splice_expanded_fields, UnrollEvent,
};

pub(crate) struct ArticleUnroller {
    reader: Arc<dyn Reader>,
    api_host: String,
}

impl ArticleUnroller {
    pub(crate) fn new(reader: Arc<dyn Reader>, api_host: &str) -> Self {
        Self {
            reader,
            api_host: api_host.to_string(),
        }
    }

    pub(crate) async fn unroll(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_article(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} is not an expandable article",
                event.uuid
            )));
        }

        let mut cc = event.content.clone();
        let tid = &event.transaction_id;
        let uuid = &event.uuid;

        let accepted_types = [IMAGE_SET_TYPE, DYNAMIC_CONTENT_TYPE, CLIP_SET_TYPE];
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

        splice_expanded_fields(&mut cc, &schema, &content_map);
        Ok(cc)
    }
}

fn validate_article(content: &Content) -> bool {
    let expandable = content.contains(MAIN_IMAGE_FIELD)
        || content.contains(BODY_XML_FIELD)
        || content.get_object(ALT_IMAGES_FIELD).is_some();
    expandable && content.is_type(ARTICLE_TYPE)
}
