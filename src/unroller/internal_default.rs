//! Internal expansion for any content carrying lead images or a body.
//! Lead images and dynamic content are resolved via the internal endpoint;
//! each enrichment is individually recoverable.

use serde_json::Value;
use std::sync::Arc;

use crate::content::{Content, BODY_XML_FIELD, EMBEDS_FIELD, LEAD_IMAGES_FIELD};
use crate::reader::Reader;
use crate::types::{Result, UnrollError};
use crate::unroller::{unroll_dynamic_content, unroll_lead_images, UnrollEvent};

pub(crate) struct InternalDefaultUnroller {
    reader: Arc<dyn Reader>,
}

impl InternalDefaultUnroller {
    pub(crate) fn new(reader: Arc<dyn Reader>) -> Self {
        Self { reader }
    }

    pub(crate) async fn unroll(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_internal_default_content(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} has no lead images or body to expand",
                event.uuid
            )));
        }

        let mut cc = event.content.clone();
        let tid = &event.transaction_id;
        let uuid = &event.uuid;

        unroll_lead_images(self.reader.as_ref(), &mut cc, tid, uuid).await;

        if let Some(dynamic) = unroll_dynamic_content(self.reader.as_ref(), &cc, tid, uuid).await {
            cc.insert(EMBEDS_FIELD, Value::Array(dynamic));
        }

        Ok(cc)
    }
}

pub(crate) fn validate_internal_default_content(content: &Content) -> bool {
    content.contains(LEAD_IMAGES_FIELD) || content.contains(BODY_XML_FIELD)
}
