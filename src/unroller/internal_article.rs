//! Internal expansion restricted to articles. Same enrichment as the
//! generic internal strategy, with the Article type required up front.

use serde_json::Value;
use std::sync::Arc;

use crate::content::{Content, ARTICLE_TYPE, EMBEDS_FIELD};
use crate::reader::Reader;
use crate::types::{Result, UnrollError};
use crate::unroller::internal_default::validate_internal_default_content;
use crate::unroller::{unroll_dynamic_content, unroll_lead_images, UnrollEvent};

pub(crate) struct InternalArticleUnroller {
    reader: Arc<dyn Reader>,
}

impl InternalArticleUnroller {
    pub(crate) fn new(reader: Arc<dyn Reader>) -> Self {
        Self { reader }
    }

    pub(crate) async fn unroll(&self, event: UnrollEvent) -> Result<Content> {
        if !validate_internal_article(&event.content) {
            return Err(UnrollError::Validation(format!(
                "content {} is not an article with lead images or a body",
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

fn validate_internal_article(content: &Content) -> bool {
    validate_internal_default_content(content) && content.is_type(ARTICLE_TYPE)
}
