//! The unrolling engine
//!
//! Expansion is dispatched on the declared type of the incoming document.
//! Each strategy validates its own precondition, builds a resolution plan,
//! issues one batched fetch per level and splices the fetched documents
//! back into the output. The dispatcher itself validates nothing.

mod article;
mod clip;
mod clip_set;
mod custom_code_component;
mod default;
mod image_set;
mod internal_article;
mod internal_default;
mod members;

pub(crate) use members::{
    placeholder, resolve_inner_bodies, resolve_set_members, splice_expanded_fields,
    unroll_dynamic_content, unroll_lead_images, unroll_members_for_sets_in_body,
};

use std::sync::Arc;
use tracing::debug;

use crate::content::{
    embedded_refs, extract_uuid, Content, Schema, ALT_IMAGES_FIELD, ARTICLE_TYPE, BODY_XML_FIELD,
    CLIP_SET_TYPE, CLIP_TYPE, CUSTOM_CODE_COMPONENT_TYPE, ID_FIELD, IMAGE_SET_TYPE,
    MAIN_IMAGE_FIELD, PROMOTIONAL_IMAGE_FIELD,
};
use crate::reader::Reader;
use crate::types::Result;

use article::ArticleUnroller;
use default::DefaultUnroller;
use internal_article::InternalArticleUnroller;
use internal_default::InternalDefaultUnroller;

/// One unit of unrolling work: the document, the correlation id and the
/// subject UUID.
#[derive(Debug, Clone)]
pub struct UnrollEvent {
    pub content: Content,
    pub transaction_id: String,
    pub uuid: String,
}

/// Type-dispatched entry point of the engine.
pub struct UniversalUnroller {
    reader: Arc<dyn Reader>,
    api_host: String,
    component_unroll_depth: usize,
}

impl UniversalUnroller {
    pub fn new(reader: Arc<dyn Reader>, api_host: impl Into<String>) -> Self {
        Self {
            reader,
            api_host: api_host.into(),
            component_unroll_depth: 1,
        }
    }

    /// Override how many levels of nested component bodies are expanded.
    pub fn with_component_unroll_depth(mut self, depth: usize) -> Self {
        self.component_unroll_depth = depth;
        self
    }

    pub(crate) fn reader(&self) -> &dyn Reader {
        self.reader.as_ref()
    }

    pub(crate) fn api_host(&self) -> &str {
        &self.api_host
    }

    pub(crate) fn component_unroll_depth(&self) -> usize {
        self.component_unroll_depth
    }

    /// Expand a document according to its declared type.
    pub async fn unroll(&self, event: UnrollEvent) -> Result<Content> {
        match event.content.primary_type() {
            Some(CLIP_SET_TYPE) => self.unroll_clip_set(event).await,
            Some(CLIP_TYPE) => self.unroll_clip(event).await,
            Some(IMAGE_SET_TYPE) => self.unroll_image_set(event).await,
            Some(CUSTOM_CODE_COMPONENT_TYPE) => self.unroll_custom_code_component(event).await,
            Some(ARTICLE_TYPE) => {
                ArticleUnroller::new(Arc::clone(&self.reader), &self.api_host)
                    .unroll(event)
                    .await
            }
            _ => {
                DefaultUnroller::new(
                    Arc::clone(&self.reader),
                    &self.api_host,
                    self.component_unroll_depth,
                )
                .unroll(event)
                .await
            }
        }
    }

    /// Expand a document for internal consumers, resolving lead images and
    /// dynamic content via the internal endpoint.
    pub async fn unroll_internal(&self, event: UnrollEvent) -> Result<Content> {
        match event.content.primary_type() {
            Some(ARTICLE_TYPE) => {
                InternalArticleUnroller::new(Arc::clone(&self.reader))
                    .unroll(event)
                    .await
            }
            _ => {
                InternalDefaultUnroller::new(Arc::clone(&self.reader))
                    .unroll(event)
                    .await
            }
        }
    }
}

/// UUIDs of embedded references of the accepted types, or `None` when the
/// document has no body, the body cannot be parsed, or nothing matched.
pub(crate) fn extract_embedded_by_type(
    content: &Content,
    accepted_types: &[&str],
    tid: &str,
    uuid: &str,
) -> Option<Vec<String>> {
    let Some(body) = content.get_str(BODY_XML_FIELD) else {
        debug!(transaction_id = %tid, uuid = %uuid, "Missing body. Skipping expanding embedded content and images.");
        return None;
    };

    let refs = match embedded_refs(body, accepted_types) {
        Ok(refs) => refs,
        Err(err) => {
            tracing::error!(transaction_id = %tid, uuid = %uuid, error = %err, "Cannot parse bodyXML for content");
            return None;
        }
    };

    if refs.is_empty() {
        return None;
    }
    Some(refs)
}

/// UUID of the main image reference, when present and extractable.
pub(crate) fn extract_main_image(content: &Content, tid: &str, uuid: &str) -> Option<String> {
    let Some(main_image) = content.get_object(MAIN_IMAGE_FIELD) else {
        debug!(transaction_id = %tid, uuid = %uuid, "Cannot find main image. Skipping expanding main image");
        return None;
    };

    let id = main_image.get(ID_FIELD).and_then(|v| v.as_str()).unwrap_or_default();
    match extract_uuid(id) {
        Ok(image_uuid) => Some(image_uuid),
        Err(err) => {
            tracing::error!(transaction_id = %tid, uuid = %uuid, error = %err, "Cannot find main image. Skipping expanding main image");
            None
        }
    }
}

/// UUID of the promotional image reference under `alternativeImages`.
/// A promotional image mapping without an `id` field is skipped silently.
pub(crate) fn extract_promotional_image(content: &Content, tid: &str, uuid: &str) -> Option<String> {
    let alt_images = content.get_object(ALT_IMAGES_FIELD)?;

    let Some(promotional) = alt_images
        .get(PROMOTIONAL_IMAGE_FIELD)
        .and_then(|v| v.as_object())
    else {
        debug!(transaction_id = %tid, uuid = %uuid, "Cannot find promotional image. Skipping expanding promotional image");
        return None;
    };

    let Some(id) = promotional.get(ID_FIELD).and_then(|v| v.as_str()) else {
        debug!(transaction_id = %tid, uuid = %uuid, "Promotional image is missing the id field. Skipping expanding promotional image");
        return None;
    };

    match extract_uuid(id) {
        Ok(promo_uuid) => Some(promo_uuid),
        Err(err) => {
            tracing::error!(transaction_id = %tid, uuid = %uuid, error = %err, "Cannot find promotional image. Skipping expanding promotional image");
            None
        }
    }
}

/// Resolution plan over the main image, body embeds and promotional image.
/// `None` when none of the three passes found anything to expand.
pub(crate) fn build_content_schema(
    content: &Content,
    accepted_types: &[&str],
    tid: &str,
    uuid: &str,
) -> Option<Schema> {
    let mut schema = Schema::new();

    if let Some(main_image) = extract_main_image(content, tid, uuid) {
        schema.set_main_image(main_image);
    }

    if let Some(embedded) = extract_embedded_by_type(content, accepted_types, tid, uuid) {
        schema.extend_embeds(embedded);
    }

    if let Some(promotional) = extract_promotional_image(content, tid, uuid) {
        schema.set_promotional_image(promotional);
    }

    if schema.is_empty() {
        debug!(transaction_id = %tid, uuid = %uuid, "No main image or promotional image or embedded content to expand for supplied content");
        return None;
    }
    Some(schema)
}
