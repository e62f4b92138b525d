//! Resolution plan for one unroll call
//!
//! Exactly four expansion roles exist: the main image, the promotional
//! image, lead images and body embeds. The plan is a closed struct rather
//! than an open map so nothing outside these roles can be recorded.

/// UUIDs to fetch for one unroll call, grouped by the field they expand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    main_image: Option<String>,
    promotional_image: Option<String>,
    lead_images: Vec<String>,
    embeds: Vec<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the main image UUID. Single-valued, first write wins.
    pub fn set_main_image(&mut self, uuid: String) {
        if self.main_image.is_none() {
            self.main_image = Some(uuid);
        }
    }

    /// Record the promotional image UUID. Single-valued, first write wins.
    pub fn set_promotional_image(&mut self, uuid: String) {
        if self.promotional_image.is_none() {
            self.promotional_image = Some(uuid);
        }
    }

    pub fn push_lead_image(&mut self, uuid: String) {
        self.lead_images.push(uuid);
    }

    pub fn extend_embeds(&mut self, uuids: impl IntoIterator<Item = String>) {
        self.embeds.extend(uuids);
    }

    pub fn main_image(&self) -> Option<&str> {
        self.main_image.as_deref()
    }

    pub fn promotional_image(&self) -> Option<&str> {
        self.promotional_image.as_deref()
    }

    pub fn lead_images(&self) -> &[String] {
        &self.lead_images
    }

    pub fn embeds(&self) -> &[String] {
        &self.embeds
    }

    /// Whether no extraction pass recorded anything.
    pub fn is_empty(&self) -> bool {
        self.main_image.is_none()
            && self.promotional_image.is_none()
            && self.lead_images.is_empty()
            && self.embeds.is_empty()
    }

    /// Flatten every role into the list of UUIDs for the batched fetch.
    pub fn to_uuids(&self) -> Vec<String> {
        let mut uuids = Vec::new();
        if let Some(mi) = &self.main_image {
            uuids.push(mi.clone());
        }
        if let Some(pi) = &self.promotional_image {
            uuids.push(pi.clone());
        }
        uuids.extend(self.lead_images.iter().cloned());
        uuids.extend(self.embeds.iter().cloned());
        uuids
    }
}
