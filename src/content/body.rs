//! Body XML scanning
//!
//! Rich-text bodies carry embedded references as `ft-content` elements:
//!
//! ```text
//! <ft-content type="http://www.ft.com/ontology/content/ImageSet"
//!             url="http://api.ft.com/content/639cd952-..."
//!             data-embedded="true"></ft-content>
//! ```
//!
//! A marker counts only when `data-embedded` is the literal `true` and its
//! `type` is one of the accepted types. Markers are collected in document
//! order and duplicates are preserved.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::content::extract_uuid;
use crate::types::{Result, UnrollError};

const EMBED_TAG: &[u8] = b"ft-content";
const EMBEDDED_ATTR: &[u8] = b"data-embedded";
const TYPE_ATTR: &[u8] = b"type";
const URL_ATTR: &[u8] = b"url";

/// Collect the UUIDs of embedded references of the accepted types from a
/// body XML fragment.
///
/// A body without element structure yields no references. A body that is
/// not parseable as XML is an error for the caller to downgrade; a single
/// marker with a malformed identifier is skipped and scanning continues.
pub fn embedded_refs(body: &str, accepted_types: &[&str]) -> Result<Vec<String>> {
    let mut refs = Vec::new();
    if body.is_empty() {
        return Ok(refs);
    }

    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == EMBED_TAG {
                    if let Some(url) = embed_url(&e, accepted_types) {
                        match extract_uuid(&url) {
                            Ok(uuid) => refs.push(uuid),
                            Err(err) => {
                                debug!(url = %url, error = %err, "Skipping embed marker with malformed identifier");
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(UnrollError::BodyParsing(err.to_string())),
        }
    }

    Ok(refs)
}

/// The `url` attribute of a marker, provided the node is flagged as
/// embedded and carries an accepted content type.
fn embed_url(element: &BytesStart<'_>, accepted_types: &[&str]) -> Option<String> {
    let mut embedded = false;
    let mut type_accepted = false;
    let mut url = None;

    for attr in element.attributes().with_checks(false) {
        let attr = match attr {
            Ok(attr) => attr,
            Err(_) => continue,
        };
        let value = match attr.unescape_value() {
            Ok(value) => value,
            Err(_) => continue,
        };
        match attr.key.as_ref() {
            EMBEDDED_ATTR => embedded = value.as_ref() == "true",
            TYPE_ATTR => type_accepted = accepted_types.contains(&value.as_ref()),
            URL_ATTR => url = Some(value.into_owned()),
            _ => {}
        }
    }

    if embedded && type_accepted {
        url
    } else {
        None
    }
}
