//! Session token extraction from esearch/epost XML
//!
//! Replies look like
//!
//! ```xml
//! <eSearchResult>
//!   <Count>2</Count><RetMax>2</RetMax><RetStart>0</RetStart>
//!   <QueryKey>1</QueryKey>
//!   <WebEnv>MCID_65f1a2...</WebEnv>
//!   <IdList><Id>28440906</Id><Id>28256074</Id></IdList>
//!   <TranslationStack>
//!     <TermSet><Term>foxo[TITLE]</Term><Count>4096</Count></TermSet>
//!   </TranslationStack>
//! </eSearchResult>
//! ```
//!
//! Only the first `Count`, `QueryKey` and `WebEnv` in document order count;
//! the per-term counts in the translation stack come later and are ignored.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument};

use crate::error::{EutilsError, Result};
use crate::eutils::models::HistoryReply;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Count,
    QueryKey,
    WebEnv,
    Error,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"Count" => Some(Field::Count),
            b"QueryKey" => Some(Field::QueryKey),
            b"WebEnv" => Some(Field::WebEnv),
            b"ERROR" => Some(Field::Error),
            _ => None,
        }
    }
}

/// Parse an esearch or epost reply into a [`HistoryReply`]
///
/// Token text is returned as it appears in the document (entities
/// unescaped, whitespace kept). An element that is present but empty is
/// reported as missing. Malformed XML, or a body without a root element,
/// is a `Parse` error.
///
/// # Example
///
/// ```
/// use eutils_session::parse_history_reply;
///
/// let xml = "<ePostResult><QueryKey>1</QueryKey><WebEnv>MCID_42</WebEnv></ePostResult>";
/// let token = parse_history_reply(xml)?.session_token()?;
/// assert_eq!(token.webenv, "MCID_42");
/// assert_eq!(token.query_key, "1");
/// # Ok::<(), eutils_session::EutilsError>(())
/// ```
#[instrument(skip(xml), fields(xml_len = xml.len()))]
pub fn parse_history_reply(xml: &str) -> Result<HistoryReply> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut reply = HistoryReply::default();
    let mut seen: Vec<Field> = Vec::with_capacity(4);
    let mut depth = 0usize;
    let mut has_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 1 {
                    has_root = true;
                    continue;
                }

                let Some(field) = Field::from_tag(e.name().as_ref()) else {
                    continue;
                };
                if seen.contains(&field) {
                    continue;
                }

                let text = read_element_text(&mut reader)?;
                depth -= 1;
                seen.push(field);
                store(&mut reply, field, text)?;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if !has_root {
        return Err(EutilsError::Parse("reply contains no XML element".to_string()));
    }

    debug!(
        count = ?reply.count,
        has_webenv = reply.webenv.is_some(),
        has_query_key = reply.query_key.is_some(),
        "Parsed history reply"
    );

    Ok(reply)
}

fn store(reply: &mut HistoryReply, field: Field, text: String) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }

    match field {
        Field::Count => {
            let count = text.trim().parse::<u64>().map_err(|_| {
                EutilsError::Parse(format!("<Count> is not a number: '{}'", text))
            })?;
            reply.count = Some(count);
        }
        Field::QueryKey => reply.query_key = Some(text),
        Field::WebEnv => reply.webenv = Some(text),
        Field::Error => reply.error = Some(text),
    }

    Ok(())
}

/// Collect all text up to the end of the element whose start tag was just read
fn read_element_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut depth = 1usize;

    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(text);
                }
            }
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::Eof => {
                return Err(EutilsError::Parse(
                    "document ended inside an element".to_string(),
                ));
            }
            _ => {}
        }
    }
}
