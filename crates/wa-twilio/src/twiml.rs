//! TwiML messaging responses

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::error;

use crate::error::{Result, TwilioError};

/// Content type Twilio expects for TwiML
pub const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Longest `<Message>` body Twilio accepts for WhatsApp
pub const MAX_BODY_CHARS: usize = 1600;

/// Served when TwiML generation itself fails
const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| TwilioError::Xml(e.to_string()))
}

/// Build `<Response><Message>text</Message></Response>`
///
/// With `None` the document has no message, which tells Twilio not to reply.
pub fn message_response(text: Option<&str>) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    write_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_event(&mut writer, Event::Start(BytesStart::new("Response")))?;

    if let Some(text) = text {
        write_event(&mut writer, Event::Start(BytesStart::new("Message")))?;
        write_event(&mut writer, Event::Text(BytesText::new(text)))?;
        write_event(&mut writer, Event::End(BytesEnd::new("Message")))?;
    }

    write_event(&mut writer, Event::End(BytesEnd::new("Response")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| TwilioError::Xml(e.to_string()))
}

/// HTTP response carrying a TwiML document
pub fn twiml_response(text: Option<&str>) -> Response {
    let body = message_response(text).unwrap_or_else(|e| {
        error!("{}", e);
        EMPTY_TWIML.to_string()
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)],
        body,
    )
        .into_response()
}
