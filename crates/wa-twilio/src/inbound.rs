//! Normalization of Twilio webhook form fields

use std::collections::HashMap;

use wa_core::{Inbound, InboundMessage, MessagesConfig};

use crate::error::{Result, TwilioError};

/// Twilio never sends more than this many media items per message
const MAX_MEDIA: usize = 10;

/// Channel prefix Twilio puts in front of WhatsApp addresses
const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Turn `whatsapp:+5216181234567` into `5216181234567`
pub fn normalize_sender(from: &str) -> String {
    let from = from.trim();
    let from = from.strip_prefix(WHATSAPP_PREFIX).unwrap_or(from).trim();
    from.strip_prefix('+').unwrap_or(from).to_string()
}

/// First `image/*` media URL among `MediaUrl{i}` / `MediaContentType{i}`
pub fn first_image_url(fields: &HashMap<String, String>) -> Option<String> {
    let num_media = fields
        .get("NumMedia")
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(0)
        .min(MAX_MEDIA);

    (0..num_media).find_map(|i| {
        let content_type = fields.get(&format!("MediaContentType{}", i))?;
        if !content_type.trim().to_lowercase().starts_with("image/") {
            return None;
        }
        fields
            .get(&format!("MediaUrl{}", i))
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
    })
}

/// Normalize a Twilio webhook into an [`Inbound`]
///
/// Status callbacks (a `MessageStatus` without body or media) are ignored.
pub fn normalize(fields: &HashMap<String, String>, messages: &MessagesConfig) -> Result<Inbound> {
    let body = fields.get("Body").map(|b| b.trim()).unwrap_or_default();
    let media_url = first_image_url(fields);

    if fields.contains_key("MessageStatus") && !fields.contains_key("Body") && media_url.is_none() {
        return Ok(Inbound::Ignored);
    }

    let from = fields
        .get("From")
        .map(|f| normalize_sender(f))
        .filter(|f| !f.is_empty())
        .ok_or_else(|| TwilioError::InvalidPayload("missing From field".to_string()))?;

    let text = if body.is_empty() {
        messages.default_text.clone()
    } else {
        body.to_string()
    };

    let mut message = InboundMessage::text(from, text);
    message.media_url = media_url;

    Ok(Inbound::Message(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_sender() {
        assert_eq!(normalize_sender("whatsapp:+5216181234567"), "5216181234567");
        assert_eq!(normalize_sender("+14155238886"), "14155238886");
        assert_eq!(normalize_sender("5216181234567"), "5216181234567");
    }

    #[test]
    fn test_text_message() {
        let inbound = normalize(
            &fields(&[
                ("From", "whatsapp:+5216181234567"),
                ("Body", " Hola "),
                ("NumMedia", "0"),
            ]),
            &MessagesConfig::default(),
        )
        .unwrap();

        assert_eq!(
            inbound,
            Inbound::Message(InboundMessage::text("5216181234567", "Hola"))
        );
    }

    #[test]
    fn test_missing_body_uses_placeholder() {
        let inbound = normalize(
            &fields(&[("From", "whatsapp:+5216181234567")]),
            &MessagesConfig::default(),
        )
        .unwrap();

        match inbound {
            Inbound::Message(message) => assert_eq!(message.text, "Hola"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_first_image_selected_regardless_of_position() {
        let inbound = normalize(
            &fields(&[
                ("From", "whatsapp:+5216181234567"),
                ("Body", ""),
                ("NumMedia", "3"),
                ("MediaUrl0", "https://api.twilio.com/media/audio"),
                ("MediaContentType0", "audio/ogg"),
                ("MediaUrl1", "https://api.twilio.com/media/photo1"),
                ("MediaContentType1", "image/jpeg"),
                ("MediaUrl2", "https://api.twilio.com/media/photo2"),
                ("MediaContentType2", "image/png"),
            ]),
            &MessagesConfig::default(),
        )
        .unwrap();

        match inbound {
            Inbound::Message(message) => {
                assert_eq!(
                    message.media_url.as_deref(),
                    Some("https://api.twilio.com/media/photo1")
                );
                assert_eq!(message.text, "Hola");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_non_image_media_ignored() {
        let f = fields(&[
            ("From", "whatsapp:+5216181234567"),
            ("Body", "mira"),
            ("NumMedia", "1"),
            ("MediaUrl0", "https://api.twilio.com/media/doc"),
            ("MediaContentType0", "application/pdf"),
        ]);
        assert_eq!(first_image_url(&f), None);
    }

    #[test]
    fn test_num_media_bounds_lookup() {
        // MediaUrl1 exists but NumMedia says only one item
        let f = fields(&[
            ("NumMedia", "1"),
            ("MediaUrl0", "https://api.twilio.com/media/audio"),
            ("MediaContentType0", "audio/ogg"),
            ("MediaUrl1", "https://api.twilio.com/media/photo"),
            ("MediaContentType1", "image/jpeg"),
        ]);
        assert_eq!(first_image_url(&f), None);

        let f = fields(&[
            ("NumMedia", "abc"),
            ("MediaUrl0", "https://api.twilio.com/media/photo"),
            ("MediaContentType0", "image/jpeg"),
        ]);
        assert_eq!(first_image_url(&f), None);
    }

    #[test]
    fn test_status_callback_ignored() {
        let inbound = normalize(
            &fields(&[
                ("From", "whatsapp:+14155238886"),
                ("MessageStatus", "delivered"),
                ("MessageSid", "SM123"),
            ]),
            &MessagesConfig::default(),
        )
        .unwrap();
        assert_eq!(inbound, Inbound::Ignored);
    }

    #[test]
    fn test_missing_from_is_invalid() {
        let result = normalize(&fields(&[("Body", "Hola")]), &MessagesConfig::default());
        assert!(matches!(result, Err(TwilioError::InvalidPayload(_))));
    }
}
