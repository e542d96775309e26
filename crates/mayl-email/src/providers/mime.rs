//! Raw MIME rendering for providers that accept a full RFC 5322 message
//!
//! Used by the SES adapter whenever a message carries attachments or custom
//! headers, which the simple-content API cannot express.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::traits::EmailMessage;

const LINE_WIDTH: usize = 76;

fn boundary(kind: &str) -> String {
    format!("----=_{}_{}", kind, uuid::Uuid::new_v4().simple())
}

/// Header values must never smuggle in extra header lines
fn sanitize_header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// RFC 2047 encoded-word for non-ASCII header values
fn encode_header_value(value: &str) -> String {
    let value = sanitize_header_value(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn wrapped_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 2);
    // base64 output is ASCII, so byte chunks are valid str slices
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

fn push_text_part(out: &mut String, content_type: &str, body: &str) {
    out.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", content_type));
    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
    out.push_str(&wrapped_base64(body.as_bytes()));
}

/// Writes the text/html body: `multipart/alternative` when both are present
fn push_body(out: &mut String, text: Option<&str>, html: Option<&str>) {
    match (text, html) {
        (Some(text), Some(html)) => {
            let alt = boundary("Alt");
            out.push_str(&format!(
                "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
                alt
            ));
            out.push_str(&format!("--{}\r\n", alt));
            push_text_part(out, "text/plain", text);
            out.push_str(&format!("--{}\r\n", alt));
            push_text_part(out, "text/html", html);
            out.push_str(&format!("--{}--\r\n", alt));
        }
        (None, Some(html)) => push_text_part(out, "text/html", html),
        (Some(text), None) => push_text_part(out, "text/plain", text),
        (None, None) => push_text_part(out, "text/plain", ""),
    }
}

/// Render `message` as raw MIME bytes.
///
/// Bcc recipients are deliberately absent from the headers; the caller passes
/// them to the provider as envelope destinations.
pub fn build_mime_message(message: &EmailMessage) -> Vec<u8> {
    let mut out = String::new();

    out.push_str(&format!(
        "From: {}\r\n",
        encode_header_value(&message.formatted_from())
    ));
    out.push_str(&format!(
        "To: {}\r\n",
        sanitize_header_value(&message.to.join(", "))
    ));
    if !message.cc.is_empty() {
        out.push_str(&format!(
            "Cc: {}\r\n",
            sanitize_header_value(&message.cc.join(", "))
        ));
    }
    if let Some(reply_to) = &message.reply_to {
        out.push_str(&format!("Reply-To: {}\r\n", sanitize_header_value(reply_to)));
    }
    out.push_str(&format!(
        "Subject: {}\r\n",
        encode_header_value(&message.subject)
    ));
    out.push_str("MIME-Version: 1.0\r\n");

    for (name, value) in &message.headers {
        let name = sanitize_header_value(name).replace(':', "");
        if name.is_empty() {
            continue;
        }
        out.push_str(&format!("{}: {}\r\n", name, encode_header_value(value)));
    }

    if message.attachments.is_empty() {
        push_body(&mut out, message.text_body(), message.html_body());
        return out.into_bytes();
    }

    let mixed = boundary("Mixed");
    out.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
        mixed
    ));

    out.push_str(&format!("--{}\r\n", mixed));
    push_body(&mut out, message.text_body(), message.html_body());

    for attachment in &message.attachments {
        let filename = sanitize_header_value(&attachment.filename).replace('"', "'");
        out.push_str(&format!("--{}\r\n", mixed));
        out.push_str(&format!(
            "Content-Type: {}; name=\"{}\"\r\n",
            attachment.content_type_or_default(),
            filename
        ));
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
            filename
        ));
        out.push_str(&wrapped_base64(&attachment.content));
    }

    out.push_str(&format!("--{}--\r\n", mixed));
    out.into_bytes()
}
