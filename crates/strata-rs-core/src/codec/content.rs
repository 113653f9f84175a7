//! Message content as stored.
//!
//! Inline bytes travel as standard base64 text and URLs as-is. On the way
//! back a string containing `://` is taken to be a URL and anything else is
//! decoded as base64, so a URL without a scheme comes back as an error (or
//! as bytes, if it happens to be valid base64). Tool-call arguments are kept
//! as serialized JSON text.

use crate::error::TranscodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_rs_protocol::{ContentPart, DataContent, MessageContent};

const URL_MARKER: &str = "://";

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredContent {
    Text(String),
    Parts(Vec<StoredPart>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
enum StoredPart {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_options: Option<Value>,
    },
    Image {
        image: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_options: Option<Value>,
    },
    File {
        data: String,
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_options: Option<Value>,
    },
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_options: Option<Value>,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_options: Option<Value>,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_options: Option<Value>,
    },
}

/// Text form of a binary payload.
pub fn encode_data(data: &DataContent) -> String {
    match data {
        DataContent::Bytes(bytes) => STANDARD.encode(bytes),
        DataContent::Url(url) => url.clone(),
    }
}

/// Classify and decode the text form of a binary payload.
pub fn decode_data(raw: &str, field: &'static str) -> Result<DataContent, TranscodeError> {
    if raw.contains(URL_MARKER) {
        return Ok(DataContent::Url(raw.to_string()));
    }
    STANDARD
        .decode(raw)
        .map(DataContent::Bytes)
        .map_err(|source| TranscodeError::InvalidBase64 { field, source })
}

/// Convert content to its stored JSON value.
pub fn encode_content(content: &MessageContent) -> Result<Value, TranscodeError> {
    let stored = match content {
        MessageContent::Text(text) => StoredContent::Text(text.clone()),
        MessageContent::Parts(parts) => StoredContent::Parts(
            parts
                .iter()
                .map(encode_part)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    serde_json::to_value(stored).map_err(|source| TranscodeError::Json {
        field: "content",
        source,
    })
}

/// Rebuild content from its stored JSON value.
pub fn decode_content(value: Value) -> Result<MessageContent, TranscodeError> {
    let stored: StoredContent =
        serde_json::from_value(value).map_err(|source| TranscodeError::Json {
            field: "content",
            source,
        })?;
    match stored {
        StoredContent::Text(text) => Ok(MessageContent::Text(text)),
        StoredContent::Parts(parts) => parts
            .into_iter()
            .map(decode_part)
            .collect::<Result<Vec<_>, _>>()
            .map(MessageContent::Parts),
    }
}

fn encode_part(part: &ContentPart) -> Result<StoredPart, TranscodeError> {
    Ok(match part {
        ContentPart::Text {
            text,
            provider_options,
        } => StoredPart::Text {
            text: text.clone(),
            provider_options: provider_options.clone(),
        },
        ContentPart::Image {
            image,
            mime_type,
            provider_options,
        } => StoredPart::Image {
            image: encode_data(image),
            mime_type: mime_type.clone(),
            provider_options: provider_options.clone(),
        },
        ContentPart::File {
            data,
            mime_type,
            provider_options,
        } => StoredPart::File {
            data: encode_data(data),
            mime_type: mime_type.clone(),
            provider_options: provider_options.clone(),
        },
        ContentPart::Reasoning {
            text,
            signature,
            provider_options,
        } => StoredPart::Reasoning {
            text: text.clone(),
            signature: signature.clone(),
            provider_options: provider_options.clone(),
        },
        ContentPart::ToolCall {
            tool_call_id,
            tool_name,
            args,
            provider_options,
        } => StoredPart::ToolCall {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.clone(),
            args: serde_json::to_string(args).map_err(|source| TranscodeError::Json {
                field: "tool-call args",
                source,
            })?,
            provider_options: provider_options.clone(),
        },
        ContentPart::ToolResult {
            tool_call_id,
            tool_name,
            result,
            is_error,
            provider_options,
        } => StoredPart::ToolResult {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.clone(),
            result: result.clone(),
            is_error: *is_error,
            provider_options: provider_options.clone(),
        },
    })
}

fn decode_part(part: StoredPart) -> Result<ContentPart, TranscodeError> {
    Ok(match part {
        StoredPart::Text {
            text,
            provider_options,
        } => ContentPart::Text {
            text,
            provider_options,
        },
        StoredPart::Image {
            image,
            mime_type,
            provider_options,
        } => ContentPart::Image {
            image: decode_data(&image, "image")?,
            mime_type,
            provider_options,
        },
        StoredPart::File {
            data,
            mime_type,
            provider_options,
        } => ContentPart::File {
            data: decode_data(&data, "file data")?,
            mime_type,
            provider_options,
        },
        StoredPart::Reasoning {
            text,
            signature,
            provider_options,
        } => ContentPart::Reasoning {
            text,
            signature,
            provider_options,
        },
        StoredPart::ToolCall {
            tool_call_id,
            tool_name,
            args,
            provider_options,
        } => ContentPart::ToolCall {
            tool_call_id,
            tool_name,
            args: serde_json::from_str(&args).map_err(|source| TranscodeError::Json {
                field: "tool-call args",
                source,
            })?,
            provider_options,
        },
        StoredPart::ToolResult {
            tool_call_id,
            tool_name,
            result,
            is_error,
            provider_options,
        } => ContentPart::ToolResult {
            tool_call_id,
            tool_name,
            result,
            is_error,
            provider_options,
        },
    })
}
