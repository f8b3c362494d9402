//! Request body encoders.

use bytes::{BufMut, Bytes, BytesMut};
use url::form_urlencoded;

use crate::request::{ParamValue, Params};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Multipart when any param is a file, url-encoded otherwise. `None` when
/// there is nothing to send.
pub fn encode(params: &Params) -> Option<EncodedBody> {
    if params.is_empty() {
        return None;
    }
    if params
        .values()
        .any(|value| matches!(value, ParamValue::File(_)))
    {
        let boundary = uuid::Uuid::new_v4().simple().to_string();
        Some(encode_multipart(params, &boundary))
    } else {
        Some(encode_url_encoded(params))
    }
}

pub fn encode_url_encoded(params: &Params) -> EncodedBody {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(
            params
                .iter()
                .filter_map(|(key, value)| value.as_text().map(|text| (key, text))),
        )
        .finish();
    EncodedBody {
        content_type: "application/x-www-form-urlencoded".to_string(),
        bytes: Bytes::from(body),
    }
}

pub fn encode_multipart(params: &Params, boundary: &str) -> EncodedBody {
    let mut out = BytesMut::new();
    for (name, value) in params {
        out.put_slice(format!("--{boundary}\r\n").as_bytes());
        match value {
            ParamValue::Text(text) => {
                out.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        escape_quoted(name)
                    )
                    .as_bytes(),
                );
                out.put_slice(text.as_bytes());
            }
            ParamValue::File(file) => {
                out.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        escape_quoted(name),
                        escape_quoted(file.file_name()),
                        file.content_type()
                    )
                    .as_bytes(),
                );
                out.put_slice(file.contents());
            }
        }
        out.put_slice(b"\r\n");
    }
    out.put_slice(format!("--{boundary}--\r\n").as_bytes());

    EncodedBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes: out.freeze(),
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}
