//! Response rendering.
//!
//! Output is a pure function of the [`Response`]: rendering the same
//! response twice yields identical bytes.

use std::fmt::Write as _;
use std::io;

use crate::engine::types::{Response, ResponseBody};

/// Render a response as status line, headers, blank line and body.
pub fn render_response(response: &Response) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{} {}", response.protocol, response.status);
    for (name, value) in &response.headers {
        let _ = writeln!(out, "{}: {}", name, value);
    }
    out.push('\n');

    match &response.body {
        ResponseBody::Binary { content_type, .. } => {
            let _ = writeln!(out, "Image response received. Content-Type: {}", content_type);
        }
        ResponseBody::Text(text) => {
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}

/// Write one response with its request banner.
pub fn write_response<W: io::Write>(
    out: &mut W,
    method: &str,
    target: &str,
    response: &Response,
) -> io::Result<()> {
    writeln!(out, "Response from {} {}:", method, target)?;
    writeln!(out)?;
    out.write_all(render_response(response).as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &[(&str, &str)], body: ResponseBody) -> Response {
        Response {
            protocol: "HTTP/1.1".into(),
            status: 200,
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body,
        }
    }

    #[test]
    fn test_header_order_preserved() {
        let r = response(
            &[("a", "1"), ("b", "2"), ("c", "3")],
            ResponseBody::Text("ok".into()),
        );
        assert_eq!(render_response(&r), "HTTP/1.1 200\na: 1\nb: 2\nc: 3\n\nok\n");
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let r = response(
            &[("content-type", "application/json"), ("x-id", "7")],
            ResponseBody::Text("{\"a\":1}".into()),
        );
        assert_eq!(render_response(&r), render_response(&r));
    }

    #[test]
    fn test_image_placeholder() {
        let r = response(
            &[("content-type", "image/png")],
            ResponseBody::Binary {
                content_type: "image/png".into(),
                length: 42,
            },
        );
        let rendered = render_response(&r);
        assert!(rendered.ends_with("\n\nImage response received. Content-Type: image/png\n"));
    }

    #[test]
    fn test_write_response_banner() {
        let r = response(&[], ResponseBody::Text(String::new()));
        let mut out = Vec::new();
        write_response(&mut out, "GET", "http://h/x", &r).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Response from GET http://h/x:\n\nHTTP/1.1 200\n\n\n"
        );
    }
}
