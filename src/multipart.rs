use std::fmt::{self, Display};

use anyhow::{Result, anyhow, bail};
use uuid::Uuid;

pub const DICOM_MEDIA_TYPE: &str = "application/dicom";
pub const RELATED_MEDIA_TYPE: &str = "multipart/related";

/// Token separating the parts of a `multipart/related` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn delimiter(&self) -> Vec<u8> {
        format!("--{}", self.0).into_bytes()
    }
}

impl Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writer for a `multipart/related; type=application/dicom` body (RFC 1341 framing, CRLF line endings).
///
/// Attachment bytes are copied verbatim. Nothing is escaped, so a part that
/// happens to contain `--<boundary>` corrupts the framing; use [`MultipartBody::collides`]
/// to detect that case before adding it.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: Boundary,
    buffer: Vec<u8>,
    parts: usize,
}

impl MultipartBody {
    pub fn new(boundary: Boundary) -> Self {
        Self {
            boundary,
            buffer: Vec::new(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    pub fn content_type(&self) -> String {
        format!(
            "{}; type={}; boundary={}",
            RELATED_MEDIA_TYPE, DICOM_MEDIA_TYPE, self.boundary
        )
    }

    pub fn collides(&self, content: &[u8]) -> bool {
        find(content, &self.boundary.delimiter(), 0).is_some()
    }

    pub fn add_dicom(&mut self, content: &[u8]) {
        self.buffer
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buffer
            .extend_from_slice(format!("Content-Length: {}\r\n", content.len()).as_bytes());
        self.buffer
            .extend_from_slice(format!("Content-Type: {}\r\n\r\n", DICOM_MEDIA_TYPE).as_bytes());
        self.buffer.extend_from_slice(content);
        self.buffer.extend_from_slice(b"\r\n");
        self.parts += 1;
    }

    /// Appends the closing delimiter. No CRLF follows it.
    pub fn finish(mut self) -> Vec<u8> {
        self.buffer
            .extend_from_slice(format!("--{}--", self.boundary).as_bytes());
        self.buffer
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")?.parse().ok()
    }
}

/// Media type of a `Content-Type` header value, lowercased and without parameters.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Splits a `multipart/related` body into its parts.
///
/// Lines may end with CRLF or a bare LF. When a part declares a
/// `Content-Length` that fits in the body, exactly that many bytes are taken
/// as its payload and only a line break may follow before the next delimiter;
/// otherwise the payload runs up to the next delimiter.
pub fn parse_related(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}").into_bytes();
    let Some(mut start) = find(body, &delimiter, 0) else {
        bail!("Multipart body does not contain the boundary '{}'", boundary);
    };

    let mut parts = Vec::new();
    loop {
        let after = start + delimiter.len();
        if body[after..].starts_with(b"--") {
            return Ok(parts);
        }

        let headers_start = find(body, b"\n", after)
            .map(|newline| newline + 1)
            .ok_or_else(|| anyhow!("Truncated multipart body after part {}", parts.len()))?;
        let (headers, content_start) = parse_headers(body, headers_start)?;
        let mut part = Part {
            headers,
            body: Vec::new(),
        };

        let declared_end = part
            .content_length()
            .and_then(|len| content_start.checked_add(len))
            .filter(|end| *end <= body.len());

        let next = find(body, &delimiter, declared_end.unwrap_or(content_start)).ok_or_else(
            || anyhow!("Multipart body is missing its closing boundary '{}'", boundary),
        )?;

        let content = match declared_end {
            Some(end) => {
                if !strip_line_break(&body[end..next]).is_empty() {
                    bail!(
                        "Part {} is longer than its declared Content-Length of {} bytes",
                        parts.len() + 1,
                        end - content_start
                    );
                }
                &body[content_start..end]
            }
            None => strip_line_break(&body[content_start..next]),
        };
        part.body = content.to_vec();
        parts.push(part);
        start = next;
    }
}

fn parse_headers(body: &[u8], mut pos: usize) -> Result<(Vec<(String, String)>, usize)> {
    let mut headers = Vec::new();
    loop {
        let newline = find(body, b"\n", pos)
            .ok_or_else(|| anyhow!("Truncated multipart headers"))?;
        let line = String::from_utf8_lossy(strip_carriage_return(&body[pos..newline]));
        pos = newline + 1;

        if line.is_empty() {
            return Ok((headers, pos));
        }

        match line.split_once(':') {
            Some((name, value)) => {
                headers.push((name.trim().to_string(), value.trim().to_string()))
            }
            None => bail!("Malformed multipart header line: {}", line),
        }
    }
}

fn strip_carriage_return(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn strip_line_break(content: &[u8]) -> &[u8] {
    content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .unwrap_or(content)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    #[test]
    fn test_body_round_trips_every_part() {
        let files: [&[u8]; 3] = [b"DICM\x00\x01\x02\r\n\xff", b"", b"second\nfile"];

        let mut body = MultipartBody::new(Boundary::new("b0undary"));
        for file in files {
            body.add_dicom(file);
        }
        assert_eq!(body.parts(), 3);
        let bytes = body.finish();

        let parts = parse_related(&bytes, "b0undary").unwrap();
        assert_eq!(parts.len(), 3);
        for (part, file) in parts.iter().zip(files) {
            assert_eq!(part.body, file);
            assert_eq!(part.header("content-length"), Some(file.len().to_string().as_str()));
            assert_eq!(part.header("Content-Type"), Some(DICOM_MEDIA_TYPE));
        }
        assert_eq!(occurrences(&bytes, b"--b0undary\r\n"), 3);
    }

    #[test]
    fn test_closing_delimiter_appears_once_at_the_end() {
        let mut body = MultipartBody::new(Boundary::new("xyz"));
        body.add_dicom(b"one");
        body.add_dicom(b"two");
        let bytes = body.finish();

        assert!(bytes.ends_with(b"\r\n--xyz--"));
        assert_eq!(occurrences(&bytes, b"--xyz--"), 1);
    }

    #[test]
    fn test_empty_body_is_only_the_closing_delimiter() {
        let body = MultipartBody::new(Boundary::new("empty"));
        assert_eq!(body.parts(), 0);

        let bytes = body.finish();
        assert_eq!(bytes, b"--empty--");
        assert!(parse_related(&bytes, "empty").unwrap().is_empty());
    }

    #[test]
    fn test_exact_framing_of_a_single_part() {
        let mut body = MultipartBody::new(Boundary::new("B"));
        body.add_dicom(b"abc");
        assert_eq!(
            body.finish(),
            b"--B\r\nContent-Length: 3\r\nContent-Type: application/dicom\r\n\r\nabc\r\n--B--"
        );
    }

    #[test]
    fn test_content_type_names_the_boundary() {
        let body = MultipartBody::new(Boundary::new("1234"));
        assert_eq!(
            body.content_type(),
            "multipart/related; type=application/dicom; boundary=1234"
        );
    }

    #[test]
    fn test_random_boundaries_differ() {
        assert_ne!(Boundary::random(), Boundary::random());
    }

    #[test]
    fn test_collision_is_detected() {
        let body = MultipartBody::new(Boundary::new("abc"));
        assert!(body.collides(b"prefix--abcsuffix"));
        assert!(!body.collides(b"prefix-abc"));
    }

    #[test]
    fn test_parse_lf_only_body_without_content_length() {
        let body = b"--BOUNDARY_123456789\nContent-Type: application/dicom\n\nDICOM\n--BOUNDARY_123456789--\n";
        let parts = parse_related(body, "BOUNDARY_123456789").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"DICOM");
    }

    #[test]
    fn test_parse_skips_preamble() {
        let body = b"preamble\r\n--b\r\nContent-Type: application/dicom\r\n\r\nx\r\n--b--\r\n";
        let parts = parse_related(body, "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"x");
    }

    #[test]
    fn test_parse_rejects_missing_boundary() {
        assert!(parse_related(b"no parts here", "b").is_err());
    }

    #[test]
    fn test_parse_ignores_content_length_beyond_the_body() {
        let body = b"--b\r\nContent-Length: 18446744073709551615\r\n\r\nDICM\r\n--b--";
        let parts = parse_related(body, "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"DICM");

        let body = b"--b\r\nContent-Length: 4096\r\n\r\nDICM\r\n--b--";
        assert_eq!(parse_related(body, "b").unwrap()[0].body, b"DICM");
    }

    #[test]
    fn test_parse_rejects_payload_longer_than_content_length() {
        let body = b"--b\r\nContent-Length: 2\r\n\r\nDICM\r\n--b--";
        let err = parse_related(body, "b").unwrap_err();
        assert!(err.to_string().contains("Content-Length of 2 bytes"));
    }

    #[test]
    fn test_parse_rejects_content_length_running_into_the_delimiter() {
        let body = b"--b\r\nContent-Length: 8\r\n\r\nDICM\r\n--b--";
        assert!(parse_related(body, "b").is_err());
    }

    #[test]
    fn test_parse_rejects_unterminated_body() {
        let body = b"--b\r\nContent-Type: application/dicom\r\n\r\ndata";
        assert!(parse_related(body, "b").is_err());
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/related; type=application/dicom; boundary=abc"),
            Some("abc".to_string())
        );
        assert_eq!(
            boundary_from_content_type(r#"multipart/related;BOUNDARY="quoted-1";type="application/dicom""#),
            Some("quoted-1".to_string())
        );
        assert_eq!(boundary_from_content_type("application/dicom"), None);
        assert_eq!(boundary_from_content_type("multipart/related; boundary="), None);
    }

    #[test]
    fn test_media_type() {
        assert_eq!(
            media_type("Multipart/Related; boundary=x"),
            "multipart/related"
        );
        assert_eq!(media_type("application/json"), "application/json");
    }
}
