use core::fmt;

use crate::http::request::{HttpRequest, HttpVersion, Method};
use crate::utils::{find_crlf, find_subsequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    Line,
    Headers,
    Body,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    NeedMore,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    MalformedRequestLine,
    InvalidMethod,
    InvalidVersion,
    InvalidUri,
    MalformedHeader,
    InvalidHeaderName,
    InvalidHeaderValue,
    InvalidChunkSize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
            ParseError::InvalidMethod => write!(f, "invalid HTTP method"),
            ParseError::InvalidVersion => write!(f, "invalid HTTP version"),
            ParseError::InvalidUri => write!(f, "invalid request target"),
            ParseError::MalformedHeader => write!(f, "malformed header line"),
            ParseError::InvalidHeaderName => write!(f, "invalid header name"),
            ParseError::InvalidHeaderValue => write!(f, "invalid header value"),
            ParseError::InvalidChunkSize => write!(f, "invalid chunk size"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Incremental HTTP/1.1 request parser.
///
/// Bytes are handed in through [`feed`](HttpParser::feed) in whatever
/// slices the socket produces; the parser keeps unconsumed input and the
/// current phase across calls. `Complete` and `Error` are sticky until
/// [`reset`](HttpParser::reset).
#[derive(Debug)]
pub struct HttpParser {
    phase: ParsePhase,
    buffer: Vec<u8>,
    bytes_parsed: usize,
    error: Option<ParseError>,
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpParser {
    pub fn new() -> Self {
        HttpParser {
            phase: ParsePhase::Line,
            buffer: Vec::with_capacity(4096),
            bytes_parsed: 0,
            error: None,
        }
    }

    pub fn reset(&mut self) {
        self.phase = ParsePhase::Line;
        self.buffer.clear();
        self.bytes_parsed = 0;
        self.error = None;
    }

    pub fn phase(&self) -> ParsePhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ParsePhase::Complete
    }

    pub fn has_error(&self) -> bool {
        self.phase == ParsePhase::Error
    }

    pub fn bytes_parsed(&self) -> usize {
        self.bytes_parsed
    }

    pub fn feed(
        &mut self,
        request: &mut HttpRequest,
        data: &[u8],
    ) -> Result<ParseStatus, ParseError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.phase == ParsePhase::Complete {
            return Ok(ParseStatus::Complete);
        }

        self.buffer.extend_from_slice(data);
        self.bytes_parsed += data.len();

        match self.advance(request) {
            Ok(status) => Ok(status),
            Err(error) => {
                self.phase = ParsePhase::Error;
                self.error = Some(error);
                request.is_valid = false;
                Err(error)
            }
        }
    }

    fn advance(&mut self, request: &mut HttpRequest) -> Result<ParseStatus, ParseError> {
        loop {
            match self.phase {
                ParsePhase::Line => {
                    let Some(end) = find_crlf(&self.buffer, 0) else {
                        return Ok(ParseStatus::NeedMore);
                    };
                    let line = self.buffer[..end].to_vec();
                    self.buffer.drain(..end + 2);
                    self.parse_request_line(request, &line)?;
                    self.phase = ParsePhase::Headers;
                }
                ParsePhase::Headers => {
                    let Some(end) = find_crlf(&self.buffer, 0) else {
                        return Ok(ParseStatus::NeedMore);
                    };
                    let line = self.buffer[..end].to_vec();
                    self.buffer.drain(..end + 2);

                    if line.is_empty() {
                        self.phase = ParsePhase::Body;
                    } else {
                        self.parse_header_line(request, &line)?;
                    }
                }
                ParsePhase::Body => match self.parse_body(request)? {
                    ParseStatus::Complete => {
                        self.complete(request);
                        return Ok(ParseStatus::Complete);
                    }
                    ParseStatus::NeedMore => return Ok(ParseStatus::NeedMore),
                },
                ParsePhase::Complete => return Ok(ParseStatus::Complete),
                ParsePhase::Error => return Err(self.error.unwrap_or(ParseError::MalformedHeader)),
            }
        }
    }

    fn complete(&mut self, request: &mut HttpRequest) {
        self.phase = ParsePhase::Complete;
        request.is_complete = true;
        request.is_valid = true;
    }

    fn parse_request_line(
        &mut self,
        request: &mut HttpRequest,
        line: &[u8],
    ) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedRequestLine)?;

        // Tokens are separated by single spaces; doubled spaces produce an
        // empty token and fail the count check.
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() != 3 {
            return Err(ParseError::MalformedRequestLine);
        }

        let method = Method::from_token(parts[0]);
        if method == Method::Unknown {
            return Err(ParseError::InvalidMethod);
        }

        let target = parts[1];
        if target.is_empty()
            || !target.starts_with('/')
            || target.bytes().any(|b| !(0x20..=0x7e).contains(&b))
        {
            return Err(ParseError::InvalidUri);
        }

        let version = HttpVersion::from_token(parts[2]);
        if version == HttpVersion::Unknown {
            return Err(ParseError::InvalidVersion);
        }

        request.method = method;
        request.set_uri(target);
        request.version = version;
        Ok(())
    }

    fn parse_header_line(
        &mut self,
        request: &mut HttpRequest,
        line: &[u8],
    ) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedHeader)?;

        let colon = line.find(':').ok_or(ParseError::MalformedHeader)?;
        let name = line[..colon].trim();
        let value = line[colon + 1..].trim();

        if name.is_empty()
            || !name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ParseError::InvalidHeaderName);
        }

        request.add_header(name, value);

        let lower = name.to_ascii_lowercase();
        if lower == "content-length" {
            request.content_length = value
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidHeaderValue)? as usize;
        } else if lower == "transfer-encoding" {
            request.is_chunked = value.to_ascii_lowercase() == "chunked";
        }

        Ok(())
    }

    fn parse_body(&mut self, request: &mut HttpRequest) -> Result<ParseStatus, ParseError> {
        // GET and DELETE carry no body.
        if matches!(request.method, Method::Get | Method::Delete) {
            return Ok(ParseStatus::Complete);
        }

        if request.is_chunked {
            return self.parse_chunked_body(request);
        }

        if request.content_length == 0 {
            return Ok(ParseStatus::Complete);
        }

        if self.buffer.len() < request.content_length {
            return Ok(ParseStatus::NeedMore);
        }

        request.body = self.buffer.drain(..request.content_length).collect();
        Ok(ParseStatus::Complete)
    }

    /// RFC 7230 §4.1 subset. Appends payload bytes to the request body;
    /// size lines, separators and extensions never reach it.
    fn parse_chunked_body(&mut self, request: &mut HttpRequest) -> Result<ParseStatus, ParseError> {
        loop {
            let Some(line_end) = find_crlf(&self.buffer, 0) else {
                return Ok(ParseStatus::NeedMore);
            };

            let size_line = std::str::from_utf8(&self.buffer[..line_end])
                .map_err(|_| ParseError::InvalidChunkSize)?;
            let size_text = match size_line.find(';') {
                Some(pos) => &size_line[..pos],
                None => size_line,
            };
            let chunk_size = usize::from_str_radix(size_text.trim(), 16)
                .map_err(|_| ParseError::InvalidChunkSize)?;

            if chunk_size == 0 {
                // The terminating empty line (and any trailers) end with a
                // blank CRLF CRLF sequence starting at the size line's CRLF.
                let Some(end) = find_subsequence(&self.buffer, b"\r\n\r\n", line_end) else {
                    return Ok(ParseStatus::NeedMore);
                };
                self.buffer.drain(..end + 4);
                request.chunked_complete = true;
                return Ok(ParseStatus::Complete);
            }

            let frame_len = line_end + 2 + chunk_size + 2;
            if self.buffer.len() < frame_len {
                return Ok(ParseStatus::NeedMore);
            }

            request
                .body
                .extend_from_slice(&self.buffer[line_end + 2..line_end + 2 + chunk_size]);
            self.buffer.drain(..frame_len);
        }
    }
}
