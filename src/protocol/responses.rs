//! FTP Response handling
//!
//! Defines FTP response codes and formatting.

use std::fmt;

/// Standard FTP response codes
pub const FILE_STATUS_OK: u16 = 150;
pub const OK: u16 = 200;
pub const FEATURES: u16 = 211;
pub const FILE_STATUS: u16 = 213;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const PENDING_FURTHER_INFO: u16 = 350;
pub const SERVICE_NOT_AVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const LOCAL_ERROR: u16 = 451;
pub const SYNTAX_ERROR: u16 = 500;
pub const SYNTAX_ERROR_ARGS: u16 = 501;
pub const NOT_IMPLEMENTED: u16 = 502;
pub const BAD_SEQUENCE: u16 = 503;
pub const PARAMETER_NOT_IMPLEMENTED: u16 = 504;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;

/// A reply written to the control channel.
///
/// Single-line replies render as `code text\r\n`. Replies with extra lines
/// render in the RFC 959 multi-line form: `code-text`, the extra lines, then
/// `code End`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    text: String,
    lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            lines: Vec::new(),
        }
    }

    /// Multi-line reply. `lines` are sent verbatim between the opening and closing line.
    pub fn multiline(code: u16, text: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            code,
            text: text.into(),
            lines,
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return write!(f, "{} {}\r\n", self.code, self.text);
        }
        write!(f, "{}-{}\r\n", self.code, self.text)?;
        for line in &self.lines {
            write!(f, "{line}\r\n")?;
        }
        write!(f, "{} End\r\n", self.code)
    }
}

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    Reply::new(code, message).to_string()
}

/// Quote a path for 257 replies; embedded quotes are doubled per RFC 959.
pub fn quote_path(path: &str) -> String {
    format!("\"{}\"", path.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_reply_ends_with_crlf() {
        assert_eq!(format_response(OK, "NOOP ok."), "200 NOOP ok.\r\n");
    }

    #[test]
    fn multiline_reply_layout() {
        let reply = Reply::multiline(FEATURES, "Features:", vec![" SIZE".into(), " TVFS".into()]);
        assert_eq!(reply.to_string(), "211-Features:\r\n SIZE\r\n TVFS\r\n211 End\r\n");
    }

    #[test]
    fn quote_path_doubles_embedded_quotes() {
        assert_eq!(quote_path("/a\"b"), "\"/a\"\"b\"");
        assert_eq!(quote_path("/"), "\"/\"");
    }
}
