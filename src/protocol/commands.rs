//! Module `command`
//!
//! Defines the core FTP command parsing logic and related data structures
//! used to represent commands, their status, and results.

use crate::protocol::responses::Reply;

/// Represents an FTP command parsed from the client input.
///
/// Commands that take an argument store it verbatim: everything after the
/// first space of the line, without the trailing CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    USER(String),
    PASS(String),
    PWD,
    CWD(String),
    CDUP,
    LIST(Option<String>),
    NLST(Option<String>),
    RETR(String),
    STOR(String),
    DELE(String),
    RNFR(String),
    RNTO(String),
    MKD(String),
    RMD(String),
    SIZE(String),
    TYPE(String),
    PASV,
    PORT(String),
    QUIT,
    SYST,
    FEAT,
    NOOP,
    /// A known verb issued without its mandatory argument.
    MissingArgument(String),
    /// Blank line.
    EMPTY,
    /// Unknown or unsupported verb.
    UNKNOWN(String),
}

/// Represents the outcome status of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub reply: Reply,
}

impl CommandResult {
    pub fn success(reply: Reply) -> Self {
        Self {
            status: CommandStatus::Success,
            reply,
        }
    }

    pub fn failure(reply: Reply) -> Self {
        Self {
            status: CommandStatus::Failure(reply.text().to_string()),
            reply,
        }
    }

    pub fn close(reply: Reply) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            reply,
        }
    }
}

impl Command {
    /// Verb as sent on the wire, upper-cased.
    pub fn verb(&self) -> &str {
        match self {
            Command::USER(_) => "USER",
            Command::PASS(_) => "PASS",
            Command::PWD => "PWD",
            Command::CWD(_) => "CWD",
            Command::CDUP => "CDUP",
            Command::LIST(_) => "LIST",
            Command::NLST(_) => "NLST",
            Command::RETR(_) => "RETR",
            Command::STOR(_) => "STOR",
            Command::DELE(_) => "DELE",
            Command::RNFR(_) => "RNFR",
            Command::RNTO(_) => "RNTO",
            Command::MKD(_) => "MKD",
            Command::RMD(_) => "RMD",
            Command::SIZE(_) => "SIZE",
            Command::TYPE(_) => "TYPE",
            Command::PASV => "PASV",
            Command::PORT(_) => "PORT",
            Command::QUIT => "QUIT",
            Command::SYST => "SYST",
            Command::FEAT => "FEAT",
            Command::NOOP => "NOOP",
            Command::MissingArgument(verb) | Command::UNKNOWN(verb) => verb,
            Command::EMPTY => "",
        }
    }

    /// Whether the command may run before a successful login.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            Command::USER(_)
                | Command::PASS(_)
                | Command::QUIT
                | Command::SYST
                | Command::FEAT
                | Command::NOOP
                | Command::EMPTY
                | Command::UNKNOWN(_)
                | Command::MissingArgument(_)
        )
    }

    /// Text suitable for logs. The PASS argument is masked.
    pub fn loggable(&self) -> String {
        match self {
            Command::PASS(_) => "PASS ****".to_string(),
            Command::USER(a)
            | Command::CWD(a)
            | Command::RETR(a)
            | Command::STOR(a)
            | Command::DELE(a)
            | Command::RNFR(a)
            | Command::RNTO(a)
            | Command::MKD(a)
            | Command::RMD(a)
            | Command::SIZE(a)
            | Command::TYPE(a)
            | Command::PORT(a) => format!("{} {}", self.verb(), a),
            Command::LIST(Some(a)) | Command::NLST(Some(a)) => format!("{} {}", self.verb(), a),
            _ => self.verb().to_string(),
        }
    }
}

/// Parses a raw command line received from a client into the `Command` enum.
///
/// The verb is case-insensitive. Known verbs that need an argument but were
/// sent without one become [`Command::MissingArgument`].
pub fn parse_command(raw: &str) -> Command {
    let line = raw.trim_end_matches(['\r', '\n']);
    let (verb, arg) = match line.split_once(' ') {
        Some((verb, arg)) => (verb, arg),
        None => (line, ""),
    };
    let cmd = verb.trim().to_ascii_uppercase();

    if cmd.is_empty() {
        return Command::EMPTY;
    }

    let required = |ctor: fn(String) -> Command| {
        if arg.is_empty() {
            Command::MissingArgument(cmd.clone())
        } else {
            ctor(arg.to_string())
        }
    };
    let optional = || {
        if arg.trim().is_empty() {
            None
        } else {
            Some(arg.to_string())
        }
    };

    match cmd.as_str() {
        "USER" => required(Command::USER),
        // An empty password is still a password attempt.
        "PASS" => Command::PASS(arg.to_string()),
        "PWD" | "XPWD" => Command::PWD,
        "CWD" | "XCWD" => required(Command::CWD),
        "CDUP" | "XCUP" => Command::CDUP,
        "LIST" => Command::LIST(optional()),
        "NLST" => Command::NLST(optional()),
        "RETR" => required(Command::RETR),
        "STOR" => required(Command::STOR),
        "DELE" => required(Command::DELE),
        "RNFR" => required(Command::RNFR),
        "RNTO" => required(Command::RNTO),
        "MKD" | "XMKD" => required(Command::MKD),
        "RMD" | "XRMD" => required(Command::RMD),
        "SIZE" => required(Command::SIZE),
        "TYPE" => required(Command::TYPE),
        "PASV" => Command::PASV,
        "PORT" => required(Command::PORT),
        "QUIT" => Command::QUIT,
        "SYST" => Command::SYST,
        "FEAT" => Command::FEAT,
        "NOOP" => Command::NOOP,
        _ => Command::UNKNOWN(cmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_is_case_insensitive() {
        assert_eq!(parse_command("user bob\r\n"), Command::USER("bob".into()));
        assert_eq!(parse_command("Pwd\r\n"), Command::PWD);
    }

    #[test]
    fn argument_is_rest_of_line_verbatim() {
        assert_eq!(
            parse_command("STOR my file  .txt\r\n"),
            Command::STOR("my file  .txt".into())
        );
        assert_eq!(parse_command("CWD  lead\r\n"), Command::CWD(" lead".into()));
    }

    #[test]
    fn missing_argument_is_flagged() {
        assert_eq!(
            parse_command("RETR\r\n"),
            Command::MissingArgument("RETR".into())
        );
        assert_eq!(parse_command("CWD \r\n"), Command::MissingArgument("CWD".into()));
    }

    #[test]
    fn list_argument_is_optional() {
        assert_eq!(parse_command("LIST\r\n"), Command::LIST(None));
        assert_eq!(parse_command("NLST docs\r\n"), Command::NLST(Some("docs".into())));
    }

    #[test]
    fn unknown_and_empty_lines() {
        assert_eq!(parse_command("XYZZY now\r\n"), Command::UNKNOWN("XYZZY".into()));
        assert_eq!(parse_command("\r\n"), Command::EMPTY);
    }

    #[test]
    fn bare_lf_terminator_is_accepted() {
        assert_eq!(parse_command("NOOP\n"), Command::NOOP);
    }

    #[test]
    fn loggable_masks_password() {
        assert_eq!(parse_command("PASS hunter2\r\n").loggable(), "PASS ****");
        assert_eq!(parse_command("RETR a.txt\r\n").loggable(), "RETR a.txt");
    }

    #[test]
    fn login_gate_membership() {
        assert!(Command::FEAT.allowed_before_login());
        assert!(!Command::LIST(None).allowed_before_login());
        assert!(!Command::PASV.allowed_before_login());
    }
}
