//! Error handlers
//!
//! Converts command failures into FTP replies.

use crate::error::types::{CommandError, NetworkError, PathError, TransferError};
use crate::protocol::responses::{self, Reply};

/// Convert a command error to the reply sent on the control channel.
pub fn reply_for(err: &CommandError) -> Reply {
    match err {
        CommandError::Auth(_) => Reply::new(responses::NOT_LOGGED_IN, "Log in with USER and PASS first."),
        CommandError::Path(e) => Reply::new(responses::FILE_UNAVAILABLE, path_message(e)),
        CommandError::Permission(e) => Reply::new(responses::FILE_UNAVAILABLE, format!("{}.", capitalize(&e.to_string()))),
        CommandError::Network(e) => network_reply(e),
        CommandError::Transfer(e) => match e {
            TransferError::Network(_) | TransferError::Aborted => Reply::new(
                responses::TRANSFER_ABORTED,
                "Connection closed; transfer aborted.",
            ),
            TransferError::LocalIo(_) => Reply::new(
                responses::LOCAL_ERROR,
                "Requested action aborted: local error in processing.",
            ),
        },
        CommandError::FileSystem { source, .. } => {
            Reply::new(responses::FILE_UNAVAILABLE, format!("{}.", capitalize(&source.to_string())))
        }
    }
}

fn path_message(err: &PathError) -> String {
    match err {
        PathError::Escape(_) => "No such file or directory.".to_string(),
        PathError::NotFound(p) => format!("{p}: No such file or directory."),
        PathError::NotADirectory(p) => format!("{p}: Not a directory."),
        PathError::NotAFile(p) => format!("{p}: Not a regular file."),
        PathError::RootEntry => "Operation not permitted on the root directory.".to_string(),
        PathError::Io { path, source } => format!("{path}: {source}."),
    }
}

fn network_reply(err: &NetworkError) -> Reply {
    match err {
        NetworkError::InvalidPortArgument(_) => {
            Reply::new(responses::SYNTAX_ERROR_ARGS, "Invalid PORT format.")
        }
        NetworkError::ForeignAddress { .. } => Reply::new(
            responses::SYNTAX_ERROR_ARGS,
            "Rejected data connection to foreign address.",
        ),
        NetworkError::PrivilegedPort(_) => Reply::new(
            responses::SYNTAX_ERROR_ARGS,
            "PORT to privileged port rejected.",
        ),
        _ => Reply::new(responses::CANT_OPEN_DATA, "Can't open data connection."),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Permission;
    use crate::error::types::{AuthError, PermissionError};
    use std::io;

    #[test]
    fn maps_each_kind_to_its_reply_code() {
        let cases: Vec<(CommandError, u16)> = vec![
            (AuthError::NotLoggedIn.into(), 530),
            (PathError::Escape("/..".into()).into(), 550),
            (PathError::NotFound("/x".into()).into(), 550),
            (PermissionError(Permission::Write).into(), 550),
            (NetworkError::NoDataConnection.into(), 425),
            (NetworkError::DataConnectionTimeout.into(), 425),
            (NetworkError::PrivilegedPort(21).into(), 501),
            (TransferError::Network(io::Error::other("reset")).into(), 426),
            (TransferError::Aborted.into(), 426),
            (TransferError::LocalIo(io::Error::other("disk")).into(), 451),
        ];
        for (err, code) in cases {
            assert_eq!(reply_for(&err).code(), code, "{err}");
        }
    }

    #[test]
    fn escape_reply_does_not_leak_real_paths() {
        let reply = reply_for(&PathError::Escape("/../../etc".into()).into());
        assert!(!reply.to_string().contains("etc"));
    }
}
