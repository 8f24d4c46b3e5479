//! Command handlers module for the FTP server.
//!
//! This module defines handler functions for FTP commands: authentication,
//! navigation, directory management, data channel setup and transfers.
//! Each handler runs to completion before the session reads the next line.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::auth::{Credential, Permission};
use crate::client::Session;
use crate::error::{AuthError, CommandError, NetworkError, PathError, TransferError, reply_for};
use crate::protocol::responses::{self, Reply, quote_path};
use crate::protocol::{Command, CommandResult};
use crate::server::ServerContext;
use crate::storage::operations::{self, strip_list_options};
use crate::transfer::{self, DataMode, TransferType, encode_host_port, parse_host_port};

type HandlerResult = Result<Reply, CommandError>;

/// Dispatches a received FTP command to its corresponding handler.
///
/// # Arguments
///
/// * `session` - State of the connection the command arrived on.
/// * `command` - The parsed FTP command.
/// * `ctx` - Shared server state.
/// * `control` - Control channel writer, used for the `150` reply that
///   precedes a transfer.
///
/// # Returns
///
/// * `CommandResult` - Final reply for the command and whether the session continues.
pub async fn handle_command<W>(
    session: &mut Session,
    command: &Command,
    ctx: &ServerContext,
    control: &mut W,
) -> CommandResult
where
    W: AsyncWrite + Unpin + Send,
{
    if !session.is_logged_in() && !command.allowed_before_login() {
        debug!("{} rejected before login from {}", command.verb(), session.peer());
        return CommandResult::failure(reply_for(&AuthError::NotLoggedIn.into()));
    }

    let result = match command {
        Command::EMPTY => Ok(Reply::new(
            responses::SYNTAX_ERROR,
            "Syntax error, command unrecognized.",
        )),
        Command::UNKNOWN(_) => Ok(Reply::new(
            responses::NOT_IMPLEMENTED,
            "Command not implemented.",
        )),
        Command::MissingArgument(_) => Ok(Reply::new(
            responses::SYNTAX_ERROR_ARGS,
            "Syntax error: command needs an argument.",
        )),
        Command::QUIT => return handle_cmd_quit(),
        Command::USER(username) => handle_cmd_user(session, username),
        Command::PASS(password) => return handle_cmd_pass(session, ctx, password),
        Command::SYST => Ok(Reply::new(responses::SYSTEM_TYPE, "UNIX Type: L8")),
        Command::FEAT => Ok(Reply::multiline(
            responses::FEATURES,
            "Features:",
            vec![" SIZE".to_string(), " TVFS".to_string()],
        )),
        Command::NOOP => Ok(Reply::new(responses::OK, "NOOP ok.")),
        Command::PWD => handle_cmd_pwd(session),
        Command::CWD(path) => handle_cmd_cwd(session, ctx, path).await,
        Command::CDUP => handle_cmd_cdup(session, ctx).await,
        Command::TYPE(arg) => handle_cmd_type(session, arg),
        Command::PASV => handle_cmd_pasv(session, ctx).await,
        Command::PORT(arg) => handle_cmd_port(session, ctx, arg),
        Command::LIST(arg) => handle_cmd_list(session, ctx, control, arg.as_deref(), false).await,
        Command::NLST(arg) => handle_cmd_list(session, ctx, control, arg.as_deref(), true).await,
        Command::RETR(path) => handle_cmd_retr(session, ctx, control, path).await,
        Command::STOR(path) => handle_cmd_stor(session, ctx, control, path).await,
        Command::DELE(path) => handle_cmd_dele(session, ctx, path).await,
        Command::RNFR(path) => handle_cmd_rnfr(session, ctx, path).await,
        Command::RNTO(path) => handle_cmd_rnto(session, ctx, path).await,
        Command::MKD(path) => handle_cmd_mkd(session, ctx, path).await,
        Command::RMD(path) => handle_cmd_rmd(session, ctx, path).await,
        Command::SIZE(path) => handle_cmd_size(session, ctx, path).await,
    };

    match result {
        Ok(reply) => CommandResult::success(reply),
        Err(e) => {
            // Transfer failures were already reported with their path.
            if !matches!(e, CommandError::Transfer(_)) {
                ctx.events
                    .command_failed(session.peer(), command.verb(), &e.to_string());
            }
            CommandResult::failure(reply_for(&e))
        }
    }
}

fn logged_in(session: &Session) -> Result<Arc<Credential>, CommandError> {
    session
        .credential()
        .cloned()
        .ok_or_else(|| AuthError::NotLoggedIn.into())
}

// --------------------
// Access control
// --------------------

fn handle_cmd_quit() -> CommandResult {
    CommandResult::close(Reply::new(responses::GOODBYE, "Goodbye."))
}

fn handle_cmd_user(session: &mut Session, username: &str) -> HandlerResult {
    if session.is_logged_in() {
        return Ok(Reply::new(
            responses::NOT_LOGGED_IN,
            "Can't change to another user.",
        ));
    }
    session.begin_login(username.to_string());
    Ok(Reply::new(
        responses::PASSWORD_REQUIRED,
        "Username ok, send password.",
    ))
}

/// PASS: the only handler that can end the session on failure.
fn handle_cmd_pass(session: &mut Session, ctx: &ServerContext, password: &str) -> CommandResult {
    if session.is_logged_in() {
        return CommandResult::failure(Reply::new(
            responses::BAD_SEQUENCE,
            "User already authenticated.",
        ));
    }
    let Some(username) = session.pending_username().map(str::to_string) else {
        return CommandResult::failure(Reply::new(
            responses::BAD_SEQUENCE,
            "Login with USER first.",
        ));
    };

    match ctx.authorizer.authenticate(&username, password) {
        Ok(credential) => {
            session.login(credential);
            info!("User {username} logged in from {}", session.peer());
            ctx.events.login_succeeded(session.peer(), &username);
            CommandResult::success(Reply::new(responses::LOGIN_SUCCESS, "Login successful."))
        }
        Err(_) => {
            let failures = session.login_failed();
            warn!(
                "Failed login as {username} from {} ({failures} consecutive)",
                session.peer()
            );
            ctx.events.login_failed(session.peer(), &username);

            let limit = ctx.config.max_login_attempts;
            if limit > 0 && failures >= limit {
                ctx.events.too_many_logins(session.peer());
                return CommandResult::close(Reply::new(
                    responses::NOT_LOGGED_IN,
                    "Maximum login attempts. Disconnecting.",
                ));
            }
            CommandResult::failure(Reply::new(
                responses::NOT_LOGGED_IN,
                "Authentication failed.",
            ))
        }
    }
}

// --------------------
// Navigation
// --------------------

fn handle_cmd_pwd(session: &Session) -> HandlerResult {
    Ok(Reply::new(
        responses::PATH_CREATED,
        format!(
            "{} is the current directory.",
            quote_path(session.current_virtual_dir())
        ),
    ))
}

async fn handle_cmd_cwd(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    logged_in(session)?.require(Permission::Read)?;
    let resolved = ctx.resolver.resolve(path, session.current_virtual_dir())?;

    let is_dir = tokio::fs::metadata(&resolved.real_path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(PathError::NotADirectory(resolved.virtual_path).into());
    }

    debug!(
        "{} changed directory to {} (real: {})",
        session.peer(),
        resolved.virtual_path,
        resolved.real_path.display()
    );
    let reply = Reply::new(
        responses::FILE_ACTION_OK,
        format!("{} is the current directory.", quote_path(&resolved.virtual_path)),
    );
    session.set_current_virtual_dir(resolved.virtual_path);
    Ok(reply)
}

async fn handle_cmd_cdup(session: &mut Session, ctx: &ServerContext) -> HandlerResult {
    if session.current_virtual_dir() == "/" {
        logged_in(session)?;
        return Ok(Reply::new(
            responses::FILE_ACTION_OK,
            format!("{} is the current directory.", quote_path("/")),
        ));
    }
    handle_cmd_cwd(session, ctx, "..").await
}

// --------------------
// Transfer parameters
// --------------------

fn handle_cmd_type(session: &mut Session, arg: &str) -> HandlerResult {
    match TransferType::parse(arg) {
        Some(transfer_type) => {
            session.set_transfer_type(transfer_type);
            Ok(Reply::new(
                responses::OK,
                format!("Type set to: {transfer_type}."),
            ))
        }
        None => Ok(Reply::new(
            responses::PARAMETER_NOT_IMPLEMENTED,
            format!("Unsupported type \"{arg}\"."),
        )),
    }
}

async fn handle_cmd_pasv(session: &mut Session, ctx: &ServerContext) -> HandlerResult {
    // Close any previous listener before binding a new one.
    session.set_pending_data_mode(DataMode::None);
    let (listener, advertised) = ctx.data_channels.open_passive(session.local()).await?;
    session.set_pending_data_mode(DataMode::Passive(listener));
    info!("Passive mode for {} on {advertised}", session.peer());
    Ok(Reply::new(
        responses::PASSIVE_MODE,
        format!("Entering passive mode ({}).", encode_host_port(advertised)),
    ))
}

fn handle_cmd_port(session: &mut Session, ctx: &ServerContext, arg: &str) -> HandlerResult {
    session.set_pending_data_mode(DataMode::None);
    let requested = parse_host_port(arg)?;
    let remote = ctx
        .data_channels
        .check_active_target(session.peer(), requested)?;
    session.set_pending_data_mode(DataMode::Active(remote));
    info!("Active mode for {} targeting {remote}", session.peer());
    Ok(Reply::new(
        responses::OK,
        "Active data connection established.",
    ))
}

// --------------------
// Transfers
// --------------------

/// Establishes the pending data connection, then sends the `150` reply.
///
/// Waiting for the connection ends early with a 426 when the server stops.
async fn open_data_connection<W>(
    session: &Session,
    ctx: &ServerContext,
    control: &mut W,
    mode: DataMode,
    (kind, path): (&str, &str),
    opening: String,
) -> Result<TcpStream, CommandError>
where
    W: AsyncWrite + Unpin + Send,
{
    let stream = tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => {
            info!("Stopped waiting for {kind} data connection from {}", session.peer());
            ctx.events.transfer_aborted(session.peer(), kind, path);
            return Err(TransferError::Aborted.into());
        }
        established = ctx.data_channels.establish(mode, session.peer()) => established?,
    };
    let preliminary = Reply::new(responses::FILE_STATUS_OK, opening).to_string();
    if let Err(e) = control.write_all(preliminary.as_bytes()).await {
        // The final reply will fail the same way and end the session.
        warn!("Failed to send 150 to {}: {e}", session.peer());
    }
    Ok(stream)
}

/// Takes the pending data mode, failing with 425 when none was requested.
fn take_data_mode(session: &mut Session) -> Result<DataMode, CommandError> {
    match session.take_pending_data_mode() {
        DataMode::None => Err(NetworkError::NoDataConnection.into()),
        mode => Ok(mode),
    }
}

/// Logs the outcome of a stream and builds the final reply.
fn finish_transfer(
    session: &Session,
    ctx: &ServerContext,
    kind: &str,
    path: &str,
    outcome: Result<u64, TransferError>,
) -> HandlerResult {
    match outcome {
        Ok(bytes) => {
            ctx.events
                .transfer_completed(session.peer(), kind, path, bytes);
            Ok(Reply::new(responses::TRANSFER_COMPLETE, "Transfer complete."))
        }
        Err(TransferError::Aborted) => {
            ctx.events.transfer_aborted(session.peer(), kind, path);
            Err(TransferError::Aborted.into())
        }
        Err(e) => {
            ctx.events
                .transfer_failed(session.peer(), kind, path, &e.to_string());
            Err(e.into())
        }
    }
}

async fn handle_cmd_list<W>(
    session: &mut Session,
    ctx: &ServerContext,
    control: &mut W,
    arg: Option<&str>,
    names_only: bool,
) -> HandlerResult
where
    W: AsyncWrite + Unpin + Send,
{
    let mode = take_data_mode(session)?;
    logged_in(session)?.require(Permission::Read)?;

    let target = strip_list_options(arg).unwrap_or(".");
    let resolved = ctx.resolver.resolve(target, session.current_virtual_dir())?;
    let entries = operations::list_directory(&resolved, ctx.resolver.root()).await?;
    let listing = if names_only {
        operations::format_names(&entries)
    } else {
        operations::format_long(&entries, SystemTime::now())
    };

    let mut data = open_data_connection(
        session,
        ctx,
        control,
        mode,
        ("listing", &resolved.virtual_path),
        "Here comes the directory listing.".to_string(),
    )
    .await?;
    let outcome = transfer::send_bytes(&mut data, listing.as_bytes(), &ctx.shutdown).await;
    finish_transfer(session, ctx, "listing", &resolved.virtual_path, outcome)
}

async fn handle_cmd_retr<W>(
    session: &mut Session,
    ctx: &ServerContext,
    control: &mut W,
    path: &str,
) -> HandlerResult
where
    W: AsyncWrite + Unpin + Send,
{
    let mode = take_data_mode(session)?;
    logged_in(session)?.require(Permission::Read)?;

    let resolved = ctx.resolver.resolve(path, session.current_virtual_dir())?;
    let is_file = tokio::fs::metadata(&resolved.real_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(PathError::NotAFile(resolved.virtual_path).into());
    }

    let mut data = open_data_connection(
        session,
        ctx,
        control,
        mode,
        ("download", &resolved.virtual_path),
        format!(
            "Opening {} mode data connection for {}.",
            session.transfer_type(),
            resolved.virtual_path
        ),
    )
    .await?;
    let outcome = transfer::send_file(
        &mut data,
        &resolved.real_path,
        session.transfer_type(),
        &ctx.shutdown,
    )
    .await;
    finish_transfer(session, ctx, "download", &resolved.virtual_path, outcome)
}

async fn handle_cmd_stor<W>(
    session: &mut Session,
    ctx: &ServerContext,
    control: &mut W,
    path: &str,
) -> HandlerResult
where
    W: AsyncWrite + Unpin + Send,
{
    let mode = take_data_mode(session)?;
    logged_in(session)?.require(Permission::Write)?;

    let resolved = ctx
        .resolver
        .resolve_entry(path, session.current_virtual_dir())?;
    if tokio::fs::metadata(&resolved.real_path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(PathError::NotAFile(resolved.virtual_path).into());
    }

    let mut data = open_data_connection(
        session,
        ctx,
        control,
        mode,
        ("upload", &resolved.virtual_path),
        format!(
            "Opening {} mode data connection for {}.",
            session.transfer_type(),
            resolved.virtual_path
        ),
    )
    .await?;
    let outcome = transfer::receive_file(
        &mut data,
        &resolved.real_path,
        session.transfer_type(),
        &ctx.shutdown,
    )
    .await;
    finish_transfer(session, ctx, "upload", &resolved.virtual_path, outcome)
}

// --------------------
// File management
// --------------------

async fn handle_cmd_dele(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    logged_in(session)?.require(Permission::Delete)?;
    let resolved = ctx
        .resolver
        .resolve_entry(path, session.current_virtual_dir())?;
    operations::delete_file(&resolved).await?;
    Ok(Reply::new(responses::FILE_ACTION_OK, "File removed."))
}

async fn handle_cmd_rnfr(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    logged_in(session)?.require(Permission::Rename)?;
    let resolved = ctx
        .resolver
        .resolve_entry(path, session.current_virtual_dir())?;
    if tokio::fs::symlink_metadata(&resolved.real_path).await.is_err() {
        return Err(PathError::NotFound(resolved.virtual_path).into());
    }
    session.set_rename_from(resolved);
    Ok(Reply::new(
        responses::PENDING_FURTHER_INFO,
        "Ready for destination name.",
    ))
}

async fn handle_cmd_rnto(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    let Some(from) = session.take_rename_from() else {
        return Ok(Reply::new(
            responses::BAD_SEQUENCE,
            "Bad sequence of commands: use RNFR first.",
        ));
    };
    logged_in(session)?.require(Permission::Rename)?;
    let to = ctx
        .resolver
        .resolve_entry(path, session.current_virtual_dir())?;
    operations::rename(&from, &to).await?;
    Ok(Reply::new(responses::FILE_ACTION_OK, "Renaming ok."))
}

async fn handle_cmd_mkd(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    logged_in(session)?.require(Permission::MakeDir)?;
    let resolved = ctx
        .resolver
        .resolve_entry(path, session.current_virtual_dir())?;
    operations::make_directory(&resolved).await?;
    Ok(Reply::new(
        responses::PATH_CREATED,
        format!("{} directory created.", quote_path(&resolved.virtual_path)),
    ))
}

async fn handle_cmd_rmd(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    logged_in(session)?.require(Permission::RemoveDir)?;
    let resolved = ctx
        .resolver
        .resolve_entry(path, session.current_virtual_dir())?;
    operations::remove_directory(&resolved).await?;
    Ok(Reply::new(responses::FILE_ACTION_OK, "Directory removed."))
}

async fn handle_cmd_size(session: &mut Session, ctx: &ServerContext, path: &str) -> HandlerResult {
    logged_in(session)?.require(Permission::Read)?;
    if session.transfer_type() == TransferType::Ascii {
        return Ok(Reply::new(
            responses::FILE_UNAVAILABLE,
            "SIZE not allowed in ASCII mode.",
        ));
    }
    let resolved = ctx.resolver.resolve(path, session.current_virtual_dir())?;
    let size = operations::file_size(&resolved).await?;
    Ok(Reply::new(responses::FILE_STATUS, size.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::middleware::{ChannelSink, EventLog, NullSink};
    use crate::protocol::{CommandStatus, parse_command};
    use std::fs;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn context(dir: &TempDir, events: EventLog) -> ServerContext {
        let config = ServerConfig::new(dir.path(), "bob", "secret").with_max_login_attempts(2);
        let root = config.validate().unwrap();
        ServerContext::new(config, root, events, CancellationToken::new())
    }

    fn session() -> Session {
        Session::new(
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:2121".parse().unwrap(),
        )
    }

    async fn run(session: &mut Session, ctx: &ServerContext, line: &str) -> CommandResult {
        let mut control = Vec::new();
        handle_command(session, &parse_command(line), ctx, &mut control).await
    }

    async fn login(session: &mut Session, ctx: &ServerContext) {
        run(session, ctx, "USER bob").await;
        let result = run(session, ctx, "PASS secret").await;
        assert_eq!(result.reply.code(), 230);
    }

    #[tokio::test]
    async fn filesystem_commands_require_login() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        for line in ["LIST", "RETR a", "STOR a", "DELE a", "CWD /", "PWD", "PASV"] {
            assert_eq!(run(&mut s, &ctx, line).await.reply.code(), 530, "{line}");
        }
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn pass_without_user_is_a_bad_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        assert_eq!(run(&mut s, &ctx, "PASS secret").await.reply.code(), 503);
    }

    #[tokio::test]
    async fn login_limit_closes_session_and_never_logs_password() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, mut rx) = ChannelSink::new();
        let ctx = context(&dir, EventLog::new(Arc::new(sink)));
        let mut s = session();

        run(&mut s, &ctx, "USER bob").await;
        let first = run(&mut s, &ctx, "PASS wrong1").await;
        assert_eq!(first.reply.code(), 530);
        assert_eq!(first.status, CommandStatus::Failure("Authentication failed.".into()));

        run(&mut s, &ctx, "USER bob").await;
        let second = run(&mut s, &ctx, "PASS wrong2").await;
        assert_eq!(second.status, CommandStatus::CloseConnection);
        assert_eq!(second.reply.text(), "Maximum login attempts. Disconnecting.");

        while let Ok(entry) = rx.try_recv() {
            assert!(!entry.message.contains("wrong"), "{}", entry.message);
        }
    }

    #[tokio::test]
    async fn user_after_login_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        login(&mut s, &ctx).await;
        let reply = run(&mut s, &ctx, "USER alice").await.reply;
        assert_eq!(reply.to_string(), "530 Can't change to another user.\r\n");
        assert!(s.is_logged_in());
    }

    #[tokio::test]
    async fn cwd_pwd_and_cdup() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        login(&mut s, &ctx).await;

        assert_eq!(run(&mut s, &ctx, "CWD docs").await.reply.code(), 250);
        assert_eq!(
            run(&mut s, &ctx, "PWD").await.reply.to_string(),
            "257 \"/docs\" is the current directory.\r\n"
        );
        assert_eq!(run(&mut s, &ctx, "CWD missing").await.reply.code(), 550);
        assert_eq!(s.current_virtual_dir(), "/docs");
        assert_eq!(run(&mut s, &ctx, "CDUP").await.reply.code(), 250);
        assert_eq!(run(&mut s, &ctx, "CDUP").await.reply.code(), 250);
        assert_eq!(s.current_virtual_dir(), "/");
        assert_eq!(run(&mut s, &ctx, "CWD ../..").await.reply.code(), 550);
    }

    #[tokio::test]
    async fn transfers_without_data_mode_get_425() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        login(&mut s, &ctx).await;
        for line in ["LIST", "NLST", "RETR a.txt", "STOR b.txt"] {
            assert_eq!(run(&mut s, &ctx, line).await.reply.code(), 425, "{line}");
        }
        assert!(!dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn size_depends_on_transfer_type() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), vec![0u8; 1234]).unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        login(&mut s, &ctx).await;

        assert_eq!(
            run(&mut s, &ctx, "SIZE a.bin").await.reply.text(),
            "SIZE not allowed in ASCII mode."
        );
        assert_eq!(run(&mut s, &ctx, "TYPE I").await.reply.code(), 200);
        assert_eq!(
            run(&mut s, &ctx, "SIZE a.bin").await.reply.to_string(),
            "213 1234\r\n"
        );
        assert_eq!(run(&mut s, &ctx, "TYPE X").await.reply.code(), 504);
    }

    #[tokio::test]
    async fn rename_requires_rnfr_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.txt"), b"x").unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        login(&mut s, &ctx).await;

        assert_eq!(run(&mut s, &ctx, "RNTO new.txt").await.reply.code(), 503);
        assert_eq!(run(&mut s, &ctx, "RNFR old.txt").await.reply.code(), 350);
        assert_eq!(run(&mut s, &ctx, "RNTO new.txt").await.reply.code(), 250);
        assert!(dir.path().join("new.txt").exists());
        assert_eq!(run(&mut s, &ctx, "RNTO again.txt").await.reply.code(), 503);
    }

    #[tokio::test]
    async fn denied_permission_replies_550() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path(), "bob", "secret")
            .with_permissions([Permission::Read]);
        let root = config.validate().unwrap();
        let ctx = ServerContext::new(
            config,
            root,
            EventLog::new(Arc::new(NullSink)),
            CancellationToken::new(),
        );
        let mut s = session();
        login(&mut s, &ctx).await;
        assert_eq!(run(&mut s, &ctx, "MKD new").await.reply.code(), 550);
        assert!(!dir.path().join("new").exists());
    }

    #[tokio::test]
    async fn port_rejects_foreign_and_privileged_targets() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        login(&mut s, &ctx).await;
        assert_eq!(
            run(&mut s, &ctx, "PORT 10,0,0,1,19,136").await.reply.text(),
            "Rejected data connection to foreign address."
        );
        assert_eq!(
            run(&mut s, &ctx, "PORT 127,0,0,1,0,21").await.reply.text(),
            "PORT to privileged port rejected."
        );
        assert_eq!(run(&mut s, &ctx, "PORT 127,0,0,1,19,136").await.reply.code(), 200);
        assert!(s.has_pending_data_mode());
    }

    #[tokio::test]
    async fn misc_replies() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, EventLog::new(Arc::new(NullSink)));
        let mut s = session();
        assert_eq!(run(&mut s, &ctx, "SYST").await.reply.to_string(), "215 UNIX Type: L8\r\n");
        assert_eq!(run(&mut s, &ctx, "NOOP").await.reply.code(), 200);
        assert_eq!(run(&mut s, &ctx, "FEAT").await.reply.code(), 211);
        assert_eq!(run(&mut s, &ctx, "SITE CHMOD").await.reply.code(), 502);
        assert_eq!(run(&mut s, &ctx, "").await.reply.code(), 500);
        assert_eq!(run(&mut s, &ctx, "RETR").await.reply.code(), 501);
        assert_eq!(run(&mut s, &ctx, "QUIT").await.status, CommandStatus::CloseConnection);
    }
}
