use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::client::Session;
use crate::protocol::responses::{self, Reply};
use crate::protocol::{CommandStatus, handle_command, parse_command};
use crate::server::ServerContext;

/// Outcome of reading one control line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

/// Handles one FTP control connection until QUIT, disconnect, idle timeout
/// or server shutdown.
///
/// - Sends the greeting, then reads one command line at a time.
/// - Each command is dispatched with `handle_command` and its reply written
///   before the next line is read.
/// - Shutdown is observed while waiting for a command and inside transfers.
pub async fn handle_client(stream: TcpStream, peer: SocketAddr, ctx: Arc<ServerContext>) {
    let local = match stream.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to read local address for {peer}: {e}");
            return;
        }
    };
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = Session::new(peer, local);
    let mut line = Vec::new();

    let greeting = Reply::new(responses::READY, "lanshare-ftp ready.");
    if let Err(e) = send_reply(&mut write_half, &greeting).await {
        warn!("Failed to greet {peer}: {e}");
        ctx.events.disconnected(peer);
        return;
    }

    let idle = ctx.config.idle_timeout();
    let max_len = ctx.config.max_command_length;

    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => {
                info!("Closing session {peer}: server shutting down");
                let bye = Reply::new(responses::SERVICE_NOT_AVAILABLE, "Server shutting down.");
                let _ = send_reply(&mut write_half, &bye).await;
                break;
            }
            read = timeout(idle, read_command_line(&mut reader, &mut line, max_len)) => read,
        };

        match read {
            Err(_) => {
                info!("Session {peer} idle for {}s, closing", idle.as_secs());
                ctx.events.idle_timeout(peer);
                let bye = Reply::new(
                    responses::SERVICE_NOT_AVAILABLE,
                    "Control connection timed out.",
                );
                let _ = send_reply(&mut write_half, &bye).await;
                break;
            }
            Ok(Err(e)) => {
                error!("Failed to read from {peer}: {e}");
                break;
            }
            Ok(Ok(LineRead::Eof)) => {
                info!("Connection closed by client {peer}");
                break;
            }
            Ok(Ok(LineRead::TooLong)) => {
                let reply = Reply::new(responses::SYNTAX_ERROR, "Command line too long.");
                if send_reply(&mut write_half, &reply).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(Ok(LineRead::Line)) => {}
        }

        let text = String::from_utf8_lossy(&line);
        let command = parse_command(&text);
        debug!("Received from {peer}: {}", command.loggable());
        ctx.events.command(peer, &command.loggable());

        let result = handle_command(&mut session, &command, &ctx, &mut write_half).await;
        if let Err(e) = send_reply(&mut write_half, &result.reply).await {
            warn!("Failed to send reply to {peer}: {e}");
            break;
        }
        if result.status == CommandStatus::CloseConnection {
            info!("Client {peer} session closed after {}", command.verb());
            break;
        }
    }

    let _ = write_half.shutdown().await;
    ctx.events.disconnected(peer);
    info!("Client {peer} disconnected");
}

async fn send_reply<W>(writer: &mut W, reply: &Reply) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.to_string().as_bytes()).await?;
    writer.flush().await
}

/// Reads one LF-terminated line of at most `max_len` bytes plus CRLF.
///
/// An over-long line is consumed up to its terminator and reported as
/// [`LineRead::TooLong`]. A final line without terminator is returned as is.
async fn read_command_line<R>(reader: &mut R, buf: &mut Vec<u8>, max_len: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (max_len + 2) as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.ends_with(b"\n") || (n as u64) < limit {
        return Ok(LineRead::Line);
    }

    let mut discard = Vec::new();
    loop {
        discard.clear();
        let m = (&mut *reader).take(4096).read_until(b'\n', &mut discard).await?;
        if m == 0 {
            return Ok(LineRead::Eof);
        }
        if discard.ends_with(b"\n") {
            return Ok(LineRead::TooLong);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_lines_and_rejects_overlong_ones() {
        let input = format!("NOOP\r\n{}\r\nPWD\r\nQUIT", "X".repeat(40));
        let mut reader = BufReader::new(input.as_bytes());
        let mut buf = Vec::new();

        assert_eq!(read_command_line(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"NOOP\r\n");

        buf.clear();
        assert_eq!(read_command_line(&mut reader, &mut buf, 16).await.unwrap(), LineRead::TooLong);

        buf.clear();
        assert_eq!(read_command_line(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"PWD\r\n");

        buf.clear();
        assert_eq!(read_command_line(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"QUIT");

        buf.clear();
        assert_eq!(read_command_line(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Eof);
    }
}
