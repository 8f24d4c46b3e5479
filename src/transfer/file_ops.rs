//! Module `file_transfer`
//!
//! Streams file contents and listings over an established data connection.
//! Uploads land in a uniquely named temporary file that is renamed into
//! place only after the client closes the data connection cleanly. Every stream can be
//! interrupted by the server's shutdown token.

use log::{error, info};
use std::io;
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;
use crate::transfer::modes::TransferType;

const BUFFER_SIZE: usize = 8192;

const UPLOAD_PREFIX: &str = ".upload-";
const UPLOAD_SUFFIX: &str = ".part";

/// Whether local text files already use CRLF line endings.
const NATIVE_CRLF: bool = cfg!(windows);

/// Converts local LF line endings to network CRLF (ASCII downloads).
#[derive(Debug, Default)]
pub struct AsciiEncoder {
    last_was_cr: bool,
}

impl AsciiEncoder {
    pub fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if b == b'\n' && !self.last_was_cr {
                out.push(b'\r');
            }
            out.push(b);
            self.last_was_cr = b == b'\r';
        }
    }
}

/// Converts network CRLF line endings to local LF (ASCII uploads).
///
/// A CR at the end of one chunk is held back until the next chunk shows
/// whether it starts a CRLF pair.
#[derive(Debug, Default)]
pub struct AsciiDecoder {
    pending_cr: bool,
}

impl AsciiDecoder {
    pub fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    out.push(b'\n');
                    continue;
                }
                out.push(b'\r');
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if std::mem::take(&mut self.pending_cr) {
            out.push(b'\r');
        }
    }
}

/// Runs `work` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Aborted),
        result = work => result,
    }
}

/// Sends a file to the client. Returns the number of bytes written to the data connection.
pub async fn send_file<W>(
    data: &mut W,
    path: &Path,
    transfer_type: TransferType,
    cancel: &CancellationToken,
) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut file = File::open(path).await.map_err(TransferError::LocalIo)?;
    info!("Starting file download: {}", path.display());

    let sent = cancellable(cancel, async {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut converted = Vec::with_capacity(BUFFER_SIZE * 2);
        let mut encoder = AsciiEncoder::default();
        let mut total = 0u64;

        loop {
            let n = file.read(&mut buffer).await.map_err(TransferError::LocalIo)?;
            if n == 0 {
                break;
            }
            let chunk = if transfer_type == TransferType::Ascii && !NATIVE_CRLF {
                converted.clear();
                encoder.encode(&buffer[..n], &mut converted);
                &converted[..]
            } else {
                &buffer[..n]
            };
            data.write_all(chunk).await.map_err(TransferError::Network)?;
            total += chunk.len() as u64;
        }
        data.shutdown().await.map_err(TransferError::Network)?;
        Ok::<_, TransferError>(total)
    })
    .await?;

    info!(
        "File download completed successfully: {} ({sent} bytes)",
        path.display()
    );
    Ok(sent)
}

/// Sends an in-memory payload (directory listings).
pub async fn send_bytes<W>(
    data: &mut W,
    payload: &[u8],
    cancel: &CancellationToken,
) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin,
{
    cancellable(cancel, async {
        data.write_all(payload).await.map_err(TransferError::Network)?;
        data.shutdown().await.map_err(TransferError::Network)?;
        Ok::<_, TransferError>(payload.len() as u64)
    })
    .await
}

/// Receives a file from the client, replacing `final_path` on success.
///
/// The bytes go to a freshly created file with a unique name next to the
/// target, so an existing entry (file or symlink) is never opened for writing.
/// Returns the number of bytes received from the data connection.
pub async fn receive_file<R>(
    data: &mut R,
    final_path: &Path,
    transfer_type: TransferType,
    cancel: &CancellationToken,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
{
    let (std_file, temp_path) = create_upload_file(final_path).map_err(|e| {
        error!(
            "Failed to create temporary file for {}: {e}",
            final_path.display()
        );
        TransferError::LocalIo(e)
    })?;
    info!(
        "Starting file upload: {} -> {}",
        temp_path.display(),
        final_path.display()
    );
    let mut temp_file = File::from_std(std_file);

    let result = cancellable(cancel, async {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut converted = Vec::with_capacity(BUFFER_SIZE);
        let mut decoder = AsciiDecoder::default();
        let ascii = transfer_type == TransferType::Ascii && !NATIVE_CRLF;
        let mut total = 0u64;

        loop {
            let n = data.read(&mut buffer).await.map_err(TransferError::Network)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            let written = if ascii {
                converted.clear();
                decoder.decode(&buffer[..n], &mut converted);
                temp_file.write_all(&converted).await
            } else {
                temp_file.write_all(&buffer[..n]).await
            };
            written.map_err(TransferError::LocalIo)?;
        }
        if ascii {
            converted.clear();
            decoder.finish(&mut converted);
            temp_file
                .write_all(&converted)
                .await
                .map_err(TransferError::LocalIo)?;
        }
        temp_file.flush().await.map_err(TransferError::LocalIo)?;
        Ok::<_, TransferError>(total)
    })
    .await;

    drop(temp_file);

    let received = match result {
        Ok(n) => n,
        Err(e) => {
            if let Err(cleanup) = temp_path.close() {
                error!("Failed to remove temporary upload file: {cleanup}");
            }
            return Err(e);
        }
    };

    // Dropping the returned path on failure removes the temporary file.
    temp_path.persist(final_path).map_err(|e| {
        error!(
            "Failed to move upload into place at {}: {}",
            final_path.display(),
            e.error
        );
        TransferError::LocalIo(e.error)
    })?;

    info!(
        "File upload completed successfully: {} ({received} bytes)",
        final_path.display()
    );
    Ok(received)
}

/// Creates the exclusive, randomly named file an upload is written to.
fn create_upload_file(final_path: &Path) -> io::Result<(std::fs::File, TempPath)> {
    let parent = final_path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "upload target has no parent directory")
    })?;
    let mut builder = tempfile::Builder::new();
    builder.prefix(UPLOAD_PREFIX).suffix(UPLOAD_SUFFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    Ok(builder.tempfile_in(parent)?.into_parts())
}
