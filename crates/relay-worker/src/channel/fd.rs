//! Adopting the inherited control-channel descriptor.
//!
//! The parent spawns the worker with one end of a Unix socket pair left open
//! and passes its number through the environment. We take ownership exactly
//! once, mark it close-on-exec so anything the worker spawns cannot write
//! into the channel, and hand it to tokio.
//!
//! ## Safety contracts
//!
//! 1. `adopt_channel_fd` is called once per descriptor, before anything else
//!    in the process could claim it.
//! 2. `fcntl` only inspects the descriptor number; a closed fd is reported as
//!    `EBADF` before ownership is taken.
//!
//! Once ownership is taken the descriptor is closed on every error path.

use std::io;
use std::os::fd::{BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{FcntlArg, FdFlag, fcntl};

/// Take ownership of `fd` and wrap it as a non-blocking tokio stream.
///
/// Must be called from within a tokio runtime.
pub fn adopt_channel_fd(fd: RawFd) -> io::Result<tokio::net::UnixStream> {
    if fd < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid channel fd {}", fd),
        ));
    }

    // Safety: see module docs; the borrow never outlives this block.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };

    fcntl(borrowed, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map_err(|e| io::Error::other(format!("fcntl({}, F_SETFD) failed: {}", fd, e)))?;

    tracing::debug!(fd, "Adopting control channel fd");

    // Safety: fd is open (fcntl succeeded) and is not owned elsewhere (contract 1).
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    let stream = std::os::unix::net::UnixStream::from(owned);
    if let Err(e) = stream.local_addr() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("channel fd {} is not a Unix socket: {}", fd, e),
        ));
    }
    stream.set_nonblocking(true)?;
    tokio::net::UnixStream::from_std(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::IntoRawFd;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn adopts_socket_fd() {
        let (ours, theirs) = std::os::unix::net::UnixStream::pair().unwrap();
        let fd = ours.into_raw_fd();

        let mut adopted = adopt_channel_fd(fd).unwrap();

        let flags = fcntl(&adopted, FcntlArg::F_GETFD).unwrap();
        assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));

        theirs.set_nonblocking(true).unwrap();
        let mut theirs = tokio::net::UnixStream::from_std(theirs).unwrap();
        theirs.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        adopted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn rejects_non_socket_fd() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let fd = file.into_raw_fd();

        let err = adopt_channel_fd(fd).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn rejects_negative_fd() {
        let err = adopt_channel_fd(-1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
