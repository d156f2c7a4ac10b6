use super::ProbeOutcome;
use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Opens the file read-only and checks for a writer.
///
/// On Linux a read lease is refused while any descriptor has the file open
/// for writing, which catches plain writers. Everywhere a non-blocking
/// exclusive `flock` catches writers that hold an advisory lock.
///
/// Calls go through `FileExt` explicitly: newer std has inherent `File` lock
/// methods with a different error type.
pub(crate) fn probe(path: &Path) -> io::Result<ProbeOutcome> {
    let file = File::open(path)?;

    #[cfg(target_os = "linux")]
    {
        if lease::open_for_writing(&file)? {
            return Ok(ProbeOutcome::Contended);
        }
    }

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            Ok(ProbeOutcome::Free)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ProbeOutcome::Contended),
        Err(e) => Err(e),
    }
}

#[cfg(target_os = "linux")]
mod lease {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;

    /// `F_SETSIG` from `<fcntl.h>`; the same value on every Linux arch.
    const F_SETSIG: libc::c_int = 10;

    /// Takes and immediately drops a read lease on `file`.
    ///
    /// Returns false when leases are unavailable (foreign owner without
    /// CAP_LEASE, unsupported filesystem, leases disabled), leaving the
    /// decision to the flock check.
    pub(super) fn open_for_writing(file: &File) -> io::Result<bool> {
        let fd = file.as_raw_fd();

        // A lease break in the short window below raises SIGURG, which is
        // ignored by default, instead of the fatal SIGIO.
        if unsafe { libc::fcntl(fd, F_SETSIG, libc::SIGURG) } == -1 {
            return Ok(false);
        }

        if unsafe { libc::fcntl(fd, libc::F_SETLEASE, libc::F_RDLCK) } == 0 {
            unsafe { libc::fcntl(fd, libc::F_SETLEASE, libc::F_UNLCK) };
            return Ok(false);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) => Ok(true),
            Some(libc::EACCES | libc::EPERM | libc::EINVAL | libc::ENOLCK) => Ok(false),
            _ => Err(err),
        }
    }
}
