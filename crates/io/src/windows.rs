use super::ProbeOutcome;
use std::fs::OpenOptions;
use std::io;
use std::os::windows::fs::OpenOptionsExt;
use std::path::Path;

const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Opens the file for reading with no sharing; a writer holding the file
/// makes this fail with a sharing or lock violation.
pub(crate) fn probe(path: &Path) -> io::Result<ProbeOutcome> {
    match OpenOptions::new().read(true).share_mode(0).open(path) {
        Ok(_file) => Ok(ProbeOutcome::Free),
        Err(e) if matches!(e.raw_os_error(), Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)) => {
            Ok(ProbeOutcome::Contended)
        }
        Err(e) => Err(e),
    }
}
