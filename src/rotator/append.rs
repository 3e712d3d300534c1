//! Folds a sentinel's bytes onto the end of an existing `.log.0`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::Path;

use log::debug;

/// Copies the whole of `sentinel` onto the end of `target`, then removes the
/// sentinel.
///
/// On a short transfer the sentinel is left in place and an error returned;
/// the bytes already written stay in `target` and the next event for the
/// family retries by appending onto the same file.
pub(crate) fn fold_sentinel_into(sentinel: &Path, target: &Path) -> io::Result<()> {
    let mut src = File::open(sentinel)?;
    let expected = src.metadata()?.len();

    // The kernel transfer below refuses O_APPEND descriptors, so the file is
    // opened plainly writable and positioned at the end by hand.
    let mut dst = OpenOptions::new().write(true).open(target)?;
    dst.seek(SeekFrom::End(0))?;

    let sent = transfer(&mut src, &mut dst, expected)?;
    if sent != expected {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!(
                "short append: {} of {} bytes reached {}",
                sent,
                expected,
                target.display()
            ),
        ));
    }

    fs::remove_file(sentinel)?;
    debug!("appended {} bytes from {:?} to {:?}", expected, sentinel, target);
    Ok(())
}

/// Zero-copy kernel transfer; retries transient interruptions in-call.
#[cfg(target_os = "linux")]
fn transfer(src: &mut File, dst: &mut File, len: u64) -> io::Result<u64> {
    use std::os::unix::io::AsRawFd;

    use nix::errno::Errno;
    use nix::sys::sendfile::sendfile;

    let mut offset: nix::libc::off_t = 0;
    while (offset as u64) < len {
        let remaining = (len - offset as u64) as usize;
        match sendfile(dst.as_raw_fd(), src.as_raw_fd(), Some(&mut offset), remaining) {
            Ok(0) => break,
            Ok(_) => {}
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => continue,
            Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
        }
    }
    Ok(offset as u64)
}

#[cfg(not(target_os = "linux"))]
fn transfer(src: &mut File, dst: &mut File, _len: u64) -> io::Result<u64> {
    io::copy(src, dst)
}
