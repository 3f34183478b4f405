//! # Serial TTY Transport
//!
//! USB-connected printers enumerate as CDC-ACM serial devices and Bluetooth
//! printers are reached through an RFCOMM tty, so both end up here.
//!
//! ## TTY Configuration
//!
//! The device is opened read/write in raw mode:
//!
//! - **No input or output processing**, no XON/XOFF (0x11/0x13 appear in bitmap rows)
//! - **8N1** at 115200 baud
//! - **Non-canonical reads** with a 100 ms timeout (`VMIN = 0`, `VTIME = 1`), so
//!   a silent printer makes `read` return 0 instead of blocking forever

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::debug;

use crate::error::{LabelbotError, Result};

/// Read timeout in tenths of a second.
const READ_TIMEOUT_DECISECONDS: u8 = 1;

/// # Serial Port
///
/// A raw-mode tty connected to one printer.
#[derive(Debug)]
pub struct SerialPort {
    file: File,
    path: String,
}

impl SerialPort {
    /// Open and configure a tty device.
    ///
    /// ## Errors
    ///
    /// Returns [`LabelbotError::TransportConnect`] if the device doesn't exist,
    /// permission is denied (dialout group) or the tty can't be configured.
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self> {
        let path = device.as_ref();
        let connect_err = |message: String| LabelbotError::TransportConnect {
            message,
            powered_off: false,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| connect_err(format!("Failed to open {}: {}", path.display(), e)))?;

        configure_tty_raw(file.as_raw_fd()).map_err(|e| {
            connect_err(format!("Failed to configure {}: {}", path.display(), e))
        })?;

        debug!(device = %path.display(), "serial port open");
        Ok(Self {
            file,
            path: path.display().to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Put a tty file descriptor in raw 8N1 mode at 115200 baud.
#[cfg(unix)]
fn configure_tty_raw(fd: i32) -> io::Result<()> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CSTOPB);
    termios.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = READ_TIMEOUT_DECISECONDS as libc::cc_t;

    unsafe {
        if libc::cfsetispeed(&mut termios, libc::B115200) != 0
            || libc::cfsetospeed(&mut termios, libc::B115200) != 0
        {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(not(unix))]
fn configure_tty_raw(_fd: i32) -> io::Result<()> {
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_connect_error_not_power() {
        let err = SerialPort::open("/dev/labelbot-does-not-exist").unwrap_err();
        assert!(matches!(
            err,
            LabelbotError::TransportConnect {
                powered_off: false,
                ..
            }
        ));
    }

    #[test]
    fn test_regular_file_is_not_a_tty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = SerialPort::open(file.path()).unwrap_err();
        assert!(err.is_transport_connect());
    }
}
