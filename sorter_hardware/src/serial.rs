//! Serial port setup for the host link.
//!
//! The port is opened as a plain file and switched to raw 8N1 at the
//! requested baud rate, so the line reader sees bytes exactly as sent.
use std::fs::{File, OpenOptions};
use std::path::Path;

use nix::sys::termios::{BaudRate, SetArg, cfmakeraw, cfsetspeed, tcgetattr, tcsetattr};
use tracing::debug;

use crate::error::{HwError, Result};

fn baud_rate(baud: u32) -> Result<BaudRate> {
    Ok(match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        other => return Err(HwError::UnsupportedBaud(other)),
    })
}

/// Open `path` read/write in raw mode at `baud`.
pub fn open_serial(path: &Path, baud: u32) -> Result<File> {
    let rate = baud_rate(baud)?;
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut tio = tcgetattr(&file).map_err(|e| HwError::Serial(format!("tcgetattr: {e}")))?;
    cfmakeraw(&mut tio);
    cfsetspeed(&mut tio, rate).map_err(|e| HwError::Serial(format!("cfsetspeed: {e}")))?;
    tcsetattr(&file, SetArg::TCSANOW, &tio)
        .map_err(|e| HwError::Serial(format!("tcsetattr: {e}")))?;
    debug!(port = %path.display(), baud, "serial port configured");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_standard_baud() {
        assert!(matches!(baud_rate(12_345), Err(HwError::UnsupportedBaud(12_345))));
        assert!(baud_rate(115_200).is_ok());
    }
}
