//! OSS `/dev/dsp` device
//!
//! [`DspDevice::close`] can be called from the controlling thread while the
//! device thread sits in `write(2)`. It releases the device by putting
//! `/dev/null` in place of the descriptor; the descriptor number itself
//! stays owned until the device is dropped, so a racing write can never
//! reach a file opened later under the same number.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{DspDevice, DspDriver};

const NULL_DEVICE: &str = "/dev/null";

const SNDCTL_DSP_MAGIC: u8 = b'P';
const SNDCTL_DSP_RESET: u8 = 0;
const SNDCTL_DSP_SPEED: u8 = 2;
const SNDCTL_DSP_SETFMT: u8 = 5;
const SNDCTL_DSP_CHANNELS: u8 = 6;
const SNDCTL_DSP_SETFRAGMENT: u8 = 10;

nix::ioctl_none!(oss_reset, SNDCTL_DSP_MAGIC, SNDCTL_DSP_RESET);
nix::ioctl_readwrite!(oss_set_speed, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SPEED, i32);
nix::ioctl_readwrite!(oss_set_format, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SETFMT, i32);
nix::ioctl_readwrite!(oss_set_channels, SNDCTL_DSP_MAGIC, SNDCTL_DSP_CHANNELS, i32);
nix::ioctl_readwrite!(oss_set_fragment, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SETFRAGMENT, i32);
nix::ioctl_write_ptr_bad!(oss_set_nonblocking, libc::FIONBIO, libc::c_int);

type IntIoctl = unsafe fn(libc::c_int, *mut i32) -> nix::Result<libc::c_int>;

/// Opens [`OssDevice`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct OssDriver;

impl DspDriver for OssDriver {
    type Device = OssDevice;

    fn open(&mut self, path: &Path) -> io::Result<OssDevice> {
        // Pipes and FIFOs can block in open(2) without O_NONBLOCK
        let file = File::options()
            .write(true)
            .custom_flags(libc::O_WRONLY | libc::O_NONBLOCK)
            .open(path)?;
        let fd = OwnedFd::from(file);

        // Writes block from here on; both requests are advisory
        let blocking: libc::c_int = 0;
        if let Err(e) = unsafe { oss_set_nonblocking(fd.as_raw_fd(), &blocking) } {
            log::debug!("FIONBIO on {:?} failed: {}", path, e);
        }
        if let Err(e) = unsafe { oss_reset(fd.as_raw_fd()) } {
            log::debug!("SNDCTL_DSP_RESET on {:?} failed: {}", path, e);
        }

        Ok(OssDevice {
            fd,
            open: AtomicBool::new(true),
        })
    }
}

/// An open OSS playback device
#[derive(Debug)]
pub struct OssDevice {
    /// Closed on drop only
    fd: OwnedFd,
    open: AtomicBool,
}

impl OssDevice {
    fn fd(&self) -> io::Result<libc::c_int> {
        if self.open.load(Ordering::Acquire) {
            Ok(self.fd.as_raw_fd())
        } else {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        }
    }

    /// Point the descriptor at `/dev/null`, releasing the device
    fn detach(&self) -> io::Result<()> {
        let null = File::options().write(true).open(NULL_DEVICE)?;
        if unsafe { libc::dup2(null.as_raw_fd(), self.fd.as_raw_fd()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn exchange(&self, op: IntIoctl, value: i32) -> io::Result<i32> {
        let fd = self.fd()?;
        let mut value = value;
        unsafe { op(fd, &mut value) }?;
        Ok(value)
    }
}

impl DspDevice for OssDevice {
    fn set_format(&self, code: i32) -> io::Result<i32> {
        self.exchange(oss_set_format, code)
    }

    fn set_channels(&self, channels: i32) -> io::Result<i32> {
        self.exchange(oss_set_channels, channels)
    }

    fn set_sample_rate(&self, rate: i32) -> io::Result<i32> {
        self.exchange(oss_set_speed, rate)
    }

    fn set_fragment(&self, request: i32) -> io::Result<()> {
        self.exchange(oss_set_fragment, request).map(|_| ())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let fd = self.fd()?;
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.detach() {
                log::warn!("DSP device stays held until dropped: {}", e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = OssDriver.open(&dir.path().join("no-such-dsp"));
        assert!(result.is_err());
    }

    #[test]
    fn test_close_invalidates_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsp");
        std::fs::write(&path, b"").unwrap();

        let device = OssDriver.open(&path).unwrap();
        assert!(device.is_open());
        assert_eq!(device.write(&[1, 2, 3, 4]).unwrap(), 4);

        device.close();
        assert!(!device.is_open());
        let err = device.write(&[0; 4]).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));

        // Second close is a no-op
        device.close();
    }

    #[test]
    fn test_plain_file_rejects_dsp_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsp");
        std::fs::write(&path, b"").unwrap();

        let device = OssDriver.open(&path).unwrap();
        assert!(device.set_sample_rate(48000).is_err());
    }

    #[test]
    fn test_closed_descriptor_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsp");
        std::fs::write(&path, b"").unwrap();

        let device = OssDriver.open(&path).unwrap();
        assert_eq!(device.write(&[1, 2, 3, 4]).unwrap(), 4);
        let raw = device.fd.as_raw_fd();
        device.close();

        let other = File::open(&path).unwrap();
        assert_ne!(other.as_raw_fd(), raw, "number stays taken until the device is dropped");

        // A write that raced the close lands in /dev/null
        let n = unsafe { libc::write(raw, [9u8; 4].as_ptr().cast(), 4) };
        assert_eq!(n, 4);
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4], "device file untouched after close");
    }
}
