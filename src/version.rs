//! Kernel version detection.
//!
//! Computed once at ABI registration and carried in [`crate::tdep::Abi`]
//! rather than living in process-wide globals.

use log::warn;

/// The running GNU/Linux kernel version, split out of the `uname(2)` release
/// string.
///
/// For a release of `5.10.23`, `major` is 5, `minor` is 10, `release` is 23,
/// and [`combined`](Self::combined) is `0x00050a17`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Release number.
    pub release: u32,
}

impl KernelVersion {
    /// Parse a dotted `major.minor.release` string.
    ///
    /// Each component is read up to the first non-digit, so distribution
    /// suffixes like `5.10.23-rt` parse fine. Returns `None` when fewer than
    /// three numeric components are present.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '.');
        let major = leading_number(parts.next()?)?;
        let minor = leading_number(parts.next()?)?;
        let release = leading_number(parts.next()?)?;
        Some(KernelVersion {
            major,
            minor,
            release,
        })
    }

    /// The packed `(major << 16) | (minor << 8) | release` form.
    pub fn combined(&self) -> u32 {
        (self.major << 16) | (self.minor << 8) | self.release
    }

    /// Version of the running kernel, via `uname(2)`.
    ///
    /// Failures are reported as warnings and yield `None`; startup continues
    /// without version information.
    pub fn detect() -> Option<Self> {
        let info = match nix::sys::utsname::uname() {
            Ok(info) => info,
            Err(err) => {
                warn!("unable to determine GNU/Linux version: {}", err);
                return None;
            }
        };

        let release = info.release().to_string_lossy();
        match Self::parse(&release) {
            Some(version) => Some(version),
            None => {
                warn!("unable to parse kernel release {:?}", release);
                None
            }
        }
    }
}

/// The numeric prefix of `s`, if it has one.
fn leading_number(s: &str) -> Option<u32> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or_else(|| s.len());
    s[..end].parse().ok()
}
