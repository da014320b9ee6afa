/*!
 * Device Classification
 * Two-part (major, minor) tags identifying device families and named devices
 */

use serde::{Deserialize, Serialize};
use std::fmt;

// Device families: recognised by major number, minor selects the unit
pub const DEV_FLOPPY_MAJOR: u16 = 2;
pub const DEV_SERIAL_MAJOR: u16 = 4;
pub const DEV_SD_MAJOR: u16 = 8;
pub const DEV_TAPE_MAJOR: u16 = 9;
pub const DEV_CDROM_MAJOR: u16 = 11;
pub const DEV_RAWDRIVE_MAJOR: u16 = 65;
pub const DEV_CYGDRIVE_MAJOR: u16 = 98;
pub const DEV_TTYM_MAJOR: u16 = 128;
pub const DEV_TTYS_MAJOR: u16 = 136;

// Named devices: recognised by the exact (major, minor) pair
pub const DEV_MEM_MAJOR: u16 = 1;
pub const DEV_TTY_MAJOR: u16 = 5;
pub const DEV_SOUND_MAJOR: u16 = 14;
pub const DEV_VIRT_MAJOR: u16 = 254;

/// Partitions per disk in the `sd` family
const SD_PARTITIONS: u16 = 16;

/// Device classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Device {
    pub major: u16,
    pub minor: u16,
}

impl Device {
    /// No classification
    pub const NONE: Device = Device::new(0, 0);

    pub const MEM: Device = Device::new(DEV_MEM_MAJOR, 1);
    pub const NULL: Device = Device::new(DEV_MEM_MAJOR, 3);
    pub const PORT: Device = Device::new(DEV_MEM_MAJOR, 4);
    pub const ZERO: Device = Device::new(DEV_MEM_MAJOR, 5);
    pub const RANDOM: Device = Device::new(DEV_MEM_MAJOR, 8);
    pub const URANDOM: Device = Device::new(DEV_MEM_MAJOR, 9);

    /// Controlling-terminal alias; resolved to the real terminal before a handler is built
    pub const TTY: Device = Device::new(DEV_TTY_MAJOR, 0);
    pub const CONSOLE: Device = Device::new(DEV_TTY_MAJOR, 1);
    pub const PTYM: Device = Device::new(DEV_TTY_MAJOR, 2);

    pub const OSS_DSP: Device = Device::new(DEV_SOUND_MAJOR, 3);

    pub const CONIN: Device = Device::new(DEV_VIRT_MAJOR, 1);
    pub const CONOUT: Device = Device::new(DEV_VIRT_MAJOR, 2);
    pub const WINDOWS: Device = Device::new(DEV_VIRT_MAJOR, 3);
    pub const PIPE: Device = Device::new(DEV_VIRT_MAJOR, 4);
    pub const PIPER: Device = Device::new(DEV_VIRT_MAJOR, 5);
    pub const PIPEW: Device = Device::new(DEV_VIRT_MAJOR, 6);
    pub const SOCKET: Device = Device::new(DEV_VIRT_MAJOR, 7);
    pub const FS: Device = Device::new(DEV_VIRT_MAJOR, 8);
    pub const CLIPBOARD: Device = Device::new(DEV_VIRT_MAJOR, 9);
    pub const PROC: Device = Device::new(DEV_VIRT_MAJOR, 10);
    pub const REGISTRY: Device = Device::new(DEV_VIRT_MAJOR, 11);
    pub const PROCESS: Device = Device::new(DEV_VIRT_MAJOR, 12);

    #[inline]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    #[inline]
    pub const fn serial(port: u16) -> Self {
        Self::new(DEV_SERIAL_MAJOR, port)
    }

    #[inline]
    pub const fn tty_slave(unit: u16) -> Self {
        Self::new(DEV_TTYS_MAJOR, unit)
    }

    #[inline]
    pub const fn tty_master(unit: u16) -> Self {
        Self::new(DEV_TTYM_MAJOR, unit)
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Whether the major number alone identifies the device family
    pub const fn is_family(&self) -> bool {
        matches!(
            self.major,
            DEV_FLOPPY_MAJOR
                | DEV_SERIAL_MAJOR
                | DEV_SD_MAJOR
                | DEV_TAPE_MAJOR
                | DEV_CDROM_MAJOR
                | DEV_RAWDRIVE_MAJOR
                | DEV_CYGDRIVE_MAJOR
                | DEV_TTYM_MAJOR
                | DEV_TTYS_MAJOR
        )
    }

    #[inline]
    pub fn is_console(&self) -> bool {
        matches!(*self, Self::CONSOLE | Self::CONIN | Self::CONOUT)
    }

    #[inline]
    pub fn is_socket(&self) -> bool {
        *self == Self::SOCKET
    }

    /// Classify a `/dev` path
    pub fn parse(path: &str) -> Option<Device> {
        let name = path.strip_prefix("/dev/")?;
        let named = match name {
            "mem" => Some(Self::MEM),
            "null" => Some(Self::NULL),
            "port" => Some(Self::PORT),
            "zero" => Some(Self::ZERO),
            "random" => Some(Self::RANDOM),
            "urandom" => Some(Self::URANDOM),
            "tty" => Some(Self::TTY),
            "console" => Some(Self::CONSOLE),
            "conin" => Some(Self::CONIN),
            "conout" => Some(Self::CONOUT),
            "ptmx" => Some(Self::PTYM),
            "dsp" => Some(Self::OSS_DSP),
            "windows" => Some(Self::WINDOWS),
            "pipe" => Some(Self::PIPE),
            "piper" => Some(Self::PIPER),
            "pipew" => Some(Self::PIPEW),
            "socket" => Some(Self::SOCKET),
            "clipboard" => Some(Self::CLIPBOARD),
            _ => None,
        };
        if named.is_some() {
            return named;
        }

        if let Some(unit) = unit_suffix(name, "ttyS") {
            return Some(Self::serial(unit));
        }
        if let Some(unit) = unit_suffix(name, "ttym") {
            return Some(Self::tty_master(unit));
        }
        if let Some(unit) = unit_suffix(name, "tty") {
            return Some(Self::tty_slave(unit));
        }
        if let Some(unit) = unit_suffix(name, "nst").or_else(|| unit_suffix(name, "st")) {
            return Some(Self::new(DEV_TAPE_MAJOR, unit));
        }
        if let Some(unit) = unit_suffix(name, "fd") {
            return Some(Self::new(DEV_FLOPPY_MAJOR, unit));
        }
        if let Some(unit) = unit_suffix(name, "scd") {
            return Some(Self::new(DEV_CDROM_MAJOR, unit));
        }
        if let Some(unit) = unit_suffix(name, "rawdrive") {
            return Some(Self::new(DEV_RAWDRIVE_MAJOR, unit));
        }
        parse_sd(name)
    }

    /// Native device path for devices that have one
    pub fn native_name(&self) -> Option<String> {
        match self.major {
            DEV_FLOPPY_MAJOR => Some(format!("\\\\.\\{}:", drive_letter(self.minor)?)),
            DEV_CDROM_MAJOR => Some(format!("\\\\.\\CdRom{}", self.minor)),
            DEV_SD_MAJOR => Some(format!(
                "\\Device\\Harddisk{}\\Partition{}",
                self.minor / SD_PARTITIONS,
                self.minor % SD_PARTITIONS
            )),
            DEV_RAWDRIVE_MAJOR => Some(format!("\\\\.\\PhysicalDrive{}", self.minor)),
            DEV_TAPE_MAJOR => Some(format!("\\\\.\\Tape{}", self.minor)),
            DEV_SERIAL_MAJOR => Some(format!("\\\\.\\COM{}", self.minor + 1)),
            _ => match *self {
                Self::CONSOLE => Some("CON".to_string()),
                Self::CONIN => Some("CONIN$".to_string()),
                Self::CONOUT => Some("CONOUT$".to_string()),
                Self::NULL => Some("NUL".to_string()),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

fn unit_suffix(name: &str, prefix: &str) -> Option<u16> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// /dev/sda -> 8:0, /dev/sdb3 -> 8:19
fn parse_sd(name: &str) -> Option<Device> {
    let rest = name.strip_prefix("sd")?;
    let mut chars = rest.chars();
    let letter = chars.next().filter(|c| c.is_ascii_lowercase())?;
    let disk = letter as u16 - 'a' as u16;
    let partition = match chars.as_str() {
        "" => 0,
        digits => digits.parse::<u16>().ok().filter(|p| *p < SD_PARTITIONS)?,
    };
    Some(Device::new(DEV_SD_MAJOR, disk * SD_PARTITIONS + partition))
}

fn drive_letter(unit: u16) -> Option<char> {
    (unit < 26).then(|| (b'A' + unit as u8) as char)
}
