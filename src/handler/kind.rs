/*!
 * Handler Kinds
 * Closed set of handler variants and their classification dispatch
 */

use crate::device::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handler variant selected by device classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Console,
    TtySlave,
    TtyMaster,
    PtyMaster,
    Pipe,
    Socket,
    DiskFile,
    Cygdrive,
    /// Floppy, cdrom, fixed disk partition and raw drive
    BlockDevice,
    Tape,
    Null,
    Zero,
    Random,
    /// Physical memory and I/O port access
    Mem,
    Clipboard,
    Dsp,
    Serial,
    Proc,
    Registry,
    Process,
    Windows,
}

impl HandlerKind {
    /// Dispatch a classification to its handler variant
    ///
    /// Families match on the major number alone; everything else needs the
    /// exact (major, minor) pair. The ctty alias (`/dev/tty`) has no variant
    /// of its own and must be resolved to a concrete device first.
    pub fn from_device(device: Device) -> Option<Self> {
        if device.is_family() {
            return match device.major {
                DEV_TTYS_MAJOR => Some(HandlerKind::TtySlave),
                DEV_TTYM_MAJOR => Some(HandlerKind::TtyMaster),
                DEV_CYGDRIVE_MAJOR => Some(HandlerKind::Cygdrive),
                DEV_FLOPPY_MAJOR | DEV_CDROM_MAJOR | DEV_SD_MAJOR | DEV_RAWDRIVE_MAJOR => {
                    Some(HandlerKind::BlockDevice)
                }
                DEV_TAPE_MAJOR => Some(HandlerKind::Tape),
                DEV_SERIAL_MAJOR => Some(HandlerKind::Serial),
                _ => None,
            };
        }

        match device {
            Device::CONSOLE | Device::CONIN | Device::CONOUT => Some(HandlerKind::Console),
            Device::PTYM => Some(HandlerKind::PtyMaster),
            Device::WINDOWS => Some(HandlerKind::Windows),
            Device::PIPE | Device::PIPER | Device::PIPEW => Some(HandlerKind::Pipe),
            Device::SOCKET => Some(HandlerKind::Socket),
            Device::FS => Some(HandlerKind::DiskFile),
            Device::NULL => Some(HandlerKind::Null),
            Device::ZERO => Some(HandlerKind::Zero),
            Device::RANDOM | Device::URANDOM => Some(HandlerKind::Random),
            Device::MEM | Device::PORT => Some(HandlerKind::Mem),
            Device::CLIPBOARD => Some(HandlerKind::Clipboard),
            Device::OSS_DSP => Some(HandlerKind::Dsp),
            Device::PROC => Some(HandlerKind::Proc),
            Device::REGISTRY => Some(HandlerKind::Registry),
            Device::PROCESS => Some(HandlerKind::Process),
            _ => None,
        }
    }

    /// Counted against the table's console descriptors
    #[inline]
    pub fn is_console(self) -> bool {
        self == HandlerKind::Console
    }

    #[inline]
    pub fn is_socket(self) -> bool {
        self == HandlerKind::Socket
    }

    /// Terminal-like kinds that keep the console attached while open
    #[inline]
    pub fn is_pty(self) -> bool {
        matches!(
            self,
            HandlerKind::TtySlave | HandlerKind::TtyMaster | HandlerKind::PtyMaster
        )
    }

    /// Kinds whose select records are unconditionally ready
    pub fn always_ready(self) -> bool {
        matches!(
            self,
            HandlerKind::DiskFile
                | HandlerKind::Cygdrive
                | HandlerKind::BlockDevice
                | HandlerKind::Tape
                | HandlerKind::Null
                | HandlerKind::Zero
                | HandlerKind::Random
                | HandlerKind::Mem
                | HandlerKind::Clipboard
                | HandlerKind::Dsp
                | HandlerKind::Proc
                | HandlerKind::Registry
                | HandlerKind::Process
        )
    }

    /// Kinds whose native handles do not survive inheritance as-is
    pub fn needs_fork_fixup(self) -> bool {
        matches!(
            self,
            HandlerKind::Console
                | HandlerKind::TtySlave
                | HandlerKind::TtyMaster
                | HandlerKind::PtyMaster
                | HandlerKind::Socket
                | HandlerKind::Windows
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::Console => "console",
            HandlerKind::TtySlave => "tty_slave",
            HandlerKind::TtyMaster => "tty_master",
            HandlerKind::PtyMaster => "pty_master",
            HandlerKind::Pipe => "pipe",
            HandlerKind::Socket => "socket",
            HandlerKind::DiskFile => "disk_file",
            HandlerKind::Cygdrive => "cygdrive",
            HandlerKind::BlockDevice => "block_device",
            HandlerKind::Tape => "tape",
            HandlerKind::Null => "null",
            HandlerKind::Zero => "zero",
            HandlerKind::Random => "random",
            HandlerKind::Mem => "mem",
            HandlerKind::Clipboard => "clipboard",
            HandlerKind::Dsp => "dsp",
            HandlerKind::Serial => "serial",
            HandlerKind::Proc => "proc",
            HandlerKind::Registry => "registry",
            HandlerKind::Process => "process",
            HandlerKind::Windows => "windows",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
