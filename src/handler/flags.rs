/*!
 * Handler Open Flags
 * Access and mode flags recorded on each handler
 */

use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Open flags with compact serialization (only true flags are written)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct OpenFlags {
    #[serde(skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub append: bool,
    /// No text-mode line-ending translation
    #[serde(skip_serializing_if = "is_false")]
    pub binary: bool,
}

impl OpenFlags {
    #[inline]
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Write + append
    #[inline]
    #[must_use]
    pub fn append_only() -> Self {
        Self {
            write: true,
            append: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_binary(self, binary: bool) -> Self {
        Self { binary, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write || self.append
    }

    /// Convert from POSIX access-mode bits (O_RDONLY, O_WRONLY, O_RDWR, O_APPEND, O_BINARY)
    pub fn from_posix(flags: u32) -> Self {
        let access_mode = flags & 0x0003;
        Self {
            read: access_mode == 0x0000 || access_mode == 0x0002,
            write: access_mode == 0x0001 || access_mode == 0x0002,
            append: flags & 0x0008 != 0,
            binary: flags & 0x10000 != 0,
        }
    }
}
