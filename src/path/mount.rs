/*!
 * Mount Table Resolver
 * Drive-letter mount table mapping POSIX paths onto native paths
 */

use super::traits::*;
use crate::device::{Device, DEV_CYGDRIVE_MAJOR};
use parking_lot::RwLock;

/// Longest accepted path, in bytes
pub const PATH_MAX: usize = 4096;

/// Default prefix under which every drive letter is reachable
pub const CYGDRIVE_PREFIX: &str = "/cygdrive";

/// One POSIX-to-native mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub posix: String,
    pub native: String,
    pub binary: bool,
}

impl Mount {
    pub fn new<P: Into<String>, N: Into<String>>(posix: P, native: N) -> Self {
        Self {
            posix: posix.into(),
            native: native.into(),
            binary: true,
        }
    }

    pub fn text<P: Into<String>, N: Into<String>>(posix: P, native: N) -> Self {
        Self {
            binary: false,
            ..Self::new(posix, native)
        }
    }
}

/// Resolver backed by a mount table
pub struct MountTableResolver {
    mounts: RwLock<Vec<Mount>>, // Longest POSIX prefixes first
}

impl MountTableResolver {
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(Vec::new()),
        }
    }

    /// Resolver with `/` mounted on `root`
    pub fn with_root<N: Into<String>>(root: N) -> Self {
        let resolver = Self::new();
        resolver.mount(Mount::new("/", root));
        resolver
    }

    pub fn mount(&self, mount: Mount) {
        let mut mounts = self.mounts.write();
        mounts.retain(|m| m.posix != mount.posix);
        mounts.push(mount);
        mounts.sort_by(|a, b| b.posix.len().cmp(&a.posix.len()));
    }

    fn resolve_posix(&self, posix: &str) -> PathResult<ResolvedPath> {
        if posix.starts_with("/dev/") {
            let device = Device::parse(posix).ok_or_else(|| PathError::NotFound(posix.to_string()))?;
            return Ok(ResolvedPath {
                device,
                posix_path: posix.to_string(),
                native_path: device.native_name(),
                exists: true,
                binary: true,
            });
        }

        if let Some(device) = proc_device(posix) {
            return Ok(ResolvedPath {
                device,
                posix_path: posix.to_string(),
                native_path: None,
                exists: true,
                binary: true,
            });
        }

        if posix == CYGDRIVE_PREFIX {
            return Ok(ResolvedPath {
                device: Device::new(DEV_CYGDRIVE_MAJOR, 0),
                posix_path: posix.to_string(),
                native_path: None,
                exists: true,
                binary: true,
            });
        }

        if let Some(rest) = posix.strip_prefix(CYGDRIVE_PREFIX).and_then(|r| r.strip_prefix('/')) {
            let (letter, tail) = rest.split_once('/').unwrap_or((rest, ""));
            if letter.len() == 1 && letter.chars().all(|c| c.is_ascii_alphabetic()) {
                return Ok(ResolvedPath {
                    device: Device::FS,
                    posix_path: posix.to_string(),
                    native_path: Some(format!(
                        "{}:\\{}",
                        letter.to_ascii_uppercase(),
                        tail.replace('/', "\\")
                    )),
                    exists: true,
                    binary: true,
                });
            }
        }

        let mounts = self.mounts.read();
        let mount = mounts
            .iter()
            .find(|m| under_prefix(posix, &m.posix))
            .ok_or_else(|| PathError::InvalidPath(format!("no mount covers {}", posix)))?;

        let rest = posix[mount.posix.len()..].trim_start_matches('/');
        let native = if rest.is_empty() {
            mount.native.clone()
        } else {
            format!(
                "{}\\{}",
                mount.native.trim_end_matches('\\'),
                rest.replace('/', "\\")
            )
        };

        Ok(ResolvedPath {
            device: Device::FS,
            posix_path: posix.to_string(),
            native_path: Some(native),
            exists: true,
            binary: mount.binary,
        })
    }
}

impl Default for MountTableResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver for MountTableResolver {
    fn resolve(&self, path: &str, options: ResolveOptions) -> PathResult<ResolvedPath> {
        if path.is_empty() {
            if options.null_empty {
                return Err(PathError::NotFound("empty path".to_string()));
            }
            return self.resolve_posix("/");
        }
        if path.len() > PATH_MAX {
            return Err(PathError::NameTooLong(format!("{} bytes", path.len())));
        }

        let posix = if is_native(path) {
            self.to_full_posix(path)
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let cleaned = path_clean::clean(&posix);
        self.resolve_posix(&cleaned.to_string_lossy())
    }

    fn to_full_posix(&self, native: &str) -> String {
        if let Some(unc) = native.strip_prefix("\\\\") {
            return format!("//{}", unc.replace('\\', "/"));
        }

        if has_drive_letter(native) {
            let mounts = self.mounts.read();
            let best = mounts
                .iter()
                .filter(|m| native_under_prefix(native, &m.native))
                .max_by_key(|m| m.native.trim_end_matches('\\').len());
            if let Some(mount) = best {
                let rest = native[mount.native.trim_end_matches('\\').len()..]
                    .trim_start_matches('\\')
                    .replace('\\', "/");
                return join_posix(&mount.posix, &rest);
            }

            let letter = native[..1].to_ascii_lowercase();
            let rest = native[2..].trim_start_matches('\\').replace('\\', "/");
            return join_posix(&format!("{}/{}", CYGDRIVE_PREFIX, letter), &rest);
        }

        let converted = native.replace('\\', "/");
        if converted.starts_with('/') {
            converted
        } else {
            format!("/{}", converted)
        }
    }
}

fn proc_device(posix: &str) -> Option<Device> {
    let rest = match posix.strip_prefix("/proc") {
        Some("") => return Some(Device::PROC),
        Some(rest) => rest.strip_prefix('/')?,
        None => return None,
    };
    let first = rest.split('/').next().unwrap_or("");
    if first == "registry" {
        Some(Device::REGISTRY)
    } else if first == "self" || (!first.is_empty() && first.bytes().all(|b| b.is_ascii_digit())) {
        Some(Device::PROCESS)
    } else {
        Some(Device::PROC)
    }
}

fn is_native(path: &str) -> bool {
    path.contains('\\') || has_drive_letter(path)
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    path.starts_with(prefix) && matches!(path.as_bytes().get(prefix.len()), None | Some(b'/'))
}

fn native_under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('\\');
    path.get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
        && matches!(path.as_bytes().get(prefix.len()), None | Some(b'\\'))
}

fn join_posix(base: &str, rest: &str) -> String {
    match (base.trim_end_matches('/'), rest.is_empty()) {
        ("", true) => "/".to_string(),
        (base, true) => base.to_string(),
        (base, false) => format!("{}/{}", base, rest),
    }
}
