/*!
 * Handle Identifier
 * Recovers a POSIX path for a native handle inherited without one
 */

use crate::core::limits::{DEVICE_PREFIX, REMOTE_PREFIX, UNKNOWN_FILE};
use crate::core::types::NativeHandle;
use crate::host::Host;
use crate::path::PathResolver;
use tracing::debug;

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

/// Drop a `;volume-version\` segment from a mapping target
///
/// `\Device\LanmanRedirector\;Z:0000cdef\server\share` becomes
/// `\Device\LanmanRedirector\server\share`.
fn strip_volume_version(target: &str) -> String {
    if let Some(semicolon) = target.rfind(';') {
        if let Some(slash) = target[semicolon..].find('\\') {
            return format!("{}{}", &target[..semicolon], &target[semicolon + slash + 1..]);
        }
    }
    target.to_string()
}

/// Longest mapping target that prefixes `object_name` on a component boundary
///
/// On equal lengths the first enumerated mapping is kept.
fn longest_mapping(host: &dyn Host, object_name: &str, dos_names: &[String]) -> Option<(String, usize)> {
    let mut best: Option<(String, usize)> = None;
    for dos in dos_names.iter().filter(|name| name.contains(':')) {
        let Some(target) = host.dos_device_target(dos) else {
            continue;
        };
        let target = strip_volume_version(&target);
        let target = target.strip_suffix('\\').unwrap_or(&target);
        let len = target.len();

        if len <= best.as_ref().map_or(0, |(_, l)| *l) {
            continue;
        }
        if !starts_with_ignore_case(object_name, target)
            || !matches!(object_name.as_bytes().get(len), None | Some(b'\\'))
        {
            continue;
        }
        debug!(dos = %dos, target, "current match");
        best = Some((dos.clone(), len));
    }
    best
}

/// Canonical POSIX path for a native handle of unknown provenance
///
/// Never fails: an unqueryable handle yields the `"some disk file"`
/// placeholder. `None` means the host reports the handle as unnamed.
pub fn handle_to_name(host: &dyn Host, resolver: &dyn PathResolver, handle: NativeHandle) -> Option<String> {
    let object_name = match host.query_object_name(handle) {
        Ok(Some(name)) => name,
        Ok(None) => {
            debug!(%handle, "object has no name");
            return None;
        }
        Err(e) => {
            debug!(%handle, error = %e, "object name query failed");
            return Some(UNKNOWN_FILE.to_string());
        }
    };
    debug!(%handle, name = %object_name, "object name");

    if !starts_with_ignore_case(&object_name, DEVICE_PREFIX) {
        return Some(object_name);
    }
    let Some(dos_names) = host.dos_devices() else {
        return Some(object_name);
    };

    let native = match longest_mapping(host, &object_name, &dos_names) {
        Some((dos, len)) => {
            let dos = dos.strip_suffix('\\').unwrap_or(&dos);
            match &object_name[len..] {
                "" => format!("{}\\", dos),
                rest => format!("{}{}", dos, rest),
            }
        }
        None if starts_with_ignore_case(&object_name, REMOTE_PREFIX) => {
            debug!("remote drive");
            format!("\\\\{}", &object_name[REMOTE_PREFIX.len()..])
        }
        None => object_name,
    };

    debug!(derived = %native, "derived native path");
    Some(resolver.to_full_posix(&native))
}
