//! Discovery of the local Discord IPC endpoint

#[cfg(unix)]
const SOCKET_DIR_VARS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Sandboxed Discord installs put the socket in a sub-directory
#[cfg(unix)]
const SANDBOX_SUBDIRS: [&str; 3] = ["", "app/com.discordapp.Discord", "snap.discord"];

/// Discord listens on the first free of these slots
#[cfg(any(unix, windows))]
const MAX_SLOTS: u8 = 10;

/// Whether a Discord client appears to be listening locally
#[cfg(unix)]
pub fn endpoint_available() -> bool {
    use std::path::PathBuf;

    let mut bases: Vec<PathBuf> = SOCKET_DIR_VARS
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .collect();
    bases.push(PathBuf::from("/tmp"));

    bases.iter().any(|base| {
        SANDBOX_SUBDIRS.iter().any(|sub| {
            (0..MAX_SLOTS).any(|slot| base.join(sub).join(format!("discord-ipc-{}", slot)).exists())
        })
    })
}

#[cfg(windows)]
pub fn endpoint_available() -> bool {
    (0..MAX_SLOTS).any(|slot| {
        std::path::Path::new(&format!(r"\\.\pipe\discord-ipc-{}", slot)).exists()
    })
}

#[cfg(not(any(unix, windows)))]
pub fn endpoint_available() -> bool {
    true
}
