//! Private-archive configuration: source list, pin file, credentials entry
//! and keyring. Every write overwrites managed content, so re-running after a
//! partial failure converges on the same files.

use crate::config::HostLayout;
use crate::outcome::Failure;
use crate::service::Repository;
use crate::system::System;

pub const AUTH_FILE_MODE: u32 = 0o600;

pub fn source_list(repo: &Repository, release: &str) -> String {
    let url = repo.url();
    format!("deb {url} {release} main\n# deb-src {url} {release} main\n")
}

pub fn pin_preferences(repo: &Repository, release: &str) -> String {
    format!(
        "Package: *\nPin: release o={}, n={release}\nPin-Priority: {}\n",
        repo.origin(),
        repo.pin_priority
    )
}

fn is_entry_for(line: &str, auth_path: &str) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.next() == Some("machine") && tokens.next() == Some(auth_path)
}

/// Replaces this repository's `machine` line, keeping every other line.
pub fn merge_auth_entry(existing: &str, repo: &Repository, user: &str, password: &str) -> String {
    let auth_path = repo.auth_path();
    let mut out = String::with_capacity(existing.len() + 128);
    for line in existing.lines() {
        if is_entry_for(line, &auth_path) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("machine {auth_path} login {user} password {password}\n"));
    out
}

fn write<S: System>(system: &S, path: &std::path::Path, contents: &[u8]) -> Result<(), Failure> {
    system
        .write(path, contents)
        .map_err(|e| Failure::io("write", path, e))
}

pub fn provision<S: System>(
    system: &S,
    layout: &HostLayout,
    repo: &Repository,
    user: &str,
    password: &str,
    release: &str,
) -> Result<(), Failure> {
    let list_path = layout.sources_dir().join(repo.list_file_name());
    write(system, &list_path, source_list(repo, release).as_bytes())?;

    let prefs_path = layout.preferences_dir().join(repo.preferences_file_name());
    write(system, &prefs_path, pin_preferences(repo, release).as_bytes())?;

    let auth_path = layout.auth_file();
    let existing = system
        .read_text(&auth_path)
        .map_err(|e| Failure::io("read", &auth_path, e))?
        .unwrap_or_default();
    system
        .write_private(
            &auth_path,
            merge_auth_entry(&existing, repo, user, password).as_bytes(),
        )
        .map_err(|e| Failure::io("write", &auth_path, e))?;
    system
        .set_mode(&auth_path, AUTH_FILE_MODE)
        .map_err(|e| Failure::io("set permissions on", &auth_path, e))?;

    let keyring_src = layout.keyring_source_dir().join(repo.keyring);
    let keyring = system
        .read(&keyring_src)
        .map_err(|e| Failure::io("read", &keyring_src, e))?
        .ok_or_else(|| {
            Failure::io(
                "read",
                &keyring_src,
                std::io::Error::new(std::io::ErrorKind::NotFound, "keyring not found"),
            )
        })?;
    let keyring_dst = layout.trusted_keyrings_dir().join(repo.keyring);
    write(system, &keyring_dst, &keyring)?;

    tracing::info!(repo = repo.slug, release, "repository provisioned");
    Ok(())
}
