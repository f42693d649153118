//! Kernel command-line flags for the next boot.
//!
//! grub hosts get a drop-in that extends `GRUB_CMDLINE_LINUX_DEFAULT`; s390x
//! hosts get the flag appended to the existing `parameters=` line of
//! zipl.conf. A zipl.conf without that line is left untouched.

use std::io;

use crate::config::HostLayout;
use crate::outcome::Failure;
use crate::profile::PlatformProfile;
use crate::system::System;

const GRUB_VAR: &str = "GRUB_CMDLINE_LINUX_DEFAULT";
const ZIPL_KEY: &str = "parameters";
const BOOTDEV_KEY: &str = "bootdev";

fn strip_quotes(value: &str) -> (&str, Option<char>) {
    let v = value.trim();
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return (&v[1..v.len() - 1], Some(q));
        }
    }
    (v, None)
}

fn token_key(token: &str) -> &str {
    token.split_once('=').map_or(token, |(k, _)| k)
}

/// Appends each token unless already present. A `bootdev=` token replaces a
/// stale one rather than stacking.
fn append_tokens(value: &str, tokens: &[String]) -> String {
    let mut words: Vec<String> = value.split_whitespace().map(str::to_string).collect();
    for token in tokens {
        if words.iter().any(|w| w == token) {
            continue;
        }
        if token_key(token) == BOOTDEV_KEY {
            words.retain(|w| token_key(w) != BOOTDEV_KEY);
        }
        words.push(token.clone());
    }
    words.join(" ")
}

/// Rewrites every `key=` line; `None` when the file has no such line.
fn rewrite_assignments(
    existing: &str,
    key: &str,
    quote: Option<char>,
    tokens: &[String],
) -> Option<String> {
    let mut out = String::with_capacity(existing.len() + 64);
    let mut found = false;
    for line in existing.lines() {
        let assignment = line
            .split_once('=')
            .filter(|(k, _)| k.trim() == key && !line.trim_start().starts_with('#'));
        match assignment {
            Some((raw_key, raw_value)) => {
                found = true;
                let lead = &raw_value[..raw_value.len() - raw_value.trim_start().len()];
                let (value, existing_quote) = strip_quotes(raw_value);
                let merged = append_tokens(value, tokens);
                match existing_quote.or(quote) {
                    Some(q) => out.push_str(&format!("{raw_key}={lead}{q}{merged}{q}")),
                    None => out.push_str(&format!("{raw_key}={lead}{merged}")),
                }
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    found.then_some(out)
}

/// grub drop-in content with `tokens` on the default command line. The drop-in
/// is ours, so a missing assignment is created extending the inherited value.
pub fn apply_grub(existing: &str, tokens: &[String]) -> String {
    rewrite_assignments(existing, GRUB_VAR, Some('"'), tokens).unwrap_or_else(|| {
        let merged = append_tokens(&format!("${GRUB_VAR}"), tokens);
        let sep = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
        format!("{existing}{sep}{GRUB_VAR}=\"{merged}\"\n")
    })
}

/// zipl.conf content with `flag` appended to every `parameters=` line, or
/// `None` when there is no such line to extend.
pub fn apply_zipl(existing: &str, flag: &str) -> Option<String> {
    rewrite_assignments(existing, ZIPL_KEY, None, &[flag.to_string()])
}

pub fn apply_boot_flag<S: System>(
    system: &S,
    layout: &HostLayout,
    profile: &PlatformProfile,
    flag: &str,
) -> Result<(), Failure> {
    let zipl = profile.architecture == "s390x";
    let path = if zipl {
        layout.zipl_conf()
    } else {
        layout.grub_fips_cfg()
    };

    let existing = system
        .read_text(&path)
        .map_err(|e| Failure::io("read", &path, e))?;
    let updated = if zipl {
        let existing = existing.as_deref().ok_or_else(|| {
            Failure::io("read", &path, io::Error::new(io::ErrorKind::NotFound, "file not found"))
        })?;
        apply_zipl(existing, flag).ok_or_else(|| {
            Failure::io(
                "update",
                &path,
                io::Error::new(io::ErrorKind::InvalidData, "no parameters= line"),
            )
        })?
    } else {
        let mut tokens = vec![flag.to_string()];
        if let Some(device) = &profile.boot_device {
            tokens.push(format!("{BOOTDEV_KEY}={device}"));
        }
        apply_grub(existing.as_deref().unwrap_or_default(), &tokens)
    };
    if existing.as_deref() == Some(updated.as_str()) {
        tracing::debug!(path = %path.display(), "boot config already up to date");
        return Ok(());
    }
    system
        .write(&path, updated.as_bytes())
        .map_err(|e| Failure::io("write", &path, e))?;
    tracing::info!(path = %path.display(), flag, "boot config updated");
    Ok(())
}
