use std::time::Duration;

use crate::logic::password::Credential;
use crate::platform::Platform;

use super::executor::ExecPolicy;
use super::spawn::Invocation;
use super::utils::powershell_single_quote;

/// What: Build the no-op elevation probe for `platform`.
///
/// Input:
/// - `platform`: Host platform tag.
/// - `credential`: Passphrase piped to `sudo` on Unix-like hosts.
/// - `timeout`: Probe deadline.
///
/// Output:
/// - `Invocation` that exits zero iff elevation succeeded.
///
/// Details:
/// - Unix: `sudo -S -k -v -p ''` reads the passphrase from stdin, ignores any
///   cached timestamp and validates without running a command.
/// - Windows: an elevated PowerShell that immediately exits; no stdin.
#[must_use]
pub fn probe_invocation(
    platform: Platform,
    credential: &Credential,
    timeout: Duration,
) -> Invocation {
    if platform.uses_sudo() {
        Invocation::new("sudo")
            .args(["-S", "-k", "-v", "-p", ""])
            .stdin(credential.stdin_line())
            .timeout(timeout)
    } else {
        Invocation::new("powershell")
            .args([
                "-NoProfile",
                "-Command",
                "Start-Process powershell -Verb RunAs -ArgumentList 'exit' -Wait",
            ])
            .timeout(timeout)
    }
}

/// What: Build the elevated invocation running one resolved install command.
///
/// Input:
/// - `platform`: Host platform tag.
/// - `command`: Shell command from the template (one `||` alternative on macOS).
/// - `credential`: Passphrase piped to `sudo` on Unix-like hosts.
/// - `policy`: Supplies the deadline and output bound.
///
/// Output:
/// - `Invocation` ready for a `Spawner`.
///
/// Details:
/// - Unix: `sudo -S -p '' -- bash -c <command>`. The command is one argv
///   element, so neither it nor the passphrase is interpolated into a shell line.
/// - Linux adds `DEBIAN_FRONTEND=noninteractive`.
/// - macOS: Homebrew refuses to run as root, so a `brew` command runs as the
///   invoking user under plain `bash -c` with no stdin.
/// - Windows: `winget` commands run directly under `cmd /C`; anything else is
///   wrapped in `Start-Process -Verb RunAs` so UAC elevates it.
#[must_use]
pub fn install_invocation(
    platform: Platform,
    command: &str,
    credential: &Credential,
    policy: &ExecPolicy,
) -> Invocation {
    let inv = match platform {
        Platform::Linux => Invocation::new("sudo")
            .args(["-S", "-p", "", "--", "bash", "-c", command])
            .stdin(credential.stdin_line())
            .env("DEBIAN_FRONTEND", "noninteractive"),
        Platform::Macos if runs_as_user(command) => {
            Invocation::new("bash").args(["-c", command])
        }
        Platform::Macos => Invocation::new("sudo")
            .args(["-S", "-p", "", "--", "bash", "-c", command])
            .stdin(credential.stdin_line()),
        Platform::Windows => windows_invocation(command)
            .env("POWERSHELL_TELEMETRY_OPTOUT", "1")
            .env("POWERSHELL_UPDATECHECK", "0"),
    };
    inv.timeout(policy.command_timeout)
        .max_output_bytes(policy.max_output_bytes)
}

/// User-level package managers that must not be run through `sudo`.
const USER_LEVEL_MANAGERS: &[&str] = &["brew"];

fn runs_as_user(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .is_some_and(|program| USER_LEVEL_MANAGERS.contains(&program))
}

fn windows_invocation(command: &str) -> Invocation {
    if command.contains("winget") {
        return Invocation::new("cmd").args(["/C", command]);
    }
    let argument_list = powershell_single_quote(&format!("/C {command}"));
    Invocation::new("powershell").args([
        "-NoProfile".to_string(),
        "-Command".to_string(),
        format!("Start-Process -Wait -Verb RunAs -FilePath cmd -ArgumentList {argument_list}"),
    ])
}
