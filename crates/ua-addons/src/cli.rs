use ua_addons::activate::{DisableOptions, EnableOptions};
use ua_addons::outcome::{Failure, PROGRAM};
use ua_addons::service::{Service, TokenFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Version,
    Status,
    Enable {
        service: Service,
        token: Option<String>,
        options: EnableOptions,
    },
    Disable {
        service: Service,
        options: DisableOptions,
    },
    IsEnabled {
        service: Service,
    },
}

pub(crate) fn help_text() -> String {
    let services = Service::ALL
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join("|");
    format!(
        "Usage:\n  {PROGRAM} help\n  {PROGRAM} version\n  {PROGRAM} status\n  {PROGRAM} enable-<service> <token> [-y|--assume-yes] [--allow-kernel-change]\n  {PROGRAM} disable-<service> [-r|--remove-snap]\n  {PROGRAM} is-<service>-enabled\n\nServices: {services}\n\nNotes:\n  - fips and fips-updates tokens are \"user:password\"; livepatch tokens are 32 hex characters.\n  - --allow-kernel-change and --remove-snap apply to livepatch only.\n  - Defaults via env:\n      UA_ADDONS_ROOT=<path>\n      UA_ADDONS_CONFIG=<path>\n      UA_ADDONS_LOG=<filter>\n\nExamples:\n  sudo {PROGRAM} enable-fips user:password\n  sudo {PROGRAM} enable-fips-updates user:password -y\n  sudo {PROGRAM} enable-livepatch 0123456789abcdef0123456789abcdef\n  sudo {PROGRAM} disable-livepatch -r\n"
    )
}

fn usage(message: String) -> Failure {
    Failure::Usage { message }
}

/// True when `arg` belongs in the credential slot rather than being read as a
/// flag. A `user:password` credential may itself start with a dash.
fn is_credential(service: Service, arg: &str) -> bool {
    !arg.starts_with('-')
        || (service.token_format() == TokenFormat::UserPassword && arg.contains(':'))
}

fn parse_enable(service: Service, args: &[String]) -> Result<Command, Failure> {
    let mut token: Option<String> = None;
    let mut options = EnableOptions::default();
    for a in args {
        match a.as_str() {
            "-y" | "--assume-yes" => options.assume_yes = true,
            "--allow-kernel-change" if service == Service::Livepatch => {
                options.allow_kernel_change = true
            }
            other if token.is_none() && is_credential(service, other) => {
                token = Some(other.to_string())
            }
            other => {
                return Err(usage(format!(
                    "Unknown option for enable-{}: \"{other}\"",
                    service.name()
                )));
            }
        }
    }
    Ok(Command::Enable {
        service,
        token,
        options,
    })
}

fn parse_disable(service: Service, args: &[String]) -> Result<Command, Failure> {
    let mut options = DisableOptions::default();
    for a in args {
        match a.as_str() {
            "-r" | "--remove-snap" if service == Service::Livepatch => {
                options.remove_package = true
            }
            other => return Err(usage(format!("Unknown option \"{other}\""))),
        }
    }
    Ok(Command::Disable { service, options })
}

/// `None` for an unrecognised command word.
pub(crate) fn parse(args: &[String]) -> Option<Result<Command, Failure>> {
    let command = args.first()?;
    let rest = &args[1..];
    match command.as_str() {
        "help" | "--help" | "-h" => return Some(Ok(Command::Help)),
        "version" | "--version" | "-V" => return Some(Ok(Command::Version)),
        "status" => return Some(Ok(Command::Status)),
        _ => {}
    }
    if let Some(service) = command.strip_prefix("enable-").and_then(Service::from_name) {
        return Some(parse_enable(service, rest));
    }
    if let Some(service) = command.strip_prefix("disable-").and_then(Service::from_name) {
        return Some(parse_disable(service, rest));
    }
    let service = command
        .strip_prefix("is-")
        .and_then(|s| s.strip_suffix("-enabled"))
        .and_then(Service::from_name)?;
    if let Some(extra) = rest.first() {
        return Some(Err(usage(format!("Unknown option \"{extra}\""))));
    }
    Some(Ok(Command::IsEnabled { service }))
}
