use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use ua_addons::config::{LOG_ENV, Settings};
use ua_addons::console::{Console, Terminal};
use ua_addons::outcome::{EXIT_FAILURE, EXIT_OK, PROGRAM, conclude};
use ua_addons::pipeline;
use ua_addons::system::HostSystem;

mod cli;

use cli::Command;

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn dispatch(command: Command, console: &mut Terminal) -> i32 {
    match command {
        Command::Help => {
            console.notice(cli::help_text().trim_end());
            return EXIT_OK;
        }
        Command::Version => {
            console.notice(env!("CARGO_PKG_VERSION"));
            return EXIT_OK;
        }
        _ => {}
    }

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => return conclude(console, Err(e.into())),
    };
    let system = HostSystem;
    let result = match command {
        Command::Help | Command::Version => Ok(()),
        Command::Status => pipeline::status(&system, console, &settings).await,
        Command::Enable {
            service,
            token,
            options,
        } => {
            pipeline::enable(
                &system,
                console,
                &settings,
                service,
                token.as_deref(),
                options,
            )
            .await
        }
        Command::Disable { service, options } => {
            pipeline::disable(&system, console, &settings, service, options).await
        }
        Command::IsEnabled { service } => {
            match pipeline::is_enabled(&system, &settings, service).await {
                Ok(true) => return EXIT_OK,
                Ok(false) => return EXIT_FAILURE,
                Err(e) => Err(e),
            }
        }
    };
    conclude(console, result)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut console = Terminal;

    let code = match cli::parse(&args) {
        Some(Ok(command)) => {
            tracing::debug!(command = %args[0], "dispatching");
            dispatch(command, &mut console).await
        }
        Some(Err(failure)) => conclude(&mut console, Err(failure)),
        None => {
            if let Some(other) = args.first() {
                console.error(&format!("{PROGRAM}: unknown command `{other}`"));
            }
            console.error(cli::help_text().trim_end());
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
