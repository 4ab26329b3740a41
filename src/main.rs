//! Binary entrypoint that launches the callsign watch bot.

use std::process::ExitCode;

use callsign_watch::start_callsign_watch;

/// Load configuration, open the subscription store, and poll Telegram.
fn main() -> ExitCode {
    start_callsign_watch::run()
}
