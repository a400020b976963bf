//! Tracing setup. Logs go to stderr so they never mix with command output.
//!
//! `CONVOY_LOG` selects the filter (standard env-filter syntax, default
//! `warn`). `CONVOY_LOG_FORMAT=json` switches to line-delimited JSON.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter =
        EnvFilter::try_from_env("CONVOY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    let json = std::env::var("CONVOY_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
