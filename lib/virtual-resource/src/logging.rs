//! Subscriber set-up for binaries and tests embedding this crate.

use is_terminal::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr subscriber filtered by `$RUST_LOG`. Without `$RUST_LOG`
/// (or when it fails to parse) only errors are printed.
///
/// Returns `false` if a global subscriber was already installed.
pub fn set_up_logging() -> bool {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(should_emit_colors())
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .compact();

    let filter_layer = EnvFilter::builder().from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

fn should_emit_colors() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_refused() {
        set_up_logging();
        assert!(!set_up_logging());
    }
}
