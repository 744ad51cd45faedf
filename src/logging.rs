use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// Silent unless `verbose`; server mode always reports at info level.
pub fn init(verbose: bool, server: bool) -> Result<()> {
    let level = match (verbose, server) {
        (true, _) => Level::DEBUG,
        (false, true) => Level::INFO,
        (false, false) => return Ok(()),
    };
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}
