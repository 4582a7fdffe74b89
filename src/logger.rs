use crate::constants::{DEBUG_PREFIX, ERROR_PREFIX, INFO_PREFIX, WARNING_PREFIX};
use log::{Level, LevelFilter};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

fn level_for(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Installs the stderr logger. `--quiet` keeps only errors, `--verbose`
/// enables debug output, and `RUST_LOG` overrides both. Calling it again
/// only updates the quiet flag.
pub fn init(quiet: bool, verbose: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);

    let result = env_logger::Builder::new()
        .filter_level(level_for(quiet, verbose))
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            let prefix = match record.level() {
                Level::Error => ERROR_PREFIX,
                Level::Warn => WARNING_PREFIX,
                Level::Info => INFO_PREFIX,
                Level::Debug | Level::Trace => DEBUG_PREFIX,
            };
            writeln!(buf, "{} {}", prefix, record.args())
        })
        .try_init();

    if result.is_err() {
        log::trace!("logger already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_selection() {
        assert_eq!(level_for(false, false), LevelFilter::Warn);
        assert_eq!(level_for(false, true), LevelFilter::Debug);
        assert_eq!(level_for(true, true), LevelFilter::Error);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init(false, false);
        init(true, false);
        assert!(is_quiet());
        init(false, false);
        assert!(!is_quiet());
    }
}
