use env_logger::{Builder, Env};
use log::{debug, LevelFilter};

/// Default level when neither `--verbosity` nor `RUST_LOG` says otherwise
const DEFAULT_LEVEL: &str = "info";

/// Map a CLI verbosity onto a level filter; `--dbg` means debug
pub fn level_for(verbosity: Option<u8>, dbg: bool) -> Option<LevelFilter> {
    if dbg {
        return Some(LevelFilter::Debug);
    }
    verbosity.map(|v| match v {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    })
}

/// Install the process logger
///
/// `RUST_LOG` is honoured unless a level is given explicitly. Calling this again is a no-op.
pub fn init(verbosity: Option<u8>, dbg: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_LEVEL));
    if let Some(level) = level_for(verbosity, dbg) {
        builder.filter_level(level);
    }
    if builder.try_init().is_err() {
        debug!("Logger already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(None, false), None);
        assert_eq!(level_for(Some(0), false), Some(LevelFilter::Error));
        assert_eq!(level_for(Some(2), false), Some(LevelFilter::Info));
        assert_eq!(level_for(Some(4), false), Some(LevelFilter::Trace));
        assert_eq!(level_for(Some(0), true), Some(LevelFilter::Debug));
    }

    #[test]
    fn init_twice_is_harmless() {
        init(Some(2), false);
        init(Some(3), false);
    }
}
