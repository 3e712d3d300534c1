//! A log-rotation and archival daemon for named application log streams.
//!
//! External loggers signal a finished chunk of a stream by placing a
//! *sentinel* file named `<family>.<stamp>.bak` into the watch directory.
//! `bakrotd` promotes each sentinel into a numbered generation chain
//! `<family>.log.0` .. `<family>.log.N` (index 0 newest) and, whenever a
//! generation reaches the terminal index, bundles the aged generations into
//! a timestamped `<family>_<stamp>.tar.gz` archive, of which only the most
//! recent is retained.
//!
//! Sentinel intake never waits for compression: while the background worker
//! is busy, arriving sentinels are folded onto `<family>.log.0` with a
//! zero-copy transfer instead of rotating, and the worker restores a
//! coherent chain when it finishes. No sentinel's bytes are dropped or
//! duplicated, and within one family their order is preserved end-to-end.
//!
//! ```no_run
//! use bakrotd::{Rotator, Settings};
//!
//! let settings = Settings::new("var/log", vec!["ipstrc".to_owned(), "pdtrc".to_owned()]);
//! let rotator = Rotator::start(settings).unwrap();
//! // ... run until interrupted ...
//! rotator.shutdown();
//! ```

mod classify;
mod error;
mod rotator;
mod settings;
mod util;

pub use crate::classify::{classify, Classification, FamilyId};
pub use crate::error::RotatorError;
pub use crate::rotator::Rotator;
pub use crate::settings::Settings;
