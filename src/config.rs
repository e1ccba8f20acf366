use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqliteQueueError;

macro_rules! pragma_keyword_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $keyword:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        #[value(rename_all = "UPPER")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// SQL keyword used in the `PRAGMA` statement.
            #[must_use]
            pub fn as_sql(self) -> &'static str {
                match self {
                    $($name::$variant => $keyword),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_sql())
            }
        }

        impl FromStr for $name {
            type Err = SqliteQueueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($keyword) {
                        return Ok($name::$variant);
                    }
                )+
                Err(SqliteQueueError::ConfigError(format!(
                    "unknown {} value: {s}",
                    stringify!($name)
                )))
            }
        }
    };
}

pragma_keyword_enum! {
    /// `PRAGMA synchronous` levels.
    Synchronous {
        Off => "OFF",
        Normal => "NORMAL",
        Full => "FULL",
    }
}

pragma_keyword_enum! {
    /// `PRAGMA journal_mode` values.
    JournalMode {
        Delete => "DELETE",
        Truncate => "TRUNCATE",
        Persist => "PERSIST",
        Memory => "MEMORY",
        Wal => "WAL",
        Off => "OFF",
    }
}

pragma_keyword_enum! {
    /// `PRAGMA temp_store` values.
    TemporaryStore {
        Default => "DEFAULT",
        File => "FILE",
        Memory => "MEMORY",
    }
}

/// Per-connection pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pragmas {
    pub synchronous: Synchronous,
    pub journal_mode: JournalMode,
    pub temporary_store: TemporaryStore,
    #[serde(with = "millis")]
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
    pub case_sensitive_like: bool,
}

impl Default for Pragmas {
    fn default() -> Self {
        Self {
            synchronous: Synchronous::Normal,
            journal_mode: JournalMode::Delete,
            temporary_store: TemporaryStore::Memory,
            busy_timeout: Duration::from_secs(10),
            foreign_keys: true,
            case_sensitive_like: false,
        }
    }
}

/// Options for encoding structured values into JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonWriteOptions {
    pub pretty: bool,
}

/// Options for decoding JSON text back into structured fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonReadOptions {
    /// Accept top-level scalars (`1`, `"a"`, `null`) in addition to arrays and objects.
    pub allow_fragments: bool,
}

/// Options for opening a [`Database`](crate::Database) or a [`DatabaseQueue`](crate::DatabaseQueue).
///
/// Deserializable, so an application can keep it in its own config file:
/// ```rust
/// use sqlite_queue::prelude::*;
///
/// let opts: EngineOptions = serde_json::from_str(
///     r#"{"path": "app.db", "pragmas": {"journal_mode": "WAL"}}"#,
/// ).unwrap();
/// assert_eq!(opts.pragmas.journal_mode, JournalMode::Wal);
/// assert_eq!(opts.pragmas.synchronous, Synchronous::Normal);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Database file; `None` or `":memory:"` opens an in-memory database.
    pub path: Option<String>,
    pub pragmas: Pragmas,
    pub json_write: JsonWriteOptions,
    pub json_read: JsonReadOptions,
}

impl EngineOptions {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder(path: impl Into<String>) -> EngineOptionsBuilder {
        EngineOptionsBuilder::new(path)
    }
}

/// Fluent builder for [`EngineOptions`].
#[derive(Debug, Clone)]
pub struct EngineOptionsBuilder {
    opts: EngineOptions,
}

impl EngineOptionsBuilder {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            opts: EngineOptions::new(path),
        }
    }

    #[must_use]
    pub fn synchronous(mut self, synchronous: Synchronous) -> Self {
        self.opts.pragmas.synchronous = synchronous;
        self
    }

    #[must_use]
    pub fn journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.opts.pragmas.journal_mode = journal_mode;
        self
    }

    #[must_use]
    pub fn temporary_store(mut self, temporary_store: TemporaryStore) -> Self {
        self.opts.pragmas.temporary_store = temporary_store;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.pragmas.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.pragmas.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn case_sensitive_like(mut self, enabled: bool) -> Self {
        self.opts.pragmas.case_sensitive_like = enabled;
        self
    }

    #[must_use]
    pub fn json_write(mut self, json_write: JsonWriteOptions) -> Self {
        self.opts.json_write = json_write;
        self
    }

    #[must_use]
    pub fn json_read(mut self, json_read: JsonReadOptions) -> Self {
        self.opts.json_read = json_read;
        self
    }

    #[must_use]
    pub fn finish(self) -> EngineOptions {
        self.opts
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_parse_case_insensitively() {
        assert_eq!("wal".parse::<JournalMode>().unwrap(), JournalMode::Wal);
        assert_eq!("FULL".parse::<Synchronous>().unwrap(), Synchronous::Full);
        assert_eq!(
            "Default".parse::<TemporaryStore>().unwrap(),
            TemporaryStore::Default
        );
        assert!(matches!(
            "sometimes".parse::<Synchronous>(),
            Err(SqliteQueueError::ConfigError(_))
        ));
    }

    #[test]
    fn defaults_match_documented_pragmas() {
        let pragmas = Pragmas::default();
        assert_eq!(pragmas.synchronous.to_string(), "NORMAL");
        assert_eq!(pragmas.journal_mode.to_string(), "DELETE");
        assert_eq!(pragmas.temporary_store.to_string(), "MEMORY");
        assert_eq!(pragmas.busy_timeout, Duration::from_secs(10));
        assert!(pragmas.foreign_keys);
        assert!(!pragmas.case_sensitive_like);
    }

    #[test]
    fn builder_overrides_only_what_it_touches() {
        let opts = EngineOptions::builder("x.db")
            .journal_mode(JournalMode::Wal)
            .busy_timeout(Duration::from_millis(250))
            .finish();
        assert_eq!(opts.path.as_deref(), Some("x.db"));
        assert_eq!(opts.pragmas.journal_mode, JournalMode::Wal);
        assert_eq!(opts.pragmas.busy_timeout, Duration::from_millis(250));
        assert_eq!(opts.pragmas.synchronous, Synchronous::Normal);
    }

    #[test]
    fn busy_timeout_round_trips_as_millis() {
        let json = serde_json::to_value(Pragmas::default()).unwrap();
        assert_eq!(json["busy_timeout"], 10_000);
        assert_eq!(json["temporary_store"], "MEMORY");
    }
}
