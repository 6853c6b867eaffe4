//! The whitelist gate deciding which services the scheduler may touch.

use snafu::ResultExt;
use std::env;

/// Environment variable holding the comma-separated whitelist.
const WHITELIST_VAR: &str = "WHITELIST";

/// Substring whitelist parsed from the WHITELIST environment variable.
///
/// Matching is plain case-sensitive containment, so whitelisting "test" also
/// matches "latest-service". Loose on purpose: operators select services by
/// environment fragments like "dev" or "-staging".
#[derive(Debug)]
pub(crate) struct Whitelist {
    entries: Vec<String>,
}

impl Whitelist {
    pub(crate) fn from_env() -> Result<Self> {
        let raw = env::var(WHITELIST_VAR).context(error::MissingEnvSnafu {
            var: WHITELIST_VAR,
        })?;
        Ok(Self::new(&raw))
    }

    /// Splits a comma-delimited value into entries. Empty fragments are
    /// dropped; an empty string is a substring of everything, and an empty
    /// or trailing-comma WHITELIST must not match every service.
    pub(crate) fn new(raw: &str) -> Self {
        let entries = raw
            .split(',')
            .filter(|fragment| !fragment.is_empty())
            .map(String::from)
            .collect();
        Self { entries }
    }

    /// True iff any whitelist entry occurs within the identifier.
    pub(crate) fn permits(&self, identifier: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| identifier.contains(entry.as_str()))
    }
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(crate) enum Error {
        #[snafu(display("Environment variable {} is not set: {}", var, source))]
        MissingEnv {
            var: String,
            source: std::env::VarError,
        },
    }
}
type Result<T> = std::result::Result<T, error::Error>;

#[cfg(test)]
mod test {
    use super::Whitelist;

    #[test]
    fn matches_any_substring() {
        let whitelist = Whitelist::new("test,dev");
        assert!(whitelist.permits("arn:aws:ecs:eu-west-1:111122223333:service/test-cluster/test-service"));
        assert!(whitelist.permits("dev-api"));
    }

    #[test]
    fn containment_not_exact_match() {
        let whitelist = Whitelist::new("test");
        assert!(whitelist.permits("latest-service"));
    }

    #[test]
    fn case_sensitive() {
        let whitelist = Whitelist::new("Test");
        assert!(!whitelist.permits("test-service"));
    }

    #[test]
    fn no_match_when_no_entry_contained() {
        let whitelist = Whitelist::new("prod");
        assert!(!whitelist.permits("arn:aws:ecs:eu-west-1:111122223333:service/test-cluster/test-service"));
    }

    #[test]
    fn empty_value_matches_nothing() {
        let whitelist = Whitelist::new("");
        assert!(!whitelist.permits("any-service"));
    }

    #[test]
    fn empty_fragments_are_dropped() {
        let whitelist = Whitelist::new("prod,,");
        assert!(!whitelist.permits("test-service"));
        assert!(whitelist.permits("prod-service"));
    }
}
