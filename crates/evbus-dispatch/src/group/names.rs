//! Process-wide registry of bus group names.

use evbus_core::ConfigError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::LazyLock;
use uuid::Uuid;

/// Name of the process-wide default group
pub const DEFAULT_GROUP_NAME: &str = "default";

static NAMES: LazyLock<Mutex<HashSet<String>>> =
    LazyLock::new(|| Mutex::new(HashSet::from([DEFAULT_GROUP_NAME.to_owned()])));

/// Claim `name`, failing if another live group holds it
pub(crate) fn reserve(name: &str) -> Result<(), ConfigError> {
    let mut names = NAMES.lock();
    if !names.insert(name.to_owned()) {
        return Err(ConfigError::DuplicateGroupName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Claim a fresh generated name
pub(crate) fn reserve_unique() -> String {
    let mut names = NAMES.lock();
    loop {
        let name = format!("group-{}", Uuid::new_v4().simple());
        if names.insert(name.clone()) {
            return name;
        }
    }
}

pub(crate) fn release(name: &str) {
    NAMES.lock().remove(name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let name = "names-test-reserve";
        reserve(name).expect("fresh name");
        assert_eq!(
            reserve(name),
            Err(ConfigError::DuplicateGroupName {
                name: name.to_owned()
            })
        );
        release(name);
        reserve(name).expect("released name");
        release(name);
    }

    #[test]
    fn test_default_name_is_taken() {
        assert!(reserve(DEFAULT_GROUP_NAME).is_err());
    }

    #[test]
    fn test_unique_names_differ() {
        let a = reserve_unique();
        let b = reserve_unique();
        assert_ne!(a, b);
        assert!(a.starts_with("group-"));
        release(&a);
        release(&b);
    }
}
