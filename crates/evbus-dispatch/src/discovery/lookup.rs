//! Calling-context token for bulk registration.

use super::model::{ClassInfo, MethodInfo, Visibility};

/// Identifies the module asking for registration
///
/// Only consulted for private methods: those are visible to a lookup taken
/// in the owning module or one of its children, as with Rust's own privacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    module: Option<&'static str>,
}

impl Lookup {
    /// A lookup taken in `module`, usually `module_path!()`
    pub fn new(module: &'static str) -> Self {
        Self {
            module: Some(module),
        }
    }

    /// A lookup with access to public methods only
    pub fn public() -> Self {
        Self { module: None }
    }

    /// The module this lookup was taken in
    pub fn module(&self) -> Option<&'static str> {
        self.module
    }

    /// Whether `method` of `class` may be called from this lookup
    pub fn can_access(&self, class: &ClassInfo, method: &MethodInfo) -> bool {
        match method.visibility {
            Visibility::Public => true,
            Visibility::Private => self.module.is_some_and(|module| {
                module == class.module
                    || module
                        .strip_prefix(class.module)
                        .is_some_and(|rest| rest.starts_with("::"))
            }),
        }
    }
}

/// A [`Lookup`] for the current module
#[macro_export]
macro_rules! lookup {
    () => {
        $crate::discovery::Lookup::new(::std::module_path!())
    };
}
