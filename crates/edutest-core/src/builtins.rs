//! Core classes shared by every loading context

use crate::class::{Class, ClassRef};
use edutest_bytecode::PrimitiveType;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Root of every class hierarchy
pub const OBJECT: &str = "lang.Object";

/// The string class
pub const STRING: &str = "lang.String";

struct Builtins {
    object: ClassRef,
    string: ClassRef,
    boxed: Vec<ClassRef>,
    by_name: FxHashMap<&'static str, ClassRef>,
}

static BUILTINS: Lazy<Builtins> = Lazy::new(|| {
    let object = Class::builtin(OBJECT, None);
    let string = Class::builtin(STRING, Some(object.clone()));
    let boxed: Vec<ClassRef> = PrimitiveType::ALL
        .iter()
        .map(|kind| Class::builtin(kind.boxed_name(), Some(object.clone())))
        .collect();

    let mut by_name = FxHashMap::default();
    by_name.insert(OBJECT, object.clone());
    by_name.insert(STRING, string.clone());
    for (kind, class) in PrimitiveType::ALL.iter().zip(&boxed) {
        by_name.insert(kind.boxed_name(), class.clone());
    }

    Builtins {
        object,
        string,
        boxed,
        by_name,
    }
});

/// Look up a core class by qualified name
pub fn lookup(name: &str) -> Option<ClassRef> {
    BUILTINS.by_name.get(name).cloned()
}

/// Whether `name` names a core class
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.by_name.contains_key(name)
}

/// `lang.Object`
pub fn object() -> ClassRef {
    BUILTINS.object.clone()
}

/// `lang.String`
pub fn string() -> ClassRef {
    BUILTINS.string.clone()
}

/// Boxed class of a primitive kind (`int` → `lang.Integer`)
pub fn boxed(kind: PrimitiveType) -> ClassRef {
    BUILTINS.boxed[kind as usize].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_builtin_lookup() {
        assert!(Arc::ptr_eq(&lookup(OBJECT).unwrap(), &object()));
        assert!(Arc::ptr_eq(&lookup("lang.Long").unwrap(), &boxed(PrimitiveType::Long)));
        assert!(lookup("lang.Thread").is_none());
        assert!(is_builtin("lang.Character"));
    }

    #[test]
    fn test_builtin_hierarchy() {
        assert!(object().superclass().is_none());
        assert!(string().is_subclass_of(&object()));
        assert!(!object().is_subclass_of(&string()));
        assert_eq!(boxed(PrimitiveType::Char).simple_name(), "Character");
    }
}
