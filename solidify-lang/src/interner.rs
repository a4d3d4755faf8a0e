use std::{cell::RefCell, fmt};

use string_interner::{backend::StringBackend, StringInterner};

/// Interned string. Berry strings are interned by the VM, so equality on
/// names and string constants is a cheap index comparison here too.
#[derive(Default, Copy, Clone, PartialEq, Debug, Hash, Eq, PartialOrd, Ord)]
pub struct Symbol(pub usize); //Symbol Trait is implemented on usize

pub struct SessionGlobals {
    pub symbol_interner: StringInterner<StringBackend<usize>>,
}

thread_local!(static SESSION_GLOBALS: RefCell<SessionGlobals> = RefCell::new(
    SessionGlobals {
        symbol_interner: StringInterner::new(),
    }
));

pub fn with_session_globals<R, F>(f: F) -> R
where
    F: FnOnce(&mut SessionGlobals) -> R,
{
    SESSION_GLOBALS.with_borrow_mut(f)
}

pub trait ToSymbol {
    fn to_symbol(&self) -> Symbol;
}

impl<T: AsRef<str>> ToSymbol for T {
    fn to_symbol(&self) -> Symbol {
        Symbol(with_session_globals(|session_globals| {
            session_globals.symbol_interner.get_or_intern(self.as_ref())
        }))
    }
}

impl Symbol {
    /// Runs `f` on the interned text. The interner may reallocate its buffer
    /// on the next insertion, so the borrow must not escape.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        with_session_globals(|session_globals| {
            f(session_globals
                .symbol_interner
                .resolve(self.0)
                .unwrap_or_default())
        })
    }

    /// Length in bytes of the interned text.
    pub fn len(&self) -> usize {
        self.with_str(str::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Note: to_string() is auto-implemented by this
impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = "speak".to_symbol();
        let b = String::from("speak").to_symbol();
        assert_eq!(a, b);
        assert_ne!(a, "bark".to_symbol());
        assert_eq!(a.to_string(), "speak");
        assert_eq!(a.len(), 5);
        assert!("".to_symbol().is_empty());
    }
}
