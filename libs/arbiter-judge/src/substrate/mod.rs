//! Execution substrate
//!
//! Every supported submission language is rewritten into one small,
//! brace-structured, dynamically typed language and executed by the
//! interpreter in this module. Semantic differences between the source
//! languages that matter for judging (division, modulo, negative indices,
//! map iteration order, characters) are carried by [`Dialect`].

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod value;

pub use interpreter::{Budget, Interpreter, Trap};
pub use parser::compile;
pub use value::Dyn;

use arbiter_common::types::Language;

/// Source-language semantics the substrate honours at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Python,
    /// Java and C++
    CFamily,
}

impl Dialect {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Python => Dialect::Python,
            Language::Java | Language::Cpp => Dialect::CFamily,
        }
    }

    /// `/` on two integers yields a float
    pub fn true_division(self) -> bool {
        self == Dialect::Python
    }

    /// `%` and `//` round toward negative infinity
    pub fn floor_modulo(self) -> bool {
        self == Dialect::Python
    }

    pub fn negative_index(self) -> bool {
        self == Dialect::Python
    }

    /// `"a" + 1` concatenates instead of faulting
    pub fn concat_coerces(self) -> bool {
        self == Dialect::CFamily
    }

    /// Maps iterate in insertion order; otherwise in key order
    pub fn insertion_ordered_maps(self) -> bool {
        self == Dialect::Python
    }

    /// `floor`, `ceil`, `round` and integer `pow` produce integers
    pub fn integral_math(self) -> bool {
        self == Dialect::Python
    }

    /// Characters are their own numeric type in C-family languages and
    /// one-character strings in Python
    pub fn char_value(self, c: char) -> Dyn {
        match self {
            Dialect::CFamily => Dyn::Char(c),
            Dialect::Python => Dyn::str(c.encode_utf8(&mut [0; 4])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for_language() {
        assert_eq!(Dialect::for_language(Language::Python), Dialect::Python);
        assert_eq!(Dialect::for_language(Language::Java), Dialect::CFamily);
        assert_eq!(Dialect::for_language(Language::Cpp), Dialect::CFamily);
    }

    #[test]
    fn test_char_value() {
        assert!(matches!(Dialect::CFamily.char_value('a'), Dyn::Char('a')));
        assert_eq!(Dialect::Python.char_value('a').render(), "a");
        assert_eq!(Dialect::Python.char_value('a').type_name(), "string");
    }
}
