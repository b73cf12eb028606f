//! The Blend65 type system.
//!
//! Types are immutable value objects compared structurally. Every type knows
//! its own size in bytes, which the code generator needs for storage layout
//! and addressing mode selection.

use std::fmt;

/// A Blend65 source-level type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// The empty type; only valid as a function result.
    Void,
    /// A one-byte boolean (0 or 1).
    Bool,
    /// An 8-bit unsigned integer.
    Byte,
    /// A 16-bit unsigned integer.
    Word,
    /// A (possibly unsized) array of `element`.
    Array {
        element: Box<Type>,
        length: Option<u32>,
    },
    /// A pointer to `pointee`. Always 2 bytes wide, regardless of pointee size.
    Pointer { pointee: Box<Type> },
    /// A function signature. As a first-class value, a function type is an
    /// address (2 bytes).
    Function { params: Vec<Type>, result: Box<Type> },
    /// A struct with fields laid out in declaration order, no padding.
    Struct { fields: Vec<(String, Type)> },
    /// An enum with a chosen underlying representation.
    Enum {
        underlying: Box<Type>,
        variants: Vec<(String, i64)>,
    },
}

impl Type {
    /// Convenience constructor for a sized array type.
    pub fn array(element: Type, length: u32) -> Type {
        Type::Array {
            element: Box::new(element),
            length: Some(length),
        }
    }

    /// Convenience constructor for a dynamically-sized (pointer-represented) array.
    pub fn dynamic_array(element: Type) -> Type {
        Type::Array {
            element: Box::new(element),
            length: None,
        }
    }

    /// Convenience constructor for a pointer type.
    pub fn pointer(pointee: Type) -> Type {
        Type::Pointer {
            pointee: Box::new(pointee),
        }
    }

    /// Is this `Byte` or `Word` (the two "scalar" machine-arithmetic types)?
    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Byte | Type::Word | Type::Bool)
    }

    /// Does this type fit in a single 6502 byte?
    pub fn is_byte_sized(&self) -> bool {
        self.size_in_bytes() == 1
    }

    /// Does this type occupy exactly two bytes (word, pointer, or function address)?
    pub fn is_word_sized(&self) -> bool {
        self.size_in_bytes() == 2
    }

    /// The number of bytes this type occupies in storage.
    ///
    /// - `Void` = 0, `Bool` = 1, `Byte` = 1, `Word` = 2.
    /// - A sized array `E[N]` is `N * size_of(E)`.
    /// - A dynamic (unknown-length) array is a 2-byte pointer.
    /// - Every pointer and function type is 2 bytes (an address).
    /// - A struct is the sum of its field sizes; no padding is inserted.
    /// - An enum's size is its underlying integer type's size.
    pub fn size_in_bytes(&self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Bool => 1,
            Type::Byte => 1,
            Type::Word => 2,
            Type::Array {
                element,
                length: Some(n),
            } => n * element.size_in_bytes(),
            Type::Array { length: None, .. } => 2,
            Type::Pointer { .. } => 2,
            Type::Function { .. } => 2,
            Type::Struct { fields } => fields.iter().map(|(_, t)| t.size_in_bytes()).sum(),
            Type::Enum { underlying, .. } => underlying.size_in_bytes(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Byte => write!(f, "byte"),
            Type::Word => write!(f, "word"),
            Type::Array {
                element,
                length: Some(n),
            } => write!(f, "{element}[{n}]"),
            Type::Array { element, .. } => write!(f, "{element}[]"),
            Type::Pointer { pointee } => write!(f, "*{pointee}"),
            Type::Function { params, result } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {result}")
            }
            Type::Struct { fields } => {
                write!(f, "struct {{ ")?;
                for (name, t) in fields {
                    write!(f, "{name}: {t}, ")?;
                }
                write!(f, "}}")
            }
            Type::Enum { underlying, .. } => write!(f, "enum({underlying})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes() {
        assert_eq!(Type::Void.size_in_bytes(), 0);
        assert_eq!(Type::Bool.size_in_bytes(), 1);
        assert_eq!(Type::Byte.size_in_bytes(), 1);
        assert_eq!(Type::Word.size_in_bytes(), 2);
    }

    #[test]
    fn sized_array() {
        let t = Type::array(Type::Word, 4);
        assert_eq!(t.size_in_bytes(), 8);
    }

    #[test]
    fn dynamic_array_is_pointer_sized() {
        let t = Type::dynamic_array(Type::Byte);
        assert_eq!(t.size_in_bytes(), 2);
    }

    #[test]
    fn pointer_and_function_are_two_bytes() {
        assert_eq!(Type::pointer(Type::Byte).size_in_bytes(), 2);
        assert_eq!(
            Type::Function {
                params: vec![Type::Byte, Type::Word],
                result: Box::new(Type::Void),
            }
            .size_in_bytes(),
            2
        );
    }

    #[test]
    fn struct_is_sum_of_fields_no_padding() {
        let t = Type::Struct {
            fields: vec![
                ("x".to_string(), Type::Byte),
                ("y".to_string(), Type::Word),
                ("z".to_string(), Type::Byte),
            ],
        };
        assert_eq!(t.size_in_bytes(), 4);
    }

    #[test]
    fn enum_takes_underlying_size() {
        let t = Type::Enum {
            underlying: Box::new(Type::Word),
            variants: vec![("A".to_string(), 0), ("B".to_string(), 1)],
        };
        assert_eq!(t.size_in_bytes(), 2);
    }

    proptest::proptest! {
        #[test]
        fn array_size_is_linear(n in 0u32..64, elem_word in proptest::bool::ANY) {
            let elem = if elem_word { Type::Word } else { Type::Byte };
            let per = elem.size_in_bytes();
            let t = Type::array(elem, n);
            proptest::prop_assert_eq!(t.size_in_bytes(), n * per);
        }
    }
}
