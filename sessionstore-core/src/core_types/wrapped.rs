/*
    Wrapped values - maps statically typed values onto the store

    Responsibilities:
    Every value put in a data store is first converted to a `WrappedValue`, the
    canonical serializable representation, and tagged with a `TypeName`.

    Several primitive types share one wrapper variant (all signed integers use
    `Integer`, all unsigned integers use `UnsignedInteger`). The type name is
    what keeps them apart: an `i16` is stored as `Integer_int16` and can never be
    read back as an `i8` stored as `Integer_int8`, even though both payloads have
    the same shape.

    Structured types use the `Custom` variant, which carries their own bincode
    encoding. Use `impl_custom_data_store_type!` to register one.
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_store::TypeName;

use super::serializer::{from_bytes, to_bytes, CodecError};

/// Canonical serializable representation of a stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WrappedValue {
    Integer(i64),
    UnsignedInteger(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Name(String),
    String(String),
    Text(String),
    /// Externally serialized blob of a custom type
    Custom(Vec<u8>),
}

impl WrappedValue {
    /// Wrap a serde type as a custom blob.
    pub fn custom<T: Serialize>(value: &T) -> Result<Self, CodecError> {
        Ok(WrappedValue::Custom(to_bytes(value)?))
    }

    /// Unwrap a custom blob into `T`.
    pub fn into_custom<T: DeserializeOwned>(self, type_name: &TypeName) -> Result<T, CodecError> {
        match self {
            WrappedValue::Custom(bytes) => from_bytes(&bytes),
            _ => Err(CodecError::UnexpectedShape(type_name.clone())),
        }
    }
}

/// A value type that can be stored in a data store.
pub trait DataStoreType: Sized {
    /// Stable name identifying this type in the store.
    fn type_name() -> TypeName;

    fn to_wrapped(&self) -> Result<WrappedValue, CodecError>;

    fn from_wrapped(value: WrappedValue) -> Result<Self, CodecError>;
}

/// Identifier-like string, stored distinctly from `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Name(name.into())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display text, stored distinctly from `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Text(pub String);

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Text(text.into())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! impl_integer_type {
    ($ty:ty, $variant:ident, $wide:ty, $name:literal) => {
        impl DataStoreType for $ty {
            fn type_name() -> TypeName {
                TypeName::from($name)
            }

            fn to_wrapped(&self) -> Result<WrappedValue, CodecError> {
                Ok(WrappedValue::$variant(<$wide>::from(*self)))
            }

            fn from_wrapped(value: WrappedValue) -> Result<Self, CodecError> {
                match value {
                    WrappedValue::$variant(raw) => <$ty>::try_from(raw)
                        .map_err(|_| CodecError::Decode(format!("{} out of range for {}", raw, $name))),
                    _ => Err(CodecError::UnexpectedShape(Self::type_name())),
                }
            }
        }
    };
}

impl_integer_type!(i8, Integer, i64, "Integer_int8");
impl_integer_type!(i16, Integer, i64, "Integer_int16");
impl_integer_type!(i32, Integer, i64, "Integer_int32");
impl_integer_type!(i64, Integer, i64, "Integer_int64");
impl_integer_type!(u8, UnsignedInteger, u64, "Integer_uint8");
impl_integer_type!(u16, UnsignedInteger, u64, "Integer_uint16");
impl_integer_type!(u32, UnsignedInteger, u64, "Integer_uint32");
impl_integer_type!(u64, UnsignedInteger, u64, "Integer_uint64");

macro_rules! impl_plain_type {
    ($ty:ty, $variant:ident, $name:literal, |$v:ident| $wrap:expr, |$w:ident| $unwrap:expr) => {
        impl DataStoreType for $ty {
            fn type_name() -> TypeName {
                TypeName::from($name)
            }

            fn to_wrapped(&self) -> Result<WrappedValue, CodecError> {
                let $v = self;
                Ok(WrappedValue::$variant($wrap))
            }

            fn from_wrapped(value: WrappedValue) -> Result<Self, CodecError> {
                match value {
                    WrappedValue::$variant($w) => Ok($unwrap),
                    _ => Err(CodecError::UnexpectedShape(Self::type_name())),
                }
            }
        }
    };
}

impl_plain_type!(f32, Float, "Float_float32", |v| *v, |w| w);
impl_plain_type!(f64, Double, "Float_float64", |v| *v, |w| w);
impl_plain_type!(bool, Bool, "Bool", |v| *v, |w| w);
impl_plain_type!(String, String, "String", |v| v.clone(), |w| w);
impl_plain_type!(Name, Name, "Name", |v| v.0.clone(), |w| Name(w));
impl_plain_type!(Text, Text, "Text", |v| v.0.clone(), |w| Text(w));

/// Register a serde type as a custom data store type.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use sessionstore_core::impl_custom_data_store_type;
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Bounds {
///     min: i32,
///     max: i32,
/// }
///
/// impl_custom_data_store_type!(Bounds);
/// ```
#[macro_export]
macro_rules! impl_custom_data_store_type {
    ($ty:ident) => {
        $crate::impl_custom_data_store_type!($ty, stringify!($ty));
    };
    ($ty:ty, $name:expr) => {
        impl $crate::core_types::DataStoreType for $ty {
            fn type_name() -> $crate::core_store::TypeName {
                $crate::core_store::TypeName::new(format!("Custom_{}", $name))
            }

            fn to_wrapped(
                &self,
            ) -> ::std::result::Result<$crate::core_types::WrappedValue, $crate::core_types::CodecError>
            {
                $crate::core_types::WrappedValue::custom(self)
            }

            fn from_wrapped(
                value: $crate::core_types::WrappedValue,
            ) -> ::std::result::Result<Self, $crate::core_types::CodecError> {
                value.into_custom(&<Self as $crate::core_types::DataStoreType>::type_name())
            }
        }
    };
}
