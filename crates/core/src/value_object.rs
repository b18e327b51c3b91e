//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**; they are defined entirely by their
//! attribute values. A `Sku` or a stock `Location` is a value object, an
//! inventory item is not.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one. Validation happens in the constructor, so a value object
/// that exists is always well-formed.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Sku(String);
///
/// impl ValueObject for Sku {}
///
/// assert_eq!(Sku::parse("ITEM001")?, Sku::parse(" ITEM001 ")?);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
