//! Closed enumerations with machine values and human-readable labels.
//!
//! A [`ChoicesEnum`] is a fieldless enum whose members each carry a stable
//! machine value (what gets persisted and compared) and a label (what gets
//! shown to operators). Enumerations are declared with [`choices_enum!`],
//! which accepts either a bare value or a `value, label` pair per member and
//! derives the label from the member name when none is given.

use std::borrow::Cow;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use thiserror::Error;

/// Error returned when a raw value does not match any member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownState {
	/// Name of the enumeration that rejected the value.
	pub kind: &'static str,
	/// The rejected raw value.
	pub value: String,
}

/// Behaviour shared by every enumeration declared with [`choices_enum!`].
///
/// Equality and hashing are defined by [`ChoicesEnum::value`], and
/// `AsRef<str>` yields the same value, so raw strings and members can be
/// passed interchangeably to [`ChoicesEnum::is_valid`].
pub trait ChoicesEnum:
	Copy + Eq + Hash + Debug + Display + AsRef<str> + Send + Sync + 'static
{
	/// Name of the enumeration, used in error messages.
	const KIND: &'static str;

	/// All members in declaration order.
	fn members() -> &'static [Self];

	/// The stable machine-readable value of this member.
	fn value(&self) -> &'static str;

	/// The human-readable label of this member.
	fn label(&self) -> Cow<'static, str>;

	/// The declared default member, used as the initial state of new entities.
	fn default_state() -> Self;

	/// Decodes a machine value into a member.
	fn from_value(raw: &str) -> Result<Self, UnknownState> {
		Self::members()
			.iter()
			.copied()
			.find(|member| member.value() == raw)
			.ok_or_else(|| UnknownState {
				kind: Self::KIND,
				value: raw.to_string(),
			})
	}

	/// Returns true if `value` is the machine value of some member.
	///
	/// Accepts members as well as raw strings.
	fn is_valid<V: AsRef<str>>(value: V) -> bool {
		let raw = value.as_ref();
		Self::members().iter().any(|member| member.value() == raw)
	}

	/// Ordered `(value, label)` pairs for presentation.
	fn choices() -> Vec<(&'static str, Cow<'static, str>)> {
		Self::members()
			.iter()
			.map(|member| (member.value(), member.label()))
			.collect()
	}
}

/// Derives a label from a member name.
///
/// Separators (`_`, `-`) become spaces, camel-case boundaries are split and
/// every word is title-cased: `OUT_FOR_DELIVERY` and `OutForDelivery` both
/// become `Out For Delivery`.
pub fn derive_label(name: &str) -> String {
	let mut words: Vec<String> = Vec::new();
	let mut current = String::new();
	let mut prev_lower = false;

	for ch in name.chars() {
		if ch == '_' || ch == '-' || ch.is_whitespace() {
			if !current.is_empty() {
				words.push(std::mem::take(&mut current));
			}
			prev_lower = false;
			continue;
		}
		if ch.is_uppercase() && prev_lower && !current.is_empty() {
			words.push(std::mem::take(&mut current));
		}
		prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
		current.push(ch);
	}
	if !current.is_empty() {
		words.push(current);
	}

	words
		.iter()
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first
					.to_uppercase()
					.chain(chars.flat_map(|c| c.to_lowercase()))
					.collect::<String>(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Declares a closed enumeration implementing [`ChoicesEnum`].
///
/// Each member is written `Name = "value";` or `Name = "value", "Label";`.
/// The `default = Name;` clause names the initial member.
///
/// ```
/// use lifecycle_types::{choices_enum, ChoicesEnum};
///
/// choices_enum! {
///     pub enum Light {
///         Green = "green";
///         Red = "red", "Stop";
///     }
///     default = Red;
/// }
///
/// assert_eq!(Light::Green.label(), "Green");
/// assert_eq!(Light::Red.label(), "Stop");
/// assert!(Light::is_valid("green"));
/// ```
#[macro_export]
macro_rules! choices_enum {
	(@label $variant:ident, $label:literal) => {
		::std::borrow::Cow::Borrowed($label)
	};
	(@label $variant:ident) => {
		::std::borrow::Cow::Owned($crate::derive_label(stringify!($variant)))
	};
	(
		$(#[$meta:meta])*
		$vis:vis enum $name:ident {
			$(
				$(#[$vmeta:meta])*
				$variant:ident = $value:literal $(, $label:literal)?
			);+ $(;)?
		}
		default = $default:ident;
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy)]
		$vis enum $name {
			$(
				$(#[$vmeta])*
				$variant,
			)+
		}

		impl $crate::ChoicesEnum for $name {
			const KIND: &'static str = stringify!($name);

			fn members() -> &'static [Self] {
				&[$(Self::$variant),+]
			}

			fn value(&self) -> &'static str {
				match self {
					$(Self::$variant => $value,)+
				}
			}

			fn label(&self) -> ::std::borrow::Cow<'static, str> {
				match self {
					$(Self::$variant => $crate::choices_enum!(@label $variant $(, $label)?),)+
				}
			}

			fn default_state() -> Self {
				Self::$default
			}
		}

		impl ::std::default::Default for $name {
			fn default() -> Self {
				Self::$default
			}
		}

		impl ::std::cmp::PartialEq for $name {
			fn eq(&self, other: &Self) -> bool {
				$crate::ChoicesEnum::value(self) == $crate::ChoicesEnum::value(other)
			}
		}

		impl ::std::cmp::Eq for $name {}

		impl ::std::cmp::PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				$crate::ChoicesEnum::value(self) == other
			}
		}

		impl ::std::cmp::PartialEq<&str> for $name {
			fn eq(&self, other: &&str) -> bool {
				$crate::ChoicesEnum::value(self) == *other
			}
		}

		impl ::std::hash::Hash for $name {
			fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
				::std::hash::Hash::hash($crate::ChoicesEnum::value(self), state)
			}
		}

		impl ::std::convert::AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				$crate::ChoicesEnum::value(self)
			}
		}

		impl ::std::fmt::Display for $name {
			fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
				f.pad($crate::ChoicesEnum::value(self))
			}
		}

		impl ::std::str::FromStr for $name {
			type Err = $crate::UnknownState;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				<Self as $crate::ChoicesEnum>::from_value(s)
			}
		}

		impl $crate::__serde::Serialize for $name {
			fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
			where
				S: $crate::__serde::Serializer,
			{
				serializer.serialize_str($crate::ChoicesEnum::value(self))
			}
		}

		impl<'de> $crate::__serde::Deserialize<'de> for $name {
			fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
			where
				D: $crate::__serde::Deserializer<'de>,
			{
				let raw = <::std::string::String as $crate::__serde::Deserialize>::deserialize(
					deserializer,
				)?;
				<Self as $crate::ChoicesEnum>::from_value(&raw)
					.map_err(<D::Error as $crate::__serde::de::Error>::custom)
			}
		}
	};
}
