//! Storage namespaces used by the lifecycle repositories.

/// Namespaces under which repositories keep their documents.
///
/// Backends see the namespace as the prefix of a `namespace:id` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// One document per order holding the order and its transition log.
	Orders,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
		}
	}

	/// Full backend key of the document `id` in this namespace.
	pub fn document_key(&self, id: &str) -> String {
		format!("{}:{}", self.as_str(), id)
	}
}
