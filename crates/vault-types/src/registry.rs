//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (storage, account, token) exposes a `Registry`
/// struct implementing this trait, declaring the name it is configured under
/// and the factory that builds it.
pub trait ImplementationRegistry {
	/// Name used under `<section>.implementations.<name>` in the TOML config,
	/// e.g. "file" for `storage.implementations.file`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
