//! The read surface shared by every reactive cell.

/// A reactive value that can be read.
///
/// Implemented by [`Signal`](super::Signal), [`ReadonlySignal`](super::ReadonlySignal)
/// and [`Computed`](super::Computed), so host code such as a template layer can
/// accept any of them.
pub trait Readable<T> {
    /// Gets the current value, registering it as a dependency of the running
    /// computation.
    fn get(&self) -> T;

    /// Gets the current value without registering a dependency.
    fn get_untracked(&self) -> T;
}
