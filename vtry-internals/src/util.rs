//! Internal utility types.

/// Marker type used when type-erasing instance pointers.
///
/// `NonNull<Erased>` points at an instance whose concrete type is only known
/// through the [`InstanceVtable`] that accompanies it.
///
/// [`InstanceVtable`]: crate::InstanceVtable
pub(crate) struct Erased;
