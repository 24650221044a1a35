//! A lazily filled, process-wide table behind a reader-writer spin lock.
//!
//! Readers vastly outnumber writers: a table is written once per key and read
//! on every lookup afterwards. Critical sections are short and never call
//! user code, so spinning is cheaper than parking and cannot poison.

#[repr(transparent)]
pub(crate) struct GlobalLock<T: 'static + Send + Sync>(spin::RwLock<Option<T>>);

#[repr(transparent)]
pub(crate) struct GlobalLockReadGuard<T: 'static + Send + Sync>(
    spin::RwLockReadGuard<'static, Option<T>>,
);

#[repr(transparent)]
pub(crate) struct GlobalLockWriteGuard<T: 'static + Send + Sync>(
    spin::RwLockWriteGuard<'static, Option<T>>,
);

impl<T: 'static + Send + Sync> GlobalLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(spin::RwLock::new(None))
    }

    #[inline]
    pub(crate) fn read(&'static self) -> GlobalLockReadGuard<T> {
        GlobalLockReadGuard(self.0.read())
    }

    #[inline]
    pub(crate) fn write(&'static self) -> GlobalLockWriteGuard<T> {
        GlobalLockWriteGuard(self.0.write())
    }
}

impl<T: 'static + Send + Sync> GlobalLockReadGuard<T> {
    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T: 'static + Send + Sync + Default> GlobalLockWriteGuard<T> {
    /// The table, created empty on first write.
    #[inline]
    pub(crate) fn get_or_default(&mut self) -> &mut T {
        self.0.get_or_insert_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: GlobalLock<Vec<u32>> = GlobalLock::new();

    #[test]
    fn test_lazy_table() {
        assert!(TABLE.read().get().is_none());
        TABLE.write().get_or_default().push(7);
        TABLE.write().get_or_default().push(8);
        assert_eq!(TABLE.read().get().map(Vec::as_slice), Some(&[7, 8][..]));
    }
}
