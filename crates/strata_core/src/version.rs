//! Value versions of registered cores.
//!
//! A backend remembers the version it last uploaded for a core and refreshes
//! the core's uniforms when [`CoreVersion::is_newer_than`] reports an edit
//! since then. Value edits never touch the display list, so this is the only
//! signal an `Image`-dirty frame carries.

/// Count of value edits applied to one core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreVersion(u64);

impl CoreVersion {
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Whether edits happened after version `seen` was observed.
    #[inline]
    #[must_use]
    pub fn is_newer_than(self, seen: u64) -> bool {
        self.0 != seen
    }
}

/// Write access to a core payload. Dropping the guard bumps the version, but
/// only if the payload was actually borrowed mutably.
pub struct EditGuard<'a, T> {
    data: &'a mut T,
    version: &'a mut CoreVersion,
    written: bool,
}

impl<'a, T> EditGuard<'a, T> {
    pub fn new(data: &'a mut T, version: &'a mut CoreVersion) -> Self {
        Self {
            data,
            version,
            written: false,
        }
    }
}

impl<T> std::ops::Deref for EditGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data
    }
}

impl<T> std::ops::DerefMut for EditGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.written = true;
        self.data
    }
}

impl<T> Drop for EditGuard<'_, T> {
    fn drop(&mut self) {
        if self.written {
            self.version.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bump_on_drop() {
        let mut value = 1_u32;
        let mut version = CoreVersion::default();
        {
            let mut guard = EditGuard::new(&mut value, &mut version);
            *guard = 2;
        }
        assert_eq!(value, 2);
        assert_eq!(version.get(), 1);
        assert!(version.is_newer_than(0));
        assert!(!version.is_newer_than(1));
    }

    #[test]
    fn reads_leave_version_alone() {
        let mut value = 7_u32;
        let mut version = CoreVersion::default();
        {
            let guard = EditGuard::new(&mut value, &mut version);
            assert_eq!(*guard, 7);
        }
        assert_eq!(version.get(), 0);
    }
}
