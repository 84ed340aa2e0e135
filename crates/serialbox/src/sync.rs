#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "parking-lot")]
pub use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Result;

/// Acquires a shared guard, surfacing poisoning as an error.
pub fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(lock.read())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        Ok(lock.read()?)
    }
}

/// Acquires an exclusive guard, surfacing poisoning as an error.
pub fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(lock.write())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        Ok(lock.write()?)
    }
}
