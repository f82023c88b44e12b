/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::{
    marker::PhantomData,
    mem::size_of,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use static_assertions::assert_not_impl_any;

use crate::{error::SwapError, swap_heap};

/// Owning handle to a single pageable value.
///
/// The value lives in its own region: dereferencing may fault it back in from
/// the store, dropping runs the destructor in place and releases the region.
pub struct SwapBox<T> {
    ptr: NonNull<T>,
    _owned: PhantomData<T>,
}

// the engine behind the pointer is process-global and single-threaded
assert_not_impl_any!(SwapBox<u8>: Send, Sync);

impl<T> SwapBox<T> {
    /// Moves `value` into a freshly allocated region.
    pub fn new(value: T) -> Result<Self, SwapError> {
        assert!(size_of::<T>() > 0, "zero-sized values need no backing store");

        let ptr = swap_heap::allocate(size_of::<T>())?.cast::<T>();
        // the move write-faults the fresh region and marks it dirty
        unsafe { ptr.as_ptr().write(value) };

        Ok(Self {
            ptr,
            _owned: PhantomData,
        })
    }

    /// The region's base address.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Deref for SwapBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for SwapBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for SwapBox<T> {
    fn drop(&mut self) {
        unsafe {
            core::ptr::drop_in_place(self.ptr.as_ptr());
        }
        let _ = swap_heap::free(self.ptr.as_ptr() as *mut u8);
    }
}
