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

use std::{
    collections::HashMap,
    fs::{remove_file, File},
    io::{Read, Seek, SeekFrom, Write},
    mem::ManuallyDrop,
    path::{Path, PathBuf},
};

use super::{BackingStoreModule, StoreKey};
use crate::error::SwapError;

#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: u64,
    len: usize,
}

/// File-backed store: one extent per spilled region, handed out from a
/// grow-only file with delete-and-reuse through a free list.
///
/// The file is truncated on open and removed on drop; stored state does not
/// survive the process.
pub struct FileBackingStore {
    /// underlying file holding all spilled regions
    file: ManuallyDrop<File>,

    /// path of file, save for deleting file later
    file_path: PathBuf,

    /// cached file size, so no `metadata` call necessary
    file_size: u64,

    /// where each live key's bytes are
    entries: HashMap<u64, Extent>,

    /// extents released by `del`, reused first-fit
    free_extents: Vec<Extent>,

    next_key: u64,
}

impl FileBackingStore {
    /// Creates a new store backed by the file at `path`, truncating whatever
    /// is there.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SwapError> {
        let file_path = path.into();
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(&file_path)
            .map_err(SwapError::StoreInitFailed)?;

        Ok(Self {
            file: ManuallyDrop::new(file),
            file_path,
            file_size: 0,
            entries: HashMap::new(),
            free_extents: Vec::new(),
            next_key: 0,
        })
    }

    fn acquire_extent(&mut self, len: usize) -> Result<Extent, SwapError> {
        if let Some(i) = self.free_extents.iter().position(|extent| extent.len >= len) {
            return Ok(self.free_extents.swap_remove(i));
        }

        // no reusable hole, grow the file by one entry
        let offset = self.file_size;
        let new_size = self.file_size + len as u64;
        self.file
            .set_len(new_size)
            .map_err(|_| SwapError::StorePutFailed)?;
        self.file_size = new_size;

        Ok(Extent { offset, len })
    }

    fn write_at(&mut self, extent: Extent, src: &[u8]) -> Result<(), SwapError> {
        debug_assert!(
            extent.offset + src.len() as u64 <= self.file_size,
            "illegal store access, offset: {}, len: {}, file_size: {}",
            extent.offset,
            src.len(),
            self.file_size
        );

        self.file
            .seek(SeekFrom::Start(extent.offset))
            .map_err(|_| SwapError::StorePutFailed)?;
        self.file
            .write_all(src)
            .map_err(|_| SwapError::StorePutFailed)?;

        Ok(())
    }
}

impl BackingStoreModule for FileBackingStore {
    fn put(&mut self, src: &[u8]) -> Result<StoreKey, SwapError> {
        let extent = self.acquire_extent(src.len())?;
        self.write_at(extent, src)?;

        let key = self.next_key;
        self.next_key += 1;
        self.entries.insert(key, extent);

        Ok(StoreKey(key))
    }

    fn put_at(&mut self, key: StoreKey, src: &[u8]) -> Result<(), SwapError> {
        let extent = *self
            .entries
            .get(&key.0)
            .ok_or(SwapError::StorePutFailed)?;
        debug_assert!(src.len() <= extent.len, "entry grew after it was stored");

        self.write_at(extent, src)
    }

    fn get(&mut self, key: StoreKey, dest: &mut [u8]) -> Result<(), SwapError> {
        let extent = *self
            .entries
            .get(&key.0)
            .ok_or(SwapError::StoreGetFailed)?;
        debug_assert!(dest.len() <= extent.len, "reading past the stored entry");

        self.file
            .seek(SeekFrom::Start(extent.offset))
            .map_err(|_| SwapError::StoreGetFailed)?;
        self.file
            .read_exact(dest)
            .map_err(|_| SwapError::StoreGetFailed)?;

        Ok(())
    }

    fn del(&mut self, key: StoreKey) -> Result<(), SwapError> {
        // deleting something that was never stored is not an error
        if let Some(extent) = self.entries.remove(&key.0) {
            self.free_extents.push(extent);
        }

        Ok(())
    }
}

impl Drop for FileBackingStore {
    fn drop(&mut self) {
        // close the file before removing it; it must not be accessed again
        unsafe {
            ManuallyDrop::drop(&mut self.file);
        }

        if Path::new(&self.file_path).exists() {
            let _ = remove_file(&self.file_path);
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::super::test::{
        get_test_store, test_store_delete, test_store_overwrite, test_store_roundtrip,
    };
    use super::super::BackingStoreModule;
    use super::FileBackingStore;

    #[test]
    fn test_file_store_roundtrip() {
        test_store_roundtrip(get_test_store("test_file_store_roundtrip"));
    }

    #[test]
    fn test_file_store_overwrite() {
        test_store_overwrite(get_test_store("test_file_store_overwrite"));
    }

    #[test]
    fn test_file_store_delete() {
        test_store_delete(get_test_store("test_file_store_delete"));
    }

    #[test]
    fn test_file_store_reuses_freed_extents() {
        let mut store = get_test_store("test_file_store_reuses_freed_extents");

        let first = store.put(&[1u8; 256]).unwrap();
        let size_after_first = store.file_size;

        store.del(first).unwrap();
        let second = store.put(&[2u8; 256]).unwrap();
        assert_eq!(
            store.file_size, size_after_first,
            "freed extent should be reused instead of growing the file"
        );

        let mut buffer = [0u8; 256];
        store.get(second, &mut buffer).unwrap();
        assert_eq!(buffer, [2u8; 256]);
    }

    #[test]
    fn test_file_store_removes_file_on_drop() {
        let path = "/tmp/test_file_store_removes_file_on_drop.swapstore";

        let store = FileBackingStore::new(path).unwrap();
        assert!(Path::new(path).exists());

        drop(store);
        assert!(!Path::new(path).exists());
    }
}
