//! Fixed-chunk buffer pools
//!
//! Vertex arenas hand their position/color/UV chunks to the GPU backend
//! for the duration of a frame. The backend may release them from a
//! submission worker thread, so every chunk is wrapped in a [`PoolSlice`]
//! drop-guard that returns the memory to its pool under the pool mutex.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

struct PoolInner<T> {
    chunk_len: usize,
    free: Mutex<Vec<Box<[T]>>>,
}

/// A pool of equally sized chunks of `T`
pub struct ChunkPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for ChunkPool<T> {
    fn clone(&self) -> Self {
        ChunkPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default + Send + 'static> ChunkPool<T> {
    pub fn new(chunk_len: usize) -> Self {
        ChunkPool {
            inner: Arc::new(PoolInner {
                chunk_len,
                free: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of elements in every chunk
    pub fn chunk_len(&self) -> usize {
        self.inner.chunk_len
    }

    /// Chunks currently sitting in the free list
    pub fn num_free(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Take a chunk from the free list, or allocate a fresh one
    pub fn acquire(&self) -> PoolSlice<T> {
        let data = {
            let mut free = self.inner.free.lock();
            free.pop()
        };
        let data =
            data.unwrap_or_else(|| vec![T::default(); self.inner.chunk_len].into_boxed_slice());
        PoolSlice {
            data: Some(data),
            pool: Arc::clone(&self.inner),
        }
    }
}

/// A chunk checked out of a [`ChunkPool`].
///
/// Dropping the slice returns the chunk to the pool; the drop may happen
/// on any thread.
pub struct PoolSlice<T: 'static> {
    data: Option<Box<[T]>>,
    pool: Arc<PoolInner<T>>,
}

impl<T> Deref for PoolSlice<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data.as_deref().expect("pool slice already released")
    }
}

impl<T> DerefMut for PoolSlice<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.data
            .as_deref_mut()
            .expect("pool slice already released")
    }
}

impl<T> Drop for PoolSlice<T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.free.lock().push(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_reuse() {
        let pool: ChunkPool<u32> = ChunkPool::new(16);
        assert_eq!(pool.num_free(), 0);
        let mut slice = pool.acquire();
        slice[0] = 42;
        assert_eq!(slice.len(), 16);
        drop(slice);
        assert_eq!(pool.num_free(), 1);

        // Reuse keeps prior contents; callers overwrite what they use.
        let slice = pool.acquire();
        assert_eq!(pool.num_free(), 0);
        assert_eq!(slice[0], 42);
    }

    #[test]
    fn test_release_from_other_thread() {
        let pool: ChunkPool<f32> = ChunkPool::new(8);
        let slice = pool.acquire();
        let handle = std::thread::spawn(move || drop(slice));
        handle.join().unwrap();
        assert_eq!(pool.num_free(), 1);
    }
}
