use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// Objects that can be wiped before going back to a [`TemplatePool`].
pub trait Reset {
    fn reset(&mut self);
}

impl Reset for crate::blockchain::Transaction {
    fn reset(&mut self) {
        crate::blockchain::Transaction::reset(self);
    }
}

/// Free list of preallocated templates.
pub struct TemplatePool<T: Reset> {
    free: Mutex<Vec<T>>,
    max_free: usize,
    init: fn() -> T,
}

impl<T: Reset> TemplatePool<T> {
    pub fn new(max_free: usize, init: fn() -> T) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_free)),
            max_free,
            init,
        }
    }

    /// Takes a template, allocating a fresh one when the free list is empty.
    pub fn get(&self) -> Pooled<'_, T> {
        let item = self.free.lock().pop().unwrap_or_else(self.init);
        Pooled {
            item: Some(item),
            pool: self,
        }
    }

    pub fn free(&self) -> usize {
        self.free.lock().len()
    }

    fn put(&self, mut item: T) {
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_free {
            free.push(item);
        }
    }
}

pub struct Pooled<'a, T: Reset> {
    item: Option<T>,
    pool: &'a TemplatePool<T>,
}

impl<T: Reset> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // only `None` inside `drop`
        self.item.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Reset> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Reset> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Buf(Vec<u8>);

    impl Reset for Buf {
        fn reset(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn returned_items_are_reset_and_reused() {
        let pool: TemplatePool<Buf> = TemplatePool::new(4, Buf::default);
        {
            let mut buf = pool.get();
            buf.0.extend_from_slice(b"abc");
        }
        assert_eq!(pool.free(), 1);
        let buf = pool.get();
        assert!(buf.0.is_empty());
        assert!(buf.0.capacity() >= 3);
    }

    #[test]
    fn free_list_is_bounded() {
        let pool: TemplatePool<Buf> = TemplatePool::new(1, Buf::default);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.free(), 1);
    }
}
