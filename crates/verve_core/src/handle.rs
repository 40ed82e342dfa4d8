//! Typed resource handles and the dense handle allocator
//!
//! Handles are compact `u16` indices into per-resource tables. Gradient
//! and image-pattern handles additionally carry a flags word whose low
//! bit marks a *local* handle: an index recorded inside a command list
//! that gets relocated onto the context's global counters at replay.

pub const INVALID_INDEX: u16 = u16::MAX;

/// Flag bit marking a handle recorded inside a command list
pub const HANDLE_FLAG_LOCAL: u16 = 0x0001;

macro_rules! simple_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            pub idx: u16,
        }

        impl $name {
            pub const INVALID: $name = $name { idx: INVALID_INDEX };

            pub const fn new(idx: u16) -> Self {
                $name { idx }
            }

            pub const fn is_valid(self) -> bool {
                self.idx != INVALID_INDEX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

macro_rules! flagged_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            pub idx: u16,
            pub flags: u16,
        }

        impl $name {
            pub const INVALID: $name = $name {
                idx: INVALID_INDEX,
                flags: 0,
            };

            pub const fn new(idx: u16) -> Self {
                $name { idx, flags: 0 }
            }

            pub const fn local(idx: u16) -> Self {
                $name {
                    idx,
                    flags: HANDLE_FLAG_LOCAL,
                }
            }

            pub const fn is_valid(self) -> bool {
                self.idx != INVALID_INDEX
            }

            /// True for handles recorded inside a command list; these are
            /// only meaningful after relocation at replay.
            pub const fn is_local(self) -> bool {
                (self.flags & HANDLE_FLAG_LOCAL) != 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

simple_handle!(
    /// Handle to an image in the context's image table
    ImageHandle
);
simple_handle!(
    /// Handle to a recorded command list
    CommandListHandle
);
simple_handle!(
    /// Handle to a registered font
    FontHandle
);
flagged_handle!(
    /// Handle to a per-frame gradient
    GradientHandle
);
flagged_handle!(
    /// Handle to a per-frame image pattern
    ImagePatternHandle
);

/// Dense index allocator with generation-free reuse.
///
/// Allocates the lowest free index so tables stay compact; freed
/// indices become immediately reusable. Callers that need staleness
/// detection must track it themselves (the context's image table does,
/// via backend texture validity).
pub struct HandleAlloc {
    alive: Vec<bool>,
    capacity: u16,
    num_allocated: u16,
}

impl HandleAlloc {
    pub fn new(capacity: u16) -> Self {
        HandleAlloc {
            alive: vec![false; capacity as usize],
            capacity,
            num_allocated: 0,
        }
    }

    /// Allocate the lowest free index, or `INVALID_INDEX` at capacity.
    pub fn alloc(&mut self) -> u16 {
        if self.num_allocated == self.capacity {
            return INVALID_INDEX;
        }
        for (i, slot) in self.alive.iter_mut().enumerate() {
            if !*slot {
                *slot = true;
                self.num_allocated += 1;
                return i as u16;
            }
        }
        INVALID_INDEX
    }

    pub fn free(&mut self, idx: u16) {
        if let Some(slot) = self.alive.get_mut(idx as usize) {
            if *slot {
                *slot = false;
                self.num_allocated -= 1;
            }
        }
    }

    pub fn is_valid(&self, idx: u16) -> bool {
        self.alive.get(idx as usize).copied().unwrap_or(false)
    }

    pub fn num_allocated(&self) -> u16 {
        self.num_allocated
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_lowest_free() {
        let mut alloc = HandleAlloc::new(4);
        assert_eq!(alloc.alloc(), 0);
        assert_eq!(alloc.alloc(), 1);
        assert_eq!(alloc.alloc(), 2);
        alloc.free(1);
        assert_eq!(alloc.alloc(), 1);
        assert_eq!(alloc.alloc(), 3);
        assert_eq!(alloc.alloc(), INVALID_INDEX);
    }

    #[test]
    fn test_is_valid() {
        let mut alloc = HandleAlloc::new(2);
        let h = alloc.alloc();
        assert!(alloc.is_valid(h));
        alloc.free(h);
        assert!(!alloc.is_valid(h));
        assert!(!alloc.is_valid(100));
    }

    #[test]
    fn test_local_handle_flag() {
        let h = GradientHandle::local(3);
        assert!(h.is_local());
        assert!(h.is_valid());
        assert!(!GradientHandle::new(3).is_local());
        assert!(!GradientHandle::INVALID.is_valid());
    }
}
