// Debug-only checker for the pool-before-split-point lock order.
//
// The double-lock order is always pool mutex first, split point mutex
// second. Acquiring the pool mutex while any split point mutex is held
// on the same thread is a deadlock hazard and trips an assertion in
// debug builds. Release builds compile this down to nothing.

#[cfg(debug_assertions)]
mod imp {
    use std::cell::Cell;

    thread_local! {
        static SPLIT_DEPTH: Cell<u32> = const { Cell::new(0) };
    }

    pub struct SplitHeld;

    impl Drop for SplitHeld {
        fn drop(&mut self) {
            SPLIT_DEPTH.with(|d| d.set(d.get() - 1));
        }
    }

    pub struct PoolHeld;

    pub fn split_acquired() -> SplitHeld {
        SPLIT_DEPTH.with(|d| d.set(d.get() + 1));
        SplitHeld
    }

    pub fn pool_acquired() -> PoolHeld {
        SPLIT_DEPTH.with(|d| {
            assert_eq!(
                d.get(),
                0,
                "lock order violation: pool mutex acquired while holding a split point mutex"
            );
        });
        PoolHeld
    }
}

#[cfg(not(debug_assertions))]
mod imp {
    pub struct SplitHeld;
    pub struct PoolHeld;

    #[inline]
    pub fn split_acquired() -> SplitHeld {
        SplitHeld
    }

    #[inline]
    pub fn pool_acquired() -> PoolHeld {
        PoolHeld
    }
}

pub(crate) use imp::{pool_acquired, split_acquired, PoolHeld, SplitHeld};
