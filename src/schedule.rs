use core::cell::Cell;

use critical_section::Mutex;

/// Wakeup counter shared between the watchdog interrupt and the main loop.
pub struct Ticks {
    count: Mutex<Cell<u8>>,
}

impl Ticks {
    pub const fn new() -> Self {
        Self {
            count: Mutex::new(Cell::new(0)),
        }
    }

    /// Called from the interrupt handler.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let count = self.count.borrow(cs);
            count.set(count.get().saturating_add(1));
        });
    }

    pub fn get(&self) -> u8 {
        critical_section::with(|cs| self.count.borrow(cs).get())
    }

    /// Resets the counter and returns true once at least `interval` ticks have passed.
    pub fn take_elapsed(&self, interval: u8) -> bool {
        critical_section::with(|cs| {
            let count = self.count.borrow(cs);
            if count.get() >= interval {
                count.set(0);
                true
            } else {
                false
            }
        })
    }
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}

pub static TICKS: Ticks = Ticks::new();
