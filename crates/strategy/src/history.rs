use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// Fixed-capacity FIFO window, oldest first.
///
/// Pushing into a full window evicts the oldest entry first, so `len()` never
/// exceeds `capacity()`. A zero-capacity window stays empty.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buf: VecDeque<T>,
    cap: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append the newest value, returning the evicted oldest value if any.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.cap == 0 {
            return None;
        }
        let evicted = if self.buf.len() == self.cap {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.cap
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Most recent value.
    pub fn last(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Oldest retained value.
    pub fn first(&self) -> Option<&T> {
        self.buf.front()
    }

    /// Value at `index`, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.buf.get(index)
    }

    /// Value `offset` positions before the newest (0 = newest).
    pub fn back(&self, offset: usize) -> Option<&T> {
        self.buf.len().checked_sub(offset + 1).and_then(|i| self.buf.get(i))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buf.iter()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<T: Copy> RollingWindow<T> {
    /// Copy the window into a contiguous vector, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.iter().copied().collect()
    }

    /// Copy of the newest `n` values (fewer if the window is shorter).
    pub fn tail(&self, n: usize) -> Vec<T> {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip).copied().collect()
    }
}

/// One bounded window per symbol, all sharing the same capacity.
#[derive(Debug, Clone)]
pub struct SymbolHistory<T> {
    windows: HashMap<String, RollingWindow<T>>,
    cap: usize,
}

impl<T> SymbolHistory<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            windows: HashMap::new(),
            cap,
        }
    }

    /// Append `value` to the symbol's window and return the updated window.
    pub fn push(&mut self, symbol: &str, value: T) -> &RollingWindow<T> {
        let window = match self.windows.entry(symbol.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(RollingWindow::new(self.cap)),
        };
        window.push(value);
        window
    }

    pub fn get(&self, symbol: &str) -> Option<&RollingWindow<T>> {
        self.windows.get(symbol)
    }

    /// Entries held for `symbol`; 0 for an unseen symbol.
    pub fn len(&self, symbol: &str) -> usize {
        self.windows.get(symbol).map_or(0, RollingWindow::len)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.windows.get(symbol).is_some_and(|w| !w.is_empty())
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
