use std::collections::VecDeque;

/// Capacity of the momentum price window
pub const PRICE_WINDOW_CAPACITY: usize = 14;

/// Rolling window of the most recent ticker prices, oldest first
///
/// Pushing past capacity evicts the oldest price.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl Default for PriceWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceWindow {
    pub fn new() -> Self {
        Self::with_capacity(PRICE_WINDOW_CAPACITY)
    }

    /// Create a window with a custom capacity
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of prices to keep (at least 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prices: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a price, removing the oldest one if the window is full
    pub fn push(&mut self, price: f64) {
        self.prices.push_back(price);

        while self.prices.len() > self.capacity {
            self.prices.pop_front();
        }
    }

    /// Prices in arrival order (oldest first)
    pub fn prices(&self) -> Vec<f64> {
        self.prices.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.prices.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.prices.clear();
    }
}
