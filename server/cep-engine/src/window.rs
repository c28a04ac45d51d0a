//! Fixed-capacity FIFO window backing the sliding detectors.

use std::collections::VecDeque;

/// The most recent `capacity` items, oldest first. Pushing into a full
/// window evicts the oldest item.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
  items: VecDeque<T>,
  capacity: usize,
}

impl<T: Clone> SlidingWindow<T> {
  /// `capacity` must be non-zero; detectors validate it before calling.
  pub fn new(capacity: usize) -> Self {
    debug_assert!(capacity > 0);
    Self {
      items: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Returns the evicted item, if any.
  pub fn push(&mut self, item: T) -> Option<T> {
    let evicted = if self.items.len() == self.capacity {
      self.items.pop_front()
    } else {
      None
    };
    self.items.push_back(item);
    evicted
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.items.len() == self.capacity
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn oldest(&self) -> Option<&T> {
    self.items.front()
  }

  pub fn newest(&self) -> Option<&T> {
    self.items.back()
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.items.iter()
  }

  pub fn snapshot(&self) -> Vec<T> {
    self.items.iter().cloned().collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_then_slides() {
    let mut w = SlidingWindow::new(3);
    assert!(w.is_empty());
    assert_eq!(w.push(1), None);
    assert_eq!(w.push(2), None);
    assert!(!w.is_full());
    assert_eq!(w.push(3), None);
    assert!(w.is_full());

    assert_eq!(w.push(4), Some(1));
    assert_eq!(w.len(), 3);
    assert_eq!(w.oldest(), Some(&2));
    assert_eq!(w.newest(), Some(&4));
    assert_eq!(w.snapshot(), vec![2, 3, 4]);
  }

  #[test]
  fn never_exceeds_capacity() {
    let mut w = SlidingWindow::new(2);
    for i in 0..100 {
      w.push(i);
      assert!(w.len() <= w.capacity());
    }
    assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![98, 99]);
  }
}
