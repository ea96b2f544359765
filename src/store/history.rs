use std::collections::VecDeque;

/// Bounded two-stack undo/redo history, generic over the action type.
/// The undo side is a hard-capped deque: recording past capacity silently
/// evicts the oldest entry. Recording a new action always clears redo.
#[derive(Debug, Clone)]
pub struct History<A> {
    undo: VecDeque<A>,
    redo: Vec<A>,
    capacity: usize,
}

impl<A> History<A> {
    pub fn new(capacity: usize) -> Self {
        History {
            undo: VecDeque::with_capacity(capacity.min(64)),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records a freshly applied action and invalidates the redo stack.
    pub fn record(&mut self, action: A) {
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(action);
        self.redo.clear();
    }

    /// Puts an undone action back on the undo stack without touching redo,
    /// used when a redo is applied.
    pub fn restore(&mut self, action: A) {
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(action);
    }

    pub fn pop_undo(&mut self) -> Option<A> {
        self.undo.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<A> {
        self.redo.pop()
    }

    pub fn push_redo(&mut self, action: A) {
        self.redo.push(action);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
