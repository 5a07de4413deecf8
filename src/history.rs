use crate::error::CanvasResult;
use crate::stack::{LayerStack, StackState};

/// Default number of snapshots retained.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// A complete, immutable serialization of the layer stack at one point in
/// time. Restoring it reproduces byte-identical layer state.
pub struct HistorySnapshot {
    state: StackState,
}

impl HistorySnapshot {
    fn capture(stack: &LayerStack) -> CanvasResult<Self> {
        Ok(Self {
            state: stack.to_state()?,
        })
    }

    pub fn state(&self) -> &StackState {
        &self.state
    }
}

/// Bounded linear undo/redo history of full layer-stack snapshots.
///
/// Restoration is always a full-stack replace, never an incremental diff.
/// That costs O(layers x pixels) per undo step but keeps restores atomic,
/// and the history depth bound keeps the total footprint small.
pub struct HistoryManager {
    snapshots: Vec<HistorySnapshot>,
    /// Index of the snapshot describing the current stack state.
    cursor: usize,
    limit: usize,
    /// Set while a snapshot is being restored; saves are ignored so a
    /// restoration can never snapshot its own intermediate state.
    restoring: bool,
}

impl HistoryManager {
    /// Creates a history seeded with a snapshot of the stack's starting
    /// state, so the first undo returns to it.
    pub fn new(stack: &LayerStack) -> CanvasResult<Self> {
        Self::with_limit(stack, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(stack: &LayerStack, limit: usize) -> CanvasResult<Self> {
        Ok(Self {
            snapshots: vec![HistorySnapshot::capture(stack)?],
            cursor: 0,
            limit: limit.max(1),
            restoring: false,
        })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Snapshots the stack after a committed mutation. Any redo branch beyond
    /// the cursor is discarded first; once the retained count exceeds the
    /// limit the oldest snapshot is evicted, shifting the cursor with it so
    /// it keeps naming the same logical state. A no-op while a restoration is
    /// in progress.
    pub fn save_state(&mut self, stack: &LayerStack) -> CanvasResult<()> {
        if self.restoring {
            return Ok(());
        }
        let snapshot = HistorySnapshot::capture(stack)?;
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor += 1;
        if self.snapshots.len() > self.limit {
            self.snapshots.remove(0);
            self.cursor -= 1;
        }
        log::debug!(
            "saved history state {}/{}",
            self.cursor + 1,
            self.snapshots.len()
        );
        Ok(())
    }

    /// Steps back one snapshot and restores it into the stack, replacing all
    /// layers. Returns whether an undo occurred; a no-op at the earliest
    /// snapshot. A failed restore leaves both the cursor and the stack as
    /// they were.
    pub fn undo(&mut self, stack: &mut LayerStack) -> CanvasResult<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        self.cursor -= 1;
        if let Err(err) = self.restore_current(stack) {
            self.cursor += 1;
            return Err(err);
        }
        Ok(true)
    }

    /// Steps forward one snapshot; a no-op at the latest snapshot.
    pub fn redo(&mut self, stack: &mut LayerStack) -> CanvasResult<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        self.cursor += 1;
        if let Err(err) = self.restore_current(stack) {
            self.cursor -= 1;
            return Err(err);
        }
        Ok(true)
    }

    fn restore_current(&mut self, stack: &mut LayerStack) -> CanvasResult<()> {
        self.restoring = true;
        let restored = LayerStack::from_state(self.snapshots[self.cursor].state());
        self.restoring = false;
        // from_state is atomic: on failure the old stack is untouched.
        *stack = restored?;
        Ok(())
    }
}
