//! Buffer bookkeeping of a CAB, independent of the buffers themselves.
//!
//! [`SlotTable`] tracks how many users hold each buffer and which buffer
//! carries the most recently published value. It is what a [`Cab`] keeps
//! behind its lock; it is public so the protocol can be inspected and
//! tested on its own.
//!
//! [`Cab`]: crate::Cab

use ptask_errors::{PtaskError, PtaskResult, Resource, ensure_arg};

/// Index of a buffer handed out by a [`SlotTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(usize);

impl Token {
    /// Token for buffer `index`.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Buffer index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Busy counts and the "last published" marker for N buffers.
///
/// Invariants kept by every operation:
/// - the writer only ever gets a buffer with no users that is not the
///   last published one
/// - a reader only ever gets the last published buffer
/// - busy counts never underflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    busy: Box<[u32]>,
    last: Option<usize>,
}

impl SlotTable {
    /// Table for `n` buffers, with nothing published.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] if `n` is zero.
    pub fn new(n: usize) -> PtaskResult<Self> {
        ensure_arg!(n > 0, "a CAB needs at least one buffer");
        Ok(Self {
            busy: vec![0; n].into_boxed_slice(),
            last: None,
        })
    }

    /// Take a free buffer for writing.
    ///
    /// Picks the lowest index with no users that is not the last published
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::ResourceExhausted`] when every buffer other than
    /// the last published one has users.
    pub fn reserve(&mut self) -> PtaskResult<Token> {
        let last = self.last;
        let (index, busy) = self
            .busy
            .iter_mut()
            .enumerate()
            .find(|(i, busy)| **busy == 0 && Some(*i) != last)
            .ok_or(PtaskError::ResourceExhausted(Resource::CabBuffers))?;
        *busy = 1;
        Ok(Token(index))
    }

    /// Publish a buffer taken with [`SlotTable::reserve`].
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] unless the buffer is held by
    /// exactly one user and is not already the last published one.
    pub fn publish(&mut self, token: Token) -> PtaskResult {
        let last = self.last;
        let busy = self
            .busy
            .get_mut(token.0)
            .ok_or(PtaskError::InvalidArgument("buffer token out of range"))?;
        if *busy != 1 || last == Some(token.0) {
            return Err(PtaskError::InvalidArgument("buffer is not reserved for writing"));
        }
        *busy = 0;
        self.last = Some(token.0);
        Ok(())
    }

    /// Take the last published buffer for reading.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::Unavailable`] if nothing has been published
    /// since creation or the last reset.
    pub fn acquire_latest(&mut self) -> PtaskResult<Token> {
        let index = self.last.ok_or(PtaskError::Unavailable)?;
        let busy = self
            .busy
            .get_mut(index)
            .ok_or(PtaskError::InvalidArgument("buffer token out of range"))?;
        *busy = busy.saturating_add(1);
        Ok(Token(index))
    }

    /// Give back a buffer, whether taken for reading or abandoned by the
    /// writer.
    ///
    /// # Errors
    ///
    /// Returns [`PtaskError::InvalidArgument`] if the buffer has no users.
    pub fn release(&mut self, token: Token) -> PtaskResult {
        let busy = self
            .busy
            .get_mut(token.0)
            .ok_or(PtaskError::InvalidArgument("buffer token out of range"))?;
        if *busy < 1 {
            return Err(PtaskError::InvalidArgument("buffer is not in use"));
        }
        *busy -= 1;
        Ok(())
    }

    /// Forget the last published buffer. Busy counts are untouched.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Index of the last published buffer.
    #[must_use]
    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /// Current number of users of each buffer.
    #[must_use]
    pub fn busy(&self) -> &[u32] {
        &self.busy
    }

    /// Number of buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.busy.len()
    }

    /// Always `false`: a table has at least one buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.busy.is_empty()
    }
}
