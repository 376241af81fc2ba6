//! Round-robin choice of the next glasses identifier to claim

/// Discovery cursor shared by all slots of a pool
///
/// Advances by one per discovery attempt, whatever the outcome, so repeated
/// failures rotate through the visible glasses instead of hammering one.
#[derive(Debug, Default, Clone)]
pub struct RoundRobinCursor {
    next: usize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.next
    }

    /// Pick the candidate for the current attempt
    ///
    /// Starts at `position % ids.len()` and skips identifiers already bound to
    /// another slot.
    ///
    /// # Returns
    /// The chosen identifier, or `None` when every visible identifier is bound
    pub fn select<'a>(&self, ids: &'a [String], bound: &[String]) -> Option<&'a str> {
        if ids.is_empty() {
            return None;
        }
        let start = self.next % ids.len();
        (0..ids.len())
            .map(|offset| &ids[(start + offset) % ids.len()])
            .find(|id| !bound.contains(id))
            .map(String::as_str)
    }

    /// Move on to the next identifier
    pub fn advance(&mut self) {
        self.next = self.next.wrapping_add(1);
    }
}
