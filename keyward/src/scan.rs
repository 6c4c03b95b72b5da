//! Cursor-driven keyspace iteration.

use std::collections::{HashSet, VecDeque};

use futures::Stream;
use keyward_core::{Connection, KeyPattern, Manager, RetryError, metrics};
use tracing::{debug, trace};

use crate::client::ResilientClient;

/// Walks the keyspace with `SCAN`, yielding each matching name once.
///
/// Iteration ends when the cursor returns to `0` or `max_keys` names have
/// been yielded, whichever comes first. A failed `SCAN` (after retries) is
/// yielded once as an error and ends the iteration. The scanner cannot be
/// restarted; once it returns `None` it keeps returning `None`.
///
/// Names are deduplicated for the lifetime of the scanner, since `SCAN` may
/// return a key more than once while the node rehashes.
pub struct KeyScanner<'a, M: Manager> {
    client: &'a ResilientClient<M>,
    pattern: KeyPattern,
    batch_size: usize,
    max_keys: usize,
    cursor: u64,
    started: bool,
    done: bool,
    pending: VecDeque<String>,
    seen: HashSet<String>,
    yielded: usize,
    truncated: bool,
}

impl<'a, M> KeyScanner<'a, M>
where
    M: Manager,
    M::Connection: Connection,
{
    /// Creates a scanner over keys matching `pattern`.
    ///
    /// `batch_size` is the `COUNT` hint for each `SCAN` call (at least 1).
    pub fn new(
        client: &'a ResilientClient<M>,
        pattern: KeyPattern,
        batch_size: usize,
        max_keys: usize,
    ) -> Self {
        Self {
            client,
            pattern,
            batch_size: batch_size.max(1),
            max_keys,
            cursor: 0,
            started: false,
            done: false,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            yielded: 0,
            truncated: false,
        }
    }

    /// Names yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Returns `true` if the key budget stopped the scan while keys may
    /// remain.
    pub fn hit_limit(&self) -> bool {
        self.truncated
    }

    /// Next matching key name.
    pub async fn next_key(&mut self) -> Option<Result<String, RetryError>> {
        loop {
            if self.done {
                return None;
            }
            if self.yielded >= self.max_keys {
                self.truncated = !self.pending.is_empty() || !(self.started && self.cursor == 0);
                if self.truncated {
                    debug!(max_keys = self.max_keys, "Key budget reached");
                }
                self.done = true;
                return None;
            }
            if let Some(name) = self.pending.pop_front() {
                self.yielded += 1;
                metrics::record_key_scanned();
                return Some(Ok(name));
            }
            if self.started && self.cursor == 0 {
                trace!("Scan cursor completed");
                self.done = true;
                return None;
            }

            let page = match self
                .client
                .scan_page(self.cursor, self.pattern.as_str(), self.batch_size)
                .await
            {
                Ok(page) => page,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            };
            trace!(
                cursor = self.cursor,
                next = page.cursor,
                returned = page.keys.len(),
                "Scan page"
            );
            self.started = true;
            self.cursor = page.cursor;
            for name in page.keys {
                if self.pattern.matches(&name) && self.seen.insert(name.clone()) {
                    self.pending.push_back(name);
                }
            }
        }
    }

    /// Turns the scanner into a [`Stream`] of key names.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, RetryError>> + 'a {
        futures::stream::unfold(self, |mut scanner| async move {
            let item = scanner.next_key().await?;
            Some((item, scanner))
        })
    }
}
