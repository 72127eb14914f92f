//! Deterministic link conditioning: drops, duplicates and reorders datagrams
use bytes::Bytes;
use tracing::trace;

/// Contains the configuration of a [`LinkConditioner`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkConditionerConfig {
    /// Drop every n-th datagram (1-based), if set
    pub drop_every: Option<usize>,
    /// Send every n-th datagram twice, if set
    pub duplicate_every: Option<usize>,
    /// Deliver the datagrams of a batch in reverse order
    pub reverse: bool,
}

impl LinkConditionerConfig {
    pub fn lossy(drop_every: usize) -> Self {
        Self {
            drop_every: Some(drop_every),
            ..Default::default()
        }
    }

    /// Duplicates and reorders, but never loses anything
    pub fn chaotic() -> Self {
        Self {
            drop_every: None,
            duplicate_every: Some(2),
            reverse: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct LinkConditioner {
    config: LinkConditionerConfig,
    /// Number of datagrams seen so far, across batches
    count: usize,
}

impl LinkConditioner {
    pub fn new(config: LinkConditionerConfig) -> Self {
        Self { config, count: 0 }
    }

    /// Apply the conditions to a batch of datagrams sent in the same step
    pub fn condition(&mut self, datagrams: Vec<Bytes>) -> Vec<Bytes> {
        let mut conditioned = Vec::with_capacity(datagrams.len());
        for datagram in datagrams {
            self.count += 1;
            if self
                .config
                .drop_every
                .is_some_and(|n| self.count % n == 0)
            {
                trace!(count = self.count, "dropping datagram");
                continue;
            }
            if self
                .config
                .duplicate_every
                .is_some_and(|n| self.count % n == 0)
            {
                conditioned.push(datagram.clone());
            }
            conditioned.push(datagram);
        }
        if self.config.reverse {
            conditioned.reverse();
        }
        conditioned
    }
}
