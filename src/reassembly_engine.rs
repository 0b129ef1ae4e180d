//! Thread-safe front end over one [ReassemblyTable]
//!
//! * [ReassemblyEngine] serializes every table operation behind one mutex and
//!   delivers sink signals after the mutex is released.

use super::*;

struct ReassemblyEngineUnlockedInner<B> {
    policy: ProtocolPolicy,
    budget: MemoryBudget,
    stats: Arc<ReassemblyStats>,
    sink: Arc<dyn ReassemblySink<B>>,
}

/// Fragment reassembly for one protocol
///
/// Cloning yields another handle to the same table. All operations are
/// bounded and never block on anything but the table mutex; the `try_`
/// variants do not block at all, which is what memory-pressure callbacks
/// running in constrained contexts need.
pub struct ReassemblyEngine<B> {
    inner: Arc<Mutex<ReassemblyTable<B>>>,
    unlocked_inner: Arc<ReassemblyEngineUnlockedInner<B>>,
}

impl<B> Clone for ReassemblyEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            unlocked_inner: self.unlocked_inner.clone(),
        }
    }
}

impl<B: PacketBuffer> ReassemblyEngine<B> {
    fn new_unlocked_inner(
        policy: ProtocolPolicy,
        budget: MemoryBudget,
        sink: Arc<dyn ReassemblySink<B>>,
    ) -> ReassemblyEngineUnlockedInner<B> {
        ReassemblyEngineUnlockedInner {
            policy,
            budget,
            stats: Arc::new(ReassemblyStats::new()),
            sink,
        }
    }

    fn new_inner(unlocked_inner: &ReassemblyEngineUnlockedInner<B>) -> ReassemblyTable<B> {
        ReassemblyTable::new(
            unlocked_inner.policy.clone(),
            unlocked_inner.stats.clone(),
            unlocked_inner.budget.clusters(),
        )
    }

    pub fn new(
        policy: ProtocolPolicy,
        budget: MemoryBudget,
        sink: Arc<dyn ReassemblySink<B>>,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;
        let unlocked_inner = Self::new_unlocked_inner(policy, budget, sink);
        Ok(Self {
            inner: Arc::new(Mutex::new(Self::new_inner(&unlocked_inner))),
            unlocked_inner: Arc::new(unlocked_inner),
        })
    }

    pub fn policy(&self) -> &ProtocolPolicy {
        &self.unlocked_inner.policy
    }
    pub fn memory_budget(&self) -> &MemoryBudget {
        &self.unlocked_inner.budget
    }
    pub fn stats(&self) -> ReassemblyStatsSnapshot {
        self.unlocked_inner.stats.snapshot()
    }

    fn dispatch(&self, events: Vec<ReassemblyEvent<B>>) {
        for event in events {
            event.dispatch(self.unlocked_inner.sink.as_ref());
        }
    }

    /// Feed one fragment, returning the datagram if it completed
    pub fn submit_fragment(
        &self,
        key: FragmentKey,
        entry: FragmentEntry<B>,
    ) -> ReassemblyOutcome<Reassembled<B>> {
        let mut events = Vec::new();
        let outcome = {
            let mut inner = self.inner.lock();
            inner.submit(
                key,
                entry,
                self.unlocked_inner.budget.clusters(),
                &mut events,
            )
        };
        self.dispatch(events);
        outcome
    }

    /// Feed one fragment, handing a completed datagram to the sink
    pub fn input_fragment(&self, key: FragmentKey, entry: FragmentEntry<B>) -> ReassemblyOutcome<()> {
        self.deliver(self.submit_fragment(key, entry))
    }

    pub(crate) fn deliver(&self, outcome: ReassemblyOutcome<Reassembled<B>>) -> ReassemblyOutcome<()> {
        outcome.map(|packet| self.unlocked_inner.sink.on_reassembled(packet))
    }

    /// Age every queue by `ticks`, returning how many queues were evicted
    pub fn age_by_ticks(&self, ticks: u32) -> usize {
        let mut events = Vec::new();
        let evicted = {
            let mut inner = self.inner.lock();
            inner.age_by_ticks(ticks, self.unlocked_inner.budget.clusters(), &mut events)
        };
        self.dispatch(events);
        evicted
    }

    /// One timer period
    pub fn slow_timeout(&self) -> usize {
        self.age_by_ticks(1)
    }

    pub fn drain_all(&self) -> usize {
        self.inner.lock().drain_all()
    }

    pub fn try_drain_all(&self) -> Result<usize, ReassemblyBusyError> {
        let mut inner = self.inner.try_lock().ok_or(ReassemblyBusyError)?;
        Ok(inner.drain_all())
    }

    pub fn drain_half(&self) -> usize {
        let mut events = Vec::new();
        let evicted = self.inner.lock().drop_half(&mut events);
        self.dispatch(events);
        evicted
    }

    pub fn try_drain_half(&self) -> Result<usize, ReassemblyBusyError> {
        let mut events = Vec::new();
        let evicted = {
            let mut inner = self.inner.try_lock().ok_or(ReassemblyBusyError)?;
            inner.drop_half(&mut events)
        };
        self.dispatch(events);
        Ok(evicted)
    }

    /// Memory pressure hook, evicting as the policy's drain mode says
    pub fn try_drain(&self) -> Result<usize, ReassemblyBusyError> {
        match self.unlocked_inner.policy.pressure_drain {
            DrainMode::Half => self.try_drain_half(),
            DrainMode::All => self.try_drain_all(),
        }
    }

    /// Release every buffered fragment
    pub fn shutdown(&self) -> usize {
        let drained = self.drain_all();
        log_frag!(debug "{} reassembly shut down", self.unlocked_inner.policy.family);
        drained
    }

    pub fn queue_count(&self) -> u32 {
        self.inner.lock().queue_count()
    }
    pub fn fragment_count(&self) -> u32 {
        self.inner.lock().fragment_count()
    }
    pub fn limits(&self) -> ReassemblyLimits {
        self.inner.lock().limits()
    }

    /// Inspect the table under its lock
    pub fn with_table<R, F: FnOnce(&ReassemblyTable<B>) -> R>(&self, f: F) -> R {
        f(&self.inner.lock())
    }
}
