use super::*;

/// IPv4 and IPv6 reassembly sharing one memory budget
pub struct NetReassembly<B> {
    ipv4: ReassemblyEngine<B>,
    ipv6: ReassemblyEngine<B>,
    budget: MemoryBudget,
}

impl<B> Clone for NetReassembly<B> {
    fn clone(&self) -> Self {
        Self {
            ipv4: self.ipv4.clone(),
            ipv6: self.ipv6.clone(),
            budget: self.budget.clone(),
        }
    }
}

impl<B: PacketBuffer> NetReassembly<B> {
    pub fn new(config: &ReassemblyConfig, sink: Arc<dyn ReassemblySink<B>>) -> EyreResult<Self> {
        config.validate()?;
        let budget = config.memory_budget();
        let ipv4 = ReassemblyEngine::new(config.ipv4.clone(), budget.clone(), sink.clone())
            .wrap_err("ipv4 reassembly")?;
        let ipv6 = ReassemblyEngine::new(config.ipv6.clone(), budget.clone(), sink)
            .wrap_err("ipv6 reassembly")?;
        Ok(Self { ipv4, ipv6, budget })
    }

    pub fn ipv4(&self) -> &ReassemblyEngine<B> {
        &self.ipv4
    }
    pub fn ipv6(&self) -> &ReassemblyEngine<B> {
        &self.ipv6
    }
    pub fn memory_budget(&self) -> &MemoryBudget {
        &self.budget
    }

    /// One timer period for both protocols
    pub fn slow_timeout(&self) -> usize {
        self.ipv4.slow_timeout() + self.ipv6.slow_timeout()
    }

    /// Memory pressure hook, never blocks
    ///
    /// A protocol whose table is busy is skipped.
    pub fn drain(&self) -> usize {
        let mut evicted = 0;
        for engine in [&self.ipv4, &self.ipv6] {
            match engine.try_drain() {
                Ok(n) => evicted += n,
                Err(e) => {
                    log_frag!(debug "{} drain skipped: {}", engine.policy().family, e);
                }
            }
        }
        evicted
    }

    pub fn shutdown(&self) -> usize {
        self.ipv4.shutdown() + self.ipv6.shutdown()
    }
}
