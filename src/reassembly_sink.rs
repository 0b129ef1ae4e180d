use super::*;

/// Upward notifications from an engine
///
/// Every method gets ownership of the buffers involved. The defaults just
/// release them. Signals are delivered after the table lock is released, so
/// implementations may call back into the engine.
pub trait ReassemblySink<B>: Send + Sync {
    fn on_reassembled(&self, packet: Reassembled<B>) {
        drop(packet);
    }
    /// A queue expired; carries the offset-zero fragment if it had arrived
    fn on_time_exceeded(&self, key: &FragmentKey, first_fragment: Option<B>) {
        let _ = (key, first_fragment);
    }
    fn on_too_long(&self, key: &FragmentKey, fragment: B) {
        let _ = (key, fragment);
    }
    fn on_overlap_rejected(&self, key: &FragmentKey, fragment: B) {
        let _ = (key, fragment);
    }
}

/// Sink that ignores every signal
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl<B> ReassemblySink<B> for NullSink {}

/// A signal in owned form, for channel based delivery
#[derive(Debug)]
pub enum ReassemblyEvent<B> {
    Reassembled(Reassembled<B>),
    TimeExceeded {
        key: FragmentKey,
        first_fragment: Option<B>,
    },
    TooLong {
        key: FragmentKey,
        fragment: B,
    },
    OverlapRejected {
        key: FragmentKey,
        fragment: B,
    },
}

impl<B> ReassemblyEvent<B> {
    pub fn key(&self) -> &FragmentKey {
        match self {
            Self::Reassembled(r) => &r.key,
            Self::TimeExceeded { key, .. } => key,
            Self::TooLong { key, .. } => key,
            Self::OverlapRejected { key, .. } => key,
        }
    }

    pub(crate) fn dispatch(self, sink: &dyn ReassemblySink<B>) {
        match self {
            Self::Reassembled(r) => sink.on_reassembled(r),
            Self::TimeExceeded {
                key,
                first_fragment,
            } => sink.on_time_exceeded(&key, first_fragment),
            Self::TooLong { key, fragment } => sink.on_too_long(&key, fragment),
            Self::OverlapRejected { key, fragment } => sink.on_overlap_rejected(&key, fragment),
        }
    }
}

impl<B: Send> ReassemblySink<B> for flume::Sender<ReassemblyEvent<B>> {
    fn on_reassembled(&self, packet: Reassembled<B>) {
        forward(self, ReassemblyEvent::Reassembled(packet));
    }
    fn on_time_exceeded(&self, key: &FragmentKey, first_fragment: Option<B>) {
        forward(
            self,
            ReassemblyEvent::TimeExceeded {
                key: *key,
                first_fragment,
            },
        );
    }
    fn on_too_long(&self, key: &FragmentKey, fragment: B) {
        forward(self, ReassemblyEvent::TooLong { key: *key, fragment });
    }
    fn on_overlap_rejected(&self, key: &FragmentKey, fragment: B) {
        forward(self, ReassemblyEvent::OverlapRejected { key: *key, fragment });
    }
}

fn forward<B>(sender: &flume::Sender<ReassemblyEvent<B>>, event: ReassemblyEvent<B>) {
    if let Err(e) = sender.send(event) {
        log_frag!(debug "signal receiver gone, dropping event for {}", e.into_inner().key());
    }
}
