use super::*;

type Queue = ReassemblyQueue<Vec<u8>>;

fn insert(
    queue: &mut Queue,
    entry: FragmentEntry<Vec<u8>>,
    policy: &ProtocolPolicy,
) -> Result<InsertStatus, InsertError<Vec<u8>>> {
    let traffic_class = queue.key().traffic_class();
    let mut oversized = Vec::new();
    let res = queue.insert(entry, traffic_class, policy, &mut oversized);
    assert!(oversized.is_empty());
    res
}

fn ranges(queue: &Queue) -> Vec<(u32, u64)> {
    queue.entries().map(|e| (e.offset(), e.end())).collect()
}

pub fn test_trim_against_predecessor() {
    let policy = ProtocolPolicy::ipv4();
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);

    let res = insert(&mut queue, fragment(0, &[b'A'; 100], true), &policy);
    assert!(matches!(res, Ok(InsertStatus::Incomplete)));
    let res = insert(&mut queue, fragment(50, &[b'B'; 100], true), &policy);
    assert!(matches!(res, Ok(InsertStatus::Incomplete)));

    assert_eq!(ranges(&queue), vec![(0, 100), (100, 150)]);
    assert_eq!(queue.fragment_count(), 2);
    let second = queue.entries().nth(1).expect("two entries");
    assert_eq!(second.payload(), &vec![b'B'; 50]);

    let res = insert(&mut queue, fragment(150, &[b'C'; 50], false), &policy);
    assert!(matches!(res, Ok(InsertStatus::Complete { total_len: 200 })));
}

pub fn test_trim_successor() {
    let policy = ProtocolPolicy::ipv4();
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);

    let res = insert(&mut queue, fragment(50, &[b'B'; 100], true), &policy);
    assert!(matches!(res, Ok(InsertStatus::Incomplete)));
    let res = insert(&mut queue, fragment(0, &[b'A'; 100], true), &policy);
    assert!(matches!(res, Ok(InsertStatus::Incomplete)));

    assert_eq!(ranges(&queue), vec![(0, 100), (100, 150)]);
    let mut entries = queue.entries();
    assert_eq!(entries.next().expect("first").payload(), &vec![b'A'; 100]);
    assert_eq!(entries.next().expect("second").payload(), &vec![b'B'; 50]);
}

pub fn test_contained_fragment() {
    let policy = ProtocolPolicy::ipv4();
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);

    assert!(insert(&mut queue, fragment(0, &[1u8; 100], true), &policy).is_ok());
    assert!(matches!(
        insert(&mut queue, fragment(0, &[1u8; 100], true), &policy),
        Err(InsertError::Contained(_))
    ));
    assert!(matches!(
        insert(&mut queue, fragment(16, &[2u8; 8], true), &policy),
        Err(InsertError::Contained(_))
    ));
    assert_eq!(queue.fragment_count(), 1);
    assert_eq!(queue.covered(), vec![(0, 100)]);
}

pub fn test_successor_removal() {
    let policy = ProtocolPolicy::ipv4();
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);

    assert!(insert(&mut queue, fragment(8, &[1u8; 8], true), &policy).is_ok());
    assert!(insert(&mut queue, fragment(16, &[2u8; 8], true), &policy).is_ok());
    assert_eq!(queue.fragment_count(), 2);

    let res = insert(&mut queue, fragment(0, &[3u8; 32], false), &policy);
    assert!(matches!(res, Ok(InsertStatus::Complete { total_len: 32 })));
    assert_eq!(queue.fragment_count(), 1);
    assert_eq!(ranges(&queue), vec![(0, 32)]);
}

pub fn test_strict_overlap() {
    let policy = ProtocolPolicy::ipv6();
    let mut queue = Queue::new(v6_key(1), policy.default_ttl);

    assert!(insert(&mut queue, fragment(0, &[b'A'; 100], true), &policy).is_ok());
    assert!(matches!(
        insert(&mut queue, fragment(50, &[b'B'; 100], true), &policy),
        Err(InsertError::Overlap(_))
    ));
    assert_eq!(queue.fragment_count(), 1);
    assert_eq!(queue.covered(), vec![(0, 100)]);

    // An exact duplicate is not an overlap
    assert!(matches!(
        insert(&mut queue, fragment(0, &[b'A'; 100], true), &policy),
        Err(InsertError::Contained(_))
    ));

    let res = insert(&mut queue, fragment(100, &[b'C'; 50], false), &policy);
    assert!(matches!(res, Ok(InsertStatus::Complete { total_len: 150 })));
}

pub fn test_first_fragment_info() {
    let policy = ProtocolPolicy::ipv4();
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);

    assert!(insert(&mut queue, fragment(8, &[1u8; 8], false), &policy).is_ok());
    assert!(!queue.first_fragment_seen());
    assert_eq!(queue.unfragmentable_len(), -1);

    let res = insert(&mut queue, fragment(0, &[0u8; 8], true), &policy);
    assert!(matches!(res, Ok(InsertStatus::Complete { total_len: 16 })));
    assert!(queue.first_fragment_seen());
    assert_eq!(queue.unfragmentable_len(), 20);
    assert_eq!(queue.next_header(), 17);
}

pub fn test_incomplete_until_last() {
    let policy = ProtocolPolicy::ipv4();
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);

    assert!(matches!(
        insert(&mut queue, fragment(0, &[0u8; 8], true), &policy),
        Ok(InsertStatus::Incomplete)
    ));
    assert!(matches!(
        insert(&mut queue, fragment(16, &[0u8; 8], true), &policy),
        Ok(InsertStatus::Incomplete)
    ));
    // Contiguous, but the last fragment still says more are coming
    assert!(matches!(
        insert(&mut queue, fragment(8, &[0u8; 8], true), &policy),
        Ok(InsertStatus::Incomplete)
    ));
    assert_eq!(queue.covered(), vec![(0, 24)]);
}

pub fn test_oversize_sweep() {
    let policy = ProtocolPolicy::ipv6();
    let mut queue = Queue::new(v6_key(1), policy.default_ttl);
    let mut oversized = Vec::new();

    // Fits while the header size is unknown
    let res = queue.insert(
        FragmentEntry::new(65000, true, vec![0u8; 496]),
        0,
        &policy,
        &mut oversized,
    );
    assert!(matches!(res, Ok(InsertStatus::Incomplete)));

    let first = FragmentEntry::new(0, true, vec![0u8; 8]).with_first_info(FirstFragmentInfo {
        unfragmentable_len: 40,
        next_header: 6,
    });
    let res = queue.insert(first, 0, &policy, &mut oversized);
    assert!(matches!(res, Ok(InsertStatus::Incomplete)));
    assert_eq!(oversized.len(), 1);
    assert_eq!(oversized[0].offset(), 65000);
    assert_eq!(queue.fragment_count(), 1);
    assert_eq!(queue.covered(), vec![(0, 8)]);

    let res = queue.insert(
        FragmentEntry::new(65488, true, vec![0u8; 8]),
        0,
        &policy,
        &mut oversized,
    );
    assert!(matches!(res, Err(InsertError::TooLong(_))));
    assert_eq!(queue.fragment_count(), 1);
}

pub fn test_ecn_merging() {
    let policy = ProtocolPolicy::ipv6();
    let ect0 = FragmentKey::v6(
        Ipv6Addr::LOCALHOST,
        Ipv6Addr::LOCALHOST,
        9,
        0x02,
    );
    let mut queue = Queue::new(ect0, policy.default_ttl);
    let mut oversized = Vec::new();

    let res = queue.insert(fragment(0, &[0u8; 8], true), 0x03, &policy, &mut oversized);
    assert!(res.is_ok());
    assert_eq!(queue.traffic_class() & 0x03, 0x03);

    let res = queue.insert(fragment(8, &[0u8; 8], true), 0x00, &policy, &mut oversized);
    assert!(matches!(res, Err(InsertError::Inconsistent(_))));

    let not_ect = FragmentKey::v6(Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST, 10, 0x00);
    let mut queue = Queue::new(not_ect, policy.default_ttl);
    let res = queue.insert(fragment(0, &[0u8; 8], true), 0x03, &policy, &mut oversized);
    assert!(matches!(res, Err(InsertError::Inconsistent(_))));
    let res = queue.insert(fragment(8, &[0u8; 8], true), 0x01, &policy, &mut oversized);
    assert!(res.is_ok());
    assert_eq!(queue.fragment_count(), 1);
}

pub fn test_tos_exact() {
    let policy = ProtocolPolicy::ipv4();
    let key = FragmentKey::v4(
        Ipv4Addr::new(192, 168, 1, 1),
        Ipv4Addr::new(192, 168, 1, 2),
        3,
        6,
        0x10,
    );
    let mut queue = Queue::new(key, policy.default_ttl);
    let mut oversized = Vec::new();

    let res = queue.insert(fragment(0, &[0u8; 8], true), 0x00, &policy, &mut oversized);
    assert!(matches!(res, Err(InsertError::Inconsistent(_))));
    let res = queue.insert(fragment(0, &[0u8; 8], true), 0x10, &policy, &mut oversized);
    assert!(res.is_ok());
}

pub fn test_age() {
    let mut queue = Queue::new(v4_key(1), 3);
    assert_eq!(queue.age(0), 3);
    assert_eq!(queue.age(1), 2);
    assert_eq!(queue.age(500), 0);
    assert_eq!(queue.ttl_ticks(), 0);
}

/// Buffer that only tracks a length, for sizes too large to allocate
#[derive(Debug)]
struct LengthOnly(usize);

impl PacketBuffer for LengthOnly {
    fn len(&self) -> usize {
        self.0
    }
    fn trim_front(&mut self, count: usize) {
        self.0 -= count.min(self.0);
    }
    fn concat(&mut self, other: Self) {
        self.0 += other.0;
    }
    fn split_off(&mut self, at: usize) -> Self {
        let at = at.min(self.0);
        let tail = self.0 - at;
        self.0 = at;
        LengthOnly(tail)
    }
}

pub fn test_offset_space_end() {
    // Incremental check once the header length is known
    let policy = ProtocolPolicy::ipv6();
    let mut queue = Queue::new(v6_key(1), policy.default_ttl);
    let mut oversized = Vec::new();
    let first = FragmentEntry::new(0, true, vec![0u8; 8]).with_first_info(FirstFragmentInfo {
        unfragmentable_len: 40,
        next_header: 17,
    });
    assert!(queue.insert(first, 0, &policy, &mut oversized).is_ok());
    let far = FragmentEntry::new(u32::MAX - 16, true, vec![1u8; 8]);
    assert_eq!(far.end(), u64::from(u32::MAX) - 8);
    assert!(matches!(
        queue.insert(far, 0, &policy, &mut oversized),
        Err(InsertError::TooLong(_))
    ));
    assert_eq!(queue.fragment_count(), 1);

    // Without the incremental check only the offset space bounds a fragment
    let policy = ProtocolPolicy {
        oversize_check: OversizeCheck::AtCompletion,
        ..ProtocolPolicy::ipv4()
    };
    let mut queue = Queue::new(v4_key(1), policy.default_ttl);
    assert!(insert(&mut queue, fragment(0, &[0u8; 8], true), &policy).is_ok());
    let past = FragmentEntry::new(u32::MAX - 4, true, vec![1u8; 8]);
    assert_eq!(past.end(), u64::from(u32::MAX) + 4);
    assert!(matches!(
        insert(&mut queue, past, &policy),
        Err(InsertError::TooLong(_))
    ));
    let last = FragmentEntry::new(u32::MAX - 8, false, vec![1u8; 8]);
    assert!(matches!(
        insert(&mut queue, last, &policy),
        Ok(InsertStatus::Incomplete)
    ));
    assert_eq!(
        queue.covered(),
        vec![(0, 8), (u32::MAX - 8, u32::MAX)]
    );
}

pub fn test_huge_fragment_rejected_by_engine() {
    let engine = test_engine(ProtocolPolicy::ipv6());
    let key = v6_key(3);
    let first = FragmentEntry::new(0, true, vec![0u8; 8]).with_first_info(FirstFragmentInfo {
        unfragmentable_len: 40,
        next_header: 17,
    });
    assert!(engine.submit_fragment(key, first).is_incomplete());
    let res = engine.submit_fragment(key, FragmentEntry::new(u32::MAX - 16, true, vec![1u8; 8]));
    assert!(matches!(res, ReassemblyOutcome::Error(ReassemblyError::TooLong)));
    assert_eq!(engine.fragment_count(), 1);
    assert_eq!(engine.stats().too_long, 1);
}

pub fn test_length_beyond_u32() {
    let Ok(len) = usize::try_from(u64::from(u32::MAX) + 10) else {
        return;
    };
    let entry = FragmentEntry::new(0, false, LengthOnly(len));
    assert_eq!(entry.length(), u64::from(u32::MAX) + 10);
    assert_eq!(entry.end(), entry.length());

    for policy in [
        ProtocolPolicy::ipv6(),
        ProtocolPolicy {
            oversize_check: OversizeCheck::AtCompletion,
            ..ProtocolPolicy::ipv4()
        },
    ] {
        let mut queue: ReassemblyQueue<LengthOnly> = ReassemblyQueue::new(v6_key(2), 10);
        let entry = FragmentEntry::new(0, false, LengthOnly(len));
        let res = queue.insert(entry, 0, &policy, &mut Vec::new());
        assert!(matches!(res, Err(InsertError::TooLong(_))));
        assert_eq!(queue.fragment_count(), 0);
    }
}

pub fn test_completed_size_beyond_u32() {
    let Ok(len) = usize::try_from(u32::MAX - 7) else {
        return;
    };
    let policy = ProtocolPolicy {
        oversize_check: OversizeCheck::AtCompletion,
        ..ProtocolPolicy::ipv4()
    };
    let engine: ReassemblyEngine<LengthOnly> =
        ReassemblyEngine::new(policy, MemoryBudget::default(), Arc::new(NullSink))
            .expect("policy should be valid");
    let key = v4_key(4);

    let tail = FragmentEntry::new(8, false, LengthOnly(len));
    assert_eq!(tail.end(), u64::from(u32::MAX));
    assert!(engine.submit_fragment(key, tail).is_incomplete());

    // The header length pushes the datagram past the 32-bit range
    let first = FragmentEntry::new(0, true, LengthOnly(8)).with_first_info(FirstFragmentInfo {
        unfragmentable_len: 20,
        next_header: 17,
    });
    let res = engine.submit_fragment(key, first);
    assert!(matches!(res, ReassemblyOutcome::Error(ReassemblyError::TooLong)));
    assert_eq!(engine.queue_count(), 0);
    assert_eq!(engine.stats().too_long, 1);
    assert_eq!(engine.stats().reassembled, 0);
}

pub fn test_all() {
    test_trim_against_predecessor();
    test_trim_successor();
    test_contained_fragment();
    test_successor_removal();
    test_strict_overlap();
    test_first_fragment_info();
    test_incomplete_until_last();
    test_oversize_sweep();
    test_ecn_merging();
    test_tos_exact();
    test_age();
    test_offset_space_end();
    test_huge_fragment_rejected_by_engine();
    test_length_beyond_u32();
    test_completed_size_beyond_u32();
}
