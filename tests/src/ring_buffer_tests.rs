//! Ring buffer properties: FIFO order, mirror disambiguation, forced writes

use bsp_core::{round_up_capacity, CapacityError, RingBuffer, RingBufferState, MAX_CAPACITY};
use proptest::prelude::*;
use rstest::rstest;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>),
    PutForce(Vec<u8>),
    Get(usize),
}

fn op(capacity: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..=capacity + 4).prop_map(Op::Put),
        prop::collection::vec(any::<u8>(), 0..=capacity).prop_map(Op::PutForce),
        (0..=capacity + 4).prop_map(Op::Get),
    ]
}

fn capacity() -> impl Strategy<Value = usize> {
    (0u32..=8).prop_map(|shift| 1usize << shift)
}

proptest! {
    #[test]
    fn prop_put_get_preserves_fifo_order(
        (cap, ops) in capacity().prop_flat_map(|cap| (Just(cap), prop::collection::vec(op(cap), 1..64)))
    ) {
        let mut storage = vec![0u8; cap];
        let mut ring = RingBuffer::new(&mut storage).unwrap();
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Put(data) => {
                    let space = ring.space_len() as usize;
                    let written = ring.put(&data);
                    prop_assert_eq!(written, data.len().min(space));
                    model.extend(&data[..written]);
                }
                Op::PutForce(data) => {
                    let before = ring.data_len() as usize;
                    prop_assert_eq!(ring.put_force(&data), data.len());
                    prop_assert_eq!(ring.data_len() as usize, (before + data.len()).min(cap));
                    model.extend(&data);
                    while model.len() > cap {
                        model.pop_front();
                    }
                }
                Op::Get(len) => {
                    let mut out = vec![0u8; len];
                    let read = ring.get(&mut out);
                    prop_assert_eq!(read, len.min(model.len()));
                    let expected: Vec<u8> = model.drain(..read).collect();
                    prop_assert_eq!(&out[..read], &expected[..]);
                }
            }
            prop_assert_eq!(ring.data_len() as usize, model.len());
            prop_assert_eq!(ring.space_len() as usize, cap - model.len());
        }
    }

    #[test]
    fn prop_put_force_keeps_newest(
        cap in capacity(),
        fill in 0usize..=256,
        data in prop::collection::vec(any::<u8>(), 0..=256),
    ) {
        let mut storage = vec![0u8; cap];
        let mut ring = RingBuffer::new(&mut storage).unwrap();
        let prefill: Vec<u8> = (0..fill.min(cap)).map(|i| i as u8).collect();
        ring.put(&prefill);

        let written = ring.put_force(&data);
        prop_assert_eq!(written, data.len().min(cap));

        let mut all = prefill.clone();
        all.extend(&data);
        let keep = all.len().min(cap);
        let mut out = vec![0u8; cap];
        let read = ring.get(&mut out);
        prop_assert_eq!(read, keep);
        prop_assert_eq!(&out[..read], &all[all.len() - keep..]);
    }

    #[test]
    fn prop_reset_empties(cap in capacity(), fill in 0usize..=256, drained in 0usize..=256) {
        let mut storage = vec![0u8; cap];
        let mut ring = RingBuffer::new(&mut storage).unwrap();
        ring.put_force(&vec![0xA5; fill.min(cap)]);
        let mut out = vec![0u8; drained];
        ring.get(&mut out);

        ring.reset();
        prop_assert_eq!(ring.data_len(), 0);
        prop_assert_eq!(ring.space_len() as usize, cap);
        prop_assert_eq!(ring.state(), RingBufferState::Empty);
    }

    #[test]
    fn prop_round_up_is_smallest_power_of_two(len in 1usize..=MAX_CAPACITY) {
        let cap = round_up_capacity(len).unwrap();
        prop_assert!(cap.is_power_of_two());
        prop_assert!(cap >= len);
        prop_assert!(cap / 2 < len);
    }
}

#[test]
fn test_reference_scenario() {
    println!("\n=== Capacity 8 reference scenario ===");
    let mut storage = [0u8; 8];
    let mut ring = RingBuffer::new(&mut storage).unwrap();

    assert_eq!(ring.put(&[1, 2, 3, 4, 5]), 5);
    let mut out = [0u8; 3];
    assert_eq!(ring.get(&mut out), 3);
    assert_eq!(out, [1, 2, 3]);
    assert_eq!(ring.data_len(), 2);

    assert_eq!(ring.put_force(&[6, 7, 8, 9, 10, 11]), 6);
    let mut rest = [0u8; 8];
    let read = ring.get(&mut rest);
    assert_eq!(&rest[..read], &[4, 5, 6, 7, 8, 9, 10, 11]);
    println!("✓ put/get/put_force behave as documented");
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(64)]
#[case(1024)]
#[case(MAX_CAPACITY)]
fn test_full_and_empty_share_offsets(#[case] cap: usize) {
    let mut storage = vec![0u8; cap];
    let mut ring = RingBuffer::new(&mut storage).unwrap();
    let data = vec![0x5A; cap];

    assert_eq!(ring.put(&data), cap);
    assert_eq!(ring.data_len() as usize, cap);
    assert!(!ring.putchar(1));
    let full_read = ring.read_index();
    let full_write = ring.write_index();
    assert_eq!(full_read.offset, full_write.offset);
    assert_ne!(full_read.mirror, full_write.mirror);
    assert_eq!(ring.state(), RingBufferState::Full);

    let mut out = vec![0u8; cap];
    assert_eq!(ring.get(&mut out), cap);
    assert_eq!(ring.data_len(), 0);
    let empty_read = ring.read_index();
    let empty_write = ring.write_index();
    assert_eq!(empty_read.offset, empty_write.offset);
    assert_eq!(empty_read.mirror, empty_write.mirror);
    assert_eq!(ring.state(), RingBufferState::Empty);
}

#[rstest]
#[case(0, Err(CapacityError::Empty))]
#[case(3, Err(CapacityError::NotPowerOfTwo(3)))]
#[case(1000, Err(CapacityError::NotPowerOfTwo(1000)))]
#[case(MAX_CAPACITY * 2, Err(CapacityError::TooLarge(MAX_CAPACITY * 2)))]
#[case(16, Ok(16))]
fn test_capacity_validation(#[case] len: usize, #[case] expected: Result<u16, CapacityError>) {
    let mut storage = vec![0u8; len];
    let result = RingBuffer::new(&mut storage).map(|ring| ring.capacity());
    assert_eq!(result, expected);
}

#[test]
fn test_spsc_threads_stream_in_order() {
    println!("\n=== SPSC stream across threads ===");
    const TOTAL: usize = 100_000;
    let mut storage = [0u8; 64];
    let mut ring = RingBuffer::new(&mut storage).unwrap();
    let (mut producer, mut consumer) = ring.split();

    std::thread::scope(|scope| {
        scope.spawn(move || {
            let mut next = 0usize;
            while next < TOTAL {
                let chunk: Vec<u8> = (next..(next + 7).min(TOTAL)).map(|i| i as u8).collect();
                next += producer.put(&chunk);
            }
        });

        let mut expected = 0usize;
        let mut out = [0u8; 13];
        while expected < TOTAL {
            let read = consumer.get(&mut out);
            for byte in &out[..read] {
                assert_eq!(*byte, expected as u8);
                expected += 1;
            }
        }
    });
    println!("✓ {} bytes arrived in order", TOTAL);
}
