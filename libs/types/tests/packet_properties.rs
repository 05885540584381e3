//! Packet Descriptor Property Tests
//!
//! Properties of the buffer chain and the wrapper/original ownership hand-off
//! that must hold for any frame layout.

use bytes::Bytes;
use proptest::prelude::*;
use relay_types::{ControlRequest, Oid, Packet, PoolId};

proptest! {
    #[test]
    fn payload_is_concatenation_of_chain(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)) {
        let expected: Vec<u8> = chunks.iter().flatten().copied().collect();
        let packet = Packet::new(chunks.into_iter().map(Bytes::from).collect());

        prop_assert_eq!(packet.total_len(), expected.len());
        let payload = packet.payload();
        prop_assert_eq!(payload.as_ref(), expected.as_slice());
    }

    #[test]
    fn wrapper_round_trip_preserves_original(frame in prop::collection::vec(any::<u8>(), 1..256), flags in any::<u32>()) {
        let pool = PoolId::next();
        let mut original = Packet::from_frame(frame.clone());
        original.flags = flags;
        let original_id = original.id();

        let mut wrapper = Packet::descriptor(pool);
        wrapper.copy_send_fields_from(&original);
        wrapper.stash_original(original);
        prop_assert_eq!(wrapper.flags, flags);
        prop_assert_ne!(wrapper.id(), original_id);

        let back = wrapper.take_original().expect("wrapper holds original");
        prop_assert_eq!(back.id(), original_id);
        let payload = back.payload();
        prop_assert_eq!(payload.as_ref(), frame.as_slice());
    }

    #[test]
    fn u32_write_then_read(capacity in 0usize..16, offset in 0usize..16, value in any::<u32>()) {
        let mut request = ControlRequest::query(Oid::GEN_LINK_SPEED, capacity);
        let fits = offset + 4 <= capacity;
        prop_assert_eq!(request.write_u32(offset, value), fits);
        if fits {
            prop_assert_eq!(request.read_u32(offset), Some(value));
        } else {
            prop_assert_eq!(request.read_u32(offset), None);
        }
    }
}
