//! Property tests for the wire format: hostile input never panics the
//! decoder, and diffs carry any world change across the wire intact.

use glam::{Vec2, Vec3};
use proptest::prelude::*;

use skirmish::snapshot::{compute_change_mask, diff, Player, PlayerFlags, WorldSnapshot};
use skirmish::{Message, StateSync, World};

fn vec3() -> impl Strategy<Value = Vec3> {
    (-1.0e4f32..1.0e4, -1.0e4f32..1.0e4, -1.0e4f32..1.0e4).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..2000)) {
        let _ = Message::decode(&bytes);
    }

    #[test]
    fn state_sync_prefix_never_panics(
        bytes in prop::collection::vec(any::<u8>(), 0..512),
        sequence in any::<u32>(),
    ) {
        let mut framed = vec![0];
        framed.extend_from_slice(&sequence.to_le_bytes());
        framed.extend_from_slice(&bytes);
        let _ = Message::decode(&framed);
    }

    #[test]
    fn player_round_trips_through_state_sync(
        name in "[a-z0-9_]{0,16}",
        position in vec3(),
        velocity in vec3(),
        health in any::<i32>(),
        ammo in any::<u16>(),
        flags in any::<u16>(),
        unarmed in any::<bool>(),
    ) {
        let mut world = World::new();
        let id = world.spawn_player(name, position);
        {
            let player = world.players_mut().get_mut(id).unwrap();
            player.velocity = velocity;
            player.health = health;
            player.ammo = ammo;
            player.flags = PlayerFlags::from_bits_retain(flags);
            if unarmed {
                player.held_weapon = None;
            }
        }
        let sequence = world.advance_sequence();

        let message = Message::StateSync(StateSync {
            sequence,
            baseline: 0,
            diff: diff(&WorldSnapshot::empty(), world.state()),
        });
        let decoded = Message::decode(&message.encode()).unwrap();
        prop_assert_eq!(&decoded, &message);

        let Message::StateSync(sync) = decoded else {
            unreachable!();
        };
        let mut replica = WorldSnapshot::empty();
        sync.diff.apply(&mut replica);
        prop_assert!(replica.same_entities(world.state()));
    }

    #[test]
    fn delta_application_reaches_target(
        moves in prop::collection::vec((0usize..6, vec3(), -3.0f32..3.0), 0..24),
        despawn in prop::collection::vec(0usize..6, 0..3),
        spawn_extra in 0usize..3,
    ) {
        let mut world = World::new();
        let ids: Vec<_> = (0..6)
            .map(|i| world.spawn_player(format!("p{i}"), Vec3::splat(i as f32)))
            .collect();
        world.advance_sequence();
        let before = world.snapshot();

        for (index, position, yaw) in moves {
            if let Some(player) = world.players_mut().get_mut(ids[index]) {
                player.position = position;
                player.look = Vec2::new(yaw, 0.0);
            }
        }
        for index in despawn {
            world.despawn(ids[index]);
        }
        for i in 0..spawn_extra {
            world.spawn_player(format!("late{i}"), Vec3::ZERO);
        }
        world.advance_sequence();

        let bytes = Message::StateSync(StateSync {
            sequence: world.sequence(),
            baseline: before.sequence,
            diff: diff(&before, world.state()),
        })
        .encode();
        let Message::StateSync(sync) = Message::decode(&bytes).unwrap() else {
            unreachable!();
        };

        let mut replica = before.clone();
        sync.diff.apply(&mut replica);
        prop_assert!(replica.same_entities(world.state()));

        // Applying the same diff again changes nothing.
        sync.diff.apply(&mut replica);
        prop_assert!(replica.same_entities(world.state()));
    }

    #[test]
    fn change_mask_is_empty_only_for_equal_players(
        a in vec3(),
        b in vec3(),
        health in any::<i32>(),
    ) {
        let mut left = Player::new(1, "x", a);
        left.health = health;
        let mut right = left.clone();
        prop_assert!(compute_change_mask(&left, &right).is_empty());

        right.position = b;
        let same_bits = a.to_array().map(f32::to_bits) == b.to_array().map(f32::to_bits);
        prop_assert_eq!(compute_change_mask(&left, &right).is_empty(), same_bits);
    }
}
