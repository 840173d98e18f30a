/*!
 * Typed Pool Tests
 * Object pools layered on the allocator suite
 */

use memkit::{BuddyAllocator, ObjectPool, PagedObjectPool, SmallObjectPool};
use pretty_assertions::assert_eq;

#[derive(Debug, PartialEq)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
    ttl: u32,
}

impl Particle {
    fn at_rest(ttl: u32) -> Self {
        Self {
            position: [0.0; 3],
            velocity: [0.0; 3],
            ttl,
        }
    }
}

#[test]
fn test_object_pool_cycles_particles() {
    let pool: ObjectPool<Particle> = ObjectPool::new(8);

    let mut live: Vec<_> = (0..8).map(|ttl| pool.create(Particle::at_rest(ttl))).collect();
    assert_eq!(pool.free_objects(), 0);

    // Expire half, spawn replacements into the recycled slots.
    live.retain(|particle| particle.ttl % 2 == 0);
    assert_eq!(pool.free_objects(), 4);

    for ttl in 100..104 {
        live.push(pool.create(Particle::at_rest(ttl)));
    }
    assert_eq!(pool.free_objects(), 0);
    assert_eq!(live.len(), 8);
}

#[test]
fn test_object_pool_on_a_buddy_allocator() {
    let buddy = BuddyAllocator::with_min_block_size(16 * 1024, 64);

    {
        let pool: ObjectPool<u64> = ObjectPool::with_parent(&buddy, 32);
        assert_eq!(buddy.outstanding_allocations(), 1);

        let value = pool.create(11);
        assert_eq!(*value, 11);
    }

    assert_eq!(buddy.outstanding_allocations(), 0);
}

#[test]
fn test_paged_pool_grows_without_moving_objects() {
    let pool: PagedObjectPool<String> = PagedObjectPool::new(2);

    let held: Vec<_> = (0..5)
        .map(|index| pool.create(format!("object-{index}")))
        .collect();

    assert_eq!(pool.page_count(), 3);

    // Addresses taken before growth stay valid afterwards.
    let address = &*held[0] as *const String;
    let _more = pool.create(String::from("later"));
    assert_eq!(address, &*held[0] as *const String);
    assert_eq!(&*held[4], "object-4");
}

#[test]
fn test_small_object_pool_routes_mixed_types() {
    let pool = SmallObjectPool::new(512);

    let byte = pool.create(5u8);
    let tuple = pool.create((1u64, 2u64));
    let wide = pool.create([3u64; 8]);

    assert_eq!((*byte, tuple.0, wide[7]), (5, 1, 3));
    assert_eq!(pool.live_objects(), 3);

    drop(byte);
    drop(tuple);
    drop(wide);
    assert_eq!(pool.live_objects(), 0);
}
