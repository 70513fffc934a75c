//! Randomized comparison of SpatialIndex against a brute-force list of claims.
//!
//! Every query result must equal a linear scan over the same claims, across
//! long random sequences of inserts and removes, and every earlier version of
//! the index must keep answering for its own snapshot.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::config::IndexConfig;
    use crate::geometry::{Aabb3, BlockPos, ClaimBox};
    use crate::spatial_index::SpatialIndex;

    /// Coordinate range and claim sizes of a workload.
    #[derive(Clone, Copy)]
    struct Scale {
        world: i32,
        floor: i32,
        ceiling: i32,
        max_radius: i32,
        max_radius_y: i32,
        max_region: i32,
    }

    const SMALL: Scale = Scale {
        world: 200,
        floor: 0,
        ceiling: 128,
        max_radius: 24,
        max_radius_y: 16,
        max_region: 60,
    };

    /// Packable world edges: 2^25 horizontally, 2^11 vertically.
    const WORLD_EDGE: Scale = Scale {
        world: 1 << 25,
        floor: -(1 << 11),
        ceiling: 1 << 11,
        max_radius: 1 << 22,
        max_radius_y: 2_000,
        max_region: 1 << 24,
    };

    fn random_claim<R: Rng>(rng: &mut R, scale: Scale) -> ClaimBox {
        let origin = BlockPos::new(
            rng.random_range(-scale.world..scale.world),
            rng.random_range(scale.floor..scale.ceiling),
            rng.random_range(-scale.world..scale.world),
        );
        ClaimBox::new(
            origin,
            rng.random_range(1..scale.max_radius),
            rng.random_range(1..scale.max_radius_y),
            rng.random_bool(0.2),
        )
        .expect("positive radii within i32")
    }

    fn random_point<R: Rng>(rng: &mut R, scale: Scale) -> BlockPos {
        let margin = scale.max_radius + 30;
        BlockPos::new(
            rng.random_range(-scale.world - margin..scale.world + margin),
            rng.random_range(scale.floor - scale.max_radius_y..scale.ceiling + scale.max_radius_y),
            rng.random_range(-scale.world - margin..scale.world + margin),
        )
    }

    /// A point inside a random stored claim, so large-scale workloads still hit.
    fn point_in<R: Rng>(rng: &mut R, model: &HashMap<ClaimBox, u32>) -> Option<BlockPos> {
        let keys: Vec<&ClaimBox> = model.keys().collect();
        if keys.is_empty() {
            return None;
        }
        let a = keys[rng.random_range(0..keys.len())].aabb();
        Some(BlockPos::new(
            rng.random_range(a.lower.x..a.upper.x),
            rng.random_range(a.lower.y..a.upper.y),
            rng.random_range(a.lower.z..a.upper.z),
        ))
    }

    fn random_region<R: Rng>(rng: &mut R, scale: Scale) -> Aabb3 {
        let lower = random_point(rng, scale);
        let upper = lower.offset(
            rng.random_range(1..scale.max_region),
            rng.random_range(1..scale.max_region.min(4_000)),
            rng.random_range(1..scale.max_region),
        );
        Aabb3::new(lower, upper)
    }

    fn brute_point(model: &HashMap<ClaimBox, u32>, p: BlockPos) -> Vec<u32> {
        let mut v: Vec<u32> = model.iter().filter(|(k, _)| k.contains(p)).map(|(_, v)| *v).collect();
        v.sort_unstable();
        v
    }

    fn brute_region(model: &HashMap<ClaimBox, u32>, r: &Aabb3) -> Vec<u32> {
        let mut v: Vec<u32> = model.iter().filter(|(k, _)| k.aabb().intersects(r)).map(|(_, v)| *v).collect();
        v.sort_unstable();
        v
    }

    fn index_point(index: &SpatialIndex<ClaimBox, u32>, p: BlockPos) -> Vec<u32> {
        let mut v: Vec<u32> = index.query_point(p).copied().collect();
        v.sort_unstable();
        v
    }

    fn index_region(index: &SpatialIndex<ClaimBox, u32>, r: &Aabb3) -> Vec<u32> {
        let mut v: Vec<u32> = index.query_region(r).map(|(_, v)| *v).collect();
        v.sort_unstable();
        v
    }

    fn run_mixed_workload(seed: u64, config: IndexConfig, scale: Scale, steps: usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index = SpatialIndex::with_config(config);
        let mut model: HashMap<ClaimBox, u32> = HashMap::new();
        let mut next_value = 0_u32;

        for step in 0..steps {
            if model.is_empty() || rng.random_bool(0.65) {
                let b = random_claim(&mut rng, scale);
                index = index.insert(b, next_value);
                let _previous = model.insert(b, next_value);
                next_value += 1;
            } else {
                let keys: Vec<ClaimBox> = model.keys().copied().collect();
                let victim = keys[rng.random_range(0..keys.len())];
                index = index.remove(&victim);
                let _removed = model.remove(&victim);
            }

            assert_eq!(index.len(), model.len(), "len after step {step}");
            if step % 25 == 0 {
                index.assert_invariants();
            }
            for _ in 0..4 {
                let p = random_point(&mut rng, scale);
                assert_eq!(index_point(&index, p), brute_point(&model, p), "point {p} at step {step}");
            }
            if let Some(p) = point_in(&mut rng, &model) {
                assert!(!index_point(&index, p).is_empty(), "point {p} inside a claim at step {step}");
                assert_eq!(index_point(&index, p), brute_point(&model, p), "point {p} at step {step}");
            }
            let r = random_region(&mut rng, scale);
            assert_eq!(index_region(&index, &r), brute_region(&model, &r), "region {r:?} at step {step}");
        }
        index.assert_invariants();
    }

    #[test]
    fn test_random_workload_default_config() {
        run_mixed_workload(95_756_739, IndexConfig::default(), SMALL, 600);
    }

    #[test]
    fn test_random_workload_small_nodes() {
        run_mixed_workload(7, IndexConfig::new(3, 2).expect("valid config"), SMALL, 500);
    }

    #[test]
    fn test_random_workload_wide_nodes() {
        run_mixed_workload(42, IndexConfig::new(16, 6).expect("valid config"), SMALL, 500);
    }

    #[test]
    fn test_random_workload_world_edges() {
        run_mixed_workload(2_024, IndexConfig::default(), WORLD_EDGE, 500);
    }

    #[test]
    fn test_random_workload_world_edges_small_nodes() {
        run_mixed_workload(31, IndexConfig::new(3, 2).expect("valid config"), WORLD_EDGE, 400);
    }

    #[test]
    fn test_snapshots_keep_their_answers() {
        let mut rng = StdRng::seed_from_u64(1_234);
        let mut index = SpatialIndex::new();
        let mut model: HashMap<ClaimBox, u32> = HashMap::new();
        let mut history = Vec::new();

        for i in 0..200_u32 {
            if model.len() > 10 && i % 3 == 0 {
                let victim = *model.keys().next().expect("non-empty model");
                index = index.remove(&victim);
                let _removed = model.remove(&victim);
            } else {
                let b = random_claim(&mut rng, SMALL);
                index = index.insert(b, i);
                let _previous = model.insert(b, i);
            }
            if i % 20 == 0 {
                history.push((index.clone(), model.clone()));
            }
        }

        for (snapshot, snapshot_model) in &history {
            assert_eq!(snapshot.len(), snapshot_model.len());
            for _ in 0..50 {
                let p = random_point(&mut rng, SMALL);
                assert_eq!(index_point(snapshot, p), brute_point(snapshot_model, p), "point {p}");
            }
        }
    }

    #[test]
    fn test_insert_remove_round_trip_equality() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut index = SpatialIndex::new();
        for i in 0..120_u32 {
            index = index.insert(random_claim(&mut rng, SMALL), i);
        }
        for _ in 0..50 {
            let b = random_claim(&mut rng, SMALL);
            if index.contains_key(&b) {
                continue;
            }
            let round_trip = index.insert(b, u32::MAX).remove(&b);
            assert_eq!(round_trip, index);
            round_trip.assert_invariants();
        }
    }
}
