//! Integration tests for the deep pixel store invariants.

use deepfx_core::prelude::*;
use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

fn permutation(rng: &mut StdRng, n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order
}

fn populated_image(rng: &mut StdRng) -> DeepImage {
    let mut image = DeepImage::new(5, 4);
    image.add_channel::<Vec3>(names::P).unwrap();
    image.add_channel::<f32>("mask").unwrap();
    for y in 0..4 {
        for x in 0..5 {
            for _ in 0..rng.gen_range(0..6) {
                let rgba = Vec4::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0), 1.0)
                    * rng.gen_range(0.0..1.0);
                let s = image
                    .push_sample(x, y, SampleInit::new(rgba, rng.gen_range(1.0..11.0), rng.gen_range(0..4)))
                    .unwrap();
                image
                    .channel_mut::<Vec3>(names::P)
                    .unwrap()
                    .set(x, y, s, Vec3::new(x as f32, y as f32, s as f32));
            }
        }
    }
    image
}

#[test]
fn grid_invariant_survives_appends_and_reorders() {
    let mut rng = seeded(7);
    let mut image = populated_image(&mut rng);
    image.validate().unwrap();

    for _ in 0..50 {
        let (x, y) = (rng.gen_range(0..5), rng.gen_range(0..4));
        if rng.gen_bool(0.5) {
            image.add_sample(x, y).unwrap();
        } else {
            let order = permutation(&mut rng, image.count(x, y));
            image.reorder_pixel(x, y, &order).unwrap();
        }
        image.validate().unwrap();
    }

    // A channel added late is sized to the current counts.
    image.add_channel::<u32>("late").unwrap();
    image.sort_by_depth().unwrap();
    image.validate().unwrap();
}

#[test]
fn reorder_matches_target_in_every_channel() {
    let mut rng = seeded(42);
    let mut image = populated_image(&mut rng);

    for y in 0..4 {
        for x in 0..5 {
            let n = image.count(x, y);
            let order = permutation(&mut rng, n);

            let before_p = image.channel::<Vec3>(names::P).unwrap().samples(x, y).to_vec();
            let before_z = image.channel::<f32>(names::Z).unwrap().samples(x, y).to_vec();

            image.reorder_pixel(x, y, &order).unwrap();

            let after_p = image.channel::<Vec3>(names::P).unwrap().samples(x, y);
            let after_z = image.channel::<f32>(names::Z).unwrap().samples(x, y);
            for (i, &k) in order.iter().enumerate() {
                assert_eq!(after_p[i], before_p[k]);
                assert_eq!(after_z[i], before_z[k]);
            }
        }
    }
}

#[test]
fn depth_sort_is_farthest_first_everywhere() {
    let mut rng = seeded(3);
    let mut image = populated_image(&mut rng);
    assert!(image.needs_sort());
    image.ensure_sorted().unwrap();

    let z = image.channel::<f32>(names::Z).unwrap();
    let p = image.channel::<Vec3>(names::P).unwrap();
    for y in 0..4 {
        for x in 0..5 {
            let depths = z.samples(x, y);
            assert!(depths.windows(2).all(|w| w[0] >= w[1]));
            // P was tagged with the original index; all indices still present.
            let mut tags: Vec<usize> = p.samples(x, y).iter().map(|v| v.z as usize).collect();
            tags.sort_unstable();
            assert_eq!(tags, (0..depths.len()).collect::<Vec<_>>());
        }
    }
}

#[test]
fn projection_reads_alpha() {
    let mut image = DeepImage::new(1, 1);
    image
        .push_sample(0, 0, SampleInit::new(Vec4::new(0.1, 0.2, 0.3, 0.4), 1.0, 1))
        .unwrap();

    let alpha = image.projection(names::RGBA, 3).unwrap();
    assert_eq!(alpha.count(0, 0), 1);
    assert_eq!(alpha.get(0, 0, 0), 0.4);

    let id = image.projection(names::ID, 0).unwrap();
    assert_eq!(id.get(0, 0, 0), 1.0);

    assert!(image.projection(names::Z, 2).unwrap_err().is_schema_error());
    assert!(image.projection("missing", 0).is_err());
}
