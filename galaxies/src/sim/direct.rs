use cgmath::Vector3;
use rayon::iter::{
    IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator, ParallelIterator,
};

use crate::sim::{StarState, StepParams, pull};

/// Advance every texel of `front` by one tick into `back`. Mirrors
/// `step_stars` in `star_update.wgsl`.
pub fn step_texels(
    front: &StarState,
    back: &mut StarState,
    black_holes: &[[f32; 4]],
    params: &StepParams,
) {
    back.positions
        .par_iter_mut()
        .zip(back.velocities.par_iter_mut())
        .zip(front.positions.par_iter().zip(front.velocities.par_iter()))
        .for_each(|((pos_out, vel_out), (pos, vel))| {
            let p = Vector3::new(pos[0], pos[1], pos[2]);
            let mut v = Vector3::new(vel[0], vel[1], vel[2]);
            let mut acc = Vector3::new(0.0, 0.0, 0.0);
            for hole in black_holes {
                let rel = Vector3::new(hole[0], hole[1], hole[2]) - p;
                acc += pull(rel, params.gravity, params.min_separation);
            }
            // Semi-implicit Euler: velocity first, then position with the new velocity.
            v += acc * params.speed;
            let p = p + v * params.speed;
            *pos_out = [p.x, p.y, p.z, pos[3]];
            *vel_out = [v.x, v.y, v.z, vel[3]];
        });
}
