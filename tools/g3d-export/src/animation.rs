//! Animation baker (keyframe curves -> sampled bone keyframes)
//!
//! The runtime interpolates linearly between stored keyframes. Linear segments are
//! therefore kept sparse (one keyframe per curve key), while any segment that
//! starts at a non-linear key is sampled at every integer frame up to the next
//! key. The first sampled frame is time zero.

use std::collections::BTreeMap;

use g3d_common::{AnimationTrack, BoneAnimation, Keyframe};
use glam::{Mat4, Quat, Vec3};
use hashbrown::HashSet;
use tracing::debug;

use crate::scene::{
    Action, ActionGroup, ArmatureData, FCurve, Interpolation, KeyframePoint, RotationMode,
};
use crate::skeleton::Skeleton;

const BEZIER_ITERATIONS: usize = 32;

// ============================================================================
// Curve evaluation
// ============================================================================

/// Value of a curve at `frame`, held constant outside its key range
pub fn evaluate_curve(curve: &FCurve, frame: f32) -> f32 {
    let keys = &curve.keyframes;
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return 0.0;
    };
    if frame <= first.co[0] {
        return first.co[1];
    }
    if frame >= last.co[0] {
        return last.co[1];
    }

    // Last key at or before the frame; the range checks above guarantee a successor
    let index = keys
        .iter()
        .rposition(|key| key.co[0] <= frame)
        .unwrap_or(0)
        .min(keys.len() - 2);
    let (from, to) = (&keys[index], &keys[index + 1]);

    match from.interpolation {
        Interpolation::Constant => from.co[1],
        Interpolation::Linear => {
            let span = to.co[0] - from.co[0];
            if span <= 0.0 {
                return to.co[1];
            }
            let t = (frame - from.co[0]) / span;
            from.co[1] + (to.co[1] - from.co[1]) * t
        }
        Interpolation::Bezier => evaluate_bezier(from, to, frame),
    }
}

fn evaluate_bezier(from: &KeyframePoint, to: &KeyframePoint, frame: f32) -> f32 {
    let (x0, y0) = (from.co[0], from.co[1]);
    let (x3, y3) = (to.co[0], to.co[1]);
    let third = (x3 - x0) / 3.0;

    let [x1, y1] = from.handle_right.unwrap_or([x0 + third, y0]);
    let [x2, y2] = to.handle_left.unwrap_or([x3 - third, y3]);
    // Handles outside the segment would make x(t) non-monotonic
    let x1 = x1.clamp(x0, x3);
    let x2 = x2.clamp(x0, x3);

    let cubic = |t: f32, p0: f32, p1: f32, p2: f32, p3: f32| {
        let u = 1.0 - t;
        u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
    };

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for _ in 0..BEZIER_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if cubic(mid, x0, x1, x2, x3) < frame {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    cubic(0.5 * (lo + hi), y0, y1, y2, y3)
}

// ============================================================================
// Bone curves
// ============================================================================

/// The transform curves of one bone, by channel
#[derive(Debug, Default)]
pub struct BoneCurves<'a> {
    pub location: Vec<&'a FCurve>,
    pub scale: Vec<&'a FCurve>,
    pub quaternion: Vec<&'a FCurve>,
    pub euler: Vec<&'a FCurve>,
}

impl<'a> BoneCurves<'a> {
    pub fn from_group(group: &'a ActionGroup) -> Self {
        let mut curves = Self::default();
        for curve in &group.channels {
            let path = curve.data_path.as_str();
            if path.ends_with("location") {
                curves.location.push(curve);
            } else if path.ends_with("scale") {
                curves.scale.push(curve);
            } else if path.ends_with("rotation_quaternion") {
                curves.quaternion.push(curve);
            } else if path.ends_with("rotation_euler") {
                curves.euler.push(curve);
            }
        }
        curves
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a FCurve> + '_ {
        self.location
            .iter()
            .chain(&self.scale)
            .chain(&self.quaternion)
            .chain(&self.euler)
            .copied()
    }

    /// Local pose at `frame`; channels without curves keep the identity value
    pub fn local_transform(&self, frame: f32, rotation_mode: RotationMode) -> Mat4 {
        let location = Vec3::from_array(evaluate_into([0.0; 3], &self.location, frame));
        let scale = Vec3::from_array(evaluate_into([1.0; 3], &self.scale, frame));

        let rotation = match rotation_mode {
            RotationMode::Quaternion => {
                let [w, x, y, z] = evaluate_into([1.0, 0.0, 0.0, 0.0], &self.quaternion, frame);
                let q = Quat::from_xyzw(x, y, z, w);
                if q.length_squared() > 0.0 {
                    q.normalize()
                } else {
                    Quat::IDENTITY
                }
            }
            mode => euler_to_quat(mode, evaluate_into([0.0; 3], &self.euler, frame)),
        };

        Mat4::from_scale_rotation_translation(scale, rotation, location)
    }
}

fn evaluate_into<const N: usize>(mut values: [f32; N], curves: &[&FCurve], frame: f32) -> [f32; N] {
    for curve in curves {
        if let Some(value) = values.get_mut(curve.array_index) {
            *value = evaluate_curve(curve, frame);
        }
    }
    values
}

/// Euler angles (radians) in the given application order; axis-angle falls back to XYZ
pub fn euler_to_quat(mode: RotationMode, [x, y, z]: [f32; 3]) -> Quat {
    let qx = Quat::from_rotation_x(x);
    let qy = Quat::from_rotation_y(y);
    let qz = Quat::from_rotation_z(z);
    match mode {
        RotationMode::Xzy => qy * qz * qx,
        RotationMode::Yxz => qz * qx * qy,
        RotationMode::Yzx => qx * qz * qy,
        RotationMode::Zxy => qy * qx * qz,
        RotationMode::Zyx => qx * qy * qz,
        RotationMode::Xyz | RotationMode::Quaternion | RotationMode::AxisAngle => qz * qy * qx,
    }
}

// ============================================================================
// Timeline
// ============================================================================

/// Integer frame of every key, flagged when any key on that frame is not linear
pub fn collect_keyframes<'a>(curves: impl IntoIterator<Item = &'a FCurve>) -> BTreeMap<i32, bool> {
    let mut frames = BTreeMap::new();
    for curve in curves {
        for key in &curve.keyframes {
            let must_bake = key.interpolation != Interpolation::Linear;
            let entry = frames.entry(key.co[0].floor() as i32).or_insert(false);
            *entry |= must_bake;
        }
    }
    frames
}

/// Frames to sample: one per key, densely filled after keys that must be baked
pub fn sample_frames(keyframes: &BTreeMap<i32, bool>) -> Vec<i32> {
    let timeline: Vec<(i32, bool)> = keyframes.iter().map(|(&f, &b)| (f, b)).collect();
    let mut frames = Vec::with_capacity(timeline.len());

    for (index, &(frame, must_bake)) in timeline.iter().enumerate() {
        match timeline.get(index + 1) {
            Some(&(next, _)) if must_bake => frames.extend(frame..next),
            _ => frames.push(frame),
        }
    }
    frames
}

/// Milliseconds since the first timeline frame
pub fn frame_millis(frame: i32, first: i32, fps: f32) -> f32 {
    ((1.0 / f64::from(fps)) * 1000.0 * f64::from(frame - first)) as f32
}

// ============================================================================
// Baking
// ============================================================================

/// Bake one bone. `rest` is the bone's rest pose relative to its exported parent.
pub fn bake_bone(
    bone_id: &str,
    curves: &BoneCurves<'_>,
    rest: Mat4,
    rotation_mode: RotationMode,
    fps: f32,
) -> BoneAnimation {
    let keyframes = collect_keyframes(curves.iter());
    let frames = sample_frames(&keyframes);
    let first = frames.first().copied().unwrap_or(0);

    let keyframes = frames
        .into_iter()
        .map(|frame| {
            let pose = rest * curves.local_transform(frame as f32, rotation_mode);
            Keyframe::from_matrix(frame_millis(frame, first, fps), pose)
        })
        .collect();

    BoneAnimation {
        bone_id: bone_id.to_string(),
        keyframes,
    }
}

/// Bake one action for one armature; `None` when no bone is animated
pub fn bake_action(
    action: &Action,
    track_id: String,
    armature: &ArmatureData,
    skeleton: &Skeleton,
    fps: f32,
) -> Option<AnimationTrack> {
    let mut track = AnimationTrack {
        id: track_id,
        bones: Vec::new(),
    };

    for bone in &armature.bones {
        let Some(rest) = skeleton.rest_pose(&bone.name) else {
            continue;
        };
        let Some(group) = action.groups.iter().find(|g| g.name == bone.name) else {
            continue;
        };

        let curves = BoneCurves::from_group(group);
        let animation = bake_bone(&bone.name, &curves, rest, bone.rotation_mode, fps);
        if !animation.keyframes.is_empty() {
            track.bones.push(animation);
        }
    }

    (!track.bones.is_empty()).then_some(track)
}

/// Bake every used action against an armature, skipping ids already in `seen`
pub fn bake_actions(
    actions: &[Action],
    armature_node_id: &str,
    armature: &ArmatureData,
    skeleton: &Skeleton,
    fps: f32,
    seen: &mut HashSet<String>,
) -> Vec<AnimationTrack> {
    let mut tracks = Vec::new();
    for action in actions {
        if action.users == 0 {
            continue;
        }
        let id = format!("{armature_node_id}|{}", action.name);
        if seen.contains(&id) {
            debug!("Skipping already exported animation {}", id);
            continue;
        }

        if let Some(track) = bake_action(action, id.clone(), armature, skeleton, fps) {
            debug!("Baked animation {} ({} bones)", id, track.bones.len());
            seen.insert(id);
            tracks.push(track);
        }
    }
    tracks
}
