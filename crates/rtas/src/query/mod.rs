//! Ray queries
//!
//! A [RayQuery] walks an [Accel] in rounds. A round ends either on a candidate the application has to
//! decide on (a non opaque triangle or a procedural box), or when there is nothing left to visit.
//!
//! ```text
//! Init --start_traversal--> Traversing --sync--> PotentialHitPending --start_traversal--> Traversing
//!                                          \
//!                                           `--> Done
//! ```
//!
//! Opaque triangles are committed during the round without asking. Once done, the query holds the closest
//! committed hit, if any, and refuses any further round.

pub mod intersect;

use derive_more::Display;
use glam::{Vec2, Vec3};

use crate::{
    accel::{
        layout::{AccelView, LEAF_INSTANCE, LEAF_PROCEDURAL, LEAF_TRIANGLE},
        Accel,
    },
    counter,
    error::{LayoutError, QueryError},
    math::transform::AffineTransform,
    ray::{Ray, RayFlags},
    timed_scope_accumulate,
};

use intersect::intersect_triangle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum QueryState {
    Init,
    Traversing,
    PotentialHitPending,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HitKind {
    Potential,
    Committed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum CandidateKind {
    #[default]
    Triangle,
    Procedural,
}

/// Everything known about a hit, in the space of the instance level it was found in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitInfo {
    /// 0 for the geometries of the traversed accel, 1 inside one of its instances, ...
    pub bvh_level: u32,
    pub candidate: CandidateKind,
    pub t: f32,
    pub barycentrics: Vec2,
    pub front_face: bool,
    /// Instance ID of the deepest instance entered, `u32::MAX` at level 0
    pub instance_id: u32,
    pub geom_id: u32,
    pub prim_id: u32,
    /// Triangle vertices. For a procedural box, its min and max followed by zero.
    pub vertices: [Vec3; 3],
}

/// One accel on the path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct Level<'a> {
    accel: &'a Accel,
    view: AccelView<'a>,
    ray: Ray,
    inv_dir: Vec3,
    instance_id: u32,
}

impl<'a> Level<'a> {
    fn new(accel: &'a Accel, ray: Ray, instance_id: u32) -> Result<Self, LayoutError> {
        Ok(Self {
            accel,
            view: accel.view()?,
            ray,
            inv_dir: ray.direction.recip(),
            instance_id,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum StackEntry {
    Node { level: u32, node: u32 },
    /// Leaf records `next..end` of a leaf node still to be visited
    Prims { level: u32, next: u32, end: u32 },
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    info: HitInfo,
    leaf: u32,
    /// Levels from the root down to the level of the hit
    levels: Vec<Level<'a>>,
}

enum Visit {
    Continue,
    Pause,
    End,
}

pub struct RayQuery<'a> {
    state: QueryState,
    levels: Vec<Level<'a>>,
    stack: Vec<StackEntry>,
    candidate: Option<Candidate<'a>>,
    committed: Option<Candidate<'a>>,
}

impl<'a> RayQuery<'a> {
    /// Fails if the buffer of `accel` can't be read
    pub fn new(accel: &'a Accel, ray: Ray) -> Result<Self, QueryError> {
        counter!("Ray queries");
        Ok(Self {
            state: QueryState::Init,
            levels: vec![Level::new(accel, ray, u32::MAX)?],
            stack: vec![StackEntry::Node { level: 0, node: 0 }],
            candidate: None,
            committed: None,
        })
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Starts a round. An undecided potential hit is rejected.
    pub fn start_traversal(&mut self) -> Result<(), QueryError> {
        match self.state {
            QueryState::Init | QueryState::PotentialHitPending => {
                self.candidate = None;
                self.state = QueryState::Traversing;
                Ok(())
            }
            QueryState::Traversing => Err(QueryError::RoundInFlight),
            QueryState::Done => Err(QueryError::TraversalDone),
        }
    }

    /// Runs the round started by [RayQuery::start_traversal] to its end
    pub fn sync(&mut self) -> Result<(), QueryError> {
        match self.state {
            QueryState::Traversing => {}
            QueryState::Done => return Err(QueryError::TraversalDone),
            QueryState::Init | QueryState::PotentialHitPending => {
                return Err(QueryError::NoRoundInFlight)
            }
        }
        counter!("Ray query rounds");

        match timed_scope_accumulate!("Ray query traversal", || self.traverse()) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::error!(target: "rtas::query", "traversal aborted: {err}");
                self.stack.clear();
                self.candidate = None;
                self.state = QueryState::Done;
                Err(QueryError::CorruptAccel(err))
            }
        }
    }

    pub fn is_traversal_done(&self) -> bool {
        self.state == QueryState::Done
    }

    pub fn has_committed_hit(&self) -> bool {
        self.committed.is_some()
    }

    fn pending_candidate(&self) -> Result<&Candidate<'a>, QueryError> {
        match self.state {
            QueryState::PotentialHitPending => self.candidate.as_ref().ok_or(QueryError::NoPotentialHit),
            QueryState::Done => Err(QueryError::TraversalDone),
            _ => Err(QueryError::NoPotentialHit),
        }
    }

    fn commit(&mut self, info: HitInfo) {
        if let Some(candidate) = self.candidate.take() {
            self.committed = Some(Candidate { info, ..candidate });
            if self.levels[0].ray.flags.contains(RayFlags::ACCEPT_FIRST_HIT_AND_END_SEARCH) {
                self.stack.clear();
            }
        }
    }

    /// Commits the pending candidate as is. A procedural candidate is committed at the distance where the ray
    /// enters its box.
    pub fn commit_potential_hit(&mut self) -> Result<(), QueryError> {
        let info = self.pending_candidate()?.info;
        self.commit(info);
        Ok(())
    }

    /// Commits the pending procedural candidate at distance `t`, which must lie in the ray interval and before
    /// the hit committed so far.
    pub fn commit_potential_hit_override(&mut self, t: f32, barycentrics: Vec2) -> Result<(), QueryError> {
        let candidate = self.pending_candidate()?;
        if candidate.info.candidate != CandidateKind::Procedural {
            return Err(QueryError::NotProcedural);
        }
        let ray = self.levels[0].ray;
        if !(ray.tnear <= t && t < self.current_tmax()) {
            return Err(QueryError::HitOutOfRange { t });
        }

        let info = HitInfo {
            t,
            barycentrics,
            ..candidate.info
        };
        self.commit(info);
        Ok(())
    }

    fn candidate(&self, kind: HitKind) -> Option<&Candidate<'a>> {
        match kind {
            HitKind::Potential if self.state == QueryState::PotentialHitPending => self.candidate.as_ref(),
            HitKind::Potential => None,
            HitKind::Committed => self.committed.as_ref(),
        }
    }

    pub fn hit(&self, kind: HitKind) -> Option<&HitInfo> {
        self.candidate(kind).map(|c| &c.info)
    }

    /// Primitive ID of a triangle hit read back from its leaf record, None if there is no such triangle hit
    pub fn hit_prim_id_triangle(&self, kind: HitKind) -> Option<u32> {
        let candidate = self.candidate(kind)?;
        if candidate.info.candidate != CandidateKind::Triangle {
            return None;
        }
        let level = candidate.levels.last()?;
        level.view.leaf(candidate.leaf).ok().map(|leaf| leaf.prim_id)
    }

    /// Ray at instance level `level` on the path of the reported hit: the pending candidate if any, else the
    /// committed hit, else the path traversed so far. Level 0 is the ray the query was created with.
    pub fn ray(&self, level: u32) -> Option<Ray> {
        let levels = self
            .candidate(HitKind::Potential)
            .or(self.committed.as_ref())
            .map_or(&self.levels, |c| &c.levels);
        levels.get(level as usize).map(|l| l.ray)
    }

    fn current_tmax(&self) -> f32 {
        self.committed
            .as_ref()
            .map_or(self.levels[0].ray.tfar, |c| c.info.t)
    }

    fn traverse(&mut self) -> Result<(), LayoutError> {
        while let Some(entry) = self.stack.pop() {
            match entry {
                StackEntry::Node { level, node } => {
                    self.levels.truncate(level as usize + 1);
                    let lvl = self.levels[level as usize];
                    let node = lvl.view.node(node)?;

                    let hit = node.bounds().ray_intersect(
                        lvl.ray.origin,
                        lvl.inv_dir,
                        (lvl.ray.tnear, self.current_tmax()),
                    );
                    if hit.is_none() {
                        continue;
                    }

                    if node.is_interior() {
                        self.stack.push(StackEntry::Node {
                            level,
                            node: node.first + 1,
                        });
                        self.stack.push(StackEntry::Node {
                            level,
                            node: node.first,
                        });
                    } else if node.count > 0 {
                        self.stack.push(StackEntry::Prims {
                            level,
                            next: node.first,
                            end: node.first + node.count,
                        });
                    }
                }
                StackEntry::Prims { level, next, end } => {
                    self.levels.truncate(level as usize + 1);
                    if next + 1 < end {
                        self.stack.push(StackEntry::Prims {
                            level,
                            next: next + 1,
                            end,
                        });
                    }

                    match self.visit_leaf(level, next)? {
                        Visit::Continue => {}
                        Visit::Pause => {
                            self.state = QueryState::PotentialHitPending;
                            return Ok(());
                        }
                        Visit::End => self.stack.clear(),
                    }
                }
            }
        }

        self.state = QueryState::Done;
        Ok(())
    }

    fn visit_leaf(&mut self, level: u32, index: u32) -> Result<Visit, LayoutError> {
        let lvl = self.levels[level as usize];
        let leaf = lvl.view.leaf(index)?;
        let flags = lvl.ray.flags;

        if lvl.ray.mask as u32 & leaf.mask == 0 {
            return Ok(Visit::Continue);
        }

        let opaque = if flags.contains(RayFlags::FORCE_OPAQUE) {
            true
        } else if flags.contains(RayFlags::FORCE_NON_OPAQUE) {
            false
        } else {
            leaf.is_opaque()
        };
        let culled = (opaque && flags.contains(RayFlags::CULL_OPAQUE))
            || (!opaque && flags.contains(RayFlags::CULL_NON_OPAQUE));

        let tmax = self.current_tmax();
        let candidate = |info: HitInfo, levels: &[Level<'a>]| Candidate {
            info,
            leaf: index,
            levels: levels.to_vec(),
        };

        match leaf.kind {
            LEAF_TRIANGLE => {
                if flags.contains(RayFlags::SKIP_TRIANGLES) || culled {
                    return Ok(Visit::Continue);
                }
                let vertices = leaf.vertices();
                let Some(hit) = intersect_triangle(&lvl.ray, vertices) else {
                    return Ok(Visit::Continue);
                };
                if !(lvl.ray.tnear <= hit.t && hit.t < tmax)
                    || (hit.front_face && flags.contains(RayFlags::CULL_FRONT_FACING_TRIANGLES))
                    || (!hit.front_face && flags.contains(RayFlags::CULL_BACK_FACING_TRIANGLES))
                {
                    return Ok(Visit::Continue);
                }

                let info = HitInfo {
                    bvh_level: level,
                    candidate: CandidateKind::Triangle,
                    t: hit.t,
                    barycentrics: hit.barycentrics,
                    front_face: hit.front_face,
                    instance_id: lvl.instance_id,
                    geom_id: leaf.geom_id,
                    prim_id: leaf.prim_id,
                    vertices,
                };
                if opaque {
                    self.committed = Some(candidate(info, &self.levels));
                    if flags.contains(RayFlags::ACCEPT_FIRST_HIT_AND_END_SEARCH) {
                        return Ok(Visit::End);
                    }
                    Ok(Visit::Continue)
                } else {
                    self.candidate = Some(candidate(info, &self.levels));
                    Ok(Visit::Pause)
                }
            }
            LEAF_PROCEDURAL => {
                if flags.contains(RayFlags::SKIP_PROCEDURAL_PRIMITIVES) || culled {
                    return Ok(Visit::Continue);
                }
                let [min, max, _] = leaf.vertices();
                let bounds = crate::math::bounds::Bounds { min, max };
                let t = match bounds.ray_intersect(lvl.ray.origin, lvl.inv_dir, (lvl.ray.tnear, tmax)) {
                    Some(t) if t < tmax => t,
                    _ => return Ok(Visit::Continue),
                };

                let info = HitInfo {
                    bvh_level: level,
                    candidate: CandidateKind::Procedural,
                    t,
                    barycentrics: Vec2::ZERO,
                    front_face: false,
                    instance_id: lvl.instance_id,
                    geom_id: leaf.geom_id,
                    prim_id: leaf.prim_id,
                    vertices: [min, max, Vec3::ZERO],
                };
                self.candidate = Some(candidate(info, &self.levels));
                Ok(Visit::Pause)
            }
            LEAF_INSTANCE => {
                let record = lvl.view.instance(leaf.payload)?;
                let child = lvl.accel.instanced(record.child)?;
                let world_to_local = AffineTransform::from_row_major(&record.world_to_local);

                self.levels.push(Level::new(
                    child,
                    lvl.ray.transformed(&world_to_local),
                    record.instance_id,
                )?);
                self.stack.push(StackEntry::Node {
                    level: level + 1,
                    node: 0,
                });
                Ok(Visit::Continue)
            }
            _ => Err(LayoutError::BadLeaf { index }),
        }
    }
}
