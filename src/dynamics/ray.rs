//! Ground ray: a thin wrapper over the query pipeline's ray cast that
//! resolves the hit collider into a track surface index and remembers the
//! last cast for the contact generator.

use rapier3d::math::{Point, Real, Vector};
use rapier3d::prelude::{
    ColliderHandle, ColliderSet, QueryFilter, QueryPipeline, Ray, RigidBodyHandle, RigidBodySet,
};

#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub point: Point<Real>,
    pub normal: Vector<Real>,
    /// Distance from the ray origin to the hit.
    pub depth: Real,
    pub collider: ColliderHandle,
    /// Parent body of the hit collider, if any.
    pub body: Option<RigidBodyHandle>,
    /// Index into the world surface table, if the collider carries one.
    pub surface: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct GroundRay {
    from: Point<Real>,
    dir: Vector<Real>,
    length: Real,
    hit: Option<RayHit>,
}

impl Default for GroundRay {
    fn default() -> Self {
        Self {
            from: Point::origin(),
            dir: -Vector::y(),
            length: 0.0,
            hit: None,
        }
    }
}

impl GroundRay {
    /// Cast from `from` along the unit direction `dir`, skipping the
    /// excluded body (the chassis shooting the ray).
    pub fn cast(
        &mut self,
        from: Point<Real>,
        dir: Vector<Real>,
        length: Real,
        exclude: RigidBodyHandle,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        queries: &QueryPipeline,
    ) -> bool {
        self.from = from;
        self.dir = dir;
        self.length = length;
        self.hit = None;

        let ray = Ray::new(from, dir);
        let filter = QueryFilter::default().exclude_rigid_body(exclude);
        if let Some((collider, hit)) =
            queries.cast_ray_and_get_normal(bodies, colliders, &ray, length, true, filter)
        {
            let co = &colliders[collider];
            let surface = (co.user_data != 0).then(|| co.user_data as usize - 1);
            self.hit = Some(RayHit {
                point: ray.point_at(hit.time_of_impact),
                normal: hit.normal,
                depth: hit.time_of_impact,
                collider,
                body: co.parent(),
                surface,
            });
        }
        self.hit.is_some()
    }

    pub fn hit(&self) -> Option<&RayHit> {
        self.hit.as_ref()
    }

    /// Distance to the hit, or the full ray length when nothing was hit.
    pub fn depth(&self) -> Real {
        self.hit.as_ref().map_or(self.length, |h| h.depth)
    }

    pub fn from(&self) -> Point<Real> {
        self.from
    }

    pub fn dir(&self) -> Vector<Real> {
        self.dir
    }

    pub fn length(&self) -> Real {
        self.length
    }
}
