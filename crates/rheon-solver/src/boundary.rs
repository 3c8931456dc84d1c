//! Boundary conditions and ghost refresh.
//!
//! Every refresh walks the active axes in order. For each axis it
//! first writes physical conditions on wall sides, wraps periodic axes
//! owned by a single rank, then runs the halo exchange for that axis.
//! Whole storage planes are written, so corner ghosts end up
//! consistent and re-applying a condition changes nothing.

use serde::{Deserialize, Serialize};
use rheon_backend::ExecutionContext;
use rheon_grid::{halo, Field, Side};
use rheon_types::{RheonError, RheonResult};

/// Velocity condition on one side of the domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VelocitySide {
    /// Zero tangential shear stress, with a prescribed normal velocity
    /// (zero for an impermeable wall).
    FreeSlip {
        #[serde(default)]
        normal_velocity: f64,
    },
    /// Zero velocity on the wall.
    NoSlip,
    /// Full velocity vector on the wall (e.g. a moving lid).
    Velocity { value: [f64; 3] },
    /// Displacement increment over one physical step, applied as `u / dt`.
    Displacement { value: [f64; 3] },
    /// Periodic axis. Must be set on both sides.
    Periodic,
}

impl VelocitySide {
    pub const FREE_SLIP: VelocitySide = VelocitySide::FreeSlip {
        normal_velocity: 0.0,
    };

    /// Wall velocity vector for step `dt`, if the side prescribes one.
    fn wall_velocity(&self, dt: f64) -> Option<[f64; 3]> {
        match *self {
            VelocitySide::NoSlip => Some([0.0; 3]),
            VelocitySide::Velocity { value } => Some(value),
            VelocitySide::Displacement { value } => {
                if dt.is_finite() && dt > 0.0 {
                    Some(value.map(|u| u / dt))
                } else {
                    Some([0.0; 3])
                }
            }
            VelocitySide::FreeSlip { .. } | VelocitySide::Periodic => None,
        }
    }
}

/// Velocity conditions, indexed `sides[axis][side]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityBoundary {
    pub sides: [[VelocitySide; 2]; 3],
}

impl VelocityBoundary {
    /// Impermeable free-slip walls everywhere.
    pub fn free_slip() -> Self {
        Self {
            sides: [[VelocitySide::FREE_SLIP; 2]; 3],
        }
    }

    /// No-slip walls everywhere.
    pub fn no_slip() -> Self {
        Self {
            sides: [[VelocitySide::NoSlip; 2]; 3],
        }
    }

    /// Replaces the condition on one side.
    pub fn with_side(mut self, axis: usize, side: Side, kind: VelocitySide) -> Self {
        self.sides[axis][side.index()] = kind;
        self
    }

    /// Makes `axis` periodic on both sides.
    pub fn with_periodic(mut self, axis: usize) -> Self {
        self.sides[axis] = [VelocitySide::Periodic; 2];
        self
    }

    #[inline]
    pub fn side(&self, axis: usize, side: Side) -> VelocitySide {
        self.sides[axis][side.index()]
    }

    /// Periodicity flags, for building a decomposition.
    pub fn periodic(&self) -> [bool; 3] {
        [0, 1, 2].map(|a| self.sides[a][0] == VelocitySide::Periodic)
    }

    /// Checks that periodic sides come in pairs.
    pub fn validate(&self) -> RheonResult<()> {
        validate_pairs(
            self.sides.map(|s| s.map(|k| k == VelocitySide::Periodic)),
            "velocity",
        )
    }
}

impl Default for VelocityBoundary {
    fn default() -> Self {
        Self::free_slip()
    }
}

/// Thermal condition on one side of the domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TemperatureSide {
    /// Fixed temperature on the wall (K).
    Fixed(f64),
    /// Insulating wall.
    ZeroFlux,
    /// Prescribed heat flux (W/m²) along the positive axis direction.
    Flux(f64),
    /// Periodic axis. Must be set on both sides.
    Periodic,
}

/// Thermal conditions, indexed `sides[axis][side]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBoundary {
    pub sides: [[TemperatureSide; 2]; 3],
}

impl TemperatureBoundary {
    /// Insulating walls everywhere.
    pub fn insulated() -> Self {
        Self {
            sides: [[TemperatureSide::ZeroFlux; 2]; 3],
        }
    }

    /// Fixed temperatures at the bottom and top of `axis`, insulated elsewhere.
    pub fn fixed_along(axis: usize, low: f64, high: f64) -> Self {
        Self::insulated()
            .with_side(axis, Side::Low, TemperatureSide::Fixed(low))
            .with_side(axis, Side::High, TemperatureSide::Fixed(high))
    }

    pub fn with_side(mut self, axis: usize, side: Side, kind: TemperatureSide) -> Self {
        self.sides[axis][side.index()] = kind;
        self
    }

    pub fn with_periodic(mut self, axis: usize) -> Self {
        self.sides[axis] = [TemperatureSide::Periodic; 2];
        self
    }

    #[inline]
    pub fn side(&self, axis: usize, side: Side) -> TemperatureSide {
        self.sides[axis][side.index()]
    }

    pub fn periodic(&self) -> [bool; 3] {
        [0, 1, 2].map(|a| self.sides[a][0] == TemperatureSide::Periodic)
    }

    pub fn validate(&self) -> RheonResult<()> {
        validate_pairs(
            self.sides.map(|s| s.map(|k| k == TemperatureSide::Periodic)),
            "temperature",
        )?;
        for axis_sides in &self.sides {
            for kind in axis_sides {
                let v = match *kind {
                    TemperatureSide::Fixed(v) | TemperatureSide::Flux(v) => v,
                    _ => 0.0,
                };
                if !v.is_finite() {
                    return Err(RheonError::InvalidConfig(
                        "temperature boundary values must be finite".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for TemperatureBoundary {
    fn default() -> Self {
        Self::insulated()
    }
}

fn validate_pairs(periodic: [[bool; 2]; 3], what: &str) -> RheonResult<()> {
    for (axis, pair) in periodic.iter().enumerate() {
        if pair[0] != pair[1] {
            return Err(RheonError::InvalidConfig(format!(
                "{} boundary: axis {} is periodic on one side only",
                what, axis
            )));
        }
    }
    Ok(())
}

// ─── Applicator ───────────────────────────────────────────────

/// Applies boundary conditions through an execution context.
#[derive(Clone)]
pub struct BoundaryApplicator {
    ctx: ExecutionContext,
}

impl BoundaryApplicator {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Checks that `periodic` matches the decomposition's periodicity.
    pub fn check_periodicity(&self, periodic: [bool; 3]) -> RheonResult<()> {
        let sub = self.ctx.subdomain();
        for axis in 0..sub.local.ndim {
            if sub.periodic[axis] != periodic[axis] {
                return Err(RheonError::InvalidConfig(format!(
                    "boundary periodicity {:?} does not match decomposition {:?}",
                    periodic, sub.periodic
                )));
            }
        }
        Ok(())
    }

    /// Enforces `bc` on every velocity component and refreshes all ghosts.
    pub fn apply_velocity(
        &self,
        velocity: &mut [Field],
        bc: &VelocityBoundary,
        dt: f64,
    ) -> RheonResult<()> {
        let sub = self.ctx.subdomain();
        for axis in 0..sub.local.ndim {
            for (component, field) in velocity.iter_mut().enumerate() {
                for side in Side::BOTH {
                    if sub.is_wall(axis, side) {
                        velocity_wall(field, axis, side, component, bc.side(axis, side), dt);
                    }
                }
                if sub.wraps_locally(axis) {
                    halo::wrap(field, axis)?;
                }
                self.ctx.comm.exchange(field, axis)?;
            }
        }
        Ok(())
    }

    /// Enforces `bc` on the temperature ghosts and refreshes halos.
    pub fn apply_temperature(&self, temperature: &mut Field, bc: &TemperatureBoundary) -> RheonResult<()> {
        let sub = self.ctx.subdomain();
        for axis in 0..sub.local.ndim {
            for side in Side::BOTH {
                if sub.is_wall(axis, side) {
                    let (ghost, inner) = center_planes(temperature, axis, side);
                    match bc.side(axis, side) {
                        TemperatureSide::Fixed(tb) => {
                            temperature.map_plane(axis, inner, ghost, |t| 2.0 * tb - t)
                        }
                        _ => temperature.copy_plane(axis, inner, ghost),
                    }
                }
            }
            if sub.wraps_locally(axis) {
                halo::wrap(temperature, axis)?;
            }
            self.ctx.comm.exchange(temperature, axis)?;
        }
        Ok(())
    }

    /// Overwrites the boundary faces of heat-flux component `axis` on
    /// insulated and prescribed-flux walls.
    pub fn apply_heat_flux(&self, flux: &mut Field, axis: usize, bc: &TemperatureBoundary) {
        let sub = self.ctx.subdomain();
        for side in Side::BOTH {
            if !sub.is_wall(axis, side) {
                continue;
            }
            let b = boundary_node(flux, axis, side);
            match bc.side(axis, side) {
                TemperatureSide::ZeroFlux => flux.fill_plane(axis, b, 0.0),
                TemperatureSide::Flux(q) => flux.fill_plane(axis, b, q),
                TemperatureSide::Fixed(_) | TemperatureSide::Periodic => {}
            }
        }
    }

    /// Zero-gradient ghosts on walls, periodic or halo ghosts elsewhere.
    ///
    /// Used for pressure, normal stress, viscosity and other scalar
    /// coefficients. Works for centered and nodal fields.
    pub fn refresh_scalar(&self, field: &mut Field) -> RheonResult<()> {
        let sub = self.ctx.subdomain();
        for axis in 0..sub.local.ndim {
            for side in Side::BOTH {
                if sub.is_wall(axis, side) {
                    let (ghost, mirror) = if field.location.is_nodal(axis) {
                        let b = boundary_node(field, axis, side);
                        match side {
                            Side::Low => (b - 1, b + 1),
                            Side::High => (b + 1, b - 1),
                        }
                    } else {
                        center_planes(field, axis, side)
                    };
                    field.copy_plane(axis, mirror, ghost);
                }
            }
            if sub.wraps_locally(axis) {
                halo::wrap(field, axis)?;
            }
            self.ctx.comm.exchange(field, axis)?;
        }
        Ok(())
    }
}

/// `(ghost, first interior)` planes of a field centered along `axis`.
fn center_planes(field: &Field, axis: usize, side: Side) -> (usize, usize) {
    let g = field.ghost[axis];
    let n = field.interior[axis];
    match side {
        Side::Low => (g - 1, g),
        Side::High => (g + n, g + n - 1),
    }
}

/// Storage index of the boundary node of a field nodal along `axis`.
fn boundary_node(field: &Field, axis: usize, side: Side) -> usize {
    let g = field.ghost[axis];
    match side {
        Side::Low => g,
        Side::High => g + field.interior[axis] - 1,
    }
}

/// Writes one wall condition onto velocity `component` at `side` of `axis`.
fn velocity_wall(
    field: &mut Field,
    axis: usize,
    side: Side,
    component: usize,
    kind: VelocitySide,
    dt: f64,
) {
    if component == axis {
        let normal = match kind {
            VelocitySide::FreeSlip { normal_velocity } => normal_velocity,
            VelocitySide::Periodic => return,
            other => other.wall_velocity(dt).map_or(0.0, |v| v[axis]),
        };
        let b = boundary_node(field, axis, side);
        let (ghost, inner) = match side {
            Side::Low => (b - 1, b + 1),
            Side::High => (b + 1, b - 1),
        };
        field.fill_plane(axis, b, normal);
        field.map_plane(axis, inner, ghost, |v| 2.0 * normal - v);
    } else {
        let (ghost, inner) = center_planes(field, axis, side);
        match kind {
            VelocitySide::FreeSlip { .. } => field.copy_plane(axis, inner, ghost),
            VelocitySide::Periodic => {}
            other => {
                let vt = other.wall_velocity(dt).map_or(0.0, |v| v[component]);
                field.map_plane(axis, inner, ghost, |v| 2.0 * vt - v);
            }
        }
    }
}
