//! Pseudo-time steps and damping for the accelerated PT scheme.
//!
//! The closed forms balance local viscous (or diffusive) stiffness
//! against the largest stable pseudo-time increment `Vpdτ`, normalized
//! by the largest domain length `L` of the global grid:
//!
//! ```text
//! Vpdτ  = CFL · min(dx)            L = max(lx, ly, lz)
//! Stokes:   θ_dτ = L (r + 2) / (Re Vpdτ)     ηdτ = Vpdτ L / Re
//!           dτ_V = ηdτ / max_loc(η)          K̃   = r η / θ_dτ
//! Thermal:  Re   = π + sqrt(π² + ρCp L² / (k dt))
//!           θ_r  = L / (Vpdτ Re)             dτ_ρ = Vpdτ L / (k Re)
//! ```

use std::f64::consts::PI;

use rheon_backend::ExecutionContext;
use rheon_grid::interp::center_to_face;
use rheon_grid::range::step_down;
use rheon_grid::{Field, Grid, Location, Position};
use rheon_types::RheonResult;

use crate::boundary::BoundaryApplicator;
use crate::config::PtParams;
use crate::rheology::ThermalCoefficients;

/// `(Vpdτ, L)` for the local spacing and the global extent.
pub fn wave_scale(ctx: &ExecutionContext, params: &PtParams) -> (f64, f64) {
    let sub = ctx.subdomain();
    let cfl = params.cfl_for(sub.local.ndim);
    (cfl * sub.local.min_spacing(), sub.global.max_length())
}

/// Stokes pseudo-time parameters.
#[derive(Debug, Clone)]
pub struct StokesPseudoSteps {
    pub vpdtau: f64,
    pub length: f64,
    /// Stress damping `θ_dτ` (dimensionless).
    pub theta: f64,
    /// `ηdτ` (m²).
    pub eta_dtau: f64,
    /// Pseudo bulk-to-shear ratio `r`.
    pub r: f64,
    /// Local maximum of the center viscosity.
    pub max_viscosity: Field,
    /// Velocity pseudo-step per component on faces.
    pub dtau_v: Vec<Field>,
}

impl StokesPseudoSteps {
    pub fn new(grid: &Grid) -> Self {
        Self {
            vpdtau: 0.0,
            length: 0.0,
            theta: 0.0,
            eta_dtau: 0.0,
            r: 0.0,
            max_viscosity: Field::new(grid, Location::CENTER),
            dtau_v: (0..grid.ndim).map(|a| Field::new(grid, Location::face(a))).collect(),
        }
    }

    /// Recomputes every parameter from the center viscosity.
    ///
    /// `viscosity` ghosts must be current.
    pub fn update(
        &mut self,
        ctx: &ExecutionContext,
        params: &PtParams,
        viscosity: &Field,
    ) -> RheonResult<()> {
        let (vpdtau, length) = wave_scale(ctx, params);
        self.vpdtau = vpdtau;
        self.length = length;
        self.r = params.r;
        self.theta = length * (params.r + 2.0) / (params.reynolds * vpdtau);
        self.eta_dtau = vpdtau * length / params.reynolds;

        let ndim = ctx.grid().ndim;
        let range = self.max_viscosity.interior_range();
        ctx.launch(&range, &mut self.max_viscosity, |p, _| local_max(viscosity, ndim, p));
        BoundaryApplicator::new(ctx.clone()).refresh_scalar(&mut self.max_viscosity)?;

        let eta_dtau = self.eta_dtau;
        let max_viscosity = &self.max_viscosity;
        for (axis, dtau) in self.dtau_v.iter_mut().enumerate() {
            let range = dtau.interior_range();
            ctx.launch(&range, dtau, |p, _| {
                let below = max_viscosity.at(step_down(p, axis));
                eta_dtau / below.max(max_viscosity.at(p))
            });
        }
        Ok(())
    }

    /// Pseudo bulk modulus `K̃ = r η / θ_dτ` at a point of viscosity `eta`.
    #[inline]
    pub fn pseudo_bulk(&self, eta: f64) -> f64 {
        self.r * eta / self.theta
    }
}

/// Maximum of `field` over the `3^ndim` box around center `p`.
fn local_max(field: &Field, ndim: usize, p: Position) -> f64 {
    let span = |axis: usize| if axis < ndim { p[axis] - 1..=p[axis] + 1 } else { p[axis]..=p[axis] };
    let mut best = f64::NEG_INFINITY;
    for k in span(2) {
        for j in span(1) {
            for i in span(0) {
                best = best.max(field.at([i, j, k]));
            }
        }
    }
    best
}

/// Thermal pseudo-time parameters at centers.
#[derive(Debug, Clone)]
pub struct ThermalPseudoSteps {
    pub vpdtau: f64,
    pub length: f64,
    /// Flux damping `θ_r` at centers.
    pub theta_r: Field,
    /// Temperature pseudo-step `dτ_ρ` at centers.
    pub dtau_rho: Field,
}

impl ThermalPseudoSteps {
    pub fn new(grid: &Grid) -> Self {
        Self {
            vpdtau: 0.0,
            length: 0.0,
            theta_r: Field::new(grid, Location::CENTER),
            dtau_rho: Field::new(grid, Location::CENTER),
        }
    }

    /// Recomputes both fields for physical step `dt` (`∞` for steady state).
    ///
    /// Coefficient ghosts must be current; ghosts of `θ_r` are filled
    /// too, since faces average it from the cells on both sides.
    pub fn update(
        &mut self,
        ctx: &ExecutionContext,
        params: &PtParams,
        coeffs: &ThermalCoefficients,
        dt: f64,
    ) -> RheonResult<()> {
        let (vpdtau, length) = wave_scale(ctx, params);
        self.vpdtau = vpdtau;
        self.length = length;
        let reynolds = |p: Position| -> f64 {
            let k = coeffs.conductivity.at(p);
            let rho_cp = coeffs.rho_cp.at(p);
            let ratio = if dt.is_finite() {
                rho_cp * length * length / (k * dt)
            } else {
                0.0
            };
            PI + (PI * PI + ratio).sqrt()
        };
        let range = self.theta_r.full_range();
        ctx.launch(&range, &mut self.theta_r, |p, _| length / (vpdtau * reynolds(p)));
        ctx.launch(&range, &mut self.dtau_rho, |p, _| {
            vpdtau * length / (coeffs.conductivity.at(p) * reynolds(p))
        });
        Ok(())
    }

    /// `θ_r` averaged onto the face normal to `axis` at `p`.
    #[inline]
    pub fn theta_r_face(&self, axis: usize, p: Position) -> f64 {
        center_to_face(&self.theta_r, axis, p)
    }
}
