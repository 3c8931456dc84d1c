//! Phase-mixed rheology and thermal coefficients.
//!
//! The engine evaluates the rheology provider once per phase present
//! at a point, turns the creep response into a visco-elasto-plastic
//! viscosity, mixes the phases by volume fraction and clamps the
//! result to the configured cutoffs.
//!
//! Viscosity lives at cell centers (normal stresses) and on every
//! shear edge. Point state on an edge is the mean of the four cell
//! centers around it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rheon_backend::ExecutionContext;
use rheon_grid::interp::center_to_edge;
use rheon_grid::{shear_pairs, Field, FieldStore, Grid, Location, PhaseRatios, Position};
use rheon_material::{MaterialResponse, PointState, RheologyProvider};
use rheon_types::{PhaseId, RheonError, RheonResult};

use crate::boundary::BoundaryApplicator;
use crate::config::{Averaging, ViscosityCutoffs};

/// Mechanical coefficients used by the Stokes iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StokesCoefficients {
    /// Effective viscosity at centers.
    pub viscosity: Field,
    /// Effective viscosity on shear edges, ordered as [`shear_pairs`].
    pub viscosity_edge: Vec<Field>,
    /// Shear modulus at centers (infinite without elasticity).
    pub shear_modulus: Field,
    /// Shear modulus on shear edges.
    pub shear_modulus_edge: Vec<Field>,
    /// Density at centers.
    pub density: Field,
    evaluated: bool,
}

impl StokesCoefficients {
    pub fn new(grid: &Grid) -> Self {
        let edges = || -> Vec<Field> {
            shear_pairs(grid.ndim)
                .iter()
                .map(|&(a, b)| Field::new(grid, Location::edge(a, b)))
                .collect()
        };
        Self {
            viscosity: Field::new(grid, Location::CENTER),
            viscosity_edge: edges(),
            shear_modulus: Field::new(grid, Location::CENTER),
            shear_modulus_edge: edges(),
            density: Field::new(grid, Location::CENTER),
            evaluated: false,
        }
    }

    /// Forgets the previous viscosity, so the next evaluation is not
    /// relaxed toward it.
    pub fn reset(&mut self) {
        self.evaluated = false;
    }
}

/// Thermal coefficients at cell centers.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalCoefficients {
    /// Conductivity `k` (W/(m·K)).
    pub conductivity: Field,
    /// Volumetric heat capacity `ρ Cp` (J/(m³·K)), latent heat included.
    pub rho_cp: Field,
    /// Radiogenic heat production (W/m³).
    pub radiogenic: Field,
    /// `α ρ` for adiabatic heating (kg/(m³·K)).
    pub alpha_rho: Field,
}

impl ThermalCoefficients {
    pub fn new(grid: &Grid) -> Self {
        Self {
            conductivity: Field::new(grid, Location::CENTER),
            rho_cp: Field::new(grid, Location::CENTER),
            radiogenic: Field::new(grid, Location::CENTER),
            alpha_rho: Field::new(grid, Location::CENTER),
        }
    }
}

/// Mixes `(weight, value)` pairs under `averaging`.
///
/// Weights are expected to sum to one. Zero weights are skipped, so an
/// absent phase with an infinite value (e.g. no elasticity) has no
/// effect on the harmonic or geometric mean.
pub fn mix(averaging: Averaging, terms: impl Iterator<Item = (f64, f64)>) -> f64 {
    let present = terms.filter(|&(w, _)| w > 0.0);
    match averaging {
        Averaging::Arithmetic => present.map(|(w, v)| w * v).sum(),
        Averaging::Harmonic => 1.0 / present.map(|(w, v)| w / v).sum::<f64>(),
        Averaging::Geometric => present.map(|(w, v)| w * v.ln()).sum::<f64>().exp(),
    }
}

/// Visco-elasto-plastic viscosity of one phase.
///
/// When the visco-elastic trial stress `2 η_ve ε̇_eff` exceeds the
/// yield stress, the returned viscosity is the one whose visco-elastic
/// combination puts the stress exactly on the yield surface. The
/// result never exceeds the creep viscosity.
pub fn vep_viscosity(response: &MaterialResponse, state: &PointState) -> f64 {
    let eta_v = response.viscosity;
    if !response.yield_stress.is_finite() {
        return eta_v;
    }
    let elastic = response.shear_modulus * state.dt;
    let (eta_ve, e_eff, inv_elastic) = if elastic.is_finite() {
        (
            1.0 / (1.0 / eta_v + 1.0 / elastic),
            state.strain_rate_ii + state.stress_ii_old / (2.0 * elastic),
            1.0 / elastic,
        )
    } else {
        (eta_v, state.strain_rate_ii, 0.0)
    };
    if !(e_eff > 0.0) || 2.0 * eta_ve * e_eff <= response.yield_stress {
        return eta_v;
    }
    let inv = 2.0 * e_eff / response.yield_stress - inv_elastic;
    if inv > 0.0 {
        (1.0 / inv).min(eta_v)
    } else {
        eta_v
    }
}

/// Evaluates rheology and thermal coefficients over the local grid.
pub struct RheologyEngine {
    ctx: ExecutionContext,
    bc: BoundaryApplicator,
    provider: Arc<dyn RheologyProvider>,
    cutoffs: ViscosityCutoffs,
    averaging: Averaging,
    relaxation: f64,
    strain_ii: Field,
    stress_ii_old: Field,
    pressure: Field,
    temperature: Field,
}

impl RheologyEngine {
    pub fn new(
        ctx: ExecutionContext,
        provider: Arc<dyn RheologyProvider>,
        cutoffs: ViscosityCutoffs,
        averaging: Averaging,
        relaxation: f64,
    ) -> Self {
        let grid = ctx.grid().clone();
        Self {
            bc: BoundaryApplicator::new(ctx.clone()),
            ctx,
            provider,
            cutoffs,
            averaging,
            relaxation,
            strain_ii: Field::new(&grid, Location::CENTER),
            stress_ii_old: Field::new(&grid, Location::CENTER),
            pressure: Field::new(&grid, Location::CENTER),
            temperature: Field::new(&grid, Location::CENTER),
        }
    }

    pub fn provider(&self) -> &dyn RheologyProvider {
        self.provider.as_ref()
    }

    /// Checks that the provider knows every phase in `ratios`.
    pub fn check_phases(&self, ratios: &PhaseRatios) -> RheonResult<()> {
        if ratios.nphases() != self.provider.nphases() {
            return Err(RheonError::InvalidConfig(format!(
                "Field store has {} phases, provider '{}' has {}",
                ratios.nphases(),
                self.provider.name(),
                self.provider.nphases()
            )));
        }
        Ok(())
    }

    /// Copies the point-state inputs from `store` and refreshes their ghosts.
    fn gather_state(&mut self, store: &FieldStore) -> RheonResult<()> {
        let stokes = &store.stokes;
        let range = self.strain_ii.interior_range();
        self.ctx
            .launch(&range, &mut self.strain_ii, |p, _| stokes.strain_rate_ii(p));
        self.ctx
            .launch(&range, &mut self.stress_ii_old, |p, _| stokes.stress_ii_old(p));
        self.ctx.copy(&mut self.pressure, &stokes.pressure)?;
        self.ctx.copy(&mut self.temperature, &store.thermal.temperature)?;
        for f in [
            &mut self.strain_ii,
            &mut self.stress_ii_old,
            &mut self.pressure,
            &mut self.temperature,
        ] {
            self.bc.refresh_scalar(f)?;
        }
        Ok(())
    }

    fn center_state(&self, p: Position, dt: f64) -> PointState {
        PointState {
            strain_rate_ii: self.strain_ii.at(p),
            stress_ii_old: self.stress_ii_old.at(p),
            pressure: self.pressure.at(p),
            temperature: self.temperature.at(p),
            dt,
        }
    }

    fn edge_state(&self, pair: (usize, usize), p: Position, dt: f64) -> PointState {
        PointState {
            strain_rate_ii: center_to_edge(&self.strain_ii, pair, p),
            stress_ii_old: center_to_edge(&self.stress_ii_old, pair, p),
            pressure: center_to_edge(&self.pressure, pair, p),
            temperature: center_to_edge(&self.temperature, pair, p),
            dt,
        }
    }

    /// Mixed, clamped and relaxed viscosity at one point.
    fn viscosity_at(
        &self,
        weights: impl Fn(usize) -> f64,
        state: &PointState,
        previous: f64,
        relax: bool,
        clamped: &AtomicUsize,
    ) -> f64 {
        let provider = self.provider.as_ref();
        let eta = mix(
            self.averaging,
            (0..provider.nphases()).map(|i| {
                let w = weights(i);
                let v = if w > 0.0 {
                    vep_viscosity(&provider.evaluate(PhaseId(i as u16), state), state)
                } else {
                    1.0
                };
                (w, v)
            }),
        );
        let bounded = if eta.is_nan() {
            clamped.fetch_add(1, Ordering::Relaxed);
            self.cutoffs.max
        } else if eta < self.cutoffs.min || eta > self.cutoffs.max {
            clamped.fetch_add(1, Ordering::Relaxed);
            eta.clamp(self.cutoffs.min, self.cutoffs.max)
        } else {
            eta
        };
        if relax && self.relaxation < 1.0 && previous > 0.0 {
            (self.relaxation * bounded.ln() + (1.0 - self.relaxation) * previous.ln()).exp()
        } else {
            bounded
        }
    }

    /// Harmonic mix of the shear modulus at one point.
    fn modulus_at(&self, weights: impl Fn(usize) -> f64, state: &PointState) -> f64 {
        let provider = self.provider.as_ref();
        mix(
            Averaging::Harmonic,
            (0..provider.nphases()).map(|i| {
                let w = weights(i);
                let g = if w > 0.0 {
                    provider.evaluate(PhaseId(i as u16), state).shear_modulus
                } else {
                    f64::INFINITY
                };
                (w, g)
            }),
        )
    }

    /// Arithmetic mix of one response quantity at one point.
    fn mean_at(
        &self,
        weights: impl Fn(usize) -> f64,
        state: &PointState,
        quantity: impl Fn(&MaterialResponse) -> f64,
    ) -> f64 {
        let provider = self.provider.as_ref();
        (0..provider.nphases())
            .map(|i| {
                let w = weights(i);
                if w > 0.0 {
                    w * quantity(&provider.evaluate(PhaseId(i as u16), state))
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Re-evaluates viscosity, shear modulus and density from the
    /// current strain rate, stress history, pressure and temperature.
    ///
    /// Returns the number of points clamped to the viscosity cutoffs.
    pub fn update_stokes(
        &mut self,
        store: &FieldStore,
        dt: f64,
        coeffs: &mut StokesCoefficients,
    ) -> RheonResult<usize> {
        self.check_phases(&store.phases)?;
        self.gather_state(store)?;
        let ratios = &store.phases;
        let ndim = store.grid.ndim;
        let relax = coeffs.evaluated;
        let clamped = AtomicUsize::new(0);
        let this = &*self;

        let range = coeffs.viscosity.interior_range();
        this.ctx.launch(&range, &mut coeffs.viscosity, |p, old| {
            let state = this.center_state(p, dt);
            this.viscosity_at(|i| ratios.at_center(i, p), &state, old, relax, &clamped)
        });
        this.ctx.launch(&range, &mut coeffs.shear_modulus, |p, _| {
            let state = this.center_state(p, dt);
            this.modulus_at(|i| ratios.at_center(i, p), &state)
        });
        this.ctx.launch(&range, &mut coeffs.density, |p, _| {
            let state = this.center_state(p, dt);
            this.mean_at(|i| ratios.at_center(i, p), &state, |r| r.density)
        });

        for (s, &pair) in shear_pairs(ndim).iter().enumerate() {
            let range = coeffs.viscosity_edge[s].interior_range();
            this.ctx.launch(&range, &mut coeffs.viscosity_edge[s], |p, old| {
                let state = this.edge_state(pair, p, dt);
                this.viscosity_at(|i| ratios.at_edge(i, ndim, pair, p), &state, old, relax, &clamped)
            });
            this.ctx.launch(&range, &mut coeffs.shear_modulus_edge[s], |p, _| {
                let state = this.edge_state(pair, p, dt);
                this.modulus_at(|i| ratios.at_edge(i, ndim, pair, p), &state)
            });
        }

        for f in [
            &mut coeffs.viscosity,
            &mut coeffs.shear_modulus,
            &mut coeffs.density,
        ] {
            self.bc.refresh_scalar(f)?;
        }
        coeffs.evaluated = true;
        Ok(clamped.into_inner())
    }

    /// Re-evaluates the thermal coefficients at cell centers.
    ///
    /// With `latent_heat`, the heat capacity becomes
    /// `Cp + L ∂φ/∂T` using the provider's melt fraction.
    pub fn update_thermal(
        &mut self,
        store: &FieldStore,
        latent_heat: bool,
        coeffs: &mut ThermalCoefficients,
    ) -> RheonResult<()> {
        self.check_phases(&store.phases)?;
        self.gather_state(store)?;
        let ratios = &store.phases;
        let this = &*self;
        let range = coeffs.conductivity.interior_range();

        this.ctx.launch(&range, &mut coeffs.conductivity, |p, _| {
            let state = this.center_state(p, f64::INFINITY);
            this.mean_at(|i| ratios.at_center(i, p), &state, |r| r.conductivity)
        });
        this.ctx.launch(&range, &mut coeffs.rho_cp, |p, _| {
            let state = this.center_state(p, f64::INFINITY);
            this.mean_at(|i| ratios.at_center(i, p), &state, |r| {
                let cp = if latent_heat {
                    r.heat_capacity + r.latent_heat * r.melt_fraction_dt
                } else {
                    r.heat_capacity
                };
                r.density * cp
            })
        });
        this.ctx.launch(&range, &mut coeffs.radiogenic, |p, _| {
            let state = this.center_state(p, f64::INFINITY);
            this.mean_at(|i| ratios.at_center(i, p), &state, |r| r.radiogenic_heat)
        });
        this.ctx.launch(&range, &mut coeffs.alpha_rho, |p, _| {
            let state = this.center_state(p, f64::INFINITY);
            this.mean_at(|i| ratios.at_center(i, p), &state, |r| r.expansivity * r.density)
        });

        for f in [
            &mut coeffs.conductivity,
            &mut coeffs.rho_cp,
            &mut coeffs.radiogenic,
            &mut coeffs.alpha_rho,
        ] {
            self.bc.refresh_scalar(f)?;
        }
        Ok(())
    }
}
