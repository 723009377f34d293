//! Pacejka magic-formula tire model with combined-slip correction.
//!
//! Pure-slip longitudinal/lateral forces and the aligning moment come from
//! three independent magic-formula curves parameterized by the normalized
//! load delta `dFz = (Fz - Fz0) / Fz0`. Simultaneous braking and cornering
//! is handled by the combined-slip weighting factors `Gx`/`Gy` and the
//! lateral offset `Svy`. All angles are radians, loads are newtons.

use rapier3d::math::Real;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Entries of the ideal-slip lookup table.
const SLIP_TABLE_SIZE: usize = 20;

/// Reference tire radius of the aligning-torque terms, m.
const R0: Real = 0.3;

#[inline]
fn sgn(v: Real) -> Real {
    if v < 0.0 { -1.0 } else { 1.0 }
}

/// Contact force and aligning torque returned by [`Tire::get_force`].
/// `fx` is positive under traction, `fy` opposes lateral slip.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TireForce {
    pub fx: Real,
    pub fy: Real,
    pub mz: Real,
}

impl TireForce {
    pub const ZERO: Self = Self {
        fx: 0.0,
        fy: 0.0,
        mz: 0.0,
    };
}

/// Dimensionless magic-formula coefficients, MF5.2 naming.
///
/// `p*` rows drive the pure-slip curves (x longitudinal, y lateral),
/// `q*` rows the aligning moment, `r*` rows the combined-slip weighting.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TireCoefficients {
    pub pcx1: Real,
    pub pdx1: Real,
    pub pdx2: Real,
    pub pex1: Real,
    pub pex2: Real,
    pub pex3: Real,
    pub pex4: Real,
    pub pkx1: Real,
    pub pkx2: Real,
    pub pkx3: Real,
    pub phx1: Real,
    pub phx2: Real,
    pub pvx1: Real,
    pub pvx2: Real,

    pub pcy1: Real,
    pub pdy1: Real,
    pub pdy2: Real,
    pub pdy3: Real,
    pub pey1: Real,
    pub pey2: Real,
    pub pey3: Real,
    pub pey4: Real,
    pub pky1: Real,
    pub pky2: Real,
    pub pky3: Real,
    pub phy1: Real,
    pub phy2: Real,
    pub phy3: Real,
    pub pvy1: Real,
    pub pvy2: Real,
    pub pvy3: Real,
    pub pvy4: Real,

    pub qbz1: Real,
    pub qbz2: Real,
    pub qbz3: Real,
    pub qbz4: Real,
    pub qbz5: Real,
    pub qbz9: Real,
    pub qbz10: Real,
    pub qcz1: Real,
    pub qdz1: Real,
    pub qdz2: Real,
    pub qdz3: Real,
    pub qdz4: Real,
    pub qdz6: Real,
    pub qdz7: Real,
    pub qdz8: Real,
    pub qdz9: Real,
    pub qez1: Real,
    pub qez2: Real,
    pub qez3: Real,
    pub qez4: Real,
    pub qez5: Real,
    pub qhz1: Real,
    pub qhz2: Real,
    pub qhz3: Real,
    pub qhz4: Real,

    pub rbx1: Real,
    pub rbx2: Real,
    pub rcx1: Real,
    pub rhx1: Real,
    pub rby1: Real,
    pub rby2: Real,
    pub rby3: Real,
    pub rcy1: Real,
    pub rhy1: Real,
    pub rvy1: Real,
    pub rvy2: Real,
    pub rvy3: Real,
    pub rvy4: Real,
    pub rvy5: Real,
    pub rvy6: Real,
}

impl Default for TireCoefficients {
    /// A generic sport road tire.
    fn default() -> Self {
        Self {
            pcx1: 1.65,
            pdx1: 1.2,
            pdx2: -0.08,
            pex1: -0.5,
            pex2: -0.1,
            pex3: 0.0,
            pex4: 0.0,
            pkx1: 22.0,
            pkx2: -0.1,
            pkx3: 0.3,
            phx1: 0.0,
            phx2: 0.0,
            pvx1: 0.0,
            pvx2: 0.0,

            pcy1: 1.3,
            pdy1: 1.1,
            pdy2: -0.15,
            pdy3: 1.5,
            pey1: -0.8,
            pey2: -0.6,
            pey3: 0.1,
            pey4: 0.0,
            pky1: 15.0,
            pky2: 2.0,
            pky3: 0.3,
            phy1: 0.0,
            phy2: 0.0,
            phy3: 0.02,
            pvy1: 0.0,
            pvy2: 0.0,
            pvy3: -0.2,
            pvy4: 0.0,

            qbz1: 8.0,
            qbz2: -1.0,
            qbz3: 0.0,
            qbz4: 0.0,
            qbz5: -0.25,
            qbz9: 10.0,
            qbz10: 0.0,
            qcz1: 1.1,
            qdz1: 0.09,
            qdz2: -0.005,
            qdz3: 0.3,
            qdz4: 0.0,
            qdz6: 0.0017,
            qdz7: 0.0,
            qdz8: -0.05,
            qdz9: 0.0,
            qez1: -1.5,
            qez2: 0.0,
            qez3: 0.0,
            qez4: 0.2,
            qez5: 0.0,
            qhz1: 0.003,
            qhz2: 0.0,
            qhz3: 0.07,
            qhz4: 0.0,

            rbx1: 12.0,
            rbx2: 10.0,
            rcx1: 1.0,
            rhx1: 0.0,
            rby1: 7.0,
            rby2: 8.0,
            rby3: 0.0,
            rcy1: 1.0,
            rhy1: 0.0,
            rvy1: 0.05,
            rvy2: 0.0,
            rvy3: 0.0,
            rvy4: 12.0,
            rvy5: 1.9,
            rvy6: -10.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TireInfo {
    pub coefficients: TireCoefficients,
    /// Nominal load Fz0 in N.
    pub nominal_load: Real,
    /// Maximum load in N; higher loads are clamped.
    pub max_load: Real,
    /// Maximum camber in rad; larger inclinations are clamped.
    pub max_camber: Real,
    /// Linear rolling resistance coefficient on a hard surface.
    pub roll_resistance_lin: Real,
    /// Quadratic (velocity squared) rolling resistance coefficient.
    pub roll_resistance_quad: Real,
    /// 1.0 is a pure off-road tire, 0.0 a pure road tire.
    pub tread: Real,
}

impl Default for TireInfo {
    fn default() -> Self {
        Self {
            coefficients: TireCoefficients::default(),
            nominal_load: 4000.0,
            max_load: 10000.0,
            max_camber: 0.26,
            roll_resistance_lin: 1.3e-2,
            roll_resistance_quad: 6.5e-6,
            tread: 0.0,
        }
    }
}

/// The tire force model. Holds the coefficient set, the precomputed
/// ideal-slip lookup table and per-call telemetry which is overwritten by
/// every [`get_force`](Tire::get_force) call.
#[derive(Clone, Debug)]
pub struct Tire {
    info: TireInfo,
    sigma_hat: [Real; SLIP_TABLE_SIZE],
    alpha_hat: [Real; SLIP_TABLE_SIZE],

    // diagnostic state, read-only outside get_force
    camber: Real,
    slide: Real,
    slip_angle: Real,
    ideal_slide: Real,
    ideal_slip_angle: Real,
    fx: Real,
    fy: Real,
    fz: Real,
    mz: Real,
    vx: Real,
    vy: Real,
}

impl Tire {
    pub fn new(info: &TireInfo) -> Self {
        let mut tire = Self {
            info: *info,
            sigma_hat: [0.0; SLIP_TABLE_SIZE],
            alpha_hat: [0.0; SLIP_TABLE_SIZE],
            camber: 0.0,
            slide: 0.0,
            slip_angle: 0.0,
            ideal_slide: 1.0,
            ideal_slip_angle: 1.0,
            fx: 0.0,
            fy: 0.0,
            fz: 0.0,
            mz: 0.0,
            vx: 0.0,
            vy: 0.0,
        };
        tire.init_slip_tables();
        tire
    }

    pub fn tread(&self) -> Real {
        self.info.tread
    }

    /// Contact force from the current contact state.
    ///
    /// * `normal_load` - tire load in N
    /// * `friction_coeff` - contact surface friction coefficient
    /// * `camber` - wheel inclination against the surface in rad
    /// * `rot_velocity` - rim surface velocity (omega * r) in m/s
    /// * `lon_velocity` - longitudinal contact velocity relative to the surface
    /// * `lat_velocity` - lateral contact velocity relative to the surface
    pub fn get_force(
        &mut self,
        normal_load: Real,
        friction_coeff: Real,
        camber: Real,
        rot_velocity: Real,
        lon_velocity: Real,
        lat_velocity: Real,
    ) -> TireForce {
        if normal_load * friction_coeff < 1e-6 {
            // unloaded tire, keep every output at a harmless neutral value
            self.slide = 0.0;
            self.slip_angle = 0.0;
            self.ideal_slide = 1.0;
            self.ideal_slip_angle = 1.0;
            self.fx = 0.0;
            self.fy = 0.0;
            self.fz = 0.0;
            self.mz = 0.0;
            self.vx = 0.0;
            self.vy = 0.0;
            return TireForce::ZERO;
        }

        let fz = normal_load.clamp(0.0, self.info.max_load);
        let gamma = camber.clamp(-self.info.max_camber, self.info.max_camber);

        let denom = lon_velocity.abs().max(1e-3);
        let lon_contact_velocity = rot_velocity - lon_velocity;
        let sigma = lon_contact_velocity / denom;
        // lateral force has to oppose the lateral contact velocity
        let alpha = -(lat_velocity / denom).atan();

        let fz0 = self.info.nominal_load;
        let dfz = (fz - fz0) / fz0;

        // pure slip
        let fx0 = self.pacejka_fx(sigma, fz, dfz, friction_coeff);
        let (fy0, dy, bcy, shf) = self.pacejka_fy(alpha, gamma, fz, dfz, friction_coeff);
        let mz0 = self.pacejka_mz(alpha, gamma, fz, dfz, friction_coeff, fy0, bcy, shf);

        // combined slip
        let gx = self.pacejka_gx(sigma, alpha);
        let gy = self.pacejka_gy(sigma, alpha);
        let svy = self.pacejka_svy(sigma, alpha, gamma, dfz, dy);
        let fx = gx * fx0;
        let fy = gy * fy0 + svy;

        let (sigma_hat, alpha_hat) = self.ideal_slip(fz);

        self.camber = gamma;
        self.slide = sigma;
        self.slip_angle = alpha;
        self.ideal_slide = sigma_hat;
        self.ideal_slip_angle = alpha_hat;
        self.fx = fx;
        self.fy = fy;
        self.fz = fz;
        self.mz = mz0;
        self.vx = lon_contact_velocity;
        self.vy = lat_velocity;

        TireForce { fx, fy, mz: mz0 }
    }

    /// Rolling resistance coefficient at the given rolling velocity;
    /// `resistance_factor` is the surface contribution.
    pub fn rolling_resistance(&self, velocity: Real, resistance_factor: Real) -> Real {
        // tire deformation heating grows roughly with velocity squared
        self.info.roll_resistance_lin * resistance_factor
            + self.info.roll_resistance_quad * velocity * velocity
    }

    /// Peak longitudinal force at the given load, friction coefficient 1.
    pub fn max_fx(&self, load: Real) -> Real {
        let p = &self.info.coefficients;
        let fz = load;
        let dfz = (fz - self.info.nominal_load) / self.info.nominal_load;
        let d = fz * (p.pdx1 + p.pdx2 * dfz);
        let sv = fz * (p.pvx1 + p.pvx2 * dfz);
        d + sv
    }

    /// Peak lateral force at the given load and camber (rad).
    pub fn max_fy(&self, load: Real, camber: Real) -> Real {
        let p = &self.info.coefficients;
        let fz = load;
        let dfz = (fz - self.info.nominal_load) / self.info.nominal_load;
        let gamma = camber;
        let d = fz * (p.pdy1 + p.pdy2 * dfz) * (1.0 - p.pdy3 * gamma * gamma);
        let sv = fz * (p.pvy1 + p.pvy2 * dfz + (p.pvy3 + p.pvy4 * dfz) * gamma);
        d + sv
    }

    /// Peak aligning torque at the given load and camber (rad).
    pub fn max_mz(&self, load: Real, camber: Real) -> Real {
        let p = &self.info.coefficients;
        let fz = load;
        let dfz = (fz - self.info.nominal_load) / self.info.nominal_load;
        let gamma = camber;
        fz * (p.qdz6 + p.qdz7 * dfz + (p.qdz8 + p.qdz9 * dfz) * gamma) * R0
    }

    /// Squeal intensity in [0, 1], ramping from 80% to 160% of the ideal
    /// slide/slip.
    pub fn squeal(&self) -> Real {
        let mut squeal = 0.0;
        if self.vx * self.vx > 1e-2 && self.slide * self.slide > 1e-6 {
            let vx_body = self.vx / self.slide;
            let vx_ideal = self.ideal_slide * vx_body;
            let vy_ideal = (-self.ideal_slip_angle).tan() * vx_body;
            let vx_squeal = (self.vx / vx_ideal).abs();
            let vy_squeal = (self.vy / vy_ideal).abs();
            squeal = (1.25 * vx_squeal.max(vy_squeal) - 1.0).clamp(0.0, 1.0);
        }
        squeal
    }

    /// Camber fed to the last `get_force` call, rad.
    pub fn camber(&self) -> Real {
        self.camber
    }

    /// Longitudinal slip ratio of the last `get_force` call.
    pub fn slide(&self) -> Real {
        self.slide
    }

    /// Slip angle of the last `get_force` call, rad.
    pub fn slip_angle(&self) -> Real {
        self.slip_angle
    }

    /// Slip ratio of peak longitudinal force at the last load.
    pub fn ideal_slide(&self) -> Real {
        self.ideal_slide
    }

    /// Slip angle of peak lateral force at the last load, rad.
    pub fn ideal_slip_angle(&self) -> Real {
        self.ideal_slip_angle
    }

    /// Load of the last `get_force` call, N.
    pub fn contact_load(&self) -> Real {
        self.fz
    }

    pub fn lon_force(&self) -> Real {
        self.fx
    }

    pub fn lat_force(&self) -> Real {
        self.fy
    }

    /// Aligning torque of the last `get_force` call, Nm.
    pub fn aligning_torque(&self) -> Real {
        self.mz
    }

    /// Ideal slip ratio and slip angle at the given load, linearly
    /// interpolated from the lookup table.
    fn ideal_slip(&self, load: Real) -> (Real, Real) {
        let size = SLIP_TABLE_SIZE;
        let rload = (load / self.info.max_load * size as Real - 1.0)
            .clamp(0.0, (size - 1) as Real);
        let lbound = (rload as usize).min(size - 2);
        let blend = rload - lbound as Real;
        let sh = self.sigma_hat[lbound] * (1.0 - blend) + self.sigma_hat[lbound + 1] * blend;
        let ah = self.alpha_hat[lbound] * (1.0 - blend) + self.alpha_hat[lbound + 1] * blend;
        (sh, ah)
    }

    /// Brute-force peak search over the pure-slip curves at the given load.
    fn find_ideal_slip(&self, load: Real, iterations: usize) -> (Real, Real) {
        let fz = load;
        let dfz = (fz - self.info.nominal_load) / self.info.nominal_load;

        let mut fx_max = 0.0;
        let mut sigma_hat = 0.0;
        let smax = 1.0;
        let ds = smax / iterations as Real;
        let mut s = ds;
        while s < smax {
            let fx = self.pacejka_fx(s, fz, dfz, 1.0);
            if fx > fx_max {
                sigma_hat = s;
                fx_max = fx;
            } else if fx < fx_max && fx_max > 0.0 {
                break;
            }
            s += ds;
        }
        debug_assert!(fx_max > 0.0);

        let mut fy_max = 0.0;
        let mut alpha_hat = 0.0;
        let amax = 40.0 * (PI / 180.0);
        let da = amax / iterations as Real;
        let mut a = da;
        while a < amax {
            let (fy, _, _, _) = self.pacejka_fy(a, 0.0, fz, dfz, 1.0);
            if fy > fy_max {
                alpha_hat = a;
                fy_max = fy;
            } else if fy < fy_max && fy_max > 0.0 {
                break;
            }
            a += da;
        }
        debug_assert!(fy_max > 0.0);

        (sigma_hat, alpha_hat)
    }

    fn init_slip_tables(&mut self) {
        let delta = self.info.max_load / SLIP_TABLE_SIZE as Real;
        for i in 0..SLIP_TABLE_SIZE {
            let load = (i + 1) as Real * delta;
            let (sh, ah) = self.find_ideal_slip(load, 200);
            self.sigma_hat[i] = sh;
            self.alpha_hat[i] = ah;
        }
    }

    fn pacejka_fx(&self, sigma: Real, fz: Real, dfz: Real, friction_coeff: Real) -> Real {
        let p = &self.info.coefficients;

        // vertical shift
        let sv = fz * (p.pvx1 + p.pvx2 * dfz);

        // horizontal shift
        let sh = p.phx1 + p.phx2 * dfz;

        // composite slip
        let s = sigma + sh;

        // slope at origin
        let k = fz * (p.pkx1 + p.pkx2 * dfz) * (-p.pkx3 * dfz).exp();

        // curvature factor
        let e = (p.pex1 + p.pex2 * dfz + p.pex3 * dfz * dfz) * (1.0 - p.pex4 * sgn(s));

        // peak factor
        let d = fz * (p.pdx1 + p.pdx2 * dfz);

        // shape factor
        let c = p.pcx1;

        // stiffness factor
        let b = k / (c * d);

        let f = d * (c * (b * s - e * (b * s - (b * s).atan())).atan()).sin() + sv;
        f * friction_coeff
    }

    /// Returns (Fy, Dy, B*C, Shf); the extra terms feed the aligning torque.
    fn pacejka_fy(
        &self,
        alpha: Real,
        gamma: Real,
        fz: Real,
        dfz: Real,
        friction_coeff: Real,
    ) -> (Real, Real, Real, Real) {
        let p = &self.info.coefficients;
        let fz0 = self.info.nominal_load;

        // vertical shift
        let sv = fz * (p.pvy1 + p.pvy2 * dfz + (p.pvy3 + p.pvy4 * dfz) * gamma);

        // horizontal shift
        let sh = p.phy1 + p.phy2 * dfz + p.phy3 * gamma;

        // composite slip angle
        let a = alpha + sh;

        // slope at origin
        let k = p.pky1 * fz0 * (2.0 * (fz / (p.pky2 * fz0)).atan()).sin()
            * (1.0 - p.pky3 * gamma.abs());

        // curvature factor
        let e = (p.pey1 + p.pey2 * dfz) * (1.0 - (p.pey3 + p.pey4 * gamma) * sgn(a));

        // peak factor
        let d = fz * (p.pdy1 + p.pdy2 * dfz) * (1.0 - p.pdy3 * gamma * gamma);

        // shape factor
        let c = p.pcy1;

        // stiffness factor
        let b = k / (c * d);

        let f = d * (c * (b * a - e * (b * a - (b * a).atan())).atan()).sin() + sv;

        (f * friction_coeff, d, b * c, sh + sv / k)
    }

    #[allow(clippy::too_many_arguments)]
    fn pacejka_mz(
        &self,
        alpha: Real,
        gamma: Real,
        fz: Real,
        dfz: Real,
        friction_coeff: Real,
        fy: Real,
        bcy: Real,
        shf: Real,
    ) -> Real {
        let p = &self.info.coefficients;
        let fz0 = self.info.nominal_load;
        let yz = gamma;
        let cos_alpha = alpha.cos();

        let sht = p.qhz1 + p.qhz2 * dfz + (p.qhz3 + p.qhz4 * dfz) * yz;
        let at = alpha + sht;

        let bt = (p.qbz1 + p.qbz2 * dfz + p.qbz3 * dfz * dfz)
            * (1.0 + p.qbz4 * yz + p.qbz5 * yz.abs());
        let ct = p.qcz1;
        let dt = fz * (p.qdz1 + p.qdz2 * dfz) * (1.0 + p.qdz3 * yz + p.qdz4 * yz * yz)
            * (R0 / fz0);
        let et = (p.qez1 + p.qez2 * dfz + p.qez3 * dfz * dfz)
            * (1.0 + (p.qez4 + p.qez5 * yz) * (bt * ct * at).atan());

        // pneumatic trail contribution
        let mzt = -fy
            * dt
            * (ct * (bt * at - et * (bt * at - (bt * at).atan())).atan()).cos()
            * cos_alpha;

        // residual torque
        let ar = alpha + shf;
        let br = p.qbz10 * bcy;
        let dr = fz * (p.qdz6 + p.qdz7 * dfz + (p.qdz8 + p.qdz9 * dfz) * yz) * R0;
        let mzr = dr * (br * ar).atan().cos() * cos_alpha * friction_coeff;

        mzt + mzr
    }

    /// Combined-slip longitudinal weighting factor.
    fn pacejka_gx(&self, sigma: Real, alpha: Real) -> Real {
        let p = &self.info.coefficients;
        let b = p.rbx1 * (p.rbx2 * sigma).atan().cos();
        let c = p.rcx1;
        let sh = p.rhx1;
        let s = alpha + sh;
        let g0 = (c * (b * sh).atan()).cos();
        (c * (b * s).atan()).cos() / g0
    }

    /// Combined-slip lateral weighting factor.
    fn pacejka_gy(&self, sigma: Real, alpha: Real) -> Real {
        let p = &self.info.coefficients;
        let b = p.rby1 * (p.rby2 * (alpha - p.rby3)).atan().cos();
        let c = p.rcy1;
        let sh = p.rhy1;
        let s = sigma + sh;
        let g0 = (c * (b * sh).atan()).cos();
        (c * (b * s).atan()).cos() / g0
    }

    /// Combined-slip lateral force offset.
    fn pacejka_svy(&self, sigma: Real, alpha: Real, gamma: Real, dfz: Real, dy: Real) -> Real {
        let p = &self.info.coefficients;
        let dv = dy
            * (p.rvy1 + p.rvy2 * dfz + p.rvy3 * gamma)
            * (p.rvy4 * alpha).atan().cos();
        dv * (p.rvy5 * (p.rvy6 * sigma).atan()).sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tire() -> Tire {
        Tire::new(&TireInfo::default())
    }

    #[test]
    fn peak_force_increases_with_load() {
        let tire = tire();
        let mut prev = 0.0;
        for load in [2000.0, 3500.0, 5000.0, 6500.0, 8000.0] {
            let fx = tire.max_fx(load);
            assert!(fx > prev, "max_fx({load}) = {fx} not increasing");
            prev = fx;
        }
    }

    #[test]
    fn zero_load_returns_zero_and_neutral_telemetry() {
        let mut tire = tire();
        let force = tire.get_force(0.0, 1.0, 0.0, 10.0, 8.0, 1.0);
        assert_eq!(force, TireForce::ZERO);
        assert_eq!(tire.slide(), 0.0);
        assert_eq!(tire.slip_angle(), 0.0);
        assert_eq!(tire.ideal_slide(), 1.0);
        assert_eq!(tire.ideal_slip_angle(), 1.0);
    }

    #[test]
    fn camber_sign_leaves_fx_alone_and_steers_fy() {
        let mut tire = tire();
        let pos = tire.get_force(4000.0, 1.0, 0.1, 10.0, 10.0, 1.5);
        let neg = tire.get_force(4000.0, 1.0, -0.1, 10.0, 10.0, 1.5);
        assert!((pos.fx - neg.fx).abs() < 1e-3 * pos.fx.abs().max(1.0));
        // positive camber adds thrust toward the tilt (here: more negative fy)
        assert!(pos.fy < neg.fy, "fy(+c) = {}, fy(-c) = {}", pos.fy, neg.fy);
    }

    #[test]
    fn lateral_force_opposes_lateral_velocity() {
        let mut tire = tire();
        let slide_right = tire.get_force(4000.0, 1.0, 0.0, 20.0, 20.0, 3.0);
        assert!(slide_right.fy < 0.0);
        let slide_left = tire.get_force(4000.0, 1.0, 0.0, 20.0, 20.0, -3.0);
        assert!(slide_left.fy > 0.0);
    }

    #[test]
    fn traction_slip_produces_forward_force() {
        let mut tire = tire();
        // rim faster than ground: traction
        let force = tire.get_force(4000.0, 1.0, 0.0, 12.0, 10.0, 0.0);
        assert!(force.fx > 0.0);
        assert!(tire.slide() > 0.0);
        // rim slower than ground: braking
        let force = tire.get_force(4000.0, 1.0, 0.0, 8.0, 10.0, 0.0);
        assert!(force.fx < 0.0);
        assert!(tire.slide() < 0.0);
    }

    #[test]
    fn combined_slip_trims_lateral_grip() {
        let mut tire = tire();
        let pure = tire.get_force(4000.0, 1.0, 0.0, 10.0, 10.0, 2.0);
        // same cornering state with heavy braking slip on top
        let combined = tire.get_force(4000.0, 1.0, 0.0, 4.0, 10.0, 2.0);
        assert!(combined.fy.abs() < pure.fy.abs());
    }

    #[test]
    fn ideal_slip_tables_are_sane() {
        let tire = tire();
        for i in 0..tire.sigma_hat.len() {
            assert!(tire.sigma_hat[i] > 0.0 && tire.sigma_hat[i] < 1.0);
            assert!(tire.alpha_hat[i] > 0.0 && tire.alpha_hat[i] < 0.7);
        }
    }

    #[test]
    fn squeal_stays_in_unit_range() {
        let mut tire = tire();
        for &(rot, lon, lat) in &[
            (10.0, 10.0, 0.0),
            (20.0, 10.0, 0.0),
            (2.0, 10.0, 0.0),
            (10.0, 10.0, 6.0),
        ] {
            tire.get_force(4000.0, 1.0, 0.0, rot, lon, lat);
            let squeal = tire.squeal();
            assert!((0.0..=1.0).contains(&squeal), "squeal = {squeal}");
        }
    }
}
