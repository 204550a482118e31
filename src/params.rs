use crate::error::AssemblyError;
use serde::{Deserialize, Serialize};

/// Scalar inputs of the implicit momentum operator, supplied pre-resolved by
/// the outer configuration layer.
///
/// `alpha_implicit` is the implicit-diffusion coefficient of the time
/// integration scheme: 0 for explicit Euler, 1 for implicit Euler, 0.5 for
/// Crank-Nicolson.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub nu: f64,
    pub dt: f64,
    pub alpha_implicit: f64,
}

impl SimulationParameters {
    pub fn new(nu: f64, dt: f64, alpha_implicit: f64) -> Result<Self, AssemblyError> {
        let params = Self {
            nu,
            dt,
            alpha_implicit,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), AssemblyError> {
        if !self.nu.is_finite() || self.nu <= 0.0 {
            return Err(AssemblyError::InvalidParameter(
                "Viscosity nu must be positive".to_string(),
            ));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(AssemblyError::InvalidParameter(
                "Time step dt must be positive".to_string(),
            ));
        }
        if !self.alpha_implicit.is_finite() || !(0.0..=1.0).contains(&self.alpha_implicit) {
            return Err(AssemblyError::InvalidParameter(
                "Implicit diffusion coefficient alpha must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_parameters() {
        let p = SimulationParameters::new(0.01, 0.005, 0.5).unwrap();
        assert_eq!(p.nu, 0.01);
        assert_eq!(p.dt, 0.005);
        assert_eq!(p.alpha_implicit, 0.5);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(SimulationParameters::new(0.0, 0.1, 0.5).is_err()); // nu
        assert!(SimulationParameters::new(0.01, 0.0, 0.5).is_err()); // dt
        assert!(SimulationParameters::new(0.01, 0.1, 1.5).is_err()); // alpha
        assert!(SimulationParameters::new(0.01, 0.1, -0.1).is_err()); // alpha
        assert!(SimulationParameters::new(f64::NAN, 0.1, 0.5).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let p = SimulationParameters::new(1.0, 0.01, 1.0).unwrap();
        let text = serde_json::to_string(&p).unwrap();
        let back: SimulationParameters = serde_json::from_str(&text).unwrap();
        assert_eq!(p, back);
    }
}
