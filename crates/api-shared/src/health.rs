use crate::dto::HealthRes;

/// Simple health service shared by every API surface.
///
/// Provides a standardised way to report liveness of the Convia system.
/// It can be used both as a static utility and as an instantiated service.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance.
    ///
    /// This is the preferred method for health checks as it doesn't require
    /// instantiating the service.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Convia is alive".into(),
        }
    }

    /// Instance method for compatibility.
    pub fn check_health_instance(&self) -> HealthRes {
        Self::check_health()
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
