//! Air quality assessment for ENS160 readings
//!
//! Maps the sensor's UBA air quality index onto named levels used by the
//! console line and the OLED panel.

/// Quality level assessment for an air quality index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQualityLevel {
    /// UBA 1
    Excellent,
    /// UBA 2
    Good,
    /// UBA 3
    Moderate,
    /// UBA 4
    Poor,
    /// UBA 5
    Unhealthy,
}

impl AirQualityLevel {
    /// Assess the level for a UBA index
    ///
    /// The ENS160 only produces 1..=5; anything else means the reading is not
    /// usable and yields `None`.
    pub const fn from_aqi(aqi: u8) -> Option<Self> {
        match aqi {
            1 => Some(Self::Excellent),
            2 => Some(Self::Good),
            3 => Some(Self::Moderate),
            4 => Some(Self::Poor),
            5 => Some(Self::Unhealthy),
            _ => None,
        }
    }

    /// Get the display label for this quality level
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::Unhealthy => "Unhealthy",
        }
    }

    /// Whether ventilation is advisable at this level
    pub const fn needs_ventilation(self) -> bool {
        matches!(self, Self::Poor | Self::Unhealthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_follow_index() {
        assert_eq!(AirQualityLevel::from_aqi(1), Some(AirQualityLevel::Excellent));
        assert_eq!(AirQualityLevel::from_aqi(3), Some(AirQualityLevel::Moderate));
        assert_eq!(AirQualityLevel::from_aqi(5), Some(AirQualityLevel::Unhealthy));
        assert_eq!(AirQualityLevel::from_aqi(0), None);
        assert_eq!(AirQualityLevel::from_aqi(6), None);
    }

    #[test]
    fn test_ventilation_threshold() {
        assert!(!AirQualityLevel::Moderate.needs_ventilation());
        assert!(AirQualityLevel::Poor.needs_ventilation());
        assert_eq!(AirQualityLevel::Unhealthy.label(), "Unhealthy");
    }
}
