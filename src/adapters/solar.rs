use crate::domain::ports::{Coordinates, SolarCalculator, SunTimes};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sunrise::{SolarDay, SolarEvent};

/// 以 `sunrise` crate 計算日出日落（UTC）
#[derive(Debug, Clone, Copy, Default)]
pub struct SunriseCalculator;

impl SunriseCalculator {
    pub fn new() -> Self {
        Self
    }
}

fn error_for(date: NaiveDate, reason: &str) -> EtlError {
    EtlError::SolarCalculationError {
        date: date.to_string(),
        reason: reason.to_string(),
    }
}

impl SolarCalculator for SunriseCalculator {
    fn sun_times(&self, coordinates: Coordinates, date: NaiveDate) -> Result<SunTimes> {
        let location = sunrise::Coordinates::new(coordinates.latitude, coordinates.longitude)
            .ok_or_else(|| {
                error_for(
                    date,
                    &format!(
                        "invalid coordinates ({}, {})",
                        coordinates.latitude, coordinates.longitude
                    ),
                )
            })?;

        let day = SolarDay::new(location, date);
        let sunrise = day.event_time(SolarEvent::Sunrise);
        let sunset = day.event_time(SolarEvent::Sunset);

        // 極晝、極夜時函式庫會回傳無意義的時間（通常是 epoch）
        let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let plausible = |t: DateTime<Utc>| {
            t > midnight - Duration::days(1) && t < midnight + Duration::days(2)
        };
        if !plausible(sunrise) || !plausible(sunset) || sunrise == sunset {
            return Err(error_for(
                date,
                "the sun never rises or never sets on this date at this location",
            ));
        }

        Ok(SunTimes { sunrise, sunset })
    }
}
