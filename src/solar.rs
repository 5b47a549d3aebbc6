//! Sunrise and sunset from the NOAA sunrise equation.
//!
//! Accuracy is about a minute at mid latitudes, which is plenty for deciding whether a
//! segment is ridden in the dark.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Julian date of 1970-01-01T00:00:00Z.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
/// Julian date of the J2000 epoch.
const J2000: f64 = 2_451_545.0;
/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
/// Solar altitude at sunrise/sunset: refraction plus solar disc radius.
const HORIZON_DEG: f64 = -0.833;
/// Earth's axial tilt.
const OBLIQUITY_DEG: f64 = 23.4397;

/// Sun events for one day at one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SunTimes {
    Normal {
        sunrise: DateTime<Utc>,
        sunset: DateTime<Utc>,
    },
    /// The sun never sets
    PolarDay,
    /// The sun never rises
    PolarNight,
}

fn julian_to_utc(jd: f64) -> DateTime<Utc> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round() as i64;
    DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(millis)
}

/// Sunrise and sunset on `date` (UTC calendar date) at the given position.
///
/// Longitudes are east-positive.
pub fn sun_times(date: NaiveDate, latitude: f64, longitude: f64) -> SunTimes {
    let days_since_epoch = (date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE) as f64;
    let jd_midnight = days_since_epoch + UNIX_EPOCH_JD;

    let n = (jd_midnight - J2000 + 0.0008).ceil();
    let mean_solar_noon = n - longitude / 360.0;

    let anomaly = (357.5291 + 0.985_600_28 * mean_solar_noon).rem_euclid(360.0);
    let m = anomaly.to_radians();
    let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
    let ecliptic_longitude = (anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic_longitude.to_radians();

    let transit = J2000 + mean_solar_noon + 0.0053 * m.sin() - 0.0069 * (2.0 * lambda).sin();

    let sin_decl = lambda.sin() * OBLIQUITY_DEG.to_radians().sin();
    let cos_decl = (1.0 - sin_decl * sin_decl).sqrt();
    let phi = latitude.to_radians();

    let cos_hour_angle =
        (HORIZON_DEG.to_radians().sin() - phi.sin() * sin_decl) / (phi.cos() * cos_decl);

    if cos_hour_angle < -1.0 {
        return SunTimes::PolarDay;
    }
    if cos_hour_angle > 1.0 {
        return SunTimes::PolarNight;
    }

    let hour_angle_deg = cos_hour_angle.acos().to_degrees();
    SunTimes::Normal {
        sunrise: julian_to_utc(transit - hour_angle_deg / 360.0),
        sunset: julian_to_utc(transit + hour_angle_deg / 360.0),
    }
}

/// True if `at` falls before local sunrise or after local sunset.
///
/// The day is chosen by local mean solar time so that e.g. 23:00 UTC in New Zealand
/// is compared against the following day's sun.
pub fn is_nighttime(at: DateTime<Utc>, latitude: f64, longitude: f64) -> bool {
    let solar_offset = Duration::seconds((longitude / 15.0 * 3600.0).round() as i64);
    let local_date = (at + solar_offset).date_naive();

    match sun_times(local_date, latitude, longitude) {
        SunTimes::Normal { sunrise, sunset } => at < sunrise || at > sunset,
        SunTimes::PolarDay => false,
        SunTimes::PolarNight => true,
    }
}
