//! Presentation values derived from a [`WeatherSnapshot`].

use chrono::{DateTime, Utc};

use crate::model::WeatherSnapshot;

pub const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Icon for the primary condition, if the snapshot carries one.
pub fn icon_url(snapshot: &WeatherSnapshot) -> Option<String> {
    snapshot
        .primary_condition()
        .map(|c| c.icon.as_str())
        .filter(|icon| !icon.is_empty())
        .map(|icon| format!("{ICON_BASE_URL}/{icon}@2x.png"))
}

/// Local clock time at the observed location, shown as `HH:MM UTC`.
///
/// `unix + tz_offset` is formatted as a UTC time, so the digits are the
/// location's wall-clock time.
pub fn clock_time(unix: i64, tz_offset: i64) -> String {
    unix.checked_add(tz_offset)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| format!("{} UTC", dt.format("%H:%M")))
        .unwrap_or_else(|| "--:-- UTC".to_string())
}

/// Rounds to the nearest integer, halves toward positive infinity.
pub fn round_half_up(value: f64) -> i64 {
    // `value - floor` is exact, unlike `value + 0.5`.
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i64
}

/// "Feels like" estimate: midpoint of the day's min and max.
pub fn feels_like(temp_min: f64, temp_max: f64) -> i64 {
    round_half_up((temp_min + temp_max) / 2.0)
}

/// Everything the done view shows, already formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherCard {
    pub title: String,
    pub observed_at: Option<DateTime<Utc>>,
    pub icon_url: Option<String>,
    pub summary: String,
    pub temperature: i64,
    pub feels_like: i64,
    pub min_max: String,
    pub humidity: String,
    pub pressure: String,
    pub wind: String,
    pub clouds: String,
    pub sunrise: String,
    pub sunset: String,
}

impl WeatherCard {
    pub fn from_snapshot(snapshot: &WeatherSnapshot) -> Self {
        let main = &snapshot.main;

        let title = match snapshot.sys.country.as_deref() {
            Some(country) if !country.is_empty() => format!("{}, {country}", snapshot.name),
            _ => snapshot.name.clone(),
        };

        let summary = snapshot
            .primary_condition()
            .map(|c| if c.description.is_empty() { c.main.clone() } else { c.description.clone() })
            .unwrap_or_default();

        let wind = snapshot.wind.as_ref().and_then(|w| w.speed).unwrap_or(0.0);
        let clouds = snapshot.clouds.as_ref().and_then(|c| c.all).unwrap_or(0.0);

        Self {
            title,
            observed_at: DateTime::<Utc>::from_timestamp(snapshot.dt, 0),
            icon_url: icon_url(snapshot),
            summary,
            temperature: round_half_up(main.temp),
            feels_like: feels_like(main.temp_min, main.temp_max),
            min_max: format!(
                "{}° / {}°",
                round_half_up(main.temp_min),
                round_half_up(main.temp_max)
            ),
            humidity: format!("{}%", main.humidity),
            pressure: format!("{} hPa", main.pressure),
            wind: format!("{wind} m/s"),
            clouds: format!("{clouds}%"),
            sunrise: clock_time(snapshot.sys.sunrise, snapshot.timezone),
            sunset: clock_time(snapshot.sys.sunset, snapshot.timezone),
        }
    }
}
