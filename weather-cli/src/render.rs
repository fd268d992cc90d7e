use chrono::Local;
use weather_core::{LoadState, display::WeatherCard};

/// Text for one view state. `None` for states with nothing to show.
pub fn render(state: &LoadState) -> Option<String> {
    let text = match state {
        LoadState::Idle => return None,
        LoadState::Locating => {
            "Locating you...\n  Tip: If prompted, allow location access.".to_string()
        }
        LoadState::Loading => "Fetching weather...".to_string(),
        LoadState::Error(message) => format!(
            "Something went wrong\n  {message}\n  \
             Common fixes: enable location, check connection, check the proxy URL, refresh."
        ),
        LoadState::Done(snapshot) => render_card(&WeatherCard::from_snapshot(snapshot)),
    };
    Some(text)
}

fn render_card(card: &WeatherCard) -> String {
    let updated = card
        .observed_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut lines = vec![
        format!("Now: {}", card.title),
        format!("  Updated: {updated}"),
        format!("  {}° {}  (feels like ~ {}°)", card.temperature, card.summary, card.feels_like),
    ];
    if let Some(icon) = &card.icon_url {
        lines.push(format!("  Icon: {icon}"));
    }

    let rows = [
        ("Min / Max", &card.min_max),
        ("Humidity", &card.humidity),
        ("Pressure", &card.pressure),
        ("Wind", &card.wind),
        ("Clouds", &card.clouds),
        ("Sunrise", &card.sunrise),
        ("Sunset", &card.sunset),
    ];
    lines.extend(rows.iter().map(|(label, value)| format!("  {label:<10} {value}")));

    lines.join("\n")
}
