//! Emergency message text

use crate::Location;

/// Body of the emergency message
pub fn compose_alert(
    user_name: &str,
    seconds_drowsy: u64,
    location: Option<&Location>,
    active_window_min: u64,
) -> String {
    let name = match user_name.trim() {
        "" => "User",
        name => name,
    };
    let base = format!(
        "ALERT: The user {} was detected drowsy for {} seconds.\n\n\
         Please check on them and be prepared to contact emergency services if needed.\n",
        name, seconds_drowsy
    );

    match location {
        Some(loc) => {
            let place = if loc.place.is_empty() { "unknown" } else { loc.place.as_str() };
            format!(
                "{}Location: {}\n(Approx: {})\nLocation active for {} minutes (approx).",
                base,
                loc.maps_url(),
                place,
                active_window_min
            )
        }
        None => format!("{}\nLocation not available.", base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_with_location() {
        let loc = Location {
            lat: 10.0,
            lon: 20.5,
            place: "Pune, Maharashtra, IN".into(),
        };
        let msg = compose_alert("Ravi", 31, Some(&loc), 15);
        assert!(msg.starts_with("ALERT: The user Ravi was detected drowsy for 31 seconds."));
        assert!(msg.contains("query=10,20.5"));
        assert!(msg.contains("(Approx: Pune, Maharashtra, IN)"));
        assert!(msg.ends_with("Location active for 15 minutes (approx)."));
    }

    #[test]
    fn test_message_without_location() {
        let msg = compose_alert("  ", 0, None, 15);
        assert!(msg.contains("The user User was"));
        assert!(msg.ends_with("Location not available."));
    }
}
