use serde::{Deserialize, Serialize};

/// Lowercase, trimmed identity key. This is the form sent to the credential
/// check and persisted in the session.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Registry form: first letter uppercased, remainder lowercased. The
/// backend's user list stores usernames in this shape.
pub fn registry_username(raw: &str) -> String {
    let mut chars = raw.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Latitude/longitude pair split from a raw `"<lat>, <lon>"` field.
///
/// Validation is intentionally lenient: exactly two non-empty trimmed
/// components, no numeric or range checks. Components are carried verbatim
/// to the backend, which stores them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: String,
    pub longitude: String,
}

impl Coordinates {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut components = raw.split(',').map(str::trim);
        let (Some(latitude), Some(longitude), None) =
            (components.next(), components.next(), components.next())
        else {
            return None;
        };
        if latitude.is_empty() || longitude.is_empty() {
            return None;
        }
        Some(Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        })
    }
}

/// A persisted destination entry as served by the backend's map-read
/// endpoint. Created through the upload workflow, never mutated by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub place: String,
    #[serde(rename = "state", default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    pub latitude: String,
    pub longitude: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_username_for_auth() {
        assert_eq!(normalize_username("  Rohit "), "rohit");
        assert_eq!(normalize_username("ALICE"), "alice");
    }

    #[test]
    fn registry_username_capitalizes_first_letter_only() {
        assert_eq!(registry_username(" rohit"), "Rohit");
        assert_eq!(registry_username("ALICE"), "Alice");
        assert_eq!(registry_username(""), "");
    }

    #[test]
    fn parses_two_component_coordinates() {
        let coords = Coordinates::parse("12.5,77.2").expect("coords");
        assert_eq!(coords.latitude, "12.5");
        assert_eq!(coords.longitude, "77.2");

        let spaced = Coordinates::parse(" 22.5 , 88.3 ").expect("coords");
        assert_eq!(spaced.latitude, "22.5");
        assert_eq!(spaced.longitude, "88.3");
    }

    #[test]
    fn rejects_missing_or_extra_components() {
        assert_eq!(Coordinates::parse("12.5"), None);
        assert_eq!(Coordinates::parse(""), None);
        assert_eq!(Coordinates::parse("12.5,"), None);
        assert_eq!(Coordinates::parse(",77.2"), None);
        assert_eq!(Coordinates::parse("1,2,3"), None);
    }

    #[test]
    fn accepts_non_numeric_components() {
        // Leniency is deliberate: the backend receives the tokens verbatim.
        assert!(Coordinates::parse("north, south").is_some());
    }
}
