use chrono::NaiveDate;
use reqwest::Url;

use crate::error::InvalidParam;
use crate::services::assembler::{NewAddress, NewPassenger};

const MAP_HOSTS: &[&str] = &["maps.google.com", "maps.app.goo.gl"];
const MAP_PATH_HOSTS: &[&str] = &["google.com", "www.google.com", "goo.gl"];

/// Validate a passenger, reporting problems under `prefix` (e.g. `passengers[1]`)
pub fn validate_passenger(passenger: &NewPassenger, today: NaiveDate, prefix: &str) -> Vec<InvalidParam> {
    let mut params = Vec::new();

    if passenger.name.trim().is_empty() {
        params.push(InvalidParam::new(format!("{prefix}.name"), "Must not be empty."));
    }

    if passenger.surname.trim().is_empty() {
        params.push(InvalidParam::new(format!("{prefix}.surname"), "Must not be empty."));
    }

    if passenger.date_of_birth >= today {
        params.push(InvalidParam::new(
            format!("{prefix}.date_of_birth"),
            "Invalid date of birth.",
        ));
    }

    params
}

pub fn validate_address(address: &NewAddress, prefix: &str) -> Vec<InvalidParam> {
    let mut params = Vec::new();

    if address.country.trim().is_empty() {
        params.push(InvalidParam::new(format!("{prefix}.country"), "Invalid country."));
    }
    if address.city.trim().is_empty() {
        params.push(InvalidParam::new(format!("{prefix}.city"), "Invalid city."));
    }
    if address.street.trim().is_empty() {
        params.push(InvalidParam::new(format!("{prefix}.street"), "Invalid street."));
    }
    if address.house_number <= 0 {
        params.push(InvalidParam::new(
            format!("{prefix}.house_number"),
            "Invalid house number.",
        ));
    }
    if address.apartment_number.is_some_and(|n| n <= 0) {
        params.push(InvalidParam::new(
            format!("{prefix}.apartment_number"),
            "Invalid apartment number.",
        ));
    }
    if let Err(reason) = verify_map_link(&address.map_link) {
        params.push(InvalidParam::new(format!("{prefix}.map_link"), reason));
    }

    params
}

/// Check that a link points at a Google Maps location
pub fn verify_map_link(link: &str) -> Result<(), &'static str> {
    let url = Url::parse(link.trim()).map_err(|_| "Malformed map link.")?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err("Map link must be an http(s) URL.");
    }

    let host = url.host_str().ok_or("Map link has no host.")?;

    if MAP_HOSTS.contains(&host) {
        return Ok(());
    }

    if MAP_PATH_HOSTS.contains(&host) && url.path().starts_with("/maps") {
        return Ok(());
    }

    Err("Not a Google Maps link.")
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email.");
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err("Invalid email."),
    }
}

/// Parses a phone number, defaulting to the Ukrainian numbering plan when no
/// country code is given, and returns it in E.164 form.
pub fn validate_phone_number(phone: &str) -> Result<String, &'static str> {
    let number = phonenumber::parse(Some(phonenumber::country::Id::UA), phone.trim())
        .map_err(|_| "Invalid phone number.")?;

    if !phonenumber::is_valid(&number) {
        return Err("Invalid phone number.");
    }

    Ok(number.format().mode(phonenumber::Mode::E164).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passenger(name: &str, dob: NaiveDate) -> NewPassenger {
        NewPassenger {
            name: name.to_string(),
            surname: "Kowalski".to_string(),
            date_of_birth: dob,
        }
    }

    fn address() -> NewAddress {
        NewAddress {
            country: "Poland".to_string(),
            city: "Krakow".to_string(),
            street: "Florianska".to_string(),
            house_number: 12,
            apartment_number: None,
            map_link: "https://maps.app.goo.gl/abc123".to_string(),
        }
    }

    #[test]
    fn test_passenger_with_future_birth_date_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let params = validate_passenger(
            &passenger("Jan", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()),
            today,
            "passengers[0]",
        );

        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "passengers[0].date_of_birth");
    }

    #[test]
    fn test_passenger_problems_accumulate() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut p = passenger("", today);
        p.surname = " ".to_string();

        let params = validate_passenger(&p, today, "passengers[2]");
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "passengers[2].name",
                "passengers[2].surname",
                "passengers[2].date_of_birth"
            ]
        );
    }

    #[test]
    fn test_valid_address() {
        assert!(validate_address(&address(), "pick_up_address").is_empty());
    }

    #[test]
    fn test_address_field_rules() {
        let mut a = address();
        a.city = String::new();
        a.house_number = 0;
        a.apartment_number = Some(-3);
        a.map_link = "ftp://maps.google.com/x".to_string();

        let params = validate_address(&a, "drop_off_address");
        assert_eq!(params.len(), 4);
        assert!(params.iter().all(|p| p.name.starts_with("drop_off_address.")));
    }

    #[test]
    fn test_map_links() {
        assert!(verify_map_link("https://www.google.com/maps/place/Krakow").is_ok());
        assert!(verify_map_link("https://maps.google.com/?q=50.06,19.94").is_ok());
        assert!(verify_map_link("https://www.google.com/search?q=maps").is_err());
        assert!(verify_map_link("https://example.com/maps").is_err());
        assert!(verify_map_link("not a url").is_err());
    }

    #[test]
    fn test_contact_info() {
        assert!(validate_email("anna@example.com").is_ok());
        assert!(validate_email("anna@example").is_err());
        assert!(validate_email("anna@@example.com").is_err());
        assert!(validate_email("an na@example.com").is_err());

        assert!(validate_phone_number("+48 600-100-200").is_ok());
        assert!(validate_phone_number("12345").is_err());
        assert!(validate_phone_number("+380 12").is_err());
        assert!(validate_phone_number("call me").is_err());
    }

    #[test]
    fn test_phone_number_is_normalized_to_e164() {
        assert_eq!(validate_phone_number("067 123 4567").unwrap(), "+380671234567");
        assert_eq!(validate_phone_number(" +380 67 123-45-67 ").unwrap(), "+380671234567");
        assert_eq!(validate_phone_number("+48 500 600 700").unwrap(), "+48500600700");
    }
}
