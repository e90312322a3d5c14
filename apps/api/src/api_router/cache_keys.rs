use axum::extract::Request;
use chrono::NaiveDate;
use fleetgate_core::UserIdentity;

const CARS_PREFIX: &str = "/api/cars/";
const AVAILABILITY_SUFFIX: &str = "/availability";

pub(super) fn fleet_key(_request: &Request) -> Option<Vec<String>> {
    Some(vec!["all".to_owned()])
}

/// `/api/cars/{car_id}` keyed by car id.
pub(super) fn car_key(request: &Request) -> Option<Vec<String>> {
    let car_id = request.uri().path().strip_prefix(CARS_PREFIX)?;
    (!car_id.is_empty() && !car_id.contains('/')).then(|| vec![car_id.to_owned()])
}

/// Single-day availability keyed by car id and day; ranges are not cached.
pub(super) fn availability_key(request: &Request) -> Option<Vec<String>> {
    let car_id = request
        .uri()
        .path()
        .strip_prefix(CARS_PREFIX)?
        .strip_suffix(AVAILABILITY_SUFFIX)?;
    if car_id.is_empty() || car_id.contains('/') {
        return None;
    }

    let query = request.uri().query()?;
    let mut date = None;
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        match pair.split_once('=')? {
            ("date", value) => date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
            _ => return None,
        }
    }

    date.map(|date| vec![car_id.to_owned(), date.to_string()])
}

/// Bookings of the authenticated caller.
pub(super) fn user_bookings_key(request: &Request) -> Option<Vec<String>> {
    request
        .extensions()
        .get::<UserIdentity>()
        .map(|identity| vec![identity.subject().to_owned()])
}
