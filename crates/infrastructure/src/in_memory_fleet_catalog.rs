use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fleetgate_application::WarmingSource;
use fleetgate_core::{AppError, AppResult};
use fleetgate_domain::{Booking, Car, DayAvailability};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;


/// Seed document accepted by [`InMemoryFleetCatalog::from_json`].
#[derive(Debug, Default, Deserialize)]
pub struct FleetSeed {
    /// Cars in the fleet.
    pub cars: Vec<Car>,
    /// Existing bookings.
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

/// Process-local fleet and booking records.
#[derive(Debug)]
pub struct InMemoryFleetCatalog {
    cars: RwLock<BTreeMap<String, Car>>,
    bookings: RwLock<Vec<Booking>>,
}

impl InMemoryFleetCatalog {
    /// Creates a catalog from seed records.
    #[must_use]
    pub fn new(seed: FleetSeed) -> Self {
        let cars = seed
            .cars
            .into_iter()
            .map(|car| (car.id.clone(), car))
            .collect();

        Self {
            cars: RwLock::new(cars),
            bookings: RwLock::new(seed.bookings),
        }
    }

    /// Parses a JSON seed document.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let seed: FleetSeed = serde_json::from_str(document)
            .map_err(|error| AppError::Validation(format!("invalid fleet seed: {error}")))?;

        Ok(Self::new(seed))
    }

    /// Small built-in fleet used when no seed file is configured.
    #[must_use]
    pub fn demo() -> Self {
        let car = |id: &str, name: &str, category: &str, daily_rate_cents: i64| Car {
            id: id.to_owned(),
            name: name.to_owned(),
            category: category.to_owned(),
            daily_rate_cents,
            location: "Lisbon Airport".to_owned(),
        };
        let day =
            |month: u32, day: u32| NaiveDate::from_ymd_opt(2026, month, day).unwrap_or_default();
        let booking = |id: &str, car_id: &str, start: NaiveDate, end: NaiveDate| Booking {
            id: id.to_owned(),
            car_id: car_id.to_owned(),
            user_id: "demo-user".to_owned(),
            start_date: start,
            end_date: end,
            created_at: start.and_time(NaiveTime::MIN).and_utc(),
        };

        Self::new(FleetSeed {
            cars: vec![
                car("car-1", "Toyota Corolla", "compact", 3_900),
                car("car-2", "Volkswagen Tiguan", "suv", 6_400),
                car("car-3", "Tesla Model 3", "electric", 8_900),
                car("car-4", "Fiat 500", "mini", 2_900),
            ],
            bookings: vec![
                booking("booking-1", "car-2", day(9, 1), day(9, 4)),
                booking("booking-2", "car-2", day(9, 12), day(9, 14)),
                booking("booking-3", "car-3", day(9, 20), day(9, 21)),
                booking("booking-4", "car-1", day(9, 8), day(9, 9)),
            ],
        })
    }

    /// Lists cars ordered by id.
    pub async fn cars(&self) -> Vec<Car> {
        self.cars.read().await.values().cloned().collect()
    }

    /// Finds one car.
    pub async fn car(&self, car_id: &str) -> Option<Car> {
        self.cars.read().await.get(car_id).cloned()
    }

    /// Inserts or replaces a car.
    pub async fn upsert_car(&self, car: Car) {
        self.cars.write().await.insert(car.id.clone(), car);
    }

    /// Places a booking after checking the car exists and is free for the
    /// whole range.
    pub async fn add_booking(&self, booking: Booking) -> AppResult<Booking> {
        if booking.end_date < booking.start_date {
            return Err(AppError::Validation(format!(
                "booking ends ({}) before it starts ({})",
                booking.end_date, booking.start_date
            )));
        }
        if !self.cars.read().await.contains_key(booking.car_id.as_str()) {
            return Err(AppError::NotFound(format!(
                "car '{}' does not exist",
                booking.car_id
            )));
        }

        let mut bookings = self.bookings.write().await;
        let overlapping = bookings.iter().any(|existing| {
            existing.car_id == booking.car_id
                && existing.start_date <= booking.end_date
                && booking.start_date <= existing.end_date
        });
        if overlapping {
            return Err(AppError::Conflict(format!(
                "car '{}' is already booked between {} and {}",
                booking.car_id, booking.start_date, booking.end_date
            )));
        }

        bookings.push(booking.clone());
        Ok(booking)
    }

    /// Lists a user's bookings, newest first.
    pub async fn bookings_for_user(&self, user_id: &str) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .iter()
            .filter(|booking| booking.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        bookings
    }

    /// Availability of one car on one day.
    pub async fn day_availability(
        &self,
        car_id: &str,
        date: NaiveDate,
    ) -> AppResult<DayAvailability> {
        if !self.cars.read().await.contains_key(car_id) {
            return Err(AppError::NotFound(format!("car '{car_id}' does not exist")));
        }

        let booked = self
            .bookings
            .read()
            .await
            .iter()
            .any(|booking| booking.car_id == car_id && booking.covers(date));

        Ok(DayAvailability {
            car_id: car_id.to_owned(),
            date,
            available: !booked,
        })
    }

    /// Car ids ranked by booking count, ties broken by the latest booking.
    pub async fn most_booked(&self, limit: usize) -> Vec<String> {
        let bookings = self.bookings.read().await;
        let mut stats: HashMap<&str, (usize, DateTime<Utc>)> = HashMap::new();
        for booking in bookings.iter() {
            let entry = stats
                .entry(booking.car_id.as_str())
                .or_insert((0, booking.created_at));
            entry.0 += 1;
            entry.1 = entry.1.max(booking.created_at);
        }

        let mut ranked: Vec<(&str, (usize, DateTime<Utc>))> = stats.into_iter().collect();
        ranked.sort_by(|(left_id, left), (right_id, right)| {
            right
                .0
                .cmp(&left.0)
                .then(right.1.cmp(&left.1))
                .then(left_id.cmp(right_id))
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(car_id, _)| car_id.to_owned())
            .collect()
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|error| AppError::Internal(format!("failed to encode fleet record: {error}")))
}

#[async_trait]
impl WarmingSource for InMemoryFleetCatalog {
    async fn fleet_listing(&self) -> AppResult<Value> {
        to_value(&self.cars().await)
    }

    async fn car_details(&self, car_id: &str) -> AppResult<Option<Value>> {
        self.car(car_id).await.as_ref().map(to_value).transpose()
    }

    async fn popular_car_ids(&self, limit: usize) -> AppResult<Vec<String>> {
        Ok(self.most_booked(limit).await)
    }

    async fn availability(&self, car_id: &str, date: NaiveDate) -> AppResult<Value> {
        to_value(&self.day_availability(car_id, date).await?)
    }
}
