//! Demo data generators for delivery route optimization.
//!
//! Provides two deterministic datasets built from real neighbourhood
//! coordinates:
//! - Ottawa (30 stops, 3 vehicles, explicit depot)
//! - Ottawa + Kingston (48 stops across two cities ~145 km apart, 4 vehicles)
//!
//! Stops are weighted customer types:
//! - Residential (50%): 17:00-20:00, quantity 1-2
//! - Business (30%): 09:00-17:00, quantity 3-6
//! - Restaurant (20%): 06:00-10:00, quantity 5-10
//!
//! Window hours are UTC on the requested service date.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Coord, Stop, VehicleConfig};

/// Vehicle names using phonetic alphabet.
const VEHICLE_NAMES: [&str; 10] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo",
    "Foxtrot", "Golf", "Hotel", "India", "Juliet",
];

/// Customer type with time window and demand characteristics.
#[derive(Clone, Copy)]
enum CustomerType {
    /// Evening deliveries (17:00-20:00), small orders
    Residential,
    /// Business hours (09:00-17:00), medium orders
    Business,
    /// Early morning (06:00-10:00), large orders
    Restaurant,
}

impl CustomerType {
    fn window_hours(&self) -> (u32, u32) {
        match self {
            CustomerType::Residential => (17, 20),
            CustomerType::Business => (9, 17),
            CustomerType::Restaurant => (6, 10),
        }
    }

    fn quantity_range(&self) -> (u32, u32) {
        match self {
            CustomerType::Residential => (1, 2),
            CustomerType::Business => (3, 6),
            CustomerType::Restaurant => (5, 10),
        }
    }

    fn service_minutes_range(&self) -> (u32, u32) {
        match self {
            CustomerType::Residential => (5, 10),
            CustomerType::Business => (15, 30),
            CustomerType::Restaurant => (20, 40),
        }
    }

    /// Weighted random selection: 50% residential, 30% business, 20% restaurant.
    fn random(rng: &mut StdRng) -> Self {
        let r: u32 = rng.gen_range(1..=100);
        if r <= 50 {
            CustomerType::Residential
        } else if r <= 80 {
            CustomerType::Business
        } else {
            CustomerType::Restaurant
        }
    }
}

/// Location data with name, coordinates, and optional type.
struct LocationData {
    name: &'static str,
    lat: f64,
    lng: f64,
    customer_type: Option<CustomerType>,
}

/// Demo dataset configuration.
struct DemoConfig {
    seed: u64,
    vehicle_count: usize,
    min_capacity: u32,
    max_capacity: u32,
    depot: Option<Coord>,
}

/// A ready-to-optimize dataset.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub name: String,
    pub stops: Vec<Stop>,
    pub vehicles: Vec<VehicleConfig>,
    pub depot: Option<Coord>,
}

// ============================================================================
// Ottawa Data
// ============================================================================

const OTTAWA_STOPS: &[LocationData] = &[
    // Restaurants
    LocationData { name: "ByWard Market", lat: 45.4289, lng: -75.6920, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Elgin Street", lat: 45.4165, lng: -75.6885, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Preston Street", lat: 45.4040, lng: -75.7130, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Somerset Chinatown", lat: 45.4120, lng: -75.7050, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Wellington West", lat: 45.3995, lng: -75.7360, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Bank Street Glebe", lat: 45.4010, lng: -75.6880, customer_type: Some(CustomerType::Restaurant) },
    // Businesses
    LocationData { name: "Parliament Hill", lat: 45.4236, lng: -75.7009, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Rideau Centre", lat: 45.4253, lng: -75.6920, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Place de Ville", lat: 45.4200, lng: -75.7040, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Tunney's Pasture", lat: 45.4040, lng: -75.7380, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Civic Hospital", lat: 45.3930, lng: -75.7210, customer_type: Some(CustomerType::Business) },
    LocationData { name: "University of Ottawa", lat: 45.4231, lng: -75.6831, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Carleton University", lat: 45.3876, lng: -75.6960, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Lansdowne Park", lat: 45.3980, lng: -75.6840, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Billings Bridge", lat: 45.3850, lng: -75.6770, customer_type: Some(CustomerType::Business) },
    LocationData { name: "St. Laurent Centre", lat: 45.4210, lng: -75.6380, customer_type: Some(CustomerType::Business) },
    // Residential
    LocationData { name: "Centretown", lat: 45.4145, lng: -75.6960, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Sandy Hill", lat: 45.4230, lng: -75.6790, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Lowertown", lat: 45.4330, lng: -75.6900, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "New Edinburgh", lat: 45.4420, lng: -75.6830, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Rockcliffe Park", lat: 45.4480, lng: -75.6730, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Vanier", lat: 45.4370, lng: -75.6610, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Overbrook", lat: 45.4300, lng: -75.6500, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Old Ottawa South", lat: 45.3930, lng: -75.6800, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Alta Vista", lat: 45.3850, lng: -75.6580, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Hintonburg", lat: 45.4010, lng: -75.7290, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Westboro", lat: 45.3920, lng: -75.7540, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Westgate", lat: 45.3890, lng: -75.7390, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Elmvale Acres", lat: 45.3950, lng: -75.6350, customer_type: None },
    LocationData { name: "Carlingwood", lat: 45.3720, lng: -75.7700, customer_type: None },
];

/// Warehouse south of downtown.
const OTTAWA_DEPOT: Coord = Coord { lat: 45.3795, lng: -75.7050 };

// ============================================================================
// Kingston Data
// ============================================================================

const KINGSTON_STOPS: &[LocationData] = &[
    LocationData { name: "Kingston City Hall", lat: 44.2307, lng: -76.4800, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Queen's University", lat: 44.2253, lng: -76.4951, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Kingston General Hospital", lat: 44.2240, lng: -76.4930, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Royal Military College", lat: 44.2320, lng: -76.4680, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Cataraqui Centre", lat: 44.2540, lng: -76.5650, customer_type: Some(CustomerType::Business) },
    LocationData { name: "Princess Street", lat: 44.2330, lng: -76.4860, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Market Square", lat: 44.2300, lng: -76.4790, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Portsmouth Village", lat: 44.2230, lng: -76.5220, customer_type: Some(CustomerType::Restaurant) },
    LocationData { name: "Sydenham Ward", lat: 44.2290, lng: -76.4880, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Williamsville", lat: 44.2370, lng: -76.5000, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Inner Harbour", lat: 44.2400, lng: -76.4800, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Kingsdale", lat: 44.2470, lng: -76.5320, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Polson Park", lat: 44.2330, lng: -76.5300, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Calvin Park", lat: 44.2350, lng: -76.5170, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Strathcona Park", lat: 44.2480, lng: -76.5120, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Rideau Heights", lat: 44.2560, lng: -76.4970, customer_type: Some(CustomerType::Residential) },
    LocationData { name: "Bayridge", lat: 44.2400, lng: -76.5900, customer_type: None },
    LocationData { name: "Fort Henry", lat: 44.2310, lng: -76.4600, customer_type: None },
];

// ============================================================================
// Generator Functions
// ============================================================================

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

fn build_stops(
    rng: &mut StdRng,
    prefix: &str,
    city: &str,
    data: &[LocationData],
    service_date: NaiveDate,
) -> Vec<Stop> {
    data.iter()
        .enumerate()
        .map(|(i, loc)| {
            let ctype = loc.customer_type.unwrap_or_else(|| CustomerType::random(rng));
            let (open, close) = ctype.window_hours();
            let (min_qty, max_qty) = ctype.quantity_range();
            let (min_service, max_service) = ctype.service_minutes_range();

            Stop::new(format!("{}-{:02}", prefix, i + 1), Coord::new(loc.lat, loc.lng))
                .with_city(city)
                .with_quantity(rng.gen_range(min_qty..=max_qty))
                .with_service_minutes(rng.gen_range(min_service..=max_service))
                .with_time_window(at_hour(service_date, open), at_hour(service_date, close))
        })
        .collect()
}

fn build_vehicles(rng: &mut StdRng, config: &DemoConfig) -> Vec<VehicleConfig> {
    (0..config.vehicle_count)
        .map(|i| {
            VehicleConfig::new(VEHICLE_NAMES[i % VEHICLE_NAMES.len()])
                .with_capacity(rng.gen_range(config.min_capacity..=config.max_capacity))
        })
        .collect()
}

/// Generates Ottawa demo data (30 stops, 3 vehicles).
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use route_optimizer::demo_data::generate_ottawa;
///
/// let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
/// let data = generate_ottawa(day);
/// assert_eq!(data.name, "Ottawa");
/// assert_eq!(data.stops.len(), 30);
/// assert_eq!(data.vehicles.len(), 3);
/// assert!(data.depot.is_some());
/// ```
pub fn generate_ottawa(service_date: NaiveDate) -> DemoDataset {
    let config = DemoConfig {
        seed: 0,
        vehicle_count: 3,
        min_capacity: 40,
        max_capacity: 60,
        depot: Some(OTTAWA_DEPOT),
    };
    let mut rng = StdRng::seed_from_u64(config.seed);
    let stops = build_stops(&mut rng, "ott", "Ottawa", OTTAWA_STOPS, service_date);
    let vehicles = build_vehicles(&mut rng, &config);

    DemoDataset {
        name: "Ottawa".to_string(),
        stops,
        vehicles,
        depot: config.depot,
    }
}

/// Generates Ottawa + Kingston demo data (48 stops, 4 vehicles).
///
/// No depot is given: each city is routed from its own cluster centroid.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use route_optimizer::demo_data::generate_ottawa_kingston;
///
/// let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
/// let data = generate_ottawa_kingston(day);
/// assert_eq!(data.stops.len(), 48);
/// assert_eq!(data.vehicles.len(), 4);
/// assert!(data.depot.is_none());
/// ```
pub fn generate_ottawa_kingston(service_date: NaiveDate) -> DemoDataset {
    let config = DemoConfig {
        seed: 1,
        vehicle_count: 4,
        min_capacity: 30,
        max_capacity: 50,
        depot: None,
    };
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stops = build_stops(&mut rng, "ott", "Ottawa", OTTAWA_STOPS, service_date);
    stops.extend(build_stops(&mut rng, "kgn", "Kingston", KINGSTON_STOPS, service_date));
    let vehicles = build_vehicles(&mut rng, &config);

    DemoDataset {
        name: "Ottawa + Kingston".to_string(),
        stops,
        vehicles,
        depot: config.depot,
    }
}

/// Returns all available demo dataset names.
pub fn available_datasets() -> &'static [&'static str] {
    &["OTTAWA", "OTTAWA_KINGSTON"]
}

/// Generates demo data by name for today's date.
///
/// # Examples
///
/// ```
/// use route_optimizer::demo_data::generate_by_name;
///
/// let data = generate_by_name("ottawa_kingston").unwrap();
/// assert_eq!(data.name, "Ottawa + Kingston");
///
/// assert!(generate_by_name("UNKNOWN").is_none());
/// ```
pub fn generate_by_name(name: &str) -> Option<DemoDataset> {
    let today = Utc::now().date_naive();
    match name.to_uppercase().as_str() {
        "OTTAWA" => Some(generate_ottawa(today)),
        "OTTAWA_KINGSTON" => Some(generate_ottawa_kingston(today)),
        _ => None,
    }
}
