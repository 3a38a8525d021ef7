//! Read-only hotel content catalog.
//!
//! The conversation engine never mutates the catalog; it only filters and
//! selects from it (available rooms under a price, spa-only amenities, a
//! menu item by name).  [`ContentCatalog`] is the seam, [`StaticCatalog`] the
//! in-memory implementation backed by a [`CatalogDocument`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreResult;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A bookable room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Stable identifier guests type during booking (e.g. `dlx-201`).
    pub id: String,
    pub name: String,
    /// Room category (`standard`, `deluxe`, `suite`, `family`).
    pub room_type: String,
    /// Nightly price in the hotel currency.
    pub price_per_night: f64,
    #[serde(default)]
    pub features: Vec<String>,
    pub max_guests: u32,
    pub available: bool,
}

/// An in-room dining menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    /// Menu section (`breakfast`, `lunch`, `dinner`, `dessert`, `drinks`).
    pub category: String,
    #[serde(default)]
    pub description: String,
}

/// A hotel amenity or bookable service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: String,
    pub name: String,
    /// Amenity category (`spa`, `fitness`, `pool`, `transport`, ...).
    pub category: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub available: bool,
}

/// A department guests can be handed off to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub hours: String,
    #[serde(default)]
    pub description: String,
}

/// A frequently asked question with its canned answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub category: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The serializable shape of a whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub faqs: Vec<FaqEntry>,
}

// ═══════════════════════════════════════════════════════════════════════
//  ContentCatalog
// ═══════════════════════════════════════════════════════════════════════

/// Read access to hotel content.
///
/// Implementations may be backed by a remote service, so every accessor is
/// fallible.  The provided helpers perform the selection logic on top of the
/// five raw listings.
pub trait ContentCatalog: Send + Sync {
    fn rooms(&self) -> StoreResult<Vec<Room>>;
    fn menu(&self) -> StoreResult<Vec<MenuItem>>;
    fn amenities(&self) -> StoreResult<Vec<Amenity>>;
    fn departments(&self) -> StoreResult<Vec<Department>>;
    fn faqs(&self) -> StoreResult<Vec<FaqEntry>>;

    /// Look up a room by id (case-insensitive).
    fn room(&self, id: &str) -> StoreResult<Option<Room>> {
        let id = id.trim();
        Ok(self
            .rooms()?
            .into_iter()
            .find(|r| r.id.eq_ignore_ascii_case(id)))
    }

    /// Rooms currently open for booking.
    fn available_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(self.rooms()?.into_iter().filter(|r| r.available).collect())
    }

    /// Available rooms whose nightly price does not exceed `max_price`.
    fn rooms_under(&self, max_price: f64) -> StoreResult<Vec<Room>> {
        Ok(self
            .available_rooms()?
            .into_iter()
            .filter(|r| r.price_per_night <= max_price)
            .collect())
    }

    /// Available amenities in the `spa` category.
    fn spa_services(&self) -> StoreResult<Vec<Amenity>> {
        Ok(self
            .amenities()?
            .into_iter()
            .filter(|a| a.available && a.category.eq_ignore_ascii_case("spa"))
            .collect())
    }

    /// Find a menu item by id or by (case-insensitive) name.
    fn menu_item(&self, query: &str) -> StoreResult<Option<MenuItem>> {
        let query = query.trim().to_lowercase();
        Ok(self
            .menu()?
            .into_iter()
            .find(|m| m.id.to_lowercase() == query || m.name.to_lowercase() == query))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  StaticCatalog
// ═══════════════════════════════════════════════════════════════════════

/// In-memory catalog over a fixed [`CatalogDocument`].
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    document: CatalogDocument,
}

impl StaticCatalog {
    /// Wrap an existing document.
    pub fn new(document: CatalogDocument) -> Self {
        Self { document }
    }

    /// Parse a catalog from a JSON document.
    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        debug!(
            rooms = document.rooms.len(),
            menu = document.menu.len(),
            amenities = document.amenities.len(),
            "catalog parsed"
        );
        Ok(Self::new(document))
    }

    /// Load a catalog from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "catalog loaded from file");
        Ok(catalog)
    }

    /// Borrow the underlying document.
    pub fn document(&self) -> &CatalogDocument {
        &self.document
    }

    /// The demo hotel used by the CLI and the test suites.
    pub fn hotel_defaults() -> Self {
        Self::new(CatalogDocument {
            rooms: default_rooms(),
            menu: default_menu(),
            amenities: default_amenities(),
            departments: default_departments(),
            faqs: default_faqs(),
        })
    }
}

impl ContentCatalog for StaticCatalog {
    fn rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(self.document.rooms.clone())
    }

    fn menu(&self) -> StoreResult<Vec<MenuItem>> {
        Ok(self.document.menu.clone())
    }

    fn amenities(&self) -> StoreResult<Vec<Amenity>> {
        Ok(self.document.amenities.clone())
    }

    fn departments(&self) -> StoreResult<Vec<Department>> {
        Ok(self.document.departments.clone())
    }

    fn faqs(&self) -> StoreResult<Vec<FaqEntry>> {
        Ok(self.document.faqs.clone())
    }
}

// ── fixtures ─────────────────────────────────────────────────────────

fn room(
    id: &str,
    name: &str,
    room_type: &str,
    price: f64,
    max_guests: u32,
    available: bool,
    features: &[&str],
) -> Room {
    Room {
        id: id.into(),
        name: name.into(),
        room_type: room_type.into(),
        price_per_night: price,
        features: features.iter().map(|f| f.to_string()).collect(),
        max_guests,
        available,
    }
}

fn default_rooms() -> Vec<Room> {
    vec![
        room("std-101", "Standard Queen", "standard", 129.0, 2, true, &["queen bed", "city view", "wifi"]),
        room("std-102", "Standard Twin", "standard", 119.0, 2, true, &["twin beds", "wifi"]),
        room("dlx-201", "Deluxe King", "deluxe", 199.0, 2, true, &["king bed", "ocean view", "minibar"]),
        room("dlx-202", "Deluxe Balcony", "deluxe", 229.0, 3, false, &["king bed", "balcony", "ocean view"]),
        room("ste-301", "Junior Suite", "suite", 349.0, 3, true, &["king bed", "lounge", "bathtub"]),
        room("fam-401", "Family Room", "family", 259.0, 5, true, &["two queen beds", "sofa bed", "kitchenette"]),
    ]
}

fn menu_item(id: &str, name: &str, price: f64, category: &str, description: &str) -> MenuItem {
    MenuItem {
        id: id.into(),
        name: name.into(),
        price,
        category: category.into(),
        description: description.into(),
    }
}

fn default_menu() -> Vec<MenuItem> {
    vec![
        menu_item("bf-continental", "Continental Breakfast", 18.0, "breakfast", "Pastries, fruit, yogurt and coffee"),
        menu_item("bf-full", "Full Breakfast", 26.0, "breakfast", "Eggs, bacon, sausage, toast and juice"),
        menu_item("ln-club", "Club Sandwich", 19.0, "lunch", "Triple-decker with fries"),
        menu_item("ln-caesar", "Caesar Salad", 16.0, "lunch", "Romaine, parmesan, croutons"),
        menu_item("dn-salmon", "Grilled Salmon", 34.0, "dinner", "With seasonal vegetables"),
        menu_item("dn-steak", "Ribeye Steak", 42.0, "dinner", "300g with peppercorn sauce"),
        menu_item("ds-cake", "Chocolate Cake", 11.0, "dessert", "Warm, with vanilla ice cream"),
        menu_item("dr-wine", "House Red Wine", 12.0, "drinks", "By the glass"),
    ]
}

fn amenity(
    id: &str,
    name: &str,
    category: &str,
    price: Option<f64>,
    duration_minutes: Option<u32>,
    available: bool,
) -> Amenity {
    Amenity {
        id: id.into(),
        name: name.into(),
        category: category.into(),
        price,
        duration_minutes,
        available,
    }
}

fn default_amenities() -> Vec<Amenity> {
    vec![
        amenity("spa-swedish", "Swedish Massage", "spa", Some(120.0), Some(60), true),
        amenity("spa-hot-stone", "Hot Stone Massage", "spa", Some(150.0), Some(75), true),
        amenity("spa-facial", "Signature Facial", "spa", Some(95.0), Some(45), true),
        amenity("spa-couples", "Couples Massage", "spa", Some(260.0), Some(90), false),
        amenity("pool", "Rooftop Pool", "pool", None, None, true),
        amenity("gym", "Fitness Center", "fitness", None, None, true),
        amenity("shuttle", "Airport Shuttle", "transport", Some(35.0), Some(40), true),
    ]
}

fn department(name: &str, phone: &str, email: &str, hours: &str, description: &str) -> Department {
    Department {
        name: name.into(),
        phone: phone.into(),
        email: email.into(),
        hours: hours.into(),
        description: description.into(),
    }
}

fn default_departments() -> Vec<Department> {
    vec![
        department("Front Desk", "ext. 0", "frontdesk@hotel.example", "24/7", "Reservations, billing and general help"),
        department("Guest Relations", "ext. 110", "guestrelations@hotel.example", "07:00-23:00", "Complaints and special requests"),
        department("Maintenance", "ext. 220", "maintenance@hotel.example", "24/7", "Repairs in rooms and public areas"),
        department("Housekeeping", "ext. 330", "housekeeping@hotel.example", "07:00-22:00", "Cleaning, towels and amenities"),
        department("Spa", "ext. 440", "spa@hotel.example", "09:00-21:00", "Treatments and wellness"),
    ]
}

fn faq(category: &str, question: &str, answer: &str, keywords: &[&str]) -> FaqEntry {
    FaqEntry {
        category: category.into(),
        question: question.into(),
        answer: answer.into(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

fn default_faqs() -> Vec<FaqEntry> {
    vec![
        faq("stay", "What time is check-in?", "Check-in starts at 3:00 pm. Early check-in is subject to availability.", &["check-in", "check in", "arrive", "arrival"]),
        faq("stay", "What time is check-out?", "Check-out is at 11:00 am. Late check-out can be requested at the front desk.", &["check-out", "checkout", "check out", "leave", "departure"]),
        faq("services", "Do you have wifi?", "Yes, complimentary high-speed wifi is available throughout the hotel. The network is HotelGuest.", &["wifi", "internet", "password", "network"]),
        faq("services", "Is there parking?", "On-site parking is available for 25 per night. Valet service runs from 7:00 am to midnight.", &["parking", "car", "valet", "garage"]),
        faq("policies", "Are pets allowed?", "Dogs under 20 kg are welcome for a cleaning fee of 40 per stay.", &["pet", "pets", "dog", "cat"]),
        faq("dining", "When is breakfast served?", "Breakfast is served in the restaurant from 6:30 am to 10:30 am.", &["breakfast hours", "breakfast served", "restaurant hours"]),
        faq("policies", "What is the cancellation policy?", "Reservations can be cancelled free of charge up to 48 hours before arrival.", &["cancellation", "cancel", "refund"]),
        faq("services", "When is the pool open?", "The rooftop pool is open daily from 7:00 am to 9:00 pm.", &["pool", "swim", "swimming"]),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
