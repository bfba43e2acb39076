//! A storefront model, persisted through `store-dao` in the integration tests.

use store_dao::{Entity, EntityRegistry};

/// Tables of the storefront. Column names follow the entity fields, foreign keys carry an
/// `_id` suffix.
///
/// Deletes remove referenced rows before the rows referencing them, so foreign keys are only
/// checked on commit.
pub const SCHEMA: &str = r"
CREATE TABLE status (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE price (
    id INTEGER PRIMARY KEY,
    value REAL NOT NULL,
    currency TEXT NOT NULL
);

CREATE TABLE product (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    price_id INTEGER REFERENCES price (id) DEFERRABLE INITIALLY DEFERRED
);

CREATE TABLE purchase (
    id INTEGER PRIMARY KEY,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    note TEXT,
    product_id INTEGER NOT NULL,
    status_id INTEGER,
    FOREIGN KEY (product_id) REFERENCES product (id) DEFERRABLE INITIALLY DEFERRED,
    FOREIGN KEY (status_id) REFERENCES status (id) DEFERRABLE INITIALLY DEFERRED
);
";

#[derive(Entity, Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Entity, Debug, Clone, Default, PartialEq)]
pub struct Price {
    pub id: Option<i64>,
    pub value: f64,
    pub currency: String,
}

#[derive(Entity, Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: Option<i64>,
    pub name: String,
    pub category: String,
    #[store_dao(reference)]
    pub price: Price,
    #[store_dao(skip)]
    pub in_cart: bool,
}

#[derive(Entity, Debug, Clone, Default, PartialEq)]
#[store_dao(name = "Purchase")]
pub struct Order {
    #[store_dao(id)]
    pub order_id: Option<i64>,
    #[store_dao(field = "quantity")]
    pub amount: i32,
    pub note: Option<String>,
    #[store_dao(reference)]
    pub product: Product,
    #[store_dao(reference)]
    pub status: Option<Status>,
}

/// Every entity of the storefront. Registering [`Order`] pulls in the rest.
#[must_use]
pub fn registry() -> EntityRegistry {
    EntityRegistry::new().with::<Order>()
}

#[must_use]
pub fn bread() -> Product {
    Product {
        id: None,
        name: "bread".into(),
        category: "food".into(),
        price: Price {
            id: None,
            value: 2.5,
            currency: "EUR".into(),
        },
        in_cart: false,
    }
}
