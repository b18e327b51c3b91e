//! Validated item definitions.
//!
//! Everything here is checked at construction time, so a value that exists is
//! well-formed and the ledger never sees malformed input.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ValueObject};

use crate::reorder::ReorderPolicy;
use crate::warehouse::WarehouseCode;

const MAX_SKU_LEN: usize = 64;

/// Item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RawMaterial,
    FinishedGood,
    Component,
    Consumable,
    Packaging,
    SparePart,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::RawMaterial => "raw_material",
            Category::FinishedGood => "finished_good",
            Category::Component => "component",
            Category::Consumable => "consumable",
            Category::Packaging => "packaging",
            Category::SparePart => "spare_part",
        }
    }
}

impl core::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw_material" => Ok(Category::RawMaterial),
            "finished_good" => Ok(Category::FinishedGood),
            "component" => Ok(Category::Component),
            "consumable" => Ok(Category::Consumable),
            "packaging" => Ok(Category::Packaging),
            "spare_part" => Ok(Category::SparePart),
            other => Err(DomainError::invalid_spec(format!("unknown category '{other}'"))),
        }
    }
}

/// Unit of measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    Piece,
    #[serde(rename = "kg")]
    Kilogram,
    Liter,
    Meter,
    Box,
}

impl core::str::FromStr for UnitOfMeasure {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "piece" => Ok(UnitOfMeasure::Piece),
            "kg" => Ok(UnitOfMeasure::Kilogram),
            "liter" => Ok(UnitOfMeasure::Liter),
            "meter" => Ok(UnitOfMeasure::Meter),
            "box" => Ok(UnitOfMeasure::Box),
            other => Err(DomainError::invalid_spec(format!("unknown unit '{other}'"))),
        }
    }
}

/// Stock-keeping unit: the unique, immutable business identifier of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let sku = raw.as_ref().trim();
        if sku.is_empty() {
            return Err(DomainError::invalid_spec("sku cannot be empty"));
        }
        if sku.len() > MAX_SKU_LEN {
            return Err(DomainError::invalid_spec(format!(
                "sku cannot exceed {MAX_SKU_LEN} characters"
            )));
        }
        if sku.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_spec("sku cannot contain whitespace"));
        }
        Ok(Self(sku.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Sku {}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an item is stocked: a registered warehouse plus an optional bin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LocationRecord")]
pub struct Location {
    warehouse: WarehouseCode,
    bin: Option<String>,
}

#[derive(Deserialize)]
struct LocationRecord {
    warehouse: String,
    bin: Option<String>,
}

impl TryFrom<LocationRecord> for Location {
    type Error = DomainError;

    fn try_from(raw: LocationRecord) -> Result<Self, Self::Error> {
        Self::new(raw.warehouse, raw.bin.as_deref())
    }
}

impl Location {
    pub fn new(warehouse: impl AsRef<str>, bin: Option<&str>) -> DomainResult<Self> {
        let warehouse = WarehouseCode::parse(warehouse)?;
        let bin = bin.map(str::trim).filter(|b| !b.is_empty()).map(str::to_string);
        Ok(Self { warehouse, bin })
    }

    pub fn warehouse(&self) -> &WarehouseCode {
        &self.warehouse
    }

    pub fn bin(&self) -> Option<&str> {
        self.bin.as_deref()
    }
}

impl ValueObject for Location {}

/// Unit price in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UnitPriceRecord")]
pub struct UnitPrice {
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct UnitPriceRecord {
    amount: i64,
    currency: String,
}

impl TryFrom<UnitPriceRecord> for UnitPrice {
    type Error = DomainError;

    fn try_from(raw: UnitPriceRecord) -> Result<Self, Self::Error> {
        Self::new(raw.amount, raw.currency)
    }
}

impl UnitPrice {
    pub const DEFAULT_CURRENCY: &'static str = "USD";

    pub fn new(amount: i64, currency: impl AsRef<str>) -> DomainResult<Self> {
        if amount < 0 {
            return Err(DomainError::invalid_spec("unit price cannot be negative"));
        }
        let currency = currency.as_ref().trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::invalid_spec(format!(
                "currency must be a 3-letter ISO code, got '{currency}'"
            )));
        }
        Ok(Self { amount, currency })
    }

    /// Price in the default currency.
    pub fn usd(amount: i64) -> DomainResult<Self> {
        Self::new(amount, Self::DEFAULT_CURRENCY)
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl ValueObject for UnitPrice {}

/// Validated definition of a new inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemSpecRecord")]
pub struct ItemSpec {
    sku: Sku,
    name: String,
    description: Option<String>,
    category: Category,
    unit: UnitOfMeasure,
    reorder: ReorderPolicy,
    location: Option<Location>,
    unit_price: Option<UnitPrice>,
}

/// Wire shape of `ItemSpec`. Nested value objects validate themselves.
#[derive(Deserialize)]
struct ItemSpecRecord {
    sku: Sku,
    name: String,
    description: Option<String>,
    category: Category,
    unit: UnitOfMeasure,
    reorder: ReorderPolicy,
    location: Option<Location>,
    unit_price: Option<UnitPrice>,
}

impl TryFrom<ItemSpecRecord> for ItemSpec {
    type Error = DomainError;

    fn try_from(raw: ItemSpecRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            sku: raw.sku,
            name: validate_name(&raw.name)?,
            description: raw.description.and_then(normalize_optional),
            category: raw.category,
            unit: raw.unit,
            reorder: raw.reorder,
            location: raw.location,
            unit_price: raw.unit_price,
        })
    }
}

impl ItemSpec {
    /// Build a spec, rejecting empty sku/name and invalid reorder thresholds.
    pub fn new(
        sku: impl AsRef<str>,
        name: impl AsRef<str>,
        category: Category,
        unit: UnitOfMeasure,
        reorder_point: i64,
        reorder_quantity: i64,
    ) -> DomainResult<Self> {
        Ok(Self {
            sku: Sku::parse(sku)?,
            name: validate_name(name.as_ref())?,
            description: None,
            category,
            unit,
            reorder: ReorderPolicy::new(reorder_point, reorder_quantity)?,
            location: None,
            unit_price: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = normalize_optional(description.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_unit_price(mut self, price: UnitPrice) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn unit(&self) -> UnitOfMeasure {
        self.unit
    }

    pub fn reorder(&self) -> ReorderPolicy {
        self.reorder
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn unit_price(&self) -> Option<&UnitPrice> {
        self.unit_price.as_ref()
    }
}

/// Partial update of an item's descriptive and reorder settings.
///
/// SKU and quantity are deliberately absent: the former is immutable and the
/// latter only moves through transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub unit_price: Option<UnitPrice>,
    pub reorder_point: Option<i64>,
    pub reorder_quantity: Option<i64>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ItemUpdate::default()
    }

    /// Resolve the reorder policy this update would produce on top of `current`.
    pub fn resolve_reorder(&self, current: ReorderPolicy) -> DomainResult<ReorderPolicy> {
        ReorderPolicy::new(
            self.reorder_point.unwrap_or(current.reorder_point()),
            self.reorder_quantity.unwrap_or(current.reorder_quantity()),
        )
    }

    pub fn validated_name(&self) -> DomainResult<Option<String>> {
        self.name.as_deref().map(validate_name).transpose()
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::invalid_spec("name cannot be empty"));
    }
    Ok(name.to_string())
}

pub(crate) fn normalize_optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> DomainResult<ItemSpec> {
        ItemSpec::new(
            "ITEM001",
            "Widget",
            Category::Component,
            UnitOfMeasure::Piece,
            100,
            500,
        )
    }

    #[test]
    fn valid_spec_is_accepted() {
        let spec = widget().unwrap();
        assert_eq!(spec.sku().as_str(), "ITEM001");
        assert_eq!(spec.reorder().reorder_point(), 100);
        assert_eq!(spec.reorder().reorder_quantity(), 500);
    }

    #[test]
    fn negative_reorder_point_is_invalid_spec() {
        let err = ItemSpec::new("A", "A", Category::Consumable, UnitOfMeasure::Box, -1, 10)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidSpec(_)));
    }

    #[test]
    fn zero_reorder_quantity_is_invalid_spec() {
        let err = ItemSpec::new("A", "A", Category::Consumable, UnitOfMeasure::Box, 0, 0)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidSpec(_)));
    }

    #[test]
    fn blank_sku_and_name_are_rejected() {
        assert!(Sku::parse("   ").is_err());
        assert!(Sku::parse("HAS SPACE").is_err());
        let err = ItemSpec::new("A", " ", Category::Component, UnitOfMeasure::Piece, 0, 1)
            .unwrap_err();
        assert_eq!(err, DomainError::invalid_spec("name cannot be empty"));
    }

    #[test]
    fn sku_is_trimmed() {
        assert_eq!(Sku::parse("  ITEM001 ").unwrap(), Sku::parse("ITEM001").unwrap());
    }

    #[test]
    fn categories_and_units_parse_from_wire_names() {
        assert_eq!("raw_material".parse::<Category>().unwrap(), Category::RawMaterial);
        assert_eq!("kg".parse::<UnitOfMeasure>().unwrap(), UnitOfMeasure::Kilogram);
        assert!("gallon".parse::<UnitOfMeasure>().is_err());
    }

    #[test]
    fn unit_price_normalizes_currency() {
        let price = UnitPrice::new(1250, "eur").unwrap();
        assert_eq!(price.currency(), "EUR");
        assert!(UnitPrice::new(-1, "USD").is_err());
        assert!(UnitPrice::new(1, "US").is_err());
    }

    #[test]
    fn deserialization_runs_the_same_checks_as_construction() {
        let valid = serde_json::to_value(
            widget()
                .unwrap()
                .with_location(Location::new("wh1", Some("A-01")).unwrap())
                .with_unit_price(UnitPrice::usd(250).unwrap()),
        )
        .unwrap();
        let parsed: ItemSpec = serde_json::from_value(valid.clone()).unwrap();
        assert_eq!(parsed.sku().as_str(), "ITEM001");
        assert_eq!(parsed.location().unwrap().warehouse().as_str(), "WH1");

        let broken = |field: &str, value: serde_json::Value| {
            let mut json = valid.clone();
            json[field] = value;
            serde_json::from_value::<ItemSpec>(json)
        };
        assert!(broken("sku", serde_json::json!("")).is_err());
        assert!(broken("name", serde_json::json!("  ")).is_err());
        assert!(
            broken(
                "reorder",
                serde_json::json!({ "reorder_point": -5, "reorder_quantity": 0 })
            )
            .is_err()
        );
        assert!(broken("unit_price", serde_json::json!({ "amount": -1, "currency": "USD" })).is_err());
        assert!(broken("location", serde_json::json!({ "warehouse": " ", "bin": null })).is_err());
    }

    #[test]
    fn update_resolves_reorder_against_current_policy() {
        let current = ReorderPolicy::new(10, 50).unwrap();
        let update = ItemUpdate {
            reorder_point: Some(20),
            ..ItemUpdate::default()
        };
        let resolved = update.resolve_reorder(current).unwrap();
        assert_eq!(resolved.reorder_point(), 20);
        assert_eq!(resolved.reorder_quantity(), 50);

        let bad = ItemUpdate {
            reorder_quantity: Some(0),
            ..ItemUpdate::default()
        };
        assert!(bad.resolve_reorder(current).is_err());
    }
}
